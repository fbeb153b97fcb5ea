// src/provider/mod.rs
pub mod air_quality;
pub mod forecast;
pub mod transport;
pub mod uv_index;
pub mod weather;

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::rate_limit::RateLimiter;
pub use transport::{HttpTransport, ProviderTransport, StaticTransport};

/// Latitude/longitude pair sent to every endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// The four provider endpoints the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Weather,
    AirQuality,
    UvIndex,
    Forecast,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Weather,
        Endpoint::AirQuality,
        Endpoint::UvIndex,
        Endpoint::Forecast,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Weather => "weather",
            Endpoint::AirQuality => "air_quality",
            Endpoint::UvIndex => "uv_index",
            Endpoint::Forecast => "forecast",
        }
    }

    /// Only weather and forecast accept a `units` parameter.
    pub fn takes_units(self) -> bool {
        matches!(self, Endpoint::Weather | Endpoint::Forecast)
    }
}

/// Why a fetch produced no data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of one fetcher call.
///
/// `Unavailable` means the provider answered but had nothing usable;
/// `Failed` means the call itself went wrong.
#[derive(Debug)]
pub enum Fetched<T> {
    Ok(T),
    Unavailable,
    Failed(FetchError),
}

impl<T> Fetched<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Fetched::Ok(v) => Some(v),
            Fetched::Unavailable | Fetched::Failed(_) => None,
        }
    }
}

/// Rate-limited access to the provider: one `acquire()` per request.
#[derive(Clone)]
pub struct ProviderClient {
    transport: Arc<dyn ProviderTransport>,
    limiter: Arc<RateLimiter>,
    cfg: ProviderConfig,
}

impl ProviderClient {
    pub fn new(
        cfg: ProviderConfig,
        transport: Arc<dyn ProviderTransport>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            transport,
            limiter,
            cfg,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Weather => &self.cfg.weather_url,
            Endpoint::AirQuality => &self.cfg.air_quality_url,
            Endpoint::UvIndex => &self.cfg.uv_index_url,
            Endpoint::Forecast => &self.cfg.forecast_url,
        }
    }

    fn query(&self, endpoint: Endpoint, at: Coordinates) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("lat", at.lat.to_string()),
            ("lon", at.lon.to_string()),
            ("appid", self.cfg.api_key.clone()),
        ];
        if endpoint.takes_units() {
            q.push(("units", self.cfg.units.clone()));
        }
        q
    }

    /// Issue one GET for `endpoint`, after taking a slot from the rate budget.
    pub async fn get(&self, endpoint: Endpoint, at: Coordinates) -> Result<Value, FetchError> {
        self.limiter.acquire().await;
        let query = self.query(endpoint, at);
        self.transport
            .get_json(endpoint, self.url(endpoint), &query)
            .await
    }

    /// GET + parse, folding every error into a [`Fetched`] so callers never abort.
    pub(crate) async fn fetch<T>(
        &self,
        endpoint: Endpoint,
        at: Coordinates,
        parse: fn(Value) -> Result<Option<T>, FetchError>,
    ) -> Fetched<T> {
        let outcome = match self.get(endpoint, at).await {
            Ok(body) => match parse(body) {
                Ok(Some(v)) => Fetched::Ok(v),
                Ok(None) => Fetched::Unavailable,
                Err(e) => Fetched::Failed(e),
            },
            Err(e) => Fetched::Failed(e),
        };

        match &outcome {
            Fetched::Ok(_) => {}
            Fetched::Unavailable => {
                tracing::debug!(
                    target: "ingest",
                    endpoint = endpoint.name(),
                    %at,
                    "provider returned no usable data"
                );
                counter!("ingest_source_unavailable_total", "endpoint" => endpoint.name())
                    .increment(1);
            }
            Fetched::Failed(e) => {
                tracing::warn!(
                    target: "ingest",
                    endpoint = endpoint.name(),
                    %at,
                    error = %e,
                    "provider fetch failed"
                );
                counter!("ingest_source_failures_total", "endpoint" => endpoint.name())
                    .increment(1);
            }
        }
        outcome
    }
}

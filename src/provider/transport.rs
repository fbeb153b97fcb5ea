// src/provider/transport.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{Endpoint, FetchError};

/// One JSON GET against the provider. Rate limiting happens above this layer.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn get_json(
        &self,
        endpoint: Endpoint,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<Value, FetchError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("enviro-ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .context("building provider http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn get_json(
        &self,
        endpoint: Endpoint,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<Value, FetchError> {
        // reqwest errors carry the full URL, and the query holds the credential
        let rsp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.name(),
                status: status.as_u16(),
            });
        }
        let bytes = rsp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Canned reply for [`StaticTransport`].
#[derive(Debug, Clone)]
pub enum Canned {
    Body(Value),
    Status(u16),
}

/// In-memory transport that serves canned bodies per endpoint.
///
/// Replies can be overridden for a single latitude, which is how tests make
/// one location fail while its neighbours succeed. Unknown endpoints answer 404.
#[derive(Default)]
pub struct StaticTransport {
    by_endpoint: HashMap<Endpoint, Canned>,
    by_location: HashMap<(Endpoint, u64), Canned>,
    requests: Mutex<Vec<(Endpoint, Vec<(&'static str, String)>)>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, endpoint: Endpoint, body: Value) -> Self {
        self.by_endpoint.insert(endpoint, Canned::Body(body));
        self
    }

    pub fn with_status(mut self, endpoint: Endpoint, status: u16) -> Self {
        self.by_endpoint.insert(endpoint, Canned::Status(status));
        self
    }

    pub fn with_at(mut self, endpoint: Endpoint, lat: f64, reply: Canned) -> Self {
        self.by_location.insert((endpoint, lat.to_bits()), reply);
        self
    }

    /// Every request served so far, in order.
    pub fn requests(&self) -> Vec<(Endpoint, Vec<(&'static str, String)>)> {
        self.requests
            .lock()
            .expect("static transport mutex poisoned")
            .clone()
    }
}

fn lat_of(query: &[(&'static str, String)]) -> Option<f64> {
    query
        .iter()
        .find(|(k, _)| *k == "lat")
        .and_then(|(_, v)| v.parse().ok())
}

#[async_trait]
impl ProviderTransport for StaticTransport {
    async fn get_json(
        &self,
        endpoint: Endpoint,
        _url: &str,
        query: &[(&'static str, String)],
    ) -> Result<Value, FetchError> {
        self.requests
            .lock()
            .expect("static transport mutex poisoned")
            .push((endpoint, query.to_vec()));

        let reply = lat_of(query)
            .and_then(|lat: f64| self.by_location.get(&(endpoint, lat.to_bits())))
            .or_else(|| self.by_endpoint.get(&endpoint))
            .cloned()
            .unwrap_or(Canned::Status(404));

        match reply {
            Canned::Body(v) => Ok(v),
            Canned::Status(status) => Err(FetchError::Status {
                endpoint: endpoint.name(),
                status,
            }),
        }
    }
}

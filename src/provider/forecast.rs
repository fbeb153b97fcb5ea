// src/provider/forecast.rs
use serde::Deserialize;
use serde_json::Value;

use super::{Coordinates, Endpoint, FetchError, Fetched, ProviderClient};

#[derive(Debug, Deserialize)]
struct Resp {
    list: Option<Vec<Point>>,
}

#[derive(Debug, Deserialize)]
struct Point {
    rain: Option<Rain>,
}

#[derive(Debug, Deserialize)]
struct Rain {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

/// Total forecast rain (mm) over every 3-hour point; points without rain add nothing.
pub fn total_precipitation(body: Value) -> Result<Option<f64>, FetchError> {
    let raw: Resp = serde_json::from_value(body)?;
    Ok(raw.list.map(|points| {
        points
            .iter()
            .filter_map(|p| p.rain.as_ref().and_then(|r| r.three_hours))
            .sum()
    }))
}

impl ProviderClient {
    pub async fn forecast_precipitation(&self, at: Coordinates) -> Fetched<f64> {
        self.fetch(Endpoint::Forecast, at, total_precipitation).await
    }
}

// src/provider/uv_index.rs
use serde::Deserialize;
use serde_json::Value;

use super::{Coordinates, Endpoint, FetchError, Fetched, ProviderClient};

#[derive(Debug, Deserialize)]
struct Resp {
    value: Option<f64>,
}

fn parse(body: Value) -> Result<Option<f64>, FetchError> {
    let raw: Resp = serde_json::from_value(body)?;
    Ok(raw.value)
}

impl ProviderClient {
    pub async fn uv_index(&self, at: Coordinates) -> Fetched<f64> {
        self.fetch(Endpoint::UvIndex, at, parse).await
    }
}

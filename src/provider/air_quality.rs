// src/provider/air_quality.rs
use serde::Deserialize;
use serde_json::Value;

use super::{Coordinates, Endpoint, FetchError, Fetched, ProviderClient};

/// Air quality index plus pollutant concentrations (μg/m³), first list entry only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirQualityReading {
    pub index: Option<i32>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub co: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
}

impl AirQualityReading {
    pub fn from_body(body: Value) -> Result<Option<Self>, FetchError> {
        let raw: Resp = serde_json::from_value(body)?;
        let Some(first) = raw.list.into_iter().next() else {
            return Ok(None);
        };
        let c = first.components.unwrap_or_default();
        Ok(Some(Self {
            index: first.main.and_then(|m| m.aqi),
            pm2_5: c.pm2_5,
            pm10: c.pm10,
            no2: c.no2,
            co: c.co,
            so2: c.so2,
            o3: c.o3,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    list: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    main: Option<Main>,
    components: Option<Components>,
}

#[derive(Debug, Deserialize)]
struct Main {
    aqi: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    no2: Option<f64>,
    co: Option<f64>,
    so2: Option<f64>,
    o3: Option<f64>,
}

impl ProviderClient {
    pub async fn air_quality(&self, at: Coordinates) -> Fetched<AirQualityReading> {
        self.fetch(Endpoint::AirQuality, at, AirQualityReading::from_body).await
    }
}

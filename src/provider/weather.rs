// src/provider/weather.rs
use serde::Deserialize;
use serde_json::Value;

use super::{Coordinates, Endpoint, FetchError, Fetched, ProviderClient};

/// Current conditions. The three measurements are mandatory; pressures are not.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: Option<f64>,
    pub sea_level_pressure: Option<f64>,
}

impl WeatherReading {
    /// Sea-level pressure if reported, else station pressure.
    pub fn effective_pressure(&self) -> Option<f64> {
        self.sea_level_pressure.or(self.pressure)
    }

    pub fn from_body(body: Value) -> Result<Option<Self>, FetchError> {
        let raw: Resp = serde_json::from_value(body)?;
        let (Some(main), Some(wind)) = (raw.main, raw.wind) else {
            return Ok(None);
        };
        let (Some(temperature), Some(humidity), Some(wind_speed)) =
            (main.temp, main.humidity, wind.speed)
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            temperature,
            humidity,
            wind_speed,
            pressure: main.pressure,
            sea_level_pressure: main.sea_level,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Resp {
    main: Option<Main>,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    sea_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<f64>,
}

impl ProviderClient {
    pub async fn weather(&self, at: Coordinates) -> Fetched<WeatherReading> {
        self.fetch(Endpoint::Weather, at, WeatherReading::from_body).await
    }
}

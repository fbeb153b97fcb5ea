// src/ingest/aggregate.rs
//! Location Aggregator: four fetches, one record.

use crate::ingest::types::NormalizedRecord;
use crate::locations::Location;
use crate::provider::air_quality::AirQualityReading;
use crate::provider::weather::WeatherReading;
use crate::provider::{Fetched, ProviderClient};

/// Raw outcomes of the four fetchers for one location.
#[derive(Debug)]
pub struct SourceResults {
    pub weather: Fetched<WeatherReading>,
    pub air_quality: Fetched<AirQualityReading>,
    pub uv_index: Fetched<f64>,
    pub precipitation: Fetched<f64>,
}

pub struct LocationAggregator {
    client: ProviderClient,
}

impl LocationAggregator {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }

    /// Run all four fetchers in order. Later fetches still run when weather fails,
    /// so the rate budget is spent the same way for every location.
    pub async fn fetch_all(&self, location: &Location) -> SourceResults {
        let at = location.coordinates();
        let weather = self.client.weather(at).await;
        let air_quality = self.client.air_quality(at).await;
        let uv_index = self.client.uv_index(at).await;
        let precipitation = self.client.forecast_precipitation(at).await;
        SourceResults {
            weather,
            air_quality,
            uv_index,
            precipitation,
        }
    }

    /// Fetch and merge. `None` when there is no weather to build a record from.
    pub async fn collect(&self, region: &str, location: &Location) -> Option<NormalizedRecord> {
        let results = self.fetch_all(location).await;
        merge(region, location, results)
    }
}

/// Merge fetcher outcomes into a record.
///
/// Weather is mandatory. Every other source degrades independently:
/// optional fields become `None`, precipitation becomes 0.0. A provider
/// reporting 0 is a real reading and kept as such.
pub fn merge(region: &str, location: &Location, results: SourceResults) -> Option<NormalizedRecord> {
    let weather = match results.weather {
        Fetched::Ok(w) => w,
        Fetched::Unavailable | Fetched::Failed(_) => return None,
    };

    let aq = match results.air_quality {
        Fetched::Ok(aq) => aq,
        Fetched::Unavailable | Fetched::Failed(_) => AirQualityReading::default(),
    };

    let uv_index = match results.uv_index {
        Fetched::Ok(v) => Some(v),
        Fetched::Unavailable | Fetched::Failed(_) => None,
    };

    let precipitation = match results.precipitation {
        Fetched::Ok(v) => v,
        Fetched::Unavailable | Fetched::Failed(_) => 0.0,
    };

    Some(NormalizedRecord {
        region: region.to_string(),
        location_id: location.id,
        location_name: location.name.clone(),
        temperature: weather.temperature,
        humidity: weather.humidity,
        wind_speed: weather.wind_speed,
        air_quality_index: aq.index,
        pm2_5: aq.pm2_5,
        pm10: aq.pm10,
        no2: aq.no2,
        co: aq.co,
        so2: aq.so2,
        o3: aq.o3,
        precipitation,
        uv_index,
        sea_level_pressure: weather.effective_pressure(),
    })
}

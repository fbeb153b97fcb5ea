// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// One location's readings for one ingest pass, ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRecord {
    pub region: String,
    pub location_id: i64,
    pub location_name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub air_quality_index: Option<i32>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub co: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    /// Forecast rain total (mm); 0.0 when the forecast could not be read.
    pub precipitation: f64,
    pub uv_index: Option<f64>,
    /// Sea-level pressure, else station pressure (hPa).
    pub sea_level_pressure: Option<f64>,
}

/// Counters for one pass over all regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub regions: usize,
    pub locations: usize,
    pub persisted: usize,
    /// Weather unavailable or failed, nothing stored.
    pub skipped: usize,
    pub sink_errors: usize,
    pub cancelled: bool,
}

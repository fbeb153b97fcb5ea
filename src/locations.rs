// src/locations.rs
//! Region → location table, read once at startup.
//!
//! Order is preserved exactly as written in the file. Location ids are NOT
//! assumed unique: the same district may be listed under several regions (or
//! twice in one), and every entry is ingested on its own.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::provider::Coordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// A storage partition (table name) and its locations, in ingest order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Deserialize)]
struct TomlTable {
    #[serde(default)]
    regions: Vec<Region>,
}

/// Load regions from a TOML (`[[regions]]`) or JSON (array of regions) file.
pub fn load_regions_from(path: &Path) -> Result<Vec<Region>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading locations from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let regions = parse_regions(&content, ext.as_str())
        .with_context(|| format!("parsing locations from {}", path.display()))?;
    validate(&regions)?;
    Ok(regions)
}

fn parse_regions(s: &str, hint_ext: &str) -> Result<Vec<Region>> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str::<TomlTable>(s)?.regions),
        _ => serde_json::from_str(s)
            .or_else(|_| toml::from_str::<TomlTable>(s).map(|t| t.regions))
            .map_err(|_| anyhow!("unsupported locations format")),
    }
}

fn validate(regions: &[Region]) -> Result<()> {
    for r in regions {
        if r.name.trim().is_empty() {
            bail!("region with empty name");
        }
        for l in &r.locations {
            if !(-90.0..=90.0).contains(&l.lat) || !(-180.0..=180.0).contains(&l.lon) {
                bail!(
                    "location {} ({}) in region {} has out-of-range coordinates {},{}",
                    l.id,
                    l.name,
                    r.name,
                    l.lat,
                    l.lon
                );
            }
        }
    }
    Ok(())
}

/// Total number of location entries, duplicates included.
pub fn location_count(regions: &[Region]) -> usize {
    regions.iter().map(|r| r.locations.len()).sum()
}

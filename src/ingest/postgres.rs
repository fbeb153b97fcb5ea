// src/ingest/postgres.rs
//! Postgres sink: one table per region, named after the region.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::ingest::sink::RecordSink;
use crate::ingest::types::NormalizedRecord;
use crate::locations::Region;

const COLUMNS: &str = "district_id, district_name, temperature, humidity, wind_speed, \
     air_quality_index, pm25, pm10, no2, co, so2, o3, precipitation, uv_index, sea_level_pressure";

/// Region names become table names, so only plain identifiers are accepted.
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn table_for(region: &str) -> Result<&str> {
    if !is_safe_identifier(region) {
        bail!("region {region:?} is not a valid table name");
    }
    Ok(region)
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
    )
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id                  BIGSERIAL PRIMARY KEY,
            district_id         BIGINT NOT NULL,
            district_name       TEXT NOT NULL,
            temperature         DOUBLE PRECISION,
            humidity            DOUBLE PRECISION,
            wind_speed          DOUBLE PRECISION,
            air_quality_index   INTEGER,
            pm25                DOUBLE PRECISION,
            pm10                DOUBLE PRECISION,
            no2                 DOUBLE PRECISION,
            co                  DOUBLE PRECISION,
            so2                 DOUBLE PRECISION,
            o3                  DOUBLE PRECISION,
            precipitation       DOUBLE PRECISION,
            uv_index            DOUBLE PRECISION,
            sea_level_pressure  DOUBLE PRECISION,
            inserted_at         TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    )
}

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    /// Create any missing region tables.
    pub async fn prepare_tables(&self, regions: &[Region]) -> Result<()> {
        for r in regions {
            let table = table_for(&r.name)?;
            sqlx::query(&create_table_sql(table))
                .execute(&self.pool)
                .await
                .with_context(|| format!("creating table {table}"))?;
            info!(target: "ingest", table, "table ready");
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn insert(&self, r: &NormalizedRecord) -> Result<()> {
        let table = table_for(&r.region)?;
        let sql = insert_sql(table);
        let done = sqlx::query(&sql)
            .bind(r.location_id)
            .bind(r.location_name.clone())
            .bind(r.temperature)
            .bind(r.humidity)
            .bind(r.wind_speed)
            .bind(r.air_quality_index)
            .bind(r.pm2_5)
            .bind(r.pm10)
            .bind(r.no2)
            .bind(r.co)
            .bind(r.so2)
            .bind(r.o3)
            .bind(r.precipitation)
            .bind(r.uv_index)
            .bind(r.sea_level_pressure)
            .execute(&self.pool)
            .await
            .with_context(|| format!("inserting {} into {table}", r.location_name))?;
        debug!(
            target: "ingest",
            table,
            location_id = r.location_id,
            rows = done.rows_affected(),
            "row inserted"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

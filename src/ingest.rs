//! Raw-row normalization and batch loading.
//!
//! Turns raw delivery rows (GPS string, raw timestamp, raw carrier/status
//! tokens) into `OrderRecord`s meeting the store contract, then loads them
//! in batches. Rows that fail any check are skipped and counted; a bad row
//! never fails an ingestion run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{IngestError, StoreError};
use crate::models::{
    coordinate_in_range, hour_bucket_label, normalize_carrier, OrderRecord, Outcome,
};
use crate::store::RecordStore;

const BATCH_SIZE: usize = 10_000;

/// Timestamp layouts observed in the raw feeds, tried after RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// One raw order row as it arrives from the feed (JSON Lines).
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub timestamp: String,
    /// `"lat,lon"` pair, e.g. `"13.014071,77.532051"`.
    pub pickup_gps: String,
    #[serde(default, alias = "logistics_player", alias = "bpp_id")]
    pub carrier: Option<String>,
    #[serde(default, alias = "order_status")]
    pub status: Option<String>,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: u64,
    pub skipped: u64,
}

/// Parse a `"lat,lon"` GPS string, rejecting out-of-range pairs.
pub fn parse_gps(raw: &str) -> Result<(f64, f64), IngestError> {
    let mut parts = raw.trim().splitn(2, ',');
    let (lat_raw, lon_raw) = match (parts.next(), parts.next()) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(IngestError::InvalidCoordinate(raw.to_string())),
    };

    let lat: f64 = lat_raw
        .trim()
        .parse()
        .map_err(|_| IngestError::InvalidCoordinate(raw.to_string()))?;
    let lon: f64 = lon_raw
        .trim()
        .parse()
        .map_err(|_| IngestError::InvalidCoordinate(raw.to_string()))?;

    if !coordinate_in_range(lat, lon) {
        return Err(IngestError::InvalidCoordinate(raw.to_string()));
    }
    Ok((lat, lon))
}

/// Extract the hour of day from a mixed-format timestamp.
pub fn hour_of_day(raw: &str) -> Result<u32, IngestError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.hour());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts.hour());
        }
    }
    Err(IngestError::InvalidTimestamp(trimmed.to_string()))
}

/// Normalize one raw row into an `OrderRecord`.
pub fn normalize_order(raw: &RawOrder) -> Result<OrderRecord, IngestError> {
    let (lat, lon) = parse_gps(&raw.pickup_gps)?;
    let hour = hour_of_day(&raw.timestamp)?;

    Ok(OrderRecord {
        lat,
        lon,
        hour_bucket: hour_bucket_label(hour),
        carrier: normalize_carrier(raw.carrier.as_deref()),
        outcome: Outcome::from_raw(raw.status.as_deref().unwrap_or("")),
    })
}

/// Normalize and batch-load raw rows into a store. Per-row failures are
/// counted and skipped; only store failures abort.
pub async fn load_records(
    store: &dyn RecordStore,
    rows: Vec<RawOrder>,
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport::default();
    let mut batch: Vec<OrderRecord> = Vec::new();

    for raw in &rows {
        match normalize_order(raw) {
            Ok(record) => batch.push(record),
            Err(err) => {
                report.skipped += 1;
                debug!("skipping row: {}", err);
            }
        }
        if batch.len() >= BATCH_SIZE {
            report.inserted += batch.len() as u64;
            store.insert_batch(std::mem::take(&mut batch)).await?;
        }
    }
    if !batch.is_empty() {
        report.inserted += batch.len() as u64;
        store.insert_batch(batch).await?;
    }

    info!(
        "ingested {} records ({} skipped)",
        report.inserted, report.skipped
    );
    Ok(report)
}

/// Load a JSON Lines file of raw rows. Unparseable lines count as skips.
pub async fn load_jsonl(store: &dyn RecordStore, path: &Path) -> anyhow::Result<IngestReport> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    let mut bad_lines = 0u64;
    for line in reader.lines() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawOrder>(trimmed) {
            Ok(raw) => rows.push(raw),
            Err(err) => {
                bad_lines += 1;
                debug!("unparseable line: {}", err);
            }
        }
    }

    let mut report = load_records(store, rows).await?;
    report.skipped += bad_lines;
    Ok(report)
}

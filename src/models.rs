//! Core record model and the shared normalization layer.
//!
//! Every rule that both storage backends (and the assembler) must agree on
//! lives here: outcome parsing, the unknown-carrier sentinel, hour-bucket
//! labels, the filter predicate, and carrier display formatting. Backends
//! never reimplement any of these.

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};

/// Canonical token for an unassigned or unparseable carrier. Counted in
/// unfiltered aggregates, hidden from user-facing filter choices.
pub const UNKNOWN_CARRIER: &str = "unknown";

/// Sentinel filter value meaning "no restriction".
pub const FILTER_ALL: &str = "All";

/// Order outcome. Anything that is not exactly the success token (after
/// trimming and ASCII-lowercasing) counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Single normalization point for raw status strings, shared by the
    /// ingestion path and the SQLite row mapper.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("success") {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// A normalized delivery-order record. Immutable once created; the
/// ingestion layer guarantees the coordinate pair is finite and in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Pickup latitude (WGS84 degrees, [-90, 90]).
    pub lat: f64,
    /// Pickup longitude (WGS84 degrees, [-180, 180]).
    pub lon: f64,
    /// One-hour time-of-day window, `"HH-HH"` with `"23-00"` as the wrap.
    pub hour_bucket: String,
    /// Carrier token; `UNKNOWN_CARRIER` when unassigned.
    pub carrier: String,
    pub outcome: Outcome,
}

impl OrderRecord {
    pub fn new(
        lat: f64,
        lon: f64,
        hour_bucket: impl Into<String>,
        carrier: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            lat,
            lon,
            hour_bucket: hour_bucket.into(),
            carrier: carrier.into(),
            outcome,
        }
    }
}

/// True when the pair is a usable WGS84 coordinate.
pub fn coordinate_in_range(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Bit-exact location signature used for distinct-source deduplication.
pub fn location_signature(lat: f64, lon: f64) -> (u64, u64) {
    (lat.to_bits(), lon.to_bits())
}

/// Hour-of-day to its bucket label: 7 -> "07-08", 23 -> "23-00".
pub fn hour_bucket_label(hour: u32) -> String {
    format!("{:02}-{:02}", hour % 24, (hour + 1) % 24)
}

/// Fill an absent or blank carrier with the unknown sentinel.
pub fn normalize_carrier(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => UNKNOWN_CARRIER.to_string(),
    }
}

/// Display form of a carrier token: the text after the last path-like
/// separator. Applied once, at assembly time, for every backend.
pub fn display_carrier(raw: &str) -> &str {
    raw.rsplit('/').next().unwrap_or(raw)
}

/// Request-scoped record predicate. `None` means "All": match any value,
/// including the unknown sentinel. Both fields are exact matches.
///
/// This is the single definition of filter semantics: the memory backend
/// applies `matches` directly and the SQLite backend compiles the same
/// fields into an equality `WHERE` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub carrier: Option<String>,
    pub hour_bucket: Option<String>,
}

impl RecordFilter {
    /// The unrestricted filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from request parameters where `"All"`, empty, or absent means
    /// no restriction on that field.
    pub fn from_params(carrier: Option<&str>, hour_bucket: Option<&str>) -> Self {
        let keep = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|t| !t.is_empty() && *t != FILTER_ALL)
                .map(str::to_string)
        };
        Self {
            carrier: keep(carrier),
            hour_bucket: keep(hour_bucket),
        }
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    pub fn with_hour_bucket(mut self, hour_bucket: impl Into<String>) -> Self {
        self.hour_bucket = Some(hour_bucket.into());
        self
    }

    pub fn is_all(&self) -> bool {
        self.carrier.is_none() && self.hour_bucket.is_none()
    }

    pub fn matches(&self, record: &OrderRecord) -> bool {
        self.carrier.as_deref().map_or(true, |c| record.carrier == c)
            && self
                .hour_bucket
                .as_deref()
                .map_or(true, |h| record.hour_bucket == h)
    }
}

/// Per-cell aggregation result, before GeoJSON assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSummary {
    pub cell: CellIndex,
    pub total_orders: u64,
    pub success_orders: u64,
    pub fail_orders: u64,
    /// Percentage in [0, 100], rounded to 2 decimals.
    pub success_rate: f64,
    /// Mean pickup location, rounded to 6 decimals.
    pub center_lat: f64,
    pub center_lng: f64,
    /// Count of distinct pickup points observed in the cell.
    pub unique_sources: u64,
    /// Sorted distinct hour buckets observed in the cell.
    pub hour_buckets: Vec<String>,
    /// Sorted distinct raw carrier tokens observed in the cell.
    pub carriers: Vec<String>,
}

/// Filter-scoped statistics over the whole record set, without grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub total_orders: u64,
    pub successful_orders: u64,
    /// Percentage in [0, 100], rounded to 1 decimal; 0.0 when there are no
    /// matching orders.
    pub success_rate: f64,
    pub unique_sources: u64,
}

impl GlobalSummary {
    pub fn empty() -> Self {
        Self {
            total_orders: 0,
            successful_orders: 0,
            success_rate: 0.0,
            unique_sources: 0,
        }
    }
}

/// The presentation-boundary request tuple.
#[derive(Debug, Clone)]
pub struct MapRequest {
    pub carrier: Option<String>,
    pub hour_bucket: Option<String>,
    pub resolution: Resolution,
    /// Rendering budget override; the engine default applies when `None`.
    pub limit: Option<usize>,
}

impl MapRequest {
    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            carrier: self.carrier.clone(),
            hour_bucket: self.hour_bucket.clone(),
        }
    }
}

//! Error taxonomy for the aggregation core.
//!
//! Record-level anomalies (bad coordinates, unparseable rows, binning
//! rejections) are recovered where they occur and never reach aggregation
//! callers. Store connectivity failures always propagate, so callers can
//! tell "backend down" apart from "zero matching records".

use std::time::Duration;

use thiserror::Error;

/// Failure reaching or querying the backing record store.
///
/// An empty result set is NOT a store error; it is a normal, fully-formed
/// response.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store query timed out after {0:?}")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Per-row rejection during ingestion. Offending rows are skipped and
/// counted; a bad row never fails the batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid coordinate pair: {0}")]
    InvalidCoordinate(String),

    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),
}

//! Hexmap Backend Library
//!
//! Bins delivery-order records into hexagonal spatial cells and computes
//! per-cell, per-filter statistics (volume, success rate, source
//! diversity) for map rendering. Storage is pluggable: an in-memory flat
//! table or a SQLite store with filter pushdown, behind one trait.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hexbin;
pub mod ingest;
pub mod models;
pub mod overlay;
pub mod store;

pub use aggregate::{AggregationEngine, MapView};
pub use catalog::FilterCatalog;
pub use config::Config;
pub use error::{IngestError, StoreError};
pub use models::{CellSummary, GlobalSummary, MapRequest, OrderRecord, Outcome, RecordFilter};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};

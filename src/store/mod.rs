//! Record storage backends.
//!
//! One logical contract, two realizations: a flat in-memory table that
//! filters with a predicate scan, and a SQLite store that pushes the same
//! predicate down as an equality `WHERE` stage. The aggregation engine is
//! written against the trait and never knows which one it has.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::error::StoreError;
use crate::models::{OrderRecord, RecordFilter};

/// Read/append access to the normalized order-record population.
///
/// All query methods treat an absent or empty dataset as an empty result;
/// only genuine connectivity failures (or timeouts) surface as errors.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching the filter. Iteration order is unspecified but
    /// stable within a single call.
    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<OrderRecord>, StoreError>;

    /// Number of records matching the filter.
    async fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError>;

    /// Distinct non-empty carriers over the full population, excluding the
    /// unknown sentinel, lexicographically sorted.
    async fn distinct_carriers(&self) -> Result<Vec<String>, StoreError>;

    /// Distinct hour buckets over the full population, sorted (which is
    /// also chronological for the zero-padded labels).
    async fn distinct_hour_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Distinct (lat, lon) pickup points matching the filter, capped at
    /// `limit`.
    async fn distinct_source_points(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<(f64, f64)>, StoreError>;

    /// Monotonic population revision; bumps whenever a batch is ingested.
    /// Consumers key cached derivations (e.g. the filter catalog) on it.
    async fn revision(&self) -> Result<u64, StoreError>;

    /// Append a batch of normalized records.
    async fn insert_batch(&self, records: Vec<OrderRecord>) -> Result<(), StoreError>;
}

//! Flat-table record store: a predicate scan over an in-memory vector.
//!
//! The reference backend for tests and small datasets. Filtering goes
//! through `RecordFilter::matches`, the same predicate the SQLite backend
//! compiles to SQL, so the two cannot drift.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::models::{location_signature, OrderRecord, RecordFilter, UNKNOWN_CARRIER};
use crate::store::RecordStore;

/// In-memory record table. Reads are concurrent; ingestion takes the write
/// lock. Iteration order is insertion order, stable within a call.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<OrderRecord>>,
    revision: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for pre-populated fixtures.
    pub fn with_records(records: Vec<OrderRecord>) -> Self {
        let store = Self::new();
        if !records.is_empty() {
            *store.records.write() = records;
            store.revision.store(1, Ordering::SeqCst);
        }
        store
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<OrderRecord>, StoreError> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        let records = self.records.read();
        Ok(records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn distinct_carriers(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.read();
        let carriers: BTreeSet<&str> = records
            .iter()
            .map(|r| r.carrier.as_str())
            .filter(|c| !c.is_empty() && *c != UNKNOWN_CARRIER)
            .collect();
        Ok(carriers.into_iter().map(str::to_string).collect())
    }

    async fn distinct_hour_buckets(&self) -> Result<Vec<String>, StoreError> {
        let records = self.records.read();
        let buckets: BTreeSet<&str> = records.iter().map(|r| r.hour_bucket.as_str()).collect();
        Ok(buckets.into_iter().map(str::to_string).collect())
    }

    async fn distinct_source_points(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<(f64, f64)>, StoreError> {
        let records = self.records.read();
        let mut seen = HashSet::new();
        let mut points = Vec::new();
        for record in records.iter().filter(|r| filter.matches(r)) {
            if seen.insert(location_signature(record.lat, record.lon)) {
                points.push((record.lat, record.lon));
                if points.len() >= limit {
                    break;
                }
            }
        }
        Ok(points)
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.revision.load(Ordering::SeqCst))
    }

    async fn insert_batch(&self, records: Vec<OrderRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut table = self.records.write();
        table.extend(records);
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//! User-facing filter choices, derived from the record population.
//!
//! Distinct carriers and hour buckets change only when records are
//! ingested, so the catalog caches one snapshot keyed by the store's
//! population revision. A stale or missing snapshot always falls through
//! to the store; correctness never depends on the cache.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::RecordStore;

#[derive(Debug, Clone)]
struct CatalogSnapshot {
    revision: u64,
    carriers: Vec<String>,
    hour_buckets: Vec<String>,
}

pub struct FilterCatalog {
    store: Arc<dyn RecordStore>,
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

impl FilterCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
        }
    }

    /// Distinct carriers, sorted, excluding the unknown sentinel.
    pub async fn carriers(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.current().await?.carriers)
    }

    /// Distinct hour buckets, sorted chronologically.
    pub async fn hour_buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.current().await?.hour_buckets)
    }

    async fn current(&self) -> Result<CatalogSnapshot, StoreError> {
        let revision = self.store.revision().await?;

        let cached: Option<CatalogSnapshot> = self.snapshot.read().clone();
        if let Some(snapshot) = cached {
            if snapshot.revision == revision {
                return Ok(snapshot);
            }
        }

        debug!("recomputing filter catalog at revision {}", revision);
        let snapshot = CatalogSnapshot {
            revision,
            carriers: self.store.distinct_carriers().await?,
            hour_buckets: self.store.distinct_hour_buckets().await?,
        };
        *self.snapshot.write() = Some(snapshot.clone());
        Ok(snapshot)
    }
}

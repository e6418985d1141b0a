//! Filtered per-cell aggregation.
//!
//! The engine pulls matching records from its injected store, folds them
//! into per-cell accumulators, derives the cell metrics, and sorts and
//! truncates the result. There is exactly one fold path: backends push
//! down filtering, never grouping.

pub mod assembler;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use h3o::{CellIndex, Resolution};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::hexbin;
use crate::models::{
    location_signature, CellSummary, GlobalSummary, MapRequest, OrderRecord, RecordFilter,
};
use crate::store::RecordStore;

use assembler::FeatureCollection;

const DEFAULT_CELL_LIMIT: usize = 3000;
const DEFAULT_POINT_LIMIT: usize = 3000;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Per-cell running state for one aggregation run. Created on the first
/// record that lands in the cell, so an accumulator always has total > 0.
struct CellAccumulator {
    cell: CellIndex,
    total: u64,
    success: u64,
    failure: u64,
    sum_lat: f64,
    sum_lon: f64,
    locations: HashSet<(u64, u64)>,
    hour_buckets: BTreeSet<String>,
    carriers: BTreeSet<String>,
}

impl CellAccumulator {
    fn new(cell: CellIndex) -> Self {
        Self {
            cell,
            total: 0,
            success: 0,
            failure: 0,
            sum_lat: 0.0,
            sum_lon: 0.0,
            locations: HashSet::new(),
            hour_buckets: BTreeSet::new(),
            carriers: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, record: &OrderRecord) {
        self.total += 1;
        if record.outcome.is_success() {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.sum_lat += record.lat;
        self.sum_lon += record.lon;
        self.locations
            .insert(location_signature(record.lat, record.lon));
        if !self.hour_buckets.contains(&record.hour_bucket) {
            self.hour_buckets.insert(record.hour_bucket.clone());
        }
        if !self.carriers.contains(&record.carrier) {
            self.carriers.insert(record.carrier.clone());
        }
    }

    fn finish(self) -> CellSummary {
        let total = self.total as f64;
        CellSummary {
            cell: self.cell,
            total_orders: self.total,
            success_orders: self.success,
            fail_orders: self.failure,
            success_rate: round2(self.success as f64 / total * 100.0),
            center_lat: round6(self.sum_lat / total),
            center_lng: round6(self.sum_lon / total),
            unique_sources: self.locations.len() as u64,
            hour_buckets: self.hour_buckets.into_iter().collect(),
            carriers: self.carriers.into_iter().collect(),
        }
    }
}

/// The presentation-boundary response: hexagons plus filter-scoped stats.
#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub hexagons: FeatureCollection,
    pub stats: GlobalSummary,
}

/// Filtered per-cell aggregation over an injected record store.
///
/// Holds no mutable state: every request builds its own accumulator arena,
/// so concurrent requests never interfere.
pub struct AggregationEngine {
    store: Arc<dyn RecordStore>,
    cell_limit: usize,
    point_limit: usize,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cell_limit: DEFAULT_CELL_LIMIT,
            point_limit: DEFAULT_POINT_LIMIT,
        }
    }

    /// Override the default rendering budgets.
    pub fn with_limits(mut self, cell_limit: usize, point_limit: usize) -> Self {
        self.cell_limit = cell_limit;
        self.point_limit = point_limit;
        self
    }

    /// Group matching records into hexagonal cells and derive per-cell
    /// metrics, sorted by volume (ties broken by cell id) and truncated to
    /// the rendering budget.
    pub async fn aggregate_by_cell(
        &self,
        filter: &RecordFilter,
        resolution: Resolution,
        limit: Option<usize>,
    ) -> Result<Vec<CellSummary>, StoreError> {
        let records = self.store.query_records(filter).await?;

        let mut arena: Vec<CellAccumulator> = Vec::new();
        let mut slots: HashMap<CellIndex, usize> = HashMap::new();
        let mut unbinnable = 0u64;

        for record in &records {
            let cell = match hexbin::cell_for_point(record.lat, record.lon, resolution) {
                Ok(cell) => cell,
                Err(_) => {
                    unbinnable += 1;
                    continue;
                }
            };
            let slot = *slots.entry(cell).or_insert_with(|| {
                arena.push(CellAccumulator::new(cell));
                arena.len() - 1
            });
            arena[slot].absorb(record);
        }

        if unbinnable > 0 {
            warn!("dropped {} records that failed hex binning", unbinnable);
        }

        let mut summaries: Vec<CellSummary> =
            arena.into_iter().map(CellAccumulator::finish).collect();
        summaries.sort_by(|a, b| {
            b.total_orders
                .cmp(&a.total_orders)
                .then_with(|| a.cell.cmp(&b.cell))
        });
        summaries.truncate(limit.unwrap_or(self.cell_limit));

        debug!(
            "aggregated {} records into {} cells at {:?}",
            records.len(),
            summaries.len(),
            resolution
        );
        Ok(summaries)
    }

    /// Filter-scoped statistics over the whole record set, without cell
    /// grouping. Never divides by zero.
    pub async fn summarize(&self, filter: &RecordFilter) -> Result<GlobalSummary, StoreError> {
        let records = self.store.query_records(filter).await?;
        if records.is_empty() {
            return Ok(GlobalSummary::empty());
        }

        let mut successful = 0u64;
        let mut sources = HashSet::new();
        for record in &records {
            if record.outcome.is_success() {
                successful += 1;
            }
            sources.insert(location_signature(record.lat, record.lon));
        }

        let total = records.len() as u64;
        Ok(GlobalSummary {
            total_orders: total,
            successful_orders: successful,
            success_rate: round1(successful as f64 / total as f64 * 100.0),
            unique_sources: sources.len() as u64,
        })
    }

    /// Distinct pickup points matching the filter, for the supply-point
    /// map layer.
    pub async fn source_points(
        &self,
        filter: &RecordFilter,
        limit: Option<usize>,
    ) -> Result<Vec<(f64, f64)>, StoreError> {
        self.store
            .distinct_source_points(filter, limit.unwrap_or(self.point_limit))
            .await
    }

    /// Serve a full map request: hexagon FeatureCollection plus the
    /// filter-scoped global summary.
    pub async fn render(&self, request: &MapRequest) -> Result<MapView, StoreError> {
        let filter = request.filter();
        let summaries = self
            .aggregate_by_cell(&filter, request.resolution, request.limit)
            .await?;
        let hexagons = assembler::to_feature_collection(&summaries);
        let stats = self.summarize(&filter).await?;
        Ok(MapView { hexagons, stats })
    }
}

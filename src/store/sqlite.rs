//! SQLite-backed record store with filter pushdown.
//!
//! The filter compiles to an equality `WHERE` stage applied before anything
//! else, so the database only ships matching rows. Grouping stays in the
//! aggregation engine; this backend and the in-memory table must return the
//! same logical result set for the same data.
//!
//! Queries run on the blocking thread pool and are bounded by a
//! configurable timeout that surfaces as `StoreError::Timeout`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{OrderRecord, Outcome, RecordFilter, UNKNOWN_CARRIER};
use crate::store::RecordStore;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -16000;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    hour_bucket TEXT NOT NULL,
    carrier TEXT NOT NULL,
    outcome TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_orders_carrier ON orders(carrier);
CREATE INDEX IF NOT EXISTS idx_orders_hour ON orders(hour_bucket);
CREATE INDEX IF NOT EXISTS idx_orders_carrier_hour ON orders(carrier, hour_bucket);
"#;

/// Compile the shared filter into a `WHERE` fragment plus its parameters.
/// Values are bound, never interpolated.
fn filter_sql(filter: &RecordFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(carrier) = &filter.carrier {
        params.push(carrier.clone());
        clauses.push(format!("carrier = ?{}", params.len()));
    }
    if let Some(hour_bucket) = &filter.hour_bucket {
        params.push(hour_bucket.clone());
        clauses.push(format!("hour_bucket = ?{}", params.len()));
    }
    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Aggregation-capable record store on SQLite.
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    query_timeout: Duration,
}

impl SqliteRecordStore {
    pub fn new(db_path: &str, query_timeout: Duration) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags).map_err(|e| {
            StoreError::Unavailable(format!("failed to open database at {}: {}", db_path, e))
        })?;

        conn.execute_batch(SCHEMA_SQL)?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap_or(0);
        info!("order store ready at {} ({} records)", db_path, count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            query_timeout,
        })
    }

    /// Run a query on the blocking pool, bounded by the configured timeout.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut guard)
        });

        match tokio::time::timeout(self.query_timeout, task).await {
            Err(_) => Err(StoreError::Timeout(self.query_timeout)),
            Ok(Err(join_err)) => Err(StoreError::Unavailable(join_err.to_string())),
            Ok(Ok(result)) => result.map_err(StoreError::from),
        }
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    async fn query_records(&self, filter: &RecordFilter) -> Result<Vec<OrderRecord>, StoreError> {
        let (where_sql, bind) = filter_sql(filter);
        self.run(move |conn| {
            let sql = format!(
                "SELECT lat, lon, hour_bucket, carrier, outcome FROM orders{} ORDER BY id",
                where_sql
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
                let outcome: String = row.get(4)?;
                Ok(OrderRecord {
                    lat: row.get(0)?,
                    lon: row.get(1)?,
                    hour_bucket: row.get(2)?,
                    carrier: row.get(3)?,
                    outcome: Outcome::from_raw(&outcome),
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        let (where_sql, bind) = filter_sql(filter);
        self.run(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM orders{}", where_sql);
            let count: i64 =
                conn.query_row(&sql, params_from_iter(bind.iter()), |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn distinct_carriers(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT DISTINCT carrier FROM orders \
                 WHERE carrier <> '' AND carrier <> ?1 ORDER BY carrier",
            )?;
            let rows = stmt.query_map(params![UNKNOWN_CARRIER], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    async fn distinct_hour_buckets(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT DISTINCT hour_bucket FROM orders ORDER BY hour_bucket")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    async fn distinct_source_points(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<(f64, f64)>, StoreError> {
        let (where_sql, bind) = filter_sql(filter);
        self.run(move |conn| {
            let sql = format!(
                "SELECT DISTINCT lat, lon FROM orders{} LIMIT {}",
                where_sql, limit
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        self.run(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = 'revision'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
        })
        .await
    }

    async fn insert_batch(&self, records: Vec<OrderRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let inserted = records.len();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO orders (lat, lon, hour_bucket, carrier, outcome) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.lat,
                        record.lon,
                        record.hour_bucket,
                        record.carrier,
                        record.outcome.as_str(),
                    ])?;
                }
            }
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES ('revision', '1') \
                 ON CONFLICT(key) DO UPDATE SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)",
                [],
            )?;
            tx.commit()
        })
        .await?;
        debug!("inserted batch of {} records", inserted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (SqliteRecordStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteRecordStore::new(db_path, Duration::from_secs(5)).unwrap();
        (store, temp_file)
    }

    fn sample_records() -> Vec<OrderRecord> {
        vec![
            OrderRecord::new(12.90, 77.50, "07-08", "SwiftShip", Outcome::Success),
            OrderRecord::new(12.91, 77.51, "08-09", "Dash", Outcome::Failure),
            OrderRecord::new(12.92, 77.52, "07-08", UNKNOWN_CARRIER, Outcome::Success),
        ]
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let (store, _temp) = create_test_store();
        store.insert_batch(sample_records()).await.unwrap();

        let all = store.query_records(&RecordFilter::all()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].carrier, "SwiftShip");
        assert_eq!(all[0].outcome, Outcome::Success);
        assert_eq!(all[1].outcome, Outcome::Failure);
    }

    #[tokio::test]
    async fn test_filter_pushdown_matches_predicate_semantics() {
        let (store, _temp) = create_test_store();
        store.insert_batch(sample_records()).await.unwrap();

        let filter = RecordFilter::all().with_carrier("SwiftShip");
        let records = store.query_records(&filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|r| filter.matches(r)));

        let filter = RecordFilter::all()
            .with_carrier("SwiftShip")
            .with_hour_bucket("08-09");
        assert!(store.query_records(&filter).await.unwrap().is_empty());
        assert_eq!(store.count(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_database_yields_empty_results() {
        let (store, _temp) = create_test_store();
        assert!(store
            .query_records(&RecordFilter::all())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count(&RecordFilter::all()).await.unwrap(), 0);
        assert!(store.distinct_carriers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_distinct_values() {
        let (store, _temp) = create_test_store();
        store.insert_batch(sample_records()).await.unwrap();

        let carriers = store.distinct_carriers().await.unwrap();
        assert_eq!(carriers, vec!["Dash".to_string(), "SwiftShip".to_string()]);

        let buckets = store.distinct_hour_buckets().await.unwrap();
        assert_eq!(buckets, vec!["07-08".to_string(), "08-09".to_string()]);
    }

    #[tokio::test]
    async fn test_distinct_source_points_pushdown() {
        let (store, _temp) = create_test_store();
        let mut records = sample_records();
        records.push(OrderRecord::new(
            12.90,
            77.50,
            "09-10",
            "Dash",
            Outcome::Success,
        ));
        store.insert_batch(records).await.unwrap();

        let points = store
            .distinct_source_points(&RecordFilter::all(), 10)
            .await
            .unwrap();
        assert_eq!(points.len(), 3);

        let capped = store
            .distinct_source_points(&RecordFilter::all(), 1)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_revision_bumps_per_batch() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.revision().await.unwrap(), 0);

        store.insert_batch(sample_records()).await.unwrap();
        assert_eq!(store.revision().await.unwrap(), 1);

        store.insert_batch(sample_records()).await.unwrap();
        assert_eq!(store.revision().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unopenable_path_is_unavailable() {
        let err = SqliteRecordStore::new("/nonexistent-dir/deep/hexmap.db", Duration::from_secs(5))
            .err()
            .expect("open should fail");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}

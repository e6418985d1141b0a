//! Environment-backed configuration.

use std::time::Duration;

use h3o::Resolution;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// H3 resolution used when a request does not specify one (0-15).
    pub h3_resolution: u8,
    /// Rendering budget: maximum hexagons returned per request.
    pub hexagon_limit: usize,
    /// Maximum distinct source points returned per request.
    pub source_point_limit: usize,
    /// Upper bound on a single store query.
    pub query_timeout_ms: u64,
    /// Optional administrative-boundary overlay GeoJSON.
    pub overlay_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./hexmap.db".to_string(),
            h3_resolution: 8,
            hexagon_limit: 3000,
            source_point_limit: 3000,
            query_timeout_ms: 10_000,
            overlay_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();

        let database_path =
            std::env::var("HEXMAP_DB_PATH").unwrap_or(defaults.database_path);

        let h3_resolution = std::env::var("HEXMAP_H3_RESOLUTION")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&r| r <= 15)
            .unwrap_or(defaults.h3_resolution);

        let hexagon_limit = std::env::var("HEXMAP_HEXAGON_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.hexagon_limit);

        let source_point_limit = std::env::var("HEXMAP_SOURCE_POINT_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.source_point_limit);

        let query_timeout_ms = std::env::var("HEXMAP_QUERY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&ms| ms > 0)
            .unwrap_or(defaults.query_timeout_ms);

        let overlay_path = std::env::var("HEXMAP_OVERLAY_PATH").ok();

        Self {
            database_path,
            h3_resolution,
            hexagon_limit,
            source_point_limit,
            query_timeout_ms,
            overlay_path,
        }
    }

    /// Default resolution as the grid library's type. The field is validated
    /// on load, so the fallback only covers hand-built configs.
    pub fn resolution(&self) -> Resolution {
        Resolution::try_from(self.h3_resolution).unwrap_or(Resolution::Eight)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

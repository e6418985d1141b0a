//! Static boundary-overlay loading.
//!
//! Administrative boundary polygons for map context. The content is opaque
//! to the aggregation core and is passed through unmodified; a missing
//! file is a logged non-event.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::info;

/// Load an overlay GeoJSON file, if present.
pub fn load_overlay(path: &Path) -> anyhow::Result<Option<Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("overlay file {} not found, skipping", path.display());
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid overlay GeoJSON in {}", path.display()))?;

    let boundaries = value
        .get("features")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    info!(
        "loaded {} overlay boundaries from {}",
        boundaries,
        path.display()
    );
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_is_none() {
        let result = load_overlay(Path::new("/nonexistent/boundaries.geojson")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_loads_and_passes_through() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature"}}]}}"#
        )
        .unwrap();

        let value = load_overlay(file.path()).unwrap().unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_overlay(file.path()).is_err());
    }
}

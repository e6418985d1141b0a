//! GeoJSON assembly for cell summaries.
//!
//! Attaches hexagon polygon geometry to each summary and formats the
//! display properties. A cell whose boundary cannot be resolved is dropped
//! from the collection; assembly itself never fails.

use serde::Serialize;
use tracing::warn;

use crate::hexbin;
use crate::models::{display_carrier, CellSummary};

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: "FeatureCollection",
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Geometry,
    pub properties: CellProperties,
}

/// Polygon geometry: one ring of (lon, lat) vertices.
#[derive(Debug, Clone, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellProperties {
    pub h3_index: String,
    pub total_orders: u64,
    pub success_orders: u64,
    pub fail_orders: u64,
    pub success_rate: f64,
    pub center_lat: f64,
    pub center_lng: f64,
    pub unique_sources: u64,
    /// Comma-joined sorted hour buckets observed in the cell.
    pub hour_buckets: String,
    /// Comma-joined carriers in display form.
    pub carriers: String,
}

/// Build the FeatureCollection for a set of cell summaries.
pub fn to_feature_collection(summaries: &[CellSummary]) -> FeatureCollection {
    let mut features = Vec::with_capacity(summaries.len());

    for summary in summaries {
        let ring = hexbin::boundary_lonlat(summary.cell);
        if ring.len() < 3 {
            warn!("dropping cell {} with degenerate boundary", summary.cell);
            continue;
        }

        let carriers = summary
            .carriers
            .iter()
            .map(|c| display_carrier(c))
            .collect::<Vec<_>>()
            .join(",");

        features.push(Feature {
            kind: "Feature",
            geometry: Geometry {
                kind: "Polygon",
                coordinates: vec![ring],
            },
            properties: CellProperties {
                h3_index: summary.cell.to_string(),
                total_orders: summary.total_orders,
                success_orders: summary.success_orders,
                fail_orders: summary.fail_orders,
                success_rate: summary.success_rate,
                center_lat: summary.center_lat,
                center_lng: summary.center_lng,
                unique_sources: summary.unique_sources,
                hour_buckets: summary.hour_buckets.join(","),
                carriers,
            },
        });
    }

    FeatureCollection {
        kind: "FeatureCollection",
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h3o::Resolution;

    fn summary_at(lat: f64, lon: f64) -> CellSummary {
        let cell = hexbin::cell_for_point(lat, lon, Resolution::Eight).unwrap();
        CellSummary {
            cell,
            total_orders: 3,
            success_orders: 2,
            fail_orders: 1,
            success_rate: 66.67,
            center_lat: lat,
            center_lng: lon,
            unique_sources: 2,
            hour_buckets: vec!["07-08".to_string(), "08-09".to_string()],
            carriers: vec!["ondc/SwiftShip".to_string(), "Dash".to_string()],
        }
    }

    #[test]
    fn test_feature_structure() {
        let collection = to_feature_collection(&[summary_at(12.9716, 77.5946)]);
        assert_eq!(collection.kind, "FeatureCollection");
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        assert_eq!(feature.kind, "Feature");
        assert_eq!(feature.geometry.kind, "Polygon");
        assert_eq!(feature.geometry.coordinates.len(), 1);
        assert!(feature.geometry.coordinates[0].len() >= 5);

        let props = &feature.properties;
        assert_eq!(props.total_orders, 3);
        assert_eq!(props.hour_buckets, "07-08,08-09");
        // Display form strips the path-like prefix.
        assert_eq!(props.carriers, "SwiftShip,Dash");
    }

    #[test]
    fn test_vertices_are_lon_lat_ordered() {
        let collection = to_feature_collection(&[summary_at(12.9716, 77.5946)]);
        let ring = &collection.features[0].geometry.coordinates[0];
        for [lng, lat] in ring {
            // Bengaluru: lon ~77.6 (out of latitude range), lat ~13.0.
            assert!((lng - 77.5946).abs() < 0.1);
            assert!((lat - 12.9716).abs() < 0.1);
        }
    }

    #[test]
    fn test_empty_input_yields_empty_collection() {
        let collection = to_feature_collection(&[]);
        assert_eq!(collection.kind, "FeatureCollection");
        assert!(collection.features.is_empty());
    }

    #[test]
    fn test_serializes_to_geojson_shape() {
        let collection = to_feature_collection(&[summary_at(12.9716, 77.5946)]);
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
        assert!(value["features"][0]["properties"]["h3_index"]
            .as_str()
            .unwrap()
            .len()
            > 10);
    }
}

//! Glue over the `h3o` hexagonal grid library.
//!
//! The grid math itself is opaque to this crate; these helpers pin down the
//! three operations the aggregation path needs and translate `h3o`'s
//! rejections into a local error the callers can skip on.

use h3o::{CellIndex, LatLng, Resolution};
use thiserror::Error;

/// A coordinate the grid library refused to index. Callers drop the
/// offending record and keep going; this never aborts an aggregation run.
#[derive(Debug, Error)]
pub enum BinError {
    #[error("coordinate rejected by hex grid: lat={lat} lon={lon}")]
    BadCoordinate { lat: f64, lon: f64 },
}

/// Resolve the hexagonal cell containing a point at the given resolution.
/// Deterministic and pure.
pub fn cell_for_point(lat: f64, lon: f64, resolution: Resolution) -> Result<CellIndex, BinError> {
    let point = LatLng::new(lat, lon).map_err(|_| BinError::BadCoordinate { lat, lon })?;
    Ok(point.to_cell(resolution))
}

/// Hexagon boundary vertices in GeoJSON axis order (lon, lat), traversal
/// order as returned by the grid library.
pub fn boundary_lonlat(cell: CellIndex) -> Vec<[f64; 2]> {
    cell.boundary()
        .iter()
        .map(|vertex| [vertex.lng(), vertex.lat()])
        .collect()
}

/// Cell center as (lat, lon) degrees.
pub fn cell_center(cell: CellIndex) -> (f64, f64) {
    let center = LatLng::from(cell);
    (center.lat(), center.lng())
}

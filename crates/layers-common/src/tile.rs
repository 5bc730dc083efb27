//! Tile grids and level-of-detail math.
//!
//! The 2D engine tiles every layer on a WMTS-style grid anchored at the
//! top-left corner of the LV95 extent; the 3D engine works with levels of a
//! geographic tiling scheme instead.

use serde::{Deserialize, Serialize};

use crate::{Extent, LayerKind};

/// Default resolution ladder of the LV95 (EPSG:2056) tile matrix set, in
/// meters per pixel.
pub const LV95_RESOLUTIONS: [f64; 29] = [
    4000.0, 3750.0, 3500.0, 3250.0, 3000.0, 2750.0, 2500.0, 2250.0, 2000.0, 1750.0, 1500.0,
    1250.0, 1000.0, 750.0, 650.0, 500.0, 250.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.5, 2.0, 1.5, 1.0,
    0.5, 0.25, 0.1,
];

/// Top-left corner of the LV95 tile matrix set.
pub const LV95_ORIGIN: (f64, f64) = (2_420_000.0, 1_350_000.0);

/// Meters per pixel at level 0 of a geographic tiling scheme: two 256 px
/// tiles spanning 360 degrees at the equator.
const GEOGRAPHIC_LEVEL0_RESOLUTION: f64 = 360.0 / 512.0 * 111_319.490_793_273_57;

/// A WMTS-style tile grid for the 2D engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Top-left corner coordinates
    pub origin: (f64, f64),

    /// Resolutions (units per pixel), coarsest first
    pub resolutions: Vec<f64>,

    /// Matrix identifiers, one per resolution
    pub matrix_ids: Vec<String>,

    /// Tile width and height in pixels
    pub tile_size: u32,
}

impl TileGrid {
    /// Build the grid for a layer.
    ///
    /// Falls back to the LV95 ladder when the layer declares no resolutions
    /// and drops every level finer than `min_resolution`. WMS layers use
    /// 512 px tiles, everything else 256 px.
    pub fn for_layer(resolutions: Option<&[f64]>, min_resolution: Option<f64>, kind: LayerKind) -> Self {
        let ladder = resolutions.unwrap_or(&LV95_RESOLUTIONS);
        let resolutions: Vec<f64> = match min_resolution {
            Some(min) => ladder.iter().copied().filter(|r| *r >= min).collect(),
            None => ladder.to_vec(),
        };
        let matrix_ids = (0..resolutions.len()).map(|z| z.to_string()).collect();

        Self {
            origin: LV95_ORIGIN,
            resolutions,
            matrix_ids,
            tile_size: if kind == LayerKind::Wms { 512 } else { 256 },
        }
    }

    /// Number of zoom levels.
    pub fn levels(&self) -> usize {
        self.resolutions.len()
    }

    /// Extent covered by one tile.
    pub fn tile_extent(&self, z: usize, col: u32, row: u32) -> Option<Extent> {
        let res = *self.resolutions.get(z)?;
        let span = res * self.tile_size as f64;
        let min_x = self.origin.0 + col as f64 * span;
        let max_y = self.origin.1 - row as f64 * span;
        Some(Extent::new(min_x, max_y - span, min_x + span, max_y))
    }
}

/// Level of detail of the geographic tiling scheme closest to a resolution.
///
/// Returns `None` for missing or non-positive resolutions so callers can
/// fall back to their defaults.
pub fn lod_from_resolution(resolution: Option<f64>) -> Option<u32> {
    let res = resolution?;
    if !res.is_finite() || res <= 0.0 {
        return None;
    }
    let level = (GEOGRAPHIC_LEVEL0_RESOLUTION / res).log2().round();
    Some(level.max(0.0) as u32)
}

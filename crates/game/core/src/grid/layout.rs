use serde::{Deserialize, Serialize};

use crate::hex::HexCoordinate;

/// Width of one hex cell in pixels.
pub const CELL_WIDTH: f64 = 100.0;
/// Horizontal shift applied to odd rows.
pub const ROW_OFFSET: f64 = 50.0;
/// Vertical pitch between rows as a fraction of the cell width.
pub const ROW_HEIGHT_RATIO: f64 = 0.75;
/// Padding around the whole map.
pub const MAP_PADDING: f64 = 20.0;

/// Grid size in cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapDimensions {
    pub width: u32,
    pub height: u32,
}

impl MapDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn contains(&self, coord: HexCoordinate) -> bool {
        coord.x() >= 0
            && coord.y() >= 0
            && (coord.x() as u32) < self.width
            && (coord.y() as u32) < self.height
    }

    pub const fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A point or translation in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// CSS-style translate for layers pinned to this offset.
    pub fn translate(&self) -> String {
        format!("translate({}px, {}px)", self.x, self.y)
    }
}

/// A width/height pair in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pixel geometry of the staggered hex grid.
///
/// Deployment and battlefield both place cells and units through the same
/// instance so identical coordinates land on identical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub cell_width: f64,
    pub row_offset: f64,
    pub row_height_ratio: f64,
    pub padding: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            cell_width: CELL_WIDTH,
            row_offset: ROW_OFFSET,
            row_height_ratio: ROW_HEIGHT_RATIO,
            padding: MAP_PADDING,
        }
    }
}

impl GridLayout {
    pub fn row_pitch(&self) -> f64 {
        self.cell_width * self.row_height_ratio
    }

    /// Pixel origin of a cell, relative to the padded map content box.
    pub fn hex_to_pixel(&self, coord: HexCoordinate) -> Pixel {
        let row_shift = if coord.y().rem_euclid(2) == 0 {
            0.0
        } else {
            self.row_offset
        };
        Pixel::new(
            f64::from(coord.x()) * self.cell_width + row_shift,
            f64::from(coord.y()) * self.row_pitch(),
        )
    }

    /// Total pixel extent of a map of `dimensions` cells.
    pub fn map_extent(&self, dimensions: MapDimensions) -> Extent {
        Extent::new(
            f64::from(dimensions.width) * self.cell_width + self.row_offset + self.padding * 2.0,
            f64::from(dimensions.height) * self.row_pitch() + self.padding * 2.0,
        )
    }
}

//! Map documents: terrain grid, optional background and deployable cells.
//!
//! In memory `terrain[y][x]` has row 0 at the top, matching pixel layout.
//! Saved files store rows bottom-up. The flip happens only in the serde
//! conversion through [`MapFile`], so save-then-load is the identity.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::deployment::DeployableCell;
use crate::error::{ErrorSeverity, GameError};
use crate::grid::MapDimensions;
use crate::hex::HexCoordinate;

/// Canonical terrain classes.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TerrainKind {
    #[default]
    Plain,
    Mountain,
    Forest,
    Sea,
    River,
    Cliff,
    Road,
    Wasteland,
    Ruins,
    Swamp,
}

impl TerrainKind {
    /// Whether a unit may stand on this terrain.
    pub fn is_passable(self) -> bool {
        !matches!(self, Self::Sea | Self::Cliff)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("map declares height {expected} but has {actual} terrain rows")]
    RowCount { expected: u32, actual: usize },

    #[error("terrain row {row} has {actual} cells, expected width {expected}")]
    RowWidth {
        row: usize,
        expected: u32,
        actual: usize,
    },

    #[error("deployable cell ({x}, {y}) lies outside the {width}x{height} map")]
    CellOutOfBounds { x: i32, y: i32, width: u32, height: u32 },
}

impl GameError for MapError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::RowCount { .. } => "MAP_ROW_COUNT",
            Self::RowWidth { .. } => "MAP_ROW_WIDTH",
            Self::CellOutOfBounds { .. } => "MAP_CELL_OUT_OF_BOUNDS",
        }
    }
}

/// A validated map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MapFile", into = "MapFile")]
pub struct MapDocument {
    dimensions: MapDimensions,
    terrain: Vec<Vec<TerrainKind>>,
    background: Option<String>,
    deployable_cells: Vec<DeployableCell>,
}

impl MapDocument {
    /// Builds a map from top-down rows.
    pub fn new(
        width: u32,
        height: u32,
        terrain: Vec<Vec<TerrainKind>>,
    ) -> Result<Self, MapError> {
        let map = Self {
            dimensions: MapDimensions::new(width, height),
            terrain,
            background: None,
            deployable_cells: Vec::new(),
        };
        map.validate()?;
        Ok(map)
    }

    /// A map filled with one terrain.
    pub fn filled(width: u32, height: u32, kind: TerrainKind) -> Self {
        Self {
            dimensions: MapDimensions::new(width, height),
            terrain: vec![vec![kind; width as usize]; height as usize],
            background: None,
            deployable_cells: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    pub fn with_deployable_cells(mut self, cells: Vec<DeployableCell>) -> Result<Self, MapError> {
        self.deployable_cells = cells;
        self.validate()?;
        Ok(self)
    }

    pub fn dimensions(&self) -> MapDimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Rows top-down.
    pub fn terrain(&self) -> &[Vec<TerrainKind>] {
        &self.terrain
    }

    pub fn terrain_at(&self, coord: HexCoordinate) -> Option<TerrainKind> {
        if !self.dimensions.contains(coord) {
            return None;
        }
        self.terrain
            .get(coord.y() as usize)?
            .get(coord.x() as usize)
            .copied()
    }

    /// Paints one cell. Returns `false` outside the map.
    pub fn set_terrain(&mut self, coord: HexCoordinate, kind: TerrainKind) -> bool {
        if !self.dimensions.contains(coord) {
            return false;
        }
        match self
            .terrain
            .get_mut(coord.y() as usize)
            .and_then(|row| row.get_mut(coord.x() as usize))
        {
            Some(cell) => {
                *cell = kind;
                true
            }
            None => false,
        }
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn deployable_cells(&self) -> &[DeployableCell] {
        &self.deployable_cells
    }

    pub fn is_deployable(&self, coord: HexCoordinate) -> bool {
        self.deployable_cells
            .iter()
            .any(|cell| cell.coordinate() == coord)
    }

    fn validate(&self) -> Result<(), MapError> {
        let MapDimensions { width, height } = self.dimensions;
        if self.terrain.len() != height as usize {
            return Err(MapError::RowCount {
                expected: height,
                actual: self.terrain.len(),
            });
        }
        for (row, cells) in self.terrain.iter().enumerate() {
            if cells.len() != width as usize {
                return Err(MapError::RowWidth {
                    row,
                    expected: width,
                    actual: cells.len(),
                });
            }
        }
        if let Some(cell) = self
            .deployable_cells
            .iter()
            .find(|cell| !self.dimensions.contains(cell.coordinate()))
        {
            return Err(MapError::CellOutOfBounds {
                x: cell.x,
                y: cell.y,
                width,
                height,
            });
        }
        Ok(())
    }
}

/// On-disk layout of a map document; terrain rows run bottom-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFile {
    pub width: u32,
    pub height: u32,
    pub terrain: Vec<Vec<TerrainKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployable_cells: Vec<DeployableCell>,
}

impl TryFrom<MapFile> for MapDocument {
    type Error = MapError;

    fn try_from(file: MapFile) -> Result<Self, Self::Error> {
        let mut terrain = file.terrain;
        terrain.reverse();
        let map = Self {
            dimensions: MapDimensions::new(file.width, file.height),
            terrain,
            background: file.background,
            deployable_cells: file.deployable_cells,
        };
        map.validate()?;
        Ok(map)
    }
}

impl From<MapDocument> for MapFile {
    fn from(map: MapDocument) -> Self {
        let mut terrain = map.terrain;
        terrain.reverse();
        Self {
            width: map.dimensions.width,
            height: map.dimensions.height,
            terrain,
            background: map.background,
            deployable_cells: map.deployable_cells,
        }
    }
}

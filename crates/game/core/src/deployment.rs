//! Deployment roster and its hand-off to the battlefield.
//!
//! The deployment phase places units on a [`DeploymentBoard`] and commits a
//! [`DeploymentRecord`] under `deployment_<stageId>`. The battlefield phase
//! reads that record exactly once: [`load_deployment`] removes it from the
//! store so a later visit never sees a stale roster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorSeverity, GameError};
use crate::grid::{GridLayout, MapDimensions, Pixel};
use crate::hex::{GridPoint, HexCoordinate};
use crate::map::{MapDocument, TerrainKind};
use crate::store::{KeyValueStore, StoreError};

/// Prefix of the stage-scoped storage key.
pub const DEPLOYMENT_KEY_PREFIX: &str = "deployment_";

pub fn deployment_key(stage_id: &str) -> String {
    format!("{DEPLOYMENT_KEY_PREFIX}{stage_id}")
}

/// A playable unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub name: String,
    pub sprite: String,
}

impl Unit {
    pub fn new(id: u32, name: impl Into<String>, sprite: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sprite: sprite.into(),
        }
    }
}

/// The fixed roster offered on the deployment screen.
pub fn playable_roster() -> Vec<Unit> {
    ["archer", "healer", "mage", "rogue", "warrior"]
        .into_iter()
        .zip(1..)
        .map(|(sprite, id)| Unit::new(id, format!("Test Unit {id}"), sprite))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployableCell {
    pub x: i32,
    pub y: i32,
    pub index: u32,
}

impl DeployableCell {
    pub const fn new(x: i32, y: i32, index: u32) -> Self {
        Self { x, y, index }
    }

    pub const fn coordinate(&self) -> HexCoordinate {
        HexCoordinate::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedUnit {
    #[serde(flatten)]
    pub unit: Unit,
    pub position: GridPoint,
}

impl DeployedUnit {
    pub fn coordinate(&self) -> HexCoordinate {
        self.position.into()
    }
}

/// Persisted hand-off between deployment and battlefield.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub stage_id: String,
    #[serde(default)]
    pub deployable_cells: Vec<DeployableCell>,
    #[serde(default)]
    pub deployed_units: Vec<DeployedUnit>,
}

impl DeploymentRecord {
    /// Record with no units, used when nothing was committed.
    pub fn empty(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            deployable_cells: Vec::new(),
            deployed_units: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deployed_units.is_empty()
    }

    pub fn unit_at(&self, coord: HexCoordinate) -> Option<&DeployedUnit> {
        self.deployed_units
            .iter()
            .find(|deployed| deployed.coordinate() == coord)
    }

    /// Pixel placement of every unit through the shared grid layout.
    pub fn placements(&self, layout: &GridLayout) -> Vec<(&DeployedUnit, Pixel)> {
        self.deployed_units
            .iter()
            .map(|deployed| (deployed, layout.hex_to_pixel(deployed.coordinate())))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentError {
    #[error("cell ({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },

    #[error("cell ({x}, {y}) is not a deployable cell")]
    NotDeployable { x: i32, y: i32 },

    #[error("cell ({x}, {y}) is {terrain} and cannot hold a unit")]
    Impassable { x: i32, y: i32, terrain: TerrainKind },

    #[error("cell ({x}, {y}) is already occupied by unit {occupant}")]
    CellOccupied { x: i32, y: i32, occupant: u32 },

    #[error("unit {unit} is already deployed")]
    AlreadyDeployed { unit: u32 },

    #[error("deployment record for stage '{stage_id}' could not be encoded: {message}")]
    Encode { stage_id: String, message: String },

    #[error("deployment record for stage '{stage_id}' is corrupt: {message}")]
    Decode { stage_id: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError for DeploymentError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CellOccupied { .. } | Self::AlreadyDeployed { .. } => ErrorSeverity::Recoverable,
            Self::OutOfBounds { .. } | Self::NotDeployable { .. } | Self::Impassable { .. } => {
                ErrorSeverity::Validation
            }
            Self::Decode { .. } => ErrorSeverity::Validation,
            Self::Encode { .. } => ErrorSeverity::Internal,
            Self::Store(err) => err.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfBounds { .. } => "DEPLOY_OUT_OF_BOUNDS",
            Self::NotDeployable { .. } => "DEPLOY_NOT_DEPLOYABLE",
            Self::Impassable { .. } => "DEPLOY_IMPASSABLE",
            Self::CellOccupied { .. } => "DEPLOY_CELL_OCCUPIED",
            Self::AlreadyDeployed { .. } => "DEPLOY_ALREADY_DEPLOYED",
            Self::Encode { .. } => "DEPLOY_ENCODE",
            Self::Decode { .. } => "DEPLOY_DECODE",
            Self::Store(err) => err.error_code(),
        }
    }
}

/// Placement state of the deployment screen.
///
/// A unit occupies at most one cell and a cell holds at most one unit. When
/// the map lists deployable cells, only those accept units.
#[derive(Clone, Debug)]
pub struct DeploymentBoard {
    stage_id: String,
    dimensions: MapDimensions,
    deployable_cells: Vec<DeployableCell>,
    terrain: Vec<Vec<TerrainKind>>,
    placements: BTreeMap<HexCoordinate, Unit>,
}

impl DeploymentBoard {
    pub fn new(stage_id: impl Into<String>, map: &MapDocument) -> Self {
        Self {
            stage_id: stage_id.into(),
            dimensions: map.dimensions(),
            deployable_cells: map.deployable_cells().to_vec(),
            terrain: map.terrain().to_vec(),
            placements: BTreeMap::new(),
        }
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub fn deployable_cells(&self) -> &[DeployableCell] {
        &self.deployable_cells
    }

    pub fn place(&mut self, unit: Unit, coord: HexCoordinate) -> Result<(), DeploymentError> {
        let (x, y) = (coord.x(), coord.y());
        if !self.dimensions.contains(coord) {
            return Err(DeploymentError::OutOfBounds { x, y });
        }
        if !self.deployable_cells.is_empty()
            && !self
                .deployable_cells
                .iter()
                .any(|cell| cell.coordinate() == coord)
        {
            return Err(DeploymentError::NotDeployable { x, y });
        }
        if let Some(terrain) = self.terrain_at(coord).filter(|kind| !kind.is_passable()) {
            return Err(DeploymentError::Impassable { x, y, terrain });
        }
        if let Some(occupant) = self.placements.get(&coord) {
            return Err(DeploymentError::CellOccupied {
                x,
                y,
                occupant: occupant.id,
            });
        }
        if self.is_deployed(unit.id) {
            return Err(DeploymentError::AlreadyDeployed { unit: unit.id });
        }

        self.placements.insert(coord, unit);
        Ok(())
    }

    pub fn remove(&mut self, coord: HexCoordinate) -> Option<Unit> {
        self.placements.remove(&coord)
    }

    pub fn clear(&mut self) {
        self.placements.clear();
    }

    pub fn unit_at(&self, coord: HexCoordinate) -> Option<&Unit> {
        self.placements.get(&coord)
    }

    pub fn is_deployed(&self, unit_id: u32) -> bool {
        self.placements.values().any(|unit| unit.id == unit_id)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn record(&self) -> DeploymentRecord {
        DeploymentRecord {
            stage_id: self.stage_id.clone(),
            deployable_cells: self.deployable_cells.clone(),
            deployed_units: self
                .placements
                .iter()
                .map(|(coord, unit)| DeployedUnit {
                    unit: unit.clone(),
                    position: (*coord).into(),
                })
                .collect(),
        }
    }

    fn terrain_at(&self, coord: HexCoordinate) -> Option<TerrainKind> {
        self.terrain
            .get(usize::try_from(coord.y()).ok()?)?
            .get(usize::try_from(coord.x()).ok()?)
            .copied()
    }
}

/// Writes `record` under its stage-scoped key, replacing any earlier one.
pub fn commit_deployment(
    store: &dyn KeyValueStore,
    record: &DeploymentRecord,
) -> Result<(), DeploymentError> {
    let encoded = serde_json::to_string(record).map_err(|err| DeploymentError::Encode {
        stage_id: record.stage_id.clone(),
        message: err.to_string(),
    })?;
    store.set(&deployment_key(&record.stage_id), &encoded)?;
    Ok(())
}

/// Reads and removes the record for `stage_id`.
///
/// An absent record yields an empty roster. A corrupt record is removed as
/// well and reported.
pub fn load_deployment(
    store: &dyn KeyValueStore,
    stage_id: &str,
) -> Result<DeploymentRecord, DeploymentError> {
    let Some(encoded) = store.take(&deployment_key(stage_id))? else {
        return Ok(DeploymentRecord::empty(stage_id));
    };

    serde_json::from_str(&encoded).map_err(|err| DeploymentError::Decode {
        stage_id: stage_id.to_owned(),
        message: err.to_string(),
    })
}

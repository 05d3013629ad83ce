//! Event payloads published on the bus.

use std::collections::BTreeMap;

use game_core::{HexCoordinate, Pixel, Scene, Unit};

/// Theater-level notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Visibility or a resource binding changed; carries the new state.
    Changed {
        visible: Vec<Scene>,
        resources: BTreeMap<Scene, String>,
    },
    /// A lifecycle event without scene semantics of its own.
    Lifecycle(LifecycleEvent),
    /// A queued command was dropped (failed gate, unknown tag, load error).
    CommandSkipped { command: String, reason: String },
    /// A town resource finished loading.
    TownLoaded {
        resource: String,
        town_name: Option<String>,
        background: Option<String>,
        enabled_locations: Vec<String>,
    },
    /// A battlefield or rogue resource finished loading.
    Rendered { scene: Scene, resource: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    GameStarted,
    LoadRequested,
    SettingsRequested,
    ExitRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentEvent {
    /// Fired once per deployment commit.
    UnitsDeployed { stage_id: String, units: usize },
    /// The battlefield consumed the deployment record.
    BattlefieldReady {
        stage_id: String,
        units: Vec<PlacedUnit>,
    },
}

/// A unit positioned on the battlefield grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedUnit {
    pub unit: Unit,
    pub coordinate: HexCoordinate,
    pub pixel: Pixel,
}

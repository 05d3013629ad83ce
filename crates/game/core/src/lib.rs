//! Deterministic scene, dialog and hex-grid logic shared across clients.
//!
//! `game-core` defines the canonical rules (script execution, scene state,
//! condition evaluation, hex geometry, deployment hand-off) as pure APIs.
//! Nothing here performs I/O: documents arrive already fetched, persistent
//! variables go through the [`KeyValueStore`] capability, and anything worth
//! logging is returned as data for the runtime to record.
pub mod condition;
pub mod deployment;
pub mod error;
pub mod grid;
pub mod hex;
pub mod map;
pub mod scene;
pub mod script;
pub mod stage;
pub mod store;
pub mod town;

pub use condition::{ComparisonOp, Condition, ConditionError, Verdict};
pub use deployment::{
    DeployableCell, DeployedUnit, DeploymentBoard, DeploymentError, DeploymentRecord, Unit,
    commit_deployment, deployment_key, load_deployment, playable_roster,
};
pub use error::{ErrorSeverity, GameError};
pub use grid::{Extent, GridLayout, MapDimensions, Pixel, ScrollDirection, Viewport};
pub use hex::{GridPoint, HexCoordinate, HexDirection};
pub use map::{MapDocument, MapError, TerrainKind};
pub use scene::{
    InitDocument, QueuedCommand, Scene, SceneCommand, SceneDocument, SceneState, ScriptModule,
    TheaterEvent,
};
pub use script::{
    DialogHistory, EngineOutput, EngineState, FinishOutcome, ScriptDocument, ScriptEngine,
    ScriptError,
};
pub use stage::{StageDocument, StageEvent, StagePhase, StageProgress, StageTrigger};
pub use store::{InMemoryStore, KeyValueStore, StorageAction, StoreError, StoreResult, ValueType};
pub use town::{EnableAt, TownDocument, TownLocation};

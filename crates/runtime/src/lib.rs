//! Runtime orchestration for scenes, dialogs and stages.
//!
//! This crate wires together content access, key/value repositories, the
//! event bus and worker tasks into a cohesive runtime API. Consumers embed
//! [`Theater`] to start a game, dispatch scene commands, feed dialog input
//! and subscribe to events through [`TheaterHandle`] and [`DialogHandle`].
//!
//! Modules are organized by responsibility:
//! - [`theater`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`content`] and [`repository`] provide data adapters
//! - [`stage`] and [`viewport`] cover the deployment hand-off and map scrolling
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod config;
pub mod content;
pub mod events;
pub mod repository;
pub mod stage;
pub mod theater;
pub mod viewport;

mod workers;

pub use api::{
    ContentError, DialogHandle, DialogSnapshot, RepositoryError, Result, RuntimeError,
    TheaterHandle, TheaterSnapshot,
};
pub use config::RuntimeConfig;
pub use content::{ContentLibrary, ContentStore, FileContentStore, InMemoryContentStore};
pub use events::{
    DeploymentEvent, Event, EventBus, LifecycleEvent, PlacedUnit, SceneEvent, Topic,
};
pub use repository::{FileKeyValueStore, InMemoryStore, KeyValueStore};
pub use stage::StageSession;
pub use theater::{Theater, TheaterBuilder};
pub use viewport::ScrollDriver;
pub use workers::MAX_MODULE_DEPTH;

//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, repositories, content fetches and
//! stage bookkeeping so clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use game_core::{DeploymentError, StagePhase};

pub use crate::content::ContentError;
pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("theater worker command channel closed")]
    CommandChannelClosed,

    #[error("dialog worker command channel closed")]
    DialogChannelClosed,

    #[error("worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Content(#[from] ContentError),

    /// A document was fetched but could not be decoded.
    #[error("failed to load {path}: {message}")]
    Load { path: String, message: String },

    #[error("script module '{script}' has no entry point '{entry_point}'")]
    MissingEntryPoint { script: String, entry_point: String },

    #[error("script module '{script}' nested deeper than {limit} levels")]
    ModuleDepthExceeded { script: String, limit: usize },

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error("stage '{stage_id}' is in the {phase} phase")]
    WrongStagePhase { stage_id: String, phase: StagePhase },
}

//! Dialog scripts: document model, variable interpolation, the execution
//! state machine and the per-session history log.

pub mod document;
pub mod engine;
pub mod history;
pub mod interpolate;

pub use document::{
    CharacterPosition, CommandKind, ConsoleLevel, EventCommand, FinishEvent, InputType,
    RequestInput, RequestSelection, ScriptDocument, ScriptEvent, SelectionOption, ShowCharacter,
    ShowMessage, ShowOption, UnrecognizedReason,
};
pub use engine::{
    Blocker, Diagnostic, EngineOutput, EngineState, FinishOutcome, InjectionToken, LoadTicket,
    MAX_INJECTION_DEPTH, MessageView, OptionView, Presentation, ScriptEngine, SkipReason,
    WaitToken,
};
pub use history::{DialogHistory, HistoryEntry};
pub use interpolate::{interpolate, resolve_next_script};

use crate::error::{ErrorSeverity, GameError};

/// Errors raised while obtaining a script document.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("script document could not be parsed: {0}")]
    Parse(String),

    #[error("script '{script_id}' could not be fetched: {message}")]
    Fetch { script_id: String, message: String },
}

impl GameError for ScriptError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Parse(_) => ErrorSeverity::Validation,
            Self::Fetch { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "SCRIPT_PARSE",
            Self::Fetch { .. } => "SCRIPT_FETCH",
        }
    }
}

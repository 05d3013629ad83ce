//! Worker tasks that back the runtime orchestration.
//!
//! The theater worker owns scene state and the command queue. The dialog
//! worker owns the script engine and performs its waits and fetches.

mod dialog;
mod theater;

pub use dialog::{DialogCommand, DialogWorker};
pub use theater::{Command as TheaterCommand, MAX_MODULE_DEPTH, TheaterWorker};

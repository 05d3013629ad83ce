//! Repository layer for data that changes during play.
//!
//! Progress variables, selection results and the deployment hand-off all
//! live in a [`KeyValueStore`]. Authored content is read through the content
//! store instead and never written here.

mod error;
mod key_value;

pub use error::RepositoryError;
pub use game_core::{InMemoryStore, KeyValueStore};
pub use key_value::FileKeyValueStore;

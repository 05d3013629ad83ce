//! Loaders that decode JSON content into `game-core` documents.

pub mod documents;
pub mod map;

pub use documents::{
    parse_init, parse_map, parse_scene_document, parse_script, parse_script_module, parse_stage,
    parse_town,
};
pub use map::MapLoader;

use std::path::Path;

use serde::de::DeserializeOwned;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}

/// Decodes one JSON document, naming its kind in the error.
pub(crate) fn parse_json<T: DeserializeOwned>(kind: &str, text: &str) -> LoadResult<T> {
    serde_json::from_str(text).map_err(|e| anyhow::anyhow!("Failed to parse {} JSON: {}", kind, e))
}

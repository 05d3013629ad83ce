//! Map document loader.
//!
//! Maps are the one kind of content written back to disk, by the map editor.
//! Files keep terrain rows bottom-up; [`MapDocument`] handles the flip, so
//! `save` followed by `load` returns the same document.

use std::path::Path;

use game_core::{MapDocument, TerrainKind};

use crate::loaders::{LoadResult, parse_json, read_file};

/// Loader for map documents in JSON files.
pub struct MapLoader;

impl MapLoader {
    /// Load a map document from a JSON file.
    ///
    /// The shape invariant (row count and row width) is checked on load.
    pub fn load(path: &Path) -> LoadResult<MapDocument> {
        let content = read_file(path)?;
        parse_json("map", &content)
    }

    /// Write a map document as pretty-printed JSON.
    pub fn save(path: &Path, map: &MapDocument) -> LoadResult<()> {
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| anyhow::anyhow!("Failed to encode map JSON: {}", e))?;
        std::fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write file {}: {}", path.display(), e))
    }

    /// A blank map for the editor, filled with plains.
    pub fn blank(width: u32, height: u32) -> MapDocument {
        MapDocument::filled(width, height, TerrainKind::default())
    }
}

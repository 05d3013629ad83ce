//! Authored content: where documents live and how they are decoded.
//!
//! Everything the game reads is a JSON document addressed by a path in a
//! content store. [`ContentLayout`] turns logical names (an init document, a
//! dialog script id, a map id) into those paths, scoped by the selected test
//! case. The loaders decode raw text into `game-core` documents.
//!
//! Content is consumed by the runtime and never mutated by it; the only
//! writer is the map editor through [`MapLoader::save`].

pub mod layout;
pub mod loaders;

pub use layout::{ContentLayout, DEFAULT_TEST_CASE, SELECTED_TEST_CASE_KEY};
pub use loaders::{
    LoadResult, MapLoader, parse_init, parse_map, parse_scene_document, parse_script,
    parse_script_module, parse_stage, parse_town,
};

//! Text-to-document decoding for every content kind.

use game_core::{
    InitDocument, MapDocument, SceneDocument, ScriptDocument, ScriptModule, StageDocument,
    TownDocument,
};

use crate::loaders::{LoadResult, parse_json};

/// Parses a dialog script. Unknown or malformed events survive decoding and
/// are skipped at run time; only a broken document shape fails here.
pub fn parse_script(text: &str) -> LoadResult<ScriptDocument> {
    ScriptDocument::from_json(text).map_err(|e| anyhow::anyhow!("Failed to parse script JSON: {}", e))
}

/// Parses an init document: one scene command or a list of them.
pub fn parse_init(text: &str) -> LoadResult<InitDocument> {
    parse_json("init document", text)
}

pub fn parse_script_module(text: &str) -> LoadResult<ScriptModule> {
    parse_json("script module", text)
}

pub fn parse_map(text: &str) -> LoadResult<MapDocument> {
    parse_json("map", text)
}

pub fn parse_stage(text: &str) -> LoadResult<StageDocument> {
    parse_json("stage", text)
}

pub fn parse_town(text: &str) -> LoadResult<TownDocument> {
    parse_json("town", text)
}

/// Parses a battlefield or rogue resource document.
pub fn parse_scene_document(text: &str) -> LoadResult<SceneDocument> {
    parse_json("scene document", text)
}

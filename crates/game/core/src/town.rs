//! Town documents: selectable locations unlocked by story progress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::ComparisonOp;
use crate::scene::{QueuedCommand, Scene, SceneCommand};
use crate::store::KeyValueStore;

/// Prefix of the per-storyline progress keys read by `enableAt`.
pub const STORY_KEY_PREFIX: &str = "story.";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownDocument {
    #[serde(default)]
    pub town_name: Option<String>,
    #[serde(default)]
    pub background_resource: Option<String>,
    #[serde(default)]
    pub town_config: BTreeMap<String, TownLocation>,
    #[serde(default)]
    pub on_render_completed: Vec<QueuedCommand>,
}

impl TownDocument {
    /// Locations currently enabled, keyed as authored.
    pub fn enabled_locations<'a>(
        &'a self,
        store: &'a dyn KeyValueStore,
    ) -> impl Iterator<Item = (&'a str, &'a TownLocation)> + 'a {
        self.town_config
            .iter()
            .filter(move |(_, location)| location.is_enabled(store))
            .map(|(key, location)| (key.as_str(), location))
    }

    pub fn location(&self, key: &str) -> Option<&TownLocation> {
        self.town_config.get(key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownLocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub enable_at: EnableAt,
}

impl TownLocation {
    pub fn is_enabled(&self, store: &dyn KeyValueStore) -> bool {
        self.enable_at.is_satisfied(store)
    }

    /// Command issued when the location is chosen, if it leads anywhere.
    pub fn visit_command(&self) -> Option<SceneCommand> {
        self.destination
            .as_deref()
            .map(|destination| SceneCommand::invoke(Scene::Town, destination))
    }
}

/// Unlock rule: `story.<story> <operator> chapter`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableAt {
    pub story: String,
    pub chapter: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl EnableAt {
    pub fn story_key(&self) -> String {
        format!("{STORY_KEY_PREFIX}{}", self.story)
    }

    /// Unknown operators fall back to `>=`.
    pub fn operator(&self) -> ComparisonOp {
        self.operator
            .as_deref()
            .and_then(ComparisonOp::from_symbol)
            .unwrap_or(ComparisonOp::Ge)
    }

    pub fn is_satisfied(&self, store: &dyn KeyValueStore) -> bool {
        let stored = store.get(&self.story_key());
        let current = match stored.as_deref().map(str::trim) {
            None | Some("") => Some(0),
            Some(raw) => leading_integer(raw),
        };

        match current {
            Some(current) => self.operator().compare(current, self.chapter),
            None => self.operator() == ComparisonOp::Ne,
        }
    }
}

/// Integer prefix of `raw`, the way progress markers are read back.
fn leading_integer(raw: &str) -> Option<i64> {
    let end = raw
        .char_indices()
        .find(|&(index, ch)| !(ch.is_ascii_digit() || (index == 0 && matches!(ch, '-' | '+'))))
        .map_or(raw.len(), |(index, _)| index);
    raw[..end].parse().ok()
}

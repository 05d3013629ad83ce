//! Scene state and the scene command vocabulary.
//!
//! A scene is a named presentation layer. Visibility and the bound resource
//! of each scene are tracked independently: hiding a scene keeps its last
//! resource so it can be shown again without re-fetching.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::script::document::scalar_to_string;
use crate::store::StorageAction;

/// Field carrying a scene command's tag.
pub const COMMAND_TAG: &str = "command";

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Scene {
    HomeScreen,
    Chat,
    Town,
    Deployment,
    Battlefield,
    Inventory,
    Rogue,
}

impl Scene {
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// Visibility map plus per-scene resource bindings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    visibility: BTreeMap<Scene, bool>,
    resources: BTreeMap<Scene, String>,
}

impl Default for SceneState {
    /// Only the home screen is visible; nothing is bound.
    fn default() -> Self {
        let visibility = Scene::all()
            .map(|scene| (scene, scene == Scene::HomeScreen))
            .collect();
        Self {
            visibility,
            resources: BTreeMap::new(),
        }
    }
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, scene: Scene) -> bool {
        self.visibility.get(&scene).copied().unwrap_or(false)
    }

    pub fn resource(&self, scene: Scene) -> Option<&str> {
        self.resources.get(&scene).map(String::as_str)
    }

    pub fn visible_scenes(&self) -> Vec<Scene> {
        self.visibility
            .iter()
            .filter_map(|(scene, visible)| visible.then_some(*scene))
            .collect()
    }

    pub fn visibility(&self) -> &BTreeMap<Scene, bool> {
        &self.visibility
    }

    pub fn resources(&self) -> &BTreeMap<Scene, String> {
        &self.resources
    }

    /// Shows `scene` alone. Other scenes keep their resources.
    pub fn invoke(&mut self, scene: Scene, resource: Option<String>) {
        for (candidate, visible) in self.visibility.iter_mut() {
            *visible = *candidate == scene;
        }
        self.bind(scene, resource);
    }

    /// Shows `scene` on top of whatever is already visible.
    pub fn stack(&mut self, scene: Scene, resource: Option<String>) {
        self.visibility.insert(scene, true);
        self.bind(scene, resource);
    }

    /// Hides `scene`; its resource binding is retained.
    pub fn hide(&mut self, scene: Scene) {
        self.visibility.insert(scene, false);
    }

    /// Replaces the visibility map wholesale. Scenes absent from `payload`
    /// become hidden.
    pub fn replace_visibility(&mut self, payload: &BTreeMap<Scene, bool>) {
        for (scene, visible) in self.visibility.iter_mut() {
            *visible = payload.get(scene).copied().unwrap_or(false);
        }
    }

    fn bind(&mut self, scene: Scene, resource: Option<String>) {
        if let Some(resource) = resource {
            self.resources.insert(scene, resource);
        }
    }
}

/// Scene transitions and state writes processed by the theater queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneCommand {
    #[serde(rename_all = "camelCase")]
    InvokeScene {
        scene: Scene,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scene_resource: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StackScene {
        scene: Scene,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scene_resource: Option<String>,
    },
    HideScene { scene: Scene },
    /// Runs the named entry point of a data-only script module.
    #[serde(rename_all = "camelCase")]
    InvokeScript { script: String, entry_point: String },
    ResetState,
    WriteValue {
        target: String,
        #[serde(default)]
        operation: StorageAction,
        #[serde(deserialize_with = "scalar_value")]
        value: String,
    },
}

impl SceneCommand {
    pub fn invoke(scene: Scene, resource: impl Into<String>) -> Self {
        Self::InvokeScene {
            scene,
            scene_resource: Some(resource.into()),
        }
    }

    pub fn stack(scene: Scene, resource: impl Into<String>) -> Self {
        Self::StackScene {
            scene,
            scene_resource: Some(resource.into()),
        }
    }

    pub fn hide(scene: Scene) -> Self {
        Self::HideScene { scene }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::InvokeScene { .. } => "INVOKE_SCENE",
            Self::StackScene { .. } => "STACK_SCENE",
            Self::HideScene { .. } => "HIDE_SCENE",
            Self::InvokeScript { .. } => "INVOKE_SCRIPT",
            Self::ResetState => "RESET_STATE",
            Self::WriteValue { .. } => "WRITE_VALUE",
        }
    }
}

fn scalar_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a scalar value, got {value}")))
}

/// A queued command with its optional gate.
///
/// Decoding is lenient: an entry with an unknown tag or a malformed payload
/// decodes to [`QueuedCommand::Unrecognized`] instead of failing the whole
/// document it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueuedCommand {
    Command {
        condition: Option<String>,
        command: SceneCommand,
    },
    Unrecognized {
        command: String,
        reason: String,
    },
}

impl QueuedCommand {
    pub fn gated(command: SceneCommand, condition: impl Into<String>) -> Self {
        Self::Command {
            condition: Some(condition.into()),
            command,
        }
    }

    pub fn from_value(value: Value) -> Self {
        let condition = value
            .get("condition")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let tag = value
            .get(COMMAND_TAG)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        match serde_json::from_value::<SceneCommand>(value) {
            Ok(command) => Self::Command { condition, command },
            Err(err) => Self::Unrecognized {
                command: tag,
                reason: err.to_string(),
            },
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Command { command, .. } => command.name(),
            Self::Unrecognized { command, .. } => command,
        }
    }
}

impl From<SceneCommand> for QueuedCommand {
    fn from(command: SceneCommand) -> Self {
        Self::Command {
            condition: None,
            command,
        }
    }
}

impl<'de> Deserialize<'de> for QueuedCommand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// An init document: a single command or a list of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitDocument {
    pub commands: Vec<QueuedCommand>,
}

impl<'de> Deserialize<'de> for InitDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let commands = match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().map(QueuedCommand::from_value).collect(),
            single => vec![QueuedCommand::from_value(single)],
        };
        Ok(Self { commands })
    }
}

/// Data-only replacement for dynamically loaded script code: named entry
/// points mapping to command lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptModule {
    #[serde(default)]
    pub entry_points: BTreeMap<String, Vec<QueuedCommand>>,
}

impl ScriptModule {
    pub fn entry_point(&self, name: &str) -> Option<&[QueuedCommand]> {
        self.entry_points.get(name).map(Vec::as_slice)
    }
}

/// Document bound to a battlefield or rogue scene resource.
///
/// Only the command hooks are interpreted here: `onRenderCompleted` runs once
/// the resource is rendered, `onClosed` when the scene is hidden by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub background_resource: Option<String>,
    #[serde(default)]
    pub on_render_completed: Vec<QueuedCommand>,
    #[serde(default)]
    pub on_closed: Vec<QueuedCommand>,
}

/// Top-level events accepted by the theater.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TheaterEvent {
    ChangeScene { payload: BTreeMap<Scene, bool> },
    StartGame,
    LoadGame,
    ShowSettings,
    ExitGame,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_state_shows_home_screen_only() {
        let state = SceneState::new();
        assert_eq!(state.visible_scenes(), vec![Scene::HomeScreen]);
        assert_eq!(state.resource(Scene::Chat), None);
    }

    #[test]
    fn invoke_clears_others_but_keeps_their_resources() {
        let mut state = SceneState::new();
        state.invoke(Scene::Chat, Some("a".into()));
        state.invoke(Scene::Town, Some("b".into()));

        assert_eq!(state.visible_scenes(), vec![Scene::Town]);
        assert_eq!(state.resource(Scene::Town), Some("b"));
        assert_eq!(state.resource(Scene::Chat), Some("a"));
    }

    #[test]
    fn stack_and_hide() {
        let mut state = SceneState::new();
        state.invoke(Scene::Town, Some("t".into()));
        state.stack(Scene::Chat, Some("c".into()));
        assert_eq!(state.visible_scenes(), vec![Scene::Chat, Scene::Town]);

        state.hide(Scene::Chat);
        assert!(!state.is_visible(Scene::Chat));
        assert_eq!(state.resource(Scene::Chat), Some("c"));
    }

    #[test]
    fn change_scene_replaces_visibility() {
        let mut state = SceneState::new();
        let payload = BTreeMap::from([(Scene::Inventory, true), (Scene::Rogue, true)]);
        state.replace_visibility(&payload);
        assert_eq!(state.visible_scenes(), vec![Scene::Inventory, Scene::Rogue]);
    }

    #[test]
    fn scene_names_are_camel_case() {
        assert_eq!(Scene::HomeScreen.to_string(), "homeScreen");
        assert_eq!("battlefield".parse::<Scene>().ok(), Some(Scene::Battlefield));
        assert_eq!(Scene::all().count(), 7);
    }

    #[test]
    fn init_document_accepts_single_or_list() {
        let single: InitDocument = serde_json::from_value(json!({
            "command": "INVOKE_SCENE",
            "scene": "chat",
            "sceneResource": "/chat/intro.json"
        }))
        .unwrap();
        assert_eq!(
            single.commands,
            vec![QueuedCommand::from(SceneCommand::invoke(Scene::Chat, "/chat/intro.json"))]
        );

        let list: InitDocument = serde_json::from_value(json!([
            {"command": "RESET_STATE"},
            {"command": "STACK_SCENE", "scene": "town", "sceneResource": "t.json", "condition": "x == 1"},
            {"command": "DANCE"}
        ]))
        .unwrap();
        assert_eq!(list.commands.len(), 3);
        assert_eq!(list.commands[0], QueuedCommand::from(SceneCommand::ResetState));
        assert_eq!(
            list.commands[1],
            QueuedCommand::gated(SceneCommand::stack(Scene::Town, "t.json"), "x == 1")
        );
        assert!(matches!(
            &list.commands[2],
            QueuedCommand::Unrecognized { command, .. } if command == "DANCE"
        ));
    }

    #[test]
    fn unknown_scene_is_unrecognized() {
        let entry = QueuedCommand::from_value(json!({"command": "INVOKE_SCENE", "scene": "lobby"}));
        assert!(matches!(entry, QueuedCommand::Unrecognized { .. }));
    }

    #[test]
    fn write_value_command_stringifies() {
        let entry = QueuedCommand::from_value(json!({
            "command": "WRITE_VALUE",
            "target": "story.main",
            "value": 1
        }));
        assert_eq!(
            entry,
            QueuedCommand::from(SceneCommand::WriteValue {
                target: "story.main".into(),
                operation: StorageAction::Set,
                value: "1".into(),
            })
        );
    }

    #[test]
    fn script_module_entry_points() {
        let module: ScriptModule = serde_json::from_value(json!({
            "entryPoints": {
                "main": [{"command": "INVOKE_SCENE", "scene": "town", "sceneResource": "t"}]
            }
        }))
        .unwrap();
        assert_eq!(module.entry_point("main").map(<[_]>::len), Some(1));
        assert!(module.entry_point("other").is_none());
    }

    #[test]
    fn scene_document_hooks() {
        let doc: SceneDocument = serde_json::from_value(json!({
            "description": "Endless ruins",
            "mode": [{"name": "Classic", "loadComponent": "Classic"}],
            "onRenderCompleted": [{"command": "WRITE_VALUE", "target": "rogue.seen", "value": 1}],
            "onClosed": [{"command": "INVOKE_SCENE", "scene": "town", "sceneResource": "town.json"}]
        }))
        .unwrap();
        assert_eq!(doc.description.as_deref(), Some("Endless ruins"));
        assert_eq!(doc.on_render_completed.len(), 1);
        assert_eq!(
            doc.on_closed,
            vec![QueuedCommand::from(SceneCommand::invoke(Scene::Town, "town.json"))]
        );

        let bare: SceneDocument = serde_json::from_value(json!({})).unwrap();
        assert_eq!(bare, SceneDocument::default());
    }

    #[test]
    fn theater_event_tags() {
        let event: TheaterEvent = serde_json::from_value(json!({"type": "START_GAME"})).unwrap();
        assert_eq!(event, TheaterEvent::StartGame);

        let change: TheaterEvent = serde_json::from_value(json!({
            "type": "CHANGE_SCENE",
            "payload": {"town": true, "chat": false}
        }))
        .unwrap();
        assert!(matches!(change, TheaterEvent::ChangeScene { payload } if payload[&Scene::Town]));
    }
}

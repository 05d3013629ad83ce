//! Script documents as authored in JSON.
//!
//! Events are discriminated by their `eventCommand` tag. Decoding never fails
//! on an individual event: unknown tags and malformed payloads of known tags
//! both decode to [`EventCommand::Unrecognized`] so a newer script still runs
//! on an older engine.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::store::{StorageAction, ValueType, format_number};

use super::ScriptError;

/// JSON field carrying an event's command tag.
pub const EVENT_TAG: &str = "eventCommand";

/// A complete dialog script.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDocument {
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
    #[serde(default, deserialize_with = "nullable_finish")]
    pub finish_event: FinishEvent,
}

impl ScriptDocument {
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(text).map_err(|err| ScriptError::Parse(err.to_string()))
    }

    pub fn new(events: Vec<ScriptEvent>, finish_event: FinishEvent) -> Self {
        Self {
            events,
            finish_event,
        }
    }
}

fn nullable_finish<'de, D>(deserializer: D) -> Result<FinishEvent, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FinishEvent>::deserialize(deserializer)?.unwrap_or_default())
}

/// What happens once the last event has been consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishEvent {
    #[serde(default)]
    pub should_close: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene: Option<String>,
    /// Script id, possibly a `{storageKey}` template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_script: Option<String>,
    /// Scene to invoke directly, as `INVOKE_SCENE`-style finish events do.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_resource: Option<String>,
}

impl FinishEvent {
    pub fn close() -> Self {
        Self {
            should_close: true,
            ..Self::default()
        }
    }

    pub fn navigate(scene: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            next_scene: Some(scene.into()),
            next_script: Some(script.into()),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// One entry of a script's event list.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptEvent {
    /// Stable id used to de-duplicate history entries.
    pub id: Option<String>,
    /// Optional gate in the condition grammar.
    pub condition: Option<String>,
    pub command: EventCommand,
}

impl ScriptEvent {
    pub fn new(command: EventCommand) -> Self {
        Self {
            id: None,
            condition: None,
            command,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Decodes one event, mapping unknown or malformed payloads to
    /// [`EventCommand::Unrecognized`].
    pub fn from_value(value: Value) -> Self {
        let id = value.get("id").and_then(scalar_to_string);
        let condition = value
            .get("condition")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let tag = value
            .get(EVENT_TAG)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let command = if tag.is_empty() {
            EventCommand::Unrecognized {
                command: tag,
                reason: UnrecognizedReason::MissingTag,
            }
        } else if tag.parse::<CommandKind>().is_err() {
            EventCommand::Unrecognized {
                command: tag,
                reason: UnrecognizedReason::UnknownCommand,
            }
        } else {
            match serde_json::from_value::<EventCommand>(value) {
                Ok(command) => command,
                Err(err) => EventCommand::Unrecognized {
                    command: tag,
                    reason: UnrecognizedReason::Malformed(err.to_string()),
                },
            }
        };

        Self {
            id,
            condition,
            command,
        }
    }
}

impl<'de> Deserialize<'de> for ScriptEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl From<EventCommand> for ScriptEvent {
    fn from(command: EventCommand) -> Self {
        Self::new(command)
    }
}

/// Command tags this engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    ShowMessage,
    ClearMessage,
    RequestSelection,
    ShowOption,
    RequestInput,
    ShowCharacter,
    HideCharacter,
    SetBackground,
    RemoveBackground,
    WriteValue,
    Wait,
    WriteConsole,
}

impl CommandKind {
    /// Whether the engine halts on this command until an external signal.
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::ShowMessage | Self::RequestSelection | Self::ShowOption | Self::RequestInput
        )
    }
}

/// Why an event could not be interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnrecognizedReason {
    MissingTag,
    UnknownCommand,
    Malformed(String),
}

impl std::fmt::Display for UnrecognizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTag => f.write_str("event has no eventCommand tag"),
            Self::UnknownCommand => f.write_str("unknown command"),
            Self::Malformed(detail) => write!(f, "malformed payload: {detail}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "eventCommand", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCommand {
    ShowMessage(ShowMessage),
    ClearMessage,
    RequestSelection(RequestSelection),
    ShowOption(ShowOption),
    RequestInput(RequestInput),
    ShowCharacter(ShowCharacter),
    HideCharacter(HideCharacter),
    SetBackground(SetBackground),
    RemoveBackground,
    WriteValue(WriteValue),
    Wait(Wait),
    WriteConsole(WriteConsole),
    #[serde(skip)]
    Unrecognized {
        command: String,
        reason: UnrecognizedReason,
    },
}

impl EventCommand {
    pub fn kind(&self) -> Option<CommandKind> {
        Some(match self {
            Self::ShowMessage(_) => CommandKind::ShowMessage,
            Self::ClearMessage => CommandKind::ClearMessage,
            Self::RequestSelection(_) => CommandKind::RequestSelection,
            Self::ShowOption(_) => CommandKind::ShowOption,
            Self::RequestInput(_) => CommandKind::RequestInput,
            Self::ShowCharacter(_) => CommandKind::ShowCharacter,
            Self::HideCharacter(_) => CommandKind::HideCharacter,
            Self::SetBackground(_) => CommandKind::SetBackground,
            Self::RemoveBackground => CommandKind::RemoveBackground,
            Self::WriteValue(_) => CommandKind::WriteValue,
            Self::Wait(_) => CommandKind::Wait,
            Self::WriteConsole(_) => CommandKind::WriteConsole,
            Self::Unrecognized { .. } => return None,
        })
    }

    /// Tag as it appears in JSON.
    pub fn tag(&self) -> String {
        match self {
            Self::Unrecognized { command, .. } => command.clone(),
            known => known.kind().map(|kind| kind.to_string()).unwrap_or_default(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.kind().is_some_and(CommandKind::is_blocking)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowMessage {
    #[serde(default)]
    pub character_name: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSelection")]
pub struct RequestSelection {
    pub options: Vec<SelectionOption>,
    /// Where the chosen value is written; `SHOW_OPTION` menus store nothing.
    pub storage_key: Option<String>,
    pub value_type: ValueType,
    pub action_to_storage: StorageAction,
    /// Message kept on screen above the options.
    pub message: Option<String>,
    pub character_name: Option<String>,
}

impl RequestSelection {
    pub fn option(&self, value: &str) -> Option<&SelectionOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSelection {
    #[serde(default)]
    options: Option<Vec<SelectionOption>>,
    #[serde(default)]
    option: Option<Vec<SelectionOption>>,
    storage_key: String,
    #[serde(default)]
    value_type: ValueType,
    #[serde(default)]
    action_to_storage: StorageAction,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    character_name: Option<String>,
}

impl TryFrom<RawSelection> for RequestSelection {
    type Error = String;

    fn try_from(raw: RawSelection) -> Result<Self, Self::Error> {
        let options = raw.options.or(raw.option).unwrap_or_default();
        if options.is_empty() {
            return Err("selection has no options".to_owned());
        }
        Ok(Self {
            options,
            storage_key: Some(raw.storage_key),
            value_type: raw.value_type,
            action_to_storage: raw.action_to_storage,
            message: raw.message,
            character_name: raw.character_name,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionOption {
    pub label: String,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
    #[serde(default)]
    pub next_script_id: Option<String>,
    /// Script whose events run before the outer script resumes.
    #[serde(default)]
    pub inject_script: Option<String>,
}

/// Menu whose entries either inject a script or simply continue.
///
/// Decoded into a storage-less [`RequestSelection`]; each entry's `text` is
/// both its label and its value.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawShowOption")]
pub struct ShowOption(pub RequestSelection);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum OptionCommand {
    InjectScript,
    Continue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionFallback {
    option_command: OptionCommand,
    #[serde(default)]
    script: Option<String>,
}

#[derive(Deserialize)]
struct RawOptionEntry {
    text: String,
    #[serde(default)]
    fallback: Option<OptionFallback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShowOption {
    options: Vec<RawOptionEntry>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    character_name: Option<String>,
}

impl TryFrom<RawShowOption> for ShowOption {
    type Error = String;

    fn try_from(raw: RawShowOption) -> Result<Self, Self::Error> {
        if raw.options.is_empty() {
            return Err("option menu has no entries".to_owned());
        }
        let options = raw
            .options
            .into_iter()
            .map(|entry| -> Result<SelectionOption, String> {
                let inject_script = match entry.fallback {
                    Some(OptionFallback {
                        option_command: OptionCommand::InjectScript,
                        script,
                    }) => Some(script.ok_or_else(|| {
                        format!("option '{}' injects no script", entry.text)
                    })?),
                    Some(OptionFallback {
                        option_command: OptionCommand::Continue,
                        ..
                    })
                    | None => None,
                };
                Ok(SelectionOption {
                    label: entry.text.clone(),
                    value: entry.text,
                    next_script_id: None,
                    inject_script,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self(RequestSelection {
            options,
            storage_key: None,
            value_type: ValueType::default(),
            action_to_storage: StorageAction::default(),
            message: raw.message,
            character_name: raw.character_name,
        }))
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    #[default]
    String,
    Number,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInput {
    #[serde(default)]
    pub input_type: InputType,
    pub target_field: String,
    #[serde(default)]
    pub confirm_message: String,
    /// Prompt shown while waiting for input.
    #[serde(default)]
    pub message: Option<String>,
}

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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CharacterPosition {
    Left,
    Middle,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawShowCharacter")]
pub struct ShowCharacter {
    pub position: CharacterPosition,
    pub sprite: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShowCharacter {
    position: CharacterPosition,
    #[serde(default)]
    sprite: Option<String>,
    #[serde(default)]
    sprite_url: Option<String>,
    #[serde(default)]
    res: Option<String>,
}

impl TryFrom<RawShowCharacter> for ShowCharacter {
    type Error = String;

    fn try_from(raw: RawShowCharacter) -> Result<Self, Self::Error> {
        let sprite = raw
            .sprite
            .or(raw.sprite_url)
            .or(raw.res)
            .filter(|sprite| !sprite.is_empty())
            .ok_or_else(|| "character has no sprite".to_owned())?;
        Ok(Self {
            position: raw.position,
            sprite,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HideCharacter {
    pub position: CharacterPosition,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBackground {
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteValue {
    pub target: String,
    #[serde(default)]
    pub operation: StorageAction,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Wait {
    /// Milliseconds; absent or non-positive waits do not suspend.
    #[serde(default)]
    pub time: Option<i64>,
}

impl Wait {
    pub fn millis(&self) -> Option<u64> {
        self.time.filter(|ms| *ms > 0).map(|ms| ms as u64)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsoleLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WriteConsole {
    pub message: String,
    #[serde(rename = "type", default)]
    pub level: ConsoleLevel,
}

/// Strings stay raw; numbers and booleans are stringified.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(match number.as_i64() {
            Some(int) => int.to_string(),
            None => number.as_f64().map(format_number)?,
        }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| de::Error::custom(format!("expected a string, number or boolean, got {value}")))
}

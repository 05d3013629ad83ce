//! Script execution state machine.
//!
//! The engine is synchronous and I/O free. The shell feeds it documents and
//! external signals (advance, selection, input, timer expiry, injected
//! events) and drains [`EngineOutput`]s after every call. Anything that
//! needs the outside world, such as sleeping or fetching an injected script,
//! is requested through an output carrying a token; a completion whose token
//! no longer matches the engine state is ignored.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::condition::{self, ConditionError, Verdict};
use crate::scene::Scene;
use crate::store::{KeyValueStore, StoreError, ValueType};

use super::ScriptError;
use super::document::{
    CharacterPosition, ConsoleLevel, EventCommand, FinishEvent, InputType, RequestInput,
    RequestSelection, ScriptDocument, ScriptEvent, ShowOption, UnrecognizedReason,
};
use super::history::{DialogHistory, HistoryEntry};
use super::interpolate::{interpolate, next_script_key, resolve_next_script, substitute};

/// Maximum number of simultaneously open cursors, the loaded script included.
pub const MAX_INJECTION_DEPTH: usize = 8;

/// Identifies one `begin_load` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WaitToken(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InjectionToken(u64);

/// What the engine is waiting on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Blocker {
    Message,
    Selection {
        id: Option<String>,
        request: RequestSelection,
    },
    /// `pending` holds a submitted value awaiting confirmation.
    Input {
        request: RequestInput,
        pending: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Loading {
        script_id: String,
    },
    Running,
    Blocked(Blocker),
    Waiting {
        token: WaitToken,
    },
    AwaitingInjection {
        token: InjectionToken,
        script: String,
    },
    Finished(FinishOutcome),
    Failed {
        script_id: String,
        message: String,
    },
}

/// Resolution of a script's finish event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Close the presenting scene.
    Close,
    /// Load `script` in the scene kind named by `scene` (e.g. `DIALOG`).
    Navigate { scene: String, script: String },
    InvokeScene {
        scene: Scene,
        resource: Option<String>,
    },
    /// No follow-up.
    Complete,
    /// The finish event could not be resolved.
    Invalid { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageView {
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionView {
    pub label: String,
    pub value: String,
}

/// Current presentation: background, characters by position and the
/// displayed message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Presentation {
    pub background: Option<String>,
    pub characters: BTreeMap<CharacterPosition, String>,
    pub message: Option<MessageView>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Unrecognized(UnrecognizedReason),
    ConditionFailed(String),
}

/// Non-fatal problems surfaced for the shell to record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    Skipped {
        command: String,
        reason: SkipReason,
    },
    PermissiveCondition {
        condition: String,
        error: ConditionError,
    },
    StoreFailed {
        key: String,
        error: StoreError,
    },
    InjectionFailed {
        script: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineOutput {
    BackgroundChanged(Option<String>),
    CharacterShown {
        position: CharacterPosition,
        sprite: String,
    },
    CharacterHidden {
        position: CharacterPosition,
    },
    MessageShown {
        id: Option<String>,
        message: MessageView,
    },
    MessageCleared,
    SelectionRequested {
        prompt: Option<MessageView>,
        options: Vec<OptionView>,
    },
    SelectionMade {
        label: String,
        value: String,
    },
    InputRequested {
        input_type: InputType,
        target_field: String,
        prompt: Option<String>,
    },
    InputConfirmation {
        value: String,
        message: String,
    },
    InputRejected {
        value: String,
        reason: String,
    },
    InputAccepted {
        target_field: String,
        value: String,
    },
    ValueWritten {
        key: String,
    },
    Console {
        level: ConsoleLevel,
        message: String,
    },
    Wait {
        token: WaitToken,
        millis: u64,
    },
    InjectionRequested {
        token: InjectionToken,
        script: String,
    },
    Diagnostic(Diagnostic),
    Finished(FinishOutcome),
    LoadFailed {
        script_id: String,
        message: String,
    },
}

#[derive(Clone, Debug)]
struct Cursor {
    source: String,
    events: Vec<ScriptEvent>,
    index: usize,
}

enum Flow {
    Continue,
    Suspend(EngineState),
}

pub struct ScriptEngine {
    store: Arc<dyn KeyValueStore>,
    state: EngineState,
    generation: u64,
    next_token: u64,
    script_id: Option<String>,
    finish_event: FinishEvent,
    cursors: Vec<Cursor>,
    presentation: Presentation,
    history: DialogHistory,
    outputs: VecDeque<EngineOutput>,
    max_injection_depth: usize,
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("script_id", &self.script_id)
            .field("depth", &self.cursors.len())
            .finish_non_exhaustive()
    }
}

impl ScriptEngine {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            state: EngineState::Idle,
            generation: 0,
            next_token: 0,
            script_id: None,
            finish_event: FinishEvent::default(),
            cursors: Vec::new(),
            presentation: Presentation::default(),
            history: DialogHistory::new(),
            outputs: VecDeque::new(),
            max_injection_depth: MAX_INJECTION_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_injection_depth(mut self, depth: usize) -> Self {
        self.max_injection_depth = depth.max(1);
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn history(&self) -> &DialogHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut DialogHistory {
        &mut self.history
    }

    pub fn script_id(&self) -> Option<&str> {
        self.script_id.as_deref()
    }

    /// Number of open cursors; `1` when no injection is active.
    pub fn depth(&self) -> usize {
        self.cursors.len()
    }

    /// Source script of the innermost cursor.
    pub fn current_source(&self) -> Option<&str> {
        self.cursors.last().map(|cursor| cursor.source.as_str())
    }

    pub fn current_event(&self) -> Option<&ScriptEvent> {
        let cursor = self.cursors.last()?;
        cursor.events.get(cursor.index)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, EngineState::Finished(_))
    }

    pub fn take_outputs(&mut self) -> Vec<EngineOutput> {
        self.outputs.drain(..).collect()
    }

    /// Starts loading `script_id`, discarding every piece of transient state
    /// belonging to the previous script. Background and characters persist.
    pub fn begin_load(&mut self, script_id: impl Into<String>) -> LoadTicket {
        self.generation += 1;
        self.clear_transient();

        let script_id = script_id.into();
        self.script_id = Some(script_id.clone());
        self.state = EngineState::Loading { script_id };
        LoadTicket(self.generation)
    }

    /// Applies a fetch result. Returns `false` when `ticket` is stale.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ScriptDocument, ScriptError>,
    ) -> bool {
        if ticket.0 != self.generation || !matches!(self.state, EngineState::Loading { .. }) {
            return false;
        }

        let script_id = self.script_id.clone().unwrap_or_default();
        match result {
            Ok(document) => {
                self.finish_event = document.finish_event;
                self.cursors.push(Cursor {
                    source: script_id,
                    events: document.events,
                    index: 0,
                });
                self.run();
            }
            Err(err) => {
                let message = err.to_string();
                self.state = EngineState::Failed {
                    script_id: script_id.clone(),
                    message: message.clone(),
                };
                self.emit(EngineOutput::LoadFailed { script_id, message });
            }
        }
        true
    }

    /// Loads an already available document.
    pub fn load(&mut self, script_id: impl Into<String>, document: ScriptDocument) {
        let ticket = self.begin_load(script_id);
        self.complete_load(ticket, Ok(document));
    }

    /// Returns to `Idle`, invalidating pending loads, waits and injections.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.clear_transient();
        self.script_id = None;
        self.state = EngineState::Idle;
    }

    /// Moves past a displayed message. No-op unless blocked on one.
    pub fn advance(&mut self) -> bool {
        if !matches!(self.state, EngineState::Blocked(Blocker::Message)) {
            return false;
        }
        self.step();
        self.run();
        true
    }

    /// Chooses the option whose value is `value`. No-op unless a selection
    /// is pending and offers that value.
    pub fn select(&mut self, value: &str) -> bool {
        let (id, request) = match &self.state {
            EngineState::Blocked(Blocker::Selection { id, request }) => (id.clone(), request.clone()),
            _ => return false,
        };
        let Some(option) = request.option(value).cloned() else {
            return false;
        };

        if let Some(storage_key) = request.storage_key.as_deref() {
            let stored = request.value_type.normalize(&option.value);
            if let Err(error) =
                request
                    .action_to_storage
                    .apply(self.store.as_ref(), storage_key, &stored)
            {
                self.store_failed(storage_key, error);
            }

            if let Some(next) = option.next_script_id.as_deref() {
                let key = next_script_key(storage_key);
                if let Err(error) = self.store.set(&key, next) {
                    self.store_failed(&key, error);
                }
            }
        }

        self.history.record(HistoryEntry::Selection {
            id,
            label: option.label.clone(),
            value: option.value.clone(),
        });
        self.emit(EngineOutput::SelectionMade {
            label: option.label,
            value: option.value,
        });

        self.step();
        match option.inject_script {
            Some(script) => self.request_injection(script),
            None => self.run(),
        }
        true
    }

    /// Chooses the option at `index` in display order.
    pub fn select_index(&mut self, index: usize) -> bool {
        let value = match &self.state {
            EngineState::Blocked(Blocker::Selection { request, .. }) => {
                request.options.get(index).map(|option| option.value.clone())
            }
            _ => None,
        };
        value.is_some_and(|value| self.select(&value))
    }

    /// Submits text for a pending input, moving to its confirmation step.
    pub fn submit_input(&mut self, text: &str) -> bool {
        let request = match &self.state {
            EngineState::Blocked(Blocker::Input {
                request,
                pending: None,
            }) => request.clone(),
            _ => return false,
        };

        let value = text.trim().to_owned();
        let rejection = if value.is_empty() {
            Some("input is empty")
        } else if request.input_type == InputType::Number
            && !value.parse::<f64>().is_ok_and(f64::is_finite)
        {
            Some("expected a number")
        } else {
            None
        };
        if let Some(reason) = rejection {
            self.emit(EngineOutput::InputRejected {
                value,
                reason: reason.to_owned(),
            });
            return false;
        }

        let store = Arc::clone(&self.store);
        let message = substitute(&request.confirm_message, |name| {
            if name == "value" {
                Some(value.clone())
            } else {
                store.get(name).filter(|stored| !stored.is_empty())
            }
        });
        self.emit(EngineOutput::InputConfirmation {
            value: value.clone(),
            message,
        });
        self.state = EngineState::Blocked(Blocker::Input {
            request,
            pending: Some(value),
        });
        true
    }

    /// Writes the submitted value to its target field and continues.
    pub fn confirm_input(&mut self) -> bool {
        let (request, value) = match &self.state {
            EngineState::Blocked(Blocker::Input {
                request,
                pending: Some(value),
            }) => (request.clone(), value.clone()),
            _ => return false,
        };

        let stored = match request.input_type {
            InputType::Number => ValueType::Number.normalize(&value),
            InputType::String => value,
        };
        if let Err(error) = self.store.set(&request.target_field, &stored) {
            self.store_failed(&request.target_field, error);
        }
        self.emit(EngineOutput::InputAccepted {
            target_field: request.target_field,
            value: stored,
        });

        self.step();
        self.run();
        true
    }

    /// Discards a submitted value and prompts again.
    pub fn cancel_input(&mut self) -> bool {
        let request = match &self.state {
            EngineState::Blocked(Blocker::Input {
                request,
                pending: Some(_),
            }) => request.clone(),
            _ => return false,
        };

        self.emit_input_request(&request);
        self.state = EngineState::Blocked(Blocker::Input {
            request,
            pending: None,
        });
        true
    }

    /// Resumes after a timed wait. Stale tokens are ignored.
    pub fn finish_wait(&mut self, token: WaitToken) -> bool {
        if !matches!(self.state, EngineState::Waiting { token: current } if current == token) {
            return false;
        }
        self.step();
        self.run();
        true
    }

    /// Pushes the events of a fetched injected script as a nested cursor.
    pub fn inject_events(&mut self, token: InjectionToken, events: Vec<ScriptEvent>) -> bool {
        let script = match &self.state {
            EngineState::AwaitingInjection {
                token: current,
                script,
            } if *current == token => script.clone(),
            _ => return false,
        };

        self.cursors.push(Cursor {
            source: script,
            events,
            index: 0,
        });
        self.run();
        true
    }

    /// Abandons a pending injection and continues with the outer script.
    pub fn skip_injection(&mut self, token: InjectionToken, reason: impl Into<String>) -> bool {
        let script = match &self.state {
            EngineState::AwaitingInjection {
                token: current,
                script,
            } if *current == token => script.clone(),
            _ => return false,
        };

        self.emit(EngineOutput::Diagnostic(Diagnostic::InjectionFailed {
            script,
            reason: reason.into(),
        }));
        self.run();
        true
    }

    fn clear_transient(&mut self) {
        self.cursors.clear();
        self.finish_event = FinishEvent::default();
        self.presentation.message = None;
        self.outputs.clear();
    }

    fn run(&mut self) {
        self.state = EngineState::Running;
        loop {
            let Some(event) = self.current_event().cloned() else {
                if self.cursors.len() > 1 {
                    self.cursors.pop();
                    continue;
                }
                self.finish();
                return;
            };

            match self.process(event) {
                Flow::Continue => self.step(),
                Flow::Suspend(state) => {
                    self.state = state;
                    return;
                }
            }
        }
    }

    fn step(&mut self) {
        if let Some(cursor) = self.cursors.last_mut() {
            cursor.index += 1;
        }
    }

    fn process(&mut self, event: ScriptEvent) -> Flow {
        match condition::check(event.condition.as_deref(), self.store.as_ref()) {
            Verdict::Pass => {}
            Verdict::Fail => {
                self.emit(EngineOutput::Diagnostic(Diagnostic::Skipped {
                    command: event.command.tag(),
                    reason: SkipReason::ConditionFailed(event.condition.unwrap_or_default()),
                }));
                return Flow::Continue;
            }
            Verdict::Permissive(error) => {
                self.emit(EngineOutput::Diagnostic(Diagnostic::PermissiveCondition {
                    condition: event.condition.clone().unwrap_or_default(),
                    error,
                }));
            }
        }

        match event.command {
            EventCommand::ShowMessage(show) => {
                let message = MessageView {
                    speaker: show.character_name.map(|name| self.interpolate(&name)),
                    text: self.interpolate(&show.message),
                };
                self.history.record(HistoryEntry::Message {
                    id: event.id.clone(),
                    speaker: message.speaker.clone(),
                    text: message.text.clone(),
                });
                self.presentation.message = Some(message.clone());
                self.emit(EngineOutput::MessageShown {
                    id: event.id,
                    message,
                });
                Flow::Suspend(EngineState::Blocked(Blocker::Message))
            }
            EventCommand::ClearMessage => {
                self.presentation.message = None;
                self.emit(EngineOutput::MessageCleared);
                Flow::Continue
            }
            EventCommand::RequestSelection(request)
            | EventCommand::ShowOption(ShowOption(request)) => {
                if let Some(text) = request.message.as_deref() {
                    let retained = MessageView {
                        speaker: request
                            .character_name
                            .as_deref()
                            .map(|name| self.interpolate(name)),
                        text: self.interpolate(text),
                    };
                    self.presentation.message = Some(retained);
                }
                let options = request
                    .options
                    .iter()
                    .map(|option| OptionView {
                        label: self.interpolate(&option.label),
                        value: option.value.clone(),
                    })
                    .collect();
                self.emit(EngineOutput::SelectionRequested {
                    prompt: self.presentation.message.clone(),
                    options,
                });
                Flow::Suspend(EngineState::Blocked(Blocker::Selection {
                    id: event.id,
                    request,
                }))
            }
            EventCommand::RequestInput(request) => {
                self.emit_input_request(&request);
                Flow::Suspend(EngineState::Blocked(Blocker::Input {
                    request,
                    pending: None,
                }))
            }
            EventCommand::ShowCharacter(show) => {
                self.presentation
                    .characters
                    .insert(show.position, show.sprite.clone());
                self.emit(EngineOutput::CharacterShown {
                    position: show.position,
                    sprite: show.sprite,
                });
                Flow::Continue
            }
            EventCommand::HideCharacter(hide) => {
                self.presentation.characters.remove(&hide.position);
                self.emit(EngineOutput::CharacterHidden {
                    position: hide.position,
                });
                Flow::Continue
            }
            EventCommand::SetBackground(background) => {
                if let Some(path) = background.image_path {
                    self.presentation.background = Some(path.clone());
                    self.emit(EngineOutput::BackgroundChanged(Some(path)));
                }
                Flow::Continue
            }
            EventCommand::RemoveBackground => {
                self.presentation.background = None;
                self.emit(EngineOutput::BackgroundChanged(None));
                Flow::Continue
            }
            EventCommand::WriteValue(write) => {
                match write
                    .operation
                    .apply(self.store.as_ref(), &write.target, &write.value)
                {
                    Ok(()) => self.emit(EngineOutput::ValueWritten { key: write.target }),
                    Err(error) => self.store_failed(&write.target, error),
                }
                Flow::Continue
            }
            EventCommand::Wait(wait) => match wait.millis() {
                Some(millis) => {
                    let token = WaitToken(self.next_token());
                    self.emit(EngineOutput::Wait { token, millis });
                    Flow::Suspend(EngineState::Waiting { token })
                }
                None => Flow::Continue,
            },
            EventCommand::WriteConsole(console) => {
                let message = self.interpolate(&console.message);
                self.emit(EngineOutput::Console {
                    level: console.level,
                    message,
                });
                Flow::Continue
            }
            EventCommand::Unrecognized { command, reason } => {
                self.emit(EngineOutput::Diagnostic(Diagnostic::Skipped {
                    command,
                    reason: SkipReason::Unrecognized(reason),
                }));
                Flow::Continue
            }
        }
    }

    fn request_injection(&mut self, script: String) {
        if self.cursors.len() >= self.max_injection_depth {
            self.emit(EngineOutput::Diagnostic(Diagnostic::InjectionFailed {
                script,
                reason: format!("injection depth limit of {} reached", self.max_injection_depth),
            }));
            self.run();
            return;
        }

        let token = InjectionToken(self.next_token());
        self.emit(EngineOutput::InjectionRequested {
            token,
            script: script.clone(),
        });
        self.state = EngineState::AwaitingInjection { token, script };
    }

    fn finish(&mut self) {
        let outcome = self.resolve_finish();
        self.cursors.clear();
        self.emit(EngineOutput::Finished(outcome.clone()));
        self.state = EngineState::Finished(outcome);
    }

    fn resolve_finish(&mut self) -> FinishOutcome {
        let finish = self.finish_event.clone();
        if finish.should_close {
            return FinishOutcome::Close;
        }

        if let (Some(scene), Some(template)) = (finish.next_scene, finish.next_script) {
            return match resolve_next_script(&template, self.store.as_ref()) {
                Ok(script) if !script.is_empty() && !script.contains('{') => {
                    FinishOutcome::Navigate { scene, script }
                }
                Ok(script) => FinishOutcome::Invalid {
                    reason: format!("next script '{template}' resolved to '{script}'"),
                },
                Err(error) => FinishOutcome::Invalid {
                    reason: error.to_string(),
                },
            };
        }

        if let Some(scene) = finish.scene {
            return match scene.parse::<Scene>() {
                Ok(scene) => FinishOutcome::InvokeScene {
                    scene,
                    resource: finish.scene_resource,
                },
                Err(_) => FinishOutcome::Invalid {
                    reason: format!("unknown scene '{scene}'"),
                },
            };
        }

        FinishOutcome::Complete
    }

    fn emit_input_request(&mut self, request: &RequestInput) {
        let prompt = request.message.as_deref().map(|text| self.interpolate(text));
        self.emit(EngineOutput::InputRequested {
            input_type: request.input_type,
            target_field: request.target_field.clone(),
            prompt,
        });
    }

    fn interpolate(&self, text: &str) -> String {
        interpolate(text, self.store.as_ref())
    }

    fn store_failed(&mut self, key: &str, error: StoreError) {
        self.emit(EngineOutput::Diagnostic(Diagnostic::StoreFailed {
            key: key.to_owned(),
            error,
        }));
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn emit(&mut self, output: EngineOutput) {
        self.outputs.push_back(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn document(value: serde_json::Value) -> ScriptDocument {
        serde_json::from_value(value).unwrap()
    }

    fn engine_with(entries: &[(&str, &str)]) -> (ScriptEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::with_entries(entries.iter().copied()));
        (ScriptEngine::new(store.clone()), store)
    }

    fn shown_texts(outputs: &[EngineOutput]) -> Vec<String> {
        outputs
            .iter()
            .filter_map(|output| match output {
                EngineOutput::MessageShown { message, .. } => Some(message.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn message_interpolates_and_close_on_advance() {
        let (mut engine, _) = engine_with(&[("name", "Ann")]);
        engine.load(
            "greet",
            document(json!({
                "events": [{"eventCommand": "SHOW_MESSAGE", "message": "Hi {name}"}],
                "finishEvent": {"shouldClose": true}
            })),
        );

        assert_eq!(shown_texts(&engine.take_outputs()), vec!["Hi Ann"]);
        assert_eq!(engine.state(), &EngineState::Blocked(Blocker::Message));

        assert!(engine.advance());
        assert_eq!(engine.state(), &EngineState::Finished(FinishOutcome::Close));
        assert!(
            engine
                .take_outputs()
                .contains(&EngineOutput::Finished(FinishOutcome::Close))
        );
    }

    #[test]
    fn empty_script_finishes_immediately() {
        let (mut engine, _) = engine_with(&[]);
        engine.load("empty", document(json!({"events": []})));
        assert_eq!(engine.state(), &EngineState::Finished(FinishOutcome::Complete));
    }

    #[test]
    fn advance_is_ignored_unless_blocked_on_message() {
        let (mut engine, _) = engine_with(&[]);
        assert!(!engine.advance());

        engine.load(
            "sel",
            document(json!({
                "events": [{
                    "eventCommand": "REQUEST_SELECTION",
                    "options": [{"label": "A", "value": "a"}],
                    "storageKey": "pick"
                }]
            })),
        );
        assert!(!engine.advance());
        assert!(matches!(
            engine.state(),
            EngineState::Blocked(Blocker::Selection { .. })
        ));
    }

    #[test]
    fn events_run_in_order_and_non_blocking_auto_advance() {
        let (mut engine, store) = engine_with(&[]);
        engine.load(
            "order",
            document(json!({
                "events": [
                    {"eventCommand": "SET_BACKGROUND", "imagePath": "bg.png"},
                    {"eventCommand": "SHOW_CHARACTER", "position": "LEFT", "sprite": "ann.png"},
                    {"eventCommand": "WRITE_VALUE", "target": "seen", "value": true},
                    {"eventCommand": "UNKNOWN_THING"},
                    {"eventCommand": "SHOW_MESSAGE", "message": "one"},
                    {"eventCommand": "CLEAR_MESSAGE"},
                    {"eventCommand": "HIDE_CHARACTER", "position": "LEFT"},
                    {"eventCommand": "SHOW_MESSAGE", "message": "two"}
                ]
            })),
        );

        let outputs = engine.take_outputs();
        assert_eq!(outputs[0], EngineOutput::BackgroundChanged(Some("bg.png".into())));
        assert!(matches!(outputs[1], EngineOutput::CharacterShown { .. }));
        assert!(matches!(
            &outputs[3],
            EngineOutput::Diagnostic(Diagnostic::Skipped { command, .. }) if command == "UNKNOWN_THING"
        ));
        assert_eq!(shown_texts(&outputs), vec!["one"]);
        assert_eq!(store.get("seen").as_deref(), Some("true"));

        engine.advance();
        let outputs = engine.take_outputs();
        assert_eq!(outputs[0], EngineOutput::MessageCleared);
        assert_eq!(shown_texts(&outputs), vec!["two"]);
        assert!(engine.presentation().characters.is_empty());
        assert_eq!(engine.presentation().background.as_deref(), Some("bg.png"));
    }

    #[test]
    fn selection_stores_value_and_next_script_override() {
        let (mut engine, store) = engine_with(&[]);
        engine.load(
            "branch",
            document(json!({
                "events": [{
                    "eventCommand": "REQUEST_SELECTION",
                    "options": [
                        {"label": "Stay", "value": "stay"},
                        {"label": "Go", "value": "go", "nextScriptId": "s2"}
                    ],
                    "storageKey": "route"
                }],
                "finishEvent": {"nextScene": "DIALOG", "nextScript": "{route}"}
            })),
        );

        assert!(!engine.select("missing"));
        assert!(engine.select("go"));
        assert_eq!(store.get("route").as_deref(), Some("go"));
        assert_eq!(
            engine.state(),
            &EngineState::Finished(FinishOutcome::Navigate {
                scene: "DIALOG".into(),
                script: "s2".into()
            })
        );
        assert_eq!(store.get("route_nextScriptId"), None);
    }

    #[test]
    fn unresolved_next_script_is_invalid() {
        let (mut engine, _) = engine_with(&[]);
        engine.load(
            "bad",
            document(json!({
                "events": [],
                "finishEvent": {"nextScene": "DIALOG", "nextScript": "{nowhere}"}
            })),
        );
        assert!(matches!(
            engine.state(),
            EngineState::Finished(FinishOutcome::Invalid { .. })
        ));
    }

    #[test]
    fn selection_append_and_value_type() {
        let (mut engine, store) = engine_with(&[("party", "ann")]);
        engine.load(
            "party",
            document(json!({
                "events": [{
                    "eventCommand": "REQUEST_SELECTION",
                    "option": [{"label": "Bo", "value": "bo"}],
                    "storageKey": "party",
                    "actionToStorage": "APPEND"
                }, {
                    "eventCommand": "REQUEST_SELECTION",
                    "options": [{"label": "Five", "value": "5.0"}],
                    "storageKey": "gold",
                    "valueType": "NUMBER"
                }]
            })),
        );
        assert!(engine.select_index(0));
        assert!(engine.select_index(0));
        assert_eq!(store.get("party").as_deref(), Some("ann,bo"));
        assert_eq!(store.get("gold").as_deref(), Some("5"));
    }

    #[test]
    fn injection_runs_nested_events_then_resumes() {
        let (mut engine, _) = engine_with(&[]);
        engine.load(
            "outer",
            document(json!({
                "events": [
                    {
                        "eventCommand": "REQUEST_SELECTION",
                        "options": [{"label": "Ask", "value": "ask", "injectScript": "aside"}],
                        "storageKey": "q"
                    },
                    {"eventCommand": "SHOW_MESSAGE", "message": "outer-after"}
                ]
            })),
        );
        engine.take_outputs();

        engine.select("ask");
        let outputs = engine.take_outputs();
        let Some(EngineOutput::InjectionRequested { token, script }) = outputs.last().cloned() else {
            panic!("expected an injection request, got {outputs:?}");
        };
        assert_eq!(script, "aside");

        let aside = document(json!({
            "events": [{"eventCommand": "SHOW_MESSAGE", "message": "inner"}],
            "finishEvent": {"shouldClose": true}
        }));
        assert!(engine.inject_events(token, aside.events));
        assert_eq!(engine.depth(), 2);
        assert_eq!(engine.current_source(), Some("aside"));
        assert_eq!(shown_texts(&engine.take_outputs()), vec!["inner"]);

        engine.advance();
        assert_eq!(engine.depth(), 1);
        assert_eq!(shown_texts(&engine.take_outputs()), vec!["outer-after"]);

        engine.advance();
        assert_eq!(engine.state(), &EngineState::Finished(FinishOutcome::Complete));
    }

    #[test]
    fn failed_injection_skips_past_selection() {
        let (mut engine, _) = engine_with(&[]);
        engine.load(
            "outer",
            document(json!({
                "events": [
                    {
                        "eventCommand": "REQUEST_SELECTION",
                        "options": [{"label": "Ask", "value": "ask", "injectScript": "gone"}],
                        "storageKey": "q"
                    },
                    {"eventCommand": "SHOW_MESSAGE", "message": "after"}
                ]
            })),
        );
        engine.select("ask");
        let EngineState::AwaitingInjection { token, .. } = engine.state().clone() else {
            panic!("expected to await injection");
        };
        engine.take_outputs();

        assert!(engine.skip_injection(token, "not found"));
        let outputs = engine.take_outputs();
        assert!(matches!(
            outputs[0],
            EngineOutput::Diagnostic(Diagnostic::InjectionFailed { .. })
        ));
        assert_eq!(shown_texts(&outputs), vec!["after"]);
        assert!(!engine.skip_injection(token, "again"));
    }

    #[test]
    fn option_menu_injects_without_storing() {
        let (mut engine, store) = engine_with(&[]);
        engine.load(
            "menu",
            document(json!({
                "events": [
                    {
                        "eventCommand": "SHOW_OPTION",
                        "options": [
                            {"text": "Ask", "fallback": {"optionCommand": "INJECT_SCRIPT", "script": "aside"}},
                            {"text": "Leave", "fallback": {"optionCommand": "CONTINUE"}}
                        ]
                    },
                    {"eventCommand": "SHOW_MESSAGE", "message": "after"}
                ]
            })),
        );
        assert!(matches!(
            engine.take_outputs().last(),
            Some(EngineOutput::SelectionRequested { options, .. }) if options.len() == 2
        ));

        assert!(engine.select("Ask"));
        let outputs = engine.take_outputs();
        assert!(matches!(
            outputs.last(),
            Some(EngineOutput::InjectionRequested { script, .. }) if script == "aside"
        ));
        assert_eq!(store.get(""), None);
        assert_eq!(store.get("_nextScriptId"), None);

        engine.load(
            "menu",
            document(json!({
                "events": [
                    {
                        "eventCommand": "SHOW_OPTION",
                        "options": [{"text": "Leave", "fallback": {"optionCommand": "CONTINUE"}}]
                    },
                    {"eventCommand": "SHOW_MESSAGE", "message": "after"}
                ]
            })),
        );
        engine.take_outputs();
        assert!(engine.select_index(0));
        assert_eq!(shown_texts(&engine.take_outputs()), vec!["after"]);
    }

    #[test]
    fn injection_depth_is_bounded() {
        let (engine, _) = engine_with(&[]);
        let mut engine = engine.with_max_injection_depth(1);
        engine.load(
            "outer",
            document(json!({
                "events": [{
                    "eventCommand": "REQUEST_SELECTION",
                    "options": [{"label": "Ask", "value": "ask", "injectScript": "aside"}],
                    "storageKey": "q"
                }]
            })),
        );
        engine.select("ask");
        assert!(engine.is_finished());
    }

    #[test]
    fn wait_suspends_until_matching_token() {
        let (mut engine, _) = engine_with(&[]);
        engine.load(
            "pause",
            document(json!({
                "events": [
                    {"eventCommand": "WAIT", "time": 500},
                    {"eventCommand": "WAIT"},
                    {"eventCommand": "SHOW_MESSAGE", "message": "done"}
                ]
            })),
        );
        let outputs = engine.take_outputs();
        let Some(EngineOutput::Wait { token, millis }) = outputs.first().cloned() else {
            panic!("expected a wait");
        };
        assert_eq!(millis, 500);

        assert!(!engine.advance());
        assert!(!engine.finish_wait(WaitToken(token.0 + 100)));
        assert!(engine.finish_wait(token));
        assert_eq!(shown_texts(&engine.take_outputs()), vec!["done"]);
        assert!(!engine.finish_wait(token));
    }

    #[test]
    fn stale_load_is_ignored_and_reset_is_complete() {
        let (mut engine, _) = engine_with(&[]);
        let first = engine.begin_load("first");
        let second = engine.begin_load("second");

        let late = document(json!({"events": [{"eventCommand": "SHOW_MESSAGE", "message": "stale"}]}));
        assert!(!engine.complete_load(first, Ok(late)));

        let fresh = document(json!({"events": [{"eventCommand": "SHOW_MESSAGE", "message": "fresh"}]}));
        assert!(engine.complete_load(second, Ok(fresh)));
        assert_eq!(
            engine.presentation().message.as_ref().map(|m| m.text.as_str()),
            Some("fresh")
        );

        engine.begin_load("third");
        assert_eq!(engine.presentation().message, None);
        assert_eq!(engine.depth(), 0);
        assert!(engine.take_outputs().is_empty());
    }

    #[test]
    fn load_failure_is_visible() {
        let (mut engine, _) = engine_with(&[]);
        let ticket = engine.begin_load("missing");
        engine.complete_load(
            ticket,
            Err(ScriptError::Fetch {
                script_id: "missing".into(),
                message: "404".into(),
            }),
        );
        assert!(matches!(engine.state(), EngineState::Failed { script_id, .. } if script_id == "missing"));
        assert!(matches!(
            engine.take_outputs().as_slice(),
            [EngineOutput::LoadFailed { .. }]
        ));
    }

    #[test]
    fn conditions_gate_events() {
        let (mut engine, _) = engine_with(&[("story.main", "1")]);
        engine.load(
            "gated",
            document(json!({
                "events": [
                    {"eventCommand": "SHOW_MESSAGE", "message": "late", "condition": "story.main >= 2"},
                    {"eventCommand": "SHOW_MESSAGE", "message": "odd", "condition": "nonsense"}
                ]
            })),
        );
        let outputs = engine.take_outputs();
        assert!(matches!(
            outputs[0],
            EngineOutput::Diagnostic(Diagnostic::Skipped {
                reason: SkipReason::ConditionFailed(_),
                ..
            })
        ));
        assert!(matches!(
            outputs[1],
            EngineOutput::Diagnostic(Diagnostic::PermissiveCondition { .. })
        ));
        assert_eq!(shown_texts(&outputs), vec!["odd"]);
    }

    #[test]
    fn input_confirm_and_cancel() {
        let (mut engine, store) = engine_with(&[]);
        engine.load(
            "ask",
            document(json!({
                "events": [{
                    "eventCommand": "REQUEST_INPUT",
                    "inputType": "number",
                    "targetField": "age",
                    "confirmMessage": "You are {value}?"
                }]
            })),
        );
        engine.take_outputs();

        assert!(!engine.confirm_input());
        assert!(!engine.submit_input("old"));
        assert!(matches!(
            engine.take_outputs().as_slice(),
            [EngineOutput::InputRejected { .. }]
        ));

        assert!(engine.submit_input("30"));
        assert_eq!(
            engine.take_outputs(),
            vec![EngineOutput::InputConfirmation {
                value: "30".into(),
                message: "You are 30?".into()
            }]
        );
        assert!(engine.cancel_input());
        assert_eq!(store.get("age"), None);

        assert!(engine.submit_input("31"));
        assert!(engine.confirm_input());
        assert_eq!(store.get("age").as_deref(), Some("31"));
        assert!(engine.is_finished());
    }

    #[test]
    fn history_deduplicates_by_event_id() {
        let (mut engine, _) = engine_with(&[]);
        let script = json!({
            "events": [{"eventCommand": "SHOW_MESSAGE", "message": "hello", "id": "m1"}]
        });
        engine.load("a", document(script.clone()));
        engine.advance();
        engine.load("a", document(script));
        assert_eq!(engine.history().messages().count(), 1);
    }

    #[test]
    fn finish_event_can_invoke_scene() {
        let (mut engine, _) = engine_with(&[]);
        engine.load(
            "to-town",
            document(json!({
                "events": [],
                "finishEvent": {"eventCommand": "INVOKE_SCENE", "scene": "town", "sceneResource": "/town/t.json"}
            })),
        );
        assert_eq!(
            engine.state(),
            &EngineState::Finished(FinishOutcome::InvokeScene {
                scene: Scene::Town,
                resource: Some("/town/t.json".into())
            })
        );
    }
}

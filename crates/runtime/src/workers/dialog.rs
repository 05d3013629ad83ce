//! Dialog worker that drives the [`ScriptEngine`].
//!
//! The engine itself is synchronous; this worker performs what it asks for
//! (script fetches, timed waits, injected scripts) and feeds the results back
//! with the tokens the engine handed out, so stale completions are dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use game_core::script::{
    ConsoleLevel, Diagnostic, InjectionToken, LoadTicket, SkipReason, WaitToken,
};
use game_core::{EngineOutput, FinishOutcome, SceneCommand, ScriptDocument, ScriptEngine, ScriptError};

use crate::api::{DialogSnapshot, Result, TheaterHandle};
use crate::content::ContentLibrary;
use crate::events::{Event, EventBus};

/// Scene name that routes a finish event to another dialog script.
pub const DIALOG_SCENE: &str = "DIALOG";

/// Commands that can be sent to the dialog worker
pub enum DialogCommand {
    /// Load the script bound to a chat scene resource.
    Open { resource: String },
    /// Load a script from the dialog-script collection.
    LoadScript { script_id: String },
    Advance {
        reply: oneshot::Sender<bool>,
    },
    Select {
        value: String,
        reply: oneshot::Sender<bool>,
    },
    SelectIndex {
        index: usize,
        reply: oneshot::Sender<bool>,
    },
    SubmitInput {
        text: String,
        reply: oneshot::Sender<bool>,
    },
    ConfirmInput {
        reply: oneshot::Sender<bool>,
    },
    CancelInput {
        reply: oneshot::Sender<bool>,
    },
    Close,
    Snapshot {
        reply: oneshot::Sender<DialogSnapshot>,
    },
    Shutdown,
}

enum Completion {
    Loaded {
        ticket: LoadTicket,
        script_id: String,
        result: Result<ScriptDocument>,
    },
    WaitElapsed {
        token: WaitToken,
    },
    Injection {
        token: InjectionToken,
        result: Result<ScriptDocument>,
    },
}

/// Background task that owns the script engine.
pub struct DialogWorker {
    engine: ScriptEngine,
    library: ContentLibrary,
    theater: TheaterHandle,
    event_bus: EventBus,
    timer: Option<JoinHandle<()>>,
    command_rx: mpsc::UnboundedReceiver<DialogCommand>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl DialogWorker {
    pub fn new(
        engine: ScriptEngine,
        library: ContentLibrary,
        theater: TheaterHandle,
        event_bus: EventBus,
        command_rx: mpsc::UnboundedReceiver<DialogCommand>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            library,
            theater,
            event_bus,
            timer: None,
            command_rx,
            completion_tx,
            completion_rx,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(DialogCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
            }
            self.drain_outputs().await;
        }
        self.cancel_timer();
        debug!(target: "runtime::dialog", "Dialog worker stopped");
    }

    fn handle_command(&mut self, cmd: DialogCommand) {
        match cmd {
            DialogCommand::Open { resource } => {
                info!(target: "runtime::dialog", resource = %resource, "Opening chat script");
                let ticket = self.begin_load(&resource);
                let library = self.library.clone();
                self.spawn(async move {
                    let result = library.scene_script(&resource).await;
                    Completion::Loaded {
                        ticket,
                        script_id: resource,
                        result,
                    }
                });
            }
            DialogCommand::LoadScript { script_id } => self.load_script(script_id),
            DialogCommand::Advance { reply } => {
                let _ = reply.send(self.engine.advance());
            }
            DialogCommand::Select { value, reply } => {
                let _ = reply.send(self.engine.select(&value));
            }
            DialogCommand::SelectIndex { index, reply } => {
                let _ = reply.send(self.engine.select_index(index));
            }
            DialogCommand::SubmitInput { text, reply } => {
                let _ = reply.send(self.engine.submit_input(&text));
            }
            DialogCommand::ConfirmInput { reply } => {
                let _ = reply.send(self.engine.confirm_input());
            }
            DialogCommand::CancelInput { reply } => {
                let _ = reply.send(self.engine.cancel_input());
            }
            DialogCommand::Close => {
                debug!(target: "runtime::dialog", "Dialog closed");
                self.cancel_timer();
                self.engine.reset();
            }
            DialogCommand::Snapshot { reply } => {
                let _ = reply.send(DialogSnapshot {
                    script_id: self.engine.script_id().map(str::to_owned),
                    state: self.engine.state().clone(),
                    presentation: self.engine.presentation().clone(),
                    history: self.engine.history().entries().to_vec(),
                });
            }
            DialogCommand::Shutdown => {}
        }
    }

    fn begin_load(&mut self, script_id: &str) -> LoadTicket {
        self.cancel_timer();
        self.engine.begin_load(script_id)
    }

    fn load_script(&mut self, script_id: String) {
        info!(target: "runtime::dialog", script = %script_id, "Loading dialog script");
        let ticket = self.begin_load(&script_id);
        let library = self.library.clone();
        self.spawn(async move {
            let result = library.dialog_script(&script_id).await;
            Completion::Loaded {
                ticket,
                script_id,
                result,
            }
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Loaded {
                ticket,
                script_id,
                result,
            } => {
                let result = result.map_err(|err| ScriptError::Fetch {
                    script_id: script_id.clone(),
                    message: err.to_string(),
                });
                if !self.engine.complete_load(ticket, result) {
                    debug!(target: "runtime::dialog", script = %script_id, "Stale script load ignored");
                }
            }
            Completion::WaitElapsed { token } => {
                if !self.engine.finish_wait(token) {
                    debug!(target: "runtime::dialog", "Stale wait ignored");
                }
            }
            Completion::Injection { token, result } => {
                let applied = match result {
                    Ok(document) => self.engine.inject_events(token, document.events),
                    Err(err) => self.engine.skip_injection(token, err.to_string()),
                };
                if !applied {
                    debug!(target: "runtime::dialog", "Stale injection ignored");
                }
            }
        }
    }

    /// Publishes engine output and carries out its requests.
    async fn drain_outputs(&mut self) {
        loop {
            let outputs = self.engine.take_outputs();
            if outputs.is_empty() {
                break;
            }
            for output in outputs {
                self.event_bus.publish(Event::Dialog(output.clone()));
                self.react(output).await;
            }
        }
    }

    async fn react(&mut self, output: EngineOutput) {
        match output {
            EngineOutput::Wait { token, millis } => {
                self.cancel_timer();
                let completion_tx = self.completion_tx.clone();
                self.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    let _ = completion_tx.send(Completion::WaitElapsed { token });
                }));
            }
            EngineOutput::InjectionRequested { token, script } => {
                debug!(target: "runtime::dialog", script = %script, "Fetching injected script");
                let library = self.library.clone();
                self.spawn(async move {
                    let result = library.dialog_script(&script).await;
                    Completion::Injection { token, result }
                });
            }
            EngineOutput::Console { level, message } => match level {
                ConsoleLevel::Info => info!(target: "runtime::dialog::console", "{message}"),
                ConsoleLevel::Warning => warn!(target: "runtime::dialog::console", "{message}"),
                ConsoleLevel::Error => error!(target: "runtime::dialog::console", "{message}"),
            },
            EngineOutput::Diagnostic(diagnostic) => log_diagnostic(&diagnostic),
            EngineOutput::LoadFailed { script_id, message } => {
                error!(target: "runtime::dialog", script = %script_id, "Script load failed: {message}");
            }
            EngineOutput::Finished(outcome) => self.finish(outcome).await,
            _ => {}
        }
    }

    async fn finish(&mut self, outcome: FinishOutcome) {
        let command = match outcome {
            FinishOutcome::Close => SceneCommand::hide(game_core::Scene::Chat),
            FinishOutcome::Navigate { scene, script } => {
                if scene == DIALOG_SCENE {
                    self.load_script(script);
                } else {
                    warn!(target: "runtime::dialog", scene = %scene, "Unknown next scene");
                }
                return;
            }
            FinishOutcome::InvokeScene { scene, resource } => SceneCommand::InvokeScene {
                scene,
                scene_resource: resource,
            },
            FinishOutcome::Complete => {
                debug!(target: "runtime::dialog", "Script finished");
                return;
            }
            FinishOutcome::Invalid { reason } => {
                error!(target: "runtime::dialog", "Invalid finish event: {reason}");
                return;
            }
        };

        if let Err(err) = self.theater.dispatch(command).await {
            error!(target: "runtime::dialog", error = %err, "Failed to dispatch finish command");
        }
    }

    fn spawn<F>(&self, fetch: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let _ = completion_tx.send(fetch.await);
        });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::Skipped { command, reason } => match reason {
            SkipReason::Unrecognized(reason) => {
                warn!(target: "runtime::dialog", command = %command, "Event skipped: {reason}")
            }
            SkipReason::ConditionFailed(condition) => {
                debug!(target: "runtime::dialog", command = %command, condition = %condition, "Event skipped")
            }
        },
        Diagnostic::PermissiveCondition { condition, error } => warn!(
            target: "runtime::dialog",
            condition = %condition,
            error = %error,
            "Malformed condition treated as true"
        ),
        Diagnostic::StoreFailed { key, error } => {
            error!(target: "runtime::dialog", key = %key, error = %error, "Store write failed")
        }
        Diagnostic::InjectionFailed { script, reason } => {
            warn!(target: "runtime::dialog", script = %script, "Injection skipped: {reason}")
        }
    }
}

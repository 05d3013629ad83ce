//! Theater worker that owns the authoritative [`SceneState`].
//!
//! Scene commands are processed strictly one at a time in FIFO order. A
//! command that needs content (the init document, a script module) marks the
//! queue as in flight; later commands wait until the fetch resolves. Commands
//! produced by an init document or a script module are run ahead of anything
//! queued after the command that produced them.
//!
//! Town, battlefield and rogue resources are fetched off the queue once shown.
//! A fetch only applies while its scene is still visible with the same
//! resource; hiding a scene or showing it again makes earlier fetches stale.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use game_core::condition::{self, Verdict};
use game_core::{
    InitDocument, KeyValueStore, QueuedCommand, Scene, SceneCommand, SceneDocument, SceneState,
    ScriptModule, TheaterEvent, TownDocument,
};

use crate::api::{DialogHandle, Result, RuntimeError, TheaterSnapshot};
use crate::config::RuntimeConfig;
use crate::content::ContentLibrary;
use crate::events::{Event, EventBus, LifecycleEvent, SceneEvent};

/// Nesting limit for `INVOKE_SCRIPT` commands issued by script modules.
pub const MAX_MODULE_DEPTH: usize = 8;

/// Commands that can be sent to the theater worker
pub enum Command {
    /// Append scene commands to the queue.
    Enqueue { commands: Vec<QueuedCommand> },
    /// Handle a top-level theater event.
    Event { event: TheaterEvent },
    /// Current state, answered immediately.
    Snapshot {
        reply: oneshot::Sender<TheaterSnapshot>,
    },
    /// State once the queue is empty and nothing is in flight.
    Settled {
        reply: oneshot::Sender<TheaterSnapshot>,
    },
    Shutdown,
}

enum Pending {
    Command { command: QueuedCommand, depth: usize },
    LoadInit,
}

enum Completion {
    Init(Result<InitDocument>),
    Module {
        script: String,
        entry_point: String,
        depth: usize,
        result: Result<ScriptModule>,
    },
    Render {
        scene: Scene,
        resource: String,
        generation: u64,
        result: Result<Rendered>,
    },
}

enum Rendered {
    Town(TownDocument),
    Scene(SceneDocument),
}

/// Background task that processes scene commands.
pub struct TheaterWorker {
    scenes: SceneState,
    queue: VecDeque<Pending>,
    in_flight: bool,
    settled_waiters: Vec<oneshot::Sender<TheaterSnapshot>>,
    render_generations: BTreeMap<Scene, u64>,
    close_hooks: BTreeMap<Scene, Vec<QueuedCommand>>,
    store: Arc<dyn KeyValueStore>,
    library: ContentLibrary,
    dialog: DialogHandle,
    event_bus: EventBus,
    progress_key: String,
    initial_chapter: String,
    command_rx: mpsc::Receiver<Command>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl TheaterWorker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        library: ContentLibrary,
        dialog: DialogHandle,
        event_bus: EventBus,
        config: &RuntimeConfig,
        command_rx: mpsc::Receiver<Command>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            scenes: SceneState::new(),
            queue: VecDeque::new(),
            in_flight: false,
            settled_waiters: Vec::new(),
            render_generations: BTreeMap::new(),
            close_hooks: BTreeMap::new(),
            store,
            library,
            dialog,
            event_bus,
            progress_key: config.progress_key.clone(),
            initial_chapter: config.initial_chapter.clone(),
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
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
            }
            self.pump().await;
        }
        debug!(target: "runtime::theater", "Theater worker stopped");
    }

    fn snapshot(&self) -> TheaterSnapshot {
        TheaterSnapshot {
            scenes: self.scenes.clone(),
            pending: self.queue.len(),
            in_flight: self.in_flight,
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue { commands } => {
                self.queue.extend(
                    commands
                        .into_iter()
                        .map(|command| Pending::Command { command, depth: 0 }),
                );
            }
            Command::Event { event } => self.handle_event(event).await,
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Settled { reply } => self.settled_waiters.push(reply),
            Command::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: TheaterEvent) {
        let lifecycle = match event {
            TheaterEvent::ChangeScene { payload } => {
                let previous = self.scenes.visible_scenes();
                self.scenes.replace_visibility(&payload);
                info!(target: "runtime::theater", "Scene visibility replaced");
                self.publish_scene_change();
                self.scenes_hidden(&previous).await;
                return;
            }
            TheaterEvent::StartGame => {
                info!(target: "runtime::theater", "Starting game");
                self.queue.push_back(Pending::LoadInit);
                LifecycleEvent::GameStarted
            }
            TheaterEvent::LoadGame => LifecycleEvent::LoadRequested,
            TheaterEvent::ShowSettings => LifecycleEvent::SettingsRequested,
            TheaterEvent::ExitGame => LifecycleEvent::ExitRequested,
        };
        debug!(target: "runtime::theater", event = ?lifecycle, "Lifecycle event");
        self.event_bus
            .publish(Event::Scene(SceneEvent::Lifecycle(lifecycle)));
    }

    /// Runs queued commands until the queue empties or one goes in flight.
    async fn pump(&mut self) {
        while !self.in_flight {
            let Some(pending) = self.queue.pop_front() else {
                break;
            };
            match pending {
                Pending::LoadInit => {
                    let library = self.library.clone();
                    self.spawn_fetch(async move { Completion::Init(library.init().await) });
                    self.in_flight = true;
                }
                Pending::Command { command, depth } => self.process(command, depth).await,
            }
        }

        if !self.in_flight && self.queue.is_empty() && !self.settled_waiters.is_empty() {
            let snapshot = self.snapshot();
            for waiter in self.settled_waiters.drain(..) {
                let _ = waiter.send(snapshot.clone());
            }
        }
    }

    async fn process(&mut self, queued: QueuedCommand, depth: usize) {
        let (condition, command) = match queued {
            QueuedCommand::Unrecognized { command, reason } => {
                warn!(
                    target: "runtime::theater",
                    command = %command,
                    reason = %reason,
                    "Unknown scene command skipped"
                );
                self.skipped(command, reason);
                return;
            }
            QueuedCommand::Command { condition, command } => (condition, command),
        };

        match condition::check(condition.as_deref(), self.store.as_ref()) {
            Verdict::Pass => {}
            Verdict::Fail => {
                let condition = condition.unwrap_or_default();
                info!(
                    target: "runtime::theater",
                    command = command.name(),
                    condition = %condition,
                    "Command skipped due to condition"
                );
                self.skipped(command.name(), format!("condition '{condition}' is false"));
                return;
            }
            Verdict::Permissive(err) => {
                warn!(
                    target: "runtime::theater",
                    command = command.name(),
                    error = %err,
                    "Malformed condition, running command anyway"
                );
            }
        }

        self.execute(command, depth).await;
    }

    async fn execute(&mut self, command: SceneCommand, depth: usize) {
        match command {
            SceneCommand::InvokeScene {
                scene,
                scene_resource,
            } => {
                info!(target: "runtime::theater", scene = %scene, resource = ?scene_resource, "Invoke scene");
                let previous = self.scenes.visible_scenes();
                self.scenes.invoke(scene, scene_resource.clone());
                self.publish_scene_change();
                self.scenes_hidden(&previous).await;
                self.scene_shown(scene, scene_resource).await;
            }
            SceneCommand::StackScene {
                scene,
                scene_resource,
            } => {
                info!(target: "runtime::theater", scene = %scene, resource = ?scene_resource, "Stack scene");
                self.scenes.stack(scene, scene_resource.clone());
                self.publish_scene_change();
                self.scene_shown(scene, scene_resource).await;
            }
            SceneCommand::HideScene { scene } => {
                info!(target: "runtime::theater", scene = %scene, "Hide scene");
                let previous = self.scenes.visible_scenes();
                let on_closed = if self.scenes.is_visible(scene) {
                    self.close_hooks.remove(&scene)
                } else {
                    None
                };
                self.scenes.hide(scene);
                self.publish_scene_change();
                self.scenes_hidden(&previous).await;
                if let Some(commands) = on_closed {
                    debug!(target: "runtime::theater", scene = %scene, commands = commands.len(), "Running close hooks");
                    self.run_next(commands, 0);
                }
            }
            SceneCommand::InvokeScript {
                script,
                entry_point,
            } => {
                if depth >= MAX_MODULE_DEPTH {
                    let err = RuntimeError::ModuleDepthExceeded {
                        script,
                        limit: MAX_MODULE_DEPTH,
                    };
                    error!(target: "runtime::theater", error = %err, "Script module rejected");
                    self.skipped("INVOKE_SCRIPT", err.to_string());
                    return;
                }
                debug!(target: "runtime::theater", script = %script, entry_point = %entry_point, "Loading script module");
                let library = self.library.clone();
                self.spawn_fetch(async move {
                    let result = library.script_module(&script).await;
                    Completion::Module {
                        script,
                        entry_point,
                        depth,
                        result,
                    }
                });
                self.in_flight = true;
            }
            SceneCommand::ResetState => {
                match self.store.set(&self.progress_key, &self.initial_chapter) {
                    Ok(()) => info!(
                        target: "runtime::theater",
                        key = %self.progress_key,
                        chapter = %self.initial_chapter,
                        "Progress reset"
                    ),
                    Err(err) => {
                        error!(target: "runtime::theater", error = %err, "Failed to reset progress")
                    }
                }
            }
            SceneCommand::WriteValue {
                target,
                operation,
                value,
            } => match operation.apply(self.store.as_ref(), &target, &value) {
                Ok(()) => {
                    debug!(target: "runtime::theater", key = %target, operation = %operation, "Value written")
                }
                Err(err) => {
                    error!(target: "runtime::theater", key = %target, error = %err, "Failed to write value")
                }
            },
        }
    }

    /// Follow-up work for scenes that render a resource.
    async fn scene_shown(&mut self, scene: Scene, resource: Option<String>) {
        let Some(resource) = resource else {
            return;
        };
        match scene {
            Scene::Chat => {
                if let Err(err) = self.dialog.open(resource).await {
                    error!(target: "runtime::theater", error = %err, "Failed to open dialog");
                }
            }
            Scene::Town => {
                let generation = self.next_render(scene);
                let library = self.library.clone();
                self.spawn_fetch(async move {
                    let result = library.town(&resource).await.map(Rendered::Town);
                    Completion::Render {
                        scene,
                        resource,
                        generation,
                        result,
                    }
                });
            }
            Scene::Battlefield | Scene::Rogue => {
                let generation = self.next_render(scene);
                // Battlefield resources without the marker are rendered by the stage.
                if scene == Scene::Battlefield && !resource.contains("battlefield") {
                    return;
                }
                let library = self.library.clone();
                self.spawn_fetch(async move {
                    let result = library
                        .scene_document(&resource)
                        .await
                        .map(Rendered::Scene);
                    Completion::Render {
                        scene,
                        resource,
                        generation,
                        result,
                    }
                });
            }
            _ => {}
        }
    }

    /// Cleanup for every scene visible in `previous` that no longer is.
    async fn scenes_hidden(&mut self, previous: &[Scene]) {
        let hidden: Vec<Scene> = previous
            .iter()
            .copied()
            .filter(|scene| !self.scenes.is_visible(*scene))
            .collect();
        for scene in hidden {
            self.next_render(scene);
            if scene == Scene::Chat {
                if let Err(err) = self.dialog.close().await {
                    error!(target: "runtime::theater", error = %err, "Failed to close dialog");
                }
            }
        }
    }

    /// Invalidates in-flight renders of `scene` and forgets its close hooks.
    fn next_render(&mut self, scene: Scene) -> u64 {
        self.close_hooks.remove(&scene);
        let generation = self.render_generations.entry(scene).or_default();
        *generation += 1;
        *generation
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Init(result) => {
                self.in_flight = false;
                match result {
                    Ok(init) => {
                        info!(target: "runtime::theater", commands = init.commands.len(), "Init document loaded");
                        self.run_next(init.commands, 0);
                    }
                    Err(err) => {
                        error!(target: "runtime::theater", error = %err, "Failed to load init document");
                        self.skipped("START_GAME", err.to_string());
                    }
                }
            }
            Completion::Module {
                script,
                entry_point,
                depth,
                result,
            } => {
                self.in_flight = false;
                let commands = result.and_then(|module| {
                    module
                        .entry_point(&entry_point)
                        .map(<[QueuedCommand]>::to_vec)
                        .ok_or_else(|| RuntimeError::MissingEntryPoint {
                            script: script.clone(),
                            entry_point: entry_point.clone(),
                        })
                });
                match commands {
                    Ok(commands) => {
                        debug!(
                            target: "runtime::theater",
                            script = %script,
                            entry_point = %entry_point,
                            commands = commands.len(),
                            "Running script module entry point"
                        );
                        self.run_next(commands, depth + 1);
                    }
                    Err(err) => {
                        error!(target: "runtime::theater", script = %script, error = %err, "Failed to run script module");
                        self.skipped("INVOKE_SCRIPT", err.to_string());
                    }
                }
            }
            Completion::Render {
                scene,
                resource,
                generation,
                result,
            } => {
                if self.render_generations.get(&scene) != Some(&generation)
                    || !self.scenes.is_visible(scene)
                    || self.scenes.resource(scene) != Some(resource.as_str())
                {
                    debug!(target: "runtime::theater", scene = %scene, resource = %resource, "Stale render ignored");
                    return;
                }
                match result {
                    Ok(Rendered::Town(town)) => self.town_loaded(resource, town),
                    Ok(Rendered::Scene(document)) => self.scene_loaded(scene, resource, document),
                    Err(err) => {
                        error!(target: "runtime::theater", scene = %scene, resource = %resource, error = %err, "Failed to render scene");
                        self.skipped(scene.to_string().to_uppercase(), err.to_string());
                    }
                }
            }
        }
    }

    fn scene_loaded(&mut self, scene: Scene, resource: String, document: SceneDocument) {
        info!(target: "runtime::theater", scene = %scene, resource = %resource, "Scene rendered");
        self.event_bus
            .publish(Event::Scene(SceneEvent::Rendered { scene, resource }));
        if !document.on_closed.is_empty() {
            self.close_hooks.insert(scene, document.on_closed);
        }
        self.queue.extend(
            document
                .on_render_completed
                .into_iter()
                .map(|command| Pending::Command { command, depth: 0 }),
        );
    }

    fn town_loaded(&mut self, resource: String, town: TownDocument) {
        let enabled_locations = town
            .enabled_locations(self.store.as_ref())
            .map(|(key, _)| key.to_owned())
            .collect();
        info!(target: "runtime::theater", resource = %resource, "Town rendered");
        self.event_bus
            .publish(Event::Scene(SceneEvent::TownLoaded {
                resource,
                town_name: town.town_name,
                background: town.background_resource,
                enabled_locations,
            }));
        self.queue.extend(
            town.on_render_completed
                .into_iter()
                .map(|command| Pending::Command { command, depth: 0 }),
        );
    }

    /// Puts `commands` at the front of the queue, keeping their order.
    fn run_next(&mut self, commands: Vec<QueuedCommand>, depth: usize) {
        for command in commands.into_iter().rev() {
            self.queue.push_front(Pending::Command { command, depth });
        }
    }

    fn spawn_fetch<F>(&self, fetch: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let _ = completion_tx.send(fetch.await);
        });
    }

    fn skipped(&self, command: impl Into<String>, reason: impl Into<String>) {
        self.event_bus
            .publish(Event::Scene(SceneEvent::CommandSkipped {
                command: command.into(),
                reason: reason.into(),
            }));
    }

    fn publish_scene_change(&self) {
        self.event_bus.publish(Event::Scene(SceneEvent::Changed {
            visible: self.scenes.visible_scenes(),
            resources: self.scenes.resources().clone(),
        }));
    }
}

//! Cloneable façades for issuing commands to the runtime workers.
//!
//! [`TheaterHandle`] drives scene commands and top-level theater events.
//! [`DialogHandle`] forwards user input to the script engine. Both hide the
//! channel plumbing behind async helpers.
use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc, oneshot};

use game_core::script::{HistoryEntry, Presentation};
use game_core::{EngineState, QueuedCommand, SceneState, TheaterEvent};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::workers::{DialogCommand, TheaterCommand};

/// Read-only view of the theater worker.
#[derive(Clone, Debug, PartialEq)]
pub struct TheaterSnapshot {
    pub scenes: SceneState,
    /// Commands still queued.
    pub pending: usize,
    /// Whether a content fetch is blocking the queue.
    pub in_flight: bool,
}

impl TheaterSnapshot {
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && !self.in_flight
    }
}

/// Read-only view of the dialog worker.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogSnapshot {
    pub script_id: Option<String>,
    pub state: EngineState,
    pub presentation: Presentation,
    pub history: Vec<HistoryEntry>,
}

/// Client-facing handle to the theater
#[derive(Clone)]
pub struct TheaterHandle {
    command_tx: mpsc::Sender<TheaterCommand>,
    event_bus: EventBus,
}

impl TheaterHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<TheaterCommand>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn send(&self, command: TheaterCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }

    /// Append one scene command to the queue
    pub async fn dispatch(&self, command: impl Into<QueuedCommand>) -> Result<()> {
        self.send(TheaterCommand::Enqueue {
            commands: vec![command.into()],
        })
        .await
    }

    /// Append several commands; they run in the given order
    pub async fn dispatch_all<I>(&self, commands: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<QueuedCommand>,
    {
        let commands: Vec<QueuedCommand> = commands.into_iter().map(Into::into).collect();
        if commands.is_empty() {
            return Ok(());
        }
        self.send(TheaterCommand::Enqueue { commands }).await
    }

    /// Deliver a top-level theater event (change scene, start game, ...)
    pub async fn emit(&self, event: TheaterEvent) -> Result<()> {
        self.send(TheaterCommand::Event { event }).await
    }

    pub async fn start_game(&self) -> Result<()> {
        self.emit(TheaterEvent::StartGame).await
    }

    /// Current scene state without waiting for the queue
    pub async fn snapshot(&self) -> Result<TheaterSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(TheaterCommand::Snapshot { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Scene state once every queued command has been processed
    ///
    /// Town, battlefield and rogue documents fetched after a scene change are
    /// not part of the queue; their follow-up commands are queued when the
    /// fetch resolves.
    pub async fn settled(&self) -> Result<TheaterSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(TheaterCommand::Settled { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Scene` - Visibility changes, lifecycle and scene renders
    /// - `Topic::Dialog` - Script engine output
    /// - `Topic::Deployment` - Deployment commits and battlefield loads
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.send(TheaterCommand::Shutdown).await
    }
}

/// Client-facing handle to the dialog scene
///
/// Input methods return `false` when the engine was not in a state that
/// accepts that input.
///
/// The command channel is unbounded: the dialog worker dispatches into the
/// theater's bounded queue, so the theater must never wait on the dialog.
#[derive(Clone)]
pub struct DialogHandle {
    command_tx: mpsc::UnboundedSender<DialogCommand>,
}

impl DialogHandle {
    pub(crate) fn new(command_tx: mpsc::UnboundedSender<DialogCommand>) -> Self {
        Self { command_tx }
    }

    fn send(&self, command: DialogCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| RuntimeError::DialogChannelClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> DialogCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx))?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Load the script bound to a chat scene resource
    pub async fn open(&self, resource: impl Into<String>) -> Result<()> {
        self.send(DialogCommand::Open {
            resource: resource.into(),
        })
    }

    /// Load a dialog script by id
    pub async fn load_script(&self, script_id: impl Into<String>) -> Result<()> {
        self.send(DialogCommand::LoadScript {
            script_id: script_id.into(),
        })
    }

    /// Drop the running script and any pending wait or fetch
    pub async fn close(&self) -> Result<()> {
        self.send(DialogCommand::Close)
    }

    pub async fn advance(&self) -> Result<bool> {
        self.request(|reply| DialogCommand::Advance { reply }).await
    }

    pub async fn select(&self, value: impl Into<String>) -> Result<bool> {
        let value = value.into();
        self.request(|reply| DialogCommand::Select { value, reply })
            .await
    }

    pub async fn select_index(&self, index: usize) -> Result<bool> {
        self.request(|reply| DialogCommand::SelectIndex { index, reply })
            .await
    }

    pub async fn submit_input(&self, text: impl Into<String>) -> Result<bool> {
        let text = text.into();
        self.request(|reply| DialogCommand::SubmitInput { text, reply })
            .await
    }

    pub async fn confirm_input(&self) -> Result<bool> {
        self.request(|reply| DialogCommand::ConfirmInput { reply })
            .await
    }

    pub async fn cancel_input(&self) -> Result<bool> {
        self.request(|reply| DialogCommand::CancelInput { reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<DialogSnapshot> {
        self.request(|reply| DialogCommand::Snapshot { reply })
            .await
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        self.send(DialogCommand::Shutdown)
    }
}

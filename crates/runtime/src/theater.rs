//! High-level theater orchestrator.
//!
//! The theater owns the background workers, wires up command/event channels,
//! and exposes a builder-based API for clients to drive scenes and dialogs.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use game_core::{Extent, InMemoryStore, KeyValueStore, ScriptEngine, Viewport};

use crate::api::{DialogHandle, Result, RuntimeError, TheaterHandle};
use crate::config::RuntimeConfig;
use crate::content::{ContentLibrary, ContentStore, FileContentStore};
use crate::events::EventBus;
use crate::repository::FileKeyValueStore;
use crate::stage::StageSession;
use crate::viewport::ScrollDriver;
use crate::workers::{DialogWorker, TheaterWorker};

/// Main runtime that orchestrates scenes and dialogs
///
/// Design: Theater owns workers and coordinates execution.
/// [`TheaterHandle`] and [`DialogHandle`] provide cloneable façades for clients.
pub struct Theater {
    config: RuntimeConfig,
    handle: TheaterHandle,
    dialog: DialogHandle,
    library: ContentLibrary,
    store: Arc<dyn KeyValueStore>,

    // Background workers
    theater_worker_handle: JoinHandle<()>,
    dialog_worker_handle: JoinHandle<()>,
}

impl Theater {
    /// Create a new theater builder
    pub fn builder() -> TheaterBuilder {
        TheaterBuilder::new()
    }

    /// Get a cloneable handle to the scene queue
    pub fn handle(&self) -> TheaterHandle {
        self.handle.clone()
    }

    /// Get a cloneable handle to the dialog scene
    pub fn dialog(&self) -> DialogHandle {
        self.dialog.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    pub fn library(&self) -> &ContentLibrary {
        &self.library
    }

    /// Load a stage and its map for deployment
    pub async fn open_stage(&self, stage_id: &str) -> Result<StageSession> {
        StageSession::open(&self.library, self.store(), self.handle(), stage_id).await
    }

    /// Scroll driver using the configured speed and tick
    pub fn scroll_driver(&self, map: Extent, viewport: Extent) -> ScrollDriver {
        let viewport = Viewport::new(map, viewport).with_speed(self.config.scroll_speed);
        ScrollDriver::new(viewport, self.config.scroll_tick)
    }

    /// Stop both workers and wait for them to finish
    pub async fn shutdown(self) -> Result<()> {
        // Workers hold each other's handles, so the channels never close on
        // their own.
        let _ = self.handle.shutdown().await;
        let _ = self.dialog.shutdown().await;

        self.theater_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;
        self.dialog_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        info!(target: "runtime::theater", "Theater shut down");
        Ok(())
    }
}

/// Builder for [`Theater`] with flexible configuration.
pub struct TheaterBuilder {
    config: RuntimeConfig,
    content: Option<Arc<dyn ContentStore>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl TheaterBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            content: None,
            store: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Content store to read documents from
    ///
    /// Defaults to a [`FileContentStore`] rooted at `config.content_root`.
    pub fn content_store(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    /// Key/value store for progress variables and deployment records
    ///
    /// Defaults to a [`FileKeyValueStore`] in `config.save_dir` when set,
    /// otherwise an in-memory store.
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the theater and spawn its workers
    pub async fn build(self) -> Result<Theater> {
        let config = self.config;

        let store: Arc<dyn KeyValueStore> = match (self.store, &config.save_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileKeyValueStore::open(dir)?),
            (None, None) => Arc::new(InMemoryStore::new()),
        };
        let content: Arc<dyn ContentStore> = match self.content {
            Some(content) => content,
            None => Arc::new(FileContentStore::new(config.content_root.clone())),
        };
        let library = ContentLibrary::new(content, Arc::clone(&store), config.test_case.clone());

        let (theater_tx, theater_rx) = mpsc::channel(config.command_buffer_size.max(1));
        let (dialog_tx, dialog_rx) = mpsc::unbounded_channel();
        let event_bus = EventBus::with_capacity(config.event_buffer_size);

        let handle = TheaterHandle::new(theater_tx, event_bus.clone());
        let dialog = DialogHandle::new(dialog_tx);

        let theater_worker = TheaterWorker::new(
            Arc::clone(&store),
            library.clone(),
            dialog.clone(),
            event_bus.clone(),
            &config,
            theater_rx,
        );
        let theater_worker_handle = tokio::spawn(async move {
            theater_worker.run().await;
        });

        let dialog_worker = DialogWorker::new(
            ScriptEngine::new(Arc::clone(&store)),
            library.clone(),
            handle.clone(),
            event_bus,
            dialog_rx,
        );
        let dialog_worker_handle = tokio::spawn(async move {
            dialog_worker.run().await;
        });

        info!(
            target: "runtime::theater",
            test_case = %config.test_case,
            content_root = %config.content_root.display(),
            "Theater started"
        );

        Ok(Theater {
            config,
            handle,
            dialog,
            library,
            store,
            theater_worker_handle,
            dialog_worker_handle,
        })
    }
}

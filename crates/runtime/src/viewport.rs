//! Continuous viewport scrolling.
//!
//! Hovering a map border starts a repeating timer that steps the viewport
//! every tick; leaving the border stops it. Offsets are published on a
//! `watch` channel so renderers always see the latest value.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use game_core::{Extent, Pixel, ScrollDirection, Viewport};

pub struct ScrollDriver {
    viewport: Arc<Mutex<Viewport>>,
    offset_tx: watch::Sender<Pixel>,
    tick: Duration,
    active: Option<(ScrollDirection, JoinHandle<()>)>,
}

impl ScrollDriver {
    pub fn new(viewport: Viewport, tick: Duration) -> Self {
        let (offset_tx, _) = watch::channel(viewport.offset());
        Self {
            viewport: Arc::new(Mutex::new(viewport)),
            offset_tx,
            tick: tick.max(Duration::from_millis(1)),
            active: None,
        }
    }

    /// Starts scrolling; a running scroll in another direction is replaced.
    pub fn start(&mut self, direction: ScrollDirection) {
        if matches!(&self.active, Some((current, _)) if *current == direction) {
            return;
        }
        self.stop();

        let viewport = Arc::clone(&self.viewport);
        let offset_tx = self.offset_tx.clone();
        let tick = self.tick;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let offset = viewport
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .scroll(direction);
                offset_tx.send_if_modified(|current| {
                    if *current == offset {
                        false
                    } else {
                        *current = offset;
                        true
                    }
                });
            }
        });
        tracing::trace!("Scrolling {direction}");
        self.active = Some((direction, task));
    }

    pub fn stop(&mut self) {
        if let Some((_, task)) = self.active.take() {
            task.abort();
        }
    }

    pub fn direction(&self) -> Option<ScrollDirection> {
        self.active.as_ref().map(|(direction, _)| *direction)
    }

    pub fn subscribe(&self) -> watch::Receiver<Pixel> {
        self.offset_tx.subscribe()
    }

    pub fn offset(&self) -> Pixel {
        self.lock().offset()
    }

    pub fn resize(&self, viewport: Extent) {
        let offset = {
            let mut guard = self.lock();
            guard.resize(viewport);
            guard.offset()
        };
        self.offset_tx.send_replace(offset);
    }

    pub fn set_map(&self, map: Extent) {
        let offset = {
            let mut guard = self.lock();
            guard.set_map(map);
            guard.offset()
        };
        self.offset_tx.send_replace(offset);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Viewport> {
        self.viewport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScrollDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

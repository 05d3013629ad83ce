#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use game_core::InMemoryStore;
use runtime::{Event, InMemoryContentStore, Theater};
use tokio::sync::broadcast::{self, error::RecvError};

pub const CASE: &str = "architecture/test-case-001";

pub fn case_path(path: &str) -> String {
    format!("{CASE}/{}", path.trim_start_matches('/'))
}

pub async fn theater(content: InMemoryContentStore, store: Arc<InMemoryStore>) -> Theater {
    Theater::builder()
        .content_store(Arc::new(content))
        .key_value_store(store)
        .build()
        .await
        .expect("theater should start")
}

/// Waits for the first event `select` accepts.
pub async fn next_matching<T>(
    rx: &mut broadcast::Receiver<Event>,
    mut select: impl FnMut(Event) -> Option<T>,
) -> T {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(found) = select(event) {
                        return found;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .expect("timed out waiting for event")
}

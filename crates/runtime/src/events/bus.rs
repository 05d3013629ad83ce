//! Topic-based event bus implementation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{DeploymentEvent, SceneEvent};
use game_core::EngineOutput;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Scene visibility, resource bindings and lifecycle events
    Scene,
    /// Script engine output
    Dialog,
    /// Deployment commits and battlefield loads
    Deployment,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone)]
pub enum Event {
    Scene(SceneEvent),
    Dialog(EngineOutput),
    Deployment(DeploymentEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Scene(_) => Topic::Scene,
            Event::Dialog(_) => Topic::Dialog,
            Event::Deployment(_) => Topic::Deployment,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Cloning shares the underlying channels.
#[derive(Clone)]
pub struct EventBus {
    scene: broadcast::Sender<Event>,
    dialog: broadcast::Sender<Event>,
    deployment: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            scene: broadcast::channel(capacity).0,
            dialog: broadcast::channel(capacity).0,
            deployment: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Scene => &self.scene,
            Topic::Dialog => &self.dialog,
            Topic::Deployment => &self.deployment,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_only_their_topic() {
        let bus = EventBus::with_capacity(4);
        let mut receivers = bus.subscribe_multiple(&[Topic::Scene, Topic::Dialog]);

        bus.publish(Event::Dialog(EngineOutput::MessageCleared));

        let dialog = receivers.get_mut(&Topic::Dialog).unwrap();
        assert!(matches!(
            dialog.recv().await.unwrap(),
            Event::Dialog(EngineOutput::MessageCleared)
        ));
        let scene = receivers.get_mut(&Topic::Scene).unwrap();
        assert!(scene.try_recv().is_err());
    }
}

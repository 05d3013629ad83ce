//! Per-session log of what the player has seen and chosen.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HistoryEntry {
    Message {
        id: Option<String>,
        speaker: Option<String>,
        text: String,
    },
    Selection {
        id: Option<String>,
        label: String,
        value: String,
    },
}

impl HistoryEntry {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message { id, .. } | Self::Selection { id, .. } => id.as_deref(),
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message { .. })
    }
}

/// Ordered history, de-duplicated by event id when one is present.
#[derive(Clone, Debug, Default)]
pub struct DialogHistory {
    entries: Vec<HistoryEntry>,
    seen: HashSet<String>,
}

impl DialogHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` unless an entry with the same id was already recorded.
    /// Returns whether it was appended.
    pub fn record(&mut self, entry: HistoryEntry) -> bool {
        if let Some(id) = entry.id() {
            let key = match &entry {
                HistoryEntry::Message { .. } => format!("message:{id}"),
                HistoryEntry::Selection { .. } => format!("selection:{id}"),
            };
            if !self.seen.insert(key) {
                return false;
            }
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|entry| entry.is_message())
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: Option<&str>, text: &str) -> HistoryEntry {
        HistoryEntry::Message {
            id: id.map(str::to_owned),
            speaker: None,
            text: text.to_owned(),
        }
    }

    #[test]
    fn duplicate_ids_are_ignored() {
        let mut history = DialogHistory::new();
        assert!(history.record(message(Some("m1"), "hello")));
        assert!(!history.record(message(Some("m1"), "hello again")));
        assert!(history.record(message(None, "anonymous")));
        assert!(history.record(message(None, "anonymous")));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn selection_and_message_ids_do_not_collide() {
        let mut history = DialogHistory::new();
        history.record(message(Some("e1"), "pick one"));
        let recorded = history.record(HistoryEntry::Selection {
            id: Some("e1".into()),
            label: "Left".into(),
            value: "left".into(),
        });
        assert!(recorded);
        assert_eq!(history.messages().count(), 1);
        assert!(matches!(history.get(1), Some(HistoryEntry::Selection { .. })));
    }

    #[test]
    fn clear_forgets_ids() {
        let mut history = DialogHistory::new();
        history.record(message(Some("m1"), "a"));
        history.clear();
        assert!(history.is_empty());
        assert!(history.record(message(Some("m1"), "a")));
    }
}

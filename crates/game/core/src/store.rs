//! Key/value storage capability shared by every engine component.
//!
//! The store is string-typed; numeric and boolean semantics are imposed by
//! callers through parsing. Progress variables, one-shot navigation overrides
//! and deployment hand-off records all live in the same flat namespace.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ErrorSeverity, GameError};

/// Errors raised by a storage backend.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failed for key '{key}': {message}")]
    Backend { key: String, message: String },

    #[error("storage is read-only")]
    ReadOnly,
}

impl StoreError {
    pub fn backend(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl GameError for StoreError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Backend { .. } => ErrorSeverity::Recoverable,
            Self::ReadOnly => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "STORE_BACKEND",
            Self::ReadOnly => "STORE_READ_ONLY",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String-keyed storage capability.
///
/// Reads never fail: an unavailable value is reported as absent. Writes are
/// independent and immediately visible to subsequent reads.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Reads a value and removes it in one call.
    fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.get(key);
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// How a value is merged into an existing storage entry.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageAction {
    /// Replace the stored value.
    #[default]
    Set,
    /// Comma-join onto the stored value.
    Append,
    /// Drop every comma-separated element equal to the value.
    Remove,
}

impl StorageAction {
    /// Merges `value` into the entry at `key`.
    pub fn apply(self, store: &dyn KeyValueStore, key: &str, value: &str) -> StoreResult<()> {
        let merged = self.merge(store.get(key).as_deref(), value);
        store.set(key, &merged)
    }

    /// Computes the merged value without touching a store.
    pub fn merge(self, existing: Option<&str>, value: &str) -> String {
        match self {
            Self::Set => value.to_owned(),
            Self::Append => match existing {
                Some(current) if !current.is_empty() => format!("{current},{value}"),
                _ => value.to_owned(),
            },
            Self::Remove => existing
                .unwrap_or_default()
                .split(',')
                .filter(|element| *element != value && !element.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Declared type of a value written through a selection.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
}

impl ValueType {
    /// Canonicalises `raw` for storage. Values that do not parse are kept raw.
    pub fn normalize(self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            Self::String => raw.to_owned(),
            Self::Number => match trimmed.parse::<f64>() {
                Ok(number) if number.is_finite() => format_number(number),
                _ => raw.to_owned(),
            },
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => "true".to_owned(),
                "false" | "0" | "no" => "false".to_owned(),
                _ => raw.to_owned(),
            },
        }
    }
}

/// Formats a number the way authored JSON writes it (`3`, not `3.0`).
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{ContentError, ContentStore};

/// Serves documents from a directory tree.
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a content path onto the root; parent traversal is rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf, ContentError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(ContentError::InvalidPath {
                path: path.to_owned(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn fetch(&self, path: &str) -> Result<String, ContentError> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read_to_string(&full_path).await {
            Ok(text) => {
                tracing::debug!("Fetched {} ({} bytes)", full_path.display(), text.len());
                Ok(text)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ContentError::NotFound {
                path: path.to_owned(),
            }),
            Err(source) => Err(ContentError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

/// Documents held in memory, keyed by content path.
#[derive(Default)]
pub struct InMemoryContentStore {
    documents: RwLock<HashMap<String, String>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a JSON document.
    #[must_use]
    pub fn with_document(self, path: impl Into<String>, document: serde_json::Value) -> Self {
        self.insert(path, document.to_string());
        self
    }

    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        let path = path.into();
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.trim_start_matches('/').to_owned(), text.into());
    }

    pub fn remove(&self, path: &str) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.trim_start_matches('/'));
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch(&self, path: &str) -> Result<String, ContentError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        documents
            .get(path.trim_start_matches('/'))
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                path: path.to_owned(),
            })
    }
}

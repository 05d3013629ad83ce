//! Content-store access.
//!
//! A [`ContentStore`] returns raw document text for a path. The
//! [`ContentLibrary`] resolves logical names to paths through
//! [`game_content::ContentLayout`] and decodes the text into documents.

mod library;
mod store;

pub use library::ContentLibrary;
pub use store::{FileContentStore, InMemoryContentStore};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("content path '{path}' escapes the content root")]
    InvalidPath { path: String },
}

/// Read-only source of authored documents.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String, ContentError>;
}

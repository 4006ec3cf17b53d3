//! Error types for pixel-core

use thiserror::Error;

/// A caller-supplied file was rejected before any network attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("Unsupported file type {0:?}, expected JPEG, PNG, GIF or WebP")]
    UnsupportedType(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{context}: {source:#}")]
    Transfer {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl GalleryError {
    pub fn transfer(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Transfer {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;

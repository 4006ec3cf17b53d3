//! Raw blob store seam
//!
//! The gateway talks to the bucket only through [`ObjectStore`], so the same
//! validation, keying and listing logic runs against S3 in production and
//! [`MemoryStore`](crate::memory::MemoryStore) in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Metadata fetched for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub created: DateTime<Utc>,
}

/// Called with the cumulative number of bytes committed so far.
pub type BytesCallback<'a> = &'a (dyn Fn(u64) + Send + Sync);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        on_bytes: BytesCallback<'_>,
    ) -> Result<()>;

    /// Every key under `prefix`, across all result pages.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetchable address for `key`.
    async fn resolve_url(&self, key: &str) -> Result<String>;

    /// Fails with `GalleryError::NotFound` for a missing key.
    async fn head(&self, key: &str) -> Result<ObjectMetadata>;

    /// Fails with `GalleryError::NotFound` for a missing key.
    async fn delete(&self, key: &str) -> Result<()>;
}

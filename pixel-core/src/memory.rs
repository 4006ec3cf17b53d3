//! In-process object store for tests and offline development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::{GalleryError, Result};
use crate::store::{BytesCallback, ObjectMetadata, ObjectStore};

/// Progress is reported once per chunk of this many bytes.
const PROGRESS_CHUNK: usize = 256 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct Faults {
    head: HashSet<String>,
    put: bool,
    list: bool,
}

/// Objects held in a map keyed by full object key.
///
/// Failures can be injected per operation, and every call is counted so
/// callers can assert that the network was never touched.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    calls: AtomicUsize,
    base_url: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://pixel")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Seed an object directly, bypassing the gateway.
    pub async fn insert(&self, key: &str, data: Vec<u8>, content_type: &str, created: DateTime<Utc>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                created,
            },
        );
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Number of store operations issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_head(&self, key: &str) {
        self.faults().head.insert(key.to_string());
    }

    pub fn fail_puts(&self, fail: bool) {
        self.faults().put = fail;
    }

    pub fn fail_lists(&self, fail: bool) {
        self.faults().list = fail;
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        // A poisoned lock only means a test panicked mid-update; the flags are still usable.
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        on_bytes: BytesCallback<'_>,
    ) -> Result<()> {
        self.record_call();
        if self.faults().put {
            return Err(GalleryError::transfer(
                format!("Failed to upload {key}"),
                anyhow::anyhow!("injected put failure"),
            ));
        }

        let mut sent = 0u64;
        for chunk in data.chunks(PROGRESS_CHUNK) {
            sent += chunk.len() as u64;
            on_bytes(sent);
            tokio::task::yield_now().await;
        }

        self.insert(key, data, content_type, Utc::now()).await;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.record_call();
        if self.faults().list {
            return Err(GalleryError::transfer(
                "Failed to list objects",
                anyhow::anyhow!("injected list failure"),
            ));
        }

        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn resolve_url(&self, key: &str) -> Result<String> {
        self.record_call();
        if !self.contains(key).await {
            return Err(GalleryError::NotFound(key.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        self.record_call();
        if self.faults().head.contains(key) {
            return Err(GalleryError::transfer(
                format!("Failed to fetch metadata for {key}"),
                anyhow::anyhow!("injected head failure"),
            ));
        }

        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| GalleryError::NotFound(key.to_string()))?;

        Ok(ObjectMetadata {
            size_bytes: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
            created: object.created,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record_call();
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(GalleryError::NotFound(key.to_string())),
        }
    }
}

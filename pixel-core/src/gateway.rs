//! Object storage gateway
//!
//! Validates, keys and uploads image files, lists everything under the
//! gallery prefix with resolved URLs and metadata, and deletes by path.
//! The gateway holds no state of its own; every call is a request against
//! the backing [`ObjectStore`].
//!
//! ## Upload events
//!
//! ```text
//! upload(file) ──► validation ──► spawned transfer task
//!                                     │
//!                                     ├─► Progress(p) ... (zero or more, non-decreasing)
//!                                     └─► Completed(descriptor) | Failed(error)   (exactly one)
//! ```

use chrono::Utc;
use futures::future::try_join_all;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{GatewayConfig, ALLOWED_CONTENT_TYPES, MAX_UPLOAD_BYTES};
use crate::error::{GalleryError, Result, ValidationError};
use crate::model::StorageObjectDescriptor;
use crate::store::ObjectStore;

/// Progress events buffered per upload before further ones are dropped.
/// The terminal event is always delivered.
const EVENT_BUFFER: usize = 32;

/// Content type reported for objects stored without one.
const FALLBACK_CONTENT_TYPE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name, without directories
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug)]
pub enum UploadEvent {
    /// Percentage in `[0, 100]`, never lower than a previous one
    Progress(f64),
    Completed(StorageObjectDescriptor),
    Failed(GalleryError),
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress(_))
    }
}

/// Receiving end of one in-flight upload.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel)) aborts the
/// transfer task.
pub struct UploadHandle {
    key: String,
    events: mpsc::Receiver<UploadEvent>,
    task: JoinHandle<()>,
}

impl UploadHandle {
    /// Storage key the file is being written to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next event, or `None` once the terminal event has been consumed.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    pub fn cancel(self) {
        tracing::info!("Upload cancelled: key={}", self.key);
    }

    /// Wait for the terminal event, discarding progress.
    pub async fn finish(self) -> Result<StorageObjectDescriptor> {
        self.finish_with(|_| {}).await
    }

    /// Wait for the terminal event, forwarding each progress value.
    pub async fn finish_with(mut self, mut on_progress: impl FnMut(f64)) -> Result<StorageObjectDescriptor> {
        while let Some(event) = self.events.recv().await {
            match event {
                UploadEvent::Progress(percent) => on_progress(percent),
                UploadEvent::Completed(descriptor) => return Ok(descriptor),
                UploadEvent::Failed(e) => return Err(e),
            }
        }

        Err(GalleryError::transfer(
            format!("Upload of {} ended without a result", self.key),
            anyhow::anyhow!("transfer task stopped"),
        ))
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reject files the gallery can't accept. Size is checked before type.
pub fn validate(file: &UploadFile) -> Result<(), ValidationError> {
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::SizeExceeded {
            size: file.size(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let content_type = file.content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ValidationError::UnsupportedType(file.content_type.clone()));
    }

    Ok(())
}

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn ObjectStore>,
    config: Arc<GatewayConfig>,
    /// Last millisecond stamp handed out, shared by all clones
    last_stamp: Arc<AtomicI64>,
}

impl Gateway {
    pub fn new(store: Arc<dyn ObjectStore>, config: GatewayConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Start uploading `file` and return a handle to its event stream.
    ///
    /// Invalid files fail here, before anything is spawned or sent. Must be
    /// called from within a tokio runtime.
    pub fn upload(&self, file: UploadFile) -> Result<UploadHandle> {
        validate(&file)?;

        let name = format!("{}_{}", self.next_stamp(), base_name(&file.name));
        let key = self.config.key_for(&name);
        let (tx, events) = mpsc::channel(EVENT_BUFFER);

        tracing::info!("Uploading {} ({} bytes) to {}", file.name, file.size(), key);

        let store = Arc::clone(&self.store);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let terminal = match transfer(store.as_ref(), &task_key, name, file, &tx).await {
                Ok(descriptor) => {
                    tracing::info!("Upload complete: key={}", task_key);
                    UploadEvent::Completed(descriptor)
                }
                Err(e) => {
                    tracing::warn!("Upload failed: key={}, error={}", task_key, e);
                    UploadEvent::Failed(e)
                }
            };
            // Receiver gone means nobody is waiting for the result.
            let _ = tx.send(terminal).await;
        });

        Ok(UploadHandle { key, events, task })
    }

    /// Callback-style upload: runs to completion, reporting progress.
    pub async fn upload_with_progress(
        &self,
        file: UploadFile,
        on_progress: impl FnMut(f64),
    ) -> Result<StorageObjectDescriptor> {
        self.upload(file)?.finish_with(on_progress).await
    }

    /// Every object under the gallery prefix, in provider order.
    ///
    /// URL and metadata lookups for all objects run concurrently; the first
    /// failure fails the whole listing. Dropping the returned future drops
    /// every lookup still in flight.
    pub async fn list(&self) -> Result<Vec<StorageObjectDescriptor>> {
        let prefix = self.config.list_prefix();
        let keys = self.store.list_keys(&prefix).await?;

        let descriptors = try_join_all(keys.iter().map(|key| self.describe(key, &prefix))).await?;

        tracing::info!("Listed {} objects under {:?}", descriptors.len(), prefix);
        Ok(descriptors)
    }

    /// Delete by full storage path. A missing object is `NotFound`, which
    /// callers may treat as already deleted.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.store.delete(path).await?;
        tracing::info!("Deleted {}", path);
        Ok(())
    }

    /// Upload time in milliseconds, bumped past the previous stamp so keys
    /// stay unique when uploads start within the same millisecond.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        {
            Ok(last) | Err(last) => now.max(last + 1),
        }
    }

    async fn describe(&self, key: &str, prefix: &str) -> Result<StorageObjectDescriptor> {
        let (url, metadata) = futures::try_join!(self.store.resolve_url(key), self.store.head(key))?;
        let name = key.strip_prefix(prefix).unwrap_or(key).to_string();

        Ok(StorageObjectDescriptor {
            id: name.clone(),
            url,
            name,
            size_bytes: metadata.size_bytes,
            uploaded_at: metadata.created,
            content_type: metadata
                .content_type
                .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
            path: key.to_string(),
        })
    }
}

async fn transfer(
    store: &dyn ObjectStore,
    key: &str,
    name: String,
    file: UploadFile,
    tx: &mpsc::Sender<UploadEvent>,
) -> Result<StorageObjectDescriptor> {
    let total = file.size();
    let high_water = AtomicU64::new(0);
    let report = |sent: u64| {
        let sent = sent.min(total);
        if high_water.fetch_max(sent, Ordering::SeqCst) > sent {
            return;
        }
        // Progress is advisory; a full buffer just skips this update.
        let _ = tx.try_send(UploadEvent::Progress(percent(sent, total)));
    };

    let size_bytes = total;
    let content_type = file.content_type.trim().to_ascii_lowercase();
    store.put(key, file.bytes, &content_type, &report).await?;
    let url = store.resolve_url(key).await?;

    Ok(StorageObjectDescriptor {
        id: name.clone(),
        url,
        name,
        size_bytes,
        uploaded_at: Utc::now(),
        content_type,
        path: key.to_string(),
    })
}

fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (sent as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn gateway(store: Arc<MemoryStore>) -> Gateway {
        Gateway::new(store, GatewayConfig::new("test-bucket"))
    }

    fn png(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, "image/png", vec![7u8; size])
    }

    #[test]
    fn test_validate_rejects_oversized_before_type() {
        let file = UploadFile::new("big.bmp", "image/bmp", vec![0u8; MAX_UPLOAD_BYTES as usize + 1]);
        assert!(matches!(validate(&file), Err(ValidationError::SizeExceeded { .. })));
    }

    #[test]
    fn test_validate_accepts_exact_limit() {
        let file = png("edge.png", MAX_UPLOAD_BYTES as usize);
        assert_eq!(validate(&file), Ok(()));
    }

    #[test]
    fn test_validate_rejects_unsupported_type() {
        let file = UploadFile::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
        assert_eq!(
            validate(&file),
            Err(ValidationError::UnsupportedType("application/pdf".to_string()))
        );
    }

    #[test]
    fn test_base_name_drops_directories() {
        assert_eq!(base_name("a/b/c.png"), "c.png");
        assert_eq!(base_name(r"C:\pics\d.jpg"), "d.jpg");
        assert_eq!(base_name("e.gif"), "e.gif");
    }

    #[test]
    fn test_percent_bounds() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(50, 200), 25.0);
        assert_eq!(percent(200, 200), 100.0);
    }

    #[tokio::test]
    async fn test_oversized_upload_never_reaches_store() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(Arc::clone(&store));

        let mut calls = 0;
        let err = gateway
            .upload_with_progress(png("huge.png", 11_000_000), |_| calls += 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GalleryError::Validation(ValidationError::SizeExceeded { size: 11_000_000, .. })
        ));
        assert_eq!(calls, 0);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_emits_monotonic_progress_then_one_terminal_event() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(Arc::clone(&store));

        let mut handle = gateway.upload(png("sunset.png", 1_000_000)).unwrap();
        assert!(handle.key().starts_with("images/"));
        assert!(handle.key().ends_with("_sunset.png"));

        let mut progress = Vec::new();
        let mut terminals = Vec::new();
        while let Some(event) = handle.next_event().await {
            match event {
                UploadEvent::Progress(p) => progress.push(p),
                other => terminals.push(other),
            }
        }

        assert_eq!(terminals.len(), 1);
        let UploadEvent::Completed(descriptor) = terminals.remove(0) else {
            panic!("expected a completed upload");
        };
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| (0.0..=100.0).contains(p)));
        assert_eq!(descriptor.size_bytes, 1_000_000);
        assert_eq!(descriptor.content_type, "image/png");
        assert_eq!(descriptor.url, format!("memory://pixel/{}", descriptor.path));
        assert!(store.contains(&descriptor.path).await);
    }

    #[tokio::test]
    async fn test_same_name_uploads_get_distinct_keys() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(Arc::clone(&store));
        let other = gateway.clone();

        let first = gateway.upload(png("a/IMG_1.jpg", 10)).unwrap();
        let second = other.upload(png("b/IMG_1.jpg", 10)).unwrap();
        assert_ne!(first.key(), second.key());
        assert!(second.key().ends_with("_IMG_1.jpg"));

        let first = first.finish().await.unwrap();
        let second = second.finish().await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_transfer_is_reported_once() {
        let store = Arc::new(MemoryStore::new());
        store.fail_puts(true);
        let gateway = gateway(Arc::clone(&store));

        let err = gateway.upload(png("x.png", 10)).unwrap().finish().await.unwrap_err();
        assert!(matches!(err, GalleryError::Transfer { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_resolves_every_object() {
        let store = Arc::new(MemoryStore::new());
        store.insert("images/1_a.jpg", vec![0; 3], "image/jpeg", Utc::now()).await;
        store.insert("images/2_b.webp", vec![0; 5], "image/webp", Utc::now()).await;
        store.insert("elsewhere/c.jpg", vec![0; 1], "image/jpeg", Utc::now()).await;
        let gateway = gateway(Arc::clone(&store));

        let mut listed = gateway.list().await.unwrap();
        listed.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "1_a.jpg");
        assert_eq!(listed[0].path, "images/1_a.jpg");
        assert_eq!(listed[1].size_bytes, 5);
        assert_eq!(listed[1].content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_list_fails_when_any_object_fails() {
        let store = Arc::new(MemoryStore::new());
        store.insert("images/ok.jpg", vec![0], "image/jpeg", Utc::now()).await;
        store.insert("images/bad.jpg", vec![0], "image/jpeg", Utc::now()).await;
        store.fail_head("images/bad.jpg");
        let gateway = gateway(Arc::clone(&store));

        assert!(matches!(gateway.list().await, Err(GalleryError::Transfer { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.insert("images/a.jpg", vec![0], "image/jpeg", Utc::now()).await;
        let gateway = gateway(Arc::clone(&store));

        gateway.delete("images/a.jpg").await.unwrap();
        assert!(gateway.delete("images/a.jpg").await.unwrap_err().is_not_found());
    }
}

use anyhow::Result;
use pixel_core::{Gallery, Gateway, GatewayConfig, MemoryStore, S3Store, SnapshotStore};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    /// Stateless; serves raw storage listings without touching the gallery
    pub gateway: Gateway,
    /// Every mutation goes through this lock, one at a time
    pub gallery: Arc<Mutex<Gallery>>,
}

impl AppState {
    pub async fn new(bucket: Option<String>, snapshot: Option<String>) -> Result<Self> {
        let gateway = match bucket {
            Some(bucket) => {
                let config = GatewayConfig::from_env(bucket);
                let store = S3Store::new(&config).await?;
                tracing::info!("Serving bucket {} under prefix {:?}", config.bucket, config.prefix);
                Gateway::new(Arc::new(store), config)
            }
            None => {
                tracing::warn!("PIXEL_BUCKET not set, using an in-memory store");
                Gateway::new(Arc::new(MemoryStore::new()), GatewayConfig::new("memory"))
            }
        };

        let mut gallery = Gallery::new(gateway.clone());
        if let Some(path) = snapshot {
            gallery = gallery.with_snapshot(SnapshotStore::new(path));
        }

        Ok(Self::from_gallery(gallery))
    }

    pub fn from_gallery(gallery: Gallery) -> Self {
        Self {
            gateway: gallery.gateway().clone(),
            gallery: Arc::new(Mutex::new(gallery)),
        }
    }
}

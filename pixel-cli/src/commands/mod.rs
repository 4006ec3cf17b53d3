pub mod delete;
pub mod list;
pub mod snapshot;
pub mod upload;
pub mod view;

use anyhow::Result;
use clap::Args;
use pixel_core::{Gallery, Gateway, GatewayConfig, S3Store, SnapshotStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct StorageArgs {
    /// S3 bucket name
    #[arg(short, long, env = "PIXEL_BUCKET")]
    pub bucket: String,

    /// Key prefix gallery objects live under
    #[arg(long, env = "PIXEL_PREFIX", default_value = pixel_core::config::DEFAULT_PREFIX)]
    pub prefix: String,

    /// Snapshot file written after every gallery change
    #[arg(long, env = "PIXEL_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,
}

impl StorageArgs {
    pub async fn gateway(&self) -> Result<Gateway> {
        let config = GatewayConfig::from_env(&self.bucket).with_prefix(&self.prefix);
        let store = S3Store::new(&config).await?;
        Ok(Gateway::new(Arc::new(store), config))
    }

    pub async fn gallery(&self) -> Result<Gallery> {
        let gallery = Gallery::new(self.gateway().await?);
        Ok(match &self.snapshot {
            Some(path) => gallery.with_snapshot(SnapshotStore::new(path)),
            None => gallery,
        })
    }
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_in_megabytes() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(2_621_440), "2.50 MB");
    }
}

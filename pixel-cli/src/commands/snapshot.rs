use anyhow::{Context, Result};
use pixel_core::snapshot::UPLOADED_IMAGES_SLOT;
use pixel_core::{ImageRecord, SnapshotStore};
use std::path::PathBuf;

pub async fn execute(path: PathBuf) -> Result<()> {
    let store = SnapshotStore::new(path);

    let records: Option<Vec<ImageRecord>> = store
        .read_slot(UPLOADED_IMAGES_SLOT)
        .await
        .with_context(|| format!("Failed to read snapshot {}", store.path().display()))?;

    match records {
        Some(records) => println!("{}", serde_json::to_string_pretty(&records)?),
        None => println!("No {UPLOADED_IMAGES_SLOT} slot in {}", store.path().display()),
    }

    Ok(())
}

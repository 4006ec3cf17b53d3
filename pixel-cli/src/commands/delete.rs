use anyhow::Result;
use pixel_core::GalleryError;

use super::StorageArgs;

pub async fn execute(storage: StorageArgs, path: String) -> Result<()> {
    let gateway = storage.gateway().await?;

    // Bare names are resolved under the gallery prefix
    let key = if path.contains('/') {
        path
    } else {
        gateway.config().key_for(&path)
    };

    tracing::info!("Deleting image: {}", key);

    match gateway.delete(&key).await {
        Ok(()) => println!("✓ Image deleted successfully: {key}"),
        Err(GalleryError::NotFound(_)) => println!("✓ Image already deleted: {key}"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

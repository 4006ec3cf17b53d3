use anyhow::Result;

use super::{format_size, StorageArgs};

pub async fn execute(storage: StorageArgs) -> Result<()> {
    let gateway = storage.gateway().await?;

    let mut objects = gateway.list().await?;
    // Provider order is arbitrary; show newest first
    objects.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

    if objects.is_empty() {
        println!("No images under s3://{}/{}", storage.bucket, storage.prefix);
        return Ok(());
    }

    for object in &objects {
        println!(
            "{}  {:>10}  {:<11}  {}",
            object.uploaded_at.format("%Y-%m-%d %H:%M"),
            format_size(object.size_bytes),
            object.content_type,
            object.path,
        );
    }

    let total: u64 = objects.iter().map(|o| o.size_bytes).sum();
    println!("\n{} images, {}", objects.len(), format_size(total));

    Ok(())
}

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pixel_core::{Category, Gateway, ImageRecord, StorageObjectDescriptor, UploadFile};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{format_size, StorageArgs};
use crate::file_type::{content_type, is_image_file};

/// Uploads in flight at once.
const UPLOAD_CONCURRENCY: usize = 4;

pub async fn execute(storage: StorageArgs, paths: Vec<String>, category: Option<Category>) -> Result<()> {
    let mut gallery = storage.gallery().await?;

    // Collect all image paths
    let image_paths = collect_image_paths(paths)?;

    if image_paths.is_empty() {
        anyhow::bail!("No images found in the provided paths");
    }

    println!("Uploading {} images to s3://{}/{}\n", image_paths.len(), storage.bucket, storage.prefix);

    let bars = MultiProgress::new();
    let gateway = gallery.gateway().clone();

    let results: Vec<(PathBuf, Result<StorageObjectDescriptor>)> = stream::iter(image_paths)
        .map(|path| {
            let gateway = gateway.clone();
            let bars = bars.clone();
            async move {
                let result = upload_one(&gateway, &bars, &path).await;
                (path, result)
            }
        })
        .buffer_unordered(UPLOAD_CONCURRENCY)
        .collect()
        .await;

    let total = results.len();
    let mut failures = Vec::new();
    let mut uploaded_bytes = 0;

    for (path, result) in results {
        match result {
            Ok(descriptor) => {
                uploaded_bytes += descriptor.size_bytes;
                let mut record = ImageRecord::from_descriptor(&descriptor);
                if let Some(category) = category {
                    record.category = category;
                }
                gallery.add_local(record).await;
            }
            Err(e) => failures.push((path, e)),
        }
    }

    println!();
    println!("✓ Uploaded {} of {} images ({})", total - failures.len(), total, format_size(uploaded_bytes));

    for (path, e) in &failures {
        eprintln!("✗ {}: {:#}", path.display(), e);
    }

    if !failures.is_empty() {
        anyhow::bail!("{} of {} uploads failed", failures.len(), total);
    }

    Ok(())
}

async fn upload_one(gateway: &Gateway, bars: &MultiProgress, path: &Path) -> Result<StorageObjectDescriptor> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let file = UploadFile::new(name.clone(), content_type(path, &bytes), bytes);

    // Invalid files fail here, before a progress bar is shown
    let handle = gateway.upload(file)?;

    let pb = bars.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/blue} {pos:>3}% {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(name.clone());

    match handle.finish_with(|percent| pb.set_position(percent.round() as u64)).await {
        Ok(descriptor) => {
            pb.finish_with_message(format!("Uploaded: {name}"));
            tracing::debug!("Uploaded {} as {}", path.display(), descriptor.path);
            Ok(descriptor)
        }
        Err(e) => {
            pb.abandon_with_message(format!("Failed: {name}"));
            Err(e.into())
        }
    }
}

fn collect_image_paths(paths: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut image_paths = Vec::new();

    for path_str in paths {
        let path = Path::new(&path_str);

        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        if path.is_file() {
            if is_image_file(path) {
                image_paths.push(path.to_path_buf());
            }
        } else if path.is_dir() {
            // Walk directory and collect all images
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && is_image_file(entry_path) {
                    image_paths.push(entry_path.to_path_buf());
                }
            }
        }
    }

    // Sort for consistent ordering
    image_paths.sort();

    Ok(image_paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collects_images_recursively_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("b.png"), b"x").unwrap();
        fs::write(nested.join("a.jpg"), b"x").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"x").unwrap();

        let found = collect_image_paths(vec![temp_dir.path().to_string_lossy().to_string()]).unwrap();

        assert_eq!(found, vec![temp_dir.path().join("b.png"), nested.join("a.jpg")]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let err = collect_image_paths(vec!["/definitely/not/here.jpg".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Path does not exist"));
    }
}

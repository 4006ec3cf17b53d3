//! Gallery state reconciler
//!
//! Owns the one collection of image records for a session. Records arrive
//! from bucket listings (`load`/`merge_listing`) and from this client
//! (`add_local`, `upload`); ids are unique and an id already present always
//! wins over a freshly listed one. Views are derived without touching the
//! collection.
//!
//! Objects removed through [`Gallery::delete`] are remembered until a listing
//! no longer contains them, so a listing taken before the delete can't bring
//! the record back.

use std::collections::HashSet;

use crate::error::{GalleryError, Result};
use crate::gateway::{Gateway, UploadFile};
use crate::model::{
    Album, CategoryFilter, GalleryStats, ImagePatch, ImageRecord, StorageObjectDescriptor,
};
use crate::snapshot::{SnapshotStore, UPLOADED_IMAGES_SLOT};

pub struct Gallery {
    gateway: Gateway,
    records: Vec<ImageRecord>,
    albums: Vec<Album>,
    /// Ids deleted from storage that a listing may still report
    deleted: HashSet<String>,
    snapshot: Option<SnapshotStore>,
}

impl Gallery {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            records: Vec::new(),
            albums: Vec::new(),
            deleted: HashSet::new(),
            snapshot: None,
        }
    }

    /// Write the collection to `snapshot` after every change.
    pub fn with_snapshot(mut self, snapshot: SnapshotStore) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// List the bucket and merge the result. Returns how many records were
    /// new; on failure the collection is untouched.
    pub async fn load(&mut self) -> Result<usize> {
        let listing = self.gateway.list().await?;
        Ok(self.merge_listing(listing).await)
    }

    /// Merge a bucket listing into the collection. Ids already present are
    /// skipped, so repeating a merge with the same listing adds nothing.
    /// New records go after the existing ones, newest first. Ids deleted
    /// through this gallery are skipped while the listing still reports them.
    pub async fn merge_listing(&mut self, listing: Vec<StorageObjectDescriptor>) -> usize {
        let listed: HashSet<&str> = listing.iter().map(|descriptor| descriptor.id.as_str()).collect();
        self.deleted.retain(|id| listed.contains(id.as_str()));

        let mut seen: HashSet<&str> = self.records.iter().map(|record| record.id.as_str()).collect();
        let mut fresh: Vec<ImageRecord> = listing
            .iter()
            .filter(|descriptor| !self.deleted.contains(&descriptor.id))
            .filter(|descriptor| seen.insert(descriptor.id.as_str()))
            .map(ImageRecord::from_descriptor)
            .collect();

        fresh.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        let added = fresh.len();
        tracing::info!(
            "Merged listing: {} listed, {} new, {} total",
            listing.len(),
            added,
            self.records.len() + added
        );

        if added > 0 {
            self.records.extend(fresh);
            self.persist().await;
        }
        added
    }

    /// Put a new record at the front of the collection.
    pub async fn add_local(&mut self, record: ImageRecord) {
        tracing::debug!("Adding local record {}", record.id);
        self.records.insert(0, record);
        self.persist().await;
    }

    /// Apply `patch` to the record with `id`. Returns false if none matched.
    pub async fn update(&mut self, id: &str, patch: &ImagePatch) -> bool {
        let Some(record) = self.records.iter_mut().find(|record| record.id == id) else {
            return false;
        };
        patch.apply(record);
        self.persist().await;
        true
    }

    /// Drop the record only; the stored object stays and a later `load`
    /// lists it again.
    pub async fn remove(&mut self, id: &str) -> Option<ImageRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        let removed = self.records.remove(index);
        self.persist().await;
        Some(removed)
    }

    /// Records passing the category filter, album and search query, in
    /// collection order. The query matches title or any tag,
    /// case-insensitively; only an empty query matches everything.
    pub fn view(&self, filter: CategoryFilter, album: Option<&str>, query: &str) -> Vec<ImageRecord> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|record| record.passes(filter, album, &needle))
            .cloned()
            .collect()
    }

    /// Flip `liked` and return the new value.
    pub async fn toggle_like(&mut self, id: &str) -> Option<bool> {
        let record = self.records.iter_mut().find(|record| record.id == id)?;
        record.liked = !record.liked;
        let liked = record.liked;
        self.persist().await;
        Some(liked)
    }

    /// Upload `file` and add the stored object as a local record. The
    /// record id is the storage object name, so a later `load` skips it.
    pub async fn upload(&mut self, file: UploadFile, on_progress: impl FnMut(f64)) -> Result<ImageRecord> {
        let descriptor = self.gateway.upload_with_progress(file, on_progress).await?;
        let record = ImageRecord::from_descriptor(&descriptor);
        self.add_local(record.clone()).await;
        Ok(record)
    }

    /// Delete the stored object behind `id`, then drop the record. An object
    /// that is already gone counts as deleted; any other failure leaves the
    /// collection unchanged.
    pub async fn delete(&mut self, id: &str) -> Result<Option<ImageRecord>> {
        let Some(record) = self.get(id) else {
            return Ok(None);
        };

        if let Some(path) = record.storage_path.clone() {
            match self.gateway.delete(&path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::warn!("Object {} was already deleted, removing record {}", path, id);
                }
                Err(e) => return Err(e),
            }
        }

        self.deleted.insert(id.to_string());
        Ok(self.remove(id).await)
    }

    pub fn stats(&self) -> GalleryStats {
        let categories: HashSet<_> = self.records.iter().map(|record| record.category).collect();
        GalleryStats {
            total: self.records.len(),
            favorites: self.records.iter().filter(|record| record.liked).count(),
            categories: categories.len(),
            storage_bytes: self.records.iter().map(|record| record.size_bytes).sum(),
        }
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn create_album(&mut self, name: impl Into<String>, description: impl Into<String>) -> Album {
        let album = Album::new(name.into(), description.into());
        tracing::info!("Created album {} ({})", album.name, album.id);
        self.albums.push(album.clone());
        album
    }

    /// Assign an image to an album and bump the album's display counter.
    ///
    /// The counter is never decremented, so it drifts from real membership
    /// when images are removed or moved.
    pub async fn add_to_album(&mut self, image_id: &str, album_id: &str) -> Result<()> {
        let album = self
            .albums
            .iter_mut()
            .find(|album| album.id == album_id)
            .ok_or_else(|| GalleryError::NotFound(format!("album {album_id}")))?;
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == image_id)
            .ok_or_else(|| GalleryError::NotFound(format!("image {image_id}")))?;

        record.album = Some(album.id.clone());
        album.image_count += 1;
        self.persist().await;
        Ok(())
    }

    async fn persist(&self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        if let Err(e) = snapshot.write_slot(UPLOADED_IMAGES_SLOT, &self.records).await {
            tracing::warn!("Failed to write snapshot {}: {}", snapshot.path().display(), e);
        }
    }
}

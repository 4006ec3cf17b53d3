//! Key-value snapshot file
//!
//! A single JSON object whose keys are slots. The gallery writes its whole
//! record collection to [`UPLOADED_IMAGES_SLOT`] after every change; nothing
//! reads it back at startup.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::SnapshotError;

pub const UPLOADED_IMAGES_SLOT: &str = "uploadedImages";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace one slot, keeping the others. The file is swapped in whole.
    pub async fn write_slot<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SnapshotError> {
        let mut slots = self.read_all().await?;
        slots.insert(key.to_string(), serde_json::to_value(value)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(slots))?).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Wrote snapshot slot {} to {}", key, self.path.display());
        Ok(())
    }

    pub async fn read_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SnapshotError> {
        match self.read_all().await?.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All slots in the file. A missing, unparsable or non-object file reads
    /// as empty, so the next write replaces it.
    async fn read_all(&self) -> Result<Map<String, Value>, SnapshotError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(slots)) => Ok(slots),
            Ok(_) => {
                tracing::warn!("Snapshot {} is not a JSON object, starting fresh", self.path.display());
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!("Snapshot {} is unreadable ({}), starting fresh", self.path.display(), e);
                Ok(Map::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_slots_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("state/snapshot.json"));

        store.write_slot("a", &vec![1, 2, 3]).await.unwrap();
        store.write_slot("b", "hello").await.unwrap();
        store.write_slot("a", &vec![4]).await.unwrap();

        assert_eq!(store.read_slot::<Vec<i32>>("a").await.unwrap(), Some(vec![4]));
        assert_eq!(store.read_slot::<String>("b").await.unwrap(), Some("hello".to_string()));
        assert_eq!(store.read_slot::<String>("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("nothing.json"));
        assert_eq!(store.read_slot::<Vec<i32>>(UPLOADED_IMAGES_SLOT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_file_is_replaced_on_next_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"uploadedImages": ["#).unwrap();
        let store = SnapshotStore::new(&path);

        assert_eq!(store.read_slot::<Vec<i32>>(UPLOADED_IMAGES_SLOT).await.unwrap(), None);

        store.write_slot(UPLOADED_IMAGES_SLOT, &vec![1]).await.unwrap();
        assert_eq!(
            store.read_slot::<Vec<i32>>(UPLOADED_IMAGES_SLOT).await.unwrap(),
            Some(vec![1])
        );
    }
}

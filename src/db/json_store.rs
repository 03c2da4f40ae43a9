use crate::db::schema::Collection;
use crate::error::PortalError;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// One JSON array per collection under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Read a collection, creating the directory and an empty `[]` file when absent.
    pub async fn read_collection(&self, collection: Collection) -> Result<Vec<Value>, PortalError> {
        fs::create_dir_all(&self.dir).await?;
        match self.read_existing(collection).await? {
            Some(rows) => Ok(rows),
            None => {
                info!(collection = %collection, "collection file missing; creating empty file");
                fs::write(self.path_of(collection), b"[]").await?;
                Ok(Vec::new())
            }
        }
    }

    /// Read a collection without touching the filesystem when the file is absent.
    pub async fn read_existing(
        &self,
        collection: Collection,
    ) -> Result<Option<Vec<Value>>, PortalError> {
        let path = self.path_of(collection);
        let contents = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(Vec::new()));
        }
        let rows: Vec<Value> = serde_json::from_slice(&contents)?;
        debug!(collection = %collection, count = rows.len(), "collection read");
        Ok(Some(rows))
    }

    /// Replace a collection file. Writes a sibling temp file and renames it
    /// over the target so a crash never leaves a truncated collection.
    pub async fn write_collection(
        &self,
        collection: Collection,
        rows: &[Value],
    ) -> Result<(), PortalError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_of(collection);
        let tmp = self.dir.join(format!(".{}.tmp", collection.file_name()));
        let body = serde_json::to_vec_pretty(rows)?;
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        debug!(collection = %collection, count = rows.len(), "collection written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use serde_json::json;

    #[tokio::test]
    async fn missing_collection_is_created_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = JsonFileStore::new(dir);

        let rows = store.read_collection(Collection::Notices).await.unwrap();
        assert!(rows.is_empty());
        let on_disk = std::fs::read_to_string(dir.join("notices.json")).unwrap();
        assert_eq!(on_disk, "[]");
    }

    #[tokio::test]
    async fn write_then_read_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = JsonFileStore::new(dir);
        let rows = vec![json!({"id": "a"}), json!({"id": "b"})];

        store
            .write_collection(Collection::ReportUpdates, &rows)
            .await
            .unwrap();
        assert!(dir.join("report-updates.json").exists());
        assert!(!dir.join(".report-updates.json.tmp").exists());

        let back = store.read_collection(Collection::ReportUpdates).await.unwrap();
        assert_eq!(back, rows);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("users.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir);

        let err = store.read_collection(Collection::Users).await.unwrap_err();
        assert!(matches!(err, PortalError::Json(_)));
    }

    #[tokio::test]
    async fn read_existing_does_not_create() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = JsonFileStore::new(dir);

        assert!(store.read_existing(Collection::Posts).await.unwrap().is_none());
        assert!(!dir.join("posts.json").exists());
    }
}

//! Uploaded file storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// One stored file in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

/// Flat file storage addressed by name
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// All stored files, ordered by name
    async fn list(&self) -> Result<Vec<FileEntry>>;

    /// Contents of a file
    async fn read(&self, name: &str) -> Result<Bytes>;

    /// Store a file, replacing any file of the same name
    async fn save(&self, name: &str, contents: Bytes) -> Result<FileEntry>;

    /// Delete a file; returns whether it existed
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// File storage in a local directory
pub struct LocalFileStorage {
    dir: PathBuf,
}

impl LocalFileStorage {
    /// Storage rooted at `dir`, created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

/// Reject names that could escape the storage directory
///
/// Control characters are rejected too: the name is echoed into the
/// `Content-Disposition` header of a download.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control)
        || name.len() > 255;
    if invalid {
        return Err(Error::BadRequest(format!("Invalid file name {:?}", name)));
    }
    Ok(())
}

async fn entry_for(name: String, path: &Path) -> Result<FileEntry> {
    let metadata = tokio::fs::metadata(path).await?;
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(FileEntry {
        name,
        size: metadata.len(),
        modified,
    })
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn list(&self) -> Result<Vec<FileEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            entries.push(entry_for(name, &entry.path()).await?);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, name: &str) -> Result<Bytes> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File '{}' not found", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, name: &str, contents: Bytes) -> Result<FileEntry> {
        let path = self.resolve(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &contents).await?;
        tracing::debug!(file = name, size = contents.len(), "File stored");
        entry_for(name.to_string(), &path).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(file = name, "File deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name(".env").is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "nul\0"] {
            assert!(validate_name(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_save_list_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().join("uploads"));
        assert!(storage.list().await.unwrap().is_empty());

        let saved = storage
            .save("b.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(saved.size, 5);
        storage.save("a.txt", Bytes::from_static(b"x")).await.unwrap();

        let names: Vec<String> = storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        assert_eq!(storage.read("b.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert!(storage.delete("b.txt").await.unwrap());
        assert!(!storage.delete("b.txt").await.unwrap());
        assert!(matches!(
            storage.read("b.txt").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        assert!(matches!(
            storage.read("../secret").await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            storage.save("..", Bytes::new()).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_control_characters_rejected() {
        for name in ["a\nb.txt", "a\rb", "nul\0", "tab\there", "del\u{7f}"] {
            assert!(
                matches!(validate_name(name), Err(Error::BadRequest(_))),
                "{:?}",
                name
            );
        }
        assert!(validate_name("report (final).txt").is_ok());
        assert!(validate_name("résumé.pdf").is_ok());
    }
}

//! Byte-blob file store with optimistic concurrency
//!
//! Everything durable (map checkpoint, change-log journal, node data blobs) goes
//! through [`FileStore`]. Each stored payload carries an [`ETag`]; writers that pass
//! the etag they last saw get a [`StoreError::Conflict`] when someone else wrote in
//! between, and writers that expect to create a file get one when it already exists.

use crate::graph::glob_match;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("ETag conflict writing {path}")]
    Conflict { path: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Concurrency token: lowercase hex SHA-256 of the payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }
        ETag(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload plus its concurrency token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataETag {
    pub data: Bytes,
    pub etag: ETag,
}

impl DataETag {
    pub fn new(data: Bytes) -> Self {
        let etag = ETag::of(&data);
        DataETag { data, etag }
    }
}

/// Condition a write must satisfy against the file currently stored
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    /// Unconditional write
    #[default]
    None,
    /// Current etag must equal this one; a missing file never matches
    Match(ETag),
    /// Create only: the file must not exist yet
    Absent,
}

impl Precondition {
    /// Match the last seen etag, or require creation when nothing was seen
    pub fn from_seen(seen: Option<&ETag>) -> Self {
        match seen {
            Some(etag) => Precondition::Match(etag.clone()),
            None => Precondition::Absent,
        }
    }

    fn check(&self, path: &str, current: Option<&ETag>) -> StoreResult<()> {
        let holds = match self {
            Precondition::None => true,
            Precondition::Match(expected) => current == Some(expected),
            Precondition::Absent => current.is_none(),
        };
        if !holds {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Get/Set/Delete/Search by path
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get(&self, path: &str) -> StoreResult<DataETag>;

    /// Write `data` at `path` when `precondition` holds for the current file
    async fn set(&self, path: &str, data: Bytes, precondition: Precondition) -> StoreResult<ETag>;

    async fn delete(&self, path: &str, expected: Option<&ETag>) -> StoreResult<()>;

    /// Paths matching a glob pattern, sorted
    async fn search(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// `get` that maps a missing file to `None`
    async fn try_get(&self, path: &str) -> StoreResult<Option<DataETag>> {
        match self.get(path).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reject absolute paths, empty segments and parent references
pub fn validate_path(path: &str) -> StoreResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if invalid {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn check_expected(path: &str, current: Option<&ETag>, expected: Option<&ETag>) -> StoreResult<()> {
    match expected {
        Some(expected) if current != Some(expected) => Err(StoreError::Conflict {
            path: path.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Process-local store; several engines may share one instance
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<String, DataETag>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn get(&self, path: &str) -> StoreResult<DataETag> {
        validate_path(path)?;
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn set(&self, path: &str, data: Bytes, precondition: Precondition) -> StoreResult<ETag> {
        validate_path(path)?;
        let mut files = self.files.write().await;
        precondition.check(path, files.get(path).map(|f| &f.etag))?;

        let entry = DataETag::new(data);
        let etag = entry.etag.clone();
        files.insert(path.to_string(), entry);
        Ok(etag)
    }

    async fn delete(&self, path: &str, expected: Option<&ETag>) -> StoreResult<()> {
        validate_path(path)?;
        let mut files = self.files.write().await;
        let current = files
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        check_expected(path, Some(&current.etag), expected)?;
        files.remove(path);
        Ok(())
    }

    async fn search(&self, pattern: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .files
            .read()
            .await
            .keys()
            .filter(|path| glob_match(pattern, path))
            .cloned()
            .collect())
    }
}

/// Files under a root directory; writes go to a temp file then rename
#[derive(Debug)]
pub struct DirectoryFileStore {
    root: PathBuf,
    /// Serializes check-then-write within this process
    write_lock: Mutex<()>,
}

const TEMP_SUFFIX: &str = ".tmp";

impl DirectoryFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        DirectoryFileStore {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> StoreResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }

    async fn read_current(full: &Path, path: &str) -> StoreResult<DataETag> {
        match tokio::fs::read(full).await {
            Ok(data) => Ok(DataETag::new(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FileStore for DirectoryFileStore {
    async fn get(&self, path: &str) -> StoreResult<DataETag> {
        let full = self.full_path(path)?;
        Self::read_current(&full, path).await
    }

    async fn set(&self, path: &str, data: Bytes, precondition: Precondition) -> StoreResult<ETag> {
        let full = self.full_path(path)?;
        let _guard = self.write_lock.lock().await;

        if precondition != Precondition::None {
            let current = match Self::read_current(&full, path).await {
                Ok(current) => Some(current.etag),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            precondition.check(path, current.as_ref())?;
        }

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp = full.clone().into_os_string();
        temp.push(format!("-{}{}", uuid::Uuid::new_v4().simple(), TEMP_SUFFIX));
        tokio::fs::write(&temp, &data).await?;
        tokio::fs::rename(&temp, &full).await?;

        debug!("Wrote {} ({} bytes)", path, data.len());
        Ok(ETag::of(&data))
    }

    async fn delete(&self, path: &str, expected: Option<&ETag>) -> StoreResult<()> {
        let full = self.full_path(path)?;
        let _guard = self.write_lock.lock().await;

        let current = Self::read_current(&full, path).await?;
        check_expected(path, Some(&current.etag), expected)?;

        tokio::fs::remove_file(&full).await?;
        Ok(())
    }

    async fn search(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let relative: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                let relative = relative.join("/");

                if !relative.ends_with(TEMP_SUFFIX) && glob_match(pattern, &relative) {
                    found.push(relative);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_etag_is_content_hash() {
        assert_eq!(ETag::of(b"abc"), ETag::of(b"abc"));
        assert_ne!(ETag::of(b"abc"), ETag::of(b"abd"));
        assert_eq!(ETag::of(b"").as_str().len(), 64);
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("graph/map.json").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("a/../b").is_err());
        assert!(validate_path("a//b").is_err());
    }

    async fn exercise_store(store: &dyn FileStore) {
        let etag = store
            .set("a/one.json", Bytes::from_static(b"1"), Precondition::None)
            .await
            .unwrap();
        let read = store.get("a/one.json").await.unwrap();
        assert_eq!(read.data, Bytes::from_static(b"1"));
        assert_eq!(read.etag, etag);

        // Optimistic concurrency
        let stale = ETag::of(b"stale");
        let conflict = store
            .set("a/one.json", Bytes::from_static(b"2"), Precondition::Match(stale))
            .await;
        assert!(matches!(conflict, Err(StoreError::Conflict { .. })));
        let etag2 = store
            .set("a/one.json", Bytes::from_static(b"2"), Precondition::Match(etag.clone()))
            .await
            .unwrap();
        assert_ne!(etag, etag2);

        // Missing file never matches an expected etag
        let missing = store
            .set("a/new.json", Bytes::from_static(b"x"), Precondition::Match(etag))
            .await;
        assert!(matches!(missing, Err(StoreError::Conflict { .. })));

        // Create-only writes succeed once
        store
            .set("a/two.json", Bytes::from_static(b"2"), Precondition::Absent)
            .await
            .unwrap();
        let exists = store
            .set("a/two.json", Bytes::from_static(b"again"), Precondition::Absent)
            .await;
        assert!(matches!(exists, Err(StoreError::Conflict { .. })));
        assert_eq!(store.get("a/two.json").await.unwrap().data, Bytes::from_static(b"2"));

        store
            .set("b/three.json", Bytes::from_static(b"3"), Precondition::None)
            .await
            .unwrap();
        assert_eq!(store.search("a/*").await.unwrap(), vec!["a/one.json", "a/two.json"]);
        assert_eq!(store.search("*.json").await.unwrap().len(), 3);

        store.delete("a/one.json", None).await.unwrap();
        assert!(matches!(store.get("a/one.json").await, Err(StoreError::NotFound(_))));
        assert!(store.try_get("a/one.json").await.unwrap().is_none());
        assert!(matches!(store.delete("a/one.json", None).await, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_precondition_from_seen() {
        let etag = ETag::of(b"seen");
        assert_eq!(Precondition::from_seen(Some(&etag)), Precondition::Match(etag));
        assert_eq!(Precondition::from_seen(None), Precondition::Absent);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryFileStore::new();
        exercise_store(&store).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_directory_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryFileStore::new(temp_dir.path());
        exercise_store(&store).await;
        assert!(temp_dir.path().join("b/three.json").exists());
    }
}

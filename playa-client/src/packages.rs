//! Content-addressed package storage.
//!
//! Package bytes are stored under their BLAKE3 hash. The installed set
//! records the hex hash, so an evicted package's bytes can be released and
//! a corrupted file is caught on read.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

/// Package store errors.
#[derive(Error, Debug)]
pub enum PackageStoreError {
    /// Content not found in store.
    #[error("package content not found: {hash}")]
    NotFound {
        /// Hex-encoded hash of the missing content.
        hash: String,
    },

    /// Stored bytes no longer match their address.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected hash (hex-encoded).
        expected: String,
        /// Actual hash (hex-encoded).
        actual: String,
    },

    /// A recorded hash is not 32 hex-encoded bytes.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// Filesystem failure.
    #[error("package store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode a hex content hash as recorded in the installed set.
pub fn parse_hash(hex_hash: &str) -> Result<[u8; 32], PackageStoreError> {
    let bytes = hex::decode(hex_hash).map_err(|_| PackageStoreError::InvalidHash(hex_hash.into()))?;
    bytes
        .try_into()
        .map_err(|_| PackageStoreError::InvalidHash(hex_hash.into()))
}

/// Trait for content-addressed package storage.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Store package bytes and return their BLAKE3 hash.
    async fn put(&self, bytes: &[u8]) -> Result<[u8; 32], PackageStoreError>;

    /// Retrieve package bytes by hash.
    ///
    /// Returns `NotFound` if the hash is not in the store.
    async fn get(&self, hash: &[u8; 32]) -> Result<Vec<u8>, PackageStoreError>;

    /// Check if content exists in the store.
    async fn contains(&self, hash: &[u8; 32]) -> bool;

    /// Remove content from the store.
    ///
    /// Returns `Ok(true)` if removed, `Ok(false)` if not found.
    async fn remove(&self, hash: &[u8; 32]) -> Result<bool, PackageStoreError>;
}

/// In-memory package store for testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryPackageStore {
    blobs: Arc<Mutex<HashMap<[u8; 32], Vec<u8>>>>,
}

impl MemoryPackageStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct contents stored.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl PackageStore for MemoryPackageStore {
    async fn put(&self, bytes: &[u8]) -> Result<[u8; 32], PackageStoreError> {
        let hash = *blake3::hash(bytes).as_bytes();
        self.blobs.lock().unwrap().insert(hash, bytes.to_vec());
        Ok(hash)
    }

    async fn get(&self, hash: &[u8; 32]) -> Result<Vec<u8>, PackageStoreError> {
        self.blobs
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| PackageStoreError::NotFound {
                hash: hex::encode(hash),
            })
    }

    async fn contains(&self, hash: &[u8; 32]) -> bool {
        self.blobs.lock().unwrap().contains_key(hash)
    }

    async fn remove(&self, hash: &[u8; 32]) -> Result<bool, PackageStoreError> {
        Ok(self.blobs.lock().unwrap().remove(hash).is_some())
    }
}

/// Package store backed by a directory of files named by hex hash.
#[derive(Debug, Clone)]
pub struct DirectoryPackageStore {
    root: PathBuf,
}

impl DirectoryPackageStore {
    /// Open (creating if needed) a store at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, PackageStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, hash: &[u8; 32]) -> PathBuf {
        self.root.join(hex::encode(hash))
    }
}

#[async_trait]
impl PackageStore for DirectoryPackageStore {
    async fn put(&self, bytes: &[u8]) -> Result<[u8; 32], PackageStoreError> {
        let hash = *blake3::hash(bytes).as_bytes();
        let path = self.path_for(&hash);
        if tokio::fs::try_exists(&path).await? {
            return Ok(hash);
        }

        // A file under a hash address is always complete.
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(hash)
    }

    async fn get(&self, hash: &[u8; 32]) -> Result<Vec<u8>, PackageStoreError> {
        let bytes = match tokio::fs::read(self.path_for(hash)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PackageStoreError::NotFound {
                    hash: hex::encode(hash),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let actual = blake3::hash(&bytes);
        if actual.as_bytes() != hash {
            return Err(PackageStoreError::HashMismatch {
                expected: hex::encode(hash),
                actual: actual.to_hex().to_string(),
            });
        }
        Ok(bytes)
    }

    async fn contains(&self, hash: &[u8; 32]) -> bool {
        tokio::fs::try_exists(self.path_for(hash))
            .await
            .unwrap_or(false)
    }

    async fn remove(&self, hash: &[u8; 32]) -> Result<bool, PackageStoreError> {
        match tokio::fs::remove_file(self.path_for(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn memory_store_put_get_remove() {
        let store = MemoryPackageStore::new();
        let hash = store.put(b"map tiles").await.unwrap();
        assert_eq!(hash, *blake3::hash(b"map tiles").as_bytes());
        assert_eq!(store.get(&hash).await.unwrap(), b"map tiles");
        assert!(store.contains(&hash).await);

        assert!(store.remove(&hash).await.unwrap());
        assert!(!store.remove(&hash).await.unwrap());
        assert!(matches!(
            store.get(&hash).await,
            Err(PackageStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_dedups_identical_content() {
        let store = MemoryPackageStore::new();
        store.put(b"same").await.unwrap();
        store.put(b"same").await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn directory_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryPackageStore::open(dir.path().join("packages"))
            .await
            .unwrap();

        let hash = store.put(b"camp guide").await.unwrap();
        assert!(store.root().join(hex::encode(hash)).exists());
        assert_eq!(store.get(&hash).await.unwrap(), b"camp guide");
        assert!(store.contains(&hash).await);

        assert!(store.remove(&hash).await.unwrap());
        assert!(!store.contains(&hash).await);
        assert!(!store.remove(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn directory_store_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryPackageStore::open(dir.path()).await.unwrap();
        let hash = store.put(b"original").await.unwrap();
        std::fs::write(store.root().join(hex::encode(hash)), b"tampered").unwrap();

        assert!(matches!(
            store.get(&hash).await,
            Err(PackageStoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn parse_hash_roundtrip() {
        let hash = *blake3::hash(b"x").as_bytes();
        assert_eq!(parse_hash(&hex::encode(hash)).unwrap(), hash);
        assert!(matches!(
            parse_hash("abcd"),
            Err(PackageStoreError::InvalidHash(_))
        ));
        assert!(parse_hash("zz").is_err());
    }
}

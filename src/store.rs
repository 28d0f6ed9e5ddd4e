//! Blob storage for uploaded files.
//!
//! Callers persist upload bytes through a [`BlobStore`] and hand the bytes to
//! the parser themselves; nothing in the analysis core touches storage.
//! Handles are the SHA-256 digest of the content, so storing the same upload
//! twice yields the same handle.

use std::{
    collections::HashMap,
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    config::DEFAULT_MAX_FILE_BYTES,
    error::{AnalysisError, Result},
    io_utils,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn for_content(bytes: &[u8]) -> Self {
        BlobHandle(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Accepts only hex digests so a handle can never escape the store root.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(BlobHandle(trimmed.to_ascii_lowercase()))
        } else {
            Err(AnalysisError::BlobNotFound {
                handle: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<BlobHandle>;
    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>>;
}

pub struct FsBlobStore {
    root: PathBuf,
    max_bytes: u64,
}

impl FsBlobStore {
    pub fn open(root: &Path, max_bytes: u64) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            max_bytes,
        })
    }

    fn blob_path(&self, handle: &BlobHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobHandle> {
        io_utils::ensure_within_limit(bytes.len() as u64, self.max_bytes)?;
        let handle = BlobHandle::for_content(bytes);
        let path = self.blob_path(&handle);
        if !path.exists() {
            let staging = path.with_extension("partial");
            fs::write(&staging, bytes)?;
            fs::rename(&staging, &path)?;
            debug!("Stored {} byte(s) as {handle}", bytes.len());
        }
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        match fs::read(self.blob_path(handle)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(AnalysisError::BlobNotFound {
                handle: handle.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobHandle, Vec<u8>>>,
    max_bytes: u64,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl MemoryBlobStore {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            max_bytes,
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobHandle> {
        io_utils::ensure_within_limit(bytes.len() as u64, self.max_bytes)?;
        let handle = BlobHandle::for_content(bytes);
        let mut blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.entry(handle.clone()).or_insert_with(|| bytes.to_vec());
        Ok(handle)
    }

    fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs
            .get(handle)
            .cloned()
            .ok_or_else(|| AnalysisError::BlobNotFound {
                handle: handle.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_content_addressed() {
        let store = MemoryBlobStore::default();
        let first = store.put(b"a,b\n1,2\n").unwrap();
        let second = store.put(b"a,b\n1,2\n").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert_eq!(store.get(&first).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn oversized_payloads_are_refused() {
        let store = MemoryBlobStore::new(4);
        assert!(matches!(
            store.put(b"12345"),
            Err(AnalysisError::FileTooLarge { size: 5, limit: 4 })
        ));
    }

    #[test]
    fn fs_store_round_trips_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path(), 1024).unwrap();
        let handle = store.put(b"x\n1\n").unwrap();
        assert_eq!(store.get(&handle).unwrap(), b"x\n1\n");

        let unknown = BlobHandle::for_content(b"never stored");
        assert!(matches!(
            store.get(&unknown),
            Err(AnalysisError::BlobNotFound { .. })
        ));
    }

    #[test]
    fn parse_rejects_path_like_handles() {
        assert!(BlobHandle::parse("../etc/passwd").is_err());
        let handle = BlobHandle::for_content(b"data");
        assert_eq!(
            BlobHandle::parse(&handle.as_str().to_ascii_uppercase()).unwrap(),
            handle
        );
    }
}

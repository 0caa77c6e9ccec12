// ABOUTME: Name-addressed storage for raw file contents, kept outside the relational store
// ABOUTME: Filesystem and in-memory backends; blobs are bucketed per owner and never overwritten

use async_trait::async_trait;
#[cfg(test)]
use std::collections::HashMap;
use std::io;
#[cfg(test)]
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
#[cfg(test)]
use tokio::io::AsyncReadExt;
use tokio::io::{AsyncRead, AsyncWriteExt};
#[cfg(test)]
use tokio::sync::RwLock;

use crate::types::Owner;
use crate::validation::validate_file_name;

pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid blob name: {0}")]
    InvalidName(String),
    #[error("blob size mismatch: expected {expected} bytes, received {received}")]
    SizeMismatch { expected: u64, received: u64 },
    #[error("blob io error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams `content` into a new blob and returns the number of bytes written.
    /// When `size` is given the written length must match it.
    async fn put(
        &self,
        owner: &Owner,
        name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<u64, BlobError>;

    async fn get(&self, owner: &Owner, name: &str) -> Result<BlobReader, BlobError>;

    /// Removing a missing blob is not an error.
    async fn remove(&self, owner: &Owner, name: &str) -> Result<(), BlobError>;
}

fn checked_name(name: &str) -> Result<&str, BlobError> {
    validate_file_name(name).map_err(|_| BlobError::InvalidName(name.to_string()))?;
    Ok(name)
}

fn check_size(expected: Option<u64>, received: u64) -> Result<(), BlobError> {
    match expected {
        Some(expected) if expected != received => {
            Err(BlobError::SizeMismatch { expected, received })
        }
        _ => Ok(()),
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Upload in progress under the staging directory. The file is removed when
/// this is dropped, whether the write finished, failed or was abandoned.
struct PartialBlob {
    path: PathBuf,
}

impl PartialBlob {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartialBlob {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::error!(
                    "Failed to discard partial blob {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

/// Stores each blob as `<root>/owner-<id>/<name>`. Uploads are staged under
/// `<root>/.incoming` and linked into place only once fully written.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket(&self, owner: &Owner) -> PathBuf {
        self.root.join(format!("owner-{}", owner.id()))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(".incoming")
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        owner: &Owner,
        name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<u64, BlobError> {
        let name = checked_name(name)?;
        let bucket = self.bucket(owner);
        let path = bucket.join(name);
        if fs::try_exists(&path).await? {
            return Err(BlobError::AlreadyExists(name.to_string()));
        }

        let staging = self.staging_dir();
        fs::create_dir_all(&bucket).await?;
        fs::create_dir_all(&staging).await?;

        let partial = PartialBlob::new(staging.join(format!(
            "owner-{}-{}-{}",
            owner.id(),
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        )));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(partial.path())
            .await?;

        let written = tokio::io::copy(content, &mut file).await?;
        check_size(size, written)?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // No await between publishing the blob and returning, so a dropped
        // request either published it completely or left nothing behind.
        match std::fs::hard_link(partial.path(), &path) {
            Ok(()) => Ok(written),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(BlobError::AlreadyExists(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, owner: &Owner, name: &str) -> Result<BlobReader, BlobError> {
        let name = checked_name(name)?;
        let path = self.bucket(owner).join(name);

        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, owner: &Owner, name: &str) -> Result<(), BlobError> {
        let name = checked_name(name)?;
        match fs::remove_file(self.bucket(owner).join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(i32, String), Vec<u8>>>,
}

#[cfg(test)]
impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Raw stored bytes, for asserting on what actually reached the store.
    pub async fn raw(&self, owner: &Owner, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(&(owner.id(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        owner: &Owner,
        name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<u64, BlobError> {
        let name = checked_name(name)?;
        let key = (owner.id(), name.to_string());
        if self.blobs.read().await.contains_key(&key) {
            return Err(BlobError::AlreadyExists(name.to_string()));
        }

        let mut data = Vec::new();
        let written = content.read_to_end(&mut data).await? as u64;
        check_size(size, written)?;

        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(&key) {
            return Err(BlobError::AlreadyExists(name.to_string()));
        }
        blobs.insert(key, data);
        Ok(written)
    }

    async fn get(&self, owner: &Owner, name: &str) -> Result<BlobReader, BlobError> {
        let name = checked_name(name)?;
        let data = self
            .blobs
            .read()
            .await
            .get(&(owner.id(), name.to_string()))
            .cloned()
            .ok_or_else(|| BlobError::NotFound(name.to_string()))?;

        Ok(Box::pin(Cursor::new(data)))
    }

    async fn remove(&self, owner: &Owner, name: &str) -> Result<(), BlobError> {
        let name = checked_name(name)?;
        self.blobs
            .write()
            .await
            .remove(&(owner.id(), name.to_string()));
        Ok(())
    }
}

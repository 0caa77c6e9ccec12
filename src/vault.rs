// ABOUTME: Secret orchestration: validates, serializes, encrypts and persists each secret kind
// ABOUTME: Coordinates the credential store with the blob store for file contents

use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::blob::{BlobError, BlobReader, BlobStore};
use crate::crypto::{Cipher, CipherError};
use crate::entities::SecretKind;
use crate::storage::{NewSecret, Storage, StorageError, StoredSecret};
use crate::types::*;
use crate::validation::{Validate, ValidationError};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("secret not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("cipher failure: {0}")]
    Cipher(#[from] CipherError),
    #[error("payload encoding failure: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("storage failure: {0}")]
    Storage(StorageError),
    #[error("blob failure: {0}")]
    Blob(BlobError),
}

impl From<StorageError> for VaultError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => VaultError::NotFound,
            StorageError::AlreadyExists => {
                VaultError::Conflict("a file with this label already exists".to_string())
            }
            other => VaultError::Storage(other),
        }
    }
}

impl From<BlobError> for VaultError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::AlreadyExists(name) => {
                VaultError::Conflict(format!("file {} already exists", name))
            }
            other => VaultError::Blob(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Metadata and content of a decrypted file secret.
pub struct FileSecret {
    pub id: i32,
    pub file_name: String,
    pub label: String,
    pub note: String,
    pub content: BlobReader,
}

impl std::fmt::Debug for FileSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSecret")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("label", &self.label)
            .field("note", &self.note)
            .finish_non_exhaustive()
    }
}

struct Opened {
    payload: SecretPayload,
    stored: StoredSecret,
}

pub struct Vault {
    storage: Arc<Storage>,
    blobs: Arc<dyn BlobStore>,
    cipher: Arc<Cipher>,
    seal_blobs: bool,
}

impl Vault {
    /// With `seal_blobs` file contents pass through the cipher before they reach
    /// the blob store; otherwise they are stored as uploaded.
    pub fn new(
        storage: Arc<Storage>,
        blobs: Arc<dyn BlobStore>,
        cipher: Arc<Cipher>,
        seal_blobs: bool,
    ) -> Self {
        Self {
            storage,
            blobs,
            cipher,
            seal_blobs,
        }
    }

    pub async fn list(&self, owner: &Owner) -> Result<Vec<SecretSummary>> {
        Ok(self.storage.list_secret_summaries(owner).await?)
    }

    pub async fn add_password(&self, owner: &Owner, req: AddPasswordRequest) -> Result<i32> {
        req.validate()?;
        let payload = SecretPayload::Password(PasswordPayload {
            login: req.login,
            password: req.password,
        });
        self.seal_and_store(owner, &payload, req.label, req.note).await
    }

    pub async fn get_password(&self, owner: &Owner, id: i32) -> Result<PasswordSecret> {
        let opened = self.fetch_and_open(owner, id, SecretKind::Password).await?;
        match opened.payload {
            SecretPayload::Password(payload) => Ok(PasswordSecret {
                id: opened.stored.id,
                login: payload.login,
                password: payload.password,
                label: opened.stored.label,
                note: opened.stored.note,
            }),
            other => Err(kind_mismatch(SecretKind::Password, other.kind())),
        }
    }

    pub async fn add_card(&self, owner: &Owner, req: AddCardRequest) -> Result<i32> {
        req.validate()?;
        let payload = SecretPayload::Card(CardPayload {
            number: req.number,
            owner: req.owner,
            expiry_date: req.expiry_date,
            cvv2: req.cvv2,
        });
        self.seal_and_store(owner, &payload, req.label, req.note).await
    }

    pub async fn get_card(&self, owner: &Owner, id: i32) -> Result<CardSecret> {
        let opened = self.fetch_and_open(owner, id, SecretKind::Card).await?;
        match opened.payload {
            SecretPayload::Card(payload) => Ok(CardSecret {
                id: opened.stored.id,
                number: payload.number,
                owner: payload.owner,
                expiry_date: payload.expiry_date,
                cvv2: payload.cvv2,
                label: opened.stored.label,
                note: opened.stored.note,
            }),
            other => Err(kind_mismatch(SecretKind::Card, other.kind())),
        }
    }

    pub async fn add_text(&self, owner: &Owner, req: AddTextRequest) -> Result<i32> {
        req.validate()?;
        let payload = SecretPayload::Text(TextPayload { data: req.data });
        self.seal_and_store(owner, &payload, req.label, req.note).await
    }

    pub async fn get_text(&self, owner: &Owner, id: i32) -> Result<TextSecret> {
        let opened = self.fetch_and_open(owner, id, SecretKind::Text).await?;
        match opened.payload {
            SecretPayload::Text(payload) => Ok(TextSecret {
                id: opened.stored.id,
                data: payload.data,
                label: opened.stored.label,
                note: opened.stored.note,
            }),
            other => Err(kind_mismatch(SecretKind::Text, other.kind())),
        }
    }

    /// Writes the content to the blob store under its original file name, then
    /// records the encrypted `{file_name}` metadata.
    pub async fn add_file(
        &self,
        owner: &Owner,
        req: AddFileRequest,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<i32> {
        req.validate()?;
        if !req.label.is_empty() && self.storage.file_label_taken(owner, &req.label).await? {
            return Err(VaultError::Conflict(format!(
                "a file labelled {} already exists",
                req.label
            )));
        }

        if self.seal_blobs {
            let mut plain = Vec::new();
            content
                .read_to_end(&mut plain)
                .await
                .map_err(BlobError::from)?;
            if let Some(expected) = req.size {
                if expected != plain.len() as u64 {
                    return Err(VaultError::Blob(BlobError::SizeMismatch {
                        expected,
                        received: plain.len() as u64,
                    }));
                }
            }
            let sealed = self.cipher.encrypt(&plain)?;
            let size = sealed.len() as u64;
            self.blobs
                .put(owner, &req.file_name, &mut sealed.as_slice(), Some(size))
                .await?;
        } else {
            self.blobs
                .put(owner, &req.file_name, content, req.size)
                .await?;
        }

        // Until the record commits the blob is unreferenced, and it goes away
        // if this call is abandoned before then.
        let mut orphan = OrphanBlob::new(self.blobs.clone(), *owner, req.file_name.clone());

        let payload = SecretPayload::File(FilePayload {
            file_name: req.file_name.clone(),
        });
        match self.seal_and_store(owner, &payload, req.label, req.note).await {
            Ok(id) => {
                orphan.keep();
                Ok(id)
            }
            Err(err) => {
                if let Err(cleanup) = self.blobs.remove(owner, &req.file_name).await {
                    tracing::error!(
                        owner_id = owner.id(),
                        "Failed to remove blob {} after record creation failed: {}",
                        req.file_name,
                        cleanup
                    );
                }
                orphan.keep();
                Err(err)
            }
        }
    }

    pub async fn get_file(&self, owner: &Owner, id: i32) -> Result<FileSecret> {
        let opened = self.fetch_and_open(owner, id, SecretKind::File).await?;
        self.resolve_file(owner, opened).await
    }

    pub async fn get_file_by_label(&self, owner: &Owner, label: &str) -> Result<FileSecret> {
        let stored = self.storage.find_file_by_label(owner, label).await?;
        let opened = self.open(stored, SecretKind::File)?;
        self.resolve_file(owner, opened).await
    }

    async fn resolve_file(&self, owner: &Owner, opened: Opened) -> Result<FileSecret> {
        let payload = match opened.payload {
            SecretPayload::File(payload) => payload,
            other => return Err(kind_mismatch(SecretKind::File, other.kind())),
        };

        let mut content = self.blobs.get(owner, &payload.file_name).await?;
        if self.seal_blobs {
            let mut sealed = Vec::new();
            content
                .read_to_end(&mut sealed)
                .await
                .map_err(BlobError::from)?;
            let plain = self.cipher.decrypt(&sealed)?;
            content = Box::pin(Cursor::new(plain));
        }

        Ok(FileSecret {
            id: opened.stored.id,
            file_name: payload.file_name,
            label: opened.stored.label,
            note: opened.stored.note,
            content,
        })
    }

    async fn seal_and_store(
        &self,
        owner: &Owner,
        payload: &SecretPayload,
        label: String,
        note: String,
    ) -> Result<i32> {
        let ciphertext = self.cipher.encrypt(&payload.to_bytes()?)?;
        let id = self
            .storage
            .create_secret(
                owner,
                NewSecret {
                    kind: payload.kind(),
                    label,
                    note,
                    ciphertext,
                },
            )
            .await?;

        tracing::debug!(
            owner_id = owner.id(),
            secret_id = id,
            kind = payload.kind().as_str(),
            "Secret stored"
        );
        Ok(id)
    }

    async fn fetch_and_open(&self, owner: &Owner, id: i32, kind: SecretKind) -> Result<Opened> {
        let stored = self.storage.fetch_secret(owner, id, kind).await?;
        self.open(stored, kind)
    }

    fn open(&self, stored: StoredSecret, kind: SecretKind) -> Result<Opened> {
        let plaintext = self.cipher.decrypt(&stored.ciphertext).map_err(|err| {
            tracing::error!(
                secret_id = stored.id,
                kind = kind.as_str(),
                "Stored secret failed authentication"
            );
            err
        })?;
        let payload = SecretPayload::from_bytes(kind, &plaintext)?;
        Ok(Opened { payload, stored })
    }
}

/// Blob written for a record that does not exist yet. Dropping it without
/// `keep` schedules the blob's removal on the current runtime.
struct OrphanBlob {
    blobs: Arc<dyn BlobStore>,
    owner: Owner,
    name: String,
    armed: bool,
}

impl OrphanBlob {
    fn new(blobs: Arc<dyn BlobStore>, owner: Owner, name: String) -> Self {
        Self {
            blobs,
            owner,
            name,
            armed: true,
        }
    }

    fn keep(&mut self) {
        self.armed = false;
    }
}

impl Drop for OrphanBlob {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let blobs = self.blobs.clone();
        let owner = self.owner;
        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match blobs.remove(&owner, &name).await {
                        Ok(()) => tracing::warn!(
                            owner_id = owner.id(),
                            "Removed blob {} left by an abandoned upload",
                            name
                        ),
                        Err(err) => tracing::error!(
                            owner_id = owner.id(),
                            "Failed to remove blob {} left by an abandoned upload: {}",
                            name,
                            err
                        ),
                    }
                });
            }
            Err(_) => tracing::error!(
                owner_id = owner.id(),
                "No runtime to remove blob {} left by an abandoned upload",
                name
            ),
        }
    }
}

fn kind_mismatch(expected: SecretKind, found: SecretKind) -> VaultError {
    VaultError::Payload(serde::de::Error::custom(format!(
        "expected {} payload, decoded {}",
        expected.as_str(),
        found.as_str()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dropped_orphan_blob_is_removed() {
        let store = Arc::new(MemoryBlobStore::new());
        let owner = Owner::verified(1);
        store
            .put(&owner, "doc.bin", &mut &b"contents"[..], None)
            .await
            .unwrap();

        drop(OrphanBlob::new(store.clone(), owner, "doc.bin".to_string()));

        for _ in 0..50 {
            if store.len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_kept_orphan_blob_stays() {
        let store = Arc::new(MemoryBlobStore::new());
        let owner = Owner::verified(1);
        store
            .put(&owner, "doc.bin", &mut &b"contents"[..], None)
            .await
            .unwrap();

        let mut orphan = OrphanBlob::new(store.clone(), owner, "doc.bin".to_string());
        orphan.keep();
        drop(orphan);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.len().await, 1);
    }
}

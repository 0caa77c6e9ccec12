// ABOUTME: Server-side authenticated encryption of secret payloads and account password hashing
// ABOUTME: ChaCha20Poly1305 keyed by SHA-256 of the configured secret, Argon2 for login passwords

use argon2::{
    password_hash::{rand_core::OsRng as HashRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_SIZE: usize = 12; // 96 bits for ChaCha20Poly1305
const TAG_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key material")]
    InvalidKey,
    #[error("payload could not be sealed")]
    Seal,
    /// Ciphertext was not produced under this key, or it was altered.
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Process-wide payload cipher. One instance is built at startup from the
/// configured secret and shared by reference.
pub struct Cipher {
    aead: ChaCha20Poly1305,
}

impl Cipher {
    pub fn new(secret: &str) -> Result<Self, CipherError> {
        let key = Sha256::digest(secret.as_bytes());
        let aead = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { aead })
    }

    /// Output layout is `nonce || ciphertext || tag`, with a fresh nonce per call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::Authentication);
        }
        let (nonce, sealed) = blob.split_at(NONCE_SIZE);
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Authentication)
    }
}

pub fn hash_password(password: &str) -> Result<String, CipherError> {
    let salt = SaltString::generate(&mut HashRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CipherError::PasswordHash(err.to_string()))
}

/// Returns false for a wrong password and for an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::error!("Stored password hash is unreadable: {}", err);
            false
        }
    }
}

// ABOUTME: Type definitions for API requests, responses, the verified owner identity and secret payloads
// ABOUTME: SecretPayload ties each kind to the plaintext structure its ciphertext opens to

use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::entities::SecretKind;

/// Identity established by the access gate for the current request.
///
/// Storage and vault operations take an `&Owner` rather than a bare id, so a
/// secret can only be reached through an identity the gate has verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(i32);

impl Owner {
    pub(crate) fn verified(user_id: i32) -> Self {
        Self(user_id)
    }

    pub fn id(&self) -> i32 {
        self.0
    }
}

// Account types
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserTokenRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserTokenResponse {
    pub auth_token: String,
}

// Secret listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct SecretSummary {
    pub id: i32,
    pub kind: SecretKind,
    pub label: String,
    pub note: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponse {
    pub id: i32,
}

// Add requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddPasswordRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCardRequest {
    pub number: String,
    pub owner: String,
    pub expiry_date: String,
    pub cvv2: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddTextRequest {
    pub data: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
}

/// File metadata from an upload; the content travels separately as a reader.
#[derive(Debug, Clone, Default)]
pub struct AddFileRequest {
    pub file_name: String,
    pub size: Option<u64>,
    pub label: String,
    pub note: String,
}

// Decrypted views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSecret {
    pub id: i32,
    pub login: String,
    pub password: String,
    pub label: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSecret {
    pub id: i32,
    pub number: String,
    pub owner: String,
    pub expiry_date: String,
    pub cvv2: String,
    pub label: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSecret {
    pub id: i32,
    pub data: String,
    pub label: String,
    pub note: String,
}

// Plaintext payloads, never persisted unencrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPayload {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayload {
    pub number: String,
    pub owner: String,
    pub expiry_date: String,
    pub cvv2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPayload {
    Password(PasswordPayload),
    Card(CardPayload),
    Text(TextPayload),
    File(FilePayload),
}

impl SecretPayload {
    pub fn kind(&self) -> SecretKind {
        match self {
            SecretPayload::Password(_) => SecretKind::Password,
            SecretPayload::Card(_) => SecretKind::Card,
            SecretPayload::Text(_) => SecretKind::Text,
            SecretPayload::File(_) => SecretKind::File,
        }
    }

    /// Canonical byte form handed to the cipher: the variant's JSON object.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            SecretPayload::Password(payload) => serde_json::to_vec(payload),
            SecretPayload::Card(payload) => serde_json::to_vec(payload),
            SecretPayload::Text(payload) => serde_json::to_vec(payload),
            SecretPayload::File(payload) => serde_json::to_vec(payload),
        }
    }

    /// Decodes plaintext as the structure belonging to `kind`.
    pub fn from_bytes(kind: SecretKind, bytes: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            SecretKind::Password => SecretPayload::Password(serde_json::from_slice(bytes)?),
            SecretKind::Card => SecretPayload::Card(serde_json::from_slice(bytes)?),
            SecretKind::Text => SecretPayload::Text(serde_json::from_slice(bytes)?),
            SecretKind::File => SecretPayload::File(serde_json::from_slice(bytes)?),
        })
    }
}

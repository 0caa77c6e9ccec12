// ABOUTME: HTTP boundary error type mapping domain outcomes to status codes
// ABOUTME: Infrastructure and crypto failures are logged in full but answered with opaque bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::auth::AccountError;
use crate::blob::BlobError;
use crate::storage::StorageError;
use crate::validation::ValidationError;
use crate::vault::VaultError;

#[derive(Debug)]
pub enum AppError {
    Database(sea_orm::DbErr),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    Validation(ValidationError),
    Conflict(String),
    Crypto(String),
    Blob(BlobError),
    Serialization(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation(err) => write!(f, "Validation failed: {}", err),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Crypto(msg) => write!(f, "Cryptography error: {}", msg),
            AppError::Blob(err) => write!(f, "Blob store error: {}", err),
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(_) => {
                tracing::error!("Database error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "Authentication required".to_string(),
                )
            }
            AppError::NotFound(msg) => {
                tracing::info!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Validation(err) => {
                tracing::info!("Validation failed: {}", err);
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }
            AppError::Blob(BlobError::SizeMismatch { .. }) => {
                tracing::warn!("Upload rejected: {}", self);
                (
                    StatusCode::BAD_REQUEST,
                    "Uploaded size does not match the declared size".to_string(),
                )
            }
            AppError::Blob(_) => {
                tracing::error!("Blob store error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "File storage failed".to_string(),
                )
            }
            AppError::Crypto(_) => {
                tracing::error!("Cryptography error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Cryptography operation failed".to_string(),
                )
            }
            AppError::Serialization(_) => {
                tracing::error!("Serialization error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Data processing failed".to_string(),
                )
            }
            AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Conversion implementations
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => AppError::NotFound("no matching record".to_string()),
            StorageError::AlreadyExists => AppError::Conflict("record already exists".to_string()),
            StorageError::Database(err) => AppError::Database(err),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Validation(err) => AppError::Validation(err),
            VaultError::NotFound => AppError::NotFound("secret".to_string()),
            VaultError::Conflict(msg) => AppError::Conflict(msg),
            VaultError::Cipher(err) => AppError::Crypto(err.to_string()),
            VaultError::Payload(err) => AppError::Serialization(err.to_string()),
            VaultError::Storage(err) => err.into(),
            VaultError::Blob(BlobError::InvalidName(name)) => {
                AppError::BadRequest(format!("invalid file name: {}", name))
            }
            VaultError::Blob(err) => AppError::Blob(err),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(err) => AppError::Validation(err),
            AccountError::LoginTaken => AppError::Conflict("login already taken".to_string()),
            AccountError::InvalidCredentials => {
                AppError::Unauthorized("invalid login or password".to_string())
            }
            AccountError::Cipher(err) => AppError::Crypto(err.to_string()),
            AccountError::Token(err) => AppError::Internal(err.to_string()),
            AccountError::Storage(err) => err.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

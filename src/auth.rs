// ABOUTME: Account registration and login: password hashing, credential checks and token issuance
// ABOUTME: Unknown logins and wrong passwords fail the same way so the two cannot be told apart

use axum::{extract::State, http::StatusCode, response::Json};
use std::sync::Arc;
use thiserror::Error;

use crate::crypto::{hash_password, verify_password, CipherError};
use crate::error::Result;
use crate::storage::{Storage, StorageError};
use crate::token::{TokenError, TokenService};
use crate::types::*;
use crate::validation::{Validate, ValidationError};
use crate::AppState;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("login already taken")]
    LoginTaken,
    #[error("invalid login or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Cipher(#[from] CipherError),
    #[error("token issuance failed: {0}")]
    Token(#[from] TokenError),
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for AccountError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists => AccountError::LoginTaken,
            other => AccountError::Storage(other),
        }
    }
}

#[derive(Clone)]
pub struct Accounts {
    storage: Arc<Storage>,
    tokens: Arc<TokenService>,
}

impl Accounts {
    pub fn new(storage: Arc<Storage>, tokens: Arc<TokenService>) -> Self {
        Self { storage, tokens }
    }

    pub async fn register(
        &self,
        req: &RegisterUserRequest,
    ) -> std::result::Result<i32, AccountError> {
        req.validate()?;
        let password_hash = hash_password(&req.password)?;
        let user = self.storage.create_user(&req.login, &password_hash).await?;

        tracing::info!(user_id = user.id, "Registered user {}", user.login);
        Ok(user.id)
    }

    pub async fn issue_token(
        &self,
        req: &CreateUserTokenRequest,
    ) -> std::result::Result<String, AccountError> {
        let user = match self.storage.find_user_by_login(&req.login).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => {
                tracing::debug!("Token requested for unknown login");
                return Err(AccountError::InvalidCredentials);
            }
            Err(err) => return Err(err.into()),
        };

        if !verify_password(&req.password, &user.password_hash) {
            tracing::debug!(user_id = user.id, "Token requested with wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        Ok(self.tokens.issue(user.id)?)
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<StatusCode> {
    state.accounts.register(&req).await?;
    Ok(StatusCode::OK)
}

pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<CreateUserTokenRequest>,
) -> Result<Json<CreateUserTokenResponse>> {
    let auth_token = state.accounts.issue_token(&req).await?;
    Ok(Json(CreateUserTokenResponse { auth_token }))
}

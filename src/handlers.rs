// ABOUTME: HTTP handlers for secret endpoints; decode requests, call the vault, map outcomes to responses
// ABOUTME: File uploads arrive as multipart forms and downloads stream back as octet-streams

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::types::*;
use crate::vault::FileSecret;
use crate::AppState;

pub async fn ping(State(state): State<AppState>) -> Result<StatusCode> {
    state.storage.ping().await?;
    Ok(StatusCode::OK)
}

pub async fn list_data(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
) -> Result<Response> {
    let summaries = state.vault.list(&owner).await?;
    if summaries.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(summaries).into_response())
}

fn created(id: i32) -> (StatusCode, Json<AddResponse>) {
    (StatusCode::CREATED, Json(AddResponse { id }))
}

pub async fn add_password(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Json(req): Json<AddPasswordRequest>,
) -> Result<(StatusCode, Json<AddResponse>)> {
    let id = state.vault.add_password(&owner, req).await?;
    Ok(created(id))
}

pub async fn get_password(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<i32>,
) -> Result<Json<PasswordSecret>> {
    Ok(Json(state.vault.get_password(&owner, id).await?))
}

pub async fn add_card(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Json(req): Json<AddCardRequest>,
) -> Result<(StatusCode, Json<AddResponse>)> {
    let id = state.vault.add_card(&owner, req).await?;
    Ok(created(id))
}

pub async fn get_card(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<i32>,
) -> Result<Json<CardSecret>> {
    Ok(Json(state.vault.get_card(&owner, id).await?))
}

pub async fn add_text(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Json(req): Json<AddTextRequest>,
) -> Result<(StatusCode, Json<AddResponse>)> {
    let id = state.vault.add_text(&owner, req).await?;
    Ok(created(id))
}

pub async fn get_text(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<i32>,
) -> Result<Json<TextSecret>> {
    Ok(Json(state.vault.get_text(&owner, id).await?))
}

/// Expects a `file` part carrying a file name, plus optional `label` and
/// `note` text parts.
pub async fn add_file(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AddResponse>)> {
    let mut req = AddFileRequest::default();
    let mut content = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                req.file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read file: {}", e)))?;
                req.size = Some(bytes.len() as u64);
                content = Some(bytes);
            }
            "label" | "note" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read {}: {}", name, e)))?;
                if name == "label" {
                    req.label = value;
                } else {
                    req.note = value;
                }
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field {}", other);
            }
        }
    }

    let Some(content) = content else {
        return Err(AppError::BadRequest("missing file part".to_string()));
    };

    let id = state
        .vault
        .add_file(&owner, req, &mut &content[..])
        .await?;
    Ok(created(id))
}

pub async fn get_file(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<i32>,
) -> Result<Response> {
    let file = state.vault.get_file(&owner, id).await?;
    Ok(file_response(file))
}

pub async fn get_file_by_label(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(label): Path<String>,
) -> Result<Response> {
    let file = state.vault.get_file_by_label(&owner, &label).await?;
    Ok(file_response(file))
}

fn file_response(file: FileSecret) -> Response {
    let disposition = content_disposition(&file.file_name);
    let body = Body::from_stream(ReaderStream::new(file.content));

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// ASCII fallback in `filename`, exact name percent-encoded in `filename*`.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len());
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

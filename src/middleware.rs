// ABOUTME: Request middleware: the access gate that resolves a bearer token to a verified owner,
// ABOUTME: and response hardening headers applied to every route

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::storage::StorageError;
use crate::types::Owner;
use crate::AppState;

pub const LEGACY_TOKEN_HEADER: &str = "x-auth-token";

pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// `Authorization: Bearer` wins; `X-Auth-Token` is accepted when it is absent.
fn request_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        return value.to_str().ok().and_then(extract_bearer_token);
    }
    headers
        .get(LEGACY_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn rejected() -> Response {
    AppError::Unauthorized("access denied".to_string()).into_response()
}

/// Rejects the request before any handler runs unless the token verifies and
/// its owner still exists. On success the `Owner` is placed in the request
/// extensions.
pub async fn require_owner(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = request_token(request.headers()) else {
        tracing::debug!("Request without token rejected");
        return rejected();
    };

    let user_id = match state.tokens.verify(token) {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::warn!("Token verification failed: {}", err);
            return rejected();
        }
    };

    match state.storage.find_user_by_id(user_id).await {
        Ok(_) => {}
        Err(StorageError::NotFound) => {
            tracing::warn!(user_id, "Token signature valid but owner no longer exists");
            return rejected();
        }
        Err(err) => {
            tracing::error!(user_id, "Owner lookup failed: {}", err);
            return AppError::from(err).into_response();
        }
    }

    request.extensions_mut().insert(Owner::verified(user_id));
    next.run(request).await
}

pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    // Responses carry secrets; never cache them
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_authorization_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("legacy"));
        assert_eq!(request_token(&headers), Some("legacy"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer primary"));
        assert_eq!(request_token(&headers), Some("primary"));
    }
}

//! Anti-forgery tokens.
//!
//! Each session carries one random token, created on first use and rendered
//! into every form as the `_csrf` field. State-changing handlers verify it
//! through one of two extractors:
//!
//! - [`CsrfForm`] for url-encoded forms: checks the `_csrf` body field, then
//!   deserializes the rest of the body like `axum::Form`
//! - [`VerifiedCsrf`] for everything else (multipart uploads, bodiless
//!   POSTs): checks the `_csrf` query parameter or the `x-csrf-token` header
//!
//! Put these after `RequireAuth` in the handler arguments so anonymous
//! requests are sent to the login page first.

use axum::{
    Form,
    body::Body,
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::de::DeserializeOwned;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "_csrf";

/// Header accepted in place of the form field.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Largest url-encoded form body accepted.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// The session's token, created if the session has none yet.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn ensure_csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }
    let token = generate_token();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of the submitted token against the session's.
fn tokens_match(expected: Option<&str>, submitted: Option<&str>) -> bool {
    let (Some(expected), Some(submitted)) = (expected, submitted) else {
        return false;
    };
    if expected.is_empty() || expected.len() != submitted.len() {
        return false;
    }
    expected
        .bytes()
        .zip(submitted.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn session_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
    Ok(session.get::<String>(session_keys::CSRF_TOKEN).await?)
}

fn field_from_urlencoded(input: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(input)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// A url-encoded form whose `_csrf` field matched the session token.
pub struct CsrfForm<T>(pub T);

impl<S, T> FromRequest<S> for CsrfForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let expected = session_token(&parts)
            .await
            .map_err(IntoResponse::into_response)?;

        let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, path = %parts.uri.path(), "Unreadable form body");
                StatusCode::PAYLOAD_TOO_LARGE.into_response()
            })?;

        let submitted = field_from_urlencoded(&bytes);
        if !tokens_match(expected.as_deref(), submitted.as_deref()) {
            tracing::warn!(path = %parts.uri.path(), "CSRF token mismatch");
            return Err(AppError::Csrf.into_response());
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(value))
    }
}

/// Proof that the request carried a valid token in its query or headers.
pub struct VerifiedCsrf;

impl<S> FromRequestParts<S> for VerifiedCsrf
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let expected = session_token(parts).await?;

        let submitted = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .or_else(|| field_from_urlencoded(parts.uri.query().unwrap_or_default().as_bytes()));

        if tokens_match(expected.as_deref(), submitted.as_deref()) {
            Ok(Self)
        } else {
            tracing::warn!(path = %parts.uri.path(), "CSRF token mismatch");
            Err(AppError::Csrf)
        }
    }
}

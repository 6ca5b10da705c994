//! Per-request data every full page needs.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::csp::CspNonce;
use super::csrf::ensure_csrf_token;
use super::flash::take_flashes;
use crate::error::AppError;
use crate::models::{CurrentUser, Flash, session_keys};

/// Layout context: who is logged in, the form token, pending flash messages,
/// whether to show the site notice, and the CSP nonce.
///
/// Extracting it consumes the queued flash messages, so only extract it in
/// handlers that render a page.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    pub csrf_token: String,
    pub flashes: Vec<Flash>,
    pub show_popup: bool,
    pub nonce: String,
}

impl PageContext {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let current_user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await?;
        let csrf_token = ensure_csrf_token(&session).await?;
        let flashes = take_flashes(&session).await?;
        let show_popup = !session
            .get::<bool>(session_keys::POPUP_ACKNOWLEDGED)
            .await?
            .unwrap_or(false);
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_string())
            .unwrap_or_default();

        Ok(Self {
            current_user,
            csrf_token,
            flashes,
            show_popup,
            nonce,
        })
    }
}

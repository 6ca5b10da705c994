//! One-shot flash messages stored in the session.

use tower_sessions::Session;

use crate::models::{Flash, FlashLevel, session_keys};

/// Queue a message for the next rendered page.
///
/// Failures are logged; a lost flash message never fails the request.
pub async fn push_flash(session: &Session, level: FlashLevel, message: impl Into<String>) {
    let mut flashes = match session.get::<Vec<Flash>>(session_keys::FLASH).await {
        Ok(existing) => existing.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash messages");
            Vec::new()
        }
    };
    flashes.push(Flash {
        level,
        message: message.into(),
    });
    if let Err(e) = session.insert(session_keys::FLASH, flashes).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Remove and return all queued messages.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<Flash>>(session_keys::FLASH)
        .await?
        .unwrap_or_default())
}

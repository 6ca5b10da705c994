//! Session-related types.
//!
//! Everything here is stored in the tower-sessions record for the browser,
//! never in the application tables.

use serde::{Deserialize, Serialize};

use urbanstride_core::{Email, Purchaser, UserId};

use super::user::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Display name for the navigation bar.
    pub name: String,
    /// User's email address.
    pub email: Email,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

impl CurrentUser {
    /// Purchaser snapshot for a new order.
    #[must_use]
    pub fn purchaser(&self) -> Purchaser {
        Purchaser {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Severity of a flash message, used as a CSS modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the per-session anti-forgery token.
    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Key for pending flash messages.
    pub const FLASH: &str = "flash";

    /// Key for the payment session awaiting confirmation.
    pub const PENDING_CHECKOUT: &str = "pending_checkout";

    /// Key set once the shopper dismisses the site notice.
    pub const POPUP_ACKNOWLEDGED: &str = "popup_acknowledged";
}

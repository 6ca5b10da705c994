//! User account types.

use chrono::{DateTime, Utc};

use urbanstride_core::{Email, UserId};

/// A registered user. Any user may list products, which makes them the
/// owning admin of those products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Display name, shown on orders and invoices.
    pub name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

/// A user together with their stored password hash.
///
/// Implements `Debug` manually so the hash never reaches logs.
#[derive(Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

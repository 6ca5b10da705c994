//! Ownership checks for products and orders.
//!
//! Every mutation of a product and every read of an order goes through
//! [`authorize`]. Products belong to the admin who created them; orders belong
//! to their purchaser.

use crate::types::UserId;

/// A resource with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

/// The actor is not the owner of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("access denied")]
pub struct AccessDenied;

/// Whether `actor` may act on `resource`.
#[must_use]
pub fn is_allowed<R: Owned + ?Sized>(actor: UserId, resource: &R) -> bool {
    resource.owner_id() == actor
}

/// Like [`is_allowed`], as a `Result` for use with `?`.
///
/// # Errors
///
/// Returns [`AccessDenied`] when `actor` does not own `resource`.
pub fn authorize<R: Owned + ?Sized>(actor: UserId, resource: &R) -> Result<(), AccessDenied> {
    if is_allowed(actor, resource) {
        Ok(())
    } else {
        Err(AccessDenied)
    }
}

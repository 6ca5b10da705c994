//! Storefront models that are not part of the core domain.
//!
//! - [`user`] - Accounts as loaded from the database
//! - [`session`] - Values kept in the server-side session and their keys

pub mod session;
pub mod user;

pub use session::{CurrentUser, Flash, FlashLevel, keys as session_keys};
pub use user::{User, UserCredentials};

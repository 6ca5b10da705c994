//! Persistence for the storefront.
//!
//! # Database
//!
//! ## Tables
//!
//! - `users` - Shopper and admin accounts (argon2 password hashes)
//! - `products` - Catalog, each row owned by the admin who created it
//! - `cart_items` - One row per (user, product), quantity >= 1
//! - `orders` - Frozen order snapshots; lines stored as `JSONB`
//! - `password_reset_tokens` - Single-use reset links
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Stores
//!
//! Route handlers and services talk to the traits in this module
//! ([`CatalogStore`], [`UserStore`], [`OrderLedger`]) rather than to `sqlx`
//! directly. The `PostgreSQL` implementations live in the submodules.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p urbanstride-cli -- migrate
//! ```

pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use urbanstride_core::{
    Cart, Email, NewOrder, Order, OrderId, Product, ProductDraft, ProductId, UserId,
};

use crate::models::user::{User, UserCredentials};

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be turned back into a domain value.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Row not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Catalog
// =============================================================================

/// Fields for a product that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub draft: ProductDraft,
    pub image_url: String,
    pub owner_id: UserId,
}

/// Replacement fields for an existing product.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub draft: ProductDraft,
    pub image_url: String,
}

/// Product storage.
///
/// Update and delete take the acting owner and only touch rows that owner
/// created, so a mismatched owner behaves like a missing row.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All products, oldest first.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Products created by `owner`, oldest first.
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError>;

    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products for the given ids, in no particular order. Missing ids are skipped.
    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn insert(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Returns `None` when no product with `id` is owned by `owner`.
    async fn update_owned(
        &self,
        owner: UserId,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns whether a row owned by `owner` was deleted.
    async fn delete_owned(&self, owner: UserId, id: ProductId) -> Result<bool, RepositoryError>;

    /// Record the payment provider's id for a product.
    async fn set_provider_product_id(
        &self,
        id: ProductId,
        provider_product_id: &str,
    ) -> Result<(), RepositoryError>;
}

// =============================================================================
// Users
// =============================================================================

/// User accounts, carts and password reset tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// User plus password hash, for login.
    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;

    async fn set_password(&self, id: UserId, password_hash: &str)
    -> Result<(), RepositoryError>;

    /// The user's stored cart (empty if they never added anything).
    async fn load_cart(&self, id: UserId) -> Result<Cart, RepositoryError>;

    /// Replace the user's stored cart.
    async fn save_cart(&self, id: UserId, cart: &Cart) -> Result<(), RepositoryError>;

    async fn create_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// The user a reset token belongs to, if it is unused and unexpired.
    async fn find_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError>;

    /// Mark a valid token used, returning its user. `None` if invalid.
    async fn consume_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError>;
}

// =============================================================================
// Orders
// =============================================================================

/// Append-only order storage.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Orders placed by `purchaser`, in insertion order.
    async fn list_for_purchaser(&self, purchaser: UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

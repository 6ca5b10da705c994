//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! us-cli user create --name "Ada Lovelace" --email ada@example.com --password 'correct horse'
//! ```
//!
//! Any user can manage their own products, so this is mostly useful for
//! seeding a fresh database.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

use urbanstride_core::{Email, UserId};
use urbanstride_storefront::db::{RepositoryError, UserRepository, UserStore};
use urbanstride_storefront::services::auth::{hash_password, validate_password};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Repository failure other than a duplicate.
    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    /// Password too weak.
    #[error("Invalid password: {0}")]
    WeakPassword(String),

    /// Password could not be hashed.
    #[error("Failed to hash password")]
    PasswordHash,
}

/// Create a user with a password.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `UserError` if the email is invalid or taken, or the database is
/// unreachable.
pub async fn create_user(
    name: &str,
    email: &str,
    password: &SecretString,
) -> Result<UserId, UserError> {
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    validate_password(password.expose_secret()).map_err(UserError::WeakPassword)?;

    let database_url = super::database_url()
        .map_err(|_| UserError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(&database_url).await?;
    let users = UserRepository::new(pool);

    let password_hash = hash_password(password.expose_secret()).map_err(|_| UserError::PasswordHash)?;

    let user = users
        .create(name.trim(), &email, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!("User created successfully! ID: {}, Email: {}", user.id, user.email);
    Ok(user.id)
}

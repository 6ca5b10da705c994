//! Authentication service.
//!
//! Provides password signup and login plus emailed password reset tokens.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::RngCore;

use urbanstride_core::{Email, FieldErrors, UserId};

use crate::db::{RepositoryError, UserStore};
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum display name length, in characters.
const MAX_NAME_LENGTH: usize = 100;

/// How long a reset link stays valid.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Signup form fields as submitted.
#[derive(Debug, Clone, Copy)]
pub struct SignupInput<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

/// Authentication service.
///
/// Handles user registration, login, and password resets.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` with per-field messages if the input is
    /// invalid and `AuthError::UserAlreadyExists` if the email is registered.
    pub async fn signup(&self, input: SignupInput<'_>) -> Result<User, AuthError> {
        let mut errors = FieldErrors::new();

        let name = input.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            errors.add(
                "name",
                format!("Name must be between 1 and {MAX_NAME_LENGTH} characters."),
            );
        }

        let email = match Email::parse(input.email) {
            Ok(email) => Some(email),
            Err(_) => {
                errors.add("email", "Please enter a valid email.");
                None
            }
        };

        if let Err(message) = validate_password(input.password) {
            errors.add("password", message);
        }
        if input.password != input.confirm_password {
            errors.add("confirm_password", "Passwords have to match.");
        }

        let Some(email) = email.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        let password_hash = hash_password(input.password)?;

        let user = self
            .users
            .create(name, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        Ok(credentials.user)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for the account with this email.
    ///
    /// Returns `None` when no account matches, so callers can answer the same
    /// way either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn request_reset(&self, email: &str) -> Result<Option<(User, String)>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.users
            .create_reset_token(user.id, &token, expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(Some((user, token)))
    }

    /// The user a still-valid reset token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` for unknown, used or expired
    /// tokens.
    pub async fn check_reset_token(&self, token: &str) -> Result<UserId, AuthError> {
        self.users
            .find_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }

    /// Set a new password using a reset token. The token is used up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a weak or mismatched password
    /// (the token stays valid) and `AuthError::InvalidResetToken` if the
    /// token cannot be used.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<UserId, AuthError> {
        let mut errors = FieldErrors::new();
        if let Err(message) = validate_password(password) {
            errors.add("password", message);
        }
        if password != confirm_password {
            errors.add("confirm_password", "Passwords have to match.");
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let password_hash = hash_password(password)?;
        let user_id = self
            .users
            .consume_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;
        self.users.set_password(user_id, &password_hash).await?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(user_id)
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns the message to show when the password is too short.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    Ok(())
}

/// Hash a password using Argon2.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, hex encoded.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_reset_token_format() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }
}

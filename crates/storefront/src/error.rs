//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures unexpected errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Expected failures never render an error page: a missing or foreign
//! resource redirects to the home page, and a failed payment provider call
//! redirects to `/500`. Only unexpected errors produce a 500 response, and
//! that response never carries internal details.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use urbanstride_core::FieldErrors;

use crate::db::RepositoryError;
use crate::payment::PaymentError;
use crate::services::{
    AuthError, CartError, CatalogError, CheckoutError, ImageError, InvoiceError, OrderError,
};

/// Standalone 500 page. Does not extend the base layout, which needs
/// per-request context.
#[derive(Template, WebTemplate)]
#[template(path = "errors/500.html")]
pub struct ServerErrorTemplate;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The user does not own the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Form input failed validation.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Payment provider call failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] PaymentError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Anti-forgery token missing or wrong.
    #[error("Invalid CSRF token")]
    Csrf,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Session(_) | Self::Upstream(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::info!(error = %self, "Request rejected");
        }

        match self {
            // Don't reveal whether the resource exists or who owns it
            Self::NotFound(_) | Self::Forbidden(_) => Redirect::to("/").into_response(),
            Self::Upstream(_) => Redirect::to("/500").into_response(),
            Self::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, errors.to_string()).into_response()
            }
            Self::Csrf => (StatusCode::FORBIDDEN, "Invalid CSRF token").into_response(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate).into_response()
            }
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductNotFound(id) => Self::NotFound(format!("product {id}")),
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Payment(e) => Self::Upstream(e),
            CheckoutError::Cart(e) => e.into(),
            CheckoutError::Repository(e) => Self::Database(e),
            CheckoutError::Session(e) => Self::Session(e),
            other @ (CheckoutError::EmptyCart
            | CheckoutError::MissingPrice(_)
            | CheckoutError::NoPendingCheckout
            | CheckoutError::NotPaid(_)) => Self::Internal(other.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => Self::NotFound(format!("product {id}")),
            CatalogError::Forbidden(id) => Self::Forbidden(format!("product {id}")),
            CatalogError::Payment(e) => Self::Upstream(e),
            CatalogError::Repository(e) => Self::Database(e),
            CatalogError::Image(e) => e.into(),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::UnsupportedType(_) | ImageError::Empty => {
                let mut errors = FieldErrors::new();
                errors.add("image", "Attached file is not an image.");
                Self::Validation(errors)
            }
            ImageError::InvalidUrl(_) | ImageError::Io(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => Self::NotFound(format!("order {id}")),
            OrderError::Forbidden(id) => Self::Forbidden(format!("order {id}")),
            OrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => Self::Validation(errors),
            AuthError::Repository(e) => Self::Database(e),
            other @ (AuthError::InvalidCredentials
            | AuthError::UserAlreadyExists
            | AuthError::InvalidResetToken
            | AuthError::PasswordHash) => Self::Internal(other.to_string()),
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{
    CatalogStore, OrderLedger, OrderRepository, ProductRepository, UserRepository, UserStore,
};
use crate::payment::{PaymentError, PaymentProvider, StripeClient};
use crate::services::email::EmailService;
use crate::services::images::ImageStore;

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// The storage and provider implementations behind the application.
///
/// Production wires the `PostgreSQL` repositories and Stripe; tests pass
/// in-memory fakes.
pub struct Backends {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderLedger>,
    pub payments: Arc<dyn PaymentProvider>,
    pub email: Option<EmailService>,
    /// Used by the readiness probe. `None` reports ready unconditionally.
    pub pool: Option<PgPool>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like stores, the payment provider and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backends: Backends,
    images: ImageStore,
}

impl AppState {
    /// Create the production application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe HTTP client or the SMTP transport
    /// cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = StripeClient::new(&config.stripe)?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        let backends = Backends {
            catalog: Arc::new(ProductRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
            payments: Arc::new(payments),
            email,
            pool: Some(pool),
        };

        Ok(Self::with_backends(config, backends))
    }

    /// Create application state over explicit backends.
    #[must_use]
    pub fn with_backends(config: StorefrontConfig, backends: Backends) -> Self {
        let images = ImageStore::new(config.image_dir.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                images,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the database pool, if the state is backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.backends.pool.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.backends.catalog.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.backends.users.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderLedger {
        self.inner.backends.orders.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.backends.payments.as_ref()
    }

    /// Get the email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.backends.email.as_ref()
    }

    /// Get the product image store.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }
}

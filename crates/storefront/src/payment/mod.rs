//! Payment provider integration.
//!
//! The storefront needs a small slice of a payment provider: a product and a
//! price per catalog item, and a hosted checkout session per purchase. The
//! [`PaymentProvider`] trait captures exactly that slice; [`StripeClient`]
//! implements it against the Stripe REST API.
//!
//! There are no webhooks. A checkout is confirmed by re-fetching the session
//! when the shopper returns to the success URL.

mod stripe;

pub use stripe::StripeClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use urbanstride_core::{PaymentStatus, Price};

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("provider error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Requested object does not exist at the provider.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider returned a session without a redirect URL.
    #[error("checkout session {0} has no URL")]
    MissingCheckoutUrl(String),
}

/// Product details sent to the provider.
#[derive(Debug, Clone)]
pub struct ProviderProductInput<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// Our product id, stored as provider metadata.
    pub reference: String,
}

/// A price registered at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderPrice {
    pub id: String,
    pub active: bool,
    /// Amount in cents.
    pub unit_amount: Option<i64>,
}

/// One line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub price_id: String,
    pub quantity: u32,
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Pre-fills the email field on the hosted page.
    pub customer_email: Option<String>,
    /// Our user id, for reconciliation in the provider dashboard.
    pub client_reference_id: Option<String>,
}

/// A hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Where to send the shopper. Present on creation.
    pub url: Option<String>,
    pub payment_status: PaymentStatus,
    /// The user id the session was created for.
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

/// The operations the storefront needs from a payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Register a catalog product. Returns the provider product id.
    async fn create_product(&self, input: &ProviderProductInput<'_>)
    -> Result<String, PaymentError>;

    /// Register a price for a provider product. Returns the price id.
    async fn create_price(
        &self,
        provider_product_id: &str,
        price: Price,
    ) -> Result<String, PaymentError>;

    /// Active prices for a provider product, newest first.
    async fn list_prices(
        &self,
        provider_product_id: &str,
    ) -> Result<Vec<ProviderPrice>, PaymentError>;

    async fn deactivate_price(&self, price_id: &str) -> Result<(), PaymentError>;

    async fn deactivate_product(&self, provider_product_id: &str) -> Result<(), PaymentError>;

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError>;
}

//! Checkout: from cart to hosted payment session to order.
//!
//! # Flow
//!
//! 1. [`CheckoutService::create_checkout`] turns the live cart into a payment
//!    provider session and remembers its id in the browser session as a
//!    [`PendingCheckout`].
//! 2. The shopper pays on the provider's hosted page.
//! 3. [`CheckoutService::confirm_checkout`] runs when the shopper comes back.
//!    It re-fetches the provider session and, only if it is paid, records an
//!    order from the cart as it is at that moment, clears the cart and drops
//!    the pending token.
//!
//! The pending token lives only in the tower session. If the session expires
//! the checkout is abandoned and no order is ever written for it.
//!
//! Finalization is three separate writes (order, cart, token). A failure after
//! the order is stored is logged and the remaining steps still run; nothing
//! reconciles it afterwards. Removing the token is what makes a repeated
//! success callback a no-op.

use rust_decimal::Decimal;
use thiserror::Error;
use tower_sessions::Session;

use urbanstride_core::{NewOrder, Order, PendingCheckout, PopulatedCart, ProductId, UserId};

use crate::config::StorefrontConfig;
use crate::db::{OrderLedger, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::session::keys;
use crate::models::CurrentUser;
use crate::payment::{CheckoutLineItem, CheckoutRequest, PaymentError, PaymentProvider};
use crate::services::cart::{CartError, CartService};
use crate::state::AppState;

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart product has no active price at the payment provider.
    #[error("product {0} has no registered price")]
    MissingPrice(ProductId),

    /// The success callback was hit without a checkout in progress.
    #[error("no pending checkout")]
    NoPendingCheckout,

    /// The provider does not report the session as paid (yet).
    #[error("checkout session {0} is not paid")]
    NotPaid(String),

    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("cart error: {0}")]
    Cart(#[from] CartError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Cart contents and total shown before payment.
#[derive(Debug, Clone)]
pub struct CheckoutSummary {
    pub cart: PopulatedCart,
    pub total: Decimal,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    cart: CartService<'a>,
    orders: &'a dyn OrderLedger,
    payments: &'a dyn PaymentProvider,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            cart: CartService::new(state.users(), state.catalog()),
            orders: state.orders(),
            payments: state.payments(),
            config: state.config(),
        }
    }

    /// The populated cart and its total at current prices.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Cart` if the cart cannot be loaded.
    pub async fn get_checkout(&self, user: UserId) -> Result<CheckoutSummary, CheckoutError> {
        let cart = self.cart.get(user).await?;
        let total = cart.total().round_dp(2);
        Ok(CheckoutSummary { cart, total })
    }

    /// Start a hosted payment session for the current cart.
    ///
    /// Returns the URL to redirect the shopper to. On an empty cart nothing
    /// is sent to the provider and no pending checkout is recorded.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyCart` if there is nothing to buy
    /// - `CheckoutError::MissingPrice` if a product was never registered with
    ///   the provider
    /// - `CheckoutError::Payment` if a provider call fails
    #[tracing::instrument(skip(self, user, session), fields(user_id = %user.id))]
    pub async fn create_checkout(
        &self,
        user: &CurrentUser,
        session: &Session,
    ) -> Result<String, CheckoutError> {
        let cart = self.cart.get(user.id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut line_items = Vec::with_capacity(cart.lines.len());
        // Cart lines are unique per product, so one price lookup per product
        for line in &cart.lines {
            let provider_product_id = line
                .product
                .provider_product_id
                .as_deref()
                .ok_or(CheckoutError::MissingPrice(line.product.id))?;
            let price = self
                .payments
                .list_prices(provider_product_id)
                .await?
                .into_iter()
                .find(|p| p.active)
                .ok_or(CheckoutError::MissingPrice(line.product.id))?;
            line_items.push(CheckoutLineItem {
                price_id: price.id,
                quantity: line.quantity,
            });
        }

        let request = CheckoutRequest {
            line_items,
            success_url: self.config.url_for("/checkout/success"),
            cancel_url: self.config.url_for("/checkout/cancel"),
            customer_email: Some(user.email.to_string()),
            client_reference_id: Some(user.id.to_string()),
        };
        let checkout = self.payments.create_checkout_session(&request).await?;
        let url = checkout
            .url
            .ok_or_else(|| PaymentError::MissingCheckoutUrl(checkout.id.clone()))?;

        session
            .insert(keys::PENDING_CHECKOUT, PendingCheckout::new(checkout.id.as_str()))
            .await?;

        add_breadcrumb(
            "checkout",
            "Created checkout session",
            Some(&[("session_id", checkout.id.as_str())]),
        );
        tracing::info!(session_id = %checkout.id, "Created checkout session");

        Ok(url)
    }

    /// Turn a paid checkout into an order.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::NoPendingCheckout` if no checkout is in progress,
    ///   including a second call after a successful one, or if the pending
    ///   checkout was started by a different user (the token is dropped)
    /// - `CheckoutError::NotPaid` if the provider has not settled; the pending
    ///   checkout is kept so the shopper can retry
    /// - `CheckoutError::EmptyCart` if the session is paid but the cart has
    ///   been emptied meanwhile
    #[tracing::instrument(skip(self, user, session), fields(user_id = %user.id))]
    pub async fn confirm_checkout(
        &self,
        user: &CurrentUser,
        session: &Session,
    ) -> Result<Order, CheckoutError> {
        let pending: PendingCheckout = session
            .get(keys::PENDING_CHECKOUT)
            .await?
            .ok_or(CheckoutError::NoPendingCheckout)?;

        let checkout = self
            .payments
            .retrieve_checkout_session(&pending.session_id)
            .await?;
        // A token left behind by another account in this browser is never
        // settled against the current user's cart
        if checkout.client_reference_id.as_deref() != Some(user.id.to_string().as_str()) {
            tracing::warn!(
                session_id = %pending.session_id,
                client_reference_id = ?checkout.client_reference_id,
                "Pending checkout belongs to another user"
            );
            drop_pending(session).await;
            return Err(CheckoutError::NoPendingCheckout);
        }
        if !checkout.payment_status.is_paid() {
            tracing::info!(
                session_id = %pending.session_id,
                status = ?checkout.payment_status,
                "Checkout session not paid"
            );
            return Err(CheckoutError::NotPaid(pending.session_id));
        }

        let cart = self.cart.get(user.id).await?;
        let Some(new_order) = NewOrder::from_cart(user.purchaser(), &cart) else {
            tracing::error!(
                session_id = %pending.session_id,
                "Paid checkout session but cart is empty"
            );
            drop_pending(session).await;
            return Err(CheckoutError::EmptyCart);
        };

        let order = self.orders.insert(&new_order).await?;
        tracing::info!(
            order_id = %order.id,
            session_id = %pending.session_id,
            "Order created"
        );

        if let Err(e) = self.cart.clear(user.id).await {
            tracing::error!(error = %e, order_id = %order.id, "Failed to clear cart after order");
        }
        drop_pending(session).await;

        add_breadcrumb(
            "checkout",
            "Order created",
            Some(&[("order_id", order.id.to_string().as_str())]),
        );

        Ok(order)
    }
}

async fn drop_pending(session: &Session) {
    if let Err(e) = session
        .remove::<PendingCheckout>(keys::PENDING_CHECKOUT)
        .await
    {
        tracing::error!(error = %e, "Failed to remove pending checkout from session");
    }
}

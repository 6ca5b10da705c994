//! Checkout route handlers.
//!
//! ```text
//! GET /checkout          - summary with the total to pay
//! GET /create-checkout   - start a hosted payment session and redirect to it
//! GET /checkout/success  - payment provider return URL; records the order
//! GET /checkout/cancel   - payment provider cancel URL
//! ```
//!
//! Expected checkout failures (empty cart, nothing pending, not paid yet)
//! send the shopper to the error page with a flash message instead of
//! surfacing an error.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use tower_sessions::Session;
use tracing::instrument;

use urbanstride_core::PopulatedCart;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::models::FlashLevel;
use crate::services::{CheckoutError, CheckoutService};
use crate::state::AppState;

/// Checkout summary page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: PopulatedCart,
    pub total: Decimal,
}

/// Flash the reason and redirect to the error page.
async fn checkout_failed(session: &Session, message: &str) -> Response {
    push_flash(session, FlashLevel::Error, message).await;
    Redirect::to("/500").into_response()
}

/// Display the checkout summary.
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let summary = CheckoutService::new(&state).get_checkout(user.id).await?;
    Ok(CheckoutTemplate {
        ctx,
        cart: summary.cart,
        total: summary.total,
    })
}

/// Create a payment session for the cart and redirect to the hosted page.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Response> {
    match CheckoutService::new(&state)
        .create_checkout(&user, &session)
        .await
    {
        Ok(url) => Ok(Redirect::to(&url).into_response()),
        Err(CheckoutError::EmptyCart) => {
            Ok(checkout_failed(&session, "Your cart is empty.").await)
        }
        Err(e @ CheckoutError::MissingPrice(_)) => {
            tracing::error!(error = %e, "Cannot start checkout");
            Ok(checkout_failed(&session, "Some items in your cart cannot be purchased right now.").await)
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Payment provider success callback: turn the paid session into an order.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Response> {
    match CheckoutService::new(&state)
        .confirm_checkout(&user, &session)
        .await
    {
        Ok(_order) => {
            push_flash(&session, FlashLevel::Success, "Thank you! Your order has been placed.").await;
            Ok(Redirect::to("/orders").into_response())
        }
        Err(CheckoutError::NoPendingCheckout) => {
            Ok(checkout_failed(&session, "There is no checkout in progress.").await)
        }
        Err(CheckoutError::NotPaid(_)) => Ok(checkout_failed(
            &session,
            "Your payment has not been confirmed yet. Please try again shortly.",
        )
        .await),
        Err(CheckoutError::EmptyCart) => {
            Ok(checkout_failed(&session, "Your cart is empty.").await)
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Payment provider cancel callback. The pending session is kept.
#[instrument(skip(session, _user))]
pub async fn cancel(RequireAuth(_user): RequireAuth, session: Session) -> impl IntoResponse {
    push_flash(&session, FlashLevel::Info, "Checkout cancelled.").await;
    Redirect::to("/checkout")
}

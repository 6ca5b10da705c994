//! Cart route handlers.
//!
//! The cart belongs to the logged-in user and is stored with their account,
//! so it follows them across browsers. Totals always use current prices.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use urbanstride_core::{PopulatedCart, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CsrfForm, PageContext, RequireAuth};
use crate::services::CartService;
use crate::state::AppState;

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: PopulatedCart,
}

/// Display the cart.
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.users(), state.catalog())
        .get(user.id)
        .await?;
    Ok(CartShowTemplate { ctx, cart })
}

/// Add one unit of a product, then show the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CsrfForm(form): CsrfForm<AddToCartForm>,
) -> Result<impl IntoResponse> {
    CartService::new(state.users(), state.catalog())
        .add(user.id, form.product_id)
        .await?;

    add_breadcrumb(
        "cart",
        "Added product",
        Some(&[("product_id", form.product_id.to_string().as_str())]),
    );
    Ok(Redirect::to("/cart"))
}

/// Remove a product's entry from the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CsrfForm(form): CsrfForm<RemoveFromCartForm>,
) -> Result<impl IntoResponse> {
    CartService::new(state.users(), state.catalog())
        .remove(user.id, form.product_id)
        .await?;

    add_breadcrumb(
        "cart",
        "Removed product",
        Some(&[("product_id", form.product_id.to_string().as_str())]),
    );
    Ok(Redirect::to("/cart"))
}

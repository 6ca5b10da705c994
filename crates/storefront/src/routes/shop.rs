//! Catalog browsing and the site notice.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use tower_sessions::Session;
use tracing::instrument;

use urbanstride_core::{Product, ProductId};

use crate::error::Result;
use crate::filters;
use crate::middleware::{CsrfForm, IdPath, PageContext};
use crate::models::session_keys;
use crate::services::CatalogService;
use crate::state::AppState;

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/index.html")]
pub struct ShopIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/product.html")]
pub struct ProductTemplate {
    pub ctx: PageContext,
    pub product: Product,
}

/// Body of forms that carry nothing but the anti-forgery token.
#[derive(Debug, serde::Deserialize)]
pub struct EmptyForm {}

/// Display all products.
#[instrument(skip(state, ctx))]
pub async fn index(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    let products = CatalogService::new(&state).list().await?;
    Ok(ShopIndexTemplate { ctx, products })
}

/// Display one product. Unknown ids redirect to the listing.
#[instrument(skip(state, ctx))]
pub async fn product(
    State(state): State<AppState>,
    ctx: PageContext,
    IdPath(id): IdPath<ProductId>,
) -> Result<impl IntoResponse> {
    let product = CatalogService::new(&state).get(id).await?;
    Ok(ProductTemplate { ctx, product })
}

/// Dismiss the site notice for the rest of the session.
#[instrument(skip(session, _form))]
pub async fn acknowledge_popup(
    session: Session,
    CsrfForm(_form): CsrfForm<EmptyForm>,
) -> Result<impl IntoResponse> {
    session.insert(session_keys::POPUP_ACKNOWLEDGED, true).await?;
    Ok(Redirect::to("/"))
}

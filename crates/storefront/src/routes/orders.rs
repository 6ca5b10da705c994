//! Order history and invoices.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use tracing::instrument;

use urbanstride_core::{Order, OrderId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CsrfForm, IdPath, PageContext, RequireAuth};
use crate::routes::shop::EmptyForm;
use crate::services::{OrderService, render_invoice};
use crate::state::AppState;

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub orders: Vec<Order>,
}

/// Display the user's orders.
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let orders = OrderService::new(state.orders()).list(user.id).await?;
    Ok(OrdersTemplate { ctx, orders })
}

/// Render the invoice for one of the user's orders as an inline PDF.
///
/// Orders placed by someone else redirect to the home page, exactly like
/// unknown ids.
#[instrument(skip(state, user, _form), fields(user_id = %user.id))]
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    IdPath(id): IdPath<OrderId>,
    CsrfForm(_form): CsrfForm<EmptyForm>,
) -> Result<impl IntoResponse> {
    let order = OrderService::new(state.orders()).get(user.id, id).await?;

    // printpdf documents are not Send
    let generated_on = chrono::Utc::now();
    let pdf = tokio::task::spawn_blocking(move || render_invoice(&order, generated_on))
        .await
        .map_err(|e| AppError::Internal(format!("invoice task failed: {e}")))??;

    tracing::info!(order_id = %id, bytes = pdf.len(), "Invoice rendered");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"invoice-{id}.pdf\""),
            ),
        ],
        pdf,
    ))
}

//! Error pages and health checks.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Not found page template.
#[derive(Template, WebTemplate)]
#[template(path = "errors/404.html")]
pub struct NotFoundTemplate {
    pub ctx: PageContext,
}

/// Fallback for unmatched routes.
pub async fn not_found(ctx: PageContext) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { ctx })
}

/// Error page that expected failures redirect to. Unlike the bare page
/// unexpected errors render in place, it carries the layout and so shows the
/// flash message explaining what went wrong.
#[derive(Template, WebTemplate)]
#[template(path = "errors/error_page.html")]
pub struct ErrorPageTemplate {
    pub ctx: PageContext,
}

/// The generic error page that failed requests redirect to.
pub async fn server_error(ctx: PageContext) -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, ErrorPageTemplate { ctx })
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

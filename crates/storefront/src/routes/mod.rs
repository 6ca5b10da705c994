//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Shop
//! GET  /                             - Product listing
//! GET  /products/{id}                - Product detail
//! POST /acknowledge-popup            - Dismiss the site notice
//!
//! # Cart (requires auth)
//! GET  /cart                         - Cart page
//! POST /cart                         - Add to cart
//! POST /cart-delete-item             - Remove a product from the cart
//!
//! # Checkout (requires auth)
//! GET  /checkout                     - Summary and total
//! GET  /create-checkout              - Redirect to the hosted payment page
//! GET  /checkout/success             - Record the order for a paid session
//! GET  /checkout/cancel              - Back to the summary
//!
//! # Orders (requires auth)
//! GET  /orders                       - Order history
//! POST /orders/{id}                  - Invoice PDF
//!
//! # Admin (requires auth, scoped to own products)
//! GET  /admin/products               - Own products
//! GET  /admin/add-product            - Create form
//! POST /admin/add-product            - Create (multipart)
//! GET  /admin/edit-product/{id}      - Edit form (needs ?edit=true)
//! POST /admin/edit-product           - Update (multipart)
//! POST /admin/delete-product         - Delete
//!
//! # Auth (POSTs are rate limited)
//! GET  /login, POST /login           - Log in
//! GET  /signup, POST /signup         - Sign up
//! POST /logout                       - Log out
//! GET  /reset, POST /reset           - Request a password reset email
//! GET  /reset/{token}                - New password form
//! POST /new-password                 - Set the new password
//!
//! # Misc
//! GET  /500                          - Error page
//! GET  /health, /health/ready        - Liveness and readiness
//! ```
//!
//! Every POST carries the session's anti-forgery token.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod errors;
pub mod orders;
pub mod shop;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Largest accepted product form, image included.
const PRODUCT_FORM_LIMIT: usize = 10 * 1024 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            post(auth::login).layer(limiter.clone()).get(auth::login_page),
        )
        .route(
            "/signup",
            post(auth::signup).layer(limiter.clone()).get(auth::signup_page),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/reset",
            post(auth::reset).layer(limiter.clone()).get(auth::reset_page),
        )
        .route("/reset/{token}", get(auth::new_password_page))
        .route("/new-password", post(auth::new_password).layer(limiter))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::products))
        .route(
            "/add-product",
            get(admin::add_product_page)
                .post(admin::add_product)
                .layer(DefaultBodyLimit::max(PRODUCT_FORM_LIMIT)),
        )
        .route("/edit-product/{id}", get(admin::edit_product_page))
        .route(
            "/edit-product",
            post(admin::edit_product).layer(DefaultBodyLimit::max(PRODUCT_FORM_LIMIT)),
        )
        .route("/delete-product", post(admin::delete_product))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Shop
        .route("/", get(shop::index))
        .route("/products/{id}", get(shop::product))
        .route("/acknowledge-popup", post(shop::acknowledge_popup))
        // Cart
        .route("/cart", get(cart::show).post(cart::add))
        .route("/cart-delete-item", post(cart::remove))
        // Checkout
        .route("/checkout", get(checkout::show))
        .route("/create-checkout", get(checkout::create))
        .route("/checkout/success", get(checkout::success))
        .route("/checkout/cancel", get(checkout::cancel))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", post(orders::invoice))
        // Admin
        .nest("/admin", admin_routes())
        // Auth
        .merge(auth_routes())
        // Errors and health
        .route("/500", get(errors::server_error))
        .route("/health", get(errors::health))
        .route("/health/ready", get(errors::readiness))
        .fallback(errors::not_found)
}

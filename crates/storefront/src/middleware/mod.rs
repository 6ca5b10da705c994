//! HTTP middleware stack and request extractors for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Compression (gzip)
//! 5. CSP nonce (generate per-request nonce for inline scripts)
//! 6. Security headers (CSP, frame and isolation headers)
//! 7. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Rate limiting (governor) is attached per route to the auth POSTs only.
//!
//! # Extractors
//!
//! - [`RequireAuth`] - the logged-in user
//! - [`CsrfForm`] / [`VerifiedCsrf`] - anti-forgery checks
//! - [`PageContext`] - layout data for rendered pages
//! - [`IdPath`] - resource ids from the URL

pub mod auth;
pub mod context;
pub mod csp;
pub mod csrf;
pub mod flash;
pub mod path;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAuth, clear_current_user, set_current_user};
pub use context::PageContext;
pub use csp::{CspNonce, csp_nonce_middleware};
pub use csrf::{CSRF_FIELD, CsrfForm, VerifiedCsrf, ensure_csrf_token};
pub use flash::{push_flash, take_flashes};
pub use path::IdPath;
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer, session_layer};

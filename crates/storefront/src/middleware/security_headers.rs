//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Every response gets the transport and isolation headers. Rendered pages
//! additionally get the document policies (CSP, Permissions-Policy) and are
//! never cached, since they carry the session's CSRF token and flash
//! messages. Static assets and product images are public and may be cached.
//! Invoice PDFs are sent without a CSP so the browser's built-in viewer can
//! open them.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;
use crate::services::images::IMAGE_URL_PREFIX;

/// Path prefixes served from disk that hold no per-user data.
const PUBLIC_ASSET_PREFIXES: [&str; 2] = ["/static/", IMAGE_URL_PREFIX];

const PUBLIC_ASSET_CACHE: &str = "public, max-age=3600";

/// Browser features the storefront never uses.
const PERMISSIONS_POLICY: &str = "accelerometer=(), autoplay=(), browsing-topics=(), \
     camera=(), display-capture=(), fullscreen=(), geolocation=(), gyroscope=(), \
     magnetometer=(), microphone=(), midi=(), payment=(), picture-in-picture=(), \
     publickey-credentials-get=(), screen-wake-lock=(), serial=(), usb=(), \
     xr-spatial-tracking=()";

/// Add security headers to all responses.
///
/// Always applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: no-referrer`
/// - `Cross-Origin-Opener-Policy` / `Cross-Origin-Resource-Policy: same-origin`
///
/// HTML only:
/// - `Content-Security-Policy` (see below)
/// - `Permissions-Policy`
///
/// # CSP Policy
///
/// Inline scripts run only with the request's nonce (see
/// [`super::csp::CspNonce`]). Checkout leaves the site through a plain
/// redirect, so no payment provider origin is needed here. Forms post only
/// to the site itself.
/// ```text
/// default-src 'none';
/// script-src 'self' 'nonce-<per request>';
/// style-src 'self';
/// img-src 'self';
/// base-uri 'self';
/// form-action 'self';
/// frame-ancestors 'none'
/// ```
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();
    let public_asset = PUBLIC_ASSET_PREFIXES
        .iter()
        .any(|prefix| request.uri().path().starts_with(prefix));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    let cache = if public_asset {
        PUBLIC_ASSET_CACHE
    } else {
        "no-store, max-age=0"
    };
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache));

    if is_html(headers) {
        if let Ok(value) = HeaderValue::from_str(&content_security_policy(nonce.as_ref())) {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        headers.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        );
    }

    response
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = nonce.map_or_else(
        || "script-src 'self'".to_string(),
        |nonce| format!("script-src 'self' 'nonce-{}'", nonce.value()),
    );
    format!(
        "default-src 'none'; {script_src}; style-src 'self'; img-src 'self'; \
         base-uri 'self'; form-action 'self'; frame-ancestors 'none'"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        middleware,
        response::{Html, IntoResponse},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::csp_nonce_middleware;

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { Html("<p>ok</p>") }))
            .route(
                "/orders/1",
                get(|| async { ([(CONTENT_TYPE, "application/pdf")], "%PDF").into_response() }),
            )
            .route("/static/css/main.css", get(|| async { "body {}" }))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(csp_nonce_middleware))
    }

    async fn get_headers(uri: &str) -> HeaderMap {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn test_pages_carry_request_nonce_and_no_store() {
        let headers = get_headers("/").await;

        let csp = headers.get(CONTENT_SECURITY_POLICY).unwrap().to_str().unwrap();
        assert!(csp.contains("script-src 'self' 'nonce-"));
        assert!(csp.contains("form-action 'self'"));
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store, max-age=0");
    }

    #[tokio::test]
    async fn test_pdf_has_no_csp() {
        let headers = get_headers("/orders/1").await;
        assert!(headers.get(CONTENT_SECURITY_POLICY).is_none());
        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    }

    #[tokio::test]
    async fn test_static_assets_are_cacheable() {
        let headers = get_headers("/static/css/main.css").await;
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), PUBLIC_ASSET_CACHE);
    }
}

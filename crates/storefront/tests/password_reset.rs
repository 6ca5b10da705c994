//! Password reset: token issue, lookup, single use and expiry.

#![allow(clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use urbanstride_storefront::db::UserStore;
use urbanstride_storefront::services::{AuthError, AuthService};

use common::{CSRF, TestApp, get, location, post_form};

#[tokio::test]
async fn test_request_reset_only_issues_tokens_for_known_accounts() {
    let app = TestApp::new();
    let ada = app.create_user("Ada", "ada@example.com").await;
    let auth = AuthService::new(app.users.as_ref());

    assert!(auth.request_reset("nobody@example.com").await.unwrap().is_none());
    assert!(auth.request_reset("not an email").await.unwrap().is_none());
    assert_eq!(app.users.reset_token_count().await, 0);

    let (user, token) = auth.request_reset("ada@example.com").await.unwrap().unwrap();
    assert_eq!(user.id, ada.id);
    assert_eq!(auth.check_reset_token(&token).await.unwrap(), ada.id);
    assert!(matches!(
        auth.check_reset_token("deadbeef").await,
        Err(AuthError::InvalidResetToken)
    ));
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let app = TestApp::new();
    let ada = app.create_user("Ada", "ada@example.com").await;
    let auth = AuthService::new(app.users.as_ref());
    let (_, token) = auth.request_reset("ada@example.com").await.unwrap().unwrap();

    // A rejected password leaves the token usable
    assert!(matches!(
        auth.reset_password(&token, "short", "short").await,
        Err(AuthError::Validation(_))
    ));
    assert!(auth.check_reset_token(&token).await.is_ok());

    let user_id = auth
        .reset_password(&token, "brand new secret", "brand new secret")
        .await
        .unwrap();
    assert_eq!(user_id, ada.id);
    assert!(auth.login("ada@example.com", "brand new secret").await.is_ok());

    assert!(matches!(
        auth.check_reset_token(&token).await,
        Err(AuthError::InvalidResetToken)
    ));
    assert!(matches!(
        auth.reset_password(&token, "another secret", "another secret").await,
        Err(AuthError::InvalidResetToken)
    ));
    assert!(auth.login("ada@example.com", "brand new secret").await.is_ok());
    assert!(auth.login("ada@example.com", "another secret").await.is_err());
}

#[tokio::test]
async fn test_expired_reset_token_is_rejected() {
    let app = TestApp::new();
    let ada = app.create_user("Ada", "ada@example.com").await;
    app.users
        .create_reset_token(ada.id, "expired-token", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    let auth = AuthService::new(app.users.as_ref());

    assert!(matches!(
        auth.check_reset_token("expired-token").await,
        Err(AuthError::InvalidResetToken)
    ));
    assert!(matches!(
        auth.reset_password("expired-token", "brand new secret", "brand new secret").await,
        Err(AuthError::InvalidResetToken)
    ));

    let cookie = app.session(None).await;
    let response = app.send(get("/reset/expired-token", &cookie)).await;
    assert_eq!(location(&response), "/reset");
}

#[tokio::test]
async fn test_reset_form_answers_the_same_for_unknown_email() {
    let app = TestApp::new();
    app.create_user("Ada", "ada@example.com").await;
    let cookie = app.session(None).await;

    let body = format!("_csrf={CSRF}&email=nobody%40example.com");
    let unknown = app.send(post_form("/reset", &cookie, &body)).await;
    let body = format!("_csrf={CSRF}&email=ada%40example.com");
    let known = app.send(post_form("/reset", &cookie, &body)).await;

    assert_eq!(unknown.status(), StatusCode::SEE_OTHER);
    assert_eq!(known.status(), unknown.status());
    assert_eq!(location(&unknown), "/");
    assert_eq!(location(&known), "/");
    assert_eq!(app.users.reset_token_count().await, 1);
}

#[tokio::test]
async fn test_new_password_form_uses_up_token() {
    let app = TestApp::new();
    let ada = app.create_user("Ada", "ada@example.com").await;
    let (_, token) = AuthService::new(app.users.as_ref())
        .request_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    let cookie = app.session(None).await;

    let response = app.send(get(&format!("/reset/{token}"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = format!(
        "_csrf={CSRF}&token={token}&password=brand+new+secret&confirm_password=brand+new+secret"
    );
    let response = app.send(post_form("/new-password", &cookie, &body)).await;
    assert_eq!(location(&response), "/login");

    let response = app.send(post_form("/new-password", &cookie, &body)).await;
    assert_eq!(location(&response), "/reset");

    let user = AuthService::new(app.users.as_ref())
        .login("ada@example.com", "brand new secret")
        .await
        .unwrap();
    assert_eq!(user.id, ada.id);
}

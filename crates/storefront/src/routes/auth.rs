//! Authentication route handlers.
//!
//! Handles login, signup, logout, and password reset. Passwords are verified
//! locally with argon2; the session id is rotated on login and the whole
//! session is discarded on logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use urbanstride_core::FieldErrors;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CsrfForm, PageContext, clear_current_user, push_flash, set_current_user};
use crate::models::{CurrentUser, FlashLevel};
use crate::routes::shop::EmptyForm;
use crate::services::auth::SignupInput;
use crate::services::email::{spawn_password_reset, spawn_welcome_email};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Shown whether or not the email belongs to an account.
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a link to reset your password is on its way.";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signup form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Password reset request form data.
#[derive(Debug, Deserialize)]
pub struct ResetForm {
    pub email: String,
}

/// New password form data.
#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub error: Option<String>,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub name: String,
    pub email: String,
    pub errors: FieldErrors,
}

/// Password reset request page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset.html")]
pub struct ResetTemplate {
    pub ctx: PageContext,
}

/// New password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/new_password.html")]
pub struct NewPasswordTemplate {
    pub ctx: PageContext,
    pub token: String,
    pub errors: FieldErrors,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(ctx))]
pub async fn login_page(ctx: PageContext) -> impl IntoResponse {
    LoginTemplate {
        ctx,
        email: String::new(),
        error: None,
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    CsrfForm(form): CsrfForm<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.users())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            let current_user = CurrentUser::from(&user);
            set_current_user(&session, &current_user).await?;
            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::info!(user_id = %user.id, "User logged in");
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login failed");
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                LoginTemplate {
                    ctx,
                    email: form.email,
                    error: Some("Invalid email or password.".to_string()),
                },
            )
                .into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Log out and discard the session.
#[instrument(skip_all)]
pub async fn logout(session: Session, CsrfForm(_form): CsrfForm<EmptyForm>) -> Result<impl IntoResponse> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
#[instrument(skip(ctx))]
pub async fn signup_page(ctx: PageContext) -> impl IntoResponse {
    SignupTemplate {
        ctx,
        name: String::new(),
        email: String::new(),
        errors: FieldErrors::new(),
    }
}

/// Handle signup form submission.
///
/// Invalid input re-renders the form with every field message. On success a
/// welcome email is sent in the background and the user is asked to log in.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    CsrfForm(form): CsrfForm<SignupForm>,
) -> Result<Response> {
    let input = SignupInput {
        name: &form.name,
        email: &form.email,
        password: &form.password,
        confirm_password: &form.confirm_password,
    };

    let errors = match AuthService::new(state.users()).signup(input).await {
        Ok(user) => {
            spawn_welcome_email(
                state.email(),
                user.email.to_string(),
                user.name.clone(),
                state.config().url_for("/"),
            );
            push_flash(&session, FlashLevel::Success, "Account created. Please log in.").await;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(AuthError::Validation(errors)) => errors,
        Err(AuthError::UserAlreadyExists) => {
            let mut errors = FieldErrors::new();
            errors.add("email", "An account with this email already exists.");
            errors
        }
        Err(e) => return Err(AppError::from(e)),
    };

    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        SignupTemplate {
            ctx,
            name: form.name,
            email: form.email,
            errors,
        },
    )
        .into_response())
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the reset request page.
#[instrument(skip(ctx))]
pub async fn reset_page(ctx: PageContext) -> impl IntoResponse {
    ResetTemplate { ctx }
}

/// Issue a reset token and email the link.
///
/// The response is the same whether or not the email has an account.
#[instrument(skip_all)]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    CsrfForm(form): CsrfForm<ResetForm>,
) -> Result<impl IntoResponse> {
    if let Some((user, token)) = AuthService::new(state.users())
        .request_reset(&form.email)
        .await?
    {
        let reset_url = state.config().url_for(&format!("/reset/{token}"));
        spawn_password_reset(state.email(), user.email.to_string(), reset_url);
    }

    push_flash(&session, FlashLevel::Info, RESET_REQUESTED_MESSAGE).await;
    Ok(Redirect::to("/"))
}

/// Display the new password form for a valid reset token.
#[instrument(skip_all)]
pub async fn new_password_page(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Path(token): Path<String>,
) -> Result<Response> {
    match AuthService::new(state.users())
        .check_reset_token(&token)
        .await
    {
        Ok(_) => Ok(NewPasswordTemplate {
            ctx,
            token,
            errors: FieldErrors::new(),
        }
        .into_response()),
        Err(AuthError::InvalidResetToken) => {
            push_flash(&session, FlashLevel::Error, "This reset link is invalid or has expired.").await;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Set a new password and use up the token.
#[instrument(skip_all)]
pub async fn new_password(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    CsrfForm(form): CsrfForm<NewPasswordForm>,
) -> Result<Response> {
    match AuthService::new(state.users())
        .reset_password(&form.token, &form.password, &form.confirm_password)
        .await
    {
        Ok(_) => {
            push_flash(&session, FlashLevel::Success, "Your password has been updated. Please log in.").await;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AuthError::Validation(errors)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            NewPasswordTemplate {
                ctx,
                token: form.token,
                errors,
            },
        )
            .into_response()),
        Err(AuthError::InvalidResetToken) => {
            push_flash(&session, FlashLevel::Error, "This reset link is invalid or has expired.").await;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

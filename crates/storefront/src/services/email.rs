//! Transactional email.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Every message is
//! sent as multipart plain text + HTML.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// HTML template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

/// Plain text template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

/// HTML template for the password reset email.
#[derive(Template)]
#[template(path = "email/reset.html")]
struct ResetEmailHtml<'a> {
    reset_url: &'a str,
}

/// Plain text template for the password reset email.
#[derive(Template)]
#[template(path = "email/reset.txt")]
struct ResetEmailText<'a> {
    reset_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a welcome email after signup.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(
        &self,
        to: &str,
        name: &str,
        shop_url: &str,
    ) -> Result<(), EmailError> {
        let html = WelcomeEmailHtml { name, shop_url }.render()?;
        let text = WelcomeEmailText { name, shop_url }.render()?;

        self.send_multipart_email(to, "Welcome to UrbanStride", &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), EmailError> {
        let html = ResetEmailHtml { reset_url }.render()?;
        let text = ResetEmailText { reset_url }.render()?;

        self.send_multipart_email(to, "Reset your UrbanStride password", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Send the welcome email in the background. Failures are logged.
pub fn spawn_welcome_email(email: Option<&EmailService>, to: String, name: String, shop_url: String) {
    let Some(email) = email.cloned() else {
        tracing::debug!(to = %to, "Email disabled, skipping welcome email");
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome_email(&to, &name, &shop_url).await {
            tracing::warn!(error = %e, to = %to, "Failed to send welcome email");
        }
    });
}

/// Send a password reset email in the background. Failures are logged.
pub fn spawn_password_reset(email: Option<&EmailService>, to: String, reset_url: String) {
    let Some(email) = email.cloned() else {
        tracing::debug!(to = %to, "Email disabled, skipping password reset email");
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = email.send_password_reset(&to, &reset_url).await {
            tracing::warn!(error = %e, to = %to, "Failed to send password reset email");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_templates_include_link() {
        let reset_url = "https://shop.test/reset/abc123";
        let html = ResetEmailHtml { reset_url }.render().unwrap();
        let text = ResetEmailText { reset_url }.render().unwrap();
        assert!(html.contains(reset_url));
        assert!(text.contains(reset_url));
    }

    #[test]
    fn test_welcome_template_escapes_name() {
        let html = WelcomeEmailHtml {
            name: "<b>Ada</b>",
            shop_url: "https://shop.test",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Ada</b>"));
        assert!(html.contains("&#60;b&#62;Ada") || html.contains("&lt;b&gt;Ada"));
    }
}

//! Stripe REST API client.
//!
//! Stripe takes `application/x-www-form-urlencoded` request bodies with
//! bracketed keys for nested fields (`line_items[0][price]`) and answers with
//! JSON. Only the handful of endpoints the storefront needs are covered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use urbanstride_core::Price;

use super::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, ProviderPrice,
    ProviderProductInput,
};
use crate::config::StripeConfig;

/// Upper bound on a single Stripe request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Stripe API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.expose_secret().to_string(),
                currency: config.currency.clone(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.inner.api_base)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self
            .inner
            .client
            .get(self.url(path))
            .bearer_auth(&self.inner.secret_key)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .inner
            .client
            .post(self.url(path))
            .bearer_auth(&self.inner.secret_key)
            .form(form)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn parse<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        // Body as text first for better error diagnostics
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(
                status = %status,
                path = %path,
                message = %message,
                "Stripe API returned non-success status"
            );
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Stripe response"
            );
            PaymentError::Parse(e)
        })
    }
}

/// Flatten checkout parameters into Stripe's bracketed form keys.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    for (i, item) in request.line_items.iter().enumerate() {
        form.push((format!("line_items[{i}][price]"), item.price_id.clone()));
        form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
    }
    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }
    if let Some(reference) = &request.client_reference_id {
        form.push(("client_reference_id".to_string(), reference.clone()));
    }
    form
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(skip(self, input), fields(reference = %input.reference))]
    async fn create_product(
        &self,
        input: &ProviderProductInput<'_>,
    ) -> Result<String, PaymentError> {
        let form = vec![
            ("name".to_string(), input.name.to_string()),
            ("description".to_string(), input.description.to_string()),
            ("metadata[product_id]".to_string(), input.reference.clone()),
        ];
        let created: IdResponse = self.post("products", &form).await?;
        Ok(created.id)
    }

    #[tracing::instrument(skip(self))]
    async fn create_price(
        &self,
        provider_product_id: &str,
        price: Price,
    ) -> Result<String, PaymentError> {
        let form = vec![
            ("product".to_string(), provider_product_id.to_string()),
            ("unit_amount".to_string(), price.cents().to_string()),
            ("currency".to_string(), self.inner.currency.clone()),
        ];
        let created: IdResponse = self.post("prices", &form).await?;
        Ok(created.id)
    }

    #[tracing::instrument(skip(self))]
    async fn list_prices(
        &self,
        provider_product_id: &str,
    ) -> Result<Vec<ProviderPrice>, PaymentError> {
        let path = format!(
            "prices?product={}&active=true",
            urlencoding::encode(provider_product_id)
        );
        let list: ListResponse<ProviderPrice> = self.get(&path).await?;
        Ok(list.data)
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_price(&self, price_id: &str) -> Result<(), PaymentError> {
        let form = vec![("active".to_string(), "false".to_string())];
        let _: IdResponse = self
            .post(&format!("prices/{}", urlencoding::encode(price_id)), &form)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_product(&self, provider_product_id: &str) -> Result<(), PaymentError> {
        let form = vec![("active".to_string(), "false".to_string())];
        let _: IdResponse = self
            .post(
                &format!("products/{}", urlencoding::encode(provider_product_id)),
                &form,
            )
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.post("checkout/sessions", &checkout_form(request)).await
    }

    #[tracing::instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        self.get(&format!(
            "checkout/sessions/{}",
            urlencoding::encode(session_id)
        ))
        .await
    }
}

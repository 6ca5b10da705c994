//! Shared fixtures for the storefront integration tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` over
//! in-memory stores, a scripted payment provider and a `MemoryStore` session
//! store. Sessions are seeded directly in the store so tests can act as a
//! logged-in user without going through the login form.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::{MemoryStore, SessionStore};

use urbanstride_core::{
    Cart, Email, NewOrder, Order, OrderId, PaymentStatus, Price, Product, ProductDraft, ProductId,
    UserId,
};
use urbanstride_storefront::config::{StorefrontConfig, StripeConfig};
use urbanstride_storefront::db::{
    CatalogStore, NewProduct, OrderLedger, ProductUpdate, RepositoryError, UserStore,
};
use urbanstride_storefront::middleware::session_layer;
use urbanstride_storefront::models::{CurrentUser, User, UserCredentials};
use urbanstride_storefront::payment::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, ProviderPrice,
    ProviderProductInput,
};
use urbanstride_storefront::state::{AppState, Backends};

/// CSRF token seeded into every test session.
pub const CSRF: &str = "test-csrf-token";

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<Vec<Product>>,
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.clone())
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn insert(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let next = products.iter().map(|p| p.id.as_i32()).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let stored = Product {
            id: ProductId::new(next),
            title: product.draft.title.clone(),
            price: product.draft.price,
            description: product.draft.description.clone(),
            image_url: product.image_url.clone(),
            owner_id: product.owner_id,
            provider_product_id: None,
            created_at: now,
            updated_at: now,
        };
        products.push(stored.clone());
        Ok(stored)
    }

    async fn update_owned(
        &self,
        owner: UserId,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        let Some(product) = products
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner)
        else {
            return Ok(None);
        };
        product.title.clone_from(&update.draft.title);
        product.price = update.draft.price;
        product.description.clone_from(&update.draft.description);
        product.image_url.clone_from(&update.image_url);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_owned(&self, owner: UserId, id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| !(p.id == id && p.owner_id == owner));
        Ok(products.len() != before)
    }

    async fn set_provider_product_id(
        &self,
        id: ProductId,
        provider_product_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        let product = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        product.provider_product_id = Some(provider_product_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Users
// =============================================================================

struct ResetToken {
    user: UserId,
    expires_at: DateTime<Utc>,
    used: bool,
}

#[derive(Default)]
pub struct MemoryUsers {
    users: RwLock<Vec<UserCredentials>>,
    carts: RwLock<HashMap<UserId, Cart>>,
    reset_tokens: RwLock<HashMap<String, ResetToken>>,
}

impl MemoryUsers {
    /// Number of reset tokens ever issued.
    pub async fn reset_token_count(&self) -> usize {
        self.reset_tokens.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone()))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .find_credentials(email)
            .await?
            .map(|credentials| credentials.user))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|c| &c.user.email == email)
            .cloned())
    }

    async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.iter().any(|c| &c.user.email == email) {
            return Err(RepositoryError::Conflict("user already exists".to_string()));
        }
        let next = i32::try_from(users.len()).unwrap() + 1;
        let user = User {
            id: UserId::new(next),
            name: name.to_string(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let credentials = users
            .iter_mut()
            .find(|c| c.user.id == id)
            .ok_or(RepositoryError::NotFound)?;
        credentials.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn load_cart(&self, id: UserId) -> Result<Cart, RepositoryError> {
        Ok(self.carts.read().await.get(&id).cloned().unwrap_or_default())
    }

    async fn save_cart(&self, id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        self.carts.write().await.insert(id, cart.clone());
        Ok(())
    }

    async fn create_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.reset_tokens.write().await.insert(
            token.to_string(),
            ResetToken {
                user: id,
                expires_at,
                used: false,
            },
        );
        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        Ok(self
            .reset_tokens
            .read()
            .await
            .get(token)
            .filter(|t| !t.used && t.expires_at > Utc::now())
            .map(|t| t.user))
    }

    async fn consume_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let mut tokens = self.reset_tokens.write().await;
        let Some(entry) = tokens
            .get_mut(token)
            .filter(|t| !t.used && t.expires_at > Utc::now())
        else {
            return Ok(None);
        };
        entry.used = true;
        Ok(Some(entry.user))
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Default)]
pub struct MemoryOrders {
    orders: RwLock<Vec<Order>>,
    fail_inserts: AtomicBool,
}

impl MemoryOrders {
    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    /// Make every following insert fail like a lost database connection.
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderLedger for MemoryOrders {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption("orders table unavailable".to_string()));
        }
        let mut orders = self.orders.write().await;
        let stored = Order {
            id: OrderId::new(i32::try_from(orders.len()).unwrap() + 1),
            purchaser: order.purchaser.clone(),
            lines: order.lines.clone(),
            created_at: Utc::now(),
        };
        orders.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_purchaser(&self, purchaser: UserId) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.purchaser.id == purchaser)
            .cloned()
            .collect())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }
}

// =============================================================================
// Payment provider
// =============================================================================

#[derive(Default)]
struct ProviderState {
    products: HashMap<String, bool>,
    prices: Vec<(String, String, bool, Price)>,
    sessions: HashMap<String, (CheckoutRequest, PaymentStatus)>,
}

/// Scripted payment provider. Checkout sessions start unpaid; tests settle
/// them with [`FakePaymentProvider::mark_paid`].
#[derive(Default)]
pub struct FakePaymentProvider {
    state: RwLock<ProviderState>,
    counter: AtomicUsize,
    checkout_calls: AtomicUsize,
}

impl FakePaymentProvider {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Number of checkout sessions created so far.
    pub fn checkout_calls(&self) -> usize {
        self.checkout_calls.load(Ordering::SeqCst)
    }

    pub async fn mark_paid(&self, session_id: &str) {
        if let Some(entry) = self.state.write().await.sessions.get_mut(session_id) {
            entry.1 = PaymentStatus::Paid;
        }
    }

    /// The request behind a checkout session.
    pub async fn checkout_request(&self, session_id: &str) -> Option<CheckoutRequest> {
        self.state
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|(request, _)| request.clone())
    }

    /// Active prices of a provider product.
    pub async fn active_prices(&self, product_id: &str) -> Vec<Price> {
        self.state
            .read()
            .await
            .prices
            .iter()
            .filter(|(_, product, active, _)| product == product_id && *active)
            .map(|(_, _, _, amount)| *amount)
            .collect()
    }

    pub async fn product_active(&self, product_id: &str) -> Option<bool> {
        self.state.read().await.products.get(product_id).copied()
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_product(&self, _input: &ProviderProductInput<'_>) -> Result<String, PaymentError> {
        let id = self.next_id("prod");
        self.state.write().await.products.insert(id.clone(), true);
        Ok(id)
    }

    async fn create_price(&self, product_id: &str, amount: Price) -> Result<String, PaymentError> {
        let id = self.next_id("price");
        self.state
            .write()
            .await
            .prices
            .push((id.clone(), product_id.to_string(), true, amount));
        Ok(id)
    }

    async fn list_prices(&self, product_id: &str) -> Result<Vec<ProviderPrice>, PaymentError> {
        Ok(self
            .state
            .read()
            .await
            .prices
            .iter()
            .filter(|(_, product, active, _)| product == product_id && *active)
            .map(|(id, _, active, _)| ProviderPrice {
                id: id.clone(),
                active: *active,
                unit_amount: None,
            })
            .collect())
    }

    async fn deactivate_price(&self, price_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state.write().await;
        let price = state
            .prices
            .iter_mut()
            .find(|(id, ..)| id == price_id)
            .ok_or_else(|| PaymentError::NotFound(price_id.to_string()))?;
        price.2 = false;
        Ok(())
    }

    async fn deactivate_product(&self, product_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state.write().await;
        let active = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| PaymentError::NotFound(product_id.to_string()))?;
        *active = false;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id("cs_test");
        self.state
            .write()
            .await
            .sessions
            .insert(id.clone(), (request.clone(), PaymentStatus::Unpaid));
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/pay/{id}")),
            id,
            payment_status: PaymentStatus::Unpaid,
            client_reference_id: request.client_reference_id.clone(),
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let state = self.state.read().await;
        let (request, status) = state
            .sessions
            .get(session_id)
            .ok_or_else(|| PaymentError::NotFound(session_id.to_string()))?;
        Ok(CheckoutSession {
            id: session_id.to_string(),
            url: None,
            payment_status: *status,
            client_reference_id: request.client_reference_id.clone(),
        })
    }
}

// =============================================================================
// Application harness
// =============================================================================

pub fn test_config(image_dir: PathBuf) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/urbanstride_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_fake"),
            api_base: "http://127.0.0.1:1".to_string(),
            currency: "usd".to_string(),
        },
        email: None,
        image_dir,
        sentry_dsn: None,
        sentry_environment: None,
        json_logs: false,
    }
}

/// The application plus handles to every fake behind it.
pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub users: Arc<MemoryUsers>,
    pub orders: Arc<MemoryOrders>,
    pub payments: Arc<FakePaymentProvider>,
    pub sessions: MemoryStore,
}

impl TestApp {
    pub fn new() -> Self {
        let catalog = Arc::new(MemoryCatalog::default());
        let users = Arc::new(MemoryUsers::default());
        let orders = Arc::new(MemoryOrders::default());
        let payments = Arc::new(FakePaymentProvider::default());

        let image_dir = std::env::temp_dir().join(format!("urbanstride-test-{}", uuid::Uuid::new_v4()));
        let backends = Backends {
            catalog: catalog.clone(),
            users: users.clone(),
            orders: orders.clone(),
            payments: payments.clone(),
            email: None,
            pool: None,
        };
        let state = AppState::with_backends(test_config(image_dir), backends);

        Self {
            state,
            catalog,
            users,
            orders,
            payments,
            sessions: MemoryStore::default(),
        }
    }

    pub fn router(&self) -> Router {
        let layer = session_layer(self.sessions.clone(), self.state.config());
        urbanstride_storefront::app(self.state.clone(), layer)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn create_user(&self, name: &str, email: &str) -> CurrentUser {
        let hash = urbanstride_storefront::services::auth::hash_password("correct horse").unwrap();
        let user = self
            .users
            .create(name, &Email::parse(email).unwrap(), &hash)
            .await
            .unwrap();
        CurrentUser::from(&user)
    }

    /// A product owned by `owner`, registered with the fake provider.
    pub async fn create_product(&self, owner: UserId, title: &str, price: &str) -> Product {
        let draft = ProductDraft::parse(title, price, "A comfortable everyday shoe.").unwrap();
        let product = self
            .catalog
            .insert(&NewProduct {
                draft,
                image_url: "/product_images/missing.png".to_string(),
                owner_id: owner,
            })
            .await
            .unwrap();
        let provider_id = self
            .payments
            .create_product(&ProviderProductInput {
                name: &product.title,
                description: &product.description,
                reference: product.id.to_string(),
            })
            .await
            .unwrap();
        self.payments
            .create_price(&provider_id, product.price)
            .await
            .unwrap();
        self.catalog
            .set_provider_product_id(product.id, &provider_id)
            .await
            .unwrap();
        self.catalog.find(product.id).await.unwrap().unwrap()
    }

    /// Seed a session, optionally logged in, and return its cookie header.
    pub async fn session(&self, user: Option<&CurrentUser>) -> String {
        let mut data = HashMap::new();
        data.insert("csrf_token".to_string(), serde_json::json!(CSRF));
        data.insert("popup_acknowledged".to_string(), serde_json::json!(true));
        if let Some(user) = user {
            data.insert("current_user".to_string(), serde_json::to_value(user).unwrap());
        }
        let mut record = Record {
            id: Id::default(),
            data,
            expiry_date: OffsetDateTime::now_utc() + Duration::days(1),
        };
        self.sessions.create(&mut record).await.unwrap();
        format!("us_session={}", record.id)
    }

    /// A value stored in the session behind `cookie`.
    pub async fn session_value(&self, cookie: &str, key: &str) -> Option<serde_json::Value> {
        let id: Id = cookie.trim_start_matches("us_session=").parse().unwrap();
        let record = self.sessions.load(&id).await.unwrap()?;
        record.data.get(key).cloned()
    }
}

// =============================================================================
// Requests
// =============================================================================

pub fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Boundary used by [`post_multipart`].
const BOUNDARY: &str = "urbanstride-test-boundary";

/// A file part of a multipart form.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// A multipart form post, with the CSRF token in the query string like the
/// admin forms send it.
pub fn post_multipart(
    path: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(format!("{path}?_csrf={CSRF}"))
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// The session cookie a response set, e.g. after the id rotated on login.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

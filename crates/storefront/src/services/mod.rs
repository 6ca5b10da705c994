//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password signup/login and reset tokens (argon2)
//! - `cart` - Per-user cart mutations and the live cart view
//! - `catalog` - Product browsing and owner-scoped product CRUD
//! - `checkout` - Cart to payment session to order
//! - `email` - Transactional email (welcome, password reset)
//! - `images` - Product image files
//! - `invoice` - PDF invoices for orders
//! - `orders` - Purchaser-scoped order history
//!
//! Services borrow the stores they need from [`crate::state::AppState`] and
//! are built per request.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod images;
pub mod invoice;
pub mod orders;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use catalog::{CatalogError, CatalogService};
pub use checkout::{CheckoutError, CheckoutService, CheckoutSummary};
pub use email::{EmailError, EmailService};
pub use images::{ImageError, ImageStore, ImageUpload};
pub use invoice::{InvoiceError, render_invoice};
pub use orders::{OrderError, OrderService};

//! UrbanStride Core - Domain types for the storefront.
//!
//! This crate holds the rules of the shop that do not depend on any I/O:
//! - [`types`] - Newtype wrappers for IDs, prices and emails
//! - [`catalog`] - Products and validated product drafts
//! - [`cart`] - The per-user cart value and its populated (priced) view
//! - [`order`] - Frozen order snapshots
//! - [`checkout`] - Pending checkout state and payment status
//! - [`authz`] - The ownership predicate applied to products and orders
//!
//! # Architecture
//!
//! No database access, no HTTP clients. The `postgres` feature only adds
//! `sqlx` encode/decode impls for the newtypes so the storefront can bind
//! them directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod authz;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod types;
pub mod validation;

pub use authz::{AccessDenied, Owned, authorize, is_allowed};
pub use cart::{Cart, CartItem, CartLine, PopulatedCart};
pub use catalog::{Product, ProductDraft};
pub use checkout::{PaymentStatus, PendingCheckout};
pub use order::{NewOrder, Order, OrderLine, ProductSnapshot, Purchaser};
pub use types::*;
pub use validation::{FieldError, FieldErrors};

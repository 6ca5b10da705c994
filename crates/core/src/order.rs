//! Orders: frozen copies of what was bought.
//!
//! An order embeds product values, not references. Editing or deleting a
//! product later never changes an existing order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::authz::Owned;
use crate::cart::PopulatedCart;
use crate::catalog::Product;
use crate::types::{OrderId, Price, ProductId, UserId};

/// Product fields captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub description: String,
    pub image_url: String,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
            description: product.description.clone(),
            image_url: product.image_url.clone(),
        }
    }
}

/// One purchased product with its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub quantity: u32,
    pub product: ProductSnapshot,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price.times(self.quantity)
    }
}

/// Who placed the order, copied from the user at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchaser {
    pub id: UserId,
    pub name: String,
}

/// An order that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub purchaser: Purchaser,
    pub lines: Vec<OrderLine>,
}

impl NewOrder {
    /// Snapshot a populated cart. Returns `None` for an empty cart.
    #[must_use]
    pub fn from_cart(purchaser: Purchaser, cart: &PopulatedCart) -> Option<Self> {
        if cart.is_empty() {
            return None;
        }
        let lines = cart
            .lines
            .iter()
            .map(|line| OrderLine {
                quantity: line.quantity,
                product: ProductSnapshot::from(&line.product),
            })
            .collect();
        Some(Self { purchaser, lines })
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub purchaser: Purchaser,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Sum of line totals at the prices paid.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }
}

impl Owned for Order {
    fn owner_id(&self) -> UserId {
        self.purchaser.id
    }
}

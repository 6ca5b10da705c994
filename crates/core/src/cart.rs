//! The shopping cart.
//!
//! [`Cart`] is the stored value: product references and quantities, with at
//! most one entry per product and every quantity at least 1. [`PopulatedCart`]
//! is the live view with each entry resolved to current catalog data, so
//! displayed totals always use today's prices.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::ProductId;

/// One cart entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from stored rows.
    ///
    /// Duplicate product entries are merged by summing their quantities and
    /// zero-quantity entries are dropped, so the result always upholds the
    /// one-entry-per-product rule. First-seen order is kept.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match cart.entry_mut(item.product_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => cart.items.push(item),
            }
        }
        cart
    }

    /// Add one unit of `product_id`, returning the new quantity.
    pub fn add(&mut self, product_id: ProductId) -> u32 {
        if let Some(existing) = self.entry_mut(product_id) {
            existing.quantity = existing.quantity.saturating_add(1);
            return existing.quantity;
        }
        self.items.push(CartItem {
            product_id,
            quantity: 1,
        });
        1
    }

    /// Drop the entry for `product_id`. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Quantity of `product_id`, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Product ids in cart order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.items.iter().map(|item| item.product_id)
    }

    fn entry_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

/// A cart entry resolved to current catalog data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Current unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price.times(self.quantity)
    }
}

/// A cart with every entry resolved to its product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulatedCart {
    pub lines: Vec<CartLine>,
}

impl PopulatedCart {
    /// Join a cart with the products it references.
    ///
    /// Entries whose product is no longer in `products` (deleted from the
    /// catalog) are left out of the view.
    #[must_use]
    pub fn populate(cart: &Cart, products: Vec<Product>) -> Self {
        let mut by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();
        let lines = cart
            .items()
            .iter()
            .filter_map(|item| {
                by_id.remove(&item.product_id).map(|product| CartLine {
                    product,
                    quantity: item.quantity,
                })
            })
            .collect();
        Self { lines }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line totals at current prices.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use chrono::Utc;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::types::{Price, UserId, format_usd};

    pub(crate) fn product(id: i32, price: &str) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            price: Price::parse(price).unwrap(),
            description: "A fine pair of shoes".to_owned(),
            image_url: format!("/product_images/{id}.png"),
            owner_id: UserId::new(1),
            provider_product_id: Some(format!("prod_{id}")),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_add_inserts_then_increments() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(ProductId::new(1)), 1);
        assert_eq!(cart.add(ProductId::new(1)), 2);
        assert_eq!(cart.add(ProductId::new(2)), 1);
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1));
        let before = cart.clone();

        assert!(!cart.remove(ProductId::new(99)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_clear_empties_cart() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1));
        cart.add(ProductId::new(2));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_random_add_remove_sequences_keep_one_entry_per_product() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..200 {
            let mut cart = Cart::new();
            let mut expected: HashMap<ProductId, u32> = HashMap::new();

            for _ in 0..50 {
                let id = ProductId::new(rng.random_range(0..5));
                if rng.random_ratio(1, 3) {
                    cart.remove(id);
                    expected.remove(&id);
                } else {
                    cart.add(id);
                    *expected.entry(id).or_insert(0) += 1;
                }
            }

            let mut seen = std::collections::HashSet::new();
            for item in cart.items() {
                assert!(seen.insert(item.product_id), "duplicate entry");
                assert!(item.quantity >= 1);
                assert_eq!(Some(&item.quantity), expected.get(&item.product_id));
            }
            assert_eq!(cart.len(), expected.len());
        }
    }

    #[test]
    fn test_from_items_merges_duplicates_and_drops_zero() {
        let cart = Cart::from_items([
            CartItem {
                product_id: ProductId::new(1),
                quantity: 2,
            },
            CartItem {
                product_id: ProductId::new(2),
                quantity: 0,
            },
            CartItem {
                product_id: ProductId::new(1),
                quantity: 3,
            },
        ]);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(ProductId::new(1)), 5);
    }

    #[test]
    fn test_deserialize_enforces_invariants() {
        let json = r#"[{"product_id":4,"quantity":1},{"product_id":4,"quantity":1}]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(ProductId::new(4)), 2);
    }

    #[test]
    fn test_populate_uses_current_prices_and_skips_missing_products() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1));
        cart.add(ProductId::new(1));
        cart.add(ProductId::new(2));

        let populated = PopulatedCart::populate(&cart, vec![product(1, "10")]);

        assert_eq!(populated.lines.len(), 1);
        assert_eq!(populated.lines[0].quantity, 2);
        assert_eq!(format_usd(populated.total()), "$20.00");
        assert_eq!(populated.item_count(), 2);
    }
}

//! Cart operations.
//!
//! The cart rules live on [`urbanstride_core::Cart`]; this service loads the
//! user's stored cart, applies one rule and writes it back. Reads resolve each
//! entry to the current catalog row, so displayed totals use live prices.

use thiserror::Error;

use urbanstride_core::{Cart, PopulatedCart, ProductId, UserId};

use crate::db::{CatalogStore, RepositoryError, UserStore};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service over the user and catalog stores.
pub struct CartService<'a> {
    users: &'a dyn UserStore,
    catalog: &'a dyn CatalogStore,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(users: &'a dyn UserStore, catalog: &'a dyn CatalogStore) -> Self {
        Self { users, catalog }
    }

    /// Add one unit of a product, returning the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product no longer exists.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, user: UserId, product: ProductId) -> Result<u32, CartError> {
        if self.catalog.find(product).await?.is_none() {
            return Err(CartError::ProductNotFound(product));
        }

        let mut cart = self.users.load_cart(user).await?;
        let quantity = cart.add(product);
        self.users.save_cart(user, &cart).await?;

        tracing::debug!(quantity, "Added product to cart");
        Ok(quantity)
    }

    /// Remove a product's entry. Removing an absent product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be loaded or saved.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<(), CartError> {
        let mut cart = self.users.load_cart(user).await?;
        if cart.remove(product) {
            self.users.save_cart(user, &cart).await?;
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be saved.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user: UserId) -> Result<(), CartError> {
        self.users.save_cart(user, &Cart::new()).await?;
        Ok(())
    }

    /// The cart resolved against the current catalog.
    ///
    /// Entries whose product has since been deleted are left out.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a lookup fails.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user: UserId) -> Result<PopulatedCart, CartError> {
        let cart = self.users.load_cart(user).await?;
        if cart.is_empty() {
            return Ok(PopulatedCart::default());
        }

        let ids: Vec<ProductId> = cart.product_ids().collect();
        let products = self.catalog.find_many(&ids).await?;
        Ok(PopulatedCart::populate(&cart, products))
    }
}

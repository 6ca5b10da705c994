//! Catalog management: browsing plus owner-scoped product CRUD.
//!
//! Every product is mirrored at the payment provider as a provider product
//! with one active price. Checkout looks the price up there, so a product
//! whose registration failed stays visible but cannot be bought until an
//! edit registers it.

use thiserror::Error;

use urbanstride_core::{Price, Product, ProductDraft, ProductId, UserId, authorize};

use crate::db::{CatalogStore, NewProduct, ProductUpdate, RepositoryError};
use crate::payment::{PaymentError, PaymentProvider, ProviderProductInput};
use crate::services::images::{ImageError, ImageStore, ImageUpload};
use crate::state::AppState;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    /// The actor does not own the product.
    #[error("product {0} belongs to another user")]
    Forbidden(ProductId),

    #[error("image error: {0}")]
    Image(#[from] ImageError),

    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog service.
pub struct CatalogService<'a> {
    catalog: &'a dyn CatalogStore,
    payments: &'a dyn PaymentProvider,
    images: &'a ImageStore,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            catalog: state.catalog(),
            payments: state.payments(),
            images: state.images(),
        }
    }

    /// Every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.catalog.list().await?)
    }

    /// Products created by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_owned(&self, owner: UserId) -> Result<Vec<Product>, CatalogError> {
        Ok(self.catalog.list_by_owner(owner).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.catalog
            .find(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// A product `owner` may edit.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `CatalogError::Forbidden`.
    pub async fn get_owned(&self, owner: UserId, id: ProductId) -> Result<Product, CatalogError> {
        let product = self.get(id).await?;
        authorize(owner, &product).map_err(|_| CatalogError::Forbidden(id))?;
        Ok(product)
    }

    /// Store the image, insert the product and register it with the
    /// payment provider.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Image` if the upload is rejected. A provider
    /// failure is returned as `CatalogError::Payment` after the product row
    /// has been written.
    #[tracing::instrument(skip(self, draft, image), fields(title = %draft.title))]
    pub async fn create(
        &self,
        owner: UserId,
        draft: ProductDraft,
        image: &ImageUpload,
    ) -> Result<Product, CatalogError> {
        let image_url = self.images.save(image).await?;

        let new_product = NewProduct {
            draft,
            image_url: image_url.clone(),
            owner_id: owner,
        };
        let mut product = match self.catalog.insert(&new_product).await {
            Ok(product) => product,
            Err(e) => {
                self.images.spawn_delete(image_url);
                return Err(e.into());
            }
        };
        tracing::info!(product_id = %product.id, "Product created");

        let provider_id = self.register(&product).await?;
        product.provider_product_id = Some(provider_id);
        Ok(product)
    }

    /// Apply an edit by the owner.
    ///
    /// A new image replaces the old one, whose file is deleted in the
    /// background. A changed price is registered as a new provider price and
    /// the old prices are deactivated.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `CatalogError::Forbidden` before
    /// anything is written.
    #[tracing::instrument(skip(self, draft, image))]
    pub async fn edit(
        &self,
        owner: UserId,
        id: ProductId,
        draft: ProductDraft,
        image: Option<&ImageUpload>,
    ) -> Result<Product, CatalogError> {
        let existing = self.get_owned(owner, id).await?;

        let new_image_url = match image {
            Some(upload) => Some(self.images.save(upload).await?),
            None => None,
        };
        let update = ProductUpdate {
            draft,
            image_url: new_image_url
                .clone()
                .unwrap_or_else(|| existing.image_url.clone()),
        };

        let Some(mut product) = self.catalog.update_owned(owner, id, &update).await? else {
            if let Some(url) = new_image_url {
                self.images.spawn_delete(url);
            }
            return Err(CatalogError::NotFound(id));
        };
        if new_image_url.is_some() {
            self.images.spawn_delete(existing.image_url.clone());
        }
        tracing::info!(product_id = %id, "Product updated");

        match existing.provider_product_id.as_deref() {
            None => {
                let provider_id = self.register(&product).await?;
                product.provider_product_id = Some(provider_id);
            }
            Some(provider_id) if existing.price != product.price => {
                self.replace_price(provider_id, product.price).await?;
            }
            Some(_) => {}
        }

        Ok(product)
    }

    /// Delete an owned product, retire it at the provider and remove its
    /// image.
    ///
    /// The row is deleted first; provider and file cleanup failures are
    /// logged and do not fail the request.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` or `CatalogError::Forbidden`; in both
    /// cases the product is untouched.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner: UserId, id: ProductId) -> Result<(), CatalogError> {
        let existing = self.get_owned(owner, id).await?;

        if !self.catalog.delete_owned(owner, id).await? {
            return Err(CatalogError::NotFound(id));
        }
        tracing::info!(product_id = %id, "Product deleted");

        if let Some(provider_id) = existing.provider_product_id.as_deref()
            && let Err(e) = self.retire(provider_id).await
        {
            tracing::error!(
                error = %e,
                product_id = %id,
                provider_product_id = %provider_id,
                "Failed to retire product at payment provider"
            );
        }

        self.images.spawn_delete(existing.image_url);
        Ok(())
    }

    /// Create the provider product and price, and record the provider id.
    async fn register(&self, product: &Product) -> Result<String, CatalogError> {
        let input = ProviderProductInput {
            name: &product.title,
            description: &product.description,
            reference: product.id.to_string(),
        };
        let provider_id = self.payments.create_product(&input).await?;
        self.payments.create_price(&provider_id, product.price).await?;
        self.catalog
            .set_provider_product_id(product.id, &provider_id)
            .await?;

        tracing::info!(
            product_id = %product.id,
            provider_product_id = %provider_id,
            "Registered product with payment provider"
        );
        Ok(provider_id)
    }

    /// Register a new price and deactivate every other active price.
    async fn replace_price(&self, provider_id: &str, price: Price) -> Result<(), CatalogError> {
        let new_price_id = self.payments.create_price(provider_id, price).await?;
        for old in self.payments.list_prices(provider_id).await? {
            if old.id != new_price_id {
                self.payments.deactivate_price(&old.id).await?;
            }
        }
        Ok(())
    }

    async fn retire(&self, provider_id: &str) -> Result<(), PaymentError> {
        for price in self.payments.list_prices(provider_id).await? {
            self.payments.deactivate_price(&price.id).await?;
        }
        self.payments.deactivate_product(provider_id).await
    }
}

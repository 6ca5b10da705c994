//! Catalog products.
//!
//! A [`Product`] is what the catalog store holds. A [`ProductDraft`] is the
//! validated admin input used to create or edit one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authz::Owned;
use crate::types::{Price, ProductId, UserId};
use crate::validation::FieldErrors;

/// Title length bounds, in characters.
pub const TITLE_LEN: (usize, usize) = (3, 100);

/// Description length bounds, in characters.
pub const DESCRIPTION_LEN: (usize, usize) = (5, 400);

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub description: String,
    /// Public path of the product image, e.g. `/product_images/…`.
    pub image_url: String,
    /// The admin who created the product.
    pub owner_id: UserId,
    /// Product id at the payment provider, once registered.
    pub provider_product_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Product {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

/// Validated product fields entered by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub title: String,
    pub price: Price,
    pub description: String,
}

impl ProductDraft {
    /// Validate raw form input.
    ///
    /// Text fields are trimmed. Every failing field gets its own message so the
    /// form can be re-rendered with all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`FieldErrors`] keyed by `title`, `price` and `description`.
    pub fn parse(title: &str, price: &str, description: &str) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = title.trim();
        let title_len = title.chars().count();
        if title_len < TITLE_LEN.0 || title_len > TITLE_LEN.1 {
            errors.add(
                "title",
                format!(
                    "Title must be between {} and {} characters.",
                    TITLE_LEN.0, TITLE_LEN.1
                ),
            );
        }

        let price = match Price::parse(price) {
            Ok(price) => Some(price),
            Err(e) => {
                errors.add("price", capitalize(&e.to_string()));
                None
            }
        };

        let description = description.trim();
        let description_len = description.chars().count();
        if description_len < DESCRIPTION_LEN.0 || description_len > DESCRIPTION_LEN.1 {
            errors.add(
                "description",
                format!(
                    "Description must be between {} and {} characters.",
                    DESCRIPTION_LEN.0, DESCRIPTION_LEN.1
                ),
            );
        }

        match price {
            Some(price) if errors.is_empty() => Ok(Self {
                title: title.to_owned(),
                price,
                description: description.to_owned(),
            }),
            _ => Err(errors),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        format!("{}{}.", first.to_uppercase(), chars.as_str())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_accepts_valid_input() {
        let draft = ProductDraft::parse("  Trail Runner ", "89.5", " Light and grippy. ").unwrap();
        assert_eq!(draft.title, "Trail Runner");
        assert_eq!(draft.price.to_string(), "89.50");
        assert_eq!(draft.description, "Light and grippy.");
    }

    #[test]
    fn test_parse_reports_every_bad_field() {
        let errors = ProductDraft::parse("ab", "free", "hey").unwrap_err();
        assert!(errors.has("title"));
        assert_eq!(errors.get("price"), Some("Price must be a number."));
        assert!(errors.has("description"));
    }

    #[test]
    fn test_parse_rejects_non_positive_price_only() {
        let errors = ProductDraft::parse("Sandal", "0", "Open toe summer sandal").unwrap_err();
        assert_eq!(errors.iter().count(), 1);
        assert_eq!(errors.get("price"), Some("Price must be greater than zero."));
    }
}

//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::Decimal;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal amount as dollars, e.g. `$20.00`.
///
/// Accepts anything that displays as a decimal (`Price`, `Decimal`). Other
/// values are passed through unchanged.
///
/// Usage in templates: `{{ product.price|usd }}`
#[askama::filter_fn]
pub fn usd(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(raw
        .parse::<Decimal>()
        .map_or(raw, urbanstride_core::format_usd))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use askama::Template;

    use super::*;
    use crate::filters;

    #[derive(Template)]
    #[template(source = "{{ amount|usd }}", ext = "txt")]
    struct Amount {
        amount: Decimal,
    }

    #[test]
    fn test_usd_filter() {
        let rendered = Amount {
            amount: Decimal::new(2000, 2),
        }
        .render()
        .unwrap();
        assert_eq!(rendered, "$20.00");

        let rendered = Amount {
            amount: Decimal::new(125, 1),
        }
        .render()
        .unwrap();
        assert_eq!(rendered, "$12.50");
    }
}

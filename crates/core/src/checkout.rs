//! Checkout state kept between "create checkout" and the payment callback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The one pending payment session a browser session may hold.
///
/// Lives only in the server-side session. Losing it (expiry, logout) abandons
/// the checkout without any order being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    /// Payment provider checkout session id.
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl PendingCheckout {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Payment status reported for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Only `paid` finalizes an order.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_wire_names() {
        let status: PaymentStatus = serde_json::from_str("\"no_payment_required\"").unwrap();
        assert_eq!(status, PaymentStatus::NoPaymentRequired);
        assert!(!status.is_paid());
        assert!(PaymentStatus::Paid.is_paid());
    }
}

//! Order history.

use thiserror::Error;

use urbanstride_core::{Order, OrderId, UserId, authorize};

use crate::db::{OrderLedger, RepositoryError};

/// Errors from order lookups.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The actor is not the purchaser.
    #[error("order {0} belongs to another user")]
    Forbidden(OrderId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Read access to the order ledger, scoped to the purchaser.
pub struct OrderService<'a> {
    orders: &'a dyn OrderLedger,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(orders: &'a dyn OrderLedger) -> Self {
        Self { orders }
    }

    /// Orders placed by `user`, in the order they were placed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_purchaser(user).await?)
    }

    /// One order, if `actor` placed it.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id and
    /// `OrderError::Forbidden` when `actor` is not the purchaser.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, actor: UserId, id: OrderId) -> Result<Order, OrderError> {
        let order = self.orders.find(id).await?.ok_or(OrderError::NotFound(id))?;
        authorize(actor, &order).map_err(|_| {
            tracing::warn!(order_id = %id, "Order access denied");
            OrderError::Forbidden(id)
        })?;
        Ok(order)
    }
}

//! Order repository.
//!
//! Order lines are stored as a `JSONB` array of product snapshots so an order
//! never joins back to the live `products` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use urbanstride_core::{NewOrder, Order, OrderId, OrderLine, Purchaser, UserId};

use super::{OrderLedger, RepositoryError};

/// `PostgreSQL` implementation of [`OrderLedger`].
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    purchaser_name: String,
    lines: Json<Vec<OrderLine>>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            purchaser: Purchaser {
                id: row.user_id,
                name: row.purchaser_name,
            },
            lines: row.lines.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl OrderLedger for OrderRepository {
    async fn insert(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (user_id, purchaser_name, lines)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, purchaser_name, lines, created_at
            ",
        )
        .bind(order.purchaser.id)
        .bind(&order.purchaser.name)
        .bind(Json(&order.lines))
        .fetch_one(&self.pool)
        .await?;
        Ok(Order::from(row))
    }

    async fn list_for_purchaser(&self, purchaser: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, purchaser_name, lines, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(purchaser)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, purchaser_name, lines, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }
}

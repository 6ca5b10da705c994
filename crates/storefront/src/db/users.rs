//! User repository: accounts, carts and password reset tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use urbanstride_core::{Cart, CartItem, Email, ProductId, UserId};

use super::{RepositoryError, UserStore, map_unique_violation};
use crate::models::user::{User, UserCredentials};

/// `PostgreSQL` implementation of [`UserStore`].
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: Email,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: UserId,
    name: String,
    email: Email,
    created_at: DateTime<Utc>,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i32,
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, name, email, created_at, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserCredentials {
            user: User {
                id: r.id,
                name: r.name,
                email: r.email,
                created_at: r.created_at,
            },
            password_hash: r.password_hash,
        }))
    }

    async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, created_at
            ",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;
        Ok(User::from(row))
    }

    async fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn load_cart(&self, id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let quantity = u32::try_from(row.quantity).map_err(|_| {
                    RepositoryError::DataCorruption(format!(
                        "negative cart quantity for user {id}"
                    ))
                })?;
                Ok(CartItem {
                    product_id: row.product_id,
                    quantity,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Cart::from_items(items))
    }

    async fn save_cart(&self, id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        let mut product_ids = Vec::with_capacity(cart.len());
        let mut quantities = Vec::with_capacity(cart.len());
        for item in cart.items() {
            product_ids.push(item.product_id.as_i32());
            quantities.push(i32::try_from(item.quantity).unwrap_or(i32::MAX));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if !product_ids.is_empty() {
            sqlx::query(
                r"
                INSERT INTO cart_items (user_id, product_id, quantity, position)
                SELECT $1, item.product_id, item.quantity, item.position
                FROM UNNEST($2::INT4[], $3::INT4[]) WITH ORDINALITY
                    AS item(product_id, quantity, position)
                ",
            )
            .bind(id)
            .bind(&product_ids)
            .bind(&quantities)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token)
        .bind(id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "reset token"))?;
        Ok(())
    }

    async fn find_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            r"
            SELECT user_id FROM password_reset_tokens
            WHERE token = $1 AND used_at IS NULL AND expires_at > NOW()
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    async fn consume_reset_token(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE password_reset_tokens SET used_at = NOW()
            WHERE token = $1 AND used_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }
}

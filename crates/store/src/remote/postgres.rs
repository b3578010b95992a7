//! `PostgreSQL` cart repository.
//!
//! # Tables (schema `basket`)
//!
//! - `basket.users` - Account rows keyed by the auth provider's user id
//! - `basket.cart` - `items` and `orders` as `jsonb`, unique on `user_id`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/store/migrations/` and run via:
//! ```bash
//! cargo run -p basket-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use basket_core::{CartItem, CartSnapshot, Email, Order, UserId};

use super::{Account, RemoteCartStore, RepositoryError};

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Parse a stored email, treating a value that fails validation as absent.
///
/// The account row only needs to exist; a bad email must not block loading
/// the cart.
fn decode_email(id: UserId, raw: &str) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(e) => {
            tracing::warn!(user_id = %id, error = %e, "Ignoring invalid email on account row");
            None
        }
    }
}

/// Repository for account and cart rows.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RemoteCartStore for PgCartStore {
    async fn fetch_account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        let row: Option<(UserId, Option<String>)> = sqlx::query_as(
            r"
            SELECT id, email
            FROM basket.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, email)) = row else {
            return Ok(None);
        };

        let email = email.as_deref().and_then(|raw| decode_email(id, raw));
        Ok(Some(Account { id, email }))
    }

    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO basket.users (id, email)
            VALUES ($1, $2)
            ",
        )
        .bind(account.id)
        .bind(account.email.as_ref().map(Email::as_str))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("account already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        let row: Option<(Json<serde_json::Value>, Json<serde_json::Value>)> = sqlx::query_as(
            r"
            SELECT items, orders
            FROM basket.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((Json(items), Json(orders))) = row else {
            return Ok(None);
        };

        let items: Vec<CartItem> = serde_json::from_value(items)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart items: {e}")))?;
        let orders: Vec<Order> = serde_json::from_value(orders)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart orders: {e}")))?;

        Ok(Some(CartSnapshot { items, orders }))
    }

    async fn upsert_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO basket.cart (user_id, items, orders)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET items = EXCLUDED.items,
                orders = EXCLUDED.orders,
                updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(Json(&snapshot.items))
        .bind(Json(&snapshot.orders))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_decode_email_accepts_valid() {
        let id = UserId::new(Uuid::new_v4());
        assert_eq!(
            decode_email(id, "ada@example.com"),
            Some(Email::parse("ada@example.com").unwrap())
        );
    }

    #[test]
    fn test_decode_email_ignores_invalid() {
        let id = UserId::new(Uuid::new_v4());
        assert_eq!(decode_email(id, "not-an-email"), None);
        assert_eq!(decode_email(id, ""), None);
    }
}

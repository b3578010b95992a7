//! Remote (account) persistence.
//!
//! Signed-in carts live in a row store with two tables:
//!
//! - `users(id, email)` - one row per account, created lazily on first sign-in
//! - `cart(user_id unique, items, orders)` - one row per account, overwritten
//!   wholesale on every save
//!
//! There is no optimistic locking; concurrent writers race and the last
//! upsert wins.
//!
//! # Implementations
//!
//! - [`PgCartStore`] - `PostgreSQL` via sqlx
//! - [`MemoryCartStore`] - Process-local maps, used in tests and offline runs

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use basket_core::{CartSnapshot, Email, UserId};

pub use memory::MemoryCartStore;
pub use postgres::{PgCartStore, create_pool};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., an account row inserted twice).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend is not reachable or not usable.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// An account row in `users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub email: Option<Email>,
}

/// Row-level operations the cart needs from the remote store.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Fetch the account row for `id`, if any.
    async fn fetch_account(&self, id: UserId) -> Result<Option<Account>, RepositoryError>;

    /// Insert a new account row.
    ///
    /// Returns `RepositoryError::Conflict` if a row with the same id exists.
    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError>;

    /// Fetch the cart row for `user_id`, if any.
    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError>;

    /// Insert or overwrite the cart row for `user_id`.
    async fn upsert_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
    ) -> Result<(), RepositoryError>;
}

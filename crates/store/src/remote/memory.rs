//! In-process remote store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use basket_core::{CartSnapshot, UserId};

use super::{Account, RemoteCartStore, RepositoryError};

/// A [`RemoteCartStore`] backed by in-memory maps.
///
/// Behaves like the `PostgreSQL` repository: account inserts conflict on a
/// duplicate id and cart upserts overwrite the whole row.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    accounts: RwLock<HashMap<UserId, Account>>,
    carts: RwLock<HashMap<UserId, CartSnapshot>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current account row for `id`.
    #[must_use]
    pub fn account(&self, id: UserId) -> Option<Account> {
        self.accounts.read().ok()?.get(&id).cloned()
    }

    /// Current cart row for `user_id`.
    #[must_use]
    pub fn cart(&self, user_id: UserId) -> Option<CartSnapshot> {
        self.carts.read().ok()?.get(&user_id).cloned()
    }
}

fn poisoned(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(e.to_string())
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn fetch_account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        if accounts.contains_key(&account.id) {
            return Err(RepositoryError::Conflict("account already exists".to_owned()));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        Ok(self.carts.read().map_err(poisoned)?.get(&user_id).cloned())
    }

    async fn upsert_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
    ) -> Result<(), RepositoryError> {
        self.carts
            .write()
            .map_err(poisoned)?
            .insert(user_id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_insert_account_conflicts_on_duplicate() {
        let store = MemoryCartStore::new();
        let account = Account {
            id: UserId::new(Uuid::new_v4()),
            email: None,
        };

        store.insert_account(&account).await.unwrap();
        let err = store.insert_account(&account).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.account(account.id), Some(account));
    }

    #[tokio::test]
    async fn test_upsert_cart_overwrites() {
        let store = MemoryCartStore::new();
        let user_id = UserId::new(Uuid::new_v4());

        assert!(store.fetch_cart(user_id).await.unwrap().is_none());

        store
            .upsert_cart(user_id, &CartSnapshot::default())
            .await
            .unwrap();
        assert_eq!(
            store.fetch_cart(user_id).await.unwrap(),
            Some(CartSnapshot::default())
        );
    }
}

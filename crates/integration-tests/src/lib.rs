//! Integration tests for Basket.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory and file-backed tests
//! cargo test -p basket-integration-tests
//!
//! # Include the PostgreSQL tests (needs a migrated database)
//! BASKET_DATABASE_URL=postgres://... cargo test -p basket-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Cart mutations and persistence routing
//! - `session_bootstrap` - Guest/user switching driven by auth events
//! - `guest_persistence` - Guest carts on disk across store instances
//! - `postgres_cart` - Account carts against a real database
//!
//! This library holds the test doubles and helpers those files share.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use basket_core::{CartItem, CartSnapshot, ProductId, UserId};
use basket_store::auth::{AuthError, AuthEvent, AuthProvider, SessionUser};
use basket_store::remote::{Account, RepositoryError};
use basket_store::{CartStore, MemoryCartStore, MemoryStorage, RemoteCartStore, SharedCartStore};

/// A cart line for product `id` at a whole-unit `price`.
#[must_use]
pub fn item(id: i32, price: i64) -> CartItem {
    CartItem::new(ProductId::new(id), format!("Product {id}"), Decimal::new(price, 0))
}

/// A fresh random user id.
#[must_use]
pub fn new_user() -> UserId {
    UserId::new(uuid::Uuid::new_v4())
}

/// A guest-mode store over in-memory backends, returning the backends too.
#[must_use]
pub fn memory_store() -> (CartStore, Arc<MemoryCartStore>, Arc<MemoryStorage>) {
    let remote = Arc::new(MemoryCartStore::new());
    let local = Arc::new(MemoryStorage::new());
    let store = CartStore::new(remote.clone(), local.clone());
    (store, remote, local)
}

/// Poll `store` until `check` holds, failing after about two seconds.
///
/// Session changes are applied on a background task, so tests wait for the
/// store to reach the expected state instead of asserting right away.
///
/// # Panics
///
/// Panics if the condition does not hold in time.
pub async fn wait_for(store: &SharedCartStore, check: impl Fn(&CartStore) -> bool) {
    for _ in 0..200 {
        if check(&*store.lock().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cart store did not reach the expected state");
}

/// A [`RemoteCartStore`] over [`MemoryCartStore`] whose calls can be made to
/// fail on demand.
#[derive(Debug, Default)]
pub struct FlakyRemote {
    inner: MemoryCartStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    upserts: AtomicUsize,
}

impl FlakyRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make account and cart reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make account inserts and cart upserts fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful cart upserts so far.
    #[must_use]
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// The stored cart row for `user_id`.
    #[must_use]
    pub fn cart(&self, user_id: UserId) -> Option<CartSnapshot> {
        self.inner.cart(user_id)
    }

    /// The stored account row for `id`.
    #[must_use]
    pub fn account(&self, id: UserId) -> Option<Account> {
        self.inner.account(id)
    }

    fn check(flag: &AtomicBool) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartStore for FlakyRemote {
    async fn fetch_account(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        Self::check(&self.fail_reads)?;
        self.inner.fetch_account(id).await
    }

    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        Self::check(&self.fail_writes)?;
        self.inner.insert_account(account).await
    }

    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        Self::check(&self.fail_reads)?;
        self.inner.fetch_cart(user_id).await
    }

    async fn upsert_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
    ) -> Result<(), RepositoryError> {
        Self::check(&self.fail_writes)?;
        self.inner.upsert_cart(user_id, snapshot).await?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`RemoteCartStore`] that never sees an existing account on read, as if
/// another client created it between the read and the insert.
#[derive(Debug, Default)]
pub struct RacingRemote {
    inner: MemoryCartStore,
}

impl RacingRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the account row directly, as the other client would.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory insert fails.
    pub async fn create_account_elsewhere(&self, id: UserId) {
        self.inner
            .insert_account(&Account { id, email: None })
            .await
            .expect("insert account");
    }

    #[must_use]
    pub fn account(&self, id: UserId) -> Option<Account> {
        self.inner.account(id)
    }

    #[must_use]
    pub fn cart(&self, user_id: UserId) -> Option<CartSnapshot> {
        self.inner.cart(user_id)
    }
}

#[async_trait]
impl RemoteCartStore for RacingRemote {
    async fn fetch_account(&self, _id: UserId) -> Result<Option<Account>, RepositoryError> {
        Ok(None)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), RepositoryError> {
        self.inner.insert_account(account).await
    }

    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        self.inner.fetch_cart(user_id).await
    }

    async fn upsert_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
    ) -> Result<(), RepositoryError> {
        self.inner.upsert_cart(user_id, snapshot).await
    }
}

/// An [`AuthProvider`] whose session and events are set independently.
///
/// Changing the session does not emit an event, so tests can tell whether
/// the bootstrap re-read the session.
#[derive(Debug)]
pub struct ScriptedAuth {
    session: Mutex<Option<SessionUser>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for ScriptedAuth {
    fn default() -> Self {
        let (events, _) = broadcast::channel(4);
        Self {
            session: Mutex::new(None),
            events,
        }
    }
}

impl ScriptedAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session returned by `current_session`.
    ///
    /// # Panics
    ///
    /// Panics if the session lock is poisoned.
    pub fn set_session(&self, session: Option<SessionUser>) {
        *self.session.lock().expect("session lock") = session;
    }

    /// Emit an event to subscribers.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuth {
    async fn current_session(&self) -> Result<Option<SessionUser>, AuthError> {
        self.session
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| AuthError::Unavailable(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// An [`AuthProvider`] whose session query always fails.
#[derive(Debug)]
pub struct BrokenAuth {
    events: broadcast::Sender<AuthEvent>,
}

impl Default for BrokenAuth {
    fn default() -> Self {
        let (events, _) = broadcast::channel(4);
        Self { events }
    }
}

impl BrokenAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event to subscribers.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthProvider for BrokenAuth {
    async fn current_session(&self) -> Result<Option<SessionUser>, AuthError> {
        Err(AuthError::Unavailable("auth service down".to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

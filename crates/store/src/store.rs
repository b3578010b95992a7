//! Cart state container.
//!
//! [`CartStore`] holds the in-memory cart and persists the full
//! `{items, orders}` snapshot after every mutation. Where it persists depends
//! on the session mode chosen by [`CartStore::init_user`]:
//!
//! - **Guest** - the snapshot is JSON-encoded into [`LocalStorage`] under a
//!   fixed key
//! - **User** - the snapshot is upserted into the remote `cart` row for the
//!   signed-in user
//!
//! Switching modes never merges: the newly loaded state replaces whatever was
//! in memory, and the other backend is left untouched.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::instrument;

use basket_core::{
    CartItem, CartLineKey, CartSnapshot, CustomerInfo, Email, Order, UserId,
    checked_total_price, item_count, total_price,
};

use crate::error::{CartError, Result, add_breadcrumb};
use crate::local::{LocalStorage, LocalStorageError};
use crate::remote::{Account, RemoteCartStore, RepositoryError};

/// Storage key for the guest cart when none is configured.
pub const DEFAULT_STORAGE_KEY: &str = "basket";

/// A cart store shared between UI actions and the session bootstrap.
///
/// Each action holds the lock for its whole duration, so actions on one cart
/// run one after another.
pub type SharedCartStore = Arc<Mutex<CartStore>>;

/// Where the cart is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Guest,
    User(UserId),
}

/// In-memory cart state.
#[derive(Debug, Clone, PartialEq)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub orders: Vec<Order>,
    /// UI flag for the cart drawer. Never persisted.
    pub is_cart_open: bool,
    pub user_id: Option<UserId>,
    pub is_guest: bool,
}

impl Default for CartState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            orders: Vec::new(),
            is_cart_open: false,
            user_id: None,
            is_guest: true,
        }
    }
}

/// Cart state plus the two persistence backends.
pub struct CartStore {
    state: CartState,
    remote: Arc<dyn RemoteCartStore>,
    local: Arc<dyn LocalStorage>,
    storage_key: String,
    /// Set while the cart for the current mode failed to load.
    load_failed: bool,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &self.state)
            .field("storage_key", &self.storage_key)
            .field("load_failed", &self.load_failed)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty guest-mode store.
    ///
    /// Nothing is loaded until [`init_user`](Self::init_user) is called.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteCartStore>, local: Arc<dyn LocalStorage>) -> Self {
        Self {
            state: CartState::default(),
            remote,
            local,
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            load_failed: false,
        }
    }

    /// Use `key` for the guest cart in local storage.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Wrap the store for sharing with the session bootstrap.
    #[must_use]
    pub fn into_shared(self) -> SharedCartStore {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Switch session mode and load that mode's cart.
    ///
    /// With a user id: ensures an account row exists, then loads the remote
    /// cart row, creating an empty one if absent. Without: loads the guest
    /// cart from local storage; a missing or unreadable blob leaves the cart
    /// empty.
    ///
    /// In-memory items and orders are replaced, never merged.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the account or cart row cannot be read
    /// or created, and `CartError::Local` if local storage cannot be read.
    /// The mode is switched and the cart left empty in both cases, and
    /// saves fail with `CartError::CartNotLoaded` until a later `init_user`
    /// succeeds.
    #[instrument(skip_all, fields(user_id = ?user_id))]
    pub async fn init_user(&mut self, user_id: Option<UserId>, email: Option<&Email>) -> Result<()> {
        self.state.items.clear();
        self.state.orders.clear();
        self.state.user_id = user_id;
        self.state.is_guest = user_id.is_none();
        self.load_failed = false;

        let result = match user_id {
            Some(id) => match self.ensure_account(id, email).await {
                Ok(()) => self.load_remote(id).await,
                Err(e) => Err(e),
            },
            None => self.load_local().await,
        };
        self.load_failed = result.is_err();
        result
    }

    /// Discard all in-memory state and return to guest mode.
    ///
    /// Nothing is persisted; the caller re-initializes with `init_user`.
    pub fn reset(&mut self) {
        self.state = CartState::default();
        self.load_failed = false;
    }

    async fn ensure_account(&self, id: UserId, email: Option<&Email>) -> Result<()> {
        if self.remote.fetch_account(id).await?.is_some() {
            return Ok(());
        }

        let account = Account {
            id,
            email: email.cloned(),
        };
        match self.remote.insert_account(&account).await {
            Ok(()) => {
                tracing::info!(user_id = %id, "Created account row");
                Ok(())
            }
            // Another client created the row between our read and insert.
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(user_id = %id, "Account row already created concurrently");
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id = %id, error = %e, "Failed to create account row");
                Err(e.into())
            }
        }
    }

    async fn load_remote(&mut self, id: UserId) -> Result<()> {
        let snapshot = match self.remote.fetch_cart(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(user_id = %id, error = %e, "Failed to load remote cart");
                return Err(e.into());
            }
        };

        if let Some(snapshot) = snapshot {
            tracing::debug!(user_id = %id, items = snapshot.items.len(), "Loaded remote cart");
            self.apply_snapshot(snapshot);
            return Ok(());
        }

        self.remote
            .upsert_cart(id, &CartSnapshot::default())
            .await
            .map_err(|e| {
                tracing::error!(user_id = %id, error = %e, "Failed to create remote cart");
                CartError::from(e)
            })
    }

    async fn load_local(&mut self) -> Result<()> {
        let raw = self
            .with_local(|local, key| local.get(key))
            .await
            .map_err(|e| {
                tracing::error!(key = %self.storage_key, error = %e, "Failed to read local cart");
                CartError::from(e)
            })?;

        let Some(raw) = raw else {
            return Ok(());
        };

        match serde_json::from_str::<CartSnapshot>(&raw) {
            Ok(snapshot) => {
                tracing::debug!(items = snapshot.items.len(), "Loaded local cart");
                self.apply_snapshot(snapshot);
            }
            Err(e) => {
                tracing::warn!(key = %self.storage_key, error = %e, "Ignoring unreadable local cart");
            }
        }
        Ok(())
    }

    /// Run a blocking local storage call off the async runtime.
    async fn with_local<T, F>(&self, op: F) -> std::result::Result<T, LocalStorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LocalStorage, &str) -> std::result::Result<T, LocalStorageError>
            + Send
            + 'static,
    {
        let local = Arc::clone(&self.local);
        let key = self.storage_key.clone();
        tokio::task::spawn_blocking(move || op(local.as_ref(), &key))
            .await
            .map_err(|e| LocalStorageError::Unavailable(e.to_string()))?
    }

    /// Replace items and orders with a loaded snapshot.
    ///
    /// Quantities below 1 are raised to 1. Lines whose amount would push the
    /// cart total out of `Decimal` range are dropped.
    fn apply_snapshot(&mut self, snapshot: CartSnapshot) {
        let loaded = snapshot.items.len();
        let mut total = Decimal::ZERO;
        self.state.items = snapshot
            .items
            .into_iter()
            .map(|mut line| {
                line.quantity = line.quantity.max(1);
                line
            })
            .filter(|line| {
                match line.checked_line_total().and_then(|amount| total.checked_add(amount)) {
                    Some(next) => {
                        total = next;
                        true
                    }
                    None => false,
                }
            })
            .collect();
        self.state.orders = snapshot.orders;

        let dropped = loaded.saturating_sub(self.state.items.len());
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped cart lines with out-of-range amounts");
        }
    }

    /// Apply `edit` to a copy of the lines, rejecting it if the cart total
    /// would overflow.
    fn edited_items(&self, edit: impl FnOnce(&mut Vec<CartItem>)) -> Result<Vec<CartItem>> {
        let mut items = self.state.items.clone();
        edit(&mut items);
        if checked_total_price(&items).is_none() {
            tracing::warn!("Rejected cart change with out-of-range total");
            return Err(CartError::AmountOverflow);
        }
        Ok(items)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `item`, merging with an existing line of the same key.
    ///
    /// A quantity of 0 on `item` counts as 1.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AmountOverflow` (without changing or saving the
    /// cart) if the cart total would leave `Decimal` range. Otherwise returns
    /// the save error; the in-memory change is kept.
    #[instrument(skip_all, fields(product_id = %item.product_id))]
    pub async fn add_item(&mut self, mut item: CartItem) -> Result<()> {
        let quantity = item.quantity.max(1);
        let key = item.key();

        self.state.items = self.edited_items(|items| {
            if let Some(existing) = items.iter_mut().find(|line| line.key() == key) {
                existing.quantity = existing.quantity.saturating_add(quantity);
            } else {
                item.quantity = quantity;
                items.push(item);
            }
        })?;

        let product_id = key.product_id.to_string();
        add_breadcrumb("cart", "Added item", Some(&[("product_id", product_id.as_str())]));
        self.save_cart().await
    }

    /// Remove the line at `index` and return it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineIndexOutOfRange` (without saving) if there is
    /// no such line, otherwise the save error.
    #[instrument(skip(self))]
    pub async fn remove_item(&mut self, index: usize) -> Result<CartItem> {
        let len = self.state.items.len();
        if index >= len {
            return Err(CartError::LineIndexOutOfRange { index, len });
        }

        let removed = self.state.items.remove(index);
        self.save_cart().await?;
        Ok(removed)
    }

    /// Remove the line with `key` and return it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` (without saving) if there is no such
    /// line, otherwise the save error.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn remove_line(&mut self, key: &CartLineKey) -> Result<CartItem> {
        let index = self.position(key)?;
        let removed = self.state.items.remove(index);
        self.save_cart().await?;
        Ok(removed)
    }

    /// Add one to the line with `key`. Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound`, `CartError::AmountOverflow`, or the
    /// save error.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn increase_quantity(&mut self, key: &CartLineKey) -> Result<u32> {
        let index = self.position(key)?;
        let quantity = self
            .state
            .items
            .get(index)
            .map_or(1, |line| line.quantity.saturating_add(1));
        self.state.items = self.edited_items(|items| apply_quantity(items, index, quantity))?;
        self.save_cart().await?;
        Ok(quantity)
    }

    /// Subtract one from the line with `key`, removing it when it would drop
    /// below 1. Returns the new quantity (0 if removed).
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` or the save error.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn decrease_quantity(&mut self, key: &CartLineKey) -> Result<u32> {
        let index = self.position(key)?;
        let current = self.state.items.get(index).map_or(0, |line| line.quantity);
        apply_quantity(&mut self.state.items, index, current.saturating_sub(1));
        self.save_cart().await?;
        Ok(current.saturating_sub(1))
    }

    /// Set the quantity of the line with `key`; 0 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound`, `CartError::AmountOverflow`, or the
    /// save error.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn set_quantity(&mut self, key: &CartLineKey, quantity: u32) -> Result<()> {
        let index = self.position(key)?;
        self.state.items = self.edited_items(|items| apply_quantity(items, index, quantity))?;
        self.save_cart().await
    }

    fn position(&self, key: &CartLineKey) -> Result<usize> {
        self.state
            .items
            .iter()
            .position(|line| line.key() == *key)
            .ok_or_else(|| CartError::LineNotFound(key.clone()))
    }

    /// Flip the cart drawer flag and return the new value. Not persisted.
    pub const fn toggle_cart(&mut self) -> bool {
        self.state.is_cart_open = !self.state.is_cart_open;
        self.state.is_cart_open
    }

    /// Set the cart drawer flag. Not persisted.
    pub const fn set_cart_open(&mut self, open: bool) {
        self.state.is_cart_open = open;
    }

    /// Remove every line. Orders are kept.
    ///
    /// # Errors
    ///
    /// Returns the save error.
    #[instrument(skip(self))]
    pub async fn clear_cart(&mut self) -> Result<()> {
        self.state.items.clear();
        self.save_cart().await
    }

    /// Turn the current lines into an order, clear the cart, and persist.
    ///
    /// The order id is the placement time in epoch milliseconds and its
    /// total is fixed at `Σ price × quantity` of the lines at this moment.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` if there are no lines and
    /// `CartError::AmountOverflow` if the total is out of `Decimal` range;
    /// the cart is unchanged in both cases. If the save fails the order
    /// stays recorded in memory and the save error is returned; `save_cart`
    /// can be retried.
    #[instrument(skip_all)]
    pub async fn place_order(&mut self, customer: CustomerInfo) -> Result<Order> {
        if self.state.items.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let order = Order::place(self.state.items.clone(), customer, Utc::now())
            .ok_or(CartError::AmountOverflow)?;
        self.state.items.clear();
        self.state.orders.push(order.clone());

        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            lines = order.items.len(),
            "Placed order"
        );
        let order_id = order.id.to_string();
        add_breadcrumb("cart", "Placed order", Some(&[("order_id", order_id.as_str())]));

        self.save_cart().await?;
        Ok(order)
    }

    /// Persist the full `{items, orders}` snapshot to the active backend.
    ///
    /// Guest mode writes local storage; user mode upserts the remote row
    /// (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotLoaded` without writing if the last
    /// `init_user` failed. Otherwise returns the backend error. Nothing is
    /// retried.
    pub async fn save_cart(&self) -> Result<()> {
        if self.load_failed {
            tracing::warn!(user_id = ?self.state.user_id, "Refusing to save a cart that failed to load");
            return Err(CartError::CartNotLoaded);
        }

        let snapshot = CartSnapshot {
            items: self.state.items.clone(),
            orders: self.state.orders.clone(),
        };

        let result = match self.mode()? {
            SessionMode::Guest => match serde_json::to_string(&snapshot) {
                Ok(raw) => self
                    .with_local(move |local, key| local.set(key, &raw))
                    .await
                    .map_err(CartError::from),
                Err(e) => Err(e.into()),
            },
            SessionMode::User(id) => self
                .remote
                .upsert_cart(id, &snapshot)
                .await
                .map_err(CartError::from),
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to save cart");
        }
        result
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        item_count(&self.state.items)
    }

    /// Sum of `price × quantity` over all lines.
    ///
    /// Mutations keep this in range, so it never saturates.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        total_price(&self.state.items)
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.state.items
    }

    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.state.orders
    }

    #[must_use]
    pub const fn is_cart_open(&self) -> bool {
        self.state.is_cart_open
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.state.user_id
    }

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.state.is_guest
    }

    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// The line with `key`, if present.
    #[must_use]
    pub fn find_line(&self, key: &CartLineKey) -> Option<&CartItem> {
        self.state.items.iter().find(|line| line.key() == *key)
    }

    /// Whether the last `init_user` failed to load the cart.
    #[must_use]
    pub const fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// The active persistence mode.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotSignedIn` if the state claims user mode
    /// without a user id.
    pub fn mode(&self) -> Result<SessionMode> {
        match (self.state.is_guest, self.state.user_id) {
            (true, _) => Ok(SessionMode::Guest),
            (false, Some(id)) => Ok(SessionMode::User(id)),
            (false, None) => Err(CartError::NotSignedIn),
        }
    }
}

fn apply_quantity(items: &mut Vec<CartItem>, index: usize, quantity: u32) {
    if quantity == 0 {
        if index < items.len() {
            items.remove(index);
        }
    } else if let Some(line) = items.get_mut(index) {
        line.quantity = quantity;
    }
}

//! Basket Store - cart state container.
//!
//! Holds a shopper's cart in memory and keeps it persisted: guest carts in
//! local storage on the device, signed-in carts in a remote row keyed by
//! user id.
//!
//! # Architecture
//!
//! - [`store::CartStore`] - cart state and mutations; saves after each change
//! - [`session::SessionBootstrap`] - picks guest or user mode from the auth
//!   provider and follows sign-in/sign-out
//! - [`local`], [`remote`], [`auth`] - collaborator traits and their
//!   implementations, injected into the store as trait objects
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use basket_core::{CartItem, ProductId};
//! use basket_store::{CartStore, MemoryCartStore, MemoryStorage};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> basket_store::error::Result<()> {
//! let mut store = CartStore::new(Arc::new(MemoryCartStore::new()), Arc::new(MemoryStorage::new()));
//! store.init_user(None, None).await?;
//! store
//!     .add_item(CartItem::new(ProductId::new(1), "Shirt", Decimal::new(10, 0)))
//!     .await?;
//! assert_eq!(store.item_count(), 1);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod session;
pub mod store;
pub mod telemetry;

pub use auth::{AuthEvent, AuthProvider, ManualAuth, SessionUser};
pub use config::BasketConfig;
pub use error::CartError;
pub use local::{FileStorage, LocalStorage, MemoryStorage};
pub use remote::{MemoryCartStore, PgCartStore, RemoteCartStore};
pub use session::SessionBootstrap;
pub use store::{CartState, CartStore, SessionMode, SharedCartStore};

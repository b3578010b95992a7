//! Basket Core - Shared cart types.
//!
//! This crate provides the data model shared by the Basket components:
//! - `store` - Cart state container and its persistence collaborators
//! - `cli` - Command-line tools for migrations and driving a cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access. Everything here serializes to the `{items, orders}`
//! blob that both guest and user carts persist.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, and prices
//! - [`cart`] - Cart lines, line identity, and derived totals
//! - [`order`] - Orders placed from a cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod types;

pub use cart::{
    CartItem, CartLineKey, CartSnapshot, SelectedVariant, checked_total_price, item_count,
    total_price,
};
pub use order::{CustomerInfo, Order};
pub use types::*;

//! Cart line items and the persisted cart snapshot.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::order::Order;
use crate::types::ProductId;

/// One variant choice on a cart line (e.g. `size = M`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedVariant {
    pub name: String,
    pub value: String,
}

impl SelectedVariant {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A product line in the cart.
///
/// Two items are the same line when their [`CartLineKey`]s match: same
/// product and the same variant choices in the same order. Fields the
/// storefront attaches that this type does not model are kept in `extra` so
/// they survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub selected_variants: Vec<SelectedVariant>,
    /// Always at least 1 for items held in a cart.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const fn default_quantity() -> u32 {
    1
}

impl CartItem {
    /// Create a line for a product with no variant choices and quantity 1.
    #[must_use]
    pub fn new(product_id: ProductId, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            product_id,
            selected_variants: Vec::new(),
            quantity: 1,
            price,
            title: title.into(),
            image: None,
            extra: Map::new(),
        }
    }

    /// Append a variant choice.
    #[must_use]
    pub fn with_variant(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.selected_variants.push(SelectedVariant::new(name, value));
        self
    }

    /// Set the quantity. Zero is treated as "unspecified" when the item is
    /// added to a cart.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    /// Identity of this line for merging and keyed mutations.
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey::new(self.product_id, &self.selected_variants)
    }

    /// `price × quantity`, saturating at the bounds of `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// `price × quantity`, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Stable identifier of a cart line: product plus serialized variant list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineKey {
    pub product_id: ProductId,
    pub variant_key: String,
}

impl CartLineKey {
    #[must_use]
    pub fn new(product_id: ProductId, variants: &[SelectedVariant]) -> Self {
        // Serializing a list of string pairs cannot fail.
        let variant_key = serde_json::to_string(variants).unwrap_or_default();
        Self {
            product_id,
            variant_key,
        }
    }
}

impl fmt::Display for CartLineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product {} {}", self.product_id, self.variant_key)
    }
}

/// The `{items, orders}` blob written to local storage and the remote row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl CartSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.orders.is_empty()
    }
}

/// Sum of quantities across `items`.
#[must_use]
pub fn item_count(items: &[CartItem]) -> u32 {
    items
        .iter()
        .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
}

/// Sum of `price × quantity` across `items`, saturating at the bounds of
/// `Decimal`.
///
/// Use [`checked_total_price`] where an exact amount is required.
#[must_use]
pub fn total_price(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .fold(Decimal::ZERO, |acc, item| acc.saturating_add(item.line_total()))
}

/// Sum of `price × quantity` across `items`, or `None` on overflow.
#[must_use]
pub fn checked_total_price(items: &[CartItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.checked_line_total()?)
    })
}

//! Orders placed from a cart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cart::{CartItem, checked_total_price};
use crate::types::OrderId;

/// Display format for [`Order::date`], e.g. `3/1/2026, 12:00:00 PM`.
pub const ORDER_DATE_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Contact and shipping details captured at checkout.
///
/// Every field is optional; whatever else the checkout form submits is kept
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A placed order.
///
/// `total` is fixed when the order is placed and is never recomputed from
/// `items`, even if prices on the snapshot are later edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<CartItem>,
    pub total: Decimal,
    #[serde(default)]
    pub customer: CustomerInfo,
    /// Human-readable placement time. Not sortable; use `placed_at`.
    pub date: String,
    /// Absent on orders written before this field existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build an order from the given lines at time `at`.
    ///
    /// Returns `None` if the total does not fit in a `Decimal`.
    #[must_use]
    pub fn place(items: Vec<CartItem>, customer: CustomerInfo, at: DateTime<Utc>) -> Option<Self> {
        let total = checked_total_price(&items)?;
        Some(Self {
            id: OrderId::from_timestamp(at),
            items,
            total,
            customer,
            date: at.format(ORDER_DATE_FORMAT).to_string(),
            placed_at: Some(at),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::ProductId;

    #[test]
    fn test_place_computes_total_and_date() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 15, 4, 5).unwrap();
        let items = vec![
            CartItem::new(ProductId::new(1), "Shirt", Decimal::new(10, 0)).with_quantity(2),
            CartItem::new(ProductId::new(2), "Hat", Decimal::new(5, 0)),
        ];

        let order = Order::place(items, CustomerInfo::default(), at).unwrap();

        assert_eq!(order.total, Decimal::new(25, 0));
        assert_eq!(order.id.get(), at.timestamp_millis());
        assert_eq!(order.date, "3/1/2026, 3:04:05 PM");
        assert_eq!(order.items.len(), 2);
    }

    #[test]
    fn test_place_rejects_overflowing_total() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 15, 4, 5).unwrap();
        let items = vec![CartItem::new(ProductId::new(1), "Gold", Decimal::MAX).with_quantity(2)];

        assert!(Order::place(items, CustomerInfo::default(), at).is_none());
    }

    #[test]
    fn test_customer_extra_fields_roundtrip() {
        let json = r#"{"name": "Ada", "zip": "94107"}"#;
        let customer: CustomerInfo = serde_json::from_str(json).unwrap();
        assert_eq!(customer.name.as_deref(), Some("Ada"));
        assert_eq!(customer.extra.get("zip"), Some(&Value::from("94107")));
    }
}

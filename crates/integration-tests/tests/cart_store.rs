//! Integration tests for cart mutations and where they are persisted.
//!
//! Everything here runs against in-memory backends or the `FlakyRemote`
//! double, so no database is needed.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;

use basket_core::{CartSnapshot, CustomerInfo, Email};
use basket_integration_tests::{FlakyRemote, RacingRemote, item, memory_store, new_user};
use basket_store::local::LocalStorage;
use basket_store::store::DEFAULT_STORAGE_KEY;
use basket_store::{CartError, CartStore, MemoryStorage};

// ============================================================================
// Line Arithmetic
// ============================================================================

#[tokio::test]
async fn test_same_product_and_variants_merge() {
    let (mut store, _, _) = memory_store();
    store.init_user(None, None).await.expect("init guest");

    store
        .add_item(item(1, 10).with_quantity(2))
        .await
        .expect("first add");
    store
        .add_item(item(1, 10).with_quantity(3))
        .await
        .expect("second add");

    assert_eq!(store.items().len(), 1);
    assert_eq!(store.items()[0].quantity, 5);
    assert_eq!(store.item_count(), 5);
    assert_eq!(store.total_price(), Decimal::new(50, 0));
}

#[tokio::test]
async fn test_variant_order_distinguishes_lines() {
    let (mut store, _, _) = memory_store();

    store
        .add_item(item(1, 10).with_variant("size", "M").with_variant("color", "red"))
        .await
        .expect("add");
    store
        .add_item(item(1, 10).with_variant("color", "red").with_variant("size", "M"))
        .await
        .expect("add");

    assert_eq!(store.items().len(), 2);
}

#[tokio::test]
async fn test_quantity_walk_down_removes_line() {
    let (mut store, _, local) = memory_store();
    let line = item(3, 4).with_quantity(2);
    let key = line.key();
    store.add_item(line).await.expect("add");

    assert_eq!(store.decrease_quantity(&key).await.expect("dec"), 1);
    assert_eq!(store.decrease_quantity(&key).await.expect("dec"), 0);
    assert!(store.find_line(&key).is_none());

    let saved: CartSnapshot =
        serde_json::from_str(&local.get(DEFAULT_STORAGE_KEY).expect("read").expect("saved"))
            .expect("decode");
    assert!(saved.items.is_empty());
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_place_order_records_total_and_clears_cart() {
    let (mut store, _, local) = memory_store();
    store.add_item(item(1, 10).with_quantity(2)).await.expect("add");
    store.add_item(item(2, 15)).await.expect("add");

    let customer = CustomerInfo {
        name: Some("Ada".to_string()),
        ..CustomerInfo::default()
    };
    let order = store.place_order(customer).await.expect("place order");

    assert_eq!(order.total, Decimal::new(35, 0));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.customer.name.as_deref(), Some("Ada"));
    assert!(order.id.get() > 0);
    assert!(order.placed_at.is_some());
    assert!(store.items().is_empty());

    let saved: CartSnapshot =
        serde_json::from_str(&local.get(DEFAULT_STORAGE_KEY).expect("read").expect("saved"))
            .expect("decode");
    assert!(saved.items.is_empty());
    assert_eq!(saved.orders, vec![order]);
}

#[tokio::test]
async fn test_orders_accumulate_in_placement_order() {
    let (mut store, _, _) = memory_store();

    store.add_item(item(1, 10)).await.expect("add");
    let first = store.place_order(CustomerInfo::default()).await.expect("first");
    store.add_item(item(2, 20)).await.expect("add");
    let second = store.place_order(CustomerInfo::default()).await.expect("second");

    assert_eq!(store.orders(), [first, second].as_slice());
}

#[tokio::test]
async fn test_saved_blob_uses_wire_field_names() {
    let (mut store, _, local) = memory_store();
    store
        .add_item(item(7, 3).with_variant("size", "L"))
        .await
        .expect("add");
    store.place_order(CustomerInfo::default()).await.expect("order");

    let raw = local.get(DEFAULT_STORAGE_KEY).expect("read").expect("saved");
    let blob: Value = serde_json::from_str(&raw).expect("json");

    let order = &blob["orders"][0];
    assert!(order["id"].is_number());
    assert!(order["date"].is_string());
    let line = &order["items"][0];
    assert_eq!(line["productId"], 7);
    assert_eq!(line["selectedVariants"][0]["name"], "size");
    assert_eq!(line["quantity"], 1);
}

// ============================================================================
// Persistence Routing
// ============================================================================

#[tokio::test]
async fn test_user_saves_do_not_touch_local_storage() {
    let (mut store, remote, local) = memory_store();
    let user = new_user();
    store.init_user(Some(user), None).await.expect("init user");

    store.add_item(item(1, 10)).await.expect("add");

    assert!(local.get(DEFAULT_STORAGE_KEY).expect("read").is_none());
    let row = remote.cart(user).expect("cart row");
    assert_eq!(row.items, store.items());
}

#[tokio::test]
async fn test_sign_in_replaces_guest_cart_without_merging() {
    let (mut store, remote, local) = memory_store();
    store.add_item(item(1, 10)).await.expect("guest add");
    let guest_blob = local.get(DEFAULT_STORAGE_KEY).expect("read");

    let user = new_user();
    let email = Email::parse("shopper@example.com").expect("email");
    store
        .init_user(Some(user), Some(&email))
        .await
        .expect("sign in");

    assert!(store.items().is_empty());
    assert_eq!(remote.cart(user), Some(CartSnapshot::default()));
    assert_eq!(remote.account(user).expect("account").email, Some(email));
    // The guest blob is left exactly as it was.
    assert_eq!(local.get(DEFAULT_STORAGE_KEY).expect("read"), guest_blob);

    store.add_item(item(2, 5)).await.expect("user add");
    store.reset();
    store.init_user(None, None).await.expect("sign out");

    assert!(store.is_guest());
    assert_eq!(store.items().len(), 1);
    assert_eq!(store.items()[0].product_id, item(1, 10).product_id);
}

#[tokio::test]
async fn test_user_cart_reloads_from_remote() {
    let remote = Arc::new(FlakyRemote::new());
    let user = new_user();

    let mut first = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    first.init_user(Some(user), None).await.expect("init");
    first.add_item(item(1, 10).with_quantity(4)).await.expect("add");

    let mut second = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    second.init_user(Some(user), None).await.expect("init");

    assert_eq!(second.items(), first.items());
    assert_eq!(second.item_count(), 4);
}

#[tokio::test]
async fn test_concurrent_writers_last_save_wins() {
    let remote = Arc::new(FlakyRemote::new());
    let user = new_user();

    let mut phone = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    let mut laptop = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    phone.init_user(Some(user), None).await.expect("init");
    laptop.init_user(Some(user), None).await.expect("init");

    phone.add_item(item(1, 10)).await.expect("phone add");
    laptop.add_item(item(2, 20)).await.expect("laptop add");

    let row = remote.cart(user).expect("row");
    assert_eq!(row.items, laptop.items());
}

#[tokio::test]
async fn test_account_created_concurrently_is_not_an_error() {
    let remote = Arc::new(RacingRemote::new());
    let user = new_user();
    remote.create_account_elsewhere(user).await;

    let mut store = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    let email = Email::parse("racer@example.com").expect("email");
    store
        .init_user(Some(user), Some(&email))
        .await
        .expect("insert conflict is tolerated");

    assert!(!store.is_guest());
    assert_eq!(store.user_id(), Some(user));
    assert!(!store.load_failed());
    // The row written by the other client is kept as is.
    assert_eq!(remote.account(user).expect("account").email, None);
    assert_eq!(remote.cart(user), Some(CartSnapshot::default()));

    store.add_item(item(1, 10)).await.expect("add");
    assert_eq!(remote.cart(user).expect("row").items, store.items());
}

// ============================================================================
// Backend Failures
// ============================================================================

#[tokio::test]
async fn test_failed_save_keeps_in_memory_change() {
    let remote = Arc::new(FlakyRemote::new());
    let user = new_user();
    let mut store = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    store.init_user(Some(user), None).await.expect("init");
    let saves_before = remote.upserts();

    remote.fail_writes(true);
    let err = store.add_item(item(1, 10)).await.expect_err("save should fail");

    assert!(matches!(err, CartError::Remote(_)));
    assert!(err.is_backend());
    assert_eq!(store.item_count(), 1);
    assert_eq!(remote.upserts(), saves_before);
    assert_eq!(remote.cart(user), Some(CartSnapshot::default()));

    // A later save carries the change once the backend recovers.
    remote.fail_writes(false);
    store.save_cart().await.expect("retry save");
    assert_eq!(remote.cart(user).expect("row").items, store.items());
}

#[tokio::test]
async fn test_failed_remote_load_leaves_empty_user_cart() {
    let remote = Arc::new(FlakyRemote::new());
    let user = new_user();
    let mut store = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    store.add_item(item(1, 10)).await.expect("guest add");

    remote.fail_reads(true);
    let err = store
        .init_user(Some(user), None)
        .await
        .expect_err("load should fail");

    assert!(matches!(err, CartError::Remote(_)));
    assert!(!store.is_guest());
    assert_eq!(store.user_id(), Some(user));
    assert!(store.items().is_empty());
    assert!(store.load_failed());
}

#[tokio::test]
async fn test_save_after_failed_load_keeps_remote_row() {
    let remote = Arc::new(FlakyRemote::new());
    let user = new_user();

    let mut phone = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    phone.init_user(Some(user), None).await.expect("init");
    phone.add_item(item(1, 10).with_quantity(2)).await.expect("add");
    let stored = remote.cart(user).expect("row");

    let mut laptop = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    remote.fail_reads(true);
    laptop
        .init_user(Some(user), None)
        .await
        .expect_err("load should fail");
    remote.fail_reads(false);
    let saves_before = remote.upserts();

    let err = laptop.add_item(item(2, 5)).await.expect_err("save refused");
    assert!(matches!(err, CartError::CartNotLoaded));
    assert!(!err.is_backend());
    assert!(matches!(
        laptop.save_cart().await,
        Err(CartError::CartNotLoaded)
    ));
    assert_eq!(remote.upserts(), saves_before);
    assert_eq!(remote.cart(user), Some(stored.clone()));

    // A successful reload lifts the block and shows the stored cart.
    laptop.init_user(Some(user), None).await.expect("reload");
    assert!(!laptop.load_failed());
    assert_eq!(laptop.items(), stored.items.as_slice());
    laptop.add_item(item(2, 5)).await.expect("add after reload");
    assert_eq!(remote.cart(user).expect("row").items.len(), 2);
}

#[tokio::test]
async fn test_reset_clears_failed_load() {
    let remote = Arc::new(FlakyRemote::new());
    let mut store = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    remote.fail_reads(true);
    store
        .init_user(Some(new_user()), None)
        .await
        .expect_err("load should fail");

    store.reset();
    store.init_user(None, None).await.expect("guest");

    assert!(!store.load_failed());
    store.add_item(item(1, 10)).await.expect("guest add");
}

#[tokio::test]
async fn test_out_of_range_remove_does_not_save() {
    let remote = Arc::new(FlakyRemote::new());
    let mut store = CartStore::new(remote.clone(), Arc::new(MemoryStorage::new()));
    store.init_user(Some(new_user()), None).await.expect("init");
    store.add_item(item(1, 10)).await.expect("add");
    let saves_before = remote.upserts();

    let err = store.remove_item(3).await.expect_err("no such line");

    assert!(matches!(err, CartError::LineIndexOutOfRange { index: 3, len: 1 }));
    assert!(!err.is_backend());
    assert_eq!(remote.upserts(), saves_before);
}

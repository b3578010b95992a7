//! Cart commands.
//!
//! Builds a cart store the same way an application would: guest carts are
//! files under `BASKET_DATA_DIR`, account carts live in `PostgreSQL`. The
//! session bootstrap picks the mode from `--user`, then the requested action
//! runs against the loaded cart.
//!
//! Without a database URL, account carts are kept in memory and vanish when
//! the command exits.

use std::fmt::Write as _;
use std::sync::Arc;

use basket_core::{CartItem, CurrencyCode, CustomerInfo, Email, Price, ProductId, UserId};
use basket_store::error::CartError;
use basket_store::remote::create_pool;
use basket_store::{
    BasketConfig, CartStore, FileStorage, ManualAuth, MemoryCartStore, PgCartStore,
    RemoteCartStore, SessionBootstrap, SessionUser,
};

use crate::{CartAction, CustomerArgs};

/// Run a cart action for the guest or the given user.
///
/// # Errors
///
/// Returns an error if the database cannot be reached, the cart cannot be
/// loaded, or the action fails.
pub async fn run(
    config: &BasketConfig,
    user: Option<UserId>,
    email: Option<Email>,
    action: CartAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let remote: Arc<dyn RemoteCartStore> = match &config.database_url {
        Some(url) => Arc::new(PgCartStore::new(
            create_pool(url, config.db_max_connections).await?,
        )),
        None => {
            if user.is_some() {
                tracing::warn!("BASKET_DATABASE_URL not set, account cart will not be kept");
            }
            Arc::new(MemoryCartStore::new())
        }
    };
    let local = Arc::new(FileStorage::new(config.data_dir.clone()));

    let store = CartStore::new(remote, local)
        .with_storage_key(config.storage_key.clone())
        .into_shared();
    let auth = Arc::new(ManualAuth::new(user.map(|id| SessionUser { id, email })));

    let session = SessionBootstrap::new(auth, store.clone()).start().await?;

    let result = {
        let mut store = store.lock().await;
        apply(&mut store, action).await
    };

    session.abort();
    result
}

async fn apply(
    store: &mut CartStore,
    action: CartAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CartAction::Show => emit(&render_cart(store)),
        CartAction::Add {
            line,
            title,
            price,
            quantity,
        } => {
            let mut item =
                CartItem::new(ProductId::new(line.product), title, price).with_quantity(quantity);
            item.selected_variants = line.variants;
            store.add_item(item).await?;
            emit(&render_cart(store));
        }
        CartAction::Remove { index } => {
            let removed = store.remove_item(index).await?;
            emit(&format!("Removed {}", removed.title));
        }
        CartAction::Inc { line } => {
            let quantity = store.increase_quantity(&line.key()).await?;
            emit(&format!("Quantity now {quantity}"));
        }
        CartAction::Dec { line } => {
            let quantity = store.decrease_quantity(&line.key()).await?;
            if quantity == 0 {
                emit("Removed line");
            } else {
                emit(&format!("Quantity now {quantity}"));
            }
        }
        CartAction::Set { line, quantity } => {
            store.set_quantity(&line.key(), quantity).await?;
            emit(&render_cart(store));
        }
        CartAction::Clear => {
            store.clear_cart().await?;
            emit("Cart cleared");
        }
        CartAction::Checkout { customer } => match store.place_order(customer.into()).await {
            Ok(order) => emit(&format!(
                "Placed order {} for {} on {}",
                order.id,
                money(order.total),
                order.date
            )),
            Err(CartError::EmptyCart) => emit("Cart is empty, nothing to order"),
            Err(e) => return Err(e.into()),
        },
        CartAction::Orders => emit(&serde_json::to_string_pretty(store.orders())?),
    }
    Ok(())
}

impl From<CustomerArgs> for CustomerInfo {
    fn from(args: CustomerArgs) -> Self {
        Self {
            name: args.name,
            email: args.email,
            phone: args.phone,
            address: args.address,
            notes: args.notes,
            ..Self::default()
        }
    }
}

fn money(amount: rust_decimal::Decimal) -> String {
    Price::new(amount, CurrencyCode::default()).display()
}

fn render_cart(store: &CartStore) -> String {
    let owner = store
        .user_id()
        .map_or_else(|| "guest".to_string(), |id| format!("user {id}"));

    if store.items().is_empty() {
        return format!("Cart ({owner}) is empty");
    }

    let mut out = format!("Cart ({owner})\n");
    for (index, item) in store.items().iter().enumerate() {
        let variants = item
            .selected_variants
            .iter()
            .map(|v| format!("{}={}", v.name, v.value))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "  [{index}] {} #{} ({variants}) x{} {}",
            item.title,
            item.product_id,
            item.quantity,
            money(item.line_total())
        );
    }
    let _ = write!(
        out,
        "{} item(s), total {}",
        store.item_count(),
        money(store.total_price())
    );
    out
}

/// Write command output to stdout.
#[allow(clippy::print_stdout)]
fn emit(message: &str) {
    println!("{message}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use basket_store::MemoryStorage;
    use rust_decimal::Decimal;

    use super::*;

    fn store() -> CartStore {
        CartStore::new(Arc::new(MemoryCartStore::new()), Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_render_empty_cart() {
        assert_eq!(render_cart(&store()), "Cart (guest) is empty");
    }

    #[tokio::test]
    async fn test_render_cart_lines() {
        let mut store = store();
        store
            .add_item(
                CartItem::new(ProductId::new(4), "Shirt", Decimal::new(1999, 2))
                    .with_variant("size", "M")
                    .with_quantity(2),
            )
            .await
            .unwrap();

        let rendered = render_cart(&store);
        assert!(rendered.contains("[0] Shirt #4 (size=M) x2 $39.98"));
        assert!(rendered.ends_with("2 item(s), total $39.98"));
    }

    #[test]
    fn test_customer_args_into_info() {
        let info: CustomerInfo = CustomerArgs {
            name: Some("Ada".to_string()),
            ..CustomerArgs::default()
        }
        .into();
        assert_eq!(info.name.as_deref(), Some("Ada"));
        assert!(info.extra.is_empty());
    }
}

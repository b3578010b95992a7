//! Basket CLI - Database migrations and cart management.
//!
//! # Usage
//!
//! ```bash
//! # Create the account cart tables
//! basket migrate
//!
//! # Work with the guest cart stored in BASKET_DATA_DIR
//! basket cart add --product 1 --title "Shirt" --price 19.99 --variant size=M
//! basket cart show
//!
//! # Work with a signed-in user's cart (requires BASKET_DATABASE_URL)
//! basket cart --user 67e55044-10b1-426f-9247-bb680e5fe0c8 checkout --name "Ada"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Show or change a cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use basket_core::{Email, ProductId, SelectedVariant, UserId};
use basket_store::BasketConfig;
use basket_store::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "basket")]
#[command(author, version, about = "Basket CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Show or change a cart
    Cart {
        /// Act as this signed-in user instead of the guest cart
        #[arg(short, long)]
        user: Option<UserId>,

        /// Email recorded on the account row when it is first created
        #[arg(short, long, requires = "user")]
        email: Option<Email>,

        #[command(subcommand)]
        action: CartAction,
    },
}

/// Identifies one cart line by product and variant choices.
#[derive(clap::Args, Debug, Clone)]
struct LineArgs {
    /// Product ID
    #[arg(short, long)]
    product: i32,

    /// Variant choice as name=value (repeatable, order matters)
    #[arg(short, long = "variant", value_parser = parse_variant)]
    variants: Vec<SelectedVariant>,
}

impl LineArgs {
    fn key(&self) -> basket_core::CartLineKey {
        basket_core::CartLineKey::new(ProductId::new(self.product), &self.variants)
    }
}

#[derive(Subcommand, Debug)]
enum CartAction {
    /// List cart lines and totals
    Show,
    /// Add a product (merges with a matching line)
    Add {
        #[command(flatten)]
        line: LineArgs,

        /// Product title
        #[arg(short, long)]
        title: String,

        /// Unit price
        #[arg(long)]
        price: Decimal,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove the line at a position (as listed by `show`)
    Remove {
        /// Zero-based line position
        index: usize,
    },
    /// Add one to a line
    Inc {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Subtract one from a line (removes it at zero)
    Dec {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Set a line's quantity (0 removes it)
    Set {
        #[command(flatten)]
        line: LineArgs,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove every line (orders are kept)
    Clear,
    /// Place an order for the current lines
    Checkout {
        #[command(flatten)]
        customer: CustomerArgs,
    },
    /// Print placed orders as JSON
    Orders,
}

/// Contact details recorded on an order.
#[derive(clap::Args, Debug, Default)]
struct CustomerArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long = "contact-email")]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

fn parse_variant(raw: &str) -> Result<SelectedVariant, String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok(SelectedVariant::new(name.trim(), value.trim()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() {
    let config = match BasketConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config.sentry);
    telemetry::init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: BasketConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(&config).await?,
        Commands::Cart {
            user,
            email,
            action,
        } => commands::cart::run(&config, user, email, action).await?,
    }
    Ok(())
}

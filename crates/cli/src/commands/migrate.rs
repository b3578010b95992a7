//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! basket migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BASKET_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/store/migrations/` and are embedded into the
//! binary at compile time.

use thiserror::Error;

use basket_store::BasketConfig;
use basket_store::config::ConfigError;
use basket_store::remote::create_pool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the cart schema migrations.
///
/// # Errors
///
/// Returns `MigrationError` if no database URL is configured, the database
/// cannot be reached, or a migration fails.
pub async fn run(config: &BasketConfig) -> Result<(), MigrationError> {
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(database_url, 1).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../store/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}

//! Basket configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BASKET_DATABASE_URL` - `PostgreSQL` connection string for account carts
//!   (falls back to `DATABASE_URL`; without either, account carts are kept
//!   in memory only)
//! - `BASKET_DATA_DIR` - Directory for guest cart files (default: `.basket`)
//! - `BASKET_STORAGE_KEY` - Guest cart key (default: `basket`)
//! - `BASKET_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate, 0.0-1.0 (default: 1.0)

use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use crate::store::DEFAULT_STORAGE_KEY;

const DEFAULT_DATA_DIR: &str = ".basket";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Basket configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct BasketConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Directory holding guest cart files
    pub data_dir: PathBuf,
    /// Key the guest cart is stored under
    pub storage_key: String,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Sentry DSN; tracking is disabled when absent
    pub dsn: Option<String>,
    /// Environment tag (e.g. `production`)
    pub environment: Option<String>,
    /// Error event sample rate
    pub sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
        }
    }
}

impl std::fmt::Debug for BasketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasketConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("data_dir", &self.data_dir)
            .field("storage_key", &self.storage_key)
            .field("sentry", &self.sentry)
            .finish()
    }
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            sentry: SentryConfig::default(),
        }
    }
}

impl BasketConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("BASKET_DATABASE_URL")
            .or_else(|| get("DATABASE_URL"))
            .map(SecretString::from);

        let db_max_connections = match get("BASKET_DB_MAX_CONNECTIONS") {
            Some(raw) => parse_var("BASKET_DB_MAX_CONNECTIONS", &raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if db_max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BASKET_DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let data_dir = get("BASKET_DATA_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);
        let storage_key = get("BASKET_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_owned());
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "BASKET_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let sample_rate = match get("SENTRY_SAMPLE_RATE") {
            Some(raw) => parse_var::<f32>("SENTRY_SAMPLE_RATE", &raw)?,
            None => 1.0,
        };
        if !(0.0..=1.0).contains(&sample_rate) {
            return Err(ConfigError::InvalidEnvVar(
                "SENTRY_SAMPLE_RATE".to_string(),
                format!("{sample_rate} is outside 0.0-1.0"),
            ));
        }

        Ok(Self {
            database_url,
            db_max_connections,
            data_dir,
            storage_key,
            sentry: SentryConfig {
                dsn: get("SENTRY_DSN"),
                environment: get("SENTRY_ENVIRONMENT"),
                sample_rate,
            },
        })
    }

    /// The database URL, or `ConfigError::MissingEnvVar` if none is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` naming `BASKET_DATABASE_URL`.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("BASKET_DATABASE_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a variable's raw value, naming the variable on failure.
fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<BasketConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BasketConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.data_dir, PathBuf::from(".basket"));
        assert_eq!(config.storage_key, "basket");
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fallback/db")]).unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://fallback/db"
        );

        let config = load(&[
            ("DATABASE_URL", "postgres://fallback/db"),
            ("BASKET_DATABASE_URL", "postgres://primary/db"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://primary/db"
        );
    }

    #[test]
    fn test_invalid_max_connections() {
        let err = load(&[("BASKET_DB_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "BASKET_DB_MAX_CONNECTIONS"));

        assert!(load(&[("BASKET_DB_MAX_CONNECTIONS", "0")]).is_err());
    }

    #[test]
    fn test_sample_rate_bounds() {
        assert!(load(&[("SENTRY_SAMPLE_RATE", "0.25")]).is_ok());
        assert!(load(&[("SENTRY_SAMPLE_RATE", "1.5")]).is_err());
    }

    #[test]
    fn test_empty_storage_key_rejected() {
        assert!(load(&[("BASKET_STORAGE_KEY", "  ")]).is_err());
    }

    #[test]
    fn test_require_database_url() {
        let config = load(&[]).unwrap();
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("BASKET_DATABASE_URL", "postgres://user:hunter2@db/basket")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }
}

//! Local (guest) persistence.
//!
//! Guest carts live in a key-value string store on the shopper's device. The
//! store only needs `get` and `set` of a single value under a fixed key; the
//! value is the JSON-encoded [`CartSnapshot`](basket_core::CartSnapshot).
//!
//! # Implementations
//!
//! - [`MemoryStorage`] - Process-local map, used in tests and embedded hosts
//! - [`FileStorage`] - One file per key in a data directory

mod file;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

pub use file::FileStorage;

/// Errors raised by a [`LocalStorage`] backend.
#[derive(Debug, Error)]
pub enum LocalStorageError {
    /// Reading or writing the backing file failed.
    #[error("local storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be used by this backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The backend can no longer be used (e.g. a poisoned lock).
    #[error("local storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value string storage for guest carts.
pub trait LocalStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, LocalStorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `LocalStorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStorageError>;
}

/// In-memory [`LocalStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        let values = self
            .values
            .read()
            .map_err(|e| LocalStorageError::Unavailable(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStorageError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| LocalStorageError::Unavailable(e.to_string()))?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_get_missing() {
        let storage = MemoryStorage::new();
        assert!(storage.get("basket").unwrap().is_none());
    }

    #[test]
    fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set("basket", "one").unwrap();
        storage.set("basket", "two").unwrap();
        assert_eq!(storage.get("basket").unwrap().as_deref(), Some("two"));
    }
}

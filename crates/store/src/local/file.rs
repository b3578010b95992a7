//! File-backed local storage.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{LocalStorage, LocalStorageError};

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a uniquely named temp file in the same directory, which is
/// synced and then renamed over the target. A crash mid-save leaves the
/// previous value intact, and concurrent writers never share a temp file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LocalStorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(LocalStorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;

        tracing::trace!(path = %path.display(), bytes = value.len(), "Wrote local cart");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_get_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.get("basket").unwrap().is_none());
    }

    #[test]
    fn test_set_creates_directory_and_roundtrips() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        storage.set("basket", r#"{"items":[]}"#).unwrap();

        assert_eq!(
            storage.get("basket").unwrap().as_deref(),
            Some(r#"{"items":[]}"#)
        );
        assert!(dir.path().join("nested/basket.json").exists());
        assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_writers_leave_one_complete_value() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        let values: Vec<String> = (0..8)
            .map(|n| format!(r#"{{"items":[],"writer":{n},"pad":"{}"}}"#, "x".repeat(4096)))
            .collect();

        std::thread::scope(|scope| {
            for value in &values {
                let storage = storage.clone();
                scope.spawn(move || {
                    for _ in 0..20 {
                        storage.set("basket", value).unwrap();
                    }
                });
            }
        });

        let stored = storage.get("basket").unwrap().unwrap();
        assert!(values.contains(&stored));
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("basket.json")]);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());

        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                storage.set(key, "x"),
                Err(LocalStorageError::InvalidKey(_))
            ));
        }
    }
}

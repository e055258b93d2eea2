//! Atomic TOML documents.
//!
//! Writes go to a sibling temp file that is fsynced and renamed over the
//! target, under an exclusive `fs2` lock on a `.lock` sibling.

use histchat_core::error::{HistchatError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to a TOML file holding one `T`.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Loaded and parsed
    /// - `Ok(None)`: File missing or empty
    /// - `Err`: Unreadable or invalid TOML
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data: T = toml::from_str(&content)?;
        Ok(Some(data))
    }

    /// Replaces the document atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the exclusive lock.
    ///
    /// Nothing is written if `f` returns an error.
    pub fn update<F, R>(&self, default_value: T, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = self.load()?.unwrap_or(default_value);
        let outcome = f(&mut data)?;
        self.save(&data)?;

        Ok(outcome)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| HistchatError::io(format!("{} has no file name", self.path.display())))?;
        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(self.path.with_file_name(tmp_name))
    }
}

/// Exclusive lock guard; the lock is released when the handle drops.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| HistchatError::io(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Best effort; the OS lock is gone with the handle
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Counter {
        slugs: Vec<String>,
    }

    #[test]
    fn test_load_missing_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("figures.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());
        assert!(file.load().unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_update_applies_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("figures.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());

        let len = file
            .update(Counter::default(), |data| {
                data.slugs.push("cleopatra".to_string());
                Ok(data.slugs.len())
            })
            .unwrap();
        assert_eq!(len, 1);

        assert_eq!(file.load().unwrap().unwrap().slugs, vec!["cleopatra"]);
        assert!(!path.with_file_name(".figures.toml.tmp").exists());
        assert!(!path.with_extension("lock").exists());
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("figures.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());

        let result: Result<()> = file.update(Counter::default(), |data| {
            data.slugs.push("x".to_string());
            Err(HistchatError::internal("abort"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_toml_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("figures.toml");
        fs::write(&path, "slugs = [").unwrap();
        let file = AtomicTomlFile::<Counter>::new(path);
        assert!(matches!(
            file.load(),
            Err(HistchatError::Serialization { .. })
        ));
    }
}

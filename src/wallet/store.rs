//! Persistence port for the key vault
//!
//! The vault never touches ambient storage directly; it owns a
//! `KeyValueStore` handed to it at construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// String key-value storage
///
/// Multi-key writes are all-or-nothing: after an error the store holds
/// exactly what it held before the call.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write several values at once, replacing previous ones
    fn put_many(&mut self, entries: Vec<(&str, String)>) -> Result<()>;

    /// Delete several values at once. Missing keys are not an error.
    fn remove_many(&mut self, keys: &[&str]) -> Result<()>;

    /// Write a value, replacing any previous one
    fn put(&mut self, key: &str, value: String) -> Result<()> {
        self.put_many(vec![(key, value)])
    }

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }
}

/// Volatile store, used for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put_many(&mut self, entries: Vec<(&str, String)>) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON file holding a flat string map
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so the file on disk is always a complete map. On Unix the file
/// is created with mode 600.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, creating an empty one if the file does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            debug!("Vault file {} not found, starting empty", path.display());
            BTreeMap::new()
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    warn!(
                        "Vault file {} has permissions {:o}. Run 'chmod 600 {}'",
                        path.display(),
                        mode & 0o777,
                        path.display()
                    );
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let temp = self.temp_path();
        if let Err(e) = self.write_replacing(&temp, &json) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }

        info!("Saved vault to {}", self.path.display());
        Ok(())
    }

    fn write_replacing(&self, temp: &Path, json: &str) -> Result<()> {
        std::fs::write(temp, json)
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", temp.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(temp, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::Storage(format!("Failed to restrict permissions: {}", e)))?;
        }

        std::fs::rename(temp, &self.path)
            .map_err(|e| Error::Storage(format!("Failed to replace {}: {}", self.path.display(), e)))
    }

    /// Apply `change` and persist it, restoring the previous map on failure
    fn commit(&mut self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let previous = self.entries.clone();
        change(&mut self.entries);
        if self.entries == previous {
            return Ok(());
        }

        if let Err(e) = self.flush() {
            warn!("Vault write failed, keeping previous contents: {}", e);
            self.entries = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put_many(&mut self, entries: Vec<(&str, String)>) -> Result<()> {
        self.commit(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value);
            }
        })
    }

    fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        self.commit(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

//! YAML-backed store registry.

use crate::models::StoreRegistry;
use crate::storage::traits::StoreRegistryStorage;
use crate::storage::{StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persists the [`StoreRegistry`] as a single YAML file.
///
/// Saves go through a temporary file and a rename so a crash never leaves a
/// truncated registry behind.
#[derive(Debug, Clone)]
pub struct FilesystemStoreRegistry {
    path: PathBuf,
}

impl FilesystemStoreRegistry {
    /// Creates a registry persisted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreRegistryStorage for FilesystemStoreRegistry {
    fn load(&self) -> StorageResult<StoreRegistry> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreRegistry::new()),
            Err(e) => return Err(StorageError::read(self.path.display(), e)),
        };
        if text.trim().is_empty() {
            return Ok(StoreRegistry::new());
        }
        serde_yaml_ng::from_str(&text).map_err(|e| StorageError::read(self.path.display(), e))
    }

    fn save(&self, registry: &StoreRegistry) -> StorageResult<()> {
        let yaml = serde_yaml_ng::to_string(registry)
            .map_err(|e| StorageError::write(self.path.display(), e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::write(parent.display(), e))?;
        }
        let staged = self.path.with_extension("yml.tmp");
        fs::write(&staged, yaml).map_err(|e| StorageError::write(staged.display(), e))?;
        fs::rename(&staged, &self.path).map_err(|e| {
            let _ = fs::remove_file(&staged);
            StorageError::write(self.path.display(), e)
        })
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        let mut registry = self.load()?;
        if registry.deregister(name).is_none() {
            return Ok(false);
        }
        self.save(&registry)?;
        Ok(true)
    }
}

//! Store registry storage trait.

use crate::models::StoreRegistry;
use crate::storage::StorageResult;

/// Persistence for the store registry.
pub trait StoreRegistryStorage: Send + Sync {
    /// Loads the registry. A missing registry is empty.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the registry exists but cannot be read or parsed.
    fn load(&self) -> StorageResult<StoreRegistry>;

    /// Saves the registry, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the registry cannot be written.
    fn save(&self, registry: &StoreRegistry) -> StorageResult<()>;

    /// Removes a store from the registry. Returns `true` if it was registered.
    ///
    /// Store data on disk is left in place.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` or `WriteFailed` if the registry cannot be updated.
    fn remove(&self, name: &str) -> StorageResult<bool>;
}

//! Command handlers module.
//!
//! - `memory.rs`: memory lifecycle commands
//! - `category.rs`: category commands
//! - `store.rs`: store registry commands
//!
//! Every handler returns a JSON value that `main` prints on stdout.

mod category;
mod memory;
mod store;

pub use category::{CategoryAction, cmd_category};
pub use memory::{MemoryAction, cmd_memory};
pub use store::{StoreAction, cmd_store};

use cortex::models::is_valid_slug;
use cortex::storage::{IndexStorage, StoreRegistryStorage};
use cortex::{
    CategoryService, CortexConfig, Error, FilesystemStorage, FilesystemStorageConfig,
    FilesystemStoreRegistry, MemoryService, StoreDefinition,
};
use cortex::services::CategoryPolicy;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// A resolved store: its storage adapter and category policy.
pub struct Session {
    name: String,
    storage: Arc<FilesystemStorage>,
    policy: CategoryPolicy,
}

impl Session {
    /// Opens the store named `store`, or the configured default.
    ///
    /// A store that is not registered yet is registered on first use with a
    /// root under the data directory and no category restrictions.
    pub fn open(config: &CortexConfig, store: Option<&str>) -> Result<Self, Error> {
        let name = store.unwrap_or(&config.default_store).trim();
        if !is_valid_slug(name) {
            return Err(Error::InvalidInput(format!(
                "store name '{name}' must be lowercase alphanumeric words joined by hyphens"
            )));
        }

        let registry = FilesystemStoreRegistry::new(config.registry_path.clone());
        let mut stores = registry.load()?;
        let definition = if let Some(definition) = stores.get(name) {
            definition.clone()
        } else {
            let definition = StoreDefinition::new(config.default_store_root(name));
            stores.register(name, definition.clone());
            registry.save(&stores)?;
            info!(store = name, path = %definition.path.display(), "Registered store on first use");
            definition
        };

        let storage_config = FilesystemStorageConfig::new(definition.path.clone())
            .with_memory_extension(&config.memory_extension)
            .with_index_extension(&config.index_extension);

        Ok(Self {
            name: name.to_string(),
            storage: Arc::new(FilesystemStorage::new(
                storage_config,
                config.registry_path.clone(),
            )),
            policy: CategoryPolicy::from_store(&definition),
        })
    }

    /// Memory operations on this store.
    pub fn memories(&self) -> MemoryService {
        MemoryService::new(self.storage.clone())
    }

    /// Category operations on this store, under its policy.
    pub fn categories(&self) -> CategoryService {
        CategoryService::new(self.storage.clone(), self.policy.clone())
    }
}

/// Reindex command.
pub fn cmd_reindex(session: &Session) -> Result<Value, Error> {
    let report = session.storage.reindex()?;
    Ok(serde_json::json!({
        "store": session.name,
        "report": report,
    }))
}

/// Serializes a command result.
pub fn to_output<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::OperationFailed {
        operation: "encode_output".to_string(),
        cause: e.to_string(),
    })
}

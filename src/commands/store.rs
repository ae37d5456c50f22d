//! Store registry command handlers.

use super::{Session, to_output};
use clap::Subcommand;
use cortex::models::is_valid_slug;
use cortex::storage::StoreRegistryStorage;
use cortex::{
    CategoryMode, CortexConfig, Error, FilesystemStoreRegistry, OperationContext, StoreDefinition,
};
use serde_json::{Value, json};
use std::path::PathBuf;

/// Store subcommands.
#[derive(Subcommand)]
pub enum StoreAction {
    /// Register a store.
    Add {
        /// Store name.
        name: String,

        /// Root directory. Defaults to a directory under the data dir.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Category mode: free, subcategories, or strict.
        #[arg(long, default_value = "free")]
        mode: CategoryMode,

        /// Store description.
        #[arg(long)]
        description: Option<String>,
    },

    /// List registered stores.
    List,

    /// Deregister a store. Its files are left in place.
    Remove {
        /// Store name.
        name: String,
    },
}

/// Store command implementation.
pub fn cmd_store(action: StoreAction, config: &CortexConfig) -> Result<Value, Error> {
    let registry = FilesystemStoreRegistry::new(config.registry_path.clone());

    match action {
        StoreAction::Add {
            name,
            path,
            mode,
            description,
        } => {
            if !is_valid_slug(&name) {
                return Err(Error::InvalidInput(format!("invalid store name '{name}'")));
            }
            let mut stores = registry.load()?;
            if stores.get(&name).is_some() {
                return Err(Error::InvalidInput(format!(
                    "store '{name}' is already registered"
                )));
            }

            let mut definition = StoreDefinition::new(
                path.unwrap_or_else(|| config.default_store_root(&name)),
            )
            .with_mode(mode);
            definition.description = description;
            stores.register(name.as_str(), definition.clone());
            registry.save(&stores)?;

            let session = Session::open(config, Some(&name))?;
            let synced = session
                .categories()
                .sync_declared_categories(&OperationContext::new())?;

            Ok(json!({
                "name": name,
                "store": to_output(&definition)?,
                "categories": to_output(&synced)?,
            }))
        },

        StoreAction::List => to_output(&registry.load()?),

        StoreAction::Remove { name } => {
            if !registry.remove(&name)? {
                return Err(Error::InvalidInput(format!("unknown store '{name}'")));
            }
            Ok(json!({ "name": name, "removed": true }))
        },
    }
}

//! Category command handlers.

use super::{Session, to_output};
use clap::Subcommand;
use cortex::{Error, OperationContext};
use serde_json::Value;

/// Category subcommands.
#[derive(Subcommand)]
pub enum CategoryAction {
    /// Create a category and any missing parents.
    Create {
        /// Category path, e.g. `project/notes`.
        path: String,
    },

    /// Set or clear a category description.
    Describe {
        /// Category path.
        path: String,

        /// Description text. Empty clears it.
        #[arg(default_value = "")]
        description: String,
    },

    /// Delete a non-root category and everything in it.
    Delete {
        /// Category path.
        path: String,
    },

    /// Create every category declared for the store.
    Sync,
}

/// Category command implementation.
pub fn cmd_category(action: CategoryAction, session: &Session) -> Result<Value, Error> {
    let ctx = OperationContext::new();
    let service = session.categories();

    match action {
        CategoryAction::Create { path } => to_output(&service.create(&ctx, &path)?),
        CategoryAction::Describe { path, description } => {
            to_output(&service.set_description(&ctx, &path, &description)?)
        },
        CategoryAction::Delete { path } => to_output(&service.delete(&ctx, &path)?),
        CategoryAction::Sync => to_output(&service.sync_declared_categories(&ctx)?),
    }
}

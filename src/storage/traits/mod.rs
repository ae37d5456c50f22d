//! Storage port traits.
//!
//! The port is split into four capability groups so that each operation
//! depends only on what it uses:
//!
//! | Trait | Concern |
//! |-------|---------|
//! | [`MemoryStorage`] | Raw memory file contents |
//! | [`IndexStorage`] | Raw index text, incremental maintenance, full reindex |
//! | [`CategoryStorage`] | Category directories and typed index edits |
//! | [`StoreRegistryStorage`] | The persisted store registry |
//!
//! Index locations are addressed with `Option<&CategoryPath>`: `None` is the
//! store root index, which lists the root categories as subcategories.
//!
//! All traits take `&self` so adapters can be shared through
//! `Arc<dyn StoragePort>`.

mod category;
mod index;
mod memory;
mod registry;

pub use category::CategoryStorage;
pub use index::{IndexStorage, ReindexReport};
pub use memory::MemoryStorage;
pub use registry::StoreRegistryStorage;

/// Access to every storage capability group.
pub trait StoragePort: Send + Sync {
    /// Memory file access.
    fn memories(&self) -> &dyn MemoryStorage;

    /// Index file access and maintenance.
    fn indexes(&self) -> &dyn IndexStorage;

    /// Category directory and index access.
    fn categories(&self) -> &dyn CategoryStorage;

    /// Store registry persistence.
    fn registry(&self) -> &dyn StoreRegistryStorage;
}

//! Data models for cortex.
//!
//! Identities, memories, category indexes, and the store registry.

mod category_index;
mod identity;
mod memory;
mod store;

pub use category_index::{CategoryIndex, IndexMemoryEntry, IndexSubcategoryEntry};
pub use identity::{
    CategoryPath, IdentityError, MemoryIdentity, Slug, is_valid_slug, parse_category_path,
    validate_category_path, validate_memory_slug_path,
};
pub use memory::{Memory, MemoryMetadata, is_expired};
pub use store::{
    CategoryDefinition, CategoryMode, DeclaredCategories, StoreDefinition, StoreRegistry,
};

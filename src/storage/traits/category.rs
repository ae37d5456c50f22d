//! Category storage trait.

use crate::models::{CategoryIndex, CategoryPath};
use crate::storage::StorageResult;

/// Category directories and typed index edits.
pub trait CategoryStorage: Send + Sync {
    /// Returns `true` if the category directory exists.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the path cannot be resolved inside the store.
    fn category_exists(&self, category: &CategoryPath) -> StorageResult<bool>;

    /// Reads and parses an index. A missing index is the empty index.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the index cannot be read or parsed.
    fn read_category_index(&self, category: Option<&CategoryPath>) -> StorageResult<CategoryIndex>;

    /// Serializes and writes an index.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the index cannot be written.
    fn write_category_index(
        &self,
        category: Option<&CategoryPath>,
        index: &CategoryIndex,
    ) -> StorageResult<()>;

    /// Creates the category directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if a directory cannot be created.
    fn ensure_category_directory(&self, category: &CategoryPath) -> StorageResult<()>;

    /// Deletes the category directory tree and its index subtree.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if either tree cannot be removed.
    fn delete_category_directory(&self, category: &CategoryPath) -> StorageResult<()>;

    /// Sets or clears the description of `category` in its parent's index
    /// (the store root index for a root category), inserting the entry with
    /// the category's current memory count if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` or `WriteFailed` if an index cannot be accessed.
    fn update_subcategory_description(
        &self,
        category: &CategoryPath,
        description: Option<&str>,
    ) -> StorageResult<()>;

    /// Removes the entry for `category` from its parent's index.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` or `WriteFailed` if the index cannot be accessed.
    fn remove_subcategory_entry(&self, category: &CategoryPath) -> StorageResult<()>;
}

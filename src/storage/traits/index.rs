//! Index storage trait.
//!
//! Indexes are a denormalized cache of the memory files. Incremental
//! maintenance keeps them consistent as memories are written; a reindex
//! rebuilds them from scratch.
//!
//! ## Consistency
//!
//! Incremental updates touch one file per ancestor, leaf to root, with no
//! cross-file transaction. A failure part-way leaves stale roll-ups that the
//! next reindex repairs.

use crate::models::{CategoryPath, MemoryIdentity};
use crate::storage::StorageResult;
use serde::Serialize;

/// Outcome of a full reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    /// Name of the generation that is now active.
    pub generation: String,
    /// Memory files indexed.
    pub memories_indexed: usize,
    /// Category directories indexed.
    pub categories_indexed: usize,
    /// Files with the memory extension that were skipped.
    pub files_skipped: usize,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Raw index access and maintenance.
pub trait IndexStorage: Send + Sync {
    /// Reads the raw text of an index. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the index exists but cannot be read.
    fn read(&self, category: Option<&CategoryPath>) -> StorageResult<Option<String>>;

    /// Writes the raw text of an index in the active generation.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the index cannot be written.
    fn write(&self, category: Option<&CategoryPath>, contents: &str) -> StorageResult<()>;

    /// Rebuilds every index from the memory files and swaps the result in.
    ///
    /// On failure the previously active indexes are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` or `WriteFailed` if the new generation cannot be
    /// built or activated.
    fn reindex(&self) -> StorageResult<ReindexReport>;

    /// Updates the indexes after a memory at `identity` was written with
    /// `contents`: its entry in the category index, then the subcategory
    /// counts of every ancestor up to the store root index.
    ///
    /// # Errors
    ///
    /// Returns `IndexUpdateFailed` if any index cannot be read or written.
    fn update_after_memory_write(
        &self,
        identity: &MemoryIdentity,
        contents: &str,
    ) -> StorageResult<()>;
}

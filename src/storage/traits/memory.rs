//! Memory storage trait.

use crate::models::MemoryIdentity;
use crate::storage::StorageResult;

/// Raw access to memory files.
///
/// Contents are passed through untouched; encoding and decoding happen in
/// the codec layer.
pub trait MemoryStorage: Send + Sync {
    /// Reads a memory file. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the file exists but cannot be read.
    fn read(&self, identity: &MemoryIdentity) -> StorageResult<Option<String>>;

    /// Writes a memory file, creating its category directories.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the file cannot be written.
    fn write(&self, identity: &MemoryIdentity, contents: &str) -> StorageResult<()>;

    /// Deletes a memory file. Deleting a missing file succeeds.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the file exists but cannot be deleted.
    fn remove(&self, identity: &MemoryIdentity) -> StorageResult<()>;

    /// Moves a memory file, creating the destination directories.
    ///
    /// The file is renamed, so contents and metadata are byte-identical.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the destination exists or the rename fails.
    fn move_memory(&self, from: &MemoryIdentity, to: &MemoryIdentity) -> StorageResult<()>;
}

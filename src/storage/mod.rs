//! Storage layer.
//!
//! The core operations only see the [`StoragePort`] traits. The filesystem
//! adapter implements them on top of a store root directory:
//!
//! - **Memories**: one frontmatter file per memory, nested by category
//! - **Indexes**: one index file per category, kept in generation directories
//!   under the hidden index root so a full reindex can be swapped in atomically
//! - **Registry**: a YAML file mapping store names to their definitions

// Allow manual_let_else for clearer error handling in some contexts.
#![allow(clippy::manual_let_else)]

pub mod filesystem;
pub mod traits;

pub use filesystem::{FilesystemStorage, FilesystemStorageConfig, FilesystemStoreRegistry};
pub use traits::{
    CategoryStorage, IndexStorage, MemoryStorage, ReindexReport, StoragePort, StoreRegistryStorage,
};

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by storage adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A file or directory could not be read, or resolved outside the store.
    #[error("failed to read '{path}': {cause}")]
    ReadFailed {
        /// The path being read.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// A file or directory could not be written, or resolved outside the store.
    #[error("failed to write '{path}': {cause}")]
    WriteFailed {
        /// The path being written.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// Incremental index maintenance failed after a memory write.
    #[error("failed to update indexes for '{path}': {cause}")]
    IndexUpdateFailed {
        /// The memory whose write triggered the update.
        path: String,
        /// The underlying cause.
        cause: String,
    },
}

impl StorageError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed { .. } => "READ_FAILED",
            Self::WriteFailed { .. } => "WRITE_FAILED",
            Self::IndexUpdateFailed { .. } => "INDEX_UPDATE_FAILED",
        }
    }

    pub(crate) fn read(path: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Self::ReadFailed {
            path: path.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn write(path: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            path: path.to_string(),
            cause: cause.to_string(),
        }
    }
}

//! # Cortex
//!
//! A hierarchical, file-backed memory store for AI agents.
//!
//! Memories are short text notes stored as frontmatter files under nested
//! categories. Every category carries an index listing its memories (with
//! token estimates) and its immediate subcategories (with direct memory counts
//! and descriptions), so an agent can browse the tree without reading every
//! file.
//!
//! ## Layers
//!
//! - **Models**: slugs, category paths, memories, indexes, store registry
//! - **Codecs**: the memory file and index text formats
//! - **Storage**: the [`storage::StoragePort`] traits and the filesystem adapter,
//!   including incremental index maintenance and atomic full reindex
//! - **Services**: memory and category operations expressed against the port
//!
//! ## Example
//!
//! ```rust,no_run
//! use cortex::{FilesystemStorage, FilesystemStorageConfig, MemoryService, OperationContext};
//! use cortex::services::CreateMemoryInput;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FilesystemStorage::new(
//!     FilesystemStorageConfig::new("/tmp/cortex/default"),
//!     "/tmp/cortex/stores.yml",
//! ));
//! let memories = MemoryService::new(storage);
//! let ctx = OperationContext::new();
//!
//! memories.create(&ctx, "project/setup", CreateMemoryInput::new("Run make first", "user"))?;
//! # Ok::<(), cortex::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use serde::Serialize;
use thiserror::Error as ThisError;

pub mod codec;
pub mod config;
pub mod gc;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod tokens;

pub use codec::{IndexCodecError, MemoryCodecError};
pub use config::CortexConfig;
pub use gc::{ExpirationService, PruneOptions, PruneResult};
pub use models::{
    CategoryIndex, CategoryMode, CategoryPath, IdentityError, Memory, MemoryIdentity,
    MemoryMetadata, Slug, StoreDefinition, StoreRegistry,
};
pub use observability::OperationContext;
pub use services::{CategoryError, CategoryService, MemoryError, MemoryService};
pub use storage::{
    FilesystemStorage, FilesystemStorageConfig, FilesystemStoreRegistry, StorageError, StoragePort,
};

/// Error type for cortex operations.
///
/// Each layer has its own error enum with a stable `code()`; this type wraps
/// them so callers can propagate any of them with `?`.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad CLI or configuration values |
/// | `OperationFailed` | Configuration files, logging setup, output encoding |
/// | `Identity` | A slug or path fails validation outside a service |
/// | `MemoryCodec` / `IndexCodec` | A file fails to parse outside a service |
/// | `Storage` | Direct adapter calls (reindex, registry) fail |
/// | `Memory` / `Category` | Service operations fail |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Slug or path validation failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A memory file could not be parsed or serialized.
    #[error(transparent)]
    MemoryCodec(#[from] MemoryCodecError),

    /// An index file could not be parsed.
    #[error(transparent)]
    IndexCodec(#[from] IndexCodecError),

    /// A storage adapter call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A memory operation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// A category operation failed.
    #[error(transparent)]
    Category(#[from] CategoryError),
}

impl Error {
    /// Returns the stable error code of the innermost layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::Identity(e) => e.code(),
            Self::MemoryCodec(e) => e.code(),
            Self::IndexCodec(e) => e.code(),
            Self::Storage(e) => e.code(),
            Self::Memory(e) => e.code(),
            Self::Category(e) => e.code(),
        }
    }

    /// Renders the error as a serializable payload for protocol layers.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        let details = match self {
            Self::Memory(e) => e.details(),
            Self::Category(e) => e.details(),
            Self::Storage(e) => Some(serde_json::json!({ "storage_code": e.code() })),
            _ => None,
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

/// Wire representation of an [`Error`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context, when the error carries any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Result type alias for cortex operations.
pub type Result<T> = std::result::Result<T, Error>;

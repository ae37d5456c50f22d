//! Garbage collection.
//!
//! Memories may carry an `expires_at` timestamp. Expired memories are hidden
//! from reads and listings but stay on disk until pruned:
//!
//! ```rust,no_run
//! use cortex::gc::{ExpirationService, PruneOptions};
//! use cortex::{FilesystemStorage, FilesystemStorageConfig, OperationContext};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FilesystemStorage::new(
//!     FilesystemStorageConfig::new("/tmp/cortex/default"),
//!     "/tmp/cortex/stores.yml",
//! ));
//! let service = ExpirationService::new(storage);
//!
//! // Dry run to see what would be cleaned up
//! let result = service.prune(&OperationContext::new(), PruneOptions { dry_run: true })?;
//! println!("{}", result.summary());
//! # Ok::<(), cortex::MemoryError>(())
//! ```

mod expiration;

pub use expiration::{ExpirationService, PruneOptions, PruneResult, PrunedMemory};

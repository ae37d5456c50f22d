//! Business logic services.
//!
//! Services express memory and category operations against the
//! [`StoragePort`](crate::storage::StoragePort) and never touch the
//! filesystem directly.

mod category;
mod memory;

pub use category::{
    CategoryCreated, CategoryDeleted, CategoryDescribed, CategoryError, CategoryPolicy,
    CategoryService, MAX_DESCRIPTION_LENGTH, SyncReport,
};
pub use memory::{
    CreateMemoryInput, GetMemoryOptions, ListMemoriesOptions, ListMemoriesResult, ListedMemory,
    MemoryError, MemoryRecord, MemoryService, MovedMemory, RemovedMemory, UpdateMemoryInput,
};

use std::time::Instant;

/// Records the outcome counter and latency histogram of a service call.
pub(crate) fn record_operation<T, E>(
    metric: &'static str,
    operation: &'static str,
    result: &Result<T, E>,
    start: Instant,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(metric, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!("cortex_operation_duration_ms", "operation" => operation)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

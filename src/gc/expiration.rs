//! TTL-based expiration pruning.
//!
//! Walks the index tree from the store root, checks every listed memory's
//! `expires_at`, and deletes the expired ones. A single reindex runs after the
//! deletions so the indexes drop the removed entries.

use crate::codec::{frontmatter, index};
use crate::models::{CategoryIndex, CategoryPath, parse_category_path, validate_memory_slug_path};
use crate::observability::OperationContext;
use crate::services::MemoryError;
use crate::storage::StoragePort;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Options for a prune run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOptions {
    /// Report candidates without deleting anything.
    pub dry_run: bool,
}

/// A memory that was (or would be) pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunedMemory {
    /// Full slug path.
    pub path: String,
    /// When it expired.
    pub expires_at: DateTime<Utc>,
}

/// Result of a prune run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneResult {
    /// Expired memories, deleted unless `dry_run`.
    pub pruned: Vec<PrunedMemory>,

    /// Total number of memories checked.
    pub memories_checked: usize,

    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,

    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl PruneResult {
    /// Returns `true` if any memory expired.
    #[must_use]
    pub fn has_expired_memories(&self) -> bool {
        !self.pruned.is_empty()
    }

    /// Returns a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let action = if self.dry_run { "would prune" } else { "pruned" };

        if self.pruned.is_empty() {
            format!(
                "No expired memories found ({} memories checked in {}ms)",
                self.memories_checked, self.duration_ms
            )
        } else {
            format!(
                "{} {} expired memories - checked {} in {}ms",
                action,
                self.pruned.len(),
                self.memories_checked,
                self.duration_ms
            )
        }
    }
}

/// Service for pruning memories past their `expires_at`.
pub struct ExpirationService {
    storage: Arc<dyn StoragePort>,
}

impl ExpirationService {
    /// Creates an expiration service over a storage port.
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Finds every memory with `expires_at <= now` and deletes it.
    ///
    /// With `dry_run` nothing is deleted and no reindex runs. Listed memories
    /// whose file is missing or unreadable are skipped and not counted. Only
    /// subcategory entries that are direct children of the listing category
    /// are followed, and each category is visited once.
    ///
    /// If a delete fails the remaining memories are still processed, the
    /// indexes are rebuilt when anything was deleted, and the first failure
    /// is returned.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::CorruptIndex`] if an index file does not parse
    /// - [`MemoryError::Storage`] if a read, delete, or the reindex fails
    #[instrument(
        name = "cortex.gc.expiration",
        skip(self, ctx),
        fields(request_id = %ctx.request_id(), dry_run = options.dry_run)
    )]
    pub fn prune(
        &self,
        ctx: &OperationContext,
        options: PruneOptions,
    ) -> Result<PruneResult, MemoryError> {
        let start = Instant::now();
        let now = ctx.now();

        let mut result = PruneResult {
            dry_run: options.dry_run,
            ..Default::default()
        };

        let root = self.read_index(None)?;
        let mut pending: VecDeque<CategoryPath> = subcategory_paths(&root, None).collect();
        let mut visited: HashSet<CategoryPath> = HashSet::new();
        let mut removal_error: Option<MemoryError> = None;

        while let Some(category) = pending.pop_front() {
            if !visited.insert(category.clone()) {
                continue;
            }
            let listing = self.read_index(Some(&category))?;
            pending.extend(subcategory_paths(&listing, Some(&category)));

            for entry in &listing.memories {
                let Ok(identity) = validate_memory_slug_path(&entry.path) else {
                    debug!(path = %entry.path, "Skipping index entry with invalid path");
                    continue;
                };
                let raw = match self.storage.memories().read(&identity) {
                    Ok(Some(raw)) => raw,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(
                            path = %entry.path,
                            error = %e,
                            "Skipping memory file that cannot be read"
                        );
                        continue;
                    },
                };
                let memory = match frontmatter::parse(&raw) {
                    Ok(memory) => memory,
                    Err(e) => {
                        warn!(path = %entry.path, error = %e, "Skipping unreadable memory");
                        continue;
                    },
                };
                result.memories_checked += 1;

                let Some(expires_at) = memory.metadata.expires_at else {
                    continue;
                };
                if !memory.is_expired(now) {
                    continue;
                }

                debug!(path = %identity, %expires_at, "Memory expired");
                if !options.dry_run {
                    if let Err(e) = self.storage.memories().remove(&identity) {
                        warn!(path = %identity, error = %e, "Failed to delete expired memory");
                        if removal_error.is_none() {
                            removal_error = Some(e.into());
                        }
                        continue;
                    }
                }
                result.pruned.push(PrunedMemory {
                    path: identity.slug_path(),
                    expires_at,
                });
            }
        }

        // Deleted files must leave the indexes even when a later delete failed.
        if !options.dry_run && result.has_expired_memories() {
            self.storage.indexes().reindex()?;
        }
        if let Some(e) = removal_error {
            return Err(e);
        }

        result.duration_ms = duration_to_millis(start.elapsed());

        metrics::counter!(
            "cortex_prune_runs_total",
            "dry_run" => options.dry_run.to_string()
        )
        .increment(1);
        if !options.dry_run {
            metrics::counter!("cortex_pruned_memories_total")
                .increment(u64::try_from(result.pruned.len()).unwrap_or(u64::MAX));
        }

        info!(
            memories_checked = result.memories_checked,
            expired = result.pruned.len(),
            duration_ms = result.duration_ms,
            dry_run = options.dry_run,
            "Expiration prune completed"
        );

        Ok(result)
    }

    fn read_index(&self, category: Option<&CategoryPath>) -> Result<CategoryIndex, MemoryError> {
        let Some(raw) = self.storage.indexes().read(category)? else {
            return Ok(CategoryIndex::new());
        };
        index::parse(&raw).map_err(|source| MemoryError::CorruptIndex {
            category: category.map_or_else(|| "<root>".to_string(), ToString::to_string),
            source,
        })
    }
}

/// Subcategory entries of `index` that are direct children of `parent`.
fn subcategory_paths<'a>(
    index: &'a CategoryIndex,
    parent: Option<&'a CategoryPath>,
) -> impl Iterator<Item = CategoryPath> + 'a {
    index
        .subcategories
        .iter()
        .filter_map(move |entry| match parse_category_path(&entry.path) {
            Ok(path) if path.parent().as_ref() == parent => Some(path),
            Ok(_) => {
                debug!(category = %entry.path, "Skipping subcategory entry outside its parent");
                None
            },
            Err(e) => {
                debug!(category = %entry.path, error = %e, "Skipping invalid subcategory entry");
                None
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CreateMemoryInput, GetMemoryOptions, MemoryService};
    use crate::storage::{CategoryStorage, FilesystemStorage, FilesystemStorageConfig};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn seeded(dir: &TempDir) -> (Arc<FilesystemStorage>, MemoryService) {
        let storage = Arc::new(FilesystemStorage::new(
            FilesystemStorageConfig::new(dir.path()),
            dir.path().join("registry.yml"),
        ));
        let memories = MemoryService::new(storage.clone());
        let ctx = OperationContext::at(now());

        memories
            .create(&ctx, "a/keep", CreateMemoryInput::new("keep", "user"))
            .unwrap();
        memories
            .create(
                &ctx,
                "a/b/stale",
                CreateMemoryInput::new("stale", "user").with_expires_at(now()),
            )
            .unwrap();
        memories
            .create(
                &ctx,
                "c/later",
                CreateMemoryInput::new("later", "user")
                    .with_expires_at(now() + ChronoDuration::days(1)),
            )
            .unwrap();
        (storage, memories)
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let (storage, memories) = seeded(&dir);

        let result = ExpirationService::new(storage)
            .prune(&OperationContext::at(now()), PruneOptions { dry_run: true })
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.memories_checked, 3);
        assert_eq!(result.pruned.len(), 1);
        assert_eq!(result.pruned[0].path, "a/b/stale");
        assert!(result.summary().starts_with("would prune 1"));

        let still_there = memories.get(
            &OperationContext::at(now()),
            "a/b/stale",
            GetMemoryOptions { include_expired: true },
        );
        assert!(still_there.is_ok());
    }

    #[test]
    fn test_prune_deletes_and_reindexes() {
        let dir = TempDir::new().unwrap();
        let (storage, memories) = seeded(&dir);

        let result = memories
            .prune_expired(&OperationContext::at(now()), PruneOptions::default())
            .unwrap();
        assert_eq!(result.pruned.len(), 1);

        let err = memories
            .get(
                &OperationContext::at(now()),
                "a/b/stale",
                GetMemoryOptions { include_expired: true },
            )
            .unwrap_err();
        assert_eq!(err.code(), "MEMORY_NOT_FOUND");

        let again = ExpirationService::new(storage)
            .prune(&OperationContext::at(now()), PruneOptions::default())
            .unwrap();
        assert!(!again.has_expired_memories());
        assert_eq!(again.memories_checked, 2);
    }

    #[test]
    fn test_later_clock_prunes_more() {
        let dir = TempDir::new().unwrap();
        let (storage, _) = seeded(&dir);

        let result = ExpirationService::new(storage)
            .prune(
                &OperationContext::at(now() + ChronoDuration::days(2)),
                PruneOptions { dry_run: true },
            )
            .unwrap();
        let paths: Vec<_> = result.pruned.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["c/later", "a/b/stale"]);
    }

    #[test]
    fn test_files_that_cannot_be_read_are_skipped() {
        let dir = TempDir::new().unwrap();
        let (storage, memories) = seeded(&dir);
        let ctx = OperationContext::at(now());
        for path in ["a/bad", "a/huge"] {
            memories
                .create(
                    &ctx,
                    path,
                    CreateMemoryInput::new("doomed", "user").with_expires_at(now()),
                )
                .unwrap();
        }
        std::fs::write(dir.path().join("a").join("bad.md"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("a").join("huge.md"), "x".repeat(1024 * 1024 + 1))
            .unwrap();

        let result = ExpirationService::new(storage.clone())
            .prune(&ctx, PruneOptions { dry_run: true })
            .unwrap();
        assert_eq!(result.memories_checked, 3);
        assert_eq!(result.pruned.len(), 1);

        let result = ExpirationService::new(storage)
            .prune(&ctx, PruneOptions::default())
            .unwrap();
        assert_eq!(result.pruned.len(), 1);
        assert!(dir.path().join("a").join("bad.md").exists());
    }

    #[test]
    fn test_self_listing_index_terminates() {
        let dir = TempDir::new().unwrap();
        let (storage, _) = seeded(&dir);
        let a = parse_category_path("a").unwrap();
        let mut listing = storage.read_category_index(Some(&a)).unwrap();
        listing.upsert_subcategory("a", 1);
        listing.upsert_subcategory("c", 1);
        storage.write_category_index(Some(&a), &listing).unwrap();

        let result = ExpirationService::new(storage)
            .prune(&OperationContext::at(now()), PruneOptions { dry_run: true })
            .unwrap();
        assert_eq!(result.memories_checked, 3);
        assert_eq!(result.pruned.len(), 1);
    }

    #[test]
    fn test_summary_without_candidates() {
        let result = PruneResult {
            memories_checked: 4,
            duration_ms: 7,
            ..Default::default()
        };
        assert_eq!(
            result.summary(),
            "No expired memories found (4 memories checked in 7ms)"
        );
    }
}

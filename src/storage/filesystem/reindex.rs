//! Full reindex with atomic generation swap.
//!
//! 1. Walk the store root (dot-entries such as the index root are skipped)
//!    and build every category index in memory.
//! 2. Carry summaries and descriptions over from the active generation.
//! 3. Write the tree to `<gen>.tmp`, rename it to `<gen>`.
//! 4. Write `CURRENT.tmp` and rename it over `CURRENT`.
//! 5. Delete the previous generation.
//!
//! Step 4 is a single rename, so readers always see either the old or the
//! new generation. A failure before it discards the staged tree and leaves
//! the active generation in place.

use super::{CURRENT_FILE, FilesystemStorage, read_index_file, remove_tree, write_index_file};
use crate::models::{
    CategoryIndex, CategoryPath, IndexMemoryEntry, validate_category_path,
    validate_memory_slug_path,
};
use crate::storage::traits::ReindexReport;
use crate::storage::{StorageError, StorageResult};
use crate::tokens::estimate_tokens;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

const TEMP_SUFFIX: &str = ".tmp";

/// Indexes rebuilt from the memory files.
#[derive(Default)]
struct IndexTree {
    root: CategoryIndex,
    categories: BTreeMap<CategoryPath, CategoryIndex>,
    memories: usize,
    skipped: usize,
}

impl FilesystemStorage {
    #[instrument(
        name = "cortex.storage.reindex",
        skip(self),
        fields(root = %self.root().display())
    )]
    pub(super) fn rebuild_indexes(&self) -> StorageResult<ReindexReport> {
        let start = Instant::now();
        let result = self.build_and_swap(start);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("cortex_reindex_runs_total", "status" => status).increment(1);

        match &result {
            Ok(report) => info!(
                generation = %report.generation,
                memories = report.memories_indexed,
                categories = report.categories_indexed,
                skipped = report.files_skipped,
                duration_ms = report.duration_ms,
                "Reindex complete"
            ),
            Err(e) => warn!(error = %e, "Reindex failed, previous indexes left active"),
        }
        result
    }

    fn build_and_swap(&self, start: Instant) -> StorageResult<ReindexReport> {
        let index_root = self.index_root();
        let previous = self.active_generation()?;

        let mut tree = self.scan()?;
        self.carry_over(&index_root.join(&previous), &mut tree);

        let generation = format!("gen-{}", Uuid::new_v4().simple());
        let staging = index_root.join(format!("{generation}{TEMP_SUFFIX}"));
        let target = index_root.join(&generation);

        if let Err(e) = self.write_tree(&staging, &tree) {
            discard(&staging);
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, &target) {
            discard(&staging);
            return Err(StorageError::write(target.display(), e));
        }
        if let Err(e) = activate(&index_root, &generation) {
            discard(&target);
            return Err(e);
        }

        if let Err(e) = remove_tree(&index_root.join(&previous)) {
            warn!(generation = %previous, error = %e, "Failed to delete previous index generation");
        }
        remove_stale_staging(&index_root);

        Ok(ReindexReport {
            generation,
            memories_indexed: tree.memories,
            categories_indexed: tree.categories.len(),
            files_skipped: tree.skipped,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Builds every index from the files under the store root.
    fn scan(&self) -> StorageResult<IndexTree> {
        let root = self.root();
        let mut tree = IndexTree::default();
        if !root.is_dir() {
            return Ok(tree);
        }

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry during reindex");
                    continue;
                },
            };
            let Some(segments) = relative_segments(root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                match validate_category_path(segments.iter().copied()) {
                    Ok(category) if category.to_string() == segments.join("/") => {
                        tree.categories.entry(category).or_default();
                    },
                    _ => debug!(path = %entry.path().display(), "Skipping non-category directory"),
                }
            } else if entry.file_type().is_file() {
                self.index_file(entry.path(), &segments, &mut tree);
            }
        }

        // Second pass: roll each category's direct count into its parent.
        let counts: Vec<(CategoryPath, usize)> = tree
            .categories
            .iter()
            .map(|(path, index)| (path.clone(), index.memories.len()))
            .collect();
        for (path, count) in counts {
            let key = path.to_string();
            match path.parent() {
                Some(parent) => tree
                    .categories
                    .entry(parent)
                    .or_default()
                    .upsert_subcategory(&key, count),
                None => tree.root.upsert_subcategory(&key, count),
            }
        }
        for index in tree.categories.values_mut() {
            index.sort();
        }
        tree.root.sort();

        Ok(tree)
    }

    /// Adds one file to the tree if it is a valid memory file.
    fn index_file(&self, path: &Path, segments: &[&str], tree: &mut IndexTree) {
        let Some((name, categories)) = segments.split_last() else {
            return;
        };
        let Some(stem) = name.strip_suffix(self.config.memory_extension.as_str()) else {
            return;
        };

        let slug_path = categories
            .iter()
            .copied()
            .chain(std::iter::once(stem))
            .collect::<Vec<_>>()
            .join("/");
        let identity = match validate_memory_slug_path(&slug_path) {
            Ok(identity) if identity.slug_path() == slug_path => identity,
            Ok(_) | Err(_) => {
                debug!(path = %path.display(), "Skipping file with invalid memory path");
                tree.skipped += 1;
                return;
            },
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable memory file");
                tree.skipped += 1;
                return;
            },
        };

        tree.categories
            .entry(identity.category().clone())
            .or_default()
            .memories
            .push(IndexMemoryEntry::new(
                identity.slug_path(),
                estimate_tokens(&contents),
            ));
        tree.memories += 1;
    }

    /// Copies summaries and descriptions from the previous generation.
    fn carry_over(&self, previous_dir: &Path, tree: &mut IndexTree) {
        if !previous_dir.is_dir() {
            return;
        }

        let locations: Vec<Option<CategoryPath>> = std::iter::once(None)
            .chain(tree.categories.keys().cloned().map(Some))
            .collect();
        for location in locations {
            let file = self.index_file_in(previous_dir, location.as_ref());
            let previous = match read_index_file(&file) {
                Ok(index) => index,
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable index from previous generation");
                    continue;
                },
            };
            let fresh = match &location {
                None => &mut tree.root,
                Some(path) => match tree.categories.get_mut(path) {
                    Some(index) => index,
                    None => continue,
                },
            };
            copy_annotations(&previous, fresh);
        }
    }

    fn write_tree(&self, staging: &Path, tree: &IndexTree) -> StorageResult<()> {
        remove_tree(staging)?;
        fs::create_dir_all(staging).map_err(|e| StorageError::write(staging.display(), e))?;

        write_index_file(&self.index_file_in(staging, None), &tree.root)?;
        for (path, index) in &tree.categories {
            write_index_file(&self.index_file_in(staging, Some(path)), index)?;
        }
        Ok(())
    }
}

fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0
        || !entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Path components of `path` below `root`, or `None` if any is not UTF-8.
fn relative_segments<'a>(root: &Path, path: &'a Path) -> Option<Vec<&'a str>> {
    path.strip_prefix(root)
        .ok()?
        .iter()
        .map(|segment| segment.to_str())
        .collect()
}

fn copy_annotations(previous: &CategoryIndex, fresh: &mut CategoryIndex) {
    for entry in &mut fresh.memories {
        if let Some(old) = previous.memory(&entry.path) {
            entry.summary.clone_from(&old.summary);
        }
    }
    for entry in &mut fresh.subcategories {
        if let Some(old) = previous.subcategory(&entry.path) {
            entry.description.clone_from(&old.description);
        }
    }
}

/// Points `CURRENT` at `generation` with a single rename.
fn activate(index_root: &Path, generation: &str) -> StorageResult<()> {
    let pointer = index_root.join(CURRENT_FILE);
    let staged = index_root.join(format!("{CURRENT_FILE}{TEMP_SUFFIX}"));

    fs::write(&staged, format!("{generation}\n"))
        .map_err(|e| StorageError::write(staged.display(), e))?;
    fs::rename(&staged, &pointer).map_err(|e| {
        let _ = fs::remove_file(&staged);
        StorageError::write(pointer.display(), e)
    })
}

fn discard(path: &Path) {
    if let Err(e) = remove_tree(path) {
        warn!(path = %path.display(), error = %e, "Failed to discard staged index tree");
    }
}

/// Removes staging directories left behind by an interrupted reindex.
fn remove_stale_staging(index_root: &Path) {
    let Ok(entries) = fs::read_dir(index_root) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_staging = path.is_dir()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(TEMP_SUFFIX));
        if is_staging {
            debug!(path = %path.display(), "Removing stale staging directory");
            discard(&path);
        }
    }
}

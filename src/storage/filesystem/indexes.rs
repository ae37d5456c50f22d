//! Index file access and incremental maintenance.

use super::{FilesystemStorage, write_file};
use crate::models::{CategoryPath, IndexMemoryEntry, MemoryIdentity};
use crate::storage::traits::{IndexStorage, ReindexReport};
use crate::storage::{StorageError, StorageResult};
use crate::tokens::estimate_tokens;
use std::fs;
use std::io;

impl IndexStorage for FilesystemStorage {
    fn read(&self, category: Option<&CategoryPath>) -> StorageResult<Option<String>> {
        let path = self.active_index_file(category)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::read(path.display(), e)),
        }
    }

    fn write(&self, category: Option<&CategoryPath>, contents: &str) -> StorageResult<()> {
        let path = self
            .active_index_file(category)
            .map_err(|e| StorageError::write(super::describe(category), e))?;
        write_file(&path, contents)
    }

    fn reindex(&self) -> StorageResult<ReindexReport> {
        self.rebuild_indexes()
    }

    fn update_after_memory_write(
        &self,
        identity: &MemoryIdentity,
        contents: &str,
    ) -> StorageResult<()> {
        self.apply_memory_write(identity, contents)
            .map_err(|e| StorageError::IndexUpdateFailed {
                path: identity.slug_path(),
                cause: e.to_string(),
            })
    }
}

impl FilesystemStorage {
    fn apply_memory_write(&self, identity: &MemoryIdentity, contents: &str) -> StorageResult<()> {
        let category = identity.category();
        let path = identity.slug_path();

        let mut index = self.load_index(Some(category))?;
        let summary = index.memory(&path).and_then(|entry| entry.summary.clone());
        index.upsert_memory(IndexMemoryEntry {
            path,
            token_estimate: estimate_tokens(contents),
            summary,
        });
        self.store_index(Some(category), &index)?;

        // Roll the direct count of each ancestor up into its parent, leaf to root.
        let mut count = index.memories.len();
        for ancestor in category.ancestors() {
            if ancestor != *category {
                count = self.load_index(Some(&ancestor))?.memories.len();
            }
            let parent = ancestor.parent();
            let mut parent_index = self.load_index(parent.as_ref())?;
            parent_index.upsert_subcategory(&ancestor.to_string(), count);
            self.store_index(parent.as_ref(), &parent_index)?;
        }

        tracing::debug!(path = %identity, "Updated indexes after memory write");
        Ok(())
    }
}

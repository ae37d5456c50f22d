//! Category directory access and typed index edits.

use super::{FilesystemStorage, remove_tree};
use crate::models::{CategoryIndex, CategoryPath};
use crate::storage::traits::CategoryStorage;
use crate::storage::{StorageError, StorageResult};
use std::fs;

impl CategoryStorage for FilesystemStorage {
    fn category_exists(&self, category: &CategoryPath) -> StorageResult<bool> {
        Ok(self.category_dir(category)?.is_dir())
    }

    fn read_category_index(&self, category: Option<&CategoryPath>) -> StorageResult<CategoryIndex> {
        self.load_index(category)
    }

    fn write_category_index(
        &self,
        category: Option<&CategoryPath>,
        index: &CategoryIndex,
    ) -> StorageResult<()> {
        self.store_index(category, index)
    }

    fn ensure_category_directory(&self, category: &CategoryPath) -> StorageResult<()> {
        let dir = self
            .category_dir(category)
            .map_err(|e| StorageError::write(category, e))?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::write(dir.display(), e))
    }

    fn delete_category_directory(&self, category: &CategoryPath) -> StorageResult<()> {
        let dir = self
            .category_dir(category)
            .map_err(|e| StorageError::write(category, e))?;
        remove_tree(&dir)?;

        let index_file = self
            .active_index_file(Some(category))
            .map_err(|e| StorageError::write(category, e))?;
        if let Some(index_dir) = index_file.parent() {
            remove_tree(index_dir)?;
        }

        tracing::debug!(category = %category, "Deleted category directory and indexes");
        Ok(())
    }

    fn update_subcategory_description(
        &self,
        category: &CategoryPath,
        description: Option<&str>,
    ) -> StorageResult<()> {
        let memory_count = self.load_index(Some(category))?.memories.len();
        let parent = category.parent();

        let mut parent_index = self.load_index(parent.as_ref())?;
        parent_index.set_subcategory_description(
            &category.to_string(),
            memory_count,
            description.map(ToString::to_string),
        );
        self.store_index(parent.as_ref(), &parent_index)
    }

    fn remove_subcategory_entry(&self, category: &CategoryPath) -> StorageResult<()> {
        let parent = category.parent();
        let mut parent_index = self.load_index(parent.as_ref())?;
        if parent_index.remove_subcategory(&category.to_string()) {
            self.store_index(parent.as_ref(), &parent_index)?;
        }
        Ok(())
    }
}

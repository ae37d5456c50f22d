//! Filesystem storage adapter.
//!
//! Layout under a store root `R`:
//!
//! ```text
//! R/
//! ├── project/
//! │   ├── setup.md                  memory project/setup
//! │   └── decisions/
//! │       └── storage-layout.md     memory project/decisions/storage-layout
//! └── .index/
//!     ├── CURRENT                   name of the active generation
//!     └── gen-<id>/
//!         ├── index.yml             store root index (root categories)
//!         └── project/
//!             ├── index.yml         index of project
//!             └── decisions/
//!                 └── index.yml     index of project/decisions
//! ```
//!
//! Without a `CURRENT` file the generation `live` is active, so a store that
//! was never reindexed still has a well-defined index location.
//!
//! # Security
//!
//! Every resolved path is checked to stay under the store root. Slug grammar
//! already rules out `..` and separators; the prefix check backs it up for
//! paths that reach the adapter from other sources.

mod categories;
mod indexes;
mod memories;
mod registry;
mod reindex;

pub use registry::FilesystemStoreRegistry;

use crate::codec;
use crate::models::{CategoryIndex, CategoryPath, MemoryIdentity};
use crate::storage::traits::{
    CategoryStorage, IndexStorage, MemoryStorage, StoragePort, StoreRegistryStorage,
};
use crate::storage::{StorageError, StorageResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the hidden directory holding index generations.
pub const INDEX_DIR: &str = ".index";

/// Pointer file naming the active generation.
pub const CURRENT_FILE: &str = "CURRENT";

/// Generation used when no pointer file exists.
pub const DEFAULT_GENERATION: &str = "live";

/// Default memory file extension.
pub const DEFAULT_MEMORY_EXTENSION: &str = ".md";

/// Default index file extension.
pub const DEFAULT_INDEX_EXTENSION: &str = ".yml";

const INDEX_FILE_STEM: &str = "index";

/// Maximum size of a memory file (1MB).
const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Configuration for a filesystem store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemStorageConfig {
    /// Store root directory.
    pub root: PathBuf,
    /// Memory file extension, including the leading dot.
    pub memory_extension: String,
    /// Index file extension, including the leading dot.
    pub index_extension: String,
}

impl FilesystemStorageConfig {
    /// Creates a configuration with the default extensions.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            memory_extension: DEFAULT_MEMORY_EXTENSION.to_string(),
            index_extension: DEFAULT_INDEX_EXTENSION.to_string(),
        }
    }

    /// Sets the memory file extension. A missing leading dot is added.
    #[must_use]
    pub fn with_memory_extension(mut self, extension: &str) -> Self {
        self.memory_extension = normalize_extension(extension);
        self
    }

    /// Sets the index file extension. A missing leading dot is added.
    #[must_use]
    pub fn with_index_extension(mut self, extension: &str) -> Self {
        self.index_extension = normalize_extension(extension);
        self
    }
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

/// Filesystem implementation of every storage capability group.
pub struct FilesystemStorage {
    config: FilesystemStorageConfig,
    registry: FilesystemStoreRegistry,
}

impl FilesystemStorage {
    /// Creates a storage adapter for the store described by `config`, with the
    /// store registry persisted at `registry_path`.
    ///
    /// The root directory is created on first write, not here.
    #[must_use]
    pub fn new(config: FilesystemStorageConfig, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            registry: FilesystemStoreRegistry::new(registry_path),
        }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Returns the adapter configuration.
    #[must_use]
    pub const fn config(&self) -> &FilesystemStorageConfig {
        &self.config
    }

    /// Returns the hidden index root.
    #[must_use]
    pub fn index_root(&self) -> PathBuf {
        self.config.root.join(INDEX_DIR)
    }

    /// Returns the directory of a category.
    fn category_dir(&self, category: &CategoryPath) -> StorageResult<PathBuf> {
        let dir = join_segments(&self.config.root, category);
        ensure_inside(&dir, &self.config.root)
            .map_err(|cause| StorageError::read(category, cause))?;
        Ok(dir)
    }

    /// Returns the file of a memory.
    fn memory_path(&self, identity: &MemoryIdentity) -> StorageResult<PathBuf> {
        let path = join_segments(&self.config.root, identity.category()).join(format!(
            "{}{}",
            identity.slug(),
            self.config.memory_extension
        ));
        ensure_inside(&path, &self.config.root)
            .map_err(|cause| StorageError::read(identity, cause))?;
        Ok(path)
    }

    /// Returns the index file of `category` inside a generation directory.
    fn index_file_in(&self, generation_dir: &Path, category: Option<&CategoryPath>) -> PathBuf {
        let dir = category.map_or_else(
            || generation_dir.to_path_buf(),
            |category| join_segments(generation_dir, category),
        );
        dir.join(format!("{INDEX_FILE_STEM}{}", self.config.index_extension))
    }

    /// Returns the directory of the active generation.
    fn active_generation_dir(&self) -> StorageResult<PathBuf> {
        Ok(self.index_root().join(self.active_generation()?))
    }

    /// Returns the index file of `category` in the active generation.
    fn active_index_file(&self, category: Option<&CategoryPath>) -> StorageResult<PathBuf> {
        let generation_dir = self.active_generation_dir()?;
        let path = self.index_file_in(&generation_dir, category);
        ensure_inside(&path, &self.index_root())
            .map_err(|cause| StorageError::read(path.display(), cause))?;
        Ok(path)
    }

    /// Reads the name of the active generation.
    fn active_generation(&self) -> StorageResult<String> {
        let pointer = self.index_root().join(CURRENT_FILE);
        let name = match fs::read_to_string(&pointer) {
            Ok(name) => name.trim().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(DEFAULT_GENERATION.to_string());
            },
            Err(e) => return Err(StorageError::read(pointer.display(), e)),
        };

        if !is_generation_name(&name) {
            return Err(StorageError::read(
                pointer.display(),
                format!("invalid generation name '{name}'"),
            ));
        }
        Ok(name)
    }

    /// Reads and parses an index from the active generation.
    fn load_index(&self, category: Option<&CategoryPath>) -> StorageResult<CategoryIndex> {
        let path = self.active_index_file(category)?;
        read_index_file(&path)
    }

    /// Serializes and writes an index into the active generation.
    fn store_index(
        &self,
        category: Option<&CategoryPath>,
        index: &CategoryIndex,
    ) -> StorageResult<()> {
        let path = self
            .active_index_file(category)
            .map_err(|e| StorageError::write(describe(category), e))?;
        write_index_file(&path, index)
    }
}

impl StoragePort for FilesystemStorage {
    fn memories(&self) -> &dyn MemoryStorage {
        self
    }

    fn indexes(&self) -> &dyn IndexStorage {
        self
    }

    fn categories(&self) -> &dyn CategoryStorage {
        self
    }

    fn registry(&self) -> &dyn StoreRegistryStorage {
        &self.registry
    }
}

fn ensure_inside(path: &Path, base: &Path) -> Result<(), String> {
    if path.starts_with(base) {
        Ok(())
    } else {
        Err(format!("path escapes {}", base.display()))
    }
}

fn join_segments(base: &Path, category: &CategoryPath) -> PathBuf {
    category
        .segments()
        .iter()
        .fold(base.to_path_buf(), |path, segment| path.join(segment.as_str()))
}

/// Display name for an index location.
fn describe(category: Option<&CategoryPath>) -> String {
    category.map_or_else(|| "<root>".to_string(), ToString::to_string)
}

/// Generation names are plain file names: alphanumerics, `-`, and `_`.
fn is_generation_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reads an index file. A missing file is the empty index.
fn read_index_file(path: &Path) -> StorageResult<CategoryIndex> {
    match fs::read_to_string(path) {
        Ok(text) => {
            codec::index::parse(&text).map_err(|e| StorageError::read(path.display(), e))
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CategoryIndex::new()),
        Err(e) => Err(StorageError::read(path.display(), e)),
    }
}

/// Serializes an index and writes it to `path`.
fn write_index_file(path: &Path, index: &CategoryIndex) -> StorageResult<()> {
    let text = codec::index::serialize(index).map_err(|e| StorageError::write(path.display(), e))?;
    write_file(path, &text)
}

/// Writes a file, creating parent directories.
fn write_file(path: &Path, contents: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::write(parent.display(), e))?;
    }
    fs::write(path, contents).map_err(|e| StorageError::write(path.display(), e))
}

/// Removes a directory tree. A missing directory is not an error.
fn remove_tree(path: &Path) -> StorageResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::write(path.display(), e)),
    }
}

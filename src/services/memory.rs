//! Memory operations.
//!
//! Create, read, update, move, remove, and list memories. Every mutation
//! leaves the category indexes consistent: writes go through the incremental
//! index update, moves and removals trigger a full reindex.

use super::record_operation;
use crate::codec::{IndexCodecError, MemoryCodecError, frontmatter, index};
use crate::gc::{ExpirationService, PruneOptions, PruneResult};
use crate::models::{
    CategoryIndex, CategoryPath, IdentityError, IndexMemoryEntry, IndexSubcategoryEntry, Memory,
    MemoryIdentity, MemoryMetadata, parse_category_path, validate_memory_slug_path,
};
use crate::observability::OperationContext;
use crate::storage::{StorageError, StoragePort};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const OPERATIONS_METRIC: &str = "cortex_memory_operations_total";

/// Errors raised by memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The memory or category path failed validation.
    #[error("invalid path '{path}': {source}")]
    InvalidPath {
        /// The path as supplied.
        path: String,
        /// The validation failure.
        source: IdentityError,
    },

    /// The request is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No memory is stored at the path.
    #[error("memory not found: {path}")]
    NotFound {
        /// The requested path.
        path: String,
    },

    /// The memory exists but has expired.
    #[error("memory has expired: {path}")]
    Expired {
        /// The requested path.
        path: String,
    },

    /// A move target is already occupied.
    #[error("destination already exists: {path}")]
    DestinationExists {
        /// The move target.
        path: String,
    },

    /// The storage adapter failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored memory file does not parse.
    #[error("stored memory '{path}' is unreadable: {source}")]
    CorruptMemory {
        /// The memory path.
        path: String,
        /// The codec failure.
        source: MemoryCodecError,
    },

    /// A stored index file does not parse.
    #[error("index of '{category}' is unreadable: {source}")]
    CorruptIndex {
        /// The category whose index failed.
        category: String,
        /// The codec failure.
        source: IndexCodecError,
    },
}

impl MemoryError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound { .. } => "MEMORY_NOT_FOUND",
            Self::Expired { .. } => "MEMORY_EXPIRED",
            Self::DestinationExists { .. } => "DESTINATION_EXISTS",
            Self::Storage(_) | Self::CorruptMemory { .. } | Self::CorruptIndex { .. } => {
                "STORAGE_ERROR"
            },
        }
    }

    /// Structured context for error payloads.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidPath { path, source } => {
                Some(json!({ "path": path, "cause_code": source.code() }))
            },
            Self::InvalidInput(_) => None,
            Self::NotFound { path } | Self::Expired { path } | Self::DestinationExists { path } => {
                Some(json!({ "path": path }))
            },
            Self::Storage(e) => Some(json!({ "storage_code": e.code() })),
            Self::CorruptMemory { path, source } => {
                Some(json!({ "path": path, "cause_code": source.code() }))
            },
            Self::CorruptIndex { category, source } => {
                Some(json!({
                    "category": category,
                    "cause_code": source.code(),
                    "line": source.line(),
                }))
            },
        }
    }
}

/// Input for [`MemoryService::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateMemoryInput {
    /// Memory body.
    pub content: String,
    /// Tags in order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Origin of the memory.
    pub source: String,
    /// Optional expiration.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateMemoryInput {
    /// Creates an input with no tags and no expiry.
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            source: source.into(),
            expires_at: None,
        }
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the expiration.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Input for [`MemoryService::update`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateMemoryInput {
    /// Replacement body.
    #[serde(default)]
    pub content: Option<String>,
    /// Replacement tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// New expiration.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Removes the expiration. Takes precedence over `expires_at`.
    #[serde(default)]
    pub clear_expiry: bool,
}

impl UpdateMemoryInput {
    /// Replaces the content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Sets a new expiration.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Clears the expiration.
    #[must_use]
    pub const fn clearing_expiry(mut self) -> Self {
        self.clear_expiry = true;
        self
    }

    const fn is_empty(&self) -> bool {
        self.content.is_none() && self.tags.is_none() && self.expires_at.is_none() && !self.clear_expiry
    }
}

/// Options for [`MemoryService::get`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetMemoryOptions {
    /// Return the memory even if it has expired.
    pub include_expired: bool,
}

/// Options for [`MemoryService::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListMemoriesOptions {
    /// Include expired memories in the listing.
    pub include_expired: bool,
}

/// A memory together with its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRecord {
    /// Full slug path.
    pub path: String,
    /// The stored memory.
    #[serde(flatten)]
    pub memory: Memory,
}

/// Outcome of [`MemoryService::move_memory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedMemory {
    /// Previous path.
    pub from: String,
    /// New path.
    pub to: String,
}

/// Outcome of [`MemoryService::remove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedMemory {
    /// Path of the removed memory.
    pub path: String,
}

/// A memory as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedMemory {
    /// Full slug path.
    pub path: String,
    /// Token estimate from the index.
    pub token_estimate: usize,
    /// Summary from the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Frontmatter of the stored file.
    #[serde(flatten)]
    pub metadata: MemoryMetadata,
    /// Whether the memory had expired at listing time.
    pub expired: bool,
}

/// Result of [`MemoryService::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMemoriesResult {
    /// The listed category, `None` for the store root.
    pub category: Option<String>,
    /// Memories that resolved from the index.
    pub memories: Vec<ListedMemory>,
    /// Immediate subcategories.
    pub subcategories: Vec<IndexSubcategoryEntry>,
}

/// Service for memory lifecycle operations.
pub struct MemoryService {
    storage: Arc<dyn StoragePort>,
}

impl MemoryService {
    /// Creates a memory service over a storage port.
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Writes a new memory, replacing any memory already stored at `path`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidPath`] if `path` is not a valid slug path
    /// - [`MemoryError::InvalidInput`] for an empty source or empty tags
    /// - [`MemoryError::Storage`] if the file or indexes cannot be written
    #[instrument(
        name = "cortex.memory.create",
        skip(self, ctx, input),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn create(
        &self,
        ctx: &OperationContext,
        path: &str,
        input: CreateMemoryInput,
    ) -> Result<MemoryRecord, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<MemoryRecord, MemoryError> {
            let identity = parse_identity(path)?;
            if input.source.trim().is_empty() {
                return Err(MemoryError::InvalidInput(
                    "source must be a non-empty string".to_string(),
                ));
            }

            let metadata = MemoryMetadata::new(input.source, timestamp(ctx))
                .with_tags(input.tags)
                .with_expires_at(input.expires_at);
            let memory = Memory::new(metadata, input.content);
            self.store(&identity, &memory)?;

            debug!(path = %identity, "Memory created");
            Ok(MemoryRecord {
                path: identity.slug_path(),
                memory,
            })
        })();

        record_operation(OPERATIONS_METRIC, "create", &result, start);
        result
    }

    /// Reads a memory.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NotFound`] if nothing is stored at `path`
    /// - [`MemoryError::Expired`] if the memory has expired and
    ///   `include_expired` is not set
    /// - [`MemoryError::CorruptMemory`] if the stored file does not parse
    #[instrument(
        name = "cortex.memory.get",
        skip(self, ctx, options),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn get(
        &self,
        ctx: &OperationContext,
        path: &str,
        options: GetMemoryOptions,
    ) -> Result<MemoryRecord, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<MemoryRecord, MemoryError> {
            let identity = parse_identity(path)?;
            let memory = self.load(&identity)?;
            if !options.include_expired && memory.is_expired(ctx.now()) {
                return Err(MemoryError::Expired {
                    path: identity.slug_path(),
                });
            }
            Ok(MemoryRecord {
                path: identity.slug_path(),
                memory,
            })
        })();

        record_operation(OPERATIONS_METRIC, "get", &result, start);
        result
    }

    /// Applies a partial update. `created_at` is preserved and `updated_at`
    /// set to the context time.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidInput`] if no field is supplied
    /// - [`MemoryError::NotFound`] if nothing is stored at `path`
    /// - [`MemoryError::CorruptMemory`] if the stored file does not parse
    #[instrument(
        name = "cortex.memory.update",
        skip(self, ctx, input),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn update(
        &self,
        ctx: &OperationContext,
        path: &str,
        input: UpdateMemoryInput,
    ) -> Result<MemoryRecord, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<MemoryRecord, MemoryError> {
            let identity = parse_identity(path)?;
            if input.is_empty() {
                return Err(MemoryError::InvalidInput(
                    "at least one of content, tags, expires_at or clear_expiry is required"
                        .to_string(),
                ));
            }

            let mut memory = self.load(&identity)?;
            if let Some(content) = input.content {
                memory.content = content;
            }
            if let Some(tags) = input.tags {
                memory.metadata.tags = tags;
            }
            if input.clear_expiry {
                memory.metadata.expires_at = None;
            } else if let Some(expires_at) = input.expires_at {
                memory.metadata.expires_at = Some(expires_at);
            }
            memory.metadata.updated_at = timestamp(ctx);
            self.store(&identity, &memory)?;

            debug!(path = %identity, "Memory updated");
            Ok(MemoryRecord {
                path: identity.slug_path(),
                memory,
            })
        })();

        record_operation(OPERATIONS_METRIC, "update", &result, start);
        result
    }

    /// Moves a memory to a new path and reindexes.
    ///
    /// Moving a memory onto itself succeeds without touching storage.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NotFound`] if nothing is stored at `from`
    /// - [`MemoryError::DestinationExists`] if `to` is occupied; neither file
    ///   is modified
    #[instrument(
        name = "cortex.memory.move",
        skip(self, ctx),
        fields(request_id = %ctx.request_id(), from = %from, to = %to)
    )]
    pub fn move_memory(
        &self,
        ctx: &OperationContext,
        from: &str,
        to: &str,
    ) -> Result<MovedMemory, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<MovedMemory, MemoryError> {
            let source = parse_identity(from)?;
            let destination = parse_identity(to)?;
            let moved = MovedMemory {
                from: source.slug_path(),
                to: destination.slug_path(),
            };
            if source == destination {
                debug!(path = %source, "Move onto itself, nothing to do");
                return Ok(moved);
            }

            let memories = self.storage.memories();
            if memories.read(&source)?.is_none() {
                return Err(MemoryError::NotFound { path: moved.from });
            }
            if memories.read(&destination)?.is_some() {
                return Err(MemoryError::DestinationExists { path: moved.to });
            }

            self.storage
                .categories()
                .ensure_category_directory(destination.category())?;
            memories.move_memory(&source, &destination)?;
            self.storage.indexes().reindex()?;

            debug!(from = %source, to = %destination, "Memory moved");
            Ok(moved)
        })();

        record_operation(OPERATIONS_METRIC, "move", &result, start);
        result
    }

    /// Deletes a memory and reindexes.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::NotFound`] if nothing is stored at `path`
    #[instrument(
        name = "cortex.memory.remove",
        skip(self, ctx),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn remove(&self, ctx: &OperationContext, path: &str) -> Result<RemovedMemory, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<RemovedMemory, MemoryError> {
            let identity = parse_identity(path)?;
            let memories = self.storage.memories();
            if memories.read(&identity)?.is_none() {
                return Err(MemoryError::NotFound {
                    path: identity.slug_path(),
                });
            }
            memories.remove(&identity)?;
            self.storage.indexes().reindex()?;

            debug!(path = %identity, "Memory removed");
            Ok(RemovedMemory {
                path: identity.slug_path(),
            })
        })();

        record_operation(OPERATIONS_METRIC, "remove", &result, start);
        result
    }

    /// Lists the memories and subcategories of a category.
    ///
    /// With no category the store root is listed: its subcategories are the
    /// root categories and its memories are those stored directly in each root
    /// category. Index entries whose file is missing or unreadable are skipped.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidPath`] if `category` is not a valid path
    /// - [`MemoryError::CorruptIndex`] if an index file does not parse
    #[instrument(
        name = "cortex.memory.list",
        skip(self, ctx, options),
        fields(request_id = %ctx.request_id(), category = ?category)
    )]
    pub fn list(
        &self,
        ctx: &OperationContext,
        category: Option<&str>,
        options: ListMemoriesOptions,
    ) -> Result<ListMemoriesResult, MemoryError> {
        let start = Instant::now();

        let result = (|| -> Result<ListMemoriesResult, MemoryError> {
            let category = category
                .map(|raw| {
                    parse_category_path(raw).map_err(|source| MemoryError::InvalidPath {
                        path: raw.to_string(),
                        source,
                    })
                })
                .transpose()?;

            let listing = self.read_index(category.as_ref())?;
            let entries = if category.is_some() {
                listing.memories
            } else {
                let mut entries = listing.memories;
                for root in &listing.subcategories {
                    let Ok(root_path) = parse_category_path(&root.path) else {
                        debug!(category = %root.path, "Skipping invalid root index entry");
                        continue;
                    };
                    entries.extend(self.read_index(Some(&root_path))?.memories);
                }
                entries
            };

            let now = ctx.now();
            let mut memories = Vec::with_capacity(entries.len());
            for entry in entries {
                let Some(listed) = self.resolve(entry, now) else {
                    continue;
                };
                if listed.expired && !options.include_expired {
                    continue;
                }
                memories.push(listed);
            }

            Ok(ListMemoriesResult {
                category: category.map(|c| c.to_string()),
                memories,
                subcategories: listing.subcategories,
            })
        })();

        record_operation(OPERATIONS_METRIC, "list", &result, start);
        result
    }

    /// Deletes every expired memory in the store.
    ///
    /// # Errors
    ///
    /// See [`ExpirationService::prune`].
    pub fn prune_expired(
        &self,
        ctx: &OperationContext,
        options: PruneOptions,
    ) -> Result<PruneResult, MemoryError> {
        ExpirationService::new(Arc::clone(&self.storage)).prune(ctx, options)
    }

    fn load(&self, identity: &MemoryIdentity) -> Result<Memory, MemoryError> {
        let raw = self
            .storage
            .memories()
            .read(identity)?
            .ok_or_else(|| MemoryError::NotFound {
                path: identity.slug_path(),
            })?;
        frontmatter::parse(&raw).map_err(|source| MemoryError::CorruptMemory {
            path: identity.slug_path(),
            source,
        })
    }

    fn store(&self, identity: &MemoryIdentity, memory: &Memory) -> Result<(), MemoryError> {
        let raw =
            frontmatter::serialize(memory).map_err(|e| MemoryError::InvalidInput(e.to_string()))?;
        self.storage.memories().write(identity, &raw)?;
        self.storage
            .indexes()
            .update_after_memory_write(identity, &raw)?;
        Ok(())
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

    /// Loads the memory behind an index entry, or `None` if it cannot be read.
    fn resolve(&self, entry: IndexMemoryEntry, now: DateTime<Utc>) -> Option<ListedMemory> {
        let Ok(identity) = validate_memory_slug_path(&entry.path) else {
            debug!(path = %entry.path, "Skipping index entry with invalid path");
            return None;
        };
        let raw = match self.storage.memories().read(&identity) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(path = %entry.path, "Skipping index entry without a memory file");
                return None;
            },
            Err(e) => {
                warn!(path = %entry.path, error = %e, "Skipping memory file that cannot be read");
                return None;
            },
        };
        let memory = match frontmatter::parse(&raw) {
            Ok(memory) => memory,
            Err(e) => {
                debug!(path = %entry.path, error = %e, "Skipping unreadable memory");
                return None;
            },
        };

        let expired = memory.is_expired(now);
        Some(ListedMemory {
            path: entry.path,
            token_estimate: entry.token_estimate,
            summary: entry.summary,
            metadata: memory.metadata,
            expired,
        })
    }
}

fn parse_identity(path: &str) -> Result<MemoryIdentity, MemoryError> {
    validate_memory_slug_path(path).map_err(|source| MemoryError::InvalidPath {
        path: path.to_string(),
        source,
    })
}

/// Stored timestamps carry millisecond precision.
fn timestamp(ctx: &OperationContext) -> DateTime<Utc> {
    ctx.now().trunc_subsecs(3)
}

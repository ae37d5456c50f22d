//! Category operations with mode-based protection.
//!
//! | Mode | Create | Delete | Describe |
//! |------|--------|--------|----------|
//! | `free` | anything | any non-root | anything |
//! | `subcategories` | under a declared root | undeclared non-root | under a declared root |
//! | `strict` | never | never | declared only |
//!
//! Root (depth-1) categories can never be deleted through this service,
//! whatever the mode.

use super::record_operation;
use crate::models::{
    CategoryMode, CategoryPath, DeclaredCategories, IdentityError, StoreDefinition,
    parse_category_path,
};
use crate::observability::OperationContext;
use crate::storage::{StorageError, StoragePort};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Longest accepted description, in characters, after trimming.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

const OPERATIONS_METRIC: &str = "cortex_category_operations_total";

/// Errors raised by category operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    /// The category path failed validation.
    #[error(transparent)]
    InvalidPath(#[from] IdentityError),

    /// The category directory does not exist.
    #[error("category not found: {path}")]
    NotFound {
        /// The requested category.
        path: String,
    },

    /// Root categories cannot be deleted.
    #[error("root category '{path}' cannot be deleted")]
    RootCategoryRejected {
        /// The requested category.
        path: String,
    },

    /// The store only allows root categories declared in its configuration.
    #[error("root category '{root}' is not declared for this store")]
    RootCategoryNotAllowed {
        /// The requested category.
        path: String,
        /// Its undeclared root.
        root: String,
    },

    /// The store's category mode forbids the change.
    #[error("category '{path}' is protected in {mode} mode")]
    Protected {
        /// The requested category.
        path: String,
        /// The store's mode.
        mode: CategoryMode,
    },

    /// The description is longer than [`MAX_DESCRIPTION_LENGTH`].
    #[error("description is {length} characters, maximum is {max}")]
    DescriptionTooLong {
        /// Trimmed length in characters.
        length: usize,
        /// The limit.
        max: usize,
    },

    /// The storage adapter failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CategoryError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath(e) => e.code(),
            Self::NotFound { .. } => "CATEGORY_NOT_FOUND",
            Self::RootCategoryRejected { .. } => "ROOT_CATEGORY_REJECTED",
            Self::RootCategoryNotAllowed { .. } => "ROOT_CATEGORY_NOT_ALLOWED",
            Self::Protected { .. } => "CATEGORY_PROTECTED",
            Self::DescriptionTooLong { .. } => "DESCRIPTION_TOO_LONG",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Structured context for error payloads.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidPath(_) => None,
            Self::NotFound { path } | Self::RootCategoryRejected { path } => {
                Some(json!({ "path": path }))
            },
            Self::RootCategoryNotAllowed { path, root } => {
                Some(json!({ "path": path, "root": root }))
            },
            Self::Protected { path, mode } => {
                Some(json!({ "path": path, "mode": mode.as_str() }))
            },
            Self::DescriptionTooLong { length, max } => {
                Some(json!({ "length": length, "max": max }))
            },
            Self::Storage(e) => Some(json!({ "storage_code": e.code() })),
        }
    }
}

/// Outcome of [`CategoryService::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCreated {
    /// Normalized category path.
    pub path: String,
    /// `false` if the category already existed.
    pub created: bool,
}

/// Outcome of [`CategoryService::set_description`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDescribed {
    /// Normalized category path.
    pub path: String,
    /// The stored description, `None` once cleared.
    pub description: Option<String>,
}

/// Outcome of [`CategoryService::delete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDeleted {
    /// Normalized category path.
    pub path: String,
    /// Always `true` on success.
    pub deleted: bool,
}

/// Outcome of [`CategoryService::sync_declared_categories`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Categories whose directories were created.
    pub created: Vec<String>,
    /// Number of configured descriptions written.
    pub described: usize,
}

/// The protection rules of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPolicy {
    mode: CategoryMode,
    declared: DeclaredCategories,
}

impl CategoryPolicy {
    /// Creates a policy from a mode and its declared categories.
    #[must_use]
    pub const fn new(mode: CategoryMode, declared: DeclaredCategories) -> Self {
        Self { mode, declared }
    }

    /// A policy with no restrictions.
    #[must_use]
    pub fn free() -> Self {
        Self::default()
    }

    /// Reads the mode and declared categories of a registered store.
    #[must_use]
    pub fn from_store(store: &StoreDefinition) -> Self {
        Self::new(store.category_mode, store.declared_categories())
    }

    /// Returns the mode.
    #[must_use]
    pub const fn mode(&self) -> CategoryMode {
        self.mode
    }

    /// Returns the declared categories.
    #[must_use]
    pub const fn declared(&self) -> &DeclaredCategories {
        &self.declared
    }

    /// Subcategories mode allows any path under a declared root, including a
    /// declared category that does not exist on disk yet.
    fn check_create(&self, path: &CategoryPath) -> Result<(), CategoryError> {
        match self.mode {
            CategoryMode::Free => Ok(()),
            CategoryMode::Strict => Err(self.protected(path)),
            CategoryMode::Subcategories => {
                if self.declared.has_declared_root(path) {
                    Ok(())
                } else {
                    Err(CategoryError::RootCategoryNotAllowed {
                        path: path.to_string(),
                        root: path.root().to_string(),
                    })
                }
            },
        }
    }

    fn check_delete(&self, path: &CategoryPath) -> Result<(), CategoryError> {
        match self.mode {
            CategoryMode::Free => Ok(()),
            CategoryMode::Strict => Err(self.protected(path)),
            CategoryMode::Subcategories if self.declared.is_declared(path) => {
                Err(self.protected(path))
            },
            CategoryMode::Subcategories => Ok(()),
        }
    }

    fn check_describe(&self, path: &CategoryPath) -> Result<(), CategoryError> {
        let allowed = match self.mode {
            CategoryMode::Free => true,
            CategoryMode::Subcategories => self.declared.has_declared_root(path),
            CategoryMode::Strict => self.declared.is_declared(path),
        };
        if allowed {
            Ok(())
        } else {
            Err(self.protected(path))
        }
    }

    fn protected(&self, path: &CategoryPath) -> CategoryError {
        CategoryError::Protected {
            path: path.to_string(),
            mode: self.mode,
        }
    }
}

/// Service for category lifecycle operations.
pub struct CategoryService {
    storage: Arc<dyn StoragePort>,
    policy: CategoryPolicy,
}

impl CategoryService {
    /// Creates a category service enforcing `policy`.
    #[must_use]
    pub fn new(storage: Arc<dyn StoragePort>, policy: CategoryPolicy) -> Self {
        Self { storage, policy }
    }

    /// Returns the enforced policy.
    #[must_use]
    pub const fn policy(&self) -> &CategoryPolicy {
        &self.policy
    }

    /// Creates a category and any missing ancestors.
    ///
    /// Idempotent: an existing category reports `created: false` and keeps its
    /// description.
    ///
    /// # Errors
    ///
    /// - [`CategoryError::InvalidPath`] if `path` fails validation
    /// - [`CategoryError::Protected`] in strict mode
    /// - [`CategoryError::RootCategoryNotAllowed`] for an undeclared root in
    ///   subcategories mode
    #[instrument(
        name = "cortex.category.create",
        skip(self, ctx),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn create(
        &self,
        ctx: &OperationContext,
        path: &str,
    ) -> Result<CategoryCreated, CategoryError> {
        let start = Instant::now();

        let result = (|| -> Result<CategoryCreated, CategoryError> {
            let category = parse_category_path(path)?;
            self.policy.check_create(&category)?;
            let created = self.materialize(&category)?;
            Ok(CategoryCreated {
                path: category.to_string(),
                created,
            })
        })();

        record_operation(OPERATIONS_METRIC, "create", &result, start);
        result
    }

    /// Sets or clears a category description.
    ///
    /// The text is trimmed; an empty result clears the description. The
    /// description lives in the parent's index, or the store root index for a
    /// root category.
    ///
    /// # Errors
    ///
    /// - [`CategoryError::DescriptionTooLong`] above [`MAX_DESCRIPTION_LENGTH`]
    /// - [`CategoryError::Protected`] if the mode forbids describing `path`
    /// - [`CategoryError::NotFound`] if the category does not exist
    #[instrument(
        name = "cortex.category.set_description",
        skip(self, ctx, description),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn set_description(
        &self,
        ctx: &OperationContext,
        path: &str,
        description: &str,
    ) -> Result<CategoryDescribed, CategoryError> {
        let start = Instant::now();

        let result = (|| -> Result<CategoryDescribed, CategoryError> {
            let category = parse_category_path(path)?;
            let trimmed = description.trim();
            let length = trimmed.chars().count();
            if length > MAX_DESCRIPTION_LENGTH {
                return Err(CategoryError::DescriptionTooLong {
                    length,
                    max: MAX_DESCRIPTION_LENGTH,
                });
            }
            self.policy.check_describe(&category)?;
            self.require_existing(&category)?;

            let description = (!trimmed.is_empty()).then(|| trimmed.to_string());
            self.storage
                .categories()
                .update_subcategory_description(&category, description.as_deref())?;

            debug!(category = %category, cleared = description.is_none(), "Category description set");
            Ok(CategoryDescribed {
                path: category.to_string(),
                description,
            })
        })();

        record_operation(OPERATIONS_METRIC, "set_description", &result, start);
        result
    }

    /// Deletes a non-root category with everything beneath it.
    ///
    /// # Errors
    ///
    /// - [`CategoryError::RootCategoryRejected`] for any depth-1 category,
    ///   before the mode is consulted
    /// - [`CategoryError::Protected`] if the mode forbids the deletion
    /// - [`CategoryError::NotFound`] if the category does not exist
    #[instrument(
        name = "cortex.category.delete",
        skip(self, ctx),
        fields(request_id = %ctx.request_id(), path = %path)
    )]
    pub fn delete(
        &self,
        ctx: &OperationContext,
        path: &str,
    ) -> Result<CategoryDeleted, CategoryError> {
        let start = Instant::now();

        let result = (|| -> Result<CategoryDeleted, CategoryError> {
            let category = parse_category_path(path)?;
            if category.is_root() {
                return Err(CategoryError::RootCategoryRejected {
                    path: category.to_string(),
                });
            }
            self.policy.check_delete(&category)?;
            self.require_existing(&category)?;

            let categories = self.storage.categories();
            categories.delete_category_directory(&category)?;
            categories.remove_subcategory_entry(&category)?;

            info!(category = %category, "Category deleted");
            Ok(CategoryDeleted {
                path: category.to_string(),
                deleted: true,
            })
        })();

        record_operation(OPERATIONS_METRIC, "delete", &result, start);
        result
    }

    /// Materializes every category declared for the store, writing the
    /// configured descriptions. Runs regardless of the mode.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::Storage`] if a directory or index cannot be
    /// written.
    #[instrument(
        name = "cortex.category.sync",
        skip(self, ctx),
        fields(request_id = %ctx.request_id())
    )]
    pub fn sync_declared_categories(
        &self,
        ctx: &OperationContext,
    ) -> Result<SyncReport, CategoryError> {
        let start = Instant::now();

        let result = (|| -> Result<SyncReport, CategoryError> {
            let mut report = SyncReport::default();
            for (category, description) in self.policy.declared().iter() {
                if self.materialize(category)? {
                    report.created.push(category.to_string());
                }
                if let Some(description) = description {
                    self.storage
                        .categories()
                        .update_subcategory_description(category, Some(description))?;
                    report.described += 1;
                }
            }
            Ok(report)
        })();

        record_operation(OPERATIONS_METRIC, "sync", &result, start);
        result
    }

    fn require_existing(&self, category: &CategoryPath) -> Result<(), CategoryError> {
        if self.storage.categories().category_exists(category)? {
            Ok(())
        } else {
            Err(CategoryError::NotFound {
                path: category.to_string(),
            })
        }
    }

    /// Creates missing directories root-first and makes sure every level is
    /// listed in its parent's index. Returns `true` if `category` itself was
    /// missing.
    fn materialize(&self, category: &CategoryPath) -> Result<bool, CategoryError> {
        let categories = self.storage.categories();
        if categories.category_exists(category)? {
            return Ok(false);
        }

        for level in category.ancestors().iter().rev() {
            if !categories.category_exists(level)? {
                categories.ensure_category_directory(level)?;
            }

            let parent = level.parent();
            let mut parent_index = categories.read_category_index(parent.as_ref())?;
            let key = level.to_string();
            if parent_index.subcategory(&key).is_none() {
                let memory_count = categories.read_category_index(Some(level))?.memories.len();
                parent_index.upsert_subcategory(&key, memory_count);
                categories.write_category_index(parent.as_ref(), &parent_index)?;
            }
        }

        debug!(category = %category, "Category created");
        Ok(true)
    }
}

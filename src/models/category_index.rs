//! Per-category index model.
//!
//! Each category directory owns one [`CategoryIndex`] listing the memories
//! stored directly in it and its immediate subcategories. Both lists are kept
//! sorted by path so that serialization is deterministic.
//!
//! Subcategory `memory_count` values are direct-child counts: the number of
//! memories stored directly in that subcategory, never a recursive total.

use serde::{Deserialize, Serialize};

/// A memory listed in a category index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexMemoryEntry {
    /// Full slug path of the memory.
    pub path: String,
    /// Token estimate of the stored file.
    pub token_estimate: usize,
    /// Optional one-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl IndexMemoryEntry {
    /// Creates an entry without a summary.
    #[must_use]
    pub fn new(path: impl Into<String>, token_estimate: usize) -> Self {
        Self {
            path: path.into(),
            token_estimate,
            summary: None,
        }
    }
}

/// A subcategory listed in a category index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSubcategoryEntry {
    /// Full category path of the subcategory.
    pub path: String,
    /// Number of memories stored directly in the subcategory.
    pub memory_count: usize,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IndexSubcategoryEntry {
    /// Creates an entry without a description.
    #[must_use]
    pub fn new(path: impl Into<String>, memory_count: usize) -> Self {
        Self {
            path: path.into(),
            memory_count,
            description: None,
        }
    }
}

/// The index of a single category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryIndex {
    /// Memories stored directly in the category.
    #[serde(default)]
    pub memories: Vec<IndexMemoryEntry>,
    /// Immediate subcategories.
    #[serde(default)]
    pub subcategories: Vec<IndexSubcategoryEntry>,
}

impl CategoryIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            memories: Vec::new(),
            subcategories: Vec::new(),
        }
    }

    /// Returns `true` if both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.subcategories.is_empty()
    }

    /// Sorts both lists ascending by path.
    pub fn sort(&mut self) {
        self.memories.sort_by(|a, b| a.path.cmp(&b.path));
        self.subcategories.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Returns the memory entry with `path`, if listed.
    #[must_use]
    pub fn memory(&self, path: &str) -> Option<&IndexMemoryEntry> {
        self.memories.iter().find(|entry| entry.path == path)
    }

    /// Returns the subcategory entry with `path`, if listed.
    #[must_use]
    pub fn subcategory(&self, path: &str) -> Option<&IndexSubcategoryEntry> {
        self.subcategories.iter().find(|entry| entry.path == path)
    }

    /// Replaces any entry with the same path and re-sorts.
    pub fn upsert_memory(&mut self, entry: IndexMemoryEntry) {
        self.memories.retain(|existing| existing.path != entry.path);
        self.memories.push(entry);
        self.sort();
    }

    /// Removes the memory entry with `path`. Returns `true` if one was removed.
    pub fn remove_memory(&mut self, path: &str) -> bool {
        let before = self.memories.len();
        self.memories.retain(|entry| entry.path != path);
        self.memories.len() != before
    }

    /// Sets the memory count of a subcategory, inserting the entry if missing.
    ///
    /// An existing description is left untouched.
    pub fn upsert_subcategory(&mut self, path: &str, memory_count: usize) {
        if let Some(entry) = self.subcategories.iter_mut().find(|e| e.path == path) {
            entry.memory_count = memory_count;
            return;
        }
        self.subcategories
            .push(IndexSubcategoryEntry::new(path, memory_count));
        self.sort();
    }

    /// Sets or clears a subcategory description, inserting the entry if missing.
    pub fn set_subcategory_description(
        &mut self,
        path: &str,
        memory_count: usize,
        description: Option<String>,
    ) {
        if let Some(entry) = self.subcategories.iter_mut().find(|e| e.path == path) {
            entry.description = description;
            return;
        }
        self.subcategories.push(IndexSubcategoryEntry {
            path: path.to_string(),
            memory_count,
            description,
        });
        self.sort();
    }

    /// Removes the subcategory entry with `path`. Returns `true` if one was removed.
    pub fn remove_subcategory(&mut self, path: &str) -> bool {
        let before = self.subcategories.len();
        self.subcategories.retain(|entry| entry.path != path);
        self.subcategories.len() != before
    }

    /// Total of the token estimates of the listed memories.
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.memories.iter().map(|entry| entry.token_estimate).sum()
    }
}

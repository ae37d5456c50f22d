//! Memory types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored in a memory's frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Creation timestamp. Never changes after the memory is written.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Tags in insertion order.
    pub tags: Vec<String>,
    /// Where the memory came from (`user`, `cli`, a tool name, ...).
    pub source: String,
    /// Expiration timestamp.
    ///
    /// `None` means the memory lives until removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryMetadata {
    /// Creates metadata for a memory written at `now`.
    #[must_use]
    pub fn new(source: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
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

    /// Sets the expiration timestamp.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

/// A stored memory: metadata plus free-form content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Frontmatter metadata.
    pub metadata: MemoryMetadata,
    /// The memory body.
    pub content: String,
}

impl Memory {
    /// Creates a new memory.
    #[must_use]
    pub fn new(metadata: MemoryMetadata, content: impl Into<String>) -> Self {
        Self {
            metadata,
            content: content.into(),
        }
    }

    /// Returns `true` if the memory has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.metadata.expires_at, now)
    }
}

/// Expiry check shared by reads, listings, and pruning.
///
/// The boundary is inclusive: a memory expiring exactly at `now` is expired.
#[must_use]
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expires_at| expires_at <= now)
}

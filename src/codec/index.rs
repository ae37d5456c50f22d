//! Category index codec.
//!
//! An index file is a YAML document with two lists:
//!
//! ```text
//! memories:
//! - path: project/notes/setup
//!   token_estimate: 42
//!   summary: First steps
//! subcategories:
//! - path: project/notes/deep
//!   memory_count: 3
//!   description: Deep dives
//! ```
//!
//! Empty lists are written `memories: []`. An empty document is the empty
//! index. Unknown sections and unknown entry fields are rejected.

use crate::models::CategoryIndex;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while parsing or serializing an index file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexCodecError {
    /// An entry has an unknown, duplicated, missing, or invalid field.
    #[error("invalid index entry: {reason}")]
    InvalidEntry {
        /// 1-based line number, when known.
        line: Option<usize>,
        /// What was wrong.
        reason: String,
    },

    /// The document structure is not a recognized index.
    #[error("invalid index format: {reason}")]
    InvalidFormat {
        /// 1-based line number, when known.
        line: Option<usize>,
        /// What was wrong.
        reason: String,
    },
}

impl IndexCodecError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEntry { .. } => "INVALID_ENTRY",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
        }
    }

    /// Returns the line the error was detected on, when known.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::InvalidEntry { line, .. } | Self::InvalidFormat { line, .. } => *line,
        }
    }
}

/// The document shape without entry validation.
///
/// Used to tell a structural problem from a bad entry.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct IndexShape {
    #[serde(default)]
    memories: Vec<serde_yaml_ng::Value>,
    #[serde(default)]
    subcategories: Vec<serde_yaml_ng::Value>,
}

/// Parses an index document. Entries are returned sorted by path.
///
/// # Errors
///
/// - [`IndexCodecError::InvalidFormat`] for malformed YAML, unknown or
///   duplicated sections, or a section that is not a list
/// - [`IndexCodecError::InvalidEntry`] for an entry with an unknown field, a
///   missing required field, or a value of the wrong type
///
/// # Examples
///
/// ```rust
/// use cortex::codec::index;
///
/// let index = index::parse("memories:\n- path: a/m\n  token_estimate: 3\n").unwrap();
/// assert_eq!(index.memories[0].token_estimate, 3);
/// assert!(index.subcategories.is_empty());
/// ```
pub fn parse(raw: &str) -> Result<CategoryIndex, IndexCodecError> {
    if raw.trim().is_empty() {
        return Ok(CategoryIndex::new());
    }

    match serde_yaml_ng::from_str::<CategoryIndex>(raw) {
        Ok(mut index) => {
            index.sort();
            Ok(index)
        },
        Err(entry_error) => match serde_yaml_ng::from_str::<IndexShape>(raw) {
            Ok(_) => Err(IndexCodecError::InvalidEntry {
                line: line_of(&entry_error),
                reason: entry_error.to_string(),
            }),
            Err(format_error) => Err(IndexCodecError::InvalidFormat {
                line: line_of(&format_error),
                reason: format_error.to_string(),
            }),
        },
    }
}

/// Serializes an index with both lists sorted by path.
///
/// # Errors
///
/// Returns [`IndexCodecError::InvalidFormat`] if the YAML emitter fails.
pub fn serialize(index: &CategoryIndex) -> Result<String, IndexCodecError> {
    let mut sorted = index.clone();
    sorted.sort();

    serde_yaml_ng::to_string(&sorted).map_err(|e| IndexCodecError::InvalidFormat {
        line: None,
        reason: e.to_string(),
    })
}

fn line_of(error: &serde_yaml_ng::Error) -> Option<usize> {
    error.location().map(|location| location.line())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexMemoryEntry;

    fn sample() -> CategoryIndex {
        let mut index = CategoryIndex::new();
        index.upsert_memory(IndexMemoryEntry {
            path: "project/setup".to_string(),
            token_estimate: 42,
            summary: Some("First \"steps\": quoted".to_string()),
        });
        index.upsert_memory(IndexMemoryEntry::new("project/alpha", 3));
        index.set_subcategory_description("project/deep", 2, Some("Deep dives".to_string()));
        index.upsert_subcategory("project/empty", 0);
        index
    }

    #[test]
    fn test_serialize_is_sorted_yaml() {
        let text = serialize(&sample()).unwrap();

        let alpha = text.find("project/alpha").unwrap();
        let setup = text.find("project/setup").unwrap();
        assert!(alpha < setup);
        assert!(text.starts_with("memories:\n"));
        assert!(text.contains("token_estimate: 42"));
        assert!(text.contains("memory_count: 0"));
        assert!(!text.contains("description: null"));
    }

    #[test]
    fn test_roundtrip() {
        let index = sample();
        assert_eq!(parse(&serialize(&index).unwrap()).unwrap(), index);
    }

    #[test]
    fn test_empty_lists() {
        let text = serialize(&CategoryIndex::new()).unwrap();
        assert_eq!(text, "memories: []\nsubcategories: []\n");
        assert!(parse(&text).unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
        assert!(parse("memories: []\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_accepts_indented_lists() {
        let raw = "memories:\n  - path: a/z\n    token_estimate: 1\n  - path: a/b\n    token_estimate: 2\nsubcategories: []\n";
        let index = parse(raw).unwrap();
        assert_eq!(index.memories[0].path, "a/b");
        assert_eq!(index.memories[1].path, "a/z");
    }

    #[test]
    fn test_unknown_field_rejected_with_line() {
        let raw = "memories:\n  - path: a/m\n    token_estimate: 1\n    colour: red\n";
        let err = parse(raw).unwrap_err();
        assert_eq!(err.code(), "INVALID_ENTRY");
        assert!(err.line().is_some());
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_field_from_other_section_rejected() {
        let raw = "subcategories:\n  - path: a/b\n    token_estimate: 1\n";
        assert_eq!(parse(raw).unwrap_err().code(), "INVALID_ENTRY");
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse("subcategories:\n  - path: a/b\n").unwrap_err();
        assert_eq!(err.code(), "INVALID_ENTRY");
        assert!(err.to_string().contains("memory_count"));
    }

    #[test]
    fn test_invalid_count() {
        let raw = "memories:\n  - path: a/m\n    token_estimate: -3\n";
        assert_eq!(parse(raw).unwrap_err().code(), "INVALID_ENTRY");
    }

    #[test]
    fn test_malformed_structure() {
        assert_eq!(parse("tags: []\n").unwrap_err().code(), "INVALID_FORMAT");
        assert_eq!(parse("memories: 3\n").unwrap_err().code(), "INVALID_FORMAT");
        assert_eq!(
            parse("memories: []\nmemories: []\n").unwrap_err().code(),
            "INVALID_FORMAT"
        );
        assert_eq!(
            parse("memories:\n    token_estimate: 1\n").unwrap_err().code(),
            "INVALID_FORMAT"
        );
        assert_eq!(parse("memories: [\n").unwrap_err().code(), "INVALID_FORMAT");
    }

    #[test]
    fn test_unicode_description_roundtrip() {
        let mut index = CategoryIndex::new();
        index.set_subcategory_description("a/b", 1, Some("Notizen: über\nzwei Zeilen".to_string()));
        assert_eq!(parse(&serialize(&index).unwrap()).unwrap(), index);
    }
}

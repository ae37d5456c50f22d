//! Memory file codec.
//!
//! A memory is stored as a frontmatter header followed by its content:
//!
//! ```text
//! ---
//! created_at: 2024-06-01T12:00:00.000Z
//! updated_at: 2024-06-01T12:00:00.000Z
//! tags:
//! - rust
//! - storage
//! source: user
//! expires_at: 2024-07-01T00:00:00.000Z
//! ---
//!
//! Indexes are rebuilt from memory files, never the other way round.
//! ```
//!
//! The header is a YAML mapping. Keys other than the five known ones are
//! ignored on read, duplicate keys are rejected.

use crate::models::{Memory, MemoryMetadata};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};
use thiserror::Error;

/// The frontmatter delimiter line.
pub const DELIMITER: &str = "---";

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";
const TAGS: &str = "tags";
const SOURCE: &str = "source";
const EXPIRES_AT: &str = "expires_at";

/// Errors raised while parsing or serializing a memory file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryCodecError {
    /// The header is missing, unterminated, duplicated, or malformed.
    #[error("invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    /// A required key is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp {
        /// The field holding the timestamp.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The tag list is malformed or contains an empty tag.
    #[error("invalid tags: {0}")]
    InvalidTags(String),

    /// The source is empty or whitespace.
    #[error("source must be a non-empty string")]
    InvalidSource,
}

impl MemoryCodecError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidFrontmatter(_) => "INVALID_FRONTMATTER",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Self::InvalidTags(_) => "INVALID_TAGS",
            Self::InvalidSource => "INVALID_SOURCE",
        }
    }
}

/// Header fields in file order, as written by [`serialize`].
#[derive(Serialize)]
struct Header<'a> {
    created_at: String,
    updated_at: String,
    tags: &'a [String],
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// Parses a memory file.
///
/// # Errors
///
/// Returns a [`MemoryCodecError`] describing the first problem found.
///
/// # Examples
///
/// ```rust
/// use cortex::codec::frontmatter;
///
/// let raw = "---\ncreated_at: 2024-06-01T12:00:00.000Z\nupdated_at: 2024-06-01T12:00:00.000Z\ntags: [a]\nsource: user\n---\n\nBody";
/// let memory = frontmatter::parse(raw).unwrap();
/// assert_eq!(memory.content, "Body");
/// assert_eq!(memory.metadata.tags, vec!["a".to_string()]);
/// ```
pub fn parse(raw: &str) -> Result<Memory, MemoryCodecError> {
    let (header, content) = split_document(raw)?;
    let fields = parse_header(header)?;

    let created_at = parse_timestamp(CREATED_AT, required(&fields, CREATED_AT)?)?;
    let updated_at = parse_timestamp(UPDATED_AT, required(&fields, UPDATED_AT)?)?;
    let tags = parse_tags(required(&fields, TAGS)?)?;
    let source = parse_source(required(&fields, SOURCE)?)?;
    let expires_at = match fields.get(EXPIRES_AT) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(parse_timestamp(EXPIRES_AT, value)?),
    };

    Ok(Memory {
        metadata: MemoryMetadata {
            created_at,
            updated_at,
            tags,
            source,
            expires_at,
        },
        content: content.to_string(),
    })
}

/// Serializes a memory into its file representation.
///
/// # Errors
///
/// Returns [`MemoryCodecError::InvalidTags`] for a blank tag and
/// [`MemoryCodecError::InvalidSource`] for a blank source.
pub fn serialize(memory: &Memory) -> Result<String, MemoryCodecError> {
    let metadata = &memory.metadata;

    if let Some(position) = metadata.tags.iter().position(|tag| tag.trim().is_empty()) {
        return Err(MemoryCodecError::InvalidTags(format!(
            "tag at position {position} is empty"
        )));
    }
    if metadata.source.trim().is_empty() {
        return Err(MemoryCodecError::InvalidSource);
    }

    let header = Header {
        created_at: format_timestamp(metadata.created_at),
        updated_at: format_timestamp(metadata.updated_at),
        tags: &metadata.tags,
        source: &metadata.source,
        expires_at: metadata.expires_at.map(format_timestamp),
    };
    let yaml = serde_yaml_ng::to_string(&header)
        .map_err(|e| MemoryCodecError::InvalidFrontmatter(e.to_string()))?;

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{}", memory.content))
}

/// Formats a timestamp as ISO-8601 UTC with millisecond precision.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Splits a document into its header text and content.
fn split_document(raw: &str) -> Result<(&str, &str), MemoryCodecError> {
    let mut lines = raw.split_inclusive('\n');
    let first = lines
        .next()
        .ok_or_else(|| MemoryCodecError::InvalidFrontmatter("document is empty".to_string()))?;
    if !is_delimiter(first) {
        return Err(MemoryCodecError::InvalidFrontmatter(
            "document must start with '---'".to_string(),
        ));
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if is_delimiter(line) {
            let header = &raw[header_start..offset];
            let body = &raw[offset + line.len()..];
            return Ok((header, strip_blank_line(body)));
        }
        offset += line.len();
    }

    Err(MemoryCodecError::InvalidFrontmatter(
        "missing closing '---'".to_string(),
    ))
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Strips exactly one leading blank line.
fn strip_blank_line(body: &str) -> &str {
    body.strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body)
}

fn parse_header(header: &str) -> Result<Mapping, MemoryCodecError> {
    if header.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml_ng::from_str(header).map_err(|e| MemoryCodecError::InvalidFrontmatter(e.to_string()))
}

fn required<'a>(fields: &'a Mapping, key: &'static str) -> Result<&'a Value, MemoryCodecError> {
    fields.get(key).ok_or(MemoryCodecError::MissingField(key))
}

/// Text of a scalar value. Numbers and booleans keep their YAML spelling.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_timestamp(key: &'static str, value: &Value) -> Result<DateTime<Utc>, MemoryCodecError> {
    let text = scalar_text(value).unwrap_or_default();
    let invalid = || MemoryCodecError::InvalidTimestamp {
        field: key,
        value: text.clone(),
    };
    let Value::String(raw) = value else {
        return Err(invalid());
    };

    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

fn parse_tags(value: &Value) -> Result<Vec<String>, MemoryCodecError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => {
            return Err(MemoryCodecError::InvalidTags(format!(
                "expected a list, found '{}'",
                scalar_text(other).unwrap_or_else(|| "a mapping".to_string())
            )));
        },
    };

    items
        .iter()
        .enumerate()
        .map(|(position, item)| match (item, scalar_text(item)) {
            (_, Some(tag)) if !tag.trim().is_empty() => Ok(tag),
            (Value::Null, _) | (_, Some(_)) => Err(MemoryCodecError::InvalidTags(format!(
                "tag at position {position} is empty"
            ))),
            (_, None) => Err(MemoryCodecError::InvalidTags(format!(
                "tag at position {position} is not a scalar"
            ))),
        })
        .collect()
}

fn parse_source(value: &Value) -> Result<String, MemoryCodecError> {
    match scalar_text(value) {
        Some(source) if !source.trim().is_empty() => Ok(source),
        _ => Err(MemoryCodecError::InvalidSource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn sample() -> Memory {
        Memory::new(
            MemoryMetadata::new("user", ts(12))
                .with_tags(vec!["rust".to_string(), "storage".to_string()])
                .with_expires_at(Some(ts(18))),
            "Indexes are caches.\n",
        )
    }

    fn header(extra: &str) -> String {
        format!(
            "---\ncreated_at: 2024-06-01T12:00:00.000Z\nupdated_at: 2024-06-01T12:00:00.000Z\n{extra}---\nBody"
        )
    }

    #[test]
    fn test_serialize_format() {
        let text = serialize(&sample()).unwrap();
        assert!(text.starts_with("---\ncreated_at: "));
        assert!(text.ends_with("\n---\n\nIndexes are caches.\n"));
        assert!(text.contains("2024-06-01T18:00:00.000Z"));
        assert!(text.contains("source: user\n"));

        let created = text.find("created_at").unwrap();
        let tags = text.find("tags").unwrap();
        let expires = text.find("expires_at").unwrap();
        assert!(created < tags && tags < expires);
    }

    #[test]
    fn test_roundtrip() {
        let memory = sample();
        let parsed = parse(&serialize(&memory).unwrap()).unwrap();
        assert_eq!(parsed, memory);
    }

    #[test]
    fn test_roundtrip_preserves_leading_newlines() {
        let mut memory = sample();
        memory.content = "\n\nstarts with blank lines".to_string();
        assert_eq!(parse(&serialize(&memory).unwrap()).unwrap(), memory);
    }

    #[test]
    fn test_roundtrip_awkward_scalars() {
        let mut memory = sample();
        memory.metadata.tags = vec![
            "has, comma".to_string(),
            "[bracket]".to_string(),
            "it's".to_string(),
            "- dash".to_string(),
        ];
        memory.metadata.source = "tool: capture # note".to_string();
        memory.metadata.expires_at = None;
        let text = serialize(&memory).unwrap();
        assert!(!text.contains("expires_at"));
        assert_eq!(parse(&text).unwrap(), memory);
    }

    #[test]
    fn test_block_tags() {
        let memory = parse(&header("tags:\n  - alpha\n  - \"beta\"\nsource: user\n")).unwrap();
        assert_eq!(memory.metadata.tags, vec!["alpha", "beta"]);
        assert_eq!(memory.content, "Body");
    }

    #[test]
    fn test_empty_tags() {
        let memory = parse(&header("tags: []\nsource: user\n")).unwrap();
        assert!(memory.metadata.tags.is_empty());
        let memory = parse(&header("tags:\nsource: user\n")).unwrap();
        assert!(memory.metadata.tags.is_empty());
    }

    #[test]
    fn test_empty_tag_entry_rejected() {
        let err = parse(&header("tags:\n  - a\n  -\nsource: user\n")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TAGS");
        let err = parse(&header("tags: [\"  \"]\nsource: user\n")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TAGS");
    }

    #[test]
    fn test_missing_fields() {
        let err = parse(&header("source: user\n")).unwrap_err();
        assert_eq!(err, MemoryCodecError::MissingField("tags"));

        let err = parse("---\nupdated_at: 2024-06-01T12:00:00Z\ntags: []\nsource: x\n---\n")
            .unwrap_err();
        assert_eq!(err, MemoryCodecError::MissingField("created_at"));
    }

    #[test]
    fn test_tags_must_be_a_list() {
        let err = parse(&header("tags: rust\nsource: user\n")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TAGS");
        let err = parse(&header("tags:\n  - [nested]\nsource: user\n")).unwrap_err();
        assert_eq!(err.code(), "INVALID_TAGS");
    }

    #[test]
    fn test_scalar_tags_and_source_keep_spelling() {
        let memory = parse(&header("tags: [2024, true]\nsource: 42\n")).unwrap();
        assert_eq!(memory.metadata.tags, vec!["2024", "true"]);
        assert_eq!(memory.metadata.source, "42");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let memory = parse(&header("tags: []\nsource: user\npriority: high\n")).unwrap();
        assert_eq!(memory.metadata.source, "user");
    }

    #[test]
    fn test_header_must_be_a_mapping() {
        let err = parse("---\njust text\n---\nBody").unwrap_err();
        assert_eq!(err.code(), "INVALID_FRONTMATTER");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = parse(&header("tags: []\nsource: user\nsource: other\n")).unwrap_err();
        assert_eq!(err.code(), "INVALID_FRONTMATTER");
    }

    #[test]
    fn test_invalid_timestamp() {
        let err = parse("---\ncreated_at: yesterday\nupdated_at: 2024-06-01T12:00:00Z\ntags: []\nsource: x\n---\n")
            .unwrap_err();
        assert_eq!(
            err,
            MemoryCodecError::InvalidTimestamp {
                field: "created_at",
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn test_blank_source_rejected() {
        let err = parse(&header("tags: []\nsource: \"  \"\n")).unwrap_err();
        assert_eq!(err, MemoryCodecError::InvalidSource);
        let err = parse(&header("tags: []\nsource:\n")).unwrap_err();
        assert_eq!(err, MemoryCodecError::InvalidSource);
    }

    #[test]
    fn test_delimiters_required() {
        assert_eq!(parse("").unwrap_err().code(), "INVALID_FRONTMATTER");
        assert_eq!(parse("no header").unwrap_err().code(), "INVALID_FRONTMATTER");
        assert_eq!(
            parse("---\ntags: []\nsource: x\n").unwrap_err().code(),
            "INVALID_FRONTMATTER"
        );
    }

    #[test]
    fn test_content_may_contain_delimiter() {
        let memory = parse(&header("tags: []\nsource: user\n").replace("Body", "above\n---\nbelow"))
            .unwrap();
        assert_eq!(memory.content, "above\n---\nbelow");
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let memory = parse("---\ncreated_at: 2024-06-01T12:00:00\nupdated_at: 2024-06-01T12:00:00.000Z\ntags: []\nsource: x\n---\n")
            .unwrap();
        assert_eq!(memory.metadata.created_at, ts(12));
        assert_eq!(memory.content, "");
    }

    #[test]
    fn test_serialize_rejects_blank_values() {
        let mut memory = sample();
        memory.metadata.tags.push(" ".to_string());
        assert_eq!(serialize(&memory).unwrap_err().code(), "INVALID_TAGS");

        let mut memory = sample();
        memory.metadata.source = String::new();
        assert_eq!(serialize(&memory).unwrap_err(), MemoryCodecError::InvalidSource);
    }
}

//! Slug and path identity types.
//!
//! Every category and memory is addressed by a slash-separated path of slugs:
//!
//! ```text
//! project/cortex/decisions/storage-layout
//! └───────── categories ─────────┘ └ slug ┘
//! ```
//!
//! Segments are trimmed and empty segments dropped before validation, so
//! `" project//cortex/ "` normalizes to `project/cortex`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lowercase alphanumeric runs joined by single hyphens.
#[allow(clippy::expect_used)]
static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static regex: slug pattern"));

/// Errors raised while validating slugs and paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// A segment does not match the slug grammar.
    #[error("invalid slug '{segment}': expected lowercase alphanumeric words joined by hyphens")]
    InvalidSlug {
        /// The offending segment.
        segment: String,
    },

    /// A category path has no segments after normalization.
    #[error("category path must contain at least one segment")]
    InvalidCategoryDepth,

    /// A memory path does not have a category and a leaf slug.
    #[error("invalid slug path '{path}': expected at least a category and a memory slug")]
    InvalidSlugPath {
        /// The path as supplied.
        path: String,
    },
}

impl IdentityError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlug { .. } => "INVALID_SLUG",
            Self::InvalidCategoryDepth => "INVALID_CATEGORY_DEPTH",
            Self::InvalidSlugPath { .. } => "INVALID_SLUG_PATH",
        }
    }
}

/// A single validated path segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Validates a single segment.
    ///
    /// The segment is trimmed first; no other normalization is applied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cortex::models::Slug;
    ///
    /// assert!(Slug::new("storage-layout").is_ok());
    /// assert!(Slug::new("Storage_Layout").is_err());
    /// ```
    pub fn new(segment: &str) -> Result<Self, IdentityError> {
        let trimmed = segment.trim();
        if is_valid_slug(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(IdentityError::InvalidSlug {
                segment: segment.to_string(),
            })
        }
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

/// Returns `true` if `segment` matches the slug grammar exactly.
#[must_use]
pub fn is_valid_slug(segment: &str) -> bool {
    SLUG_PATTERN.is_match(segment)
}

/// A validated, non-empty category path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryPath(Vec<Slug>);

impl CategoryPath {
    /// Builds a category path from already-validated segments.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCategoryDepth`] if `segments` is empty.
    pub fn from_slugs(segments: Vec<Slug>) -> Result<Self, IdentityError> {
        if segments.is_empty() {
            return Err(IdentityError::InvalidCategoryDepth);
        }
        Ok(Self(segments))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[Slug] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a single-segment (root) category.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Returns the depth-1 category this path lives under.
    #[must_use]
    pub fn root(&self) -> Self {
        Self(self.0[..1].to_vec())
    }

    /// Returns the parent category, or `None` for a root category.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Returns this path followed by each ancestor, ending at the root category.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        (1..=self.0.len())
            .rev()
            .map(|len| Self(self.0[..len].to_vec()))
            .collect()
    }

    /// Appends a child segment.
    #[must_use]
    pub fn join(&self, child: Slug) -> Self {
        let mut segments = self.0.clone();
        segments.push(child);
        Self(segments)
    }

    /// Returns `true` if `other` equals this path or lives beneath it.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Returns the last segment.
    #[must_use]
    pub fn leaf(&self) -> &Slug {
        &self.0[self.0.len() - 1]
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for CategoryPath {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_category_path(s)
    }
}

impl TryFrom<String> for CategoryPath {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_category_path(&value)
    }
}

impl From<CategoryPath> for String {
    fn from(path: CategoryPath) -> Self {
        path.to_string()
    }
}

/// The identity of a stored memory: its category path and leaf slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryIdentity {
    categories: CategoryPath,
    slug: Slug,
}

impl MemoryIdentity {
    /// Builds an identity from validated parts.
    #[must_use]
    pub const fn new(categories: CategoryPath, slug: Slug) -> Self {
        Self { categories, slug }
    }

    /// Returns the category the memory lives in.
    #[must_use]
    pub const fn category(&self) -> &CategoryPath {
        &self.categories
    }

    /// Returns the leaf slug.
    #[must_use]
    pub const fn slug(&self) -> &Slug {
        &self.slug
    }

    /// Returns the full `category/.../slug` path.
    #[must_use]
    pub fn slug_path(&self) -> String {
        format!("{}/{}", self.categories, self.slug)
    }
}

impl fmt::Display for MemoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.categories, self.slug)
    }
}

impl FromStr for MemoryIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_memory_slug_path(s)
    }
}

impl TryFrom<String> for MemoryIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_memory_slug_path(&value)
    }
}

impl From<MemoryIdentity> for String {
    fn from(identity: MemoryIdentity) -> Self {
        identity.slug_path()
    }
}

/// Trims each segment and drops the empty ones.
fn normalize_segments<'a, I>(segments: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validates a sequence of category segments.
///
/// # Errors
///
/// - [`IdentityError::InvalidCategoryDepth`] if no segment survives normalization
/// - [`IdentityError::InvalidSlug`] for the first segment that fails the grammar
pub fn validate_category_path<'a, I>(segments: I) -> Result<CategoryPath, IdentityError>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized = normalize_segments(segments);
    if normalized.is_empty() {
        return Err(IdentityError::InvalidCategoryDepth);
    }

    let slugs = normalized
        .into_iter()
        .map(Slug::new)
        .collect::<Result<Vec<_>, _>>()?;

    CategoryPath::from_slugs(slugs)
}

/// Parses a slash-separated category path.
///
/// # Errors
///
/// See [`validate_category_path`].
pub fn parse_category_path(path: &str) -> Result<CategoryPath, IdentityError> {
    validate_category_path(path.split('/'))
}

/// Parses and validates a full memory slug path.
///
/// # Errors
///
/// - [`IdentityError::InvalidSlugPath`] if fewer than two segments remain
/// - [`IdentityError::InvalidSlug`] if any segment fails the grammar
///
/// # Examples
///
/// ```rust
/// use cortex::models::validate_memory_slug_path;
///
/// let identity = validate_memory_slug_path("project/notes/setup").unwrap();
/// assert_eq!(identity.category().to_string(), "project/notes");
/// assert_eq!(identity.slug().as_str(), "setup");
/// ```
pub fn validate_memory_slug_path(path: &str) -> Result<MemoryIdentity, IdentityError> {
    let mut normalized = normalize_segments(path.split('/'));
    if normalized.len() < 2 {
        return Err(IdentityError::InvalidSlugPath {
            path: path.to_string(),
        });
    }

    let leaf = normalized.pop().unwrap_or_default();
    let categories = validate_category_path(normalized)?;
    let slug = Slug::new(leaf)?;

    Ok(MemoryIdentity::new(categories, slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("a" ; "single letter")]
    #[test_case("storage-layout" ; "hyphenated")]
    #[test_case("v2" ; "alphanumeric")]
    #[test_case("2024-q1-review" ; "leading digits")]
    fn test_valid_slugs(segment: &str) {
        assert!(is_valid_slug(segment));
    }

    #[test_case("" ; "empty")]
    #[test_case("Upper" ; "uppercase")]
    #[test_case("double--hyphen" ; "double hyphen")]
    #[test_case("-leading" ; "leading hyphen")]
    #[test_case("trailing-" ; "trailing hyphen")]
    #[test_case("snake_case" ; "underscore")]
    #[test_case("has space" ; "inner whitespace")]
    #[test_case(".." ; "dot dot")]
    fn test_invalid_slugs(segment: &str) {
        assert!(!is_valid_slug(segment));
    }

    #[test]
    fn test_category_path_normalizes_segments() {
        let path = parse_category_path(" project//cortex/ ").unwrap();
        assert_eq!(path.to_string(), "project/cortex");
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn test_category_path_empty_is_depth_error() {
        assert_eq!(
            parse_category_path(" / /"),
            Err(IdentityError::InvalidCategoryDepth)
        );
        assert_eq!(
            validate_category_path(Vec::<&str>::new()),
            Err(IdentityError::InvalidCategoryDepth)
        );
    }

    #[test]
    fn test_category_path_reports_offending_segment() {
        let err = parse_category_path("project/Bad_Segment/x").unwrap_err();
        assert_eq!(
            err,
            IdentityError::InvalidSlug {
                segment: "Bad_Segment".to_string()
            }
        );
        assert_eq!(err.code(), "INVALID_SLUG");
    }

    #[test]
    fn test_memory_path_requires_two_segments() {
        let err = validate_memory_slug_path("lonely").unwrap_err();
        assert_eq!(err.code(), "INVALID_SLUG_PATH");

        let err = validate_memory_slug_path("/lonely/ ").unwrap_err();
        assert_eq!(err.code(), "INVALID_SLUG_PATH");
    }

    #[test]
    fn test_memory_path_invalid_leaf() {
        let err = validate_memory_slug_path("project/Leaf").unwrap_err();
        assert_eq!(
            err,
            IdentityError::InvalidSlug {
                segment: "Leaf".to_string()
            }
        );
    }

    #[test]
    fn test_memory_identity_parts() {
        let identity = validate_memory_slug_path("a/b/c/note").unwrap();
        assert_eq!(identity.category().to_string(), "a/b/c");
        assert_eq!(identity.slug().as_str(), "note");
        assert_eq!(identity.slug_path(), "a/b/c/note");
        assert_eq!(identity.to_string(), "a/b/c/note");
    }

    #[test]
    fn test_ancestors_and_parent() {
        let path = parse_category_path("a/b/c").unwrap();
        let ancestors: Vec<String> = path.ancestors().iter().map(ToString::to_string).collect();
        assert_eq!(ancestors, vec!["a/b/c", "a/b", "a"]);
        assert_eq!(path.parent().unwrap().to_string(), "a/b");
        assert_eq!(path.root().to_string(), "a");
        assert!(path.root().is_root());
        assert!(path.root().parent().is_none());
    }

    #[test]
    fn test_contains() {
        let parent = parse_category_path("a/b").unwrap();
        assert!(parent.contains(&parse_category_path("a/b").unwrap()));
        assert!(parent.contains(&parse_category_path("a/b/c").unwrap()));
        assert!(!parent.contains(&parse_category_path("a").unwrap()));
        assert!(!parent.contains(&parse_category_path("a/bc").unwrap()));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let identity = validate_memory_slug_path("a/b/note").unwrap();
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, "\"a/b/note\"");
        let back: MemoryIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);

        let bad: Result<MemoryIdentity, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}

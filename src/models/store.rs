//! Store registry types.
//!
//! A store is a named root directory holding one category tree. The registry
//! maps store names to their definition: root path, category mode, and the
//! categories declared up front.
//!
//! ```yaml
//! stores:
//!   default:
//!     path: /home/me/.local/share/cortex/default
//!     category_mode: subcategories
//!     categories:
//!       project:
//!         description: Per-project notes
//!         subcategories:
//!           decisions: {}
//! ```

use super::identity::{CategoryPath, Slug};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How strictly category creation and deletion are policed for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMode {
    /// No restrictions.
    #[default]
    Free,
    /// Only categories beneath a declared root may be created or deleted;
    /// declared categories themselves are protected.
    Subcategories,
    /// No creation or deletion; descriptions only on declared categories.
    Strict,
}

impl CategoryMode {
    /// Returns the mode as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Subcategories => "subcategories",
            Self::Strict => "strict",
        }
    }

    /// Parses a mode string, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "subcategories" => Some(Self::Subcategories),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown category mode: {s}"))
    }
}

/// A category declared in store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    /// Description applied when the category is materialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared child categories, keyed by slug.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcategories: BTreeMap<String, Self>,
}

impl CategoryDefinition {
    /// Creates a definition with a description.
    #[must_use]
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            subcategories: BTreeMap::new(),
        }
    }

    /// Adds a declared child.
    #[must_use]
    pub fn with_subcategory(mut self, slug: impl Into<String>, child: Self) -> Self {
        self.subcategories.insert(slug.into(), child);
        self
    }
}

/// A registered store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDefinition {
    /// Root directory of the store.
    pub path: PathBuf,
    /// Optional description of the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category protection mode.
    #[serde(default)]
    pub category_mode: CategoryMode,
    /// Declared root categories, keyed by slug.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, CategoryDefinition>,
}

impl StoreDefinition {
    /// Creates a free-mode store rooted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            description: None,
            category_mode: CategoryMode::Free,
            categories: BTreeMap::new(),
        }
    }

    /// Sets the category mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: CategoryMode) -> Self {
        self.category_mode = mode;
        self
    }

    /// Declares a root category.
    #[must_use]
    pub fn with_category(mut self, slug: impl Into<String>, definition: CategoryDefinition) -> Self {
        self.categories.insert(slug.into(), definition);
        self
    }

    /// Returns the declared categories as a lookup structure.
    #[must_use]
    pub fn declared_categories(&self) -> DeclaredCategories {
        DeclaredCategories::from_definitions(&self.categories)
    }
}

/// All registered stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRegistry {
    /// Stores keyed by name.
    #[serde(default)]
    pub stores: BTreeMap<String, StoreDefinition>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stores: BTreeMap::new(),
        }
    }

    /// Returns the store with `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StoreDefinition> {
        self.stores.get(name)
    }

    /// Registers or replaces a store. Returns the previous definition.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: StoreDefinition,
    ) -> Option<StoreDefinition> {
        self.stores.insert(name.into(), definition)
    }

    /// Removes a store. Returns the removed definition.
    pub fn deregister(&mut self, name: &str) -> Option<StoreDefinition> {
        self.stores.remove(name)
    }
}

/// Flattened view of the categories declared in store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredCategories {
    entries: BTreeMap<CategoryPath, Option<String>>,
}

impl DeclaredCategories {
    /// Flattens a definition tree. Keys that are not valid slugs are skipped
    /// with a warning, together with everything declared beneath them.
    #[must_use]
    pub fn from_definitions(definitions: &BTreeMap<String, CategoryDefinition>) -> Self {
        let mut entries = BTreeMap::new();
        for (slug, definition) in definitions {
            match Slug::new(slug).and_then(|s| CategoryPath::from_slugs(vec![s])) {
                Ok(path) => collect(&path, definition, &mut entries),
                Err(e) => {
                    tracing::warn!(category = %slug, error = %e, "Skipping invalid declared category");
                },
            }
        }
        Self { entries }
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `path` itself is declared.
    #[must_use]
    pub fn is_declared(&self, path: &CategoryPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns `true` if the root category of `path` is declared.
    #[must_use]
    pub fn has_declared_root(&self, path: &CategoryPath) -> bool {
        self.entries.contains_key(&path.root())
    }

    /// Returns the configured description of a declared category.
    #[must_use]
    pub fn description(&self, path: &CategoryPath) -> Option<&str> {
        self.entries.get(path).and_then(Option::as_deref)
    }

    /// Iterates declared categories, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = (&CategoryPath, Option<&str>)> {
        self.entries
            .iter()
            .map(|(path, description)| (path, description.as_deref()))
    }
}

fn collect(
    path: &CategoryPath,
    definition: &CategoryDefinition,
    entries: &mut BTreeMap<CategoryPath, Option<String>>,
) {
    entries.insert(path.clone(), definition.description.clone());
    for (slug, child) in &definition.subcategories {
        match Slug::new(slug) {
            Ok(s) => collect(&path.join(s), child, entries),
            Err(e) => {
                tracing::warn!(parent = %path, error = %e, "Skipping invalid declared category");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_category_path;

    fn registry_yaml() -> &'static str {
        "stores:\n  default:\n    path: /tmp/cortex\n    category_mode: subcategories\n    categories:\n      project:\n        description: Per-project notes\n        subcategories:\n          decisions: {}\n      Bad_Key: {}\n"
    }

    #[test]
    fn test_registry_deserializes_from_yaml() {
        let registry: StoreRegistry = serde_yaml_ng::from_str(registry_yaml()).unwrap();
        let store = registry.get("default").unwrap();
        assert_eq!(store.category_mode, CategoryMode::Subcategories);
        assert_eq!(store.path, PathBuf::from("/tmp/cortex"));
    }

    #[test]
    fn test_declared_categories_flatten() {
        let registry: StoreRegistry = serde_yaml_ng::from_str(registry_yaml()).unwrap();
        let declared = registry.get("default").unwrap().declared_categories();

        let project = parse_category_path("project").unwrap();
        let decisions = parse_category_path("project/decisions").unwrap();
        let undeclared = parse_category_path("project/other").unwrap();

        assert!(declared.is_declared(&project));
        assert!(declared.is_declared(&decisions));
        assert!(!declared.is_declared(&undeclared));
        assert!(declared.has_declared_root(&undeclared));
        assert_eq!(declared.description(&project), Some("Per-project notes"));
        assert_eq!(declared.iter().count(), 2);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(CategoryMode::parse("STRICT"), Some(CategoryMode::Strict));
        assert_eq!(CategoryMode::parse("free"), Some(CategoryMode::Free));
        assert_eq!(CategoryMode::parse("loose"), None);
        assert_eq!("subcategories".parse::<CategoryMode>(), Ok(CategoryMode::Subcategories));
    }

    #[test]
    fn test_register_and_deregister() {
        let mut registry = StoreRegistry::new();
        assert!(registry.register("a", StoreDefinition::new("/a")).is_none());
        assert!(registry.register("a", StoreDefinition::new("/b")).is_some());
        assert_eq!(registry.get("a").unwrap().path, PathBuf::from("/b"));
        assert!(registry.deregister("a").is_some());
        assert!(registry.deregister("a").is_none());
    }
}

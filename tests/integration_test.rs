//! Integration tests for cortex.
//!
//! Drives the services end to end against a filesystem store in a temporary
//! directory.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use cortex::codec::index;
use cortex::models::{CategoryDefinition, CategoryIndex, parse_category_path};
use cortex::services::{
    CategoryPolicy, CreateMemoryInput, GetMemoryOptions, ListMemoriesOptions, UpdateMemoryInput,
};
use cortex::storage::{CategoryStorage, IndexStorage, StoreRegistryStorage};
use cortex::{
    CategoryMode, CategoryService, Error, FilesystemStorage, FilesystemStorageConfig,
    MemoryService, OperationContext, PruneOptions, StoragePort, StoreDefinition, StoreRegistry,
};
use std::sync::Arc;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn ctx() -> OperationContext {
    OperationContext::at(now()).with_request_id("integration")
}

struct Fixture {
    _dir: TempDir,
    storage: Arc<FilesystemStorage>,
    memories: MemoryService,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStorage::new(
            FilesystemStorageConfig::new(dir.path().join("store")),
            dir.path().join("stores.yml"),
        ));
        let memories = MemoryService::new(storage.clone());
        Self {
            _dir: dir,
            storage,
            memories,
        }
    }

    fn categories(&self, policy: CategoryPolicy) -> CategoryService {
        CategoryService::new(self.storage.clone(), policy)
    }

    fn add(&self, path: &str, content: &str) {
        self.memories
            .create(&ctx(), path, CreateMemoryInput::new(content, "test"))
            .unwrap();
    }

    fn index(&self, category: Option<&str>) -> CategoryIndex {
        let category = category.map(|c| parse_category_path(c).unwrap());
        self.storage
            .read_category_index(category.as_ref())
            .unwrap()
    }

    /// Every index the adapter currently serves, keyed by category.
    fn snapshot(&self, categories: &[&str]) -> Vec<(String, Option<String>)> {
        let mut snapshot = vec![(
            "<root>".to_string(),
            IndexStorage::read(&*self.storage, None).unwrap(),
        )];
        for category in categories {
            let path = parse_category_path(category).unwrap();
            snapshot.push((
                (*category).to_string(),
                IndexStorage::read(&*self.storage, Some(&path)).unwrap(),
            ));
        }
        snapshot
    }
}

#[test]
fn test_direct_counts_not_recursive() {
    let fixture = Fixture::new();
    fixture.add("a/b/m1", "one");
    fixture.add("a/b/c/m2", "two");

    let a = fixture.index(Some("a"));
    assert_eq!(a.subcategory("a/b").unwrap().memory_count, 1);
    assert!(a.memories.is_empty());

    let b = fixture.index(Some("a/b"));
    assert_eq!(b.subcategory("a/b/c").unwrap().memory_count, 1);
    assert_eq!(b.memories.len(), 1);

    let root = fixture.index(None);
    assert_eq!(root.subcategory("a").unwrap().memory_count, 0);
}

#[test]
fn test_token_estimate_covers_whole_file() {
    let fixture = Fixture::new();
    fixture.add("a/note", "abcd");

    let entry = fixture.index(Some("a")).memory("a/note").cloned().unwrap();
    let raw = cortex::storage::MemoryStorage::read(
        &*fixture.storage,
        &"a/note".parse().unwrap(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(entry.token_estimate, cortex::tokens::estimate_tokens(&raw));
}

#[test]
fn test_reindex_matches_incremental_updates() {
    let fixture = Fixture::new();
    fixture.add("a/one", "first");
    fixture.add("a/b/two", "second memory");
    fixture.add("a/b/c/three", "third");
    fixture.add("x/four", "fourth");
    fixture
        .memories
        .update(
            &ctx(),
            "a/one",
            UpdateMemoryInput::default().with_content("first, revised at length"),
        )
        .unwrap();

    let categories = ["a", "a/b", "a/b/c", "x"];
    let incremental = fixture.snapshot(&categories);

    let report = fixture.storage.reindex().unwrap();
    assert_eq!(report.memories_indexed, 4);
    assert_eq!(report.categories_indexed, 4);
    assert_eq!(report.files_skipped, 0);

    assert_eq!(fixture.snapshot(&categories), incremental);
}

#[test]
fn test_reindex_repairs_tampered_index() {
    let fixture = Fixture::new();
    fixture.add("a/b/m1", "one");
    fixture.add("a/b/m2", "two");

    let a = parse_category_path("a").unwrap();
    let mut stale = fixture.index(Some("a"));
    stale.upsert_subcategory("a/b", 99);
    fixture
        .storage
        .write(Some(&a), &index::serialize(&stale).unwrap())
        .unwrap();
    assert_eq!(fixture.index(Some("a")).subcategory("a/b").unwrap().memory_count, 99);

    fixture.storage.reindex().unwrap();
    assert_eq!(fixture.index(Some("a")).subcategory("a/b").unwrap().memory_count, 2);
}

#[test]
fn test_descriptions_survive_reindex_and_moves() {
    let fixture = Fixture::new();
    let categories = fixture.categories(CategoryPolicy::free());
    fixture.add("project/notes/setup", "Run make");
    categories
        .set_description(&ctx(), "project/notes", "Working notes")
        .unwrap();
    categories.set_description(&ctx(), "project", "Projects").unwrap();

    fixture
        .memories
        .move_memory(&ctx(), "project/notes/setup", "project/archive/setup")
        .unwrap();

    let project = fixture.index(Some("project"));
    let notes = project.subcategory("project/notes").unwrap();
    assert_eq!(notes.description.as_deref(), Some("Working notes"));
    assert_eq!(notes.memory_count, 0);
    assert_eq!(project.subcategory("project/archive").unwrap().memory_count, 1);
    assert_eq!(
        fixture.index(None).subcategory("project").unwrap().description.as_deref(),
        Some("Projects")
    );
}

#[test]
fn test_category_create_then_memories() {
    let fixture = Fixture::new();
    let categories = fixture.categories(CategoryPolicy::free());

    assert!(categories.create(&ctx(), "x/y").unwrap().created);
    fixture.add("x/y/m", "content");
    assert!(!categories.create(&ctx(), "x/y").unwrap().created);

    let listing = fixture
        .memories
        .list(&ctx(), Some("x"), ListMemoriesOptions::default())
        .unwrap();
    assert_eq!(listing.subcategories.len(), 1);
    assert_eq!(listing.subcategories[0].memory_count, 1);
}

#[test]
fn test_delete_category_then_reindex() {
    let fixture = Fixture::new();
    let categories = fixture.categories(CategoryPolicy::free());
    fixture.add("a/b/m1", "one");
    fixture.add("a/keep", "two");

    categories.delete(&ctx(), "a/b").unwrap();
    let err = fixture
        .memories
        .get(&ctx(), "a/b/m1", GetMemoryOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "MEMORY_NOT_FOUND");

    let report = fixture.storage.reindex().unwrap();
    assert_eq!(report.memories_indexed, 1);
    assert!(fixture.index(Some("a")).subcategory("a/b").is_none());
}

#[test]
fn test_prune_cleans_indexes() {
    let fixture = Fixture::new();
    fixture
        .memories
        .create(
            &ctx(),
            "a/temp",
            CreateMemoryInput::new("temporary", "test").with_expires_at(now() - Duration::hours(1)),
        )
        .unwrap();
    fixture.add("a/keep", "permanent");

    let result = fixture
        .memories
        .prune_expired(&ctx(), PruneOptions::default())
        .unwrap();
    assert_eq!(result.pruned.len(), 1);

    let a = fixture.index(Some("a"));
    assert!(a.memory("a/temp").is_none());
    assert!(a.memory("a/keep").is_some());
    assert_eq!(fixture.index(None).subcategory("a").unwrap().memory_count, 1);
}

#[test]
fn test_registry_policy_round_trip() {
    let fixture = Fixture::new();
    let mut registry = StoreRegistry::new();
    registry.register(
        "work",
        StoreDefinition::new("/srv/work")
            .with_mode(CategoryMode::Subcategories)
            .with_category("clients", CategoryDefinition::described("Client work")),
    );
    fixture.storage.registry().save(&registry).unwrap();

    let loaded = fixture.storage.registry().load().unwrap();
    let policy = CategoryPolicy::from_store(loaded.get("work").unwrap());
    let categories = fixture.categories(policy);

    let err = categories.create(&ctx(), "personal").unwrap_err();
    assert_eq!(err.code(), "ROOT_CATEGORY_NOT_ALLOWED");

    let report = categories.sync_declared_categories(&ctx()).unwrap();
    assert_eq!(report.created, vec!["clients"]);
    assert!(categories.create(&ctx(), "clients/acme").unwrap().created);
}

#[test]
fn test_error_payloads() {
    let fixture = Fixture::new();
    let err: Error = fixture
        .memories
        .get(&ctx(), "a/none", GetMemoryOptions::default())
        .unwrap_err()
        .into();
    let payload = serde_json::to_value(err.to_payload()).unwrap();
    assert_eq!(payload["code"], "MEMORY_NOT_FOUND");
    assert_eq!(payload["details"]["path"], "a/none");

    let categories = fixture.categories(CategoryPolicy::free());
    let err: Error = categories.delete(&ctx(), "a").unwrap_err().into();
    assert_eq!(err.code(), "ROOT_CATEGORY_REJECTED");
    assert!(err.to_string().contains("root category"));
}

//! Property-based tests.
//!
//! Uses proptest to check invariants across random inputs:
//! - Memory files survive a serialize/parse round trip
//! - Slug path normalization ignores blank segments and padding
//! - Token estimates follow the character count
//! - A reindex rebuilds exactly the indexes incremental updates produced

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use cortex::codec::{frontmatter, index};
use cortex::models::{
    CategoryIndex, IndexMemoryEntry, Memory, MemoryMetadata, is_valid_slug, parse_category_path,
    validate_memory_slug_path,
};
use cortex::storage::{
    CategoryStorage, FilesystemStorage, FilesystemStorageConfig, IndexStorage, MemoryStorage,
};
use cortex::tokens::estimate_tokens;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

/// Millisecond timestamps between 1970 and 2100.
fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0_i64..4_102_444_800_000).prop_map(|ms| DateTime::from_timestamp_millis(ms).unwrap())
}

fn slug() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,6}(-[a-z0-9]{1,4}){0,2}"
}

fn memory() -> impl Strategy<Value = Memory> {
    (
        timestamp(),
        timestamp(),
        prop::collection::vec("[a-zA-Z][a-zA-Z0-9 ,:#'\"\\[\\]-]{0,12}", 0..5),
        "[a-zA-Z][a-zA-Z0-9 :#'\"-]{0,16}",
        prop::option::of(timestamp()),
        "\n{0,2}[ -~\n]{0,200}",
    )
        .prop_map(|(created_at, updated_at, tags, source, expires_at, content)| {
            Memory::new(
                MemoryMetadata {
                    created_at,
                    updated_at,
                    tags,
                    source,
                    expires_at,
                },
                content,
            )
        })
}

proptest! {
    /// Property: a serialized memory parses back to the same memory.
    #[test]
    fn prop_memory_file_round_trip(memory in memory()) {
        let raw = frontmatter::serialize(&memory).unwrap();
        let parsed = frontmatter::parse(&raw).unwrap();
        prop_assert_eq!(parsed, memory);
    }

    /// Property: serialization is stable across a round trip.
    #[test]
    fn prop_memory_file_serialization_is_stable(memory in memory()) {
        let first = frontmatter::serialize(&memory).unwrap();
        let second = frontmatter::serialize(&frontmatter::parse(&first).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: blank segments and padding do not change a memory identity.
    #[test]
    fn prop_slug_path_normalization(segments in prop::collection::vec(slug(), 2..6)) {
        let canonical = segments.join("/");
        let padded = segments
            .iter()
            .map(|s| format!("  {s} "))
            .collect::<Vec<_>>()
            .join("//");

        let identity = validate_memory_slug_path(&canonical).unwrap();
        prop_assert_eq!(identity.slug_path(), canonical.clone());
        prop_assert_eq!(validate_memory_slug_path(&format!("/{padded}/")).unwrap(), identity);
    }

    /// Property: a category path displays as its canonical form.
    #[test]
    fn prop_category_path_display_round_trip(segments in prop::collection::vec(slug(), 1..5)) {
        let canonical = segments.join("/");
        let path = parse_category_path(&canonical).unwrap();
        prop_assert_eq!(path.depth(), segments.len());
        prop_assert_eq!(path.to_string(), canonical);
    }

    /// Property: uppercase letters never form a valid slug.
    #[test]
    fn prop_uppercase_slugs_rejected(s in "[a-z0-9]{0,4}[A-Z][a-zA-Z0-9]{0,4}") {
        prop_assert!(!is_valid_slug(&s));
        let path = format!("cat/{s}");
        prop_assert!(validate_memory_slug_path(&path).is_err());
    }

    /// Property: the estimate is the character count divided by four, rounded up.
    #[test]
    fn prop_token_estimate_rounds_up(text in "\\PC{0,64}") {
        let chars = text.chars().count();
        let tokens = estimate_tokens(&text);
        prop_assert!(tokens * 4 >= chars);
        prop_assert!(tokens * 4 < chars + 4);
    }

    /// Property: index files keep their entries through a round trip.
    #[test]
    fn prop_index_round_trip(
        memories in prop::collection::btree_map(slug(), 0_usize..10_000, 0..6),
        subcategories in prop::collection::btree_map(slug(), 0_usize..50, 0..4),
    ) {
        let mut original = CategoryIndex::default();
        for (leaf, tokens) in &memories {
            original.upsert_memory(IndexMemoryEntry::new(format!("cat/{leaf}"), *tokens));
        }
        for (child, count) in &subcategories {
            original.upsert_subcategory(&format!("cat/{child}"), *count);
        }

        let parsed = index::parse(&index::serialize(&original).unwrap()).unwrap();
        prop_assert_eq!(parsed, original);
    }
}

/// Serialized root index followed by every category index under `paths`.
fn snapshot(storage: &FilesystemStorage, paths: &BTreeMap<String, usize>) -> Vec<String> {
    let mut categories = BTreeSet::new();
    for path in paths.keys() {
        let segments: Vec<&str> = path.split('/').collect();
        for depth in 1..segments.len() {
            categories.insert(segments[..depth].join("/"));
        }
    }

    let mut out = vec![index::serialize(&storage.read_category_index(None).unwrap()).unwrap()];
    for category in &categories {
        let category = parse_category_path(category).unwrap();
        out.push(index::serialize(&storage.read_category_index(Some(&category)).unwrap()).unwrap());
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: reindexing a store reproduces the incrementally maintained indexes.
    #[test]
    fn prop_reindex_matches_incremental_indexes(
        paths in prop::collection::btree_map("[ab](/[a-c]){0,2}/[m-o][0-9]", 0_usize..400, 1..12),
    ) {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(
            FilesystemStorageConfig::new(dir.path()),
            dir.path().join("registry.yml"),
        );
        for (path, length) in &paths {
            let identity = validate_memory_slug_path(path).unwrap();
            let contents = "x".repeat(*length);
            MemoryStorage::write(&storage, &identity, &contents).unwrap();
            storage.update_after_memory_write(&identity, &contents).unwrap();
        }

        let incremental = snapshot(&storage, &paths);
        let report = storage.reindex().unwrap();
        prop_assert_eq!(report.memories_indexed, paths.len());
        prop_assert_eq!(snapshot(&storage, &paths), incremental);
    }
}

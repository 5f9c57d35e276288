//! Integration tests for the Ark fact store
//!
//! These tests cover:
//! 1. Discovery of fact caches below a projects root
//! 2. Ingestion and identity derivation
//! 3. Idempotent re-ingestion
//! 4. Union-with-override merging
//! 5. Exact, fuzzy and list-valued queries
//! 6. Insert conflicts from a concurrent writer
//! 7. Raw fact round-trips through storage
//! 8. File-backed stores shared between sessions

mod common;

use std::cell::Cell;

use ark::error::{Error, Result};
use ark::facts::{
    collect, find_caches, get_document, list_hosts, load_cache_dirs, query_host_facts,
    query_hosts_by_fact, sort_by_recency, store_facts, upsert_document, upsert_documents, Database,
    FactDocument, FactRepository, HostDocuments, HostMatch, KeyFilter, MatchMode, SqliteRepository,
    UpsertOutcome,
};
use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn batch(entries: Vec<(&str, serde_json::Value)>) -> HostDocuments {
    entries
        .into_iter()
        .map(|(identity, value)| (identity.to_string(), FactDocument::new(identity, facts(value))))
        .collect()
}

// ============================================================================
// Discovery and Collection
// ============================================================================

#[test]
fn test_collect_from_projects_root() {
    let projects = TestProjects::new();
    projects.scaffold("web");
    projects.write_facts("web", "run-1", "web01", &debian_facts("web01"));
    projects.write_facts("web", "run-1", "web02", &debian_facts("web02"));
    projects.write_facts("db", "run-7", "db01", &json!({"ansible_os_family": "RedHat"}));
    // Logs are never searched
    projects.write_facts("logs", "run-0", "ghost", &json!({"ansible_os_family": "Ghost"}));

    let caches = find_caches(projects.root());
    assert_eq!(caches.len(), 2);

    let mut session = memory_session();
    let updated = collect(&mut session, projects.root()).unwrap();
    assert_eq!(updated.len(), 3);
    assert_eq!(list_hosts(&session).unwrap(), vec!["db01", "web01", "web02"]);
}

#[test]
fn test_identity_prefers_fqdn_then_hostname() {
    let projects = TestProjects::new();
    projects.write_facts(
        "web",
        "run-1",
        "10.0.0.11",
        &json!({"ansible_fqdn": "Web01.Example.com", "ansible_hostname": "web01"}),
    );
    projects.write_facts("web", "run-1", "10.0.0.12", &json!({"ansible_hostname": "web02"}));
    projects.write_facts("web", "run-1", "Bare Host", &json!({}));

    let documents = load_cache_dirs(&find_caches(projects.root()));
    let identities: Vec<&str> = documents.values().map(|d| d.identity.as_str()).collect();
    assert_eq!(identities, vec!["web01.example.com", "web02", "bare_host"]);
}

#[test]
fn test_newest_snapshot_wins_within_a_collection() {
    let projects = TestProjects::new();
    projects.write_facts("web", "run-2", "web01", &json!({"ansible_kernel": "6.1"}));
    std::thread::sleep(std::time::Duration::from_millis(20));
    // Written last, so run-1 is the most recently modified cache
    let newest = projects.write_facts("web", "run-1", "web01", &json!({"ansible_kernel": "5.4"}));

    let caches = sort_by_recency(find_caches(projects.root()));
    assert_eq!(caches.last().map(|p| p.as_path()), newest.parent());

    let documents = load_cache_dirs(&caches);
    assert_eq!(documents["web01"].summary.kernel.as_deref(), Some("5.4"));
}

// ============================================================================
// Merge-Upsert Engine
// ============================================================================

#[test]
fn test_idempotent_reingestion() {
    let projects = TestProjects::new();
    projects.write_facts("web", "run-1", "web01", &debian_facts("web01"));
    let mut session = memory_session();

    let first = collect(&mut session, projects.root()).unwrap();
    assert_eq!(first, vec!["web01"]);
    let stamped = get_document(&session, "web01").unwrap().unwrap().last_modified;

    let second = collect(&mut session, projects.root()).unwrap();
    assert!(second.is_empty());
    let restamped = get_document(&session, "web01").unwrap().unwrap().last_modified;
    assert_eq!(stamped, restamped);
}

#[test]
fn test_merge_is_union_with_override() {
    let mut session = memory_session();
    store_facts(&mut session, &batch(vec![("host1", json!({"a": 1, "b": 2}))])).unwrap();

    let updated =
        store_facts(&mut session, &batch(vec![("host1", json!({"b": 3, "c": 4}))])).unwrap();
    assert_eq!(updated, vec!["host1"]);

    let stored = get_document(&session, "host1").unwrap().unwrap();
    assert_eq!(stored.raw_facts, facts(json!({"a": 1, "b": 3, "c": 4})));
}

#[test]
fn test_merge_refreshes_summary_and_timestamp() {
    let mut session = memory_session();
    store_facts(&mut session, &batch(vec![("web01", debian_facts("web01"))])).unwrap();
    let before = get_document(&session, "web01").unwrap().unwrap();

    store_facts(
        &mut session,
        &batch(vec![("web01", json!({"ansible_distribution_version": "24.04"}))]),
    )
    .unwrap();
    let after = get_document(&session, "web01").unwrap().unwrap();

    assert_eq!(after.summary.distribution_version.as_deref(), Some("24.04"));
    assert_eq!(after.summary.os_family.as_deref(), Some("Debian"));
    assert!(after.last_modified > before.last_modified);
}

/// Repository whose reads predate a concurrent writer's insert.
struct StaleView<'r> {
    inner: SqliteRepository<'r>,
    inserts: Cell<usize>,
}

impl FactRepository for StaleView<'_> {
    fn find(&self, _identity: &str) -> Result<Option<FactDocument>> {
        Ok(None)
    }

    fn insert(&self, document: &FactDocument) -> Result<()> {
        self.inner.insert(document)?;
        self.inserts.set(self.inserts.get() + 1);
        Ok(())
    }

    fn update(&self, document: &FactDocument) -> Result<()> {
        self.inner.update(document)
    }
}

#[test]
fn test_concurrent_insert_conflict_does_not_abort_batch() {
    let mut session = memory_session();
    let tx = session.transaction().unwrap();
    let repo = StaleView {
        inner: SqliteRepository::new(&tx),
        inserts: Cell::new(0),
    };

    // Two candidates resolving to the same new identity, plus an unrelated one
    let mut documents = HostDocuments::new();
    documents.insert("web01".into(), FactDocument::new("web01", facts(json!({"run": 1}))));
    documents.insert("WEB01".into(), FactDocument::new("WEB01", facts(json!({"run": 2}))));
    documents.insert("db01".into(), FactDocument::new("db01", facts(json!({"run": 3}))));

    let updated = upsert_documents(&repo, &documents).unwrap();
    assert_eq!(repo.inserts.get(), 2);
    assert_eq!(updated, vec!["web01", "db01"]);
    tx.commit().unwrap();

    // The first writer's facts survive
    let stored = get_document(&session, "web01").unwrap().unwrap();
    assert_eq!(stored.raw_facts, facts(json!({"run": 1})));
}

#[test]
fn test_losing_insert_is_reported_as_conflict() {
    let mut session = memory_session();
    let tx = session.transaction().unwrap();
    let repo = StaleView {
        inner: SqliteRepository::new(&tx),
        inserts: Cell::new(0),
    };

    let first = FactDocument::new("web01", facts(json!({"run": 1})));
    let second = FactDocument::new("web01", facts(json!({"run": 2})));

    assert_eq!(upsert_document(&repo, &first).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(upsert_document(&repo, &second).unwrap(), UpsertOutcome::Conflict);
    assert_eq!(repo.inserts.get(), 1);
}

#[test]
fn test_fatal_store_error_commits_nothing() {
    let mut session = memory_session();
    session
        .connection()
        .execute(
            "INSERT INTO host_facts (identity, facts, last_modified) VALUES ('zz', '[1]', ?1)",
            rusqlite::params![chrono::Utc::now()],
        )
        .unwrap();

    let documents = batch(vec![
        ("aa", json!({"ansible_os_family": "Debian"})),
        ("zz", json!({"ansible_os_family": "RedHat"})),
    ]);
    let err = store_facts(&mut session, &documents).unwrap_err();
    assert!(matches!(err, Error::CorruptFacts { ref identity, .. } if identity == "zz"));

    // The insert of "aa" was rolled back with the rest of the batch
    assert_eq!(list_hosts(&session).unwrap(), vec!["zz"]);
}

// ============================================================================
// Query Engine
// ============================================================================

fn seeded() -> ark::facts::Session {
    let mut session = memory_session();
    store_facts(
        &mut session,
        &batch(vec![
            ("web01", debian_facts("web01")),
            ("db01", json!({"ansible_os_family": "RedHat", "os": "linux"})),
        ]),
    )
    .unwrap();
    session
}

#[test]
fn test_exact_query_is_case_insensitive() {
    let session = seeded();
    let upper: Vec<_> = query_host_facts(
        &session,
        "web01",
        Some(KeyFilter::new("OS_Family", MatchMode::Exact)),
    )
    .unwrap()
    .collect();
    let lower: Vec<_> = query_host_facts(
        &session,
        "web01",
        Some(KeyFilter::new("os_family", MatchMode::Exact)),
    )
    .unwrap()
    .collect();
    assert_eq!(upper, lower);
}

#[test]
fn test_fuzzy_key_matching_is_bidirectional() {
    let session = seeded();
    let keys = |host: &str, filter: &str| -> Vec<String> {
        query_host_facts(&session, host, Some(KeyFilter::new(filter, MatchMode::Fuzzy)))
            .unwrap()
            .map(|(key, _)| key)
            .collect()
    };

    assert_eq!(
        keys("web01", "distribution"),
        vec!["ansible_distribution", "ansible_distribution_version"]
    );
    // A short stored key inside a longer filter
    assert_eq!(keys("db01", "ansible_os_family"), vec!["ansible_os_family", "os"]);
}

#[test]
fn test_list_valued_fact_returns_first_matching_element() {
    let session = seeded();
    let found: Vec<HostMatch> = query_hosts_by_fact(&session, "mounts", json!("sdb"), MatchMode::Exact)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].identity, "web01");
    assert_eq!(found[0].matches.len(), 1);
    assert_eq!(found[0].matches["mounts"], json!("/dev/sdb1"));
}

#[test]
fn test_find_matches_non_string_values() {
    let mut session = memory_session();
    store_facts(
        &mut session,
        &batch(vec![
            ("web01", json!({"ansible_processor_vcpus": 4, "virtual": true})),
            ("web02", json!({"ansible_processor_vcpus": 16, "virtual": false})),
        ]),
    )
    .unwrap();

    let hosts = |key: &str, value: serde_json::Value| -> Vec<String> {
        query_hosts_by_fact(&session, key, value, MatchMode::Exact)
            .unwrap()
            .map(|m| m.unwrap().identity)
            .collect()
    };
    assert_eq!(hosts("virtual", json!(true)), vec!["web01"]);
    // Non-string values match on their JSON text
    assert_eq!(hosts("ansible_processor_vcpus", json!(16)), vec!["web02"]);
}

#[test]
fn test_unknown_host_yields_empty() {
    let session = seeded();
    assert_eq!(query_host_facts(&session, "nobody", None).unwrap().count(), 0);
    assert_eq!(
        query_host_facts(&session, "nobody", Some(KeyFilter::new("os", MatchMode::Fuzzy)))
            .unwrap()
            .count(),
        0
    );
}

#[test]
fn test_find_scan_skips_hosts_removed_mid_iteration() {
    let session = seeded();
    let mut scan =
        query_hosts_by_fact(&session, "ansible_os_family", json!("e"), MatchMode::Exact).unwrap();
    // db01 sorts first; remove web01 before the scan reaches it
    let first = scan.next().unwrap().unwrap();
    assert_eq!(first.identity, "db01");
    assert!(ark::facts::remove_host(&session, "web01").unwrap());
    assert!(scan.next().is_none());
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn test_file_store_is_shared_between_sessions() {
    let projects = TestProjects::new();
    let database = Database::open(&projects.db_url()).unwrap();

    {
        let mut writer = database.session().unwrap();
        store_facts(&mut writer, &batch(vec![("web01", debian_facts("web01"))])).unwrap();
    }

    let reader = database.session().unwrap();
    assert_eq!(list_hosts(&reader).unwrap(), vec!["web01"]);
    assert!(projects.root().join("ark.db").is_file());
}

#[test]
fn test_store_directory_is_created() {
    let projects = TestProjects::new();
    let url = format!("sqlite://{}", projects.root().join("nested/dir/ark.db").display());
    Database::open(&url).unwrap();
    assert!(projects.root().join("nested/dir/ark.db").is_file());
}

#[test]
fn test_non_sqlite_url_is_rejected() {
    assert!(Database::open("postgres://localhost/ark").is_err());
}

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 /._-]{0,16}".prop_map(serde_json::Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_raw_facts_round_trip(
        entries in prop::collection::btree_map("[a-z_]{1,12}", json_value(), 0..8)
    ) {
        let raw: ark::facts::FactMap = entries.into_iter().collect();
        let mut session = memory_session();
        let mut documents = HostDocuments::new();
        documents.insert("host".into(), FactDocument::new("host", raw.clone()));
        store_facts(&mut session, &documents).unwrap();

        let stored = get_document(&session, "host").unwrap().unwrap();
        prop_assert_eq!(stored.raw_facts, raw);
    }

    #[test]
    fn prop_merge_is_union_with_override(
        first in prop::collection::btree_map("[a-z_]{1,8}", json_leaf(), 0..6),
        second in prop::collection::btree_map("[a-z_]{1,8}", json_leaf(), 0..6),
    ) {
        let first: ark::facts::FactMap = first.into_iter().collect();
        let second: ark::facts::FactMap = second.into_iter().collect();
        let mut session = memory_session();

        let mut documents = HostDocuments::new();
        documents.insert("host".into(), FactDocument::new("host", first.clone()));
        store_facts(&mut session, &documents).unwrap();
        documents.insert("host".into(), FactDocument::new("host", second.clone()));
        store_facts(&mut session, &documents).unwrap();

        let stored = get_document(&session, "host").unwrap().unwrap().raw_facts;
        prop_assert_eq!(stored.len(), first.keys().chain(second.keys()).collect::<std::collections::BTreeSet<_>>().len());
        for (key, value) in &second {
            prop_assert_eq!(stored.get(key), Some(value));
        }
        for (key, value) in first.iter().filter(|(key, _)| !second.contains_key(*key)) {
            prop_assert_eq!(stored.get(key), Some(value));
        }
    }
}

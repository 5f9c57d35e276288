//! Fact store and fact queries for Ark
//!
//! Playbook runs leave per-host fact snapshots behind in `fact_cache`
//! directories. This module finds those snapshots, normalizes them into
//! [`FactDocument`]s, stores them with insert/merge/skip semantics, and answers
//! exact and fuzzy key/value queries over the stored corpus.
//!
//! ## Write path
//!
//! ```text
//! find_caches ──▶ sort_by_recency ──▶ load_cache_dirs ──▶ store_facts
//!  (discovery)       (discovery)          (ingest)          (upsert)
//! ```
//!
//! ## Read path
//!
//! [`query_host_facts`] and [`query_hosts_by_fact`] operate on stored documents
//! independently of the write path. Both take an explicit [`Session`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use ark::facts::{collect, query_host_facts, Database, KeyFilter, MatchMode};
//!
//! let database = Database::open("sqlite:///srv/ark/ark.db")?;
//! let mut session = database.session()?;
//! let updated = collect(&mut session, std::path::Path::new("/srv/ark"))?;
//!
//! for (key, value) in query_host_facts(&session, "web01", Some(KeyFilter::new("os", MatchMode::Fuzzy)))? {
//!     println!("{key}: {value}");
//! }
//! ```

pub mod discovery;
pub mod document;
pub mod ingest;
pub mod matching;
pub mod query;
pub mod store;
pub mod upsert;

use std::path::Path;

pub use discovery::{find_caches, project_caches, sort_by_recency, FACT_CACHE_DIR};
pub use document::{normalize_identity, FactDocument, FactMap, FactSummary};
pub use ingest::{load_cache_dir, load_cache_dirs, HostDocuments};
pub use matching::{keys_match, match_value, parse_target_value, MatchMode};
pub use query::{
    get_document, host_summaries, list_hosts, query_host_facts, query_hosts_by_fact, remove_host,
    HostMatch, HostSummary, KeyFilter,
};
pub use store::{Database, DatabaseTarget, FactRepository, Session, SqliteRepository};
pub use upsert::{store_facts, upsert_document, upsert_documents, UpsertOutcome};

use crate::error::Result;

/// Discover, ingest and store every fact cache below `root`.
///
/// Caches are ingested oldest first, so the newest snapshot of a host wins.
/// Returns the identities that were inserted or changed.
pub fn collect(session: &mut Session, root: &Path) -> Result<Vec<String>> {
    let caches = sort_by_recency(find_caches(root));
    let documents = load_cache_dirs(&caches);
    store_facts(session, &documents)
}

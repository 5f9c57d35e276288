//! The fact store's write path.
//!
//! For each candidate document the engine looks up the stored document with
//! the same identity and then inserts it, merges it, or leaves it alone:
//!
//! | Stored document        | Action                                  |
//! |------------------------|-----------------------------------------|
//! | none                   | insert as-is                            |
//! | facts differ           | overlay new keys onto stored, refresh   |
//! | facts identical        | nothing                                 |
//!
//! A uniqueness conflict on insert means another writer got there first; the
//! insert is rolled back, logged, and the batch moves on.

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use super::document::{next_timestamp, FactDocument};
use super::ingest::HostDocuments;
use super::store::{FactRepository, Session, SqliteRepository};
use crate::error::Result;

/// What happened to one candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No stored document existed; the candidate was inserted
    Inserted,
    /// The stored document was merged with the candidate
    Merged,
    /// The stored document already had these facts
    Unchanged,
    /// Another writer inserted the identity first
    Conflict,
}

impl UpsertOutcome {
    /// Whether the stored state changed
    pub fn is_update(self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Merged)
    }
}

/// Apply one candidate document through a repository.
pub fn upsert_document<R: FactRepository + ?Sized>(
    repo: &R,
    candidate: &FactDocument,
) -> Result<UpsertOutcome> {
    match repo.find(&candidate.identity)? {
        None => {
            let mut document = candidate.clone();
            document.last_modified = next_timestamp(None);
            match repo.insert(&document) {
                Ok(()) => {
                    debug!("Inserted facts for '{}'", document.identity);
                    Ok(UpsertOutcome::Inserted)
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{}; dropping this update", e);
                    Ok(UpsertOutcome::Conflict)
                }
                Err(e) => Err(e),
            }
        }
        Some(mut existing) => {
            let merged = existing.merged_facts(&candidate.raw_facts);
            if merged == existing.raw_facts {
                debug!("Facts unchanged for '{}'", existing.identity);
                return Ok(UpsertOutcome::Unchanged);
            }
            existing.set_facts(merged);
            existing.last_modified = next_timestamp(Some(existing.last_modified));
            repo.update(&existing)?;
            debug!("Merged facts for '{}'", existing.identity);
            Ok(UpsertOutcome::Merged)
        }
    }
}

/// Apply a batch of candidates; returns the identities that changed, without
/// duplicates, in first-change order.
pub fn upsert_documents<R: FactRepository + ?Sized>(
    repo: &R,
    documents: &HostDocuments,
) -> Result<Vec<String>> {
    let mut updated = IndexSet::new();
    for (key, candidate) in documents {
        debug!("Processing '{}' as '{}'", key, candidate.identity);
        if upsert_document(repo, candidate)?.is_update() {
            updated.insert(candidate.identity.clone());
        }
    }
    Ok(updated.into_iter().collect())
}

/// Store a batch of candidate documents in one transaction.
///
/// Conflicts are recovered per host; any other persistence error aborts the
/// batch and nothing is committed.
pub fn store_facts(session: &mut Session, documents: &HostDocuments) -> Result<Vec<String>> {
    let tx = session.transaction()?;
    let updated = upsert_documents(&SqliteRepository::new(&tx), documents)?;
    tx.commit()?;
    info!(
        "Stored facts for {} host(s); {} new or changed",
        documents.len(),
        updated.len()
    );
    Ok(updated)
}

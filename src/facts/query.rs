//! Read-only queries over stored fact documents.
//!
//! Both queries return lazy iterators borrowing the session. Running a query
//! again re-reads storage; nothing is cached between calls. Unknown hosts and
//! unmatched keys produce empty results, never errors.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::document::{normalize_identity, FactDocument, FactMap, FactSummary};
use super::matching::{keys_match, match_value, MatchMode};
use super::store::{delete_document, fetch_document, fetch_identities, fetch_summaries, Session};
use crate::error::Result;

/// Optional key filter for a single-host query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    /// Key (or key fragment) to look for
    pub key: String,
    /// How keys are compared
    pub mode: MatchMode,
}

impl KeyFilter {
    /// Create a filter
    pub fn new(key: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            key: key.into(),
            mode,
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        keys_match(candidate, &self.key, self.mode)
    }
}

/// Key/value pairs of one host's facts, in stored order.
pub struct HostFacts {
    entries: indexmap::map::IntoIter<String, JsonValue>,
    filter: Option<KeyFilter>,
}

impl Iterator for HostFacts {
    type Item = (String, JsonValue);

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter.as_ref();
        self.entries
            .by_ref()
            .find(|(key, _)| filter.map_or(true, |f| f.accepts(key)))
    }
}

/// Query one host's facts, optionally filtered by key.
///
/// The host identity is normalized before lookup. A missing host yields an
/// empty sequence.
pub fn query_host_facts(
    session: &Session,
    identity: &str,
    filter: Option<KeyFilter>,
) -> Result<HostFacts> {
    let identity = normalize_identity(identity);
    let entries = match fetch_document(session.connection(), &identity)? {
        Some(document) => document.raw_facts,
        None => {
            debug!("Host '{}' not found.", identity);
            FactMap::new()
        }
    };

    Ok(HostFacts {
        entries: entries.into_iter(),
        filter,
    })
}

/// One host's matches from a cross-host search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostMatch {
    /// Host identity
    pub identity: String,
    /// Matched keys and the value (or list element) that matched
    pub matches: IndexMap<String, JsonValue>,
}

/// Collect the matching keys of one document.
pub fn match_document(
    facts: &FactMap,
    key: &str,
    value: &JsonValue,
    mode: MatchMode,
) -> IndexMap<String, JsonValue> {
    facts
        .iter()
        .filter(|(fact_key, _)| keys_match(fact_key, key, mode))
        .filter_map(|(fact_key, fact_value)| {
            match_value(fact_value, value).map(|matched| (fact_key.clone(), matched.clone()))
        })
        .collect()
}

/// Lazy scan over every stored document for a key/value pair.
pub struct HostsByFact<'s> {
    session: &'s Session,
    identities: std::vec::IntoIter<String>,
    key: String,
    value: JsonValue,
    mode: MatchMode,
}

impl HostsByFact<'_> {
    fn scan_next(&mut self) -> Result<Option<HostMatch>> {
        for identity in self.identities.by_ref() {
            // Removed since the scan started
            let Some(document) = fetch_document(self.session.connection(), &identity)? else {
                continue;
            };
            let matches = match_document(&document.raw_facts, &self.key, &self.value, self.mode);
            if !matches.is_empty() {
                return Ok(Some(HostMatch {
                    identity: document.identity,
                    matches,
                }));
            }
        }
        Ok(None)
    }
}

impl Iterator for HostsByFact<'_> {
    type Item = Result<HostMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan_next().transpose()
    }
}

/// Search every stored host for facts whose key matches `key` and whose value
/// contains `value`.
pub fn query_hosts_by_fact<'s>(
    session: &'s Session,
    key: &str,
    value: JsonValue,
    mode: MatchMode,
) -> Result<HostsByFact<'s>> {
    let identities = fetch_identities(session.connection())?;
    debug!("Scanning {} host(s) for '{}'", identities.len(), key);
    Ok(HostsByFact {
        session,
        identities: identities.into_iter(),
        key: key.to_string(),
        value,
        mode,
    })
}

/// Fetch a full document by identity.
pub fn get_document(session: &Session, identity: &str) -> Result<Option<FactDocument>> {
    fetch_document(session.connection(), &normalize_identity(identity))
}

/// Remove a host by identity; `false` when it was not stored.
pub fn remove_host(session: &Session, identity: &str) -> Result<bool> {
    let identity = normalize_identity(identity);
    let removed = delete_document(session.connection(), &identity)?;
    if removed {
        debug!("Removed host '{}' from the database.", identity);
    } else {
        debug!("Host '{}' not found.", identity);
    }
    Ok(removed)
}

/// All stored identities, sorted.
pub fn list_hosts(session: &Session) -> Result<Vec<String>> {
    fetch_identities(session.connection())
}

/// Tabular view of one stored host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSummary {
    /// Host identity
    pub identity: String,
    /// Denormalized summary fields
    #[serde(flatten)]
    pub summary: FactSummary,
    /// Time of the last accepted write
    pub last_modified: DateTime<Utc>,
}

/// Summaries of every stored host, sorted by identity.
pub fn host_summaries(session: &Session) -> Result<Vec<HostSummary>> {
    Ok(fetch_summaries(session.connection())?
        .into_iter()
        .map(|(identity, summary, last_modified)| HostSummary {
            identity,
            summary,
            last_modified,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::ingest::HostDocuments;
    use crate::facts::store::Database;
    use crate::facts::upsert::store_facts;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn seeded_session() -> Session {
        let mut session = Database::open(":memory:").unwrap().session().unwrap();
        let mut documents = HostDocuments::new();
        for (identity, facts) in [
            (
                "web01",
                json!({
                    "ansible_os_family": "Debian",
                    "ansible_distribution_version": "22.04",
                    "mounts": ["/dev/sda1", "/dev/sdb1"]
                }),
            ),
            (
                "db01",
                json!({"ansible_os_family": "RedHat", "mounts": ["/dev/nvme0n1p1"]}),
            ),
        ] {
            let facts: FactMap = serde_json::from_value(facts).unwrap();
            documents.insert(identity.to_string(), FactDocument::new(identity, facts));
        }
        store_facts(&mut session, &documents).unwrap();
        session
    }

    #[test]
    fn test_query_all_keys_in_stored_order() {
        let session = seeded_session();
        let keys: Vec<String> = query_host_facts(&session, "web01", None)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec!["ansible_os_family", "ansible_distribution_version", "mounts"]
        );
    }

    #[test]
    fn test_query_exact_is_case_insensitive() {
        let session = seeded_session();
        let upper: Vec<_> = query_host_facts(
            &session,
            "WEB01",
            Some(KeyFilter::new("ANSIBLE_OS_FAMILY", MatchMode::Exact)),
        )
        .unwrap()
        .collect();
        let lower: Vec<_> = query_host_facts(
            &session,
            "web01",
            Some(KeyFilter::new("ansible_os_family", MatchMode::Exact)),
        )
        .unwrap()
        .collect();
        assert_eq!(upper, lower);
        assert_eq!(upper, vec![("ansible_os_family".to_string(), json!("Debian"))]);
    }

    #[test]
    fn test_query_fuzzy_key() {
        let session = seeded_session();
        let found: Vec<_> = query_host_facts(
            &session,
            "web01",
            Some(KeyFilter::new("distribution", MatchMode::Fuzzy)),
        )
        .unwrap()
        .collect();
        assert_eq!(
            found,
            vec![("ansible_distribution_version".to_string(), json!("22.04"))]
        );
    }

    #[test]
    fn test_unknown_host_is_empty() {
        let session = seeded_session();
        assert_eq!(query_host_facts(&session, "nope", None).unwrap().count(), 0);
    }

    #[test]
    fn test_query_is_restartable() {
        let session = seeded_session();
        let first = query_host_facts(&session, "db01", None).unwrap().count();
        let second = query_host_facts(&session, "db01", None).unwrap().count();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_list_element() {
        let session = seeded_session();
        let found: Vec<HostMatch> =
            query_hosts_by_fact(&session, "mounts", json!("sdb"), MatchMode::Exact)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identity, "web01");
        assert_eq!(found[0].matches["mounts"], json!("/dev/sdb1"));
    }

    #[test]
    fn test_find_fuzzy_key_across_hosts() {
        let session = seeded_session();
        let found: Vec<HostMatch> =
            query_hosts_by_fact(&session, "os_family", json!("Hat"), MatchMode::Fuzzy)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identity, "db01");
        assert_eq!(found[0].matches.len(), 1);
    }

    #[test]
    fn test_find_no_match_is_empty() {
        let session = seeded_session();
        let found = query_hosts_by_fact(&session, "mounts", json!("sdz"), MatchMode::Fuzzy)
            .unwrap()
            .count();
        assert_eq!(found, 0);
    }

    #[test]
    fn test_remove_and_list() {
        let session = seeded_session();
        assert_eq!(list_hosts(&session).unwrap(), vec!["db01", "web01"]);
        assert!(remove_host(&session, "DB01").unwrap());
        assert!(!remove_host(&session, "db01").unwrap());
        assert_eq!(list_hosts(&session).unwrap(), vec!["web01"]);
    }

    #[test]
    fn test_host_summaries() {
        let session = seeded_session();
        let summaries = host_summaries(&session).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].identity, "web01");
        assert_eq!(summaries[1].summary.os_family.as_deref(), Some("Debian"));
        assert_eq!(
            summaries[1].summary.distribution_version.as_deref(),
            Some("22.04")
        );
    }
}

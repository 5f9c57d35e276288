//! The canonical per-host fact record.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Schema-less fact payload, kept in the order keys appeared in the source blob.
pub type FactMap = IndexMap<String, JsonValue>;

/// Fact keys that may carry the host identity, most specific first.
const IDENTITY_KEYS: &[&str] = &["fqdn", "hostname"];

/// Normalize a host identity: trimmed, lower-cased, spaces as underscores.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Look up a well-known fact either as a top-level `ansible_<name>` key or as
/// `<name>` inside a nested `ansible_facts` mapping.
pub fn well_known_fact<'a>(facts: &'a FactMap, name: &str) -> Option<&'a JsonValue> {
    facts.get(&format!("ansible_{name}")).or_else(|| {
        facts
            .get("ansible_facts")
            .and_then(JsonValue::as_object)
            .and_then(|nested| nested.get(name))
    })
}

fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn summary_field(facts: &FactMap, name: &str) -> Option<String> {
    well_known_fact(facts, name).and_then(scalar_string)
}

fn address_field(facts: &FactMap, name: &str) -> Option<String> {
    well_known_fact(facts, name)
        .and_then(|v| v.get("address"))
        .and_then(scalar_string)
}

/// Denormalized fields extracted once at ingestion for tabular display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSummary {
    /// Distribution name (e.g. `Ubuntu`)
    pub distribution: Option<String>,
    /// Distribution version (e.g. `22.04`)
    pub distribution_version: Option<String>,
    /// OS family (e.g. `Debian`)
    pub os_family: Option<String>,
    /// Kernel release
    pub kernel: Option<String>,
    /// CPU architecture
    pub architecture: Option<String>,
    /// Primary IPv4 address
    pub ipv4_address: Option<String>,
    /// Primary IPv6 address
    pub ipv6_address: Option<String>,
}

impl FactSummary {
    /// Extract summary fields from well-known fact keys, leaving absent ones unset
    pub fn from_facts(facts: &FactMap) -> Self {
        Self {
            distribution: summary_field(facts, "distribution"),
            distribution_version: summary_field(facts, "distribution_version"),
            os_family: summary_field(facts, "os_family"),
            kernel: summary_field(facts, "kernel"),
            architecture: summary_field(facts, "architecture"),
            ipv4_address: address_field(facts, "default_ipv4"),
            ipv6_address: address_field(facts, "default_ipv6"),
        }
    }
}

/// One host's facts, uniquely keyed by `identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDocument {
    /// Stable host identifier (FQDN or hostname)
    pub identity: String,
    /// Denormalized summary fields
    pub summary: FactSummary,
    /// Full fact payload
    pub raw_facts: FactMap,
    /// Time of the last accepted write
    pub last_modified: DateTime<Utc>,
}

impl FactDocument {
    /// Create a document for an explicit identity
    pub fn new(identity: &str, raw_facts: FactMap) -> Self {
        Self {
            identity: normalize_identity(identity),
            summary: FactSummary::from_facts(&raw_facts),
            raw_facts,
            last_modified: Utc::now(),
        }
    }

    /// Create a document from a cached snapshot.
    ///
    /// The identity comes from the facts themselves when they name the host,
    /// otherwise from the snapshot's file key. `last_modified` is restamped
    /// when the document is written.
    pub fn from_snapshot(file_key: &str, raw_facts: FactMap) -> Self {
        let identity = IDENTITY_KEYS
            .iter()
            .find_map(|name| summary_field(&raw_facts, name))
            .unwrap_or_else(|| file_key.to_string());

        Self::new(&identity, raw_facts)
    }

    /// Serialize the fact payload for storage
    pub fn facts_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.raw_facts)?)
    }

    /// Deserialize a stored fact payload; anything but a mapping is rejected
    pub fn parse_facts(identity: &str, json: &str) -> Result<FactMap> {
        serde_json::from_str(json).map_err(|source| Error::CorruptFacts {
            identity: identity.to_string(),
            source,
        })
    }

    /// Union-with-override: existing keys are kept, incoming keys replace them
    pub fn merged_facts(&self, incoming: &FactMap) -> FactMap {
        let mut merged = self.raw_facts.clone();
        for (key, value) in incoming {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Replace the payload and re-derive the summary fields
    pub fn set_facts(&mut self, raw_facts: FactMap) {
        self.summary = FactSummary::from_facts(&raw_facts);
        self.raw_facts = raw_facts;
    }
}

/// Next write timestamp for an identity: now, but strictly after `previous`.
pub fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

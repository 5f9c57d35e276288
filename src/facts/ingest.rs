//! Turning raw per-host fact files into [`FactDocument`]s.
//!
//! Each regular file inside a fact cache holds one host's JSON fact blob and is
//! named after that host. Files that cannot be parsed are skipped with a
//! warning; they never abort their siblings.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::document::{normalize_identity, FactDocument, FactMap};
use crate::error::{Error, Result};

/// Candidate documents keyed by their filename-derived key.
pub type HostDocuments = IndexMap<String, FactDocument>;

/// Key derived from a fact file's name: lower-cased, spaces as underscores.
pub fn file_key(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(normalize_identity)
        .filter(|key| !key.is_empty())
}

/// Parse the contents of one fact file. Empty content is an empty mapping.
pub fn parse_fact_blob(path: &Path, content: &str) -> Result<FactMap> {
    if content.trim().is_empty() {
        return Ok(FactMap::new());
    }
    serde_json::from_str::<FactMap>(content).map_err(|e| Error::fact_parse(path, e.to_string()))
}

/// Read and parse a single fact file into a document.
pub fn load_fact_file(path: &Path) -> Result<(String, FactDocument)> {
    let key = file_key(path)
        .ok_or_else(|| Error::fact_parse(path, "file name is not valid UTF-8"))?;

    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let content = String::from_utf8(bytes)
        .map_err(|_| Error::fact_parse(path, "content is not valid UTF-8"))?;
    let raw_facts = parse_fact_blob(path, &content)?;

    let document = FactDocument::from_snapshot(&key, raw_facts);
    Ok((key, document))
}

fn fact_files(cache_dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping fact cache {}: {}", cache_dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect();
    files.sort();
    files
}

/// Load every host snapshot from one fact cache directory.
pub fn load_cache_dir(cache_dir: &Path) -> HostDocuments {
    let mut documents = HostDocuments::new();
    load_into(cache_dir, &mut documents);
    documents
}

/// Load every host snapshot from several caches, in the order given.
///
/// When two files share a key, the one processed last wins; callers wanting
/// the newest snapshot should pass caches through
/// [`sort_by_recency`](super::discovery::sort_by_recency) first.
pub fn load_cache_dirs<P: AsRef<Path>>(cache_dirs: &[P]) -> HostDocuments {
    let mut documents = HostDocuments::new();
    for cache_dir in cache_dirs {
        load_into(cache_dir.as_ref(), &mut documents);
    }
    debug!(
        "Found facts for: {:?}",
        documents.keys().collect::<Vec<_>>()
    );
    documents
}

fn load_into(cache_dir: &Path, documents: &mut HostDocuments) {
    debug!("Reading fact cache: {}", cache_dir.display());
    for path in fact_files(cache_dir) {
        match load_fact_file(&path) {
            Ok((key, document)) => {
                if documents.contains_key(&key) {
                    debug!("Replacing earlier snapshot for '{}' with {}", key, path.display());
                }
                documents.insert(key, document);
            }
            Err(e) => warn!("Skipping fact file: {}", e),
        }
    }
}

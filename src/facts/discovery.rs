//! Locating fact caches left behind by playbook runs.
//!
//! The automation runner writes one `fact_cache` directory per run, under
//! `<project>/artifacts/<run-id>/fact_cache`. Discovery searches for that
//! directory name anywhere below a root and only reads the filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;

/// Directory name the runner uses for per-run fact snapshots.
pub const FACT_CACHE_DIR: &str = "fact_cache";

/// Path components that are never searched.
const IGNORED_COMPONENTS: &[&str] = &["logs"];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_COMPONENTS.contains(&name))
}

fn is_fact_cache(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str() == Some(FACT_CACHE_DIR)
}

/// Find every fact-cache directory below `root`, recursively.
///
/// A missing root yields an empty result. Discovered caches are not searched
/// further. Results follow file-name order of the walk.
pub fn find_caches(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!("Fact cache root does not exist: {}", root.display());
        return Vec::new();
    }

    info!("Loading facts from: {}", root.display());

    let mut caches = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };

        if is_ignored(&entry) {
            walker.skip_current_dir();
            continue;
        }

        if is_fact_cache(&entry) {
            caches.push(entry.into_path());
            walker.skip_current_dir();
        }
    }

    debug!("Found {} fact cache(s)", caches.len());
    caches
}

/// Find the fact caches of a single project.
pub fn project_caches(config: &Config, project: &str) -> Vec<PathBuf> {
    find_caches(&config.projects_dir().join(project))
}

/// Order caches oldest-modified first so the newest snapshot of a host is
/// ingested last. Caches that vanished since discovery are dropped.
pub fn sort_by_recency(caches: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut stamped: Vec<(SystemTime, PathBuf)> = caches
        .into_iter()
        .filter_map(|path| match path.metadata().and_then(|m| m.modified()) {
            Ok(modified) => Some((modified, path)),
            Err(e) => {
                debug!("Dropping fact cache {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    stamped.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    stamped.into_iter().map(|(_, path)| path).collect()
}

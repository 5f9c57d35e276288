//! Play recap reports from runner artifacts.
//!
//! Each playbook run leaves an artifact directory under
//! `<project>/artifacts/<run-id>/` holding the run's `stdout` and the
//! `command` that produced it. Reports pull the `PLAY RECAP` blocks out of
//! `stdout` and present per-host counters.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::project::validate_project_dir;

static PLAY_RECAP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)PLAY RECAP\s+\*+\s+(?P<recap>.*?)(\n\n|$)")
        .expect("Invalid play recap regex")
});

static PLAYBOOK_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"project/([\w-]+\.yml)").expect("Invalid playbook name regex"));

/// Per-host counters from one recap line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStats {
    /// Tasks that succeeded without change
    pub ok: u32,
    /// Tasks that changed the host
    pub changed: u32,
    /// Connection failures
    pub unreachable: u32,
    /// Tasks that failed
    pub failed: u32,
    /// Tasks skipped by a condition
    pub skipped: u32,
    /// Failures handled by a rescue block
    pub rescued: u32,
    /// Failures ignored by `ignore_errors`
    pub ignored: u32,
}

impl HostStats {
    fn set(&mut self, name: &str, value: u32) {
        match name {
            "ok" => self.ok = value,
            "changed" => self.changed = value,
            "unreachable" => self.unreachable = value,
            "failed" => self.failed = value,
            "skipped" => self.skipped = value,
            "rescued" => self.rescued = value,
            "ignored" => self.ignored = value,
            _ => {}
        }
    }

    /// True when the host failed or could not be reached
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.unreachable > 0
    }
}

/// Report for one artifact directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Artifact directory
    pub artifact: PathBuf,
    /// Playbook file name, when the command file names one
    pub playbook: Option<String>,
    /// Local completion time (`stdout` modification time)
    pub completed_at: Option<String>,
    /// Host counters across every recap in the run
    pub hosts: Vec<(String, HostStats)>,
}

/// Extract the body of every `PLAY RECAP` block.
pub fn extract_play_recaps(content: &str) -> Vec<String> {
    let recaps: Vec<String> = PLAY_RECAP_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.name("recap"))
        .map(|m| m.as_str().to_string())
        .collect();
    if recaps.is_empty() {
        warn!("Could not find play recap.");
    }
    recaps
}

/// Parse `host : ok=1 changed=0 ...` lines; malformed lines are skipped.
pub fn extract_host_stats(recap: &str) -> IndexMap<String, HostStats> {
    let mut hosts = IndexMap::new();
    for line in recap.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((host, stats)) = line.split_once(':') else {
            debug!("Skipping recap line without host separator: '{}'", line);
            continue;
        };
        let mut host_stats = HostStats::default();
        for token in stats.split_whitespace() {
            if let Some((name, value)) = token.split_once('=') {
                if let Ok(value) = value.parse() {
                    host_stats.set(name, value);
                }
            }
        }
        hosts.insert(host.trim().to_string(), host_stats);
    }
    hosts
}

#[derive(Deserialize)]
struct CommandFile {
    command: Vec<String>,
}

/// Pull the playbook file name out of a runner `command` file.
pub fn extract_playbook_name(command_json: &str) -> Option<String> {
    let command: CommandFile = match serde_json::from_str(command_json) {
        Ok(command) => command,
        Err(e) => {
            warn!("Could not parse command file: {}", e);
            return None;
        }
    };
    let joined = command.command.join(" ");
    PLAYBOOK_NAME_REGEX
        .captures(&joined)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Run directories of a project, newest first.
pub fn artifact_dirs(project_root: &Path) -> Vec<PathBuf> {
    let artifacts = project_root.join("artifacts");
    let entries = match fs::read_dir(&artifacts) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No artifacts at {}: {}", artifacts.display(), e);
            return Vec::new();
        }
    };
    let dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    sort_and_limit(dirs, None)
}

/// Sort newest first and keep the first `last` when `0 < last < len`.
pub fn sort_and_limit(mut dirs: Vec<PathBuf>, last: Option<usize>) -> Vec<PathBuf> {
    dirs.sort_by(|a, b| modified(b).cmp(&modified(a)).then_with(|| b.cmp(a)));
    if let Some(last) = last {
        if last > 0 && last < dirs.len() {
            dirs.truncate(last);
        }
    }
    dirs
}

/// Build the report for one artifact directory.
pub fn build_report(artifact: &Path) -> Result<RunReport> {
    let stdout_path = artifact.join("stdout");
    let content = fs::read_to_string(&stdout_path).map_err(|e| Error::io(&stdout_path, e))?;

    let completed_at = modified(&stdout_path)
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string());

    let playbook = fs::read_to_string(artifact.join("command"))
        .ok()
        .and_then(|content| extract_playbook_name(&content));

    let mut hosts: IndexMap<String, HostStats> = IndexMap::new();
    for recap in extract_play_recaps(&content) {
        hosts.extend(extract_host_stats(&recap));
    }

    Ok(RunReport {
        artifact: artifact.to_path_buf(),
        playbook,
        completed_at,
        hosts: hosts.into_iter().collect(),
    })
}

/// Reports for a validated project's most recent runs.
///
/// Artifact directories that cannot be read are skipped with a warning.
pub fn project_reports(projects_dir: &Path, project: &str, last: Option<usize>) -> Result<Vec<RunReport>> {
    let root = validate_project_dir(projects_dir, project)?;
    let dirs = sort_and_limit(artifact_dirs(&root), last);

    Ok(dirs
        .iter()
        .filter_map(|dir| match build_report(dir) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Skipping artifact {}: {}", dir.display(), e);
                None
            }
        })
        .collect())
}

//! Shared test utilities and fixtures for the Ark test suite.
//!
//! This module provides:
//! - Project scaffolds with the required layout
//! - Fact cache writers mimicking runner artifacts
//! - In-memory and file-backed fact store sessions
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ark::facts::{Database, FactMap, Session};
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// Projects
// ============================================================================

/// A projects root in a temporary directory.
pub struct TestProjects {
    pub dir: TempDir,
}

impl TestProjects {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create projects dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Database URL inside the projects root
    pub fn db_url(&self) -> String {
        format!("sqlite://{}", self.root().join("ark.db").display())
    }

    /// Create a project with every required directory and file.
    pub fn scaffold(&self, name: &str) -> PathBuf {
        let project = self.root().join(name);
        for dir in ["project", "inventory", "env"] {
            fs::create_dir_all(project.join(dir)).expect("create project dir");
        }
        fs::write(project.join("project/main.yml"), "---\n- hosts: all\n").expect("main.yml");
        fs::write(project.join("env/envvars"), "---\n").expect("envvars");
        fs::write(project.join("env/ssh_key"), "").expect("ssh_key");
        project
    }

    /// Write one host fact file into `<project>/artifacts/<run>/fact_cache/`.
    pub fn write_facts(&self, project: &str, run: &str, host: &str, facts: &Value) -> PathBuf {
        let cache = self
            .root()
            .join(project)
            .join("artifacts")
            .join(run)
            .join("fact_cache");
        fs::create_dir_all(&cache).expect("create fact cache");
        let path = cache.join(host);
        fs::write(&path, serde_json::to_string(facts).expect("serialize facts"))
            .expect("write fact file");
        path
    }

    /// Write the runner output of one run.
    pub fn write_run(&self, project: &str, run: &str, stdout: &str, playbook: &str) -> PathBuf {
        let artifact = self.root().join(project).join("artifacts").join(run);
        fs::create_dir_all(&artifact).expect("create artifact dir");
        fs::write(artifact.join("stdout"), stdout).expect("write stdout");
        let command = serde_json::json!({
            "command": ["ansible-playbook", format!("{}/project/{}", project, playbook)],
            "cwd": self.root().join(project),
        });
        fs::write(artifact.join("command"), command.to_string()).expect("write command");
        artifact
    }
}

impl Default for TestProjects {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fact Store
// ============================================================================

/// A session on a private in-memory store.
pub fn memory_session() -> Session {
    Database::open(":memory:")
        .expect("open in-memory store")
        .session()
        .expect("open session")
}

/// Build a fact map from a JSON object literal.
pub fn facts(value: Value) -> FactMap {
    serde_json::from_value(value).expect("fact literal must be an object")
}

/// Typical gathered facts for a Debian host.
pub fn debian_facts(hostname: &str) -> Value {
    serde_json::json!({
        "ansible_hostname": hostname,
        "ansible_os_family": "Debian",
        "ansible_distribution": "Ubuntu",
        "ansible_distribution_version": "22.04",
        "ansible_kernel": "5.15.0-91-generic",
        "ansible_architecture": "x86_64",
        "ansible_default_ipv4": {"address": "10.0.0.11", "interface": "eth0"},
        "ansible_mounts": [
            {"mount": "/", "device": "/dev/sda1"},
            {"mount": "/data", "device": "/dev/sdb1"}
        ],
        "mounts": ["/dev/sda1", "/dev/sdb1"]
    })
}

/// Sample runner output with one play recap.
pub const RUN_STDOUT: &str = "\
PLAY [all] *********************************************************************

TASK [Gathering Facts] *********************************************************
ok: [web01]
fatal: [db01]: UNREACHABLE! => {\"changed\": false}

PLAY RECAP *********************************************************************
web01                      : ok=3    changed=1    unreachable=0    failed=0    skipped=1    rescued=0    ignored=0
db01                       : ok=0    changed=0    unreachable=1    failed=0    skipped=0    rescued=0    ignored=0

";

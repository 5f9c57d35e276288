//! # Ark - Fact Store for Configuration-Management Runs
//!
//! Ark coordinates playbook runs against an inventory of hosts. Every run
//! leaves per-host fact snapshots in `fact_cache` directories; Ark collects
//! them into a single store and answers "what do we know about host X" and
//! "which hosts have fact K = V" questions.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │              (clap parsing, paging, human/JSON output)               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │   Discovery +   │   │   Merge-Upsert      │   │   Query Engine      │
//! │   Ingestion     │──▶│   Engine            │   │   (exact / fuzzy)   │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │                         │
//!                                    └────────────┬────────────┘
//!                                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Fact Store (SQLite, one row per host)                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use ark::prelude::*;
//!
//! let config = Config::load(None)?;
//! let database = Database::from_config(&config)?;
//! let mut session = database.session()?;
//!
//! let updated = collect(&mut session, config.projects_dir())?;
//! println!("{} host(s) changed", updated.len());
//!
//! for found in query_hosts_by_fact(&session, "os_family", "Debian".into(), MatchMode::Fuzzy)? {
//!     println!("{}", found?.identity);
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Commonly used types and functions.
    //!
    //! ```rust,ignore
    //! use ark::prelude::*;
    //! ```

    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::facts::{
        collect, find_caches, list_hosts, load_cache_dirs, query_host_facts, query_hosts_by_fact,
        remove_host, sort_by_recency, store_facts, Database, FactDocument, FactMap, HostMatch,
        KeyFilter, MatchMode, Session,
    };
    pub use crate::project::validate_project_dir;
}

// ============================================================================
// Error Handling
// ============================================================================

/// Error types and the crate-wide `Result` alias.
pub mod error;

// ============================================================================
// Configuration
// ============================================================================

/// Layered configuration: defaults, config files, environment, CLI flags.
pub mod config;

// ============================================================================
// Fact Store
// ============================================================================

/// Fact discovery, ingestion, storage and queries.
pub mod facts;

// ============================================================================
// Projects and Reports
// ============================================================================

/// Project name and directory layout validation.
pub mod project;

/// Play recap reports built from run artifacts.
pub mod report;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Ark.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

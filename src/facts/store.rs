//! SQLite-backed persistence for fact documents.
//!
//! Every fact-store operation runs inside one [`Session`], acquired from a
//! [`Database`] and released when the guard is dropped. The write path goes
//! through the [`FactRepository`] trait so the merge-upsert engine can be
//! exercised against any view of the store.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use super::document::{FactDocument, FactSummary};
use crate::config::Config;
use crate::error::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS host_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity TEXT NOT NULL UNIQUE,
    distribution TEXT,
    distribution_version TEXT,
    os_family TEXT,
    kernel TEXT,
    architecture TEXT,
    ipv4_address TEXT,
    ipv6_address TEXT,
    facts TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_host_facts_identity ON host_facts(identity);
"#;

const SUMMARY_COLUMNS: &str = "identity, distribution, distribution_version, os_family, kernel, \
     architecture, ipv4_address, ipv6_address";

/// Where the fact store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A database file
    File(PathBuf),
    /// A private in-memory database per session
    Memory,
}

impl DatabaseTarget {
    /// Parse a connection string.
    ///
    /// Accepts `sqlite:///abs/path.db`, `sqlite://rel/path.db`,
    /// `sqlite::memory:`, `:memory:`, or a bare path.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidDatabaseUrl(url.to_string()));
        }
        if url == ":memory:" || url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(DatabaseTarget::Memory);
        }
        if let Some(path) = url.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(Error::InvalidDatabaseUrl(url.to_string()));
            }
            return Ok(DatabaseTarget::File(PathBuf::from(path)));
        }
        if url.contains("://") {
            return Err(Error::InvalidDatabaseUrl(url.to_string()));
        }
        Ok(DatabaseTarget::File(PathBuf::from(url)))
    }
}

/// Handle on the configured fact store; hands out scoped sessions.
#[derive(Debug, Clone)]
pub struct Database {
    target: DatabaseTarget,
    busy_timeout: Duration,
}

impl Database {
    /// Open the store at `url`, creating the parent directory and schema.
    pub fn open(url: &str) -> Result<Self> {
        let target = DatabaseTarget::parse(url)?;
        debug!("Database URL: '{}'", url);

        if let DatabaseTarget::File(path) = &target {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                debug!("Ensuring parent directory exists: '{}'", parent.display());
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let database = Self {
            target,
            busy_timeout: Duration::from_secs(30),
        };
        // Fail early on an unusable store
        drop(database.session()?);
        Ok(database)
    }

    /// Open the store named by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(&config.database_url())
    }

    /// Acquire a session; it is released when dropped.
    pub fn session(&self) -> Result<Session> {
        let conn = match &self.target {
            DatabaseTarget::File(path) => Connection::open(path)?,
            DatabaseTarget::Memory => Connection::open_in_memory()?,
        };
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        debug!("Opened fact store session on {:?}", self.target);
        Ok(Session { conn })
    }
}

/// One scoped connection to the fact store.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Begin the single write transaction for a batch.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Read access to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Releasing fact store session");
    }
}

/// Write-path view of the store used by the merge-upsert engine.
pub trait FactRepository {
    /// Fetch the stored document for an identity
    fn find(&self, identity: &str) -> Result<Option<FactDocument>>;

    /// Insert a new document; a uniqueness violation is [`Error::Conflict`]
    fn insert(&self, document: &FactDocument) -> Result<()>;

    /// Overwrite the facts, summary and timestamp of an existing document
    fn update(&self, document: &FactDocument) -> Result<()>;
}

/// [`FactRepository`] over a SQLite connection or transaction.
pub struct SqliteRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepository<'c> {
    /// Wrap a connection; pass a transaction to batch writes
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl FactRepository for SqliteRepository<'_> {
    fn find(&self, identity: &str) -> Result<Option<FactDocument>> {
        fetch_document(self.conn, identity)
    }

    fn insert(&self, document: &FactDocument) -> Result<()> {
        let facts = document.facts_json()?;
        let summary = &document.summary;

        self.conn.execute_batch("SAVEPOINT fact_insert")?;
        let inserted = self.conn.execute(
            "INSERT INTO host_facts (identity, distribution, distribution_version, os_family, \
             kernel, architecture, ipv4_address, ipv6_address, facts, last_modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                document.identity,
                summary.distribution,
                summary.distribution_version,
                summary.os_family,
                summary.kernel,
                summary.architecture,
                summary.ipv4_address,
                summary.ipv6_address,
                facts,
                document.last_modified,
            ],
        );

        match inserted {
            Ok(_) => {
                self.conn.execute_batch("RELEASE fact_insert")?;
                Ok(())
            }
            Err(e) => {
                self.conn
                    .execute_batch("ROLLBACK TO fact_insert; RELEASE fact_insert")?;
                if is_unique_violation(&e) {
                    Err(Error::Conflict {
                        identity: document.identity.clone(),
                    })
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn update(&self, document: &FactDocument) -> Result<()> {
        let facts = document.facts_json()?;
        let summary = &document.summary;
        self.conn.execute(
            "UPDATE host_facts SET distribution = ?2, distribution_version = ?3, os_family = ?4, \
             kernel = ?5, architecture = ?6, ipv4_address = ?7, ipv6_address = ?8, facts = ?9, \
             last_modified = ?10 WHERE identity = ?1",
            params![
                document.identity,
                summary.distribution,
                summary.distribution_version,
                summary.os_family,
                summary.kernel,
                summary.architecture,
                summary.ipv4_address,
                summary.ipv6_address,
                facts,
                document.last_modified,
            ],
        )?;
        Ok(())
    }
}

/// Row as stored, before the fact payload is parsed.
struct StoredRow {
    identity: String,
    summary: FactSummary,
    facts: String,
    last_modified: DateTime<Utc>,
}

/// Summary columns starting at column 1, after the identity.
fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FactSummary> {
    Ok(FactSummary {
        distribution: row.get(1)?,
        distribution_version: row.get(2)?,
        os_family: row.get(3)?,
        kernel: row.get(4)?,
        architecture: row.get(5)?,
        ipv4_address: row.get(6)?,
        ipv6_address: row.get(7)?,
    })
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            identity: row.get(0)?,
            summary: summary_from_row(row)?,
            facts: row.get(8)?,
            last_modified: row.get(9)?,
        })
    }

    fn into_document(self) -> Result<FactDocument> {
        let raw_facts = FactDocument::parse_facts(&self.identity, &self.facts)?;
        Ok(FactDocument {
            identity: self.identity,
            summary: self.summary,
            raw_facts,
            last_modified: self.last_modified,
        })
    }
}

/// Fetch and decode one document by identity.
pub(crate) fn fetch_document(conn: &Connection, identity: &str) -> Result<Option<FactDocument>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {SUMMARY_COLUMNS}, facts, last_modified FROM host_facts WHERE identity = ?1"
            ),
            params![identity],
            StoredRow::from_row,
        )
        .optional()?;
    row.map(StoredRow::into_document).transpose()
}

/// All stored identities, sorted.
pub(crate) fn fetch_identities(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT identity FROM host_facts ORDER BY identity")?;
    let identities = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(identities)
}

/// Identity, summary and timestamp of every document, sorted by identity.
pub(crate) fn fetch_summaries(
    conn: &Connection,
) -> Result<Vec<(String, FactSummary, DateTime<Utc>)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUMMARY_COLUMNS}, last_modified FROM host_facts ORDER BY identity"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, summary_from_row(row)?, row.get(8)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Delete a document; returns whether one existed.
pub(crate) fn delete_document(conn: &Connection, identity: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM host_facts WHERE identity = ?1", params![identity])?;
    Ok(removed > 0)
}

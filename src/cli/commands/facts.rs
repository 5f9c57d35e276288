//! Facts commands - collect, query, find, remove and list stored hosts
//!
//! This module implements the `facts` subcommand family.

use super::CommandContext;
use anyhow::Result;
use ark::error::Error;
use ark::facts::{
    find_caches, host_summaries, load_cache_dirs, project_caches, query_host_facts,
    query_hosts_by_fact, remove_host, sort_by_recency, store_facts, HostMatch, KeyFilter,
    MatchMode,
};
use ark::facts::matching::{parse_target_value, value_text};
use ark::project::validate_project_dir;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::debug;

/// Arguments for the facts command
#[derive(Parser, Debug, Clone)]
pub struct FactsArgs {
    #[command(subcommand)]
    pub command: FactsCommand,
}

/// Facts subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum FactsCommand {
    /// Collect fact caches into the fact store
    Collect {
        /// Only collect caches of this project
        project: Option<String>,

        /// Search this directory instead of the projects directory
        #[arg(short = 'd', long, conflicts_with = "project")]
        directory: Option<PathBuf>,
    },

    /// Show the stored facts of one host
    Query {
        /// Host identity
        host: String,

        /// Only show this fact key
        key: Option<String>,

        /// Match the key as a case-insensitive fragment
        #[arg(long)]
        fuzzy: bool,

        /// Page the output
        #[arg(long)]
        page: bool,
    },

    /// Find hosts where a fact has a given value
    Find {
        /// Fact key
        key: String,

        /// Value to look for (parsed as JSON when possible)
        value: String,

        /// Match the key as a case-insensitive fragment
        #[arg(long)]
        fuzzy: bool,

        /// Page the output
        #[arg(long)]
        page: bool,
    },

    /// Remove a host from the fact store
    Remove {
        /// Host identity
        host: String,
    },

    /// List every stored host
    #[command(name = "show-hosts", alias = "list-hosts")]
    ShowHosts {
        /// Page the output
        #[arg(long)]
        page: bool,
    },
}

impl FactsArgs {
    /// Execute the facts command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let code = match &self.command {
            FactsCommand::Collect { project, directory } => {
                ctx.log_invocation(
                    "facts collect",
                    &[
                        ("project", format!("{:?}", project)),
                        ("directory", format!("{:?}", directory)),
                    ],
                );
                collect(ctx, project.as_deref(), directory.as_ref())?
            }
            FactsCommand::Query {
                host,
                key,
                fuzzy,
                page,
            } => {
                ctx.log_invocation(
                    "facts query",
                    &[
                        ("host", host.clone()),
                        ("key", format!("{:?}", key)),
                        ("fuzzy", fuzzy.to_string()),
                    ],
                );
                query(ctx, host, key.as_deref(), *fuzzy, *page)?
            }
            FactsCommand::Find {
                key,
                value,
                fuzzy,
                page,
            } => {
                ctx.log_invocation(
                    "facts find",
                    &[
                        ("key", key.clone()),
                        ("value", value.clone()),
                        ("fuzzy", fuzzy.to_string()),
                    ],
                );
                find(ctx, key, value, *fuzzy, *page)?
            }
            FactsCommand::Remove { host } => {
                ctx.log_invocation("facts remove", &[("host", host.clone())]);
                remove(ctx, host)?
            }
            FactsCommand::ShowHosts { page } => {
                ctx.log_invocation("facts show-hosts", &[]);
                show_hosts(ctx, *page)?
            }
        };
        debug!("Facts command finished with exit code {}", code);
        Ok(code)
    }
}

/// Print a project validation failure; other errors are passed back.
pub(super) fn report_validation_error(ctx: &CommandContext, error: Error) -> Result<i32> {
    match &error {
        Error::ProjectLayout {
            missing_dirs,
            missing_files,
            ..
        } => {
            ctx.output.error(&error.to_string());
            for dir in missing_dirs {
                ctx.output
                    .error(&format!("Missing directory: {}", dir.display()));
            }
            for file in missing_files {
                ctx.output.error(&format!("Missing file: {}", file.display()));
            }
            Ok(1)
        }
        Error::InvalidProjectName(_) => {
            ctx.output.error(&error.to_string());
            ctx.output
                .hint("Project names may only contain letters, digits, '-' and '_'");
            Ok(1)
        }
        _ => Err(error.into()),
    }
}

fn collect(
    ctx: &mut CommandContext,
    project: Option<&str>,
    directory: Option<&PathBuf>,
) -> Result<i32> {
    let caches = match (project, directory) {
        (Some(project), _) => {
            if let Err(e) = validate_project_dir(ctx.config.projects_dir(), project) {
                return report_validation_error(ctx, e);
            }
            project_caches(&ctx.config, project)
        }
        (None, Some(directory)) => find_caches(directory),
        (None, None) => find_caches(ctx.config.projects_dir()),
    };

    let caches = sort_by_recency(caches);
    ctx.output
        .info(&format!("Found {} fact cache(s)", caches.len()));
    if caches.is_empty() {
        ctx.output.warning("No fact caches found.");
    }

    let documents = load_cache_dirs(&caches);
    let mut session = ctx.session()?;
    let updated = store_facts(&mut session, &documents)?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "caches": caches.len(),
            "hosts": documents.len(),
            "updated": updated,
        }))?;
    } else if updated.is_empty() {
        ctx.output.message(&format!(
            "Collected facts for {} host(s); nothing changed.",
            documents.len()
        ));
    } else {
        ctx.output.message(&ctx.output.render_list(
            &format!("Updated facts for {} host(s)", updated.len()),
            &updated,
        ));
    }
    Ok(0)
}

/// Human rendering of a fact value
fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Array(_) | JsonValue::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value_text(value))
        }
        _ => value_text(value),
    }
}

fn query(
    ctx: &mut CommandContext,
    host: &str,
    key: Option<&str>,
    fuzzy: bool,
    page: bool,
) -> Result<i32> {
    let session = ctx.session()?;
    let filter = key.map(|key| KeyFilter::new(key, MatchMode::from_fuzzy(fuzzy)));
    let facts: IndexMap<String, JsonValue> = query_host_facts(&session, host, filter)?.collect();

    if ctx.output.is_json() {
        ctx.output.json(&facts)?;
        return Ok(0);
    }

    if facts.is_empty() {
        match key {
            Some(key) => ctx
                .output
                .message(&format!("No facts matching '{}' found for host '{}'.", key, host)),
            None => ctx.output.message(&format!("Host '{}' not found.", host)),
        }
        return Ok(0);
    }

    let content: String = facts
        .iter()
        .map(|(key, value)| format!("{}: {}\n", key, display_value(value)))
        .collect();
    ctx.output.emit(&content, ctx.pager(page).as_deref());
    Ok(0)
}

fn find(ctx: &mut CommandContext, key: &str, value: &str, fuzzy: bool, page: bool) -> Result<i32> {
    let session = ctx.session()?;
    let target = parse_target_value(value);
    let found: Vec<HostMatch> =
        query_hosts_by_fact(&session, key, target, MatchMode::from_fuzzy(fuzzy))?
            .collect::<ark::error::Result<_>>()?;

    if ctx.output.is_json() {
        ctx.output.json(&found)?;
        return Ok(0);
    }

    if found.is_empty() {
        ctx.output
            .message(&format!("No hosts found with '{}' = '{}'.", key, value));
        return Ok(0);
    }

    let mut content = String::new();
    for host in &found {
        content.push_str(&format!("{}\n", host.identity));
        for (key, value) in &host.matches {
            content.push_str(&format!("  {}: {}\n", key, value_text(value)));
        }
    }
    ctx.output.emit(&content, ctx.pager(page).as_deref());
    Ok(0)
}

fn remove(ctx: &mut CommandContext, host: &str) -> Result<i32> {
    let session = ctx.session()?;
    let removed = remove_host(&session, host)?;

    if ctx.output.is_json() {
        ctx.output
            .json(&serde_json::json!({ "host": host, "removed": removed }))?;
    } else if removed {
        ctx.output.message(&format!("Removed host '{}'.", host));
    } else {
        ctx.output.message(&format!("Host '{}' not found.", host));
    }
    Ok(0)
}

fn show_hosts(ctx: &mut CommandContext, page: bool) -> Result<i32> {
    let session = ctx.session()?;
    let summaries = host_summaries(&session)?;

    if ctx.output.is_json() {
        ctx.output.json(&summaries)?;
        return Ok(0);
    }

    if summaries.is_empty() {
        ctx.output.message("No hosts stored.");
        return Ok(0);
    }

    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|host| {
            vec![
                host.identity.clone(),
                field(&host.summary.distribution),
                field(&host.summary.distribution_version),
                field(&host.summary.os_family),
                field(&host.summary.kernel),
                field(&host.summary.ipv4_address),
                host.last_modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    let table = ctx.output.render_table(
        &[
            "Host",
            "Distribution",
            "Version",
            "OS family",
            "Kernel",
            "IPv4",
            "Last modified (UTC)",
        ],
        &rows,
    );
    ctx.output.emit(&table, ctx.pager(page).as_deref());
    Ok(0)
}

//! Output formatting module for Ark
//!
//! Provides colored human output, JSON output, tables and paging.

use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use std::process::{Command, Stdio};

use ark::report::{HostStats, RunReport};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON output was requested
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.json_message("error", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.json_message("warning", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.json_mode {
            self.json_message("hint", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "HINT:".cyan().bold(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print a plain message (always shown in human mode)
    pub fn message(&self, message: &str) {
        if self.json_mode {
            return;
        }
        println!("{}", message);
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    fn json_message(&self, kind: &str, message: &str) {
        let value = serde_json::json!({
            "type": kind,
            "message": message
        });
        eprintln!("{}", value);
    }

    /// Print a serializable value as pretty JSON on stdout
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Render a list of items
    pub fn render_list(&self, title: &str, items: &[String]) -> String {
        let mut out = String::new();
        if self.use_color {
            out.push_str(&format!("{}:\n", title.bright_white().bold()));
        } else {
            out.push_str(&format!("{}:\n", title));
        }

        for item in items {
            if self.use_color {
                out.push_str(&format!("  {} {}\n", "-".bright_black(), item));
            } else {
                out.push_str(&format!("  - {}\n", item));
            }
        }
        out
    }

    /// Render a table
    pub fn render_table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        let header_line = join_cells(headers.iter().copied(), &widths);
        if self.use_color {
            out.push_str(&format!("{}\n", header_line.bright_white().bold()));
        } else {
            out.push_str(&format!("{}\n", header_line));
        }

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            out.push_str(&format!("{}\n", sep.join("-+-").bright_black()));
        } else {
            out.push_str(&format!("{}\n", sep.join("-+-")));
        }

        for row in rows {
            out.push_str(&join_cells(row.iter().map(String::as_str), &widths));
            out.push('\n');
        }
        out
    }

    /// Render one run report
    pub fn render_report(&self, report: &RunReport) -> String {
        let playbook = report.playbook.as_deref().unwrap_or("unknown playbook");
        let when = report.completed_at.as_deref().unwrap_or("unknown time");
        let title = format!("{} ({})", playbook, when);

        let mut out = String::new();
        if self.use_color {
            out.push_str(&format!("\n{}\n", title.cyan().bold()));
        } else {
            out.push_str(&format!("\n{}\n", title));
        }
        out.push_str(&format!("{}\n", report.artifact.display()));

        if report.hosts.is_empty() {
            out.push_str("No play recap found.\n");
            return out;
        }

        let rows: Vec<Vec<String>> = report
            .hosts
            .iter()
            .map(|(host, stats)| self.stats_row(host, stats))
            .collect();
        out.push_str(&self.render_table(
            &["Host", "ok", "changed", "unreachable", "failed", "skipped"],
            &rows,
        ));

        let failing: Vec<&str> = report
            .hosts
            .iter()
            .filter(|(_, stats)| stats.has_failures())
            .map(|(host, _)| host.as_str())
            .collect();
        if !failing.is_empty() {
            let line = format!("Failed or unreachable: {}", failing.join(", "));
            if self.use_color {
                out.push_str(&format!("{}\n", line.red()));
            } else {
                out.push_str(&format!("{}\n", line));
            }
        }
        out
    }

    fn stats_row(&self, host: &str, stats: &HostStats) -> Vec<String> {
        vec![
            host.to_string(),
            stats.ok.to_string(),
            stats.changed.to_string(),
            stats.unreachable.to_string(),
            stats.failed.to_string(),
            stats.skipped.to_string(),
        ]
    }

    /// Print `content`, through `pager` when given.
    ///
    /// Falls back to plain printing when the pager cannot be started.
    pub fn emit(&self, content: &str, pager: Option<&str>) {
        if let Some(pager) = pager {
            match page(content, pager) {
                Ok(()) => return,
                Err(e) => tracing::debug!("Pager '{}' unavailable: {}", pager, e),
            }
        }
        print!("{}", content);
        self.flush();
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Pad cells to their column widths and join them with ` | `.
fn join_cells<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

/// Pipe `content` into a pager command such as `less -R`.
fn page(content: &str, pager: &str) -> io::Result<()> {
    let words = shell_words::split(pager)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty pager command"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        // The user may quit the pager before reading everything
        match stdin.write_all(content.as_bytes()) {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
    }
    child.wait()?;
    Ok(())
}

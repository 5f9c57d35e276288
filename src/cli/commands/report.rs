//! Report command - play recaps of recent runs
//!
//! This module implements the `report` subcommand.

use super::facts::report_validation_error;
use super::CommandContext;
use anyhow::Result;
use ark::report::project_reports;
use clap::Parser;
use tracing::debug;

/// Arguments for report command
#[derive(Parser, Debug, Clone)]
pub struct ReportArgs {
    /// Project name
    pub project: String,

    /// Only report the N most recent runs
    #[arg(long, short = 'n')]
    pub last: Option<usize>,

    /// Page the output
    #[arg(long)]
    pub page: bool,
}

impl ReportArgs {
    /// Execute the report command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.log_invocation(
            "report",
            &[
                ("project", self.project.clone()),
                ("last", format!("{:?}", self.last)),
            ],
        );

        let reports = match project_reports(ctx.config.projects_dir(), &self.project, self.last) {
            Ok(reports) => reports,
            Err(e) if e.is_validation() => return report_validation_error(ctx, e),
            Err(e) => return Err(e.into()),
        };
        debug!("Built {} run report(s) for '{}'", reports.len(), self.project);

        if ctx.output.is_json() {
            ctx.output.json(&reports)?;
            return Ok(0);
        }

        if reports.is_empty() {
            ctx.output
                .message(&format!("No runs found for project '{}'.", self.project));
            return Ok(0);
        }

        let content: String = reports
            .iter()
            .map(|report| ctx.output.render_report(report))
            .collect();
        ctx.output.emit(&content, ctx.pager(self.page).as_deref());
        Ok(0)
    }
}

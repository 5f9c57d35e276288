//! Config command - print the effective configuration

use super::CommandContext;
use anyhow::{Context, Result};
use ark::config::Config;

/// Configuration with every derived default filled in
fn effective(config: &Config) -> Config {
    let mut effective = config.clone();
    effective.defaults.database_url = Some(config.database_url());
    effective.logging.log_dir = Some(config.log_dir());
    effective.cron.run_script = Some(config.run_script());
    effective.output.pager = Some(config.pager());
    effective
}

/// Execute the config command
pub fn execute(ctx: &mut CommandContext) -> Result<i32> {
    ctx.log_invocation("config", &[]);
    let config = effective(&ctx.config);

    if ctx.output.is_json() {
        ctx.output.json(&config)?;
    } else {
        let rendered =
            toml::to_string_pretty(&config).context("Failed to render configuration as TOML")?;
        ctx.output.message(rendered.trim_end());
    }
    Ok(0)
}

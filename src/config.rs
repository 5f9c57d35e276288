//! Configuration module for Ark
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/ark/ark.cfg)
//! - User configuration (~/.ark.cfg, ~/.ark/ark.cfg)
//! - Project configuration (./ark.cfg, ./.ark.cfg)
//! - Environment variables (`ARK_*`)
//! - Command-line arguments
//!
//! The configuration is loaded once in `main` and passed explicitly to the
//! components that need it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project and database locations
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,

    /// DNS resolution settings handed to the resolver collaborator
    pub dns: DnsConfig,

    /// Cron management settings
    pub cron: CronConfig,

    /// Terminal output settings
    pub output: OutputConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Root directory holding one sub-directory per project
    pub projects_dir: PathBuf,

    /// Fact store connection string; derived from `projects_dir` when unset
    pub database_url: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            database_url: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for console (stderr) output
    pub console_level: String,

    /// Level for the log file
    pub file_level: String,

    /// Directory for `ark.log`; defaults to `<projects_dir>/logs`
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "warn".to_string(),
            file_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// DNS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Nameservers used for resolvability checks
    pub servers: Vec<String>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()],
        }
    }
}

/// Cron settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    /// Comment prefix marking crontab entries owned by Ark
    pub job_tag: String,

    /// Wrapper script invoked by scheduled runs
    pub run_script: Option<PathBuf>,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            job_tag: "#Ark-".to_string(),
            run_script: None,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pager command for `--page`
    pub pager: Option<String>,

    /// Enable colors
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pager: None,
            color: true,
        }
    }
}

fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ark_projects")
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/ark/ark.cfg")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".ark.cfg"));
            paths.push(home.join(".ark/ark.cfg"));
        }

        paths.push(PathBuf::from("ark.cfg"));
        paths.push(PathBuf::from(".ark.cfg"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file_config = Self::parse(path, &content)?;
        Ok(self.merge(file_config))
    }

    /// Parse a configuration document, choosing the format by extension
    fn parse(path: &Path, content: &str) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let invalid = |message: String| {
            Error::Config(format!("Failed to parse '{}': {}", path.display(), message))
        };

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(content).map_err(|e| invalid(e.to_string())),
            "json" => serde_json::from_str(content).map_err(|e| invalid(e.to_string())),
            "toml" => toml::from_str(content).map_err(|e| invalid(e.to_string())),
            // .cfg and friends: TOML first, then YAML
            _ => toml::from_str(content)
                .or_else(|_| serde_yaml::from_str(content))
                .map_err(|e| invalid(e.to_string())),
        }
    }

    /// Merge another config into this one; non-default values in `other` win
    fn merge(&self, other: Config) -> Config {
        let base_defaults = Defaults::default();
        let base_logging = LoggingConfig::default();
        let base_cron = CronConfig::default();

        Config {
            defaults: Defaults {
                projects_dir: if other.defaults.projects_dir != base_defaults.projects_dir {
                    other.defaults.projects_dir
                } else {
                    self.defaults.projects_dir.clone()
                },
                database_url: other
                    .defaults
                    .database_url
                    .or_else(|| self.defaults.database_url.clone()),
            },
            logging: LoggingConfig {
                console_level: if other.logging.console_level != base_logging.console_level {
                    other.logging.console_level
                } else {
                    self.logging.console_level.clone()
                },
                file_level: if other.logging.file_level != base_logging.file_level {
                    other.logging.file_level
                } else {
                    self.logging.file_level.clone()
                },
                log_dir: other.logging.log_dir.or_else(|| self.logging.log_dir.clone()),
            },
            dns: if other.dns != DnsConfig::default() {
                other.dns
            } else {
                self.dns.clone()
            },
            cron: CronConfig {
                job_tag: if other.cron.job_tag != base_cron.job_tag {
                    other.cron.job_tag
                } else {
                    self.cron.job_tag.clone()
                },
                run_script: other.cron.run_script.or_else(|| self.cron.run_script.clone()),
            },
            output: OutputConfig {
                pager: other.output.pager.or_else(|| self.output.pager.clone()),
                color: other.output.color && self.output.color,
            },
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `ARK_*` overrides from an arbitrary variable source
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("ARK_PROJECTS_DIR") {
            self.defaults.projects_dir = PathBuf::from(dir);
        }

        if let Some(url) = lookup("ARK_DB_URL") {
            self.defaults.database_url = Some(url);
        }

        if let Some(level) = lookup("ARK_CONSOLE_LOG_LEVEL") {
            self.logging.console_level = level;
        }

        if let Some(level) = lookup("ARK_FILE_LOG_LEVEL") {
            self.logging.file_level = level;
        }

        if let Some(dir) = lookup("ARK_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }

        if let Some(servers) = lookup("ARK_DNS_SERVERS") {
            self.dns.servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(tag) = lookup("ARK_CRONJOB_TAG") {
            self.cron.job_tag = tag;
        }

        if let Some(script) = lookup("ARK_RUN_SCRIPT") {
            self.cron.run_script = Some(PathBuf::from(script));
        }

        if let Some(pager) = lookup("ARK_PAGER") {
            self.output.pager = Some(pager);
        }

        if lookup("NO_COLOR").is_some() || lookup("ARK_NO_COLOR").is_some() {
            self.output.color = false;
        }
    }

    /// Override the projects directory (from the command line)
    pub fn with_projects_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults.projects_dir = dir.into();
        self
    }

    /// Override the database URL (from the command line)
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.defaults.database_url = Some(url.into());
        self
    }

    /// Projects root directory
    pub fn projects_dir(&self) -> &Path {
        &self.defaults.projects_dir
    }

    /// Effective fact store connection string
    pub fn database_url(&self) -> String {
        self.defaults.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}",
                self.defaults.projects_dir.join("ark.db").display()
            )
        })
    }

    /// Effective log directory
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .log_dir
            .clone()
            .unwrap_or_else(|| self.defaults.projects_dir.join("logs"))
    }

    /// Effective cron wrapper script path
    pub fn run_script(&self) -> PathBuf {
        self.cron
            .run_script
            .clone()
            .unwrap_or_else(|| self.defaults.projects_dir.join("ark_run_script.sh"))
    }

    /// Effective pager command
    pub fn pager(&self) -> String {
        self.output
            .pager
            .clone()
            .or_else(|| std::env::var("PAGER").ok())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "less".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.projects_dir().ends_with("ark_projects"));
        assert_eq!(config.logging.console_level, "warn");
        assert_eq!(config.logging.file_level, "info");
        assert_eq!(config.dns.servers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(config.cron.job_tag, "#Ark-");
    }

    #[test]
    fn test_database_url_follows_projects_dir() {
        let config = Config::default().with_projects_dir("/srv/ark");
        assert_eq!(config.database_url(), "sqlite:///srv/ark/ark.db");
        assert_eq!(config.log_dir(), PathBuf::from("/srv/ark/logs"));
        assert_eq!(config.run_script(), PathBuf::from("/srv/ark/ark_run_script.sh"));
    }

    #[test]
    fn test_explicit_database_url_wins() {
        let config = Config::default()
            .with_projects_dir("/srv/ark")
            .with_database_url("sqlite:///var/lib/ark/facts.db");
        assert_eq!(config.database_url(), "sqlite:///var/lib/ark/facts.db");
    }

    #[test]
    fn test_config_merge() {
        let base = Config::default().with_database_url("sqlite:///base.db");
        let other = Config {
            logging: LoggingConfig {
                console_level: "debug".to_string(),
                ..LoggingConfig::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.logging.console_level, "debug");
        assert_eq!(merged.logging.file_level, "info");
        assert_eq!(
            merged.defaults.database_url.as_deref(),
            Some("sqlite:///base.db")
        );
    }

    #[test]
    fn test_parse_toml_cfg() {
        let content = r#"
[defaults]
projects_dir = "/opt/projects"

[dns]
servers = ["9.9.9.9"]
"#;
        let config = Config::parse(Path::new("ark.cfg"), content).unwrap();
        assert_eq!(config.projects_dir(), Path::new("/opt/projects"));
        assert_eq!(config.dns.servers, vec!["9.9.9.9"]);
        assert_eq!(config.cron.job_tag, "#Ark-");
    }

    #[test]
    fn test_parse_yaml() {
        let content = "cron:\n  job_tag: '#Nightly-'\n";
        let config = Config::parse(Path::new("ark.yml"), content).unwrap();
        assert_eq!(config.cron.job_tag, "#Nightly-");
    }

    #[test]
    fn test_parse_invalid_reports_path() {
        let err = Config::parse(Path::new("broken.json"), "{not json").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ARK_PROJECTS_DIR", "/data/projects"),
            ("ARK_DNS_SERVERS", "10.0.0.1, 10.0.0.2,"),
            ("ARK_CONSOLE_LOG_LEVEL", "error"),
            ("NO_COLOR", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.projects_dir(), Path::new("/data/projects"));
        assert_eq!(config.dns.servers, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.logging.console_level, "error");
        assert!(!config.output.color);
        assert_eq!(config.database_url(), "sqlite:///data/projects/ark.db");
    }
}

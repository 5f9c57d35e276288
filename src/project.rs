//! Project name and layout validation.
//!
//! A project is a runner input tree under the projects directory:
//!
//! ```text
//! <projects_dir>/<name>/
//! ├── env/
//! │   ├── envvars
//! │   └── ssh_key
//! ├── inventory/
//! └── project/
//!     └── main.yml
//! ```

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

const REQUIRED_DIRS: &[&str] = &["project", "inventory", "env"];
const REQUIRED_FILES: &[&str] = &["project/main.yml", "env/envvars", "env/ssh_key"];

/// Project names: alphanumerics, dashes and underscores
static PROJECT_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid project name regex"));

/// Check that a project name only uses alphanumerics, dashes and underscores.
pub fn validate_project_name(name: &str) -> Result<()> {
    if PROJECT_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        error!("Project name '{}' is not valid.", name);
        Err(Error::InvalidProjectName(name.to_string()))
    }
}

/// Validate a project's name and required layout, returning its root.
///
/// Every missing directory and file is reported, not just the first.
pub fn validate_project_dir(projects_dir: &Path, name: &str) -> Result<PathBuf> {
    validate_project_name(name)?;
    let root = projects_dir.join(name);
    info!("Checking for required files and directories in {}", root.display());

    let missing_dirs: Vec<PathBuf> = REQUIRED_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|path| !path.is_dir())
        .collect();
    let missing_files: Vec<PathBuf> = REQUIRED_FILES
        .iter()
        .map(|file| root.join(file))
        .filter(|path| !path.is_file())
        .collect();

    if missing_dirs.is_empty() && missing_files.is_empty() {
        debug!("Project validation complete for '{}'", name);
        return Ok(root);
    }

    error!(
        "Project '{}' is missing directories {:?} and files {:?}",
        name, missing_dirs, missing_files
    );
    Err(Error::ProjectLayout {
        path: root,
        missing_dirs,
        missing_files,
    })
}

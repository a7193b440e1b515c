//! Locating the repository root.

use crate::constants::CONFIG_FILE_NAME;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Walks up from `start` to the first directory containing `depbump.toml`.
///
/// # Errors
///
/// Fails when no ancestor of `start` contains a configuration file.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }

        if !current.pop() {
            return Err(anyhow::anyhow!(
                "No {CONFIG_FILE_NAME} found in current directory or any parent directory"
            ));
        }
    }
}

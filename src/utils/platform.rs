//! Platform helpers: executable lookup and user path expansion.

use crate::core::DepbumpError;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Checks whether `cmd` resolves to an executable on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Fails with [`DepbumpError::ToolNotFound`] for the first tool missing from `PATH`.
///
/// Runs before any work starts so a missing `patch` does not surface halfway
/// through a batch.
pub fn require_tools<S: AsRef<str>>(tools: &[S]) -> Result<()> {
    for tool in tools {
        let tool = tool.as_ref();
        if !command_exists(tool) {
            return Err(DepbumpError::ToolNotFound {
                tool: tool.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Expands `~` and `$VAR` references in a user-supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

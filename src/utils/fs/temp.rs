//! Scoped work directory for a single upgrade run.

use crate::utils::fs::dirs::{ensure_dir, remove_dir_all};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A run-wide scratch directory, removed on drop unless kept.
///
/// Each dependency task stages its archive and patch stages under
/// `<work>/<name>/`. With `--work` the directory survives the run so the
/// stages can be inspected.
///
/// # Examples
///
/// ```rust,no_run
/// use depbump::utils::fs::WorkDir;
///
/// # fn example() -> anyhow::Result<()> {
/// let work = WorkDir::new(false)?;
/// let staging = work.task_dir("org_golang_x_tools")?;
/// assert!(staging.starts_with(work.path()));
/// # Ok(())
/// # }
/// ```
pub struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    /// Creates `depbump_<uuid>` in the system temporary directory.
    pub fn new(keep: bool) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("depbump_{}", uuid::Uuid::new_v4()));
        ensure_dir(&path)?;

        Ok(Self {
            path,
            keep,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` when the directory will outlive this value.
    #[must_use]
    pub const fn is_kept(&self) -> bool {
        self.keep
    }

    /// Creates and returns the isolated staging directory for one dependency.
    pub fn task_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.path.join(name);
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.keep {
            let _ = remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_dir_removed_on_drop() {
        let work = WorkDir::new(false).unwrap();
        let path = work.path().to_path_buf();
        let task = work.task_dir("foo").unwrap();

        assert!(task.is_dir());
        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn test_work_dir_kept() {
        let work = WorkDir::new(true).unwrap();
        let path = work.path().to_path_buf();
        assert!(work.is_kept());

        drop(work);
        assert!(path.exists());
        std::fs::remove_dir_all(path).unwrap();
    }
}

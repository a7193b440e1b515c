//! Patch-stack regeneration
//!
//! A dependency may carry an ordered list of patches. After an upgrade each
//! patch is rebuilt against the new sources:
//!
//! ```text
//! <staging>/a   extracted archive
//! <staging>/b   a + patch 0      -> diff a b  -> patch 0 file
//! <staging>/c   b + patch 1      -> diff b c  -> patch 1 file
//! ...
//! ```
//!
//! Stage *i+1* starts as a copy of stage *i*; the patch is either applied with
//! `patch -Np1` or, when the reference carries a `releaser:patch-cmd`
//! directive, produced by running that command. The diff between the two
//! stages, with its header timestamps normalized by [`sanitize_patch`],
//! overwrites the patch file. Stages are strictly sequential.

use crate::config::PatchSettings;
use crate::constants::SANITIZED_PATCH_TIMESTAMP;
use crate::core::DepbumpError;
use crate::declaration::{PatchesAttr, parse_patch_command};
use crate::process::ToolCommand;
use crate::upgrade::CancellationToken;
use crate::utils::fs::copy_dir;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// One patch of a dependency's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    /// Position in the stack; the patch turns stage `index` into `index + 1`
    pub index: usize,
    pub label: String,
    /// Patch file in the repository, overwritten on regeneration
    pub path: PathBuf,
    /// Regeneration command, run inside the new stage instead of `patch`
    pub command: Option<Vec<String>>,
}

/// The external tools regeneration needs.
#[async_trait]
pub trait PatchTool: Send + Sync {
    /// Applies `patch_file` inside `stage` (`patch -Np1 -i <file>`).
    async fn apply(&self, stage: &Path, patch_file: &Path) -> Result<()>;

    /// Runs a regeneration command inside `stage`.
    async fn run(&self, stage: &Path, argv: &[String]) -> Result<()>;

    /// Diffs two sibling stage directories of `staging`, returning the raw
    /// unified diff. Identical trees give an empty diff.
    async fn diff(&self, staging: &Path, old_stage: &str, new_stage: &str) -> Result<Vec<u8>>;
}

/// [`PatchTool`] backed by the `patch` and `diff` executables.
#[derive(Debug, Clone, Default)]
pub struct ShellPatchTool;

#[async_trait]
impl PatchTool for ShellPatchTool {
    async fn apply(&self, stage: &Path, patch_file: &Path) -> Result<()> {
        ToolCommand::new("patch")
            .args(["-Np1", "-i"])
            .arg(patch_file.display().to_string())
            .current_dir(stage)
            .execute_success()
            .await
    }

    async fn run(&self, stage: &Path, argv: &[String]) -> Result<()> {
        ToolCommand::from_argv(argv)?.current_dir(stage).execute_success().await
    }

    async fn diff(&self, staging: &Path, old_stage: &str, new_stage: &str) -> Result<Vec<u8>> {
        // diff exits 1 when the trees differ
        let output = ToolCommand::new("diff")
            .args(["-urN", old_stage, new_stage])
            .current_dir(staging)
            .allow_exit_code(1)
            .execute()
            .await?;
        Ok(output.stdout)
    }
}

/// Name of stage `index`: `a` through `z`, then `aa`, `ab`, ...
///
/// ```rust
/// use depbump::patch::stage_name;
///
/// assert_eq!(stage_name(0), "a");
/// assert_eq!(stage_name(25), "z");
/// assert_eq!(stage_name(26), "aa");
/// ```
#[must_use]
pub fn stage_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Normalizes the timestamps in `+++ `/`--- ` header lines.
///
/// The text after the last tab of such a line is replaced by a fixed
/// timestamp, unless it starts with `19`: added and deleted files carry the
/// epoch, which varies by time zone and must stay recognizable. Every other
/// byte, including `\r\n` line endings, is kept.
///
/// ```rust
/// use depbump::patch::sanitize_patch;
///
/// let diff = b"--- a/x.go\t2024-05-01 10:00:00.123 +0200\n+++ b/x.go\t1970-01-01 00:00:00 +0000\n";
/// assert_eq!(
///     sanitize_patch(diff),
///     b"--- a/x.go\t2000-01-01 00:00:00.000000000 -0000\n+++ b/x.go\t1970-01-01 00:00:00 +0000\n".to_vec(),
/// );
/// ```
#[must_use]
pub fn sanitize_patch(patch: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(patch.len());
    for line in patch.split_inclusive(|&b| b == b'\n') {
        let (body, ending) = split_line_ending(line);
        if !(body.starts_with(b"+++ ") || body.starts_with(b"--- ")) {
            out.extend_from_slice(line);
            continue;
        }
        match body.iter().rposition(|&b| b == b'\t') {
            Some(tab) if !body[tab + 1..].starts_with(b"19") => {
                out.extend_from_slice(&body[..=tab]);
                out.extend_from_slice(SANITIZED_PATCH_TIMESTAMP.as_bytes());
                out.extend_from_slice(ending);
            }
            _ => out.extend_from_slice(line),
        }
    }
    out
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    let len = line.len();
    if line.ends_with(b"\r\n") {
        line.split_at(len - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(len - 1)
    } else {
        (line, &[])
    }
}

/// Maps a patch label to its file under the patch directory.
///
/// A leading `@repo` qualifier is ignored; the rest must start with the
/// configured label prefix and name a relative path.
pub fn patch_path(label: &str, root: &Path, settings: &PatchSettings) -> Result<PathBuf> {
    let invalid = || DepbumpError::PatchLabelInvalid {
        label: label.to_string(),
        prefix: settings.label_prefix.clone(),
    };

    let unqualified = match label.strip_prefix('@') {
        Some(rest) => rest.find("//").map_or(label, |i| &rest[i..]),
        None => label,
    };
    let file = unqualified.strip_prefix(settings.label_prefix.as_str()).ok_or_else(invalid)?;

    let relative = Path::new(file);
    if file.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid().into());
    }
    Ok(root.join(&settings.directory).join(relative))
}

/// Builds the patch stack of a dependency from its `patches` attribute.
///
/// # Errors
///
/// - [`DepbumpError::PatchesNotAList`] when `patches` is not a list of strings
/// - [`DepbumpError::PatchLabelInvalid`] for a label outside the patch directory
pub fn resolve_patch_entries(
    name: &str,
    patches: &PatchesAttr,
    root: &Path,
    settings: &PatchSettings,
) -> Result<Vec<PatchEntry>> {
    let items = match patches {
        PatchesAttr::Absent => return Ok(Vec::new()),
        PatchesAttr::NotAList => {
            return Err(DepbumpError::PatchesNotAList {
                name: name.to_string(),
            }
            .into());
        }
        PatchesAttr::List(items) => items,
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(PatchEntry {
                index,
                label: item.label.clone(),
                path: patch_path(&item.label, root, settings)?,
                command: parse_patch_command(&item.comments),
            })
        })
        .collect()
}

/// Rebuilds every patch of the stack, in order, starting from stage `a`.
///
/// Stage `a` must already hold the extracted archive. A failure stops the
/// stack; patch files rewritten before it are left as they are.
pub async fn regenerate(
    tool: &dyn PatchTool,
    cancel: &CancellationToken,
    staging: &Path,
    entries: &[PatchEntry],
) -> Result<()> {
    for entry in entries {
        cancel.check()?;

        let prev = stage_name(entry.index);
        let next = stage_name(entry.index + 1);
        let prev_dir = staging.join(&prev);
        let next_dir = staging.join(&next);

        debug!("Stage {} -> {} for {}", prev, next, entry.label);
        {
            let (src, dst) = (prev_dir.clone(), next_dir.clone());
            tokio::task::spawn_blocking(move || copy_dir(&src, &dst))
                .await
                .context("Stage copy task panicked")??;
        }

        match &entry.command {
            Some(argv) => tool.run(&next_dir, argv).await?,
            None => tool.apply(&next_dir, &entry.path).await?,
        }

        let diff = tool.diff(staging, &prev, &next).await?;
        tokio::fs::write(&entry.path, sanitize_patch(&diff))
            .await
            .with_context(|| format!("Failed to write patch {}", entry.path.display()))?;
        info!("Regenerated {}", entry.label);
    }
    Ok(())
}

//! Unpacking `.zip` and `.tar.gz` archives below a strip prefix.
//!
//! These functions block; callers run them on `spawn_blocking`.

use crate::core::DepbumpError;
use crate::utils::fs::{ensure_dir, ensure_parent_dir};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Archive formats, chosen by the download URL's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Detects the format from the last path segment of a URL.
    ///
    /// ```rust
    /// use depbump::archive::ArchiveKind;
    ///
    /// assert_eq!(ArchiveKind::from_url("https://github.com/o/r/archive/v1.zip"), Some(ArchiveKind::Zip));
    /// assert_eq!(ArchiveKind::from_url("https://x/r-v1.tar.gz?raw=1"), Some(ArchiveKind::TarGz));
    /// assert_eq!(ArchiveKind::from_url("https://x/r-v1.tar.xz"), None);
    /// ```
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let name = path.rsplit('/').next().unwrap_or(path);
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Relative path of an entry after removing `strip_prefix`.
///
/// Returns `None` for entries outside the prefix, for the prefix directory
/// itself, and for paths that would escape the destination.
fn strip_entry_path(entry: &Path, strip_prefix: &Path) -> Option<PathBuf> {
    if entry.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        return None;
    }
    let relative = entry.strip_prefix(strip_prefix).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_path_buf())
}

/// Extracts the entries of `archive` below `strip_prefix` into `dest`.
///
/// An empty `strip_prefix` extracts everything. Returns the number of
/// entries written.
///
/// # Errors
///
/// [`DepbumpError::ArchiveLayout`] when a non-empty prefix matches no entry.
pub fn extract_archive(
    archive: &Path,
    kind: ArchiveKind,
    strip_prefix: &str,
    dest: &Path,
) -> Result<usize> {
    ensure_dir(dest)?;
    let prefix = Path::new(strip_prefix.trim_end_matches('/'));

    let count = match kind {
        ArchiveKind::Zip => extract_zip(archive, prefix, dest)?,
        ArchiveKind::TarGz => extract_tar_gz(archive, prefix, dest)?,
    };

    if count == 0 && !strip_prefix.is_empty() {
        return Err(DepbumpError::ArchiveLayout {
            archive: archive.display().to_string(),
            strip_prefix: strip_prefix.to_string(),
        }
        .into());
    }
    Ok(count)
}

fn extract_zip(archive: &Path, prefix: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {}", archive.display()))?;

    let mut count = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let Some(relative) = strip_entry_path(&name, prefix) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            ensure_dir(&target)?;
            count += 1;
            continue;
        }

        ensure_parent_dir(&target)?;
        let mode = entry.unix_mode();
        if mode.is_some_and(|m| m & 0o170_000 == 0o120_000) {
            let mut link_target = String::new();
            io::Read::read_to_string(&mut entry, &mut link_target)?;
            create_symlink(&link_target, &target)?;
        } else {
            let mut out = File::create(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            io::copy(&mut entry, &mut out)
                .with_context(|| format!("Failed to extract {}", target.display()))?;
            #[cfg(unix)]
            if let Some(mode) = mode {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
        count += 1;
    }
    Ok(count)
}

fn extract_tar_gz(archive: &Path, prefix: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0;
    for entry in tar
        .entries()
        .with_context(|| format!("Failed to read tar archive {}", archive.display()))?
    {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }
        let name = entry.path()?.into_owned();
        let Some(relative) = strip_entry_path(&name, prefix) else {
            continue;
        };
        let target = dest.join(relative);
        ensure_parent_dir(&target)?;
        entry
            .unpack(&target)
            .with_context(|| format!("Failed to extract {}", target.display()))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(unix)]
fn create_symlink(link_target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link_target, path)
        .with_context(|| format!("Failed to create symlink {}", path.display()))
}

#[cfg(not(unix))]
fn create_symlink(link_target: &str, path: &Path) -> Result<()> {
    std::fs::write(path, link_target)
        .with_context(|| format!("Failed to create {}", path.display()))
}

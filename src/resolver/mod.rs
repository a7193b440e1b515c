//! Upstream version resolution
//!
//! Picks the revision a dependency should be upgraded to:
//!
//! 1. List every upstream tag.
//! 2. With a subpath, keep only tags named `<subpath>/...`.
//! 3. Normalize each name: strip the subpath prefix, add a leading `v`.
//! 4. Keep names that are exact canonical semantic versions
//!    (`vMAJOR.MINOR.PATCH[-PRE]`, no build metadata, nothing coerced).
//! 5. Drop pre-releases unless a pre-release was requested.
//! 6. Pick the tag whose normalized name equals the request exactly, or the
//!    highest by semver precedence (the first listed wins a tie).
//! 7. With no tags left, fall back to the requested commit or the tip of
//!    the default branch.
//!
//! Every call to the host goes through the batch [`CancellationToken`].

use crate::constants::FALLBACK_DEFAULT_BRANCH;
use crate::core::DepbumpError;
use crate::github::{RepositoryHost, Tag};
use crate::upgrade::CancellationToken;
use anyhow::Result;
use chrono::NaiveDate;
use semver::Version;
use tracing::{debug, warn};

/// A tag that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTag {
    /// Raw tag name as published upstream
    pub name: String,
    pub commit_sha: String,
    /// Normalized name, e.g. `v1.2.5`
    pub normalized: String,
    pub version: Version,
}

/// The revision a dependency resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRevision {
    Tag {
        /// Raw tag name
        tag: String,
        /// Normalized version name
        version: String,
        annotation: String,
    },
    Commit {
        sha: String,
        annotation: String,
    },
}

impl ResolvedRevision {
    #[must_use]
    pub fn annotation(&self) -> &str {
        match self {
            Self::Tag { annotation, .. } | Self::Commit { annotation, .. } => annotation,
        }
    }
}

/// Inputs for [`resolve_revision`].
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub subpath: Option<&'a str>,
    /// Version or commit reference given as `name@version`
    pub requested: Option<&'a str>,
    /// Date used in "latest as of" annotations
    pub today: NaiveDate,
}

/// Normalizes a raw tag name, or returns `None` when it lies outside `subpath`.
#[must_use]
pub fn normalize_tag_name(name: &str, subpath: Option<&str>) -> Option<String> {
    let name = match subpath {
        Some(subpath) => name.strip_prefix(subpath)?.strip_prefix('/')?,
        None => name,
    };
    Some(normalize_version(name))
}

fn normalize_version(name: &str) -> String {
    if name.starts_with('v') {
        name.to_string()
    } else {
        format!("v{name}")
    }
}

/// Parses `name` if it is byte-for-byte a canonical semantic version.
///
/// ```rust
/// use depbump::resolver::canonical_version;
///
/// assert!(canonical_version("v1.2.3-rc1").is_some());
/// assert!(canonical_version("v1.2").is_none());
/// assert!(canonical_version("v1.2.3+build").is_none());
/// ```
#[must_use]
pub fn canonical_version(name: &str) -> Option<Version> {
    let version = Version::parse(name.strip_prefix('v')?).ok()?;
    if !version.build.is_empty() || format!("v{version}") != name {
        return None;
    }
    Some(version)
}

/// Returns `true` when `requested` is a canonical version with a pre-release.
fn requests_prerelease(requested: Option<&str>) -> bool {
    requested.and_then(canonical_version).is_some_and(|v| !v.pre.is_empty())
}

/// Applies the subpath, canonical-form and pre-release filters.
#[must_use]
pub fn filter_tags(tags: &[Tag], subpath: Option<&str>, requested: Option<&str>) -> Vec<UpstreamTag> {
    let allow_prerelease = requests_prerelease(requested);

    tags.iter()
        .filter_map(|tag| {
            let normalized = normalize_tag_name(&tag.name, subpath)?;
            let version = canonical_version(&normalized)?;
            if !version.pre.is_empty() && !allow_prerelease {
                return None;
            }
            Some(UpstreamTag {
                name: tag.name.clone(),
                commit_sha: tag.commit.sha.clone(),
                normalized,
                version,
            })
        })
        .collect()
}

/// Chooses among filtered tags.
///
/// A request is compared verbatim with the normalized tag names, so `1.2.0`
/// does not select `v1.2.0`. Returns `Ok(None)` when `tags` is empty.
///
/// # Errors
///
/// [`DepbumpError::VersionNotFound`] when `requested` matches no tag; the
/// error names the raw name of the highest tag.
pub fn select_tag<'a>(
    tags: &'a [UpstreamTag],
    requested: Option<&str>,
) -> Result<Option<&'a UpstreamTag>, DepbumpError> {
    let Some(highest) = tags.iter().reduce(|best, tag| {
        if tag.version > best.version { tag } else { best }
    }) else {
        return Ok(None);
    };

    let Some(requested) = requested else {
        return Ok(Some(highest));
    };

    match tags.iter().find(|tag| tag.normalized == requested) {
        Some(tag) => Ok(Some(tag)),
        None => Err(DepbumpError::VersionNotFound {
            requested: requested.to_string(),
            latest: highest.name.clone(),
        }),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Resolves the revision a dependency should move to.
///
/// # Errors
///
/// - [`DepbumpError::VersionNotFound`] for an unknown requested tag
/// - [`DepbumpError::ApiError`] when a required host query fails
/// - [`DepbumpError::Cancelled`] when the batch is cancelled
pub async fn resolve_revision(
    host: &dyn RepositoryHost,
    cancel: &CancellationToken,
    request: &ResolveRequest<'_>,
) -> Result<ResolvedRevision> {
    let ResolveRequest {
        org,
        repo,
        subpath,
        requested,
        today,
    } = *request;

    let tags = cancel.run(host.list_tags(org, repo)).await?;
    let candidates = filter_tags(&tags, subpath, requested);
    debug!("{}/{}: {} of {} tags usable", org, repo, candidates.len(), tags.len());

    if let Some(tag) = select_tag(&candidates, requested)? {
        let annotation = if requested.is_some() {
            // A pinned tag may be old, so report when it was made.
            let date = match cancel.run(host.commit(org, repo, &tag.commit_sha)).await {
                Ok(commit) => commit.date().map(|d| d.date_naive()),
                Err(e) if is_cancelled(&e) => return Err(e),
                Err(e) => {
                    warn!("Could not read commit date for {}: {:#}", tag.name, e);
                    None
                }
            };
            format!("{}, from {}", tag.name, format_date(date.unwrap_or(today)))
        } else {
            format!("{}, latest as of {}", tag.name, format_date(today))
        };
        return Ok(ResolvedRevision::Tag {
            tag: tag.name.clone(),
            version: tag.normalized.clone(),
            annotation,
        });
    }

    if let Some(reference) = requested {
        let commit = cancel.run(host.commit(org, repo, reference)).await?;
        let date = commit.date().map_or(today, |d| d.date_naive());
        return Ok(ResolvedRevision::Commit {
            sha: commit.sha,
            annotation: format!("from {}", format_date(date)),
        });
    }

    let repository = cancel.run(host.repository(org, repo)).await?;
    let branch_name = repository
        .default_branch
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string());
    let branch = cancel.run(host.branch(org, repo, &branch_name)).await?;
    Ok(ResolvedRevision::Commit {
        sha: branch.commit.sha,
        annotation: format!("{}, as of {}", branch_name, format_date(today)),
    })
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<DepbumpError>(), Some(DepbumpError::Cancelled))
}

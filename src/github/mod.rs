//! Access to the upstream source host
//!
//! The resolvers only need five read-only queries, captured by
//! [`RepositoryHost`]. [`GitHubClient`] implements them over the GitHub REST
//! API; tests use the fake in `test_utils`.
//!
//! The response types deserialize the subset of fields the tool reads.

mod client;

pub use client::GitHubClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A tag as listed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// A tagged release and its attached files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// A commit with the dates used for annotations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitDetails {
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl Commit {
    /// Committer date, falling back to the author date.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let committer = self.commit.committer.as_ref().and_then(|s| s.date);
        committer.or_else(|| self.commit.author.as_ref().and_then(|s| s.date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Read-only queries against a source-hosting service.
///
/// Implementations perform no retries; any failure is reported as-is.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Every tag of the repository, across all pages.
    async fn list_tags(&self, org: &str, repo: &str) -> Result<Vec<Tag>>;

    /// The release for `tag`, or `None` when the tag has no release.
    async fn release_by_tag(&self, org: &str, repo: &str, tag: &str) -> Result<Option<Release>>;

    /// The commit a reference (sha, tag or branch) points at.
    async fn commit(&self, org: &str, repo: &str, reference: &str) -> Result<Commit>;

    async fn branch(&self, org: &str, repo: &str, branch: &str) -> Result<Branch>;

    async fn repository(&self, org: &str, repo: &str) -> Result<Repository>;
}

//! In-memory implementations of the collaborator traits.

use crate::archive::{ArchiveMirror, Downloader};
use crate::core::DepbumpError;
use crate::github::{
    Branch, Commit, CommitDetails, CommitRef, Release, Repository, RepositoryHost, Signature, Tag,
};
use crate::patch::PatchTool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Default, Clone)]
struct FakeRepo {
    tags: Vec<Tag>,
    releases: HashMap<String, Release>,
    commits: HashMap<String, Commit>,
    branches: HashMap<String, Branch>,
    default_branch: Option<String>,
    /// Tag listing never completes
    stalled: bool,
}

/// A [`RepositoryHost`] answering from fixed data.
///
/// Repositories without configured data have no tags, releases, commits or
/// branches. Lookups of unknown commits and branches fail with
/// [`DepbumpError::ApiError`].
#[derive(Default, Clone)]
pub struct FakeRepositoryHost {
    repos: HashMap<String, FakeRepo>,
}

impl FakeRepositoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn repo_mut(&mut self, org: &str, repo: &str) -> &mut FakeRepo {
        self.repos.entry(format!("{org}/{repo}")).or_default()
    }

    fn repo(&self, org: &str, repo: &str) -> Option<&FakeRepo> {
        self.repos.get(&format!("{org}/{repo}"))
    }

    /// Adds tags; each tag points at commit `sha-<name>`.
    #[must_use]
    pub fn with_tags(mut self, org: &str, repo: &str, names: &[&str]) -> Self {
        let state = self.repo_mut(org, repo);
        state.tags.extend(names.iter().map(|name| Tag {
            name: (*name).to_string(),
            commit: CommitRef {
                sha: format!("sha-{name}"),
            },
        }));
        self
    }

    /// Adds a commit dated `date` (RFC 3339).
    #[must_use]
    pub fn with_commit(mut self, org: &str, repo: &str, sha: &str, date: &str) -> Self {
        let date = DateTime::parse_from_rfc3339(date).expect("valid RFC 3339 date").with_timezone(&Utc);
        self.repo_mut(org, repo).commits.insert(
            sha.to_string(),
            Commit {
                sha: sha.to_string(),
                commit: CommitDetails {
                    author: None,
                    committer: Some(Signature {
                        date: Some(date),
                    }),
                },
            },
        );
        self
    }

    #[must_use]
    pub fn with_branch(mut self, org: &str, repo: &str, branch: &str, sha: &str) -> Self {
        self.repo_mut(org, repo).branches.insert(
            branch.to_string(),
            Branch {
                name: branch.to_string(),
                commit: CommitRef {
                    sha: sha.to_string(),
                },
            },
        );
        self
    }

    #[must_use]
    pub fn with_default_branch(mut self, org: &str, repo: &str, branch: Option<&str>) -> Self {
        self.repo_mut(org, repo).default_branch = branch.map(str::to_string);
        self
    }

    /// Makes tag listing for the repository hang until the caller gives up.
    #[must_use]
    pub fn with_stalled_tags(mut self, org: &str, repo: &str) -> Self {
        self.repo_mut(org, repo).stalled = true;
        self
    }

    /// Adds a release keyed by its tag name.
    #[must_use]
    pub fn with_release(mut self, org: &str, repo: &str, release: Release) -> Self {
        self.repo_mut(org, repo).releases.insert(release.tag_name.clone(), release);
        self
    }

    fn not_found(operation: String) -> anyhow::Error {
        DepbumpError::ApiError {
            operation,
            reason: "404 Not Found".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl RepositoryHost for FakeRepositoryHost {
    async fn list_tags(&self, org: &str, repo: &str) -> Result<Vec<Tag>> {
        if self.repo(org, repo).is_some_and(|r| r.stalled) {
            return std::future::pending().await;
        }
        Ok(self.repo(org, repo).map(|r| r.tags.clone()).unwrap_or_default())
    }

    async fn release_by_tag(&self, org: &str, repo: &str, tag: &str) -> Result<Option<Release>> {
        Ok(self.repo(org, repo).and_then(|r| r.releases.get(tag).cloned()))
    }

    async fn commit(&self, org: &str, repo: &str, reference: &str) -> Result<Commit> {
        self.repo(org, repo)
            .and_then(|r| r.commits.get(reference).cloned())
            .ok_or_else(|| Self::not_found(format!("get commit {reference} of {org}/{repo}")))
    }

    async fn branch(&self, org: &str, repo: &str, branch: &str) -> Result<Branch> {
        self.repo(org, repo)
            .and_then(|r| r.branches.get(branch).cloned())
            .ok_or_else(|| Self::not_found(format!("get branch {branch} of {org}/{repo}")))
    }

    async fn repository(&self, org: &str, repo: &str) -> Result<Repository> {
        Ok(Repository {
            default_branch: self.repo(org, repo).and_then(|r| r.default_branch.clone()),
        })
    }
}

/// A [`Downloader`] serving fixed bodies. Unknown URLs fail with
/// [`DepbumpError::DownloadFailed`].
#[derive(Default)]
pub struct FakeDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// URLs requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        self.requests.lock().expect("requests lock").push(url.to_string());
        let body = self.bodies.get(url).ok_or_else(|| DepbumpError::DownloadFailed {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })?;
        sink.write_all(body).await?;
        Ok(body.len() as u64)
    }
}

/// An [`ArchiveMirror`] that records uploaded paths.
#[derive(Default)]
pub struct RecordingMirror {
    uploads: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mirror whose uploads all fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sorted mirror paths uploaded so far.
    pub fn uploads(&self) -> Vec<String> {
        let mut uploads = self.uploads.lock().expect("uploads lock").clone();
        uploads.sort();
        uploads
    }
}

#[async_trait]
impl ArchiveMirror for RecordingMirror {
    async fn upload(&self, mirror_path: &str, file: &Path) -> Result<()> {
        if self.fail {
            return Err(DepbumpError::MirrorUploadFailed {
                path: mirror_path.to_string(),
                reason: "upload refused".to_string(),
            }
            .into());
        }
        assert!(file.is_file(), "uploaded archive {} must exist", file.display());
        self.uploads.lock().expect("uploads lock").push(mirror_path.to_string());
        Ok(())
    }
}

/// A [`PatchTool`] that records calls instead of running anything.
///
/// Calls are recorded as `apply <stage> <patch file name>`,
/// `run <stage> <argv...>` and `diff <old> <new>`. `diff` returns a header
/// pair with unsanitized timestamps.
#[derive(Default)]
pub struct ScriptedPatchTool {
    calls: Mutex<Vec<String>>,
    fail_apply_on: Option<String>,
}

impl ScriptedPatchTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `apply` fail in the stage named `stage`.
    #[must_use]
    pub fn fail_apply_on(mut self, stage: &str) -> Self {
        self.fail_apply_on = Some(stage.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[async_trait]
impl PatchTool for ScriptedPatchTool {
    async fn apply(&self, stage: &Path, patch_file: &Path) -> Result<()> {
        let stage_name = file_name(stage);
        self.record(format!("apply {} {}", stage_name, file_name(patch_file)));
        if self.fail_apply_on.as_deref() == Some(stage_name.as_str()) {
            return Err(DepbumpError::ToolFailed {
                tool: "patch".to_string(),
                dir: stage.display().to_string(),
                stderr: "Hunk #1 FAILED at 1.".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn run(&self, stage: &Path, argv: &[String]) -> Result<()> {
        self.record(format!("run {} {}", file_name(stage), argv.join(" ")));
        Ok(())
    }

    async fn diff(&self, _staging: &Path, old_stage: &str, new_stage: &str) -> Result<Vec<u8>> {
        self.record(format!("diff {old_stage} {new_stage}"));
        Ok(format!(
            "--- {old_stage}\t2024-05-01 10:00:00.000000000 +0200\n+++ {new_stage}\t2024-05-01 10:00:01.000000000 +0200\n"
        )
        .into_bytes())
    }
}

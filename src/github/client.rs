//! GitHub REST implementation of [`RepositoryHost`] and [`Downloader`].

use super::{Branch, Commit, Release, Repository, RepositoryHost, Tag};
use crate::archive::Downloader;
use crate::constants::{API_REQUEST_TIMEOUT, TAGS_PAGE_SIZE, USER_AGENT};
use crate::core::DepbumpError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Client for the GitHub REST API.
///
/// The token, when present, is only sent to the API endpoint; archive
/// downloads go out unauthenticated.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Creates a client for `api_url` (e.g. `https://api.github.com`).
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// GETs `path` under the API root. A 404 yields `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GitHub API: {} ({})", operation, url);

        let mut request = self
            .http
            .get(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(API_REQUEST_TIMEOUT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| api_error(operation, e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));
            let reason = match message {
                Some(message) => format!("{status}: {message}"),
                None => status.to_string(),
            };
            return Err(api_error(operation, reason));
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| api_error(operation, format!("invalid response: {e}")))?;
        Ok(Some(value))
    }

    async fn get_required<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        self.get_json(operation, path, &[])
            .await?
            .ok_or_else(|| api_error(operation, "404 Not Found".to_string()))
    }
}

fn api_error(operation: &str, reason: String) -> anyhow::Error {
    DepbumpError::ApiError {
        operation: operation.to_string(),
        reason,
    }
    .into()
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn list_tags(&self, org: &str, repo: &str) -> Result<Vec<Tag>> {
        let operation = format!("list tags for {org}/{repo}");
        let path = format!("/repos/{org}/{repo}/tags");
        let mut tags = Vec::new();
        let mut page = 1usize;

        loop {
            let batch: Vec<Tag> = self
                .get_json(
                    &operation,
                    &path,
                    &[("per_page", TAGS_PAGE_SIZE.to_string()), ("page", page.to_string())],
                )
                .await?
                .ok_or_else(|| api_error(&operation, "404 Not Found".to_string()))?;
            let done = batch.len() < TAGS_PAGE_SIZE;
            tags.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        debug!("Found {} tags for {}/{}", tags.len(), org, repo);
        Ok(tags)
    }

    async fn release_by_tag(&self, org: &str, repo: &str, tag: &str) -> Result<Option<Release>> {
        self.get_json(
            &format!("get release {tag} for {org}/{repo}"),
            &format!("/repos/{org}/{repo}/releases/tags/{tag}"),
            &[],
        )
        .await
    }

    async fn commit(&self, org: &str, repo: &str, reference: &str) -> Result<Commit> {
        self.get_required(
            &format!("get commit {reference} for {org}/{repo}"),
            &format!("/repos/{org}/{repo}/commits/{reference}"),
        )
        .await
    }

    async fn branch(&self, org: &str, repo: &str, branch: &str) -> Result<Branch> {
        self.get_required(
            &format!("get branch {branch} for {org}/{repo}"),
            &format!("/repos/{org}/{repo}/branches/{branch}"),
        )
        .await
    }

    async fn repository(&self, org: &str, repo: &str) -> Result<Repository> {
        self.get_required(&format!("get repository {org}/{repo}"), &format!("/repos/{org}/{repo}"))
            .await
    }
}

#[async_trait]
impl Downloader for GitHubClient {
    async fn download(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        let failed = |reason: String| DepbumpError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        debug!("Downloading {}", url);
        let mut response = self.http.get(url).send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(status.to_string()).into());
        }

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            sink.write_all(&chunk).await.with_context(|| format!("Failed to store {url}"))?;
            written += chunk.len() as u64;
        }
        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}

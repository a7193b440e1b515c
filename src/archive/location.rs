//! Where a resolved revision's archive lives.

use crate::constants::GITHUB_WEB_URL;
use crate::github::{Release, RepositoryHost};
use crate::resolver::ResolvedRevision;
use crate::upgrade::CancellationToken;
use anyhow::Result;
use tracing::debug;

/// Where an archive is downloaded from and how it is unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub download_url: String,
    pub mirror_url: String,
    /// `download_url` without its scheme; the upload path on the mirror
    pub mirror_path: String,
    /// Top-level directory inside the archive, empty for release assets
    pub strip_prefix: String,
    pub annotation: String,
}

/// Strips `https://` (or any other scheme) from a URL.
#[must_use]
pub fn without_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Mirror URL for `download_url` under `mirror_base` (which ends with `/`).
///
/// ```rust
/// use depbump::archive::mirror_url;
///
/// assert_eq!(
///     mirror_url("https://mirror.bazel.build/", "https://github.com/golang/tools/archive/abc.zip"),
///     "https://mirror.bazel.build/github.com/golang/tools/archive/abc.zip",
/// );
/// ```
#[must_use]
pub fn mirror_url(mirror_base: &str, download_url: &str) -> String {
    format!("{mirror_base}{}", without_scheme(download_url))
}

/// Finds the first release asset named `<repo>-<tag>.tar.gz` or
/// `<repo>-<tag>.zip`, in the release's own asset order.
#[must_use]
pub fn preferred_asset<'a>(release: &'a Release, repo: &str, tag: &str) -> Option<&'a str> {
    let wanted = [format!("{repo}-{tag}.tar.gz"), format!("{repo}-{tag}.zip")];
    release
        .assets
        .iter()
        .find(|asset| wanted.iter().any(|name| *name == asset.name))
        .map(|asset| asset.browser_download_url.as_str())
}

/// Strip prefix of the host-generated archive for a tag.
///
/// ```rust
/// use depbump::archive::tag_strip_prefix;
///
/// assert_eq!(tag_strip_prefix("tools", "gopls/v0.4.0", Some("gopls")), "tools-gopls-v0.4.0/gopls");
/// assert_eq!(tag_strip_prefix("tools", "v0.4.0", None), "tools-0.4.0");
/// ```
#[must_use]
pub fn tag_strip_prefix(repo: &str, tag: &str, subpath: Option<&str>) -> String {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let mut prefix = format!("{repo}-{tag}").replace('/', "-");
    if let Some(subpath) = subpath {
        prefix.push('/');
        prefix.push_str(subpath);
    }
    prefix
}

/// Turns a resolved revision into an [`ArchiveLocation`].
///
/// Only tags consult the host, to look for a release. A tag without a
/// release is not an error; any other failure of that lookup is.
pub async fn resolve_location(
    host: &dyn RepositoryHost,
    cancel: &CancellationToken,
    org: &str,
    repo: &str,
    subpath: Option<&str>,
    revision: &ResolvedRevision,
    mirror_base: &str,
) -> Result<ArchiveLocation> {
    let (download_url, strip_prefix) = match revision {
        ResolvedRevision::Tag { tag, .. } => {
            let release = cancel.run(host.release_by_tag(org, repo, tag)).await?;
            match release.as_ref().and_then(|r| preferred_asset(r, repo, tag)) {
                Some(url) => {
                    debug!("Using release asset {}", url);
                    (url.to_string(), String::new())
                }
                None => (
                    format!("{GITHUB_WEB_URL}/{org}/{repo}/archive/refs/tags/{tag}.zip"),
                    tag_strip_prefix(repo, tag, subpath),
                ),
            }
        }
        ResolvedRevision::Commit { sha, .. } => (
            format!("{GITHUB_WEB_URL}/{org}/{repo}/archive/{sha}.zip"),
            format!("{repo}-{sha}"),
        ),
    };

    Ok(ArchiveLocation {
        mirror_url: mirror_url(mirror_base, &download_url),
        mirror_path: without_scheme(&download_url).to_string(),
        download_url,
        strip_prefix,
        annotation: revision.annotation().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::Asset;
    use crate::test_utils::FakeRepositoryHost;

    const MIRROR: &str = "https://mirror.bazel.build/";

    fn tag_revision(tag: &str) -> ResolvedRevision {
        ResolvedRevision::Tag {
            tag: tag.to_string(),
            version: tag.to_string(),
            annotation: format!("{tag}, latest as of 2024-05-01"),
        }
    }

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://github.com/o/r/releases/download/{name}"),
        }
    }

    #[test]
    fn test_without_scheme() {
        assert_eq!(without_scheme("https://github.com/a"), "github.com/a");
        assert_eq!(without_scheme("github.com/a"), "github.com/a");
    }

    #[test]
    fn test_preferred_asset_ignores_other_names() {
        let release = Release {
            tag_name: "v1.0.0".to_string(),
            assets: vec![asset("r-v1.0.0-linux.tar.gz"), asset("r-v1.0.0.zip")],
        };
        assert_eq!(
            preferred_asset(&release, "r", "v1.0.0"),
            Some("https://github.com/o/r/releases/download/r-v1.0.0.zip")
        );
    }

    #[test]
    fn test_preferred_asset_follows_release_order() {
        let zip_first = Release {
            tag_name: "v1.0.0".to_string(),
            assets: vec![asset("r-v1.0.0.zip"), asset("r-v1.0.0.tar.gz")],
        };
        assert_eq!(
            preferred_asset(&zip_first, "r", "v1.0.0"),
            Some("https://github.com/o/r/releases/download/r-v1.0.0.zip")
        );

        let tarball_first = Release {
            tag_name: "v1.0.0".to_string(),
            assets: vec![asset("r-v1.0.0.tar.gz"), asset("r-v1.0.0.zip")],
        };
        assert_eq!(
            preferred_asset(&tarball_first, "r", "v1.0.0"),
            Some("https://github.com/o/r/releases/download/r-v1.0.0.tar.gz")
        );
    }

    #[tokio::test]
    async fn test_release_asset_wins_over_generated_archive() {
        let host = FakeRepositoryHost::new().with_release(
            "o",
            "r",
            Release {
                tag_name: "v1.0.0".to_string(),
                assets: vec![asset("r-v1.0.0.tar.gz")],
            },
        );

        let location = resolve_location(
            &host,
            &CancellationToken::new(),
            "o",
            "r",
            None,
            &tag_revision("v1.0.0"),
            MIRROR,
        )
        .await
        .unwrap();

        assert_eq!(location.download_url, "https://github.com/o/r/releases/download/r-v1.0.0.tar.gz");
        assert_eq!(location.strip_prefix, "");
        assert_eq!(
            location.mirror_url,
            "https://mirror.bazel.build/github.com/o/r/releases/download/r-v1.0.0.tar.gz"
        );
        assert_eq!(location.mirror_path, "github.com/o/r/releases/download/r-v1.0.0.tar.gz");
    }

    #[tokio::test]
    async fn test_tag_without_release() {
        let host = FakeRepositoryHost::new();

        let location = resolve_location(
            &host,
            &CancellationToken::new(),
            "golang",
            "tools",
            Some("gopls"),
            &tag_revision("gopls/v0.4.0"),
            MIRROR,
        )
        .await
        .unwrap();

        assert_eq!(
            location.download_url,
            "https://github.com/golang/tools/archive/refs/tags/gopls/v0.4.0.zip"
        );
        assert_eq!(location.strip_prefix, "tools-gopls-v0.4.0/gopls");
        assert_eq!(location.annotation, "gopls/v0.4.0, latest as of 2024-05-01");
    }

    #[tokio::test]
    async fn test_commit_location() {
        let host = FakeRepositoryHost::new();
        let revision = ResolvedRevision::Commit {
            sha: "0123abcd".to_string(),
            annotation: "main, as of 2024-05-01".to_string(),
        };

        let location =
            resolve_location(&host, &CancellationToken::new(), "o", "r", None, &revision, MIRROR)
                .await
                .unwrap();

        assert_eq!(location.download_url, "https://github.com/o/r/archive/0123abcd.zip");
        assert_eq!(location.strip_prefix, "r-0123abcd");
        assert_eq!(location.mirror_url, "https://mirror.bazel.build/github.com/o/r/archive/0123abcd.zip");
    }
}

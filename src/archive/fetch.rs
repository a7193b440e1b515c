//! Downloading archives with a streaming SHA-256, and mirroring them.

use crate::core::DepbumpError;
use crate::process::ToolCommand;
use crate::upgrade::CancellationToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::{self, Seek};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Streams a URL into a writer.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Writes the body of `url` into `sink` chunk by chunk, returning the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// [`DepbumpError::DownloadFailed`] for transport errors and non-success
    /// status codes.
    async fn download(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64>;
}

/// Publishes archives to the mirror.
#[async_trait]
pub trait ArchiveMirror: Send + Sync {
    /// Uploads `file` to `mirror_path`. Uploading an existing path is a no-op.
    async fn upload(&self, mirror_path: &str, file: &Path) -> Result<()>;
}

/// Writer adapter that hashes everything passing through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Returns the inner writer and the lowercase hex digest.
    pub fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for HashingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.hasher.update(&buf[..*n]);
            this.written += *n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// A downloaded archive held in a temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct FetchedArchive {
    pub file: NamedTempFile,
    pub sha256: String,
    pub size: u64,
}

impl FetchedArchive {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Downloads `url` into a temporary file in `dir`, hashing it on the way.
///
/// Chunks are written through `tokio::fs`. The returned file is rewound to
/// the start.
pub async fn fetch_archive(
    downloader: &dyn Downloader,
    cancel: &CancellationToken,
    url: &str,
    dir: &Path,
) -> Result<FetchedArchive> {
    let mut file = tempfile::Builder::new()
        .prefix("archive-")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let handle = file
        .as_file()
        .try_clone()
        .with_context(|| format!("Failed to open {}", file.path().display()))?;
    let mut writer = HashingWriter::new(tokio::fs::File::from_std(handle));
    cancel.run(downloader.download(url, &mut writer)).await?;
    writer.flush().await.context("Failed to flush downloaded archive")?;

    let size = writer.bytes_written();
    let (handle, sha256) = writer.finish();
    drop(handle);
    file.rewind().context("Failed to rewind downloaded archive")?;

    info!("Downloaded {} ({} bytes, sha256 {})", url, size, sha256);
    Ok(FetchedArchive {
        file,
        sha256,
        size,
    })
}

/// Uploads archives by running a configured command.
///
/// `{file}` in the argv is replaced by the local path and `{path}` by the
/// mirror path. The default command is
/// `gsutil cp -n {file} gs://bazel-mirror/{path}`, where `-n` makes
/// repeated uploads no-ops.
#[derive(Debug, Clone)]
pub struct CommandMirror {
    command: Vec<String>,
}

impl CommandMirror {
    #[must_use]
    pub const fn new(command: Vec<String>) -> Self {
        Self {
            command,
        }
    }

    fn argv(&self, mirror_path: &str, file: &Path) -> Vec<String> {
        let file = file.display().to_string();
        self.command
            .iter()
            .map(|arg| arg.replace("{file}", &file).replace("{path}", mirror_path))
            .collect()
    }
}

#[async_trait]
impl ArchiveMirror for CommandMirror {
    async fn upload(&self, mirror_path: &str, file: &Path) -> Result<()> {
        let argv = self.argv(mirror_path, file);
        debug!("Uploading {} to mirror path {}", file.display(), mirror_path);

        ToolCommand::from_argv(&argv)?
            .with_context(mirror_path)
            .execute_success()
            .await
            .map_err(|e| {
                anyhow::Error::from(DepbumpError::MirrorUploadFailed {
                    path: mirror_path.to_string(),
                    reason: format!("{e:#}"),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeDownloader;
    use std::io::Read;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_hashing_writer_digest() {
        let mut writer = HashingWriter::new(Vec::new());
        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        assert_eq!(writer.bytes_written(), 11);

        let (inner, digest) = writer.finish();
        assert_eq!(inner, b"hello world");
        assert_eq!(digest, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[tokio::test]
    async fn test_fetch_archive_hashes_and_rewinds() {
        let temp = tempdir().unwrap();
        let downloader = FakeDownloader::new().with_body("https://example.com/a.zip", b"hello world".to_vec());

        let mut fetched = fetch_archive(
            &downloader,
            &CancellationToken::new(),
            "https://example.com/a.zip",
            temp.path(),
        )
        .await
        .unwrap();

        assert_eq!(fetched.sha256, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
        assert_eq!(fetched.size, 11);
        assert!(fetched.path().starts_with(temp.path()));

        let mut content = String::new();
        fetched.file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn test_fetch_archive_missing_url() {
        let temp = tempdir().unwrap();
        let err = fetch_archive(
            &FakeDownloader::new(),
            &CancellationToken::new(),
            "https://example.com/missing.zip",
            temp.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DepbumpError>(),
            Some(DepbumpError::DownloadFailed { .. })
        ));
    }

    #[test]
    fn test_command_mirror_substitutes_placeholders() {
        let mirror = CommandMirror::new(
            ["gsutil", "cp", "-n", "{file}", "gs://bazel-mirror/{path}"].map(String::from).to_vec(),
        );
        assert_eq!(
            mirror.argv("github.com/o/r/archive/v1.zip", Path::new("/tmp/archive-x")),
            vec!["gsutil", "cp", "-n", "/tmp/archive-x", "gs://bazel-mirror/github.com/o/r/archive/v1.zip"]
        );
    }

    #[tokio::test]
    async fn test_command_mirror_copies_file() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("archive");
        std::fs::write(&source, "data").unwrap();
        let target_root = temp.path().join("mirror");
        let mirror = CommandMirror::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("mkdir -p \"$(dirname {root}/{{path}})\" && cp {{file}} {root}/{{path}}", root = target_root.display()),
        ]);

        mirror.upload("github.com/o/r/a.zip", &source).await.unwrap();

        assert_eq!(std::fs::read_to_string(target_root.join("github.com/o/r/a.zip")).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_command_mirror_failure() {
        let mirror = CommandMirror::new(vec!["false".to_string()]);
        let err = mirror.upload("p", Path::new("/tmp/x")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DepbumpError>(),
            Some(DepbumpError::MirrorUploadFailed { .. })
        ));
    }
}

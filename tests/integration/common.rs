//! Shared fixtures for the integration tests.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway repository with a `depbump.toml` at its root.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Creates a repository with the given configuration file contents.
    pub fn with_config(config: &str) -> Self {
        let repo = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        repo.write("depbump.toml", config);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.file(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, content).expect("write fixture");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.file(rel)).expect("read fixture")
    }

    /// `depbump --root <repo> --no-progress` with a clean environment.
    pub fn depbump(&self) -> Command {
        let mut cmd = Command::cargo_bin("depbump").expect("depbump binary");
        cmd.arg("--root")
            .arg(self.path())
            .arg("--no-progress")
            .env_remove("GITHUB_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }
}

pub const WORKSPACE: &str = r#"# Third-party archives.

# releaser:upgrade-dep golang tools
[[http_archive]]
name = "org_golang_x_tools"
sha256 = "0000000000000000000000000000000000000000000000000000000000000000"
strip_prefix = "tools-0.1.0"
# v0.1.0, latest as of 2024-01-01
urls = [
    "https://mirror.bazel.build/github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
    "https://github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
]
patches = [
    # releaser:patch-cmd gazelle -go_prefix golang.org/x/tools
    "//third_party:org_golang_x_tools-gazelle.patch",
    "//third_party:org_golang_x_tools-extras.patch",
]

# Vendored, never upgraded.
[[http_archive]]
name = "local_config"
sha256 = "1111111111111111111111111111111111111111111111111111111111111111"
urls = ["https://example.com/local_config.zip"]
"#;

pub const DEPS: &str = r#"# releaser:upgrade-dep bazelbuild buildtools
[[http_archive]]
name = "com_github_bazelbuild_buildtools"
sha256 = "2222222222222222222222222222222222222222222222222222222222222222"
strip_prefix = "buildtools-5.0.0"
urls = ["https://github.com/bazelbuild/buildtools/archive/refs/tags/v5.0.0.zip"]
"#;

/// Configuration listing both declaration files, with no required tools.
pub const CONFIG: &str = r#"required_tools = []

[[declarations]]
path = "WORKSPACE.toml"

[[declarations]]
path = "deps/repositories.toml"
"#;

//! Project configuration for depbump
//!
//! The configuration lives in `depbump.toml` at the repository root and tells
//! the tool where the dependency declarations are, how patch labels map to
//! files, and how archives are mirrored. Every key is optional:
//!
//! ```toml
//! required_tools = ["diff", "patch"]
//!
//! [[declarations]]
//! path = "WORKSPACE.toml"
//!
//! [[declarations]]
//! path = "go/private/repositories.toml"
//! section = "go_rules_dependencies"
//!
//! [patches]
//! label_prefix = "//third_party:"
//! directory = "third_party"
//!
//! [mirror]
//! url = "https://mirror.bazel.build/"
//! upload_command = ["gsutil", "cp", "-n", "{file}", "gs://bazel-mirror/{path}"]
//!
//! [github]
//! api_url = "https://api.github.com"
//! ```
//!
//! Relative paths are resolved against the repository root. Credentials are
//! never read from this file; see the `--github-token` flag.

use crate::constants::{DEFAULT_GITHUB_API_URL, DEFAULT_MIRROR_URL};
use crate::core::DepbumpError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Top-level configuration loaded from `depbump.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepbumpConfig {
    /// Executables that must be on `PATH` before any work starts.
    pub required_tools: Vec<String>,

    /// Files containing dependency declarations, in indexing order.
    pub declarations: Vec<DeclarationSource>,

    pub patches: PatchSettings,

    pub mirror: MirrorSettings,

    pub github: GitHubSettings,
}

/// One declaration file, optionally restricted to a single array of tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSource {
    /// Path relative to the repository root.
    pub path: PathBuf,

    /// Only `[[<section>]]` entries are indexed when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// How patch labels map onto files in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSettings {
    /// Prefix every patch label must start with, e.g. `//third_party:`.
    pub label_prefix: String,

    /// Directory, relative to the root, that the rest of the label is resolved in.
    pub directory: PathBuf,
}

/// Archive mirror location and upload command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Base URL that mirror paths are appended to.
    pub url: String,

    /// Upload argv; `{file}` and `{path}` are substituted per archive.
    pub upload_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_url: String,
}

impl Default for DepbumpConfig {
    fn default() -> Self {
        Self {
            required_tools: vec!["diff".to_string(), "patch".to_string()],
            declarations: vec![DeclarationSource {
                path: PathBuf::from("WORKSPACE.toml"),
                section: None,
            }],
            patches: PatchSettings::default(),
            mirror: MirrorSettings::default(),
            github: GitHubSettings::default(),
        }
    }
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            label_prefix: "//third_party:".to_string(),
            directory: PathBuf::from("third_party"),
        }
    }
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_MIRROR_URL.to_string(),
            upload_command: ["gsutil", "cp", "-n", "{file}", "gs://bazel-mirror/{path}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

impl DepbumpConfig {
    /// Loads `path`, or returns the defaults when it does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid TOML for this schema,
    /// or fails [`validate`](Self::validate).
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would only fail later, mid-batch.
    pub fn validate(&self) -> Result<()> {
        if self.declarations.is_empty() {
            return Err(config_error("at least one [[declarations]] entry is required"));
        }
        if self.patches.label_prefix.is_empty() {
            return Err(config_error("patches.label_prefix must not be empty"));
        }
        if self.mirror.upload_command.is_empty() {
            return Err(config_error("mirror.upload_command must not be empty"));
        }
        if !self.mirror.url.ends_with('/') {
            return Err(config_error("mirror.url must end with '/'"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> anyhow::Error {
    DepbumpError::ConfigError {
        message: message.to_string(),
    }
    .into()
}

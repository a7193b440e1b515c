//! depbump - upgrade pinned third-party archive dependencies
//!
//! A repository declares its third-party source archives in TOML files: each
//! entry pins a URL list, a SHA-256 and a strip prefix, and may carry a stack
//! of patch files applied on top of the extracted archive. depbump moves such
//! entries to a newer upstream revision and keeps everything attached to them
//! consistent.
//!
//! # Architecture Overview
//!
//! For every selected dependency, concurrently:
//!
//! 1. the `# releaser:upgrade-dep <org> <repo> [subpath]` directive above the
//!    declaration names the upstream repository ([`declaration`]);
//! 2. the newest canonical semver tag, a requested version, or the default
//!    branch tip is chosen ([`resolver`]);
//! 3. the archive URL is derived, preferring a release asset ([`archive`]);
//! 4. the archive is downloaded with a streaming SHA-256 and uploaded to the
//!    mirror ([`archive`]);
//! 5. each patch of the stack is re-applied (or regenerated by its command)
//!    and re-diffed against the new sources ([`patch`]).
//!
//! The per-dependency results are merged into the declaration documents only
//! once every task succeeded ([`upgrade`]); the first failure cancels the rest
//! and leaves the documents untouched.
//!
//! # Core Modules
//!
//! - [`cli`] - `clap` command-line interface
//! - [`config`] - `depbump.toml` project configuration
//! - [`core`] - error taxonomy and user-facing error rendering
//! - [`declaration`] - TOML declaration documents, directives and updates
//! - [`github`] - source host queries and the GitHub REST client
//! - [`resolver`] - tag filtering and revision selection
//! - [`archive`] - archive location, download, mirroring and extraction
//! - [`patch`] - patch stack regeneration
//! - [`upgrade`] - batch orchestration and cancellation
//! - [`process`] - external tool execution
//! - [`utils`] - filesystem, platform and progress helpers
//!
//! # Declaration Format
//!
//! ```toml
//! # releaser:upgrade-dep golang tools
//! [[http_archive]]
//! name = "org_golang_x_tools"
//! sha256 = "..."
//! strip_prefix = "tools-0.1.0"
//! # v0.1.0, latest as of 2024-01-01
//! urls = [
//!     "https://mirror.bazel.build/github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
//!     "https://github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
//! ]
//! patches = [
//!     # releaser:patch-cmd gazelle -repo_root . -go_prefix golang.org/x/tools
//!     "//third_party:org_golang_x_tools-gazelle.patch",
//! ]
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod declaration;
pub mod github;
pub mod patch;
pub mod process;
pub mod resolver;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

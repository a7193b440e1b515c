//! Global constants used throughout the depbump codebase.
//!
//! Directive markers, well-known URLs, and timeouts live here so the
//! values shared between the parser, the resolvers and the CLI are
//! defined exactly once.

use std::time::Duration;

/// Marker token that makes a declaration eligible for upgrades.
///
/// A declaration is upgradeable when one of the comment lines directly
/// above it reads `# releaser:upgrade-dep <org> <repo> [subpath]`.
pub const UPGRADE_DIRECTIVE: &str = "releaser:upgrade-dep";

/// Marker token that attaches a regeneration command to a patch reference.
pub const PATCH_COMMAND_DIRECTIVE: &str = "releaser:patch-cmd";

/// Timestamp written into every sanitized `+++`/`---` header line.
pub const SANITIZED_PATCH_TIMESTAMP: &str = "2000-01-01 00:00:00.000000000 -0000";

/// Default base URL of the archive mirror.
pub const DEFAULT_MIRROR_URL: &str = "https://mirror.bazel.build/";

/// Default GitHub REST API endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Base URL for generated source archives.
pub const GITHUB_WEB_URL: &str = "https://github.com";

/// Branch used when the repository metadata does not name a default branch.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// Name of the project configuration file searched for at the repository root.
pub const CONFIG_FILE_NAME: &str = "depbump.toml";

/// Page size used when listing tags.
pub const TAGS_PAGE_SIZE: usize = 100;

/// Timeout for a single GitHub API request (30 seconds).
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for external tools such as `patch` and `diff` (10 minutes).
///
/// Regeneration commands may run code generators over a whole source tree,
/// so this is intentionally generous.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("depbump/", env!("CARGO_PKG_VERSION"));

//! Error handling for depbump
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`DepbumpError`]) so callers can tell a skipped
//!    dependency from a fatal one without string matching
//! 2. **User-friendly messages** ([`ErrorContext`]) with a suggestion for the
//!    person running the CLI
//!
//! # Error Categories
//!
//! - **Directive**: [`DepbumpError::DirectiveNotFound`], [`DepbumpError::InvalidDirective`].
//!   These are skipped when upgrading `all` and fatal when a dependency is named.
//! - **Resolution**: [`DepbumpError::VersionNotFound`], [`DepbumpError::ApiError`],
//!   [`DepbumpError::DependencyNotFound`]
//! - **Transport**: [`DepbumpError::DownloadFailed`], [`DepbumpError::MirrorUploadFailed`]
//! - **Patch**: [`DepbumpError::PatchLabelInvalid`], [`DepbumpError::PatchesNotAList`],
//!   [`DepbumpError::ToolFailed`], [`DepbumpError::ArchiveLayout`]
//! - **Write**: [`DepbumpError::WriteFailed`]
//!
//! Per-dependency failures are wrapped with `upgrading <name>` by the
//! orchestrator using [`anyhow::Context`]; [`user_friendly_error`] looks through
//! that context to find the typed error underneath.
//!
//! # Examples
//!
//! ```rust,no_run
//! use depbump::core::{DepbumpError, user_friendly_error};
//! use anyhow::Context;
//!
//! let result: anyhow::Result<()> = Err(DepbumpError::VersionNotFound {
//!     requested: "v9.9.9".to_string(),
//!     latest: "v1.2.5".to_string(),
//! })
//! .context("upgrading org_golang_x_tools");
//!
//! if let Err(e) = result {
//!     user_friendly_error(e).display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for depbump operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepbumpError {
    /// The declaration has no `releaser:upgrade-dep` comment.
    #[error("releaser:upgrade-dep directive not found")]
    DirectiveNotFound,

    /// The directive is present but has the wrong number of fields.
    #[error(
        "invalid upgrade-dep directive {directive:?}; expected org and repo fields with optional rel_path field"
    )]
    InvalidDirective {
        /// The offending comment line, without the leading `#`
        directive: String,
    },

    /// A dependency named on the command line has no declaration.
    #[error("could not find dependency {name}")]
    DependencyNotFound {
        /// The argument as given by the user
        name: String,
        /// Close matches among the indexed declarations
        suggestions: Vec<String>,
    },

    /// The requested version is not among the upstream tags.
    #[error("version {requested} not found, latest is {latest}")]
    VersionNotFound {
        /// Normalized version that was requested
        requested: String,
        /// Raw name of the highest tag that is available
        latest: String,
    },

    /// A repository-hosting API call failed.
    #[error("{operation} failed: {reason}")]
    ApiError {
        /// The API operation, e.g. `list tags for golang/tools`
        operation: String,
        /// Status line or transport error
        reason: String,
    },

    /// Downloading an archive failed.
    #[error("downloading {url} failed: {reason}")]
    DownloadFailed {
        /// Archive URL
        url: String,
        /// Status line or transport error
        reason: String,
    },

    /// Uploading an archive to the mirror failed.
    #[error("uploading {path} to mirror failed: {reason}")]
    MirrorUploadFailed {
        /// Mirror-relative path
        path: String,
        /// Tool output
        reason: String,
    },

    /// A patch label does not point into the patch directory.
    #[error("patch does not start with '{prefix}': {label:?}")]
    PatchLabelInvalid {
        /// The label as written in the declaration
        label: String,
        /// The configured label prefix
        prefix: String,
    },

    /// The `patches` attribute exists but is not a list of strings.
    #[error("\"patches\" attribute of {name} is not a list of strings")]
    PatchesNotAList {
        /// Dependency name
        name: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed in {dir}: {stderr}")]
    ToolFailed {
        /// The program that was run
        tool: String,
        /// Working directory
        dir: String,
        /// Captured error output
        stderr: String,
    },

    /// The fetched archive does not have the expected layout.
    #[error("archive {archive} has no entries under {strip_prefix:?}")]
    ArchiveLayout {
        /// Archive file name
        archive: String,
        /// Expected top-level directory
        strip_prefix: String,
    },

    /// Writing a declaration file back to disk failed.
    #[error("writing {path} failed: {reason}")]
    WriteFailed {
        /// Declaration file path
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// A required executable is missing from `PATH`.
    #[error("{tool} must be installed in PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// The project configuration is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Invalid command-line usage.
    #[error("{message}")]
    UsageError {
        /// Description of the problem
        message: String,
    },

    /// Work was abandoned because another dependency failed.
    #[error("cancelled because another dependency failed")]
    Cancelled,

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl DepbumpError {
    /// Returns `true` for directive errors, which are skipped when upgrading `all`.
    #[must_use]
    pub const fn is_directive_error(&self) -> bool {
        matches!(self, Self::DirectiveNotFound | Self::InvalidDirective { .. })
    }
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DepbumpError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: DepbumpError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow, suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] for CLI display.
///
/// The displayed message is the whole context chain joined with `": "`, so a
/// per-dependency failure reads `upgrading foo: version v2 not found, ...`.
/// Suggestions come from the first [`DepbumpError`] found in the chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    let typed = error.chain().find_map(|cause| cause.downcast_ref::<DepbumpError>()).cloned();

    let Some(typed) = typed else {
        if let Some(io_error) = error.downcast_ref::<std::io::Error>()
            && io_error.kind() == std::io::ErrorKind::PermissionDenied
        {
            return ErrorContext::new(DepbumpError::Other {
                message,
            })
            .with_suggestion("Check file ownership and permissions of the repository checkout");
        }
        return ErrorContext::new(DepbumpError::Other {
            message,
        });
    };

    let base = ErrorContext::new(DepbumpError::Other {
        message,
    });

    match typed {
        DepbumpError::DirectiveNotFound | DepbumpError::InvalidDirective { .. } => base
            .with_suggestion(
                "Add a comment like '# releaser:upgrade-dep <org> <repo> [rel_path]' directly above the declaration",
            )
            .with_details("Only declarations carrying an upgrade-dep directive can be upgraded"),
        DepbumpError::DependencyNotFound { suggestions, .. } if !suggestions.is_empty() => {
            base.with_suggestion(format!("Did you mean: {}?", suggestions.join(", ")))
        }
        DepbumpError::DependencyNotFound { .. } => base.with_suggestion(
            "Dependency names match the 'name' key of a declaration in one of the configured files",
        ),
        DepbumpError::VersionNotFound { latest, .. } => base
            .with_suggestion(format!("Request an existing tag such as {latest}, or omit @version"))
            .with_details("Requested versions must match a normalized tag name exactly, e.g. v1.2.0"),
        DepbumpError::ApiError { .. } => base
            .with_suggestion("Pass --github-token (or set GITHUB_TOKEN) to avoid API rate limits")
            .with_details("No retries are attempted; re-run the command once the API is reachable"),
        DepbumpError::DownloadFailed { .. } | DepbumpError::MirrorUploadFailed { .. } => base
            .with_suggestion("Check network access, or pass --no-mirror to skip the mirror upload"),
        DepbumpError::PatchLabelInvalid { .. } | DepbumpError::PatchesNotAList { .. } => base
            .with_suggestion("Patch references must be strings naming files in the patch directory"),
        DepbumpError::ToolFailed { .. } | DepbumpError::ArchiveLayout { .. } => base
            .with_suggestion("Re-run with --work to keep the staging directories for inspection")
            .with_details("Patch files regenerated before the failure are left on disk"),
        DepbumpError::ToolNotFound { tool } => {
            base.with_suggestion(format!("Install '{tool}' and make sure it is in PATH"))
        }
        DepbumpError::WriteFailed { .. } => base
            .with_details("All dependencies were resolved, but the declaration files could not be saved"),
        _ => base,
    }
}

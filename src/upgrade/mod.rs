//! Batch orchestration for `upgrade-dep`
//!
//! The [`Upgrader`] turns a [`DependencySelection`] into one task per
//! dependency and runs them concurrently:
//!
//! ```text
//! names ──► snapshots + directives ──► tasks (concurrent) ──► ResolvedAttributes
//!                                          │ first failure cancels the rest
//!                                          ▼
//!                              merge into DeclarationSet (single-threaded)
//! ```
//!
//! Tasks never touch the declaration documents. Only after every task has
//! succeeded are the resolved attributes merged, so a failing batch leaves
//! the documents exactly as they were loaded.

mod cancel;
mod task;

pub use cancel::CancellationToken;

use crate::archive::{ArchiveMirror, Downloader};
use crate::config::PatchSettings;
use crate::constants::DEFAULT_MIRROR_URL;
use crate::core::DepbumpError;
use crate::declaration::{DeclarationSet, ResolvedAttributes};
use crate::github::RepositoryHost;
use crate::patch::PatchTool;
use crate::utils::fs::WorkDir;
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use chrono::NaiveDate;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use task::UpgradeTask;
use tracing::{debug, warn};

/// A dependency named on the command line, with an optional version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub name: String,
    /// Tag or commit reference from `name@version`
    pub version: Option<String>,
}

/// Which dependencies a run upgrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySelection {
    /// Every declaration with a valid upgrade directive
    All,
    Named(Vec<DependencyRequest>),
}

impl DependencySelection {
    /// Parses command-line arguments: `all`, or names with optional `@version`.
    ///
    /// # Errors
    ///
    /// [`DepbumpError::UsageError`] when no argument is given, when `all`
    /// is combined with other arguments, or when a name repeats.
    ///
    /// ```rust
    /// use depbump::upgrade::{DependencySelection, DependencyRequest};
    ///
    /// let args = vec!["org_golang_x_tools@v0.1.0".to_string()];
    /// assert_eq!(
    ///     DependencySelection::parse(&args).unwrap(),
    ///     DependencySelection::Named(vec![DependencyRequest {
    ///         name: "org_golang_x_tools".to_string(),
    ///         version: Some("v0.1.0".to_string()),
    ///     }]),
    /// );
    /// ```
    pub fn parse(args: &[String]) -> Result<Self, DepbumpError> {
        if args.is_empty() {
            return Err(DepbumpError::UsageError {
                message: "no dependencies specified".to_string(),
            });
        }
        if args.iter().any(|arg| arg == "all") {
            if args.len() > 1 {
                return Err(DepbumpError::UsageError {
                    message: "'all' must be the only argument".to_string(),
                });
            }
            return Ok(Self::All);
        }

        let mut seen = HashSet::new();
        args.iter()
            .map(|arg| {
                let (name, version) = match arg.split_once('@') {
                    Some((name, version)) => (name, Some(version.to_string())),
                    None => (arg.as_str(), None),
                };
                if name.is_empty() || version.as_deref() == Some("") {
                    return Err(DepbumpError::UsageError {
                        message: format!("invalid dependency argument {arg:?}; expected name or name@version"),
                    });
                }
                if !seen.insert(name) {
                    return Err(DepbumpError::UsageError {
                        message: format!("dependency {name} specified more than once"),
                    });
                }
                Ok(DependencyRequest {
                    name: name.to_string(),
                    version,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Named)
    }
}

/// Runs upgrade batches against a set of collaborators.
///
/// # Examples
///
/// ```rust,no_run
/// use depbump::upgrade::{DependencySelection, Upgrader};
/// use depbump::github::GitHubClient;
/// use depbump::patch::ShellPatchTool;
/// use depbump::declaration::DeclarationSet;
/// use depbump::utils::fs::WorkDir;
/// use std::sync::Arc;
///
/// # async fn example(mut declarations: DeclarationSet) -> anyhow::Result<()> {
/// let client = Arc::new(GitHubClient::new("https://api.github.com", None)?);
/// let upgrader = Upgrader::new(client.clone(), client, Arc::new(ShellPatchTool), "/repo".into());
/// let work = WorkDir::new(false)?;
/// upgrader.upgrade(&mut declarations, &DependencySelection::All, &work).await?;
/// declarations.write_all()?;
/// # Ok(())
/// # }
/// ```
pub struct Upgrader {
    host: Arc<dyn RepositoryHost>,
    downloader: Arc<dyn Downloader>,
    patch_tool: Arc<dyn PatchTool>,
    /// `None` disables mirror uploads
    mirror: Option<Arc<dyn ArchiveMirror>>,
    root: PathBuf,
    patch_settings: PatchSettings,
    mirror_url: String,
    today: NaiveDate,
    progress: ProgressBar,
}

impl Upgrader {
    /// Creates an upgrader for the repository at `root` with default settings
    /// and mirroring disabled.
    pub fn new(
        host: Arc<dyn RepositoryHost>,
        downloader: Arc<dyn Downloader>,
        patch_tool: Arc<dyn PatchTool>,
        root: PathBuf,
    ) -> Self {
        Self {
            host,
            downloader,
            patch_tool,
            mirror: None,
            root,
            patch_settings: PatchSettings::default(),
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            today: chrono::Local::now().date_naive(),
            progress: ProgressBar::new_spinner(false),
        }
    }

    /// Uploads every fetched archive to `mirror`.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn ArchiveMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Base URL mirror URLs are built from.
    #[must_use]
    pub fn with_mirror_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_url = url.into();
        self
    }

    #[must_use]
    pub fn with_patch_settings(mut self, settings: PatchSettings) -> Self {
        self.patch_settings = settings;
        self
    }

    /// Date used in annotations; defaults to the local date.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Builds the task list for `selection`.
    ///
    /// Unknown names fail the whole run. Directive errors fail named
    /// dependencies but only skip dependencies selected by `all`.
    fn plan(
        &self,
        declarations: &DeclarationSet,
        selection: &DependencySelection,
    ) -> Result<Vec<UpgradeTask>> {
        match selection {
            DependencySelection::All => {
                let mut tasks = Vec::new();
                for name in declarations.names() {
                    let Some(declaration) = declarations.get(name) else {
                        continue;
                    };
                    match declaration.directive() {
                        Ok(directive) => tasks.push(UpgradeTask {
                            declaration,
                            directive,
                            requested: None,
                        }),
                        Err(DepbumpError::DirectiveNotFound) => {
                            debug!("Skipping {}: no upgrade directive", name);
                        }
                        Err(e) if e.is_directive_error() => warn!("Skipping {}: {}", name, e),
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(tasks)
            }
            DependencySelection::Named(requests) => {
                if let Some(missing) = requests.iter().find(|r| !declarations.contains(&r.name)) {
                    return Err(DepbumpError::DependencyNotFound {
                        name: missing.name.clone(),
                        suggestions: declarations.suggest(&missing.name),
                    }
                    .into());
                }

                let mut tasks = Vec::with_capacity(requests.len());
                for request in requests {
                    let Some(declaration) = declarations.get(&request.name) else {
                        continue;
                    };
                    let directive = declaration.directive().map_err(|e| {
                        anyhow::Error::from(e).context(format!("upgrading {}", request.name))
                    })?;
                    tasks.push(UpgradeTask {
                        declaration,
                        directive,
                        requested: request.version.clone(),
                    });
                }
                Ok(tasks)
            }
        }
    }

    /// Upgrades the selected dependencies and merges the results into
    /// `declarations`.
    ///
    /// Tasks run concurrently, each staging under `<work>/<name>/`. The first
    /// failure cancels the others and the documents are left untouched;
    /// writing them to disk is up to the caller.
    ///
    /// Returns the applied attribute sets, sorted by dependency name.
    ///
    /// # Errors
    ///
    /// The first failure that is not a cancellation, wrapped with
    /// `upgrading <name>`. When several dependencies failed, the others are
    /// listed in an outer context.
    pub async fn upgrade(
        &self,
        declarations: &mut DeclarationSet,
        selection: &DependencySelection,
        work: &WorkDir,
    ) -> Result<Vec<ResolvedAttributes>> {
        let tasks = self.plan(declarations, selection)?;
        if tasks.is_empty() {
            warn!("No upgradeable dependencies found");
            return Ok(Vec::new());
        }

        let total = tasks.len();
        self.progress.set_message(format!("Upgrading {total} dependencies"));
        let cancel = CancellationToken::new();

        let mut pending = FuturesUnordered::new();
        for task in tasks {
            let name = task.declaration.name.clone();
            let staging = work.task_dir(&name)?;
            let cancel = cancel.clone();
            pending.push(async move {
                let result = task.run(self, &cancel, &staging).await;
                (name, result)
            });
        }

        let mut resolved = Vec::with_capacity(total);
        let mut failures: Vec<(String, anyhow::Error)> = Vec::new();
        while let Some((name, result)) = pending.next().await {
            match result {
                Ok(attrs) => {
                    self.progress.println(format!("upgraded {}: {}", name, attrs.annotation));
                    resolved.push(attrs);
                }
                Err(e) => {
                    if !is_cancellation(&e) {
                        warn!("Upgrading {} failed: {:#}", name, e);
                    }
                    cancel.cancel();
                    failures.push((name, e));
                }
            }
            self.progress.set_message(format!(
                "Upgrading dependencies ({}/{total} done)",
                resolved.len() + failures.len()
            ));
        }

        if !failures.is_empty() {
            return Err(aggregate_failures(failures, total));
        }

        resolved.sort_by(|a, b| a.name.cmp(&b.name));
        for attrs in &resolved {
            declarations.apply(attrs)?;
        }
        Ok(resolved)
    }
}

fn is_cancellation(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<DepbumpError>(), Some(DepbumpError::Cancelled))
}

/// Picks the error to report: the first real failure, with the others listed.
fn aggregate_failures(mut failures: Vec<(String, anyhow::Error)>, total: usize) -> anyhow::Error {
    let primary = failures.iter().position(|(_, e)| !is_cancellation(e)).unwrap_or(0);
    let (name, error) = failures.remove(primary);
    let error = error.context(format!("upgrading {name}"));

    if failures.is_empty() {
        return error;
    }
    let others: Vec<String> = failures
        .iter()
        .map(|(name, e)| format!("  {name}: {e}"))
        .collect();
    error.context(format!(
        "{} of {total} dependencies failed; also:\n{}\n",
        others.len() + 1,
        others.join("\n")
    ))
}

//! Command-line interface for depbump
//!
//! ```text
//! depbump [--verbose | --quiet] [--root DIR] [--no-progress] <COMMAND>
//!
//! Commands:
//!   upgrade-dep  Upgrade dependencies to their newest upstream release
//! ```
//!
//! Global flags control logging and progress output and locate the
//! repository; everything else is a subcommand option. Logging goes to
//! stderr through `tracing-subscriber`, with `RUST_LOG` taking precedence over
//! the verbosity flags.

mod upgrade_dep;

pub use upgrade_dep::UpgradeDepCommand;

use crate::utils::fs::find_project_root;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,

    /// Show the progress spinner
    pub progress: bool,

    /// Skip the per-dependency summary
    pub quiet: bool,
}

/// Main CLI structure.
#[derive(Parser)]
#[command(
    name = "depbump",
    about = "Upgrade pinned third-party archives and regenerate their patches",
    version,
    long_about = "depbump upgrades archive dependencies declared in TOML files to their newest \
                  upstream release, mirrors the new archives and regenerates the patch files \
                  applied on top of them."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors and skip the summary
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Repository root (defaults to the nearest directory with depbump.toml)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Disable the progress spinner
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade dependencies to their newest upstream release
    ///
    /// Pass dependency names (optionally as name@version), or `all` to upgrade
    /// every declaration carrying an upgrade directive.
    UpgradeDep(UpgradeDepCommand),
}

impl Cli {
    /// Runs the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        init_logging(&config);
        let root = self.project_root()?;

        match self.command {
            Commands::UpgradeDep(cmd) => cmd.execute(&root, &config).await,
        }
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            progress: !self.no_progress && !self.quiet,
            quiet: self.quiet,
        }
    }

    fn project_root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => root
                .canonicalize()
                .with_context(|| format!("Repository root {} does not exist", root.display())),
            None => {
                let cwd = std::env::current_dir().context("Failed to read current directory")?;
                find_project_root(&cwd)
            }
        }
    }
}

fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("depbump={}", config.log_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

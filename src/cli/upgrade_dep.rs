//! The `upgrade-dep` command.

use super::CliConfig;
use crate::archive::CommandMirror;
use crate::config::DepbumpConfig;
use crate::constants::CONFIG_FILE_NAME;
use crate::declaration::DeclarationSet;
use crate::github::GitHubClient;
use crate::patch::ShellPatchTool;
use crate::upgrade::{DependencySelection, Upgrader};
use crate::utils::fs::WorkDir;
use crate::utils::progress::ProgressBar;
use crate::utils::{expand_path, require_tools};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Upgrade dependencies and regenerate their patches.
#[derive(Args, Debug)]
pub struct UpgradeDepCommand {
    /// GitHub API token, or a path to a file containing one
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub(crate) github_token: Option<String>,

    /// Do not upload new archives to the mirror
    #[arg(long)]
    pub(crate) no_mirror: bool,

    /// Keep the work directory and print its location
    #[arg(long)]
    pub(crate) work: bool,

    /// Dependencies to upgrade: `all`, or names optionally suffixed with `@version`
    #[arg(value_name = "DEPS")]
    pub(crate) deps: Vec<String>,
}

impl UpgradeDepCommand {
    /// Runs the command against the repository at `root`.
    ///
    /// Declaration files are only written after every selected dependency
    /// upgraded successfully.
    pub async fn execute(self, root: &Path, cli: &CliConfig) -> Result<()> {
        let selection = DependencySelection::parse(&self.deps)?;

        let config = DepbumpConfig::load_or_default(&root.join(CONFIG_FILE_NAME)).await?;
        let mut tools = config.required_tools.clone();
        if !self.no_mirror
            && let Some(program) = config.mirror.upload_command.first()
        {
            tools.push(program.clone());
        }
        require_tools(&tools)?;

        let mut declarations = DeclarationSet::load(root, &config.declarations).await?;
        debug!("Indexed {} declarations", declarations.names().count());

        let token = self.github_token.as_deref().map(resolve_token).transpose()?.flatten();
        let client = Arc::new(GitHubClient::new(&config.github.api_url, token)?);

        let progress = ProgressBar::new_spinner(cli.progress);
        let mut upgrader =
            Upgrader::new(client.clone(), client, Arc::new(ShellPatchTool), root.to_path_buf())
                .with_patch_settings(config.patches.clone())
                .with_mirror_url(config.mirror.url.clone())
                .with_progress(progress.clone());
        if !self.no_mirror {
            upgrader =
                upgrader.with_mirror(Arc::new(CommandMirror::new(config.mirror.upload_command.clone())));
        }

        let work = WorkDir::new(self.work)?;
        let result = upgrader.upgrade(&mut declarations, &selection, &work).await;
        progress.finish_and_clear();
        if work.is_kept() {
            println!("Work directory: {}", work.path().display());
        }
        let upgraded = result?;

        declarations.write_all()?;

        if !cli.quiet {
            if upgraded.is_empty() {
                println!("No dependencies upgraded");
            }
            for attrs in &upgraded {
                println!("{} {} ({})", "✓".green(), attrs.name.bold(), attrs.annotation);
            }
        }
        Ok(())
    }
}

/// Reads a token from a file when `value` names one, otherwise uses it as is.
///
/// Blank tokens count as no token.
fn resolve_token(value: &str) -> Result<Option<String>> {
    let token = match expand_path(value) {
        Ok(path) if path.is_file() => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read GitHub token from {}", path.display()))?,
        _ => value.to_string(),
    };
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

//! The per-dependency upgrade pipeline.

use super::{CancellationToken, Upgrader};
use crate::archive::{ArchiveKind, extract_archive, fetch_archive, resolve_location};
use crate::core::DepbumpError;
use crate::declaration::{DependencyDeclaration, ResolvedAttributes, UpgradeDirective};
use crate::patch::{regenerate, resolve_patch_entries, stage_name};
use crate::resolver::{ResolveRequest, resolve_revision};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Everything one task needs, owned by the task.
pub(crate) struct UpgradeTask {
    pub declaration: DependencyDeclaration,
    pub directive: UpgradeDirective,
    pub requested: Option<String>,
}

impl UpgradeTask {
    /// Resolves, fetches, mirrors and re-patches one dependency.
    ///
    /// Nothing in the declaration documents is touched; the returned
    /// attributes are applied by the orchestrator. Patch files are rewritten
    /// in place as regeneration progresses.
    pub(crate) async fn run(
        self,
        upgrader: &Upgrader,
        cancel: &CancellationToken,
        staging: &Path,
    ) -> Result<ResolvedAttributes> {
        let Self {
            declaration,
            directive,
            requested,
        } = self;
        let name = declaration.name.as_str();
        let UpgradeDirective {
            org,
            repo,
            subpath,
        } = &directive;

        let patches = resolve_patch_entries(
            name,
            &declaration.patches,
            &upgrader.root,
            &upgrader.patch_settings,
        )?;

        let request = ResolveRequest {
            org,
            repo,
            subpath: subpath.as_deref(),
            requested: requested.as_deref(),
            today: upgrader.today,
        };
        let revision = resolve_revision(upgrader.host.as_ref(), cancel, &request).await?;
        debug!("{} resolved to {:?}", name, revision);

        let location = resolve_location(
            upgrader.host.as_ref(),
            cancel,
            org,
            repo,
            subpath.as_deref(),
            &revision,
            &upgrader.mirror_url,
        )
        .await?;

        let archive =
            fetch_archive(upgrader.downloader.as_ref(), cancel, &location.download_url, staging)
                .await?;

        if let Some(mirror) = &upgrader.mirror {
            cancel.run(mirror.upload(&location.mirror_path, archive.path())).await?;
            debug!("Mirrored {} to {}", name, location.mirror_url);
        }

        if !patches.is_empty() {
            let kind = ArchiveKind::from_url(&location.download_url).ok_or_else(|| {
                DepbumpError::Other {
                    message: format!("unsupported archive format: {}", location.download_url),
                }
            })?;
            let base_stage = staging.join(stage_name(0));
            let archive_path = archive.path().to_path_buf();
            let strip_prefix = location.strip_prefix.clone();
            cancel.check()?;
            tokio::task::spawn_blocking(move || {
                extract_archive(&archive_path, kind, &strip_prefix, &base_stage)
            })
            .await
            .context("Archive extraction task panicked")??;

            regenerate(upgrader.patch_tool.as_ref(), cancel, staging, &patches).await?;
        }

        info!("Upgraded {}: {}", name, location.annotation);
        Ok(ResolvedAttributes {
            name: name.to_string(),
            sha256: archive.sha256.clone(),
            strip_prefix: location.strip_prefix,
            urls: [location.mirror_url, location.download_url],
            annotation: location.annotation,
        })
    }
}

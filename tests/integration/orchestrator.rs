//! Whole upgrade batches against in-memory collaborators.

use crate::common::{CONFIG, DEPS, TestRepo, WORKSPACE};
use chrono::NaiveDate;
use depbump::config::DepbumpConfig;
use depbump::core::DepbumpError;
use depbump::declaration::{DeclarationSet, ResolvedAttributes};
use depbump::github::{Asset, Release};
use depbump::test_utils::{
    FakeDownloader, FakeRepositoryHost, RecordingMirror, ScriptedPatchTool, init_test_logging,
    zip_archive,
};
use depbump::upgrade::{DependencySelection, Upgrader};
use depbump::utils::fs::WorkDir;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

const TOOLS_URL: &str = "https://github.com/golang/tools/archive/refs/tags/v0.2.0.zip";
const BUILDTOOLS_URL: &str =
    "https://github.com/bazelbuild/buildtools/releases/download/v6.0.0/buildtools-v6.0.0.tar.gz";
const BUILDTOOLS_BODY: &[u8] = b"not really a tarball";

struct Fixture {
    repo: TestRepo,
    tools_archive: Vec<u8>,
}

impl Fixture {
    fn new() -> Self {
        init_test_logging(None);
        let repo = TestRepo::with_config(CONFIG);
        repo.write("WORKSPACE.toml", WORKSPACE);
        repo.write("deps/repositories.toml", DEPS);
        repo.write("third_party/org_golang_x_tools-gazelle.patch", "stale\n");
        repo.write("third_party/org_golang_x_tools-extras.patch", "stale\n");

        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("tools.zip");
        zip_archive(
            &archive,
            &[("tools-0.2.0/go.mod", "module golang.org/x/tools\n"), ("tools-0.2.0/README", "tools\n")],
        );

        Self {
            repo,
            tools_archive: std::fs::read(&archive).unwrap(),
        }
    }

    fn host(&self) -> FakeRepositoryHost {
        FakeRepositoryHost::new()
            .with_tags("golang", "tools", &["v0.1.0", "v0.2.0", "v0.3.0-rc1", "gopls/v0.9.0"])
            .with_tags("bazelbuild", "buildtools", &["v5.0.0", "v6.0.0"])
            .with_release(
                "bazelbuild",
                "buildtools",
                Release {
                    tag_name: "v6.0.0".to_string(),
                    assets: vec![Asset {
                        name: "buildtools-v6.0.0.tar.gz".to_string(),
                        browser_download_url: BUILDTOOLS_URL.to_string(),
                    }],
                },
            )
    }

    fn downloader(&self) -> FakeDownloader {
        FakeDownloader::new()
            .with_body(TOOLS_URL, self.tools_archive.clone())
            .with_body(BUILDTOOLS_URL, BUILDTOOLS_BODY.to_vec())
    }

    fn upgrader(&self) -> Upgrader {
        Upgrader::new(
            Arc::new(self.host()),
            Arc::new(self.downloader()),
            Arc::new(ScriptedPatchTool::new()),
            self.repo.path().to_path_buf(),
        )
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    async fn declarations(&self) -> DeclarationSet {
        let config = DepbumpConfig::load_from(&self.repo.file("depbump.toml")).await.unwrap();
        DeclarationSet::load(self.repo.path(), &config.declarations).await.unwrap()
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn named(args: &[&str]) -> DependencySelection {
    let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
    DependencySelection::parse(&args).unwrap()
}

#[tokio::test]
async fn test_upgrade_all_updates_every_declaration() {
    let fixture = Fixture::new();
    let mut declarations = fixture.declarations().await;
    let work = WorkDir::new(false).unwrap();

    let upgraded = fixture
        .upgrader()
        .upgrade(&mut declarations, &DependencySelection::All, &work)
        .await
        .unwrap();
    declarations.write_all().unwrap();

    let names: Vec<&str> = upgraded.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["com_github_bazelbuild_buildtools", "org_golang_x_tools"]);

    let expected_workspace = format!(
        r#"# Third-party archives.

# releaser:upgrade-dep golang tools
[[http_archive]]
name = "org_golang_x_tools"
sha256 = "{}"
strip_prefix = "tools-0.2.0"
# v0.2.0, latest as of 2024-05-01
urls = [
    "https://mirror.bazel.build/github.com/golang/tools/archive/refs/tags/v0.2.0.zip",
    "https://github.com/golang/tools/archive/refs/tags/v0.2.0.zip",
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
"#,
        sha256_hex(&fixture.tools_archive)
    );
    assert_eq!(fixture.repo.read("WORKSPACE.toml"), expected_workspace);

    let deps = fixture.repo.read("deps/repositories.toml");
    assert!(deps.contains(&format!("sha256 = \"{}\"\n", sha256_hex(BUILDTOOLS_BODY))));
    assert!(deps.contains("strip_prefix = \"\"\n"));
    assert!(deps.contains(&format!(
        "# v6.0.0, latest as of 2024-05-01\nurls = [\n    \"https://mirror.bazel.build/{}\",\n    \"{BUILDTOOLS_URL}\",\n]\n",
        BUILDTOOLS_URL.trim_start_matches("https://")
    )));

    assert_eq!(
        fixture.repo.read("third_party/org_golang_x_tools-gazelle.patch"),
        "--- a\t2000-01-01 00:00:00.000000000 -0000\n+++ b\t2000-01-01 00:00:00.000000000 -0000\n"
    );
    assert_eq!(
        fixture.repo.read("third_party/org_golang_x_tools-extras.patch"),
        "--- b\t2000-01-01 00:00:00.000000000 -0000\n+++ c\t2000-01-01 00:00:00.000000000 -0000\n"
    );
}

#[tokio::test]
async fn test_concurrent_and_sequential_batches_agree() {
    let fixture = Fixture::new();
    let upgrader = fixture.upgrader();

    let mut together = fixture.declarations().await;
    let concurrent = upgrader
        .upgrade(&mut together, &DependencySelection::All, &WorkDir::new(false).unwrap())
        .await
        .unwrap();

    let mut one_by_one = fixture.declarations().await;
    let mut sequential: Vec<ResolvedAttributes> = Vec::new();
    for name in ["com_github_bazelbuild_buildtools", "org_golang_x_tools"] {
        let results = upgrader
            .upgrade(&mut one_by_one, &named(&[name]), &WorkDir::new(false).unwrap())
            .await
            .unwrap();
        sequential.extend(results);
    }

    assert_eq!(concurrent, sequential);
    for (a, b) in together.files().iter().zip(one_by_one.files()) {
        assert_eq!(a.render(), b.render());
    }
}

#[tokio::test]
async fn test_one_failure_leaves_every_document_untouched() {
    let fixture = Fixture::new();
    let mut declarations = fixture.declarations().await;
    let work = WorkDir::new(false).unwrap();

    let err = fixture
        .upgrader()
        .upgrade(
            &mut declarations,
            &named(&["org_golang_x_tools", "com_github_bazelbuild_buildtools@v9.9.9"]),
            &work,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepbumpError>(),
        Some(DepbumpError::VersionNotFound { .. })
    ));
    assert!(format!("{err:#}").contains(
        "upgrading com_github_bazelbuild_buildtools: version v9.9.9 not found, latest is v6.0.0"
    ));

    declarations.write_all().unwrap();
    assert_eq!(fixture.repo.read("WORKSPACE.toml"), WORKSPACE);
    assert_eq!(fixture.repo.read("deps/repositories.toml"), DEPS);
    assert_eq!(declarations.files()[0].render(), WORKSPACE);
    assert_eq!(declarations.files()[1].render(), DEPS);
}

#[tokio::test]
async fn test_requested_prerelease_with_mismatched_archive_fails() {
    let fixture = Fixture::new();
    let downloader = fixture.downloader().with_body(
        "https://github.com/golang/tools/archive/refs/tags/v0.3.0-rc1.zip",
        fixture.tools_archive.clone(),
    );
    let upgrader = Upgrader::new(
        Arc::new(fixture.host()),
        Arc::new(downloader),
        Arc::new(ScriptedPatchTool::new()),
        fixture.repo.path().to_path_buf(),
    )
    .with_today(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    let mut declarations = fixture.declarations().await;

    // The archive only contains tools-0.2.0/, so extraction for the patches fails.
    let err = upgrader
        .upgrade(&mut declarations, &named(&["org_golang_x_tools@v0.3.0-rc1"]), &WorkDir::new(false).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DepbumpError>(),
        Some(DepbumpError::ArchiveLayout { .. })
    ));
}

#[tokio::test]
async fn test_unknown_name_fails_before_any_download() {
    let fixture = Fixture::new();
    let downloader = Arc::new(fixture.downloader());
    let upgrader = Upgrader::new(
        Arc::new(fixture.host()),
        downloader.clone(),
        Arc::new(ScriptedPatchTool::new()),
        fixture.repo.path().to_path_buf(),
    );
    let mut declarations = fixture.declarations().await;

    let err = upgrader
        .upgrade(
            &mut declarations,
            &named(&["com_github_bazelbuild_buildtools", "org_golang_x_tool"]),
            &WorkDir::new(false).unwrap(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<DepbumpError>(),
        Some(&DepbumpError::DependencyNotFound {
            name: "org_golang_x_tool".to_string(),
            suggestions: vec!["org_golang_x_tools".to_string()],
        })
    );
    assert!(downloader.requests().is_empty());
}

#[tokio::test]
async fn test_archives_are_mirrored() {
    let fixture = Fixture::new();
    let mirror = Arc::new(RecordingMirror::new());
    let upgrader = fixture.upgrader().with_mirror(mirror.clone());
    let mut declarations = fixture.declarations().await;

    upgrader
        .upgrade(&mut declarations, &DependencySelection::All, &WorkDir::new(false).unwrap())
        .await
        .unwrap();

    assert_eq!(
        mirror.uploads(),
        vec![
            "github.com/bazelbuild/buildtools/releases/download/v6.0.0/buildtools-v6.0.0.tar.gz",
            "github.com/golang/tools/archive/refs/tags/v0.2.0.zip",
        ]
    );
}

#[tokio::test]
async fn test_mirror_failure_aborts_batch() {
    let fixture = Fixture::new();
    let upgrader = fixture.upgrader().with_mirror(Arc::new(RecordingMirror::failing()));
    let mut declarations = fixture.declarations().await;

    let err = upgrader
        .upgrade(
            &mut declarations,
            &named(&["com_github_bazelbuild_buildtools"]),
            &WorkDir::new(false).unwrap(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepbumpError>(),
        Some(DepbumpError::MirrorUploadFailed { .. })
    ));
    assert_eq!(declarations.files()[1].render(), DEPS);
}

#[tokio::test]
async fn test_kept_work_directory_holds_stages() {
    let fixture = Fixture::new();
    let mut declarations = fixture.declarations().await;
    let work = WorkDir::new(true).unwrap();

    fixture
        .upgrader()
        .upgrade(&mut declarations, &named(&["org_golang_x_tools"]), &work)
        .await
        .unwrap();

    let staging = work.path().join("org_golang_x_tools");
    for stage in ["a", "b", "c"] {
        assert_eq!(
            std::fs::read_to_string(staging.join(stage).join("go.mod")).unwrap(),
            "module golang.org/x/tools\n"
        );
    }
    let kept = work.path().to_path_buf();
    drop(work);
    assert!(kept.exists());
    std::fs::remove_dir_all(kept).unwrap();
}

const BROKEN: &str = r#"
# releaser:upgrade-dep bazelbuild
[[http_archive]]
name = "com_github_bazelbuild_broken"
urls = ["https://example.com/broken.zip"]
"#;

#[tokio::test]
async fn test_malformed_directive_is_skipped_under_all() {
    let fixture = Fixture::new();
    let deps = format!("{DEPS}{BROKEN}");
    fixture.repo.write("deps/repositories.toml", &deps);
    let mut declarations = fixture.declarations().await;

    let upgraded = fixture
        .upgrader()
        .upgrade(&mut declarations, &DependencySelection::All, &WorkDir::new(false).unwrap())
        .await
        .unwrap();

    let names: Vec<&str> = upgraded.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["com_github_bazelbuild_buildtools", "org_golang_x_tools"]);
    assert!(declarations.files()[1].render().ends_with(BROKEN));
}

#[tokio::test]
async fn test_malformed_directive_fails_when_named() {
    let fixture = Fixture::new();
    let deps = format!("{DEPS}{BROKEN}");
    fixture.repo.write("deps/repositories.toml", &deps);
    let mut declarations = fixture.declarations().await;

    let err = fixture
        .upgrader()
        .upgrade(
            &mut declarations,
            &named(&["com_github_bazelbuild_buildtools", "com_github_bazelbuild_broken"]),
            &WorkDir::new(false).unwrap(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepbumpError>(),
        Some(DepbumpError::InvalidDirective { .. })
    ));
    assert!(format!("{err:#}").starts_with("upgrading com_github_bazelbuild_broken: "));
    assert_eq!(declarations.files()[1].render(), deps);
}

#[tokio::test]
async fn test_failure_cancels_pending_sibling() {
    let fixture = Fixture::new();
    let upgrader = Upgrader::new(
        Arc::new(fixture.host().with_stalled_tags("bazelbuild", "buildtools")),
        Arc::new(fixture.downloader()),
        Arc::new(ScriptedPatchTool::new()),
        fixture.repo.path().to_path_buf(),
    )
    .with_today(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    let mut declarations = fixture.declarations().await;
    let work = WorkDir::new(false).unwrap();

    let requests = named(&["org_golang_x_tools@v9.9.9", "com_github_bazelbuild_buildtools"]);
    let batch = upgrader.upgrade(
        &mut declarations,
        &requests,
        &work,
    );
    let err = tokio::time::timeout(Duration::from_secs(10), batch)
        .await
        .expect("batch should stop once a dependency fails")
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DepbumpError>(),
        Some(DepbumpError::VersionNotFound { .. })
    ));
    let rendered = format!("{err:#}");
    assert!(rendered.contains("com_github_bazelbuild_buildtools: cancelled because another dependency failed"));
    assert!(rendered.ends_with("upgrading org_golang_x_tools: version v9.9.9 not found, latest is v0.2.0"));
    assert_eq!(fixture.repo.read("WORKSPACE.toml"), WORKSPACE);
}

//! Tests for the `depbump` binary.
//!
//! Every case here stops before the first network request.

use crate::common::{CONFIG, DEPS, TestRepo, WORKSPACE};
use assert_cmd::Command;
use predicates::prelude::*;

fn repo() -> TestRepo {
    let repo = TestRepo::with_config(CONFIG);
    repo.write("WORKSPACE.toml", WORKSPACE);
    repo.write("deps/repositories.toml", DEPS);
    repo
}

#[test]
fn test_help_lists_upgrade_dep() {
    Command::cargo_bin("depbump")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upgrade-dep"));
}

#[test]
fn test_no_dependencies_specified() {
    repo()
        .depbump()
        .arg("upgrade-dep")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no dependencies specified"));
}

#[test]
fn test_all_must_be_alone() {
    repo()
        .depbump()
        .args(["upgrade-dep", "all", "org_golang_x_tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'all' must be the only argument"));
}

#[test]
fn test_repeated_dependency_is_rejected() {
    repo()
        .depbump()
        .args(["upgrade-dep", "--no-mirror", "org_golang_x_tools", "org_golang_x_tools@v0.1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dependency org_golang_x_tools specified more than once"));
}

#[test]
fn test_unknown_dependency_suggests_close_name() {
    let repo = repo();
    repo.depbump()
        .args(["upgrade-dep", "--no-mirror", "org_golang_x_tool"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find dependency org_golang_x_tool"))
        .stderr(predicate::str::contains("Did you mean: org_golang_x_tools?"));

    assert_eq!(repo.read("WORKSPACE.toml"), WORKSPACE);
    assert_eq!(repo.read("deps/repositories.toml"), DEPS);
}

#[test]
fn test_dependency_without_directive_is_rejected() {
    repo()
        .depbump()
        .args(["upgrade-dep", "--no-mirror", "local_config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("upgrading local_config"))
        .stderr(predicate::str::contains("releaser:upgrade-dep"));
}

#[test]
fn test_missing_required_tool() {
    let repo = TestRepo::with_config(
        "required_tools = [\"depbump-no-such-tool\"]\n\n[[declarations]]\npath = \"WORKSPACE.toml\"\n",
    );
    repo.write("WORKSPACE.toml", WORKSPACE);

    repo.depbump()
        .args(["upgrade-dep", "--no-mirror", "all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("depbump-no-such-tool"));
}

#[test]
fn test_all_without_directives_changes_nothing() {
    let repo = TestRepo::with_config(
        "required_tools = []\n\n[[declarations]]\npath = \"plain.toml\"\n",
    );
    let plain = "[[http_archive]]\nname = \"foo\"\nurls = [\"https://example.com/foo.zip\"]\n";
    repo.write("plain.toml", plain);

    repo.depbump()
        .args(["upgrade-dep", "--no-mirror", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dependencies upgraded"));
    assert_eq!(repo.read("plain.toml"), plain);
}

#[test]
fn test_invalid_config_is_reported() {
    let repo = TestRepo::with_config("declarations = []\n");

    repo.depbump()
        .args(["upgrade-dep", "all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("declarations"));
}

#[test]
fn test_missing_project_root() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("depbump")
        .unwrap()
        .current_dir(dir.path())
        .args(["--no-progress", "upgrade-dep", "all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("depbump.toml"));
}

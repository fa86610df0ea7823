use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

mod common;
use common::{create_invalid_toml, setup_test_project, write_config, NO_CHECKS};

fn matrix_ci() -> Command {
    let mut cmd = Command::cargo_bin("matrix-ci").unwrap();
    cmd.arg("--lang").arg("en");
    cmd
}

/// `plan` lists every job with its dependency pins and cache key.
///
/// `plan` 列出每个任务及其依赖版本和缓存键。
#[test]
fn test_plan_text() {
    let project = setup_test_project();
    write_config(&project, &["py27-dj18{,-pytest}"], "");

    matrix_ci()
        .current_dir(project.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("4 jobs"))
        .stdout(predicate::str::contains("lint"))
        .stdout(predicate::str::contains("check_migrations"))
        .stdout(predicate::str::contains("Django>=1.8,<1.9"))
        .stdout(predicate::str::contains("_STRIPE_TEST_CMD=-m pytest"))
        .stdout(predicate::str::contains("v1-deps-py27-dj18-pytest-"));
}

/// `plan --format json` prints the CI job graph.
///
/// `plan --format json` 输出 CI 任务图。
#[test]
fn test_plan_json_graph() {
    let project = setup_test_project();
    write_config(&project, &["py36-dj20-postgres"], NO_CHECKS);

    let output = matrix_ci()
        .current_dir(project.path())
        .arg("plan")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let job = &graph["jobs"]["py36-dj20-postgres"];
    assert_eq!(job["docker"][0]["image"], "circleci/python:3.6");
    assert_eq!(
        job["environment"]["PINAX_STRIPE_DATABASE_ENGINE"],
        "django.db.backends.postgresql_psycopg2"
    );
    assert!(job["requirements"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r == "psycopg2-binary"));
    assert_eq!(graph["workflows"]["test"]["jobs"][0], "py36-dj20-postgres");

    let steps = job["steps"].as_array().unwrap();
    let restore = steps.iter().find(|s| s["step"] == "restore_cache").unwrap();
    let keys = restore["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[1], "v1-deps-py36-dj20-postgres-");
}

/// Unsupported combinations are dropped and counted, not run.
///
/// 不受支持的组合会被丢弃并计数，而不会运行。
#[test]
fn test_plan_drops_unsupported_combinations() {
    let project = setup_test_project();
    write_config(&project, &["py{27,36}-dj20"], NO_CHECKS);

    matrix_ci()
        .current_dir(project.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 jobs"))
        .stdout(predicate::str::contains("1 combinations dropped"))
        .stdout(predicate::str::contains("py27-dj20").not());
}

/// A malformed brace group is a configuration error.
///
/// 格式错误的花括号组是配置错误。
#[test]
fn test_plan_rejects_nested_braces() {
    let project = setup_test_project();
    write_config(&project, &["py27-dj{1{8,10}}"], NO_CHECKS);

    matrix_ci()
        .current_dir(project.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nested brace groups"));
}

#[test]
fn test_invalid_toml() {
    let project = setup_test_project();
    let config = create_invalid_toml(&project);

    matrix_ci()
        .current_dir(project.path())
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load pipeline configuration"));
}

#[test]
fn test_missing_config_file() {
    let project = setup_test_project();

    matrix_ci()
        .current_dir(project.path())
        .arg("run")
        .arg("--config")
        .arg("nope.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

/// `init --non-interactive` writes a pipeline that `plan` accepts.
///
/// `init --non-interactive` 写入一个 `plan` 可接受的流水线。
#[test]
fn test_init_non_interactive() {
    let dir = setup_test_project();

    matrix_ci()
        .current_dir(dir.path())
        .arg("init")
        .arg("--non-interactive")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created Matrix.toml"));

    let content = fs::read_to_string(dir.path().join("Matrix.toml")).unwrap();
    assert!(content.contains("py27-dj{18,110,111}{,-pytest}"));

    matrix_ci()
        .current_dir(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("py36-djmaster"));
}

/// An existing file is kept unless `--force` is given.
///
/// 除非指定 `--force`，否则保留已有文件。
#[test]
fn test_init_keeps_existing_file() {
    let dir = setup_test_project();
    fs::write(dir.path().join("Matrix.toml"), "# mine\n").unwrap();

    matrix_ci()
        .current_dir(dir.path())
        .arg("init")
        .arg("--non-interactive")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(dir.path().join("Matrix.toml")).unwrap(), "# mine\n");

    matrix_ci()
        .current_dir(dir.path())
        .arg("init")
        .arg("--non-interactive")
        .arg("--force")
        .assert()
        .success();
    assert!(fs::read_to_string(dir.path().join("Matrix.toml"))
        .unwrap()
        .contains("[project]"));
}

#[test]
fn test_help_is_localized() {
    Command::cargo_bin("matrix-ci")
        .unwrap()
        .arg("--lang")
        .arg("zh-CN")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("运行流水线中的所有任务"));
}

use matrix_ci::core::config::load_pipeline_config;
use matrix_ci::core::models::{Flag, Interpreter};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_full_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Matrix.toml");
    fs::write(
        &path,
        r#"
language = "zh-CN"

[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"

[matrix]
envlist = ["py36-dj20"]
exclude = ["py27-dj18"]

[[matrix.include]]
interpreters = ["py37"]
frameworks = ["djmaster"]
flags = [["pytest"]]

[cache]
prefix = "v2-deps-"

[[services]]
name = "postgres"
flag = "postgres"
image = "circleci/postgres:9.6-alpine"
ports = ["15432:5432"]
"#,
    )
    .unwrap();

    let config = load_pipeline_config(&path).unwrap();
    assert_eq!(config.language.as_deref(), Some("zh-CN"));
    assert_eq!(config.matrix.include[0].interpreters, vec![Interpreter::Py37]);
    assert_eq!(config.matrix.include[0].flags, vec![vec![Flag::Pytest]]);
    assert_eq!(config.cache.prefix, "v2-deps-");
    assert_eq!(config.cache.key_files, vec!["setup.py", "tox.ini"]);
    assert_eq!(config.services[0].ready_port(), Some(15432));
    assert_eq!(config.lint_paths(), vec!["pinax"]);
    assert_eq!(config.coverage_source(), "pinax");
}

#[test]
fn test_missing_file_names_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.toml");
    let err = load_pipeline_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("missing.toml"));
}

#[test]
fn test_missing_project_section_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Matrix.toml");
    fs::write(&path, "[matrix]\nenvlist = [\"py36-dj20\"]\n").unwrap();
    assert!(load_pipeline_config(&path).is_err());
}

#[test]
fn test_unknown_flag_in_service_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Matrix.toml");
    fs::write(
        &path,
        r#"
[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"

[matrix]
envlist = ["py36-dj20"]

[[services]]
name = "mysql"
flag = "mysql"
image = "mysql:5.7"
"#,
    )
    .unwrap();
    assert!(load_pipeline_config(&path).is_err());
}

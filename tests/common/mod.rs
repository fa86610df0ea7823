// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

/// Stand-ins for the Python tool chain. Each job copies them into its
/// environment's `bin/` during install, so they are found through `PATH`.
const TOOLS: &[(&str, &str)] = &[
    ("flake8", "#!/bin/sh\necho \"flake8 $*\"\n[ ! -f lint.marker ]\n"),
    ("isort", "#!/bin/sh\necho \"isort $*\"\n"),
    (
        "coverage",
        "#!/bin/sh\necho \"coverage $*\"\nif [ -f slow.marker ]; then sleep 10; fi\n[ ! -f fail.marker ]\n",
    ),
    ("codecov", "#!/bin/sh\necho \"codecov $*\"\n[ ! -f upload.marker ]\n"),
    (
        "django-admin",
        "#!/bin/sh\necho \"django-admin $*\"\nif [ -f drift.marker ]; then echo 'Migrations for stripe:'; exit 1; fi\necho 'No changes detected'\n",
    ),
];

/// Install step used by test pipelines: no network, just the fake tools.
/// Paths are quoted inside the shell script so project paths may contain spaces.
pub const INSTALL: &str = r#"commands = ["sh -c 'mkdir -p \"${MATRIX_ENV_DIR}/bin\" && cp tools/* \"${MATRIX_ENV_DIR}/bin/\" && echo installed >> \"${MATRIX_ENV_DIR}/history\"'"]"#;

/// Creates a small Django-style project with key files and fake tools.
pub fn setup_test_project() -> TempDir {
    setup_test_project_with_prefix(".tmp")
}

/// Same as [`setup_test_project`], in a directory whose name starts with `prefix`.
pub fn setup_test_project_with_prefix(prefix: &str) -> TempDir {
    let temp_dir = Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary directory");
    let root = temp_dir.path();

    fs::create_dir_all(root.join("pinax/stripe")).unwrap();
    fs::write(root.join("pinax/__init__.py"), "").unwrap();
    fs::write(root.join("pinax/stripe/__init__.py"), "").unwrap();
    fs::write(
        root.join("setup.py"),
        "from setuptools import setup\n\nsetup(\n    name=\"pinax-stripe\",\n    version=\"4.4.0\",\n)\n",
    )
    .unwrap();
    fs::write(root.join("tox.ini"), "[tox]\nenvlist = py36-dj20\n").unwrap();

    let tools = root.join("tools");
    fs::create_dir_all(&tools).unwrap();
    for (name, script) in TOOLS {
        let path = tools.join(name);
        fs::write(&path, script).unwrap();
        make_executable(&path);
    }

    temp_dir
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Writes `Matrix.toml` into the project: the common sections plus `extra`.
pub fn write_config(project: &TempDir, envlist: &[&str], extra: &str) -> PathBuf {
    let envlist: Vec<String> = envlist.iter().map(|e| format!("\"{e}\"")).collect();
    let content = format!(
        r#"
language = "en"

[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"
usedevelop = false

[matrix]
envlist = [{}]

[install]
{}

{}
"#,
        envlist.join(", "),
        INSTALL,
        extra
    );
    let path = project.path().join("Matrix.toml");
    fs::write(&path, content).unwrap();
    path
}

/// Drops a marker file that makes the matching fake tool fail.
pub fn touch(project: &TempDir, marker: &str) {
    fs::write(project.path().join(marker), "").unwrap();
}

/// Helper function to create an invalid TOML configuration
pub fn create_invalid_toml(temp_dir: &TempDir) -> PathBuf {
    let path = temp_dir.path().join("invalid.toml");
    let content = r#"
[project
package = "pinax"
"#;
    fs::write(&path, content).unwrap();
    path
}

/// Turns off the lint and migration jobs.
pub const NO_CHECKS: &str = r#"
[lint]
enabled = false

[migrations]
enabled = false
"#;

use matrix_ci::core::config::PipelineConfig;
use matrix_ci::core::environment::{assemble, select_test_command, upload_enabled, HostEnv};
use matrix_ci::core::models::JobKind;

const CONFIG: &str = r#"
[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"

[matrix]
envlist = ["py36-dj20"]

[[services]]
name = "postgres"
flag = "postgres"
image = "circleci/postgres:9.6-alpine"
ports = ["5432:5432"]

[services.job_env]
PINAX_STRIPE_DATABASE_HOST = "127.0.0.1"
"#;

fn config() -> PipelineConfig {
    toml::from_str(CONFIG).unwrap()
}

fn matrix(name: &str) -> JobKind {
    JobKind::Matrix(name.parse().unwrap())
}

#[test]
fn test_postgres_job_gets_default_engine() {
    let env = assemble(&matrix("py36-dj20-postgres"), &config(), &HostEnv::new());
    assert_eq!(
        env.get("PINAX_STRIPE_DATABASE_ENGINE").map(String::as_str),
        Some("django.db.backends.postgresql_psycopg2")
    );
    assert_eq!(
        env.get("PINAX_STRIPE_DATABASE_HOST").map(String::as_str),
        Some("127.0.0.1")
    );
    assert_eq!(
        env.get("DJANGO_SETTINGS_MODULE").map(String::as_str),
        Some("pinax.stripe.tests.settings")
    );
}

#[test]
fn test_unflagged_job_never_gets_engine() {
    let host = HostEnv::new().with("PINAX_STRIPE_DATABASE_HOST", "db");
    let env = assemble(&matrix("py36-dj20"), &config(), &host);
    assert!(!env.contains_key("PINAX_STRIPE_DATABASE_ENGINE"));
    // Passed through from the host, not from the service.
    assert_eq!(env.get("PINAX_STRIPE_DATABASE_HOST").map(String::as_str), Some("db"));
}

#[test]
fn test_host_engine_wins() {
    let host = HostEnv::new().with("PINAX_STRIPE_DATABASE_ENGINE", "django.db.backends.postgresql");
    let env = assemble(&matrix("py36-dj20-postgres"), &config(), &host);
    assert_eq!(
        env.get("PINAX_STRIPE_DATABASE_ENGINE").map(String::as_str),
        Some("django.db.backends.postgresql")
    );
}

#[test]
fn test_pytest_flag_selects_pytest_invocation() {
    let config = config();
    let plain = assemble(&matrix("py27-dj18"), &config, &HostEnv::new());
    let pytest = assemble(&matrix("py27-dj18-pytest"), &config, &HostEnv::new());
    assert_eq!(select_test_command(&plain, &config), "runtests.py");
    assert_eq!(select_test_command(&pytest, &config), "-m pytest");
}

#[test]
fn test_passenv_filters_host() {
    let host = HostEnv::new()
        .with("CIRCLE_BRANCH", "master")
        .with("HOME", "/root")
        .with("CI", "true");
    let env = assemble(&matrix("py36-dj20"), &config(), &host);
    assert_eq!(env.get("CIRCLE_BRANCH").map(String::as_str), Some("master"));
    assert_eq!(env.get("CI").map(String::as_str), Some("true"));
    assert!(!env.contains_key("HOME"));
}

#[test]
fn test_lint_never_uploads() {
    let host = HostEnv::new().with("UPLOAD_COVERAGE", "1");
    let env = assemble(&JobKind::Lint, &config(), &host);
    assert!(!upload_enabled(&env));
}

#[test]
fn test_migration_check_gets_only_settings() {
    let host = HostEnv::new().with("CI", "true");
    let env = assemble(&JobKind::MigrationCheck, &config(), &host);
    assert_eq!(env.len(), 1);
    assert!(env.contains_key("DJANGO_SETTINGS_MODULE"));
}

#[test]
fn test_upload_coverage_zero_disables_upload() {
    let host = HostEnv::new().with("UPLOAD_COVERAGE", "0");
    let env = assemble(&matrix("py36-dj20"), &config(), &host);
    assert!(!upload_enabled(&env));
    let env = assemble(&matrix("py36-dj20"), &config(), &HostEnv::new());
    assert!(upload_enabled(&env));
}

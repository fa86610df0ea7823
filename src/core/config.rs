//! # Configuration Module / 配置模块
//!
//! Defines the structure of `Matrix.toml` and loads it. Every section except
//! `[project]` and `[matrix]` falls back to defaults that reproduce the
//! pinax-stripe pipeline, so a minimal file only needs an envlist.
//!
//! 定义 `Matrix.toml` 的结构并加载它。除 `[project]` 和 `[matrix]` 外，
//! 每个部分都有默认值。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::error::{MatrixError, MatrixResult};
use crate::core::matrix::{self, MatrixRow};
use crate::core::models::{EnvTag, Flag, Interpreter};

/// Represents the whole pipeline configuration, loaded from a TOML file.
/// 代表从 TOML 文件加载的整个流水线配置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// Falls back to the system locale when absent.
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。未设置时使用系统语言。
    #[serde(default)]
    pub language: Option<String>,

    /// Optional wall-clock limit for a single job, in seconds.
    /// 单个任务的可选时间上限（秒）。
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Program used to start auxiliary service containers.
    #[serde(default = "default_container_runtime")]
    pub container_runtime: String,

    pub project: ProjectConfig,
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub lint: LintConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Top-level Python package, used by lint and coverage.
    pub package: String,
    /// Name of the variable pointing the framework at its settings module.
    #[serde(default = "default_settings_var")]
    pub settings_var: String,
    pub settings_module: String,
    /// Host variables passed through to jobs. A trailing `*` matches a prefix.
    #[serde(default = "default_passenv")]
    pub passenv: Vec<String>,
    /// Install the project itself in editable mode.
    #[serde(default = "default_true")]
    pub usedevelop: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatrixConfig {
    /// Brace-expanded environment names, e.g. `py27-dj{18,110}{,-pytest}`.
    #[serde(default)]
    pub envlist: Vec<String>,
    /// Environments removed after expansion.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Typed rows expanded as a cross-product.
    #[serde(default)]
    pub include: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstallConfig {
    /// Commands that create the environment and install the requirements.
    #[serde(default = "default_install_commands")]
    pub commands: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            commands: default_install_commands(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestConfig {
    /// Variable whose value, when set, replaces the default test invocation.
    #[serde(default = "default_override_var")]
    pub override_var: String,
    #[serde(default = "default_test_command")]
    pub default_command: String,
    /// Invocation used by environments carrying the `pytest` flag.
    #[serde(default = "default_pytest_command")]
    pub pytest_command: String,
    /// Steps run under coverage; `${MATRIX_TEST_COMMAND}` is the selected invocation.
    #[serde(default = "default_test_commands")]
    pub commands: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            override_var: default_override_var(),
            default_command: default_test_command(),
            pytest_command: default_pytest_command(),
            commands: default_test_commands(),
        }
    }
}

/// Options rendered into the coverage rc file plus the upload commands.
/// 渲染到覆盖率 rc 文件中的选项以及上传命令。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverageConfig {
    /// Measured package root; defaults to `project.package` when empty.
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_coverage_omit")]
    pub omit: Vec<String>,
    #[serde(default = "default_true")]
    pub branch: bool,
    /// Data file, relative to the checked-out sources.
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_true")]
    pub show_missing: bool,
    #[serde(default = "default_true")]
    pub skip_covered: bool,
    /// Converts the data file to the interchange format.
    #[serde(default = "default_export_command")]
    pub export_command: String,
    /// Pushes the exported report to the aggregator.
    #[serde(default = "default_upload_command")]
    pub upload_command: String,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            omit: default_coverage_omit(),
            branch: true,
            data_file: default_data_file(),
            show_missing: true,
            skip_covered: true,
            export_command: default_export_command(),
            upload_command: default_upload_command(),
        }
    }
}

/// Static analysis options. flake8 settings are passed as CLI arguments.
/// 静态分析选项。flake8 设置作为命令行参数传递。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LintConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lint_python")]
    pub python: Interpreter,
    #[serde(default = "default_lint_ignore")]
    pub ignore: Vec<String>,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: u32,
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u32,
    #[serde(default = "default_lint_exclude")]
    pub exclude: Vec<String>,
    #[serde(default = "default_inline_quotes")]
    pub inline_quotes: String,
    /// Paths checked; defaults to `project.package` when empty.
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default = "default_lint_deps")]
    pub deps: Vec<String>,
    /// Extra checks run after flake8, e.g. import ordering.
    #[serde(default = "default_lint_commands")]
    pub commands: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            python: default_lint_python(),
            ignore: default_lint_ignore(),
            max_line_length: default_max_line_length(),
            max_complexity: default_max_complexity(),
            exclude: default_lint_exclude(),
            inline_quotes: default_inline_quotes(),
            paths: Vec::new(),
            deps: default_lint_deps(),
            commands: default_lint_commands(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment the check runs in.
    #[serde(default = "default_migrations_env")]
    pub env: String,
    /// Dry-run regeneration that exits non-zero when migrations would change.
    #[serde(default = "default_migrations_command")]
    pub command: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            env: default_migrations_env(),
            command: default_migrations_command(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Variable selecting the database backend.
    #[serde(default = "default_engine_var")]
    pub engine_var: String,
    /// Backend used by `postgres` environments unless the host overrides it.
    #[serde(default = "default_postgres_engine")]
    pub postgres_engine: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine_var: default_engine_var(),
            postgres_engine: default_postgres_engine(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Store location, relative to the project directory.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Dependency declaration files whose contents are part of every key.
    #[serde(default = "default_key_files")]
    pub key_files: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            prefix: default_cache_prefix(),
            key_files: default_key_files(),
        }
    }
}

/// An auxiliary container started next to jobs carrying `flag`.
/// 在带有 `flag` 的任务旁启动的辅助容器。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    pub flag: Flag,
    pub image: String,
    /// Environment of the service container itself.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// `host:container` port mappings; the first host port is probed for readiness.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Connection parameters handed to the job. Host values take precedence.
    #[serde(default)]
    pub job_env: BTreeMap<String, String>,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl ServiceConfig {
    /// First host port from `ports`, if any.
    pub fn ready_port(&self) -> Option<u16> {
        self.ports
            .first()
            .and_then(|p| p.split(':').next())
            .and_then(|p| p.parse().ok())
    }
}

impl PipelineConfig {
    /// Checks values that must be present before any job is built.
    pub fn validate(&self) -> MatrixResult<()> {
        if self.project.package.trim().is_empty() {
            return Err(MatrixError::MissingSetting("project.package"));
        }
        if self.project.settings_var.trim().is_empty() {
            return Err(MatrixError::MissingSetting("project.settings_var"));
        }
        if self.project.settings_module.trim().is_empty() {
            return Err(MatrixError::MissingSetting("project.settings_module"));
        }
        if self.test.override_var.trim().is_empty() {
            return Err(MatrixError::MissingSetting("test.override_var"));
        }
        if self.migrations.enabled {
            matrix::ensure_supported(&self.migrations_tag()?)?;
        }
        Ok(())
    }

    /// The environment the migration check runs in.
    pub fn migrations_tag(&self) -> MatrixResult<EnvTag> {
        self.migrations.env.parse()
    }

    /// Package measured by coverage.
    pub fn coverage_source(&self) -> &str {
        if self.coverage.source.is_empty() {
            &self.project.package
        } else {
            &self.coverage.source
        }
    }

    /// Paths checked by lint.
    pub fn lint_paths(&self) -> Vec<String> {
        if self.lint.paths.is_empty() {
            vec![self.project.package.clone()]
        } else {
            self.lint.paths.clone()
        }
    }
}

/// Reads and parses a pipeline file, then validates it.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: PipelineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn default_container_runtime() -> String {
    "docker".to_string()
}

fn default_true() -> bool {
    true
}

fn default_settings_var() -> String {
    "DJANGO_SETTINGS_MODULE".to_string()
}

fn default_passenv() -> Vec<String> {
    [
        "CI",
        "CIRCLECI",
        "CIRCLE_*",
        "UPLOAD_COVERAGE",
        "PINAX_STRIPE_DATABASE_ENGINE",
        "PINAX_STRIPE_DATABASE_HOST",
        "PINAX_STRIPE_DATABASE_NAME",
        "PINAX_STRIPE_DATABASE_USER",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_install_commands() -> Vec<String> {
    vec![
        "virtualenv -p ${MATRIX_PYTHON} ${MATRIX_ENV_DIR}".to_string(),
        "pip install -r ${MATRIX_REQUIREMENTS}".to_string(),
    ]
}

fn default_override_var() -> String {
    "_STRIPE_TEST_CMD".to_string()
}

fn default_test_command() -> String {
    "runtests.py".to_string()
}

fn default_pytest_command() -> String {
    "-m pytest".to_string()
}

fn default_test_commands() -> Vec<String> {
    vec![
        "coverage run ${MATRIX_TEST_COMMAND}".to_string(),
        "coverage report -m --skip-covered".to_string(),
    ]
}

fn default_coverage_omit() -> Vec<String> {
    vec![
        "pinax/stripe/conf.py".to_string(),
        "pinax/stripe/tests/*".to_string(),
        "pinax/stripe/migrations/*".to_string(),
    ]
}

fn default_data_file() -> String {
    ".coverage".to_string()
}

fn default_export_command() -> String {
    "coverage xml -o ${MATRIX_COVERAGE_XML}".to_string()
}

fn default_upload_command() -> String {
    "codecov --required -F ${MATRIX_JOB} -f ${MATRIX_COVERAGE_XML}".to_string()
}

fn default_lint_python() -> Interpreter {
    Interpreter::Py36
}

fn default_lint_ignore() -> Vec<String> {
    vec!["E265".to_string(), "E501".to_string(), "W504".to_string()]
}

fn default_max_line_length() -> u32 {
    100
}

fn default_max_complexity() -> u32 {
    10
}

fn default_lint_exclude() -> Vec<String> {
    vec![
        "**/*/migrations/*".to_string(),
        "docs/*".to_string(),
    ]
}

fn default_inline_quotes() -> String {
    "double".to_string()
}

fn default_lint_deps() -> Vec<String> {
    vec![
        "flake8==3.4.1".to_string(),
        "flake8-quotes==0.11.0".to_string(),
        "isort==4.2.15".to_string(),
    ]
}

fn default_lint_commands() -> Vec<String> {
    vec!["isort --recursive --check-only --diff ${MATRIX_LINT_PATHS} -sp tox.ini".to_string()]
}

fn default_migrations_env() -> String {
    "py36-dj20".to_string()
}

fn default_migrations_command() -> String {
    "django-admin makemigrations --check --dry-run".to_string()
}

fn default_engine_var() -> String {
    "PINAX_STRIPE_DATABASE_ENGINE".to_string()
}

fn default_postgres_engine() -> String {
    "django.db.backends.postgresql_psycopg2".to_string()
}

fn default_cache_dir() -> String {
    ".matrix/cache".to_string()
}

fn default_cache_prefix() -> String {
    "v1-deps-".to_string()
}

fn default_key_files() -> Vec<String> {
    vec!["setup.py".to_string(), "tox.ini".to_string()]
}

fn default_ready_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [project]
        package = "pinax"
        settings_module = "pinax.stripe.tests.settings"

        [matrix]
        envlist = ["py27-dj18"]
    "#;

    #[test]
    fn minimal_file_gets_defaults() {
        let config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.language, None);
        assert_eq!(config.project.settings_var, "DJANGO_SETTINGS_MODULE");
        assert_eq!(config.cache.prefix, "v1-deps-");
        assert_eq!(config.cache.key_files, vec!["setup.py", "tox.ini"]);
        assert_eq!(config.test.override_var, "_STRIPE_TEST_CMD");
        assert!(config.lint.enabled);
        assert_eq!(config.coverage_source(), "pinax");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_settings_module_is_rejected() {
        let mut config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        config.project.settings_module = String::new();
        assert_eq!(
            config.validate(),
            Err(MatrixError::MissingSetting("project.settings_module"))
        );
    }

    #[test]
    fn unsupported_migrations_env_is_rejected() {
        let mut config: PipelineConfig = toml::from_str(MINIMAL).unwrap();
        config.migrations.env = "py27-dj20".to_string();
        assert!(matches!(
            config.validate(),
            Err(MatrixError::UnsupportedCombination { .. })
        ));
    }

    #[test]
    fn service_ready_port_uses_host_side() {
        let service = ServiceConfig {
            name: "postgres".to_string(),
            flag: Flag::Postgres,
            image: "circleci/postgres:9.6-alpine".to_string(),
            env: BTreeMap::new(),
            ports: vec!["15432:5432".to_string()],
            job_env: BTreeMap::new(),
            ready_timeout_secs: 5,
        };
        assert_eq!(service.ready_port(), Some(15432));
    }
}

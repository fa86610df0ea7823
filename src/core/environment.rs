//! # Environment Assembly / 环境组装
//!
//! Builds the variables each job runs with. Everything here is a pure
//! function of the job kind, the configuration and a snapshot of the host
//! environment, so the same inputs always produce the same environment.
//!
//! 构建每个任务运行时使用的变量。此处的一切都是任务类型、配置和
//! 宿主环境快照的纯函数。

use crate::core::config::PipelineConfig;
use crate::core::models::{Flag, JobKind};
use std::collections::BTreeMap;

/// Variable that switches coverage upload off when set to `0`.
pub const UPLOAD_COVERAGE_VAR: &str = "UPLOAD_COVERAGE";

/// A snapshot of the invoking process environment.
/// 调用进程环境的快照。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv(BTreeMap<String, String>);

impl HostEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current process environment, skipping non-UTF-8 entries.
    pub fn from_process() -> Self {
        Self(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        )
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Variables whose names match one of `patterns`. A pattern ending in `*`
    /// matches by prefix; anything else must match exactly.
    pub fn matching(&self, patterns: &[String]) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter(|(name, _)| patterns.iter().any(|p| pattern_matches(p, name)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}


fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Assembles the environment for a job.
///
/// * every job gets the settings pointer;
/// * the migration check gets nothing else;
/// * other jobs get the pass-through variables found on the host;
/// * lint always has coverage upload switched off;
/// * matrix jobs get flag-driven values: the pytest override, the database
///   engine default and the connection parameters of activated services.
///
/// 为任务组装环境变量。
pub fn assemble(kind: &JobKind, config: &PipelineConfig, host: &HostEnv) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    if !matches!(kind, JobKind::MigrationCheck) {
        env.extend(host.matching(&config.project.passenv));
    }

    match kind {
        JobKind::Matrix(tag) => {
            if tag.has(Flag::Pytest) {
                env.insert(
                    config.test.override_var.clone(),
                    config.test.pytest_command.clone(),
                );
            }
            if tag.has(Flag::Postgres) {
                let engine = host
                    .get(&config.database.engine_var)
                    .unwrap_or(config.database.postgres_engine.as_str())
                    .to_string();
                env.insert(config.database.engine_var.clone(), engine);
            }
            for service in config.services.iter().filter(|s| tag.has(s.flag)) {
                for (key, default) in &service.job_env {
                    let value = host.get(key).unwrap_or(default.as_str()).to_string();
                    env.insert(key.clone(), value);
                }
            }
        }
        JobKind::Lint => {
            env.insert(UPLOAD_COVERAGE_VAR.to_string(), "0".to_string());
        }
        JobKind::MigrationCheck => {}
    }

    env.insert(
        config.project.settings_var.clone(),
        config.project.settings_module.clone(),
    );
    env
}

/// The test invocation for a job: the override variable if present,
/// otherwise the configured default.
pub fn select_test_command<'a>(
    env: &'a BTreeMap<String, String>,
    config: &'a PipelineConfig,
) -> &'a str {
    env.get(&config.test.override_var)
        .map(String::as_str)
        .unwrap_or(config.test.default_command.as_str())
}

/// Coverage upload is on unless `UPLOAD_COVERAGE` is exactly `0`.
pub fn upload_enabled(env: &BTreeMap<String, String>) -> bool {
    env.get(UPLOAD_COVERAGE_VAR).map(String::as_str) != Some("0")
}

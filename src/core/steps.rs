//! # Step Construction / 步骤构建
//!
//! Turns configuration and a job into the concrete commands each step runs.
//! Nothing here touches the file system or spawns processes, which keeps the
//! command lines easy to inspect in `plan` output and in tests.
//!
//! 将配置和任务转换为每个步骤运行的具体命令。此处不访问文件系统，也不派生进程。

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::config::PipelineConfig;
use crate::core::environment::select_test_command;
use crate::core::error::{MatrixError, MatrixResult};
use crate::core::jobs::Job;
use crate::core::models::JobKind;
use crate::infra::fs::JobDirs;

pub const VAR_JOB: &str = "MATRIX_JOB";
pub const VAR_ENV_DIR: &str = "MATRIX_ENV_DIR";
pub const VAR_SRC_DIR: &str = "MATRIX_SRC_DIR";
pub const VAR_PYTHON: &str = "MATRIX_PYTHON";
pub const VAR_REQUIREMENTS: &str = "MATRIX_REQUIREMENTS";
pub const VAR_TEST_COMMAND: &str = "MATRIX_TEST_COMMAND";
pub const VAR_COVERAGE_XML: &str = "MATRIX_COVERAGE_XML";
pub const VAR_LINT_PATHS: &str = "MATRIX_LINT_PATHS";
pub const COVERAGE_RCFILE: &str = "COVERAGE_RCFILE";

/// File names inside the job directory.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const COVERAGE_RC_FILE: &str = "coveragerc";
pub const COVERAGE_XML_FILE: &str = "coverage.xml";

/// A fully expanded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub program: String,
    pub args: Vec<String>,
    /// The command as shown to users.
    pub display: String,
}

impl StepCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let mut display = program.clone();
        for arg in &args {
            display.push(' ');
            display.push_str(arg);
        }
        Self {
            program,
            args,
            display,
        }
    }

    /// Splits `template` into words, then expands `${VAR}` references
    /// inside each word. An expanded value stays one argument even when it
    /// contains spaces. A word that is nothing but a reference to a
    /// multi-argument variable is split into several arguments instead.
    pub fn from_template(template: &str, vars: &BTreeMap<String, String>) -> MatrixResult<Self> {
        let bad_command = || MatrixError::BadCommand(template.to_string());
        let words = shlex::split(template).ok_or_else(bad_command)?;

        let mut parts = Vec::with_capacity(words.len());
        for word in &words {
            let expanded = expand_template(word, vars).map_err(|e| match e {
                MatrixError::MissingEnv { vars, .. } => MatrixError::MissingEnv {
                    template: template.to_string(),
                    vars,
                },
                other => other,
            })?;
            match sole_reference(word) {
                Some(name) if MULTI_ARG_VARS.contains(&name) => {
                    parts.extend(shlex::split(&expanded).ok_or_else(bad_command)?);
                }
                _ => parts.push(expanded),
            }
        }

        if parts.is_empty() {
            return Err(bad_command());
        }
        let program = parts.remove(0);
        Ok(Self::new(program, parts))
    }
}

/// Variables that hold several arguments.
const MULTI_ARG_VARS: &[&str] = &[VAR_TEST_COMMAND, VAR_LINT_PATHS];

/// The variable name when `word` is exactly `$NAME` or `${NAME}`.
fn sole_reference(word: &str) -> Option<&str> {
    let name = word.strip_prefix('$')?;
    let name = match name.strip_prefix('{') {
        Some(braced) => braced.strip_suffix('}')?,
        None => name,
    };
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Substitutes `$VAR`/`${VAR}` from `vars`. Unknown variables are an error
/// rather than being left in place.
pub fn expand_template(template: &str, vars: &BTreeMap<String, String>) -> MatrixResult<String> {
    let mut missing = Vec::new();
    let expanded = shellexpand::env_with_context_no_errors(template, |name: &str| {
        let value = vars.get(name);
        if value.is_none() {
            missing.push(name.to_string());
        }
        value
    })
    .into_owned();

    if missing.is_empty() {
        Ok(expanded)
    } else {
        Err(MatrixError::MissingEnv {
            template: template.to_string(),
            vars: missing,
        })
    }
}

/// Builds the `MATRIX_*` runtime variables plus `PATH` and merges them over
/// the job environment. This map is both the process environment and the
/// template context.
pub fn process_env(
    job: &Job,
    config: &PipelineConfig,
    dirs: &JobDirs,
    host_path: Option<&str>,
) -> BTreeMap<String, String> {
    let mut env = job.environment.clone();
    let path_of = |p: &Path| p.display().to_string();

    env.insert(VAR_JOB.to_string(), job.name.clone());
    env.insert(VAR_ENV_DIR.to_string(), path_of(&dirs.env));
    env.insert(VAR_SRC_DIR.to_string(), path_of(&dirs.src));
    env.insert(VAR_PYTHON.to_string(), job.interpreter.executable());
    env.insert(
        VAR_REQUIREMENTS.to_string(),
        path_of(&dirs.root.join(REQUIREMENTS_FILE)),
    );
    env.insert(
        VAR_COVERAGE_XML.to_string(),
        path_of(&dirs.root.join(COVERAGE_XML_FILE)),
    );
    env.insert(VAR_LINT_PATHS.to_string(), config.lint_paths().join(" "));

    if let JobKind::Matrix(_) = job.kind {
        let test_command = select_test_command(&job.environment, config).to_string();
        env.insert(VAR_TEST_COMMAND.to_string(), test_command);
        env.insert(
            COVERAGE_RCFILE.to_string(),
            path_of(&dirs.root.join(COVERAGE_RC_FILE)),
        );
    }

    let bin = path_of(&dirs.bin());
    let path = match host_path {
        Some(host) if !host.is_empty() => format!("{bin}:{host}"),
        _ => bin,
    };
    env.insert("PATH".to_string(), path);
    env
}

/// Templates for the install step.
pub fn install_templates(job: &Job, config: &PipelineConfig) -> Vec<String> {
    let mut templates = config.install.commands.clone();
    if config.project.usedevelop && !matches!(job.kind, JobKind::Lint) {
        templates.push("pip install -e .".to_string());
    }
    templates
}

/// flake8 invocation with the lint options rendered as arguments.
pub fn flake8_command(config: &PipelineConfig) -> StepCommand {
    let lint = &config.lint;
    let mut args = Vec::new();
    if !lint.ignore.is_empty() {
        args.push(format!("--ignore={}", lint.ignore.join(",")));
    }
    args.push(format!("--max-line-length={}", lint.max_line_length));
    args.push(format!("--max-complexity={}", lint.max_complexity));
    if !lint.exclude.is_empty() {
        args.push(format!("--exclude={}", lint.exclude.join(",")));
    }
    args.push(format!("--inline-quotes={}", lint.inline_quotes));
    args.extend(config.lint_paths());
    StepCommand::new("flake8", args)
}

/// Commands of the run step, which depend on the job kind.
pub fn run_commands(
    job: &Job,
    config: &PipelineConfig,
    vars: &BTreeMap<String, String>,
) -> MatrixResult<Vec<StepCommand>> {
    match job.kind {
        JobKind::Matrix(_) => build(&config.test.commands, vars),
        JobKind::Lint => {
            let mut commands = vec![flake8_command(config)];
            commands.extend(build(&config.lint.commands, vars)?);
            Ok(commands)
        }
        JobKind::MigrationCheck => build(std::slice::from_ref(&config.migrations.command), vars),
    }
}

/// Export then upload.
pub fn upload_commands(
    config: &PipelineConfig,
    vars: &BTreeMap<String, String>,
) -> MatrixResult<Vec<StepCommand>> {
    build(
        &[
            config.coverage.export_command.clone(),
            config.coverage.upload_command.clone(),
        ],
        vars,
    )
}

pub fn build(templates: &[String], vars: &BTreeMap<String, String>) -> MatrixResult<Vec<StepCommand>> {
    templates
        .iter()
        .map(|t| StepCommand::from_template(t, vars))
        .collect()
}

/// Coverage rc file contents. `data_file` is the absolute data file path
/// for the job.
pub fn coverage_rc(config: &PipelineConfig, data_file: &Path) -> String {
    let coverage = &config.coverage;
    let mut rc = String::new();
    rc.push_str("[run]\n");
    rc.push_str(&format!("source = {}\n", config.coverage_source()));
    if !coverage.omit.is_empty() {
        rc.push_str(&format!("omit = {}\n", coverage.omit.join(",")));
    }
    rc.push_str(&format!("branch = {}\n", python_bool(coverage.branch)));
    rc.push_str(&format!("data_file = {}\n", data_file.display()));
    rc.push_str("\n[report]\n");
    if !coverage.omit.is_empty() {
        rc.push_str(&format!("omit = {}\n", coverage.omit.join(",")));
    }
    rc.push_str(&format!("show_missing = {}\n", python_bool(coverage.show_missing)));
    rc.push_str(&format!("skip_covered = {}\n", python_bool(coverage.skip_covered)));
    rc
}

fn python_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

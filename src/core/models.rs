//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the matrix
//! orchestrator: the typed factors an environment tag is made of, the tag
//! itself, and the records produced while a job runs.
//!
//! 此模块定义了整个矩阵编排器中使用的核心数据结构：
//! 构成环境标签的类型化因子、标签本身，以及任务运行时产生的记录。

use crate::core::error::MatrixError;
use crate::infra::t;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A Python interpreter a matrix environment can run on.
/// 矩阵环境可以运行的 Python 解释器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    Py27,
    Py34,
    Py35,
    Py36,
    Py37,
}

impl Interpreter {
    pub const ALL: [Interpreter; 5] = [
        Interpreter::Py27,
        Interpreter::Py34,
        Interpreter::Py35,
        Interpreter::Py36,
        Interpreter::Py37,
    ];

    /// The factor used in environment names, e.g. `py36`.
    pub fn factor(&self) -> &'static str {
        match self {
            Self::Py27 => "py27",
            Self::Py34 => "py34",
            Self::Py35 => "py35",
            Self::Py36 => "py36",
            Self::Py37 => "py37",
        }
    }

    /// Dotted version, e.g. `3.6`.
    pub fn version(&self) -> &'static str {
        match self {
            Self::Py27 => "2.7",
            Self::Py34 => "3.4",
            Self::Py35 => "3.5",
            Self::Py36 => "3.6",
            Self::Py37 => "3.7",
        }
    }

    /// Name of the interpreter executable on `PATH`.
    pub fn executable(&self) -> String {
        format!("python{}", self.version())
    }

    /// Default container image for jobs on this interpreter.
    pub fn image(&self) -> String {
        format!("circleci/python:{}", self.version())
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.factor())
    }
}

/// A Django release line a matrix environment is pinned to.
/// 矩阵环境所固定的 Django 版本线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Dj18,
    Dj110,
    Dj111,
    Dj20,
    #[serde(rename = "djmaster")]
    Master,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Framework::Dj18,
        Framework::Dj110,
        Framework::Dj111,
        Framework::Dj20,
        Framework::Master,
    ];

    pub fn factor(&self) -> &'static str {
        match self {
            Self::Dj18 => "dj18",
            Self::Dj110 => "dj110",
            Self::Dj111 => "dj111",
            Self::Dj20 => "dj20",
            Self::Master => "djmaster",
        }
    }

    /// The requirement line pinning this release, as understood by pip.
    pub fn requirement(&self) -> (&'static str, &'static str) {
        match self {
            Self::Dj18 => ("Django", ">=1.8,<1.9"),
            Self::Dj110 => ("Django", ">=1.10,<1.11"),
            Self::Dj111 => ("Django", ">=1.11a1,<2.0"),
            Self::Dj20 => ("Django", ">=2.0,<2.1"),
            Self::Master => ("https://github.com/django/django/tarball/master", ""),
        }
    }

    /// Interpreters this release line officially supports.
    pub fn supported_interpreters(&self) -> &'static [Interpreter] {
        use Interpreter::*;
        match self {
            Self::Dj18 | Self::Dj110 => &[Py27, Py34, Py35],
            Self::Dj111 => &[Py27, Py34, Py35, Py36, Py37],
            Self::Dj20 => &[Py34, Py35, Py36, Py37],
            Self::Master => &[Py35, Py36, Py37],
        }
    }

    pub fn supports(&self, interpreter: Interpreter) -> bool {
        self.supported_interpreters().contains(&interpreter)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.factor())
    }
}

/// Optional capabilities an environment can switch on.
/// 环境可以开启的可选能力。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    /// Run the suite with pytest instead of the default runner.
    /// 使用 pytest 而非默认运行器运行测试套件。
    Pytest,
    /// Run against PostgreSQL instead of the default database.
    /// 使用 PostgreSQL 而非默认数据库运行。
    Postgres,
}

impl Flag {
    pub const ALL: [Flag; 2] = [Flag::Pytest, Flag::Postgres];

    pub fn factor(&self) -> &'static str {
        match self {
            Self::Pytest => "pytest",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.factor())
    }
}

/// One point of the test matrix: interpreter × framework × flags.
///
/// The canonical text form is `<interpreter>-<framework>[-<flag>...]` with
/// flags in declaration order, so `py27-pytest-dj18` and `py27-dj18-pytest`
/// name the same tag.
///
/// 测试矩阵中的一个点：解释器 × 框架 × 标志。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvTag {
    pub interpreter: Interpreter,
    pub framework: Framework,
    pub flags: BTreeSet<Flag>,
}

impl EnvTag {
    pub fn new(interpreter: Interpreter, framework: Framework) -> Self {
        Self {
            interpreter,
            framework,
            flags: BTreeSet::new(),
        }
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

impl fmt::Display for EnvTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.interpreter, self.framework)?;
        for flag in &self.flags {
            write!(f, "-{}", flag)?;
        }
        Ok(())
    }
}

impl FromStr for EnvTag {
    type Err = MatrixError;

    fn from_str(env: &str) -> Result<Self, Self::Err> {
        let mut interpreter = None;
        let mut framework = None;
        let mut flags = BTreeSet::new();

        for factor in env.split('-').filter(|f| !f.is_empty()) {
            let duplicate = || MatrixError::DuplicateFactor {
                factor: factor.to_string(),
                env: env.to_string(),
            };
            if let Some(i) = Interpreter::ALL.iter().find(|i| i.factor() == factor) {
                if interpreter.replace(*i).is_some() {
                    return Err(duplicate());
                }
            } else if let Some(fw) = Framework::ALL.iter().find(|fw| fw.factor() == factor) {
                if framework.replace(*fw).is_some() {
                    return Err(duplicate());
                }
            } else if let Some(flag) = Flag::ALL.iter().find(|fl| fl.factor() == factor) {
                if !flags.insert(*flag) {
                    return Err(duplicate());
                }
            } else {
                return Err(MatrixError::UnknownFactor {
                    factor: factor.to_string(),
                    env: env.to_string(),
                });
            }
        }

        Ok(EnvTag {
            interpreter: interpreter.ok_or_else(|| MatrixError::MissingInterpreter {
                env: env.to_string(),
            })?,
            framework: framework.ok_or_else(|| MatrixError::MissingFramework {
                env: env.to_string(),
            })?,
            flags,
        })
    }
}

impl TryFrom<String> for EnvTag {
    type Error = MatrixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EnvTag> for String {
    fn from(tag: EnvTag) -> Self {
        tag.to_string()
    }
}

/// What a job is for.
/// 任务的用途。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "env")]
pub enum JobKind {
    /// Run the test suite for one matrix point.
    Matrix(EnvTag),
    /// Static analysis of the source tree.
    Lint,
    /// Regenerate migrations in dry-run mode and fail on drift.
    MigrationCheck,
}

/// The ordered steps every job goes through.
/// 每个任务依次经历的步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Checkout,
    RestoreCache,
    StartServices,
    Install,
    Run,
    SaveCache,
    UploadCoverage,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::RestoreCache => "restore_cache",
            Self::StartServices => "start_services",
            Self::Install => "install",
            Self::Run => "run",
            Self::SaveCache => "save_cache",
            Self::UploadCoverage => "upload_coverage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one step of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub kind: StepKind,
    pub status: StepStatus,
    pub duration: Duration,
    /// Short human-readable note, e.g. which cache key was restored.
    #[serde(default)]
    pub detail: String,
}

/// Enumerates the possible reasons for a job failure.
/// 枚举任务失败的可能原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// A configuration problem surfaced when the job started.
    /// 任务启动时发现的配置问题。
    Config,
    /// Dependency installation failed; no tests were run.
    /// 依赖安装失败；未运行任何测试。
    Install,
    /// The test command exited non-zero.
    /// 测试命令以非零状态退出。
    TestFailed,
    /// The static analysis step reported violations.
    /// 静态分析步骤报告了违规。
    Lint,
    /// Committed migrations are out of sync with the declared schema.
    /// 已提交的迁移与声明的模式不同步。
    MigrationDrift,
    /// Coverage export or upload failed while upload was enabled.
    /// 启用上传时覆盖率导出或上传失败。
    CoverageUpload,
    /// An auxiliary service container could not be started.
    /// 无法启动辅助服务容器。
    Service,
    /// The job exceeded its configured timeout.
    /// 任务超出了其配置的超时时间。
    Timeout,
}

impl FailureReason {
    pub fn label(&self, locale: &str) -> String {
        match self {
            Self::Config => t!("reason.config", locale = locale),
            Self::Install => t!("reason.install", locale = locale),
            Self::TestFailed => t!("reason.test_failed", locale = locale),
            Self::Lint => t!("reason.lint", locale = locale),
            Self::MigrationDrift => t!("reason.migration_drift", locale = locale),
            Self::CoverageUpload => t!("reason.coverage_upload", locale = locale),
            Self::Service => t!("reason.service", locale = locale),
            Self::Timeout => t!("reason.timeout", locale = locale),
        }
        .to_string()
    }
}

/// Represents the final result of a single job.
///
/// 表示单个任务的最终结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobResult {
    /// Every step of the job succeeded.
    /// 任务的每个步骤都成功。
    Passed {
        job: String,
        output: String,
        duration: Duration,
        steps: Vec<StepRecord>,
    },
    /// The job failed; `reason` names the first failing step's category.
    /// 任务失败；`reason` 指明第一个失败步骤的类别。
    Failed {
        job: String,
        output: String,
        reason: FailureReason,
        duration: Duration,
        steps: Vec<StepRecord>,
    },
    /// The job never ran to completion because the pipeline was interrupted.
    /// 由于流水线被中断，任务未能运行完成。
    Skipped { job: String },
}

impl JobResult {
    pub fn job_name(&self) -> &str {
        match self {
            JobResult::Passed { job, .. }
            | JobResult::Failed { job, .. }
            | JobResult::Skipped { job } => job,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Passed { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JobResult::Failed { reason, .. } if *reason == FailureReason::Timeout)
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            JobResult::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            JobResult::Passed { duration, .. } | JobResult::Failed { duration, .. } => {
                Some(*duration)
            }
            JobResult::Skipped { .. } => None,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            JobResult::Passed { output, .. } | JobResult::Failed { output, .. } => output,
            JobResult::Skipped { .. } => "",
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        match self {
            JobResult::Passed { steps, .. } | JobResult::Failed { steps, .. } => steps,
            JobResult::Skipped { .. } => &[],
        }
    }

    /// Gets the status of the job as a string for display.
    /// 以字符串形式获取任务的状态以供显示。
    pub fn status_str(&self, locale: &str) -> String {
        match self {
            JobResult::Passed { .. } => t!("report.status_passed", locale = locale).to_string(),
            JobResult::Failed { reason, .. } if *reason == FailureReason::Timeout => {
                t!("report.status_timeout", locale = locale).to_string()
            }
            JobResult::Failed { .. } => t!("report.status_failed", locale = locale).to_string(),
            JobResult::Skipped { .. } => t!("report.status_skipped", locale = locale).to_string(),
        }
    }

    /// CSS class used by the HTML report.
    pub fn status_class(&self) -> &'static str {
        match self {
            JobResult::Passed { .. } => "status-passed",
            JobResult::Failed { .. } if self.is_timeout() => "status-timeout",
            JobResult::Failed { .. } => "status-failed",
            JobResult::Skipped { .. } => "status-skipped",
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Passed { job, .. } => write!(f, "{job}: passed"),
            JobResult::Failed { job, reason, .. } => write!(f, "{job}: failed ({reason:?})"),
            JobResult::Skipped { job } => write!(f, "{job}: skipped"),
        }
    }
}

//! # Job Execution Engine Module / 任务执行引擎模块
//!
//! Runs a single job through its fixed step sequence: checkout, cache
//! restore, services, install, run, cache save and coverage upload. Timeouts
//! wrap the whole job; services are stopped whatever the outcome.
//!
//! 按固定步骤顺序运行单个任务：检出、恢复缓存、服务、安装、运行、
//! 保存缓存和上传覆盖率。超时作用于整个任务；无论结果如何都会停止服务。

use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
    core::{
        cache::{CacheKey, CacheRestore, CacheStore},
        config::PipelineConfig,
        jobs::Job,
        models::{FailureReason, JobKind, JobResult, StepKind, StepRecord, StepStatus},
        steps::{self, StepCommand},
    },
    infra::{command, container::{self, ServiceContainer}, fs as job_fs, fs::JobDirs, t},
};

/// Everything shared by the jobs of one run.
/// 一次运行中所有任务共享的内容。
#[derive(Debug)]
pub struct RunContext {
    pub config: Arc<PipelineConfig>,
    pub project_root: PathBuf,
    /// Holds `jobs/` and the cache store.
    pub workspace: PathBuf,
    pub cache: CacheStore,
    /// Host `PATH`, appended after the job's `env/bin`.
    pub host_path: Option<String>,
    pub start_services: bool,
    pub locale: String,
}

/// Steps and output collected while a job runs. Lives outside the timed
/// future so a timeout still reports what had happened so far.
#[derive(Debug, Default)]
struct JobLog {
    steps: Vec<StepRecord>,
    output: String,
}

impl JobLog {
    fn record(&mut self, kind: StepKind, status: StepStatus, started: Instant, detail: impl Into<String>) {
        let detail = detail.into();
        debug!("{} {:?} {}", kind.name(), status, detail);
        self.steps.push(StepRecord {
            kind,
            status,
            duration: started.elapsed(),
            detail,
        });
    }

    fn skip(&mut self, kind: StepKind, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            kind,
            status: StepStatus::Skipped,
            duration: Duration::ZERO,
            detail: detail.into(),
        });
    }

    fn append(&mut self, output: &str) {
        self.output.push_str(output);
        if !output.ends_with('\n') {
            self.output.push('\n');
        }
    }
}

/// The main entry point for running a single job.
/// It wraps the step sequence with timeout handling and service cleanup.
///
/// # Arguments
/// * `job` - The job to run
/// * `key` - The job's cache key
/// * `ctx` - Shared run context
///
/// # Returns
/// A `JobResult`; `Err` only for failures of the runner itself.
pub async fn run_job(job: Job, key: CacheKey, ctx: Arc<RunContext>) -> Result<JobResult> {
    let locale = ctx.locale.as_str();
    println!("{}", t!("run.job_started", locale = locale, name = &job.name).blue());

    let start = Instant::now();
    let mut log = JobLog::default();
    let mut services = Vec::new();

    let outcome = {
        let sequence = run_steps(&job, &key, &ctx, &mut log, &mut services);
        match ctx.config.timeout_secs.map(Duration::from_secs) {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, sequence).await;
                match timed {
                    Ok(res) => res,
                    Err(_) => {
                        println!(
                            "{}",
                            t!("run.job_timeout", locale = locale, name = &job.name, timeout = limit.as_secs()).red()
                        );
                        log.append(&t!("run.job_timeout_message", locale = locale));
                        Ok(Some(FailureReason::Timeout))
                    }
                }
            }
            None => sequence.await,
        }
    };

    for service in services {
        service.stop().await;
    }

    let duration = start.elapsed();
    let secs = format!("{:.2}", duration.as_secs_f64());
    let result = match outcome {
        Ok(None) => {
            println!(
                "{}",
                t!("run.job_passed", locale = locale, name = &job.name, duration = &secs).green()
            );
            JobResult::Passed {
                job: job.name,
                output: log.output,
                duration,
                steps: log.steps,
            }
        }
        Ok(Some(reason)) => {
            println!(
                "{}",
                t!(
                    "run.job_failed",
                    locale = locale,
                    name = &job.name,
                    reason = reason.label(locale),
                    duration = &secs
                )
                .red()
            );
            JobResult::Failed {
                job: job.name,
                output: log.output,
                reason,
                duration,
                steps: log.steps,
            }
        }
        Err(e) => return Err(e.context(format!("Critical error in job {}", job.name))),
    };
    Ok(result)
}

/// Runs the step sequence. `Ok(None)` means every step passed.
async fn run_steps(
    job: &Job,
    key: &CacheKey,
    ctx: &RunContext,
    log: &mut JobLog,
    services: &mut Vec<ServiceContainer>,
) -> Result<Option<FailureReason>> {
    let config = ctx.config.as_ref();

    // checkout
    let started = Instant::now();
    let dirs = job_fs::create_job_dirs(&ctx.workspace, &job.name)?;
    job_fs::stage_project(&ctx.project_root, &dirs.src, &[ctx.workspace.as_path(), ctx.cache.root()])?;
    log.record(StepKind::Checkout, StepStatus::Passed, started, dirs.src.display().to_string());

    // restore_cache
    let started = Instant::now();
    let detail = match ctx.cache.restore(key, &dirs.env)? {
        CacheRestore::Exact => key.to_string(),
        CacheRestore::Fallback(name) => name,
        CacheRestore::Miss => t!("run.cache_miss", locale = &ctx.locale).to_string(),
    };
    log.record(StepKind::RestoreCache, StepStatus::Passed, started, detail);

    // start_services
    if !job.services.is_empty() {
        if ctx.start_services {
            let started = Instant::now();
            for service in &job.services {
                let launched = ServiceContainer::launch(&config.container_runtime, service, &job.name).await;
                let ready = match launched {
                    Ok(launched) => {
                        // Registered before the readiness wait so a timeout still stops it.
                        services.push(launched);
                        container::wait_ready(service).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = ready {
                    log.append(&format!("{e:#}"));
                    log.record(StepKind::StartServices, StepStatus::Failed, started, service.name.clone());
                    return Ok(Some(FailureReason::Service));
                }
            }
            let names: Vec<&str> = job.services.iter().map(|s| s.name.as_str()).collect();
            log.record(StepKind::StartServices, StepStatus::Passed, started, names.join(", "));
        } else {
            log.skip(StepKind::StartServices, t!("run.services_disabled", locale = &ctx.locale));
        }
    }

    let env = steps::process_env(job, config, &dirs, ctx.host_path.as_deref());

    // install
    let started = Instant::now();
    let requirements = dirs.root.join(steps::REQUIREMENTS_FILE);
    fs::write(&requirements, job.dependencies.to_requirements_file())
        .with_context(|| format!("Failed to write {}", requirements.display()))?;
    let install = match steps::build(&steps::install_templates(job, config), &env) {
        Ok(commands) => commands,
        Err(e) => return Ok(Some(config_failure(log, StepKind::Install, started, e))),
    };
    if !run_commands(&install, &dirs, &env, log).await? {
        log.record(StepKind::Install, StepStatus::Failed, started, "");
        return Ok(Some(FailureReason::Install));
    }
    log.record(StepKind::Install, StepStatus::Passed, started, job.dependencies.fingerprint());

    // run
    let started = Instant::now();
    if let JobKind::Matrix(_) = job.kind {
        let rc_path = dirs.root.join(steps::COVERAGE_RC_FILE);
        let data_file = dirs.src.join(&config.coverage.data_file);
        fs::write(&rc_path, steps::coverage_rc(config, &data_file))
            .with_context(|| format!("Failed to write {}", rc_path.display()))?;
    }
    let run = match steps::run_commands(job, config, &env) {
        Ok(commands) => commands,
        Err(e) => return Ok(Some(config_failure(log, StepKind::Run, started, e))),
    };
    let run_passed = run_commands(&run, &dirs, &env, log).await?;
    let status = if run_passed { StepStatus::Passed } else { StepStatus::Failed };
    log.record(StepKind::Run, status, started, "");

    // save_cache: install succeeded, so the environment is worth keeping.
    let started = Instant::now();
    match ctx.cache.save(key, &dirs.env) {
        Ok(()) => log.record(StepKind::SaveCache, StepStatus::Passed, started, key.to_string()),
        Err(e) => {
            warn!("Saving cache {} failed: {:#}", key, e);
            log.record(StepKind::SaveCache, StepStatus::Failed, started, format!("{e:#}"));
        }
    }

    if !run_passed {
        log.skip(StepKind::UploadCoverage, "");
        return Ok(Some(match job.kind {
            JobKind::Matrix(_) => FailureReason::TestFailed,
            JobKind::Lint => FailureReason::Lint,
            JobKind::MigrationCheck => FailureReason::MigrationDrift,
        }));
    }

    // upload_coverage
    if !job.upload_coverage {
        log.skip(StepKind::UploadCoverage, t!("run.upload_disabled", locale = &ctx.locale));
        return Ok(None);
    }
    let started = Instant::now();
    let upload = match steps::upload_commands(config, &env) {
        Ok(commands) => commands,
        Err(e) => return Ok(Some(config_failure(log, StepKind::UploadCoverage, started, e))),
    };
    if !run_commands(&upload, &dirs, &env, log).await? {
        log.record(StepKind::UploadCoverage, StepStatus::Failed, started, "");
        return Ok(Some(FailureReason::CoverageUpload));
    }
    log.record(StepKind::UploadCoverage, StepStatus::Passed, started, "");
    Ok(None)
}

fn config_failure(
    log: &mut JobLog,
    kind: StepKind,
    started: Instant,
    error: crate::core::error::MatrixError,
) -> FailureReason {
    log.append(&error.to_string());
    log.record(kind, StepStatus::Failed, started, error.to_string());
    FailureReason::Config
}

/// Runs commands in order inside the job's source directory, stopping at the
/// first failure. Returns whether all of them succeeded.
async fn run_commands(
    commands: &[StepCommand],
    dirs: &JobDirs,
    env: &BTreeMap<String, String>,
    log: &mut JobLog,
) -> Result<bool> {
    for step in commands {
        let (status, output) = command::run_step_command(step, &dirs.src, env).await;
        log.append(&output);
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                debug!("`{}` exited with {}", step.display, status);
                return Ok(false);
            }
            Err(e) => {
                // A program that cannot be started fails the step, not the runner.
                log.append(&format!("{}: {}", step.program, e));
                return Ok(false);
            }
        }
    }
    Ok(true)
}

//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which expands the test matrix,
//! builds every job and runs them concurrently.
//!
//! 此模块实现了 `run` 命令：展开测试矩阵、构建每个任务并并发运行。

use anyhow::{Context, Result};
use colored::*;
use futures::{stream, StreamExt};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        cache::{CacheKey, CacheStore},
        config::{self, PipelineConfig},
        environment::{HostEnv, UPLOAD_COVERAGE_VAR},
        execution::{run_job, RunContext},
        jobs::{self, Job},
        matrix,
        models::{FailureReason, JobResult},
        planner,
    },
    infra::t,
    reporting::{
        console::{print_failure_details, print_summary},
        html::generate_html_report,
        json::write_json_report,
    },
};

/// Directory under the project root holding job directories and, by default,
/// the cache store.
pub const WORKSPACE_DIR: &str = ".matrix";

/// Options of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub jobs: Option<usize>,
    pub config: PathBuf,
    pub project_dir: PathBuf,
    pub only: Vec<String>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    /// `false` forces `UPLOAD_COVERAGE=0` for every job.
    pub upload: bool,
    /// `false` skips service containers.
    pub services: bool,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    /// Language given on the command line, if any.
    pub lang: Option<String>,
}

/// A loaded pipeline: configuration plus the jobs it describes.
#[derive(Debug)]
pub struct Pipeline {
    pub config: PipelineConfig,
    pub config_path: PathBuf,
    pub project_root: PathBuf,
    pub jobs: Vec<Job>,
    /// Matrix combinations dropped during expansion.
    pub excluded: usize,
}

impl Pipeline {
    /// Cache keys for `jobs`, in the same order.
    pub fn cache_keys(&self, jobs: &[Job]) -> Result<Vec<CacheKey>> {
        jobs.iter()
            .map(|job| job.cache_key(&self.config, &self.project_root))
            .collect()
    }
}

/// Loads the configuration, expands the matrix and builds all jobs.
pub fn load_pipeline(config_arg: &Path, project_dir: &Path, host: &HostEnv) -> Result<Pipeline> {
    // For config parsing, we don't have the locale yet. Use the current one.
    let locale = rust_i18n::locale().to_string();
    let config_path = fs::canonicalize(config_arg)
        .with_context(|| t!("config_read_failed_path", locale = &locale, path = config_arg.display()))?;
    let config = config::load_pipeline_config(&config_path)
        .with_context(|| t!("config_parse_failed", locale = &locale))?;

    let project_root = fs::canonicalize(project_dir)
        .with_context(|| t!("project_dir_not_found", locale = &locale, path = project_dir.display()))?;

    let expansion = matrix::expand(
        &config.matrix.envlist,
        &config.matrix.include,
        &config.matrix.exclude,
    )?;
    let jobs = jobs::build_jobs(&config, &expansion, host)?;

    Ok(Pipeline {
        config,
        config_path,
        project_root,
        jobs,
        excluded: expansion.excluded,
    })
}

/// Picks the output language: command line, then config file, then the
/// already detected system locale.
fn select_locale(cli_lang: Option<&str>, config: &PipelineConfig) -> String {
    match cli_lang.or(config.language.as_deref()) {
        Some(lang) => crate::resolve_locale(lang),
        None => rust_i18n::locale().to_string(),
    }
}

/// Executes the run command with the provided options.
///
/// # Returns
/// `Ok(())` only when every job passed.
pub async fn execute(options: RunOptions) -> Result<()> {
    let mut host = HostEnv::from_process();
    if !options.upload {
        host.set(UPLOAD_COVERAGE_VAR, "0");
    }

    let pipeline = load_pipeline(&options.config, &options.project_dir, &host)?;
    let locale = select_locale(options.lang.as_deref(), &pipeline.config);
    rust_i18n::set_locale(&locale);

    println!(
        "{}",
        t!("project_root_detected", locale = &locale, path = pipeline.project_root.display())
    );
    println!(
        "{}",
        t!("loading_config", locale = &locale, path = pipeline.config_path.display())
    );

    if pipeline.excluded > 0 {
        println!(
            "{}",
            t!(
                "filtered_unsupported",
                locale = &locale,
                filtered = pipeline.excluded,
                total = pipeline.jobs.len()
            )
            .cyan()
        );
    }

    let plan = planner::plan_execution(
        pipeline.jobs.clone(),
        &options.only,
        options.total_runners,
        options.runner_index,
    )?;

    if plan.filtered_count > 0 {
        println!(
            "{}",
            t!("filtered_by_only", locale = &locale, filtered = plan.filtered_count).cyan()
        );
    }

    if let (true, Some(total), Some(index)) = (plan.is_distributed, options.total_runners, options.runner_index) {
        println!(
            "{}",
            t!(
                "running_as_split_runner",
                locale = &locale,
                index = index + 1,
                total = total,
                count = plan.jobs_to_run.len()
            )
            .bold()
        );
    } else {
        println!(
            "{}",
            t!("running_as_single_runner", locale = &locale, count = plan.jobs_to_run.len()).bold()
        );
    }

    if plan.jobs_to_run.is_empty() {
        println!("{}", t!("no_jobs_to_run", locale = &locale).green());
        return Ok(());
    }

    // A missing key file is a configuration error: fail before any job starts.
    let keys = pipeline.cache_keys(&plan.jobs_to_run)?;

    let workspace = pipeline.project_root.join(WORKSPACE_DIR);
    let ctx = Arc::new(RunContext {
        cache: CacheStore::new(pipeline.project_root.join(&pipeline.config.cache.dir)),
        config: Arc::new(pipeline.config),
        project_root: pipeline.project_root,
        workspace,
        host_path: env::var("PATH").ok(),
        start_services: options.services,
        locale: locale.clone(),
    });

    let stop_token = setup_signal_handler(&locale);
    let parallelism = options.jobs.unwrap_or(num_cpus::get() / 2 + 1).max(1);

    let results = run_jobs(
        plan.jobs_to_run.into_iter().zip(keys).collect(),
        parallelism,
        ctx,
        stop_token,
    )
    .await;

    print_summary(&results, &locale);

    if let Some(report_path) = &options.html {
        println!("\n{}", t!("generating_html", locale = &locale, path = report_path.display()));
        if let Err(e) = generate_html_report(&results, report_path, &locale) {
            eprintln!("{} {:#}", t!("html_report_failed", locale = &locale).red(), e);
        }
    }
    if let Some(report_path) = &options.json {
        println!("\n{}", t!("generating_json", locale = &locale, path = report_path.display()));
        if let Err(e) = write_json_report(&results, report_path) {
            eprintln!("{} {:#}", t!("json_report_failed", locale = &locale).red(), e);
        }
    }

    if results.iter().all(JobResult::is_success) {
        println!("\n{}", t!("all_jobs_passed", locale = &locale).green().bold());
        Ok(())
    } else {
        let failures: Vec<_> = results.iter().filter(|r| r.is_failure()).collect();
        print_failure_details(&failures, &locale);
        anyhow::bail!(t!("pipeline_failed", locale = &locale).to_string());
    }
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}

/// Runs the jobs concurrently. A failing job never cancels its siblings;
/// only the stop token does. Results come back in declaration order.
pub async fn run_jobs(
    jobs: Vec<(Job, CacheKey)>,
    parallelism: usize,
    ctx: Arc<RunContext>,
    stop_token: CancellationToken,
) -> Vec<JobResult> {
    let mut results: Vec<(usize, JobResult)> = stream::iter(jobs.into_iter().enumerate().map(
        |(index, (job, key))| {
            let ctx = Arc::clone(&ctx);
            let stop_token = stop_token.clone();
            let name = job.name.clone();

            async move {
                if stop_token.is_cancelled() {
                    return (index, JobResult::Skipped { job: name });
                }

                let mut handle = tokio::spawn(run_job(job, key, ctx));
                let result = tokio::select! {
                    biased;
                    _ = stop_token.cancelled() => {
                        handle.abort();
                        JobResult::Skipped { job: name }
                    }
                    joined = &mut handle => match joined {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => runner_failure(name, format!("{e:#}")),
                        Err(e) => runner_failure(
                            name,
                            format!("Critical error during job execution: {e}"),
                        ),
                    },
                };
                (index, result)
            }
        },
    ))
    .buffer_unordered(parallelism)
    .collect()
    .await;

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

fn runner_failure(job: String, output: String) -> JobResult {
    JobResult::Failed {
        job,
        output,
        reason: FailureReason::Config,
        duration: Duration::default(),
        steps: Vec::new(),
    }
}

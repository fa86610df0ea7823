//! # Plan Command Module / 计划命令模块
//!
//! Prints what `run` would do without running anything: every job with its
//! dependency set, environment and cache key, or the whole job graph as JSON.
//!
//! 打印 `run` 将要执行的内容而不实际运行：每个任务的依赖集、环境和缓存键，
//! 或以 JSON 形式输出整个任务图。

use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cli::commands::run::{load_pipeline, Pipeline};
use crate::core::environment::HostEnv;
use crate::core::jobs::job_graph;
use crate::infra::t;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Text,
    Json,
}

pub fn execute(config: &Path, project_dir: &Path, format: PlanFormat, locale: &str) -> Result<()> {
    let pipeline = load_pipeline(config, project_dir, &HostEnv::from_process())?;
    let keys = pipeline.cache_keys(&pipeline.jobs)?;

    match format {
        PlanFormat::Json => {
            let keys: BTreeMap<_, _> = pipeline
                .jobs
                .iter()
                .map(|job| job.name.clone())
                .zip(keys)
                .collect();
            let graph = job_graph(&pipeline.jobs, &keys);
            let json = serde_json::to_string_pretty(&graph).context("Failed to serialize job graph")?;
            println!("{json}");
        }
        PlanFormat::Text => print_text(&pipeline, &keys, locale),
    }
    Ok(())
}

fn print_text(pipeline: &Pipeline, keys: &[crate::core::cache::CacheKey], locale: &str) {
    println!(
        "{}",
        t!("plan.header", locale = locale, count = pipeline.jobs.len()).bold()
    );
    if pipeline.excluded > 0 {
        println!(
            "{}",
            t!("plan.excluded", locale = locale, count = pipeline.excluded).cyan()
        );
    }

    for (job, key) in pipeline.jobs.iter().zip(keys) {
        println!("\n{}", job.name.yellow().bold());
        println!("  {:<12} {}", t!("plan.image", locale = locale), job.images.join(", "));
        println!("  {:<12} {}", t!("plan.cache_key", locale = locale), key);
        println!("  {}", t!("plan.dependencies", locale = locale));
        for requirement in job.dependencies.requirements() {
            println!("    {requirement}");
        }
        if !job.environment.is_empty() {
            println!("  {}", t!("plan.environment", locale = locale));
            for (name, value) in &job.environment {
                println!("    {name}={value}");
            }
        }
    }
}

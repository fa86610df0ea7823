//! # Job Execution Planner Module / 任务执行计划模块
//!
//! This module decides which jobs this invocation runs: selection by name and
//! distribution across several CI runners.
//!
//! 此模块决定本次调用运行哪些任务：按名称选择以及在多个 CI 运行器之间分配。

use crate::core::error::MatrixError;
use crate::core::jobs::Job;
use anyhow::{bail, Result};

/// Represents a complete execution plan for a pipeline.
/// 表示流水线的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The jobs to run, in declaration order.
    /// 要运行的任务，按声明顺序排列。
    pub jobs_to_run: Vec<Job>,
    /// Jobs left out by `--only`.
    /// 被 `--only` 排除的任务数量。
    pub filtered_count: usize,
    /// Whether the jobs are distributed across multiple runners (CI environment).
    /// 任务是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Creates an execution plan for the given jobs.
///
/// # Arguments
/// * `jobs` - All jobs of the pipeline
/// * `only` - Job names to keep; empty keeps everything
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
pub fn plan_execution(
    jobs: Vec<Job>,
    only: &[String],
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    for name in only {
        if !jobs.iter().any(|j| &j.name == name) {
            return Err(MatrixError::UnknownJob(name.clone()).into());
        }
    }

    let total = jobs.len();
    let selected: Vec<Job> = if only.is_empty() {
        jobs
    } else {
        jobs.into_iter().filter(|j| only.contains(&j.name)).collect()
    };
    let filtered_count = total - selected.len();

    let (jobs_to_run, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 || index >= total {
                bail!("Runner index must be less than total runners.");
            }
            let distributed: Vec<_> = selected
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, job)| job)
                .collect();
            (distributed, true)
        }
        (None, None) => (selected, false),
        _ => bail!("Both --total-runners and --runner-index must be provided."),
    };

    Ok(ExecutionPlan {
        jobs_to_run,
        filtered_count,
        is_distributed,
    })
}

//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the display of job reports in the console.
//! It provides functionality for printing colorful, formatted summaries with
//! internationalization support.
//!
//! 此模块处理控制台中任务报告的显示。
//! 它提供打印彩色格式化摘要的功能，支持国际化。

use colored::*;

use crate::core::models::{JobResult, StepStatus};
use crate::infra::t;

/// Prints a formatted summary of job results to the console.
/// Displays a table with status, job name, duration and failure reason,
/// using color coding to highlight different statuses.
///
/// 在控制台打印格式化的任务结果摘要。
/// 显示一个包含状态、任务名称、持续时间和失败原因的表格，
/// 使用颜色编码突出显示不同的状态。
///
/// # Output Format / 输出格式
/// ```text
/// --- Job Summary ---
///   - Passed     | lint                     |      3.10s
///   - Failed     | py27-dj18                |     41.02s  Tests failed
///   - Skipped    | py36-djmaster            |        N/A
/// ```
pub fn print_summary(results: &[JobResult], locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for result in results {
        let status_str = result.status_str(locale);
        let duration_str = result
            .duration()
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        let reason_str = result
            .reason()
            .map(|r| r.label(locale))
            .unwrap_or_default();

        let status_colored = match result {
            JobResult::Passed { .. } => status_str.green(),
            JobResult::Failed { .. } if result.is_timeout() => status_str.yellow(),
            JobResult::Failed { .. } => status_str.red(),
            JobResult::Skipped { .. } => status_str.dimmed(),
        };

        println!(
            "  - {:<10} | {:<24} | {:>10}  {}",
            status_colored,
            result.job_name(),
            duration_str,
            reason_str
        );
    }

    let passed = results.iter().filter(|r| r.is_success()).count();
    println!(
        "\n{}",
        t!("report.summary_counts", locale = locale, passed = passed, total = results.len())
    );
}

/// Prints the step list and full output of every failed job.
///
/// 打印每个失败任务的步骤列表和完整输出。
pub fn print_failure_details(failures: &[&JobResult], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            t!("report.failure_header", locale = locale).red(),
            result.job_name().cyan()
        );

        for step in result.steps() {
            let status = match step.status {
                StepStatus::Passed => "ok".green(),
                StepStatus::Failed => "FAILED".red(),
                StepStatus::Skipped => "skipped".dimmed(),
            };
            println!("    {:<16} {} {}", step.kind.name(), status, step.detail.dimmed());
        }

        println!("\n--- {} ---\n", t!("report.job_log", locale = locale).yellow());
        println!("{}", result.output().trim_end());
        println!("\n{}", "-".repeat(80));
    }
}

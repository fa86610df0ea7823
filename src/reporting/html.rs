//! # HTML Reporting Module / HTML 报告模块
//!
//! This module handles the generation of HTML job reports.
//! It creates styled HTML files with statistics, a results table and
//! collapsible job output, rendered with `maud`.
//!
//! 此模块处理 HTML 任务报告的生成。
//! 它使用 `maud` 创建带有统计、结果表格和可折叠任务输出的样式化 HTML 文件。

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::models::JobResult;
use crate::infra::t;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = include_str!("assets/report.js");

/// Renders the report document.
///
/// 渲染报告文档。
pub fn render_html_report(results: &[JobResult], locale: &str) -> Markup {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = results.iter().filter(|r| r.is_failure()).count();
    let skipped = total - passed - failed;
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                p.generated { (t!("html_report.generated_at", locale = locale, time = &generated)) }
                div.summary-container {
                    (summary_item(total, "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(passed, "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(failed, "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(skipped, "skipped-text", &t!("html_report.summary.skipped", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.name", locale = locale)) }
                            th.status-col { (t!("html_report.table.header.status", locale = locale)) }
                            th { (t!("html_report.table.header.reason", locale = locale)) }
                            th.duration-cell { (t!("html_report.table.header.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, result) in results.iter().enumerate() {
                            (result_rows(i, result, locale))
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div.summary-item {
            span class={ "count " (class) } { (count) }
            span.label { (label) }
        }
    }
}

fn result_rows(index: usize, result: &JobResult, locale: &str) -> Markup {
    let output_id = format!("output-{index}");
    let duration = result
        .duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    let reason = result.reason().map(|r| r.label(locale)).unwrap_or_default();

    html! {
        tr {
            td { (result.job_name()) }
            td.status-col {
                div class={ "status-cell " (result.status_class()) } { (result.status_str(locale)) }
                @if !result.output().is_empty() {
                    div.output-toggle onclick={ "toggleOutput('" (output_id) "')" } {
                        (t!("html_report.toggle_output", locale = locale))
                    }
                }
            }
            td { (reason) }
            td.duration-cell { (duration) }
        }
        @if !result.output().is_empty() {
            tr id=(output_id) style="display:none;" {
                td colspan="4" {
                    ul.steps {
                        @for step in result.steps() {
                            li { (step.kind.name()) ": " (format!("{:?}", step.status)) " " (step.detail) }
                        }
                    }
                    pre.output-content { (result.output()) }
                }
            }
        }
    }
}

/// Generates an HTML report from job results and writes it to `output_path`.
///
/// 从任务结果生成 HTML 报告并写入 `output_path`。
///
/// # Errors / 错误
/// Fails when the file cannot be written.
pub fn generate_html_report(results: &[JobResult], output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_html_report(results, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("Failed to write HTML report to {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FailureReason;
    use std::time::Duration;

    #[test]
    fn output_is_escaped() {
        let results = vec![JobResult::Failed {
            job: "py27-dj18".to_string(),
            output: "<script>alert(1)</script>".to_string(),
            reason: FailureReason::TestFailed,
            duration: Duration::from_secs(1),
            steps: Vec::new(),
        }];
        let page = render_html_report(&results, "en").into_string();
        assert!(page.contains("py27-dj18"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!page.contains("<script>alert(1)</script>"));
    }
}

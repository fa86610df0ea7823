//! # JSON Reporting Module / JSON 报告模块
//!
//! Writes job results as a JSON document for other CI tooling.
//!
//! 将任务结果写为 JSON 文档，供其他 CI 工具使用。

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::models::JobResult;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    /// RFC 3339 timestamp of report creation.
    pub generated_at: String,
    pub success: bool,
    pub total: usize,
    pub passed: usize,
    pub results: &'a [JobResult],
}

impl<'a> JsonReport<'a> {
    pub fn new(results: &'a [JobResult]) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            success: results.iter().all(JobResult::is_success),
            total: results.len(),
            passed: results.iter().filter(|r| r.is_success()).count(),
            results,
        }
    }
}

/// Writes the report for `results` to `output_path`.
pub fn write_json_report(results: &[JobResult], output_path: &Path) -> Result<()> {
    let report = JsonReport::new(results);
    let content = serde_json::to_string_pretty(&report).context("Failed to serialize JSON report")?;
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn skipped_job_fails_the_report() {
        let results = vec![
            JobResult::Passed {
                job: "lint".to_string(),
                output: String::new(),
                duration: Duration::from_millis(10),
                steps: Vec::new(),
            },
            JobResult::Skipped {
                job: "py36-dj20".to_string(),
            },
        ];
        let value = serde_json::to_value(JsonReport::new(&results)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["passed"], 1);
        assert_eq!(value["total"], 2);
    }
}

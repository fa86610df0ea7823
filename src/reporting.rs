//! # Reporting Module / 报告模块
//!
//! This module handles the generation and display of job reports in multiple formats.
//! It provides functionality for creating styled HTML reports, machine-readable JSON
//! reports and colorful console summaries with internationalization support.
//!
//! 此模块处理多种格式的任务报告生成和显示。
//! 它提供创建样式化 HTML 报告、机器可读 JSON 报告和彩色控制台摘要的功能，支持国际化。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::write_json_report;

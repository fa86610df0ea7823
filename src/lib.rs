//! # matrix-ci Library / matrix-ci 库
//!
//! A configuration-driven test matrix runner for a Django package: it expands
//! the interpreter × framework matrix, resolves dependencies, computes cache
//! keys and runs every job, plus lint and migration checks.
//!
//! 一个配置驱动的 Django 包测试矩阵运行器：展开解释器 × 框架矩阵、
//! 解析依赖、计算缓存键并运行每个任务，以及 lint 和迁移检查。
//!
//! ## Modules / 模块
//!
//! - `core` - Matrix, dependencies, environments, cache and job execution
//! - `infra` - Command execution, file system and service containers
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 矩阵、依赖、环境、缓存和任务执行
//! - `infra` - 命令执行、文件系统和服务容器
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// Matches the full locale (e.g., "zh-CN") first, then the language code
/// (e.g., "en" from "en-US"), and finally falls back to "en".
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    rust_i18n::set_locale(&resolve_locale(&locale));
}

/// Maps a requested locale onto one the binary ships.
pub fn resolve_locale(requested: &str) -> String {
    let available = rust_i18n::available_locales!();
    if available.contains(&requested) {
        return requested.to_string();
    }
    requested
        .split(['-', '_'])
        .next()
        .and_then(|code| {
            available
                .iter()
                .find(|l| l.split('-').next() == Some(code))
                .map(|l| l.to_string())
        })
        .unwrap_or_else(|| "en".to_string())
}

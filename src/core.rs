//! # Core Module / 核心模块
//!
//! This module contains the core functionality of matrix-ci: the test
//! matrix, dependency resolution, job environments, cache keys, step
//! construction and job execution.
//!
//! 此模块包含 matrix-ci 的核心功能：测试矩阵、依赖解析、任务环境、
//! 缓存键、步骤构建和任务执行。

pub mod cache;
pub mod config;
pub mod deps;
pub mod environment;
pub mod error;
pub mod execution;
pub mod jobs;
pub mod matrix;
pub mod models;
pub mod planner;
pub mod steps;

// Re-exports
pub use error::{MatrixError, MatrixResult};
pub use execution::run_job;
pub use models::JobResult;

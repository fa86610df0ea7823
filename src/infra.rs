//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for matrix-ci,
//! including command execution, file system operations, service containers
//! and i18n support.
//!
//! 此模块为 matrix-ci 提供基础设施服务，
//! 包括命令执行、文件系统操作、服务容器和国际化支持。

pub mod command;
pub mod container;
pub mod fs;

// Re-export i18n functions for easier access
pub use rust_i18n::t;

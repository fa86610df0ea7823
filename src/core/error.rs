//! # Configuration Errors / 配置错误
//!
//! Typed errors for problems that are detected before any job starts:
//! malformed matrix declarations, unknown factors, missing settings and
//! missing cache key files. Application layers carry them inside
//! `anyhow::Error` and can downcast when they need to tell a configuration
//! error apart from a runtime failure.
//!
//! 在任何任务启动之前检测到的问题的类型化错误。

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for operations that can only fail with a configuration error.
pub type MatrixResult<T> = Result<T, MatrixError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("unbalanced braces in matrix entry '{entry}'")]
    UnbalancedBraces { entry: String },

    #[error("nested brace groups are not supported in matrix entry '{entry}'")]
    NestedBraces { entry: String },

    #[error("empty brace group in matrix entry '{entry}'")]
    EmptyGroup { entry: String },

    #[error("unknown factor '{factor}' in environment '{env}'")]
    UnknownFactor { factor: String, env: String },

    #[error("environment '{env}' has no interpreter factor (e.g. py36)")]
    MissingInterpreter { env: String },

    #[error("environment '{env}' has no framework factor (e.g. dj20)")]
    MissingFramework { env: String },

    #[error("environment '{env}' declares factor '{factor}' more than once")]
    DuplicateFactor { factor: String, env: String },

    #[error("environment '{env}' combines {framework} with unsupported interpreter {interpreter}")]
    UnsupportedCombination {
        env: String,
        interpreter: String,
        framework: String,
    },

    #[error("required setting '{0}' is empty")]
    MissingSetting(&'static str),

    #[error("command template '{template}' references undefined variable(s): {}", .vars.join(", "))]
    MissingEnv { template: String, vars: Vec<String> },

    #[error("command template '{0}' could not be split into arguments")]
    BadCommand(String),

    #[error("cache key file not found: {}", .0.display())]
    KeyFileMissing(PathBuf),

    #[error("unknown job '{0}'")]
    UnknownJob(String),
}

//! # Command Execution Module / 命令执行模块
//!
//! Spawns child processes for job steps and captures their combined output.
//!
//! 为任务步骤派生子进程并捕获其合并输出。

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::core::steps::StepCommand;
use crate::infra::t;

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。
pub async fn spawn_and_capture(
    mut cmd: tokio::process::Command,
) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            return (
                Err(std::io::Error::other(t!("capture_stdout_failed").to_string())),
                String::new(),
            );
        }
    };
    let stderr = match child.stderr.take() {
        Some(stderr) => stderr,
        None => {
            return (
                Err(std::io::Error::other(t!("capture_stderr_failed").to_string())),
                String::new(),
            );
        }
    };

    // Both readers append to the same buffer so the output keeps its rough interleaving.
    // 两个读取任务写入同一个缓冲区。
    let output = Arc::new(tokio::sync::Mutex::new(String::new()));

    let stdout_output = Arc::clone(&output);
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stdout_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let stderr_output = Arc::clone(&output);
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut output = stderr_output.lock().await;
            output.push_str(&line);
            output.push('\n');
        }
    });

    let status = child.wait().await;

    for (stream, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
        if let Err(e) = handle.await {
            warn!("Failed to join {} reader: {}", stream, e);
        }
    }

    (status, output.lock().await.clone())
}

/// Runs one step command with exactly `env` as its environment.
///
/// The inherited environment is cleared first; `env` must therefore carry
/// `PATH` and anything else the program needs.
pub async fn run_step_command(
    step: &StepCommand,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> (std::io::Result<ExitStatus>, String) {
    debug!("Running `{}` in {}", step.display, cwd.display());

    let mut cmd = tokio::process::Command::new(&step.program);
    cmd.args(&step.args)
        .env_clear()
        .envs(env)
        .current_dir(cwd)
        .kill_on_drop(true);

    let (status, output) = spawn_and_capture(cmd).await;
    let output = format!("{} {}\n{}", t!("run.command_prefix"), step.display, output);
    (status, output)
}

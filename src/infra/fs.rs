//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations,
//! such as preparing per-job directories and copying trees.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如准备每个任务的目录和复制目录树。

use anyhow::{Context, Result};
use fs_extra::dir::{copy, CopyOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// Entries of the project root never copied into a job checkout.
const CHECKOUT_EXCLUDES: &[&str] = &[".git", ".tox", ".matrix"];

/// Directory layout of one job inside the workspace.
/// 工作区中单个任务的目录布局。
#[derive(Debug, Clone)]
pub struct JobDirs {
    /// `<workspace>/jobs/<job>`
    pub root: PathBuf,
    /// Checked-out copy of the project.
    pub src: PathBuf,
    /// The installed environment; this is what the cache stores.
    pub env: PathBuf,
}

impl JobDirs {
    pub fn bin(&self) -> PathBuf {
        self.env.join("bin")
    }
}

/// Turns a job name into something safe to use as a directory name.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Creates a fresh directory tree for a job, removing leftovers from a
/// previous run so every job starts from a clean checkout.
///
/// # Arguments
/// * `workspace` - Root of the runner's working area
/// * `job_name` - Name of the job, used to create a unique directory name
pub fn create_job_dirs(workspace: &Path, job_name: &str) -> Result<JobDirs> {
    let root = workspace.join("jobs").join(sanitize(job_name));

    if root.exists() {
        fs::remove_dir_all(&root).with_context(|| {
            format!("Failed to clean up old job directory: {}", root.display())
        })?;
    }

    let dirs = JobDirs {
        src: root.join("src"),
        env: root.join("env"),
        root,
    };
    for dir in [&dirs.root, &dirs.src, &dirs.env] {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create job directory: {}", dir.display()))?;
    }
    Ok(dirs)
}

/// Copies the project into `dest`, skipping VCS data, tox environments and
/// every directory in `skip` (the runner's workspace and cache store),
/// wherever they sit inside the project.
pub fn stage_project(project_root: &Path, dest: &Path, skip: &[&Path]) -> Result<()> {
    let skip: Vec<PathBuf> = skip
        .iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()))
        .collect();
    stage_dir(project_root, dest, &skip, true)
}

fn stage_dir(dir: &Path, dest: &Path, skip: &[PathBuf], top_level: bool) -> Result<()> {
    let mut items = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read project dir: {}", dir.display()))? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if (top_level && CHECKOUT_EXCLUDES.contains(&name)) || skip.contains(&path) {
            continue;
        }
        // A directory holding a skipped path is staged entry by entry.
        if path.is_dir() && skip.iter().any(|s| s.starts_with(&path)) {
            let nested = dest.join(name);
            fs::create_dir_all(&nested)
                .with_context(|| format!("Failed to create {}", nested.display()))?;
            stage_dir(&path, &nested, skip, false)?;
            continue;
        }
        items.push(path);
    }

    let mut options = CopyOptions::new();
    options.overwrite = true;
    fs_extra::copy_items(&items, dest, &options)
        .with_context(|| format!("Failed to copy project into {}", dest.display()))?;
    Ok(())
}

/// Copies the contents of `from` into `to`, overwriting existing files.
pub fn copy_dir_contents(from: &Path, to: &Path) -> Result<()> {
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options.content_only = true;
    fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;
    copy(from, to, &options)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

//! # Dependency Cache / 依赖缓存
//!
//! Content-addressed store for installed job environments. Keys are built from
//! a prefix, the job identity and the hashes of the dependency declaration
//! files, so editing `setup.py` produces a new key while unrelated edits do
//! not. Entries are only ever replaced as a whole.
//!
//! A cache hit is never required for correctness: a stale or broken entry can
//! only make installs slower, because the install step always runs.
//!
//! 已安装任务环境的内容寻址存储。条目只会被整体替换。

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::core::error::MatrixError;
use crate::infra::fs::copy_dir_contents;

/// Hex characters kept from each file digest.
const HASH_LEN: usize = 16;

/// SHA-256 of a file's contents, truncated to [`HASH_LEN`] hex characters.
pub fn hash_file(path: &Path) -> Result<String> {
    let contents =
        fs::read(path).with_context(|| format!("Failed to read cache key file {}", path.display()))?;
    let digest = Sha256::digest(&contents);
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    Ok(hash)
}

/// `prefix + job + "-" + hash(file1) + "-" + hash(file2) ...`
/// 缓存键：前缀 + 任务标识 + 各声明文件的哈希。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub prefix: String,
    pub job: String,
    pub hashes: Vec<String>,
}

impl CacheKey {
    /// Computes the key for `job` from the key files under `project_root`.
    /// A missing key file is a configuration error.
    pub fn compute(prefix: &str, job: &str, project_root: &Path, key_files: &[String]) -> Result<Self> {
        let mut hashes = Vec::with_capacity(key_files.len());
        for file in key_files {
            let path = project_root.join(file);
            if !path.is_file() {
                return Err(MatrixError::KeyFileMissing(path).into());
            }
            hashes.push(hash_file(&path)?);
        }
        Ok(Self {
            prefix: prefix.to_string(),
            job: job.to_string(),
            hashes,
        })
    }

    /// Prefix shared by every key of this job, used for fallback restores.
    pub fn fallback_prefix(&self) -> String {
        format!("{}{}-", self.prefix, self.job)
    }

    /// True if `name` is a key of the same job with the same number of hash
    /// segments. Guards against `py27-dj18-` matching `py27-dj18-pytest-...`.
    pub fn is_sibling(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(&self.fallback_prefix()) else {
            return false;
        };
        let segments: Vec<&str> = rest.split('-').collect();
        segments.len() == self.hashes.len()
            && segments
                .iter()
                .all(|s| s.len() == HASH_LEN && s.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.job)?;
        for hash in &self.hashes {
            write!(f, "-{}", hash)?;
        }
        Ok(())
    }
}

/// Removes a scratch directory of the store. A failure leaves it behind and
/// is logged; it never fails the save. Returns whether the path is gone.
fn discard(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// What a restore found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRestore {
    /// The exact key was present.
    Exact,
    /// An older entry of the same job was used.
    Fallback(String),
    /// Nothing usable; the job starts from an empty environment.
    Miss,
}

/// Directory-backed cache store. Each entry is a directory named by its key.
/// 基于目录的缓存存储。每个条目是以其键命名的目录。
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(&key.to_string()).is_dir()
    }

    /// Restores the best entry for `key` into `dest`: the exact key first,
    /// then the most recently saved sibling key, else nothing.
    ///
    /// A failed copy is reported as a miss and `dest` is emptied so that a
    /// half-restored environment is never used.
    pub fn restore(&self, key: &CacheKey, dest: &Path) -> Result<CacheRestore> {
        let (source, outcome) = if self.contains(key) {
            (self.entry_path(&key.to_string()), CacheRestore::Exact)
        } else if let Some(name) = self.latest_sibling(key)? {
            (self.entry_path(&name), CacheRestore::Fallback(name))
        } else {
            debug!("Cache miss for {}", key);
            return Ok(CacheRestore::Miss);
        };

        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        match copy_dir_contents(&source, dest) {
            Ok(()) => {
                debug!("Restored {} from {}", dest.display(), source.display());
                Ok(outcome)
            }
            Err(e) => {
                warn!("Cache restore from {} failed: {:#}", source.display(), e);
                if dest.exists() {
                    fs::remove_dir_all(dest)
                        .with_context(|| format!("Failed to clear {}", dest.display()))?;
                }
                fs::create_dir_all(dest)?;
                Ok(CacheRestore::Miss)
            }
        }
    }

    /// Saves `src` under `key`, replacing any existing entry as a whole.
    ///
    /// The copy is staged in a temporary directory inside the store and then
    /// renamed into place. When another writer publishes the same key first,
    /// the later rename replaces it; both copies came from the same inputs.
    pub fn save(&self, key: &CacheKey, src: &Path) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create cache store {}", self.root.display()))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .context("Failed to create cache staging directory")?;
        copy_dir_contents(src, staging.path())?;

        let target = self.entry_path(&key.to_string());
        let staged = staging.keep();

        if target.exists() {
            let trash = tempfile::Builder::new()
                .prefix(".trash-")
                .tempdir_in(&self.root)
                .context("Failed to create cache trash directory")?
                .keep();
            // `trash` exists and is empty; rename needs the destination to be
            // an empty directory or absent.
            if let Err(e) = fs::rename(&target, &trash) {
                debug!("Previous entry for {} already moved: {}", key, e);
            }
            discard(&trash);
        }

        match fs::rename(&staged, &target) {
            Ok(()) => {
                debug!("Saved cache entry {}", key);
                Ok(())
            }
            Err(e) if target.is_dir() => {
                // A concurrent writer published the key between our rename
                // calls. Its contents are equivalent; keep it.
                debug!("Cache entry {} published concurrently: {}", key, e);
                discard(&staged);
                Ok(())
            }
            Err(e) => {
                discard(&staged);
                Err(e).with_context(|| format!("Failed to publish cache entry {}", key))
            }
        }
    }

    /// Most recently modified entry that is a sibling of `key`.
    fn latest_sibling(&self, key: &CacheKey) -> Result<Option<String>> {
        if !self.root.is_dir() {
            return Ok(None);
        }
        let mut best: Option<(SystemTime, String)> = None;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_dir() || !key.is_sibling(&name) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let newer = match &best {
                None => true,
                Some((time, best_name)) => (modified, &name) > (*time, best_name),
            };
            if newer {
                best = Some((modified, name));
            }
        }
        Ok(best.map(|(_, name)| name))
    }
}

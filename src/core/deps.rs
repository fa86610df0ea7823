//! # Dependency Resolution / 依赖解析
//!
//! Computes the set of packages to install for an environment tag. The set is
//! a pure function of the tag: the same tag always renders to byte-identical
//! requirements, which keeps cache keys and installs reproducible.
//!
//! 计算环境标签需要安装的软件包集合。该集合是标签的纯函数。

use crate::core::models::{EnvTag, Flag};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Packages every test environment gets.
const BASE: &[(&str, &str)] = &[("coverage", "<5"), ("codecov", "")];

/// Ordered mapping from package name (or URL) to version constraint.
/// 从包名（或 URL）到版本约束的有序映射。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet(BTreeMap<String, String>);

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        self.0.insert(name.into(), constraint.into());
    }

    pub fn constraint(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Requirement lines such as `Django>=1.8,<1.9`, sorted by name.
    pub fn requirements(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, constraint)| format!("{name}{constraint}"))
            .collect()
    }

    /// Contents of a pip requirements file.
    pub fn to_requirements_file(&self) -> String {
        let mut out = String::new();
        for line in self.requirements() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// SHA-256 of the rendered requirements file.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.to_requirements_file().as_bytes()))
    }

    /// Builds a set from `name<constraint>` lines such as `flake8==3.4.1`.
    pub fn from_requirements<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut set = Self::new();
        for line in lines {
            let line = line.as_ref().trim();
            let split = line
                .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~'))
                .unwrap_or(line.len());
            let (name, constraint) = line.split_at(split);
            set.insert(name.trim(), constraint.trim());
        }
        set
    }
}

/// Resolves the dependency set for a matrix environment.
///
/// Base tools, the framework pin implied by the tag and the extras switched on
/// by its flags.
pub fn resolve(tag: &EnvTag) -> DependencySet {
    let mut set = DependencySet::new();
    for (name, constraint) in BASE {
        set.insert(*name, *constraint);
    }

    let (framework, pin) = tag.framework.requirement();
    set.insert(framework, pin);

    for flag in &tag.flags {
        match flag {
            Flag::Pytest => {
                set.insert("pytest", "");
                set.insert("pytest-django", "");
            }
            Flag::Postgres => set.insert("psycopg2-binary", ""),
        }
    }
    set
}

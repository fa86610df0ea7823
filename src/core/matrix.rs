//! # Matrix Expansion Module / 矩阵展开模块
//!
//! Expands the compact `envlist` declaration into the concrete, ordered set of
//! environment tags. Brace groups are expanded textually (one group level,
//! no nesting), after which every resulting name is parsed into typed factors;
//! from that point on all combination logic works on the enums rather than on
//! strings.
//!
//! 将紧凑的 `envlist` 声明展开为具体的、有序的环境标签集合。
//! 大括号组按文本展开（仅一层，不支持嵌套），之后每个结果名称都会被解析为类型化因子。

use crate::core::error::{MatrixError, MatrixResult};
use crate::core::models::{EnvTag, Flag, Framework, Interpreter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// A typed matrix row, expanded as the full cross-product of its fields.
/// 类型化的矩阵行，展开为其字段的完整笛卡尔积。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixRow {
    pub interpreters: Vec<Interpreter>,
    pub frameworks: Vec<Framework>,
    /// Each entry is one flag set; an empty list means "no flags".
    #[serde(default)]
    pub flags: Vec<Vec<Flag>>,
}

impl MatrixRow {
    /// Every tag this row describes, in interpreter → framework → flags order.
    pub fn tags(&self) -> Vec<EnvTag> {
        let flag_sets: Vec<BTreeSet<Flag>> = if self.flags.is_empty() {
            vec![BTreeSet::new()]
        } else {
            self.flags
                .iter()
                .map(|set| set.iter().copied().collect())
                .collect()
        };

        let mut tags = Vec::new();
        for interpreter in &self.interpreters {
            for framework in &self.frameworks {
                for flags in &flag_sets {
                    tags.push(EnvTag {
                        interpreter: *interpreter,
                        framework: *framework,
                        flags: flags.clone(),
                    });
                }
            }
        }
        tags
    }
}

/// The result of expanding a matrix declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Tags in order of first appearance, duplicates removed.
    pub tags: Vec<EnvTag>,
    /// Combinations dropped because the framework does not support the
    /// interpreter or because they were listed in `exclude`.
    pub excluded: usize,
}

/// Expands brace groups in a single entry.
///
/// `py27-dj{18,110}{,-pytest}` yields `py27-dj18`, `py27-dj18-pytest`,
/// `py27-dj110`, `py27-dj110-pytest`.
///
/// 展开单个条目中的大括号组。
pub fn expand_braces(entry: &str) -> MatrixResult<Vec<String>> {
    let mut results = vec![String::new()];
    let mut rest = entry;

    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                for r in &mut results {
                    r.push_str(rest);
                }
                break;
            }
            Some(idx) if rest.as_bytes()[idx] == b'}' => {
                return Err(MatrixError::UnbalancedBraces {
                    entry: entry.to_string(),
                });
            }
            Some(open) => {
                let literal = &rest[..open];
                let after = &rest[open + 1..];
                let close = after.find('}').ok_or_else(|| MatrixError::UnbalancedBraces {
                    entry: entry.to_string(),
                })?;
                let group = &after[..close];
                if group.contains('{') {
                    return Err(MatrixError::NestedBraces {
                        entry: entry.to_string(),
                    });
                }
                if group.is_empty() {
                    return Err(MatrixError::EmptyGroup {
                        entry: entry.to_string(),
                    });
                }

                let alternatives: Vec<&str> = group.split(',').collect();
                results = results
                    .iter()
                    .flat_map(|prefix| {
                        alternatives
                            .iter()
                            .map(move |alt| format!("{prefix}{literal}{alt}"))
                    })
                    .collect();
                rest = &after[close + 1..];
            }
        }
    }

    Ok(results)
}

/// Expands `envlist` entries and typed rows into the ordered tag set.
///
/// Unknown factors and malformed braces fail here, before any job starts.
/// Combinations a framework does not support are dropped and counted.
///
/// 将 `envlist` 条目和类型化行展开为有序的标签集合。
pub fn expand(envlist: &[String], rows: &[MatrixRow], exclude: &[String]) -> MatrixResult<Expansion> {
    let excluded_tags = exclude
        .iter()
        .map(|e| e.parse::<EnvTag>())
        .collect::<MatrixResult<HashSet<_>>>()?;

    let mut candidates = Vec::new();
    for entry in envlist {
        for name in expand_braces(entry.trim())? {
            candidates.push(name.parse::<EnvTag>()?);
        }
    }
    for row in rows {
        candidates.extend(row.tags());
    }

    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let mut excluded = 0;
    for tag in candidates {
        if !tag.framework.supports(tag.interpreter) {
            debug!("Dropping unsupported combination {}", tag);
            excluded += 1;
            continue;
        }
        if excluded_tags.contains(&tag) {
            debug!("Dropping excluded environment {}", tag);
            excluded += 1;
            continue;
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    Ok(Expansion { tags, excluded })
}

/// Checks that a single tag is a supported combination. Used for tags named
/// outside the matrix, such as the migration-check environment.
pub fn ensure_supported(tag: &EnvTag) -> MatrixResult<()> {
    if tag.framework.supports(tag.interpreter) {
        Ok(())
    } else {
        Err(MatrixError::UnsupportedCombination {
            env: tag.to_string(),
            interpreter: tag.interpreter.to_string(),
            framework: tag.framework.to_string(),
        })
    }
}

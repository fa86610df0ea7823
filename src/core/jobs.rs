//! # Jobs and Job Graph / 任务与任务图
//!
//! Maps every matrix tag, plus the lint and migration-check purposes, onto a
//! `Job` carrying everything needed to run it: interpreter, dependency set,
//! environment, container images and services. The same jobs can be rendered
//! as a CI job graph for an external executor.
//!
//! 将每个矩阵标签以及 lint 和迁移检查映射为 `Job`。

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::cache::CacheKey;
use crate::core::config::{PipelineConfig, ServiceConfig};
use crate::core::deps::{self, DependencySet};
use crate::core::environment::{self, HostEnv};
use crate::core::error::MatrixResult;
use crate::core::matrix::Expansion;
use crate::core::models::{Interpreter, JobKind, StepKind};

pub const LINT_JOB: &str = "lint";
pub const MIGRATIONS_JOB: &str = "check_migrations";

/// A named unit of CI work.
/// 一个命名的 CI 工作单元。
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub name: String,
    pub kind: JobKind,
    pub interpreter: Interpreter,
    pub dependencies: DependencySet,
    pub environment: BTreeMap<String, String>,
    /// Primary image first, then one per service.
    pub images: Vec<String>,
    #[serde(skip)]
    pub services: Vec<ServiceConfig>,
    pub upload_coverage: bool,
}

impl Job {
    pub fn cache_key(&self, config: &PipelineConfig, project_root: &Path) -> Result<CacheKey> {
        CacheKey::compute(
            &config.cache.prefix,
            &self.name,
            project_root,
            &config.cache.key_files,
        )
    }
}

fn job(
    kind: JobKind,
    name: String,
    interpreter: Interpreter,
    dependencies: DependencySet,
    config: &PipelineConfig,
    host: &HostEnv,
) -> Job {
    let environment = environment::assemble(&kind, config, host);
    let services: Vec<ServiceConfig> = match &kind {
        JobKind::Matrix(tag) => config
            .services
            .iter()
            .filter(|s| tag.has(s.flag))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    let mut images = vec![interpreter.image()];
    images.extend(services.iter().map(|s| s.image.clone()));
    let upload_coverage =
        matches!(kind, JobKind::Matrix(_)) && environment::upload_enabled(&environment);

    Job {
        name,
        kind,
        interpreter,
        dependencies,
        environment,
        images,
        services,
        upload_coverage,
    }
}

/// Builds all jobs: lint, migration check, then one per matrix tag in
/// expansion order.
pub fn build_jobs(config: &PipelineConfig, expansion: &Expansion, host: &HostEnv) -> MatrixResult<Vec<Job>> {
    let mut jobs = Vec::new();

    if config.lint.enabled {
        jobs.push(job(
            JobKind::Lint,
            LINT_JOB.to_string(),
            config.lint.python,
            DependencySet::from_requirements(&config.lint.deps),
            config,
            host,
        ));
    }

    if config.migrations.enabled {
        let tag = config.migrations_tag()?;
        jobs.push(job(
            JobKind::MigrationCheck,
            MIGRATIONS_JOB.to_string(),
            tag.interpreter,
            deps::resolve(&tag),
            config,
            host,
        ));
    }

    for tag in &expansion.tags {
        jobs.push(job(
            JobKind::Matrix(tag.clone()),
            tag.to_string(),
            tag.interpreter,
            deps::resolve(tag),
            config,
            host,
        ));
    }

    Ok(jobs)
}

/// Container entry of a job in the graph.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

/// One step of a job in the graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStep {
    pub step: StepKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Directories persisted by `save_cache`, relative to the job directory.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl GraphStep {
    fn plain(step: StepKind) -> Self {
        Self {
            step,
            keys: Vec::new(),
            paths: Vec::new(),
            condition: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphJob {
    pub docker: Vec<ContainerSpec>,
    pub environment: BTreeMap<String, String>,
    pub requirements: Vec<String>,
    pub steps: Vec<GraphStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub jobs: Vec<String>,
}

/// A CI job graph: named jobs plus the workflow that runs them.
/// CI 任务图：命名的任务以及运行它们的工作流。
#[derive(Debug, Clone, Serialize)]
pub struct JobGraph {
    pub version: u32,
    pub jobs: BTreeMap<String, GraphJob>,
    pub workflows: BTreeMap<String, Workflow>,
}

/// Renders jobs as a job graph. `keys` maps job names to their cache keys.
pub fn job_graph(jobs: &[Job], keys: &BTreeMap<String, CacheKey>) -> JobGraph {
    let mut graph_jobs = BTreeMap::new();

    for job in jobs {
        let mut docker = vec![ContainerSpec {
            image: job.images[0].clone(),
            environment: BTreeMap::new(),
        }];
        docker.extend(job.services.iter().map(|s| ContainerSpec {
            image: s.image.clone(),
            environment: s.env.clone(),
        }));

        let (restore_keys, save_keys) = match keys.get(&job.name) {
            Some(key) => (
                vec![key.to_string(), key.fallback_prefix()],
                vec![key.to_string()],
            ),
            None => (Vec::new(), Vec::new()),
        };

        let mut steps = vec![GraphStep::plain(StepKind::Checkout)];
        steps.push(GraphStep {
            keys: restore_keys,
            ..GraphStep::plain(StepKind::RestoreCache)
        });
        if !job.services.is_empty() {
            steps.push(GraphStep::plain(StepKind::StartServices));
        }
        steps.push(GraphStep::plain(StepKind::Install));
        steps.push(GraphStep::plain(StepKind::Run));
        steps.push(GraphStep {
            keys: save_keys,
            paths: vec!["env".to_string()],
            ..GraphStep::plain(StepKind::SaveCache)
        });
        if matches!(job.kind, JobKind::Matrix(_)) {
            steps.push(GraphStep {
                condition: Some(format!("{} != 0", environment::UPLOAD_COVERAGE_VAR)),
                ..GraphStep::plain(StepKind::UploadCoverage)
            });
        }

        graph_jobs.insert(
            job.name.clone(),
            GraphJob {
                docker,
                environment: job.environment.clone(),
                requirements: job.dependencies.requirements(),
                steps,
            },
        );
    }

    let mut workflows = BTreeMap::new();
    workflows.insert(
        "test".to_string(),
        Workflow {
            jobs: jobs.iter().map(|j| j.name.clone()).collect(),
        },
    );

    JobGraph {
        version: 2,
        jobs: graph_jobs,
        workflows,
    }
}

use matrix_ci::core::cache::CacheKey;
use matrix_ci::core::config::PipelineConfig;
use matrix_ci::core::environment::HostEnv;
use matrix_ci::core::jobs::{build_jobs, job_graph, Job, LINT_JOB, MIGRATIONS_JOB};
use matrix_ci::core::matrix::expand;
use matrix_ci::core::models::StepKind;
use matrix_ci::core::planner::plan_execution;
use std::collections::BTreeMap;

const CONFIG: &str = r#"
[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"

[matrix]
envlist = ["py27-dj{18,111}", "py36-dj20-postgres"]

[[services]]
name = "postgres"
flag = "postgres"
image = "circleci/postgres:9.6-alpine"
ports = ["5432:5432"]
"#;

fn jobs_with(host: &HostEnv) -> (PipelineConfig, Vec<Job>) {
    let config: PipelineConfig = toml::from_str(CONFIG).unwrap();
    config.validate().unwrap();
    let expansion = expand(
        &config.matrix.envlist,
        &config.matrix.include,
        &config.matrix.exclude,
    )
    .unwrap();
    let jobs = build_jobs(&config, &expansion, host).unwrap();
    (config, jobs)
}

fn names(jobs: &[Job]) -> Vec<&str> {
    jobs.iter().map(|j| j.name.as_str()).collect()
}

#[test]
fn test_jobs_in_declaration_order() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    assert_eq!(
        names(&jobs),
        vec![LINT_JOB, MIGRATIONS_JOB, "py27-dj18", "py27-dj111", "py36-dj20-postgres"]
    );
}

#[test]
fn test_only_matrix_jobs_upload_coverage() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    for job in &jobs {
        let is_matrix = job.name != LINT_JOB && job.name != MIGRATIONS_JOB;
        assert_eq!(job.upload_coverage, is_matrix, "{}", job.name);
    }

    let (_, jobs) = jobs_with(&HostEnv::new().with("UPLOAD_COVERAGE", "0"));
    assert!(jobs.iter().all(|j| !j.upload_coverage));
}

#[test]
fn test_service_images_follow_flags() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    let postgres = jobs.iter().find(|j| j.name == "py36-dj20-postgres").unwrap();
    assert_eq!(postgres.services.len(), 1);
    assert_eq!(postgres.images.len(), 2);
    assert_eq!(postgres.images[1], "circleci/postgres:9.6-alpine");

    let plain = jobs.iter().find(|j| j.name == "py27-dj18").unwrap();
    assert!(plain.services.is_empty());
    assert_eq!(plain.images.len(), 1);
}

#[test]
fn test_graph_lists_cache_keys_and_steps() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("setup.py"), "").unwrap();
    std::fs::write(project.path().join("tox.ini"), "").unwrap();

    let (config, jobs) = jobs_with(&HostEnv::new());
    let keys: BTreeMap<String, CacheKey> = jobs
        .iter()
        .map(|j| (j.name.clone(), j.cache_key(&config, project.path()).unwrap()))
        .collect();
    let graph = job_graph(&jobs, &keys);

    assert_eq!(graph.workflows["test"].jobs.len(), jobs.len());

    let postgres = &graph.jobs["py36-dj20-postgres"];
    let kinds: Vec<StepKind> = postgres.steps.iter().map(|s| s.step).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Checkout,
            StepKind::RestoreCache,
            StepKind::StartServices,
            StepKind::Install,
            StepKind::Run,
            StepKind::SaveCache,
            StepKind::UploadCoverage,
        ]
    );
    let restore = &postgres.steps[1];
    let key = &keys["py36-dj20-postgres"];
    assert_eq!(restore.keys, vec![key.to_string(), key.fallback_prefix()]);

    let lint = &graph.jobs[LINT_JOB];
    assert!(lint.steps.iter().all(|s| s.step != StepKind::UploadCoverage));
}

#[test]
fn test_plan_only_filters_and_keeps_order() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    let only = vec!["py27-dj111".to_string(), LINT_JOB.to_string()];
    let plan = plan_execution(jobs, &only, None, None).unwrap();
    assert_eq!(names(&plan.jobs_to_run), vec![LINT_JOB, "py27-dj111"]);
    assert_eq!(plan.filtered_count, 3);
    assert!(!plan.is_distributed);
}

#[test]
fn test_plan_rejects_unknown_job() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    let err = plan_execution(jobs, &["py99-dj18".to_string()], None, None).unwrap_err();
    assert!(err.to_string().contains("py99-dj18"));
}

#[test]
fn test_plan_shards_cover_every_job_once() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    let mut seen = Vec::new();
    for index in 0..2 {
        let plan = plan_execution(jobs.clone(), &[], Some(2), Some(index)).unwrap();
        assert!(plan.is_distributed);
        seen.extend(plan.jobs_to_run.into_iter().map(|j| j.name));
    }
    seen.sort();
    let mut all: Vec<String> = jobs.into_iter().map(|j| j.name).collect();
    all.sort();
    assert_eq!(seen, all);
}

#[test]
fn test_plan_rejects_bad_runner_index() {
    let (_, jobs) = jobs_with(&HostEnv::new());
    assert!(plan_execution(jobs.clone(), &[], Some(2), Some(2)).is_err());
    assert!(plan_execution(jobs, &[], Some(2), None).is_err());
}

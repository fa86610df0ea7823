//! # Service Containers / 服务容器
//!
//! Starts and stops the auxiliary containers some jobs need, such as a
//! PostgreSQL server, through a Docker-compatible CLI.
//!
//! 通过兼容 Docker 的命令行启动和停止某些任务需要的辅助容器。

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::core::config::ServiceConfig;
use crate::infra::command::spawn_and_capture;
use crate::infra::fs::sanitize;

/// A running service container. Call [`ServiceContainer::stop`] when the job ends.
#[derive(Debug)]
pub struct ServiceContainer {
    pub name: String,
    pub id: String,
    runtime: String,
}

/// Arguments for `<runtime> run` starting `service` for `job`.
pub fn run_args(service: &ServiceConfig, job: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        container_name(service, job),
    ];
    for (key, value) in &service.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    for port in &service.ports {
        args.push("--publish".to_string());
        args.push(port.clone());
    }
    args.push(service.image.clone());
    args
}

fn container_name(service: &ServiceConfig, job: &str) -> String {
    format!("matrix-ci-{}-{}", sanitize(job), sanitize(&service.name))
}

impl ServiceContainer {
    /// Starts the container without waiting for it to accept connections.
    /// Register the returned container for cleanup before calling
    /// [`wait_ready`], so that an interrupted wait still leaves it stoppable.
    pub async fn launch(runtime: &str, service: &ServiceConfig, job: &str) -> Result<Self> {
        let mut cmd = tokio::process::Command::new(runtime);
        cmd.args(run_args(service, job)).kill_on_drop(true);

        let (status, output) = spawn_and_capture(cmd).await;
        let status = status.with_context(|| format!("Failed to run '{runtime}'"))?;
        if !status.success() {
            bail!("{} run {} failed:\n{}", runtime, service.image, output.trim());
        }

        let container = Self {
            name: service.name.clone(),
            id: output.trim().lines().last().unwrap_or_default().to_string(),
            runtime: runtime.to_string(),
        };
        debug!("Started service {} ({})", container.name, container.id);
        Ok(container)
    }

    /// Stops the container. Failures are logged, never propagated.
    pub async fn stop(self) {
        let mut cmd = tokio::process::Command::new(&self.runtime);
        cmd.arg("stop").arg(&self.id);
        match spawn_and_capture(cmd).await {
            (Ok(status), _) if status.success() => debug!("Stopped service {}", self.name),
            (Ok(_), output) => warn!("Stopping service {} failed: {}", self.name, output.trim()),
            (Err(e), _) => warn!("Stopping service {} failed: {}", self.name, e),
        }
    }
}

/// Waits until the first published port of `service` accepts TCP
/// connections. Services without ports are ready at once.
pub async fn wait_ready(service: &ServiceConfig) -> Result<()> {
    let Some(port) = service.ready_port() else {
        return Ok(());
    };
    let timeout = Duration::from_secs(service.ready_timeout_secs);
    wait_for_port(port, timeout)
        .await
        .with_context(|| format!("Service {} never became ready", service.name))
}

/// Polls `127.0.0.1:port` until it accepts a connection or `timeout` passes.
pub async fn wait_for_port(port: u16, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(_) => return Ok(()),
            Err(e) if Instant::now() >= deadline => {
                return Err(e).with_context(|| format!("port {port} not reachable"));
            }
            Err(_) => sleep(Duration::from_millis(250)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Flag;
    use std::collections::BTreeMap;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[test]
    fn run_args_publish_env_and_ports() {
        let mut env = BTreeMap::new();
        env.insert("POSTGRES_USER".to_string(), "postgres".to_string());
        let service = ServiceConfig {
            name: "postgres".to_string(),
            flag: Flag::Postgres,
            image: "circleci/postgres:9.6-alpine".to_string(),
            env,
            ports: vec!["5432:5432".to_string()],
            job_env: BTreeMap::new(),
            ready_timeout_secs: 30,
        };
        assert_eq!(
            run_args(&service, "py36-dj20-postgres"),
            vec![
                "run",
                "--detach",
                "--rm",
                "--name",
                "matrix-ci-py36-dj20-postgres-postgres",
                "--env",
                "POSTGRES_USER=postgres",
                "--publish",
                "5432:5432",
                "circleci/postgres:9.6-alpine",
            ]
        );
    }

    #[tokio::test]
    async fn wait_for_port_times_out_on_closed_port() {
        assert!(wait_for_port(closed_port(), Duration::from_millis(300)).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launched_container_survives_failed_readiness() {
        let service = ServiceConfig {
            name: "postgres".to_string(),
            flag: Flag::Postgres,
            image: "circleci/postgres:9.6-alpine".to_string(),
            env: BTreeMap::new(),
            ports: vec![format!("{}:5432", closed_port())],
            job_env: BTreeMap::new(),
            ready_timeout_secs: 0,
        };
        // `echo` stands in for the runtime: its output is the last argument.
        let container = ServiceContainer::launch("echo", &service, "py36-dj20-postgres")
            .await
            .unwrap();
        assert!(container.id.ends_with("circleci/postgres:9.6-alpine"));

        let err = wait_ready(&service).await.unwrap_err();
        assert!(format!("{err:#}").contains("never became ready"));
        container.stop().await;
    }
}

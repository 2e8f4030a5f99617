//! Container runtime adapter driving the `docker` command-line client.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::{ContainerId, ContainerSpec, ExecOutput};
use crate::domain::ports::ContainerRuntime;

/// [`ContainerRuntime`] backed by the docker CLI.
///
/// Every primitive maps onto exactly one `docker` invocation, so the
/// adapter is stateless and safe to share across concurrent futures.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for `docker create`, in order.
    pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["create".to_string()];
        if let Some(mode) = &spec.network_mode {
            args.push("--network".to_string());
            args.push(mode.clone());
        }
        if let Some(dir) = &spec.working_dir {
            args.push("--workdir".to_string());
            args.push(dir.clone());
        }
        for mount in &spec.mounts {
            args.push("--volume".to_string());
            args.push(mount.to_volume_arg());
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    fn describe(&self, args: &[String]) -> String {
        let head: Vec<&str> = args.iter().take(2).map(String::as_str).collect();
        format!("{} {}", self.program, head.join(" "))
    }

    async fn output(&self, args: &[String]) -> RuntimeResult<std::process::Output> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| RuntimeError::Launch {
                command: self.describe(args),
                source,
            })
    }

    /// Run a docker command that must succeed; returns trimmed stdout.
    async fn run(&self, args: &[String]) -> RuntimeResult<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: self.describe(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    #[instrument(skip(self, spec), fields(image = %spec.image))]
    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId> {
        let stdout = self.run(&Self::create_args(spec)).await?;
        // `docker create` may print pull progress before the id.
        let id = stdout
            .lines()
            .last()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ContainerId::new)
            .ok_or_else(|| RuntimeError::MissingContainerId(spec.image.clone()))?;
        debug!(container = %id, "Container created");
        Ok(id)
    }

    async fn start(&self, id: &ContainerId) -> RuntimeResult<()> {
        self.run(&["start".to_string(), id.as_str().to_string()])
            .await
            .map(|_| ())
    }

    async fn stop(&self, id: &ContainerId, timeout: Duration) -> RuntimeResult<()> {
        self.run(&[
            "stop".to_string(),
            "--time".to_string(),
            timeout.as_secs().to_string(),
            id.as_str().to_string(),
        ])
        .await
        .map(|_| ())
    }

    async fn remove(
        &self,
        id: &ContainerId,
        remove_volumes: bool,
        force: bool,
    ) -> RuntimeResult<()> {
        let mut args = vec!["rm".to_string()];
        if remove_volumes {
            args.push("--volumes".to_string());
        }
        if force {
            args.push("--force".to_string());
        }
        args.push(id.as_str().to_string());
        self.run(&args).await.map(|_| ())
    }

    async fn exec(&self, id: &ContainerId, command: &[String]) -> RuntimeResult<ExecOutput> {
        let mut args = vec!["exec".to_string(), id.as_str().to_string()];
        args.extend(command.iter().cloned());

        let output = self.output(&args).await?;
        Ok(ExecOutput {
            exit_code: output.status.code().map_or(-1, i64::from),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

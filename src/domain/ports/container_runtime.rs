//! Container runtime port.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::RuntimeResult;
use crate::domain::models::{ContainerId, ContainerSpec, ExecOutput};

/// The only container primitives the orchestrator relies on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container.
    async fn create(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId>;

    async fn start(&self, id: &ContainerId) -> RuntimeResult<()>;

    /// Stop, killing after `timeout`.
    async fn stop(&self, id: &ContainerId, timeout: Duration) -> RuntimeResult<()>;

    async fn remove(&self, id: &ContainerId, remove_volumes: bool, force: bool)
        -> RuntimeResult<()>;

    /// Run a command in a running container. A non-zero exit code is a
    /// successful call; only failing to run the command is an error.
    async fn exec(&self, id: &ContainerId, command: &[String]) -> RuntimeResult<ExecOutput>;
}

//! Rebuilds the gossip binary inside the long-lived builder container.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument};

use crate::domain::errors::{BuildError, RuntimeResult};
use crate::domain::models::{
    BuildConfig, ContainerRole, ContainerSpec, ExecOutput, ManagedContainer, Mount,
};
use crate::domain::ports::ContainerRuntime;

/// Owns the builder container and runs the configure + compile command in it.
///
/// The source tree is bind-mounted read-write, so the binary lands in the
/// host build directory that node containers mount read-only.
pub struct BuildCoordinator {
    runtime: Arc<dyn ContainerRuntime>,
    container: ManagedContainer,
    command: Vec<String>,
}

impl BuildCoordinator {
    /// Container spec for the builder: idles forever with the source mounted.
    pub fn builder_spec(config: &BuildConfig, source_dir: &Path) -> ContainerSpec {
        ContainerSpec::new(config.image.clone())
            .with_command(["sleep", "infinity"])
            .with_mount(Mount::read_write(source_dir, config.source_mount.clone()))
            .with_working_dir(config.source_mount.clone())
    }

    /// Create and start the builder container.
    pub async fn spawn(
        runtime: Arc<dyn ContainerRuntime>,
        config: &BuildConfig,
        source_dir: &Path,
    ) -> RuntimeResult<Self> {
        info!(image = %config.image, "Spawning builder container");
        let id = runtime
            .create(&Self::builder_spec(config, source_dir))
            .await?;
        let container = ManagedContainer::created(id, ContainerRole::Builder);
        if let Err(e) = runtime.start(&container.id).await {
            runtime.remove(&container.id, false, true).await.ok();
            return Err(e);
        }
        info!(container = %container.id, "Builder container started");

        Ok(Self {
            runtime,
            container,
            command: config.command(),
        })
    }

    pub const fn container(&self) -> &ManagedContainer {
        &self.container
    }

    /// Clean rebuild against the current build configuration header.
    ///
    /// A failure here is never retried: a broken binary invalidates every
    /// later sweep point.
    #[instrument(skip(self), fields(container = %self.container.id))]
    pub async fn rebuild(&self) -> Result<ExecOutput, BuildError> {
        info!("Building binary inside builder container");
        let started = Instant::now();

        let output = self
            .runtime
            .exec(&self.container.id, &self.command)
            .await
            .map_err(BuildError::Exec)?;

        if !output.success() {
            error!(
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Build failed"
            );
            return Err(BuildError::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        info!(
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Build completed"
        );
        Ok(output)
    }
}

//! The two singleton containers that live for a whole sweep.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::errors::{SweepError, SweepResult, TeardownError};
use crate::domain::models::{BenchConfig, ContainerRole, ContainerSpec, ManagedContainer};
use crate::domain::ports::ContainerRuntime;
use crate::services::build_coordinator::BuildCoordinator;
use crate::services::fleet_manager::TeardownReport;

/// Builder and result-store containers, acquired once per sweep.
///
/// [`release`](Self::release) consumes the value, so the singletons can be
/// stopped at most once.
pub struct SweepResources {
    runtime: Arc<dyn ContainerRuntime>,
    builder: BuildCoordinator,
    store: ManagedContainer,
    stop_timeout: Duration,
    warmup: Duration,
}

impl SweepResources {
    pub fn store_spec(config: &BenchConfig) -> ContainerSpec {
        ContainerSpec::new(config.store.image.clone())
            .with_network_mode(config.fleet.network_mode.clone())
    }

    /// Start the builder, then the store.
    ///
    /// If the store cannot be started the builder is released before the
    /// error is returned. Call [`warm_up`](Self::warm_up) before first use
    /// of the store.
    pub async fn acquire(
        runtime: Arc<dyn ContainerRuntime>,
        config: &BenchConfig,
        source_dir: &Path,
    ) -> SweepResult<Self> {
        let stop_timeout = Duration::from_secs(config.runtime.singleton_stop_timeout_secs);

        let builder = BuildCoordinator::spawn(runtime.clone(), &config.build, source_dir)
            .await
            .map_err(|source| SweepError::Acquire {
                role: ContainerRole::Builder.as_str(),
                source,
            })?;

        let store = match Self::start_store(runtime.as_ref(), config).await {
            Ok(store) => store,
            Err(source) => {
                warn!(error = %source, "Result store failed to start, releasing builder");
                release_container(runtime.as_ref(), builder.container(), stop_timeout)
                    .await
                    .ok();
                return Err(SweepError::Acquire {
                    role: ContainerRole::Store.as_str(),
                    source,
                });
            }
        };

        Ok(Self {
            runtime,
            builder,
            store,
            stop_timeout,
            warmup: Duration::from_millis(config.store.warmup_ms),
        })
    }

    /// Give the freshly started store time to accept connections.
    pub async fn warm_up(&self) {
        if !self.warmup.is_zero() {
            info!(warmup = ?self.warmup, "Waiting for result store");
            tokio::time::sleep(self.warmup).await;
        }
    }

    async fn start_store(
        runtime: &dyn ContainerRuntime,
        config: &BenchConfig,
    ) -> crate::domain::errors::RuntimeResult<ManagedContainer> {
        info!(image = %config.store.image, "Spawning result store container");
        let id = runtime.create(&Self::store_spec(config)).await?;
        let store = ManagedContainer::created(id, ContainerRole::Store);
        if let Err(e) = runtime.start(&store.id).await {
            runtime.remove(&store.id, false, true).await.ok();
            return Err(e);
        }
        info!(container = %store.id, "Result store container started");
        Ok(store)
    }

    pub const fn builder(&self) -> &BuildCoordinator {
        &self.builder
    }

    pub const fn store(&self) -> &ManagedContainer {
        &self.store
    }

    /// Stop and remove both singletons. Failures are logged, not raised.
    pub async fn release(self) -> TeardownReport {
        let mut report = TeardownReport {
            requested: 2,
            ..TeardownReport::default()
        };

        for container in [&self.store, self.builder.container()] {
            match release_container(self.runtime.as_ref(), container, self.stop_timeout).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(role = %container.role, error = %e, "Failed to release container");
                    report.failures.push(e);
                }
            }
        }

        info!(removed = report.removed, "Sweep containers released");
        report
    }
}

/// Stop then remove; removal is forced if the stop failed.
async fn release_container(
    runtime: &dyn ContainerRuntime,
    container: &ManagedContainer,
    timeout: Duration,
) -> Result<(), TeardownError> {
    let stopped = runtime.stop(&container.id, timeout).await;
    if let Err(ref e) = stopped {
        warn!(container = %container.id, error = %e, "Stop failed, forcing removal");
    }
    runtime
        .remove(&container.id, false, stopped.is_err())
        .await
        .map_err(|source| TeardownError::Remove {
            id: container.id.clone(),
            source,
        })?;

    stopped.map_err(|source| TeardownError::Stop {
        id: container.id.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockContainerRuntime, RuntimeCall};

    fn quick_config() -> BenchConfig {
        let mut config = BenchConfig::default();
        config.store.warmup_ms = 0;
        config
    }

    #[tokio::test]
    async fn acquire_starts_builder_then_store() {
        let runtime = Arc::new(MockContainerRuntime::new());
        let resources =
            SweepResources::acquire(runtime.clone(), &quick_config(), Path::new("/work"))
                .await
                .unwrap();

        let images: Vec<String> = runtime
            .started_specs()
            .into_iter()
            .map(|spec| spec.image)
            .collect();
        assert_eq!(images, vec!["microswim-builder", "redis:latest"]);
        assert_eq!(resources.store().role, ContainerRole::Store);
    }

    #[tokio::test]
    async fn release_stops_each_singleton_once() {
        let runtime = Arc::new(MockContainerRuntime::new());
        let resources =
            SweepResources::acquire(runtime.clone(), &quick_config(), Path::new("/work"))
                .await
                .unwrap();
        let builder_id = resources.builder().container().id.clone();
        let store_id = resources.store().id.clone();

        let report = resources.release().await;

        assert!(report.is_clean());
        assert_eq!(runtime.stop_calls_for(&builder_id), 1);
        assert_eq!(runtime.stop_calls_for(&store_id), 1);
        assert!(runtime.existing().is_empty());
    }

    #[tokio::test]
    async fn store_failure_releases_builder() {
        let runtime = Arc::new(
            MockContainerRuntime::new().fail_start_if(|spec| spec.image == "redis:latest"),
        );

        let result =
            SweepResources::acquire(runtime.clone(), &quick_config(), Path::new("/work")).await;

        assert!(matches!(
            result,
            Err(SweepError::Acquire { role: "store", .. })
        ));
        assert!(runtime.existing().is_empty());
        assert_eq!(
            runtime
                .calls()
                .iter()
                .filter(|c| matches!(c, RuntimeCall::Stop(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn builder_start_failure_leaves_nothing_behind() {
        let runtime = Arc::new(
            MockContainerRuntime::new().fail_start_if(|spec| spec.image == "microswim-builder"),
        );

        let result =
            SweepResources::acquire(runtime.clone(), &quick_config(), Path::new("/work")).await;

        assert!(matches!(
            result,
            Err(SweepError::Acquire { role: "builder", .. })
        ));
        assert!(runtime.existing().is_empty());
        assert!(!runtime
            .calls()
            .iter()
            .any(|c| matches!(c, RuntimeCall::Create { image, .. } if image == "redis:latest")));
    }

    #[tokio::test]
    async fn stop_failure_still_removes() {
        let runtime = Arc::new(MockContainerRuntime::new().fail_stop_if(|_| true));
        let resources =
            SweepResources::acquire(runtime.clone(), &quick_config(), Path::new("/work"))
                .await
                .unwrap();

        let report = resources.release().await;

        assert_eq!(report.failures.len(), 2);
        assert!(runtime.existing().is_empty());
    }
}

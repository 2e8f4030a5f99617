//! Sequential driver for a whole benchmark campaign.
//!
//! For each sweep point: inject the build configuration, rebuild, spawn the
//! node fleet, wait for and collect results, tear the fleet down, and flush
//! the store. Builder and store containers are acquired once up front and
//! released once at the end, whichever way the loop ends.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span, warn, Instrument};

use crate::domain::errors::{ExperimentError, SweepError, SweepResult};
use crate::domain::models::{
    BenchConfig, Experiment, ParameterSweep, PortBlock, ResultRecord, SweepArtifact,
};
use crate::domain::ports::{ContainerRuntime, ResultStore};
use crate::services::fleet_manager::FleetManager;
use crate::services::header_config::ConfigInjector;
use crate::services::result_collector::{CollectOutcome, ResultCollector};
use crate::services::result_store_gateway::ResultStoreGateway;
use crate::services::sweep_resources::SweepResources;
use crate::services::worker_pool::WorkerPool;

/// How a single sweep point ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStatus {
    Collected,
    TimedOut,
    SpawnFailed,
    CollectFailed,
    Skipped,
}

impl PointStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Collected => "collected",
            Self::TimedOut => "timed out",
            Self::SpawnFailed => "spawn failed",
            Self::CollectFailed => "collect failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointReport {
    pub experiment: Experiment,
    pub status: PointStatus,
    /// Set when an artifact exists for this point.
    pub artifact: Option<PathBuf>,
    /// Nodes that published a value.
    pub reported: usize,
    /// Published values that did not parse as convergence samples.
    pub malformed: usize,
    pub mean_convergence_secs: Option<f64>,
    pub elapsed: Duration,
}

impl PointReport {
    fn new(experiment: Experiment, status: PointStatus, elapsed: Duration) -> Self {
        Self {
            experiment,
            status,
            artifact: None,
            reported: 0,
            malformed: 0,
            mean_convergence_secs: None,
            elapsed,
        }
    }

    fn collected(
        experiment: Experiment,
        artifact: PathBuf,
        records: &[ResultRecord],
        elapsed: Duration,
    ) -> Self {
        let reported = records.iter().filter(|r| r.value.is_some()).count();
        let samples: Vec<f64> = records
            .iter()
            .filter_map(ResultRecord::sample)
            .map(|s| s.seconds)
            .collect();
        let mean = (!samples.is_empty())
            .then(|| samples.iter().sum::<f64>() / samples.len() as f64);

        Self {
            experiment,
            status: PointStatus::Collected,
            artifact: Some(artifact),
            reported,
            malformed: reported - samples.len(),
            mean_convergence_secs: mean,
            elapsed,
        }
    }
}

/// Per-point outcomes of a finished sweep, in sweep order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    pub points: Vec<PointReport>,
    pub elapsed: Duration,
}

impl SweepSummary {
    pub fn count(&self, status: PointStatus) -> usize {
        self.points.iter().filter(|p| p.status == status).count()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.points.iter().filter_map(|p| p.artifact.as_deref())
    }
}

pub struct SweepController {
    runtime: Arc<dyn ContainerRuntime>,
    config: BenchConfig,
    sweep: ParameterSweep,
    source_dir: PathBuf,
    injector: ConfigInjector,
    fleet: FleetManager,
    collector: ResultCollector,
}

impl SweepController {
    /// `header` is the build configuration file rewritten before each
    /// build; `source_dir` is mounted into the builder and anchors the node
    /// mounts.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn ResultStore>,
        config: BenchConfig,
        header: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
    ) -> Result<Self, ExperimentError> {
        let sweep = config.sweep.to_sweep()?;
        let source_dir = source_dir.into();
        let fleet = FleetManager::new(runtime.clone(), config.fleet.clone(), &source_dir);
        let collector = ResultCollector::new(
            ResultStoreGateway::new(store, config.store.key_prefix.clone()),
            WorkerPool::new(config.collect.lookup_workers),
        );

        Ok(Self {
            runtime,
            sweep,
            source_dir,
            injector: ConfigInjector::new(header),
            fleet,
            collector,
            config,
        })
    }

    pub const fn sweep(&self) -> &ParameterSweep {
        &self.sweep
    }

    pub const fn fleet(&self) -> &FleetManager {
        &self.fleet
    }

    /// Run the sweep until done, a fatal error, or Ctrl-C.
    pub async fn run(&self) -> SweepResult<SweepSummary> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the sweep until done, a fatal error, or `shutdown` resolves.
    ///
    /// `shutdown` is polled from the moment containers start being acquired.
    /// Live nodes are torn down and both singletons are released on every
    /// path out once they have been acquired.
    pub async fn run_until<F>(&self, shutdown: F) -> SweepResult<SweepSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.prepare_dirs().await?;

        info!(
            points = self.sweep.len(),
            iterations = self.sweep.iterations(),
            points_per_iteration = self.sweep.points_per_iteration(),
            "Starting sweep"
        );
        let started = Instant::now();

        let acquire =
            SweepResources::acquire(self.runtime.clone(), &self.config, &self.source_dir);
        tokio::pin!(acquire);
        let resources = tokio::select! {
            acquired = &mut acquire => acquired?,
            () = &mut shutdown => {
                // Acquisition is left to finish so nothing it creates is orphaned.
                warn!("Interrupt received while starting sweep containers");
                if let Ok(resources) = acquire.await {
                    resources.release().await;
                }
                return Err(SweepError::Interrupted);
            }
        };

        let mut summary = SweepSummary::default();
        let outcome = tokio::select! {
            result = self.run_points(&resources, &mut summary) => result,
            () = &mut shutdown => {
                warn!("Interrupt received, stopping sweep");
                Err(SweepError::Interrupted)
            }
        };

        if self.fleet.live_count() > 0 {
            warn!(
                live = self.fleet.live_count(),
                "Tearing down nodes left by an unfinished point"
            );
            self.fleet.teardown_live().await;
        }
        resources.release().await;

        summary.elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                info!(
                    collected = summary.count(PointStatus::Collected),
                    points = summary.points.len(),
                    elapsed_secs = summary.elapsed.as_secs(),
                    "Sweep complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    error = %e,
                    completed = summary.points.len(),
                    "Sweep aborted"
                );
                Err(e)
            }
        }
    }

    async fn prepare_dirs(&self) -> SweepResult<()> {
        for dir in [
            self.config.output.dir.clone(),
            self.source_dir.join(&self.config.fleet.results_dir),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| SweepError::ResultsDir { path: dir, source })?;
        }
        Ok(())
    }

    async fn run_points(
        &self,
        resources: &SweepResources,
        summary: &mut SweepSummary,
    ) -> SweepResult<()> {
        resources.warm_up().await;
        // Keys left by an earlier run would satisfy the first count early.
        self.collector
            .gateway()
            .flush_all()
            .await
            .map_err(SweepError::Flush)?;

        let total = self.sweep.len();
        for (index, experiment) in self.sweep.iter().enumerate() {
            let span = info_span!(
                "experiment",
                members = experiment.members(),
                members_in_update = experiment.members_in_update(),
                fanout = experiment.fanout(),
                iteration = experiment.iteration(),
            );
            info!(parent: &span, point = index + 1, total, "Starting sweep point");

            let report = self.run_point(resources, experiment).instrument(span).await?;
            summary.points.push(report);
        }
        Ok(())
    }

    /// One sweep point. Only fatal errors are returned.
    async fn run_point(
        &self,
        resources: &SweepResources,
        experiment: Experiment,
    ) -> SweepResult<PointReport> {
        let started = Instant::now();
        let artifact = SweepArtifact::for_experiment(&self.config.output.dir, experiment);

        if self.config.output.skip_existing && artifact.exists() {
            info!(artifact = %artifact.path.display(), "Artifact exists, skipping");
            let mut report = PointReport::new(experiment, PointStatus::Skipped, started.elapsed());
            report.artifact = Some(artifact.path);
            return Ok(report);
        }

        self.injector.inject(&experiment).await?;
        resources.builder().rebuild().await?;

        let block = PortBlock::new(self.config.fleet.base_port, experiment.members()).ok_or(
            SweepError::PortRange {
                base_port: self.config.fleet.base_port,
                members: experiment.members(),
            },
        )?;

        let nodes = match self.fleet.spawn_fleet(block).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %SweepError::from(e), "Sweep point failed, continuing");
                self.flush().await?;
                return Ok(PointReport::new(
                    experiment,
                    PointStatus::SpawnFailed,
                    started.elapsed(),
                ));
            }
        };

        let outcome = self
            .collector
            .await_and_collect(
                block,
                &artifact.path,
                Duration::from_millis(self.config.collect.poll_interval_ms),
                Duration::from_secs(self.config.collect.timeout_secs),
            )
            .await;

        self.fleet.teardown_fleet(&nodes).await;
        self.flush().await?;

        let report = match outcome {
            Ok(CollectOutcome::Collected { records }) => {
                let report =
                    PointReport::collected(experiment, artifact.path, &records, started.elapsed());
                info!(
                    reported = report.reported,
                    malformed = report.malformed,
                    mean_convergence_secs = report.mean_convergence_secs,
                    elapsed_secs = report.elapsed.as_secs(),
                    "Sweep point collected"
                );
                report
            }
            Ok(CollectOutcome::TimedOut { observed, expected }) => {
                let e = SweepError::CollectionTimeout {
                    experiment,
                    observed,
                    expected,
                };
                warn!(error = %e, "Sweep point failed, continuing");
                let mut report =
                    PointReport::new(experiment, PointStatus::TimedOut, started.elapsed());
                report.reported = observed;
                report
            }
            Err(e) => {
                warn!(error = %SweepError::from(e), "Sweep point failed, continuing");
                PointReport::new(experiment, PointStatus::CollectFailed, started.elapsed())
            }
        };
        Ok(report)
    }

    async fn flush(&self) -> SweepResult<()> {
        self.collector
            .gateway()
            .flush_all()
            .await
            .map_err(SweepError::Flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(port: u16, value: Option<&str>) -> ResultRecord {
        ResultRecord {
            port,
            key: ResultRecord::key_for("result", port),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn collected_report_averages_parsable_samples() {
        let experiment = Experiment::new(4, 2, 2, 1).unwrap();
        let records = vec![
            record(8000, Some("8000,2,4,2,5,40,900,2.0")),
            record(8001, Some("8001,2,4,2,6,44,950,4.0")),
            record(8002, Some("garbage")),
            record(8003, None),
        ];

        let report = PointReport::collected(
            experiment,
            PathBuf::from("results/results_4_2_2_1.csv"),
            &records,
            Duration::from_secs(1),
        );

        assert_eq!(report.status, PointStatus::Collected);
        assert_eq!(report.reported, 3);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.mean_convergence_secs, Some(3.0));
    }

    #[test]
    fn collected_report_without_samples_has_no_mean() {
        let experiment = Experiment::new(2, 1, 1, 1).unwrap();
        let report = PointReport::collected(
            experiment,
            PathBuf::from("out.csv"),
            &[record(8000, None), record(8001, None)],
            Duration::ZERO,
        );
        assert_eq!(report.reported, 0);
        assert_eq!(report.mean_convergence_secs, None);
    }

    #[test]
    fn summary_counts_by_status() {
        let experiment = Experiment::new(2, 1, 1, 1).unwrap();
        let summary = SweepSummary {
            points: vec![
                PointReport::new(experiment, PointStatus::Collected, Duration::ZERO),
                PointReport::new(experiment, PointStatus::TimedOut, Duration::ZERO),
                PointReport::new(experiment, PointStatus::Collected, Duration::ZERO),
            ],
            elapsed: Duration::ZERO,
        };
        assert_eq!(summary.count(PointStatus::Collected), 2);
        assert_eq!(summary.count(PointStatus::TimedOut), 1);
        assert_eq!(summary.count(PointStatus::SpawnFailed), 0);
    }
}

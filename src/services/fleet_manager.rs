//! Node fleet lifecycle: chain-topology spawn and bounded parallel teardown.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{FleetSpawnError, RuntimeError, RuntimeResult, TeardownError};
use crate::domain::models::{
    ContainerId, ContainerRole, ContainerSpec, FleetConfig, ManagedContainer, Mount, PortBlock,
};
use crate::domain::ports::ContainerRuntime;
use crate::services::worker_pool::WorkerPool;

/// One node in the join chain: the node on `port` bootstraps via `peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLink {
    pub port: u16,
    pub peer: u16,
}

impl NodeLink {
    /// The seed is the only node whose peer sits above it.
    pub const fn is_seed(&self) -> bool {
        self.peer > self.port
    }
}

/// Join chain over `block`, seed first.
///
/// The seed on `base` points at `base + 1`; every later node `i + 1`
/// points at `i`, so each joiner is introduced by the node just below it.
pub fn chain_topology(block: PortBlock) -> Vec<NodeLink> {
    let mut ports = block.ports();
    let Some(base) = ports.next() else {
        return Vec::new();
    };

    let mut links = Vec::with_capacity(block.len());
    links.push(NodeLink {
        port: base,
        peer: base.saturating_add(1),
    });
    links.extend(block.ports().zip(ports).map(|(peer, port)| NodeLink { port, peer }));
    links
}

/// Outcome of tearing down a set of containers. Never an error by itself.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub requested: usize,
    pub removed: usize,
    pub failures: Vec<TeardownError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Spawns and tears down gossip node containers.
///
/// Every created node is held in a live registry until it is removed, so
/// an interrupted sweep can still clean up after itself.
pub struct FleetManager {
    runtime: Arc<dyn ContainerRuntime>,
    config: FleetConfig,
    root: std::path::PathBuf,
    spawn_pool: WorkerPool,
    teardown_pool: WorkerPool,
    live: Mutex<BTreeMap<ContainerId, ManagedContainer>>,
}

impl FleetManager {
    /// Relative mount sources in `config` are resolved against `root`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: FleetConfig, root: &Path) -> Self {
        Self {
            runtime,
            spawn_pool: WorkerPool::new(config.spawn_workers),
            teardown_pool: WorkerPool::new(config.teardown_workers),
            config,
            root: root.to_path_buf(),
            live: Mutex::new(BTreeMap::new()),
        }
    }

    pub const fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Container spec for one node of the chain.
    pub fn node_spec(&self, link: NodeLink) -> ContainerSpec {
        let address = self.config.bind_address.as_str();
        ContainerSpec::new(self.config.image.clone())
            .with_command([
                self.config.binary.clone(),
                address.to_string(),
                link.port.to_string(),
                address.to_string(),
                link.peer.to_string(),
            ])
            .with_mount(Mount::read_write(
                self.root.join(&self.config.results_dir),
                self.config.results_mount.clone(),
            ))
            .with_mount(Mount::read_only(
                self.root.join(&self.config.build_dir),
                self.config.build_mount.clone(),
            ))
            .with_network_mode(self.config.network_mode.clone())
            .with_working_dir(self.config.working_dir.clone())
    }

    /// Start one node per port in `block`, seed first, the rest in parallel.
    ///
    /// All-or-nothing: if any node fails, every node created by this call
    /// is torn down before the error is returned.
    #[instrument(skip(self), fields(members = block.len(), base_port = block.base()))]
    pub async fn spawn_fleet(
        &self,
        block: PortBlock,
    ) -> Result<Vec<ManagedContainer>, FleetSpawnError> {
        let links = chain_topology(block);
        let requested = links.len();
        let Some((seed, joiners)) = links.split_first() else {
            return Ok(Vec::new());
        };

        info!(requested, "Spawning node fleet");

        // Joiners need the seed running before they bootstrap off the chain.
        let seed_node = match self.spawn_node(*seed).await {
            Ok(node) => node,
            Err(first) => return Err(self.abort_spawn(requested, 1, first).await),
        };

        let mut fleet = Vec::with_capacity(requested);
        fleet.push(seed_node);
        let mut errors = Vec::new();

        for result in self
            .spawn_pool
            .map_unordered(joiners.iter().copied(), |link| self.spawn_node(link))
            .await
        {
            match result {
                Ok(node) => fleet.push(node),
                Err(e) => errors.push(e),
            }
        }

        let failed = errors.len();
        if let Some(first) = errors.into_iter().next() {
            return Err(self.abort_spawn(requested, failed, first).await);
        }

        info!(started = fleet.len(), "Node fleet started");
        Ok(fleet)
    }

    async fn spawn_node(&self, link: NodeLink) -> RuntimeResult<ManagedContainer> {
        let id = self.runtime.create(&self.node_spec(link)).await?;
        let node = ManagedContainer::created(id, ContainerRole::Node);
        self.registry().insert(node.id.clone(), node.clone());

        self.runtime.start(&node.id).await?;
        debug!(
            port = link.port,
            peer = link.peer,
            container = %node.id,
            seed = link.is_seed(),
            "Node started"
        );
        Ok(node)
    }

    async fn abort_spawn(
        &self,
        requested: usize,
        failed: usize,
        first: RuntimeError,
    ) -> FleetSpawnError {
        error!(
            requested,
            failed,
            error = %first,
            "Fleet spawn failed, tearing down partial fleet"
        );
        let report = self.teardown_live().await;
        if !report.is_clean() {
            warn!(
                leftover = report.failures.len(),
                "Partial fleet teardown incomplete"
            );
        }
        FleetSpawnError {
            requested,
            failed,
            first,
        }
    }

    /// Stop and remove `containers` in parallel.
    ///
    /// Failures are logged and reported, never raised. Unless
    /// `force_teardown` is set, a container that fails to stop is not
    /// removed and stays in the live registry.
    #[instrument(skip_all, fields(containers = containers.len()))]
    pub async fn teardown_fleet(&self, containers: &[ManagedContainer]) -> TeardownReport {
        let mut report = TeardownReport {
            requested: containers.len(),
            ..TeardownReport::default()
        };

        for result in self
            .teardown_pool
            .map_unordered(containers.iter(), |node| self.teardown_node(node))
            .await
        {
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(error = %e, "Container teardown failed");
                    report.failures.push(e);
                }
            }
        }

        info!(
            removed = report.removed,
            failed = report.failures.len(),
            "Node fleet torn down"
        );
        report
    }

    /// Tear down every node this manager still considers live.
    pub async fn teardown_live(&self) -> TeardownReport {
        let live: Vec<ManagedContainer> = self.registry().values().cloned().collect();
        if live.is_empty() {
            return TeardownReport::default();
        }
        self.teardown_fleet(&live).await
    }

    pub fn live_count(&self) -> usize {
        self.registry().len()
    }

    async fn teardown_node(&self, node: &ManagedContainer) -> Result<(), TeardownError> {
        let force = self.config.force_teardown;
        let timeout = Duration::from_secs(self.config.stop_timeout_secs);

        if let Err(source) = self.runtime.stop(&node.id, timeout).await {
            if !force {
                return Err(TeardownError::Stop {
                    id: node.id.clone(),
                    source,
                });
            }
            debug!(container = %node.id, error = %source, "Stop failed, forcing removal");
        }

        self.runtime
            .remove(&node.id, self.config.remove_volumes, force)
            .await
            .map_err(|source| TeardownError::Remove {
                id: node.id.clone(),
                source,
            })?;
        self.registry().remove(&node.id);
        Ok(())
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<ContainerId, ManagedContainer>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockContainerRuntime, RuntimeCall};
    use proptest::prelude::*;

    fn manager(runtime: Arc<MockContainerRuntime>) -> FleetManager {
        FleetManager::new(runtime, FleetConfig::default(), Path::new("/work"))
    }

    fn port_of(spec: &ContainerSpec) -> u16 {
        spec.command[2].parse().unwrap()
    }

    #[test]
    fn chain_for_four_members() {
        let links = chain_topology(PortBlock::new(8000, 4).unwrap());
        assert_eq!(
            links,
            vec![
                NodeLink { port: 8000, peer: 8001 },
                NodeLink { port: 8001, peer: 8000 },
                NodeLink { port: 8002, peer: 8001 },
                NodeLink { port: 8003, peer: 8002 },
            ]
        );
        assert!(links[0].is_seed());
        assert!(!links[1].is_seed());
    }

    #[test]
    fn single_member_chain_is_just_the_seed() {
        let links = chain_topology(PortBlock::new(8000, 1).unwrap());
        assert_eq!(links, vec![NodeLink { port: 8000, peer: 8001 }]);
    }

    proptest! {
        #[test]
        fn chain_covers_block_with_one_seed(base in 1024u16..60_000, members in 1u16..256) {
            let block = PortBlock::new(base, members).unwrap();
            let links = chain_topology(block);

            prop_assert_eq!(links.len(), usize::from(members));
            prop_assert_eq!(links.iter().filter(|l| l.is_seed()).count(), 1);
            prop_assert_eq!(links[0].port, base);

            let mut ports: Vec<u16> = links.iter().map(|l| l.port).collect();
            ports.sort_unstable();
            prop_assert_eq!(ports, block.ports().collect::<Vec<_>>());

            for link in links.iter().filter(|l| !l.is_seed()) {
                prop_assert_eq!(link.peer + 1, link.port);
            }
        }
    }

    #[test]
    fn node_spec_follows_command_contract() {
        let fleet = manager(Arc::new(MockContainerRuntime::new()));
        let spec = fleet.node_spec(NodeLink { port: 8003, peer: 8002 });

        assert_eq!(spec.image, "microswim");
        assert_eq!(
            spec.command,
            vec![
                "./build/benchmarks/convergence/convergence",
                "127.0.0.1",
                "8003",
                "127.0.0.1",
                "8002"
            ]
        );
        assert_eq!(
            spec.mounts,
            vec![
                Mount::read_write("/work/results", "/tmp"),
                Mount::read_only("/work/build", "/microswim/build"),
            ]
        );
        assert_eq!(spec.network_mode.as_deref(), Some("host"));
        assert_eq!(spec.working_dir.as_deref(), Some("/microswim"));
    }

    #[tokio::test]
    async fn spawns_seed_before_any_joiner() {
        let runtime = Arc::new(MockContainerRuntime::new());
        let fleet = manager(runtime.clone());

        let nodes = fleet
            .spawn_fleet(PortBlock::new(8000, 8).unwrap())
            .await
            .unwrap();

        assert_eq!(nodes.len(), 8);
        assert_eq!(runtime.start_count(), 8);
        assert_eq!(fleet.live_count(), 8);

        let starts = runtime.started_specs();
        assert_eq!(port_of(&starts[0]), 8000);
        let calls = runtime.calls();
        let first_start = calls
            .iter()
            .position(|c| matches!(c, RuntimeCall::Start(_)))
            .unwrap();
        let creates_before_start = calls[..first_start]
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Create { .. }))
            .count();
        assert_eq!(creates_before_start, 1);
    }

    #[tokio::test]
    async fn spawn_respects_pool_size() {
        let runtime =
            Arc::new(MockContainerRuntime::new().with_latency(Duration::from_millis(5)));
        let config = FleetConfig {
            spawn_workers: 2,
            ..FleetConfig::default()
        };
        let fleet = FleetManager::new(runtime.clone(), config, Path::new("/work"));

        fleet
            .spawn_fleet(PortBlock::new(8000, 10).unwrap())
            .await
            .unwrap();
        assert!(runtime.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn failed_joiner_tears_down_partial_fleet() {
        let runtime = Arc::new(
            MockContainerRuntime::new().fail_start_if(|spec| port_of(spec) == 8005),
        );
        let fleet = manager(runtime.clone());

        let err = fleet
            .spawn_fleet(PortBlock::new(8000, 8).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.requested, 8);
        assert_eq!(err.failed, 1);
        assert!(runtime.existing().is_empty());
        assert_eq!(fleet.live_count(), 0);
    }

    #[tokio::test]
    async fn spawn_error_counts_only_failed_nodes() {
        let runtime = Arc::new(
            MockContainerRuntime::new()
                .fail_start_if(|spec| matches!(port_of(spec), 8002 | 8006)),
        );
        let fleet = manager(runtime.clone());

        let err = fleet
            .spawn_fleet(PortBlock::new(8000, 8).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.requested, 8);
        assert_eq!(err.failed, 2);
        assert!(err.to_string().starts_with("Failed to spawn 2 of 8 node containers"));
        assert!(runtime.existing().is_empty());
    }

    #[tokio::test]
    async fn failed_seed_spawns_nothing_else() {
        let runtime = Arc::new(MockContainerRuntime::new().fail_create_if(|_| true));
        let fleet = manager(runtime.clone());

        let err = fleet
            .spawn_fleet(PortBlock::new(8000, 4).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.failed, 1);
        assert_eq!(runtime.start_count(), 0);
        let creates = runtime
            .calls()
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Create { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn teardown_continues_past_stop_failures() {
        let runtime = Arc::new(
            MockContainerRuntime::new().fail_stop_if(|spec| port_of(spec) == 8001),
        );
        let fleet = manager(runtime.clone());
        let nodes = fleet
            .spawn_fleet(PortBlock::new(8000, 4).unwrap())
            .await
            .unwrap();

        let report = fleet.teardown_fleet(&nodes).await;

        assert_eq!(report.requested, 4);
        assert_eq!(report.removed, 3);
        assert!(matches!(report.failures.as_slice(), [TeardownError::Stop { .. }]));
        assert_eq!(runtime.existing().len(), 1);
        assert_eq!(fleet.live_count(), 1);
    }

    #[tokio::test]
    async fn remove_failure_is_reported_and_siblings_removed() {
        let runtime = Arc::new(
            MockContainerRuntime::new().fail_remove_if(|spec| port_of(spec) == 8002),
        );
        let fleet = manager(runtime.clone());
        let nodes = fleet
            .spawn_fleet(PortBlock::new(8000, 4).unwrap())
            .await
            .unwrap();

        let report = fleet.teardown_fleet(&nodes).await;

        assert_eq!(report.removed, 3);
        assert!(matches!(report.failures.as_slice(), [TeardownError::Remove { .. }]));
        assert_eq!(runtime.existing().len(), 1);
        assert_eq!(fleet.live_count(), 1);
    }

    #[tokio::test]
    async fn forced_teardown_removes_despite_stop_failure() {
        let runtime = Arc::new(MockContainerRuntime::new().fail_stop_if(|_| true));
        let config = FleetConfig {
            force_teardown: true,
            ..FleetConfig::default()
        };
        let fleet = FleetManager::new(runtime.clone(), config, Path::new("/work"));
        let nodes = fleet
            .spawn_fleet(PortBlock::new(8000, 3).unwrap())
            .await
            .unwrap();

        let report = fleet.teardown_fleet(&nodes).await;

        assert!(report.is_clean());
        assert!(runtime.existing().is_empty());
        assert!(runtime.calls().iter().any(|c| matches!(
            c,
            RuntimeCall::Remove { force: true, .. }
        )));
    }

    #[tokio::test]
    async fn teardown_live_clears_registry() {
        let runtime = Arc::new(MockContainerRuntime::new());
        let fleet = manager(runtime.clone());
        fleet
            .spawn_fleet(PortBlock::new(8000, 5).unwrap())
            .await
            .unwrap();

        let report = fleet.teardown_live().await;
        assert_eq!(report.removed, 5);
        assert_eq!(fleet.live_count(), 0);
        assert!(runtime.existing().is_empty());
    }
}

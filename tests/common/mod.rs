//! Common test utilities for integration tests
//!
//! Provides a sweep harness wired to the in-process container runtime and
//! result store, so whole sweeps can run without a container engine.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use swimbench::domain::models::{BenchConfig, ContainerId, ContainerSpec};
use swimbench::infrastructure::mock::{MemoryResultStore, MockContainerRuntime, RuntimeCall};
use swimbench::services::SweepController;
use tempfile::TempDir;

pub const NODE_IMAGE: &str = "microswim";
pub const BUILDER_IMAGE: &str = "microswim-builder";
pub const STORE_IMAGE: &str = "redis:latest";

/// Build configuration header with the three sweep macros plus unrelated lines.
pub const HEADER: &str = "#ifndef MICROSWIM_CUSTOM_CONFIGURATION_H
#define MICROSWIM_CUSTOM_CONFIGURATION_H

#define MAXIMUM_MEMBERS 10
#define MAXIMUM_MEMBERS_IN_AN_UPDATE 6
#define GOSSIP_FANOUT 3
#define SUSPECT_TIMEOUT_MS 3000

#endif
";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Port a node container listens on, read from its command line.
pub fn node_port(spec: &ContainerSpec) -> Option<u16> {
    spec.command.get(2)?.parse().ok()
}

/// Runtime whose node containers publish a result as soon as they start,
/// provided `reports(port)` holds.
pub fn reporting_runtime<F>(store: Arc<MemoryResultStore>, reports: F) -> MockContainerRuntime
where
    F: Fn(u16) -> bool + Send + Sync + 'static,
{
    MockContainerRuntime::new().on_start(move |spec| {
        if spec.image != NODE_IMAGE {
            return;
        }
        if let Some(port) = node_port(spec).filter(|&p| reports(p)) {
            store.insert(
                format!("result:{port}"),
                format!("{port},2,8,3,12,180,8200,1.5"),
            );
        }
    })
}

/// Temp workspace holding the header, the source dir and the results dir.
pub struct Harness {
    pub dir: TempDir,
    pub header: PathBuf,
    pub store: Arc<MemoryResultStore>,
    pub config: BenchConfig,
}

impl Harness {
    pub fn new(
        members: &[u16],
        members_in_update: &[u16],
        fanout: &[u16],
        iterations: u32,
    ) -> Self {
        Self::with_header(HEADER, members, members_in_update, fanout, iterations)
    }

    pub fn with_header(
        header_text: &str,
        members: &[u16],
        members_in_update: &[u16],
        fanout: &[u16],
        iterations: u32,
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let header = dir.path().join("configuration.h");
        std::fs::write(&header, header_text).expect("Failed to write header");

        let mut config = BenchConfig::default();
        config.sweep.members = members.to_vec();
        config.sweep.members_in_update = members_in_update.to_vec();
        config.sweep.fanout = fanout.to_vec();
        config.sweep.iterations = iterations;
        config.output.dir = dir.path().join("results");
        config.store.warmup_ms = 0;
        config.collect.poll_interval_ms = 10;
        config.collect.timeout_secs = 1;

        Self {
            dir,
            header,
            store: Arc::new(MemoryResultStore::new()),
            config,
        }
    }

    pub fn results_dir(&self) -> PathBuf {
        self.config.output.dir.clone()
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.results_dir().join(name)
    }

    pub fn controller(&self, runtime: Arc<MockContainerRuntime>) -> SweepController {
        SweepController::new(
            runtime,
            self.store.clone(),
            self.config.clone(),
            &self.header,
            self.dir.path(),
        )
        .expect("valid sweep")
    }

    pub fn header_text(&self) -> String {
        std::fs::read_to_string(&self.header).expect("Failed to read header")
    }
}

/// Ids of containers created from `image`, in creation order.
///
/// Only meaningful for containers created sequentially, like the builder
/// and the store.
pub fn created_ids(runtime: &MockContainerRuntime, image: &str) -> Vec<ContainerId> {
    runtime
        .calls()
        .iter()
        .filter(|call| matches!(call, RuntimeCall::Create { .. }))
        .enumerate()
        .filter_map(|(index, call)| match call {
            RuntimeCall::Create { image: created, .. } if created == image => {
                Some(ContainerId::new(format!("mock-{:06}", index + 1)))
            }
            _ => None,
        })
        .collect()
}

/// Lines of a text file.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read artifact")
        .lines()
        .map(str::to_string)
        .collect()
}

//! Sweep services, built on the domain ports.

pub mod build_coordinator;
pub mod fleet_manager;
pub mod header_config;
pub mod result_collector;
pub mod result_store_gateway;
pub mod sweep_controller;
pub mod sweep_resources;
pub mod worker_pool;

pub use build_coordinator::BuildCoordinator;
pub use fleet_manager::{chain_topology, FleetManager, NodeLink, TeardownReport};
pub use header_config::{BuildConfigFile, ConfigInjector, ConfigMacro};
pub use result_collector::{CollectOutcome, ResultCollector, WaitOutcome};
pub use result_store_gateway::ResultStoreGateway;
pub use sweep_controller::{PointReport, PointStatus, SweepController, SweepSummary};
pub use sweep_resources::SweepResources;
pub use worker_pool::WorkerPool;

//! swimbench - Parameter-sweep benchmark orchestrator for SWIM gossip clusters
//!
//! For every point of a `members x members_in_update x fanout` sweep, repeated
//! for a number of iterations, swimbench rewrites the build configuration
//! header, rebuilds the gossip binary inside a builder container, launches a
//! chain-joined fleet of node containers, waits for every node to publish its
//! convergence result to a shared key-value store, and dumps the results to
//! one CSV artifact per point.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Sweep points, container specs, results, errors, ports
//! - **Service Layer** (`services`): Injection, build, fleet, collection and the sweep loop
//! - **Infrastructure Layer** (`infrastructure`): Docker and Redis adapters, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swimbench::infrastructure::{DockerCli, RedisStore};
//! use swimbench::{BenchConfig, SweepController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::default();
//!     let store = Arc::new(RedisStore::new(&config.store.url)?);
//!     let controller = SweepController::new(
//!         Arc::new(DockerCli::default()),
//!         store,
//!         config,
//!         "include/configuration.h",
//!         std::env::current_dir()?,
//!     )?;
//!     let summary = controller.run().await?;
//!     println!("{} points", summary.points.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{SweepError, SweepResult};
pub use domain::models::{BenchConfig, Experiment, ParameterSweep, PortBlock, ResultRecord};
pub use domain::ports::{ContainerRuntime, ResultStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{SweepController, SweepSummary, WorkerPool};

//! Infrastructure layer module
//!
//! Adapters that satisfy the domain ports, plus configuration and logging:
//! - `docker_cli`: container runtime driven through the `docker` executable
//! - `redis_store`: result store backed by Redis
//! - `mock`: in-process doubles for both ports
//! - `config`: layered configuration loading
//! - `logging`: tracing subscriber setup

pub mod config;
pub mod docker_cli;
pub mod logging;
pub mod mock;
pub mod redis_store;

pub use docker_cli::DockerCli;
pub use redis_store::RedisStore;

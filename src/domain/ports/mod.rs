//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces for the two external services
//! the orchestrator drives:
//! - ContainerRuntime: create/start/stop/remove/exec of containers
//! - ResultStore: get/keys/flush on the shared key-value store
//!
//! Both services are externally synchronized; implementations must be safe
//! to call from many concurrent futures.

pub mod container_runtime;
pub mod result_store;

pub use container_runtime::ContainerRuntime;
pub use result_store::ResultStore;

//! In-process doubles for the container runtime and result store.
//!
//! Both record every call and accept scripted failures so sweep behavior
//! can be exercised without a container engine or a store server.

mod runtime;
mod store;

pub use runtime::{MockContainerRuntime, RuntimeCall};
pub use store::MemoryResultStore;

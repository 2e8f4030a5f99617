//! Domain layer for the swimbench sweep orchestrator
//!
//! This module contains the sweep data model, the boundary traits the
//! orchestrator drives, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{
    BuildError, CollectError, ExperimentError, FleetSpawnError, InjectionError, RuntimeError,
    StoreError, SweepError, SweepResult, TeardownError,
};

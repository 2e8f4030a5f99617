//! Domain models for parameter sweeps, containers and harvested results.

pub mod config;
pub mod container;
pub mod experiment;
pub mod result;

pub use config::{
    BenchConfig, BuildConfig, CollectConfig, FleetConfig, LoggingConfig, OutputConfig,
    RuntimeConfig, StoreConfig, SweepConfig,
};
pub use container::{ContainerId, ContainerRole, ContainerSpec, ExecOutput, ManagedContainer, Mount};
pub use experiment::{Experiment, ParameterSweep, SweepIter};
pub use result::{ConvergenceSample, PortBlock, ResultRecord, SweepArtifact};

//! Domain errors for the swimbench sweep orchestrator.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::models::{ContainerId, Experiment};

/// Failures at the container runtime boundary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to launch container runtime command `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Container runtime command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Container runtime returned no container id for image {0}")]
    MissingContainerId(String),

    #[error("Unknown container: {0}")]
    UnknownContainer(ContainerId),

    #[error("Container runtime error: {0}")]
    Other(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures at the key-value store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid result store URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Result store connection failed: {0}")]
    Connection(String),

    #[error("Result store command {command} failed: {reason}")]
    Command { command: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() || err.is_connection_dropped() {
            Self::Connection(err.to_string())
        } else {
            Self::Command {
                command: err.code().unwrap_or("redis").to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// A build configuration header could not be rewritten.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("Failed to read build configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write build configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Macro {name} is not defined in {path}")]
    MacroNotFound { name: &'static str, path: PathBuf },

    #[error("Macro {name} in {path} has non-integer value {value:?} (line {line})")]
    NonNumericValue {
        name: &'static str,
        path: PathBuf,
        line: usize,
        value: String,
    },
}

/// The target binary failed to rebuild. Always fatal to the sweep.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build exited with code {exit_code}:\n{stderr}")]
    Failed { exit_code: i64, stderr: String },

    #[error("Failed to run build inside builder container: {0}")]
    Exec(#[source] RuntimeError),
}

/// A node fleet could not be brought up completely.
#[derive(Debug, Error)]
#[error("Failed to spawn {failed} of {requested} node containers; first failure: {first}")]
pub struct FleetSpawnError {
    pub requested: usize,
    pub failed: usize,
    #[source]
    pub first: RuntimeError,
}

/// Polling or harvesting results for a sweep point failed.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Result store unavailable while collecting: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One container could not be stopped or removed.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("Failed to stop container {id}: {source}")]
    Stop {
        id: ContainerId,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to remove container {id}: {source}")]
    Remove {
        id: ContainerId,
        #[source]
        source: RuntimeError,
    },
}

/// An experiment or sweep definition violates its invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExperimentError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("members_in_update ({members_in_update}) exceeds members ({members})")]
    UpdateExceedsMembers { members: u16, members_in_update: u16 },

    #[error("Sweep dimension {0} has no values")]
    EmptyDimension(&'static str),
}

/// Top-level sweep failure.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    ConfigInjection(#[from] InjectionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    FleetSpawn(#[from] FleetSpawnError),

    #[error("Timed out waiting for results of {experiment}: {observed}/{expected} reported")]
    CollectionTimeout {
        experiment: Experiment,
        observed: usize,
        expected: usize,
    },

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("Failed to flush result store between sweep points: {0}")]
    Flush(#[source] StoreError),

    #[error("Failed to acquire {role} container: {source}")]
    Acquire {
        role: &'static str,
        #[source]
        source: RuntimeError,
    },

    #[error("Port block starting at {base_port} cannot hold {members} nodes")]
    PortRange { base_port: u16, members: u16 },

    #[error("Failed to prepare results directory {path}: {source}")]
    ResultsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sweep interrupted")]
    Interrupted,
}

impl SweepError {
    /// Whether this error must end the whole sweep rather than just the
    /// current sweep point.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::FleetSpawn(_) | Self::CollectionTimeout { .. } | Self::Collect(_)
        )
    }
}

pub type SweepResult<T> = Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_level_errors_are_not_fatal() {
        let spawn = SweepError::FleetSpawn(FleetSpawnError {
            requested: 8,
            failed: 1,
            first: RuntimeError::Other("no such image".to_string()),
        });
        let timeout = SweepError::CollectionTimeout {
            experiment: Experiment::new(128, 4, 3, 1).unwrap(),
            observed: 100,
            expected: 128,
        };
        let collect = SweepError::Collect(CollectError::Store(StoreError::Connection(
            "refused".to_string(),
        )));

        assert!(!spawn.is_fatal());
        assert!(!timeout.is_fatal());
        assert!(!collect.is_fatal());
    }

    #[test]
    fn build_and_flush_errors_are_fatal() {
        let build = SweepError::Build(BuildError::Failed {
            exit_code: 2,
            stderr: "error".to_string(),
        });
        let flush = SweepError::Flush(StoreError::Connection("refused".to_string()));

        assert!(build.is_fatal());
        assert!(flush.is_fatal());
        assert!(SweepError::Interrupted.is_fatal());
    }

    #[test]
    fn timeout_message_names_the_sweep_point() {
        let timeout = SweepError::CollectionTimeout {
            experiment: Experiment::new(128, 4, 3, 2).unwrap(),
            observed: 100,
            expected: 128,
        };
        assert_eq!(
            timeout.to_string(),
            "Timed out waiting for results of members=128, updates=4, fanout=3, iteration=2: 100/128 reported"
        );
    }
}

//! Result records published by nodes and the artifacts they are dumped to.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::experiment::Experiment;

/// Contiguous block of node ports `[base, base + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBlock {
    base: u16,
    len: u16,
}

impl PortBlock {
    /// Returns `None` when the block would run past `u16::MAX`.
    pub fn new(base: u16, len: u16) -> Option<Self> {
        if len > 0 {
            base.checked_add(len - 1)?;
        }
        Some(Self { base, len })
    }

    pub const fn base(&self) -> u16 {
        self.base
    }

    pub const fn len(&self) -> usize {
        self.len as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ports in ascending order.
    pub fn ports(&self) -> impl Iterator<Item = u16> + Clone {
        let base = self.base;
        (0..self.len).map(move |offset| base + offset)
    }
}

/// One harvested store entry. `value` is `None` when the node never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub port: u16,
    pub key: String,
    pub value: Option<String>,
}

impl ResultRecord {
    /// Store key for a node port under `prefix`, e.g. `result:8000`.
    pub fn key_for(prefix: &str, port: u16) -> String {
        format!("{prefix}:{port}")
    }

    pub fn sample(&self) -> Option<ConvergenceSample> {
        self.value.as_deref().and_then(|v| v.parse().ok())
    }
}

/// Deterministic artifact location for an experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepArtifact {
    pub experiment: Experiment,
    pub path: PathBuf,
}

impl SweepArtifact {
    /// `<results_dir>/results_<members>_<update>_<fanout>_<iteration>.csv`
    pub fn for_experiment(results_dir: &Path, experiment: Experiment) -> Self {
        Self {
            path: results_dir.join(experiment.artifact_name()),
            experiment,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Convergence measurement written by a node once it has seen every member.
///
/// Wire form: `port,fanout,members,members_in_update,rounds,messages,bytes,seconds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSample {
    pub port: u16,
    pub fanout: u16,
    pub members: u16,
    pub members_in_update: u16,
    pub rounds: u64,
    pub messages: u64,
    pub bytes: u64,
    pub seconds: f64,
}

/// Reason a stored value is not a [`ConvergenceSample`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleParseError(String);

impl fmt::Display for SampleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed convergence sample: {}", self.0)
    }
}

impl std::error::Error for SampleParseError {}

impl FromStr for ConvergenceSample {
    type Err = SampleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if fields.len() != 8 {
            return Err(SampleParseError(format!(
                "expected 8 fields, found {}",
                fields.len()
            )));
        }

        fn field<T: FromStr>(name: &str, raw: &str) -> Result<T, SampleParseError> {
            raw.parse()
                .map_err(|_| SampleParseError(format!("{name}={raw:?}")))
        }

        Ok(Self {
            port: field("port", fields[0])?,
            fanout: field("fanout", fields[1])?,
            members: field("members", fields[2])?,
            members_in_update: field("members_in_update", fields[3])?,
            rounds: field("rounds", fields[4])?,
            messages: field("messages", fields[5])?,
            bytes: field("bytes", fields[6])?,
            seconds: field("seconds", fields[7])?,
        })
    }
}

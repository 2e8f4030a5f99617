//! Sweep points and their reproducible enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ExperimentError;

/// One sweep point plus its repetition index.
///
/// Immutable once constructed; `members_in_update <= members` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Experiment {
    members: u16,
    members_in_update: u16,
    fanout: u16,
    iteration: u32,
}

impl Experiment {
    /// Validate and build a sweep point.
    pub fn new(
        members: u16,
        members_in_update: u16,
        fanout: u16,
        iteration: u32,
    ) -> Result<Self, ExperimentError> {
        if members == 0 {
            return Err(ExperimentError::Zero { field: "members" });
        }
        if members_in_update == 0 {
            return Err(ExperimentError::Zero {
                field: "members_in_update",
            });
        }
        if fanout == 0 {
            return Err(ExperimentError::Zero { field: "fanout" });
        }
        if iteration == 0 {
            return Err(ExperimentError::Zero { field: "iteration" });
        }
        if members_in_update > members {
            return Err(ExperimentError::UpdateExceedsMembers {
                members,
                members_in_update,
            });
        }

        Ok(Self {
            members,
            members_in_update,
            fanout,
            iteration,
        })
    }

    pub const fn members(&self) -> u16 {
        self.members
    }

    pub const fn members_in_update(&self) -> u16 {
        self.members_in_update
    }

    pub const fn fanout(&self) -> u16 {
        self.fanout
    }

    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Artifact file name, e.g. `results_8_3_2_1.csv`.
    pub fn artifact_name(&self) -> String {
        format!(
            "results_{}_{}_{}_{}.csv",
            self.members, self.members_in_update, self.fanout, self.iteration
        )
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "members={}, updates={}, fanout={}, iteration={}",
            self.members, self.members_in_update, self.fanout, self.iteration
        )
    }
}

/// The dimension value-sets of a campaign plus its repetition count.
///
/// Expands lazily into [`Experiment`]s. The outer loop is the iteration;
/// the inner loop is the Cartesian product `members x members_in_update x
/// fanout` in the order the values were given. The order is stable across
/// runs so artifact names map back to sweep points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSweep {
    members: Vec<u16>,
    members_in_update: Vec<u16>,
    fanout: Vec<u16>,
    iterations: u32,
}

impl ParameterSweep {
    /// Build a sweep, rejecting any combination that would not form a
    /// valid [`Experiment`].
    pub fn new(
        members: Vec<u16>,
        members_in_update: Vec<u16>,
        fanout: Vec<u16>,
        iterations: u32,
    ) -> Result<Self, ExperimentError> {
        if members.is_empty() {
            return Err(ExperimentError::EmptyDimension("members"));
        }
        if members_in_update.is_empty() {
            return Err(ExperimentError::EmptyDimension("members_in_update"));
        }
        if fanout.is_empty() {
            return Err(ExperimentError::EmptyDimension("fanout"));
        }
        if iterations == 0 {
            return Err(ExperimentError::Zero {
                field: "iterations",
            });
        }

        for &m in &members {
            for &u in &members_in_update {
                for &f in &fanout {
                    Experiment::new(m, u, f, 1)?;
                }
            }
        }

        Ok(Self {
            members,
            members_in_update,
            fanout,
            iterations,
        })
    }

    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Number of sweep points per iteration.
    pub fn points_per_iteration(&self) -> usize {
        self.members.len() * self.members_in_update.len() * self.fanout.len()
    }

    /// Total number of experiments across all iterations.
    pub fn len(&self) -> usize {
        self.points_per_iteration() * self.iterations as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest member count of any point, which sizes the port block.
    pub fn max_members(&self) -> u16 {
        self.members.iter().copied().max().unwrap_or(0)
    }

    pub fn iter(&self) -> SweepIter<'_> {
        SweepIter {
            sweep: self,
            cursor: 0,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSweep {
    type Item = Experiment;
    type IntoIter = SweepIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`ParameterSweep`].
///
/// The cursor is decoded into dimension indices on each step, last
/// dimension varying fastest.
#[derive(Debug, Clone)]
pub struct SweepIter<'a> {
    sweep: &'a ParameterSweep,
    cursor: usize,
}

impl Iterator for SweepIter<'_> {
    type Item = Experiment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.sweep.len() {
            return None;
        }

        let s = self.sweep;
        let per_iteration = s.points_per_iteration();
        let iteration = self.cursor / per_iteration;
        let mut rest = self.cursor % per_iteration;

        let f = rest % s.fanout.len();
        rest /= s.fanout.len();
        let u = rest % s.members_in_update.len();
        let m = rest / s.members_in_update.len();

        self.cursor += 1;

        // Every combination was validated in ParameterSweep::new.
        Some(Experiment {
            members: s.members[m],
            members_in_update: s.members_in_update[u],
            fanout: s.fanout[f],
            iteration: u32::try_from(iteration).map_or(u32::MAX, |i| i + 1),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sweep.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SweepIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_rejects_zero_fields() {
        assert_eq!(
            Experiment::new(0, 1, 1, 1),
            Err(ExperimentError::Zero { field: "members" })
        );
        assert_eq!(
            Experiment::new(8, 2, 0, 1),
            Err(ExperimentError::Zero { field: "fanout" })
        );
        assert_eq!(
            Experiment::new(8, 2, 2, 0),
            Err(ExperimentError::Zero { field: "iteration" })
        );
    }

    #[test]
    fn experiment_rejects_update_larger_than_members() {
        assert_eq!(
            Experiment::new(4, 5, 2, 1),
            Err(ExperimentError::UpdateExceedsMembers {
                members: 4,
                members_in_update: 5
            })
        );
        assert!(Experiment::new(4, 4, 2, 1).is_ok());
    }

    #[test]
    fn artifact_name_encodes_all_dimensions() {
        let exp = Experiment::new(8, 3, 2, 1).unwrap();
        assert_eq!(exp.artifact_name(), "results_8_3_2_1.csv");
        assert_eq!(
            exp.to_string(),
            "members=8, updates=3, fanout=2, iteration=1"
        );
    }

    #[test]
    fn sweep_enumerates_iteration_outermost() {
        let sweep = ParameterSweep::new(vec![8, 16], vec![2, 3], vec![2, 4], 2).unwrap();
        let points: Vec<_> = sweep
            .iter()
            .map(|e| (e.iteration(), e.members(), e.members_in_update(), e.fanout()))
            .collect();

        assert_eq!(points.len(), 16);
        assert_eq!(
            &points[..8],
            &[
                (1, 8, 2, 2),
                (1, 8, 2, 4),
                (1, 8, 3, 2),
                (1, 8, 3, 4),
                (1, 16, 2, 2),
                (1, 16, 2, 4),
                (1, 16, 3, 2),
                (1, 16, 3, 4),
            ]
        );
        assert!(points[8..].iter().all(|p| p.0 == 2));
        assert_eq!(points[8], (2, 8, 2, 2));
    }

    #[test]
    fn sweep_order_is_stable() {
        let sweep = ParameterSweep::new(vec![8, 16, 32], vec![2, 3, 4], vec![2, 3, 4], 3).unwrap();
        let first: Vec<_> = sweep.iter().collect();
        let second: Vec<_> = sweep.iter().collect();
        assert_eq!(first, second);
        assert_eq!(sweep.iter().len(), 81);
    }

    #[test]
    fn sweep_rejects_invalid_combinations() {
        assert_eq!(
            ParameterSweep::new(vec![2, 8], vec![3], vec![2], 1),
            Err(ExperimentError::UpdateExceedsMembers {
                members: 2,
                members_in_update: 3
            })
        );
        assert_eq!(
            ParameterSweep::new(vec![], vec![3], vec![2], 1),
            Err(ExperimentError::EmptyDimension("members"))
        );
        assert_eq!(
            ParameterSweep::new(vec![8], vec![3], vec![2], 0),
            Err(ExperimentError::Zero {
                field: "iterations"
            })
        );
    }

    #[test]
    fn max_members_sizes_port_block() {
        let sweep = ParameterSweep::new(vec![16, 128, 8], vec![2], vec![2], 1).unwrap();
        assert_eq!(sweep.max_members(), 128);
    }
}

//! Clone strategy selection.
//!
//! Picks how much history to retrieve and how the clone command is shaped
//! for a given [`Target`]. Shallow is the default; the compatibility flag
//! in [`Config`] switches to full history.

use crate::config::Config;
use crate::reference::{RefSpec, Target};

/// How much history the initial clone retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// A single commit per fetched branch.
    Shallow,
    /// Complete history.
    Full,
}

/// Deepen rounds used to reach a commit missing from a shallow clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepenSchedule {
    pub initial: u32,
    pub rounds: u32,
}

impl DeepenSchedule {
    /// Commits added per round: `initial`, `2 * initial`, `4 * initial`, ...
    pub fn steps(&self) -> impl Iterator<Item = u32> {
        let initial = self.initial.max(1);
        (0..self.rounds).map(move |round| initial.saturating_mul(1u32 << round.min(31)))
    }
}

/// The decision handed to the repository fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneStrategy {
    pub depth: Depth,
    /// Branch or tag passed to `git clone --branch`.
    pub branch: Option<String>,
    /// Fetch every branch tip, not only the default branch. Used when
    /// hunting a commit in shallow history.
    pub all_branches: bool,
    pub deepen: DeepenSchedule,
    /// Subtree to materialize sparsely.
    pub sparse_subdir: Option<String>,
}

impl CloneStrategy {
    pub fn is_shallow(&self) -> bool {
        self.depth == Depth::Shallow
    }
}

/// Decide the clone strategy for `target`.
///
/// Sparse checkout is only requested outside project mode: the scanner needs
/// to see every top-level directory.
pub fn select(target: &Target, config: &Config, project_mode: bool) -> CloneStrategy {
    let depth = if config.full_history {
        Depth::Full
    } else {
        Depth::Shallow
    };

    let branch = match target.ref_spec() {
        RefSpec::NamedRef(name) => Some(name.clone()),
        RefSpec::Unspecified | RefSpec::Commit(_) => None,
    };

    let all_branches = depth == Depth::Shallow && matches!(target.ref_spec(), RefSpec::Commit(_));

    CloneStrategy {
        depth,
        branch,
        all_branches,
        deepen: DeepenSchedule {
            initial: config.initial_deepen,
            rounds: config.deepen_limit,
        },
        sparse_subdir: if project_mode {
            None
        } else {
            target.subdir().map(str::to_string)
        },
    }
}

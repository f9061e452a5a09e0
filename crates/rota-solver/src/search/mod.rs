//! Search over a [`ConstraintModel`].
//!
//! [`SolverBackend`] is the seam between the model and whatever searches it.
//! Two backends are provided:
//! - `CpSearch` (feature `cp`): the Pumpkin constraint programming solver,
//!   minimizing tier by tier
//! - [`PortfolioSearch`]: several depth-first branch-and-bound workers with
//!   different branching orders sharing one incumbent, bounded by a
//!   wall-clock limit

mod bnb;
#[cfg(feature = "cp")]
mod cp;
mod incumbent;
mod portfolio;
mod propagate;

#[cfg(feature = "cp")]
pub use cp::CpSearch;
pub use incumbent::{Incumbent, SharedIncumbent};
pub use portfolio::PortfolioSearch;

use crate::model::ConstraintModel;
use crate::ModelError;
use std::fmt;
use std::time::Duration;

/// Terminal state of a search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// Best solution proven optimal
    Optimal,
    /// Time ran out with a solution in hand
    Feasible,
    /// No assignment satisfies the hard constraints
    Infeasible,
    /// Time ran out before any solution was found
    Unknown,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchStatus::Optimal => "OPTIMAL",
            SearchStatus::Feasible => "FEASIBLE",
            SearchStatus::Infeasible => "INFEASIBLE",
            SearchStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub time_limit: Duration,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    /// Improving solutions installed
    pub solutions: u64,
    pub workers: usize,
    pub wall_time: Duration,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Decision values of the best solution, when there is one
    pub values: Option<Vec<bool>>,
    pub objective: Option<i64>,
    pub stats: SearchStats,
}

/// Something that can minimize a [`ConstraintModel`]
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        model: &ConstraintModel,
        limits: &SearchLimits,
    ) -> Result<SearchOutcome, ModelError>;
}

//! Solve port for the allocation programs.
//!
//! The port isolates the formulation (a [`ModelSpec`]) from the solving
//! engine: any backend that can honor the variable kinds, linear rows, and
//! exponential linkages can sit behind [`Solver`]. The crate ships one
//! backend, [`HighsSolver`].

use std::time::Duration;

use thiserror::Error;

use crate::model::{ModelSpec, VarId};

mod highs;

pub use highs::HighsSolver;

/// Wall-clock and optimality-gap bounds for one solve call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveLimits {
    /// Maximum wall-clock time before the backend must stop.
    pub time_limit: Option<Duration>,
    /// Relative MIP gap at which the backend may stop and still report the
    /// incumbent as optimal.
    pub mip_gap: Option<f64>,
}

/// A point returned by a backend, in the spec's column order.
#[derive(Debug, Clone)]
pub struct Solution {
    values: Vec<f64>,
    objective: f64,
}

impl Solution {
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Self { values, objective }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Objective value at this point, offset included.
    pub fn objective(&self) -> f64 {
        self.objective
    }
}

/// Successful solve outcomes.
///
/// A result is labeled [`Optimal`](Self::Optimal) only when the backend
/// proved optimality (within any configured gap); a feasible incumbent
/// surfaced at a limit is explicitly [`TimeLimited`](Self::TimeLimited).
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Optimal(Solution),
    TimeLimited(Solution),
}

impl SolveOutcome {
    pub fn solution(&self) -> &Solution {
        match self {
            SolveOutcome::Optimal(s) | SolveOutcome::TimeLimited(s) => s,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveOutcome::Optimal(_))
    }
}

/// Failures at the solve boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    /// The constraints admit no feasible integer solution. Fatal to the
    /// request; retrying cannot help.
    #[error("model admits no feasible integer solution")]
    Infeasible,

    /// A limit was reached before any feasible solution was found.
    /// Transient: retrying with relaxed limits may succeed.
    #[error("solve limit reached before any feasible solution was found")]
    Timeout,

    /// The backend failed for reasons unrelated to the model's feasibility.
    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// Integer/nonlinear program solver.
///
/// Implementations wrap a specific engine and must be thread-safe: distinct
/// scenario runs may solve concurrently.
///
/// # Contract
///
/// - Never return an `Optimal` outcome whose optimality the engine did not
///   prove
/// - Never silently round an infeasible instance to a near-feasible point
/// - Honor the [`ExpLink`](crate::model::ExpLink) stepped-domain contract
///   exactly (no linearized approximation of the exponential)
pub trait Solver: Send + Sync {
    /// Returns the backend name for logging.
    fn name(&self) -> &'static str;

    /// Solves `model` (maximization) under `limits`.
    fn solve(&self, model: &ModelSpec, limits: &SolveLimits) -> Result<SolveOutcome, SolveError>;
}

use thiserror::Error;

use crate::ScenarioId;

/// User-visible failure taxonomy of an optimization run.
///
/// Every variant except [`UnknownScenario`](Self::UnknownScenario) carries a
/// human-readable run context ("scenario 2 (Armenia-Russia)", "robust (all
/// scenarios)"). Lower-level store, geometry, and solver errors are always
/// reclassified into one of these at the planner boundary; there is no
/// silent fallback to a default allocation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    /// The requested scenario id does not exist. Fatal to the request.
    #[error("scenario {0} does not exist")]
    UnknownScenario(ScenarioId),

    /// The constraints admit no integer solution. Fatal; never rounded to a
    /// near-feasible guess.
    #[error("{context}: allocation constraints admit no feasible solution")]
    Infeasible { context: String },

    /// A solve limit was hit before any feasible allocation was found.
    /// Transient; a retry with relaxed limits may succeed.
    #[error("{context}: solve limit reached before a feasible allocation was found")]
    SolverTimeout { context: String },

    /// The solver backend failed. Transient.
    #[error("{context}: solver failure: {message}")]
    Solver { context: String, message: String },

    /// Input data failed validation (dangling references, invalid
    /// coordinates, missing robust probabilities). Fatal; the run is blocked
    /// rather than rows being dropped.
    #[error("{context}: inconsistent input data: {message}")]
    DataInconsistency { context: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_run_context() {
        let e = PlanError::Infeasible {
            context: "scenario 3 (Coalition)".into(),
        };
        assert_eq!(
            e.to_string(),
            "scenario 3 (Coalition): allocation constraints admit no feasible solution"
        );

        let e = PlanError::DataInconsistency {
            context: "robust (all scenarios)".into(),
            message: "scenario 2 references missing target 17".into(),
        };
        assert!(e.to_string().contains("robust (all scenarios)"));
        assert!(e.to_string().contains("missing target 17"));
    }
}

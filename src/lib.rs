//! shieldopt - scenario-weighted strategic shield allocation
//!
//! An integer-programming library that places a scarce, typed inventory of
//! interceptor/strike resources across fixed sites to maximize a
//! priority-weighted coverage objective, either for one adversarial scenario
//! or robustly across several scenarios at once.

pub mod coverage;
pub mod geodesy;
pub mod model;
pub mod planner;
pub mod results;
pub mod solver;
pub mod store;

// Re-export the run surface for ergonomic use
pub use planner::{PlanError, Planner, RunReport, RunStatus};

/// Identifier type for deployment sites.
pub type SiteId = u32;

/// Identifier type for resource (missile) types.
pub type TypeId = u32;

/// Identifier type for targets.
pub type TargetId = u32;

/// Identifier type for scenarios. Ordinary scenario ids are positive;
/// zero is reserved (see [`ROBUST_KEY`]).
pub type ScenarioId = u32;

/// Key under which allocation results are persisted: a scenario id, or
/// [`ROBUST_KEY`] for the cross-scenario solution.
pub type ScenarioKey = u32;

/// Reserved result key for the robust (cross-scenario) allocation.
pub const ROBUST_KEY: ScenarioKey = 0;

/// Identifier attached to each optimization run.
pub type RunId = uuid::Uuid;

/// Generates a new unique run identifier (UUID v4).
pub fn generate_run_id() -> RunId {
    uuid::Uuid::new_v4()
}

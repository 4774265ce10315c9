//! Run orchestration: snapshot, model build, solve, persist.
//!
//! A run is a one-shot synchronous computation over a snapshot of the data
//! store taken at run start. The planner holds the solve port, the objective
//! weights, and the solve limits; `run_scenario` and `run_robust` are the
//! invocation surface consumed by outer layers.

use std::collections::BTreeMap;

use tracing::{info, warn};

mod error;

pub use error::PlanError;

use crate::geodesy::DistanceMatrix;
use crate::model::{
    build_robust_model, build_scenario_model, evaluate_allocation, evaluate_robust,
    AllocationGrid, ModelSpec, ModelWeights,
};
use crate::results::{AllocationRow, ResultStore};
use crate::solver::{HighsSolver, SolveError, SolveLimits, SolveOutcome, Solver};
use crate::store::{DataStore, StoreError, Target};
use crate::{generate_run_id, RunId, ScenarioId, ScenarioKey, ROBUST_KEY};

/// How a run's solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The solver proved optimality (within any configured gap).
    Optimal,
    /// A time limit was hit; the reported allocation is feasible but its
    /// optimality is unproven.
    TimeLimited,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub scenario_key: ScenarioKey,
    pub status: RunStatus,
    /// Objective value recomputed from the integer allocation via the
    /// closed-form formula, not echoed from the solver.
    pub objective: f64,
    pub total_units: u32,
    /// Positive-unit rows, in (site id, type id) order.
    pub rows: Vec<AllocationRow>,
}

/// Invocation surface for allocation runs.
///
/// Generic over the solve port so the formulation can be exercised against
/// any backend; defaults to [`HighsSolver`].
///
/// # Examples
///
/// ```
/// use shieldopt::planner::Planner;
/// use shieldopt::results::ResultStore;
/// use shieldopt::store::{DataStore, ResourceType, Scenario, Site, Target};
///
/// let mut data = DataStore::new();
/// data.add_site(Site {
///     id: 1, name: "Alpha".into(), lat: 38.0, lon: 23.7, capacity: 3, priority: 1.0,
/// }).unwrap();
/// data.add_resource_type(ResourceType {
///     id: 1, name: "SR-1".into(), range_km: 2_000.0,
///     warhead_multiplier: 1.0, accuracy_multiplier: 1.0, total_stock: 3,
/// }).unwrap();
/// data.add_scenario(Scenario { id: 1, name: "Northern".into(), probability: None }).unwrap();
/// data.add_target(Target {
///     id: 10, name: "T-10".into(), lat: 39.5, lon: 24.2, priority: 2.0,
/// }).unwrap();
/// data.add_scenario_target(1, 10).unwrap();
///
/// let results = ResultStore::new();
/// let report = Planner::new().run_scenario(&data, &results, 1).unwrap();
///
/// // The whole stock fits at the one site, and the result is persisted
/// // under the scenario key.
/// assert_eq!(report.total_units, 3);
/// assert_eq!(results.rows_for_key(1), report.rows);
/// ```
#[derive(Debug, Clone)]
pub struct Planner<S: Solver = HighsSolver> {
    solver: S,
    weights: ModelWeights,
    limits: SolveLimits,
}

impl Planner<HighsSolver> {
    pub fn new() -> Self {
        Self::with_solver(HighsSolver::new())
    }
}

impl Default for Planner<HighsSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Solver> Planner<S> {
    pub fn with_solver(solver: S) -> Self {
        Self {
            solver,
            weights: ModelWeights::default(),
            limits: SolveLimits::default(),
        }
    }

    /// Replaces the objective scale constants.
    pub fn with_weights(mut self, weights: ModelWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Replaces the wall-clock/gap limits applied to every solve.
    pub fn with_limits(mut self, limits: SolveLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Optimizes one scenario and replaces its stored allocation.
    ///
    /// # Errors
    ///
    /// See [`PlanError`]; the scenario id must exist, the scenario's data
    /// must validate, and the model must be feasible.
    pub fn run_scenario(
        &self,
        data: &DataStore,
        results: &ResultStore,
        scenario_id: ScenarioId,
    ) -> Result<RunReport, PlanError> {
        let view = data
            .scenario_view(scenario_id)
            .map_err(|e| classify_store_error(e, &format!("scenario {scenario_id}")))?;
        let context = format!("scenario {} ({})", scenario_id, view.scenario_name);

        // Exclusive token for this key: a concurrent rerun of the same
        // scenario waits here instead of racing the final replace.
        let _guard = results.begin_run(scenario_id);

        let distances =
            DistanceMatrix::compute(&view.sites, &view.targets).map_err(|e| {
                PlanError::DataInconsistency {
                    context: context.clone(),
                    message: e.to_string(),
                }
            })?;

        let run_id = generate_run_id();
        info!(
            %run_id,
            scenario = scenario_id,
            sites = view.sites.len(),
            targets = view.targets.len(),
            "building allocation model"
        );

        let model = build_scenario_model(&view, &distances, &self.weights);
        let outcome = self.solve(&model.spec, &context)?;
        let alloc = model.extract_allocation(outcome.solution().values());
        let objective = evaluate_allocation(&view, &distances, &self.weights, &alloc);

        self.finish(results, scenario_id, run_id, &outcome, objective, alloc, context)
    }

    /// Optimizes one shared allocation across every stored scenario,
    /// weighted by scenario probability, and replaces the result stored
    /// under [`ROBUST_KEY`].
    pub fn run_robust(
        &self,
        data: &DataStore,
        results: &ResultStore,
    ) -> Result<RunReport, PlanError> {
        let context = "robust (all scenarios)".to_string();
        let views = data
            .robust_views()
            .map_err(|e| classify_store_error(e, &context))?;

        let _guard = results.begin_run(ROBUST_KEY);

        let sites = data.site_catalog();
        let types = data.type_catalog();
        // Every target any scenario can touch, deduplicated by id.
        let targets: Vec<Target> = views
            .iter()
            .flat_map(|v| v.targets.iter().cloned())
            .map(|t| (t.id, t))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();

        let distances = DistanceMatrix::compute(&sites, &targets).map_err(|e| {
            PlanError::DataInconsistency {
                context: context.clone(),
                message: e.to_string(),
            }
        })?;

        let run_id = generate_run_id();
        info!(
            %run_id,
            scenarios = views.len(),
            sites = sites.len(),
            targets = targets.len(),
            "building robust allocation model"
        );

        let model = build_robust_model(&sites, &types, &views, &distances, &self.weights);
        let outcome = self.solve(&model.spec, &context)?;
        let alloc = model.extract_allocation(outcome.solution().values());
        let objective = evaluate_robust(&views, &distances, &self.weights, &alloc);

        self.finish(results, ROBUST_KEY, run_id, &outcome, objective, alloc, context)
    }

    fn solve(&self, spec: &ModelSpec, context: &str) -> Result<SolveOutcome, PlanError> {
        match self.solver.solve(spec, &self.limits) {
            Ok(outcome) => {
                if !outcome.is_optimal() {
                    warn!(context, "time limit hit; reporting best known feasible allocation");
                }
                Ok(outcome)
            }
            Err(SolveError::Infeasible) => Err(PlanError::Infeasible {
                context: context.to_string(),
            }),
            Err(SolveError::Timeout) => Err(PlanError::SolverTimeout {
                context: context.to_string(),
            }),
            Err(SolveError::Backend(message)) => Err(PlanError::Solver {
                context: context.to_string(),
                message,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        results: &ResultStore,
        key: ScenarioKey,
        run_id: RunId,
        outcome: &SolveOutcome,
        objective: f64,
        alloc: AllocationGrid,
        context: String,
    ) -> Result<RunReport, PlanError> {
        let rows: Vec<AllocationRow> = alloc
            .iter()
            .map(|(&(site_id, type_id), &allocated)| AllocationRow {
                scenario_key: key,
                site_id,
                type_id,
                allocated,
            })
            .collect();
        let total_units = rows.iter().map(|r| r.allocated).sum();

        results
            .replace_for_key(key, rows.clone())
            .map_err(|e| PlanError::DataInconsistency {
                context: context.clone(),
                message: e.to_string(),
            })?;

        let status = if outcome.is_optimal() {
            RunStatus::Optimal
        } else {
            RunStatus::TimeLimited
        };
        info!(%run_id, key, objective, total_units, ?status, "allocation stored");

        Ok(RunReport {
            run_id,
            scenario_key: key,
            status,
            objective,
            total_units,
            rows,
        })
    }
}

fn classify_store_error(err: StoreError, context: &str) -> PlanError {
    match err {
        StoreError::UnknownScenario(id) => PlanError::UnknownScenario(id),
        other => PlanError::DataInconsistency {
            context: context.to_string(),
            message: other.to_string(),
        },
    }
}

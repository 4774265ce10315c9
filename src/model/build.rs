//! Pure builders for the single-scenario and robust allocation programs.
//!
//! Given immutable scenario snapshots and a distance matrix, these produce a
//! complete [`ModelSpec`]: decision variables, capacity/stock/presence
//! constraints, and the log/exp coverage and fortification linkages, without
//! touching any solver state. [`evaluate_allocation`] is the closed-form
//! counterpart of the objective, usable as an independent oracle.

use std::collections::{BTreeMap, HashMap};

use crate::coverage::{self, SaturatingCurve};
use crate::geodesy::DistanceMatrix;
use crate::store::{ResourceType, ScenarioView, Site};
use crate::{SiteId, TypeId};

use super::{LinExpr, ModelSpec, ModelWeights, VarId, VarKind};

/// Integer allocation keyed by (site, type), in deterministic key order.
pub type AllocationGrid = BTreeMap<(SiteId, TypeId), u32>;

/// A built program together with the map back from allocation variables to
/// (site, type) pairs.
#[derive(Debug, Clone)]
pub struct AllocationModel {
    pub spec: ModelSpec,
    x: Vec<(SiteId, TypeId, VarId)>,
}

impl AllocationModel {
    /// The shared allocation variables in (site, type) declaration order.
    pub fn allocation_vars(&self) -> &[(SiteId, TypeId, VarId)] {
        &self.x
    }

    /// Reads the integer allocation out of a solver column-value vector,
    /// dropping zero entries.
    pub fn extract_allocation(&self, values: &[f64]) -> AllocationGrid {
        let mut grid = AllocationGrid::new();
        for &(site, ty, var) in &self.x {
            let units = values[var.index()].round().max(0.0) as u32;
            if units > 0 {
                grid.insert((site, ty), units);
            }
        }
        grid
    }
}

/// Builds the integer program for a single scenario: the view's
/// participating sites and that scenario's targets only.
pub fn build_scenario_model(
    view: &ScenarioView,
    distances: &DistanceMatrix,
    weights: &ModelWeights,
) -> AllocationModel {
    let mut spec = ModelSpec::new();
    let x = add_allocation_variables(&mut spec, &view.sites, &view.types);
    add_inventory_constraints(&mut spec, &view.sites, &view.types, &x);

    let lookup = var_lookup(&x);
    add_scenario_terms(&mut spec, view, distances, weights, &lookup, 1.0, "");

    AllocationModel { spec, x }
}

/// Builds the robust program: one shared allocation over the *full* site
/// catalog, with per-scenario coverage/defense linkages weighted by scenario
/// probability.
///
/// A site excluded from some scenario still holds its shared-allocation
/// variables (and consumes capacity and stock) but contributes no coverage or
/// defense term to that scenario. Views lacking a probability weigh in at a
/// neutral 1.0; [`DataStore::robust_views`](crate::store::DataStore::robust_views)
/// rejects such views before a run gets this far.
pub fn build_robust_model(
    sites: &[Site],
    types: &[ResourceType],
    views: &[ScenarioView],
    distances: &DistanceMatrix,
    weights: &ModelWeights,
) -> AllocationModel {
    let mut spec = ModelSpec::new();
    let x = add_allocation_variables(&mut spec, sites, types);
    add_inventory_constraints(&mut spec, sites, types, &x);

    let lookup = var_lookup(&x);
    for view in views {
        let prob = view.probability.unwrap_or(1.0);
        let tag = format!("s{}:", view.scenario_id);
        add_scenario_terms(&mut spec, view, distances, weights, &lookup, prob, &tag);
    }

    AllocationModel { spec, x }
}

/// One integer variable per (site, type), bounded by the tighter of the
/// site's capacity and the type's stock.
fn add_allocation_variables(
    spec: &mut ModelSpec,
    sites: &[Site],
    types: &[ResourceType],
) -> Vec<(SiteId, TypeId, VarId)> {
    let mut x = Vec::with_capacity(sites.len() * types.len());
    for site in sites {
        for ty in types {
            let ub = f64::from(site.capacity.min(ty.total_stock));
            let var = spec.add_variable(
                format!("x[{},{}]", site.id, ty.id),
                VarKind::Integer { lb: 0.0, ub },
            );
            x.push((site.id, ty.id, var));
        }
    }
    x
}

/// Capacity and minimum-presence rows per site, stock rows per type.
fn add_inventory_constraints(
    spec: &mut ModelSpec,
    sites: &[Site],
    types: &[ResourceType],
    x: &[(SiteId, TypeId, VarId)],
) {
    for site in sites {
        let mut expr = LinExpr::new();
        for &(s, _, var) in x.iter().filter(|&&(s, _, _)| s == site.id) {
            debug_assert_eq!(s, site.id);
            expr.push(var, 1.0);
        }
        spec.add_constraint(
            format!("capacity[{}]", site.id),
            expr.clone(),
            f64::NEG_INFINITY,
            f64::from(site.capacity),
        );
        // Every active site hosts at least one unit of something.
        spec.add_constraint(format!("presence[{}]", site.id), expr, 1.0, f64::INFINITY);
    }

    for ty in types {
        let mut expr = LinExpr::new();
        for &(_, t, var) in x.iter().filter(|&&(_, t, _)| t == ty.id) {
            debug_assert_eq!(t, ty.id);
            expr.push(var, 1.0);
        }
        spec.add_constraint(
            format!("stock[{}]", ty.id),
            expr,
            f64::NEG_INFINITY,
            f64::from(ty.total_stock),
        );
    }
}

fn var_lookup(x: &[(SiteId, TypeId, VarId)]) -> HashMap<(SiteId, TypeId), VarId> {
    x.iter().map(|&(s, t, var)| ((s, t), var)).collect()
}

/// Coverage linkage per (target, type) and defense linkage per (site, type)
/// for one scenario, weighted by `prob`.
///
/// Only the view's participating sites enter the linkages; in the robust
/// model the lookup spans the full catalog and the view restricts it.
fn add_scenario_terms(
    spec: &mut ModelSpec,
    view: &ScenarioView,
    distances: &DistanceMatrix,
    weights: &ModelWeights,
    lookup: &HashMap<(SiteId, TypeId), VarId>,
    prob: f64,
    tag: &str,
) {
    let attack = coverage::ATTACK;
    let defense = coverage::DEFENSE;

    for target in &view.targets {
        for ty in &view.types {
            // Sites whose distance to this target is within the type's range.
            let reachable: Vec<&Site> = view
                .sites
                .iter()
                .filter(|site| {
                    distances
                        .km(site.id, target.id)
                        .is_some_and(|d| d <= ty.range_km)
                })
                .collect();

            let reach_capacity: u64 = reachable.iter().map(|s| u64::from(s.capacity)).sum();
            let max_units = u64::from(ty.total_stock).min(reach_capacity) as u32;

            let (t_var, y_var) = add_saturation_pair(
                spec,
                &format!("{tag}cov[{},{}]", target.id, ty.id),
                attack,
                max_units,
            );

            let mut expr = LinExpr::new();
            expr.push(t_var, 1.0);
            if reachable.is_empty() {
                // Nothing can reach this target with this type: pin the
                // log-scale variable to zero coverage.
                spec.add_constraint(
                    format!("{tag}link_cov[{},{}]", target.id, ty.id),
                    expr,
                    0.0,
                    0.0,
                );
            } else {
                for site in &reachable {
                    expr.push(lookup[&(site.id, ty.id)], -attack.log_rate());
                }
                spec.add_constraint(
                    format!("{tag}link_cov[{},{}]", target.id, ty.id),
                    expr,
                    0.0,
                    0.0,
                );
            }

            let coeff = prob
                * weights.global_scale
                * weights.attack_scale
                * target.priority
                * ty.warhead_multiplier
                * ty.accuracy_multiplier
                * attack.unit_scale();
            // value = (1 - y) * unit_scale: constant part to the offset,
            // -coeff * y to the linear objective.
            spec.add_objective_offset(coeff);
            spec.add_objective_term(y_var, -coeff);
        }
    }

    for site in &view.sites {
        for ty in &view.types {
            let max_units = site.capacity.min(ty.total_stock);
            let (t_var, y_var) = add_saturation_pair(
                spec,
                &format!("{tag}def[{},{}]", site.id, ty.id),
                defense,
                max_units,
            );

            let mut expr = LinExpr::new();
            expr.push(t_var, 1.0);
            expr.push(lookup[&(site.id, ty.id)], -defense.log_rate());
            spec.add_constraint(
                format!("{tag}link_def[{},{}]", site.id, ty.id),
                expr,
                0.0,
                0.0,
            );

            let coeff = prob
                * weights.global_scale
                * weights.defense_scale
                * site.priority
                * ty.warhead_multiplier
                * ty.accuracy_multiplier
                * defense.unit_scale();
            spec.add_objective_offset(coeff);
            spec.add_objective_term(y_var, -coeff);
        }
    }
}

/// The log-scale/exponential auxiliary pair of one saturating term:
/// `t ∈ [step·max, 0]`, `y = exp(t) ∈ [0, 1]`.
fn add_saturation_pair(
    spec: &mut ModelSpec,
    name: &str,
    curve: SaturatingCurve,
    max_units: u32,
) -> (VarId, VarId) {
    let step = curve.log_rate();
    let t_var = spec.add_variable(
        format!("t_{name}"),
        VarKind::Continuous {
            lb: step * f64::from(max_units),
            ub: 0.0,
        },
    );
    let y_var = spec.add_variable(
        format!("y_{name}"),
        VarKind::Continuous { lb: 0.0, ub: 1.0 },
    );
    spec.add_exp_link(format!("exp_{name}"), t_var, y_var, step, max_units);
    (t_var, y_var)
}

/// Closed-form objective of one scenario at a given integer allocation:
/// the formula the integer program encodes, evaluated directly.
///
/// Counts only the view's participating sites, so it applies unchanged to a
/// robust allocation restricted to one scenario.
pub fn evaluate_allocation(
    view: &ScenarioView,
    distances: &DistanceMatrix,
    weights: &ModelWeights,
    alloc: &AllocationGrid,
) -> f64 {
    let units_at = |site: SiteId, ty: TypeId| alloc.get(&(site, ty)).copied().unwrap_or(0);
    let mut total = 0.0;

    for target in &view.targets {
        for ty in &view.types {
            let reaching: u32 = view
                .sites
                .iter()
                .filter(|site| {
                    distances
                        .km(site.id, target.id)
                        .is_some_and(|d| d <= ty.range_km)
                })
                .map(|site| units_at(site.id, ty.id))
                .sum();
            total += weights.global_scale
                * weights.attack_scale
                * target.priority
                * ty.warhead_multiplier
                * ty.accuracy_multiplier
                * coverage::ATTACK.scaled_value(reaching);
        }
    }

    for site in &view.sites {
        for ty in &view.types {
            total += weights.global_scale
                * weights.defense_scale
                * site.priority
                * ty.warhead_multiplier
                * ty.accuracy_multiplier
                * coverage::DEFENSE.scaled_value(units_at(site.id, ty.id));
        }
    }

    total
}

/// Probability-weighted sum of the per-scenario objectives at one shared
/// allocation, i.e. the robust objective's closed form.
pub fn evaluate_robust(
    views: &[ScenarioView],
    distances: &DistanceMatrix,
    weights: &ModelWeights,
    alloc: &AllocationGrid,
) -> f64 {
    views
        .iter()
        .map(|view| {
            view.probability.unwrap_or(1.0) * evaluate_allocation(view, distances, weights, alloc)
        })
        .sum()
}

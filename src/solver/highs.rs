//! HiGHS backend for the solve port.
//!
//! Linear rows translate 1:1. Each exponential linkage is reduced to an
//! exact mixed-integer "staircase": for `input = step·n` with integer
//! `n ∈ [0, K]` and `base = exp(step)`, introduce ordered binaries
//! `z_1 ≥ z_2 ≥ … ≥ z_K` with
//!
//! ```text
//! step · Σ z_k = input            (so Σ z_k = n)
//! output + Σ base^(k-1)·(1-base) · z_k = 1
//! ```
//!
//! The ordering forces `z` to the prefix pattern, and the geometric weights
//! telescope to `1 - base^n`, so `output = base^n = exp(input)` holds exactly
//! at every feasible point, not as an approximation of the saturating curve.

use highs::{Col, HighsModelStatus, RowProblem, Sense};

use crate::model::{ModelSpec, VarKind};

use super::{SolveError, SolveLimits, SolveOutcome, Solution, Solver};

/// Feasibility tolerance used to vet incumbents surfaced at a time limit.
const FEASIBILITY_TOL: f64 = 1e-5;

/// [`Solver`] implementation backed by the HiGHS MILP engine.
#[derive(Debug, Clone, Default)]
pub struct HighsSolver {
    /// Forward engine log output to stdout.
    pub verbose: bool,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, model: &ModelSpec, limits: &SolveLimits) -> Result<SolveOutcome, SolveError> {
        let mut problem = RowProblem::new();

        // Objective coefficients, dense over the spec's columns.
        let mut obj = vec![0.0; model.num_variables()];
        for &(var, coeff) in &model.objective().terms {
            obj[var.index()] += coeff;
        }

        // Spec variables first, in VarId order, so solution columns line up.
        let mut cols: Vec<Col> = Vec::with_capacity(model.num_variables());
        for (i, var) in model.variables().iter().enumerate() {
            let col = match var.kind {
                VarKind::Integer { lb, ub } => problem.add_integer_column(obj[i], lb..=ub),
                VarKind::Continuous { lb, ub } => problem.add_column(obj[i], lb..=ub),
            };
            cols.push(col);
        }

        // Staircase binaries after the spec columns.
        for link in model.exp_links() {
            let base = link.step.exp();
            let zs: Vec<Col> = (0..link.max_steps)
                .map(|_| problem.add_integer_column(0.0, 0.0..=1.0))
                .collect();

            // output + Σ base^(k-1)·(1-base)·z_k = 1
            let mut terms = vec![(cols[link.output.index()], 1.0)];
            for (k, &z) in zs.iter().enumerate() {
                terms.push((z, base.powi(k as i32) * (1.0 - base)));
            }
            problem.add_row(1.0..=1.0, terms);

            // step · Σ z_k − input = 0
            let mut terms = vec![(cols[link.input.index()], -1.0)];
            for &z in &zs {
                terms.push((z, link.step));
            }
            problem.add_row(0.0..=0.0, terms);

            // Prefix ordering: z_k ≥ z_{k+1}.
            for pair in zs.windows(2) {
                problem.add_row(0.0.., [(pair[0], 1.0), (pair[1], -1.0)]);
            }
        }

        for constraint in model.constraints() {
            let terms: Vec<(Col, f64)> = constraint
                .expr
                .terms
                .iter()
                .map(|&(var, coeff)| (cols[var.index()], coeff))
                .collect();
            problem.add_row(constraint.lower..=constraint.upper, terms);
        }

        let mut engine = problem.optimise(Sense::Maximise);
        engine.set_option("output_flag", self.verbose);
        if let Some(limit) = limits.time_limit {
            engine.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(gap) = limits.mip_gap {
            engine.set_option("mip_rel_gap", gap);
        }

        let solved = engine.solve();
        match solved.status() {
            HighsModelStatus::Optimal => Ok(SolveOutcome::Optimal(extract(model, &solved))),
            HighsModelStatus::Infeasible => Err(SolveError::Infeasible),
            HighsModelStatus::ReachedTimeLimit => {
                // The engine may stop with or without a usable incumbent;
                // only a point that passes the model's own feasibility check
                // is surfaced.
                let candidate = extract(model, &solved);
                if model.is_feasible(candidate.values(), FEASIBILITY_TOL) {
                    Ok(SolveOutcome::TimeLimited(candidate))
                } else {
                    Err(SolveError::Timeout)
                }
            }
            other => Err(SolveError::Backend(format!(
                "unexpected solver status: {other:?}"
            ))),
        }
    }
}

fn extract(model: &ModelSpec, solved: &highs::SolvedModel) -> Solution {
    let solution = solved.get_solution();
    // A limit-stopped engine may hold no incumbent; NaN padding fails the
    // caller's feasibility check rather than panicking here.
    let mut values: Vec<f64> = solution
        .columns()
        .iter()
        .take(model.num_variables())
        .copied()
        .collect();
    values.resize(model.num_variables(), f64::NAN);
    let objective = model.objective_value(&values);
    Solution::new(values, objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinExpr, ModelSpec, VarKind};

    /// max 3a + 2b  s.t.  a + b ≤ 4, a ≤ 3, b ≤ 3, integer.
    #[test]
    fn solves_a_small_integer_program() {
        let mut spec = ModelSpec::new();
        let a = spec.add_variable("a", VarKind::Integer { lb: 0.0, ub: 3.0 });
        let b = spec.add_variable("b", VarKind::Integer { lb: 0.0, ub: 3.0 });
        let mut expr = LinExpr::new();
        expr.push(a, 1.0);
        expr.push(b, 1.0);
        spec.add_constraint("sum", expr, f64::NEG_INFINITY, 4.0);
        spec.add_objective_term(a, 3.0);
        spec.add_objective_term(b, 2.0);

        let outcome = HighsSolver::new()
            .solve(&spec, &SolveLimits::default())
            .unwrap();
        assert!(outcome.is_optimal());
        let sol = outcome.solution();
        assert_eq!(sol.value(a).round(), 3.0);
        assert_eq!(sol.value(b).round(), 1.0);
        assert!((sol.objective() - 11.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasible_models() {
        let mut spec = ModelSpec::new();
        let a = spec.add_variable("a", VarKind::Integer { lb: 0.0, ub: 1.0 });
        let mut expr = LinExpr::new();
        expr.push(a, 1.0);
        // a ≥ 2 contradicts the bound.
        spec.add_constraint("impossible", expr, 2.0, f64::INFINITY);

        let err = HighsSolver::new()
            .solve(&spec, &SolveLimits::default())
            .unwrap_err();
        assert_eq!(err, SolveError::Infeasible);
    }

    /// The staircase must reproduce `exp(step·n)` exactly at the optimum.
    #[test]
    fn exponential_link_is_exact() {
        let step = 0.9f64.ln();
        let max_steps = 5u32;

        let mut spec = ModelSpec::new();
        let n = spec.add_variable("n", VarKind::Integer { lb: 0.0, ub: 5.0 });
        let t = spec.add_variable(
            "t",
            VarKind::Continuous {
                lb: step * f64::from(max_steps),
                ub: 0.0,
            },
        );
        let y = spec.add_variable("y", VarKind::Continuous { lb: 0.0, ub: 1.0 });

        // t = step·n
        let mut expr = LinExpr::new();
        expr.push(t, 1.0);
        expr.push(n, -step);
        spec.add_constraint("log", expr, 0.0, 0.0);
        spec.add_exp_link("exp", t, y, step, max_steps);

        // Fix n = 3.
        let mut fix = LinExpr::new();
        fix.push(n, 1.0);
        spec.add_constraint("fix", fix, 3.0, 3.0);
        // Maximize 1 - y (any feasible objective will do).
        spec.add_objective_term(y, -1.0);
        spec.add_objective_offset(1.0);

        let outcome = HighsSolver::new()
            .solve(&spec, &SolveLimits::default())
            .unwrap();
        let sol = outcome.solution();
        let expected = 0.9f64.powi(3);
        assert!((sol.value(y) - expected).abs() < 1e-6);
        assert!((sol.objective() - (1.0 - expected)).abs() < 1e-6);
    }

    /// With zero steps the linkage pins the output to exp(0) = 1.
    #[test]
    fn empty_staircase_fixes_output_to_one() {
        let mut spec = ModelSpec::new();
        let t = spec.add_variable("t", VarKind::Continuous { lb: 0.0, ub: 0.0 });
        let y = spec.add_variable("y", VarKind::Continuous { lb: 0.0, ub: 1.0 });
        let mut expr = LinExpr::new();
        expr.push(t, 1.0);
        spec.add_constraint("pin", expr, 0.0, 0.0);
        spec.add_exp_link("exp", t, y, 0.8f64.ln(), 0);
        // Push y down; the equality row must hold it at 1.
        spec.add_objective_term(y, -1.0);

        let outcome = HighsSolver::new()
            .solve(&spec, &SolveLimits::default())
            .unwrap();
        assert!((outcome.solution().value(y) - 1.0).abs() < 1e-6);
    }
}

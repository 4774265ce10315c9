//! Solver-agnostic description of the allocation integer program.
//!
//! A [`ModelSpec`] is plain immutable data: variables, linear range
//! constraints, exponential linkage constraints, and a linear maximization
//! objective. [`build_scenario_model`] and [`build_robust_model`] produce it
//! from scenario snapshots; solve backends in [`crate::solver`] consume it.
//! Keeping the description inert makes the formulation testable without ever
//! invoking a solver.

mod build;

pub use build::{
    build_robust_model, build_scenario_model, evaluate_allocation, evaluate_robust,
    AllocationGrid, AllocationModel,
};

/// Handle to a variable inside one [`ModelSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    /// Position of the variable in the spec's column order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Integer { lb: f64, ub: f64 },
    Continuous { lb: f64, ub: f64 },
}

impl VarKind {
    pub fn bounds(self) -> (f64, f64) {
        match self {
            VarKind::Integer { lb, ub } | VarKind::Continuous { lb, ub } => (lb, ub),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, VarKind::Integer { .. })
    }
}

/// A named decision or auxiliary variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
}

/// Sparse linear expression over model variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    /// Evaluates the expression against a full column-value vector.
    pub fn value(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coeff)| coeff * values[var.index()])
            .sum()
    }
}

/// Linear range constraint `lower <= expr <= upper`.
///
/// One-sided constraints use `f64::NEG_INFINITY` / `f64::INFINITY` for the
/// unused bound.
#[derive(Debug, Clone, PartialEq)]
pub struct LinConstraint {
    pub name: String,
    pub expr: LinExpr,
    pub lower: f64,
    pub upper: f64,
}

/// Exponential linkage `output = exp(input)`.
///
/// The linkage is only meaningful together with a linear constraint pinning
/// `input` to integer multiples of `step` (= ln of a saturation base rate, so
/// `step < 0`): `input ∈ {0, step, 2·step, …, max_steps·step}`. Backends may
/// rely on that contract to reduce the linkage exactly; see
/// [`crate::solver::HighsSolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExpLink {
    pub name: String,
    pub input: VarId,
    pub output: VarId,
    pub step: f64,
    pub max_steps: u32,
}

/// Immutable integer/nonlinear program description. Objective sense is
/// always maximization.
#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    variables: Vec<Variable>,
    constraints: Vec<LinConstraint>,
    exp_links: Vec<ExpLink>,
    objective: LinExpr,
    objective_offset: f64,
}

impl ModelSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, kind: VarKind) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.into(),
            kind,
        });
        id
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinExpr,
        lower: f64,
        upper: f64,
    ) {
        self.constraints.push(LinConstraint {
            name: name.into(),
            expr,
            lower,
            upper,
        });
    }

    pub fn add_exp_link(
        &mut self,
        name: impl Into<String>,
        input: VarId,
        output: VarId,
        step: f64,
        max_steps: u32,
    ) {
        self.exp_links.push(ExpLink {
            name: name.into(),
            input,
            output,
            step,
            max_steps,
        });
    }

    /// Adds `coeff * var` to the (maximized) objective.
    pub fn add_objective_term(&mut self, var: VarId, coeff: f64) {
        self.objective.push(var, coeff);
    }

    /// Adds a constant to the objective value.
    pub fn add_objective_offset(&mut self, offset: f64) {
        self.objective_offset += offset;
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinConstraint] {
        &self.constraints
    }

    pub fn exp_links(&self) -> &[ExpLink] {
        &self.exp_links
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn objective_offset(&self) -> f64 {
        self.objective_offset
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Objective value (including the constant offset) at a column-value
    /// vector.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective_offset + self.objective.value(values)
    }

    /// Checks a candidate point against variable bounds, integrality, linear
    /// rows, and exponential linkages, within `tol`.
    ///
    /// Used by backends to vet incumbents surfaced at a time limit before
    /// reporting them feasible.
    pub fn is_feasible(&self, values: &[f64], tol: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        for (var, &v) in self.variables.iter().zip(values) {
            let (lb, ub) = var.kind.bounds();
            if !v.is_finite() || v < lb - tol || v > ub + tol {
                return false;
            }
            if var.kind.is_integer() && (v - v.round()).abs() > tol {
                return false;
            }
        }
        for c in &self.constraints {
            let v = c.expr.value(values);
            if v < c.lower - tol || v > c.upper + tol {
                return false;
            }
        }
        for link in &self.exp_links {
            let expected = values[link.input.index()].exp();
            if (values[link.output.index()] - expected).abs() > tol {
                return false;
            }
        }
        true
    }
}

/// Named scale constants of the allocation objective.
///
/// Kept as configuration rather than literals so the model can be
/// recalibrated without touching the formulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelWeights {
    /// Scale applied to target-coverage terms.
    pub attack_scale: f64,
    /// Scale applied to site-fortification terms.
    pub defense_scale: f64,
    /// Global coefficient multiplying both term families.
    pub global_scale: f64,
}

impl ModelWeights {
    pub const DEFAULT_ATTACK_SCALE: f64 = 10.0;
    pub const DEFAULT_DEFENSE_SCALE: f64 = 20.0;
    pub const DEFAULT_GLOBAL_SCALE: f64 = 1.0;
}

impl Default for ModelWeights {
    fn default() -> Self {
        Self {
            attack_scale: Self::DEFAULT_ATTACK_SCALE,
            defense_scale: Self::DEFAULT_DEFENSE_SCALE,
            global_scale: Self::DEFAULT_GLOBAL_SCALE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_ids_follow_insertion_order() {
        let mut spec = ModelSpec::new();
        let a = spec.add_variable("a", VarKind::Integer { lb: 0.0, ub: 5.0 });
        let b = spec.add_variable("b", VarKind::Continuous { lb: 0.0, ub: 1.0 });
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(spec.num_variables(), 2);
    }

    #[test]
    fn objective_value_includes_offset() {
        let mut spec = ModelSpec::new();
        let a = spec.add_variable("a", VarKind::Continuous { lb: 0.0, ub: 10.0 });
        spec.add_objective_term(a, 2.0);
        spec.add_objective_offset(7.0);
        assert_eq!(spec.objective_value(&[3.0]), 13.0);
    }

    #[test]
    fn is_feasible_checks_rows_and_bounds() {
        let mut spec = ModelSpec::new();
        let a = spec.add_variable("a", VarKind::Integer { lb: 0.0, ub: 4.0 });
        let mut expr = LinExpr::new();
        expr.push(a, 1.0);
        spec.add_constraint("cap", expr, f64::NEG_INFINITY, 3.0);

        assert!(spec.is_feasible(&[2.0], 1e-6));
        // Violates the row upper bound.
        assert!(!spec.is_feasible(&[4.0], 1e-6));
        // Fractional value for an integer variable.
        assert!(!spec.is_feasible(&[1.5], 1e-6));
        // Wrong arity.
        assert!(!spec.is_feasible(&[1.0, 1.0], 1e-6));
    }

    #[test]
    fn is_feasible_checks_exp_links() {
        let mut spec = ModelSpec::new();
        let t = spec.add_variable("t", VarKind::Continuous { lb: -10.0, ub: 0.0 });
        let y = spec.add_variable("y", VarKind::Continuous { lb: 0.0, ub: 1.0 });
        spec.add_exp_link("link", t, y, -0.1, 10);

        let t_val = -0.3f64;
        assert!(spec.is_feasible(&[t_val, t_val.exp()], 1e-9));
        assert!(!spec.is_feasible(&[t_val, 0.9], 1e-9));
    }
}

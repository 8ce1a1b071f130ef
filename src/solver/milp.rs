//! Reference MILP back end (component C2).
//!
//! A dense Big-M primal simplex for the LP relaxation, wrapped in
//! depth-first branch-and-bound over integer/binary variables and SOS-1
//! sets. This is the in-crate stand-in for the "underlying MILP solver"
//! `spec.md` treats as an external collaborator: it exists so this crate's
//! own rewrites and end-to-end scenarios (§8) are exercisable, not as a
//! claim to production-grade MILP performance.

use std::time::{Duration, Instant};

use problemo::Problem;

use crate::algebra::{Polynomial, Term};
use crate::callback::{Callback, ProgressEntry};
use crate::solver::backend::{
    CleanOptions, ConstraintName, SolverBackend, SolverValues, Status, DEFAULT_BIG_M,
};
use crate::solver::variable::{VarId, VarKind, Variable};
use crate::terminators::Terminator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sense {
    Leq,
    Eq,
}

#[derive(Debug, Clone)]
enum StoredConstraint {
    Row(Sense, Polynomial),
    Sos1(Vec<Variable>),
}

struct VarRecord {
    #[allow(dead_code)]
    tag: String,
    kind: VarKind,
    lb: f64,
    ub: f64,
}

/// One row handed to [`simplex_big_m`], already linear over the shifted
/// non-negative variables.
struct RowSpec {
    sense: Sense,
    coeffs: Vec<f64>,
    rhs: f64,
}

/// In-process MILP reference backend.
///
/// Constructed with `sos1_supported = true` to model a back end that
/// accepts native SOS-1 constraints (the KKT rewrite then emits
/// `add_sos1` for complementary slackness); with `false` to model a back
/// end lacking that feature, forcing the KKT rewrite onto the big-M
/// fallback. Both configurations resolve SOS-1 sets by branching here,
/// since this reference backend has no native SOS-1 cut generation — the
/// flag only changes which encoding the *rewrite* chooses to emit.
pub struct ReferenceMilpBackend {
    variables: Vec<VarRecord>,
    constraints: Vec<Option<StoredConstraint>>,
    group_members: Vec<(ConstraintName, Vec<ConstraintName>)>,
    sos1_supported: bool,
    big_m: f64,
    timeout_secs: Option<u64>,
    node_limit: usize,
}

impl ReferenceMilpBackend {
    pub fn new(sos1_supported: bool) -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            group_members: Vec::new(),
            sos1_supported,
            big_m: DEFAULT_BIG_M,
            timeout_secs: None,
            node_limit: 20_000,
        }
    }

    pub fn with_big_m(mut self, big_m: f64) -> Self {
        self.big_m = big_m;
        self
    }

    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }

    /// The big-M magnitude this backend substitutes for infinite bounds and
    /// uses in its own Big-M simplex. Exposed so [`super::smt::BisectionSmtBackend`]
    /// can pick a sane initial search interval for its bisection.
    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    fn safe_bound(&self, bound: f64) -> f64 {
        if bound == f64::INFINITY {
            self.big_m
        } else if bound == f64::NEG_INFINITY {
            -self.big_m
        } else {
            bound
        }
    }

    fn next_name(&self) -> ConstraintName {
        ConstraintName::new(self.constraints.len() as u32)
    }

    fn push_row(&mut self, sense: Sense, poly: Polynomial) -> ConstraintName {
        let name = self.next_name();
        self.constraints.push(Some(StoredConstraint::Row(sense, poly)));
        name
    }

    fn group(&mut self, primary: ConstraintName, members: Vec<ConstraintName>) {
        self.group_members.push((primary, members));
    }

    fn current_bounds(&self) -> Vec<(f64, f64)> {
        self.variables
            .iter()
            .map(|v| (self.safe_bound(v.lb), self.safe_bound(v.ub)))
            .collect()
    }

    fn sos1_sets(&self) -> Vec<Vec<Variable>> {
        self.constraints
            .iter()
            .filter_map(|c| match c {
                Some(StoredConstraint::Sos1(vars)) => Some(vars.clone()),
                _ => None,
            })
            .collect()
    }

    fn integer_var_indices(&self) -> Vec<usize> {
        (0..self.variables.len())
            .filter(|&i| self.variables[i].kind != VarKind::Continuous)
            .collect()
    }

    /// Runs branch-and-bound to maximize `objective`, returning the best
    /// status found and (if any) the values of every created variable.
    fn branch_and_bound(
        &self,
        objective: &Polynomial,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
        deadline: Option<Instant>,
    ) -> (Status, Vec<f64>, f64) {
        let root_bounds = self.current_bounds();
        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut stack = vec![root_bounds];
        let mut nodes_explored = 0usize;
        let mut timed_out = false;

        terminator.initialize();

        while let Some(bounds) = stack.pop() {
            nodes_explored += 1;
            if nodes_explored > self.node_limit {
                timed_out = true;
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    timed_out = true;
                    break;
                }
            }

            let Some((status, values, value)) = self.solve_relaxation(&bounds, objective) else {
                continue; // empty variable range at this node, prune
            };
            if status != Status::Optimal {
                continue;
            }
            if let Some((_, best_value)) = &best {
                if value <= *best_value + 1e-9 {
                    continue; // bound: cannot improve on the incumbent
                }
            }

            terminator.observe(best.as_ref().map(|(_, v)| *v));
            if let Some(stop) = terminator.terminate() {
                if let Some((values, value)) = best {
                    callback.on_progress(ProgressEntry {
                        timestamp_ms: 0,
                        objective: value,
                        best_bound: Some(value),
                    });
                    return (Status::TimeLimit, values, value);
                }
                return (stop, Vec::new(), 0.0);
            }

            // Find a fractional integer/binary variable to branch on.
            let frac_var = self.integer_var_indices().into_iter().find_map(|i| {
                let frac = values[i] - values[i].floor();
                if frac > 1e-6 && frac < 1.0 - 1e-6 {
                    Some(i)
                } else {
                    None
                }
            });

            // Find a violated SOS-1 set (more than one member nonzero).
            let violated_sos1 = self.sos1_sets().into_iter().find(|set| {
                set.iter()
                    .filter(|v| values[v.id().index() as usize].abs() > 1e-6)
                    .count()
                    > 1
            });

            match (frac_var, violated_sos1) {
                (Some(i), _) => {
                    let floor = values[i].floor();
                    let mut lo = bounds.clone();
                    lo[i].1 = floor;
                    let mut hi = bounds.clone();
                    hi[i].0 = floor + 1.0;
                    stack.push(lo);
                    stack.push(hi);
                }
                (None, Some(set)) => {
                    // Branch: either every member is pinned to zero, or
                    // exactly one designated member is left free (every
                    // other member pinned to zero).
                    let mut all_zero = bounds.clone();
                    for v in &set {
                        all_zero[v.id().index() as usize] = (0.0, 0.0);
                    }
                    stack.push(all_zero);
                    for (k, _keep) in set.iter().enumerate() {
                        let mut branch = bounds.clone();
                        for (j, other) in set.iter().enumerate() {
                            if j != k {
                                branch[other.id().index() as usize] = (0.0, 0.0);
                            }
                        }
                        stack.push(branch);
                    }
                }
                (None, None) => {
                    callback.on_progress(ProgressEntry {
                        timestamp_ms: 0,
                        objective: value,
                        best_bound: None,
                    });
                    best = Some((values, value));
                }
            }
        }

        match best {
            Some((values, value)) if timed_out => (Status::TimeLimit, values, value),
            Some((values, value)) => (Status::Optimal, values, value),
            None if timed_out => (Status::TimeLimit, Vec::new(), 0.0),
            None => (Status::Infeasible, Vec::new(), 0.0),
        }
    }

    /// Solves the LP relaxation with the given variable bounds via a dense
    /// Big-M primal simplex. Returns `None` if the node's variable range is
    /// empty (a branch already infeasible by construction); otherwise the
    /// simplex's own status (`Optimal`, `Infeasible`, or `Unbounded`).
    fn solve_relaxation(
        &self,
        bounds: &[(f64, f64)],
        objective: &Polynomial,
    ) -> Option<(Status, Vec<f64>, f64)> {
        let n = self.variables.len();
        for &(lb, ub) in bounds {
            if ub < lb - 1e-9 {
                return None;
            }
        }

        // Shift each variable y_i = x_i - lb_i in [0, width_i].
        let widths: Vec<f64> = bounds.iter().map(|&(lb, ub)| (ub - lb).max(0.0)).collect();

        let mut rows = Vec::new();
        for constraint in self.constraints.iter().flatten() {
            if let StoredConstraint::Row(sense, poly) = constraint {
                let simplified = poly.simplified();
                let mut coeffs = vec![0.0; n];
                let mut shifted_const = 0.0;
                for term in simplified.terms() {
                    match term.variable() {
                        None => shifted_const += term.coefficient(),
                        Some(v) => {
                            let i = v.id().index() as usize;
                            assert_eq!(term.exponent(), 1, "relaxation requires linear constraints");
                            coeffs[i] += term.coefficient();
                            shifted_const += term.coefficient() * bounds[i].0;
                        }
                    }
                }
                rows.push(RowSpec {
                    sense: *sense,
                    coeffs,
                    rhs: -shifted_const,
                });
            }
        }
        for (i, width) in widths.iter().enumerate() {
            let mut coeffs = vec![0.0; n];
            coeffs[i] = 1.0;
            rows.push(RowSpec {
                sense: Sense::Leq,
                coeffs,
                rhs: *width,
            });
        }

        let obj_simplified = objective.simplified();
        let mut obj_coeffs = vec![0.0; n];
        let mut obj_const = 0.0;
        for term in obj_simplified.terms() {
            match term.variable() {
                None => obj_const += term.coefficient(),
                Some(v) => {
                    let i = v.id().index() as usize;
                    obj_coeffs[i] += term.coefficient();
                    obj_const += term.coefficient() * bounds[i].0;
                }
            }
        }

        let (status, y_values, relaxed_value) = simplex_big_m(n, &rows, &obj_coeffs, self.big_m);
        if status != Status::Optimal {
            return Some((status, Vec::new(), 0.0));
        }
        let values: Vec<f64> = (0..n).map(|i| bounds[i].0 + y_values[i]).collect();
        Some((Status::Optimal, values, relaxed_value + obj_const))
    }
}

#[derive(Clone, Copy)]
enum RowKind {
    Leq,
    Geq,
    Eq,
}

/// Dense Big-M primal simplex over shifted non-negative variables `y`.
/// `obj_coeffs` is the linear part of the (shifted) objective to maximize.
fn simplex_big_m(n_vars: usize, rows: &[RowSpec], obj_coeffs: &[f64], big_m: f64) -> (Status, Vec<f64>, f64) {
    const EPS: f64 = 1e-9;
    let m = rows.len();

    let normalized: Vec<(RowKind, Vec<f64>, f64)> = rows
        .iter()
        .map(|row| {
            let mut coeffs = row.coeffs.clone();
            let mut rhs = row.rhs;
            let mut kind = match row.sense {
                Sense::Leq => RowKind::Leq,
                Sense::Eq => RowKind::Eq,
            };
            if rhs < 0.0 {
                for c in coeffs.iter_mut() {
                    *c = -*c;
                }
                rhs = -rhs;
                kind = match kind {
                    RowKind::Leq => RowKind::Geq,
                    RowKind::Geq => RowKind::Leq,
                    RowKind::Eq => RowKind::Eq,
                };
            }
            (kind, coeffs, rhs)
        })
        .collect();

    let num_slack = normalized.iter().filter(|(k, _, _)| matches!(k, RowKind::Leq)).count();
    let num_surplus = normalized.iter().filter(|(k, _, _)| matches!(k, RowKind::Geq)).count();
    let num_artificial = normalized
        .iter()
        .filter(|(k, _, _)| matches!(k, RowKind::Geq | RowKind::Eq))
        .count();

    let slack_start = n_vars;
    let surplus_start = slack_start + num_slack;
    let artificial_start = surplus_start + num_surplus;
    let total_cols = artificial_start + num_artificial;

    let mut cost = vec![0.0; total_cols];
    cost[..n_vars].copy_from_slice(obj_coeffs);
    for c in cost.iter_mut().skip(artificial_start) {
        *c = -big_m;
    }

    let mut tableau = vec![vec![0.0; total_cols + 1]; m.max(1)];
    let mut basic = vec![0usize; m];
    let mut next_slack = slack_start;
    let mut next_surplus = surplus_start;
    let mut next_artificial = artificial_start;

    for (i, (kind, coeffs, rhs)) in normalized.iter().enumerate() {
        tableau[i][..n_vars].copy_from_slice(coeffs);
        tableau[i][total_cols] = *rhs;
        match kind {
            RowKind::Leq => {
                tableau[i][next_slack] = 1.0;
                basic[i] = next_slack;
                next_slack += 1;
            }
            RowKind::Geq => {
                tableau[i][next_surplus] = -1.0;
                tableau[i][next_artificial] = 1.0;
                basic[i] = next_artificial;
                next_surplus += 1;
                next_artificial += 1;
            }
            RowKind::Eq => {
                tableau[i][next_artificial] = 1.0;
                basic[i] = next_artificial;
                next_artificial += 1;
            }
        }
    }
    if m == 0 {
        // No constraints at all (e.g. a single unconstrained variable):
        // nothing to pivot, but a variable with a positive objective
        // coefficient and no upper-bound row is unbounded. In practice
        // `solve_relaxation` always supplies one row per variable width, so
        // this branch is unreachable from there; kept defensive for direct
        // callers of this function (e.g. tests).
        return (Status::Optimal, vec![0.0; n_vars], 0.0);
    }

    let mut obj_row = vec![0.0; total_cols + 1];
    for (j, c) in cost.iter().enumerate() {
        obj_row[j] = -c;
    }
    for i in 0..m {
        let b = basic[i];
        let coeff = obj_row[b];
        if coeff != 0.0 {
            for j in 0..=total_cols {
                obj_row[j] -= coeff * tableau[i][j];
            }
        }
    }

    let max_iterations = 10_000;
    for _ in 0..max_iterations {
        let entering = (0..total_cols).find(|&j| obj_row[j] < -EPS);
        let Some(entering) = entering else { break };

        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            let a = tableau[i][entering];
            if a > EPS {
                let ratio = tableau[i][total_cols] / a;
                let better = ratio < best_ratio - EPS;
                let tied_but_lower_index =
                    (ratio - best_ratio).abs() <= EPS && leaving.is_some_and(|l| basic[i] < basic[l]);
                if better || tied_but_lower_index {
                    best_ratio = ratio;
                    leaving = Some(i);
                }
            }
        }
        let Some(leaving) = leaving else {
            return (Status::Unbounded, Vec::new(), 0.0);
        };

        let pivot = tableau[leaving][entering];
        for j in 0..=total_cols {
            tableau[leaving][j] /= pivot;
        }
        for i in 0..m {
            if i == leaving {
                continue;
            }
            let factor = tableau[i][entering];
            if factor != 0.0 {
                for j in 0..=total_cols {
                    tableau[i][j] -= factor * tableau[leaving][j];
                }
            }
        }
        let factor = obj_row[entering];
        if factor != 0.0 {
            for j in 0..=total_cols {
                obj_row[j] -= factor * tableau[leaving][j];
            }
        }
        basic[leaving] = entering;
    }

    for i in 0..m {
        if basic[i] >= artificial_start && tableau[i][total_cols] > 1e-6 {
            return (Status::Infeasible, Vec::new(), 0.0);
        }
    }

    let mut y = vec![0.0; n_vars];
    for i in 0..m {
        if basic[i] < n_vars {
            y[basic[i]] = tableau[i][total_cols];
        }
    }
    let value: f64 = (0..n_vars).map(|j| obj_coeffs[j] * y[j]).sum();
    (Status::Optimal, y, value)
}

impl SolverBackend for ReferenceMilpBackend {
    fn create_variable(&mut self, tag: &str, kind: VarKind, lb: f64, ub: f64) -> Variable {
        let id = VarId::new(self.variables.len() as u32);
        self.variables.push(VarRecord {
            tag: tag.to_string(),
            kind,
            lb,
            ub,
        });
        Variable::from_id(id)
    }

    fn add_leq_zero(&mut self, poly: Polynomial) -> ConstraintName {
        self.push_row(Sense::Leq, poly)
    }

    fn add_eq_zero(&mut self, poly: Polynomial) -> ConstraintName {
        self.push_row(Sense::Eq, poly)
    }

    fn add_sos1(&mut self, vars: Vec<Variable>) -> ConstraintName {
        let name = self.next_name();
        self.constraints.push(Some(StoredConstraint::Sos1(vars)));
        name
    }

    fn add_abs(&mut self, y: Variable, poly: Polynomial) -> ConstraintName {
        let z = self.create_variable("abs_switch", VarKind::Binary, 0.0, 1.0);
        let y_poly = Polynomial::from_variable(1.0, y);
        let z_poly = Polynomial::from_variable(1.0, z);
        let big_m = self.big_m;

        // y >= poly
        let r1 = self.push_row(Sense::Leq, poly.sub(&y_poly));
        // y >= -poly
        let r2 = self.push_row(Sense::Leq, poly.negate().sub(&y_poly));
        // y <= poly + M(1-z)  <=>  y - poly - M + M*z <= 0
        let r3 = self.push_row(
            Sense::Leq,
            y_poly
                .sub(&poly)
                .add(&Polynomial::constant(-big_m))
                .add(&z_poly.scale(big_m)),
        );
        // y <= -poly + M*z  <=>  y + poly - M*z <= 0
        let r4 = self.push_row(Sense::Leq, y_poly.add(&poly).sub(&z_poly.scale(big_m)));

        self.group(r1, vec![r2, r3, r4]);
        r1
    }

    fn supports_sos1(&self) -> bool {
        self.sos1_supported
    }

    fn linearize_binary_times_binary(&mut self, x: Variable, y: Variable) -> Variable {
        let z = self.create_variable("and_aux", VarKind::Binary, 0.0, 1.0);
        let zp = Polynomial::from_variable(1.0, z);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);
        self.push_row(Sense::Leq, zp.sub(&xp));
        self.push_row(Sense::Leq, zp.sub(&yp));
        self.push_row(
            Sense::Leq,
            xp.add(&yp).sub(&zp).add(&Polynomial::constant(-1.0)),
        );
        z
    }

    fn linearize_binary_times_continuous(&mut self, x: Variable, y: Variable, y_ub: f64) -> Variable {
        let z = self.create_variable("mccormick_aux", VarKind::Continuous, 0.0, y_ub);
        let zp = Polynomial::from_variable(1.0, z);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);
        // z <= y_ub * x
        self.push_row(Sense::Leq, zp.sub(&xp.scale(y_ub)));
        // z <= y
        self.push_row(Sense::Leq, zp.sub(&yp));
        // z >= y - y_ub * (1 - x)  <=>  y - y_ub + y_ub*x - z <= 0
        self.push_row(
            Sense::Leq,
            yp.sub(&Polynomial::constant(y_ub)).add(&xp.scale(y_ub)).sub(&zp),
        );
        z
    }

    fn remove_constraint(&mut self, name: ConstraintName) {
        let idx = name.index() as usize;
        self.constraints[idx] = None;
        if let Some(pos) = self.group_members.iter().position(|(primary, _)| *primary == name) {
            let (_, members) = self.group_members.remove(pos);
            for member in members {
                self.constraints[member.index() as usize] = None;
            }
        }
    }

    fn change_constraint_rhs(&mut self, name: ConstraintName, new_constant: f64) {
        let idx = name.index() as usize;
        if let Some(StoredConstraint::Row(_, poly)) = &mut self.constraints[idx] {
            let simplified = poly.simplified();
            let mut terms: Vec<Term> = simplified.terms().iter().filter(|t| !t.is_constant()).copied().collect();
            terms.push(Term::constant(new_constant));
            *poly = Polynomial::from_terms(terms);
        }
    }

    fn model_update(&mut self) {}

    fn set_timeout(&mut self, seconds: u64) {
        self.timeout_secs = Some(seconds);
    }

    fn clean_all(&mut self, options: CleanOptions) {
        if let Some(timeout) = options.timeout_secs {
            self.timeout_secs = Some(timeout);
        }
    }

    fn maximize(
        &mut self,
        objective: &Polynomial,
        reset: bool,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<(Status, SolverValues), Problem> {
        let _ = reset; // this reference backend always resolves nodes from scratch
        let deadline = self.timeout_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        let (status, values, _value) = self.branch_and_bound(objective, callback, terminator, deadline);
        if status.has_usable_incumbent() && !values.is_empty() {
            let mut solution = SolverValues::new();
            for (i, value) in values.iter().enumerate() {
                solution.set(Variable::from_id(VarId::new(i as u32)), *value);
            }
            Ok((status, solution))
        } else {
            Ok((status, SolverValues::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::terminators::TimeOutTerminator;

    fn solve(backend: &mut ReferenceMilpBackend, objective: &Polynomial) -> (Status, SolverValues) {
        let mut callback = NoOpCallback;
        let mut terminator = TimeOutTerminator::new(5);
        backend.maximize(objective, true, &mut callback, &mut terminator).unwrap()
    }

    #[test]
    fn maximizes_a_single_bounded_variable() {
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 0.0, 5.0);
        let (status, values) = solve(&mut backend, &Polynomial::from_variable(1.0, x));
        assert_eq!(status, Status::Optimal);
        assert!((values.get(x) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn classic_two_variable_lp() {
        // maximize 5x + 4y s.t. 6x + 4y <= 24, x + 2y <= 6, x,y >= 0.
        // Known optimum: x = 3, y = 1.5, objective = 21.
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 0.0, f64::INFINITY);
        let y = backend.create_variable("y", VarKind::Continuous, 0.0, f64::INFINITY);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);
        backend.add_leq_zero(xp.scale(6.0).add(&yp.scale(4.0)).add(&Polynomial::constant(-24.0)));
        backend.add_leq_zero(xp.clone().add(&yp.scale(2.0)).add(&Polynomial::constant(-6.0)));

        let objective = xp.scale(5.0).add(&yp.scale(4.0));
        let (status, values) = solve(&mut backend, &objective);
        assert_eq!(status, Status::Optimal);
        assert!((values.get(x) - 3.0).abs() < 1e-4);
        assert!((values.get(y) - 1.5).abs() < 1e-4);
    }

    #[test]
    fn sos1_allows_only_one_nonzero_member() {
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Binary, 0.0, 1.0);
        let y = backend.create_variable("y", VarKind::Binary, 0.0, 1.0);
        backend.add_sos1(vec![x, y]);

        let objective = Polynomial::from_variable(1.0, x).add(&Polynomial::from_variable(1.0, y));
        let (status, values) = solve(&mut backend, &objective);
        assert_eq!(status, Status::Optimal);
        assert!(values.get(x) + values.get(y) <= 1.0 + 1e-6);
        assert!((values.get(x) + values.get(y) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn infeasible_bounds_are_reported() {
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 5.0, 5.0);
        let y = backend.create_variable("y", VarKind::Continuous, 0.0, 10.0);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);
        // x + y <= 3, but x is pinned to 5: infeasible.
        backend.add_leq_zero(xp.add(&yp).add(&Polynomial::constant(-3.0)));
        let (status, _) = solve(&mut backend, &yp);
        assert_eq!(status, Status::Infeasible);
    }

    #[test]
    fn add_abs_tracks_absolute_value() {
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, -5.0, 5.0);
        let y = backend.create_variable("y", VarKind::Continuous, 0.0, 10.0);
        backend.add_abs(y, Polynomial::from_variable(1.0, x));
        // Fix x = -3 via two inequalities and maximize y, expecting y == 3.
        let xp = Polynomial::from_variable(1.0, x);
        backend.add_leq_zero(xp.clone().add(&Polynomial::constant(3.0)));
        backend.add_leq_zero(xp.negate().add(&Polynomial::constant(-3.0)));
        let (status, values) = solve(&mut backend, &Polynomial::from_variable(1.0, y));
        assert_eq!(status, Status::Optimal);
        assert!((values.get(y) - 3.0).abs() < 1e-4);
    }
}

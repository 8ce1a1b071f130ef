//! Reference SMT-flavored back end (component C2).
//!
//! `spec.md` §2 treats an SMT back end as fundamentally feasibility-only: it
//! answers "is there an assignment satisfying what's been asserted so far"
//! rather than optimizing directly, so `maximize` over such a back end has
//! to be *simulated* by bisecting on the objective value and re-asking the
//! feasibility question with a tightened threshold each time. This backend
//! is that simulation, built on top of [`super::milp::ReferenceMilpBackend`]
//! as its feasibility oracle (a `maximize` call against the zero polynomial
//! is exactly a sat/unsat query: `Optimal` means "yes, and here is a
//! witness", `Infeasible` means "no").

use problemo::Problem;

use crate::algebra::Polynomial;
use crate::callback::{Callback, ProgressEntry};
use crate::solver::backend::{CleanOptions, ConstraintName, SolverBackend, SolverValues, Status};
use crate::solver::milp::ReferenceMilpBackend;
use crate::solver::variable::{VarKind, Variable};
use crate::terminators::Terminator;

fn evaluate(poly: &Polynomial, values: &SolverValues) -> f64 {
    poly.terms()
        .iter()
        .map(|term| {
            let base = match term.variable() {
                None => 1.0,
                Some(v) => values.get(v).powi(term.exponent() as i32),
            };
            term.coefficient() * base
        })
        .sum()
}

/// Back end that only ever asks its inner engine feasibility (sat/unsat)
/// questions, simulating `maximize` via bisection on the objective value.
pub struct BisectionSmtBackend {
    inner: ReferenceMilpBackend,
    tolerance: f64,
    max_iterations: u32,
}

impl BisectionSmtBackend {
    pub fn new(sos1_supported: bool) -> Self {
        Self {
            inner: ReferenceMilpBackend::new(sos1_supported),
            tolerance: 1e-4,
            max_iterations: 60,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Asks the feasibility oracle whether anything currently asserted is
    /// satisfiable, returning a witness assignment if so.
    fn check_feasible(
        &mut self,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<Option<SolverValues>, Problem> {
        let zero = Polynomial::zero();
        let (status, values) = self.inner.maximize(&zero, true, callback, terminator)?;
        Ok(if status == Status::Optimal { Some(values) } else { None })
    }
}

impl SolverBackend for BisectionSmtBackend {
    fn create_variable(&mut self, tag: &str, kind: VarKind, lb: f64, ub: f64) -> Variable {
        self.inner.create_variable(tag, kind, lb, ub)
    }

    fn add_leq_zero(&mut self, poly: Polynomial) -> ConstraintName {
        self.inner.add_leq_zero(poly)
    }

    fn add_eq_zero(&mut self, poly: Polynomial) -> ConstraintName {
        self.inner.add_eq_zero(poly)
    }

    fn add_sos1(&mut self, vars: Vec<Variable>) -> ConstraintName {
        self.inner.add_sos1(vars)
    }

    fn add_abs(&mut self, y: Variable, poly: Polynomial) -> ConstraintName {
        self.inner.add_abs(y, poly)
    }

    fn supports_sos1(&self) -> bool {
        self.inner.supports_sos1()
    }

    fn linearize_binary_times_binary(&mut self, x: Variable, y: Variable) -> Variable {
        self.inner.linearize_binary_times_binary(x, y)
    }

    fn linearize_binary_times_continuous(&mut self, x: Variable, y: Variable, y_ub: f64) -> Variable {
        self.inner.linearize_binary_times_continuous(x, y, y_ub)
    }

    fn remove_constraint(&mut self, name: ConstraintName) {
        self.inner.remove_constraint(name);
    }

    fn change_constraint_rhs(&mut self, name: ConstraintName, new_constant: f64) {
        self.inner.change_constraint_rhs(name, new_constant);
    }

    fn model_update(&mut self) {
        self.inner.model_update();
    }

    fn set_timeout(&mut self, seconds: u64) {
        self.inner.set_timeout(seconds);
    }

    fn clean_all(&mut self, options: CleanOptions) {
        self.inner.clean_all(options);
    }

    fn maximize(
        &mut self,
        objective: &Polynomial,
        reset: bool,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<(Status, SolverValues), Problem> {
        let _ = reset;
        terminator.initialize();

        let Some(mut best_values) = self.check_feasible(callback, terminator)? else {
            return Ok((Status::Infeasible, SolverValues::new()));
        };

        let mut lo = evaluate(objective, &best_values);
        let mut hi = lo + self.inner.big_m();

        for _ in 0..self.max_iterations {
            if hi - lo < self.tolerance {
                break;
            }
            if let Some(status) = terminator.terminate() {
                callback.on_progress(ProgressEntry {
                    timestamp_ms: 0,
                    objective: lo,
                    best_bound: Some(hi),
                });
                return Ok((status, best_values));
            }

            let mid = lo + (hi - lo) / 2.0;
            let threshold = self.inner.add_leq_zero(Polynomial::constant(mid).sub(objective));
            let probe = self.check_feasible(callback, terminator)?;
            self.inner.remove_constraint(threshold);

            match probe {
                Some(values) => {
                    lo = evaluate(objective, &values).max(mid);
                    best_values = values;
                }
                None => hi = mid,
            }
            terminator.observe(Some(lo));
            callback.on_progress(ProgressEntry {
                timestamp_ms: 0,
                objective: lo,
                best_bound: Some(hi),
            });
        }

        Ok((Status::Optimal, best_values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::terminators::TimeOutTerminator;

    #[test]
    fn bisects_to_the_known_optimum() {
        let mut backend = BisectionSmtBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 0.0, 10.0);
        let objective = Polynomial::from_variable(1.0, x);
        let mut callback = NoOpCallback;
        let mut terminator = TimeOutTerminator::new(5);
        let (status, values) = backend.maximize(&objective, true, &mut callback, &mut terminator).unwrap();
        assert_eq!(status, Status::Optimal);
        assert!((values.get(x) - 10.0).abs() < 1e-2);
    }

    #[test]
    fn reports_infeasible_when_nothing_satisfies_the_assertions() {
        let mut backend = BisectionSmtBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 3.0, 3.0);
        let xp = Polynomial::from_variable(1.0, x);
        backend.add_leq_zero(xp.add(&Polynomial::constant(-1.0))); // x <= 1, contradicts x == 3
        let mut callback = NoOpCallback;
        let mut terminator = TimeOutTerminator::new(5);
        let (status, _) = backend
            .maximize(&Polynomial::from_variable(1.0, x), true, &mut callback, &mut terminator)
            .unwrap();
        assert_eq!(status, Status::Infeasible);
    }
}

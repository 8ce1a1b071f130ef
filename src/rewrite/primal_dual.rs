//! Primal-dual rewrite with quantized inputs (`spec.md` §4.4.2): primal
//! feasibility (already asserted by the encoder), dual feasibility, and a
//! strong-duality equality `c^T y = b^T mu + h^T lambda`.

use crate::algebra::Polynomial;
use crate::encoder::InnerProblem;
use crate::error::{contract_violation, MetaOptResult};
use crate::solver::{SolverBackend, VarKind, Variable};

pub struct PrimalDualDuals {
    pub inequality_multipliers: Vec<Variable>,
    pub equality_multipliers: Vec<Variable>,
}

fn constant_term(poly: &Polynomial) -> f64 {
    poly.simplified()
        .terms()
        .iter()
        .find(|t| t.is_constant())
        .map(|t| t.coefficient())
        .unwrap_or(0.0)
}

/// Applies the primal-dual rewrite to `problem`. Any adversarial input
/// multiplying a dual must already have been folded into
/// `problem.equalities`/`inequalities` through a quantized input's
/// [`crate::rewrite::linearize::QuantizedInput::representative`] before the
/// encoder declared its structural problem — by the time this function
/// reads off `b_e`/`h_g` as constant terms, they are already linear in
/// selector binaries, so the one McCormick linearization happens at
/// substitution time, not here.
pub fn apply_primal_dual(
    backend: &mut dyn SolverBackend,
    problem: &InnerProblem,
) -> MetaOptResult<PrimalDualDuals> {
    let Some(objective) = &problem.objective else {
        return contract_violation("primal-dual rewrite requires an optimization inner problem, not a feasibility-only one");
    };

    let inequality_multipliers: Vec<Variable> = (0..problem.inequalities.len())
        .map(|i| backend.create_variable(&format!("pd_lambda[{i}]"), VarKind::Continuous, 0.0, f64::INFINITY))
        .collect();
    let equality_multipliers: Vec<Variable> = (0..problem.equalities.len())
        .map(|i| backend.create_variable(&format!("pd_mu[{i}]"), VarKind::Continuous, f64::NEG_INFINITY, f64::INFINITY))
        .collect();

    // Dual feasibility: A^T mu + G^T lambda = c (the dual program's own
    // feasible region), per y-component. Algebraically identical to the
    // KKT rewrite's stationarity condition; here it is one half of "primal
    // feasible + dual feasible + strong duality implies both optimal"
    // rather than being paired with per-row complementary slackness.
    for &y in &problem.primal_variables {
        let mut dual_feasibility = Polynomial::constant(objective.coefficient_of(y, 1));
        for (g, inequality) in problem.inequalities.iter().enumerate() {
            let coeff = inequality.coefficient_of(y, 1);
            if coeff != 0.0 {
                dual_feasibility = dual_feasibility.sub(&Polynomial::from_variable(coeff, inequality_multipliers[g]));
            }
        }
        for (e, equality) in problem.equalities.iter().enumerate() {
            let coeff = equality.coefficient_of(y, 1);
            if coeff != 0.0 {
                dual_feasibility = dual_feasibility.sub(&Polynomial::from_variable(coeff, equality_multipliers[e]));
            }
        }
        backend.add_eq_zero(dual_feasibility);
    }

    let mut duality_rhs = Polynomial::zero();
    for (e, equality) in problem.equalities.iter().enumerate() {
        let b_e = -constant_term(equality);
        duality_rhs = duality_rhs.add(&Polynomial::from_variable(b_e, equality_multipliers[e]));
    }
    for (g, inequality) in problem.inequalities.iter().enumerate() {
        let h_g = -constant_term(inequality);
        duality_rhs = duality_rhs.add(&Polynomial::from_variable(h_g, inequality_multipliers[g]));
    }

    backend.add_eq_zero(objective.sub(&duality_rhs));

    Ok(PrimalDualDuals {
        inequality_multipliers,
        equality_multipliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::solver::milp::ReferenceMilpBackend;
    use crate::terminators::TimeOutTerminator;

    #[test]
    fn strong_duality_certificate_matches_primal_optimum() {
        // maximize y - x s.t. x + 2y = 10, x,y >= 0.
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 0.0, f64::INFINITY);
        let y = backend.create_variable("y", VarKind::Continuous, 0.0, f64::INFINITY);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);
        let equality = xp.clone().add(&yp.scale(2.0)).add(&Polynomial::constant(-10.0));
        let objective = yp.sub(&xp);
        let problem = InnerProblem::optimization(vec![x, y], vec![equality.clone()], vec![], objective.clone());

        backend.add_eq_zero(equality);
        apply_primal_dual(&mut backend, &problem).unwrap();

        let mut callback = NoOpCallback;
        let mut terminator = TimeOutTerminator::new(5);
        let (status, values) = backend.maximize(&objective, true, &mut callback, &mut terminator).unwrap();
        assert_eq!(status, crate::solver::Status::Optimal);
        assert!((values.get(x) - 0.0).abs() < 1e-4);
        assert!((values.get(y) - 5.0).abs() < 1e-4);
    }
}

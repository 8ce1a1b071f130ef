//! KKT rewrite (`spec.md` §4.4.1): stationarity, primal/dual feasibility,
//! and complementary slackness via SOS-1 when the back end supports it,
//! else big-M binaries.

use crate::algebra::Polynomial;
use crate::callback::Callback;
use crate::encoder::InnerProblem;
use crate::error::{contract_violation, MetaOptResult};
use crate::solver::{SolverBackend, VarKind, Variable};

/// The dual variables this rewrite introduced, kept around for callers that
/// want to read off dual values (e.g. invariant I3's dual certificate
/// check, which is cheaper to verify against the primal-dual rewrite but
/// is occasionally also checked here).
pub struct KktDuals {
    pub inequality_multipliers: Vec<Variable>,
    pub equality_multipliers: Vec<Variable>,
}

/// Applies the KKT rewrite to `problem` against `backend`. Primal
/// feasibility (`problem.equalities`/`inequalities`) must already have been
/// asserted by the encoder; this function only adds stationarity, dual
/// feasibility, and complementary slackness.
pub fn apply_kkt(
    backend: &mut dyn SolverBackend,
    problem: &InnerProblem,
    big_m: f64,
    callback: &mut dyn Callback,
) -> MetaOptResult<KktDuals> {
    let Some(objective) = &problem.objective else {
        return contract_violation("KKT rewrite requires an optimization inner problem, not a feasibility-only one");
    };

    let inequality_multipliers: Vec<Variable> = (0..problem.inequalities.len())
        .map(|i| backend.create_variable(&format!("kkt_lambda[{i}]"), VarKind::Continuous, 0.0, f64::INFINITY))
        .collect();
    let equality_multipliers: Vec<Variable> = (0..problem.equalities.len())
        .map(|i| backend.create_variable(&format!("kkt_mu[{i}]"), VarKind::Continuous, f64::NEG_INFINITY, f64::INFINITY))
        .collect();

    // Stationarity: c_j - sum_g G[g][j] lambda_g - sum_e A[e][j] mu_e = 0.
    for &y in &problem.primal_variables {
        let mut stationarity = Polynomial::constant(objective.coefficient_of(y, 1));
        for (g, inequality) in problem.inequalities.iter().enumerate() {
            let coeff = inequality.coefficient_of(y, 1);
            if coeff != 0.0 {
                stationarity = stationarity.sub(&Polynomial::from_variable(coeff, inequality_multipliers[g]));
            }
        }
        for (e, equality) in problem.equalities.iter().enumerate() {
            let coeff = equality.coefficient_of(y, 1);
            if coeff != 0.0 {
                stationarity = stationarity.sub(&Polynomial::from_variable(coeff, equality_multipliers[e]));
            }
        }
        backend.add_eq_zero(stationarity);
    }

    // Complementary slackness: either the inequality's slack is zero or its
    // multiplier is zero.
    for (g, inequality) in problem.inequalities.iter().enumerate() {
        let slack = backend.create_variable(&format!("kkt_slack[{g}]"), VarKind::Continuous, 0.0, f64::INFINITY);
        // slack = -(Gy - h) = -inequality
        backend.add_eq_zero(Polynomial::from_variable(1.0, slack).add(inequality));

        if backend.supports_sos1() {
            backend.add_sos1(vec![slack, inequality_multipliers[g]]);
        } else {
            callback.on_big_m_fallback(big_m);
            let switch = backend.create_variable(&format!("kkt_cs_switch[{g}]"), VarKind::Binary, 0.0, 1.0);
            // switch = 1 => slack = 0:  slack <= big_m * (1 - switch)
            backend.add_leq_zero(
                Polynomial::from_variable(1.0, slack)
                    .add(&Polynomial::from_variable(big_m, switch))
                    .add(&Polynomial::constant(-big_m)),
            );
            // switch = 0 => lambda = 0: lambda <= big_m * switch
            backend.add_leq_zero(
                Polynomial::from_variable(1.0, inequality_multipliers[g]).sub(&Polynomial::from_variable(big_m, switch)),
            );
        }
    }

    Ok(KktDuals {
        inequality_multipliers,
        equality_multipliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::solver::milp::ReferenceMilpBackend;
    use crate::solver::DEFAULT_BIG_M;
    use crate::terminators::TimeOutTerminator;

    #[test]
    fn kkt_sanity_scenario() {
        // maximize y - x s.t. x + 2y = 10, x,y >= 0, objective <= 100.
        let mut backend = ReferenceMilpBackend::new(true);
        let x = backend.create_variable("x", VarKind::Continuous, 0.0, f64::INFINITY);
        let y = backend.create_variable("y", VarKind::Continuous, 0.0, f64::INFINITY);
        let xp = Polynomial::from_variable(1.0, x);
        let yp = Polynomial::from_variable(1.0, y);

        let equality = xp.clone().add(&yp.scale(2.0)).add(&Polynomial::constant(-10.0));
        let objective = yp.sub(&xp);
        let problem = InnerProblem::optimization(vec![x, y], vec![equality.clone()], vec![], objective.clone());

        backend.add_eq_zero(equality);
        let global = backend.create_variable("global", VarKind::Continuous, f64::NEG_INFINITY, 100.0);
        backend.add_eq_zero(Polynomial::from_variable(1.0, global).sub(&objective));

        let mut callback = NoOpCallback;
        apply_kkt(&mut backend, &problem, DEFAULT_BIG_M, &mut callback).unwrap();

        let mut terminator = TimeOutTerminator::new(5);
        let (status, values) = backend
            .maximize(&Polynomial::from_variable(1.0, global), true, &mut callback, &mut terminator)
            .unwrap();
        assert_eq!(status, crate::solver::Status::Optimal);
        assert!((values.get(x) - 0.0).abs() < 1e-4);
        assert!((values.get(y) - 5.0).abs() < 1e-4);
    }
}

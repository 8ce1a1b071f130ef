//! Encoder contract (component C3): `Encode`/`ExtractSolution`, the
//! structural declaration (component C4 reads this to build a rewrite),
//! and the shared input-variable plumbing every encoder needs to
//! participate in a bilevel invocation alongside another encoder.

use std::collections::HashMap;

use crate::algebra::Polynomial;
use crate::error::{contract_violation, MetaOptResult};
use crate::solver::{SolverBackend, SolverValues, VarKind, Variable};

pub mod bin_packing;
pub mod demand_pinning;
pub mod packet_scheduling;
pub mod pop;
pub mod traffic;

/// The structural declaration every encoder exposes in addition to the
/// [`Encoding`] it returns (`spec.md` §4.3 invariant 5): the ordered primal
/// variables, equality/inequality constraints (each as `poly = 0` /
/// `poly <= 0`), and — for encoders whose inner problem is a genuine
/// optimization — the objective being maximized. Encoders whose heuristic
/// is inherently non-convex and can only be expressed as a deterministic
/// feasibility program (`spec.md` §4.4.3) leave `objective` `None`; C4
/// then emits only the feasibility rewrite (in practice: nothing beyond
/// what the encoder already asserted, since the program's primal
/// feasibility constraints already pin the unique feasible point).
#[derive(Debug, Clone, Default)]
pub struct InnerProblem {
    pub primal_variables: Vec<Variable>,
    pub equalities: Vec<Polynomial>,
    pub inequalities: Vec<Polynomial>,
    pub objective: Option<Polynomial>,
}

impl InnerProblem {
    pub fn optimization(
        primal_variables: Vec<Variable>,
        equalities: Vec<Polynomial>,
        inequalities: Vec<Polynomial>,
        objective: Polynomial,
    ) -> Self {
        Self {
            primal_variables,
            equalities,
            inequalities,
            objective: Some(objective),
        }
    }

    pub fn feasibility(primal_variables: Vec<Variable>, equalities: Vec<Polynomial>, inequalities: Vec<Polynomial>) -> Self {
        Self {
            primal_variables,
            equalities,
            inequalities,
            objective: None,
        }
    }

    pub fn is_feasibility_only(&self) -> bool {
        self.objective.is_none()
    }
}

/// Emitted by an encoder (`spec.md` §3 "Encoding").
#[derive(Debug, Clone)]
pub struct Encoding {
    pub inner_max_objective: Polynomial,
    pub global_objective: Variable,
    pub input_variables: HashMap<usize, Vec<Variable>>,
}

/// The values of an encoder's inputs, primary decision variables, and
/// scalar global objective, read back out of a solver result (`spec.md` §3
/// "Solution").
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub input_values: HashMap<usize, Vec<f64>>,
    pub variable_values: HashMap<Variable, f64>,
    pub global_objective: f64,
}

/// Component C3's contract.
pub trait Encoder {
    /// Builds this encoder's inner problem against `backend`, reusing
    /// `pre_input_variables` verbatim when given (invariant 1: this is how
    /// two encoders share adversarial inputs) and pinning any input named
    /// in `input_equalities` (invariant 4).
    fn encode(
        &mut self,
        backend: &mut dyn SolverBackend,
        pre_input_variables: Option<&HashMap<usize, Vec<Variable>>>,
        input_equalities: Option<&HashMap<usize, Vec<f64>>>,
    ) -> MetaOptResult<Encoding>;

    /// The structural declaration C4 reads to build a rewrite.
    fn inner_problem(&self) -> &InnerProblem;

    /// Reads this encoder's solution back out of a solver result.
    /// Idempotent (I5): calling this twice on the same `values` returns
    /// structurally equal solutions, since it is a pure read.
    fn extract_solution(&self, values: &SolverValues) -> Solution;

    /// Hook the driver consults before applying the primal-dual rewrite to
    /// this encoder's [`InnerProblem`]. Most encoders accept it; the direct
    /// (non-quantized) demand-pinning threshold test overrides this to
    /// return a contract violation (`spec.md` §9 "not verified").
    fn rejects_primal_dual_rewrite(&self) -> MetaOptResult<()> {
        Ok(())
    }
}

/// Creates (or reuses) one input variable per `(index, dimension)` pair,
/// pinning any value present in `input_equalities`. Shared by every
/// encoder in [`encoder`](self) so invariant 1 (shared inputs) and
/// invariant 4 (pinning) are implemented exactly once.
pub fn resolve_input_variables(
    backend: &mut dyn SolverBackend,
    num_inputs: usize,
    dims: usize,
    tag_prefix: &str,
    lb: f64,
    ub: f64,
    pre_input_variables: Option<&HashMap<usize, Vec<Variable>>>,
    input_equalities: Option<&HashMap<usize, Vec<f64>>>,
) -> MetaOptResult<HashMap<usize, Vec<Variable>>> {
    let mut resolved = HashMap::with_capacity(num_inputs);
    for i in 0..num_inputs {
        let handles = match pre_input_variables.and_then(|pre| pre.get(&i)) {
            Some(handles) => handles.clone(),
            None => (0..dims)
                .map(|d| backend.create_variable(&format!("{tag_prefix}[{i}][{d}]"), VarKind::Continuous, lb, ub))
                .collect(),
        };
        if handles.len() != dims {
            return contract_violation(format!(
                "{tag_prefix}: input {i} expected {dims} dimension(s), got {}",
                handles.len()
            ));
        }
        if let Some(values) = input_equalities.and_then(|eq| eq.get(&i)) {
            for (&handle, &value) in handles.iter().zip(values) {
                backend.add_eq_zero(Polynomial::from_variable(1.0, handle).add(&Polynomial::constant(-value)));
            }
        }
        resolved.insert(i, handles);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::encoder::bin_packing::{FfdEncoder, FfdWeight, VbpOptimalEncoder};
    use crate::encoder::demand_pinning::{DemandPinningEncoder, ThresholdTest};
    use crate::encoder::packet_scheduling::{PacketSchedulingEncoder, SchedulingPolicy};
    use crate::encoder::pop::{ExpectedPopEncoder, PopEncoder, SampleAggregation};
    use crate::encoder::traffic::{Commodity, TrafficEncoder};
    use crate::external::{Bins, LevelSet, Partitions, Topology};

    fn diamond_commodities() -> (Topology, Vec<Commodity>) {
        let mut topology = Topology::new(2);
        topology.add_edge(0, 1, 10.0);
        (topology, vec![Commodity::new(0, 1, vec![vec![(0, 1)]])])
    }

    /// Each encoder's `rejects_primal_dual_rewrite` hook must match
    /// `spec.md` §9's soundness table: encoders whose constraints put the
    /// adversarial input on the RHS of an inequality (traffic, POP,
    /// direct-test demand pinning) reject the primal-dual rewrite; every
    /// other encoder accepts it.
    #[rstest]
    #[case::traffic("traffic", true)]
    #[case::pop("pop", true)]
    #[case::expected_pop("expected_pop", true)]
    #[case::demand_pinning_direct("demand_pinning_direct", true)]
    #[case::demand_pinning_quantized("demand_pinning_quantized", false)]
    #[case::packet_scheduling("packet_scheduling", false)]
    #[case::vbp_optimal("vbp_optimal", false)]
    #[case::ffd("ffd", false)]
    fn rejects_primal_dual_rewrite_matches_soundness_table(#[case] tag: &str, #[case] expects_rejection: bool) {
        let (topology, commodities) = diamond_commodities();
        let rejected = match tag {
            "traffic" => TrafficEncoder::new(topology, commodities, 10.0).rejects_primal_dual_rewrite().is_err(),
            "pop" => PopEncoder::new(topology, commodities, 10.0, Partitions::new(vec![0]))
                .rejects_primal_dual_rewrite()
                .is_err(),
            "expected_pop" => ExpectedPopEncoder::new(
                topology,
                commodities,
                10.0,
                vec![Partitions::new(vec![0])],
                SampleAggregation::Average,
            )
            .rejects_primal_dual_rewrite()
            .is_err(),
            "demand_pinning_direct" => {
                DemandPinningEncoder::new(topology, commodities, 10.0, 5.0, ThresholdTest::Direct, None)
                    .rejects_primal_dual_rewrite()
                    .is_err()
            }
            "demand_pinning_quantized" => DemandPinningEncoder::new(
                topology,
                commodities,
                10.0,
                5.0,
                ThresholdTest::Quantized(LevelSet::new(vec![0.0, 5.0, 10.0])),
                None,
            )
            .rejects_primal_dual_rewrite()
            .is_err(),
            "packet_scheduling" => {
                PacketSchedulingEncoder::new(vec![0, 1, 2], 2, 2, 3, SchedulingPolicy::Pifo)
                    .rejects_primal_dual_rewrite()
                    .is_err()
            }
            "vbp_optimal" => VbpOptimalEncoder::new(Bins::uniform(2, vec![1.0]), 2, 1.0)
                .rejects_primal_dual_rewrite()
                .is_err(),
            "ffd" => FfdEncoder::new(Bins::uniform(2, vec![1.0]), 2, 1.0, FfdWeight::Sum, vec![0, 1])
                .rejects_primal_dual_rewrite()
                .is_err(),
            other => panic!("unknown case tag: {other}"),
        };
        assert_eq!(rejected, expects_rejection);
    }
}

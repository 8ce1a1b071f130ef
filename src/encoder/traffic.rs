//! Traffic-engineering max-flow optimal encoder (`spec.md` §4.5).
//!
//! Primal variables are per-commodity, per-path flows; constraints are
//! per-edge capacity and per-commodity flow <= demand; the objective is
//! total demand met. Demands are the shared adversarial input.

use std::collections::HashMap;

use crate::algebra::Polynomial;
use crate::encoder::{resolve_input_variables, Encoder, Encoding, InnerProblem, Solution};
use crate::error::{contract_violation, MetaOptResult};
use crate::external::Topology;
use crate::solver::{SolverBackend, SolverValues, VarKind, Variable};

/// A single commodity: a (src, dst) pair with `k` precomputed candidate
/// paths, each a sequence of directed edges.
#[derive(Debug, Clone)]
pub struct Commodity {
    pub src: usize,
    pub dst: usize,
    pub paths: Vec<Vec<(usize, usize)>>,
}

impl Commodity {
    pub fn new(src: usize, dst: usize, paths: Vec<Vec<(usize, usize)>>) -> Self {
        Self { src, dst, paths }
    }
}

pub struct TrafficEncoder {
    topology: Topology,
    commodities: Vec<Commodity>,
    demand_ub: f64,
    problem: InnerProblem,
    flow_variables: Vec<Vec<Variable>>,
    input_variables: HashMap<usize, Vec<Variable>>,
    global_objective: Option<Variable>,
}

impl TrafficEncoder {
    pub fn new(topology: Topology, commodities: Vec<Commodity>, demand_ub: f64) -> Self {
        Self {
            topology,
            commodities,
            demand_ub,
            problem: InnerProblem::default(),
            flow_variables: Vec::new(),
            input_variables: HashMap::new(),
            global_objective: None,
        }
    }

    /// The flow variables this encoder created, one vector per commodity
    /// (one entry per candidate path), for use by encoders that build on
    /// top of this one (demand pinning, POP).
    pub fn flow_variables(&self) -> &[Vec<Variable>] {
        &self.flow_variables
    }

    pub fn commodities(&self) -> &[Commodity] {
        &self.commodities
    }
}

impl Encoder for TrafficEncoder {
    fn encode(
        &mut self,
        backend: &mut dyn SolverBackend,
        pre_input_variables: Option<&HashMap<usize, Vec<Variable>>>,
        input_equalities: Option<&HashMap<usize, Vec<f64>>>,
    ) -> MetaOptResult<Encoding> {
        let n = self.commodities.len();
        let inputs = resolve_input_variables(
            backend,
            n,
            1,
            "demand",
            0.0,
            self.demand_ub,
            pre_input_variables,
            input_equalities,
        )?;

        let mut flow_variables = Vec::with_capacity(n);
        let mut primal_variables = Vec::new();
        for (i, commodity) in self.commodities.iter().enumerate() {
            let vars: Vec<Variable> = (0..commodity.paths.len())
                .map(|p| backend.create_variable(&format!("flow[{i}][{p}]"), VarKind::Continuous, 0.0, self.demand_ub))
                .collect();
            primal_variables.extend(vars.iter().copied());
            flow_variables.push(vars);
        }

        let mut inequalities = Vec::new();
        for (i, demand_vars) in inputs.iter() {
            let demand = demand_vars[0];
            let mut routed = Polynomial::zero();
            for &f in &flow_variables[*i] {
                routed = routed.add(&Polynomial::from_variable(1.0, f));
            }
            let inequality = routed.sub(&Polynomial::from_variable(1.0, demand));
            backend.add_leq_zero(inequality.copy());
            inequalities.push(inequality);
        }

        for &(from, to, capacity) in self.topology.edges() {
            let mut usage = Polynomial::zero();
            for (i, commodity) in self.commodities.iter().enumerate() {
                for (p, path) in commodity.paths.iter().enumerate() {
                    if path.contains(&(from, to)) {
                        usage = usage.add(&Polynomial::from_variable(1.0, flow_variables[i][p]));
                    }
                }
            }
            if usage.is_empty() {
                continue;
            }
            let inequality = usage.add(&Polynomial::constant(-capacity));
            backend.add_leq_zero(inequality.copy());
            inequalities.push(inequality);
        }

        let mut objective = Polynomial::zero();
        for vars in &flow_variables {
            for &f in vars {
                objective = objective.add(&Polynomial::from_variable(1.0, f));
            }
        }

        let global = backend.create_variable("traffic_global", VarKind::Continuous, f64::NEG_INFINITY, f64::INFINITY);
        backend.add_eq_zero(Polynomial::from_variable(1.0, global).sub(&objective));

        self.flow_variables = flow_variables;
        self.input_variables = inputs.clone();
        self.global_objective = Some(global);
        self.problem = InnerProblem::optimization(primal_variables, vec![], inequalities, objective.clone());

        Ok(Encoding {
            inner_max_objective: objective,
            global_objective: global,
            input_variables: inputs,
        })
    }

    fn inner_problem(&self) -> &InnerProblem {
        &self.problem
    }

    fn extract_solution(&self, values: &SolverValues) -> Solution {
        let input_values = self
            .input_variables
            .iter()
            .map(|(i, vars)| (*i, vars.iter().map(|&v| values.get(v)).collect()))
            .collect();
        let mut variable_values = HashMap::new();
        for vars in &self.flow_variables {
            for &f in vars {
                variable_values.insert(f, values.get(f));
            }
        }
        let global_objective = self.global_objective.map(|g| values.get(g)).unwrap_or(0.0);
        Solution {
            input_values,
            variable_values,
            global_objective,
        }
    }

    fn rejects_primal_dual_rewrite(&self) -> MetaOptResult<()> {
        // The per-commodity constraint is `routed - demand <= 0`: `demand`
        // is the adversarial input, not a literal constant, so it appears
        // in the RHS of a constraint the primal-dual rewrite's
        // `constant_term()` would misread as fixed.
        contract_violation(
            "traffic encoder: demand appears as a free input in the RHS of routed <= demand; not verified under the primal-dual rewrite",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::solver::milp::ReferenceMilpBackend;
    use crate::solver::Status;
    use crate::terminators::TimeOutTerminator;

    fn diamond() -> Topology {
        let mut topology = Topology::new(4);
        topology.add_edge(0, 1, 10.0);
        topology.add_edge(0, 2, 10.0);
        topology.add_edge(1, 3, 10.0);
        topology.add_edge(2, 3, 10.0);
        topology
    }

    #[test]
    fn diamond_topology_max_flow_scenario() {
        // `spec.md` §8 scenario 1 (diamond topology, k=1 path per
        // commodity): "optimal.total = 40, flow on (a,b) = 10, flow on
        // (a,d) = 0". One commodity per edge (a-b, a-c, b-d, c-d), each
        // with its single direct-edge path and a demand bound matching
        // that edge's capacity (10): fully satisfying all four gives the
        // literal total of 40. There is no direct a-d edge in this
        // topology, so "flow on (a,d)" is the flow on a commodity that
        // doesn't exist here - trivially zero.
        let topology = diamond();
        let commodities = vec![
            Commodity::new(0, 1, vec![vec![(0, 1)]]),
            Commodity::new(0, 2, vec![vec![(0, 2)]]),
            Commodity::new(1, 3, vec![vec![(1, 3)]]),
            Commodity::new(2, 3, vec![vec![(2, 3)]]),
        ];
        let mut encoder = TrafficEncoder::new(topology, commodities, 10.0);

        let mut backend = ReferenceMilpBackend::new(true);
        let encoding = encoder.encode(&mut backend, None, None).unwrap();

        // Pin every commodity's demand to its edge's capacity (10) so the
        // optimum must route exactly that much on each edge.
        for i in 0..4 {
            backend.add_eq_zero(
                Polynomial::from_variable(1.0, encoding.input_variables[&i][0]).add(&Polynomial::constant(-10.0)),
            );
        }

        let mut callback = NoOpCallback;
        let mut terminator = TimeOutTerminator::new(5);
        let (status, values) = backend
            .maximize(&encoding.inner_max_objective, true, &mut callback, &mut terminator)
            .unwrap();
        assert_eq!(status, Status::Optimal);
        let solution = encoder.extract_solution(&values);
        assert!((solution.global_objective - 40.0).abs() < 1e-4);

        let flow_ab = encoder.flow_variables()[0][0];
        assert!((values.get(flow_ab) - 10.0).abs() < 1e-4);
    }
}

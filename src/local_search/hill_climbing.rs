//! Hill-climbing baseline (`spec.md` §4.8): from a seeded input, at each
//! step draw `numNeighbors` Gaussian perturbations clipped to the feasible
//! box, move to the best strictly-improving neighbor, and stop once
//! `maxNoImprovementSteps` consecutive steps fail to improve.

use std::collections::HashMap;
use std::time::Instant;

use crate::callback::Callback;
use crate::encoder::Encoder;
use crate::error::MetaOptResult;
use crate::local_search::{evaluate, EvaluatedPoint, Xorshift64};
use crate::solver::SolverBackend;

pub struct HillClimbingOptions {
    pub num_neighbors: usize,
    pub sigma: f64,
    pub seed: u64,
    pub max_no_improvement_steps: usize,
    pub timeout_secs_per_eval: u64,
}

fn clip(value: f64, lb: f64, ub: f64) -> f64 {
    value.max(lb).min(ub)
}

fn perturb(rng: &mut Xorshift64, input: &HashMap<usize, Vec<f64>>, sigma: f64, input_ub: f64) -> HashMap<usize, Vec<f64>> {
    input
        .iter()
        .map(|(&i, vars)| (i, vars.iter().map(|&v| clip(v + rng.normal() * sigma, 0.0, input_ub)).collect()))
        .collect()
}

/// Runs hill climbing from `seed_input`. Returns the best point found and
/// the full evaluation trace in step order.
pub fn hill_climb(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    seed_input: HashMap<usize, Vec<f64>>,
    input_ub: f64,
    options: &HillClimbingOptions,
    callback: &mut dyn Callback,
) -> MetaOptResult<(EvaluatedPoint, Vec<EvaluatedPoint>)> {
    let mut rng = Xorshift64::new(options.seed);
    let start = Instant::now();

    let seed_gap = evaluate(backend, optimal, heuristic, &seed_input, options.timeout_secs_per_eval, callback)?;
    let mut current = EvaluatedPoint {
        input: seed_input,
        gap: seed_gap,
        timestamp_ms: start.elapsed().as_millis() as u64,
    };
    let mut trace = vec![current.clone()];
    let mut stalled = 0;

    while stalled < options.max_no_improvement_steps {
        let mut best_neighbor: Option<EvaluatedPoint> = None;
        for _ in 0..options.num_neighbors {
            let candidate_input = perturb(&mut rng, &current.input, options.sigma, input_ub);
            let gap = evaluate(backend, optimal, heuristic, &candidate_input, options.timeout_secs_per_eval, callback)?;
            let candidate = EvaluatedPoint {
                input: candidate_input,
                gap,
                timestamp_ms: start.elapsed().as_millis() as u64,
            };
            trace.push(candidate.clone());
            let replace = match &best_neighbor {
                None => true,
                Some(current_best) => candidate.gap > current_best.gap,
            };
            if replace {
                best_neighbor = Some(candidate);
            }
        }

        match best_neighbor {
            Some(candidate) if candidate.gap > current.gap => {
                current = candidate;
                stalled = 0;
            }
            _ => stalled += 1,
        }
    }

    Ok((current, trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::NoOpCallback;
    use crate::encoder::demand_pinning::{DemandPinningEncoder, ThresholdTest};
    use crate::encoder::traffic::{Commodity, TrafficEncoder};
    use crate::external::Topology;
    use crate::solver::milp::ReferenceMilpBackend;

    fn diamond() -> Topology {
        let mut topology = Topology::new(4);
        topology.add_edge(0, 1, 10.0);
        topology.add_edge(0, 2, 10.0);
        topology.add_edge(1, 3, 10.0);
        topology.add_edge(2, 3, 10.0);
        topology
    }

    #[test]
    fn hill_climb_never_regresses_below_seed() {
        let topology = diamond();
        let paths = topology.k_shortest_paths(0, 3, 2);
        let commodity = Commodity::new(0, 3, paths);

        let mut backend = ReferenceMilpBackend::new(true);
        let mut optimal = TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0);
        let mut heuristic = DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None);

        let mut seed_input = HashMap::new();
        seed_input.insert(0, vec![5.0]);

        let options = HillClimbingOptions {
            num_neighbors: 3,
            sigma: 2.0,
            seed: 7,
            max_no_improvement_steps: 2,
            timeout_secs_per_eval: 5,
        };
        let mut callback = NoOpCallback;
        let (best, trace) =
            hill_climb(&mut backend, &mut optimal, &mut heuristic, seed_input, 40.0, &options, &mut callback).unwrap();
        assert!(best.gap >= trace[0].gap - 1e-9);
    }
}

//! Random sampling baseline (`spec.md` §4.8): draw `numTrials` i.i.d. inputs
//! from the feasible box, evaluate both encoders via the shared hook, and
//! report the best gap seen. Trials are recorded in draw order with
//! timestamps so a caller can chart progress the same way the driver does.

use std::collections::HashMap;
use std::time::Instant;

use crate::callback::Callback;
use crate::encoder::Encoder;
use crate::error::MetaOptResult;
use crate::local_search::{evaluate, EvaluatedPoint, Xorshift64};
use crate::solver::SolverBackend;

pub struct RandomSearchOptions {
    pub num_trials: usize,
    pub seed: u64,
    pub timeout_secs_per_trial: u64,
}

/// Draws `options.num_trials` inputs uniformly from `[0, input_ub]^dims` per
/// index and evaluates each. Returns the best point and the full trace.
pub fn random_search(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    num_inputs: usize,
    dims: usize,
    input_ub: f64,
    options: &RandomSearchOptions,
    callback: &mut dyn Callback,
) -> MetaOptResult<(EvaluatedPoint, Vec<EvaluatedPoint>)> {
    let mut rng = Xorshift64::new(options.seed);
    let start = Instant::now();
    let mut trace = Vec::with_capacity(options.num_trials);

    for _ in 0..options.num_trials {
        let mut input = HashMap::with_capacity(num_inputs);
        for i in 0..num_inputs {
            input.insert(i, (0..dims).map(|_| rng.uniform(0.0, input_ub)).collect());
        }
        let gap = evaluate(backend, optimal, heuristic, &input, options.timeout_secs_per_trial, callback)?;
        trace.push(EvaluatedPoint {
            input,
            gap,
            timestamp_ms: start.elapsed().as_millis() as u64,
        });
    }

    let mut best = trace[0].clone();
    for point in &trace[1..] {
        if point.gap > best.gap {
            best = point.clone();
        }
    }
    Ok((best, trace))
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
    fn random_search_finds_a_nonnegative_gap() {
        let topology = diamond();
        let paths = topology.k_shortest_paths(0, 3, 2);
        let commodity = Commodity::new(0, 3, paths);

        let mut backend = ReferenceMilpBackend::new(true);
        let mut optimal = TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0);
        let mut heuristic = DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None);

        let options = RandomSearchOptions {
            num_trials: 5,
            seed: 42,
            timeout_secs_per_trial: 5,
        };
        let mut callback = NoOpCallback;
        let (best, trace) =
            random_search(&mut backend, &mut optimal, &mut heuristic, 1, 1, 40.0, &options, &mut callback).unwrap();
        assert_eq!(trace.len(), 5);
        assert!(best.gap >= -1e-6);
    }
}

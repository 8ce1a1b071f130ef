//! Simulated-annealing baseline (`spec.md` §4.8): like hill climbing, but
//! accepts worsening moves with probability `exp(-delta / T)`, cools
//! geometrically (`T <- T * decay`), and resets the temperature after
//! `numNoIncreaseToReset` consecutive steps without a new best. A "grey"
//! mode restricts perturbations to structural near-neighbors (e.g. the same
//! partition) instead of Gaussian noise, for domains where Euclidean
//! perturbation of the raw input doesn't make sense.

use std::collections::HashMap;
use std::time::Instant;

use crate::callback::Callback;
use crate::encoder::Encoder;
use crate::error::MetaOptResult;
use crate::local_search::{evaluate, EvaluatedPoint, Xorshift64};
use crate::solver::SolverBackend;

/// A structural near-neighbor generator for "grey" mode: e.g. swap two
/// inputs assigned to the same partition instead of adding Gaussian noise.
/// What "structural" means is domain-specific, so callers supply it.
pub trait StructuralNeighbor {
    fn neighbor(&self, rng: &mut Xorshift64, input: &HashMap<usize, Vec<f64>>) -> HashMap<usize, Vec<f64>>;
}

pub enum PerturbationMode {
    Gaussian { sigma: f64 },
    Grey(Box<dyn StructuralNeighbor>),
}

pub struct SimulatedAnnealingOptions {
    pub initial_temperature: f64,
    pub decay: f64,
    pub num_no_increase_to_reset: usize,
    pub max_steps: usize,
    pub seed: u64,
    pub mode: PerturbationMode,
    pub timeout_secs_per_eval: u64,
}

fn clip(value: f64, lb: f64, ub: f64) -> f64 {
    value.max(lb).min(ub)
}

fn perturb(rng: &mut Xorshift64, input: &HashMap<usize, Vec<f64>>, mode: &PerturbationMode, input_ub: f64) -> HashMap<usize, Vec<f64>> {
    match mode {
        PerturbationMode::Gaussian { sigma } => input
            .iter()
            .map(|(&i, vars)| (i, vars.iter().map(|&v| clip(v + rng.normal() * sigma, 0.0, input_ub)).collect()))
            .collect(),
        PerturbationMode::Grey(neighbor) => neighbor.neighbor(rng, input),
    }
}

/// Runs simulated annealing from `seed_input`. Returns the best point seen
/// — not necessarily the final accepted point, since worsening moves are
/// accepted probabilistically — plus the full evaluation trace.
pub fn simulated_anneal(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    seed_input: HashMap<usize, Vec<f64>>,
    input_ub: f64,
    options: &SimulatedAnnealingOptions,
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
    let mut best = current.clone();
    let mut trace = vec![current.clone()];

    let mut temperature = options.initial_temperature;
    let mut stalled = 0;

    for _ in 0..options.max_steps {
        let candidate_input = perturb(&mut rng, &current.input, &options.mode, input_ub);
        let gap = evaluate(backend, optimal, heuristic, &candidate_input, options.timeout_secs_per_eval, callback)?;
        let candidate = EvaluatedPoint {
            input: candidate_input,
            gap,
            timestamp_ms: start.elapsed().as_millis() as u64,
        };
        trace.push(candidate.clone());

        let delta = candidate.gap - current.gap;
        let accept = delta > 0.0 || rng.next_f64() < (delta / temperature.max(1e-9)).exp();
        if accept {
            current = candidate.clone();
        }
        if candidate.gap > best.gap {
            best = candidate;
            stalled = 0;
        } else {
            stalled += 1;
        }

        temperature *= options.decay;
        if stalled >= options.num_no_increase_to_reset {
            temperature = options.initial_temperature;
            stalled = 0;
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
    fn simulated_annealing_tracks_a_best_at_least_as_good_as_seed() {
        let topology = diamond();
        let paths = topology.k_shortest_paths(0, 3, 2);
        let commodity = Commodity::new(0, 3, paths);

        let mut backend = ReferenceMilpBackend::new(true);
        let mut optimal = TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0);
        let mut heuristic = DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None);

        let mut seed_input = HashMap::new();
        seed_input.insert(0, vec![5.0]);

        let options = SimulatedAnnealingOptions {
            initial_temperature: 5.0,
            decay: 0.9,
            num_no_increase_to_reset: 3,
            max_steps: 4,
            seed: 11,
            mode: PerturbationMode::Gaussian { sigma: 2.0 },
            timeout_secs_per_eval: 5,
        };
        let mut callback = NoOpCallback;
        let (best, trace) =
            simulated_anneal(&mut backend, &mut optimal, &mut heuristic, seed_input, 40.0, &options, &mut callback).unwrap();
        assert!(best.gap >= trace[0].gap - 1e-9);
    }
}

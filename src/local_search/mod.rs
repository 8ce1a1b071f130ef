//! Local-search baselines (component C8, `spec.md` §4.8): random sampling,
//! hill climbing, and simulated annealing over the input space alone, using
//! encoders only as evaluators — bypassing the C4 rewrite entirely, since
//! the adversarial input is fixed rather than maximized over. All three
//! share the evaluation hook in this module and the same `Callback`-based
//! progress-logging contract as the MILP-backed driver (`crate::driver`).

pub mod hill_climbing;
pub mod random;
pub mod simulated_annealing;

use std::collections::HashMap;

use crate::callback::Callback;
use crate::encoder::Encoder;
use crate::error::{MetaOptError, MetaOptResult};
use crate::solver::{CleanOptions, SolverBackend};
use crate::terminators::TimeOutTerminator;

/// A deterministic xorshift64 generator — the same dependency-free
/// construction `external::Topology::random_partition` already uses, reused
/// here so the local-search baselines need no external RNG crate.
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_add(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform `f64` in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform `f64` in `[lb, ub)`.
    pub fn uniform(&mut self, lb: f64, ub: f64) -> f64 {
        lb + self.next_f64() * (ub - lb)
    }

    /// Standard-normal sample via Box-Muller.
    pub fn normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// One sampled point and the gap the evaluation hook observed there.
#[derive(Debug, Clone)]
pub struct EvaluatedPoint {
    pub input: HashMap<usize, Vec<f64>>,
    pub gap: f64,
    pub timestamp_ms: u64,
}

/// The shared evaluation hook every baseline calls (`spec.md` §4.8: "all
/// three share the same evaluation hook"): pins `input` via
/// `inputEqualities`, runs both encoders as pure inner solves (no C4
/// rewrite — `x` is fixed, so each inner program is an ordinary
/// convex/feasibility program against the shared backend), and returns
/// `optimal - heuristic`.
pub fn evaluate(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    input: &HashMap<usize, Vec<f64>>,
    timeout_secs: u64,
    callback: &mut dyn Callback,
) -> MetaOptResult<f64> {
    backend.clean_all(CleanOptions {
        disable_store_progress: true,
        focus_best_bound: false,
        timeout_secs: Some(timeout_secs),
    });

    let opt_encoding = optimal.encode(backend, None, Some(input))?;
    let heu_encoding = heuristic.encode(backend, Some(&opt_encoding.input_variables), Some(input))?;

    let mut opt_terminator = TimeOutTerminator::new(timeout_secs);
    let (opt_status, opt_values) = backend.maximize(&opt_encoding.inner_max_objective, true, callback, &mut opt_terminator)?;
    if !opt_status.has_usable_incumbent() {
        return Err(MetaOptError::SolverStatusUnsupported(opt_status).into());
    }

    let mut heu_terminator = TimeOutTerminator::new(timeout_secs);
    let (heu_status, heu_values) = backend.maximize(&heu_encoding.inner_max_objective, true, callback, &mut heu_terminator)?;
    if !heu_status.has_usable_incumbent() {
        return Err(MetaOptError::SolverStatusUnsupported(heu_status).into());
    }

    let opt_value = opt_values.get(opt_encoding.global_objective);
    let heu_value = heu_values.get(heu_encoding.global_objective);
    Ok(opt_value - heu_value)
}

//! Bilevel driver (component C6): owns the shared adversarial-input
//! variables, dispatches the optimal/heuristic encoders against them, emits
//! the inner rewrite for each, and maximizes the outer gap objective.
//!
//! Mirrors the teacher's top-level solve entry points (`lp/mod.rs`'s public
//! `solve`/`solve_with_options` pair): one explicit `DriverOptions` record
//! threaded through every call instead of a process-wide singleton
//! (`spec.md` §9 Design Notes).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::algebra::Polynomial;
use crate::callback::Callback;
use crate::encoder::{Encoder, Solution};
use crate::error::{contract_violation, infeasible_input, MetaOptResult};
use crate::external::LevelSet;
use crate::rewrite::{apply_kkt, apply_primal_dual, quantize_input, QuantizedInput};
use crate::solver::{CleanOptions, SolverBackend, Status, VarKind, Variable, DEFAULT_BIG_M};
use crate::terminators::{MultipleTerminators, NoImprovementTerminator, TimeOutTerminator};

/// Which inner-problem rewrite (`spec.md` §4.4) the driver emits for a
/// convex encoder. Feasibility-only encoders (FFD, packet scheduling) never
/// consult this: the driver skips the rewrite entirely and relies on the
/// primal constraints the encoder already asserted (`spec.md` §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnerRewrite {
    Kkt,
    PrimalDual,
}

/// The "density"/"large-demand"/"max-distance" realistic-constraint family
/// (`spec.md` §9 open question (i)): sparsely documented in the source, so
/// treated here as a labeled, independently-testable clause per field.
/// `max_distance_hops` is forwarded to encoders that accept it directly
/// (e.g. `DemandPinningEncoder::new`'s `max_distance_hops` parameter) rather
/// than enforced here, since it constrains an encoder's own pinning
/// decision, not the shared input domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealisticConstraints {
    /// At least this fraction of inputs must be strictly positive.
    pub density: Option<f64>,
    /// At least one input must be at least this large.
    pub large_demand_lb: Option<f64>,
}

/// Explicit configuration record threaded through every driver entry point,
/// replacing the teacher's process-wide `SolverOptions`/`OPTION_REGISTRY`
/// singleton (`spec.md` §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOptions {
    pub big_m: f64,
    pub timeout_secs: u64,
    pub no_improvement_stall: Option<usize>,
    pub no_improvement_tolerance: f64,
    pub solver_threads: usize,
    pub realistic_constraints: RealisticConstraints,
    /// Per-input upper bounds tighter than the shared domain bound, applied
    /// before any equality (`spec.md` §4.6 "upper bounds first, equalities
    /// second").
    pub input_upper_bounds: HashMap<usize, f64>,
    pub post_pass: PostPass,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            big_m: DEFAULT_BIG_M,
            timeout_secs: 30,
            no_improvement_stall: None,
            no_improvement_tolerance: 1e-6,
            solver_threads: 1,
            realistic_constraints: RealisticConstraints::default(),
            input_upper_bounds: HashMap::new(),
            post_pass: PostPass::None,
        }
    }
}

/// A second `maximize` pass, warm-started from the first run's incumbent
/// (`reset = false`), per `spec.md` §4.6's "UBFocus/FullOpt post-pass".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostPass {
    None,
    /// Re-solve focusing the branch-and-bound on tightening the best bound.
    UbFocus,
    /// Re-solve with a fresh wall-clock budget, same warm-started incumbent.
    FullOpt,
}

/// `IDLE → ENCODING(optimal) → ENCODING(heuristic) → REWRITING → SOLVING →
/// {RETURNED | TIMEOUT_INCUMBENT | INFEASIBLE}` (`spec.md` §4.6). Transitions
/// are one-shot per invocation; the driver does not resume interrupted
/// solves except via an explicit [`PostPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    EncodingOptimal,
    EncodingHeuristic,
    Rewriting,
    Solving,
    Returned,
    TimeoutIncumbent,
    Infeasible,
}

/// Creates `num_inputs` shared input variables, each of `dims` dimensions,
/// bounded `[0, input_ub]` (`spec.md` §4.6 step 2: "create shared input
/// variables covering the maximum input space"). These are the handles both
/// encoders receive as `preInputVariables`.
fn create_shared_inputs(
    backend: &mut dyn SolverBackend,
    num_inputs: usize,
    dims: usize,
    input_ub: f64,
) -> HashMap<usize, Vec<Variable>> {
    let mut inputs = HashMap::with_capacity(num_inputs);
    for i in 0..num_inputs {
        let handles = (0..dims)
            .map(|d| backend.create_variable(&format!("x[{i}][{d}]"), VarKind::Continuous, 0.0, input_ub))
            .collect();
        inputs.insert(i, handles);
    }
    inputs
}

/// Applies per-input upper bounds (step 3) before any other outer
/// constraint, per `spec.md` §4.6's explicit ordering rule.
fn apply_input_upper_bounds(backend: &mut dyn SolverBackend, inputs: &HashMap<usize, Vec<Variable>>, options: &DriverOptions) {
    for (&i, &ub) in &options.input_upper_bounds {
        let Some(vars) = inputs.get(&i) else { continue };
        for &v in vars {
            backend.add_leq_zero(Polynomial::from_variable(1.0, v).add(&Polynomial::constant(-ub)));
        }
    }
}

/// Discretizes every shared input dimension against `level_set` (step 4),
/// required only when the primal-dual rewrite is in play (`spec.md` §4.4.2).
fn discretize_inputs(
    backend: &mut dyn SolverBackend,
    inputs: &HashMap<usize, Vec<Variable>>,
    level_set: &LevelSet,
) -> MetaOptResult<Vec<QuantizedInput>> {
    let mut quantized = Vec::new();
    for (&i, vars) in inputs {
        for (d, &v) in vars.iter().enumerate() {
            quantized.push(quantize_input(backend, &format!("x[{i}][{d}]_q"), v, level_set, false)?);
        }
    }
    Ok(quantized)
}

/// Applies the density / large-demand realistic-constraint family, in
/// declaration order, against the flattened scalar input list (every
/// dimension of every input counted once).
fn apply_realistic_constraints(backend: &mut dyn SolverBackend, inputs: &HashMap<usize, Vec<Variable>>, constraints: &RealisticConstraints, input_ub: f64) {
    let all: Vec<Variable> = inputs.values().flat_map(|vars| vars.iter().copied()).collect();
    if all.is_empty() {
        return;
    }

    if let Some(density) = constraints.density {
        let required = (density * all.len() as f64).ceil() as i64;
        let mut active_sum = Polynomial::zero();
        for &v in &all {
            let active = backend.create_variable("realistic_active", VarKind::Binary, 0.0, 1.0);
            // active = 0 => v <= 0 is not required; only v > 0 => active = 1 is,
            // so v <= input_ub * active.
            backend.add_leq_zero(Polynomial::from_variable(1.0, v).sub(&Polynomial::from_variable(input_ub, active)));
            active_sum = active_sum.add(&Polynomial::from_variable(1.0, active));
        }
        backend.add_leq_zero(Polynomial::constant(required as f64).sub(&active_sum));
    }

    if let Some(large_demand_lb) = constraints.large_demand_lb {
        let mut large_sum = Polynomial::zero();
        for &v in &all {
            let is_large = backend.create_variable("realistic_large", VarKind::Binary, 0.0, 1.0);
            // is_large = 1 => v >= large_demand_lb: large_demand_lb - v <= input_ub * (1 - is_large)
            let bound = Polynomial::constant(large_demand_lb)
                .sub(&Polynomial::from_variable(1.0, v))
                .sub(&Polynomial::constant(input_ub))
                .add(&Polynomial::from_variable(input_ub, is_large));
            backend.add_leq_zero(bound);
            large_sum = large_sum.add(&Polynomial::from_variable(1.0, is_large));
        }
        backend.add_leq_zero(Polynomial::constant(1.0).sub(&large_sum));
    }
}

/// Applies either the KKT or primal-dual rewrite to `encoder`'s declared
/// [`crate::encoder::InnerProblem`], or nothing for a feasibility-only
/// encoder. Consults [`Encoder::rejects_primal_dual_rewrite`] first so a
/// direct demand-pinning heuristic surfaces its documented "not verified"
/// contract violation instead of silently being rewritten.
fn apply_rewrite(backend: &mut dyn SolverBackend, encoder: &dyn Encoder, rewrite: InnerRewrite, big_m: f64, callback: &mut dyn Callback) -> MetaOptResult<()> {
    let problem = encoder.inner_problem();
    if problem.is_feasibility_only() {
        return Ok(());
    }
    match rewrite {
        InnerRewrite::Kkt => {
            apply_kkt(backend, problem, big_m, callback)?;
        }
        InnerRewrite::PrimalDual => {
            encoder.rejects_primal_dual_rewrite()?;
            apply_primal_dual(backend, problem)?;
        }
    }
    Ok(())
}

fn build_terminator(options: &DriverOptions) -> MultipleTerminators {
    let mut terminators: Vec<Box<dyn crate::terminators::Terminator>> = vec![Box::new(TimeOutTerminator::new(options.timeout_secs))];
    if let Some(stall) = options.no_improvement_stall {
        terminators.push(Box::new(NoImprovementTerminator::new(stall, options.no_improvement_tolerance)));
    }
    MultipleTerminators::new(terminators)
}

/// `spec.md` §4.6 `MaximizeOptimalityGap`: the driver's primary entry point.
/// Runs the full `IDLE → ... → {RETURNED | TIMEOUT_INCUMBENT | INFEASIBLE}`
/// state machine and returns both solutions plus the terminal state.
pub fn maximize_optimality_gap(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    num_inputs: usize,
    dims: usize,
    input_ub: f64,
    rewrite: InnerRewrite,
    level_set: Option<&LevelSet>,
    options: &DriverOptions,
    callback: &mut dyn Callback,
) -> MetaOptResult<(Solution, Solution, DriverState)> {
    let mut state = DriverState::Idle;

    backend.clean_all(CleanOptions {
        disable_store_progress: false,
        focus_best_bound: false,
        timeout_secs: Some(options.timeout_secs),
    });
    backend.set_timeout(options.timeout_secs);

    let inputs = create_shared_inputs(backend, num_inputs, dims, input_ub);
    apply_input_upper_bounds(backend, &inputs, options);

    if rewrite == InnerRewrite::PrimalDual {
        let Some(level_set) = level_set else {
            return contract_violation("primal-dual rewrite requires a level set for input discretization");
        };
        discretize_inputs(backend, &inputs, level_set)?;
    }

    state = DriverState::EncodingOptimal;
    let opt_encoding = optimal.encode(backend, Some(&inputs), None)?;

    state = DriverState::EncodingHeuristic;
    let heu_encoding = heuristic.encode(backend, Some(&inputs), None)?;

    apply_realistic_constraints(backend, &inputs, &options.realistic_constraints, input_ub);

    state = DriverState::Rewriting;
    apply_rewrite(backend, optimal, rewrite, options.big_m, callback)?;
    apply_rewrite(backend, heuristic, rewrite, options.big_m, callback)?;

    let gap = Polynomial::from_variable(1.0, opt_encoding.global_objective).sub(&Polynomial::from_variable(1.0, heu_encoding.global_objective));

    state = DriverState::Solving;
    let mut terminator = build_terminator(options);
    let (status, mut values) = backend.maximize(&gap, true, callback, &mut terminator)?;

    match status {
        Status::Optimal | Status::TimeLimit => {
            if matches!(options.post_pass, PostPass::UbFocus | PostPass::FullOpt) {
                if matches!(options.post_pass, PostPass::UbFocus) {
                    backend.clean_all(CleanOptions {
                        disable_store_progress: false,
                        focus_best_bound: true,
                        timeout_secs: Some(options.timeout_secs),
                    });
                }
                let mut post_terminator = build_terminator(options);
                let (post_status, post_values) = backend.maximize(&gap, false, callback, &mut post_terminator)?;
                if post_status.has_usable_incumbent() {
                    values = post_values;
                }
            }
            state = if status == Status::Optimal {
                DriverState::Returned
            } else {
                DriverState::TimeoutIncumbent
            };
        }
        Status::Infeasible => {
            state = DriverState::Infeasible;
            return infeasible_input("maximize_optimality_gap: outer model is infeasible");
        }
        other => {
            return Err(crate::error::MetaOptError::SolverStatusUnsupported(other).into());
        }
    }

    let opt_solution = optimal.extract_solution(&values);
    let heu_solution = heuristic.extract_solution(&values);
    Ok((opt_solution, heu_solution, state))
}

/// `spec.md` §4.6 `FindOptimalityGapAtLeast`: adds `opt.global - heu.global
/// >= target_gap` and solves as a feasibility question, returning as soon as
/// any feasible witness is found or the solver reports infeasible.
pub fn find_optimality_gap_at_least(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    num_inputs: usize,
    dims: usize,
    input_ub: f64,
    target_gap: f64,
    rewrite: InnerRewrite,
    level_set: Option<&LevelSet>,
    options: &DriverOptions,
    callback: &mut dyn Callback,
) -> MetaOptResult<bool> {
    backend.clean_all(CleanOptions {
        disable_store_progress: false,
        focus_best_bound: false,
        timeout_secs: Some(options.timeout_secs),
    });

    let inputs = create_shared_inputs(backend, num_inputs, dims, input_ub);
    apply_input_upper_bounds(backend, &inputs, options);

    if rewrite == InnerRewrite::PrimalDual {
        let Some(level_set) = level_set else {
            return contract_violation("primal-dual rewrite requires a level set for input discretization");
        };
        discretize_inputs(backend, &inputs, level_set)?;
    }

    let opt_encoding = optimal.encode(backend, Some(&inputs), None)?;
    let heu_encoding = heuristic.encode(backend, Some(&inputs), None)?;

    apply_rewrite(backend, optimal, rewrite, options.big_m, callback)?;
    apply_rewrite(backend, heuristic, rewrite, options.big_m, callback)?;

    let gap_floor = Polynomial::constant(target_gap)
        .sub(&Polynomial::from_variable(1.0, opt_encoding.global_objective))
        .add(&Polynomial::from_variable(1.0, heu_encoding.global_objective));
    backend.add_leq_zero(gap_floor);

    let mut terminator = build_terminator(options);
    let (status, _values) = backend.maximize(&Polynomial::zero(), true, callback, &mut terminator)?;
    Ok(status.has_usable_incumbent())
}

/// `spec.md` §4.6 `FindMaximumGapInterval`: repeated
/// [`find_optimality_gap_at_least`] with a geometric schedule until the
/// interval `[lo, hi]` is `confidence`-tight.
pub fn find_maximum_gap_interval(
    backend: &mut dyn SolverBackend,
    optimal: &mut dyn Encoder,
    heuristic: &mut dyn Encoder,
    num_inputs: usize,
    dims: usize,
    input_ub: f64,
    confidence: f64,
    starting_gap: f64,
    rewrite: InnerRewrite,
    level_set: Option<&LevelSet>,
    options: &DriverOptions,
    callback: &mut dyn Callback,
) -> MetaOptResult<(f64, f64)> {
    let mut lo = 0.0;
    let mut hi = starting_gap.max(1e-6);

    while find_optimality_gap_at_least(backend, optimal, heuristic, num_inputs, dims, input_ub, hi, rewrite, level_set, options, callback)? {
        lo = hi;
        hi *= 2.0;
    }

    while hi - lo > confidence {
        let mid = (lo + hi) / 2.0;
        if find_optimality_gap_at_least(backend, optimal, heuristic, num_inputs, dims, input_ub, mid, rewrite, level_set, options, callback)? {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok((lo, hi))
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
    fn maximize_optimality_gap_diamond_demand_pinning_is_nonnegative() {
        let topology = diamond();
        let paths = topology.k_shortest_paths(0, 3, 2);
        let commodity = Commodity::new(0, 3, paths);

        let mut backend = ReferenceMilpBackend::new(true);
        let mut optimal = TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0);
        let mut heuristic = DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None);

        let mut callback = NoOpCallback;
        let options = DriverOptions {
            timeout_secs: 5,
            ..DriverOptions::default()
        };

        let (opt_solution, heu_solution, state) = maximize_optimality_gap(
            &mut backend,
            &mut optimal,
            &mut heuristic,
            1,
            1,
            40.0,
            InnerRewrite::Kkt,
            None,
            &options,
            &mut callback,
        )
        .unwrap();

        assert!(matches!(state, DriverState::Returned | DriverState::TimeoutIncumbent));
        assert!(opt_solution.global_objective + 1e-6 >= heu_solution.global_objective);
    }

    #[test]
    fn primal_dual_rewrite_is_rejected_for_direct_demand_pinning() {
        let topology = diamond();
        let paths = topology.k_shortest_paths(0, 3, 2);
        let commodity = Commodity::new(0, 3, paths);

        let mut backend = ReferenceMilpBackend::new(true);
        let mut optimal = TrafficEncoder::new(topology.clone(), vec![commodity.clone()], 40.0);
        let mut heuristic = DemandPinningEncoder::new(topology, vec![commodity], 40.0, 5.0, ThresholdTest::Direct, None);

        let mut callback = NoOpCallback;
        let options = DriverOptions::default();
        let level_set = LevelSet::new(vec![0.0, 5.0, 40.0]);

        let result = maximize_optimality_gap(
            &mut backend,
            &mut optimal,
            &mut heuristic,
            1,
            1,
            40.0,
            InnerRewrite::PrimalDual,
            Some(&level_set),
            &options,
            &mut callback,
        );
        assert!(result.is_err());
    }
}

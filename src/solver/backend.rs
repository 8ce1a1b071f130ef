use problemo::Problem;
use std::collections::HashMap;

use crate::algebra::Polynomial;
use crate::callback::Callback;
use crate::solver::{VarId, VarKind, Variable};
use crate::terminators::Terminator;

/// Status codes returned by a [`SolverBackend::maximize`] (or, for the SMT
/// back end, by the bisection loop that simulates it).
///
/// The core only ever consumes `Optimal` or `TimeLimit` *with* an incumbent;
/// every other variant surfaces as a recoverable failure of the current
/// rewrite (`crate::error::MetaOptError::SolverStatusUnsupported`).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub enum Status {
    #[default]
    InProgress,
    Optimal,
    Infeasible,
    Unbounded,
    Unknown,
    TimeLimit,
    IterationLimit,
    Interrupted,
}

impl Status {
    /// Whether this status carries a usable incumbent (the core's two
    /// acceptable outcomes).
    pub fn has_usable_incumbent(self) -> bool {
        matches!(self, Status::Optimal | Status::TimeLimit)
    }
}

/// Big-M magnitude used for derived constructs (bound replacement for
/// unbounded variables, big-M complementary-slackness linearization).
/// `spec.md` §4.2 fixes this at "approximately 10^3".
pub const DEFAULT_BIG_M: f64 = 1.0e3;

/// A single named constraint, one of the four forms `spec.md` §3 allows.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `poly <= 0`
    Leq(Polynomial),
    /// `poly = 0`
    Eq(Polynomial),
    /// At most one of `vars` is non-zero.
    Sos1(Vec<Variable>),
    /// `y = |poly|`, asserted via two inequalities and a binary switch.
    AbsValue { y: Variable, poly: Polynomial },
}

/// Stable handle for a previously added constraint, used for removal or
/// right-hand-side mutation (the iterative FFD driver's use case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintName(u32);

impl ConstraintName {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Settings accepted by [`SolverBackend::clean_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    pub disable_store_progress: bool,
    pub focus_best_bound: bool,
    pub timeout_secs: Option<u64>,
}

/// Values of every created variable after a (partial or full) solve.
#[derive(Debug, Clone, Default)]
pub struct SolverValues {
    values: HashMap<VarId, f64>,
}

impl SolverValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.values.insert(variable.id(), value);
    }

    pub fn get(&self, variable: Variable) -> f64 {
        *self.values.get(&variable.id()).unwrap_or(&0.0)
    }
}

/// The abstract solver interface (component C2).
///
/// `metaopt` consumes a MILP or SMT back end entirely through this trait;
/// the production engine behind it (Gurobi, CBC, OR-Tools, Z3, ...) is an
/// external collaborator. [`crate::solver::milp::ReferenceMilpBackend`] and
/// [`crate::solver::smt::BisectionSmtBackend`] are in-crate reference
/// implementations used by this crate's own tests.
pub trait SolverBackend {
    /// Creates a variable with the given kind and bounds. `+-infinity`
    /// bounds are permitted; the backend replaces them internally with a
    /// finite safe bound (`DEFAULT_BIG_M` by default for derived
    /// constructs).
    fn create_variable(&mut self, tag: &str, kind: VarKind, lb: f64, ub: f64) -> Variable;

    /// Adds `poly <= 0`, returning a stable name.
    fn add_leq_zero(&mut self, poly: Polynomial) -> ConstraintName;

    /// Adds `poly = 0`, returning a stable name.
    fn add_eq_zero(&mut self, poly: Polynomial) -> ConstraintName;

    /// At most one of `vars` may be non-zero. Required for KKT
    /// complementary-slackness linearization when the backend supports it.
    fn add_sos1(&mut self, vars: Vec<Variable>) -> ConstraintName;

    /// Asserts `y = |poly|`.
    fn add_abs(&mut self, y: Variable, poly: Polynomial) -> ConstraintName;

    /// Whether this backend accepts [`SolverBackend::add_sos1`] natively.
    /// The KKT rewrite (`crate::rewrite::kkt`) consults this to choose
    /// between SOS-1 and big-M complementary slackness.
    fn supports_sos1(&self) -> bool;

    /// `z` binary with `z <= x`, `z <= y`, `z >= x + y - 1` (linearizes
    /// `x * y` for two binaries).
    fn linearize_binary_times_binary(&mut self, x: Variable, y: Variable) -> Variable;

    /// `z >= 0`, `z <= y_ub * x`, `z <= y`, `z >= y - y_ub * (1 - x)`
    /// (McCormick-exact linearization of `x * y` for binary `x` and
    /// continuous `y` bounded above by `y_ub`).
    fn linearize_binary_times_continuous(&mut self, x: Variable, y: Variable, y_ub: f64) -> Variable;

    /// Removes a previously added constraint by name.
    fn remove_constraint(&mut self, name: ConstraintName);

    /// Changes the right-hand side of a constraint previously added as
    /// `poly <= 0`/`poly = 0` by adding `delta` to its constant term
    /// (equivalently, bumping the RHS when read as `poly' <= rhs`).
    fn change_constraint_rhs(&mut self, name: ConstraintName, new_constant: f64);

    /// Commits pending variable/constraint additions before a solve; a
    /// no-op for backends that apply changes eagerly.
    fn model_update(&mut self);

    /// Sets a wall-clock timeout (seconds) for the next `maximize`.
    fn set_timeout(&mut self, seconds: u64);

    /// Resets internal solver state (`clean_all`) between unrelated
    /// invocations so stale cuts/incumbents from a previous solve cannot
    /// leak into the next one.
    fn clean_all(&mut self, options: CleanOptions);

    /// Maximizes `objective`, honoring `callback` (progress stream) and
    /// `terminator` (wall-clock / no-improvement / interrupt). `reset`
    /// requests a fresh basis/incumbent rather than a warm start.
    fn maximize(
        &mut self,
        objective: &Polynomial,
        reset: bool,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<(Status, SolverValues), Problem>;

    /// Reads `handle`'s value out of a solution produced by `maximize`.
    fn get_variable(&self, solution: &SolverValues, handle: Variable) -> f64 {
        solution.get(handle)
    }
}

//! Crate-wide error taxonomy.
//!
//! `metaopt` follows the teacher's `Result<T, Problem>` convention: domain
//! errors are plain `derive_more` enums (see `linalg::solver::LinearSolverError`
//! in the crate this was grown from) that convert into `problemo::Problem` via
//! `?`. `MetaOptError` is the one taxonomy used across the whole crate,
//! matching the kinds enumerated in the system specification.

use derive_more::{Display, Error};
use problemo::Problem;

use crate::solver::Status;

/// The error kinds a bilevel invocation can surface.
///
/// `ContractViolation` and `InfeasibleInput` are raised synchronously during
/// encoding/rewriting; `SolverTimeout` and `SolverStatusUnsupported` come
/// from the outer `maximize`/`check_feasible` call; `NumericalInstability`
/// is raised post-hoc by the invariant checks (I3/I4) when a caller opts in
/// to verifying them.
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum MetaOptError {
    /// An encoder or rewrite was invoked in a way its contract forbids:
    /// mismatched solver session, wrong arity of `preInputVariables`, or a
    /// level set missing a required threshold.
    #[display("contract violation: {_0}")]
    ContractViolation(String),

    /// Explicit user equalities contradict input bounds or heuristic
    /// constraints. Carries the name of the failing constraint.
    #[display("infeasible input: constraint `{_0}` is unsatisfiable")]
    InfeasibleInput(String),

    /// The outer `maximize` exhausted its wall-clock or no-improvement
    /// budget with no incumbent to fall back on.
    #[display("solver timed out with no incumbent")]
    SolverTimeout,

    /// The back end reported a status the core does not accept as a basis
    /// for extracting a solution (`Unbounded`, or `Interrupted` with no
    /// incumbent).
    #[display("solver reported unsupported status {_0:?}")]
    SolverStatusUnsupported(Status),

    /// Strong duality held only beyond tolerance, or a quantized selector
    /// was not within `delta` of `{0, 1}`.
    #[display("numerical instability: {_0}")]
    NumericalInstability(String),
}

/// Convenience alias used throughout the crate.
pub type MetaOptResult<T> = Result<T, Problem>;

pub(crate) fn contract_violation<T>(msg: impl Into<String>) -> MetaOptResult<T> {
    Err(MetaOptError::ContractViolation(msg.into()).into())
}

pub(crate) fn infeasible_input<T>(name: impl Into<String>) -> MetaOptResult<T> {
    Err(MetaOptError::InfeasibleInput(name.into()).into())
}

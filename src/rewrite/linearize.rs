//! Input quantization and the shared binary x continuous linearization
//! primitive (`spec.md` §9: "isolate as one function on the polynomial
//! layer, reusable by every rewrite and encoder").

use crate::algebra::Polynomial;
use crate::error::{contract_violation, MetaOptResult};
use crate::external::LevelSet;
use crate::solver::{SolverBackend, VarKind, Variable};

/// An input variable replaced by its quantized representation
/// `sum_l q_l * b_l` (`spec.md` §3 "Quantized-level table"). `selectors`
/// are binary; exactly one is 1 per solution unless `allow_null` was set,
/// in which case all-zero is also permitted (input absent).
#[derive(Debug, Clone)]
pub struct QuantizedInput {
    pub original: Variable,
    pub selectors: Vec<Variable>,
    pub levels: Vec<f64>,
    pub representative: Polynomial,
}

impl QuantizedInput {
    /// The (known-constant) level each selector stands for, zipped with its
    /// binary handle — convenient for building a linear selector out of a
    /// precomputed per-level predicate (e.g. "is this level <= threshold",
    /// `spec.md` §4.5's quantized demand-pinning test).
    pub fn level_selectors(&self) -> impl Iterator<Item = (f64, Variable)> + '_ {
        self.levels.iter().copied().zip(self.selectors.iter().copied())
    }
}

/// Replaces `original` by a fresh quantized representation drawn from
/// `level_set`, enforcing the "exactly one selector" (or "at most one" when
/// `allow_null`) invariant and tying `original` to the chosen level.
pub fn quantize_input(
    backend: &mut dyn SolverBackend,
    tag: &str,
    original: Variable,
    level_set: &LevelSet,
    allow_null: bool,
) -> MetaOptResult<QuantizedInput> {
    let levels = level_set.levels();
    if levels.is_empty() {
        return contract_violation(format!("{tag}: level set must be non-empty"));
    }

    let selectors: Vec<Variable> = (0..levels.len())
        .map(|l| backend.create_variable(&format!("{tag}_b[{l}]"), VarKind::Binary, 0.0, 1.0))
        .collect();

    let mut selector_sum = Polynomial::zero();
    let mut representative = Polynomial::zero();
    for (level, &selector) in levels.iter().zip(&selectors) {
        selector_sum = selector_sum.add(&Polynomial::from_variable(1.0, selector));
        representative = representative.add(&Polynomial::from_variable(*level, selector));
    }

    let one_hot = selector_sum.add(&Polynomial::constant(-1.0));
    if allow_null {
        backend.add_leq_zero(one_hot);
    } else {
        backend.add_eq_zero(one_hot);
    }
    backend.add_eq_zero(Polynomial::from_variable(1.0, original).sub(&representative));

    Ok(QuantizedInput {
        original,
        selectors,
        levels: levels.to_vec(),
        representative,
    })
}

/// Verifies the required closure of a level set (`spec.md` §4.4.2: "0,
/// every heuristic threshold, and the global upper bound"), returning a
/// contract violation naming whichever required values are missing.
pub fn check_level_closure(tag: &str, level_set: &LevelSet, required: &[f64]) -> MetaOptResult<()> {
    let missing = level_set.missing(required);
    if missing.is_empty() {
        Ok(())
    } else {
        contract_violation(format!("{tag}: level set is missing required level(s) {missing:?}"))
    }
}

/// Linearizes `quantized * dual`, an (input x dual-variable) bilinear term,
/// exactly: since exactly one selector is active, `quantized.representative
/// * dual = sum_l level_l * (b_l * dual)`, and each `b_l * dual` term is
/// McCormick-exact via [`SolverBackend::linearize_binary_times_continuous`]
/// because `b_l` is binary.
pub fn linearize_quantized_product(
    backend: &mut dyn SolverBackend,
    quantized: &QuantizedInput,
    dual: Variable,
    dual_upper_bound: f64,
) -> Polynomial {
    let mut result = Polynomial::zero();
    for (level, selector) in quantized.level_selectors() {
        let product = backend.linearize_binary_times_continuous(selector, dual, dual_upper_bound);
        result = result.add(&Polynomial::from_variable(level, product));
    }
    result
}

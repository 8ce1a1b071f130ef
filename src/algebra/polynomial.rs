use crate::algebra::Term;
use crate::solver::Variable;

/// An ordered multiset of [`Term`]s.
///
/// `Polynomial` supports `add`, `negate`, and `copy` as pure operations that
/// produce a new polynomial; it does not combine like terms automatically
/// (that simplification is permitted but not required by the contract, see
/// `spec.md` §4.1). Structural equality (`PartialEq`) compares terms in
/// declaration order and is only meant for tests; two polynomials that are
/// mathematically equal but built in a different order will not compare
/// equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polynomial {
    terms: Vec<Term>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: vec![Term::constant(value)],
        }
    }

    pub fn from_variable(coefficient: f64, variable: Variable) -> Self {
        Self {
            terms: vec![Term::linear(coefficient, variable)],
        }
    }

    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
        }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns a new polynomial equal to `self + other`, by concatenating
    /// term lists (no simplification).
    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().copied());
        Polynomial { terms }
    }

    /// Returns a new polynomial equal to `self - other`.
    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.negate())
    }

    /// Returns a new polynomial with every term's coefficient negated.
    pub fn negate(&self) -> Polynomial {
        Polynomial {
            terms: self.terms.iter().map(Term::negate).collect(),
        }
    }

    /// Returns a new polynomial with every term scaled by `factor`.
    pub fn scale(&self, factor: f64) -> Polynomial {
        Polynomial {
            terms: self.terms.iter().map(|t| t.scale(factor)).collect(),
        }
    }

    /// A structural (deep) copy, named to mirror the contract's `copy`
    /// operation explicitly rather than relying only on `Clone`.
    pub fn copy(&self) -> Polynomial {
        self.clone()
    }

    /// Combines like terms (same variable, same exponent) into a single
    /// term each, dropping any term whose combined coefficient is exactly
    /// zero. Simplification is *permitted*, not required, by the contract:
    /// rewrites call this only when they need a canonical form (e.g. before
    /// reading off "the coefficient of variable v").
    pub fn simplified(&self) -> Polynomial {
        let mut constant = 0.0;
        let mut linear: Vec<(Variable, f64)> = Vec::new();
        let mut quadratic: Vec<(Variable, f64)> = Vec::new();

        for term in &self.terms {
            match (term.variable(), term.exponent()) {
                (None, _) => constant += term.coefficient(),
                (Some(v), 1) => {
                    if let Some(existing) = linear.iter_mut().find(|(w, _)| *w == v) {
                        existing.1 += term.coefficient();
                    } else {
                        linear.push((v, term.coefficient()));
                    }
                }
                (Some(v), 2) => {
                    if let Some(existing) = quadratic.iter_mut().find(|(w, _)| *w == v) {
                        existing.1 += term.coefficient();
                    } else {
                        quadratic.push((v, term.coefficient()));
                    }
                }
                (Some(_), _) => unreachable!("term exponent must be 0, 1, or 2"),
            }
        }

        let mut terms = Vec::new();
        if constant != 0.0 {
            terms.push(Term::constant(constant));
        }
        terms.extend(
            linear
                .into_iter()
                .filter(|(_, c)| *c != 0.0)
                .map(|(v, c)| Term::linear(c, v)),
        );
        terms.extend(
            quadratic
                .into_iter()
                .filter(|(_, c)| *c != 0.0)
                .map(|(v, c)| Term::quadratic(c, v)),
        );
        Polynomial { terms }
    }

    /// The coefficient of `variable` at `exponent`, after simplification.
    /// Returns `0.0` if the variable does not appear.
    pub fn coefficient_of(&self, variable: Variable, exponent: u8) -> f64 {
        self.simplified()
            .terms
            .iter()
            .find(|t| t.variable() == Some(variable) && t.exponent() == exponent)
            .map(Term::coefficient)
            .unwrap_or(0.0)
    }

    /// Substitutes every occurrence of `variable` (at exponent 1) with
    /// `replacement`, expanding degree as needed. This is the primitive the
    /// primal-dual rewrite's input quantization
    /// (`x -> sum_l q_l * b_l`) and the bin-packing product construction
    /// both build on.
    pub fn substitute(&self, variable: Variable, replacement: &Polynomial) -> Polynomial {
        let mut terms = Vec::new();
        for term in &self.terms {
            if term.variable() != Some(variable) {
                terms.push(*term);
                continue;
            }
            match term.exponent() {
                1 => {
                    for rep_term in replacement.terms() {
                        terms.push(rep_term.scale(term.coefficient()));
                    }
                }
                2 => {
                    // (sum_l q_l b_l)^2 over binary selectors with exactly
                    // one active collapses to sum_l q_l^2 b_l, since b_l is
                    // idempotent (b_l^2 = b_l) and cross terms vanish under
                    // the exactly-one-hot invariant enforced by the
                    // quantized-level table. Callers that substitute a
                    // non-quantized polynomial into a quadratic term must
                    // pre-linearize it themselves.
                    for rep_term in replacement.terms() {
                        terms.push(Term::quadratic(
                            rep_term.coefficient() * term.coefficient(),
                            rep_term
                                .variable()
                                .expect("quadratic substitution requires a variable replacement"),
                        ));
                    }
                }
                other => unreachable!("unexpected term exponent {other} during substitution"),
            }
        }
        Polynomial { terms }
    }
}

impl FromIterator<Term> for Polynomial {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Polynomial::from_terms(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::VarId;

    fn v(i: u32) -> Variable {
        Variable::from_id(VarId::new(i))
    }

    #[test]
    fn add_concatenates_without_simplifying() {
        let a = Polynomial::from_variable(1.0, v(0));
        let b = Polynomial::from_variable(2.0, v(0));
        let sum = a.add(&b);
        assert_eq!(sum.terms().len(), 2);
        assert_eq!(sum.simplified().coefficient_of(v(0), 1), 3.0);
    }

    #[test]
    fn negate_then_add_cancels_after_simplification() {
        let a = Polynomial::from_variable(4.0, v(1));
        let zero = a.add(&a.negate()).simplified();
        assert!(zero.terms().is_empty());
    }

    #[test]
    fn substitute_expands_replacement_terms() {
        let poly = Polynomial::from_terms([Term::linear(2.0, v(0)), Term::constant(1.0)]);
        let replacement = Polynomial::from_terms([Term::linear(1.0, v(1)), Term::linear(1.0, v(2))]);
        let substituted = poly.substitute(v(0), &replacement);
        let simplified = substituted.simplified();
        assert_eq!(simplified.coefficient_of(v(1), 1), 2.0);
        assert_eq!(simplified.coefficient_of(v(2), 1), 2.0);
    }

    #[test]
    fn copy_is_independent_of_original() {
        let mut a = Polynomial::from_variable(1.0, v(0));
        let b = a.copy();
        a.push(Term::constant(5.0));
        assert_eq!(b.terms().len(), 1);
        assert_eq!(a.terms().len(), 2);
    }
}

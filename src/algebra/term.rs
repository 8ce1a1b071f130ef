use crate::solver::Variable;

/// One summand of a [`super::Polynomial`]: a coefficient times either a
/// constant, a variable, or a variable squared.
///
/// Invariant: `exponent <= 2`. In practice linear terms (`exponent == 1`)
/// dominate; quadratic terms (`exponent == 2`) appear only transiently
/// inside rewrites that linearize them (see [`crate::rewrite::linearize`])
/// before the term ever reaches a solver back end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    coefficient: f64,
    variable: Option<Variable>,
    exponent: u8,
}

impl Term {
    /// A bare constant term (no variable).
    pub fn constant(coefficient: f64) -> Self {
        Self {
            coefficient,
            variable: None,
            exponent: 0,
        }
    }

    /// `coefficient * variable`.
    pub fn linear(coefficient: f64, variable: Variable) -> Self {
        Self {
            coefficient,
            variable: Some(variable),
            exponent: 1,
        }
    }

    /// `coefficient * variable^2`. Only ever produced transiently by
    /// rewrites; no [`crate::solver::SolverBackend`] is asked to accept one
    /// directly.
    pub fn quadratic(coefficient: f64, variable: Variable) -> Self {
        Self {
            coefficient,
            variable: Some(variable),
            exponent: 2,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn variable(&self) -> Option<Variable> {
        self.variable
    }

    pub fn exponent(&self) -> u8 {
        self.exponent
    }

    pub fn is_constant(&self) -> bool {
        self.variable.is_none()
    }

    /// Returns the same term with its coefficient negated.
    pub fn negate(&self) -> Self {
        Self {
            coefficient: -self.coefficient,
            ..*self
        }
    }

    /// Returns the same term scaled by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            coefficient: self.coefficient * factor,
            ..*self
        }
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
    fn negate_flips_sign_only() {
        let t = Term::linear(3.0, v(0));
        let n = t.negate();
        assert_eq!(n.coefficient(), -3.0);
        assert_eq!(n.variable(), t.variable());
        assert_eq!(n.exponent(), t.exponent());
    }

    #[test]
    fn constant_has_no_variable() {
        let t = Term::constant(5.0);
        assert!(t.is_constant());
        assert_eq!(t.variable(), None);
    }
}

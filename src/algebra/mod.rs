//! Polynomial algebra over decision variables (component C1).
//!
//! Every constraint and objective in the crate is expressed as a
//! [`Polynomial`] of [`Term`]s referencing [`Variable`](crate::solver::Variable)
//! handles owned by a solver session. The algebra layer is deliberately thin:
//! it does not simplify (combine like terms) automatically, so that rewrites
//! downstream (the KKT and primal-dual generators in [`crate::rewrite`]) can
//! reason about the *declared* structure of a polynomial, e.g. pick out the
//! term whose variable is a specific dual multiplier.

mod polynomial;
mod term;

pub use polynomial::Polynomial;
pub use term::Term;

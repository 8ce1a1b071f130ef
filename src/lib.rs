//! `metaopt`: a bilevel optimization compiler.
//!
//! Given a heuristic algorithm and an optimal baseline over the same
//! decision space, `metaopt` builds and solves a single MILP/SMT instance
//! whose optimum is the largest gap between the optimal objective and the
//! heuristic's objective, over all inputs satisfying a caller-supplied
//! feasible region. See the five encoder families under
//! [`encoder`] (traffic engineering, POP, demand pinning, vector bin
//! packing, packet scheduling), the KKT and primal-dual
//! rewrites under [`rewrite`], and the driver state machine in
//! [`driver`] that ties them to a [`solver::SolverBackend`].

pub mod algebra;
pub mod callback;
pub mod cluster;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod external;
pub mod local_search;
pub mod rewrite;
pub mod solver;
pub mod terminators;

pub use algebra::{Polynomial, Term};
pub use error::{MetaOptError, MetaOptResult};
pub use solver::{SolverBackend, Status};

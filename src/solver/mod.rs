//! The solver abstraction (component C2): variable/constraint creation,
//! auxiliary linearization constructs, and the two back-end families
//! (`milp`, `smt`) that implement them.

mod backend;
pub mod milp;
pub mod smt;
mod variable;

pub use backend::{
    CleanOptions, Constraint, ConstraintName, SolverBackend, SolverValues, Status, DEFAULT_BIG_M,
};
pub use variable::{VarId, VarKind, Variable};

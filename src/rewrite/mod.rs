//! Inner-rewrite generator (component C4): given an encoder's declared
//! primal variables, constraints, and objective
//! ([`crate::encoder::InnerProblem`]), emits either the KKT or primal-dual
//! quantized rewrite into the shared solver session.

pub mod kkt;
pub mod linearize;
pub mod primal_dual;

pub use kkt::{apply_kkt, KktDuals};
pub use linearize::{check_level_closure, linearize_quantized_product, quantize_input, QuantizedInput};
pub use primal_dual::{apply_primal_dual, PrimalDualDuals};

//! Tree evaluation.
//!
//! Evaluation is dynamic: operand kinds are branched on at runtime, and
//! all invocation-local state lives in an [`Activation`] created per call.

pub mod error;

pub(crate) mod casts;

mod eval;
mod operators;

pub use error::EvalError;
pub use eval::{evaluate, Activation, SCRATCH_CELLS};

//! Expression parsing: text in, token tree out.
//!
//! The grammar is closed and deliberately small. Parsing is definition
//! time work; everything type-shaped that can be resolved here (casts,
//! `typeof`, constructor targets, static members) is resolved against the
//! registry so the evaluator only sees concrete identities.

pub mod error;
pub mod token;
mod tokenizer;

pub use error::ParseError;
pub use token::{ParamKind, Token};
pub use tokenizer::tokenize;

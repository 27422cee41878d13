//! Parse errors.
//!
//! Tokenization failure is a definition-time bug in the expression text,
//! not a per-value condition: it is raised to the caller once, at build
//! time, after the failure event has been published.

use thiserror::Error;

use crate::registry::AmbiguousTypeError;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// No grammar alternative matched the remaining input.
    #[error("Failed to tokenize expression \"{expression}\". Did you forget a '$'?")]
    FailedToTokenize { expression: String },

    /// A quoted literal with a char suffix held more than one character.
    #[error("The string '{text}' can not be interpreted as a character.")]
    InvalidCharLiteral { text: String },

    /// Two or more namespaces resolved one short name to different types.
    #[error(transparent)]
    AmbiguousType(#[from] AmbiguousTypeError),
}

//! Runtime evaluation errors.
//!
//! Every failure an invocation can hit is a variant here. Errors are
//! values: the invocation pipeline contains them, publishes a diagnostics
//! event and substitutes a sentinel result, so variants are cheap to clone
//! and carry display-ready detail instead of source positions.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A `throw` expression ran.
    #[error("{message}")]
    Thrown { message: String },

    /// A member access, call or index on a null value outside a
    /// null-propagating chain.
    #[error("Cannot access '{access}' on a null value.")]
    NullReference { access: String },

    /// No member of that name on the receiver's type.
    #[error("Type '{ty}' has no member '{name}'.")]
    UnknownMember { ty: String, name: String },

    /// No registered overload accepted the argument list.
    #[error("No overload of '{name}' accepts the given arguments.")]
    NoOverload { name: String },

    /// A binary operator rejected its operand types.
    #[error("Operator '{op}' cannot be applied to operands of type '{left}' and '{right}'.")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },

    /// A unary operator rejected its operand type.
    #[error("Operator '{op}' cannot be applied to an operand of type '{operand}'.")]
    InvalidOperand { op: String, operand: String },

    #[error("Attempted to divide by zero.")]
    DivisionByZero,

    /// Fixed-point or checked arithmetic exceeded its range.
    #[error("Arithmetic operation resulted in an overflow.")]
    Overflow,

    #[error("Index {index} is out of range for a length of {len}.")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Cannot cast a value of type '{from}' to '{to}'.")]
    InvalidCast { from: String, to: String },

    /// Assignment to a target without a setter.
    #[error("'{target}' cannot be assigned to.")]
    NotAssignable { target: String },

    /// A condition or logical operand was not a boolean.
    #[error("Expected a boolean value, found '{found}'.")]
    NonBooleanCondition { found: String },

    #[error("Lambda expects {expected} argument(s), got {found}.")]
    LambdaArity { expected: usize, found: usize },

    /// A host-registered body failed with its own error.
    #[error("{message}")]
    Host { message: String },
}

impl EvalError {
    /// Convenience for host bodies reporting their own failures.
    pub fn host(message: impl Into<String>) -> Self {
        EvalError::Host {
            message: message.into(),
        }
    }
}

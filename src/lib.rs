//! quickexpr - compiled binding expressions
//!
//! # Overview
//!
//! quickexpr turns short textual expressions into reusable forward/backward
//! value converters. A host registers its types and helper functions once,
//! compiles an expression once, and invokes the resulting [`Converter`]
//! against many values, from many threads. Common use cases include:
//!
//! - UI binding converters written inline as expressions
//! - Conditional formatting and value mapping rules
//! - Small host-configurable computations over a single input value
//!
//! # Quick Start
//!
//! ```ignore
//! use quickexpr::{Converter, Outcome, Value};
//!
//! let converter = Converter::builder("$P > 5 ? 'big' : 'small'").build()?;
//! let out = converter.convert(Value::I32(7), None, &[], None);
//! assert_eq!(out, Outcome::Value(Value::str("big")));
//! ```
//!
//! # Grammar surface
//!
//! `$name` is the input value; `$V0`..`$V9` are per-invocation scratch
//! cells; `$P0`..`$P4` are side placeholders supplied at invocation time.
//! Expressions support the usual arithmetic, comparison and logical
//! operators (with `##`/`#` as markup-safe spellings of `&&`/`&`),
//! `cond ? a : b`, `a ?? b`, `?.`, member access and calls, indexing,
//! `is`/`as`/casts, `typeof`, `new`, `throw`, and `(p1, p2) => body`
//! lambdas passed to host functions.
//!
//! # Containment
//!
//! Invocation never raises. Guard rejections come back as
//! [`Outcome::Unset`] / [`Outcome::NoChange`]; runtime failures are
//! counted, retained on the converter and published on the
//! [`diagnostics`] channel.

pub mod api;
pub mod diagnostics;
pub mod evaluator;
pub mod ops;
pub mod parser;
pub mod registry;
pub mod types;
pub mod values;

pub use api::{placeholder, ChainedConverter, Converter, ConverterBuilder, Outcome};
pub use evaluator::{evaluate, Activation, EvalError};
pub use parser::{tokenize, ParseError, Token};
pub use registry::{global as global_registry, Registry};
pub use types::{FunctionDef, HostType, ObjectRef, Property, TypeRef};
pub use values::Value;

#[cfg(test)]
pub(crate) mod test_utils {
    /// Installs a test-writer subscriber once; safe to call from every
    /// test.
    pub fn init_test_logging() {
        use tracing_subscriber::EnvFilter;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

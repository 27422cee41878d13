//! The compiled converter: the crate's public entry point.
//!
//! A [`Converter`] pairs a forward expression with an optional backward
//! expression, compiled once and invoked many times. Invocation never
//! raises: guard rejections and contained runtime errors come back as the
//! [`Outcome`] sentinels, with errors counted, retained and published on
//! the diagnostics channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::diagnostics::{self, Event};
use crate::evaluator::casts::explicit_cast;
use crate::evaluator::{evaluate, EvalError};
use crate::parser::{tokenize, ParseError, Token};
use crate::types::{HostType, ObjectRef, TypeRef};
use crate::values::Value;

/// The result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    /// The invocation produced nothing; the host should treat the slot as
    /// unset.
    Unset,
    /// The invocation declined; the host should leave the current value
    /// alone.
    NoChange,
}

/// An extra conversion stage around the compiled trees: applied after the
/// forward tree, and before the backward tree.
pub trait ChainedConverter: Send + Sync {
    fn convert(
        &self,
        value: Value,
        target: Option<&TypeRef>,
        locale: Option<&str>,
    ) -> Result<Value, EvalError>;

    fn convert_back(
        &self,
        value: Value,
        target: Option<&TypeRef>,
        locale: Option<&str>,
    ) -> Result<Value, EvalError>;
}

/// The host placeholder sentinel. Hosts pass it for slots that have no
/// real value yet; invocation rejects it up front without running the
/// tree.
pub fn placeholder() -> Value {
    PLACEHOLDER.clone()
}

static PLACEHOLDER: Lazy<Value> = Lazy::new(|| {
    let ty = HostType::builder("", "UnsetPlaceholder").build();
    Value::Object(ObjectRef::new(ty, ()))
});

fn is_placeholder(value: &Value) -> bool {
    matches!((value, &*PLACEHOLDER), (Value::Object(a), Value::Object(b)) if a == b)
}

/// Explicit target-type conversions that failed once are never retried.
/// Process-wide, append-only, like the registry caches.
static CAST_POISON: Lazy<RwLock<HashSet<TypeRef>>> = Lazy::new(|| RwLock::new(HashSet::new()));

struct CompiledTree {
    text: String,
    token: Token,
    debug: String,
}

impl CompiledTree {
    fn compile(text: String) -> Result<Self, ParseError> {
        let token = tokenize(&text)?;
        let debug = token.debug_view();
        Ok(Self { text, token, debug })
    }
}

/// A compiled forward/backward expression pair.
pub struct Converter {
    forward: CompiledTree,
    backward: Option<CompiledTree>,
    chained: Option<Arc<dyn ChainedConverter>>,
    input_guard: Option<TypeRef>,
    backward_guard: Option<TypeRef>,
    last_error: Mutex<Option<EvalError>>,
    error_count: AtomicUsize,
}

/// Builder for [`Converter`].
///
/// # Example
///
/// ```ignore
/// let converter = Converter::builder("$P > 5 ? 'big' : 'small'")
///     .backward("$P == 'big' ? 10 : 0")
///     .build()?;
/// let out = converter.convert(Value::I32(7), None, &[], None);
/// ```
pub struct ConverterBuilder {
    forward: String,
    backward: Option<String>,
    chained: Option<Arc<dyn ChainedConverter>>,
    input_guard: Option<TypeRef>,
    backward_guard: Option<TypeRef>,
}

impl ConverterBuilder {
    /// The expression for the backward direction.
    pub fn backward(mut self, expression: impl Into<String>) -> Self {
        self.backward = Some(expression.into());
        self
    }

    /// An extra conversion stage around the compiled trees.
    pub fn chained(mut self, chained: Arc<dyn ChainedConverter>) -> Self {
        self.chained = Some(chained);
        self
    }

    /// Declared input type for the forward direction. Values that are not
    /// an instance are rejected silently with the unset sentinel.
    pub fn input_guard(mut self, ty: TypeRef) -> Self {
        self.input_guard = Some(ty);
        self
    }

    /// Declared input type for the backward direction.
    pub fn backward_guard(mut self, ty: TypeRef) -> Self {
        self.backward_guard = Some(ty);
        self
    }

    /// Compiles both trees. Tokenization failure is fatal here, at build
    /// time, never at invocation time.
    pub fn build(self) -> Result<Converter, ParseError> {
        let forward = CompiledTree::compile(self.forward)?;
        let backward = self.backward.map(CompiledTree::compile).transpose()?;
        Ok(Converter {
            forward,
            backward,
            chained: self.chained,
            input_guard: self.input_guard,
            backward_guard: self.backward_guard,
            last_error: Mutex::new(None),
            error_count: AtomicUsize::new(0),
        })
    }
}

impl Converter {
    pub fn builder(expression: impl Into<String>) -> ConverterBuilder {
        ConverterBuilder {
            forward: expression.into(),
            backward: None,
            chained: None,
            input_guard: None,
            backward_guard: None,
        }
    }

    pub fn expression(&self) -> &str {
        &self.forward.text
    }

    pub fn backward_expression(&self) -> Option<&str> {
        self.backward.as_ref().map(|t| t.text.as_str())
    }

    /// Indented dump of the forward tree.
    pub fn debug_view(&self) -> &str {
        &self.forward.debug
    }

    pub fn backward_debug_view(&self) -> Option<&str> {
        self.backward.as_ref().map(|t| t.debug.as_str())
    }

    /// The most recent contained error, if any invocation has failed.
    pub fn last_error(&self) -> Option<EvalError> {
        self.last_error.lock().clone()
    }

    /// Number of invocations that failed and were contained.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Forward invocation: guard, tree, chained stage, target coercion.
    pub fn convert(
        &self,
        value: Value,
        target: Option<&TypeRef>,
        side: &[Value],
        locale: Option<&str>,
    ) -> Outcome {
        self.run(&self.forward, self.input_guard.as_ref(), value, target, side, locale, false)
    }

    /// Backward invocation; a guard rejection yields the no-change
    /// sentinel so a rejected edit leaves the source untouched, while a
    /// contained failure still yields unset. Without a backward
    /// expression the invocation declines outright: neither the chained
    /// stage nor target coercion runs.
    pub fn convert_back(
        &self,
        value: Value,
        target: Option<&TypeRef>,
        side: &[Value],
        locale: Option<&str>,
    ) -> Outcome {
        let Some(backward) = &self.backward else {
            return Outcome::NoChange;
        };
        self.run(backward, self.backward_guard.as_ref(), value, target, side, locale, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        tree: &CompiledTree,
        guard: Option<&TypeRef>,
        value: Value,
        target: Option<&TypeRef>,
        side: &[Value],
        locale: Option<&str>,
        backward: bool,
    ) -> Outcome {
        // Guard rejections decline the conversion; only a backward decline
        // maps to the no-change sentinel. Contained failures produce the
        // unset sentinel in both directions.
        let decline = if backward {
            Outcome::NoChange
        } else {
            Outcome::Unset
        };

        // The chained stage runs before the backward tree and after the
        // forward tree.
        let value = if backward {
            match self.apply_chained(tree, value, target, locale, backward) {
                Ok(value) => value,
                Err(()) => return Outcome::Unset,
            }
        } else {
            value
        };

        // Guard rejections are expected, frequent and silent.
        if is_placeholder(&value) {
            return decline;
        }
        if let Some(guard) = guard {
            if !matches!(guard, TypeRef::Object) && !guard.is_instance(&value) {
                return decline;
            }
        }

        let result = match evaluate(&tree.token, &value, side) {
            Ok(result) => result,
            Err(err) => {
                debug!(expression = %tree.text, error = %err, backward, "invocation failed");
                self.record_error(err.clone());
                diagnostics::publish(&Event::RuntimeError {
                    expression: tree.text.clone(),
                    debug_view: tree.debug.clone(),
                    backward,
                    value,
                    side: side.to_vec(),
                    error: err,
                });
                return Outcome::Unset;
            }
        };

        let result = if backward {
            result
        } else {
            match self.apply_chained(tree, result, target, locale, backward) {
                Ok(result) => result,
                Err(()) => return Outcome::Unset,
            }
        };

        Outcome::Value(coerce_to_target(result, target))
    }

    fn apply_chained(
        &self,
        tree: &CompiledTree,
        value: Value,
        target: Option<&TypeRef>,
        locale: Option<&str>,
        backward: bool,
    ) -> Result<Value, ()> {
        let Some(chained) = &self.chained else {
            return Ok(value);
        };
        let call = if backward {
            chained.convert_back(value.clone(), target, locale)
        } else {
            chained.convert(value.clone(), target, locale)
        };
        match call {
            Ok(value) => Ok(value),
            Err(err) => {
                // Published but not counted; the error tally covers tree
                // evaluation only.
                debug!(expression = %tree.text, error = %err, backward, "chained converter failed");
                diagnostics::publish(&Event::ChainedConverterError {
                    expression: tree.text.clone(),
                    backward,
                    value,
                    error: err,
                });
                Err(())
            }
        }
    }

    fn record_error(&self, err: EvalError) {
        *self.last_error.lock() = Some(err);
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Brings the result to the declared target type. A textual target
/// stringifies; anything else goes through an explicit cast whose failure
/// permanently poisons that target type, after which results pass through
/// unconverted.
fn coerce_to_target(result: Value, target: Option<&TypeRef>) -> Value {
    let Some(target) = target else {
        return result;
    };
    if matches!(target, TypeRef::Object) || result.is_null() || is_placeholder(&result) {
        return result;
    }
    if matches!(target, TypeRef::Str) {
        return Value::str(result.to_string());
    }
    if target.assignable_from(&result.type_ref()) {
        return result;
    }
    if CAST_POISON.read().contains(target) {
        return result;
    }
    match explicit_cast(target, result.clone()) {
        Ok(converted) => converted,
        Err(err) => {
            debug!(target = %target, error = %err, "target conversion disabled");
            CAST_POISON.write().insert(target.clone());
            result
        }
    }
}

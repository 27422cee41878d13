//! The tree-walking evaluator.
//!
//! One [`Activation`] is created per invocation and owns all mutable
//! state: the scratch cells and the lambda scope stack. Nothing written
//! during evaluation outlives the activation, which is what makes a
//! compiled tree safe to invoke from many threads at once.

use ecow::EcoString;

use super::casts::explicit_cast;
use super::error::EvalError;
use super::operators;
use crate::ops::Operator;
use crate::parser::{ParamKind, Token};
use crate::registry;
use crate::types::TypeRef;
use crate::values::{LambdaValue, Value};

/// Control flow inside one evaluation: a real error, or the silent exit a
/// null-propagating access takes to the enclosing chain.
pub(crate) enum Signal {
    Error(EvalError),
    NullExit,
}

impl From<EvalError> for Signal {
    fn from(err: EvalError) -> Self {
        Signal::Error(err)
    }
}

/// Number of scratch cells (`$V0`..`$V9`).
pub const SCRATCH_CELLS: usize = 10;

/// The per-invocation evaluation state.
///
/// `input` is what any plain `$name` resolves to when no lambda parameter
/// shadows it; `side` carries the `$P0`..`$P4` placeholder values.
/// Scratch cells start null on every invocation, so state never leaks
/// between invocations or threads.
pub struct Activation<'a> {
    input: &'a Value,
    side: &'a [Value],
    slots: [Value; SCRATCH_CELLS],
    scopes: Vec<Vec<(EcoString, Value)>>,
}

/// Evaluates a token tree against an input value and side placeholders.
pub fn evaluate(token: &Token, input: &Value, side: &[Value]) -> Result<Value, EvalError> {
    Activation::new(input, side).run(token)
}

impl<'a> Activation<'a> {
    pub fn new(input: &'a Value, side: &'a [Value]) -> Self {
        Self {
            input,
            side,
            slots: std::array::from_fn(|_| Value::Null),
            scopes: Vec::new(),
        }
    }

    /// Runs the tree to completion. A null-propagating exit that reaches
    /// the root yields null.
    pub fn run(&mut self, token: &Token) -> Result<Value, EvalError> {
        match self.eval(token) {
            Ok(value) => Ok(value),
            Err(Signal::NullExit) => Ok(Value::Null),
            Err(Signal::Error(err)) => Err(err),
        }
    }

    /// Invokes an in-expression lambda value. Host bodies that accept
    /// callable arguments re-enter evaluation through this.
    pub fn call_lambda(&mut self, lambda: &LambdaValue, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != lambda.params.len() {
            return Err(EvalError::LambdaArity {
                expected: lambda.params.len(),
                found: args.len(),
            });
        }
        // The body sees the lambda's captured frames, not the caller's.
        let saved = std::mem::take(&mut self.scopes);
        self.scopes = lambda.captures.clone();
        let frame: Vec<(EcoString, Value)> = lambda
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        self.scopes.push(frame);
        let result = match self.eval(&lambda.body) {
            Ok(value) => Ok(value),
            Err(Signal::NullExit) => Ok(Value::Null),
            Err(Signal::Error(err)) => Err(err),
        };
        self.scopes = saved;
        result
    }

    fn eval(&mut self, token: &Token) -> Result<Value, Signal> {
        match token {
            Token::Constant { value } => Ok(value.clone()),
            Token::Parameter { kind } => Ok(self.parameter(kind)),
            Token::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                operators::eval_unary(*op, value).map_err(Signal::from)
            }
            Token::BinaryOp { op, left, right } if op.short_circuits() => {
                self.short_circuit(*op, left, right)
            }
            Token::BinaryOp { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                operators::eval_binary(*op, l, r).map_err(Signal::from)
            }
            Token::Ternary {
                condition,
                if_true,
                if_false,
            } => {
                let cond = self.eval(condition)?;
                match cond.as_bool() {
                    Some(true) => self.eval(if_true),
                    Some(false) => self.eval(if_false),
                    None => Err(EvalError::NonBooleanCondition {
                        found: cond.type_ref().to_string(),
                    }
                    .into()),
                }
            }
            Token::NullCoalesce { left, right } => {
                let l = self.eval(left)?;
                if l.is_null() {
                    self.eval(right)
                } else {
                    Ok(l)
                }
            }
            Token::NullPropagate { target } => {
                let value = self.eval(target)?;
                if value.is_null() {
                    Err(Signal::NullExit)
                } else {
                    Ok(value)
                }
            }
            Token::Chain { target } => match self.eval(target) {
                Err(Signal::NullExit) => Ok(Value::Null),
                other => other,
            },
            Token::StaticMember { ty, name } => self.static_member(ty, name).map_err(Signal::from),
            Token::InstanceMember { target, name } => {
                let recv = self.eval(target)?;
                self.instance_member(recv, name).map_err(Signal::from)
            }
            Token::StaticCall {
                ty,
                name,
                type_args,
                args,
            } => {
                let args = self.eval_args(args)?;
                self.static_call(ty, name, type_args, &args)
                    .map_err(Signal::from)
            }
            Token::InstanceCall {
                target,
                name,
                type_args,
                args,
            } => {
                let recv = self.eval(target)?;
                let args = self.eval_args(args)?;
                self.instance_call(recv, name, type_args, args)
                    .map_err(Signal::from)
            }
            Token::New { ty, args } => {
                let args = self.eval_args(args)?;
                self.construct(ty, &args).map_err(Signal::from)
            }
            Token::Index { target, args } => {
                let recv = self.eval(target)?;
                let args = self.eval_args(args)?;
                self.index(recv, &args).map_err(Signal::from)
            }
            Token::Cast { ty, target } => {
                let value = self.eval(target)?;
                explicit_cast(ty, value).map_err(Signal::from)
            }
            Token::Typeof { ty } => Ok(Value::Type(ty.clone())),
            Token::Is { target, ty } => {
                let value = self.eval(target)?;
                Ok(Value::Bool(ty.is_instance(&value)))
            }
            Token::As { target, ty } => {
                let value = self.eval(target)?;
                if ty.is_instance(&value) {
                    Ok(value)
                } else {
                    Ok(Value::Null)
                }
            }
            Token::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)
            }
            Token::Lambda { params, body } => Ok(Value::Lambda(std::sync::Arc::new(LambdaValue {
                params: params.clone(),
                body: body.clone(),
                captures: self.scopes.clone(),
            }))),
            Token::Throw { value } => {
                let value = self.eval(value)?;
                Err(EvalError::Thrown {
                    message: value.to_string(),
                }
                .into())
            }
            Token::Bracketed { inner } => self.eval(inner),
        }
    }

    fn parameter(&self, kind: &ParamKind) -> Value {
        match kind {
            ParamKind::Named(name) => {
                for frame in self.scopes.iter().rev() {
                    for (bound, value) in frame.iter().rev() {
                        if bound == name {
                            return value.clone();
                        }
                    }
                }
                self.input.clone()
            }
            ParamKind::Slot(n) => self.slots[*n as usize].clone(),
            ParamKind::Side(n) => self.side.get(*n as usize).cloned().unwrap_or(Value::Null),
        }
    }

    fn short_circuit(&mut self, op: Operator, left: &Token, right: &Token) -> Result<Value, Signal> {
        let l = self.eval(left)?;
        let Some(a) = l.as_bool() else {
            return Err(EvalError::NonBooleanCondition {
                found: l.type_ref().to_string(),
            }
            .into());
        };
        match op {
            Operator::Or if a => return Ok(Value::Bool(true)),
            Operator::Or => {}
            _ if !a => return Ok(Value::Bool(false)),
            _ => {}
        }
        let r = self.eval(right)?;
        match r.as_bool() {
            Some(b) => Ok(Value::Bool(b)),
            None => Err(EvalError::NonBooleanCondition {
                found: r.type_ref().to_string(),
            }
            .into()),
        }
    }

    fn eval_args(&mut self, args: &[Token]) -> Result<Vec<Value>, Signal> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn static_member(&self, ty: &TypeRef, name: &str) -> Result<Value, EvalError> {
        if let TypeRef::Host(host) = ty {
            if let Some(value) = host.static_value(name) {
                return Ok(value.clone());
            }
        }
        Err(EvalError::UnknownMember {
            ty: ty.to_string(),
            name: name.to_string(),
        })
    }

    fn instance_member(&mut self, recv: Value, name: &str) -> Result<Value, EvalError> {
        if recv.is_null() {
            return Err(EvalError::NullReference {
                access: name.to_string(),
            });
        }
        match &recv {
            Value::Str(s) if name == "Length" => Ok(Value::I32(s.chars().count() as i32)),
            Value::Array(items) if name == "Length" => Ok(Value::I32(items.len() as i32)),
            Value::Object(obj) => {
                let ty = obj.ty.clone();
                match ty.property(name) {
                    Some(property) => (property.get)(self, &[recv.clone()]),
                    None => Err(EvalError::UnknownMember {
                        ty: ty.qualified_name(),
                        name: name.to_string(),
                    }),
                }
            }
            _ => Err(EvalError::UnknownMember {
                ty: recv.type_ref().to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn static_call(
        &mut self,
        ty: &TypeRef,
        name: &str,
        type_args: &[TypeRef],
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let TypeRef::Host(host) = ty else {
            return Err(EvalError::UnknownMember {
                ty: ty.to_string(),
                name: name.to_string(),
            });
        };
        let Some(overloads) = host.static_overloads(name) else {
            return Err(EvalError::UnknownMember {
                ty: ty.to_string(),
                name: name.to_string(),
            });
        };
        match registry::select_overload(overloads, type_args, args) {
            Some((def, adjusted)) => (def.body)(self, &adjusted),
            None => Err(EvalError::NoOverload {
                name: format!("{}.{}", ty, name),
            }),
        }
    }

    fn instance_call(
        &mut self,
        recv: Value,
        name: &str,
        type_args: &[TypeRef],
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        if recv.is_null() {
            return Err(EvalError::NullReference {
                access: name.to_string(),
            });
        }
        if let Some(value) = self.builtin_call(&recv, name, &args)? {
            return Ok(value);
        }
        if let Value::Object(obj) = &recv {
            let ty = obj.ty.clone();
            if let Some(overloads) = ty.method_overloads(name) {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(recv.clone());
                full.extend(args.iter().cloned());
                return match registry::select_overload(overloads, type_args, &full) {
                    Some((def, adjusted)) => (def.body)(self, &adjusted),
                    None => Err(EvalError::NoOverload {
                        name: format!("{}.{}", ty.qualified_name(), name),
                    }),
                };
            }
        }
        // Extension-style functions take the receiver as first argument.
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(recv.clone());
        full.extend(args);
        if let Some((def, adjusted)) = registry::global().find_function(name, type_args, &full) {
            return (def.body)(self, &adjusted);
        }
        Err(EvalError::UnknownMember {
            ty: recv.type_ref().to_string(),
            name: name.to_string(),
        })
    }

    /// Built-in members of strings, arrays and everything's `ToString`.
    fn builtin_call(
        &mut self,
        recv: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, EvalError> {
        if name == "ToString" && args.is_empty() {
            return Ok(Some(Value::str(recv.to_string())));
        }
        let Value::Str(s) = recv else {
            return Ok(None);
        };
        let one_str = || args[0].as_str();
        let result = match (name, args.len()) {
            ("ToUpper", 0) => Value::str(s.to_uppercase()),
            ("ToLower", 0) => Value::str(s.to_lowercase()),
            ("Trim", 0) => Value::str(s.trim()),
            ("Contains", 1) => match one_str() {
                Some(needle) => Value::Bool(s.contains(needle)),
                None => return Ok(None),
            },
            ("StartsWith", 1) => match one_str() {
                Some(prefix) => Value::Bool(s.starts_with(prefix)),
                None => return Ok(None),
            },
            ("EndsWith", 1) => match one_str() {
                Some(suffix) => Value::Bool(s.ends_with(suffix)),
                None => return Ok(None),
            },
            ("IndexOf", 1) => match one_str() {
                Some(needle) => match s.find(needle) {
                    Some(byte) => Value::I32(s[..byte].chars().count() as i32),
                    None => Value::I32(-1),
                },
                None => return Ok(None),
            },
            ("Replace", 2) => match (args[0].as_str(), args[1].as_str()) {
                (Some(from), Some(to)) => Value::str(s.replace(from, to)),
                _ => return Ok(None),
            },
            ("Substring", 1) | ("Substring", 2) => {
                let total = s.chars().count();
                let start = args[0].as_i64().unwrap_or(-1);
                if start < 0 || start as usize > total {
                    return Err(EvalError::IndexOutOfBounds {
                        index: start,
                        len: total,
                    });
                }
                let rest = total - start as usize;
                let take = match args.get(1) {
                    Some(len) => {
                        let len = len.as_i64().unwrap_or(-1);
                        if len < 0 || len as usize > rest {
                            return Err(EvalError::IndexOutOfBounds {
                                index: len,
                                len: rest,
                            });
                        }
                        len as usize
                    }
                    None => rest,
                };
                Value::str(
                    s.chars()
                        .skip(start as usize)
                        .take(take)
                        .collect::<String>(),
                )
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn construct(&mut self, ty: &TypeRef, args: &[Value]) -> Result<Value, EvalError> {
        let TypeRef::Host(host) = ty else {
            return Err(EvalError::NoOverload {
                name: ty.to_string(),
            });
        };
        match registry::select_overload(host.constructors(), &[], args) {
            Some((def, adjusted)) => (def.body)(self, &adjusted),
            None => Err(EvalError::NoOverload {
                name: ty.to_string(),
            }),
        }
    }

    fn index(&mut self, recv: Value, args: &[Value]) -> Result<Value, EvalError> {
        if recv.is_null() {
            return Err(EvalError::NullReference {
                access: "[]".to_string(),
            });
        }
        match &recv {
            Value::Array(items) => {
                let index = single_index(args)?;
                match usize::try_from(index).ok().and_then(|i| items.get(i)) {
                    Some(value) => Ok(value.clone()),
                    None => Err(EvalError::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    }),
                }
            }
            Value::Str(s) => {
                let index = single_index(args)?;
                match usize::try_from(index)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                {
                    Some(c) => Ok(Value::Char(c)),
                    None => Err(EvalError::IndexOutOfBounds {
                        index,
                        len: s.chars().count(),
                    }),
                }
            }
            Value::Object(obj) => {
                let ty = obj.ty.clone();
                match ty.indexer() {
                    Some(get) => {
                        let mut full = Vec::with_capacity(args.len() + 1);
                        full.push(recv.clone());
                        full.extend(args.iter().cloned());
                        let get = get.clone();
                        get(self, &full)
                    }
                    None => Err(EvalError::UnknownMember {
                        ty: ty.qualified_name(),
                        name: "[]".to_string(),
                    }),
                }
            }
            _ => Err(EvalError::UnknownMember {
                ty: recv.type_ref().to_string(),
                name: "[]".to_string(),
            }),
        }
    }

    fn assign(&mut self, target: &Token, value: Value) -> Result<Value, Signal> {
        match target {
            Token::Parameter {
                kind: ParamKind::Slot(n),
            } => {
                self.slots[*n as usize] = value.clone();
                Ok(value)
            }
            Token::InstanceMember { target, name } => {
                let recv = self.eval(target)?;
                let Value::Object(obj) = &recv else {
                    return Err(EvalError::NotAssignable {
                        target: name.to_string(),
                    }
                    .into());
                };
                let ty = obj.ty.clone();
                let Some(set) = ty.property(name).and_then(|p| p.set.clone()) else {
                    return Err(EvalError::NotAssignable {
                        target: name.to_string(),
                    }
                    .into());
                };
                set(self, &[recv.clone(), value.clone()])?;
                Ok(value)
            }
            _ => Err(EvalError::NotAssignable {
                target: "expression".to_string(),
            }
            .into()),
        }
    }
}

fn single_index(args: &[Value]) -> Result<i64, EvalError> {
    match args {
        [one] => one.as_i64().ok_or_else(|| EvalError::InvalidCast {
            from: one.type_ref().to_string(),
            to: TypeRef::I32.to_string(),
        }),
        _ => Err(EvalError::NoOverload {
            name: "[]".to_string(),
        }),
    }
}

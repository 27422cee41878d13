//! Dynamic runtime values.
//!
//! Everything the evaluator touches is a [`Value`]. The variant set is
//! closed; operand types are inspected and branched on explicitly at
//! evaluation time rather than resolved statically. Values are cheap to
//! clone (`EcoString` for text, `Arc` for arrays, objects and lambdas) and
//! `Send + Sync`, so a compiled unit can be invoked from many threads.

use core::fmt;
use std::sync::Arc;

use ecow::EcoString;
use rust_decimal::Decimal;

use crate::parser::Token;
use crate::types::{ObjectRef, TypeRef};

/// A dynamically typed runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Str(EcoString),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Array(Arc<Vec<Value>>),
    /// First-class result of `typeof(..)`.
    Type(TypeRef),
    /// A host object instance.
    Object(ObjectRef),
    /// An in-expression lambda, passed to functions that take callables.
    Lambda(Arc<LambdaValue>),
}

/// A compiled in-expression lambda: parameter names, the body subtree, and
/// the scope frames captured at the point the lambda expression was
/// evaluated.
pub struct LambdaValue {
    pub params: Vec<EcoString>,
    pub body: Arc<Token>,
    pub captures: Vec<Vec<(EcoString, Value)>>,
}

impl LambdaValue {
    fn params_display(&self) -> String {
        self.params
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for LambdaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lambda({})", self.params_display())
    }
}

impl Value {
    pub fn str(s: impl Into<EcoString>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    /// The value's type identity; `Null` reports the dynamic marker.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Value::Null => TypeRef::Object,
            Value::Bool(_) => TypeRef::Bool,
            Value::Char(_) => TypeRef::Char,
            Value::Str(_) => TypeRef::Str,
            Value::I8(_) => TypeRef::I8,
            Value::U8(_) => TypeRef::U8,
            Value::I16(_) => TypeRef::I16,
            Value::U16(_) => TypeRef::U16,
            Value::I32(_) => TypeRef::I32,
            Value::U32(_) => TypeRef::U32,
            Value::I64(_) => TypeRef::I64,
            Value::U64(_) => TypeRef::U64,
            Value::F32(_) => TypeRef::F32,
            Value::F64(_) => TypeRef::F64,
            Value::Decimal(_) => TypeRef::Decimal,
            // Element type is not tracked per array; report object[].
            Value::Array(_) => TypeRef::Array(Arc::new(TypeRef::Object)),
            Value::Type(_) => TypeRef::Type,
            Value::Object(obj) => TypeRef::Host(obj.ty.clone()),
            Value::Lambda(_) => TypeRef::Lambda,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Widening read of any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::U8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::Char(c) => Some(c as i64),
            _ => None,
        }
    }

    /// Widening read of any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            Value::Decimal(d) => d.to_f64(),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Whether the variant is one of the numeric kinds (chars count, as in
    /// the source grammar's arithmetic).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::U8(_)
                | Value::I16(_)
                | Value::U16(_)
                | Value::I32(_)
                | Value::U32(_)
                | Value::I64(_)
                | Value::U64(_)
                | Value::F32(_)
                | Value::F64(_)
                | Value::Decimal(_)
                | Value::Char(_)
        )
    }
}

// Structural equality per variant. Cross-width numeric equality is the
// `==` operator's concern (see evaluator::operators), not Value identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => write!(f, "{}", s),
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Type(ty) => write!(f, "{}", ty),
            Value::Object(obj) => write!(f, "{}", obj.ty.qualified_name()),
            Value::Lambda(l) => write!(f, "lambda({})", l.params_display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ref_reports_variant_kinds() {
        assert_eq!(Value::I32(5).type_ref(), TypeRef::I32);
        assert_eq!(Value::F64(5.0).type_ref(), TypeRef::F64);
        assert_eq!(Value::str("x").type_ref(), TypeRef::Str);
        assert_eq!(Value::Null.type_ref(), TypeRef::Object);
    }

    #[test]
    fn cross_width_values_are_not_structurally_equal() {
        assert_ne!(Value::I32(5), Value::I64(5));
        assert_ne!(Value::F32(1.0), Value::F64(1.0));
    }

    #[test]
    fn display_stringifies_without_quotes() {
        assert_eq!(Value::str("abc").to_string(), "abc");
        assert_eq!(Value::I32(42).to_string(), "42");
        assert_eq!(
            Value::array(vec![Value::I32(1), Value::I32(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn widening_reads() {
        assert_eq!(Value::U8(7).as_i64(), Some(7));
        assert_eq!(Value::Char('A').as_i64(), Some(65));
        assert_eq!(Value::I32(3).as_f64(), Some(3.0));
        assert_eq!(Value::str("x").as_i64(), None);
    }
}

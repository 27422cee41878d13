//! Explicit cast semantics.
//!
//! Numeric casts truncate toward zero and wrap on overflow, like an
//! unchecked conversion. Reference-like targets perform an instance check
//! and fail with an invalid-cast error rather than returning null; the
//! `as` operator is the null-yielding variant and lives in the evaluator.

use rust_decimal::prelude::ToPrimitive;

use super::error::EvalError;
use super::operators::as_decimal;
use crate::types::TypeRef;
use crate::values::Value;

pub(crate) fn explicit_cast(ty: &TypeRef, value: Value) -> Result<Value, EvalError> {
    let invalid = |value: &Value| EvalError::InvalidCast {
        from: value.type_ref().to_string(),
        to: ty.to_string(),
    };

    if matches!(ty, TypeRef::Object) {
        return Ok(value);
    }
    if value.is_null() {
        return if ty.accepts_null() {
            Ok(Value::Null)
        } else {
            Err(invalid(&value))
        };
    }

    match ty {
        TypeRef::Bool => match value {
            Value::Bool(_) => Ok(value),
            _ => Err(invalid(&value)),
        },
        TypeRef::Str => match value {
            Value::Str(_) => Ok(value),
            _ => Err(invalid(&value)),
        },
        TypeRef::Char => match value {
            Value::Char(_) => Ok(value),
            _ => match truncated(&value) {
                Some(x) => u32::try_from(x)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Value::Char)
                    .ok_or_else(|| invalid(&value)),
                None => Err(invalid(&value)),
            },
        },
        TypeRef::I8 => int_cast(&value, invalid, |x| Value::I8(x as i8)),
        TypeRef::U8 => int_cast(&value, invalid, |x| Value::U8(x as u8)),
        TypeRef::I16 => int_cast(&value, invalid, |x| Value::I16(x as i16)),
        TypeRef::U16 => int_cast(&value, invalid, |x| Value::U16(x as u16)),
        TypeRef::I32 => int_cast(&value, invalid, |x| Value::I32(x as i32)),
        TypeRef::U32 => int_cast(&value, invalid, |x| Value::U32(x as u32)),
        TypeRef::I64 => int_cast(&value, invalid, |x| Value::I64(x as i64)),
        TypeRef::U64 => int_cast(&value, invalid, |x| Value::U64(x as u64)),
        TypeRef::F32 => match value.as_f64() {
            Some(f) => Ok(Value::F32(f as f32)),
            None => Err(invalid(&value)),
        },
        TypeRef::F64 => match value.as_f64() {
            Some(f) => Ok(Value::F64(f)),
            None => Err(invalid(&value)),
        },
        TypeRef::Decimal => match as_decimal(&value) {
            Some(d) => Ok(Value::Decimal(d)),
            None => Err(invalid(&value)),
        },
        TypeRef::Array(_) | TypeRef::Type | TypeRef::Lambda | TypeRef::Host(_) => {
            if ty.is_instance(&value) {
                Ok(value)
            } else {
                Err(invalid(&value))
            }
        }
        TypeRef::Object | TypeRef::Generic(_) => Err(invalid(&value)),
    }
}

fn int_cast(
    value: &Value,
    invalid: impl Fn(&Value) -> EvalError,
    wrap: impl Fn(i128) -> Value,
) -> Result<Value, EvalError> {
    match truncated(value) {
        Some(x) => Ok(wrap(x)),
        None => Err(invalid(value)),
    }
}

/// The operand truncated toward zero, exact for integer variants.
fn truncated(value: &Value) -> Option<i128> {
    match *value {
        Value::U64(x) => Some(x as i128),
        Value::F32(x) if x.is_finite() => Some(x.trunc() as i128),
        Value::F64(x) if x.is_finite() => Some(x.trunc() as i128),
        Value::F32(_) | Value::F64(_) => None,
        Value::Decimal(d) => d.trunc().to_i128(),
        _ => value.as_i64().map(|x| x as i128),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn float_to_int_truncates() {
        assert_eq!(
            explicit_cast(&TypeRef::I32, Value::F64(3.9)).unwrap(),
            Value::I32(3)
        );
        assert_eq!(
            explicit_cast(&TypeRef::I32, Value::F64(-3.9)).unwrap(),
            Value::I32(-3)
        );
    }

    #[test]
    fn int_to_float_and_decimal() {
        assert_eq!(
            explicit_cast(&TypeRef::F64, Value::I32(3)).unwrap(),
            Value::F64(3.0)
        );
        assert_eq!(
            explicit_cast(&TypeRef::Decimal, Value::I32(3)).unwrap(),
            Value::Decimal(3.into())
        );
    }

    #[test]
    fn narrowing_wraps() {
        assert_eq!(
            explicit_cast(&TypeRef::U8, Value::I32(260)).unwrap(),
            Value::U8(4)
        );
    }

    #[test]
    fn char_int_round_trip() {
        assert_eq!(
            explicit_cast(&TypeRef::I32, Value::Char('A')).unwrap(),
            Value::I32(65)
        );
        assert_eq!(
            explicit_cast(&TypeRef::Char, Value::I32(65)).unwrap(),
            Value::Char('A')
        );
    }

    #[test]
    fn string_cast_requires_string() {
        assert_eq!(
            explicit_cast(&TypeRef::Str, Value::str("x")).unwrap(),
            Value::str("x")
        );
        assert!(matches!(
            explicit_cast(&TypeRef::Str, Value::I32(5)),
            Err(EvalError::InvalidCast { .. })
        ));
    }

    #[test]
    fn null_fits_reference_targets_only() {
        assert_eq!(
            explicit_cast(&TypeRef::Str, Value::Null).unwrap(),
            Value::Null
        );
        assert!(matches!(
            explicit_cast(&TypeRef::I32, Value::Null),
            Err(EvalError::InvalidCast { .. })
        ));
    }
}

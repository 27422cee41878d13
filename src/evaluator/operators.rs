//! Operator semantics over dynamic values.
//!
//! Mixed-width numeric operands are promoted to a common representation
//! before the operation runs. The ladder, widest first: decimal, double,
//! float, ulong, long, uint, int. Anything int-sized or narrower (chars
//! included) computes as int. Mixing a signed operand into a uint
//! promotion widens to long instead; a negative operand never fits a
//! ulong promotion.
//!
//! Integer arithmetic wraps. Integer and decimal division by zero is an
//! error; float division follows IEEE and yields infinities and NaN.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::error::EvalError;
use crate::ops::Operator;
use crate::values::Value;

/// A pair of operands lifted to their common numeric representation.
enum Num {
    I32(i32, i32),
    U32(u32, u32),
    I64(i64, i64),
    U64(u64, u64),
    F32(f32, f32),
    F64(f64, f64),
    Dec(Decimal, Decimal),
}

fn rank(v: &Value) -> Option<u8> {
    match v {
        Value::I8(_)
        | Value::U8(_)
        | Value::I16(_)
        | Value::U16(_)
        | Value::I32(_)
        | Value::Char(_) => Some(0),
        Value::U32(_) => Some(1),
        Value::I64(_) => Some(2),
        Value::U64(_) => Some(3),
        Value::F32(_) => Some(4),
        Value::F64(_) => Some(5),
        Value::Decimal(_) => Some(6),
        _ => None,
    }
}

fn is_signed(v: &Value) -> bool {
    matches!(
        v,
        Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_)
    )
}

fn promote(l: &Value, r: &Value) -> Option<Num> {
    let mut target = rank(l)?.max(rank(r)?);
    // uint with a signed operand widens to long.
    if target == 1 && (is_signed(l) || is_signed(r)) {
        target = 2;
    }
    match target {
        0 => Some(Num::I32(l.as_i64()? as i32, r.as_i64()? as i32)),
        1 => Some(Num::U32(
            u32::try_from(l.as_i64()?).ok()?,
            u32::try_from(r.as_i64()?).ok()?,
        )),
        2 => Some(Num::I64(l.as_i64()?, r.as_i64()?)),
        3 => Some(Num::U64(as_u64(l)?, as_u64(r)?)),
        4 => Some(Num::F32(as_f32(l)?, as_f32(r)?)),
        5 => Some(Num::F64(l.as_f64()?, r.as_f64()?)),
        _ => Some(Num::Dec(as_decimal(l)?, as_decimal(r)?)),
    }
}

fn as_u64(v: &Value) -> Option<u64> {
    match *v {
        Value::U64(x) => Some(x),
        _ => u64::try_from(v.as_i64()?).ok(),
    }
}

fn as_f32(v: &Value) -> Option<f32> {
    match *v {
        Value::F32(x) => Some(x),
        _ => v.as_f64().map(|x| x as f32),
    }
}

pub(crate) fn as_decimal(v: &Value) -> Option<Decimal> {
    match *v {
        Value::Decimal(d) => Some(d),
        Value::F32(x) => Decimal::from_f64(x as f64),
        Value::F64(x) => Decimal::from_f64(x),
        _ => v.as_i64().map(Decimal::from),
    }
}

fn invalid_operands(op: Operator, l: &Value, r: &Value) -> EvalError {
    EvalError::InvalidOperands {
        op: op.symbol().unwrap_or("?").to_string(),
        left: l.type_ref().to_string(),
        right: r.type_ref().to_string(),
    }
}

fn invalid_operand(op: Operator, v: &Value) -> EvalError {
    EvalError::InvalidOperand {
        op: op.symbol().unwrap_or("?").to_string(),
        operand: v.type_ref().to_string(),
    }
}

pub(crate) fn eval_unary(op: Operator, v: Value) -> Result<Value, EvalError> {
    match op {
        Operator::UnaryPlus if v.is_numeric() => Ok(v),
        Operator::Negate => match v {
            Value::I8(_) | Value::U8(_) | Value::I16(_) | Value::U16(_) | Value::I32(_)
            | Value::Char(_) => {
                let x = v.as_i64().unwrap_or(0) as i32;
                Ok(Value::I32(x.wrapping_neg()))
            }
            Value::U32(x) => Ok(Value::I64(-(x as i64))),
            Value::I64(x) => Ok(Value::I64(x.wrapping_neg())),
            Value::F32(x) => Ok(Value::F32(-x)),
            Value::F64(x) => Ok(Value::F64(-x)),
            Value::Decimal(d) => Ok(Value::Decimal(-d)),
            other => Err(invalid_operand(op, &other)),
        },
        Operator::Not => match v.as_bool() {
            Some(b) => Ok(Value::Bool(!b)),
            None => Err(invalid_operand(op, &v)),
        },
        _ => Err(invalid_operand(op, &v)),
    }
}

pub(crate) fn eval_binary(op: Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    match op {
        // String concatenation wins over numeric addition.
        Operator::Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
            Ok(Value::str(format!("{}{}", l, r)))
        }
        Operator::Multiply
        | Operator::Divide
        | Operator::Modulo
        | Operator::Add
        | Operator::Subtract => arithmetic(op, l, r),
        Operator::GreaterOrEqual | Operator::LessOrEqual | Operator::Greater | Operator::Less => {
            relational(op, l, r)
        }
        Operator::Equal => Ok(Value::Bool(values_equal(&l, &r))),
        Operator::NotEqual => Ok(Value::Bool(!values_equal(&l, &r))),
        Operator::And | Operator::AlternateAnd | Operator::Or => logical(op, l, r),
        Operator::BitwiseAnd
        | Operator::AlternateBitwiseAnd
        | Operator::BitwiseOr
        | Operator::BitwiseXor => bitwise(op, l, r),
        _ => Err(invalid_operands(op, &l, &r)),
    }
}

fn arithmetic(op: Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    let Some(pair) = promote(&l, &r) else {
        return Err(invalid_operands(op, &l, &r));
    };
    match pair {
        Num::I32(a, b) => int_arith(op, a as i64, b as i64).map(|x| Value::I32(x as i32)),
        Num::U32(a, b) => uint_arith(op, a as u64, b as u64).map(|x| Value::U32(x as u32)),
        Num::I64(a, b) => int_arith(op, a, b).map(Value::I64),
        Num::U64(a, b) => uint_arith(op, a, b).map(Value::U64),
        Num::F32(a, b) => Ok(Value::F32(float_arith(op, a as f64, b as f64) as f32)),
        Num::F64(a, b) => Ok(Value::F64(float_arith(op, a, b))),
        Num::Dec(a, b) => decimal_arith(op, a, b).map(Value::Decimal),
    }
}

fn int_arith(op: Operator, a: i64, b: i64) -> Result<i64, EvalError> {
    match op {
        Operator::Multiply => Ok(a.wrapping_mul(b)),
        Operator::Add => Ok(a.wrapping_add(b)),
        Operator::Subtract => Ok(a.wrapping_sub(b)),
        Operator::Divide if b == 0 => Err(EvalError::DivisionByZero),
        Operator::Divide => Ok(a.wrapping_div(b)),
        Operator::Modulo if b == 0 => Err(EvalError::DivisionByZero),
        Operator::Modulo => Ok(a.wrapping_rem(b)),
        _ => unreachable!("non-arithmetic operator"),
    }
}

fn uint_arith(op: Operator, a: u64, b: u64) -> Result<u64, EvalError> {
    match op {
        Operator::Multiply => Ok(a.wrapping_mul(b)),
        Operator::Add => Ok(a.wrapping_add(b)),
        Operator::Subtract => Ok(a.wrapping_sub(b)),
        Operator::Divide if b == 0 => Err(EvalError::DivisionByZero),
        Operator::Divide => Ok(a / b),
        Operator::Modulo if b == 0 => Err(EvalError::DivisionByZero),
        Operator::Modulo => Ok(a % b),
        _ => unreachable!("non-arithmetic operator"),
    }
}

fn float_arith(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Multiply => a * b,
        Operator::Divide => a / b,
        Operator::Modulo => a % b,
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        _ => unreachable!("non-arithmetic operator"),
    }
}

fn decimal_arith(op: Operator, a: Decimal, b: Decimal) -> Result<Decimal, EvalError> {
    let result = match op {
        Operator::Multiply => a.checked_mul(b),
        Operator::Add => a.checked_add(b),
        Operator::Subtract => a.checked_sub(b),
        Operator::Divide if b.is_zero() => return Err(EvalError::DivisionByZero),
        Operator::Divide => a.checked_div(b),
        Operator::Modulo if b.is_zero() => return Err(EvalError::DivisionByZero),
        Operator::Modulo => a.checked_rem(b),
        _ => unreachable!("non-arithmetic operator"),
    };
    result.ok_or(EvalError::Overflow)
}

fn relational(op: Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    let Some(pair) = promote(&l, &r) else {
        return Err(invalid_operands(op, &l, &r));
    };
    let ordering = match pair {
        Num::I32(a, b) => a.partial_cmp(&b),
        Num::U32(a, b) => a.partial_cmp(&b),
        Num::I64(a, b) => a.partial_cmp(&b),
        Num::U64(a, b) => a.partial_cmp(&b),
        Num::F32(a, b) => a.partial_cmp(&b),
        Num::F64(a, b) => a.partial_cmp(&b),
        Num::Dec(a, b) => a.partial_cmp(&b),
    };
    // NaN compares false against everything.
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        Operator::GreaterOrEqual => ordering.is_ge(),
        Operator::LessOrEqual => ordering.is_le(),
        Operator::Greater => ordering.is_gt(),
        Operator::Less => ordering.is_lt(),
        _ => unreachable!("non-relational operator"),
    };
    Ok(Value::Bool(result))
}

/// Equality is total: mismatched kinds are unequal, never an error.
/// Numeric operands compare by promoted value, so `5 == 5L` holds.
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    if let Some(pair) = promote(l, r) {
        return match pair {
            Num::I32(a, b) => a == b,
            Num::U32(a, b) => a == b,
            Num::I64(a, b) => a == b,
            Num::U64(a, b) => a == b,
            Num::F32(a, b) => a == b,
            Num::F64(a, b) => a == b,
            Num::Dec(a, b) => a == b,
        };
    }
    l == r
}

fn logical(op: Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    match (l.as_bool(), r.as_bool()) {
        (Some(a), Some(b)) => Ok(Value::Bool(match op {
            Operator::Or => a || b,
            _ => a && b,
        })),
        _ => Err(invalid_operands(op, &l, &r)),
    }
}

fn bitwise(op: Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    if let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) {
        return Ok(Value::Bool(match op {
            Operator::BitwiseOr => a | b,
            Operator::BitwiseXor => a ^ b,
            _ => a & b,
        }));
    }
    let Some(pair) = promote(&l, &r) else {
        return Err(invalid_operands(op, &l, &r));
    };
    match pair {
        Num::I32(a, b) => Ok(Value::I32(int_bits(op, a as i64, b as i64) as i32)),
        Num::U32(a, b) => Ok(Value::U32(uint_bits(op, a as u64, b as u64) as u32)),
        Num::I64(a, b) => Ok(Value::I64(int_bits(op, a, b))),
        Num::U64(a, b) => Ok(Value::U64(uint_bits(op, a, b))),
        _ => Err(invalid_operands(op, &l, &r)),
    }
}

fn int_bits(op: Operator, a: i64, b: i64) -> i64 {
    match op {
        Operator::BitwiseOr => a | b,
        Operator::BitwiseXor => a ^ b,
        _ => a & b,
    }
}

fn uint_bits(op: Operator, a: u64, b: u64) -> u64 {
    match op {
        Operator::BitwiseOr => a | b,
        Operator::BitwiseXor => a ^ b,
        _ => a & b,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(
            eval_binary(Operator::Add, Value::I32(2), Value::I32(3)).unwrap(),
            Value::I32(5)
        );
        assert_eq!(
            eval_binary(Operator::Divide, Value::I32(7), Value::I32(2)).unwrap(),
            Value::I32(3)
        );
    }

    #[test]
    fn mixed_widths_promote() {
        assert_eq!(
            eval_binary(Operator::Add, Value::I32(2), Value::I64(3)).unwrap(),
            Value::I64(5)
        );
        assert_eq!(
            eval_binary(Operator::Multiply, Value::I32(2), Value::F64(1.5)).unwrap(),
            Value::F64(3.0)
        );
        assert_eq!(
            eval_binary(Operator::Add, Value::U32(2), Value::I32(-3)).unwrap(),
            Value::I64(-1)
        );
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert_eq!(
            eval_binary(Operator::Divide, Value::I32(1), Value::I32(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            eval_binary(Operator::Modulo, Value::I64(1), Value::I64(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let result = eval_binary(Operator::Divide, Value::F64(1.0), Value::F64(0.0)).unwrap();
        assert_eq!(result, Value::F64(f64::INFINITY));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval_binary(Operator::Add, Value::str("a"), Value::I32(1)).unwrap(),
            Value::str("a1")
        );
        assert_eq!(
            eval_binary(Operator::Add, Value::I32(1), Value::str("a")).unwrap(),
            Value::str("1a")
        );
        assert_eq!(
            eval_binary(Operator::Add, Value::str("a"), Value::Null).unwrap(),
            Value::str("anull")
        );
    }

    #[test]
    fn equality_is_total() {
        assert_eq!(
            eval_binary(Operator::Equal, Value::I32(5), Value::I64(5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_binary(Operator::Equal, Value::str("5"), Value::I32(5)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_binary(Operator::NotEqual, Value::Null, Value::Null).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn relational_rejects_non_numeric() {
        assert!(matches!(
            eval_binary(Operator::Greater, Value::str("a"), Value::str("b")),
            Err(EvalError::InvalidOperands { .. })
        ));
    }

    #[test]
    fn chars_compute_as_ints() {
        assert_eq!(
            eval_binary(Operator::Subtract, Value::Char('c'), Value::Char('a')).unwrap(),
            Value::I32(2)
        );
    }

    #[test]
    fn bitwise_on_bools_and_ints() {
        assert_eq!(
            eval_binary(Operator::BitwiseAnd, Value::Bool(true), Value::Bool(false)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_binary(Operator::AlternateBitwiseAnd, Value::I32(6), Value::I32(3)).unwrap(),
            Value::I32(2)
        );
        assert_eq!(
            eval_binary(Operator::BitwiseXor, Value::I32(6), Value::I32(3)).unwrap(),
            Value::I32(5)
        );
    }

    #[test]
    fn negation_widens_small_ints() {
        assert_eq!(
            eval_unary(Operator::Negate, Value::U8(5)).unwrap(),
            Value::I32(-5)
        );
        assert_eq!(
            eval_unary(Operator::Negate, Value::U32(5)).unwrap(),
            Value::I64(-5)
        );
    }

    #[test]
    fn not_requires_bool() {
        assert_eq!(
            eval_unary(Operator::Not, Value::Bool(false)).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            eval_unary(Operator::Not, Value::I32(1)),
            Err(EvalError::InvalidOperand { .. })
        ));
    }
}

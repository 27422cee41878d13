use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use super::*;
use crate::diagnostics::{self, Event};
use crate::evaluator::EvalError;
use crate::test_utils::init_test_logging;
use crate::types::TypeRef;
use crate::values::Value;

fn build(expression: &str) -> Converter {
    Converter::builder(expression)
        .build()
        .expect("expression should compile")
}

#[test]
fn forward_conversion() {
    init_test_logging();
    let converter = build("$P * 2");
    assert_eq!(
        converter.convert(Value::I32(5), None, &[], None),
        Outcome::Value(Value::I32(10))
    );
    assert_eq!(converter.error_count(), 0);
}

#[test]
fn build_fails_on_bad_expressions() {
    assert!(Converter::builder("2 +").build().is_err());
    assert!(Converter::builder("$P * 2").backward("2 +").build().is_err());
}

#[test]
fn backward_requires_a_backward_expression() {
    let converter = build("$P * 2");
    assert_eq!(
        converter.convert_back(Value::I32(10), None, &[], None),
        Outcome::NoChange
    );

    let converter = Converter::builder("$P * 2")
        .backward("$P / 2")
        .build()
        .unwrap();
    assert_eq!(
        converter.convert_back(Value::I32(10), None, &[], None),
        Outcome::Value(Value::I32(5))
    );
}

#[test]
fn input_guard_rejects_silently() {
    let converter = Converter::builder("$P * 2")
        .input_guard(TypeRef::I32)
        .build()
        .unwrap();
    assert_eq!(
        converter.convert(Value::str("five"), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 0);
    assert_eq!(converter.last_error(), None);
    assert_eq!(
        converter.convert(Value::I32(5), None, &[], None),
        Outcome::Value(Value::I32(10))
    );
}

#[test]
fn backward_guard_declines_with_no_change() {
    let converter = Converter::builder("$P")
        .backward("$P")
        .backward_guard(TypeRef::I32)
        .build()
        .unwrap();
    assert_eq!(
        converter.convert_back(Value::str("x"), None, &[], None),
        Outcome::NoChange
    );
}

#[test]
fn placeholder_is_rejected_before_evaluation() {
    let converter = build("throw 'should not run'");
    assert_eq!(
        converter.convert(placeholder(), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 0);
}

#[test]
fn runtime_errors_are_contained_and_counted() {
    let seen = Arc::new(Mutex::new(0usize));
    let seen2 = seen.clone();
    let sub = diagnostics::subscribe(move |event| {
        if let Event::RuntimeError { expression, .. } = event {
            if expression == "$P.NoSuchMember" {
                *seen2.lock().unwrap() += 1;
            }
        }
    });

    let converter = build("$P.NoSuchMember");
    assert_eq!(
        converter.convert(Value::I32(1), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(
        converter.convert(Value::I32(2), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 2);
    assert!(matches!(
        converter.last_error(),
        Some(EvalError::UnknownMember { .. })
    ));
    assert_eq!(*seen.lock().unwrap(), 2);
    drop(sub);
}

#[test]
fn string_target_stringifies() {
    let converter = build("$P * 2");
    assert_eq!(
        converter.convert(Value::I32(5), Some(&TypeRef::Str), &[], None),
        Outcome::Value(Value::str("10"))
    );
}

#[test]
fn typed_target_casts() {
    let converter = build("$P * 2");
    assert_eq!(
        converter.convert(Value::I32(5), Some(&TypeRef::I64), &[], None),
        Outcome::Value(Value::I64(10))
    );
    // Null passes through any target untouched.
    let converter = build("$P");
    assert_eq!(
        converter.convert(Value::Null, Some(&TypeRef::I64), &[], None),
        Outcome::Value(Value::Null)
    );
}

#[test]
fn failed_target_conversion_poisons_the_target_type() {
    let converter = build("$P");
    // A string cannot cast to char; the char target is now poisoned.
    assert_eq!(
        converter.convert(Value::str("xy"), Some(&TypeRef::Char), &[], None),
        Outcome::Value(Value::str("xy"))
    );
    // Would have cast fine, but the poisoned target passes through.
    assert_eq!(
        converter.convert(Value::I32(70), Some(&TypeRef::Char), &[], None),
        Outcome::Value(Value::I32(70))
    );
}

#[test]
fn side_placeholders_reach_the_tree() {
    let converter = build("$P + $P0");
    assert_eq!(
        converter.convert(Value::I32(1), None, &[Value::I32(2)], None),
        Outcome::Value(Value::I32(3))
    );
}

struct Offset(i64);

impl ChainedConverter for Offset {
    fn convert(
        &self,
        value: Value,
        _target: Option<&TypeRef>,
        _locale: Option<&str>,
    ) -> Result<Value, EvalError> {
        match value.as_i64() {
            Some(x) => Ok(Value::I64(x + self.0)),
            None => Err(EvalError::host("not a number")),
        }
    }

    fn convert_back(
        &self,
        value: Value,
        _target: Option<&TypeRef>,
        _locale: Option<&str>,
    ) -> Result<Value, EvalError> {
        match value.as_i64() {
            Some(x) => Ok(Value::I64(x - self.0)),
            None => Err(EvalError::host("not a number")),
        }
    }
}

#[test]
fn chained_converter_wraps_both_directions() {
    let converter = Converter::builder("$P * 2")
        .backward("$P / 2")
        .chained(Arc::new(Offset(1)))
        .build()
        .unwrap();

    // Forward: tree first, chained stage after. 5 * 2 + 1 = 11.
    assert_eq!(
        converter.convert(Value::I32(5), None, &[], None),
        Outcome::Value(Value::I64(11))
    );
    // Backward: chained stage first, tree after. (11 - 1) / 2 = 5.
    assert_eq!(
        converter.convert_back(Value::I32(11), None, &[], None),
        Outcome::Value(Value::I64(5))
    );
}

#[test]
fn chained_converter_failures_are_contained() {
    let seen = Arc::new(Mutex::new(0usize));
    let seen2 = seen.clone();
    let sub = diagnostics::subscribe(move |event| {
        if let Event::ChainedConverterError { expression, .. } = event {
            if expression == "$P + 0" {
                *seen2.lock().unwrap() += 1;
            }
        }
    });

    let converter = Converter::builder("$P + 0")
        .chained(Arc::new(Offset(1)))
        .build()
        .unwrap();
    assert_eq!(
        converter.convert(Value::str("nan"), None, &[], None),
        Outcome::Unset
    );
    // Published on the diagnostics channel, but the error tally counts
    // tree evaluation only.
    assert_eq!(converter.error_count(), 0);
    assert_eq!(converter.last_error(), None);
    assert_eq!(*seen.lock().unwrap(), 1);
    drop(sub);
}

#[test]
fn backward_runtime_errors_yield_unset() {
    let converter = Converter::builder("$P")
        .backward("throw 'boom'")
        .build()
        .unwrap();
    assert_eq!(
        converter.convert_back(Value::I32(1), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 1);
    assert!(matches!(
        converter.last_error(),
        Some(EvalError::Thrown { .. })
    ));
}

#[test]
fn backward_chained_failures_yield_unset() {
    let converter = Converter::builder("$P")
        .backward("$P")
        .chained(Arc::new(Offset(1)))
        .build()
        .unwrap();
    assert_eq!(
        converter.convert_back(Value::str("nan"), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 0);
}

#[test]
fn debug_views_capture_both_trees() {
    let converter = Converter::builder("2 * 3").backward("$P").build().unwrap();
    assert_eq!(
        converter.debug_view(),
        "BinaryOp(*)\n  Constant(2)\n  Constant(3)\n"
    );
    assert_eq!(converter.backward_debug_view(), Some("Parameter($P)\n"));
    assert_eq!(converter.expression(), "2 * 3");
    assert_eq!(converter.backward_expression(), Some("$P"));
}

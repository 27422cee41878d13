//! End-to-end converter scenarios through the public API only.

use std::sync::Arc;

use once_cell::sync::Lazy;
use pretty_assertions::assert_eq;

use quickexpr::{
    global_registry, placeholder, Converter, FunctionDef, HostType, Outcome, TypeRef, Value,
};

fn convert(expression: &str, input: Value) -> Outcome {
    Converter::builder(expression)
        .build()
        .expect("expression should compile")
        .convert(input, None, &[], None)
}

#[test]
fn celsius_to_fahrenheit_round_trip() {
    let converter = Converter::builder("$P * 9.0 / 5.0 + 32")
        .backward("($P - 32) * 5.0 / 9.0")
        .build()
        .unwrap();
    assert_eq!(
        converter.convert(Value::F64(100.0), None, &[], None),
        Outcome::Value(Value::F64(212.0))
    );
    assert_eq!(
        converter.convert_back(Value::F64(212.0), None, &[], None),
        Outcome::Value(Value::F64(100.0))
    );
}

#[test]
fn conditional_formatting() {
    let rule = "$P > 0 ? 'positive' : ($P == 0 ? 'zero' : 'negative')";
    assert_eq!(
        convert(rule, Value::I32(5)),
        Outcome::Value(Value::str("positive"))
    );
    assert_eq!(
        convert(rule, Value::I32(0)),
        Outcome::Value(Value::str("zero"))
    );
    assert_eq!(
        convert(rule, Value::I32(-3)),
        Outcome::Value(Value::str("negative"))
    );
}

#[test]
fn null_propagation_yields_null_not_an_error() {
    let converter = Converter::builder("$P?.Length").build().unwrap();
    assert_eq!(
        converter.convert(Value::Null, None, &[], None),
        Outcome::Value(Value::Null)
    );
    assert_eq!(
        converter.convert(Value::str("abcd"), None, &[], None),
        Outcome::Value(Value::I32(4))
    );
    assert_eq!(converter.error_count(), 0);
}

#[test]
fn placeholder_input_is_skipped() {
    let converter = Converter::builder("1 / $P").build().unwrap();
    assert_eq!(
        converter.convert(placeholder(), None, &[], None),
        Outcome::Unset
    );
    assert_eq!(converter.error_count(), 0);
}

static LIMITS: Lazy<Arc<HostType>> = Lazy::new(|| {
    HostType::builder("EndToEnd", "Limits")
        .static_value("Max", Value::I32(100))
        .static_method(FunctionDef::new(
            "Clamp",
            vec![TypeRef::I32],
            TypeRef::I32,
            Arc::new(|_, args| match args[0] {
                Value::I32(x) => Ok(Value::I32(x.clamp(0, 100))),
                _ => unreachable!(),
            }),
        ))
        .build()
});

fn register_limits() {
    let registry = global_registry();
    registry.add_type("e2e_asm", LIMITS.clone());
    registry.add_namespace("EndToEnd", "e2e_asm");
}

#[test]
fn host_statics_and_methods() {
    register_limits();
    assert_eq!(
        convert("Limits.Max - $P", Value::I32(1)),
        Outcome::Value(Value::I32(99))
    );
    assert_eq!(
        convert("Limits.Clamp($P)", Value::I32(250)),
        Outcome::Value(Value::I32(100))
    );
}

#[test]
fn shared_converter_across_threads() {
    let converter = Arc::new(Converter::builder("($V0 = $P * $P) + $V0").build().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let converter = converter.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert_eq!(
                        converter.convert(Value::I32(i), None, &[], None),
                        Outcome::Value(Value::I32(2 * i * i))
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(converter.error_count(), 0);
}

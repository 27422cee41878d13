use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::types::{FunctionDef, HostType, TypeRef};
use crate::values::Value;

fn identity_body() -> crate::types::NativeFn {
    Arc::new(|_, args| Ok(args[0].clone()))
}

#[test]
fn builtin_aliases_resolve() {
    let reg = Registry::new();
    assert_eq!(reg.resolve_type("int", &[]).unwrap(), Some(TypeRef::I32));
    assert_eq!(reg.resolve_type("string", &[]).unwrap(), Some(TypeRef::Str));
    assert_eq!(
        reg.resolve_type("double[]", &[]).unwrap(),
        Some(TypeRef::Array(Arc::new(TypeRef::F64)))
    );
    assert_eq!(
        reg.resolve_type("int[][]", &[]).unwrap(),
        Some(TypeRef::Array(Arc::new(TypeRef::Array(Arc::new(
            TypeRef::I32
        )))))
    );
    assert_eq!(reg.resolve_type("Unknown", &[]).unwrap(), None);
}

#[test]
fn qualified_names_resolve_through_assemblies() {
    let reg = Registry::new();
    let ty = HostType::builder("Media", "Brush").build();
    reg.add_type("presentation", ty.clone());

    // Not visible until the assembly scope is added.
    assert_eq!(reg.resolve_type("Media.Brush", &[]).unwrap(), None);
    reg.add_assembly("presentation");
    assert_eq!(
        reg.resolve_type("Media.Brush", &[]).unwrap(),
        Some(TypeRef::Host(ty))
    );
}

#[test]
fn short_names_resolve_through_namespaces() {
    let reg = Registry::new();
    let ty = HostType::builder("Media", "Brush").build();
    reg.add_type("presentation", ty.clone());
    reg.add_namespace("Media", "presentation");

    assert_eq!(
        reg.resolve_type("Brush", &[]).unwrap(),
        Some(TypeRef::Host(ty))
    );
}

#[test]
fn distinct_matches_are_ambiguous() {
    let reg = Registry::new();
    reg.add_type("asm_a", HostType::builder("NsA", "Dup").build());
    reg.add_type("asm_b", HostType::builder("NsB", "Dup").build());
    reg.add_namespace("NsA", "asm_a");
    reg.add_namespace("NsB", "asm_b");

    let err = reg.resolve_type("Dup", &[]).unwrap_err();
    assert_eq!(err.name, "Dup");
    assert_eq!(err.candidates.len(), 2);
    assert!(err.to_string().contains(" and "));
}

#[test]
fn the_same_registration_twice_is_not_ambiguous() {
    let reg = Registry::new();
    let ty = HostType::builder("Shared", "One").build();
    reg.add_type("asm_a", ty.clone());
    reg.add_type("asm_b", ty.clone());
    reg.add_namespace("Shared", "asm_a");
    reg.add_namespace("Shared", "asm_b");

    assert_eq!(
        reg.resolve_type("One", &[]).unwrap(),
        Some(TypeRef::Host(ty))
    );
}

#[test]
fn generic_args_select_constructed_names() {
    let reg = Registry::new();
    let ty = HostType::builder("Coll", "List`1").build();
    reg.add_type("collections", ty.clone());
    reg.add_assembly("collections");

    assert_eq!(
        reg.resolve_type("Coll.List", &[TypeRef::I32]).unwrap(),
        Some(TypeRef::Host(ty))
    );
    assert_eq!(reg.resolve_type("Coll.List", &[]).unwrap(), None);
}

#[test]
fn null_receivers_never_resolve() {
    let reg = Registry::new();
    reg.add_function(FunctionDef::new(
        "Echo",
        vec![TypeRef::Object],
        TypeRef::Object,
        identity_body(),
    ));
    assert!(reg.find_function("Echo", &[], &[Value::Null]).is_none());
    assert!(reg.find_function("Echo", &[], &[]).is_none());
    assert!(reg
        .find_function("Echo", &[], &[Value::I32(1)])
        .is_some());
}

#[test]
fn overloads_select_by_receiver_type() {
    let reg = Registry::new();
    reg.add_function(FunctionDef::new(
        "Tag",
        vec![TypeRef::I32],
        TypeRef::Str,
        Arc::new(|_, _| Ok(Value::str("int"))),
    ));
    reg.add_function(FunctionDef::new(
        "Tag",
        vec![TypeRef::Str],
        TypeRef::Str,
        Arc::new(|_, _| Ok(Value::str("string"))),
    ));

    let (def, _) = reg.find_function("Tag", &[], &[Value::I32(1)]).unwrap();
    assert_eq!(def.params, vec![TypeRef::I32]);
    let (def, _) = reg.find_function("Tag", &[], &[Value::str("x")]).unwrap();
    assert_eq!(def.params, vec![TypeRef::Str]);
    assert!(reg.find_function("Tag", &[], &[Value::F64(1.0)]).is_none());
}

#[test]
fn resolution_is_memoized_per_receiver_type() {
    let reg = Registry::new();
    reg.add_function(FunctionDef {
        name: "Wrap".into(),
        generics: 1,
        params: vec![TypeRef::Generic(0)],
        defaults: vec![None],
        ret: TypeRef::Generic(0),
        body: identity_body(),
    });

    let (first, _) = reg.find_function("Wrap", &[], &[Value::I32(1)]).unwrap();
    let (second, _) = reg.find_function("Wrap", &[], &[Value::I32(2)]).unwrap();
    // Second hit comes from the cache: same concrete instantiation.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.params, vec![TypeRef::I32]);

    let (other, _) = reg.find_function("Wrap", &[], &[Value::str("s")]).unwrap();
    assert_eq!(other.params, vec![TypeRef::Str]);
}

#[test]
fn explicit_type_arguments_constrain_candidates() {
    let reg = Registry::new();
    reg.add_function(FunctionDef {
        name: "As".into(),
        generics: 1,
        params: vec![TypeRef::Generic(0)],
        defaults: vec![None],
        ret: TypeRef::Generic(0),
        body: identity_body(),
    });

    assert!(reg
        .find_function("As", &[TypeRef::I32], &[Value::I32(1)])
        .is_some());
    assert!(reg
        .find_function("As", &[TypeRef::Str], &[Value::I32(1)])
        .is_none());
}

#[test]
fn a_short_defaults_table_never_panics() {
    // Public fields allow a definition whose defaults table is shorter
    // than its parameter list.
    let reg = Registry::new();
    reg.add_function(FunctionDef {
        name: "Mix".into(),
        generics: 0,
        params: vec![TypeRef::I32, TypeRef::I32],
        defaults: Vec::new(),
        ret: TypeRef::I32,
        body: identity_body(),
    });

    // Full arity still matches; a short call site has nothing to pad
    // from and is no match.
    assert!(reg
        .find_function("Mix", &[], &[Value::I32(1), Value::I32(2)])
        .is_some());
    assert!(reg.find_function("Mix", &[], &[Value::I32(1)]).is_none());
}

#[test]
fn null_arguments_fit_closed_reference_parameters_only() {
    let reg = Registry::new();
    reg.add_function(FunctionDef::new(
        "Pad",
        vec![TypeRef::Str, TypeRef::Str],
        TypeRef::Str,
        identity_body(),
    ));
    reg.add_function(FunctionDef::new(
        "Bump",
        vec![TypeRef::I32, TypeRef::I32],
        TypeRef::I32,
        identity_body(),
    ));

    // Trailing null against a string parameter is fine.
    assert!(reg
        .find_function("Pad", &[], &[Value::str("a"), Value::Null])
        .is_some());
    // Null never fits a value-typed parameter.
    assert!(reg
        .find_function("Bump", &[], &[Value::I32(1), Value::Null])
        .is_none());
}

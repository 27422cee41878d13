//! Type identities for the expression engine.
//!
//! Runtime values are dynamically typed; `TypeRef` is the closed set of
//! type identities the parser, the registry and the evaluator agree on.
//! Host applications describe their own types through [`HostType`], which
//! stands in for runtime reflection: constructors, properties, methods and
//! statics are registered as native closures with typed signatures.

use core::any::Any;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::evaluator::{Activation, EvalError};
use crate::values::Value;

pub mod unify;

pub use unify::Unifier;

/// A type identity.
///
/// `Object` is the dynamic marker: every value is an instance of it, and a
/// declared result type of `Object` means "not statically known".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    Str,
    /// The dynamic marker; accepts any value.
    Object,
    Array(Arc<TypeRef>),
    /// The type of `typeof(..)` results.
    Type,
    /// An in-expression lambda.
    Lambda,
    /// A host-registered type.
    Host(Arc<HostType>),
    /// A generic parameter slot inside a function signature.
    Generic(u16),
}

impl TypeRef {
    /// Whether a value of type `other` can be passed where `self` is
    /// expected. Deliberately strict: no implicit numeric widening, mirroring
    /// reflection-style assignability.
    pub fn assignable_from(&self, other: &TypeRef) -> bool {
        match (self, other) {
            (TypeRef::Object, _) => true,
            (TypeRef::Array(a), TypeRef::Array(b)) => a.assignable_from(b),
            _ => self == other,
        }
    }

    /// Whether `null` is a legal value of this type (reference-like types).
    pub fn accepts_null(&self) -> bool {
        matches!(
            self,
            TypeRef::Str
                | TypeRef::Object
                | TypeRef::Array(_)
                | TypeRef::Type
                | TypeRef::Lambda
                | TypeRef::Host(_)
        )
    }

    /// Runtime instance check, as used by `is`, `as` and the invocation
    /// guards. `null` is an instance only of reference-like types.
    pub fn is_instance(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.accepts_null(),
            _ => self.assignable_from(&value.type_ref()),
        }
    }

    /// Whether the type mentions a generic parameter slot.
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Generic(_) => true,
            TypeRef::Array(inner) => inner.is_open(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::I8 => write!(f, "sbyte"),
            TypeRef::U8 => write!(f, "byte"),
            TypeRef::I16 => write!(f, "short"),
            TypeRef::U16 => write!(f, "ushort"),
            TypeRef::I32 => write!(f, "int"),
            TypeRef::U32 => write!(f, "uint"),
            TypeRef::I64 => write!(f, "long"),
            TypeRef::U64 => write!(f, "ulong"),
            TypeRef::F32 => write!(f, "float"),
            TypeRef::F64 => write!(f, "double"),
            TypeRef::Decimal => write!(f, "decimal"),
            TypeRef::Char => write!(f, "char"),
            TypeRef::Str => write!(f, "string"),
            TypeRef::Object => write!(f, "object"),
            TypeRef::Array(inner) => write!(f, "{}[]", inner),
            TypeRef::Type => write!(f, "type"),
            TypeRef::Lambda => write!(f, "lambda"),
            TypeRef::Host(host) => write!(f, "{}", host.qualified_name()),
            TypeRef::Generic(i) => write!(f, "T{}", i),
        }
    }
}

/// A native function body. Receives the live activation (so it can invoke
/// lambda arguments) and the adjusted argument list.
pub type NativeFn = Arc<dyn Fn(&mut Activation, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// One callable overload: an extension function, a host method, or a host
/// constructor.
///
/// `params` may mention [`TypeRef::Generic`] slots when `generics > 0`;
/// overload resolution unifies those against call-site argument types
/// before the body is invoked. `defaults` runs parallel to `params`;
/// a `Some` entry marks a trailing optional parameter padded in when the
/// call site supplies fewer arguments.
#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub generics: u16,
    pub params: Vec<TypeRef>,
    pub defaults: Vec<Option<Value>>,
    pub ret: TypeRef,
    pub body: NativeFn,
}

impl FunctionDef {
    /// Convenience constructor for a non-generic overload without defaults.
    pub fn new(
        name: impl Into<String>,
        params: Vec<TypeRef>,
        ret: TypeRef,
        body: NativeFn,
    ) -> Self {
        let defaults = vec![None; params.len()];
        Self {
            name: name.into(),
            generics: 0,
            params,
            defaults,
            ret,
            body,
        }
    }

    /// Minimum number of arguments a call site must supply.
    pub fn required_arity(&self) -> usize {
        self.defaults
            .iter()
            .position(|d| d.is_some())
            .unwrap_or(self.params.len())
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.generics > 0 {
            write!(f, "<{}>", self.generics)?;
        }
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// An instance property exposed by a host type.
///
/// The getter receives `[instance]`; the setter receives `[instance, value]`.
#[derive(Clone)]
pub struct Property {
    pub get: NativeFn,
    pub set: Option<NativeFn>,
}

/// A host-registered type: the Rust-native stand-in for reflection.
pub struct HostType {
    name: String,
    namespace: String,
    constructors: Vec<Arc<FunctionDef>>,
    statics: HashMap<String, Value>,
    static_methods: HashMap<String, Vec<Arc<FunctionDef>>>,
    properties: HashMap<String, Property>,
    methods: HashMap<String, Vec<Arc<FunctionDef>>>,
    indexer: Option<NativeFn>,
}

impl HostType {
    pub fn builder(namespace: impl Into<String>, name: impl Into<String>) -> HostTypeBuilder {
        HostTypeBuilder {
            ty: HostType {
                name: name.into(),
                namespace: namespace.into(),
                constructors: Vec::new(),
                statics: HashMap::new(),
                static_methods: HashMap::new(),
                properties: HashMap::new(),
                methods: HashMap::new(),
                indexer: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn constructors(&self) -> &[Arc<FunctionDef>] {
        &self.constructors
    }

    pub fn static_value(&self, name: &str) -> Option<&Value> {
        self.statics.get(name)
    }

    pub fn static_overloads(&self, name: &str) -> Option<&[Arc<FunctionDef>]> {
        self.static_methods.get(name).map(|v| v.as_slice())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn method_overloads(&self, name: &str) -> Option<&[Arc<FunctionDef>]> {
        self.methods.get(name).map(|v| v.as_slice())
    }

    pub fn indexer(&self) -> Option<&NativeFn> {
        self.indexer.as_ref()
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostType")
            .field("name", &self.qualified_name())
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

// Host type identity is its qualified name; two registrations of the same
// qualified name in different scopes are distinct types only if the Arcs
// differ, which the registry's ambiguity check reports.
impl PartialEq for HostType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.namespace == other.namespace
    }
}

impl Eq for HostType {}

impl Hash for HostType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

/// Builder for [`HostType`].
pub struct HostTypeBuilder {
    ty: HostType,
}

impl HostTypeBuilder {
    pub fn constructor(mut self, def: FunctionDef) -> Self {
        self.ty.constructors.push(Arc::new(def));
        self
    }

    pub fn static_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.ty.statics.insert(name.into(), value);
        self
    }

    pub fn static_method(mut self, def: FunctionDef) -> Self {
        self.ty
            .static_methods
            .entry(def.name.clone())
            .or_default()
            .push(Arc::new(def));
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        get: NativeFn,
        set: Option<NativeFn>,
    ) -> Self {
        self.ty.properties.insert(name.into(), Property { get, set });
        self
    }

    pub fn method(mut self, def: FunctionDef) -> Self {
        self.ty
            .methods
            .entry(def.name.clone())
            .or_default()
            .push(Arc::new(def));
        self
    }

    pub fn indexer(mut self, get: NativeFn) -> Self {
        self.ty.indexer = Some(get);
        self
    }

    pub fn build(self) -> Arc<HostType> {
        Arc::new(self.ty)
    }
}

/// A shared handle to a host object instance.
///
/// `ty` links the instance to its registered [`HostType`]; `inner` is the
/// host's own state, downcast by the registered accessors.
#[derive(Clone)]
pub struct ObjectRef {
    pub ty: Arc<HostType>,
    pub inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(ty: Arc<HostType>, inner: T) -> Self {
        Self {
            ty,
            inner: Arc::new(inner),
        }
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty.qualified_name())
    }
}

// Identity comparison; host object equality beyond identity goes through
// registered methods.
impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_accepts_everything() {
        assert!(TypeRef::Object.assignable_from(&TypeRef::I32));
        assert!(TypeRef::Object.assignable_from(&TypeRef::Str));
        assert!(TypeRef::Object.assignable_from(&TypeRef::Array(Arc::new(TypeRef::Bool))));
    }

    #[test]
    fn no_implicit_numeric_widening() {
        assert!(!TypeRef::I64.assignable_from(&TypeRef::I32));
        assert!(!TypeRef::F64.assignable_from(&TypeRef::F32));
    }

    #[test]
    fn null_only_fits_reference_types() {
        assert!(TypeRef::Str.is_instance(&Value::Null));
        assert!(TypeRef::Object.is_instance(&Value::Null));
        assert!(!TypeRef::I32.is_instance(&Value::Null));
        assert!(!TypeRef::Bool.is_instance(&Value::Null));
    }

    #[test]
    fn array_element_types_must_match() {
        let ints = TypeRef::Array(Arc::new(TypeRef::I32));
        let longs = TypeRef::Array(Arc::new(TypeRef::I64));
        let objects = TypeRef::Array(Arc::new(TypeRef::Object));
        assert!(ints.assignable_from(&ints));
        assert!(!ints.assignable_from(&longs));
        assert!(objects.assignable_from(&ints));
    }

    #[test]
    fn display_uses_alias_names() {
        assert_eq!(TypeRef::I32.to_string(), "int");
        assert_eq!(TypeRef::Str.to_string(), "string");
        assert_eq!(
            TypeRef::Array(Arc::new(TypeRef::F64)).to_string(),
            "double[]"
        );
    }
}

//! Process-wide type and function registry.
//!
//! The registry resolves short type names to [`TypeRef`] identities and
//! resolves extension-style function calls to concrete overloads. All of
//! its caches are append-only: entries never change once inserted, so an
//! insert-if-absent policy under a read-write lock is enough for concurrent
//! invocation. There is no eviction.
//!
//! Resolution order for a type name: builtin alias table, prior cache hit,
//! explicit assembly scopes by qualified name, then registered namespaces
//! in registration order. Two namespaces producing distinct matches is a
//! fatal ambiguity, reported with every candidate named.

use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;

use crate::types::{FunctionDef, HostType, TypeRef, Unifier};
use crate::values::Value;

/// Raised when more than one registered namespace resolves a short name to
/// a different type. Fatal at parse time.
#[derive(Debug, Clone, Error)]
#[error("Ambiguous type found. Could not choose between {}.", candidates.join(" and "))]
pub struct AmbiguousTypeError {
    pub name: String,
    pub candidates: Vec<String>,
}

/// One memoized resolution: the concrete overload plus the explicit type
/// arguments it was constructed with (empty for non-generic matches, and
/// for matches produced by inference).
struct CachedOverload {
    type_args: Vec<TypeRef>,
    def: Arc<FunctionDef>,
}

/// The type and function registry. Use [`global`] for the process-wide
/// instance the parser and evaluator consult; tests may build private ones.
pub struct Registry {
    /// Name to type identity; builtin aliases pre-seeded, user lookups
    /// cached on demand. Append-only.
    types: RwLock<HashMap<String, TypeRef>>,
    /// (namespace, assembly scope) pairs in registration order.
    namespaces: RwLock<Vec<(String, String)>>,
    /// Assembly scopes searched for fully qualified names, in order.
    assemblies: RwLock<Vec<String>>,
    /// Host types per assembly scope, keyed by qualified name.
    host_types: RwLock<HashMap<String, HashMap<String, Arc<HostType>>>>,
    /// Extension-style functions by name.
    functions: RwLock<HashMap<String, Vec<Arc<FunctionDef>>>>,
    /// Per-(name, first-argument type) resolved overloads. Append-only.
    method_cache: RwLock<HashMap<(String, TypeRef), Vec<CachedOverload>>>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let registry = Self {
            types: RwLock::new(HashMap::new()),
            namespaces: RwLock::new(Vec::new()),
            assemblies: RwLock::new(Vec::new()),
            host_types: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            method_cache: RwLock::new(HashMap::new()),
        };
        registry.seed_builtins();
        registry
    }

    fn seed_builtins(&self) {
        let aliases: [(&str, TypeRef); 15] = [
            ("bool", TypeRef::Bool),
            ("byte", TypeRef::U8),
            ("sbyte", TypeRef::I8),
            ("short", TypeRef::I16),
            ("ushort", TypeRef::U16),
            ("int", TypeRef::I32),
            ("uint", TypeRef::U32),
            ("long", TypeRef::I64),
            ("ulong", TypeRef::U64),
            ("float", TypeRef::F32),
            ("double", TypeRef::F64),
            ("decimal", TypeRef::Decimal),
            ("char", TypeRef::Char),
            ("string", TypeRef::Str),
            ("object", TypeRef::Object),
        ];
        let mut types = self.types.write();
        for (name, ty) in aliases {
            types.insert(format!("{}[]", name), TypeRef::Array(Arc::new(ty.clone())));
            types.insert(name.to_string(), ty);
        }
    }

    /// Adds a namespace to search when looking up short type names. When a
    /// namespace spans multiple assembly scopes, each scope must be added
    /// separately.
    pub fn add_namespace(&self, ns: impl Into<String>, assembly: impl Into<String>) {
        let ns = ns.into();
        let assembly = assembly.into();
        let mut namespaces = self.namespaces.write();
        if namespaces
            .iter()
            .any(|(n, a)| *n == ns && *a == assembly)
        {
            return;
        }
        namespaces.push((ns, assembly));
    }

    /// Adds an assembly scope searched when the expression uses a fully
    /// qualified type name.
    pub fn add_assembly(&self, assembly: impl Into<String>) {
        let assembly = assembly.into();
        let mut assemblies = self.assemblies.write();
        if !assemblies.contains(&assembly) {
            assemblies.push(assembly);
        }
    }

    /// Registers a host type under an assembly scope. The type becomes
    /// resolvable by qualified name through [`Registry::add_assembly`] and
    /// by short name through [`Registry::add_namespace`].
    pub fn add_type(&self, assembly: impl Into<String>, ty: Arc<HostType>) {
        self.host_types
            .write()
            .entry(assembly.into())
            .or_default()
            .insert(ty.qualified_name(), ty);
    }

    /// Registers a single extension-style function overload.
    pub fn add_function(&self, def: FunctionDef) {
        self.functions
            .write()
            .entry(def.name.clone())
            .or_default()
            .push(Arc::new(def));
    }

    /// Registers every overload declared by an owner table, the bulk
    /// counterpart of [`Registry::add_function`].
    pub fn add_extension_functions(&self, owner: impl IntoIterator<Item = FunctionDef>) {
        for def in owner {
            self.add_function(def);
        }
    }

    /// Whether any extension-style functions are registered at all.
    pub fn supports_extension_functions(&self) -> bool {
        !self.functions.read().is_empty()
    }

    /// Resolves a type name. `generic_args` select a constructed name
    /// (`Name\`N`), which hosts may register explicitly; there is no
    /// runtime construction of generic host types.
    pub fn resolve_type(
        &self,
        name: &str,
        generic_args: &[TypeRef],
    ) -> Result<Option<TypeRef>, AmbiguousTypeError> {
        let lookup = if generic_args.is_empty() {
            name.to_string()
        } else {
            format!("{}`{}", name, generic_args.len())
        };

        if let Some(ty) = self.types.read().get(&lookup) {
            return Ok(Some(ty.clone()));
        }

        // Array of something resolvable.
        if let Some(element) = lookup.strip_suffix("[]") {
            if let Some(inner) = self.resolve_type(element, &[])? {
                let ty = TypeRef::Array(Arc::new(inner));
                self.cache_type(&lookup, ty.clone());
                return Ok(Some(ty));
            }
            return Ok(None);
        }

        // Fully qualified name within an explicitly added assembly scope.
        let host_types = self.host_types.read();
        for assembly in self.assemblies.read().iter() {
            if let Some(ty) = host_types.get(assembly).and_then(|m| m.get(&lookup)) {
                let ty = TypeRef::Host(ty.clone());
                drop(host_types);
                self.cache_type(&lookup, ty.clone());
                return Ok(Some(ty));
            }
        }

        // Short name within registered namespaces, in registration order.
        let mut matches: Vec<(String, Arc<HostType>)> = Vec::new();
        for (ns, assembly) in self.namespaces.read().iter() {
            let qualified = format!("{}.{}", ns, lookup);
            if let Some(ty) = host_types.get(assembly).and_then(|m| m.get(&qualified)) {
                if !matches.iter().any(|(_, t)| Arc::ptr_eq(t, ty)) {
                    matches.push((format!("{} ({})", qualified, assembly), ty.clone()));
                }
            }
        }
        drop(host_types);

        if matches.len() > 1 {
            return Err(AmbiguousTypeError {
                name: name.to_string(),
                candidates: matches.into_iter().map(|(label, _)| label).collect(),
            });
        }
        if let Some((_, ty)) = matches.pop() {
            let ty = TypeRef::Host(ty);
            self.cache_type(&lookup, ty.clone());
            return Ok(Some(ty));
        }
        Ok(None)
    }

    fn cache_type(&self, name: &str, ty: TypeRef) {
        // Insert-if-absent; a racing insert of the same name resolved the
        // same way, so first write wins.
        self.types
            .write()
            .entry(name.to_string())
            .or_insert(ty);
    }

    /// Resolves an extension-style function call. The first argument is the
    /// receiver; a null receiver never resolves. Returns the chosen
    /// overload and the argument list adjusted with any trailing defaults.
    pub fn find_function(
        &self,
        name: &str,
        type_args: &[TypeRef],
        args: &[Value],
    ) -> Option<(Arc<FunctionDef>, Vec<Value>)> {
        if args.first().map_or(true, Value::is_null) {
            return None;
        }
        let overloads = self.functions.read().get(name)?.clone();
        let first_ty = args[0].type_ref();
        let key = (name.to_string(), first_ty);

        // Fast path: a prior resolution for this (name, receiver type).
        if let Some(cached) = self.method_cache.read().get(&key) {
            for entry in cached {
                if !type_args.is_empty() && entry.type_args != type_args {
                    continue;
                }
                if let Some(adjusted) = adjust_args(&entry.def, args) {
                    return Some((entry.def.clone(), adjusted));
                }
            }
        }

        // Slow path: scan the declared overloads.
        for def in &overloads {
            let Some(concrete) = instantiate(def, type_args, args) else {
                continue;
            };
            let Some(adjusted) = adjust_args(&concrete, args) else {
                continue;
            };
            let concrete = Arc::new(concrete);
            self.method_cache
                .write()
                .entry(key)
                .or_default()
                .push(CachedOverload {
                    type_args: type_args.to_vec(),
                    def: concrete.clone(),
                });
            return Some((concrete, adjusted));
        }
        None
    }
}

/// Close a candidate overload over the call site: explicit type arguments
/// substitute directly, otherwise generic slots are inferred by unifying
/// parameter types against argument types. Non-generic candidates pass
/// through unchanged. Returns `None` when the candidate cannot apply.
fn instantiate(def: &FunctionDef, type_args: &[TypeRef], args: &[Value]) -> Option<FunctionDef> {
    if def.generics == 0 {
        return Some(def.clone());
    }
    let unifier = if !type_args.is_empty() {
        if type_args.len() != def.generics as usize {
            return None;
        }
        Unifier::with_explicit(type_args)
    } else {
        if def.params.len() < args.len() {
            return None;
        }
        let mut unifier = Unifier::new();
        for (param, arg) in def.params.iter().zip(args) {
            if arg.is_null() {
                // Null carries no type evidence; it only fits closed
                // reference-typed positions.
                if param.is_open() || !param.accepts_null() {
                    return None;
                }
                continue;
            }
            if !unifier.unify(param, &arg.type_ref()) {
                return None;
            }
        }
        if !unifier.is_complete(def.generics) {
            return None;
        }
        unifier
    };
    let params: Vec<TypeRef> = def.params.iter().map(|p| unifier.apply(p)).collect();
    if params.iter().any(TypeRef::is_open) {
        return None;
    }
    let ret = unifier.apply(&def.ret);
    Some(FunctionDef {
        name: def.name.clone(),
        generics: 0,
        params,
        defaults: def.defaults.clone(),
        ret,
        body: def.body.clone(),
    })
}

/// Arity and assignability check against a concrete overload. On success
/// returns the argument list, padded with trailing declared defaults when
/// the call site came up short.
fn adjust_args(def: &FunctionDef, args: &[Value]) -> Option<Vec<Value>> {
    if args.len() > def.params.len() || args.len() < def.required_arity() {
        return None;
    }
    for (param, arg) in def.params.iter().zip(args) {
        let ok = if arg.is_null() {
            param.accepts_null()
        } else {
            param.assignable_from(&arg.type_ref())
        };
        if !ok {
            return None;
        }
    }
    let mut adjusted = args.to_vec();
    // The defaults table may be shorter than the parameter list when a
    // host built the definition by hand; such a call site cannot be
    // padded to full arity and the overload is no match.
    if let Some(rest) = def.defaults.get(args.len()..) {
        for default in rest {
            adjusted.push(default.clone()?);
        }
    }
    if adjusted.len() != def.params.len() {
        return None;
    }
    Some(adjusted)
}

/// Overload selection over an explicit list (host constructors and host
/// static/instance methods), sharing the extension-function matching rules
/// but without the process-wide cache.
pub(crate) fn select_overload(
    overloads: &[Arc<FunctionDef>],
    type_args: &[TypeRef],
    args: &[Value],
) -> Option<(Arc<FunctionDef>, Vec<Value>)> {
    for def in overloads {
        let Some(concrete) = instantiate(def, type_args, args) else {
            continue;
        };
        if let Some(adjusted) = adjust_args(&concrete, args) {
            return Some((Arc::new(concrete), adjusted));
        }
    }
    None
}

#[cfg(test)]
mod registry_test;

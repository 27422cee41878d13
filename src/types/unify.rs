//! Local type unification for generic overload resolution.
//!
//! When a call site names no explicit type arguments, each generic
//! parameter slot is bound greedily from the concrete argument types it
//! appears against. Any binding conflict, or a slot left unbound after all
//! arguments are seen, rejects the overload. This is a local
//! constraint-solving pass; there is no whole-program type system behind it.

use std::sync::Arc;

use hashbrown::HashMap;

use super::TypeRef;

/// A substitution from generic slots to concrete types.
#[derive(Debug, Default)]
pub struct Unifier {
    bindings: HashMap<u16, TypeRef>,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unify a (possibly open) parameter type against a concrete argument
    /// type. Returns false on mismatch or binding conflict.
    pub fn unify(&mut self, param: &TypeRef, arg: &TypeRef) -> bool {
        match (param, arg) {
            (TypeRef::Generic(slot), _) => self.bind(*slot, arg),
            (TypeRef::Array(p), TypeRef::Array(a)) => self.unify(p, a),
            _ => param.assignable_from(arg),
        }
    }

    fn bind(&mut self, slot: u16, ty: &TypeRef) -> bool {
        match self.bindings.get(&slot) {
            None => {
                self.bindings.insert(slot, ty.clone());
                true
            }
            Some(bound) if bound == ty => true,
            // One side dynamic: keep the more general binding.
            Some(TypeRef::Object) => true,
            Some(_) if *ty == TypeRef::Object => {
                self.bindings.insert(slot, TypeRef::Object);
                true
            }
            Some(_) => false,
        }
    }

    /// Whether every slot in `0..count` received a binding.
    pub fn is_complete(&self, count: u16) -> bool {
        (0..count).all(|slot| self.bindings.contains_key(&slot))
    }

    /// Substitute bindings into a type. Unbound slots are left open.
    pub fn apply(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Generic(slot) => self
                .bindings
                .get(slot)
                .cloned()
                .unwrap_or_else(|| ty.clone()),
            TypeRef::Array(inner) => TypeRef::Array(Arc::new(self.apply(inner))),
            _ => ty.clone(),
        }
    }

    /// Seed bindings from explicit call-site type arguments.
    pub fn with_explicit(args: &[TypeRef]) -> Self {
        let mut unifier = Self::new();
        for (slot, ty) in args.iter().enumerate() {
            unifier.bindings.insert(slot as u16, ty.clone());
        }
        unifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_slot_from_argument() {
        let mut u = Unifier::new();
        assert!(u.unify(&TypeRef::Generic(0), &TypeRef::I32));
        assert!(u.is_complete(1));
        assert_eq!(u.apply(&TypeRef::Generic(0)), TypeRef::I32);
    }

    #[test]
    fn conflicting_bindings_reject() {
        let mut u = Unifier::new();
        assert!(u.unify(&TypeRef::Generic(0), &TypeRef::I32));
        assert!(!u.unify(&TypeRef::Generic(0), &TypeRef::Str));
    }

    #[test]
    fn repeated_consistent_bindings_accept() {
        let mut u = Unifier::new();
        assert!(u.unify(&TypeRef::Generic(0), &TypeRef::F64));
        assert!(u.unify(&TypeRef::Generic(0), &TypeRef::F64));
    }

    #[test]
    fn unifies_through_arrays() {
        let mut u = Unifier::new();
        let param = TypeRef::Array(Arc::new(TypeRef::Generic(0)));
        let arg = TypeRef::Array(Arc::new(TypeRef::Str));
        assert!(u.unify(&param, &arg));
        assert_eq!(u.apply(&TypeRef::Generic(0)), TypeRef::Str);
    }

    #[test]
    fn unbound_slot_is_incomplete() {
        let mut u = Unifier::new();
        assert!(u.unify(&TypeRef::Generic(0), &TypeRef::Bool));
        assert!(!u.is_complete(2));
    }

    #[test]
    fn concrete_positions_stay_strict() {
        let mut u = Unifier::new();
        assert!(!u.unify(&TypeRef::I64, &TypeRef::I32));
        assert!(u.unify(&TypeRef::Object, &TypeRef::I32));
    }
}

//! Interface/impl method dispatch (spec.md §4.1): `impl I for T { … }`
//! records a mapping `(I, T) -> method table`; `x.m(…)` where
//! `typeof(x) = T` and `m` is declared in `I` selects that table by
//! structural match over `T`. Generalizes the teacher's flat `(I, T)`
//! idea into a simple keyed map since there is no inheritance or
//! trait-object indirection in scope here.

use std::collections::HashMap;

use minz_ir::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ImplKey {
    interface: String,
    concrete: TypeId,
}

/// Maps `(interface name, concrete TypeId)` to the mangled function
/// name that implements each interface method for that type.
#[derive(Debug, Default)]
pub struct MethodTables {
    tables: HashMap<ImplKey, HashMap<String, String>>,
}

impl MethodTables {
    pub fn new() -> Self {
        MethodTables::default()
    }

    pub fn register_impl(&mut self, interface: &str, concrete: TypeId, method: &str, mangled_name: &str) {
        let key = ImplKey { interface: interface.to_string(), concrete };
        self.tables
            .entry(key)
            .or_default()
            .insert(method.to_string(), mangled_name.to_string());
    }

    pub fn resolve(&self, interface: &str, concrete: TypeId, method: &str) -> Option<&str> {
        let key = ImplKey { interface: interface.to_string(), concrete };
        self.tables.get(&key)?.get(method).map(String::as_str)
    }

    /// Finds the single interface (if any) providing `method` for
    /// `concrete`, used when the receiver's static interface is not
    /// named explicitly at the call site (`x.m(...)`, not
    /// `(x as I).m(...)`). Ambiguity across multiple matching
    /// interfaces is a caller-reported `NameError`.
    pub fn resolve_unqualified(&self, concrete: TypeId, method: &str) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|(key, methods)| key.concrete == concrete && methods.contains_key(method))
            .filter_map(|(_, methods)| methods.get(method).map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_registered_impl_method() {
        let mut tables = MethodTables::new();
        tables.register_impl("Shape", TypeId(3), "area", "Shape_Circle_area");
        assert_eq!(tables.resolve("Shape", TypeId(3), "area"), Some("Shape_Circle_area"));
        assert_eq!(tables.resolve("Shape", TypeId(4), "area"), None);
    }
}

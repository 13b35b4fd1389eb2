//! Scoped symbol tables keyed by arena indices (spec.md §9: "cyclic
//! references between AST nodes and symbol tables are broken by
//! indices into an arena keyed by SymbolId/TypeId/ScopeId; no
//! back-pointers"). Scopes nest module -> function -> block, and a
//! lookup walks outward from the innermost scope to the module root.

use std::collections::HashMap;

use minz_ir::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    GlobalVar,
    LocalVar { mutable: bool },
    Const,
    Param { index: u32 },
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeId,
    pub kind: SymbolKind,
}

#[derive(Clone, Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<String, SymbolId>,
}

/// Owns every symbol and scope created during analysis of one module.
/// Functions may be referenced before declaration (spec.md §4.1), so
/// the module-level scope is populated with every top-level name in a
/// prepass before any function body is lowered.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    module_scope: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            symbols: Vec::new(),
            scopes: Vec::new(),
            module_scope: ScopeId(0),
        };
        table.module_scope = table.new_scope(None);
        table
    }

    pub fn module_scope(&self) -> ScopeId {
        self.module_scope
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { parent, bindings: HashMap::new() });
        id
    }

    pub fn declare(&mut self, scope: ScopeId, name: impl Into<String>, ty: TypeId, kind: SymbolKind) -> Result<SymbolId, SymbolId> {
        let name = name.into();
        if let Some(existing) = self.scopes[scope.0 as usize].bindings.get(&name) {
            return Err(*existing);
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.clone(), ty, kind });
        self.scopes[scope.0 as usize].bindings.insert(name, id);
        Ok(id)
    }

    /// Walks from `scope` outward to the module root, returning the
    /// first binding found (shadowing: innermost wins).
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            let scope_data = &self.scopes[s.0 as usize];
            if let Some(&id) = scope_data.bindings.get(name) {
                return Some(id);
            }
            current = scope_data.parent;
        }
        None
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::TypeId;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        let root = table.module_scope();
        table.declare(root, "x", TypeId(0), SymbolKind::GlobalVar).unwrap();
        let inner = table.new_scope(Some(root));
        table.declare(inner, "x", TypeId(1), SymbolKind::LocalVar { mutable: false }).unwrap();

        let resolved = table.resolve(inner, "x").unwrap();
        assert_eq!(table.symbol(resolved).ty, TypeId(1));
        let resolved_outer = table.resolve(root, "x").unwrap();
        assert_eq!(table.symbol(resolved_outer).ty, TypeId(0));
    }

    #[test]
    fn duplicate_declaration_in_same_scope_errs() {
        let mut table = SymbolTable::new();
        let root = table.module_scope();
        table.declare(root, "x", TypeId(0), SymbolKind::GlobalVar).unwrap();
        assert!(table.declare(root, "x", TypeId(0), SymbolKind::GlobalVar).is_err());
    }
}

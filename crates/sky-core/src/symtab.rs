use std::collections::HashMap;

use sky_primitives::PropertyId;

///
/// SymbolTable
///
/// A flat arena of scopes linked by parent index, mirroring the
/// parent-pointer scope chain of
/// `examples/original_source/query/codegen/mapper/symtable.go`. Rust
/// ownership makes a literal pointer-chasing `&symtable` awkward, so scopes
/// live in one `Vec` and reference their parent by index instead.
///

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

struct Scope {
    parent: Option<ScopeId>,
    decls: HashMap<String, PropertyId>,
}

#[derive(Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new scope nested under `parent` (`None` for the root scope)
    /// and returns its id.
    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope { parent, decls: HashMap::new() });
        ScopeId(self.scopes.len() - 1)
    }

    /// Binds `name` to `id` in `scope`. Returns `false` if `name` is
    /// already bound in this exact scope (the caller, `decls::collect_decls`,
    /// turns that into a `DeclConflict`); bindings in outer scopes are
    /// shadowed silently, matching `symtable.go`'s `find` precedence.
    pub fn declare(&mut self, scope: ScopeId, name: &str, id: PropertyId) -> bool {
        let decls = &mut self.scopes[scope.0].decls;
        if decls.contains_key(name) {
            return false;
        }
        decls.insert(name.to_string(), id);
        true
    }

    /// Looks up `name` starting at `scope`, walking outward through parent
    /// scopes until found.
    #[must_use]
    pub fn find(&self, scope: ScopeId, name: &str) -> Option<PropertyId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(found) = s.decls.get(name) {
                return Some(*found);
            }
            current = s.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_through_parent_chain() {
        let mut table = SymbolTable::new();
        let root = table.push_scope(None);
        assert!(table.declare(root, "x", PropertyId::new(1)));
        let child = table.push_scope(Some(root));
        assert_eq!(table.find(child, "x"), Some(PropertyId::new(1)));
    }

    #[test]
    fn rejects_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        let root = table.push_scope(None);
        assert!(table.declare(root, "x", PropertyId::new(1)));
        assert!(!table.declare(root, "x", PropertyId::new(2)));
    }

    #[test]
    fn child_scope_can_shadow_without_conflict() {
        let mut table = SymbolTable::new();
        let root = table.push_scope(None);
        table.declare(root, "x", PropertyId::new(1));
        let child = table.push_scope(Some(root));
        assert!(table.declare(child, "x", PropertyId::new(2)));
        assert_eq!(table.find(child, "x"), Some(PropertyId::new(2)));
    }
}

use sky_primitives::PropertyId;
use sky_schema::{DataType, Table};

use crate::error::CoreError;
use crate::expr::{identifiers, Expr};
use crate::step::{Condition, SessionLoop, Step};
use crate::symtab::{ScopeId, SymbolTable};

///
/// VarDecl / collect_decls
///
/// Walks every step's expressions and collects one declaration per unique
/// identifier name, grounded on
/// `examples/original_source/query/ast/find_var_decls.go`: the first
/// occurrence of a name fixes its identity, and every later occurrence must
/// agree with it or the whole collection fails with a `DeclConflict`.
///
/// Identifier resolution is lexically scoped (spec.md §4.5/§9, C6): each
/// `Condition`'s nested steps get a fresh child [`SymbolTable`] scope, so a
/// name declared under one branch doesn't leak into a sibling branch the
/// way a single flat namespace would. Lookups still walk outward through
/// parent scopes, so a name declared by an outer step is visible to
/// everything nested under it.
///

/// Cross-object joins (the original's notion of a declaration's
/// association to another object type) are out of scope here (spec.md §1,
/// §9 Non-goals exclude distributed/cross-machine query planning and this
/// crate never binds an identifier to a different table). `Association`
/// is kept as a unit enum rather than dropped outright, so a declaration's
/// identity still has the same three-part shape (id, data type,
/// association) as the original `ast.VarDecl`, ready to grow a real
/// variant if cross-table binding is ever added.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Association {
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub id: PropertyId,
    pub data_type: DataType,
    pub association: Association,
}

pub fn collect_decls(steps: &[Step], table: &Table) -> Result<Vec<VarDecl>, CoreError> {
    let mut symtab = SymbolTable::default();
    let root = symtab.push_scope(None);
    let mut decls: Vec<VarDecl> = Vec::new();
    collect_from_steps(steps, table, &mut symtab, root, &mut decls)?;
    Ok(decls)
}

fn collect_from_steps(
    steps: &[Step],
    table: &Table,
    symtab: &mut SymbolTable,
    scope: ScopeId,
    decls: &mut Vec<VarDecl>,
) -> Result<(), CoreError> {
    for step in steps {
        collect_from_step(step, table, symtab, scope, decls)?;
    }
    Ok(())
}

fn collect_from_step(
    step: &Step,
    table: &Table,
    symtab: &mut SymbolTable,
    scope: ScopeId,
    decls: &mut Vec<VarDecl>,
) -> Result<(), CoreError> {
    match step {
        Step::Selection(selection) => {
            for name in selection.dimensions.iter().filter(|d| d.as_str() != TIMESTAMP_NAME) {
                declare_name(name, table, symtab, scope, decls)?;
            }
            for field in &selection.fields {
                if let Some(name) = field.expr.property_name() {
                    if name != TIMESTAMP_NAME {
                        declare_name(name, table, symtab, scope, decls)?;
                    }
                }
            }
            Ok(())
        }
        Step::Condition(condition) => collect_from_condition(condition, table, symtab, scope, decls),
        Step::SessionLoop(loop_) => collect_from_session_loop(loop_, table, symtab, scope, decls),
    }
}

/// A condition's own guard expression declares into the scope it's found
/// in, so sibling conditions at the same nesting level see each other's
/// names the same way a flat namespace would. Its nested steps get a fresh
/// child scope: a name declared inside one branch doesn't leak sideways
/// into another branch's nested steps, only inward to its own descendants.
fn collect_from_condition(
    condition: &Condition,
    table: &Table,
    symtab: &mut SymbolTable,
    scope: ScopeId,
    decls: &mut Vec<VarDecl>,
) -> Result<(), CoreError> {
    let mut names = Vec::new();
    collect_expr_identifiers(&condition.expr, &mut names);
    for name in &names {
        if name != TIMESTAMP_NAME {
            declare_name(name, table, symtab, scope, decls)?;
        }
    }
    let child = symtab.push_scope(Some(scope));
    collect_from_steps(&condition.steps, table, symtab, child, decls)
}

/// A session loop is a transparent pass-through at execution time (it never
/// introduces its own boundary, only clamps `within` windows), so its
/// nested steps stay in the enclosing scope rather than getting a child.
fn collect_from_session_loop(
    loop_: &SessionLoop,
    table: &Table,
    symtab: &mut SymbolTable,
    scope: ScopeId,
    decls: &mut Vec<VarDecl>,
) -> Result<(), CoreError> {
    collect_from_steps(&loop_.steps, table, symtab, scope, decls)
}

fn collect_expr_identifiers(expr: &Expr, out: &mut Vec<String>) {
    identifiers(expr, out);
}

/// Resolves `name` against the schema, then declares it in `scope` if it
/// isn't already visible through the scope's ancestor chain. A name already
/// visible must agree with the new lookup or the whole collection fails
/// with a `DeclConflict`.
fn declare_name(
    name: &str,
    table: &Table,
    symtab: &mut SymbolTable,
    scope: ScopeId,
    decls: &mut Vec<VarDecl>,
) -> Result<(), CoreError> {
    let property = table
        .require_property(name)
        .map_err(|_| CoreError::UnboundName(name.to_string()))?;
    let candidate = VarDecl {
        name: name.to_string(),
        id: property.id,
        data_type: property.data_type,
        association: Association::None,
    };

    if let Some(existing_id) = symtab.find(scope, name) {
        if existing_id != candidate.id {
            return Err(CoreError::DeclConflict {
                name: name.to_string(),
                field: "id",
                left: existing_id.to_string(),
                right: candidate.id.to_string(),
            });
        }
        return Ok(());
    }

    symtab.declare(scope, name, property.id);
    decls.push(candidate);
    Ok(())
}

/// The `timestamp` pseudo-identifier is resolved directly from an event's
/// timestamp (spec.md §4.3), never through the schema, so it is excluded
/// from declaration collection rather than raising a spurious
/// `UnboundName`.
pub const TIMESTAMP_NAME: &str = "timestamp";

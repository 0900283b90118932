//! Constructors for common IR fragments.
//!
//! Transformations create new nodes through these helpers so that the
//! element shapes stay consistent with what the front-end produces.

use crate::ir::arena::{Arena, NodeId};
use crate::ir::node::{attr, NodeKind, Scope};

/// Create a pragma statement with the given text and source line.
pub fn pragma(arena: &mut Arena, text: impl Into<String>, lineno: u32) -> NodeId {
    let node = arena.alloc_text(NodeKind::Pragma, text);
    if lineno > 0 {
        arena.node_mut(node).set_attr(attr::LINENO, lineno.to_string());
    }
    node
}

/// Create a variable use.
pub fn var(arena: &mut Arena, name: impl Into<String>, scope: Scope) -> NodeId {
    let node = arena.alloc_text(NodeKind::Var, name);
    arena.node_mut(node).set_attr(attr::SCOPE, scope.as_str());
    node
}

/// Create a typed variable use.
pub fn typed_var(
    arena: &mut Arena,
    name: impl Into<String>,
    ty: impl Into<String>,
    scope: Scope,
) -> NodeId {
    let node = var(arena, name, scope);
    arena.node_mut(node).set_attr(attr::TYPE, ty.into());
    node
}

/// Create an integer constant.
pub fn int_constant(arena: &mut Arena, value: impl Into<String>) -> NodeId {
    let node = arena.alloc_text(NodeKind::IntConstant, value);
    arena.node_mut(node).set_attr(attr::TYPE, "Fint");
    node
}

/// Create a bound node (lower, upper or step) around an expression node.
///
/// A digit-only expression becomes an integer constant, anything else a
/// local variable use; richer bound expressions are cloned from existing
/// nodes instead of built here.
fn bound(arena: &mut Arena, kind: NodeKind, expr: &str) -> NodeId {
    let node = arena.alloc(kind);
    let child = if expr.chars().all(|c| c.is_ascii_digit()) {
        int_constant(arena, expr)
    } else {
        var(arena, expr, Scope::Local)
    };
    // The helpers only build well-formed shapes, so attachment cannot fail.
    arena.append(node, child).ok();
    node
}

/// Create a do statement with an empty body and the given textual range.
pub fn do_statement(
    arena: &mut Arena,
    induction: &str,
    lower: &str,
    upper: &str,
    step: Option<&str>,
) -> NodeId {
    let do_stmt = arena.alloc(NodeKind::DoStatement);
    let induction_var = var(arena, induction, Scope::Local);
    let index_range = arena.alloc(NodeKind::IndexRange);
    let lower_node = bound(arena, NodeKind::LowerBound, lower);
    let upper_node = bound(arena, NodeKind::UpperBound, upper);
    arena.append(index_range, lower_node).ok();
    arena.append(index_range, upper_node).ok();
    if let Some(step) = step {
        let step_node = bound(arena, NodeKind::Step, step);
        arena.append(index_range, step_node).ok();
    }
    let body = arena.alloc(NodeKind::Body);
    arena.append(do_stmt, induction_var).ok();
    arena.append(do_stmt, index_range).ok();
    arena.append(do_stmt, body).ok();
    do_stmt
}

/// Create a do statement whose induction variable and index range are deep
/// clones of another do statement's, with an empty body.
pub fn do_statement_like(arena: &mut Arena, source_do: NodeId) -> Option<NodeId> {
    let induction = arena
        .node(source_do)
        .children()
        .iter()
        .copied()
        .find(|&c| arena.kind(c) == &NodeKind::Var)?;
    let index_range = arena
        .node(source_do)
        .children()
        .iter()
        .copied()
        .find(|&c| arena.kind(c) == &NodeKind::IndexRange)?;
    let do_stmt = arena.alloc(NodeKind::DoStatement);
    let induction_clone = arena.clone_subtree(induction);
    let range_clone = arena.clone_subtree(index_range);
    let body = arena.alloc(NodeKind::Body);
    arena.append(do_stmt, induction_clone).ok();
    arena.append(do_stmt, range_clone).ok();
    arena.append(do_stmt, body).ok();
    Some(do_stmt)
}

/// Body of a do statement or function definition.
pub fn body_of(arena: &Arena, node: NodeId) -> Option<NodeId> {
    arena
        .node(node)
        .children()
        .iter()
        .copied()
        .find(|&c| arena.kind(c) == &NodeKind::Body)
}

/// Create a name element with text and type key.
pub fn name(arena: &mut Arena, text: impl Into<String>, ty: impl Into<String>) -> NodeId {
    let node = arena.alloc_text(NodeKind::Name, text);
    arena.node_mut(node).set_attr(attr::TYPE, ty.into());
    node
}

/// Create a symbol table entry for the given name/type pair.
pub fn id(
    arena: &mut Arena,
    symbol: impl Into<String>,
    ty: impl Into<String>,
    sclass: &str,
) -> NodeId {
    let node = arena.alloc(NodeKind::Id);
    arena.node_mut(node).set_attr(attr::TYPE, ty.into());
    arena.node_mut(node).set_attr(attr::SCLASS, sclass);
    let name_node = arena.alloc_text(NodeKind::Name, symbol);
    arena.append(node, name_node).ok();
    node
}

/// Create a variable declaration for the given name/type pair.
pub fn var_decl(
    arena: &mut Arena,
    symbol: impl Into<String>,
    ty: impl Into<String>,
) -> NodeId {
    let node = arena.alloc(NodeKind::VarDecl);
    let name_node = name(arena, symbol, ty);
    arena.append(node, name_node).ok();
    node
}

/// Create a basic type entry.
pub fn basic_type(
    arena: &mut Arena,
    key: impl Into<String>,
    reference: impl Into<String>,
    dimensions: u32,
) -> NodeId {
    let node = arena.alloc(NodeKind::BasicType);
    arena.node_mut(node).set_attr(attr::TYPE, key.into());
    arena.node_mut(node).set_attr(attr::REF, reference.into());
    arena
        .node_mut(node)
        .set_attr(attr::DIMENSIONS, dimensions.to_string());
    node
}

/// Create a function type entry.
pub fn function_type(
    arena: &mut Arena,
    key: impl Into<String>,
    return_type: impl Into<String>,
) -> NodeId {
    let node = arena.alloc(NodeKind::FunctionType);
    arena.node_mut(node).set_attr(attr::TYPE, key.into());
    arena
        .node_mut(node)
        .set_attr(attr::RETURN_TYPE, return_type.into());
    node
}

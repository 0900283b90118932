//! Arena-backed IR tree.
//!
//! All nodes of a document live in one arena and are addressed by
//! [`NodeId`]. Cross-references between program elements (symbols, types)
//! are never node ids; they are string keys resolved through the owning
//! tables on demand. A cloned subtree is detached until inserted, and a
//! node can have at most one parent at a time.

use crate::ir::node::{attr, NodeKind};
use crate::utils::errors::{LooptranError, LooptranResult};

/// A stable identity for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One node of the IR tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The kind tag
    pub kind: NodeKind,
    /// String-keyed attributes, in insertion order
    attrs: Vec<(String, String)>,
    /// Optional text content
    pub text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
            parent: None,
        }
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// All attributes in insertion order.
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Child ids in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent id, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// The arena owning every node of a document.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    /// Allocate a new detached node carrying text content.
    pub fn alloc_text(&mut self, kind: NodeKind, text: impl Into<String>) -> NodeId {
        let id = self.alloc(kind);
        self.nodes[id.index()].text = Some(text.into());
        id
    }

    /// Immutable access to a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutable access to a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Attribute value of a node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.index()].attr(name)
    }

    /// Numeric attribute value of a node, 0 when absent or malformed.
    pub fn attr_u32(&self, id: NodeId, name: &str) -> u32 {
        self.attr(id, name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Source line of a node, from its `lineno` attribute.
    pub fn lineno(&self, id: NodeId) -> u32 {
        self.attr_u32(id, attr::LINENO)
    }

    /// Text content of a node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].text.as_deref()
    }

    /// Concatenated text of a subtree, in document order.
    ///
    /// This is the textual form of an expression used for structural range
    /// comparison.
    pub fn subtree_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = self.text(id) {
            out.push_str(text);
        }
        for &child in self.node(id).children() {
            self.collect_text(child, out);
        }
    }

    /// First descendant of the given kind, in document order.
    pub fn find(&self, from: NodeId, kind: &NodeKind) -> Option<NodeId> {
        for &child in self.node(from).children() {
            if self.kind(child) == kind {
                return Some(child);
            }
            if let Some(found) = self.find(child, kind) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants of the given kind, in document order.
    pub fn find_all(&self, from: NodeId, kind: &NodeKind) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_kind(from, kind, &mut out);
        out
    }

    fn collect_kind(&self, id: NodeId, kind: &NodeKind, out: &mut Vec<NodeId>) {
        for &child in self.node(id).children() {
            if self.kind(child) == kind {
                out.push(child);
            }
            self.collect_kind(child, kind, out);
        }
    }

    /// Next following sibling of the given kind.
    pub fn find_next(&self, from: NodeId, kind: &NodeKind) -> Option<NodeId> {
        self.following_siblings(from)
            .into_iter()
            .find(|&sib| self.kind(sib) == kind)
    }

    /// Nearest enclosing ancestor of the given kind.
    pub fn find_parent(&self, from: NodeId, kind: &NodeKind) -> Option<NodeId> {
        let mut current = self.node(from).parent();
        while let Some(id) = current {
            if self.kind(id) == kind {
                return Some(id);
            }
            current = self.node(id).parent();
        }
        None
    }

    /// Immediate next sibling, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent()?;
        let siblings = self.node(parent).children();
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// All following siblings, in document order.
    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id).parent() {
            Some(parent) => {
                let siblings = self.node(parent).children();
                match siblings.iter().position(|&c| c == id) {
                    Some(pos) => siblings[pos + 1..].to_vec(),
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        }
    }

    /// Deep-clone a subtree. The clone has fresh identities and is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id).clone();
        let clone = self.alloc(source.kind.clone());
        self.nodes[clone.index()].attrs = source.attrs.clone();
        self.nodes[clone.index()].text = source.text.clone();
        for child in source.children {
            let child_clone = self.clone_subtree(child);
            self.nodes[child_clone.index()].parent = Some(clone);
            self.nodes[clone.index()].children.push(child_clone);
        }
        clone
    }

    fn check_detached(&self, id: NodeId) -> LooptranResult<()> {
        if self.node(id).parent().is_some() {
            return Err(LooptranError::internal(format!(
                "node {} ({}) inserted while already attached",
                id,
                self.kind(id)
            )));
        }
        Ok(())
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> LooptranResult<()> {
        self.check_detached(child)?;
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    /// Insert a detached node as a sibling just before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) -> LooptranResult<()> {
        self.insert_at(anchor, node, 0)
    }

    /// Insert a detached node as a sibling just after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> LooptranResult<()> {
        self.insert_at(anchor, node, 1)
    }

    fn insert_at(&mut self, anchor: NodeId, node: NodeId, offset: usize) -> LooptranResult<()> {
        self.check_detached(node)?;
        let parent = self.node(anchor).parent().ok_or_else(|| {
            LooptranError::internal(format!("insertion anchor {} has no parent", anchor))
        })?;
        let pos = self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == anchor)
            .ok_or_else(|| {
                LooptranError::internal(format!("anchor {} missing from its parent", anchor))
            })?;
        self.nodes[node.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(pos + offset, node);
        Ok(())
    }

    /// Detach a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
            self.nodes[id.index()].parent = None;
        }
    }

    /// Delete a node: detach it and leave its subtree unreachable.
    pub fn delete(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Replace `old` with the detached node `new`, keeping document position.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> LooptranResult<()> {
        self.insert_after(old, new)?;
        self.delete(old);
        Ok(())
    }

    /// Splice the children of a do-statement's body into the do-statement's
    /// parent, in order, just after the do-statement itself.
    pub fn extract_body(&mut self, do_stmt: NodeId) -> LooptranResult<()> {
        if self.kind(do_stmt) != &NodeKind::DoStatement {
            return Err(LooptranError::internal(format!(
                "extract_body applied to {}",
                self.kind(do_stmt)
            )));
        }
        let body = self.find(do_stmt, &NodeKind::Body).ok_or_else(|| {
            LooptranError::internal("do statement without a body".to_string())
        })?;
        let children: Vec<NodeId> = self.node(body).children().to_vec();
        let mut anchor = do_stmt;
        for child in children {
            self.detach(child);
            self.insert_after(anchor, child)?;
            anchor = child;
        }
        Ok(())
    }

    /// Move every child of `body` to the end of `target_body`, in order.
    pub fn move_body_children(
        &mut self,
        body: NodeId,
        target_body: NodeId,
    ) -> LooptranResult<()> {
        let children: Vec<NodeId> = self.node(body).children().to_vec();
        for child in children {
            self.detach(child);
            self.append(target_body, child)?;
        }
        Ok(())
    }

    /// Number of allocated nodes, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural equality of two subtrees: kind, attributes, text and
    /// children, identity ignored.
    pub fn subtree_eq(&self, a: NodeId, b: NodeId) -> bool {
        let na = self.node(a);
        let nb = self.node(b);
        if na.kind != nb.kind || na.text != nb.text || na.attrs != nb.attrs {
            return false;
        }
        if na.children.len() != nb.children.len() {
            return false;
        }
        na.children
            .iter()
            .zip(nb.children.iter())
            .all(|(&ca, &cb)| self.subtree_eq(ca, cb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree(arena: &mut Arena) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = arena.alloc(NodeKind::Body);
        let first = arena.alloc(NodeKind::ExprStatement);
        let second = arena.alloc(NodeKind::DoStatement);
        let inner = arena.alloc(NodeKind::Var);
        arena.append(root, first).unwrap();
        arena.append(root, second).unwrap();
        arena.append(second, inner).unwrap();
        (root, first, second, inner)
    }

    #[test]
    fn test_find_and_parent() {
        let mut arena = Arena::new();
        let (root, _, second, inner) = small_tree(&mut arena);
        assert_eq!(arena.find(root, &NodeKind::Var), Some(inner));
        assert_eq!(arena.find(root, &NodeKind::DoStatement), Some(second));
        assert_eq!(arena.find(root, &NodeKind::Pragma), None);
        assert_eq!(arena.find_parent(inner, &NodeKind::Body), Some(root));
        assert_eq!(arena.find_parent(root, &NodeKind::Body), None);
    }

    #[test]
    fn test_find_next() {
        let mut arena = Arena::new();
        let (_, first, second, _) = small_tree(&mut arena);
        assert_eq!(arena.find_next(first, &NodeKind::DoStatement), Some(second));
        assert_eq!(arena.find_next(second, &NodeKind::DoStatement), None);
    }

    #[test]
    fn test_insert_before_after() {
        let mut arena = Arena::new();
        let (root, first, second, _) = small_tree(&mut arena);
        let pragma = arena.alloc(NodeKind::Pragma);
        arena.insert_before(second, pragma).unwrap();
        assert_eq!(arena.node(root).children(), &[first, pragma, second]);

        let tail = arena.alloc(NodeKind::ExprStatement);
        arena.insert_after(second, tail).unwrap();
        assert_eq!(arena.node(root).children(), &[first, pragma, second, tail]);
    }

    #[test]
    fn test_double_insertion_rejected() {
        let mut arena = Arena::new();
        let (root, first, _, _) = small_tree(&mut arena);
        let err = arena.append(root, first).unwrap_err();
        assert!(matches!(err, LooptranError::Internal(_)));
    }

    #[test]
    fn test_clone_is_detached_and_equal() {
        let mut arena = Arena::new();
        let (_, _, second, inner) = small_tree(&mut arena);
        arena.node_mut(inner).set_attr(attr::TYPE, "Fint");
        let clone = arena.clone_subtree(second);
        assert!(arena.node(clone).parent().is_none());
        assert_ne!(clone, second);
        assert!(arena.subtree_eq(clone, second));
    }

    #[test]
    fn test_replace() {
        let mut arena = Arena::new();
        let (root, first, second, _) = small_tree(&mut arena);
        let replacement = arena.alloc(NodeKind::AssignStatement);
        arena.replace(first, replacement).unwrap();
        assert_eq!(arena.node(root).children(), &[replacement, second]);
    }

    #[test]
    fn test_extract_body() {
        let mut arena = Arena::new();
        let outer = arena.alloc(NodeKind::Body);
        let do_stmt = arena.alloc(NodeKind::DoStatement);
        let body = arena.alloc(NodeKind::Body);
        let s1 = arena.alloc(NodeKind::ExprStatement);
        let s2 = arena.alloc(NodeKind::AssignStatement);
        arena.append(outer, do_stmt).unwrap();
        arena.append(do_stmt, body).unwrap();
        arena.append(body, s1).unwrap();
        arena.append(body, s2).unwrap();

        arena.extract_body(do_stmt).unwrap();
        assert_eq!(arena.node(outer).children(), &[do_stmt, s1, s2]);
        assert!(arena.node(body).children().is_empty());
    }

    #[test]
    fn test_subtree_text() {
        let mut arena = Arena::new();
        let bound = arena.alloc(NodeKind::UpperBound);
        let var = arena.alloc_text(NodeKind::Var, "n");
        arena.append(bound, var).unwrap();
        assert_eq!(arena.subtree_text(bound), "n");
    }
}

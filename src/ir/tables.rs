//! Lookup tables of the IR: types, symbols and declarations.
//!
//! Tables are ordered key-to-entry mappings stored as plain children of a
//! table node. A [`Table`] is a thin handle over the table node; lookups
//! resolve keys on demand so that table views never go stale across tree
//! mutations.

use crate::ir::arena::{Arena, NodeId};
use crate::ir::node::{attr, NodeKind};
use crate::utils::errors::{LooptranError, LooptranResult, TransformError, TransformErrorKind};

/// Handle to a table node (type table, symbol table or declaration table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    node: NodeId,
}

impl Table {
    /// Wrap a table node.
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    /// The underlying table node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Key of a table entry.
    ///
    /// Type entries are keyed by their `type` attribute; symbol and
    /// declaration entries by the text of their `name` child.
    pub fn entry_key(arena: &Arena, entry: NodeId) -> Option<String> {
        match arena.kind(entry) {
            NodeKind::BasicType | NodeKind::FunctionType => {
                arena.attr(entry, attr::TYPE).map(|v| v.to_string())
            }
            NodeKind::Id | NodeKind::VarDecl => {
                let name = arena.find(entry, &NodeKind::Name)?;
                arena.text(name).map(|v| v.to_string())
            }
            _ => None,
        }
    }

    /// Look up an entry by key.
    pub fn get(&self, arena: &Arena, key: &str) -> Option<NodeId> {
        arena
            .node(self.node)
            .children()
            .iter()
            .copied()
            .find(|&entry| Table::entry_key(arena, entry).as_deref() == Some(key))
    }

    /// Whether the table contains the key.
    pub fn contains(&self, arena: &Arena, key: &str) -> bool {
        self.get(arena, key).is_some()
    }

    /// Number of entries.
    pub fn len(&self, arena: &Arena) -> usize {
        arena.node(self.node).children().len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self, arena: &Arena) -> bool {
        self.len(arena) == 0
    }

    /// All keys, in table order.
    pub fn keys(&self, arena: &Arena) -> Vec<String> {
        arena
            .node(self.node)
            .children()
            .iter()
            .filter_map(|&entry| Table::entry_key(arena, entry))
            .collect()
    }

    /// Human-readable description of this table, from its node kind.
    pub fn describe(&self, arena: &Arena) -> &'static str {
        match arena.kind(self.node) {
            NodeKind::TypeTable => "type table",
            NodeKind::Symbols | NodeKind::GlobalSymbols => "symbol table",
            NodeKind::Declarations | NodeKind::GlobalDeclarations => "declaration table",
            _ => "table",
        }
    }

    /// Append a detached entry, enforcing key uniqueness.
    ///
    /// `line` is the source line reported when the key already exists.
    pub fn add(&self, arena: &mut Arena, entry: NodeId, line: u32) -> LooptranResult<()> {
        let key = Table::entry_key(arena, entry).ok_or_else(|| {
            LooptranError::internal(format!(
                "table entry {} has no key",
                arena.kind(entry)
            ))
        })?;
        if self.contains(arena, &key) {
            return Err(TransformError::new(
                TransformErrorKind::DuplicateKey,
                self.describe(arena),
                format!("key '{}' already present", key),
                line,
            )
            .into());
        }
        arena.append(self.node, entry)
    }

    /// Replace the entry sharing the new entry's key, keeping table order.
    pub fn replace(&self, arena: &mut Arena, entry: NodeId) -> LooptranResult<()> {
        let key = Table::entry_key(arena, entry).ok_or_else(|| {
            LooptranError::internal(format!(
                "table entry {} has no key",
                arena.kind(entry)
            ))
        })?;
        match self.get(arena, &key) {
            Some(old) => arena.replace(old, entry),
            None => arena.append(self.node, entry),
        }
    }

    /// Generate a function type key unique within this table.
    ///
    /// Fresh keys must be generated before the entry that carries them is
    /// inserted, so that every observer of the table sees a consistent
    /// state.
    pub fn generate_function_type_hash(&self, arena: &Arena) -> String {
        let mut probe = self.len(arena) as u64;
        loop {
            let candidate = format!("F{:010x}", probe);
            if !self.contains(arena, &candidate) {
                return candidate;
            }
            probe += 1;
        }
    }
}

//! Serialized form of the IR tree document.
//!
//! The front-end hands the engine a JSON tree; the engine writes the same
//! shape back for the back-end. Element kinds the engine does not know are
//! carried through untouched so that an untransformed document round-trips
//! structurally equal.

use crate::ir::arena::{Arena, NodeId};
use crate::ir::node::NodeKind;
use crate::ir::program::Program;
use crate::utils::errors::{DocumentError, DocumentErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of the serialized tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonNode {
    /// Wire name of the node kind
    pub kind: String,
    /// Attribute map
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child nodes, in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JsonNode>,
}

/// Read a program document from its serialized form.
pub fn read_program(input: &str) -> Result<Program, DocumentError> {
    let json: JsonNode = serde_json::from_str(input).map_err(|e| {
        DocumentError::new(
            DocumentErrorKind::Malformed,
            format!("cannot parse tree document: {}", e),
        )
    })?;
    let mut arena = Arena::new();
    let root = build_node(&mut arena, &json);
    Program::from_parts(arena, root)
}

fn build_node(arena: &mut Arena, json: &JsonNode) -> NodeId {
    let id = arena.alloc(NodeKind::from_name(&json.kind));
    if let Some(text) = &json.text {
        arena.node_mut(id).text = Some(text.clone());
    }
    for (name, value) in &json.attrs {
        arena.node_mut(id).set_attr(name, value.clone());
    }
    for child in &json.children {
        let child_id = build_node(arena, child);
        // Freshly built nodes are always detached.
        arena.append(id, child_id).ok();
    }
    id
}

/// Write a program document to its serialized form.
pub fn write_program(program: &Program) -> String {
    let json = dump_node(&program.arena, program.root());
    // JsonNode contains only map/string data, serialization cannot fail.
    serde_json::to_string_pretty(&json).unwrap_or_default()
}

fn dump_node(arena: &Arena, id: NodeId) -> JsonNode {
    let node = arena.node(id);
    JsonNode {
        kind: node.kind.as_str().to_string(),
        attrs: node
            .attrs()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        text: node.text.clone(),
        children: node
            .children()
            .iter()
            .map(|&c| dump_node(arena, c))
            .collect(),
    }
}

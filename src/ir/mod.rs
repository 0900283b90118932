//! The IR tree: nodes, tables, ranges and the program document.
//!
//! The engine manipulates programs through a small set of tree primitives
//! (traversal, cloning, splicing) plus keyed lookups through the type,
//! symbol and declaration tables. The tree itself is owned by an arena;
//! cross-references are string keys, never node ids.

pub mod arena;
pub mod builder;
pub mod json;
pub mod node;
pub mod program;
pub mod range;
pub mod tables;

pub use arena::{Arena, Node, NodeId};
pub use json::{read_program, write_program};
pub use node::{attr, NodeKind, Scope};
pub use program::{Diagnostic, Program};
pub use range::IterationRange;
pub use tables::Table;

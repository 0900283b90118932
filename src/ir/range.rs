//! Iteration ranges of do statements.

use crate::ir::arena::{Arena, NodeId};
use crate::ir::node::NodeKind;

/// The iteration space of a do statement.
///
/// Bounds are kept as expression text; two ranges compare equal exactly
/// when induction variable, lower bound, upper bound and step are all
/// textually equal. A missing step denotes a unit step.
#[derive(Debug, Clone)]
pub struct IterationRange {
    /// Induction variable name
    pub induction: String,
    /// Lower bound expression text
    pub lower: String,
    /// Upper bound expression text
    pub upper: String,
    /// Step expression text
    pub step: String,
    lower_var: Option<String>,
    upper_var: Option<String>,
    step_var: Option<String>,
}

impl IterationRange {
    /// Read the iteration range of a do statement.
    ///
    /// Returns `None` when the do statement does not carry the expected
    /// induction variable and index range children.
    pub fn of(arena: &Arena, do_stmt: NodeId) -> Option<IterationRange> {
        if arena.kind(do_stmt) != &NodeKind::DoStatement {
            return None;
        }
        let induction_node = arena
            .node(do_stmt)
            .children()
            .iter()
            .copied()
            .find(|&c| arena.kind(c) == &NodeKind::Var)?;
        let induction = arena.text(induction_node)?.to_string();
        let index_range = arena
            .node(do_stmt)
            .children()
            .iter()
            .copied()
            .find(|&c| arena.kind(c) == &NodeKind::IndexRange)?;

        let lower_node = arena.find(index_range, &NodeKind::LowerBound)?;
        let upper_node = arena.find(index_range, &NodeKind::UpperBound)?;
        let step_node = arena.find(index_range, &NodeKind::Step);

        let (lower, lower_var) = bound_text(arena, lower_node);
        let (upper, upper_var) = bound_text(arena, upper_node);
        let (step, step_var) = match step_node {
            Some(node) => bound_text(arena, node),
            None => ("1".to_string(), None),
        };

        Some(IterationRange {
            induction,
            lower,
            upper,
            step,
            lower_var,
            upper_var,
            step_var,
        })
    }

    /// Variable name of the lower bound, when the bound is a plain variable.
    pub fn lower_var(&self) -> Option<&str> {
        self.lower_var.as_deref()
    }

    /// Variable name of the upper bound, when the bound is a plain variable.
    pub fn upper_var(&self) -> Option<&str> {
        self.upper_var.as_deref()
    }

    /// Variable name of the step, when the step is a plain variable.
    pub fn step_var(&self) -> Option<&str> {
        self.step_var.as_deref()
    }
}

impl PartialEq for IterationRange {
    fn eq(&self, other: &Self) -> bool {
        self.induction == other.induction
            && self.lower == other.lower
            && self.upper == other.upper
            && self.step == other.step
    }
}

impl Eq for IterationRange {}

impl std::fmt::Display for IterationRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={}:{}:{}",
            self.induction, self.lower, self.upper, self.step
        )
    }
}

/// Expression text of a bound node together with the variable name when the
/// bound is a single variable reference.
fn bound_text(arena: &Arena, bound: NodeId) -> (String, Option<String>) {
    let text = arena.subtree_text(bound);
    let children = arena.node(bound).children();
    let var = match children {
        [only] if arena.kind(*only) == &NodeKind::Var => {
            arena.text(*only).map(|t| t.to_string())
        }
        _ => None,
    };
    (text, var)
}

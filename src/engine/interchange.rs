//! Loop interchange.
//!
//! Reorders the control of a perfect loop nest. Without an induction list
//! the two outermost levels swap; with one, the nest levels are reordered
//! to match the listed induction variables.

use crate::directive::Directive;
use crate::engine::{TransformContext, Transformation};
use crate::ir::arena::NodeId;
use crate::ir::builder;
use crate::ir::node::NodeKind;
use crate::ir::program::Program;
use crate::utils::errors::{LooptranError, LooptranResult};
use std::any::Any;

/// Loop interchange transformation (independent, directive-triggered).
pub struct LoopInterchange {
    pragma: NodeId,
    line: u32,
    names: Vec<String>,
    outer: Option<NodeId>,
}

impl LoopInterchange {
    /// Create an instance from its triggering directive.
    pub fn from_directive(directive: &Directive, pragma: NodeId) -> Self {
        Self {
            pragma,
            line: directive.line,
            names: directive.names.clone(),
            outer: None,
        }
    }

    /// The do statements of the nest, outermost first.
    fn nest_levels(&self, program: &Program) -> Vec<NodeId> {
        let mut levels = Vec::new();
        let mut current = self.outer;
        while let Some(level) = current {
            levels.push(level);
            current = builder::body_of(&program.arena, level)
                .and_then(|body| program.arena.find(body, &NodeKind::DoStatement));
        }
        levels
    }

    /// Induction variable name of a nest level.
    fn induction_of(program: &Program, level: NodeId) -> Option<String> {
        program
            .arena
            .node(level)
            .children()
            .iter()
            .copied()
            .find(|&c| program.arena.kind(c) == &NodeKind::Var)
            .and_then(|var| program.arena.text(var))
            .map(|t| t.to_string())
    }

    /// Loop control (induction variable and index range) of a nest level.
    fn control_of(program: &Program, level: NodeId) -> Option<(NodeId, NodeId)> {
        let children = program.arena.node(level).children();
        let var = children
            .iter()
            .copied()
            .find(|&c| program.arena.kind(c) == &NodeKind::Var)?;
        let range = children
            .iter()
            .copied()
            .find(|&c| program.arena.kind(c) == &NodeKind::IndexRange)?;
        Some((var, range))
    }
}

impl Transformation for LoopInterchange {
    fn name(&self) -> &'static str {
        "loop-interchange"
    }

    fn pragma(&self) -> Option<NodeId> {
        Some(self.pragma)
    }

    fn start_line(&self) -> u32 {
        self.line
    }

    fn analyze(&mut self, program: &mut Program) -> bool {
        match program.arena.next_sibling(self.pragma) {
            Some(next) if program.arena.kind(next) == &NodeKind::DoStatement => {
                self.outer = Some(next);
            }
            _ => {
                program.add_error("No loop found after loop-interchange directive", self.line);
                return false;
            }
        }
        let levels = self.nest_levels(program);
        if levels.len() < 2 {
            program.add_error("No nested loop to interchange", self.line);
            return false;
        }
        if !self.names.is_empty() {
            if self.names.len() > levels.len() {
                program.add_error("Induction list is deeper than the loop nest", self.line);
                return false;
            }
            // The listed names must permute the outermost levels, or the
            // reorder would duplicate a loop control.
            let mut outer: Vec<String> = levels
                .iter()
                .take(self.names.len())
                .filter_map(|&level| Self::induction_of(program, level))
                .collect();
            let mut given = self.names.clone();
            outer.sort();
            given.sort();
            if outer != given {
                program.add_error(
                    "Induction list must be a permutation of the outer loop nest",
                    self.line,
                );
                return false;
            }
        }
        true
    }

    fn transform(
        &mut self,
        program: &mut Program,
        _ctx: &mut TransformContext,
        _partner: Option<&dyn Transformation>,
    ) -> LooptranResult<()> {
        let levels = self.nest_levels(program);
        if levels.len() < 2 {
            return Err(LooptranError::internal("interchange applied to a flat loop"));
        }

        // Target induction order per level: listed names first, untouched
        // levels keep their own control.
        let current_order: Vec<String> = levels
            .iter()
            .map(|&level| {
                Self::induction_of(program, level)
                    .ok_or_else(|| LooptranError::internal("loop without induction variable"))
            })
            .collect::<Result<_, _>>()?;
        let new_order: Vec<String> = if self.names.is_empty() {
            let mut order = current_order.clone();
            order.swap(0, 1);
            order
        } else {
            let mut order = self.names.clone();
            order.extend(current_order.iter().skip(order.len()).cloned());
            order
        };

        // Detach every level's control, then reattach per the new order.
        let mut controls = std::collections::HashMap::new();
        for (&level, induction) in levels.iter().zip(current_order.iter()) {
            let (var, range) = Self::control_of(program, level)
                .ok_or_else(|| LooptranError::internal("loop without iteration control"))?;
            program.arena.detach(var);
            program.arena.detach(range);
            controls.insert(induction.clone(), (var, range));
        }
        for (&level, induction) in levels.iter().zip(new_order.iter()) {
            let (var, range) = controls
                .remove(induction)
                .ok_or_else(|| LooptranError::internal("interchange order mismatch"))?;
            let body = builder::body_of(&program.arena, level)
                .ok_or_else(|| LooptranError::internal("loop without body"))?;
            program.arena.insert_before(body, var)?;
            program.arena.insert_before(body, range)?;
        }
        program.arena.delete(self.pragma);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive;
    use crate::ir::range::IterationRange;

    fn nest(program: &mut Program, pragma_text: &str) -> (NodeId, NodeId, NodeId) {
        let body = program.arena.alloc(NodeKind::Body);
        let pragma = builder::pragma(&mut program.arena, pragma_text, 3);
        let outer = builder::do_statement(&mut program.arena, "i", "1", "n", None);
        let inner = builder::do_statement(&mut program.arena, "j", "1", "m", None);
        let outer_body = builder::body_of(&program.arena, outer).unwrap();
        program.arena.append(outer_body, inner).unwrap();
        program.arena.append(body, pragma).unwrap();
        program.arena.append(body, outer).unwrap();
        (pragma, outer, inner)
    }

    fn instance(program: &Program, pragma: NodeId) -> LoopInterchange {
        let text = program.arena.text(pragma).unwrap().to_string();
        let directive = directive::parse_pragma(&text, 3).unwrap().unwrap();
        LoopInterchange::from_directive(&directive, pragma)
    }

    #[test]
    fn test_swap_two_levels() {
        let mut program = Program::new();
        let (pragma, outer, inner) = nest(&mut program, "claw loop-interchange");
        let mut interchange = instance(&program, pragma);
        assert!(interchange.analyze(&mut program));
        let mut ctx = TransformContext::new(0);
        interchange.transform(&mut program, &mut ctx, None).unwrap();

        let outer_range = IterationRange::of(&program.arena, outer).unwrap();
        let inner_range = IterationRange::of(&program.arena, inner).unwrap();
        assert_eq!(outer_range.induction, "j");
        assert_eq!(outer_range.upper, "m");
        assert_eq!(inner_range.induction, "i");
        assert_eq!(inner_range.upper, "n");
    }

    #[test]
    fn test_explicit_order() {
        let mut program = Program::new();
        let (pragma, outer, inner) = nest(&mut program, "claw loop-interchange (j,i)");
        let mut interchange = instance(&program, pragma);
        assert!(interchange.analyze(&mut program));
        let mut ctx = TransformContext::new(0);
        interchange.transform(&mut program, &mut ctx, None).unwrap();
        assert_eq!(
            IterationRange::of(&program.arena, outer).unwrap().induction,
            "j"
        );
        assert_eq!(
            IterationRange::of(&program.arena, inner).unwrap().induction,
            "i"
        );
    }

    #[test]
    fn test_analyze_requires_nest() {
        let mut program = Program::new();
        let body = program.arena.alloc(NodeKind::Body);
        let pragma = builder::pragma(&mut program.arena, "claw loop-interchange", 3);
        let flat = builder::do_statement(&mut program.arena, "i", "1", "n", None);
        program.arena.append(body, pragma).unwrap();
        program.arena.append(body, flat).unwrap();
        let mut interchange = instance(&program, pragma);
        assert!(!interchange.analyze(&mut program));
        assert_eq!(program.errors().len(), 1);
    }

    #[test]
    fn test_analyze_rejects_unknown_induction() {
        let mut program = Program::new();
        let (pragma, _, _) = nest(&mut program, "claw loop-interchange (k,i)");
        let mut interchange = instance(&program, pragma);
        assert!(!interchange.analyze(&mut program));
    }
}

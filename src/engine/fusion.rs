//! Loop fusion.
//!
//! A fusion instance marks one do statement; two instances of the same
//! group whose loops share an iteration range merge into a single loop.
//! The leading instance absorbs every later compatible one, so a run of
//! three compatible loops collapses into one.

use crate::directive::Directive;
use crate::engine::{TransformContext, Transformation};
use crate::ir::arena::NodeId;
use crate::ir::builder;
use crate::ir::node::NodeKind;
use crate::ir::program::Program;
use crate::ir::range::IterationRange;
use crate::utils::errors::{LooptranError, LooptranResult};
use std::any::Any;
use std::collections::HashSet;

/// Loop fusion transformation (dependent, directive-triggered).
pub struct LoopFusion {
    pragma: Option<NodeId>,
    line: u32,
    group: String,
    do_stmt: Option<NodeId>,
}

impl LoopFusion {
    /// Create an instance from its triggering directive.
    pub fn from_directive(directive: &Directive, pragma: NodeId) -> Self {
        Self {
            pragma: Some(pragma),
            line: directive.line,
            group: directive.group_label().to_string(),
            do_stmt: None,
        }
    }

    /// Create an instance directly on an already-located loop.
    ///
    /// Used when another transformation chains a fusion onto a loop it
    /// created; no pragma exists and analysis succeeds immediately.
    pub fn from_loop(do_stmt: NodeId, group: &str, line: u32) -> Self {
        Self {
            pragma: None,
            line,
            group: group.to_string(),
            do_stmt: Some(do_stmt),
        }
    }

    /// The fused loop.
    pub fn do_stmt(&self) -> Option<NodeId> {
        self.do_stmt
    }

    fn iteration_range(&self, program: &Program) -> Option<IterationRange> {
        IterationRange::of(&program.arena, self.do_stmt?)
    }

    /// Variable names written by statements strictly between two sibling
    /// statements.
    fn written_between(program: &Program, first: NodeId, second: NodeId) -> HashSet<String> {
        let mut written = HashSet::new();
        for sibling in program.arena.following_siblings(first) {
            if sibling == second {
                break;
            }
            if program.arena.kind(sibling) == &NodeKind::AssignStatement {
                if let Some(name) = assignment_target(program, sibling) {
                    written.insert(name);
                }
            }
        }
        written
    }

    /// Variable names read anywhere inside a loop body.
    fn read_in_body(program: &Program, do_stmt: NodeId) -> HashSet<String> {
        let mut read = HashSet::new();
        if let Some(body) = builder::body_of(&program.arena, do_stmt) {
            for var in program.arena.find_all(body, &NodeKind::Var) {
                if let Some(name) = program.arena.text(var) {
                    read.insert(name.to_string());
                }
            }
        }
        read
    }
}

/// Base variable name written by an assignment statement.
fn assignment_target(program: &Program, assign: NodeId) -> Option<String> {
    let lhs = program.arena.node(assign).children().first().copied()?;
    let var = match program.arena.kind(lhs) {
        NodeKind::Var => lhs,
        NodeKind::ArrayRef => program.arena.find(lhs, &NodeKind::Var)?,
        _ => return None,
    };
    program.arena.text(var).map(|t| t.to_string())
}

impl Transformation for LoopFusion {
    fn name(&self) -> &'static str {
        "loop-fusion"
    }

    fn pragma(&self) -> Option<NodeId> {
        self.pragma
    }

    fn start_line(&self) -> u32 {
        self.line
    }

    fn group_label(&self) -> &str {
        &self.group
    }

    fn analyze(&mut self, program: &mut Program) -> bool {
        if self.do_stmt.is_some() {
            // Chained instance, the loop is already located.
            return true;
        }
        let pragma = match self.pragma {
            Some(pragma) => pragma,
            None => return false,
        };
        match program.arena.next_sibling(pragma) {
            Some(next) if program.arena.kind(next) == &NodeKind::DoStatement => {
                self.do_stmt = Some(next);
                true
            }
            _ => {
                program.add_error("No loop found after loop-fusion directive", self.line);
                false
            }
        }
    }

    fn can_pair_with(&self, other: &dyn Transformation, program: &Program) -> bool {
        let other = match other.as_any().downcast_ref::<LoopFusion>() {
            Some(other) => other,
            None => return false,
        };
        if self.group != other.group {
            return false;
        }
        let (first, second) = match (self.do_stmt, other.do_stmt) {
            (Some(first), Some(second)) => (first, second),
            _ => return false,
        };
        // Fusable loops are siblings of the same body.
        if program.arena.node(first).parent() != program.arena.node(second).parent() {
            return false;
        }
        match (self.iteration_range(program), other.iteration_range(program)) {
            (Some(a), Some(b)) if a == b => {}
            _ => return false,
        }
        // A statement between the loops writing a variable the second loop
        // reads would change meaning once the loops share one body.
        let written = Self::written_between(program, first, second);
        if !written.is_empty() {
            let read = Self::read_in_body(program, second);
            if written.intersection(&read).next().is_some() {
                return false;
            }
        }
        true
    }

    fn transform(
        &mut self,
        program: &mut Program,
        _ctx: &mut TransformContext,
        partner: Option<&dyn Transformation>,
    ) -> LooptranResult<()> {
        let partner = partner
            .and_then(|p| p.as_any().downcast_ref::<LoopFusion>())
            .ok_or_else(|| LooptranError::internal("loop-fusion applied without a partner"))?;
        let master = self
            .do_stmt
            .ok_or_else(|| LooptranError::internal("loop-fusion master loop not located"))?;
        let slave = partner
            .do_stmt
            .ok_or_else(|| LooptranError::internal("loop-fusion slave loop not located"))?;

        let master_body = builder::body_of(&program.arena, master)
            .ok_or_else(|| LooptranError::internal("fused loop has no body"))?;
        let slave_body = builder::body_of(&program.arena, slave)
            .ok_or_else(|| LooptranError::internal("fused loop has no body"))?;

        program.arena.move_body_children(slave_body, master_body)?;
        program.arena.delete(slave);
        if let Some(pragma) = partner.pragma {
            program.arena.delete(pragma);
        }
        if let Some(pragma) = self.pragma {
            program.arena.delete(pragma);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

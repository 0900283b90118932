//! Block-delimited transformations.
//!
//! A block transformation is delimited by a start pragma and a matching
//! `end <keyword>` pragma among its siblings. Analysis verifies the pair
//! is balanced; the concrete `remove` transformation deletes every
//! statement between its delimiters.

use crate::directive::{self, Directive, DirectiveKind};
use crate::engine::{TransformContext, Transformation};
use crate::ir::arena::NodeId;
use crate::ir::node::NodeKind;
use crate::ir::program::Program;
use crate::utils::errors::{LooptranError, LooptranResult};
use std::any::Any;

/// Find the matching `end <keyword>` pragma among the start pragma's
/// following siblings, honoring nested blocks of the same keyword.
pub fn find_block_end(
    program: &Program,
    start: NodeId,
    keyword: DirectiveKind,
) -> Option<NodeId> {
    let mut depth = 0usize;
    for sibling in program.arena.following_siblings(start) {
        if program.arena.kind(sibling) != &NodeKind::Pragma {
            continue;
        }
        let text = match program.arena.text(sibling) {
            Some(text) => text,
            None => continue,
        };
        let parsed = match directive::parse_pragma(text, program.arena.lineno(sibling)) {
            Some(Ok(parsed)) => parsed,
            _ => continue,
        };
        if parsed.kind == Some(keyword) {
            depth += 1;
        } else if parsed.kind == Some(DirectiveKind::End) && parsed.end_target == Some(keyword) {
            if depth == 0 {
                return Some(sibling);
            }
            depth -= 1;
        }
    }
    None
}

/// Block statement removal (independent, directive-triggered).
pub struct Remove {
    pragma: NodeId,
    line: u32,
    end_pragma: Option<NodeId>,
}

impl Remove {
    /// Create an instance from its triggering directive.
    pub fn from_directive(directive: &Directive, pragma: NodeId) -> Self {
        Self {
            pragma,
            line: directive.line,
            end_pragma: None,
        }
    }
}

impl Transformation for Remove {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn pragma(&self) -> Option<NodeId> {
        Some(self.pragma)
    }

    fn start_line(&self) -> u32 {
        self.line
    }

    fn analyze(&mut self, program: &mut Program) -> bool {
        match find_block_end(program, self.pragma, DirectiveKind::Remove) {
            Some(end) => {
                self.end_pragma = Some(end);
                true
            }
            None => {
                program.add_error("Unbalanced remove block, missing end remove", self.line);
                false
            }
        }
    }

    fn transform(
        &mut self,
        program: &mut Program,
        _ctx: &mut TransformContext,
        _partner: Option<&dyn Transformation>,
    ) -> LooptranResult<()> {
        let end = self
            .end_pragma
            .ok_or_else(|| LooptranError::internal("remove block end not located"))?;
        for sibling in program.arena.following_siblings(self.pragma) {
            if sibling == end {
                break;
            }
            program.arena.delete(sibling);
        }
        program.arena.delete(end);
        program.arena.delete(self.pragma);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

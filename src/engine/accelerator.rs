//! Accelerator directive insertion.
//!
//! Wraps the statement following the directive in a pair of accelerator
//! start/end pragmas. Pure IR surgery; the only analysis is locating the
//! region.

use crate::directive::{Directive, ACC_PREFIX};
use crate::engine::{TransformContext, Transformation};
use crate::ir::arena::NodeId;
use crate::ir::builder;
use crate::ir::program::Program;
use crate::utils::errors::{LooptranError, LooptranResult};
use std::any::Any;

/// Accelerator insertion transformation (independent, directive-triggered).
pub struct Parallelize {
    pragma: NodeId,
    line: u32,
    acc_option: Option<String>,
    target: Option<NodeId>,
}

impl Parallelize {
    /// Create an instance from its triggering directive.
    pub fn from_directive(directive: &Directive, pragma: NodeId) -> Self {
        Self {
            pragma,
            line: directive.line,
            acc_option: directive.acc.clone(),
            target: None,
        }
    }
}

impl Transformation for Parallelize {
    fn name(&self) -> &'static str {
        "parallelize"
    }

    fn pragma(&self) -> Option<NodeId> {
        Some(self.pragma)
    }

    fn start_line(&self) -> u32 {
        self.line
    }

    fn analyze(&mut self, program: &mut Program) -> bool {
        match program.arena.next_sibling(self.pragma) {
            Some(next) if program.arena.kind(next).is_statement() => {
                self.target = Some(next);
                true
            }
            _ => {
                program.add_error("No statement following parallelize directive", self.line);
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
        let target = self
            .target
            .ok_or_else(|| LooptranError::internal("parallelize applied before analysis"))?;
        let start = builder::pragma(&mut program.arena, format!("{} parallel", ACC_PREFIX), 0);
        let end = builder::pragma(&mut program.arena, format!("{} end parallel", ACC_PREFIX), 0);
        program.arena.insert_after(self.pragma, start)?;
        program.arena.insert_after(target, end)?;
        if let Some(option) = &self.acc_option {
            let extra =
                builder::pragma(&mut program.arena, format!("{} {}", ACC_PREFIX, option), 0);
            program.arena.insert_after(start, extra)?;
        }
        program.arena.delete(self.pragma);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

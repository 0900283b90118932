//! The transformation queue and its phases.
//!
//! The transformer scans the program for directives, turns each into a
//! transformation instance queued under its configured group, analyzes the
//! queue, and applies the groups in configured order. Within a group,
//! instances apply in document order; dependent groups pair instances
//! before applying.

use crate::config::{Configuration, GroupConfiguration, GroupKind, TransformationClass, TriggerKind};
use crate::directive::{self, Directive, DirectiveKind};
use crate::engine::{
    accelerator::Parallelize, block::Remove, extraction::LoopExtraction, fusion::LoopFusion,
    interchange::LoopInterchange, TransformContext, Transformation,
};
use crate::ir::arena::NodeId;
use crate::ir::program::Program;
use crate::utils::errors::LooptranResult;

/// Lifecycle of a queued instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Analyzed,
    Transformed,
    Discarded,
}

struct Entry {
    transformation: Box<dyn Transformation>,
    state: State,
}

struct GroupQueue {
    config: GroupConfiguration,
    entries: Vec<Entry>,
}

/// The engine driving the transformation pipeline.
pub struct Transformer {
    groups: Vec<GroupQueue>,
    counter: u32,
}

impl Transformer {
    /// Create a transformer with one queue per configured group.
    pub fn new(config: &Configuration) -> Self {
        let groups = config
            .groups()
            .iter()
            .map(|group| GroupQueue {
                config: group.clone(),
                entries: Vec::new(),
            })
            .collect();
        Self { groups, counter: 0 }
    }

    /// Number of queued instances across all groups.
    pub fn queued(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    /// Scan the program's pragmas and queue one instance per recognized
    /// directive.
    ///
    /// Malformed directives are recorded against their pragma and skipped;
    /// pragmas addressed to other tools pass through silently. All known
    /// transformation classes are directive-triggered, so translation-unit
    /// groups queue nothing here.
    pub fn scan(&mut self, program: &mut Program) {
        for pragma in program.pragmas() {
            let text = match program.arena.text(pragma) {
                Some(text) => text.to_string(),
                None => continue,
            };
            let line = program.arena.lineno(pragma);
            let parsed = match directive::parse_pragma(&text, line) {
                Some(parsed) => parsed,
                None => continue,
            };
            let parsed = match parsed {
                Ok(parsed) => parsed,
                Err(error) => {
                    program.add_error(&error.message, line);
                    continue;
                }
            };
            let kind = match parsed.kind {
                // End pragmas belong to the block start that finds them.
                Some(DirectiveKind::End) | None => continue,
                Some(kind) => kind,
            };
            let group = self.groups.iter_mut().find(|group| {
                group.config.name == kind.keyword()
                    && group.config.trigger == TriggerKind::Directive
            });
            let group = match group {
                Some(group) => group,
                None => {
                    program.add_warning(
                        &format!("no transformation group configured for '{}'", kind),
                        line,
                    );
                    continue;
                }
            };
            if let Some(transformation) = instantiate(group.config.class, &parsed, pragma) {
                group.entries.push(Entry {
                    transformation,
                    state: State::Pending,
                });
            }
        }
    }

    /// Analyze every pending instance; failures are discarded with their
    /// diagnostics retained on the program.
    pub fn analyze_all(&mut self, program: &mut Program) {
        for group in &mut self.groups {
            analyze_group(group, program);
        }
    }

    /// Apply all groups in configured order.
    ///
    /// A single `transform` failure aborts the whole pipeline; the program
    /// may be left partially transformed and must not be emitted.
    pub fn apply_all(&mut self, program: &mut Program) -> LooptranResult<()> {
        let mut ctx = TransformContext::new(self.counter);
        for index in 0..self.groups.len() {
            // Late additions from earlier groups enter as pending.
            analyze_group(&mut self.groups[index], program);
            self.groups[index]
                .entries
                .sort_by_key(|entry| entry.transformation.start_line());
            match self.groups[index].config.kind {
                GroupKind::Independent => self.apply_independent(index, program, &mut ctx)?,
                GroupKind::Dependent => self.apply_dependent(index, program, &mut ctx)?,
            }
            self.route_additions(index, &mut ctx, program);
        }
        self.counter = ctx.counter();
        Ok(())
    }

    /// Convenience wrapper: scan, analyze and apply in one call.
    pub fn run(&mut self, program: &mut Program) -> LooptranResult<()> {
        self.scan(program);
        self.analyze_all(program);
        self.apply_all(program)
    }

    fn apply_independent(
        &mut self,
        index: usize,
        program: &mut Program,
        ctx: &mut TransformContext,
    ) -> LooptranResult<()> {
        for entry in &mut self.groups[index].entries {
            if entry.state != State::Analyzed {
                continue;
            }
            entry.transformation.transform(program, ctx, None)?;
            entry.state = State::Transformed;
        }
        Ok(())
    }

    /// Apply a dependent group: each leading instance absorbs every later
    /// compatible instance, so a chain of compatible instances collapses
    /// into the first one. Instances left without any partner are
    /// discarded with a warning.
    fn apply_dependent(
        &mut self,
        index: usize,
        program: &mut Program,
        ctx: &mut TransformContext,
    ) -> LooptranResult<()> {
        let entries = &mut self.groups[index].entries;
        for i in 0..entries.len() {
            if entries[i].state != State::Analyzed {
                continue;
            }
            let mut absorbed = false;
            for j in (i + 1)..entries.len() {
                if entries[j].state != State::Analyzed {
                    continue;
                }
                let compatible = entries[i]
                    .transformation
                    .can_pair_with(entries[j].transformation.as_ref(), program);
                if !compatible {
                    continue;
                }
                let (left, right) = entries.split_at_mut(j);
                left[i].transformation.transform(
                    program,
                    ctx,
                    Some(right[0].transformation.as_ref()),
                )?;
                right[0].state = State::Transformed;
                absorbed = true;
            }
            if absorbed {
                entries[i].state = State::Transformed;
            } else {
                entries[i].state = State::Discarded;
                let line = entries[i].transformation.start_line();
                program.add_warning(
                    &format!(
                        "no partner found for {} transformation",
                        entries[i].transformation.name()
                    ),
                    line,
                );
            }
        }
        Ok(())
    }

    /// Route transformations enqueued during `transform` into their target
    /// group. The target must come later in the configured order than the
    /// group just applied (`current`); a target whose turn has already
    /// passed, or that does not exist, drops the addition with a warning.
    fn route_additions(
        &mut self,
        current: usize,
        ctx: &mut TransformContext,
        program: &mut Program,
    ) {
        for (group_name, transformation) in ctx.take_added() {
            let target = self
                .groups
                .iter()
                .position(|g| g.config.name == group_name);
            match target {
                Some(index) if index > current => {
                    self.groups[index].entries.push(Entry {
                        transformation,
                        state: State::Pending,
                    });
                }
                Some(_) => {
                    program.add_warning(
                        &format!(
                            "chained transformation dropped: group '{}' applies before its origin",
                            group_name
                        ),
                        transformation.start_line(),
                    );
                }
                None => {
                    program.add_warning(
                        &format!("no transformation group '{}' for chained transformation", group_name),
                        transformation.start_line(),
                    );
                }
            }
        }
    }
}

fn analyze_group(group: &mut GroupQueue, program: &mut Program) {
    for entry in &mut group.entries {
        if entry.state != State::Pending {
            continue;
        }
        entry.state = if entry.transformation.analyze(program) {
            State::Analyzed
        } else {
            State::Discarded
        };
    }
}

/// Construct a transformation instance of the given class.
fn instantiate(
    class: TransformationClass,
    directive: &Directive,
    pragma: NodeId,
) -> Option<Box<dyn Transformation>> {
    match class {
        TransformationClass::LoopFusion => {
            Some(Box::new(LoopFusion::from_directive(directive, pragma)))
        }
        TransformationClass::LoopExtraction => LoopExtraction::from_directive(directive, pragma)
            .map(|t| Box::new(t) as Box<dyn Transformation>),
        TransformationClass::LoopInterchange => {
            Some(Box::new(LoopInterchange::from_directive(directive, pragma)))
        }
        TransformationClass::Parallelize => {
            Some(Box::new(Parallelize::from_directive(directive, pragma)))
        }
        TransformationClass::Remove => Some(Box::new(Remove::from_directive(directive, pragma))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::node::{NodeKind, Scope};

    /// Caller body with `count` fusable pragma/loop pairs.
    fn fusion_program(count: usize) -> (Program, NodeId) {
        let mut program = Program::new();
        let fct = program.arena.alloc(NodeKind::FunctionDefinition);
        let name = builder::name(&mut program.arena, "main", "F001");
        program.arena.append(fct, name).unwrap();
        let body = program.arena.alloc(NodeKind::Body);
        for index in 0..count {
            let line = 10 * (index as u32 + 1);
            let pragma = builder::pragma(&mut program.arena, "claw loop-fusion", line);
            let do_stmt = builder::do_statement(&mut program.arena, "i", "1", "2", None);
            let loop_body = builder::body_of(&program.arena, do_stmt).unwrap();
            let stmt = program.arena.alloc(NodeKind::ExprStatement);
            let var = builder::var(&mut program.arena, format!("x{}", index), Scope::Local);
            program.arena.append(stmt, var).unwrap();
            program.arena.append(loop_body, stmt).unwrap();
            program.arena.append(body, pragma).unwrap();
            program.arena.append(body, do_stmt).unwrap();
        }
        program.arena.append(fct, body).unwrap();
        let globals = program.global_declarations();
        program.arena.append(globals, fct).unwrap();
        (program, body)
    }

    #[test]
    fn test_scan_queues_recognized_directives() {
        let (mut program, _) = fusion_program(2);
        let mut transformer = Transformer::new(&Configuration::builtin());
        transformer.scan(&mut program);
        assert_eq!(transformer.queued(), 2);
        assert!(program.errors().is_empty());
    }

    #[test]
    fn test_scan_records_parse_errors_and_continues() {
        let (mut program, body) = fusion_program(1);
        let bad = builder::pragma(&mut program.arena, "claw loop-extract map(a:j)", 99);
        program.arena.append(body, bad).unwrap();
        let mut transformer = Transformer::new(&Configuration::builtin());
        transformer.scan(&mut program);
        assert_eq!(transformer.queued(), 1);
        assert_eq!(program.errors().len(), 1);
        assert_eq!(program.errors()[0].lines, vec![99]);
    }

    #[test]
    fn test_scan_ignores_foreign_pragmas() {
        let (mut program, body) = fusion_program(0);
        let foreign = builder::pragma(&mut program.arena, "omp parallel do", 2);
        program.arena.append(body, foreign).unwrap();
        let mut transformer = Transformer::new(&Configuration::builtin());
        transformer.scan(&mut program);
        assert_eq!(transformer.queued(), 0);
        assert!(program.errors().is_empty());
        assert!(program.warnings().is_empty());
    }

    #[test]
    fn test_three_fusable_loops_collapse_into_one() {
        let (mut program, body) = fusion_program(3);
        let mut transformer = Transformer::new(&Configuration::builtin());
        transformer.run(&mut program).unwrap();

        let loops = program.arena.find_all(body, &NodeKind::DoStatement);
        assert_eq!(loops.len(), 1);
        let loop_body = builder::body_of(&program.arena, loops[0]).unwrap();
        // Three statements, original order preserved.
        let names: Vec<&str> = program
            .arena
            .node(loop_body)
            .children()
            .iter()
            .map(|&stmt| {
                let var = program.arena.find(stmt, &NodeKind::Var).unwrap();
                program.arena.text(var).unwrap()
            })
            .collect();
        assert_eq!(names, vec!["x0", "x1", "x2"]);
        assert!(program.arena.find_all(body, &NodeKind::Pragma).is_empty());
        assert!(program.errors().is_empty());
    }

    #[test]
    fn test_lone_dependent_instance_is_discarded_with_warning() {
        let (mut program, body) = fusion_program(1);
        let mut transformer = Transformer::new(&Configuration::builtin());
        transformer.run(&mut program).unwrap();
        // The loop is untouched and a warning was recorded.
        assert_eq!(program.arena.find_all(body, &NodeKind::DoStatement).len(), 1);
        assert_eq!(program.warnings().len(), 1);
        assert!(program.warnings()[0].message.contains("no partner"));
    }
}

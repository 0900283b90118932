//! Loop extraction.
//!
//! The transformation locates a loop inside a called function, hoists the
//! loop out of a clone of that function, wraps the call site with the same
//! loop, and demotes the mapped array arguments accordingly.

use crate::directive::{Directive, MappingClause, RangeClause};
use crate::engine::fusion::LoopFusion;
use crate::engine::{TransformContext, Transformation};
use crate::ir::arena::NodeId;
use crate::ir::builder;
use crate::ir::node::{attr, NodeKind, Scope};
use crate::ir::program::Program;
use crate::ir::range::IterationRange;
use crate::utils::errors::{
    LooptranError, LooptranResult, TransformError, TransformErrorKind,
};
use std::any::Any;
use std::collections::HashMap;

/// Suffix appended to the name of an extracted function clone.
pub const EXTRACTION_SUFFIX: &str = "_extracted_";

/// Loop extraction transformation (independent, directive-triggered).
pub struct LoopExtraction {
    pragma: NodeId,
    line: u32,
    range: RangeClause,
    mappings: Vec<MappingClause>,
    /// Call-site argument name to mapping clause index
    arg_mapping: HashMap<String, usize>,
    /// Callee parameter name to mapping clause index
    fct_mapping: HashMap<String, usize>,
    fusion: bool,
    group: String,
    parallel: bool,
    acc_option: Option<String>,
    // Populated during analysis
    expr_stmt: Option<NodeId>,
    fct_call: Option<NodeId>,
    caller_def: Option<NodeId>,
    callee_def: Option<NodeId>,
}

impl LoopExtraction {
    /// Create an instance from its triggering directive.
    ///
    /// Returns `None` when the directive carries no range clause; the
    /// parser rejects such directives before they reach this point.
    pub fn from_directive(directive: &Directive, pragma: NodeId) -> Option<Self> {
        let range = directive.range.clone()?;
        let mut arg_mapping = HashMap::new();
        let mut fct_mapping = HashMap::new();
        for (index, clause) in directive.mappings.iter().enumerate() {
            for var in &clause.mapped {
                arg_mapping.insert(var.arg.clone(), index);
                fct_mapping.insert(var.fct.clone(), index);
            }
        }
        Some(Self {
            pragma,
            line: directive.line,
            range,
            mappings: directive.mappings.clone(),
            arg_mapping,
            fct_mapping,
            fusion: directive.fusion,
            group: directive.group_label().to_string(),
            parallel: directive.parallel,
            acc_option: directive.acc.clone(),
            expr_stmt: None,
            fct_call: None,
            caller_def: None,
            callee_def: None,
        })
    }

    /// Locate the do statement matching the extraction range inside `from`.
    ///
    /// The first do statement is checked by strict range equality; when it
    /// does not match, its following siblings are scanned.
    fn locate_do_statement(
        &self,
        program: &Program,
        from: NodeId,
    ) -> Result<NodeId, &'static str> {
        let mut found = program
            .arena
            .find(from, &NodeKind::DoStatement)
            .ok_or("No loop found in function")?;
        if !self.range_matches(program, found) {
            loop {
                match program.arena.find_next(found, &NodeKind::DoStatement) {
                    Some(next) => {
                        found = next;
                        if self.range_matches(program, found) {
                            break;
                        }
                    }
                    None => {
                        return Err("Iteration range is different than the loop to be extracted")
                    }
                }
            }
        }
        Ok(found)
    }

    fn range_matches(&self, program: &Program, do_stmt: NodeId) -> bool {
        IterationRange::of(&program.arena, do_stmt)
            .map(|range| self.range.matches(&range))
            .unwrap_or(false)
    }

    /// Argument node of the call matching a mapped name: a plain variable
    /// or an array reference over that variable.
    fn find_argument(&self, program: &Program, name: &str) -> Option<NodeId> {
        let call = self.fct_call?;
        let args = program.arena.find(call, &NodeKind::Arguments)?;
        program
            .arena
            .node(args)
            .children()
            .iter()
            .copied()
            .find(|&child| match program.arena.kind(child) {
                NodeKind::Var => program.arena.text(child) == Some(name),
                NodeKind::ArrayRef => program
                    .arena
                    .find(child, &NodeKind::Var)
                    .and_then(|var| program.arena.text(var))
                    == Some(name),
                _ => false,
            })
    }

    /// Copy the symbol and declaration of `name` from the callee into the
    /// caller when the caller does not have them yet.
    fn insert_declaration(&self, program: &mut Program, name: &str) -> LooptranResult<()> {
        let caller = self
            .caller_def
            .ok_or_else(|| LooptranError::internal("caller not located"))?;
        let callee = self
            .callee_def
            .ok_or_else(|| LooptranError::internal("callee not located"))?;

        if let (Some(caller_syms), Some(callee_syms)) =
            (program.function_symbols(caller), program.function_symbols(callee))
        {
            if caller_syms.get(&program.arena, name).is_none() {
                if let Some(entry) = callee_syms.get(&program.arena, name) {
                    let copy = program.arena.clone_subtree(entry);
                    caller_syms.add(&mut program.arena, copy, self.line)?;
                }
            }
        }
        if let (Some(caller_decls), Some(callee_decls)) = (
            program.function_declarations(caller),
            program.function_declarations(callee),
        ) {
            if caller_decls.get(&program.arena, name).is_none() {
                if let Some(entry) = callee_decls.get(&program.arena, name) {
                    let copy = program.arena.clone_subtree(entry);
                    caller_decls.add(&mut program.arena, copy, self.line)?;
                }
            }
        }
        Ok(())
    }

    /// Clone the callee under a fresh name and function type hash.
    fn clone_callee(&self, program: &mut Program, ctx: &mut TransformContext)
        -> LooptranResult<(NodeId, String, String)>
    {
        let callee = self
            .callee_def
            .ok_or_else(|| LooptranError::internal("callee not located"))?;
        let old_name = program
            .function_name(callee)
            .ok_or_else(|| LooptranError::internal("callee has no name"))?
            .to_string();

        let clone = program.arena.clone_subtree(callee);
        // The fresh hash must exist before the clone becomes observable.
        let new_hash = program.type_table().generate_function_type_hash(&program.arena);
        let new_name = format!(
            "{}{}{}",
            old_name,
            EXTRACTION_SUFFIX,
            ctx.next_transformation_counter()
        );

        let name_node = program
            .function_name_node(clone)
            .ok_or_else(|| LooptranError::internal("cloned function has no name"))?;
        let old_type = program
            .arena
            .attr(name_node, attr::TYPE)
            .unwrap_or_default()
            .to_string();
        program.arena.node_mut(name_node).text = Some(new_name.clone());
        program.arena.node_mut(name_node).set_attr(attr::TYPE, new_hash.clone());

        // The clone's own symbol table still lists the function under its
        // old name.
        if let Some(symbols) = program.function_symbols(clone) {
            if let Some(entry) = symbols.get(&program.arena, &old_name) {
                if let Some(entry_name) = program.arena.find(entry, &NodeKind::Name) {
                    program.arena.node_mut(entry_name).text = Some(new_name.clone());
                }
                program.arena.node_mut(entry).set_attr(attr::TYPE, new_hash.clone());
            }
        }

        // Register the cloned function type.
        let type_table = program.type_table();
        let fct_type = type_table.get(&program.arena, &old_type).ok_or_else(|| {
            TransformError::new(
                TransformErrorKind::UnresolvedType,
                self.name(),
                format!("function type '{}' not found in type table", old_type),
                self.line,
            )
        })?;
        let new_type = program.arena.clone_subtree(fct_type);
        program.arena.node_mut(new_type).set_attr(attr::TYPE, new_hash.clone());
        type_table.add(&mut program.arena, new_type, self.line)?;

        // Duplicate the global symbol when the function is globally known.
        let globals = program.global_symbols();
        if let Some(global_id) = globals.get(&program.arena, &old_name) {
            let new_id = program.arena.clone_subtree(global_id);
            if let Some(id_name) = program.arena.find(new_id, &NodeKind::Name) {
                program.arena.node_mut(id_name).text = Some(new_name.clone());
            }
            program.arena.node_mut(new_id).set_attr(attr::TYPE, new_hash.clone());
            globals.add(&mut program.arena, new_id, self.line)?;
        }

        program.arena.insert_after(callee, clone)?;
        Ok((clone, new_name, new_hash))
    }

    /// Wrap the function call in a do statement with the extracted range,
    /// inserted just after the pragma.
    fn wrap_call_with_loop(&self, program: &mut Program, source_do: NodeId)
        -> LooptranResult<NodeId>
    {
        let expr_stmt = self
            .expr_stmt
            .ok_or_else(|| LooptranError::internal("call statement not located"))?;
        let wrapped = builder::do_statement_like(&mut program.arena, source_do)
            .ok_or_else(|| LooptranError::internal("extracted loop has no iteration range"))?;
        program.arena.insert_after(self.pragma, wrapped)?;
        let body = builder::body_of(&program.arena, wrapped)
            .ok_or_else(|| LooptranError::internal("wrapped loop has no body"))?;
        program.arena.detach(expr_stmt);
        program.arena.append(body, expr_stmt)?;

        // The induction variable and any variable-valued bound move into
        // the caller's scope.
        let range = IterationRange::of(&program.arena, wrapped)
            .ok_or_else(|| LooptranError::internal("wrapped loop has no iteration range"))?;
        self.insert_declaration(program, &range.induction)?;
        for bound_var in [range.lower_var(), range.upper_var(), range.step_var()] {
            if let Some(name) = bound_var {
                self.insert_declaration(program, name)?;
            }
        }
        Ok(wrapped)
    }

    /// Promote a plain variable argument to an array reference subscripted
    /// by the mapping variables.
    fn promote_argument(
        &self,
        program: &mut Program,
        arg_var: NodeId,
        clause: &MappingClause,
    ) -> LooptranResult<()> {
        let caller = self
            .caller_def
            .ok_or_else(|| LooptranError::internal("caller not located"))?;
        let var_type = program
            .arena
            .attr(arg_var, attr::TYPE)
            .unwrap_or_default()
            .to_string();
        let base_type = program
            .type_table()
            .get(&program.arena, &var_type)
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorKind::UnresolvedType,
                    self.name(),
                    format!("type '{}' not found in type table", var_type),
                    self.line,
                )
            })?;
        let dimensions = program.arena.attr_u32(base_type, attr::DIMENSIONS) as usize;
        if dimensions < clause.mapped_dimensions() {
            return Err(TransformError::new(
                TransformErrorKind::IllegalMapping,
                self.name(),
                format!("mapping dimensions too big, mapping {} is wrong", clause),
                self.line,
            )
            .into());
        }
        let element_type = program
            .arena
            .attr(base_type, attr::REF)
            .unwrap_or_default()
            .to_string();

        let array_ref = program.arena.alloc(NodeKind::ArrayRef);
        program.arena.node_mut(array_ref).set_attr(attr::TYPE, element_type);
        let var_ref = program.arena.alloc(NodeKind::VarRef);
        program.arena.node_mut(var_ref).set_attr(attr::TYPE, var_type);
        let base_clone = program.arena.clone_subtree(arg_var);
        program.arena.append(var_ref, base_clone)?;
        program.arena.append(array_ref, var_ref)?;

        for mapping_var in &clause.mapping {
            let index = program.arena.alloc(NodeKind::ArrayIndex);
            // The mapping variable is declared in the caller's scope.
            let decl = program
                .function_declarations(caller)
                .and_then(|decls| decls.get(&program.arena, &mapping_var.arg));
            let var_ty = decl
                .and_then(|d| program.arena.find(d, &NodeKind::Name))
                .and_then(|n| program.arena.attr(n, attr::TYPE))
                .unwrap_or_default()
                .to_string();
            let index_var =
                builder::typed_var(&mut program.arena, mapping_var.arg.clone(), var_ty, Scope::Local);
            program.arena.append(index, index_var)?;
            program.arena.append(array_ref, index)?;
        }
        program.arena.replace(arg_var, array_ref)
    }

    /// Rewrite the declaration of a mapped parameter inside the clone.
    fn demote_declaration(
        &self,
        program: &mut Program,
        clone: NodeId,
        fct_name: &str,
        clause: &MappingClause,
    ) -> LooptranResult<()> {
        let decls = match program.function_declarations(clone) {
            Some(decls) => decls,
            None => return Ok(()),
        };
        let decl = match decls.get(&program.arena, fct_name) {
            Some(decl) => decl,
            None => return Ok(()),
        };
        let decl_type_key = program
            .arena
            .find(decl, &NodeKind::Name)
            .and_then(|n| program.arena.attr(n, attr::TYPE))
            .unwrap_or_default()
            .to_string();
        let decl_type = program
            .type_table()
            .get(&program.arena, &decl_type_key)
            .ok_or_else(|| {
                TransformError::new(
                    TransformErrorKind::UnresolvedType,
                    self.name(),
                    format!("type '{}' not found in type table", decl_type_key),
                    self.line,
                )
            })?;
        let dimensions = program.arena.attr_u32(decl_type, attr::DIMENSIONS) as usize;
        let element_type = program
            .arena
            .attr(decl_type, attr::REF)
            .unwrap_or_default()
            .to_string();

        let new_type_key = if dimensions == clause.mapped_dimensions() {
            // Fully demoted: the declaration takes the element type.
            element_type
        } else {
            // Partially demoted: synthesize a reduced-rank type.
            let reduced_dims = (dimensions - clause.mapped_dimensions()) as u32;
            let type_table = program.type_table();
            let key = type_table.generate_function_type_hash(&program.arena);
            let reduced =
                builder::basic_type(&mut program.arena, key.clone(), element_type, reduced_dims);
            type_table.add(&mut program.arena, reduced, self.line)?;
            key
        };

        let new_decl = builder::var_decl(&mut program.arena, fct_name, new_type_key.clone());
        decls.replace(&mut program.arena, new_decl)?;
        if let Some(symbols) = program.function_symbols(clone) {
            if let Some(id) = symbols.get(&program.arena, fct_name) {
                program.arena.node_mut(id).set_attr(attr::TYPE, new_type_key);
            }
        }
        Ok(())
    }

    /// Replace array references over mapped parameters whose subscripts are
    /// exactly the mapping variables by their base variable.
    fn demote_body_references(&self, program: &mut Program, clone: NodeId) -> LooptranResult<()> {
        let body = match program.function_body(clone) {
            Some(body) => body,
            None => return Ok(()),
        };
        let references = program.arena.find_all(body, &NodeKind::ArrayRef);
        for array_ref in references {
            let base_var = match program
                .arena
                .node(array_ref)
                .children()
                .iter()
                .copied()
                .find(|&c| program.arena.kind(c) == &NodeKind::VarRef)
                .and_then(|var_ref| {
                    program
                        .arena
                        .node(var_ref)
                        .children()
                        .iter()
                        .copied()
                        .find(|&c| program.arena.kind(c) == &NodeKind::Var)
                }) {
                Some(var) => var,
                None => continue,
            };
            let base_name = match program.arena.text(base_var) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let clause = match self.fct_mapping.get(&base_name) {
                Some(&index) => &self.mappings[index],
                None => continue,
            };

            let mut mapping_index = 0;
            let mut demote = true;
            for child in program.arena.node(array_ref).children() {
                if program.arena.kind(*child) != &NodeKind::ArrayIndex {
                    continue;
                }
                let index_name = program
                    .arena
                    .find(*child, &NodeKind::Var)
                    .and_then(|v| program.arena.text(v));
                match (index_name, clause.mapping.get(mapping_index)) {
                    (Some(name), Some(mapping_var)) if name == mapping_var.fct => {
                        mapping_index += 1;
                    }
                    _ => {
                        demote = false;
                        break;
                    }
                }
            }
            if demote && mapping_index == clause.mapping.len() {
                let replacement = program.arena.clone_subtree(base_var);
                program.arena.insert_before(array_ref, replacement)?;
                program.arena.delete(array_ref);
            }
        }
        Ok(())
    }

    /// Insert the optional accelerator pragmas around the wrapped loop.
    fn insert_acc_pragmas(&self, program: &mut Program, wrapped: NodeId) -> LooptranResult<()> {
        if self.parallel {
            let start = builder::pragma(&mut program.arena, "acc parallel", 0);
            let end = builder::pragma(&mut program.arena, "acc end parallel", 0);
            program.arena.insert_after(self.pragma, start)?;
            program.arena.insert_after(wrapped, end)?;
            if let Some(option) = &self.acc_option {
                let extra = builder::pragma(&mut program.arena, format!("acc {}", option), 0);
                program.arena.insert_after(start, extra)?;
            }
        } else if let Some(option) = &self.acc_option {
            let extra = builder::pragma(&mut program.arena, format!("acc {}", option), 0);
            program.arena.insert_after(self.pragma, extra)?;
        }
        Ok(())
    }
}

impl Transformation for LoopExtraction {
    fn name(&self) -> &'static str {
        "loop-extract"
    }

    fn pragma(&self) -> Option<NodeId> {
        Some(self.pragma)
    }

    fn start_line(&self) -> u32 {
        self.line
    }

    fn group_label(&self) -> &str {
        &self.group
    }

    fn analyze(&mut self, program: &mut Program) -> bool {
        let expr_stmt = match program.arena.find_next(self.pragma, &NodeKind::ExprStatement) {
            Some(stmt) => stmt,
            None => {
                program.add_error("No function call detected after loop-extract", self.line);
                return false;
            }
        };
        let fct_call = match program.arena.find(expr_stmt, &NodeKind::FunctionCall) {
            Some(call) => call,
            None => {
                program.add_error("No function call detected after loop-extract", self.line);
                return false;
            }
        };
        let caller = match program
            .arena
            .find_parent(fct_call, &NodeKind::FunctionDefinition)
        {
            Some(caller) => caller,
            None => {
                program.add_error("No function around the function call", self.line);
                return false;
            }
        };
        let callee_name = program
            .arena
            .find(fct_call, &NodeKind::Name)
            .and_then(|n| program.arena.text(n))
            .map(|t| t.to_string());
        let callee = match callee_name
            .as_deref()
            .and_then(|name| program.find_function(name))
        {
            Some(callee) => callee,
            None => {
                program.add_error(
                    &format!(
                        "Could not locate the function definition for: {}",
                        callee_name.unwrap_or_default()
                    ),
                    self.line,
                );
                return false;
            }
        };

        self.expr_stmt = Some(expr_stmt);
        self.fct_call = Some(fct_call);
        self.caller_def = Some(caller);
        self.callee_def = Some(callee);

        if let Err(message) = self.locate_do_statement(program, callee) {
            program.add_error(message, self.line);
            return false;
        }

        // Every mapped variable must be an argument of the call.
        let mut args: Vec<&String> = self.arg_mapping.keys().collect();
        args.sort();
        for arg in args {
            if self.find_argument(program, arg).is_none() {
                program.add_error(
                    &format!("Mapped variable {} not found in function call arguments", arg),
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
        ctx: &mut TransformContext,
        _partner: Option<&dyn Transformation>,
    ) -> LooptranResult<()> {
        let fct_call = self
            .fct_call
            .ok_or_else(|| LooptranError::internal("loop-extract applied before analysis"))?;

        // Duplicate the called function under a fresh name and type.
        let (clone, new_name, new_hash) = self.clone_callee(program, ctx)?;

        // Hoist the loop body out of the clone and drop the loop header.
        let loop_in_clone = self.locate_do_statement(program, clone).map_err(|message| {
            TransformError::new(
                TransformErrorKind::NoMatchingLoop,
                self.name(),
                message,
                self.line,
            )
        })?;
        program.arena.extract_body(loop_in_clone)?;
        program.arena.delete(loop_in_clone);

        // Wrap the call with the extracted loop.
        let callee = self
            .callee_def
            .ok_or_else(|| LooptranError::internal("callee not located"))?;
        let source_loop = self.locate_do_statement(program, callee).map_err(|message| {
            TransformError::new(
                TransformErrorKind::NoMatchingLoop,
                self.name(),
                message,
                self.line,
            )
        })?;
        let wrapped = self.wrap_call_with_loop(program, source_loop)?;

        // Retarget the call to the clone.
        if let Some(call_name) = program.arena.find(fct_call, &NodeKind::Name) {
            program.arena.node_mut(call_name).text = Some(new_name);
            program.arena.node_mut(call_name).set_attr(attr::TYPE, new_hash);
        }

        // Adapt the mapped arguments and the clone's declarations.
        for clause_index in 0..self.mappings.len() {
            let clause = self.mappings[clause_index].clone();
            for var in &clause.mapped {
                let argument = match self.find_argument(program, &var.arg) {
                    Some(argument) => argument,
                    None => continue,
                };
                match program.arena.kind(argument).clone() {
                    NodeKind::Var => {
                        self.promote_argument(program, argument, &clause)?;
                    }
                    NodeKind::ArrayRef => {
                        return Err(TransformError::new(
                            TransformErrorKind::Unsupported,
                            self.name(),
                            format!(
                                "mapped array reference argument '{}' is not supported",
                                var.arg
                            ),
                            self.line,
                        )
                        .into());
                    }
                    _ => continue,
                }
                self.demote_declaration(program, clone, &var.fct, &clause)?;
            }
        }

        // Demote the matching array references inside the clone's body.
        self.demote_body_references(program, clone)?;

        // Optional accelerator wrap.
        self.insert_acc_pragmas(program, wrapped)?;

        // Optional fusion chaining on the wrapped loop.
        if self.fusion {
            ctx.add_transformation(
                "loop-fusion",
                Box::new(LoopFusion::from_loop(wrapped, &self.group, self.line)),
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

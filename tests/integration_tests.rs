//! Integration tests for the transformation pipeline.

use looptran::config::Configuration;
use looptran::ir::{builder, read_program, write_program, NodeKind, Program, Scope};
use looptran::prelude::*;
use looptran::utils::errors::{ConfigErrorKind, LooptranError, TransformErrorKind};

/// Serialized document: callee `f(a, n)` looping over `a(j)`, and a caller
/// invoking it under the given pragma.
fn extraction_document(pragma: &str) -> String {
    format!(
        r#"{{
  "kind": "XcodeProgram",
  "children": [
    {{"kind": "typeTable", "children": [
      {{"kind": "FbasicType", "attrs": {{"type": "Fint", "ref": "Fint", "dimensions": "0"}}}},
      {{"kind": "FbasicType", "attrs": {{"type": "A001", "ref": "Fint", "dimensions": "1"}}}},
      {{"kind": "FfunctionType", "attrs": {{"type": "F001", "return_type": "Fvoid"}}}},
      {{"kind": "FfunctionType", "attrs": {{"type": "F002", "return_type": "Fvoid"}}}}
    ]}},
    {{"kind": "globalSymbols", "children": [
      {{"kind": "id", "attrs": {{"type": "F001", "sclass": "ffunc"}},
       "children": [{{"kind": "name", "text": "f"}}]}}
    ]}},
    {{"kind": "globalDeclarations", "children": [
      {{"kind": "FfunctionDefinition", "attrs": {{"lineno": "1"}}, "children": [
        {{"kind": "name", "text": "f", "attrs": {{"type": "F001"}}}},
        {{"kind": "symbols", "children": [
          {{"kind": "id", "attrs": {{"type": "F001", "sclass": "ffunc"}},
           "children": [{{"kind": "name", "text": "f"}}]}},
          {{"kind": "id", "attrs": {{"type": "A001", "sclass": "fparam"}},
           "children": [{{"kind": "name", "text": "a"}}]}},
          {{"kind": "id", "attrs": {{"type": "Fint", "sclass": "fparam"}},
           "children": [{{"kind": "name", "text": "n"}}]}},
          {{"kind": "id", "attrs": {{"type": "Fint", "sclass": "flocal"}},
           "children": [{{"kind": "name", "text": "j"}}]}}
        ]}},
        {{"kind": "declarations", "children": [
          {{"kind": "varDecl", "children": [{{"kind": "name", "text": "a", "attrs": {{"type": "A001"}}}}]}},
          {{"kind": "varDecl", "children": [{{"kind": "name", "text": "n", "attrs": {{"type": "Fint"}}}}]}},
          {{"kind": "varDecl", "children": [{{"kind": "name", "text": "j", "attrs": {{"type": "Fint"}}}}]}}
        ]}},
        {{"kind": "body", "children": [
          {{"kind": "FdoStatement", "attrs": {{"lineno": "3"}}, "children": [
            {{"kind": "Var", "text": "j", "attrs": {{"scope": "local", "type": "Fint"}}}},
            {{"kind": "indexRange", "children": [
              {{"kind": "lowerBound", "children": [{{"kind": "FintConstant", "text": "1"}}]}},
              {{"kind": "upperBound", "children": [{{"kind": "Var", "text": "n", "attrs": {{"scope": "param", "type": "Fint"}}}}]}}
            ]}},
            {{"kind": "body", "children": [
              {{"kind": "FassignStatement", "children": [
                {{"kind": "FarrayRef", "attrs": {{"type": "Fint"}}, "children": [
                  {{"kind": "varRef", "attrs": {{"type": "A001"}},
                   "children": [{{"kind": "Var", "text": "a", "attrs": {{"scope": "param", "type": "A001"}}}}]}},
                  {{"kind": "arrayIndex", "children": [{{"kind": "Var", "text": "j", "attrs": {{"scope": "local", "type": "Fint"}}}}]}}
                ]}},
                {{"kind": "Var", "text": "n", "attrs": {{"scope": "param", "type": "Fint"}}}}
              ]}}
            ]}}
          ]}}
        ]}}
      ]}},
      {{"kind": "FfunctionDefinition", "attrs": {{"lineno": "8"}}, "children": [
        {{"kind": "name", "text": "main", "attrs": {{"type": "F002"}}}},
        {{"kind": "symbols", "children": [
          {{"kind": "id", "attrs": {{"type": "A001", "sclass": "flocal"}},
           "children": [{{"kind": "name", "text": "a"}}]}},
          {{"kind": "id", "attrs": {{"type": "Fint", "sclass": "flocal"}},
           "children": [{{"kind": "name", "text": "n"}}]}}
        ]}},
        {{"kind": "declarations", "children": [
          {{"kind": "varDecl", "children": [{{"kind": "name", "text": "a", "attrs": {{"type": "A001"}}}}]}},
          {{"kind": "varDecl", "children": [{{"kind": "name", "text": "n", "attrs": {{"type": "Fint"}}}}]}}
        ]}},
        {{"kind": "body", "children": [
          {{"kind": "FpragmaStatement", "text": "{pragma}", "attrs": {{"lineno": "10"}}}},
          {{"kind": "exprStatement", "attrs": {{"lineno": "11"}}, "children": [
            {{"kind": "functionCall", "children": [
              {{"kind": "name", "text": "f", "attrs": {{"type": "F001"}}}},
              {{"kind": "arguments", "children": [
                {{"kind": "Var", "text": "a", "attrs": {{"scope": "local", "type": "A001"}}}},
                {{"kind": "Var", "text": "n", "attrs": {{"scope": "local", "type": "Fint"}}}}
              ]}}
            ]}}
          ]}}
        ]}}
      ]}}
    ]}}
  ]
}}"#,
        pragma = pragma
    )
}

/// Program with `count` fusable pragma/loop pairs printing distinct
/// variables.
fn fusion_program(count: usize) -> (Program, looptran::ir::NodeId) {
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
        let print_stmt = program.arena.alloc(NodeKind::ExprStatement);
        let var = builder::var(&mut program.arena, format!("x{}", index), Scope::Local);
        program.arena.append(print_stmt, var).unwrap();
        program.arena.append(loop_body, print_stmt).unwrap();
        program.arena.append(body, pragma).unwrap();
        program.arena.append(body, do_stmt).unwrap();
    }
    program.arena.append(fct, body).unwrap();
    let globals = program.global_declarations();
    program.arena.append(globals, fct).unwrap();
    (program, body)
}

#[test]
fn test_three_contiguous_loops_fuse_into_one() {
    let (mut program, body) = fusion_program(3);
    looptran::translate(&mut program, &Configuration::builtin()).unwrap();

    let loops = program.arena.find_all(body, &NodeKind::DoStatement);
    assert_eq!(loops.len(), 1);
    let range = IterationRange::of(&program.arena, loops[0]).unwrap();
    assert_eq!(range.induction, "i");
    assert_eq!(range.lower, "1");
    assert_eq!(range.upper, "2");

    let fused_body = builder::body_of(&program.arena, loops[0]).unwrap();
    let printed: Vec<&str> = program
        .arena
        .node(fused_body)
        .children()
        .iter()
        .map(|&stmt| {
            let var = program.arena.find(stmt, &NodeKind::Var).unwrap();
            program.arena.text(var).unwrap()
        })
        .collect();
    assert_eq!(printed, vec!["x0", "x1", "x2"]);
    assert!(program.errors().is_empty());
}

#[test]
fn test_loop_extract_with_mapping() {
    let document = extraction_document("claw loop-extract range(j=1:n) map(a:j)");
    let program = looptran::translate_document(&document, &Configuration::builtin()).unwrap();
    assert!(program.errors().is_empty());

    // The clone exists, lost its loop and declares `a` as a scalar.
    let clone = program.find_function("f_extracted_1").unwrap();
    let clone_body = program.function_body(clone).unwrap();
    assert!(program.arena.find(clone_body, &NodeKind::DoStatement).is_none());
    assert!(program.arena.find(clone_body, &NodeKind::ArrayRef).is_none());
    let clone_decls = program.function_declarations(clone).unwrap();
    let a_decl = clone_decls.get(&program.arena, "a").unwrap();
    let a_name = program.arena.find(a_decl, &NodeKind::Name).unwrap();
    assert_eq!(program.arena.attr(a_name, "type"), Some("Fint"));

    // The caller wraps the retargeted call in `do j=1,n`.
    let caller = program.find_function("main").unwrap();
    let caller_body = program.function_body(caller).unwrap();
    let wrapped = program
        .arena
        .find(caller_body, &NodeKind::DoStatement)
        .unwrap();
    let range = IterationRange::of(&program.arena, wrapped).unwrap();
    assert_eq!(range.induction, "j");
    assert_eq!(range.upper, "n");
    let call = program.arena.find(wrapped, &NodeKind::FunctionCall).unwrap();
    let call_name = program.arena.find(call, &NodeKind::Name).unwrap();
    assert_eq!(program.arena.text(call_name), Some("f_extracted_1"));

    // The argument was promoted to a(j).
    let args = program.arena.find(call, &NodeKind::Arguments).unwrap();
    let first = program.arena.node(args).children()[0];
    assert_eq!(program.arena.kind(first), &NodeKind::ArrayRef);
    let index = program.arena.find(first, &NodeKind::ArrayIndex).unwrap();
    let index_var = program.arena.find(index, &NodeKind::Var).unwrap();
    assert_eq!(program.arena.text(index_var), Some("j"));
}

#[test]
fn test_loop_extract_with_parallel_option() {
    let document = extraction_document("claw loop-extract range(j=1:n) map(a:j) parallel");
    let program = looptran::translate_document(&document, &Configuration::builtin()).unwrap();

    let caller = program.find_function("main").unwrap();
    let body = program.function_body(caller).unwrap();
    let children = program.arena.node(body).children().to_vec();
    let loop_pos = children
        .iter()
        .position(|&c| program.arena.kind(c) == &NodeKind::DoStatement)
        .unwrap();
    assert_eq!(program.arena.text(children[loop_pos - 1]), Some("acc parallel"));
    assert_eq!(
        program.arena.text(children[loop_pos + 1]),
        Some("acc end parallel")
    );
}

#[test]
fn test_mapping_on_scalar_argument_is_fatal() {
    let document = extraction_document("claw loop-extract range(j=1:n) map(n:j)");
    let err = looptran::translate_document(&document, &Configuration::builtin()).unwrap_err();
    match err {
        LooptranError::Transform(e) => {
            assert_eq!(e.kind, TransformErrorKind::IllegalMapping);
            // The diagnostic carries the pragma's line number.
            assert_eq!(e.line, 10);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_unknown_callee_is_discarded_and_others_proceed() {
    let (mut program, body) = fusion_program(2);
    // An extraction whose callee does not exist, ahead of the fusable loops.
    let pragma = builder::pragma(
        &mut program.arena,
        "claw loop-extract range(j=1:n)",
        5,
    );
    let expr = program.arena.alloc(NodeKind::ExprStatement);
    let call = program.arena.alloc(NodeKind::FunctionCall);
    let call_name = builder::name(&mut program.arena, "ghost", "F009");
    program.arena.append(call, call_name).unwrap();
    let args = program.arena.alloc(NodeKind::Arguments);
    program.arena.append(call, args).unwrap();
    program.arena.append(expr, call).unwrap();
    let first = program.arena.node(body).children()[0];
    program.arena.insert_before(first, expr).unwrap();
    program.arena.insert_before(expr, pragma).unwrap();

    looptran::translate(&mut program, &Configuration::builtin()).unwrap();

    assert_eq!(program.errors().len(), 1);
    assert!(program.errors()[0]
        .message
        .contains("Could not locate the function definition for: ghost"));
    assert_eq!(program.errors()[0].lines, vec![5]);
    // The fusion still went through.
    assert_eq!(program.arena.find_all(body, &NodeKind::DoStatement).len(), 1);
}

#[test]
fn test_configuration_version_mismatch_fails_before_transforming() {
    let set = r#"{
        "transformations": [
            {"name": "loop-fusion", "class": "looptran::engine::fusion::LoopFusion",
             "type": "dependent", "trigger": "directive"}
        ]
    }"#;
    let root = r#"{
        "version": "0.1.0",
        "global": {"type": "root"},
        "sets": ["standard"],
        "groups": [{"set": "standard", "name": "loop-fusion"}]
    }"#;
    let err = Configuration::from_documents(
        Some(root),
        None,
        &|_| Some(set.to_string()),
        looptran::VERSION,
    )
    .unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::VersionMismatch);
}

#[test]
fn test_pipeline_without_recognized_pragmas_is_identity() {
    let document = extraction_document("omp parallel do");
    let untouched = read_program(&document).unwrap();
    let transformed =
        looptran::translate_document(&document, &Configuration::builtin()).unwrap();
    assert_eq!(write_program(&untouched), write_program(&transformed));
    assert!(transformed.errors().is_empty());
    assert!(transformed.warnings().is_empty());
}

#[test]
fn test_extraction_fusion_chaining() {
    // Two extractions chained into the same fusion group end up as a
    // single loop carrying both retargeted calls.
    let document = extraction_document("claw loop-extract range(j=1:n) map(a:j) fusion group(g)");
    let mut program = read_program(&document).unwrap();

    // Duplicate the pragma+call pair so two extractions run.
    let caller = program.find_function("main").unwrap();
    let body = program.function_body(caller).unwrap();
    let children = program.arena.node(body).children().to_vec();
    let (pragma, expr) = (children[0], children[1]);
    let pragma_copy = program.arena.clone_subtree(pragma);
    let expr_copy = program.arena.clone_subtree(expr);
    program.arena.append(body, pragma_copy).unwrap();
    program.arena.append(body, expr_copy).unwrap();

    looptran::translate(&mut program, &Configuration::builtin()).unwrap();

    let caller = program.find_function("main").unwrap();
    let body = program.function_body(caller).unwrap();
    let loops = program.arena.find_all(body, &NodeKind::DoStatement);
    assert_eq!(loops.len(), 1);
    let calls = program.arena.find_all(loops[0], &NodeKind::FunctionCall);
    let names: Vec<&str> = calls
        .iter()
        .map(|&call| {
            let name = program.arena.find(call, &NodeKind::Name).unwrap();
            program.arena.text(name).unwrap()
        })
        .collect();
    assert_eq!(names, vec!["f_extracted_1", "f_extracted_2"]);
    assert!(program.find_function("f_extracted_1").is_some());
    assert!(program.find_function("f_extracted_2").is_some());
    assert!(program.errors().is_empty());
}

#[test]
fn test_chaining_into_an_earlier_group_is_dropped_with_warning() {
    // A configuration placing the fusion group before the extraction
    // group: fusions chained by the extractions cannot participate and
    // must be dropped with a warning, not lost silently.
    let set = r#"{
        "transformations": [
            {"name": "loop-fusion", "class": "looptran::engine::fusion::LoopFusion",
             "type": "dependent", "trigger": "directive"},
            {"name": "loop-extract", "class": "looptran::engine::extraction::LoopExtraction",
             "type": "independent", "trigger": "directive"}
        ]
    }"#;
    let root = r#"{
        "version": "0.9.0",
        "global": {"type": "root"},
        "sets": ["standard"],
        "groups": [
            {"set": "standard", "name": "loop-fusion"},
            {"set": "standard", "name": "loop-extract"}
        ]
    }"#;
    let config = Configuration::from_documents(
        Some(root),
        None,
        &|_| Some(set.to_string()),
        looptran::VERSION,
    )
    .unwrap();

    let document = extraction_document("claw loop-extract range(j=1:n) map(a:j) fusion group(g)");
    let mut program = read_program(&document).unwrap();
    let caller = program.find_function("main").unwrap();
    let body = program.function_body(caller).unwrap();
    let children = program.arena.node(body).children().to_vec();
    let (pragma, expr) = (children[0], children[1]);
    let pragma_copy = program.arena.clone_subtree(pragma);
    let expr_copy = program.arena.clone_subtree(expr);
    program.arena.append(body, pragma_copy).unwrap();
    program.arena.append(body, expr_copy).unwrap();

    looptran::translate(&mut program, &config).unwrap();

    // Both extractions ran, but their chained fusions were dropped: the
    // two wrapped loops stay separate.
    let caller = program.find_function("main").unwrap();
    let body = program.function_body(caller).unwrap();
    assert_eq!(program.arena.find_all(body, &NodeKind::DoStatement).len(), 2);
    assert!(program.find_function("f_extracted_1").is_some());
    assert!(program.find_function("f_extracted_2").is_some());
    assert!(program.errors().is_empty());
    assert_eq!(program.warnings().len(), 2);
    for warning in program.warnings() {
        assert!(warning.message.contains("applies before its origin"));
        assert_eq!(warning.lines, vec![10]);
    }
}

#[test]
fn test_type_table_keys_stay_unique_across_extractions() {
    let document = extraction_document("claw loop-extract range(j=1:n) map(a:j)");
    let program = looptran::translate_document(&document, &Configuration::builtin()).unwrap();
    let keys = program.type_table().keys(&program.arena);
    let unique: std::collections::HashSet<&String> = keys.iter().collect();
    assert_eq!(keys.len(), unique.len());

    // Every type attribute on a name or variable resolves in the table.
    let root = program.root();
    for kind in [NodeKind::Name, NodeKind::Var] {
        for node in program.arena.find_all(root, &kind) {
            if let Some(ty) = program.arena.attr(node, "type") {
                assert!(
                    program.type_table().get(&program.arena, ty).is_some(),
                    "type '{}' does not resolve",
                    ty
                );
            }
        }
    }
}

#[test]
fn test_remove_block_end_to_end() {
    let (mut program, body) = fusion_program(0);
    let start = builder::pragma(&mut program.arena, "claw remove", 1);
    let stmt = program.arena.alloc(NodeKind::ExprStatement);
    let end = builder::pragma(&mut program.arena, "claw end remove", 3);
    let keep = program.arena.alloc(NodeKind::AssignStatement);
    for node in [start, stmt, end, keep] {
        program.arena.append(body, node).unwrap();
    }
    looptran::translate(&mut program, &Configuration::builtin()).unwrap();
    assert_eq!(program.arena.node(body).children(), &[keep]);
}

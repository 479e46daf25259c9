use crate::{
    config::TranslatorConfig,
    frontend::ast::{
        builder::{test_loc, ProgramBuilder},
        BinaryOperator, Constant, Entity, EntityKind, NodeKind,
    },
    midend::{
        ir::{BlockId, BlockKind, ControlFlowGraph, Instruction, TypeRef, ValueId},
        lexical::Access,
        linearizer::{translate, Position, TranslatedEntity, Translation, TranslationError},
        symtab::SymbolError,
    },
};

fn translate_with(builder: ProgramBuilder, config: TranslatorConfig) -> Translation {
    translate(&builder.finish(), &config).unwrap()
}

fn translate_default(builder: ProgramBuilder) -> Translation {
    translate_with(builder, TranslatorConfig::default())
}

fn entity<'t>(translation: &'t Translation, name: &str) -> &'t TranslatedEntity {
    translation.entity(name).unwrap()
}

fn count(cfg: &ControlFlowGraph, predicate: impl Fn(&Instruction) -> bool) -> usize {
    cfg.find_instructions(predicate).len()
}

fn block_holding(cfg: &ControlFlowGraph, predicate: impl Fn(&Instruction) -> bool) -> BlockId {
    let index = cfg.find_instructions(predicate)[0];
    cfg.block_of(index).unwrap()
}

#[test]
fn straight_line_code_has_one_entry_and_one_exit() {
    let mut builder = ProgramBuilder::new();
    let one = builder.int(1);
    let decl = builder.decl("x", Some(one));
    let read = builder.var("x");
    let echo = builder.echo(vec![read]);
    let body = builder.block(vec![decl, echo]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let cfg = &main.cfg;

    assert_eq!(cfg.block_count(), 3);
    assert_eq!(cfg.blocks()[0].kind, BlockKind::Entry);
    assert_eq!(cfg.exit(), BlockId::new(2));
    assert_eq!(cfg.exit_block().map(|block| block.kind), Some(BlockKind::Exit));
    assert!(cfg.reachable_from_entry().contains(&cfg.exit()));
    assert_eq!(cfg.blocks()[1].range, Some((0, 1)));
    assert!(cfg.blocks()[1].normal_successors.contains(&cfg.exit()));

    let x = main.value_named("x").unwrap();
    assert_eq!(
        cfg.instruction(0),
        Some(&Instruction::Assign {
            dest: x,
            source: main.constant_value(&Constant::Int(1)).unwrap(),
        })
    );
    assert_eq!(cfg.instruction(1), Some(&Instruction::Echo { values: vec![x] }));
}

#[test]
fn loop_header_branches_to_body_and_exit() {
    let mut builder = ProgramBuilder::new();
    let zero = builder.int(0);
    let decl = builder.decl("i", Some(zero));
    let i = builder.var("i");
    let ten = builder.int(10);
    let condition = builder.binary(BinaryOperator::Lt, i, ten);
    let i = builder.var("i");
    let one = builder.int(1);
    let increment = builder.binary(BinaryOperator::Add, i, one);
    let update = builder.assign_var("i", increment);
    let body = builder.block(vec![update]);
    let loop_ = builder.loop_(condition, body);
    let script = builder.block(vec![decl, loop_]);
    builder.script("main", script);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let header = block_holding(cfg, |instruction| {
        matches!(instruction, Instruction::ConditionalBranch { .. })
    });
    let header_block = cfg.block(header).unwrap();
    assert_eq!(header_block.normal_successors.len(), 2);
    assert!(header_block.normal_successors.contains(&cfg.exit()));

    let back_edge = block_holding(cfg, |instruction| matches!(instruction, Instruction::Goto { .. }));
    assert!(cfg.block(back_edge).unwrap().normal_successors.contains(&header));
    let exit = cfg.exit();
    assert_eq!(
        count(cfg, |instruction| matches!(
            instruction,
            Instruction::ConditionalBranch { target: Some(target), .. } if *target == exit
        )),
        1
    );
}

#[test]
fn endless_loop_keeps_an_exit_nothing_reaches() {
    let mut builder = ProgramBuilder::new();
    let top = builder.label("top");
    let message = builder.string("again");
    let echo = builder.echo(vec![message]);
    let back = builder.goto_(top);
    let body = builder.block(vec![top, echo, back]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let exit = cfg.exit_block().unwrap();
    assert_eq!(exit.predecessors().count(), 0);
    let reachable = cfg.reachable_from_entry();
    assert!(!reachable.contains(&exit.id));
    assert_eq!(reachable.len(), cfg.block_count() - 1);

    let looping = block_holding(cfg, |instruction| matches!(instruction, Instruction::Goto { .. }));
    assert!(cfg.block(looping).unwrap().normal_successors.contains(&looping));
}

#[test]
fn if_else_arms_join_after_both() {
    let mut builder = ProgramBuilder::new();
    let one = builder.int(1);
    let decl = builder.decl("c", Some(one));
    let condition = builder.var("c");
    let first = builder.string("yes");
    let then = builder.echo(vec![first]);
    let second = builder.string("no");
    let otherwise = builder.echo(vec![second]);
    let if_ = builder.if_(condition, then, Some(otherwise));
    let body = builder.block(vec![decl, if_]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let branch = block_holding(cfg, |instruction| {
        matches!(instruction, Instruction::ConditionalBranch { .. })
    });
    assert_eq!(cfg.block(branch).unwrap().normal_successors.len(), 2);
    assert_eq!(cfg.exit_block().unwrap().normal_predecessors.len(), 2);
    assert_eq!(count(cfg, |instruction| matches!(instruction, Instruction::Echo { .. })), 2);
}

#[test]
fn if_expression_assigns_its_result_in_each_arm() {
    let mut builder = ProgramBuilder::new();
    let condition = builder.bool(true);
    let then = builder.int(1);
    let otherwise = builder.int(2);
    let if_expr = builder.if_expr(condition, then, Some(otherwise));
    let decl = builder.decl("r", Some(if_expr));
    builder.script("main", decl);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let r = main.value_named("r").unwrap();
    let assigned = count(&main.cfg, |instruction| {
        matches!(instruction, Instruction::Assign { dest, .. } if *dest == r)
    });
    assert_eq!(assigned, 2);
}

#[test]
fn integral_switch_becomes_a_dense_table() {
    let mut builder = ProgramBuilder::new();
    let two = builder.int(2);
    let decl = builder.decl("x", Some(two));
    let value = builder.var("x");

    let mut cases = Vec::new();
    let mut statements = Vec::new();
    for (case, text) in [(1, "one"), (2, "two"), (3, "three")] {
        let case = builder.int(case);
        let label = builder.label(text);
        let message = builder.string(text);
        let echo = builder.echo(vec![message]);
        cases.push((case, label));
        statements.extend([label, echo]);
    }
    let default = builder.label("default");
    let message = builder.string("other");
    let echo = builder.echo(vec![message]);
    statements.extend([default, echo]);

    let body = builder.block(statements);
    let switch = builder.switch(value, body, &cases, Some(default));
    let script = builder.block(vec![decl, switch]);
    builder.script("main", script);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let switches = cfg.find_instructions(|instruction| matches!(instruction, Instruction::Switch { .. }));
    assert_eq!(switches.len(), 1);
    let Some(Instruction::Switch { cases, default, .. }) = cfg.instruction(switches[0]) else {
        panic!("expected a switch");
    };
    let labels: Vec<i64> = cases.iter().map(|(label, _)| *label).collect();
    assert_eq!(labels, vec![1, 2, 3]);
    assert!(default.is_some());

    let switch_block = cfg.block_of(switches[0]).unwrap();
    let successors = &cfg.block(switch_block).unwrap().normal_successors;
    for (_, target) in cases {
        assert!(successors.contains(target));
    }
    assert_eq!(count(cfg, |instruction| matches!(instruction, Instruction::ConditionalBranch { .. })), 0);
}

#[test]
fn non_integral_switch_becomes_a_chain_of_branches() {
    let mut builder = ProgramBuilder::new();
    let value = builder.string("b");
    let first_case = builder.string("a");
    let first_label = builder.label("a");
    let second_case = builder.string("b");
    let second_label = builder.label("b");
    let message = builder.string("matched");
    let echo = builder.echo(vec![message]);
    let body = builder.block(vec![first_label, second_label, echo]);
    let switch = builder.switch(
        value,
        body,
        &[(first_case, first_label), (second_case, second_label)],
        None,
    );
    builder.script("main", switch);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    assert_eq!(count(cfg, |instruction| matches!(instruction, Instruction::Switch { .. })), 0);
    assert_eq!(
        count(cfg, |instruction| matches!(instruction, Instruction::ConditionalBranch { .. })),
        2
    );
}

fn echo_of(main: &TranslatedEntity, text: &str) -> Vec<BlockId> {
    let Some(value) = main.constant_value(&Constant::Str(text.into())) else {
        return Vec::new();
    };
    main.cfg
        .find_instructions(|instruction| {
            matches!(instruction, Instruction::Echo { values } if values == &vec![value])
        })
        .into_iter()
        .filter_map(|index| main.cfg.block_of(index))
        .collect()
}

#[test]
fn return_inside_protected_region_runs_a_copy_of_the_cleanup() {
    let mut builder = ProgramBuilder::new();
    let one = builder.int(1);
    let decl = builder.decl("c", Some(one));
    let condition = builder.var("c");
    let result = builder.int(1);
    let return_ = builder.return_(Some(result));
    let if_ = builder.if_(condition, return_, None);
    let message = builder.string("done");
    let cleanup = builder.echo(vec![message]);
    let unwind = builder.unwind(if_, cleanup);
    let body = builder.block(vec![decl, unwind]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let cfg = &main.cfg;

    let cleanups = echo_of(main, "done");
    assert_eq!(cleanups.len(), 2);

    let returning = block_holding(cfg, |instruction| matches!(instruction, Instruction::Return { .. }));
    let successors = &cfg.block(returning).unwrap().normal_successors;
    assert_eq!(successors.len(), 1);
    let copy = successors[0];
    assert_ne!(copy, cfg.exit());
    assert!(cleanups.contains(&copy));
    assert!(cfg.block(copy).unwrap().normal_successors.contains(&cfg.exit()));
}

#[test]
fn each_way_out_of_a_protected_region_gets_its_own_cleanup() {
    let mut builder = ProgramBuilder::new();
    let one = builder.int(1);
    let decl = builder.decl("c", Some(one));
    let out = builder.label("out");
    let condition = builder.var("c");
    let leave = builder.if_goto(None, condition, None, out);
    let result = builder.int(1);
    let return_ = builder.return_(Some(result));
    let protected = builder.block(vec![leave, return_]);
    let message = builder.string("done");
    let cleanup = builder.echo(vec![message]);
    let unwind = builder.unwind(protected, cleanup);
    let after = builder.string("after");
    let echo = builder.echo(vec![after]);
    let body = builder.block(vec![decl, unwind, out, echo]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let cfg = &main.cfg;

    let cleanups = echo_of(main, "done");
    assert_eq!(cleanups.len(), 2);
    assert_ne!(cleanups[0], cleanups[1]);

    let branch = block_holding(cfg, |instruction| {
        matches!(instruction, Instruction::ConditionalBranch { .. })
    });
    assert!(cleanups
        .iter()
        .any(|cleanup| cfg.block(branch).unwrap().normal_successors.contains(cleanup)));
    assert_eq!(echo_of(main, "after").len(), 1);
}

#[test]
fn captured_variables_go_through_the_lexical_mechanism() {
    let mut builder = ProgramBuilder::new();
    let read = builder.var("x");
    let inner_body = builder.return_(Some(read));
    let inner = builder.function_entity("inner", &[], inner_body);
    let one = builder.int(1);
    let decl = builder.decl("x", Some(one));
    let statement = builder.function_stmt(inner);
    let body = builder.block(vec![decl, statement]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let inner = entity(&translation, "main/inner");

    let x = main.value_named("x").unwrap();
    assert_eq!(
        count(&main.cfg, |instruction| {
            instruction
                == &Instruction::LexicalWrite {
                    accesses: vec![Access::new("x", Some("main"), x)],
                }
        }),
        1
    );
    assert_eq!(main.lexical.exit_use_of("x", "main"), Some(x));
    assert!(!main.lexical.is_read_only("x"));

    assert_eq!(
        count(&inner.cfg, |instruction| matches!(
            instruction,
            Instruction::LexicalRead { accesses }
                if accesses.len() == 1 && accesses[0].definer.as_deref() == Some("main")
        )),
        1
    );
    assert_eq!(inner.lexical.scoping_parents(), &["main".to_string()]);
    assert_eq!(inner.lexical.exit_use_of("x", "main"), None);

    assert_eq!(
        count(&main.cfg, |instruction| matches!(
            instruction,
            Instruction::MaterializeFunction { entity, .. } if entity == "main/inner"
        )),
        1
    );
    assert_eq!(
        count(&main.cfg, |instruction| matches!(
            instruction,
            Instruction::GlobalWrite { name, .. } if name == "inner"
        )),
        1
    );
    assert!(translation.globals.contains(&"inner".to_string()));
}

#[test]
fn exposed_parameters_are_written_on_entry() {
    let mut builder = ProgramBuilder::new();
    let read = builder.var("a");
    let inner_body = builder.return_(Some(read));
    let inner = builder.function_entity("inner", &[], inner_body);
    let function = builder.function(inner);
    let outer_body = builder.return_(Some(function));
    let outer = builder.function_entity("outer", &["a"], outer_body);
    let statement = builder.function_stmt(outer);
    builder.script("main", statement);

    let translation = translate_default(builder);
    let outer = entity(&translation, "main/outer");
    assert_eq!(outer.parameter_count, 2);
    assert_eq!(
        outer.cfg.instruction(0),
        Some(&Instruction::LexicalWrite {
            accesses: vec![Access::new("a", Some("main/outer"), ValueId::new(2))],
        })
    );
    assert_eq!(outer.lexical.exit_use_of("a", "main/outer"), Some(ValueId::new(2)));
    assert!(!outer.lexical.is_read_only("a"));
    assert_eq!(
        translation.entities.keys().collect::<Vec<_>>(),
        vec!["main/outer/inner", "main/outer", "main"]
    );
}

#[test]
fn same_named_functions_in_different_parents_are_kept_apart() {
    let mut builder = ProgramBuilder::new();
    let global = builder.var("x");
    let first_body = builder.return_(Some(global));
    let first_helper = builder.function_entity("helper", &[], first_body);
    let first_statement = builder.function_stmt(first_helper);
    let a = builder.function_entity("a", &[], first_statement);

    let decl = builder.decl("y", None);
    let captured = builder.var("y");
    let second_body = builder.return_(Some(captured));
    let second_helper = builder.function_entity("helper", &[], second_body);
    let second_statement = builder.function_stmt(second_helper);
    let b_body = builder.block(vec![decl, second_statement]);
    let b = builder.function_entity("b", &[], b_body);

    let a_statement = builder.function_stmt(a);
    let b_statement = builder.function_stmt(b);
    let body = builder.block(vec![a_statement, b_statement]);
    builder.script("main", body);

    let translation = translate_default(builder);
    assert_eq!(
        translation.entities.keys().collect::<Vec<_>>(),
        vec!["main/a/helper", "main/a", "main/b/helper", "main/b", "main"]
    );

    let lexical_reads = |entity: &TranslatedEntity| {
        count(&entity.cfg, |instruction| matches!(instruction, Instruction::LexicalRead { .. }))
    };
    assert_eq!(lexical_reads(entity(&translation, "main/a/helper")), 0);

    let helper = entity(&translation, "main/b/helper");
    assert_eq!(lexical_reads(helper), 1);
    assert_eq!(helper.lexical.scoping_parents(), &["main/b".to_string()]);
    assert_eq!(
        count(&entity(&translation, "main/b").cfg, |instruction| matches!(
            instruction,
            Instruction::MaterializeFunction { entity, .. } if entity == "main/b/helper"
        )),
        1
    );
}

#[test]
fn chained_assignment_initializer_gets_its_own_slot() {
    let mut builder = ProgramBuilder::new();
    let b_decl = builder.decl("b", None);
    let call = builder.call_var("f", vec![]);
    let c_decl = builder.decl("c", Some(call));
    let c = builder.var("c");
    let chained = builder.assign_var("b", c);
    let a_decl = builder.decl("a", Some(chained));
    let body = builder.block(vec![b_decl, c_decl, a_decl]);
    builder.script("main", body);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let a = main.value_named("a").unwrap();
    let b = main.value_named("b").unwrap();
    let c = main.value_named("c").unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);

    for dest in [a, b] {
        assert_eq!(
            count(&main.cfg, |instruction| instruction
                == &Instruction::Assign { dest, source: c }),
            1
        );
    }
}

#[test]
fn local_values_mode_refreshes_captured_slots_after_calls() {
    let mut builder = ProgramBuilder::new();
    let call = builder.call_var("g", vec![]);
    let read = builder.var("x");
    let return_ = builder.return_(Some(read));
    let inner_body = builder.block(vec![call, return_]);
    let inner = builder.function_entity("inner", &[], inner_body);
    let one = builder.int(1);
    let decl = builder.decl("x", Some(one));
    let statement = builder.function_stmt(inner);
    let body = builder.block(vec![decl, statement]);
    builder.script("main", body);

    let config = TranslatorConfig {
        local_values_for_lexical_vars: true,
        ..TranslatorConfig::default()
    };
    let translation = translate_with(builder, config);
    let inner = entity(&translation, "main/inner");
    let x = inner.value_named("x").unwrap();
    let expected = vec![Access::new("x", Some("main"), x)];

    assert_eq!(
        count(&inner.cfg, |instruction| instruction
            == &Instruction::LexicalRead {
                accesses: expected.clone(),
            }),
        2
    );
    assert_eq!(
        count(&entity(&translation, "main").cfg, |instruction| matches!(
            instruction,
            Instruction::LexicalWrite { .. }
        )),
        0
    );
}

#[test]
fn catch_clauses_become_handler_blocks() {
    let mut builder = ProgramBuilder::new();
    let call = builder.call_var("f", vec![]);
    let try_body = builder.block(vec![call]);
    let caught = builder.var("e");
    let handler = builder.echo(vec![caught]);
    let catch = builder.catch("e", handler);
    builder.throws_to(call, catch, "Error");
    builder.node_type(catch, "Error");
    let try_ = builder.try_(try_body, catch);
    builder.script("main", try_);

    let translation = translate_default(builder);
    let main = entity(&translation, "main");
    let cfg = &main.cfg;

    let handlers: Vec<BlockId> = cfg.handler_blocks().map(|block| block.id).collect();
    assert_eq!(handlers.len(), 1);
    assert_eq!(
        main.catch_types.get(&handlers[0]),
        Some(&vec![TypeRef::new("Error")])
    );

    let calling = block_holding(cfg, |instruction| matches!(instruction, Instruction::Call { .. }));
    assert!(cfg.block(calling).unwrap().exceptional_successors.contains(&handlers[0]));
    assert!(matches!(
        cfg.instructions_of(handlers[0]).first(),
        Some(Some(Instruction::GetCaughtException { block, .. })) if *block == handlers[0]
    ));
    assert!(translation.diagnostics.is_empty());
}

#[test]
fn calls_reach_every_catch_that_may_take_their_exception() {
    let mut builder = ProgramBuilder::new();
    let call = builder.call_var("f", vec![]);
    let inner_body = builder.block(vec![call]);
    let inner_caught = builder.var("e");
    let inner_handler = builder.echo(vec![inner_caught]);
    let inner_catch = builder.catch("e", inner_handler);
    builder.throws_to(call, inner_catch, "TypeError");
    builder.node_type(inner_catch, "TypeError");
    let inner_try = builder.try_(inner_body, inner_catch);

    let outer_caught = builder.var("x");
    let outer_handler = builder.echo(vec![outer_caught]);
    let outer_catch = builder.catch("x", outer_handler);
    builder.throws_to(call, outer_catch, "Error");
    builder.node_type(outer_catch, "Error");
    let outer_try = builder.try_(inner_try, outer_catch);
    builder.script("main", outer_try);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let handlers: Vec<BlockId> = cfg.handler_blocks().map(|block| block.id).collect();
    assert_eq!(handlers.len(), 2);
    let calling = block_holding(cfg, |instruction| matches!(instruction, Instruction::Call { .. }));
    let exceptional = &cfg.block(calling).unwrap().exceptional_successors;
    for handler in &handlers {
        assert!(exceptional.contains(handler));
    }
    assert!(translation.diagnostics.is_empty());
}

#[test]
fn catch_without_incoming_edges_is_reported() {
    let mut builder = ProgramBuilder::new();
    let one = builder.int(1);
    let echo = builder.echo(vec![one]);
    let caught = builder.var("e");
    let handler = builder.echo(vec![caught]);
    let catch = builder.catch("e", handler);
    let try_ = builder.try_(echo, catch);
    builder.script("main", try_);

    let translation = translate_default(builder);
    assert_eq!(translation.diagnostics.len(), 1);
    assert_eq!(translation.diagnostics[0].message, "dead catch block");
    assert_eq!(entity(&translation, "main").cfg.handler_blocks().count(), 0);
}

#[test]
fn faulting_division_gets_an_exceptional_exit_edge() {
    let mut builder = ProgramBuilder::new();
    let left = builder.int(1);
    let right = builder.int(0);
    let division = builder.binary(BinaryOperator::Div, left, right);
    builder.throws_to_exit(division, "ArithmeticError");
    let decl = builder.decl("q", Some(division));
    builder.script("main", decl);

    let translation = translate_default(builder);
    let cfg = &entity(&translation, "main").cfg;

    let dividing = block_holding(cfg, |instruction| {
        matches!(instruction, Instruction::Binary { may_fault: true, .. })
    });
    assert!(cfg.block(dividing).unwrap().exceptional_successors.contains(&cfg.exit()));
}

#[test]
fn includes_expand_macros_in_place() {
    let mut builder = ProgramBuilder::new();
    let message = builder.string("expanded");
    let macro_body = builder.echo(vec![message]);
    let mut expansion = Entity::new("banner", EntityKind::Macro);
    expansion.body = Some(macro_body);

    let known = builder.include("banner");
    let unknown = builder.include("missing");
    let body = builder.block(vec![known, unknown]);
    builder.script("main", body);
    builder.entity(expansion);

    let translation = translate_default(builder);
    assert_eq!(echo_of(entity(&translation, "main"), "expanded").len(), 1);
    assert_eq!(translation.diagnostics.len(), 1);
    assert_eq!(translation.diagnostics[0].message, "unresolved include missing");
}

#[test]
fn goto_without_target_is_an_error_at_its_position() {
    let mut builder = ProgramBuilder::new();
    let goto = builder.node(NodeKind::Goto);
    builder.at(goto, 3, 4);
    builder.script("main", goto);

    let error = translate(&builder.finish(), &TranslatorConfig::default()).unwrap_err();
    assert!(matches!(error, TranslationError::MissingTarget { .. }));
    assert_eq!(error.position(), &Position(Some(test_loc(3, 4))));
}

#[test]
fn arithmetic_operators_cannot_guard_a_branch() {
    let mut builder = ProgramBuilder::new();
    let target = builder.label("target");
    let left = builder.int(1);
    let right = builder.int(2);
    let branch = builder.if_goto(Some(BinaryOperator::Add), left, Some(right), target);
    let body = builder.block(vec![branch, target]);
    builder.script("main", body);

    let error = translate(&builder.finish(), &TranslatorConfig::default()).unwrap_err();
    assert!(matches!(
        error,
        TranslationError::UnresolvableOperator {
            operator: BinaryOperator::Add,
            ..
        }
    ));
}

#[test]
fn unknown_names_fail_without_implicit_globals() {
    let mut builder = ProgramBuilder::new();
    let read = builder.var("missing");
    let echo = builder.echo(vec![read]);
    builder.script("main", echo);

    let config = TranslatorConfig {
        implicit_globals: false,
        ..TranslatorConfig::default()
    };
    let error = translate(&builder.finish(), &config).unwrap_err();
    assert!(matches!(
        error,
        TranslationError::Symbol {
            source: SymbolError::Undefined(ref name),
            ..
        } if name == "missing"
    ));
}

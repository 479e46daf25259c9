use indexmap::IndexMap;

use crate::{
    analysis::{
        Allocation, CallGraph, CallGraphView, CaptureKeyId, CaptureKeys, CgNode, Constraint,
        Context, LexicalConstraints, PointerKey, FAKE_ROOT,
    },
    config::TranslatorConfig,
    frontend::ast::builder::ProgramBuilder,
    midend::{
        ir::{Instruction, ValueId},
        linearizer::{translate, TranslatedEntity, Translation},
    },
};

fn no_function_values() -> IndexMap<CgNode, Vec<CaptureKeyId>> {
    IndexMap::new()
}

fn definers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// root -> main -> outer
fn main_calling_outer() -> (CallGraph, CgNode, CgNode) {
    let mut graph = CallGraph::new();
    let root = graph.fake_root();
    let main = graph.find_or_create_node("main", Context::Everywhere);
    let outer = graph.find_or_create_node("outer", Context::Everywhere);
    graph.add_edge(root, 0, main);
    graph.add_edge(main, 4, outer);
    (graph, main, outer)
}

#[test]
fn fake_root_is_the_first_node() {
    let graph = CallGraph::new();
    assert_eq!(graph.fake_root(), CgNode::new(0));
    assert_eq!(graph.procedure(graph.fake_root()), FAKE_ROOT);
    assert_eq!(graph.len(), 1);
}

#[test]
fn nodes_are_unique_per_procedure_and_context() {
    let mut graph = CallGraph::new();
    let first = graph.find_or_create_node("f", Context::Everywhere);
    let again = graph.find_or_create_node("f", Context::Everywhere);
    let refined = graph.find_or_create_node(
        "f",
        Context::Closure {
            key: CaptureKeyId::new(0),
            argument: 0,
        },
    );

    assert_eq!(first, again);
    assert_ne!(first, refined);
    assert_eq!(graph.nodes_of("f"), vec![first, refined]);
    assert_eq!(graph.node("f", Context::Everywhere), Some(first));
}

#[test]
fn edges_record_their_call_site() {
    let (mut graph, main, outer) = main_calling_outer();
    assert!(!graph.add_edge(main, 4, outer));
    assert!(graph.add_edge(main, 9, outer));
    assert_eq!(
        graph.successors(main).copied().collect::<Vec<_>>(),
        vec![(4, outer), (9, outer)]
    );
    assert_eq!(graph.predecessors(outer), vec![main]);
}

#[test]
fn lexical_parents_are_found_by_walking_callers() {
    let (graph, main, outer) = main_calling_outer();
    let mut keys = CaptureKeys::new();
    let key = keys.key_for(
        Allocation::new("inner", 2),
        outer,
        &definers(&["main", "outer"]),
        &graph,
    );

    assert_eq!(keys.key(key).parent("main"), Some(main));
    assert_eq!(keys.key(key).parent("outer"), Some(outer));
    assert_eq!(keys.key(key).creator, outer);
}

#[test]
fn capture_keys_are_memoized_per_allocation_and_creator() {
    let (mut graph, _, outer) = main_calling_outer();
    let other = graph.find_or_create_node(
        "outer",
        Context::Closure {
            key: CaptureKeyId::new(5),
            argument: 1,
        },
    );
    let mut keys = CaptureKeys::new();
    let first = keys.key_for(Allocation::new("inner", 2), outer, &[], &graph);
    let again = keys.key_for(Allocation::new("inner", 2), outer, &[], &graph);
    let elsewhere = keys.key_for(Allocation::new("inner", 2), other, &[], &graph);
    let other_site = keys.key_for(Allocation::new("inner", 7), outer, &[], &graph);

    assert_eq!(first, again);
    assert_ne!(first, elsewhere);
    assert_ne!(first, other_site);
    assert_eq!(keys.len(), 3);
}

#[test]
fn unresolved_parents_are_retried_once_callers_appear() {
    let mut graph = CallGraph::new();
    let helper = graph.find_or_create_node("helper", Context::Everywhere);
    let mut keys = CaptureKeys::new();
    let key = keys.key_for(
        Allocation::new("inner", 0),
        helper,
        &definers(&["outer"]),
        &graph,
    );
    assert_eq!(keys.key(key).parent("outer"), None);

    let outer = graph.find_or_create_node("outer", Context::Everywhere);
    graph.add_edge(outer, 3, helper);
    assert_eq!(keys.lexical_parent(key, "outer", &graph), Some(outer));
    assert_eq!(keys.key(key).parent("outer"), Some(outer));
}

#[test]
fn first_caller_found_wins_and_is_kept() {
    let mut graph = CallGraph::new();
    let creator = graph.find_or_create_node("make", Context::Everywhere);
    let first = graph.find_or_create_node("f", Context::Everywhere);
    let second = graph.find_or_create_node(
        "f",
        Context::Closure {
            key: CaptureKeyId::new(9),
            argument: 0,
        },
    );
    graph.add_edge(first, 0, creator);
    graph.add_edge(second, 0, creator);

    let mut keys = CaptureKeys::new();
    let key = keys.key_for(Allocation::new("g", 1), creator, &definers(&["f"]), &graph);
    assert_eq!(keys.lexical_parent(key, "f", &graph), Some(first));

    let third = graph.find_or_create_node("caller", Context::Everywhere);
    graph.add_edge(third, 0, creator);
    assert_eq!(keys.lexical_parent(key, "f", &graph), Some(first));
}

#[test]
fn creator_running_a_closure_consults_that_closures_key() {
    let (mut graph, main, _) = main_calling_outer();
    let mut keys = CaptureKeys::new();
    let outer_value = keys.key_for(Allocation::new("wrapper", 1), main, &[], &graph);

    // the wrapper is invoked from somewhere main does not reach
    let apply = graph.find_or_create_node("apply", Context::Everywhere);
    let root = graph.fake_root();
    graph.add_edge(root, 0, apply);
    let wrapper = graph.find_or_create_node(
        "wrapper",
        Context::Closure {
            key: outer_value,
            argument: 0,
        },
    );
    graph.add_edge(apply, 2, wrapper);

    let key = keys.key_for(
        Allocation::new("set", 4),
        wrapper,
        &definers(&["main"]),
        &graph,
    );
    assert_eq!(keys.key(key).parent("main"), Some(main));
    assert_eq!(keys.key(outer_value).parent("main"), Some(main));
}

#[test]
fn closure_contexts_on_other_arguments_do_not_name_the_function() {
    let context = Context::Closure {
        key: CaptureKeyId::new(2),
        argument: 1,
    };
    assert_eq!(context.function_key(), None);
    assert_eq!(Context::Everywhere.function_key(), None);
    assert_eq!(
        Context::Closure {
            key: CaptureKeyId::new(2),
            argument: 0
        }
        .function_key(),
        Some(CaptureKeyId::new(2))
    );
}

fn closure_program() -> Translation {
    let mut builder = ProgramBuilder::new();
    let read = builder.var("x");
    let inner_body = builder.return_(Some(read));
    let inner = builder.function_entity("inner", &[], inner_body);
    let one = builder.int(1);
    let decl = builder.decl("x", Some(one));
    let statement = builder.function_stmt(inner);
    let call = builder.call_var("inner", vec![]);
    let body = builder.block(vec![decl, statement, call]);
    builder.script("main", body);
    translate(&builder.finish(), &TranslatorConfig::default()).unwrap()
}

fn materialize_site(entity: &TranslatedEntity, function: &str) -> usize {
    entity.cfg.find_instructions(|instruction| {
        matches!(instruction, Instruction::MaterializeFunction { entity, .. } if entity == function)
    })[0]
}

fn lexical_read_value(entity: &TranslatedEntity) -> ValueId {
    let index = entity
        .cfg
        .find_instructions(|instruction| matches!(instruction, Instruction::LexicalRead { .. }))[0];
    match entity.cfg.instruction(index) {
        Some(Instruction::LexicalRead { accesses }) => accesses[0].value,
        other => panic!("expected a lexical read, found {:?}", other),
    }
}

#[test]
fn captured_reads_flow_from_the_defining_activation() {
    let translation = closure_program();
    let main_entity = translation.entity("main").unwrap();
    let inner_entity = translation.entity("main/inner").unwrap();
    let x = main_entity.value_named("x").unwrap();
    let read = lexical_read_value(inner_entity);

    let mut graph = CallGraph::new();
    let root = graph.fake_root();
    let main = graph.find_or_create_node("main", Context::Everywhere);
    graph.add_edge(root, 0, main);

    let mut keys = CaptureKeys::new();
    let key = keys.key_for(
        Allocation::new("main/inner", materialize_site(main_entity, "main/inner")),
        main,
        inner_entity.lexical.scoping_parents(),
        &graph,
    );
    let inner = graph.find_or_create_node("main/inner", Context::Closure { key, argument: 0 });
    graph.add_edge(main, 7, inner);

    let mut constraints = LexicalConstraints::new(&translation);
    let cell = PointerKey::Captured {
        name: "x".into(),
        definer: main,
    };
    let emitted = constraints.constraints_for(inner, &graph, &mut keys, &no_function_values());
    assert_eq!(
        emitted,
        vec![
            Constraint::assign(
                cell.clone(),
                PointerKey::Local {
                    node: main,
                    value: x
                }
            ),
            Constraint::assign(PointerKey::Local { node: inner, value: read }, cell),
        ]
    );

    assert!(constraints
        .constraints_for(inner, &graph, &mut keys, &no_function_values())
        .is_empty());
}

#[test]
fn defining_activation_writes_its_own_cell() {
    let translation = closure_program();
    let x = translation.entity("main").unwrap().value_named("x").unwrap();

    let mut graph = CallGraph::new();
    let main = graph.find_or_create_node("main", Context::Everywhere);
    let mut keys = CaptureKeys::new();
    let mut constraints = LexicalConstraints::new(&translation);

    let emitted = constraints.constraints_for(main, &graph, &mut keys, &no_function_values());
    assert_eq!(
        emitted,
        vec![Constraint::assign(
            PointerKey::Captured {
                name: "x".into(),
                definer: main
            },
            PointerKey::Local {
                node: main,
                value: x
            }
        )]
    );
}

#[test]
fn undiscovered_definers_yield_nothing_yet() {
    let translation = closure_program();
    let mut graph = CallGraph::new();
    let inner = graph.find_or_create_node("main/inner", Context::Everywhere);
    let mut keys = CaptureKeys::new();
    let mut constraints = LexicalConstraints::new(&translation);

    assert!(constraints
        .constraints_for(inner, &graph, &mut keys, &no_function_values())
        .is_empty());
}

#[test]
fn lexical_globals_belong_to_the_fake_root() {
    let mut builder = ProgramBuilder::new();
    let read = builder.var("g");
    let echo = builder.echo(vec![read]);
    builder.script("main", echo);
    let config = TranslatorConfig {
        globals_as_lexical: true,
        ..TranslatorConfig::default()
    };
    let translation = translate(&builder.finish(), &config).unwrap();
    let read = lexical_read_value(translation.entity("main").unwrap());

    let mut graph = CallGraph::new();
    let main = graph.find_or_create_node("main", Context::Everywhere);
    let mut keys = CaptureKeys::new();
    let mut constraints = LexicalConstraints::new(&translation);

    let emitted = constraints.constraints_for(main, &graph, &mut keys, &no_function_values());
    assert_eq!(
        emitted,
        vec![Constraint::assign(
            PointerKey::Local {
                node: main,
                value: read
            },
            PointerKey::Captured {
                name: "g".into(),
                definer: graph.fake_root()
            }
        )]
    );
}

use crate::{
    frontend::ast::{Constant, DeclaredSymbol},
    midend::{
        ir::ValueId,
        symtab::{ScopeKind, Scopes, SymbolError},
    },
};

fn function_scope(scopes: &mut Scopes, name: &str, parameters: &[&str]) -> crate::midend::symtab::ScopeId {
    let parameters: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
    let global = scopes.global();
    scopes
        .push_entity_scope(global, ScopeKind::Function, name, &parameters)
        .unwrap()
}

#[test]
fn parameters_take_first_numbers() {
    let mut scopes = Scopes::new(true);
    let f = function_scope(&mut scopes, "f", &["this", "a", "b"]);

    let b = scopes.lookup(f, "b").unwrap();
    assert_eq!(scopes.symbol(b).value, Some(ValueId::new(3)));
    assert!(scopes.symbol(b).is_parameter);

    let local = scopes.declare(f, &DeclaredSymbol::new("x")).unwrap();
    assert_eq!(scopes.symbol(local).value, Some(ValueId::new(4)));
}

#[test]
fn lookup_after_declare_is_stable() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &[]);
    let declared = scopes.declare(f, &DeclaredSymbol::new("x")).unwrap();

    let first = scopes.lookup(f, "x").unwrap();
    let second = scopes.lookup(f, "x").unwrap();
    assert_eq!(first, declared);
    assert_eq!(scopes.symbol(first).value, scopes.symbol(second).value);
}

#[test]
fn final_redeclaration_is_rejected() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &[]);
    scopes.declare(f, &DeclaredSymbol::final_("k")).unwrap();

    assert_eq!(
        scopes.declare(f, &DeclaredSymbol::new("k")),
        Err(SymbolError::FinalRedeclaration("k".into()))
    );
}

#[test]
fn non_final_redeclaration_returns_existing() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &[]);
    let first = scopes.declare(f, &DeclaredSymbol::new("v")).unwrap();
    let second = scopes.declare(f, &DeclaredSymbol::new("v")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn nested_lookup_caches_alias_in_querying_entity() {
    let mut scopes = Scopes::new(false);
    let outer = function_scope(&mut scopes, "outer", &[]);
    let x = scopes.declare(outer, &DeclaredSymbol::new("x")).unwrap();
    let inner = scopes
        .push_entity_scope(outer, ScopeKind::Function, "inner", &[])
        .unwrap();
    let block = scopes.push_local(inner);

    let seen = scopes.lookup(block, "x").unwrap();
    assert_ne!(seen, x);
    assert_eq!(scopes.symbol(seen).defining_scope, outer);
    assert!(scopes.is_lexically_scoped(block, seen));
    assert!(!scopes.is_lexically_scoped(outer, x));
    assert_eq!(scopes.defining_entity(seen), Some("outer"));

    // the alias lives in the entity scope, not the block
    assert!(scopes.scope(inner).get("x").is_some());
    assert!(scopes.scope(block).get("x").is_none());
    assert_eq!(scopes.lookup(block, "x").unwrap(), seen);
}

#[test]
fn implicit_globals() {
    let mut scopes = Scopes::new(true);
    let f = function_scope(&mut scopes, "f", &[]);

    let g = scopes.lookup(f, "g").unwrap();
    assert!(scopes.is_global(g));
    assert!(!scopes.is_lexically_scoped(f, g));
    assert!(scopes.defined_here(scopes.global(), "g").is_some());

    let mut strict = Scopes::new(false);
    let f = function_scope(&mut strict, "f", &[]);
    assert_eq!(
        strict.lookup(f, "g"),
        Err(SymbolError::Undefined("g".into()))
    );
}

#[test]
fn case_insensitive_names_resolve_through_folded_index() {
    let mut scopes = Scopes::new(false);
    let outer = function_scope(&mut scopes, "outer", &[]);
    let declared = scopes
        .declare(outer, &DeclaredSymbol::new("Total").case_insensitive())
        .unwrap();
    assert_eq!(scopes.lookup(outer, "TOTAL").unwrap(), declared);

    let inner = scopes
        .push_entity_scope(outer, ScopeKind::Function, "inner", &[])
        .unwrap();
    let alias = scopes.lookup(inner, "total").unwrap();
    assert_eq!(scopes.lookup(inner, "Total").unwrap(), alias);
    assert_eq!(scopes.lookup(inner, "tOtAl").unwrap(), alias);
}

#[test]
fn constants_share_slots_and_reject_unknown_literals() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &[]);

    let a = scopes.constant_value(f, &Constant::Str("s".into())).unwrap();
    let b = scopes.constant_value(f, &Constant::Str("s".into())).unwrap();
    assert_eq!(a, b);
    assert!(matches!(
        scopes.constant_value(f, &Constant::Other("regex".into())),
        Err(SymbolError::UnsupportedConstant(_))
    ));
    assert!(matches!(
        scopes.constant_value(scopes.global(), &Constant::Int(1)),
        Err(SymbolError::NoValueNumbers(ScopeKind::Global))
    ));
}

#[test]
fn local_scopes_share_entity_numbering() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &["this"]);
    let block = scopes.push_local(f);

    let inner = scopes.declare(block, &DeclaredSymbol::new("y")).unwrap();
    let temp = scopes.allocate_temp(f).unwrap();
    assert_eq!(scopes.symbol(inner).value, Some(ValueId::new(2)));
    assert_eq!(temp, ValueId::new(3));
    assert!(!scopes.is_lexically_scoped(block, inner));
    assert_eq!(scopes.entity_symbols(f).len(), 2);
}

#[test]
fn explicit_value_conflicts_with_existing_name() {
    let mut scopes = Scopes::new(false);
    let f = function_scope(&mut scopes, "f", &[]);
    let value = scopes.allocate_temp(f).unwrap();
    scopes
        .declare_with_value(f, &DeclaredSymbol::new("r"), value)
        .unwrap();

    assert_eq!(
        scopes.declare_with_value(f, &DeclaredSymbol::new("r"), value),
        Err(SymbolError::DuplicateDeclaration("r".into()))
    );
}

use thiserror::Error;

use crate::midend::symtab::ScopeKind;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("Undeclared name {0}")]
    Undefined(String),

    #[error("Final symbol {0} redeclared in the same scope")]
    FinalRedeclaration(String),

    #[error("{0} scope does not number values")]
    NoValueNumbers(ScopeKind),

    #[error("No constant slot for literal {0}")]
    UnsupportedConstant(String),

    #[error("{0} is already declared in this scope")]
    DuplicateDeclaration(String),
}

pub type SymbolResult<T> = Result<T, SymbolError>;

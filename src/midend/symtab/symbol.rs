use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    frontend::ast::Constant,
    midend::{ir::ValueId, symtab::ScopeId},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(usize);

impl SymbolId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// Value number in the numbering of the entity holding this symbol. Globals and type
    /// members have none.
    pub value: Option<ValueId>,
    pub defining_scope: ScopeId,
    pub is_final: bool,
    pub internal: bool,
    pub is_parameter: bool,
    pub case_insensitive: bool,
    pub default: Option<Constant>,
    pub constant: Option<Constant>,
    pub type_name: Option<String>,
}

impl Symbol {
    pub fn new(name: &str, value: Option<ValueId>, defining_scope: ScopeId) -> Self {
        Self {
            name: name.into(),
            value,
            defining_scope,
            is_final: false,
            internal: false,
            is_parameter: false,
            case_insensitive: false,
            default: None,
            constant: None,
            type_name: None,
        }
    }

    /// Copy of this symbol numbered in another entity; the defining scope stays the original.
    pub fn alias(&self, value: ValueId) -> Self {
        Self {
            value: Some(value),
            is_parameter: false,
            ..self.clone()
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(value) = self.value {
            write!(f, " ({})", value)?;
        }
        if self.is_final {
            write!(f, " final")?;
        }
        Ok(())
    }
}

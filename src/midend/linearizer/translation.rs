use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    frontend::{ast::Constant, ast::EntityKind, sourceloc::SourceLoc},
    midend::{
        ir::{BlockId, ControlFlowGraph, TypeRef, ValueId},
        lexical::LexicalInformation,
        linearizer::Diagnostic,
    },
};

/// The translated body of one script or function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranslatedEntity {
    pub name: String,
    pub kind: EntityKind,
    /// Number of parameters, the implicit receiver included.
    pub parameter_count: usize,
    pub max_value: usize,
    pub cfg: ControlFlowGraph,
    /// Source name of each named value number.
    pub value_names: IndexMap<ValueId, String>,
    pub constants: IndexMap<ValueId, Constant>,
    pub defaults: IndexMap<ValueId, Constant>,
    pub lexical: LexicalInformation,
    pub catch_types: IndexMap<BlockId, Vec<TypeRef>>,
    pub position: Option<SourceLoc>,
}

impl TranslatedEntity {
    pub fn name_of(&self, value: ValueId) -> Option<&str> {
        self.value_names.get(&value).map(String::as_str)
    }

    pub fn value_named(&self, name: &str) -> Option<ValueId> {
        self.value_names
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(value, _)| *value)
    }

    pub fn constant_value(&self, constant: &Constant) -> Option<ValueId> {
        self.constants
            .iter()
            .find(|(_, candidate)| *candidate == constant)
            .map(|(value, _)| *value)
    }
}

impl Display for TranslatedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} {} ({} parameters)",
            self.kind, self.name, self.parameter_count
        )?;
        write!(f, "{}", self.cfg)?;
        for (block, types) in &self.catch_types {
            let types = types
                .iter()
                .map(TypeRef::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "catches at {}: {}", block, types)?;
        }
        if !self.lexical.exposed_names().is_empty() || !self.lexical.scoping_parents().is_empty() {
            write!(f, "{}", self.lexical)?;
        }
        Ok(())
    }
}

/// Result of translating a whole program.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub entities: IndexMap<String, TranslatedEntity>,
    pub globals: Vec<String>,
    /// Declared fields of each type entity.
    pub types: IndexMap<String, Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Translation {
    pub fn entity(&self, name: &str) -> Option<&TranslatedEntity> {
        self.entities.get(name)
    }
}

impl Display for Translation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entity in self.entities.values() {
            writeln!(f, "{}", entity)?;
        }
        if !self.globals.is_empty() {
            writeln!(f, "globals: {}", self.globals.join(", "))?;
        }
        for (type_name, fields) in &self.types {
            writeln!(f, "type {} {{ {} }}", type_name, fields.join(", "))?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::midend::{ir::ValueInterner, symtab::SymbolId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Global,
    Script,
    Function,
    Local,
    Type,
}

impl ScopeKind {
    /// Scopes that start a new value numbering.
    pub fn is_entity(self) -> bool {
        matches!(self, Self::Script | Self::Function)
    }
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Global => "global",
            Self::Script => "script",
            Self::Function => "function",
            Self::Local => "local",
            Self::Type => "type",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Nearest enclosing scope that owns a numbering or stands for an entity (itself for
    /// script, function, type and global scopes).
    pub entity_scope: ScopeId,
    entity: Option<String>,
    values: IndexMap<String, SymbolId>,
    folded: IndexMap<String, SymbolId>,
    interner: Option<ValueInterner>,
}

impl Scope {
    pub(super) fn new(
        kind: ScopeKind,
        parent: Option<ScopeId>,
        entity_scope: ScopeId,
        entity: Option<String>,
        interner: Option<ValueInterner>,
    ) -> Self {
        Self {
            kind,
            parent,
            entity_scope,
            entity,
            values: IndexMap::new(),
            folded: IndexMap::new(),
            interner,
        }
    }

    /// Name of the entity owning this scope; `None` for the global scope.
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.values
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .copied()
    }

    pub fn names(&self) -> impl Iterator<Item = (&String, &SymbolId)> {
        self.values.iter()
    }

    pub(super) fn insert(&mut self, name: &str, symbol: SymbolId, case_insensitive: bool) {
        self.values.insert(name.into(), symbol);
        if case_insensitive {
            self.folded.insert(name.to_lowercase(), symbol);
        }
    }

    pub fn interner(&self) -> Option<&ValueInterner> {
        self.interner.as_ref()
    }

    pub(super) fn interner_mut(&mut self) -> Option<&mut ValueInterner> {
        self.interner.as_mut()
    }
}

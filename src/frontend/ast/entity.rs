use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::frontend::{
    ast::{Ast, ControlFlowMap, NodeId, NodeKind},
    sourceloc::{SourceLoc, SourcePositionMap},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(usize);

impl EntityId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Script,
    Function,
    Type,
    Field,
    Global,
    Macro,
}

impl EntityKind {
    /// Entities that get their own control-flow graph.
    pub fn is_code(self) -> bool {
        matches!(self, Self::Script | Self::Function)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Script => "script",
            Self::Function => "function",
            Self::Type => "type",
            Self::Field => "field",
            Self::Global => "global",
            Self::Macro => "macro",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub body: Option<NodeId>,
    /// Entities nested directly in this one that are not reached through a
    /// function node (types, fields, globals, nested files).
    #[serde(default)]
    pub scoped: Vec<EntityId>,
    #[serde(default)]
    pub position: Option<SourceLoc>,
    #[serde(default)]
    pub type_name: Option<String>,
}

impl Entity {
    pub fn new(name: &str, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            arguments: Vec::new(),
            body: None,
            scoped: Vec::new(),
            position: None,
            type_name: None,
        }
    }
}

/// Everything a front-end hands over: one AST arena shared by all entities.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Program {
    pub ast: Ast,
    pub entities: Vec<Entity>,
    pub root: Option<EntityId>,
    #[serde(default)]
    pub control_flow: ControlFlowMap,
    #[serde(default)]
    pub positions: SourcePositionMap,
    /// Declared types of nodes, used for catch clauses.
    #[serde(default)]
    pub node_types: IndexMap<NodeId, String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.push(entity);
        EntityId::new(self.entities.len() - 1)
    }

    pub fn entity_named(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .position(|entity| entity.name == name)
            .map(EntityId::new)
    }

    pub fn position_of(&self, node: NodeId) -> Option<SourceLoc> {
        self.positions.position_of(&self.ast, node)
    }

    /// Unique name of every entity, assigned walking down from the root.
    ///
    /// An entity nested in a script, function or type is named `parent/child`; files add
    /// nothing to the path. A name repeated within one parent gets a `#2`, `#3`, ... suffix.
    pub fn qualified_names(&self) -> IndexMap<EntityId, String> {
        let mut names = IndexMap::new();
        let mut taken = IndexSet::new();
        if let Some(root) = self.root {
            self.qualify(root, None, &mut names, &mut taken);
        }
        // entities only reachable through an include
        for index in 0..self.entities.len() {
            self.qualify(EntityId::new(index), None, &mut names, &mut taken);
        }
        names
    }

    fn qualify(
        &self,
        id: EntityId,
        parent: Option<&str>,
        names: &mut IndexMap<EntityId, String>,
        taken: &mut IndexSet<String>,
    ) {
        if names.contains_key(&id) {
            return;
        }
        let Some(entity) = self.entity(id) else {
            return;
        };

        let base = match parent {
            Some(parent) => format!("{}/{}", parent, entity.name),
            None => entity.name.clone(),
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while !taken.insert(name.clone()) {
            name = format!("{}#{}", base, suffix);
            suffix += 1;
        }
        names.insert(id, name.clone());

        let prefix = match entity.kind {
            EntityKind::File => parent.map(String::from),
            _ => Some(name),
        };
        let mut nested = entity.scoped.clone();
        for node in entity.body.map(|body| self.ast.subtree(body)).unwrap_or_default() {
            if let Some(NodeKind::Function(function) | NodeKind::FunctionStmt(function)) =
                self.ast.kind(node)
            {
                nested.push(*function);
            }
        }
        for child in nested {
            self.qualify(child, prefix.as_deref(), names, taken);
        }
    }
}

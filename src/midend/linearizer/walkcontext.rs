use crate::{
    frontend::ast::EntityId,
    midend::{linearizer::unwind::UnwindId, symtab::ScopeId},
};

/// Ambient state of one point in the walk.
///
/// Contexts are immutable values; entering an entity, a local scope, a type or a protected
/// region derives a new one and leaves the enclosing context untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkContext {
    /// Code entity whose graph is being built; `None` outside any script or function.
    pub entity: Option<EntityId>,
    pub scope: ScopeId,
    /// Innermost protected region enclosing this point.
    pub unwind: Option<UnwindId>,
    /// Type whose fields are being declared.
    pub type_name: Option<String>,
}

impl WalkContext {
    pub fn root(scope: ScopeId) -> Self {
        Self {
            entity: None,
            scope,
            unwind: None,
            type_name: None,
        }
    }

    /// Context for the body of a nested code entity. Protected regions do not extend into it.
    pub fn for_entity(&self, entity: EntityId, scope: ScopeId) -> Self {
        Self {
            entity: Some(entity),
            scope,
            unwind: None,
            type_name: None,
        }
    }

    pub fn for_type(&self, type_name: &str, scope: ScopeId) -> Self {
        Self {
            scope,
            type_name: Some(type_name.into()),
            ..self.clone()
        }
    }

    pub fn with_scope(&self, scope: ScopeId) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    pub fn with_unwind(&self, unwind: UnwindId) -> Self {
        Self {
            unwind: Some(unwind),
            ..self.clone()
        }
    }
}

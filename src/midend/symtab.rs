use crate::{
    frontend::ast::{Constant, DeclaredSymbol},
    midend::ir::{ValueId, ValueInterner},
    trace,
};

mod errors;
mod scope;
mod symbol;

pub use errors::{SymbolError, SymbolResult};
pub use scope::{Scope, ScopeId, ScopeKind};
pub use symbol::{Symbol, SymbolId};

/// Arena of every scope and symbol created while translating one program.
///
/// Scopes form a parent chain rooted at the global scope. Script and function scopes own a
/// [`ValueInterner`]; local scopes number their symbols through the nearest such scope, and the
/// global and type scopes have no numbering at all.
#[derive(Clone, Debug)]
pub struct Scopes {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    implicit_globals: bool,
}

impl Scopes {
    pub fn new(implicit_globals: bool) -> Self {
        let global = Scope::new(ScopeKind::Global, None, ScopeId::new(0), None, None);
        Self {
            scopes: vec![global],
            symbols: Vec::new(),
            implicit_globals,
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId::new(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    fn add_scope(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId::new(self.scopes.len() - 1)
    }

    fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId::new(self.symbols.len() - 1)
    }

    /// Opens the scope of a script or function entity. `parameters` are numbered `1..=n` in
    /// order and declared as parameter symbols.
    pub fn push_entity_scope(
        &mut self,
        parent: ScopeId,
        kind: ScopeKind,
        entity: &str,
        parameters: &[String],
    ) -> SymbolResult<ScopeId> {
        let interner = ValueInterner::new(parameters.len());
        let id = ScopeId::new(self.scopes.len());
        self.add_scope(Scope::new(
            kind,
            Some(parent),
            id,
            Some(entity.into()),
            Some(interner),
        ));

        for (position, parameter) in parameters.iter().enumerate() {
            let value = self
                .interner(id)?
                .parameter(position)
                .ok_or(SymbolError::NoValueNumbers(kind))?;
            let symbol = self.declare_with_value(id, &DeclaredSymbol::new(parameter), value)?;
            self.symbols[symbol.index()].is_parameter = true;
        }

        trace::trace!("{} scope {} for {} ({} parameters)", kind, id, entity, parameters.len());
        Ok(id)
    }

    pub fn push_local(&mut self, parent: ScopeId) -> ScopeId {
        let enclosing = self.scope(parent);
        let scope = Scope::new(
            ScopeKind::Local,
            Some(parent),
            enclosing.entity_scope,
            enclosing.entity().map(String::from),
            None,
        );
        self.add_scope(scope)
    }

    pub fn push_type_scope(&mut self, parent: ScopeId, type_name: &str) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        self.add_scope(Scope::new(
            ScopeKind::Type,
            Some(parent),
            id,
            Some(type_name.into()),
            None,
        ))
    }

    /// Symbol declared by `scope` itself under `name`, ignoring cached aliases.
    pub fn defined_here(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope)
            .get(name)
            .filter(|found| self.symbol(*found).defining_scope == scope)
    }

    fn insert_declared(
        &mut self,
        scope: ScopeId,
        declared: &DeclaredSymbol,
        value: Option<ValueId>,
    ) -> SymbolId {
        let mut symbol = Symbol::new(&declared.name, value, scope);
        symbol.is_final = declared.is_final;
        symbol.internal = declared.internal;
        symbol.case_insensitive = declared.case_insensitive;
        symbol.default = declared.default_value.clone();
        symbol.type_name = declared.type_name.clone();
        symbol.constant = value.and_then(|value| {
            self.scope(self.scope(scope).entity_scope)
                .interner()
                .and_then(|interner| interner.constant_of(value))
                .cloned()
        });

        let id = self.add_symbol(symbol);
        self.scopes[scope.index()].insert(&declared.name, id, declared.case_insensitive);
        id
    }

    /// Declares `declared` in `scope` with a fresh value number (none in global and type scopes).
    ///
    /// Redeclaring a non-final name in the same scope returns the existing symbol.
    pub fn declare(&mut self, scope: ScopeId, declared: &DeclaredSymbol) -> SymbolResult<SymbolId> {
        if let Some(existing) = self.defined_here(scope, &declared.name) {
            if self.symbol(existing).is_final || declared.is_final {
                return Err(SymbolError::FinalRedeclaration(declared.name.clone()));
            }
            return Ok(existing);
        }

        let value = match self.scope(scope).kind {
            ScopeKind::Global | ScopeKind::Type => None,
            _ => Some(self.allocate_temp(scope)?),
        };
        Ok(self.insert_declared(scope, declared, value))
    }

    /// Declares `declared` bound to an existing value number.
    pub fn declare_with_value(
        &mut self,
        scope: ScopeId,
        declared: &DeclaredSymbol,
        value: ValueId,
    ) -> SymbolResult<SymbolId> {
        if self.defined_here(scope, &declared.name).is_some() {
            return Err(SymbolError::DuplicateDeclaration(declared.name.clone()));
        }
        Ok(self.insert_declared(scope, declared, Some(value)))
    }

    /// Resolves `name` from `scope` outwards.
    ///
    /// When the search crosses into an enclosing entity (or reaches the global scope), the
    /// script or function scope it crossed from caches an alias numbered in its own
    /// interner, so every later lookup of the name from that entity returns the same symbol.
    /// The alias keeps the original defining scope. With implicit globals an unknown name is
    /// declared in the global scope instead of failing.
    pub fn lookup(&mut self, scope: ScopeId, name: &str) -> SymbolResult<SymbolId> {
        if let Some(found) = self.scope(scope).get(name) {
            return Ok(found);
        }

        let parent = match self.scope(scope).parent {
            Some(parent) => parent,
            None if self.implicit_globals => {
                trace::trace!("implicitly declaring global {}", name);
                return self.declare(scope, &DeclaredSymbol::new(name));
            }
            None => return Err(SymbolError::Undefined(name.into())),
        };

        let found = self.lookup(parent, name)?;
        let defining_kind = self.scope(self.defining_entity_scope(found)).kind;
        let needs_alias = self.scope(scope).kind.is_entity()
            && (self.is_global(found) || defining_kind.is_entity());
        if !needs_alias {
            return Ok(found);
        }

        let value = self.allocate_temp(scope)?;
        let alias = self.symbol(found).alias(value);
        let (alias_name, case_insensitive) = (alias.name.clone(), alias.case_insensitive);
        let id = self.add_symbol(alias);
        self.scopes[scope.index()].insert(&alias_name, id, case_insensitive);
        trace::trace!("aliased {} into {} as {}", alias_name, scope, value);
        Ok(id)
    }

    pub fn is_global(&self, symbol: SymbolId) -> bool {
        self.scope(self.symbol(symbol).defining_scope).kind == ScopeKind::Global
    }

    fn defining_entity_scope(&self, symbol: SymbolId) -> ScopeId {
        self.scope(self.symbol(symbol).defining_scope).entity_scope
    }

    /// Whether `symbol`, as seen from `scope`, belongs to an enclosing entity's activation.
    pub fn is_lexically_scoped(&self, scope: ScopeId, symbol: SymbolId) -> bool {
        let defining = self.defining_entity_scope(symbol);
        self.scope(scope).kind != ScopeKind::Type
            && !self.is_global(symbol)
            && self.scope(defining).kind != ScopeKind::Type
            && defining != self.scope(scope).entity_scope
    }

    /// Name of the entity that declared `symbol`.
    pub fn defining_entity(&self, symbol: SymbolId) -> Option<&str> {
        self.scope(self.symbol(symbol).defining_scope).entity()
    }

    pub fn entity_name(&self, scope: ScopeId) -> Option<&str> {
        self.scope(scope).entity()
    }

    pub fn entity_scope(&self, scope: ScopeId) -> ScopeId {
        self.scope(scope).entity_scope
    }

    pub fn interner(&self, scope: ScopeId) -> SymbolResult<&ValueInterner> {
        let owner = self.scope(self.entity_scope(scope));
        owner
            .interner()
            .ok_or(SymbolError::NoValueNumbers(owner.kind))
    }

    fn interner_mut(&mut self, scope: ScopeId) -> SymbolResult<&mut ValueInterner> {
        let owner = self.entity_scope(scope);
        let kind = self.scope(owner).kind;
        self.scopes[owner.index()]
            .interner_mut()
            .ok_or(SymbolError::NoValueNumbers(kind))
    }

    pub fn allocate_temp(&mut self, scope: ScopeId) -> SymbolResult<ValueId> {
        Ok(self.interner_mut(scope)?.allocate_temp())
    }

    /// Shared value slot for a literal in the numbering `scope` belongs to.
    pub fn constant_value(&mut self, scope: ScopeId, constant: &Constant) -> SymbolResult<ValueId> {
        if let Constant::Other(literal) = constant {
            return Err(SymbolError::UnsupportedConstant(literal.clone()));
        }
        Ok(self.interner_mut(scope)?.intern_constant(constant))
    }

    pub fn set_default(
        &mut self,
        scope: ScopeId,
        value: ValueId,
        default: Constant,
    ) -> SymbolResult<()> {
        self.interner_mut(scope)?.set_default(value, default);
        Ok(())
    }

    /// Whether `value` is a literal or already the slot of some symbol numbered along with
    /// `scope`.
    pub fn is_named_value(&self, scope: ScopeId, value: ValueId) -> bool {
        let owner = self.entity_scope(scope);
        self.interner(scope)
            .is_ok_and(|interner| interner.is_constant(value))
            || self
                .entity_symbols(owner)
                .iter()
                .any(|symbol| symbol.value == Some(value))
    }

    /// Every symbol held by scopes numbered through `entity_scope`, aliases included.
    pub fn entity_symbols(&self, entity_scope: ScopeId) -> Vec<&Symbol> {
        self.scopes
            .iter()
            .filter(|scope| scope.entity_scope == entity_scope)
            .flat_map(|scope| scope.names().map(|(_, symbol)| self.symbol(*symbol)))
            .collect()
    }
}

#[cfg(test)]
mod tests;

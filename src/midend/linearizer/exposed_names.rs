use indexmap::{IndexMap, IndexSet};

use crate::{
    frontend::ast::{EntityId, NodeKind, Program},
    trace,
};

/// Names of each code entity that some nested entity reads or writes.
///
/// Computed before translation so an entity knows, while its own body is walked, which of its
/// locals must be kept in sync with the lexical mechanism.
#[derive(Clone, Debug, Default)]
pub struct ExposedNames {
    by_entity: IndexMap<String, IndexSet<String>>,
}

impl ExposedNames {
    /// `names` holds the qualified name of each entity, as given by [`Program::qualified_names`].
    pub fn compute(program: &Program, names: &IndexMap<EntityId, String>) -> Self {
        let mut scan = Scan {
            program,
            parents: IndexMap::new(),
            declared: IndexMap::new(),
            used: IndexMap::new(),
        };
        if let Some(root) = program.root {
            scan.entity(root, None);
        }

        let mut by_entity: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (entity, used) in &scan.used {
            let own = scan.declared.get(entity);
            for name in used {
                if own.is_some_and(|own| own.contains(name)) {
                    continue;
                }

                let mut enclosing = scan.parents.get(entity).copied().flatten();
                while let Some(parent) = enclosing {
                    if scan
                        .declared
                        .get(&parent)
                        .is_some_and(|declared| declared.contains(name))
                    {
                        if let Some(definer) = names.get(&parent) {
                            by_entity
                                .entry(definer.clone())
                                .or_default()
                                .insert(name.clone());
                        }
                        break;
                    }
                    enclosing = scan.parents.get(&parent).copied().flatten();
                }
            }
        }

        for (entity, names) in &by_entity {
            trace::trace!("{} exposes {:?}", entity, names);
        }
        Self { by_entity }
    }

    pub fn is_exposed(&self, entity: &str, name: &str) -> bool {
        self.by_entity
            .get(entity)
            .is_some_and(|names| names.contains(name))
    }

    pub fn of(&self, entity: &str) -> impl Iterator<Item = &String> {
        self.by_entity.get(entity).into_iter().flatten()
    }
}

struct Scan<'p> {
    program: &'p Program,
    /// Nearest enclosing code entity of each entity seen.
    parents: IndexMap<EntityId, Option<EntityId>>,
    declared: IndexMap<EntityId, IndexSet<String>>,
    used: IndexMap<EntityId, IndexSet<String>>,
}

impl<'p> Scan<'p> {
    fn entity(&mut self, id: EntityId, enclosing: Option<EntityId>) {
        if self.parents.contains_key(&id) {
            return;
        }
        self.parents.insert(id, enclosing);
        let Some(entity) = self.program.entity(id) else {
            return;
        };

        let code_parent = if entity.kind.is_code() {
            Some(id)
        } else {
            enclosing
        };

        let mut declared: IndexSet<String> = entity.arguments.iter().cloned().collect();
        declared.insert("this".into());
        let mut used = IndexSet::new();
        let mut nested = entity.scoped.clone();

        for node in entity
            .body
            .map(|body| self.program.ast.subtree(body))
            .unwrap_or_default()
        {
            match self.program.ast.kind(node) {
                Some(NodeKind::Var(name)) => {
                    used.insert(name.clone());
                }
                Some(NodeKind::Decl { symbol, .. }) => {
                    declared.insert(symbol.name.clone());
                }
                Some(NodeKind::Catch { name, .. }) | Some(NodeKind::GetCaughtException(name)) => {
                    declared.insert(name.clone());
                }
                Some(NodeKind::FunctionStmt(function)) => {
                    if let Some(function_entity) = self.program.entity(*function) {
                        declared.insert(function_entity.name.clone());
                    }
                    nested.push(*function);
                }
                Some(NodeKind::Function(function)) => nested.push(*function),
                _ => (),
            }
        }

        if entity.kind.is_code() {
            self.declared.insert(id, declared);
            self.used.insert(id, used);
        }
        for child in nested {
            self.entity(child, code_parent);
        }
    }
}

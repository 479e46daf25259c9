use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{CallGraphView, CaptureKeyId, CaptureKeys, CgNode},
    midend::{
        ir::{Instruction, ValueId},
        lexical::Access,
        linearizer::{TranslatedEntity, Translation},
    },
    trace,
};

/// An abstract location the points-to solver tracks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKey {
    /// A value number of the entity running in `node`.
    Local { node: CgNode, value: ValueId },
    /// `name` as owned by the activation `definer`. Globals are owned by the fake root.
    Captured { name: String, definer: CgNode },
}

impl Display for PointerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { node, value } => write!(f, "{}:{}", node, value),
            Self::Captured { name, definer } => write!(f, "[{}@{}]", name, definer),
        }
    }
}

/// `lhs` receives everything `rhs` may point to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    pub lhs: PointerKey,
    pub rhs: PointerKey,
}

impl Constraint {
    pub fn assign(lhs: PointerKey, rhs: PointerKey) -> Self {
        Self { lhs, rhs }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <- {}", self.lhs, self.rhs)
    }
}

/// The solver's current knowledge of which function values a node may be running.
pub trait FunctionValues {
    fn function_keys(&self, node: CgNode) -> Vec<CaptureKeyId>;
}

impl FunctionValues for IndexMap<CgNode, Vec<CaptureKeyId>> {
    fn function_keys(&self, node: CgNode) -> Vec<CaptureKeyId> {
        self.get(&node).cloned().unwrap_or_default()
    }
}

/// Turns the lexical accesses of call-graph nodes into assignment constraints.
///
/// The solver calls [`LexicalConstraints::constraints_for`] again whenever the call graph or
/// the function values grow; each call returns only constraints not handed out before, so
/// an unchanged node yields nothing.
pub struct LexicalConstraints<'t> {
    translation: &'t Translation,
    emitted: IndexSet<Constraint>,
    seeded_cells: IndexSet<(String, CgNode)>,
}

impl<'t> LexicalConstraints<'t> {
    pub fn new(translation: &'t Translation) -> Self {
        Self {
            translation,
            emitted: IndexSet::new(),
            seeded_cells: IndexSet::new(),
        }
    }

    /// Every constraint emitted so far.
    pub fn emitted(&self) -> impl Iterator<Item = &Constraint> {
        self.emitted.iter()
    }

    pub fn constraints_for(
        &mut self,
        node: CgNode,
        graph: &dyn CallGraphView,
        keys: &mut CaptureKeys,
        values: &dyn FunctionValues,
    ) -> Vec<Constraint> {
        let translation = self.translation;
        let procedure = graph.procedure(node).to_string();
        let Some(entity) = translation.entity(&procedure) else {
            trace::trace!("no translated body for {}", procedure);
            return Vec::new();
        };

        let _span = trace::span_auto!(trace::Level::TRACE, "lexical constraints", node = %node);
        let mut fresh = Vec::new();
        for (index, instruction) in entity.cfg.instructions().iter().enumerate() {
            match instruction {
                Some(Instruction::LexicalRead { accesses }) => {
                    for access in accesses {
                        for definer in lexical_definers(node, access, graph, keys, values) {
                            let cell = self.captured_cell(&access.name, definer, graph, &mut fresh);
                            self.emit(Constraint::assign(local(node, access.value), cell), &mut fresh);
                        }
                    }
                }
                Some(Instruction::LexicalWrite { accesses }) => {
                    for access in accesses {
                        for definer in lexical_definers(node, access, graph, keys, values) {
                            let cell = self.captured_cell(&access.name, definer, graph, &mut fresh);
                            self.emit(Constraint::assign(cell, local(node, access.value)), &mut fresh);
                        }
                    }
                }
                Some(Instruction::Call { .. }) => {
                    self.call_site_uses(node, entity, index, graph, &mut fresh);
                }
                _ => {}
            }
        }
        fresh
    }

    /// At a call, the caller's own exposed names flow into their cells so callees that read them
    /// see the current value.
    fn call_site_uses(
        &mut self,
        node: CgNode,
        entity: &TranslatedEntity,
        index: usize,
        graph: &dyn CallGraphView,
        fresh: &mut Vec<Constraint>,
    ) {
        let lexical = &entity.lexical;
        for (exposed, value) in lexical.exposed_names().iter().zip(lexical.exposed_uses(index)) {
            if exposed.definer != entity.name {
                continue;
            }
            let cell = self.captured_cell(&exposed.name, node, graph, fresh);
            self.emit(Constraint::assign(cell, local(node, *value)), fresh);
        }
    }

    /// The cell for `name` owned by `definer`. The first time a cell is seen it also receives
    /// the value `name` holds when `definer` returns, for closures that outlive it.
    fn captured_cell(
        &mut self,
        name: &str,
        definer: CgNode,
        graph: &dyn CallGraphView,
        fresh: &mut Vec<Constraint>,
    ) -> PointerKey {
        let cell = PointerKey::Captured {
            name: name.into(),
            definer,
        };
        if !self.seeded_cells.insert((name.to_string(), definer)) {
            return cell;
        }

        let translation = self.translation;
        let procedure = graph.procedure(definer);
        if let Some(entity) = translation.entity(procedure) {
            let lexical = &entity.lexical;
            let exit_values = lexical
                .exposed_names()
                .iter()
                .zip(lexical.exit_exposed_uses())
                .filter(|(exposed, _)| exposed.name == name && exposed.definer == procedure)
                .filter_map(|(_, value)| *value);
            for value in exit_values {
                self.emit(Constraint::assign(cell.clone(), local(definer, value)), fresh);
            }
        }
        cell
    }

    fn emit(&mut self, constraint: Constraint, fresh: &mut Vec<Constraint>) {
        if self.emitted.insert(constraint.clone()) {
            trace::trace!("lexical constraint {}", constraint);
            fresh.push(constraint);
        }
    }
}

/// Activations that may own the variable `access` names, as seen from `node`. Empty when none
/// has been discovered yet.
pub fn lexical_definers(
    node: CgNode,
    access: &Access,
    graph: &dyn CallGraphView,
    keys: &mut CaptureKeys,
    values: &dyn FunctionValues,
) -> Vec<CgNode> {
    let Some(definer) = &access.definer else {
        return vec![graph.fake_root()];
    };
    if graph.procedure(node) == definer {
        return vec![node];
    }

    let function_keys = match graph.context(node).function_key() {
        Some(key) => vec![key],
        None => values.function_keys(node),
    };
    function_keys
        .into_iter()
        .filter_map(|key| keys.lexical_parent(key, definer, graph))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn local(node: CgNode, value: ValueId) -> PointerKey {
    PointerKey::Local { node, value }
}

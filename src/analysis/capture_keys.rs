use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{CallGraphView, CgNode},
    trace,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureKeyId(usize);

impl CaptureKeyId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for CaptureKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "k{}", self.0)
    }
}

/// A function value allocation: the `MaterializeFunction` at instruction `site` producing
/// `function`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    pub function: String,
    pub site: usize,
}

impl Allocation {
    pub fn new(function: &str, site: usize) -> Self {
        Self {
            function: function.into(),
            site,
        }
    }
}

impl Display for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.function, self.site)
    }
}

/// A function value as created by one particular activation. The lexical parent map only
/// ever grows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureKey {
    pub allocation: Allocation,
    pub creator: CgNode,
    parents: IndexMap<String, CgNode>,
}

impl CaptureKey {
    pub fn parent(&self, definer: &str) -> Option<CgNode> {
        self.parents.get(definer).copied()
    }

    pub fn parents(&self) -> impl Iterator<Item = (&str, CgNode)> {
        self.parents
            .iter()
            .map(|(definer, node)| (definer.as_str(), *node))
    }
}

impl Display for CaptureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} created by {}", self.allocation, self.creator)
    }
}

/// Capture keys memoized per (allocation, creating node).
#[derive(Clone, Debug, Default)]
pub struct CaptureKeys {
    keys: Vec<CaptureKey>,
    index: IndexMap<(Allocation, CgNode), CaptureKeyId>,
}

impl CaptureKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for `allocation` in `creator`, resolving each of `definers` on first creation.
    pub fn key_for(
        &mut self,
        allocation: Allocation,
        creator: CgNode,
        definers: &[String],
        graph: &dyn CallGraphView,
    ) -> CaptureKeyId {
        if let Some(id) = self.index.get(&(allocation.clone(), creator)) {
            return *id;
        }

        let id = CaptureKeyId::new(self.keys.len());
        trace::debug!("capture key {} for {} in {}", id, allocation, creator);
        self.keys.push(CaptureKey {
            allocation: allocation.clone(),
            creator,
            parents: IndexMap::new(),
        });
        self.index.insert((allocation, creator), id);

        for definer in definers {
            self.lexical_parent(id, definer, graph);
        }
        id
    }

    pub fn key(&self, id: CaptureKeyId) -> &CaptureKey {
        &self.keys[id.index()]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The activation of `definer` lexically enclosing the function value `id`, if one has been
    /// discovered yet.
    pub fn lexical_parent(
        &mut self,
        id: CaptureKeyId,
        definer: &str,
        graph: &dyn CallGraphView,
    ) -> Option<CgNode> {
        let mut consulted = IndexSet::new();
        self.resolve(id, definer, graph, &mut consulted)
    }

    fn resolve(
        &mut self,
        id: CaptureKeyId,
        definer: &str,
        graph: &dyn CallGraphView,
        consulted: &mut IndexSet<CaptureKeyId>,
    ) -> Option<CgNode> {
        if !consulted.insert(id) {
            return None;
        }
        if let Some(node) = self.key(id).parent(definer) {
            return Some(node);
        }

        let creator = self.key(id).creator;
        let found = reversed_search(creator, definer, graph).or_else(|| {
            graph
                .context(creator)
                .function_key()
                .and_then(|outer| self.resolve(outer, definer, graph, consulted))
        });

        if let Some(node) = found {
            trace::trace!("lexical parent of {} for {} is {}", id, definer, node);
            self.keys[id.index()].parents.insert(definer.into(), node);
        }
        found
    }
}

/// Depth-first search over callers, `start` included, for a node running `procedure`.
fn reversed_search(start: CgNode, procedure: &str, graph: &dyn CallGraphView) -> Option<CgNode> {
    let mut visited = IndexSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        if graph.procedure(node) == procedure {
            return Some(node);
        }
        // reversed so the first recorded caller is explored first
        stack.extend(graph.predecessors(node).into_iter().rev());
    }
    None
}

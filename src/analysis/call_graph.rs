use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{analysis::CaptureKeyId, trace};

/// Procedure name of the node standing for the program root.
pub const FAKE_ROOT: &str = "<fake root>";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CgNode(usize);

impl CgNode {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for CgNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Calling context of a call-graph node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Context {
    Everywhere,
    /// The closure identified by `key` flows into argument position `argument`; position 0 is
    /// the invoked function value itself.
    Closure {
        key: CaptureKeyId,
        argument: usize,
    },
}

impl Context {
    /// Capture key of the function value this node runs, when the context records it.
    pub fn function_key(&self) -> Option<CaptureKeyId> {
        match self {
            Self::Closure { key, argument: 0 } => Some(*key),
            _ => None,
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Everywhere => write!(f, "everywhere"),
            Self::Closure { key, argument } => write!(f, "closure {} at argument {}", key, argument),
        }
    }
}

/// What the closure machinery needs to know about a call graph under construction.
pub trait CallGraphView {
    fn fake_root(&self) -> CgNode;
    fn procedure(&self, node: CgNode) -> &str;
    fn context(&self, node: CgNode) -> Context;
    /// Callers of `node`, in the order the edges were discovered.
    fn predecessors(&self, node: CgNode) -> Vec<CgNode>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct NodeData {
    procedure: String,
    context: Context,
}

/// Call graph whose nodes are (procedure, context) pairs. Edges remember the call instruction
/// index they were discovered at.
#[derive(Clone, Debug)]
pub struct CallGraph {
    nodes: Vec<NodeData>,
    index: IndexMap<(String, Context), CgNode>,
    successors: Vec<IndexSet<(usize, CgNode)>>,
    predecessors: Vec<IndexSet<CgNode>>,
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CallGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            index: IndexMap::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        };
        graph.find_or_create_node(FAKE_ROOT, Context::Everywhere);
        graph
    }

    pub fn find_or_create_node(&mut self, procedure: &str, context: Context) -> CgNode {
        let key = (procedure.to_string(), context);
        if let Some(node) = self.index.get(&key) {
            return *node;
        }

        let node = CgNode::new(self.nodes.len());
        trace::trace!("call graph node {} for {} in {}", node, procedure, context);
        self.nodes.push(NodeData {
            procedure: procedure.into(),
            context,
        });
        self.successors.push(IndexSet::new());
        self.predecessors.push(IndexSet::new());
        self.index.insert(key, node);
        node
    }

    pub fn node(&self, procedure: &str, context: Context) -> Option<CgNode> {
        self.index.get(&(procedure.to_string(), context)).copied()
    }

    /// Every node running `procedure`, whatever its context.
    pub fn nodes_of(&self, procedure: &str) -> Vec<CgNode> {
        self.index
            .iter()
            .filter(|((candidate, _), _)| candidate == procedure)
            .map(|(_, node)| *node)
            .collect()
    }

    /// Returns whether the edge is new.
    pub fn add_edge(&mut self, caller: CgNode, site: usize, callee: CgNode) -> bool {
        let added = self.successors[caller.index()].insert((site, callee));
        self.predecessors[callee.index()].insert(caller);
        added
    }

    pub fn successors(&self, node: CgNode) -> impl Iterator<Item = &(usize, CgNode)> {
        self.successors[node.index()].iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl CallGraphView for CallGraph {
    fn fake_root(&self) -> CgNode {
        CgNode::new(0)
    }

    fn procedure(&self, node: CgNode) -> &str {
        &self.nodes[node.index()].procedure
    }

    fn context(&self, node: CgNode) -> Context {
        self.nodes[node.index()].context
    }

    fn predecessors(&self, node: CgNode) -> Vec<CgNode> {
        self.predecessors[node.index()].iter().copied().collect()
    }
}

impl Display for CallGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, data) in self.nodes.iter().enumerate() {
            writeln!(f, "n{}: {} ({})", index, data.procedure, data.context)?;
            for (site, callee) in &self.successors[index] {
                writeln!(f, "  @{} -> {}", site, callee)?;
            }
        }
        Ok(())
    }
}

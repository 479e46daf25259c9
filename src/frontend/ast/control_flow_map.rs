use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::frontend::ast::NodeId;

/// Label on a non-structured control transfer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Unlabeled,
    Bool(bool),
    /// A switch case, labeled by the node computing the case value.
    Case(NodeId),
    SwitchDefault,
    /// Exceptional transfer for the named exception type.
    Exception(String),
}

impl Label {
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlabeled => write!(f, "-"),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Case(node) => write!(f, "case {}", node),
            Self::SwitchDefault => write!(f, "default"),
            Self::Exception(type_name) => write!(f, "catch {}", type_name),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Node(NodeId),
    ExceptionToExit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: NodeId,
    pub label: Label,
    pub target: Target,
}

/// Labeled control transfers between AST nodes, as recorded by the front-end.
#[derive(Clone, Debug, Default)]
pub struct ControlFlowMap {
    targets: IndexMap<NodeId, IndexMap<Label, Target>>,
    sources: IndexMap<NodeId, IndexSet<NodeId>>,
}

impl ControlFlowMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: NodeId, label: Label, target: Target) {
        self.targets
            .entry(source)
            .or_default()
            .insert(label, target);
        if let Target::Node(target) = target {
            self.sources.entry(target).or_default().insert(source);
        }
    }

    pub fn target(&self, source: NodeId, label: &Label) -> Option<Target> {
        self.targets
            .get(&source)
            .and_then(|targets| targets.get(label))
            .copied()
    }

    /// Labels leaving `source`, in insertion order.
    pub fn labels(&self, source: NodeId) -> Vec<Label> {
        self.targets
            .get(&source)
            .map(|targets| targets.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn targets(&self, source: NodeId) -> Vec<(Label, Target)> {
        self.targets
            .get(&source)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(label, target)| (label.clone(), *target))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sources(&self, target: NodeId) -> Vec<NodeId> {
        self.sources
            .get(&target)
            .map(|sources| sources.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_sources(&self, target: NodeId) -> bool {
        self.sources
            .get(&target)
            .is_some_and(|sources| !sources.is_empty())
    }

    pub fn is_mapped(&self, source: NodeId) -> bool {
        self.targets.contains_key(&source)
    }
}

impl From<Vec<FlowEdge>> for ControlFlowMap {
    fn from(edges: Vec<FlowEdge>) -> Self {
        let mut map = Self::new();
        for edge in edges {
            map.add(edge.source, edge.label, edge.target);
        }
        map
    }
}

impl From<ControlFlowMap> for Vec<FlowEdge> {
    fn from(map: ControlFlowMap) -> Self {
        map.targets
            .into_iter()
            .flat_map(|(source, targets)| {
                targets
                    .into_iter()
                    .map(move |(label, target)| FlowEdge {
                        source,
                        label,
                        target,
                    })
            })
            .collect()
    }
}

impl Serialize for ControlFlowMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Vec::<FlowEdge>::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ControlFlowMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Vec::<FlowEdge>::deserialize(deserializer)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_track_targets() {
        let mut map = ControlFlowMap::new();
        let goto = NodeId::new(1);
        let label = NodeId::new(2);
        map.add(goto, Label::Unlabeled, Target::Node(label));
        map.add(NodeId::new(3), Label::Exception("E".into()), Target::ExceptionToExit);

        assert_eq!(map.target(goto, &Label::Unlabeled), Some(Target::Node(label)));
        assert_eq!(map.sources(label), vec![goto]);
        assert!(!map.has_sources(goto));
        assert!(map.labels(NodeId::new(3))[0].is_exception());
    }

    #[test]
    fn edge_list_serialization() {
        let mut map = ControlFlowMap::new();
        map.add(NodeId::new(4), Label::Case(NodeId::new(5)), Target::Node(NodeId::new(6)));
        map.add(NodeId::new(4), Label::SwitchDefault, Target::Node(NodeId::new(7)));

        let text = serde_json::to_string(&map).unwrap();
        let restored: ControlFlowMap = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.labels(NodeId::new(4)), map.labels(NodeId::new(4)));
        assert_eq!(restored.sources(NodeId::new(7)), vec![NodeId::new(4)]);
    }
}

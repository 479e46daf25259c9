use std::{
    collections::{HashMap, VecDeque},
    fmt::Display,
};

use serde::{Deserialize, Serialize};

use crate::frontend::ast::{Ast, NodeId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl SourceLoc {
    pub fn none() -> Self {
        SourceLoc {
            file: "".into(),
            line: 0,
            col: 0,
        }
    }

    pub fn new(file: &str, line: usize, col: usize) -> Self {
        SourceLoc {
            file: file.into(),
            line,
            col,
        }
    }

    pub fn valid(&self) -> bool {
        self.line != 0 && self.col != 0
    }
}

impl Display for SourceLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.file, self.line, self.col)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PositionEntry {
    node: NodeId,
    loc: SourceLoc,
}

/// Positions recorded by the front-end, keyed by AST node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PositionEntry>", into = "Vec<PositionEntry>")]
pub struct SourcePositionMap {
    positions: HashMap<NodeId, SourceLoc>,
}

impl SourcePositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, loc: SourceLoc) {
        self.positions.insert(node, loc);
    }

    pub fn get(&self, node: NodeId) -> Option<&SourceLoc> {
        self.positions.get(&node).filter(|loc| loc.valid())
    }

    /// Position of `node`, or of the nearest descendant (breadth-first) that has one.
    pub fn position_of(&self, ast: &Ast, node: NodeId) -> Option<SourceLoc> {
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            if let Some(loc) = self.get(current) {
                return Some(loc.clone());
            }
            if let Some(kind) = ast.kind(current) {
                queue.extend(kind.children());
            }
        }

        None
    }
}

impl From<Vec<PositionEntry>> for SourcePositionMap {
    fn from(entries: Vec<PositionEntry>) -> Self {
        Self {
            positions: entries
                .into_iter()
                .map(|entry| (entry.node, entry.loc))
                .collect(),
        }
    }
}

impl From<SourcePositionMap> for Vec<PositionEntry> {
    fn from(map: SourcePositionMap) -> Self {
        let mut entries = map
            .positions
            .into_iter()
            .map(|(node, loc)| PositionEntry { node, loc })
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.node);
        entries
    }
}

use std::fmt::Display;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(usize);

impl BlockId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Normal,
    Entry,
    /// Target of exceptional edges; starts with a caught-exception instruction.
    Handler,
    Exit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Inclusive range into the graph's instruction array; `None` for blocks without instructions.
    pub range: Option<(usize, usize)>,
    pub normal_successors: IndexSet<BlockId>,
    pub exceptional_successors: IndexSet<BlockId>,
    pub normal_predecessors: IndexSet<BlockId>,
    pub exceptional_predecessors: IndexSet<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId, kind: BlockKind, range: Option<(usize, usize)>) -> Self {
        Self {
            id,
            kind,
            range,
            normal_successors: IndexSet::new(),
            exceptional_successors: IndexSet::new(),
            normal_predecessors: IndexSet::new(),
            exceptional_predecessors: IndexSet::new(),
        }
    }

    pub fn first_index(&self) -> Option<usize> {
        self.range.map(|(first, _)| first)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.range.map(|(_, last)| last)
    }

    pub fn instruction_count(&self) -> usize {
        self.range.map_or(0, |(first, last)| last + 1 - first)
    }

    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.normal_successors
            .iter()
            .chain(self.exceptional_successors.iter())
            .copied()
    }

    pub fn predecessors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.normal_predecessors
            .iter()
            .chain(self.exceptional_predecessors.iter())
            .copied()
    }

    pub fn is_handler(&self) -> bool {
        self.kind == BlockKind::Handler
    }
}

impl Display for BasicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        match self.kind {
            BlockKind::Normal => (),
            BlockKind::Entry => write!(f, " (entry)")?,
            BlockKind::Handler => write!(f, " (handler)")?,
            BlockKind::Exit => write!(f, " (exit)")?,
        }
        if let Some((first, last)) = self.range {
            write!(f, " [{}..={}]", first, last)?;
        }
        Ok(())
    }
}

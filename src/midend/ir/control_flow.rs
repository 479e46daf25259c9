use std::fmt::Display;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    frontend::sourceloc::SourceLoc,
    midend::ir::{BasicBlock, BlockId, BlockKind, Instruction},
};

/// Finalized, immutable control-flow graph of one entity.
///
/// Block 0 is the entry and the last block is the exit. Every block but the exit is reachable
/// from the entry; the exit has no predecessors when no path leaves the body. Instructions live
/// in one flat array; each block owns a contiguous inclusive range of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    instructions: Vec<Option<Instruction>>,
    positions: Vec<Option<SourceLoc>>,
    instruction_blocks: Vec<BlockId>,
    /// Final instruction index to the index it had before dead blocks were dropped.
    pc_map: Option<Vec<usize>>,
}

impl ControlFlowGraph {
    pub fn from_parts(
        blocks: Vec<BasicBlock>,
        instructions: Vec<Option<Instruction>>,
        positions: Vec<Option<SourceLoc>>,
        pc_map: Option<Vec<usize>>,
    ) -> Self {
        let mut instruction_blocks = vec![BlockId::new(0); instructions.len()];
        for block in &blocks {
            if let Some((first, last)) = block.range {
                for slot in instruction_blocks.iter_mut().take(last + 1).skip(first) {
                    *slot = block.id;
                }
            }
        }

        Self {
            blocks,
            instructions,
            positions,
            instruction_blocks,
            pc_map,
        }
    }

    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    pub fn exit(&self) -> BlockId {
        BlockId::new(self.blocks.len().saturating_sub(1))
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn instructions(&self) -> &[Option<Instruction>] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index).and_then(Option::as_ref)
    }

    pub fn instructions_of(&self, id: BlockId) -> &[Option<Instruction>] {
        match self.block(id).and_then(|block| block.range) {
            Some((first, last)) => &self.instructions[first..=last],
            None => &[],
        }
    }

    pub fn position(&self, index: usize) -> Option<&SourceLoc> {
        self.positions.get(index).and_then(Option::as_ref)
    }

    pub fn block_of(&self, index: usize) -> Option<BlockId> {
        self.instruction_blocks.get(index).copied()
    }

    /// Instruction index before dead-block removal; the identity when nothing was removed.
    pub fn original_index(&self, index: usize) -> usize {
        match &self.pc_map {
            Some(map) => map.get(index).copied().unwrap_or(index),
            None => index,
        }
    }

    pub fn has_pc_map(&self) -> bool {
        self.pc_map.is_some()
    }

    pub fn handler_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|block| block.is_handler())
    }

    pub fn reachable_from_entry(&self) -> IndexSet<BlockId> {
        let mut seen = IndexSet::new();
        let mut worklist = vec![self.entry()];
        while let Some(current) = worklist.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(block) = self.block(current) {
                worklist.extend(block.successors());
            }
        }
        seen
    }

    /// Indices of every instruction matching `predicate`.
    pub fn find_instructions(&self, predicate: impl Fn(&Instruction) -> bool) -> Vec<usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| {
                instruction
                    .as_ref()
                    .filter(|instruction| predicate(instruction))
                    .map(|_| index)
            })
            .collect()
    }

    pub fn exit_block(&self) -> Option<&BasicBlock> {
        self.blocks
            .last()
            .filter(|block| block.kind == BlockKind::Exit)
    }
}

impl Display for ControlFlowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for block in &self.blocks {
            write!(f, "{}", block)?;
            let normal = block
                .normal_successors
                .iter()
                .map(BlockId::to_string)
                .collect::<Vec<_>>();
            let exceptional = block
                .exceptional_successors
                .iter()
                .map(BlockId::to_string)
                .collect::<Vec<_>>();
            write!(f, " -> [{}]", normal.join(", "))?;
            if !exceptional.is_empty() {
                write!(f, " ~> [{}]", exceptional.join(", "))?;
            }
            writeln!(f)?;

            if let Some((first, last)) = block.range {
                for index in first..=last {
                    match &self.instructions[index] {
                        Some(instruction) => writeln!(f, "  {:>3}: {}", index, instruction)?,
                        None => writeln!(f, "  {:>3}: <nop>", index)?,
                    }
                }
            }
        }
        Ok(())
    }
}

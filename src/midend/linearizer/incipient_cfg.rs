use indexmap::{IndexMap, IndexSet};

use crate::{
    frontend::{ast::NodeId, sourceloc::SourceLoc},
    midend::{
        ir::{BasicBlock, BlockId, BlockKind, ControlFlowGraph, Instruction},
        linearizer::unwind::UnwindId,
    },
    trace,
};

/// Where a deferred edge is headed: a node that has no block yet, or the exit block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DelayedTarget {
    Node(NodeId),
    Exit,
}

#[derive(Clone, Debug)]
struct PreBlock {
    kind: BlockKind,
    /// Index of the first instruction; the block runs up to the next block's start.
    start: usize,
    handler: bool,
}

/// Control-flow graph under construction for one entity.
///
/// Instructions are only ever appended to the current block, which is always the most recently
/// created one, so every block owns a contiguous run of the instruction array. Blocks created
/// without a fall-through edge start out dead and come alive when an edge reaches them or an
/// instruction is added to them.
#[derive(Clone, Debug)]
pub struct IncipientCfg {
    blocks: Vec<PreBlock>,
    instructions: Vec<Instruction>,
    positions: Vec<Option<SourceLoc>>,
    successors: Vec<IndexSet<BlockId>>,
    current: BlockId,
    exit: Option<BlockId>,
    dead: IndexSet<BlockId>,
    node_blocks: IndexMap<NodeId, BlockId>,
    delayed: IndexMap<DelayedTarget, IndexSet<(BlockId, bool)>>,
    normal_to_exit: IndexSet<BlockId>,
    exceptional_to_exit: IndexSet<BlockId>,
    // stays `None` until the first protected region is entered
    unwind_states: Option<IndexMap<BlockId, UnwindId>>,
}

impl Default for IncipientCfg {
    fn default() -> Self {
        Self::new()
    }
}

impl IncipientCfg {
    pub fn new() -> Self {
        Self {
            blocks: vec![PreBlock {
                kind: BlockKind::Entry,
                start: 0,
                handler: false,
            }],
            instructions: Vec::new(),
            positions: Vec::new(),
            successors: vec![IndexSet::new()],
            current: BlockId::new(0),
            exit: None,
            dead: IndexSet::new(),
            node_blocks: IndexMap::new(),
            delayed: IndexMap::new(),
            normal_to_exit: IndexSet::new(),
            exceptional_to_exit: IndexSet::new(),
            unwind_states: None,
        }
    }

    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Index the next instruction will get.
    pub fn next_instruction(&self) -> usize {
        self.instructions.len()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    fn block_end(&self, block: BlockId) -> usize {
        self.blocks
            .get(block.index() + 1)
            .map(|next| next.start)
            .unwrap_or(self.instructions.len())
    }

    pub fn is_empty_block(&self, block: BlockId) -> bool {
        self.blocks[block.index()].start == self.block_end(block)
    }

    pub fn is_dead(&self, block: BlockId) -> bool {
        self.dead.contains(&block)
    }

    pub fn revive(&mut self, block: BlockId) {
        self.dead.shift_remove(&block);
    }

    /// Starts a new current block.
    ///
    /// A fall-through request on an empty, non-entry current block reuses it. Otherwise the new
    /// block either gets an edge from the previous one or starts dead.
    pub fn new_block(&mut self, fall_through: bool) -> BlockId {
        if fall_through && self.current != self.entry() && self.is_empty_block(self.current) {
            return self.current;
        }

        let previous = self.current;
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(PreBlock {
            kind: BlockKind::Normal,
            start: self.instructions.len(),
            handler: false,
        });
        self.successors.push(IndexSet::new());
        self.current = id;

        if fall_through {
            self.add_edge(previous, id);
        } else {
            self.dead.insert(id);
        }
        trace::trace!("new block {} (fall through: {})", id, fall_through);
        id
    }

    pub fn add_instruction(&mut self, instruction: Instruction, position: Option<SourceLoc>) -> usize {
        self.revive(self.current);
        self.instructions.push(instruction);
        self.positions.push(position);
        self.instructions.len() - 1
    }

    pub fn add_edge(&mut self, source: BlockId, destination: BlockId) {
        self.successors[source.index()].insert(destination);
        self.revive(destination);
    }

    pub fn set_current_handler(&mut self) {
        let current = self.current.index();
        self.blocks[current].handler = true;
    }

    /// Binds `node` to the current block, which stops it being dead.
    pub fn bind_node(&mut self, node: NodeId) -> BlockId {
        self.node_blocks.insert(node, self.current);
        self.revive(self.current);
        self.current
    }

    pub fn block_of_node(&self, node: NodeId) -> Option<BlockId> {
        self.node_blocks.get(&node).copied()
    }

    pub fn add_delayed(&mut self, target: DelayedTarget, source: BlockId, exceptional: bool) {
        trace::trace!("delaying edge {} -> {:?}", source, target);
        self.delayed
            .entry(target)
            .or_default()
            .insert((source, exceptional));
    }

    pub fn take_delayed(&mut self, target: DelayedTarget) -> IndexSet<(BlockId, bool)> {
        self.delayed.shift_remove(&target).unwrap_or_default()
    }

    pub fn has_delayed(&self, node: NodeId) -> bool {
        self.delayed.contains_key(&DelayedTarget::Node(node))
    }

    pub fn has_unwind_data(&self) -> bool {
        self.unwind_states.is_some()
    }

    pub fn set_unwind_state(&mut self, block: BlockId, state: UnwindId) {
        self.unwind_states
            .get_or_insert_with(IndexMap::new)
            .insert(block, state);
    }

    pub fn unwind_state(&self, block: BlockId) -> Option<UnwindId> {
        self.unwind_states
            .as_ref()
            .and_then(|states| states.get(&block).copied())
    }

    /// Turns `block` into the exit block and realizes every edge that was waiting for it.
    pub fn make_exit_block(&mut self, block: BlockId) {
        self.blocks[block.index()].kind = BlockKind::Exit;
        for (source, successors) in self.successors.iter().enumerate() {
            if successors.contains(&block) {
                self.normal_to_exit.insert(BlockId::new(source));
            }
        }

        for (source, exceptional) in self.take_delayed(DelayedTarget::Exit) {
            self.add_edge(source, block);
            if exceptional {
                self.exceptional_to_exit.insert(source);
            } else {
                self.normal_to_exit.insert(source);
            }
        }

        self.exit = Some(block);
        self.current = block;
    }

    fn is_catch_block(&self, block: BlockId) -> bool {
        let start = self.blocks[block.index()].start;
        start < self.block_end(block)
            && matches!(
                self.instructions.get(start),
                Some(Instruction::GetCaughtException { .. })
            )
    }

    fn live_blocks(&self) -> IndexSet<BlockId> {
        let mut live = IndexSet::new();
        let mut worklist = vec![self.entry()];
        while let Some(block) = worklist.pop() {
            if live.insert(block) {
                worklist.extend(self.successors[block.index()].iter().copied());
            }
        }
        if let Some(exit) = self.exit {
            live.insert(exit);
        }
        live
    }

    pub fn finalize(self) -> ControlFlowGraph {
        self.finalize_with_renumbering().0
    }

    /// Freezes the graph, also returning where each surviving block ended up.
    ///
    /// Blocks unreachable from the entry are dropped and the rest are renumbered in creation
    /// order. The exit block always survives, so a body no path leaves (an endless loop) still
    /// has its one exit, just without predecessors. Edges into catch blocks are exceptional; edges into
    /// the exit are normal or exceptional according to how they were recorded. Gotos and branches
    /// are pointed at their final successors.
    pub fn finalize_with_renumbering(self) -> (ControlFlowGraph, IndexMap<BlockId, BlockId>) {
        let live = self.live_blocks();
        let mut order: Vec<BlockId> = live.iter().copied().collect();
        order.sort();

        let renumber: IndexMap<BlockId, BlockId> = order
            .iter()
            .enumerate()
            .map(|(index, old)| (*old, BlockId::new(index)))
            .collect();

        let mut blocks = Vec::with_capacity(order.len());
        let mut instructions = Vec::new();
        let mut positions = Vec::new();
        let mut original_indices = Vec::new();

        for old in &order {
            let pre = &self.blocks[old.index()];
            let (start, end) = (pre.start, self.block_end(*old));
            let first = instructions.len();
            for index in start..end {
                instructions.push(Some(self.instructions[index].clone()));
                positions.push(self.positions[index].clone());
                original_indices.push(index);
            }

            let kind = if *old == self.entry() {
                BlockKind::Entry
            } else if Some(*old) == self.exit {
                BlockKind::Exit
            } else if pre.handler || self.is_catch_block(*old) {
                BlockKind::Handler
            } else {
                pre.kind
            };
            let range = (end > start).then(|| (first, instructions.len() - 1));
            blocks.push(BasicBlock::new(renumber[old], kind, range));
        }

        for old in &order {
            let source = renumber[old];
            for destination in &self.successors[old.index()] {
                let Some(new_destination) = renumber.get(destination).copied() else {
                    continue;
                };
                let to_exit = Some(*destination) == self.exit;
                let to_catch = self.is_catch_block(*destination);

                if to_catch || (to_exit && self.exceptional_to_exit.contains(old)) {
                    blocks[source.index()]
                        .exceptional_successors
                        .insert(new_destination);
                    blocks[new_destination.index()]
                        .exceptional_predecessors
                        .insert(source);
                }
                let normal = if to_exit {
                    self.normal_to_exit.contains(old)
                } else {
                    !to_catch
                };
                if normal {
                    blocks[source.index()].normal_successors.insert(new_destination);
                    blocks[new_destination.index()]
                        .normal_predecessors
                        .insert(source);
                }
            }
        }

        for block in &blocks {
            let Some((first, last)) = block.range else {
                continue;
            };
            let fall_through = BlockId::new(block.id.index() + 1);
            for slot in instructions.iter_mut().take(last + 1).skip(first) {
                let rewritten = match slot.take() {
                    Some(Instruction::Goto { .. }) => block
                        .normal_successors
                        .first()
                        .map(|target| Instruction::Goto {
                            target: Some(*target),
                        }),
                    Some(Instruction::ConditionalBranch {
                        op, left, right, ..
                    }) => {
                        let target = block
                            .normal_successors
                            .iter()
                            .find(|successor| **successor != fall_through)
                            .or_else(|| block.normal_successors.first())
                            .copied();
                        Some(Instruction::ConditionalBranch {
                            op,
                            left,
                            right,
                            target,
                        })
                    }
                    Some(Instruction::Switch {
                        value,
                        default,
                        cases,
                    }) => Some(Instruction::Switch {
                        value,
                        default: default.and_then(|old| renumber.get(&old).copied()),
                        cases: cases
                            .into_iter()
                            .filter_map(|(label, old)| {
                                renumber.get(&old).map(|target| (label, *target))
                            })
                            .collect(),
                    }),
                    Some(Instruction::GetCaughtException { dest, block: old }) => {
                        Some(Instruction::GetCaughtException {
                            dest,
                            block: renumber.get(&old).copied().unwrap_or(block.id),
                        })
                    }
                    other => other,
                };
                *slot = rewritten;
            }
        }

        let dropped = self.blocks.len() - blocks.len();
        trace::trace!(
            "finalized {} blocks ({} dropped), {} instructions",
            blocks.len(),
            dropped,
            instructions.len()
        );
        let pc_map = (dropped > 0).then_some(original_indices);
        (
            ControlFlowGraph::from_parts(blocks, instructions, positions, pc_map),
            renumber,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midend::ir::ValueId;

    fn assign(dest: usize) -> Instruction {
        Instruction::Assign {
            dest: ValueId::new(dest),
            source: ValueId::new(1),
        }
    }

    #[test]
    fn fall_through_folds_empty_blocks() {
        let mut cfg = IncipientCfg::new();
        let first = cfg.new_block(true);
        assert_ne!(first, cfg.entry());
        assert_eq!(cfg.new_block(true), first);

        cfg.add_instruction(assign(2), None);
        let second = cfg.new_block(true);
        assert_ne!(second, first);
        assert!(!cfg.is_dead(second));
    }

    #[test]
    fn blocks_without_fall_through_start_dead() {
        let mut cfg = IncipientCfg::new();
        cfg.new_block(true);
        cfg.add_instruction(Instruction::Return { value: None }, None);
        let after = cfg.new_block(false);
        assert!(cfg.is_dead(after));

        cfg.add_instruction(assign(2), None);
        assert!(!cfg.is_dead(after));
    }

    #[test]
    fn delayed_edges_wait_for_their_target() {
        let mut cfg = IncipientCfg::new();
        let body = cfg.new_block(true);
        let label = NodeId::new(9);
        cfg.add_delayed(DelayedTarget::Node(label), body, false);
        assert!(cfg.has_delayed(label));

        let waiting = cfg.take_delayed(DelayedTarget::Node(label));
        assert_eq!(waiting.len(), 1);
        assert!(!cfg.has_delayed(label));
    }

    #[test]
    fn finalize_drops_unreachable_blocks_and_keeps_exit() {
        let mut cfg = IncipientCfg::new();
        cfg.new_block(true);
        cfg.add_instruction(Instruction::Return { value: None }, None);
        let returning = cfg.current();
        cfg.new_block(false);
        // unreachable code after the return
        cfg.add_instruction(assign(3), None);
        cfg.add_delayed(DelayedTarget::Exit, returning, false);
        let exit = cfg.new_block(true);
        cfg.make_exit_block(exit);

        let graph = cfg.finalize();
        assert_eq!(graph.block_count(), 3);
        assert_eq!(graph.instructions().len(), 1);
        assert!(graph.has_pc_map());
        assert_eq!(graph.exit_block().map(|block| block.kind), Some(BlockKind::Exit));
        assert!(graph.blocks()[1].normal_successors.contains(&graph.exit()));
    }

    #[test]
    fn catch_blocks_get_exceptional_edges() {
        let mut cfg = IncipientCfg::new();
        let body = cfg.new_block(true);
        cfg.add_instruction(assign(2), None);
        let handler = cfg.new_block(false);
        cfg.set_current_handler();
        cfg.add_instruction(
            Instruction::GetCaughtException {
                dest: ValueId::new(3),
                block: handler,
            },
            None,
        );
        cfg.add_edge(body, handler);
        let exit = cfg.new_block(true);
        cfg.make_exit_block(exit);

        let graph = cfg.finalize();
        let body = &graph.blocks()[1];
        assert!(body.exceptional_successors.contains(&BlockId::new(2)));
        assert!(!body.normal_successors.contains(&BlockId::new(2)));
        assert_eq!(graph.blocks()[2].kind, BlockKind::Handler);
    }

    #[test]
    fn gotos_without_successors_become_empty_slots() {
        let mut cfg = IncipientCfg::new();
        cfg.new_block(true);
        cfg.add_instruction(Instruction::Goto { target: None }, None);
        let exit = cfg.new_block(false);
        cfg.make_exit_block(exit);

        let graph = cfg.finalize();
        assert_eq!(graph.instructions().len(), 1);
        assert!(graph.instructions()[0].is_none());
    }
}

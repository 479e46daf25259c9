use std::fmt::Display;

use crate::{
    frontend::ast::{cloner::clone_subtree, NodeId, NodeKind, Target},
    midend::{
        ir::{BlockId, Instruction},
        linearizer::{
            incipient_cfg::DelayedTarget,
            treewalk::Translator,
            walkcontext::WalkContext,
            TranslationError, TranslationResult,
        },
    },
    trace,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnwindId(usize);

impl UnwindId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for UnwindId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// A protected region: `cleanup` must run whenever control leaves it.
#[derive(Clone, Debug)]
pub struct UnwindFrame {
    pub cleanup: NodeId,
    /// Context the region was entered from. Its unwind field is the enclosing region.
    pub context: WalkContext,
}

/// Identifies one generated cleanup sequence.
///
/// Two frames are the same region when their chains of cleanup nodes agree, so the chain stands
/// in for the frame itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnwindKey {
    chain: Vec<NodeId>,
    target: Option<BlockId>,
    exceptional: bool,
}

#[derive(Clone, Debug, Default)]
pub struct UnwindStates {
    frames: Vec<UnwindFrame>,
}

impl UnwindStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cleanup: NodeId, context: WalkContext) -> UnwindId {
        self.frames.push(UnwindFrame { cleanup, context });
        UnwindId(self.frames.len() - 1)
    }

    pub fn frame(&self, id: UnwindId) -> Option<&UnwindFrame> {
        self.frames.get(id.0)
    }

    pub fn parent(&self, id: UnwindId) -> Option<UnwindId> {
        self.frame(id).and_then(|frame| frame.context.unwind)
    }

    /// Cleanup nodes from `id` out to the outermost region.
    pub fn chain(&self, id: UnwindId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(frame) = current.and_then(|id| self.frame(id)) {
            chain.push(frame.cleanup);
            current = frame.context.unwind;
        }
        chain
    }

    pub fn same(&self, a: UnwindId, b: UnwindId) -> bool {
        a == b || self.chain(a) == self.chain(b)
    }

    /// Whether `inner` is `outer` or nested inside it, in which case control moving from
    /// `outer` to `inner` leaves no region.
    pub fn covers(&self, inner: UnwindId, outer: UnwindId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if self.same(id, outer) {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

impl<'c> Translator<'c> {
    /// Binds `node` to the current block and realizes every edge that was waiting for it.
    pub(super) fn add_pre_node(
        &mut self,
        node: NodeId,
        unwind: Option<UnwindId>,
    ) -> TranslationResult<BlockId> {
        let cfg = &mut self.state_mut()?.cfg;
        let block = cfg.bind_node(node);
        if let Some(unwind) = unwind {
            cfg.set_unwind_state(block, unwind);
        }

        let waiting = cfg.take_delayed(DelayedTarget::Node(node));
        for (source, exceptional) in waiting {
            let destination = self
                .unwind_to(source, Some(block), exceptional)?
                .unwrap_or(block);
            self.state_mut()?.cfg.add_edge(source, destination);
        }
        Ok(block)
    }

    pub(super) fn add_pre_edge(
        &mut self,
        node: NodeId,
        target: Target,
        exceptional: bool,
    ) -> TranslationResult<()> {
        let source = self.bound_block(node)?;
        self.add_block_edge(source, target, exceptional)
    }

    /// Edge from `source` to the block of `target`, deferred until the target is bound.
    pub(super) fn add_block_edge(
        &mut self,
        source: BlockId,
        target: Target,
        exceptional: bool,
    ) -> TranslationResult<()> {
        let target = match target {
            Target::ExceptionToExit => return self.add_edge_to_exit(source, exceptional),
            Target::Node(target) => target,
        };

        match self.state()?.cfg.block_of_node(target) {
            Some(block) => {
                let destination = self
                    .unwind_to(source, Some(block), exceptional)?
                    .unwrap_or(block);
                self.state_mut()?.cfg.add_edge(source, destination);
            }
            None => {
                self.state_mut()?
                    .cfg
                    .add_delayed(DelayedTarget::Node(target), source, exceptional);
            }
        }
        Ok(())
    }

    pub(super) fn add_pre_edge_to_exit(
        &mut self,
        node: NodeId,
        exceptional: bool,
    ) -> TranslationResult<()> {
        let source = self.bound_block(node)?;
        self.add_edge_to_exit(source, exceptional)
    }

    pub(super) fn add_edge_to_exit(
        &mut self,
        source: BlockId,
        exceptional: bool,
    ) -> TranslationResult<()> {
        if self.state()?.cfg.has_unwind_data() {
            if let Some(handlers) = self.find_or_create_code(source, None, exceptional)? {
                self.state_mut()?.cfg.add_edge(source, handlers);
                return Ok(());
            }
        }

        self.state_mut()?
            .cfg
            .add_delayed(DelayedTarget::Exit, source, exceptional);
        Ok(())
    }

    fn unwind_to(
        &mut self,
        source: BlockId,
        target: Option<BlockId>,
        exceptional: bool,
    ) -> TranslationResult<Option<BlockId>> {
        if self.state()?.cfg.has_unwind_data() {
            self.find_or_create_code(source, target, exceptional)
        } else {
            Ok(target)
        }
    }

    fn bound_block(&self, node: NodeId) -> TranslationResult<BlockId> {
        self.state()?
            .cfg
            .block_of_node(node)
            .ok_or(TranslationError::UnboundNode {
                node,
                position: self.program.position_of(node).into(),
            })
    }

    /// Block that control leaving `source` for `target` (the exit when `None`) must enter first.
    ///
    /// When the move crosses protected regions, a copy of each crossed cleanup is generated,
    /// innermost first, ending in a jump to the target or, for exceptional transfers, a rethrow.
    /// Generated sequences are cached per region chain, target and kind.
    pub(super) fn find_or_create_code(
        &mut self,
        source: BlockId,
        target: Option<BlockId>,
        exceptional: bool,
    ) -> TranslationResult<Option<BlockId>> {
        let cfg = &self.state()?.cfg;
        let Some(source_state) = cfg.unwind_state(source) else {
            return Ok(target);
        };
        let target_state = target.and_then(|target| cfg.unwind_state(target));
        if target_state.is_some_and(|target_state| self.unwinds.covers(target_state, source_state))
        {
            return Ok(target);
        }

        let key = UnwindKey {
            chain: self.unwinds.chain(source_state),
            target,
            exceptional,
        };
        if let Some(cached) = self.state()?.unwind_cache.get(&key) {
            return Ok(Some(*cached));
        }
        let Some(frame_context) = self
            .unwinds
            .frame(source_state)
            .map(|frame| frame.context.clone())
        else {
            return Ok(target);
        };

        let entry_block = self.state()?.cfg.current();
        if !self.state()?.cfg.is_dead(entry_block) {
            self.emit_at(Instruction::Goto { target: None }, None)?;
            self.state_mut()?.cfg.new_block(false);
        }
        let start = self.state()?.cfg.current();

        let rethrow = if exceptional {
            let exception = self.scopes.allocate_temp(frame_context.scope)?;
            let catch_type = self.types.default_catch_type();
            let state = self.state_mut()?;
            state.cfg.set_current_handler();
            state.cfg.add_instruction(
                Instruction::GetCaughtException {
                    dest: exception,
                    block: start,
                },
                None,
            );
            state.catch_types.entry(start).or_default().push(catch_type);
            Some((exception, self.program.ast.add(NodeKind::Empty)))
        } else {
            None
        };
        let rethrow_node = rethrow.map(|(_, node)| node);

        let mut pending = Some(source_state);
        while let Some(current) = pending {
            if target_state.is_some_and(|target_state| self.unwinds.covers(target_state, current)) {
                break;
            }
            let Some(frame) = self.unwinds.frame(current).cloned() else {
                break;
            };

            let cloned = clone_subtree(&mut self.program, frame.cleanup, |label, old| {
                match rethrow_node {
                    Some(node) if !label.is_exception() => Target::Node(node),
                    _ => *old,
                }
            });
            if let Some(cloned) = cloned {
                trace::trace!("inlining cleanup {} as {}", frame.cleanup, cloned.root);
                self.visit(cloned.root, &frame.context)?;
            }
            pending = frame.context.unwind;
        }

        let end = self.state()?.cfg.current();
        match rethrow {
            Some((exception, node)) => {
                self.add_pre_node(node, None)?;
                let throw = self.instructions.throw(exception);
                self.emit_at(throw, None)?;
            }
            None => {
                self.emit_at(Instruction::Goto { target: None }, None)?;
            }
        }

        let state = self.state_mut()?;
        let after = state.cfg.new_block(false);
        match target {
            Some(target) => {
                state.cfg.add_edge(entry_block, after);
                state.cfg.add_edge(end, target);
            }
            None => {
                if exceptional {
                    state.cfg.add_edge(entry_block, after);
                }
                state.cfg.add_delayed(DelayedTarget::Exit, end, exceptional);
            }
        }

        trace::trace!(
            "cleanup code for {} -> {:?} starts at {}",
            source,
            target,
            start
        );
        state.unwind_cache.insert(key, start);
        Ok(Some(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midend::symtab::ScopeId;

    #[test]
    fn covers_follows_parents() {
        let mut states = UnwindStates::new();
        let root = WalkContext::root(ScopeId::new(0));
        let outer = states.push(NodeId::new(1), root.clone());
        let inner = states.push(NodeId::new(2), root.with_unwind(outer));

        assert!(states.covers(inner, outer));
        assert!(!states.covers(outer, inner));
        assert_eq!(states.chain(inner), vec![NodeId::new(2), NodeId::new(1)]);
        assert_eq!(states.parent(inner), Some(outer));
    }

    #[test]
    fn regions_with_equal_chains_are_the_same() {
        let mut states = UnwindStates::new();
        let root = WalkContext::root(ScopeId::new(0));
        let first = states.push(NodeId::new(4), root.clone());
        let second = states.push(NodeId::new(4), root);

        assert_ne!(first, second);
        assert!(states.same(first, second));
        assert!(states.covers(first, second));
    }
}

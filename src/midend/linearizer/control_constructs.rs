use crate::{
    frontend::ast::{BinaryOperator, Constant, DeclaredSymbol, Label, NodeId, NodeKind, Target},
    midend::{
        ir::{BlockId, ConditionOperator, Instruction, ValueId},
        linearizer::{
            treewalk::Translator, walkcontext::WalkContext, Position, TranslationError,
            TranslationResult,
        },
    },
    trace,
};

impl<'c> Translator<'c> {
    fn current_block(&self) -> TranslationResult<BlockId> {
        Ok(self.state()?.cfg.current())
    }

    fn current_is_dead(&self) -> TranslationResult<bool> {
        let cfg = &self.state()?.cfg;
        Ok(cfg.is_dead(cfg.current()))
    }

    fn new_block(&mut self, fall_through: bool) -> TranslationResult<BlockId> {
        Ok(self.state_mut()?.cfg.new_block(fall_through))
    }

    fn add_edge(&mut self, source: BlockId, destination: BlockId) -> TranslationResult<()> {
        self.state_mut()?.cfg.add_edge(source, destination);
        Ok(())
    }

    fn missing_target(&self, node: NodeId, label: Label) -> TranslationError {
        TranslationError::MissingTarget {
            node,
            label,
            position: Position::default(),
        }
    }

    /// Branch taken when `value` is zero.
    fn branch_if_zero(
        &mut self,
        node: NodeId,
        value: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<BlockId> {
        let zero = self.constant(ctx, &Constant::Int(0))?;
        self.emit(
            node,
            Instruction::ConditionalBranch {
                op: ConditionOperator::Eq,
                left: value,
                right: zero,
                target: None,
            },
        )?;
        self.current_block()
    }

    fn assign_result(
        &mut self,
        node: NodeId,
        result: Option<ValueId>,
        value: Option<ValueId>,
    ) -> TranslationResult<()> {
        if let (Some(dest), Some(source)) = (result, value) {
            self.emit(node, Instruction::Assign { dest, source })?;
        }
        Ok(())
    }

    /// Lowers an `if` statement, or an `if` expression when `result` is given.
    pub(super) fn lower_if(
        &mut self,
        node: NodeId,
        condition: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
        result: Option<ValueId>,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let condition = self.value_of(condition, ctx)?;
        let branch = self.branch_if_zero(node, condition, ctx)?;

        self.new_block(true)?;
        let value = self.visit(then, ctx)?;
        self.assign_result(node, result, value)?;

        let mut true_end = None;
        let mut false_start = None;
        if let Some(otherwise) = otherwise {
            if !self.current_is_dead()? {
                self.emit(node, Instruction::Goto { target: None })?;
                true_end = Some(self.current_block()?);
                self.new_block(false)?;
            }

            let start = self.current_block()?;
            self.state_mut()?.cfg.revive(start);
            false_start = Some(start);
            let value = self.visit(otherwise, ctx)?;
            self.assign_result(node, result, value)?;
        }

        let after = self.new_block(true)?;
        match false_start {
            Some(false_start) => {
                if let Some(true_end) = true_end {
                    self.add_edge(true_end, after)?;
                }
                self.add_edge(branch, false_start)
            }
            None => self.add_edge(branch, after),
        }
    }

    pub(super) fn lower_loop(
        &mut self,
        node: NodeId,
        condition: NodeId,
        body: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let header = self.new_block(true)?;
        let condition = self.value_of(condition, ctx)?;
        let branch = self.branch_if_zero(node, condition, ctx)?;

        self.new_block(true)?;
        self.visit(body, ctx)?;

        if !self.current_is_dead()? {
            self.emit(node, Instruction::Goto { target: None })?;
            let end = self.current_block()?;
            self.add_edge(end, header)?;
            self.new_block(false)?;
        }

        let after = self.current_block()?;
        self.add_edge(branch, after)
    }

    pub(super) fn lower_label(&mut self, node: NodeId, ctx: &WalkContext) -> TranslationResult<()> {
        if self.program.control_flow.has_sources(node) {
            self.new_block(true)?;
            self.add_pre_node(node, ctx.unwind)?;
        }
        Ok(())
    }

    pub(super) fn lower_goto(&mut self, node: NodeId, ctx: &WalkContext) -> TranslationResult<()> {
        if self.current_is_dead()? {
            return Ok(());
        }

        let control_flow = &self.program.control_flow;
        let target = control_flow
            .target(node, &Label::Unlabeled)
            .or_else(|| control_flow.targets(node).first().map(|(_, target)| *target))
            .ok_or_else(|| self.missing_target(node, Label::Unlabeled))?;

        self.add_pre_node(node, ctx.unwind)?;
        self.add_pre_edge(node, target, false)?;
        self.emit(node, Instruction::Goto { target: None })?;
        self.new_block(false)?;
        Ok(())
    }

    pub(super) fn lower_if_goto(
        &mut self,
        node: NodeId,
        op: Option<BinaryOperator>,
        left: NodeId,
        right: Option<NodeId>,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let left = self.value_of(left, ctx)?;
        let (op, right) = match right {
            None => (ConditionOperator::Ne, self.constant(ctx, &Constant::Int(0))?),
            Some(right) => {
                let operator = op.unwrap_or(BinaryOperator::Ne);
                let op = ConditionOperator::try_from(operator).map_err(|operator| {
                    TranslationError::UnresolvableOperator {
                        operator,
                        position: Position::default(),
                    }
                })?;
                (op, self.value_of(right, ctx)?)
            }
        };

        self.emit(
            node,
            Instruction::ConditionalBranch {
                op,
                left,
                right,
                target: None,
            },
        )?;
        self.add_pre_node(node, ctx.unwind)?;

        let label = Label::Bool(true);
        let target = self
            .program
            .control_flow
            .target(node, &label)
            .ok_or_else(|| self.missing_target(node, label))?;
        self.add_pre_edge(node, target, false)?;
        self.new_block(true)?;
        Ok(())
    }

    /// Integral value of every case label, or `None` when some label is not an integral
    /// constant and the switch has to be lowered as a chain of comparisons.
    fn dense_cases(&self, node: NodeId) -> Option<Vec<(i64, Label, Target)>> {
        let mut cases = Vec::new();
        for (label, target) in self.program.control_flow.targets(node) {
            let Label::Case(case) = label else {
                continue;
            };
            match self.program.ast.kind(case) {
                Some(NodeKind::Constant(constant)) => {
                    cases.push((constant.as_integral()?, label, target))
                }
                _ => return None,
            }
        }
        Some(cases)
    }

    fn target_block(&self, node: NodeId, label: &Label, target: Target) -> TranslationResult<BlockId> {
        let block = match target {
            Target::Node(target) => self.state()?.cfg.block_of_node(target),
            Target::ExceptionToExit => None,
        };
        block.ok_or_else(|| self.missing_target(node, label.clone()))
    }

    pub(super) fn lower_switch(
        &mut self,
        node: NodeId,
        value: NodeId,
        body: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        match self.dense_cases(node) {
            Some(cases) => self.lower_dense_switch(node, value, body, cases, ctx),
            None => self.lower_switch_as_branches(node, value, body, ctx),
        }
    }

    fn lower_dense_switch(
        &mut self,
        node: NodeId,
        value: NodeId,
        body: NodeId,
        cases: Vec<(i64, Label, Target)>,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let value = self.value_of(value, ctx)?;
        let switch = self.emit(
            node,
            Instruction::Switch {
                value,
                default: None,
                cases: Vec::new(),
            },
        )?;
        self.add_pre_node(node, ctx.unwind)?;
        self.new_block(true)?;

        // the fall-through block jumps to the default, so the switch itself never falls through
        self.emit(node, Instruction::Goto { target: None })?;
        let default_block = self.current_block()?;
        if let Some(Instruction::Switch { default, .. }) =
            self.state_mut()?.cfg.instruction_mut(switch)
        {
            *default = Some(default_block);
        }
        self.new_block(false)?;

        self.visit(body, ctx)?;
        let after = self.new_block(true)?;

        let explicit_default = self
            .program
            .control_flow
            .target(node, &Label::SwitchDefault);
        match explicit_default {
            Some(target) => {
                let block = self.target_block(node, &Label::SwitchDefault, target)?;
                self.add_edge(default_block, block)?;
            }
            None => self.add_edge(default_block, after)?,
        }

        let mut resolved = Vec::with_capacity(cases.len());
        for (case, label, target) in cases {
            let block = self.target_block(node, &label, target)?;
            resolved.push((case, block));
            self.add_pre_edge(node, target, false)?;
        }
        trace::trace!("switch {} has {} dense cases", node, resolved.len());
        if let Some(Instruction::Switch { cases, .. }) = self.state_mut()?.cfg.instruction_mut(switch)
        {
            *cases = resolved;
        }
        Ok(())
    }

    fn lower_switch_as_branches(
        &mut self,
        node: NodeId,
        value: NodeId,
        body: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        self.add_pre_node(node, ctx.unwind)?;
        let value = self.value_of(value, ctx)?;

        let targets = self.program.control_flow.targets(node);
        let mut tests = Vec::new();
        for (label, target) in &targets {
            let Label::Case(case) = label else {
                continue;
            };
            let case_value = self.value_of(*case, ctx)?;
            self.emit(
                node,
                Instruction::ConditionalBranch {
                    op: ConditionOperator::Eq,
                    left: value,
                    right: case_value,
                    target: None,
                },
            )?;
            tests.push((label.clone(), *target, self.current_block()?));
            self.new_block(true)?;
        }

        let default_goto = self.current_block()?;
        self.emit(node, Instruction::Goto { target: None })?;
        self.new_block(false)?;

        self.visit(body, ctx)?;
        let after = self.new_block(true)?;

        for (label, target, block) in tests {
            let destination = self.target_block(node, &label, target)?;
            self.add_edge(block, destination)?;
        }
        match self
            .program
            .control_flow
            .target(node, &Label::SwitchDefault)
        {
            Some(target) => {
                let destination = self.target_block(node, &Label::SwitchDefault, target)?;
                self.add_edge(default_goto, destination)
            }
            None => self.add_edge(default_goto, after),
        }
    }

    pub(super) fn lower_return(
        &mut self,
        node: NodeId,
        value: Option<NodeId>,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let value = match value {
            Some(value) => Some(self.value_of(value, ctx)?),
            None => None,
        };
        self.emit(node, Instruction::Return { value })?;
        self.add_pre_node(node, ctx.unwind)?;
        self.new_block(false)?;
        self.add_pre_edge_to_exit(node, false)
    }

    pub(super) fn lower_throw(
        &mut self,
        node: NodeId,
        value: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let exception = self.value_of(value, ctx)?;
        let throw = self.instructions.throw(exception);
        self.emit(node, throw)?;
        self.add_pre_node(node, ctx.unwind)?;
        self.new_block(false)?;

        let targets = self.program.control_flow.targets(node);
        if targets.is_empty() {
            return self.add_pre_edge_to_exit(node, true);
        }
        for (_, target) in targets {
            match target {
                Target::ExceptionToExit => self.add_pre_edge_to_exit(node, true)?,
                Target::Node(_) => self.add_pre_edge(node, target, true)?,
            }
        }
        Ok(())
    }

    pub(super) fn lower_try(
        &mut self,
        node: NodeId,
        body: NodeId,
        catch: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        self.visit(body, ctx)?;
        let end_of_try = self.current_block()?;

        let cfg = &self.state()?.cfg;
        let reachable = self
            .program
            .ast
            .subtree(catch)
            .into_iter()
            .any(|candidate| cfg.has_delayed(candidate));
        if !reachable {
            self.diagnose(node, "dead catch block".into());
            return Ok(());
        }

        let mut skip = false;
        if !self.current_is_dead()? {
            skip = true;
            self.emit(node, Instruction::Goto { target: None })?;
            self.new_block(false)?;
        }

        self.visit(catch, ctx)?;
        if !self.current_is_dead()? {
            self.new_block(true)?;
        }

        if skip {
            let after = self.current_block()?;
            self.add_edge(end_of_try, after)?;
        }
        Ok(())
    }

    pub(super) fn lower_catch(
        &mut self,
        node: NodeId,
        name: &str,
        body: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        if !self.program.control_flow.has_sources(node) {
            trace::trace!("catch {} is never reached", node);
            return Ok(());
        }

        self.state_mut()?.cfg.set_current_handler();
        let symbol = match self.scopes.scope(ctx.scope).get(name) {
            Some(symbol) => symbol,
            None => self
                .scopes
                .declare(ctx.scope, &DeclaredSymbol::final_(name))?,
        };
        let dest = self.symbol_value(symbol)?;
        let block = self.current_block()?;
        self.emit(node, Instruction::GetCaughtException { dest, block })?;
        self.add_pre_node(node, ctx.unwind)?;
        self.sync_exposed(node, name, dest, ctx)?;

        let declared = self.program.node_types.get(&node).map(String::as_str);
        let catch_type = self.types.catch_type(declared);
        self.state_mut()?
            .catch_types
            .entry(block)
            .or_default()
            .push(catch_type);

        self.visit(body, ctx)?;
        Ok(())
    }

    /// Protected region: `body` runs with `cleanup` pending, then `cleanup` runs on the normal
    /// path. Every other way out of `body` gets its own copy of the cleanup.
    pub(super) fn lower_unwind(
        &mut self,
        body: NodeId,
        cleanup: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let region = self.unwinds.push(cleanup, ctx.clone());
        trace::trace!("entering protected region {}", region);
        self.visit(body, &ctx.with_unwind(region))?;
        self.visit(cleanup, ctx)?;
        Ok(())
    }
}

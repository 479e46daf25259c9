use indexmap::IndexMap;
use name_derive::NameReflectable;

use crate::{
    config::TranslatorConfig,
    frontend::{
        ast::{
            cloner::clone_subtree, BinaryOperator, Constant, DeclaredSymbol, Entity, EntityId,
            EntityKind, NodeId, NodeKind, Program,
        },
        sourceloc::SourceLoc,
    },
    midend::{
        ir::{Instruction, ValueId},
        lexical::{Access, ExposedName},
        linearizer::{
            collaborators::{GenericInstructions, InstructionFactory, NominalTypes, TypeResolver},
            exposed_names::ExposedNames,
            functionwalkcontext::EntityWalkState,
            translation::Translation,
            unwind::UnwindStates,
            walkcontext::WalkContext,
            Diagnostic, Position, TranslationError, TranslationResult,
        },
        symtab::{ScopeId, ScopeKind, Scopes, SymbolError, SymbolId},
    },
    trace,
};

static GENERIC_INSTRUCTIONS: GenericInstructions = GenericInstructions;
static NOMINAL_TYPES: NominalTypes = NominalTypes;

/// Walks a [`Program`] from its root entity and builds one graph per script and function.
pub struct Translator<'c> {
    pub(super) program: Program,
    pub(super) config: TranslatorConfig,
    pub(super) instructions: &'c dyn InstructionFactory,
    pub(super) types: &'c dyn TypeResolver,
    pub(super) scopes: Scopes,
    /// Qualified name of every entity.
    pub(super) names: IndexMap<EntityId, String>,
    pub(super) exposed: ExposedNames,
    pub(super) unwinds: UnwindStates,
    /// Entities being walked, innermost last.
    pub(super) states: Vec<EntityWalkState>,
    pub(super) translation: Translation,
}

impl Translator<'static> {
    pub fn new(program: Program, config: TranslatorConfig) -> Self {
        Self::with_collaborators(program, config, &GENERIC_INSTRUCTIONS, &NOMINAL_TYPES)
    }
}

impl<'c> Translator<'c> {
    pub fn with_collaborators(
        program: Program,
        config: TranslatorConfig,
        instructions: &'c dyn InstructionFactory,
        types: &'c dyn TypeResolver,
    ) -> Self {
        let names = program.qualified_names();
        let exposed = ExposedNames::compute(&program, &names);
        let scopes = Scopes::new(config.implicit_globals);
        Self {
            program,
            config,
            instructions,
            types,
            scopes,
            names,
            exposed,
            unwinds: UnwindStates::new(),
            states: Vec::new(),
            translation: Translation::default(),
        }
    }

    pub fn translate(mut self) -> TranslationResult<Translation> {
        let root = self.program.root.ok_or(TranslationError::UnknownEntity {
            entity: "<root>".into(),
            position: Position::default(),
        })?;

        let context = WalkContext::root(self.scopes.global());
        self.visit_entity(root, &context)?;

        let global = self.scopes.global();
        self.translation.globals = self
            .scopes
            .scope(global)
            .names()
            .map(|(name, _)| name.clone())
            .collect();
        Ok(self.translation)
    }

    pub(super) fn state(&self) -> TranslationResult<&EntityWalkState> {
        self.states.last().ok_or_else(outside_code)
    }

    pub(super) fn state_mut(&mut self) -> TranslationResult<&mut EntityWalkState> {
        self.states.last_mut().ok_or_else(outside_code)
    }

    fn state_named_mut(&mut self, name: &str) -> Option<&mut EntityWalkState> {
        self.states.iter_mut().rev().find(|state| state.name == name)
    }

    pub(super) fn emit(&mut self, node: NodeId, instruction: Instruction) -> TranslationResult<usize> {
        let position = self.program.position_of(node);
        self.emit_at(instruction, position)
    }

    pub(super) fn emit_at(
        &mut self,
        instruction: Instruction,
        position: Option<SourceLoc>,
    ) -> TranslationResult<usize> {
        Ok(self.state_mut()?.cfg.add_instruction(instruction, position))
    }

    pub(super) fn temp(&mut self, ctx: &WalkContext) -> TranslationResult<ValueId> {
        Ok(self.scopes.allocate_temp(ctx.scope)?)
    }

    pub(super) fn constant(&mut self, ctx: &WalkContext, constant: &Constant) -> TranslationResult<ValueId> {
        Ok(self.scopes.constant_value(ctx.scope, constant)?)
    }

    pub(super) fn kind_of(&self, node: NodeId) -> TranslationResult<&NodeKind> {
        self.program
            .ast
            .kind(node)
            .ok_or(TranslationError::UnknownNode {
                node,
                position: Position::default(),
            })
    }

    pub(super) fn diagnose(&mut self, node: NodeId, message: String) {
        let position = self.program.position_of(node);
        trace::warning!("{}", message);
        self.translation
            .diagnostics
            .push(Diagnostic::warning(message, position));
    }

    /// Lowers `node` and returns the value it produced, if it is an expression.
    pub(super) fn visit(&mut self, node: NodeId, ctx: &WalkContext) -> TranslationResult<Option<ValueId>> {
        let kind = self.kind_of(node)?.clone();
        self.lower(node, &kind, ctx)
            .map_err(|error| error.located(self.program.position_of(node)))
    }

    pub(super) fn value_of(&mut self, node: NodeId, ctx: &WalkContext) -> TranslationResult<ValueId> {
        self.visit(node, ctx)?
            .ok_or_else(|| TranslationError::MissingValue {
                node,
                position: self.program.position_of(node).into(),
            })
    }

    fn values_of(&mut self, nodes: &[NodeId], ctx: &WalkContext) -> TranslationResult<Vec<ValueId>> {
        nodes.iter().map(|node| self.value_of(*node, ctx)).collect()
    }

    #[tracing::instrument(skip(self, kind, ctx), level = "trace", fields(node_kind = kind.variant_name()))]
    fn lower(
        &mut self,
        node: NodeId,
        kind: &NodeKind,
        ctx: &WalkContext,
    ) -> TranslationResult<Option<ValueId>> {
        match kind {
            NodeKind::Constant(constant) => self.constant(ctx, constant).map(Some),
            NodeKind::Var(name) => self.read_variable(node, name, ctx).map(Some),
            NodeKind::Empty => self.constant(ctx, &Constant::Null).map(Some),
            NodeKind::This => Ok(Some(ValueId::new(1))),
            NodeKind::Unary { op, operand } => {
                let operand = self.value_of(*operand, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::Unary {
                        dest,
                        op: *op,
                        operand,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::Binary { op, left, right } => {
                let left = self.value_of(*left, ctx)?;
                let right = self.value_of(*right, ctx)?;
                self.lower_binary(node, *op, left, right, ctx).map(Some)
            }
            NodeKind::Assign { target, value } => self.lower_assign(node, *target, *value, ctx).map(Some),
            NodeKind::AssignOp {
                target,
                value,
                op,
                pre,
            } => self
                .lower_assign_op(node, *target, *value, *op, *pre, ctx)
                .map(Some),
            NodeKind::Call {
                function,
                name,
                arguments,
            } => self
                .lower_call(node, *function, name.clone(), arguments, ctx)
                .map(Some),
            NodeKind::New {
                type_name,
                arguments,
            } => {
                let arguments = self.values_of(arguments, ctx)?;
                let dest = self.temp(ctx)?;
                let instruction =
                    self.instructions
                        .new_object(dest, self.types.resolve(type_name), arguments);
                self.emit(node, instruction)?;
                Ok(Some(dest))
            }
            NodeKind::ObjectLiteral { object, fields } => {
                let object = self.value_of(*object, ctx)?;
                for (key, value) in fields {
                    let field = self.value_of(*key, ctx)?;
                    let value = self.value_of(*value, ctx)?;
                    self.emit(
                        node,
                        Instruction::FieldWrite {
                            object,
                            field,
                            value,
                        },
                    )?;
                }
                Ok(Some(object))
            }
            NodeKind::ArrayLiteral { array, elements } => {
                let array = self.value_of(*array, ctx)?;
                for (position, element) in elements.iter().enumerate() {
                    let value = self.value_of(*element, ctx)?;
                    let index = self.constant(ctx, &Constant::Int(position as i32))?;
                    self.emit(
                        node,
                        Instruction::ArrayWrite {
                            array,
                            indices: vec![index],
                            value,
                        },
                    )?;
                }
                Ok(Some(array))
            }
            NodeKind::ObjectRef { object, field } => {
                let object = self.value_of(*object, ctx)?;
                let field = self.value_of(*field, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::FieldRead {
                        dest,
                        object,
                        field,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::ArrayRef { array, indices } => {
                let array = self.value_of(*array, ctx)?;
                let indices = self.values_of(indices, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::ArrayRead {
                        dest,
                        array,
                        indices,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::ArrayLength { array } => {
                let array = self.value_of(*array, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(node, Instruction::ArrayLength { dest, array })?;
                Ok(Some(dest))
            }
            NodeKind::EachElementGet { object, previous } => {
                let object = self.value_of(*object, ctx)?;
                let previous = self.value_of(*previous, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::EachElementGet {
                        dest,
                        object,
                        previous,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::EachElementHasNext { object, previous } => {
                let object = self.value_of(*object, ctx)?;
                let previous = self.value_of(*previous, ctx)?;
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::EachElementHasNext {
                        dest,
                        object,
                        previous,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::IsDefined { object, field } => {
                let object = self.value_of(*object, ctx)?;
                let field = match field {
                    Some(field) => Some(self.value_of(*field, ctx)?),
                    None => None,
                };
                let dest = self.temp(ctx)?;
                self.emit(
                    node,
                    Instruction::IsDefined {
                        dest,
                        object,
                        field,
                    },
                )?;
                Ok(Some(dest))
            }
            NodeKind::TypeLiteral(type_name) => {
                let dest = self.temp(ctx)?;
                let type_ref = self.types.resolve(type_name);
                self.emit(node, Instruction::TypeLiteral { dest, type_ref })?;
                Ok(Some(dest))
            }
            NodeKind::Function(entity) => self.lower_function(node, *entity, ctx).map(Some),
            NodeKind::FunctionStmt(entity) => {
                self.lower_function_statement(node, *entity, ctx)?;
                Ok(None)
            }
            NodeKind::Decl { symbol, init } => {
                self.lower_declaration(node, symbol, *init, ctx)?;
                Ok(None)
            }
            NodeKind::Block(children) => {
                for child in children {
                    self.visit(*child, ctx)?;
                }
                Ok(None)
            }
            NodeKind::BlockExpr(children) => {
                let mut last = None;
                for child in children {
                    last = self.visit(*child, ctx)?;
                }
                Ok(last)
            }
            NodeKind::LocalScope(body) => {
                let scope = self.scopes.push_local(ctx.scope);
                self.visit(*body, &ctx.with_scope(scope))
            }
            NodeKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.lower_if(node, *condition, *then, *otherwise, None, ctx)?;
                Ok(None)
            }
            NodeKind::IfExpr {
                condition,
                then,
                otherwise,
            } => {
                let result = self.temp(ctx)?;
                self.lower_if(node, *condition, *then, *otherwise, Some(result), ctx)?;
                Ok(Some(result))
            }
            NodeKind::Loop { condition, body } => {
                self.lower_loop(node, *condition, *body, ctx)?;
                Ok(None)
            }
            NodeKind::Switch { value, body } => {
                self.lower_switch(node, *value, *body, ctx)?;
                Ok(None)
            }
            NodeKind::Label { body, .. } => {
                self.lower_label(node, ctx)?;
                match body {
                    Some(body) => self.visit(*body, ctx),
                    None => Ok(None),
                }
            }
            NodeKind::Goto => {
                self.lower_goto(node, ctx)?;
                Ok(None)
            }
            NodeKind::IfGoto { op, left, right } => {
                self.lower_if_goto(node, *op, *left, *right, ctx)?;
                Ok(None)
            }
            NodeKind::Try { body, catch } => {
                self.lower_try(node, *body, *catch, ctx)?;
                Ok(None)
            }
            NodeKind::Catch { name, body } => {
                self.lower_catch(node, name, *body, ctx)?;
                Ok(None)
            }
            NodeKind::Unwind { body, cleanup } => {
                self.lower_unwind(*body, *cleanup, ctx)?;
                Ok(None)
            }
            NodeKind::Return(value) => {
                self.lower_return(node, *value, ctx)?;
                Ok(None)
            }
            NodeKind::Throw(value) => {
                self.lower_throw(node, *value, ctx)?;
                Ok(None)
            }
            NodeKind::GetCaughtException(name) => {
                let symbol = self.declare_caught(name, ctx)?;
                let dest = self.symbol_value(symbol)?;
                let block = self.state()?.cfg.current();
                self.emit(node, Instruction::GetCaughtException { dest, block })?;
                Ok(None)
            }
            NodeKind::Assert {
                condition,
                assumed,
            } => {
                let condition = self.value_of(*condition, ctx)?;
                self.emit(
                    node,
                    Instruction::Assert {
                        condition,
                        assumed: *assumed,
                    },
                )?;
                Ok(None)
            }
            NodeKind::Echo(values) => {
                let values = self.values_of(values, ctx)?;
                self.emit(node, Instruction::Echo { values })?;
                Ok(None)
            }
            NodeKind::Primitive(arguments) => {
                let arguments = self.values_of(arguments, ctx)?;
                let dest = self.temp(ctx)?;
                let instruction = self.instructions.primitive(dest, arguments);
                self.emit(node, instruction)?;
                Ok(Some(dest))
            }
            NodeKind::Include(name) => self.lower_include(node, name, ctx),
        }
    }

    /// Emits a binary operation. Division and remainder with mapped targets end their block and
    /// get exceptional edges to each target.
    pub(super) fn lower_binary(
        &mut self,
        node: NodeId,
        op: BinaryOperator,
        left: ValueId,
        right: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        let dest = self.temp(ctx)?;
        let targets = self.program.control_flow.targets(node);
        let may_fault = op.may_fault() && !targets.is_empty();
        self.emit(
            node,
            Instruction::Binary {
                dest,
                op,
                left,
                right,
                may_fault,
            },
        )?;

        if may_fault {
            self.add_pre_node(node, ctx.unwind)?;
            self.state_mut()?.cfg.new_block(true);
            for (_, target) in targets {
                self.add_pre_edge(node, target, true)?;
            }
        }
        Ok(dest)
    }

    fn lower_assign(
        &mut self,
        node: NodeId,
        target: NodeId,
        value: NodeId,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        match self.kind_of(target)?.clone() {
            NodeKind::Var(name) => {
                let value = self.value_of(value, ctx)?;
                self.assign_value(node, &name, value, ctx)?;
                Ok(value)
            }
            NodeKind::ObjectRef { object, field } => {
                let object = self.value_of(object, ctx)?;
                let field = self.value_of(field, ctx)?;
                let value = self.value_of(value, ctx)?;
                self.emit(
                    node,
                    Instruction::FieldWrite {
                        object,
                        field,
                        value,
                    },
                )?;
                Ok(value)
            }
            NodeKind::ArrayRef { array, indices } => {
                let array = self.value_of(array, ctx)?;
                let indices = self.values_of(&indices, ctx)?;
                let value = self.value_of(value, ctx)?;
                self.emit(
                    node,
                    Instruction::ArrayWrite {
                        array,
                        indices,
                        value,
                    },
                )?;
                Ok(value)
            }
            _ => Err(TranslationError::InvalidAssignment {
                node: target,
                position: Position::default(),
            }),
        }
    }

    fn lower_assign_op(
        &mut self,
        node: NodeId,
        target: NodeId,
        value: NodeId,
        op: BinaryOperator,
        pre: bool,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        enum Place {
            Var(String),
            Field(ValueId, ValueId),
            Element(ValueId, Vec<ValueId>),
        }

        let (place, old) = match self.kind_of(target)?.clone() {
            NodeKind::Var(name) => {
                let old = self.read_variable(target, &name, ctx)?;
                (Place::Var(name), old)
            }
            NodeKind::ObjectRef { object, field } => {
                let object = self.value_of(object, ctx)?;
                let field = self.value_of(field, ctx)?;
                let old = self.temp(ctx)?;
                self.emit(
                    target,
                    Instruction::FieldRead {
                        dest: old,
                        object,
                        field,
                    },
                )?;
                (Place::Field(object, field), old)
            }
            NodeKind::ArrayRef { array, indices } => {
                let array = self.value_of(array, ctx)?;
                let indices = self.values_of(&indices, ctx)?;
                let old = self.temp(ctx)?;
                self.emit(
                    target,
                    Instruction::ArrayRead {
                        dest: old,
                        array,
                        indices: indices.clone(),
                    },
                )?;
                (Place::Element(array, indices), old)
            }
            _ => {
                return Err(TranslationError::InvalidAssignment {
                    node: target,
                    position: Position::default(),
                })
            }
        };

        let copy = if pre {
            None
        } else {
            let copy = self.temp(ctx)?;
            self.emit(
                node,
                Instruction::Assign {
                    dest: copy,
                    source: old,
                },
            )?;
            Some(copy)
        };

        let operand = self.value_of(value, ctx)?;
        let updated = self.lower_binary(node, op, old, operand, ctx)?;
        match place {
            Place::Var(name) => self.assign_value(node, &name, updated, ctx)?,
            Place::Field(object, field) => {
                self.emit(
                    node,
                    Instruction::FieldWrite {
                        object,
                        field,
                        value: updated,
                    },
                )?;
            }
            Place::Element(array, indices) => {
                self.emit(
                    node,
                    Instruction::ArrayWrite {
                        array,
                        indices,
                        value: updated,
                    },
                )?;
            }
        }
        Ok(copy.unwrap_or(updated))
    }

    fn lower_call(
        &mut self,
        node: NodeId,
        function: NodeId,
        name: Option<String>,
        arguments: &[NodeId],
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        let function = self.value_of(function, ctx)?;
        let arguments = self.values_of(arguments, ctx)?;
        let dest = self.temp(ctx)?;
        let exception = self.temp(ctx)?;

        let call = self
            .instructions
            .call(dest, exception, function, arguments, name);
        self.emit(node, call)?;
        self.add_pre_node(node, ctx.unwind)?;

        if self.config.calls_may_throw {
            self.state_mut()?.cfg.new_block(true);
            let targets = self.program.control_flow.targets(node);
            if targets.is_empty() {
                self.add_pre_edge_to_exit(node, true)?;
            }
            for (_, target) in targets {
                self.add_pre_edge(node, target, true)?;
            }
        }

        if self.config.local_values_for_lexical_vars {
            let index = self.emit(
                node,
                Instruction::LexicalRead {
                    accesses: Vec::new(),
                },
            )?;
            self.state_mut()?.pending_lexical_reads.push(index);
        }
        Ok(dest)
    }

    fn lower_declaration(
        &mut self,
        node: NodeId,
        symbol: &DeclaredSymbol,
        init: Option<NodeId>,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let Some(init) = init else {
            let declared = self.scopes.declare(ctx.scope, symbol)?;
            self.record_default(declared, symbol, ctx)?;
            return Ok(());
        };

        let value = self.value_of(init, ctx)?;
        if self.scopes.defined_here(ctx.scope, &symbol.name).is_some() {
            self.scopes.declare(ctx.scope, symbol)?;
            return self.local_write(node, &symbol.name, value, ctx);
        }

        // a value some other name already owns gets copied into a slot of its own
        if self.scopes.is_named_value(ctx.scope, value) {
            let declared = self.scopes.declare(ctx.scope, symbol)?;
            self.record_default(declared, symbol, ctx)?;
            self.local_write(node, &symbol.name, value, ctx)
        } else {
            let declared = self.scopes.declare_with_value(ctx.scope, symbol, value)?;
            self.record_default(declared, symbol, ctx)?;
            self.sync_exposed(node, &symbol.name, value, ctx)
        }
    }

    fn record_default(
        &mut self,
        symbol: SymbolId,
        declared: &DeclaredSymbol,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        if !self.config.default_init_values {
            return Ok(());
        }
        if let (Some(default), Some(value)) = (&declared.default_value, self.scopes.symbol(symbol).value)
        {
            self.scopes.set_default(ctx.scope, value, default.clone())?;
        }
        Ok(())
    }

    fn declare_caught(&mut self, name: &str, ctx: &WalkContext) -> TranslationResult<SymbolId> {
        match self.scopes.defined_here(ctx.scope, name) {
            Some(existing) => Ok(existing),
            None => Ok(self.scopes.declare(ctx.scope, &DeclaredSymbol::final_(name))?),
        }
    }

    pub(super) fn symbol_value(&self, symbol: SymbolId) -> TranslationResult<ValueId> {
        let symbol = self.scopes.symbol(symbol);
        symbol.value.ok_or_else(|| {
            let kind = self.scopes.scope(symbol.defining_scope).kind;
            SymbolError::NoValueNumbers(kind).into()
        })
    }

    fn lower_function(
        &mut self,
        node: NodeId,
        entity: EntityId,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        let qualified = self.translate_code_entity(entity, ctx)?;
        let dest = self.temp(ctx)?;
        let exception = self.temp(ctx)?;
        let instruction = self
            .instructions
            .materialize_function(dest, exception, &qualified);
        self.emit(node, instruction)?;
        Ok(dest)
    }

    fn lower_function_statement(
        &mut self,
        node: NodeId,
        entity: EntityId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let value = self.lower_function(node, entity, ctx)?;
        let name = self
            .program
            .entity(entity)
            .map(|entity| entity.name.clone())
            .ok_or_else(|| unknown_entity(entity))?;

        let existing = self.scopes.scope(ctx.scope).get(&name).filter(|symbol| {
            !self.scopes.is_global(*symbol) && !self.scopes.is_lexically_scoped(ctx.scope, *symbol)
        });
        if existing.is_some() {
            return self.assign_value(node, &name, value, ctx);
        }

        if self.state()?.kind == EntityKind::Script
            && self.config.top_level_functions_in_global_scope
        {
            let global = self.scopes.global();
            self.scopes.declare(global, &DeclaredSymbol::new(&name))?;
            return self.global_write(node, &name, value);
        }

        self.scopes
            .declare_with_value(ctx.scope, &DeclaredSymbol::final_(&name), value)?;
        self.sync_exposed(node, &name, value, ctx)
    }

    fn lower_include(
        &mut self,
        node: NodeId,
        name: &str,
        ctx: &WalkContext,
    ) -> TranslationResult<Option<ValueId>> {
        let body = self
            .program
            .entities
            .iter()
            .find(|entity| entity.kind == EntityKind::Macro && entity.name == name)
            .and_then(|entity| entity.body);
        let Some(body) = body else {
            self.diagnose(node, format!("unresolved include {}", name));
            return Ok(None);
        };

        match clone_subtree(&mut self.program, body, |_, target| *target) {
            Some(cloned) => self.visit(cloned.root, ctx),
            None => Ok(None),
        }
    }

    // variables

    fn exposed_here(&self, name: &str) -> TranslationResult<bool> {
        Ok(!self.config.local_values_for_lexical_vars
            && self.exposed.is_exposed(&self.state()?.name, name))
    }

    pub(super) fn read_variable(
        &mut self,
        node: NodeId,
        name: &str,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        let symbol = self.scopes.lookup(ctx.scope, name)?;
        if self.scopes.is_global(symbol) {
            self.global_read(node, name, ctx)
        } else if self.scopes.is_lexically_scoped(ctx.scope, symbol) {
            self.lexical_read(node, name, ctx)
        } else if self.exposed_here(name)? {
            self.lexical_read(node, name, ctx)
        } else {
            self.symbol_value(symbol)
        }
    }

    pub(super) fn assign_value(
        &mut self,
        node: NodeId,
        name: &str,
        value: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let symbol = self.scopes.lookup(ctx.scope, name)?;
        if self.scopes.is_global(symbol) {
            self.global_write(node, name, value)
        } else if self.scopes.is_lexically_scoped(ctx.scope, symbol) {
            self.lexical_write(node, name, value, ctx)
        } else {
            self.local_write(node, name, value, ctx)
        }
    }

    fn global_read(&mut self, node: NodeId, name: &str, ctx: &WalkContext) -> TranslationResult<ValueId> {
        let dest = self.temp(ctx)?;
        if self.config.globals_as_lexical {
            let access = Access::new(name, None, dest);
            self.emit(
                node,
                Instruction::LexicalRead {
                    accesses: vec![access.clone()],
                },
            )?;
            self.state_mut()?.exposure.add_access(access);
        } else {
            self.emit(
                node,
                Instruction::GlobalRead {
                    dest,
                    name: name.into(),
                },
            )?;
        }
        Ok(dest)
    }

    fn global_write(&mut self, node: NodeId, name: &str, value: ValueId) -> TranslationResult<()> {
        if self.config.globals_as_lexical {
            let access = Access::new(name, None, value);
            self.emit(
                node,
                Instruction::LexicalWrite {
                    accesses: vec![access.clone()],
                },
            )?;
            self.state_mut()?.exposure.add_access(access);
        } else {
            self.emit(
                node,
                Instruction::GlobalWrite {
                    name: name.into(),
                    value,
                },
            )?;
        }
        Ok(())
    }

    fn local_write(
        &mut self,
        node: NodeId,
        name: &str,
        value: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let symbol = self.scopes.lookup(ctx.scope, name)?;
        let slot = self.symbol_value(symbol)?;
        if slot != value {
            self.emit(
                node,
                Instruction::Assign {
                    dest: slot,
                    source: value,
                },
            )?;
        }
        self.sync_exposed(node, name, slot, ctx)
    }

    /// Mirrors a local definition of an exposed name into its lexical cell.
    pub(super) fn sync_exposed(
        &mut self,
        node: NodeId,
        name: &str,
        value: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        if self.exposed_here(name)? {
            self.lexical_write(node, name, value, ctx)?;
        }
        Ok(())
    }

    /// Entity that declares the symbol `name` resolves to from `scope`, with the declaring scope
    /// and the value number the name has there.
    fn definer_of(&mut self, scope: ScopeId, name: &str) -> TranslationResult<(String, ScopeId, ValueId)> {
        let symbol = self.scopes.lookup(scope, name)?;
        let defining_scope = self.scopes.symbol(symbol).defining_scope;
        let definer = self
            .scopes
            .entity_name(defining_scope)
            .map(String::from)
            .ok_or_else(|| SymbolError::Undefined(name.into()))?;
        let defining_value = self
            .scopes
            .scope(defining_scope)
            .get(name)
            .and_then(|symbol| self.scopes.symbol(symbol).value)
            .ok_or_else(|| SymbolError::Undefined(name.into()))?;
        Ok((definer, defining_scope, defining_value))
    }

    fn expose(&mut self, entity: &str, exposed: ExposedName, value: ValueId, is_write: bool) {
        if let Some(state) = self.state_named_mut(entity) {
            state.exposure.expose(exposed, value, is_write);
        }
    }

    pub(super) fn lexical_read(
        &mut self,
        node: NodeId,
        name: &str,
        ctx: &WalkContext,
    ) -> TranslationResult<ValueId> {
        let (definer, defining_scope, defining_value) = self.definer_of(ctx.scope, name)?;
        self.expose(&definer, ExposedName::new(name, &definer), defining_value, false);

        let result = if self.config.local_values_for_lexical_vars {
            let symbol = self.scopes.lookup(ctx.scope, name)?;
            self.symbol_value(symbol)?
        } else {
            self.temp(ctx)?
        };
        self.emit(
            node,
            Instruction::LexicalRead {
                accesses: vec![Access::new(name, Some(&definer), result)],
            },
        )?;
        self.mark_exposed(name, &definer, ctx.scope, defining_scope, false)?;
        Ok(result)
    }

    pub(super) fn lexical_write(
        &mut self,
        node: NodeId,
        name: &str,
        value: ValueId,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        let (definer, defining_scope, defining_value) = self.definer_of(ctx.scope, name)?;
        self.expose(&definer, ExposedName::new(name, &definer), defining_value, true);

        if self.config.local_values_for_lexical_vars {
            let symbol = self.scopes.lookup(ctx.scope, name)?;
            let slot = self.symbol_value(symbol)?;
            if slot != value {
                self.emit(
                    node,
                    Instruction::Assign {
                        dest: slot,
                        source: value,
                    },
                )?;
            }
        }
        self.emit(
            node,
            Instruction::LexicalWrite {
                accesses: vec![Access::new(name, Some(&definer), value)],
            },
        )?;
        self.mark_exposed(name, &definer, ctx.scope, defining_scope, true)
    }

    /// Records the name as exposed in every entity between the access and its definer, since a
    /// call into a nested function may update it behind any of them.
    fn mark_exposed(
        &mut self,
        name: &str,
        definer: &str,
        from: ScopeId,
        defining_scope: ScopeId,
        is_write: bool,
    ) -> TranslationResult<()> {
        let mut current = from;
        while current != defining_scope {
            let symbol = self.scopes.lookup(current, name)?;
            let entity = self.scopes.entity_name(current).map(String::from);
            if let (Some(entity), Some(value)) = (entity, self.scopes.symbol(symbol).value) {
                if entity != definer {
                    if let Some(state) = self.state_named_mut(&entity) {
                        state
                            .exposure
                            .expose(ExposedName::new(name, definer), value, is_write);
                        state.exposure.add_access(Access::new(name, Some(definer), value));
                    }
                }
            }

            match self.scopes.scope(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(())
    }

    // entities

    fn visit_entity(&mut self, id: EntityId, ctx: &WalkContext) -> TranslationResult<()> {
        let entity = self
            .program
            .entity(id)
            .cloned()
            .ok_or_else(|| unknown_entity(id))?;

        match entity.kind {
            EntityKind::File => {
                for child in &entity.scoped {
                    self.visit_entity(*child, ctx)?;
                }
            }
            EntityKind::Script | EntityKind::Function => {
                self.translate_code_entity(id, ctx)?;
            }
            EntityKind::Type => {
                self.translation
                    .types
                    .entry(entity.name.clone())
                    .or_default();
                let scope = self.scopes.push_type_scope(ctx.scope, &entity.name);
                let type_context = ctx.for_type(&entity.name, scope);
                for child in &entity.scoped {
                    self.visit_entity(*child, &type_context)?;
                }
            }
            EntityKind::Field => {
                let Some(type_name) = ctx.type_name.clone() else {
                    return Err(TranslationError::NotCodeEntity {
                        entity: entity.name,
                        position: entity.position.into(),
                    });
                };
                self.scopes
                    .declare(ctx.scope, &DeclaredSymbol::new(&entity.name))?;
                self.translation
                    .types
                    .entry(type_name)
                    .or_default()
                    .push(entity.name);
            }
            EntityKind::Global => {
                let global = self.scopes.global();
                self.scopes
                    .declare(global, &DeclaredSymbol::new(&entity.name))?;
            }
            EntityKind::Macro => (),
        }
        Ok(())
    }

    /// Translates a script or function nested at `ctx` and returns its qualified name.
    pub(super) fn translate_code_entity(
        &mut self,
        id: EntityId,
        ctx: &WalkContext,
    ) -> TranslationResult<String> {
        let entity = self
            .program
            .entity(id)
            .cloned()
            .ok_or_else(|| unknown_entity(id))?;
        let qualified = self
            .names
            .get(&id)
            .cloned()
            .ok_or_else(|| unknown_entity(id))?;
        let scope_kind = match entity.kind {
            EntityKind::Script => ScopeKind::Script,
            EntityKind::Function => ScopeKind::Function,
            _ => {
                return Err(TranslationError::NotCodeEntity {
                    entity: entity.name,
                    position: entity.position.into(),
                })
            }
        };
        if self.translation.entities.contains_key(&qualified)
            || self.states.iter().any(|state| state.entity == id)
        {
            return Ok(qualified);
        }

        let _span = trace::span_auto!(trace::Level::DEBUG, "translate entity", entity = %qualified);

        let mut parameters = vec!["this".to_string()];
        parameters.extend(entity.arguments.iter().cloned());
        let scope = self
            .scopes
            .push_entity_scope(ctx.scope, scope_kind, &qualified, &parameters)
            .map_err(|error| TranslationError::from(error).located(entity.position.clone()))?;
        let entity_context = ctx.for_entity(id, scope);

        self.states
            .push(EntityWalkState::new(id, &qualified, entity.kind, scope));
        let walked = self.walk_entity_body(&entity, &qualified, &entity_context);
        let state = self.states.pop().ok_or_else(outside_code)?;
        walked?;

        let translated = state
            .finish(&self.scopes, entity.position.clone())
            .map_err(|error| error.located(entity.position.clone()))?;
        self.translation
            .entities
            .insert(qualified.clone(), translated);
        Ok(qualified)
    }

    fn walk_entity_body(
        &mut self,
        entity: &Entity,
        qualified: &str,
        ctx: &WalkContext,
    ) -> TranslationResult<()> {
        self.state_mut()?.cfg.new_block(true);
        for child in &entity.scoped {
            self.visit_entity(*child, ctx)?;
        }
        self.prologue(entity, qualified, ctx)?;
        if let Some(body) = entity.body {
            self.visit(body, ctx)?;
        }
        Ok(())
    }

    /// Copies every exposed parameter into its lexical cell.
    fn prologue(&mut self, entity: &Entity, qualified: &str, ctx: &WalkContext) -> TranslationResult<()> {
        let exposed: Vec<String> = self
            .exposed
            .of(qualified)
            .filter(|name| entity.arguments.contains(name))
            .cloned()
            .collect();

        for argument in exposed {
            let symbol = self.scopes.lookup(ctx.scope, &argument)?;
            let value = self.symbol_value(symbol)?;
            self.state_mut()?.exposure.expose(
                ExposedName::new(&argument, qualified),
                value,
                true,
            );
            self.emit_at(
                Instruction::LexicalWrite {
                    accesses: vec![Access::new(&argument, Some(qualified), value)],
                },
                entity.position.clone(),
            )?;
        }
        Ok(())
    }
}

fn outside_code() -> TranslationError {
    TranslationError::NotCodeEntity {
        entity: "<top level>".into(),
        position: Position::default(),
    }
}

fn unknown_entity(id: EntityId) -> TranslationError {
    TranslationError::UnknownEntity {
        entity: id.to_string(),
        position: Position::default(),
    }
}

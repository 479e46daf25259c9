use crate::frontend::{
    ast::{
        BinaryOperator, Constant, DeclaredSymbol, Entity, EntityId, EntityKind, Label, NodeId,
        NodeKind, Program, Target, UnaryOperator,
    },
    sourceloc::SourceLoc,
};

pub fn test_loc(line: usize, col: usize) -> SourceLoc {
    SourceLoc::new("test_module", line, col)
}

/// Assembles a [`Program`] node by node, recording control-flow edges alongside.
#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Program {
        self.program
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        self.program.ast.add(kind)
    }

    pub fn at(&mut self, node: NodeId, line: usize, col: usize) -> NodeId {
        self.program.positions.insert(node, test_loc(line, col));
        node
    }

    pub fn flow(&mut self, source: NodeId, label: Label, target: Target) {
        self.program.control_flow.add(source, label, target);
    }

    /// Exceptional edge from `source` to the catch clause `catch`.
    pub fn throws_to(&mut self, source: NodeId, catch: NodeId, type_name: &str) {
        self.flow(
            source,
            Label::Exception(type_name.into()),
            Target::Node(catch),
        );
    }

    pub fn throws_to_exit(&mut self, source: NodeId, type_name: &str) {
        self.flow(
            source,
            Label::Exception(type_name.into()),
            Target::ExceptionToExit,
        );
    }

    pub fn node_type(&mut self, node: NodeId, type_name: &str) {
        self.program.node_types.insert(node, type_name.into());
    }

    // entities

    pub fn entity(&mut self, entity: Entity) -> EntityId {
        self.program.add_entity(entity)
    }

    pub fn script(&mut self, name: &str, body: NodeId) -> EntityId {
        let mut entity = Entity::new(name, EntityKind::Script);
        entity.body = Some(body);
        let id = self.entity(entity);
        if self.program.root.is_none() {
            self.program.root = Some(id);
        }
        id
    }

    pub fn function_entity(&mut self, name: &str, arguments: &[&str], body: NodeId) -> EntityId {
        let mut entity = Entity::new(name, EntityKind::Function);
        entity.arguments = arguments.iter().map(|argument| argument.to_string()).collect();
        entity.body = Some(body);
        self.entity(entity)
    }

    pub fn set_root(&mut self, root: EntityId) {
        self.program.root = Some(root);
    }

    pub fn add_scoped(&mut self, parent: EntityId, child: EntityId) {
        if let Some(entity) = self.program.entities.get_mut(parent.index()) {
            entity.scoped.push(child);
        }
    }

    // expressions

    pub fn constant(&mut self, constant: Constant) -> NodeId {
        self.node(NodeKind::Constant(constant))
    }

    pub fn int(&mut self, value: i32) -> NodeId {
        self.constant(Constant::Int(value))
    }

    pub fn double(&mut self, value: f64) -> NodeId {
        self.constant(Constant::Double(value))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.constant(Constant::Str(value.into()))
    }

    pub fn bool(&mut self, value: bool) -> NodeId {
        self.constant(Constant::Bool(value))
    }

    pub fn var(&mut self, name: &str) -> NodeId {
        self.node(NodeKind::Var(name.into()))
    }

    pub fn empty(&mut self) -> NodeId {
        self.node(NodeKind::Empty)
    }

    pub fn this(&mut self) -> NodeId {
        self.node(NodeKind::This)
    }

    pub fn binary(&mut self, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: NodeId) -> NodeId {
        self.node(NodeKind::Unary { op, operand })
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.node(NodeKind::Assign { target, value })
    }

    pub fn assign_var(&mut self, name: &str, value: NodeId) -> NodeId {
        let target = self.var(name);
        self.assign(target, value)
    }

    pub fn assign_op(
        &mut self,
        target: NodeId,
        value: NodeId,
        op: BinaryOperator,
        pre: bool,
    ) -> NodeId {
        self.node(NodeKind::AssignOp {
            target,
            value,
            op,
            pre,
        })
    }

    pub fn call(&mut self, function: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Call {
            function,
            name: None,
            arguments,
        })
    }

    pub fn call_var(&mut self, name: &str, arguments: Vec<NodeId>) -> NodeId {
        let function = self.var(name);
        self.node(NodeKind::Call {
            function,
            name: Some(name.into()),
            arguments,
        })
    }

    pub fn new_object(&mut self, type_name: &str, arguments: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::New {
            type_name: type_name.into(),
            arguments,
        })
    }

    pub fn object_ref(&mut self, object: NodeId, field: &str) -> NodeId {
        let field = self.string(field);
        self.node(NodeKind::ObjectRef { object, field })
    }

    pub fn array_ref(&mut self, array: NodeId, indices: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::ArrayRef { array, indices })
    }

    pub fn function(&mut self, entity: EntityId) -> NodeId {
        self.node(NodeKind::Function(entity))
    }

    pub fn function_stmt(&mut self, entity: EntityId) -> NodeId {
        self.node(NodeKind::FunctionStmt(entity))
    }

    // statements

    pub fn decl(&mut self, name: &str, init: Option<NodeId>) -> NodeId {
        self.decl_symbol(DeclaredSymbol::new(name), init)
    }

    pub fn decl_symbol(&mut self, symbol: DeclaredSymbol, init: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Decl { symbol, init })
    }

    pub fn block(&mut self, children: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Block(children))
    }

    pub fn block_expr(&mut self, children: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::BlockExpr(children))
    }

    pub fn local_scope(&mut self, body: NodeId) -> NodeId {
        self.node(NodeKind::LocalScope(body))
    }

    pub fn if_(&mut self, condition: NodeId, then: NodeId, otherwise: Option<NodeId>) -> NodeId {
        self.node(NodeKind::If {
            condition,
            then,
            otherwise,
        })
    }

    pub fn if_expr(&mut self, condition: NodeId, then: NodeId, otherwise: Option<NodeId>) -> NodeId {
        self.node(NodeKind::IfExpr {
            condition,
            then,
            otherwise,
        })
    }

    pub fn loop_(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.node(NodeKind::Loop { condition, body })
    }

    /// A switch whose `cases` pair a case-value node with the labeled statement it jumps to.
    pub fn switch(
        &mut self,
        value: NodeId,
        body: NodeId,
        cases: &[(NodeId, NodeId)],
        default: Option<NodeId>,
    ) -> NodeId {
        let switch = self.node(NodeKind::Switch { value, body });
        for (case, target) in cases {
            self.flow(switch, Label::Case(*case), Target::Node(*target));
        }
        if let Some(default) = default {
            self.flow(switch, Label::SwitchDefault, Target::Node(default));
        }
        switch
    }

    pub fn label(&mut self, name: &str) -> NodeId {
        self.node(NodeKind::Label {
            name: Some(name.into()),
            body: None,
        })
    }

    pub fn goto_(&mut self, target: NodeId) -> NodeId {
        let goto = self.node(NodeKind::Goto);
        self.flow(goto, Label::Unlabeled, Target::Node(target));
        goto
    }

    pub fn if_goto(
        &mut self,
        op: Option<BinaryOperator>,
        left: NodeId,
        right: Option<NodeId>,
        target: NodeId,
    ) -> NodeId {
        let if_goto = self.node(NodeKind::IfGoto { op, left, right });
        self.flow(if_goto, Label::Bool(true), Target::Node(target));
        if_goto
    }

    pub fn catch(&mut self, name: &str, body: NodeId) -> NodeId {
        self.node(NodeKind::Catch {
            name: name.into(),
            body,
        })
    }

    pub fn try_(&mut self, body: NodeId, catch: NodeId) -> NodeId {
        self.node(NodeKind::Try { body, catch })
    }

    pub fn unwind(&mut self, body: NodeId, cleanup: NodeId) -> NodeId {
        self.node(NodeKind::Unwind { body, cleanup })
    }

    pub fn return_(&mut self, value: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Return(value))
    }

    pub fn throw(&mut self, value: NodeId) -> NodeId {
        self.node(NodeKind::Throw(value))
    }

    pub fn echo(&mut self, values: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Echo(values))
    }

    pub fn include(&mut self, name: &str) -> NodeId {
        self.node(NodeKind::Include(name.into()))
    }
}

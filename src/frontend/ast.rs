use std::{
    fmt::Display,
    hash::{Hash, Hasher},
};

use name_derive::ReflectName;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod cloner;
mod control_flow_map;
mod entity;

pub use control_flow_map::{ControlFlowMap, FlowEdge, Label, Target};
pub use entity::{Entity, EntityId, EntityKind, Program};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Literal values as produced by a front-end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Null,
    /// A front-end specific literal with no canonical constant slot.
    Other(String),
}

impl Constant {
    /// Exact integer value of a numeric constant, if it has one.
    ///
    /// Floating values only qualify while every integer up to their magnitude is
    /// exactly representable, so large labels are never rounded into a collision.
    pub fn as_integral(&self) -> Option<i64> {
        const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
        match self {
            Self::Int(value) => Some(*value as i64),
            Self::Long(value) => Some(*value),
            Self::Byte(value) => Some(*value as i64),
            Self::Short(value) => Some(*value as i64),
            Self::Float(value) => Self::Double(*value as f64).as_integral(),
            Self::Double(value) => {
                if value.is_finite() && value.fract() == 0.0 && value.abs() <= EXACT_LIMIT {
                    Some(*value as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_)
                | Self::Long(_)
                | Self::Float(_)
                | Self::Double(_)
                | Self::Byte(_)
                | Self::Short(_)
        )
    }
}

// floats compare and hash by bit pattern so constants can key the per-entity constant pool
impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Other(a), Self::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(value) => value.hash(state),
            Self::Long(value) => value.hash(state),
            Self::Float(value) => value.to_bits().hash(state),
            Self::Double(value) => value.to_bits().hash(state),
            Self::Str(value) | Self::Other(value) => value.hash(state),
            Self::Bool(value) => value.hash(state),
            Self::Char(value) => value.hash(state),
            Self::Byte(value) => value.hash(state),
            Self::Short(value) => value.hash(state),
            Self::Null => (),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Long(value) => write!(f, "{}L", value),
            Self::Float(value) => write!(f, "{}f", value),
            Self::Double(value) => write!(f, "{}", value),
            Self::Str(value) => write!(f, "{:?}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Char(value) => write!(f, "{:?}", value),
            Self::Byte(value) => write!(f, "{}b", value),
            Self::Short(value) => write!(f, "{}s", value),
            Self::Null => write!(f, "null"),
            Self::Other(value) => write!(f, "<{}>", value),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lsh,
    Rsh,
    Ursh,
    BitAnd,
    BitOr,
    BitXor,
    Concat,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    /// Integer division and remainder are the only operators with exceptional successors.
    pub fn may_fault(self) -> bool {
        matches!(self, Self::Div | Self::Mod)
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lsh => "<<",
            Self::Rsh => ">>",
            Self::Ursh => ">>>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Concat => "++",
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::Ne => "!=",
            Self::StrictNe => "!==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    BitNot,
    Neg,
    Plus,
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Not => "!",
            Self::BitNot => "~",
            Self::Neg => "-",
            Self::Plus => "+",
        };
        write!(f, "{}", symbol)
    }
}

/// A name introduced by a declaration node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeclaredSymbol {
    pub name: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub default_value: Option<Constant>,
    #[serde(default)]
    pub type_name: Option<String>,
}

impl DeclaredSymbol {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            is_final: false,
            case_insensitive: false,
            internal: false,
            default_value: None,
            type_name: None,
        }
    }

    pub fn final_(name: &str) -> Self {
        Self {
            is_final: true,
            ..Self::new(name)
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn with_default(mut self, value: Constant) -> Self {
        self.default_value = Some(value);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ReflectName)]
pub enum NodeKind {
    Constant(Constant),
    Var(String),
    Empty,
    This,
    Unary {
        op: UnaryOperator,
        operand: NodeId,
    },
    Binary {
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    /// `target` is a `Var`, `ObjectRef` or `ArrayRef`.
    Assign {
        target: NodeId,
        value: NodeId,
    },
    AssignOp {
        target: NodeId,
        value: NodeId,
        op: BinaryOperator,
        pre: bool,
    },
    Call {
        function: NodeId,
        name: Option<String>,
        arguments: Vec<NodeId>,
    },
    New {
        type_name: String,
        arguments: Vec<NodeId>,
    },
    ObjectLiteral {
        object: NodeId,
        fields: Vec<(NodeId, NodeId)>,
    },
    ArrayLiteral {
        array: NodeId,
        elements: Vec<NodeId>,
    },
    ObjectRef {
        object: NodeId,
        field: NodeId,
    },
    ArrayRef {
        array: NodeId,
        indices: Vec<NodeId>,
    },
    ArrayLength {
        array: NodeId,
    },
    EachElementGet {
        object: NodeId,
        previous: NodeId,
    },
    EachElementHasNext {
        object: NodeId,
        previous: NodeId,
    },
    IsDefined {
        object: NodeId,
        field: Option<NodeId>,
    },
    TypeLiteral(String),
    Function(EntityId),
    FunctionStmt(EntityId),
    Decl {
        symbol: DeclaredSymbol,
        init: Option<NodeId>,
    },
    Block(Vec<NodeId>),
    BlockExpr(Vec<NodeId>),
    LocalScope(NodeId),
    If {
        condition: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    },
    IfExpr {
        condition: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    },
    Loop {
        condition: NodeId,
        body: NodeId,
    },
    /// Case labels and their targets live in the control-flow map.
    Switch {
        value: NodeId,
        body: NodeId,
    },
    Label {
        name: Option<String>,
        body: Option<NodeId>,
    },
    Goto,
    /// Without `right` the branch is taken when `left` is non-zero.
    IfGoto {
        op: Option<BinaryOperator>,
        left: NodeId,
        right: Option<NodeId>,
    },
    Try {
        body: NodeId,
        catch: NodeId,
    },
    Catch {
        name: String,
        body: NodeId,
    },
    /// `cleanup` runs whenever control leaves `body`.
    Unwind {
        body: NodeId,
        cleanup: NodeId,
    },
    Return(Option<NodeId>),
    Throw(NodeId),
    GetCaughtException(String),
    Assert {
        condition: NodeId,
        assumed: bool,
    },
    Echo(Vec<NodeId>),
    Primitive(Vec<NodeId>),
    Include(String),
}

impl NodeKind {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::Constant(_)
            | Self::Var(_)
            | Self::Empty
            | Self::This
            | Self::TypeLiteral(_)
            | Self::Function(_)
            | Self::FunctionStmt(_)
            | Self::Goto
            | Self::GetCaughtException(_)
            | Self::Include(_) => Vec::new(),
            Self::Unary { operand, .. } => vec![*operand],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::Assign { target, value } | Self::AssignOp { target, value, .. } => {
                vec![*target, *value]
            }
            Self::Call {
                function,
                arguments,
                ..
            } => std::iter::once(*function)
                .chain(arguments.iter().copied())
                .collect(),
            Self::New { arguments, .. } => arguments.clone(),
            Self::ObjectLiteral { object, fields } => std::iter::once(*object)
                .chain(fields.iter().flat_map(|(key, value)| [*key, *value]))
                .collect(),
            Self::ArrayLiteral { array, elements } => std::iter::once(*array)
                .chain(elements.iter().copied())
                .collect(),
            Self::ObjectRef { object, field } => vec![*object, *field],
            Self::ArrayRef { array, indices } => std::iter::once(*array)
                .chain(indices.iter().copied())
                .collect(),
            Self::ArrayLength { array } => vec![*array],
            Self::EachElementGet { object, previous }
            | Self::EachElementHasNext { object, previous } => vec![*object, *previous],
            Self::IsDefined { object, field } => {
                std::iter::once(*object).chain(*field).collect()
            }
            Self::Decl { init, .. } => init.iter().copied().collect(),
            Self::Block(children)
            | Self::BlockExpr(children)
            | Self::Echo(children)
            | Self::Primitive(children) => children.clone(),
            Self::LocalScope(body) => vec![*body],
            Self::If {
                condition,
                then,
                otherwise,
            }
            | Self::IfExpr {
                condition,
                then,
                otherwise,
            } => [*condition, *then].into_iter().chain(*otherwise).collect(),
            Self::Loop { condition, body } => vec![*condition, *body],
            Self::Switch { value, body } => vec![*value, *body],
            Self::Label { body, .. } => body.iter().copied().collect(),
            Self::IfGoto { left, right, .. } => std::iter::once(*left).chain(*right).collect(),
            Self::Try { body, catch } => vec![*body, *catch],
            Self::Catch { body, .. } => vec![*body],
            Self::Unwind { body, cleanup } => vec![*body, *cleanup],
            Self::Return(value) => value.iter().copied().collect(),
            Self::Throw(value) => vec![*value],
            Self::Assert { condition, .. } => vec![*condition],
        }
    }

    /// Same node with every child id passed through `remap`.
    pub fn map_children(&self, mut remap: impl FnMut(NodeId) -> NodeId) -> NodeKind {
        let mut remap_all =
            |nodes: &[NodeId]| nodes.iter().map(|node| remap(*node)).collect::<Vec<_>>();
        match self {
            Self::Constant(_)
            | Self::Var(_)
            | Self::Empty
            | Self::This
            | Self::TypeLiteral(_)
            | Self::Function(_)
            | Self::FunctionStmt(_)
            | Self::Goto
            | Self::GetCaughtException(_)
            | Self::Include(_) => self.clone(),
            Self::Unary { op, operand } => Self::Unary {
                op: *op,
                operand: remap_all(&[*operand])[0],
            },
            Self::Binary { op, left, right } => {
                let mapped: Vec<NodeId> = remap_all(&[*left, *right]);
                Self::Binary {
                    op: *op,
                    left: mapped[0],
                    right: mapped[1],
                }
            }
            Self::Assign { target, value } => {
                let mapped: Vec<NodeId> = remap_all(&[*target, *value]);
                Self::Assign {
                    target: mapped[0],
                    value: mapped[1],
                }
            }
            Self::AssignOp {
                target,
                value,
                op,
                pre,
            } => {
                let mapped: Vec<NodeId> = remap_all(&[*target, *value]);
                Self::AssignOp {
                    target: mapped[0],
                    value: mapped[1],
                    op: *op,
                    pre: *pre,
                }
            }
            Self::Call {
                function,
                name,
                arguments,
            } => Self::Call {
                function: remap_all(&[*function])[0],
                name: name.clone(),
                arguments: remap_all(arguments),
            },
            Self::New {
                type_name,
                arguments,
            } => Self::New {
                type_name: type_name.clone(),
                arguments: remap_all(arguments),
            },
            Self::ObjectLiteral { object, fields } => Self::ObjectLiteral {
                object: remap_all(&[*object])[0],
                fields: fields
                    .iter()
                    .map(|(key, value)| {
                        let mapped: Vec<NodeId> = remap_all(&[*key, *value]);
                        (mapped[0], mapped[1])
                    })
                    .collect(),
            },
            Self::ArrayLiteral { array, elements } => Self::ArrayLiteral {
                array: remap_all(&[*array])[0],
                elements: remap_all(elements),
            },
            Self::ObjectRef { object, field } => {
                let mapped: Vec<NodeId> = remap_all(&[*object, *field]);
                Self::ObjectRef {
                    object: mapped[0],
                    field: mapped[1],
                }
            }
            Self::ArrayRef { array, indices } => Self::ArrayRef {
                array: remap_all(&[*array])[0],
                indices: remap_all(indices),
            },
            Self::ArrayLength { array } => Self::ArrayLength {
                array: remap_all(&[*array])[0],
            },
            Self::EachElementGet { object, previous } => {
                let mapped: Vec<NodeId> = remap_all(&[*object, *previous]);
                Self::EachElementGet {
                    object: mapped[0],
                    previous: mapped[1],
                }
            }
            Self::EachElementHasNext { object, previous } => {
                let mapped: Vec<NodeId> = remap_all(&[*object, *previous]);
                Self::EachElementHasNext {
                    object: mapped[0],
                    previous: mapped[1],
                }
            }
            Self::IsDefined { object, field } => Self::IsDefined {
                object: remap_all(&[*object])[0],
                field: field.map(|field| remap_all(&[field])[0]),
            },
            Self::Decl { symbol, init } => Self::Decl {
                symbol: symbol.clone(),
                init: init.map(|init| remap_all(&[init])[0]),
            },
            Self::Block(children) => Self::Block(remap_all(children)),
            Self::BlockExpr(children) => Self::BlockExpr(remap_all(children)),
            Self::Echo(children) => Self::Echo(remap_all(children)),
            Self::Primitive(children) => Self::Primitive(remap_all(children)),
            Self::LocalScope(body) => Self::LocalScope(remap_all(&[*body])[0]),
            Self::If {
                condition,
                then,
                otherwise,
            } => {
                let mapped: Vec<NodeId> = remap_all(&[*condition, *then]);
                Self::If {
                    condition: mapped[0],
                    then: mapped[1],
                    otherwise: otherwise.map(|otherwise| remap_all(&[otherwise])[0]),
                }
            }
            Self::IfExpr {
                condition,
                then,
                otherwise,
            } => {
                let mapped: Vec<NodeId> = remap_all(&[*condition, *then]);
                Self::IfExpr {
                    condition: mapped[0],
                    then: mapped[1],
                    otherwise: otherwise.map(|otherwise| remap_all(&[otherwise])[0]),
                }
            }
            Self::Loop { condition, body } => {
                let mapped: Vec<NodeId> = remap_all(&[*condition, *body]);
                Self::Loop {
                    condition: mapped[0],
                    body: mapped[1],
                }
            }
            Self::Switch { value, body } => {
                let mapped: Vec<NodeId> = remap_all(&[*value, *body]);
                Self::Switch {
                    value: mapped[0],
                    body: mapped[1],
                }
            }
            Self::Label { name, body } => Self::Label {
                name: name.clone(),
                body: body.map(|body| remap_all(&[body])[0]),
            },
            Self::IfGoto { op, left, right } => Self::IfGoto {
                op: *op,
                left: remap_all(&[*left])[0],
                right: right.map(|right| remap_all(&[right])[0]),
            },
            Self::Try { body, catch } => {
                let mapped: Vec<NodeId> = remap_all(&[*body, *catch]);
                Self::Try {
                    body: mapped[0],
                    catch: mapped[1],
                }
            }
            Self::Catch { name, body } => Self::Catch {
                name: name.clone(),
                body: remap_all(&[*body])[0],
            },
            Self::Unwind { body, cleanup } => {
                let mapped: Vec<NodeId> = remap_all(&[*body, *cleanup]);
                Self::Unwind {
                    body: mapped[0],
                    cleanup: mapped[1],
                }
            }
            Self::Return(value) => Self::Return(value.map(|value| remap_all(&[value])[0])),
            Self::Throw(value) => Self::Throw(remap_all(&[*value])[0]),
            Self::Assert { condition, assumed } => Self::Assert {
                condition: remap_all(&[*condition])[0],
                assumed: *assumed,
            },
        }
    }
}

/// Arena owning every node of a program. Ids are stable for the life of the arena.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ast {
    nodes: Vec<NodeKind>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(kind);
        NodeId::new(self.nodes.len() - 1)
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order listing of the subtree rooted at `root`. Unknown ids are skipped.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(kind) = self.kind(node) {
                order.push(node);
                let mut children = kind.children();
                children.reverse();
                stack.extend(children);
            }
        }
        order
    }
}

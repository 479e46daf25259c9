use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    frontend::ast::{BinaryOperator, UnaryOperator},
    midend::{
        ir::{BlockId, ValueId},
        lexical::Access,
    },
};

/// A resolved type reference, as produced by a [`TypeResolver`](crate::midend::linearizer::TypeResolver).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef(String);

impl TypeRef {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TryFrom<BinaryOperator> for ConditionOperator {
    type Error = BinaryOperator;

    fn try_from(op: BinaryOperator) -> Result<Self, Self::Error> {
        match op {
            BinaryOperator::Eq => Ok(Self::Eq),
            BinaryOperator::Ne => Ok(Self::Ne),
            BinaryOperator::Lt => Ok(Self::Lt),
            BinaryOperator::Le => Ok(Self::Le),
            BinaryOperator::Gt => Ok(Self::Gt),
            BinaryOperator::Ge => Ok(Self::Ge),
            other => Err(other),
        }
    }
}

impl Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// Generic SSA instructions. Branch targets are block ids of the graph the instruction lives in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Assign {
        dest: ValueId,
        source: ValueId,
    },
    Binary {
        dest: ValueId,
        op: BinaryOperator,
        left: ValueId,
        right: ValueId,
        may_fault: bool,
    },
    Unary {
        dest: ValueId,
        op: UnaryOperator,
        operand: ValueId,
    },
    ConditionalBranch {
        op: ConditionOperator,
        left: ValueId,
        right: ValueId,
        target: Option<BlockId>,
    },
    Goto {
        target: Option<BlockId>,
    },
    Switch {
        value: ValueId,
        default: Option<BlockId>,
        cases: Vec<(i64, BlockId)>,
    },
    Call {
        dest: ValueId,
        exception: ValueId,
        function: ValueId,
        arguments: Vec<ValueId>,
        name: Option<String>,
    },
    New {
        dest: ValueId,
        type_ref: TypeRef,
        arguments: Vec<ValueId>,
    },
    FieldRead {
        dest: ValueId,
        object: ValueId,
        field: ValueId,
    },
    FieldWrite {
        object: ValueId,
        field: ValueId,
        value: ValueId,
    },
    ArrayRead {
        dest: ValueId,
        array: ValueId,
        indices: Vec<ValueId>,
    },
    ArrayWrite {
        array: ValueId,
        indices: Vec<ValueId>,
        value: ValueId,
    },
    ArrayLength {
        dest: ValueId,
        array: ValueId,
    },
    GlobalRead {
        dest: ValueId,
        name: String,
    },
    GlobalWrite {
        name: String,
        value: ValueId,
    },
    LexicalRead {
        accesses: Vec<Access>,
    },
    LexicalWrite {
        accesses: Vec<Access>,
    },
    Return {
        value: Option<ValueId>,
    },
    Throw {
        exception: ValueId,
    },
    GetCaughtException {
        dest: ValueId,
        block: BlockId,
    },
    Assert {
        condition: ValueId,
        assumed: bool,
    },
    EachElementGet {
        dest: ValueId,
        object: ValueId,
        previous: ValueId,
    },
    EachElementHasNext {
        dest: ValueId,
        object: ValueId,
        previous: ValueId,
    },
    IsDefined {
        dest: ValueId,
        object: ValueId,
        field: Option<ValueId>,
    },
    TypeLiteral {
        dest: ValueId,
        type_ref: TypeRef,
    },
    Echo {
        values: Vec<ValueId>,
    },
    Primitive {
        dest: ValueId,
        arguments: Vec<ValueId>,
    },
    MaterializeFunction {
        dest: ValueId,
        exception: ValueId,
        entity: String,
    },
}

impl Instruction {
    /// Instructions after which control never falls through to the next one.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Goto { .. } | Self::Return { .. } | Self::Throw { .. } | Self::Switch { .. }
        )
    }

    pub fn defs(&self) -> Vec<ValueId> {
        match self {
            Self::Assign { dest, .. }
            | Self::Binary { dest, .. }
            | Self::Unary { dest, .. }
            | Self::New { dest, .. }
            | Self::FieldRead { dest, .. }
            | Self::ArrayRead { dest, .. }
            | Self::ArrayLength { dest, .. }
            | Self::GlobalRead { dest, .. }
            | Self::GetCaughtException { dest, .. }
            | Self::EachElementGet { dest, .. }
            | Self::EachElementHasNext { dest, .. }
            | Self::IsDefined { dest, .. }
            | Self::TypeLiteral { dest, .. }
            | Self::Primitive { dest, .. } => vec![*dest],
            Self::Call {
                dest, exception, ..
            }
            | Self::MaterializeFunction {
                dest, exception, ..
            } => vec![*dest, *exception],
            Self::LexicalRead { accesses } => accesses.iter().map(|access| access.value).collect(),
            _ => Vec::new(),
        }
    }

    pub fn uses(&self) -> Vec<ValueId> {
        match self {
            Self::Assign { source, .. } => vec![*source],
            Self::Binary { left, right, .. } | Self::ConditionalBranch { left, right, .. } => {
                vec![*left, *right]
            }
            Self::Unary { operand, .. } => vec![*operand],
            Self::Switch { value, .. } => vec![*value],
            Self::Call {
                function,
                arguments,
                ..
            } => std::iter::once(*function)
                .chain(arguments.iter().copied())
                .collect(),
            Self::New { arguments, .. }
            | Self::Primitive { arguments, .. }
            | Self::Echo {
                values: arguments,
            } => arguments.clone(),
            Self::FieldRead { object, field, .. } => vec![*object, *field],
            Self::FieldWrite {
                object,
                field,
                value,
            } => vec![*object, *field, *value],
            Self::ArrayRead { array, indices, .. } => std::iter::once(*array)
                .chain(indices.iter().copied())
                .collect(),
            Self::ArrayWrite {
                array,
                indices,
                value,
            } => std::iter::once(*array)
                .chain(indices.iter().copied())
                .chain(std::iter::once(*value))
                .collect(),
            Self::ArrayLength { array, .. } => vec![*array],
            Self::GlobalWrite { value, .. } => vec![*value],
            Self::LexicalWrite { accesses } => accesses.iter().map(|access| access.value).collect(),
            Self::Return { value } => value.iter().copied().collect(),
            Self::Throw { exception } => vec![*exception],
            Self::Assert { condition, .. } => vec![*condition],
            Self::EachElementGet {
                object, previous, ..
            }
            | Self::EachElementHasNext {
                object, previous, ..
            } => vec![*object, *previous],
            Self::IsDefined { object, field, .. } => {
                std::iter::once(*object).chain(*field).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn value_list(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ValueId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn access_list(accesses: &[Access]) -> String {
    accesses
        .iter()
        .map(Access::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn block_name(block: &Option<BlockId>) -> String {
    match block {
        Some(block) => block.to_string(),
        None => "<exit>".into(),
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assign { dest, source } => write!(f, "{} = {}", dest, source),
            Self::Binary {
                dest,
                op,
                left,
                right,
                may_fault,
            } => {
                write!(f, "{} = {} {} {}", dest, left, op, right)?;
                if *may_fault {
                    write!(f, " (may fault)")?;
                }
                Ok(())
            }
            Self::Unary { dest, op, operand } => write!(f, "{} = {}{}", dest, op, operand),
            Self::ConditionalBranch {
                op,
                left,
                right,
                target,
            } => write!(
                f,
                "if {} {} {} goto {}",
                left,
                op,
                right,
                block_name(target)
            ),
            Self::Goto { target } => write!(f, "goto {}", block_name(target)),
            Self::Switch {
                value,
                default,
                cases,
            } => {
                write!(f, "switch {} [", value)?;
                for (case, target) in cases {
                    write!(f, "{} -> {}, ", case, target)?;
                }
                write!(f, "default -> {}]", block_name(default))
            }
            Self::Call {
                dest,
                exception,
                function,
                arguments,
                name,
            } => {
                write!(
                    f,
                    "{} = call {}({}) exception {}",
                    dest,
                    function,
                    value_list(arguments),
                    exception
                )?;
                if let Some(name) = name {
                    write!(f, " <{}>", name)?;
                }
                Ok(())
            }
            Self::New {
                dest,
                type_ref,
                arguments,
            } => write!(f, "{} = new {}({})", dest, type_ref, value_list(arguments)),
            Self::FieldRead {
                dest,
                object,
                field,
            } => write!(f, "{} = {}[{}]", dest, object, field),
            Self::FieldWrite {
                object,
                field,
                value,
            } => write!(f, "{}[{}] = {}", object, field, value),
            Self::ArrayRead {
                dest,
                array,
                indices,
            } => write!(f, "{} = {}[[{}]]", dest, array, value_list(indices)),
            Self::ArrayWrite {
                array,
                indices,
                value,
            } => write!(f, "{}[[{}]] = {}", array, value_list(indices), value),
            Self::ArrayLength { dest, array } => write!(f, "{} = length {}", dest, array),
            Self::GlobalRead { dest, name } => write!(f, "{} = global:{}", dest, name),
            Self::GlobalWrite { name, value } => write!(f, "global:{} = {}", name, value),
            Self::LexicalRead { accesses } => write!(f, "lexical read [{}]", access_list(accesses)),
            Self::LexicalWrite { accesses } => {
                write!(f, "lexical write [{}]", access_list(accesses))
            }
            Self::Return { value } => match value {
                Some(value) => write!(f, "return {}", value),
                None => write!(f, "return"),
            },
            Self::Throw { exception } => write!(f, "throw {}", exception),
            Self::GetCaughtException { dest, block } => {
                write!(f, "{} = caught exception of {}", dest, block)
            }
            Self::Assert { condition, assumed } => {
                write!(f, "assert {}", condition)?;
                if *assumed {
                    write!(f, " (assumed)")?;
                }
                Ok(())
            }
            Self::EachElementGet {
                dest,
                object,
                previous,
            } => write!(f, "{} = each element of {} after {}", dest, object, previous),
            Self::EachElementHasNext {
                dest,
                object,
                previous,
            } => write!(f, "{} = has element of {} after {}", dest, object, previous),
            Self::IsDefined {
                dest,
                object,
                field,
            } => match field {
                Some(field) => write!(f, "{} = isdefined {}[{}]", dest, object, field),
                None => write!(f, "{} = isdefined {}", dest, object),
            },
            Self::TypeLiteral { dest, type_ref } => write!(f, "{} = type {}", dest, type_ref),
            Self::Echo { values } => write!(f, "echo {}", value_list(values)),
            Self::Primitive { dest, arguments } => {
                write!(f, "{} = primitive({})", dest, value_list(arguments))
            }
            Self::MaterializeFunction {
                dest,
                exception,
                entity,
            } => write!(
                f,
                "{} = function {} exception {}",
                dest, entity, exception
            ),
        }
    }
}

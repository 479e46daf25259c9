mod basic_block;
mod control_flow;
mod operations;
mod value;

pub use basic_block::{BasicBlock, BlockId, BlockKind};
pub use control_flow::ControlFlowGraph;
pub use operations::{ConditionOperator, Instruction, TypeRef};
pub use value::{ValueId, ValueInterner};

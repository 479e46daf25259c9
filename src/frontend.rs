pub mod ast;
pub mod sourceloc;

pub use ast::{Ast, NodeId, NodeKind, Program};
pub use sourceloc::{SourceLoc, SourcePositionMap};

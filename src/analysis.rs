//! Closure support for a points-to solver building a call graph over translated entities.
//!
//! Function values are identified per creating activation ([`CaptureKeys`]), callees receiving
//! closures get one-level contexts ([`ClosureContextSelector`]), and lexical reads and writes
//! become assignments between locals and per-activation cells ([`LexicalConstraints`]).

mod call_graph;
mod capture_keys;
mod context_selector;
mod lexical_constraints;

pub use call_graph::{CallGraph, CallGraphView, CgNode, Context, FAKE_ROOT};
pub use capture_keys::{Allocation, CaptureKey, CaptureKeyId, CaptureKeys};
pub use context_selector::ClosureContextSelector;
pub use lexical_constraints::{
    lexical_definers, Constraint, FunctionValues, LexicalConstraints, PointerKey,
};

#[cfg(test)]
mod tests;

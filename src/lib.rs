//! Translation of language-neutral ASTs into SSA control-flow graphs, with the lexical-scoping
//! facts a closure-aware call-graph builder needs.

mod trace;

pub mod analysis;
pub mod config;
pub mod frontend;
pub mod midend;

pub use config::TranslatorConfig;
pub use midend::linearizer::{translate, Translation};

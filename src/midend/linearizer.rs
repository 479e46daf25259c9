//! Lowering of a [`Program`] into one control-flow graph per script and function.

use crate::{config::TranslatorConfig, frontend::ast::Program, trace};

mod collaborators;
mod control_constructs;
mod errors;
mod exposed_names;
mod functionwalkcontext;
mod incipient_cfg;
mod translation;
mod treewalk;
mod unwind;
pub mod walkcontext;

pub use collaborators::{
    GenericInstructions, InstructionFactory, NominalTypes, TypeResolver, DEFAULT_CATCH_TYPE,
};
pub use errors::{Diagnostic, Position, Severity, TranslationError, TranslationResult};
pub use exposed_names::ExposedNames;
pub use translation::{TranslatedEntity, Translation};
pub use treewalk::Translator;

/// Translates `program` with the generic instruction shapes and nominal type resolution.
pub fn translate(program: &Program, config: &TranslatorConfig) -> TranslationResult<Translation> {
    let _span = trace::span_auto!(trace::Level::DEBUG, "translate program");
    Translator::new(program.clone(), config.clone()).translate()
}

#[cfg(test)]
mod tests;

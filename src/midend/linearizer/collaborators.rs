use crate::midend::ir::{Instruction, TypeRef, ValueId};

/// Catch type used for cleanup handlers and catch clauses without a declared type.
pub const DEFAULT_CATCH_TYPE: &str = "Root";

/// Builds the instructions whose concrete shape depends on the target language.
///
/// Every method has a generic default, so an implementation only overrides what it needs.
pub trait InstructionFactory {
    fn call(
        &self,
        dest: ValueId,
        exception: ValueId,
        function: ValueId,
        arguments: Vec<ValueId>,
        name: Option<String>,
    ) -> Instruction {
        Instruction::Call {
            dest,
            exception,
            function,
            arguments,
            name,
        }
    }

    fn new_object(&self, dest: ValueId, type_ref: TypeRef, arguments: Vec<ValueId>) -> Instruction {
        Instruction::New {
            dest,
            type_ref,
            arguments,
        }
    }

    fn materialize_function(&self, dest: ValueId, exception: ValueId, entity: &str) -> Instruction {
        Instruction::MaterializeFunction {
            dest,
            exception,
            entity: entity.into(),
        }
    }

    fn primitive(&self, dest: ValueId, arguments: Vec<ValueId>) -> Instruction {
        Instruction::Primitive { dest, arguments }
    }

    fn throw(&self, exception: ValueId) -> Instruction {
        Instruction::Throw { exception }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct GenericInstructions;

impl InstructionFactory for GenericInstructions {}

/// Resolves type names appearing in `new`, type literals and catch clauses.
pub trait TypeResolver {
    fn resolve(&self, name: &str) -> TypeRef;

    fn default_catch_type(&self) -> TypeRef {
        TypeRef::new(DEFAULT_CATCH_TYPE)
    }

    fn catch_type(&self, declared: Option<&str>) -> TypeRef {
        match declared {
            Some(name) => self.resolve(name),
            None => self.default_catch_type(),
        }
    }
}

/// Takes every type name at face value.
#[derive(Copy, Clone, Debug, Default)]
pub struct NominalTypes;

impl TypeResolver for NominalTypes {
    fn resolve(&self, name: &str) -> TypeRef {
        TypeRef::new(name)
    }
}

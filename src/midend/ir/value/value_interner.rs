use indexmap::IndexMap;

use crate::{frontend::ast::Constant, midend::ir::ValueId};

/// Per-entity value-number allocator.
///
/// Parameters take the numbers `1..=parameters`; temporaries and constants are handed out after
/// them in allocation order. Each distinct constant gets exactly one number.
#[derive(Clone, Debug)]
pub struct ValueInterner {
    parameters: usize,
    next: usize,
    constants: IndexMap<Constant, ValueId>,
    constant_values: IndexMap<ValueId, Constant>,
    defaults: IndexMap<ValueId, Constant>,
}

impl ValueInterner {
    pub fn new(parameters: usize) -> Self {
        Self {
            parameters,
            next: parameters + 1,
            constants: IndexMap::new(),
            constant_values: IndexMap::new(),
            defaults: IndexMap::new(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters
    }

    /// Value number of the zero-based parameter `position`.
    pub fn parameter(&self, position: usize) -> Option<ValueId> {
        (position < self.parameters).then(|| ValueId::new(position + 1))
    }

    pub fn is_parameter(&self, value: ValueId) -> bool {
        value.index() >= 1 && value.index() <= self.parameters
    }

    pub fn allocate_temp(&mut self) -> ValueId {
        let id = ValueId::new(self.next);
        self.next += 1;
        id
    }

    pub fn intern_constant(&mut self, constant: &Constant) -> ValueId {
        if let Some(existing) = self.constants.get(constant) {
            return *existing;
        }

        let id = self.allocate_temp();
        self.constants.insert(constant.clone(), id);
        self.constant_values.insert(id, constant.clone());
        id
    }

    pub fn is_constant(&self, value: ValueId) -> bool {
        self.constant_values.contains_key(&value)
    }

    pub fn constant_of(&self, value: ValueId) -> Option<&Constant> {
        self.constant_values.get(&value)
    }

    pub fn constants(&self) -> impl Iterator<Item = (&ValueId, &Constant)> {
        self.constant_values.iter()
    }

    pub fn set_default(&mut self, value: ValueId, default: Constant) {
        self.defaults.insert(value, default);
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&ValueId, &Constant)> {
        self.defaults.iter()
    }

    /// Highest value number handed out so far.
    pub fn max_value(&self) -> usize {
        self.next - 1
    }
}

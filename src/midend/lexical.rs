use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::midend::ir::{Instruction, ValueId};

/// One capture event: `name`, owned by the entity `definer`, is read into or written from
/// `value`. A missing definer stands for a global routed through the lexical mechanism.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    pub name: String,
    pub definer: Option<String>,
    pub value: ValueId,
}

impl Access {
    pub fn new(name: &str, definer: Option<&str>, value: ValueId) -> Self {
        Self {
            name: name.into(),
            definer: definer.map(String::from),
            value,
        }
    }
}

impl Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.definer {
            Some(definer) => write!(f, "{}@{}:{}", self.name, definer, self.value),
            None => write!(f, "{}@<global>:{}", self.name, self.value),
        }
    }
}

/// A name visible to nested scopes, qualified by the entity that declares it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExposedName {
    pub name: String,
    pub definer: String,
}

impl ExposedName {
    pub fn new(name: &str, definer: &str) -> Self {
        Self {
            name: name.into(),
            definer: definer.into(),
        }
    }
}

impl Display for ExposedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.definer)
    }
}

/// Exposure facts gathered for one entity while it (and anything nested in it) is walked.
#[derive(Clone, Debug, Default)]
pub struct ExposureRecord {
    reads: IndexSet<(ExposedName, ValueId)>,
    writes: IndexSet<(ExposedName, ValueId)>,
    accesses: IndexSet<Access>,
}

impl ExposureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose(&mut self, name: ExposedName, value: ValueId, is_write: bool) {
        if is_write {
            self.writes.insert((name, value));
        } else {
            self.reads.insert((name, value));
        }
    }

    pub fn add_access(&mut self, access: Access) {
        self.accesses.insert(access);
    }

    pub fn accesses(&self) -> impl Iterator<Item = &Access> {
        self.accesses.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty() && self.accesses.is_empty()
    }
}

/// Published per-entity record of what nested scopes capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexicalInformation {
    scoping_name: String,
    exposed_names: Vec<ExposedName>,
    /// Value at normal exit, parallel to `exposed_names`; only names the entity itself declares.
    exit_uses: Vec<Option<ValueId>>,
    /// Per call instruction, the value of every exposed name at that call.
    instruction_uses: IndexMap<usize, Vec<ValueId>>,
    scoping_parents: Vec<String>,
    read_only_names: IndexSet<String>,
}

impl LexicalInformation {
    pub fn build(
        scoping_name: &str,
        exposure: &ExposureRecord,
        instructions: &[Option<Instruction>],
    ) -> Self {
        let exposed: Vec<&(ExposedName, ValueId)> = exposure
            .reads
            .iter()
            .chain(exposure.writes.iter())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let exposed_names = exposed.iter().map(|(name, _)| name.clone()).collect();
        let exit_uses = exposed
            .iter()
            .map(|(name, value)| (name.definer == scoping_name).then_some(*value))
            .collect();

        let all_uses: Vec<ValueId> = exposed.iter().map(|(_, value)| *value).collect();
        let instruction_uses = if all_uses.is_empty() {
            IndexMap::new()
        } else {
            instructions
                .iter()
                .enumerate()
                .filter(|(_, instruction)| matches!(instruction, Some(Instruction::Call { .. })))
                .map(|(index, _)| (index, all_uses.clone()))
                .collect()
        };

        let scoping_parents = exposure
            .accesses
            .iter()
            .filter_map(|access| access.definer.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let mut read_only_names: IndexSet<String> = exposure
            .reads
            .iter()
            .filter(|(name, _)| name.definer == scoping_name)
            .map(|(name, _)| name.name.clone())
            .collect();
        for (name, _) in &exposure.writes {
            if name.definer == scoping_name {
                read_only_names.shift_remove(&name.name);
            }
        }

        Self {
            scoping_name: scoping_name.into(),
            exposed_names,
            exit_uses,
            instruction_uses,
            scoping_parents,
            read_only_names,
        }
    }

    pub fn scoping_name(&self) -> &str {
        &self.scoping_name
    }

    pub fn exposed_names(&self) -> &[ExposedName] {
        &self.exposed_names
    }

    pub fn exit_exposed_uses(&self) -> &[Option<ValueId>] {
        &self.exit_uses
    }

    /// Values of the exposed names at the call instruction `index`; empty for other instructions.
    pub fn exposed_uses(&self, index: usize) -> &[ValueId] {
        self.instruction_uses
            .get(&index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_exposed_uses(&self) -> IndexSet<ValueId> {
        self.exit_uses
            .iter()
            .flatten()
            .chain(self.instruction_uses.values().flatten())
            .copied()
            .collect()
    }

    pub fn scoping_parents(&self) -> &[String] {
        &self.scoping_parents
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only_names.contains(name)
    }

    pub fn exposed_index(&self, name: &str, definer: &str) -> Option<usize> {
        self.exposed_names
            .iter()
            .position(|exposed| exposed.name == name && exposed.definer == definer)
    }

    pub fn exit_use_of(&self, name: &str, definer: &str) -> Option<ValueId> {
        self.exposed_index(name, definer)
            .and_then(|index| self.exit_uses.get(index).copied().flatten())
    }

    pub fn has_exposed_uses(&self, index: usize) -> bool {
        !self.exposed_uses(index).is_empty()
    }
}

impl Display for LexicalInformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "lexical information for {}", self.scoping_name)?;
        for (name, exit) in self.exposed_names.iter().zip(&self.exit_uses) {
            match exit {
                Some(value) => writeln!(f, "  exposed {} (exit {})", name, value)?,
                None => writeln!(f, "  exposed {}", name)?,
            }
        }
        if !self.scoping_parents.is_empty() {
            writeln!(f, "  scoping parents: {}", self.scoping_parents.join(", "))?;
        }
        for (index, uses) in &self.instruction_uses {
            let uses = uses
                .iter()
                .map(ValueId::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "  uses at {}: {}", index, uses)?;
        }
        Ok(())
    }
}

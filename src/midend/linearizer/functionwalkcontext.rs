use indexmap::IndexMap;

use crate::{
    frontend::{
        ast::{EntityId, EntityKind},
        sourceloc::SourceLoc,
    },
    midend::{
        ir::{BlockId, Instruction, TypeRef, ValueId},
        lexical::{Access, ExposureRecord, LexicalInformation},
        linearizer::{
            incipient_cfg::IncipientCfg, translation::TranslatedEntity, unwind::UnwindKey,
            TranslationError, TranslationResult,
        },
        symtab::{ScopeId, Scopes},
    },
    trace,
};

/// Everything accumulated while one script or function body is walked.
pub struct EntityWalkState {
    pub entity: EntityId,
    pub name: String,
    pub kind: EntityKind,
    /// The entity's own scope, which owns its value numbering.
    pub scope: ScopeId,
    pub cfg: IncipientCfg,
    pub exposure: ExposureRecord,
    pub catch_types: IndexMap<BlockId, Vec<TypeRef>>,
    pub unwind_cache: IndexMap<UnwindKey, BlockId>,
    /// Lexical reads emitted after calls, filled in with every access once the body is done.
    pub pending_lexical_reads: Vec<usize>,
}

impl EntityWalkState {
    pub fn new(entity: EntityId, name: &str, kind: EntityKind, scope: ScopeId) -> Self {
        trace::trace!("walk state for {} {}", kind, name);
        Self {
            entity,
            name: name.into(),
            kind,
            scope,
            cfg: IncipientCfg::new(),
            exposure: ExposureRecord::new(),
            catch_types: IndexMap::new(),
            unwind_cache: IndexMap::new(),
            pending_lexical_reads: Vec::new(),
        }
    }

    fn value_names(&self, scopes: &Scopes) -> TranslationResult<IndexMap<ValueId, String>> {
        let interner = scopes.interner(self.scope)?;
        let mut names: IndexMap<ValueId, String> = IndexMap::new();
        for symbol in scopes.entity_symbols(self.scope) {
            let Some(value) = symbol.value else {
                continue;
            };
            if symbol.internal || interner.is_constant(value) {
                continue;
            }

            match names.get(&value) {
                Some(existing) if existing != &symbol.name => {
                    return Err(TranslationError::ConflictingNames {
                        entity: self.name.clone(),
                        value,
                        first: existing.clone(),
                        second: symbol.name.clone(),
                        position: Default::default(),
                    });
                }
                _ => {
                    names.insert(value, symbol.name.clone());
                }
            }
        }
        names.sort_keys();
        Ok(names)
    }

    /// Closes the graph with its exit block and freezes everything gathered for the entity.
    pub fn finish(
        mut self,
        scopes: &Scopes,
        position: Option<SourceLoc>,
    ) -> TranslationResult<TranslatedEntity> {
        let exit = self.cfg.new_block(true);
        self.cfg.make_exit_block(exit);

        let value_names = self.value_names(scopes)?;

        let accesses: Vec<Access> = self.exposure.accesses().cloned().collect();
        for index in &self.pending_lexical_reads {
            if let Some(Instruction::LexicalRead { accesses: slot }) = self.cfg.instruction_mut(*index)
            {
                *slot = accesses.clone();
            }
        }

        let (cfg, renumbering) = self.cfg.finalize_with_renumbering();
        let catch_types = self
            .catch_types
            .into_iter()
            .filter_map(|(block, types)| renumbering.get(&block).map(|block| (*block, types)))
            .collect();

        let lexical = LexicalInformation::build(&self.name, &self.exposure, cfg.instructions());

        let interner = scopes.interner(self.scope)?;
        let constants = interner
            .constants()
            .map(|(value, constant)| (*value, constant.clone()))
            .collect();
        let defaults = interner
            .defaults()
            .map(|(value, constant)| (*value, constant.clone()))
            .collect();

        trace::debug!(
            "finished {} with {} blocks and {} instructions",
            self.name,
            cfg.block_count(),
            cfg.instructions().len()
        );
        Ok(TranslatedEntity {
            name: self.name,
            kind: self.kind,
            parameter_count: interner.parameter_count(),
            max_value: interner.max_value(),
            cfg,
            value_names,
            constants,
            defaults,
            lexical,
            catch_types,
            position,
        })
    }
}

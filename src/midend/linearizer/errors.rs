use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    frontend::{
        ast::{BinaryOperator, Label, NodeId},
        sourceloc::SourceLoc,
    },
    midend::{ir::ValueId, symtab::SymbolError},
};

/// Source position carried by an error; unknown until the walker attaches one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Position(pub Option<SourceLoc>);

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(loc) => write!(f, "{}", loc),
            None => write!(f, "<unknown position>"),
        }
    }
}

impl From<Option<SourceLoc>> for Position {
    fn from(loc: Option<SourceLoc>) -> Self {
        Self(loc)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TranslationError {
    #[error("{position}: {source}")]
    Symbol {
        source: SymbolError,
        position: Position,
    },
    #[error("{position}: operator {operator} cannot be used as a branch condition")]
    UnresolvableOperator {
        operator: BinaryOperator,
        position: Position,
    },
    #[error("{position}: {node} has no control-flow target labeled {label}")]
    MissingTarget {
        node: NodeId,
        label: Label,
        position: Position,
    },
    #[error("{position}: {entity} is not a code entity")]
    NotCodeEntity { entity: String, position: Position },
    #[error("{position}: {node} produced no value")]
    MissingValue { node: NodeId, position: Position },
    #[error("{position}: {node} is not bound to a block")]
    UnboundNode { node: NodeId, position: Position },
    #[error("{position}: {value} is named both {first} and {second} in {entity}")]
    ConflictingNames {
        entity: String,
        value: ValueId,
        first: String,
        second: String,
        position: Position,
    },
    #[error("{position}: no entity {entity}")]
    UnknownEntity { entity: String, position: Position },
    #[error("{position}: {node} is not in the program")]
    UnknownNode { node: NodeId, position: Position },
    #[error("{position}: {node} cannot be assigned to")]
    InvalidAssignment { node: NodeId, position: Position },
}

impl From<SymbolError> for TranslationError {
    fn from(source: SymbolError) -> Self {
        Self::Symbol {
            source,
            position: Position::default(),
        }
    }
}

impl TranslationError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Symbol { position, .. }
            | Self::UnresolvableOperator { position, .. }
            | Self::MissingTarget { position, .. }
            | Self::NotCodeEntity { position, .. }
            | Self::MissingValue { position, .. }
            | Self::UnboundNode { position, .. }
            | Self::ConflictingNames { position, .. }
            | Self::UnknownEntity { position, .. }
            | Self::UnknownNode { position, .. }
            | Self::InvalidAssignment { position, .. } => position,
        }
    }

    fn position_mut(&mut self) -> &mut Position {
        match self {
            Self::Symbol { position, .. }
            | Self::UnresolvableOperator { position, .. }
            | Self::MissingTarget { position, .. }
            | Self::NotCodeEntity { position, .. }
            | Self::MissingValue { position, .. }
            | Self::UnboundNode { position, .. }
            | Self::ConflictingNames { position, .. }
            | Self::UnknownEntity { position, .. }
            | Self::UnknownNode { position, .. }
            | Self::InvalidAssignment { position, .. } => position,
        }
    }

    /// Attaches `loc` unless a more precise position is already known.
    pub fn located(mut self, loc: Option<SourceLoc>) -> Self {
        let position = self.position_mut();
        if position.0.is_none() {
            position.0 = loc;
        }
        self
    }
}

pub type TranslationResult<T> = Result<T, TranslationError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A recoverable problem found during translation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Option<SourceLoc>,
}

impl Diagnostic {
    pub fn warning(message: String, position: Option<SourceLoc>) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            position,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(position) = &self.position {
            write!(f, " at {}", position)?;
        }
        Ok(())
    }
}

//! Lowering errors and diagnostics

use kiln_model::ModelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for lowering operations
pub type LowerResult<T> = Result<T, LowerError>;

/// Errors that abort the lowering of one class.
///
/// No partial IR is ever returned alongside an error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LowerError {
    /// A name was not bound in any enclosing scope
    #[error("Unbound symbol: {name}")]
    UnboundSymbol { name: String },

    /// Two parameters or locals of one scope normalize to the same name
    #[error("Duplicate symbol: {name}")]
    DuplicateSymbol { name: String },

    /// An operation was requested for a class of the wrong kind
    #[error("Cannot {operation} for {class}")]
    InvalidClassKind { class: String, operation: String },

    /// The type checker already recorded an error for this class
    #[error("{class}: {message}")]
    InvalidClass { class: String, message: String },

    /// Auto-insert target is abstract or an interface
    #[error("Type {type_name} is abstract or an interface and has no default implementation class to use")]
    AbstractAutoInsert { type_name: String },

    /// Auto-insert target cannot be constructed without arguments
    #[error("Type {type_name} has no default constructor")]
    MissingDefaultConstructor { type_name: String },

    /// Structural inconsistency in the class model
    #[error("Internal lowering error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl LowerError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        LowerError::Internal {
            message: message.into(),
        }
    }
}

/// Kind of non-fatal lowering diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The foreign method behind a proxy override could not be resolved, so no
    /// proxy covariant bridge was considered for it
    UnresolvedForeignMethod,
}

/// A non-fatal observation attached to a lowered class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowerDiagnostic {
    pub kind: DiagnosticKind,
    /// Internal name of the class being lowered
    pub class: String,
    /// Method the diagnostic is about
    pub method: String,
    pub message: String,
}

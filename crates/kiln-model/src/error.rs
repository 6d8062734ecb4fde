//! Class model errors

use thiserror::Error;

/// Result alias for model construction and queries
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or validating a [`crate::ClassModel`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// Two classes (source or foreign) registered under the same binary name
    #[error("Duplicate class name: {name}")]
    DuplicateClass {
        /// The clashing binary name
        name: String,
    },

    /// A class id does not refer to a registered class
    #[error("Unknown class id: {id}")]
    UnknownClass {
        /// Raw id value
        id: u32,
    },

    /// A foreign class id does not refer to a registered foreign class
    #[error("Unknown foreign class id: {id}")]
    UnknownForeignClass {
        /// Raw id value
        id: u32,
    },

    /// A method id does not refer to a registered method
    #[error("Unknown method id: {id}")]
    UnknownMethod {
        /// Raw id value
        id: u32,
    },

    /// A type id does not refer to an interned type
    #[error("Unknown type id: {id}")]
    UnknownType {
        /// Raw id value
        id: u32,
    },

    /// Following super-method or backing links from a method revisits it
    #[error("Override chain of {method} is cyclic")]
    OverrideCycle {
        /// Display name of the method where the cycle was found
        method: String,
    },

    /// The supertype/enclosing graph of a class is cyclic
    #[error("Class hierarchy of {class} is cyclic")]
    HierarchyCycle {
        /// Class whose ancestry loops
        class: String,
    },
}

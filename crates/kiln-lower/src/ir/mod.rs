//! Intermediate Representation (IR) for lowered classes
//!
//! The IR sits between the typed class model and the binary emitter. It maps
//! almost one-to-one onto the class-file format: access flags, descriptors,
//! bridge and synthetic markers are all explicit.
//!
//! # Structure
//!
//! - `IrClass` - A lowered class with fields, methods and the inner-class table
//! - `IrMethod` - A method, constructor or static initializer with a statement tree
//! - `IrStmt` / `IrExpr` - Statement and expression trees
//! - `IrSymbol` - Parameters, locals and temporaries, shared by reference
//! - `IrType` - Runtime types and their descriptors

pub mod class;
pub mod flags;
pub mod node;
pub mod pretty;
pub mod types;

pub use class::{InnerClassEntry, IrAnnotation, IrClass, IrField, IrMethod};
pub use node::{
    CallKind, IrConstant, IrExpr, IrFieldRef, IrMethodRef, IrStmt, IrSymbol, SymbolId, SymbolRef,
};
pub use pretty::PrettyPrint;
pub use types::{internal_name, method_descriptor, IrPrimitive, IrType};

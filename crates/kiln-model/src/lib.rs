//! Kiln Class Model
//!
//! The fully type-checked class graph handed to the lowering backend. Everything
//! here is produced upstream (parser + type checker) and treated as read-only by
//! lowering: classes, methods with their override chains, constructors, fields,
//! captured variables, annotations, foreign host-runtime classes and the typed
//! statement trees of method bodies.
//!
//! All entities live in one arena, [`ClassModel`], and refer to each other by id.

#![warn(missing_docs)]

pub mod body;
pub mod builder;
pub mod class;
pub mod error;
pub mod foreign;
pub mod method;
pub mod model;
pub mod modifiers;
pub mod ty;

pub use body::{Expr, Literal, Stmt};
pub use builder::ModelBuilder;
pub use class::{
    AnnotationDescription, CapturedVariable, ClassDescription, ClassKind, ConstructorDescription,
    FieldDescription, Retention, SuperCall, ANNOTATION_BUILDER,
};
pub use error::{ModelError, ModelResult};
pub use foreign::{ForeignClass, ForeignMethod};
pub use method::{MethodDescription, MethodKind, ParamDescription};
pub use model::{ClassModel, ClassRef, TypeResolver};
pub use modifiers::Modifiers;
pub use ty::{ClassId, ForeignClassId, MethodId, PrimitiveType, Type, TypeId, TypeVariable};

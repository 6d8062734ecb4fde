//! Typed method-body trees
//!
//! The type checker hands method, constructor and initializer bodies to the
//! backend in this small, fully resolved form: every call names its target
//! method, every construction names its class, every field access names the
//! declaring class.

use crate::ty::{ClassId, MethodId, TypeId};
use serde::{Deserialize, Serialize};

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// `null`
    Null,
    /// Boolean literal
    Bool(bool),
    /// 32-bit integer literal
    Int(i32),
    /// 64-bit integer literal
    Long(i64),
    /// Double literal
    Double(f64),
    /// String literal
    String(String),
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Literal(Literal),

    /// Read of a local, parameter or captured variable
    Local(String),

    /// The receiver of the current instance method
    This,

    /// Field read; `receiver` is `None` for static fields
    Field {
        /// Instance expression for member fields
        receiver: Option<Box<Expr>>,
        /// Class declaring the field
        owner: ClassId,
        /// Field name
        name: String,
    },

    /// Method call; `receiver` is `None` for static functions and implicit `this`
    Call {
        /// Instance expression
        receiver: Option<Box<Expr>>,
        /// Target method
        method: MethodId,
        /// Type arguments for a generic method
        type_args: Vec<TypeId>,
        /// Declared arguments
        args: Vec<Expr>,
    },

    /// Object construction
    New {
        /// Class being instantiated
        class: ClassId,
        /// Type arguments for a generic class
        type_args: Vec<TypeId>,
        /// Index into the class's constructors; `None` selects the default constructor
        ctor: Option<usize>,
        /// Declared arguments
        args: Vec<Expr>,
    },

    /// Indexed read from an array or list
    Index {
        /// Indexed value
        root: Box<Expr>,
        /// Index value
        index: Box<Expr>,
        /// Static type of the element read
        element_type: TypeId,
        /// `?[]` access: a null root yields a default value instead of failing
        null_safe: bool,
        /// Element type to instantiate when reading one past the end of a list
        auto_insert: Option<TypeId>,
    },

    /// Checked cast
    Cast {
        /// Value being cast
        expr: Box<Expr>,
        /// Target type
        ty: TypeId,
    },

    /// `expr == null`
    IsNull(Box<Expr>),
}

impl Expr {
    /// Literal shorthand
    pub fn literal(value: Literal) -> Self {
        Expr::Literal(value)
    }

    /// Local read shorthand
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local(name.into())
    }

    /// String literal shorthand
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// Int literal shorthand
    pub fn int(value: i32) -> Self {
        Expr::Literal(Literal::Int(value))
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Expression evaluated for its effect
    Expr(Expr),

    /// Local variable declaration
    Let {
        /// Variable name
        name: String,
        /// Declared type
        ty: TypeId,
        /// Initial value
        init: Option<Expr>,
        /// Captured by a closure or nested class, so stored in a shared cell
        captured: bool,
    },

    /// Assignment to a local or parameter
    Assign {
        /// Target variable
        name: String,
        /// New value
        value: Expr,
    },

    /// Assignment to a field; `receiver` is `None` for static fields
    SetField {
        /// Instance expression
        receiver: Option<Expr>,
        /// Class declaring the field
        owner: ClassId,
        /// Field name
        name: String,
        /// New value
        value: Expr,
    },

    /// Conditional
    If {
        /// Boolean condition
        cond: Expr,
        /// Taken when the condition holds
        then_branch: Vec<Stmt>,
        /// Taken otherwise
        else_branch: Vec<Stmt>,
    },

    /// Return, with a value for non-void methods
    Return(Option<Expr>),

    /// Nested block (introduces a scope)
    Block(Vec<Stmt>),
}

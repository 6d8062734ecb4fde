//! IR types and binary descriptors
//!
//! Every IR type knows its class-file descriptor. Two IR types are equal exactly
//! when their descriptors are equal, which is what bridge generation compares.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Primitive runtime types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrPrimitive {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl IrPrimitive {
    /// Single-letter descriptor code
    pub fn code(&self) -> char {
        match self {
            IrPrimitive::Void => 'V',
            IrPrimitive::Boolean => 'Z',
            IrPrimitive::Byte => 'B',
            IrPrimitive::Char => 'C',
            IrPrimitive::Short => 'S',
            IrPrimitive::Int => 'I',
            IrPrimitive::Long => 'J',
            IrPrimitive::Float => 'F',
            IrPrimitive::Double => 'D',
        }
    }
}

/// A type as it appears in the emitted class file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrType {
    /// Primitive or void
    Primitive(IrPrimitive),
    /// Array of the component type
    Array(Box<IrType>),
    /// Class or interface, by internal (slash-separated) name
    Object {
        /// Internal name, e.g. `java/lang/String`
        name: String,
        /// Interface rather than class; affects call instructions, not identity
        interface: bool,
    },
}

impl IrType {
    /// Class type from an internal or binary name
    pub fn class(name: &str) -> Self {
        IrType::Object {
            name: internal_name(name),
            interface: false,
        }
    }

    /// Interface type from an internal or binary name
    pub fn interface(name: &str) -> Self {
        IrType::Object {
            name: internal_name(name),
            interface: true,
        }
    }

    /// Array of `component`
    pub fn array(component: IrType) -> Self {
        IrType::Array(Box::new(component))
    }

    pub fn void() -> Self {
        IrType::Primitive(IrPrimitive::Void)
    }

    pub fn boolean() -> Self {
        IrType::Primitive(IrPrimitive::Boolean)
    }

    pub fn int() -> Self {
        IrType::Primitive(IrPrimitive::Int)
    }

    /// `java/lang/Object`
    pub fn object() -> Self {
        IrType::class("java/lang/Object")
    }

    /// `java/lang/String`
    pub fn string() -> Self {
        IrType::class("java/lang/String")
    }

    /// `java/lang/Class`
    pub fn class_object() -> Self {
        IrType::class("java/lang/Class")
    }

    /// Class-file descriptor: `I`, `[J`, `Ljava/lang/String;`
    pub fn descriptor(&self) -> String {
        match self {
            IrType::Primitive(p) => p.code().to_string(),
            IrType::Array(component) => format!("[{}", component.descriptor()),
            IrType::Object { name, .. } => format!("L{};", name),
        }
    }

    /// Name used in constant-pool class references (descriptor for arrays)
    pub fn internal_name(&self) -> String {
        match self {
            IrType::Object { name, .. } => name.clone(),
            other => other.descriptor(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Primitive(IrPrimitive::Void))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, IrType::Primitive(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, IrType::Array(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, IrType::Object { interface: true, .. })
    }

    /// Component type of an array
    pub fn component(&self) -> Option<&IrType> {
        match self {
            IrType::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Whether this is `java/lang/Object`
    pub fn is_root_object(&self) -> bool {
        matches!(self, IrType::Object { name, .. } if name == "java/lang/Object")
    }
}

impl PartialEq for IrType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IrType::Primitive(a), IrType::Primitive(b)) => a == b,
            (IrType::Array(a), IrType::Array(b)) => a == b,
            (IrType::Object { name: a, .. }, IrType::Object { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for IrType {}

impl Hash for IrType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor().hash(state);
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Convert a binary name (`a.b.C$D`) to an internal name (`a/b/C$D`)
pub fn internal_name(name: &str) -> String {
    name.replace('.', "/")
}

/// Method descriptor: `(Ljava/lang/String;I)V`
pub fn method_descriptor(params: &[IrType], return_ty: &IrType) -> String {
    let mut out = String::from("(");
    for param in params {
        out.push_str(&param.descriptor());
    }
    out.push(')');
    out.push_str(&return_ty.descriptor());
    out
}

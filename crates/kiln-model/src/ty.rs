//! Type and entity identifiers
//!
//! Types are interned in the [`crate::ClassModel`] arena so that two structurally
//! equal types always share one [`TypeId`].

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Create an id from its raw index
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            /// Raw index into the owning arena
            pub fn as_u32(&self) -> u32 {
                self.0
            }

            pub(crate) fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

arena_id!(
    /// Interned type
    TypeId,
    "TypeId"
);
arena_id!(
    /// Source class (class, interface, enum, enhancement, program, block)
    ClassId,
    "ClassId"
);
arena_id!(
    /// Source method or property accessor
    MethodId,
    "MethodId"
);
arena_id!(
    /// Host-runtime class known only through its declared signatures
    ForeignClassId,
    "ForeignClassId"
);

/// Primitive types of the target runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// No value
    Void,
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveType {
    /// Source-level spelling
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Generic type variable: `T`, `E extends Comparable<E>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeVariable {
    /// Declared name
    pub name: String,
    /// Upper bound; erasure falls back to the root object type when absent
    pub bound: Option<TypeId>,
}

impl TypeVariable {
    /// Unbounded type variable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: None,
        }
    }

    /// Type variable with an upper bound
    pub fn bounded(name: impl Into<String>, bound: TypeId) -> Self {
        Self {
            name: name.into(),
            bound: Some(bound),
        }
    }
}

/// A resolved type in the class model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Primitive or void
    Primitive(PrimitiveType),

    /// Array of the component type
    Array(TypeId),

    /// Source class, optionally parameterized
    Class {
        /// Declaring class
        class: ClassId,
        /// Type arguments (empty for raw or non-generic uses)
        args: Vec<TypeId>,
    },

    /// Host-runtime class, optionally parameterized
    Foreign {
        /// Declaring foreign class
        class: ForeignClassId,
        /// Type arguments (empty for raw or non-generic uses)
        args: Vec<TypeId>,
    },

    /// Reference to a type variable of a class or method
    TypeVar(TypeVariable),
}

impl Type {
    /// Whether values of this type are primitives (void included)
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Void))
    }

    /// Type arguments of a parameterized class type
    pub fn type_args(&self) -> &[TypeId] {
        match self {
            Type::Class { args, .. } | Type::Foreign { args, .. } => args,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(TypeId::new(3).to_string(), "TypeId(3)");
        assert_eq!(ClassId::new(0).to_string(), "ClassId(0)");
        assert_eq!(MethodId::new(7).as_u32(), 7);
    }

    #[test]
    fn test_primitive_names() {
        assert_eq!(PrimitiveType::Int.type_name(), "int");
        assert_eq!(PrimitiveType::Void.to_string(), "void");
    }

    #[test]
    fn test_type_queries() {
        assert!(Type::Primitive(PrimitiveType::Void).is_void());
        assert!(Type::Primitive(PrimitiveType::Long).is_primitive());
        let generic = Type::Class {
            class: ClassId::new(1),
            args: vec![TypeId::new(4)],
        };
        assert_eq!(generic.type_args(), &[TypeId::new(4)]);
        assert!(Type::Array(TypeId::new(1)).type_args().is_empty());
    }
}

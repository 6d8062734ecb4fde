//! Class descriptions

use crate::body::{Expr, Stmt};
use crate::method::ParamDescription;
use crate::modifiers::Modifiers;
use crate::ty::{ClassId, ForeignClassId, MethodId, TypeId, TypeVariable};
use serde::{Deserialize, Serialize};

/// Local name under which annotation-initializer statements see the annotation map being built
pub const ANNOTATION_BUILDER: &str = "$builder";

/// Kind of source class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    /// Ordinary class
    Class,
    /// Interface
    Interface,
    /// Enum
    Enum,
    /// Enhancement (extension methods on another type)
    Enhancement,
}

/// Annotation retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Retention {
    /// Discarded by the compiler
    Source,
    /// Recorded in the class file, invisible at runtime
    Class,
    /// Recorded and visible at runtime
    Runtime,
}

/// An annotation applied to a class, field or method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDescription {
    /// Annotation type
    pub ty: TypeId,
    /// Retention policy of the annotation type
    pub retention: Retention,
}

impl AnnotationDescription {
    /// Annotation with the given retention
    pub fn new(ty: TypeId, retention: Retention) -> Self {
        Self { ty, retention }
    }
}

/// A variable captured from an enclosing lexical scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedVariable {
    /// Source name
    pub name: String,
    /// Declared type of the variable (not of its cell)
    pub ty: TypeId,
}

impl CapturedVariable {
    /// Captured variable
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    /// Source modifiers (`static` selects a static field)
    pub modifiers: Modifiers,
    /// Member index assigned by the type checker; instance fields are laid out by it
    pub index: u32,
    /// Enum constant
    pub is_enum_constant: bool,
    /// Initializer, run in the constructor or static initializer
    pub initializer: Option<Expr>,
    /// Declared annotations
    pub annotations: Vec<AnnotationDescription>,
}

impl FieldDescription {
    /// Public instance field without initializer
    pub fn new(name: impl Into<String>, ty: TypeId, index: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: Modifiers::PUBLIC,
            index,
            is_enum_constant: false,
            initializer: None,
            annotations: Vec::new(),
        }
    }

    /// Whether this is a static field
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Set the initializer
    pub fn with_initializer(mut self, init: Expr) -> Self {
        self.initializer = Some(init);
        self
    }

    /// Replace the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// The super-constructor call of a constructor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuperCall {
    /// Index into the supertype's constructors; `None` selects its default constructor
    pub ctor: Option<usize>,
    /// Declared arguments, appended after the synthetic carrier arguments
    pub args: Vec<Expr>,
}

/// A constructor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDescription {
    /// Declared parameters
    pub params: Vec<ParamDescription>,
    /// Source modifiers
    pub modifiers: Modifiers,
    /// Declared body; `None` when the source declared no constructor at all
    pub body: Option<Vec<Stmt>>,
    /// Super-constructor invocation
    pub super_call: SuperCall,
}

impl ConstructorDescription {
    /// Implicit default constructor with no declared body
    pub fn implicit(modifiers: Modifiers) -> Self {
        Self {
            params: Vec::new(),
            modifiers,
            body: None,
            super_call: SuperCall::default(),
        }
    }

    /// Declared constructor with the given parameters and body
    pub fn declared(params: Vec<ParamDescription>, body: Vec<Stmt>) -> Self {
        Self {
            params,
            modifiers: Modifiers::PUBLIC,
            body: Some(body),
            super_call: SuperCall::default(),
        }
    }
}

/// A source class as seen by the backend.
///
/// Produced by the type checker and never mutated during lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescription {
    /// Binary name with `.` package separators and `$` nesting, e.g. `demo.Outer$Inner`
    pub name: String,
    /// Class kind
    pub kind: ClassKind,
    /// Source modifiers
    pub modifiers: Modifiers,
    /// Supertype; `None` means the root object class
    pub supertype: Option<TypeId>,
    /// Declared interfaces, in declaration order
    pub interfaces: Vec<TypeId>,
    /// Class-level type variables
    pub type_vars: Vec<TypeVariable>,
    /// Enclosing class for nested, inner and anonymous classes
    pub enclosing: Option<ClassId>,
    /// Function an anonymous class or block is declared in
    pub enclosing_method: Option<MethodId>,
    /// Anonymous class
    pub is_anonymous: bool,
    /// Block (closure) class
    pub is_block: bool,
    /// Top-level executable program
    pub is_program: bool,
    /// Needs dynamic access to external bindings (eval/interactive contexts)
    pub requires_external_symbols: bool,
    /// Foreign class this class proxies
    pub proxy_for: Option<ForeignClassId>,
    /// Enhanced type of an enhancement
    pub enhanced_type: Option<TypeId>,
    /// Declared fields (instance and static), in declaration order
    pub fields: Vec<FieldDescription>,
    /// Declared methods (instance and static), in declaration order
    pub methods: Vec<MethodId>,
    /// Constructors; empty when none were declared
    pub constructors: Vec<ConstructorDescription>,
    /// Declared inner classes
    pub inner_classes: Vec<ClassId>,
    /// Variables captured from enclosing scopes, in capture order
    pub captured: Vec<CapturedVariable>,
    /// Class annotations
    pub annotations: Vec<AnnotationDescription>,
    /// Annotation-initializer statement lists
    pub annotation_initializers: Vec<Vec<Stmt>>,
    /// Declared member-property names
    pub properties: Vec<String>,
    /// Source file the class came from
    pub source_file: Option<String>,
    /// Error recorded by the type checker; a class carrying one is never lowered
    pub recorded_error: Option<String>,
}

impl ClassDescription {
    /// Empty public class of the given kind
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Modifiers::PUBLIC,
            supertype: None,
            interfaces: Vec::new(),
            type_vars: Vec::new(),
            enclosing: None,
            enclosing_method: None,
            is_anonymous: false,
            is_block: false,
            is_program: false,
            requires_external_symbols: false,
            proxy_for: None,
            enhanced_type: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            inner_classes: Vec::new(),
            captured: Vec::new(),
            annotations: Vec::new(),
            annotation_initializers: Vec::new(),
            properties: Vec::new(),
            source_file: None,
            recorded_error: None,
        }
    }

    /// Interface
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// Enum
    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::Enum
    }

    /// Enhancement
    pub fn is_enhancement(&self) -> bool {
        self.kind == ClassKind::Enhancement
    }

    /// Declares class-level type variables
    pub fn is_generic(&self) -> bool {
        !self.type_vars.is_empty()
    }

    /// Static nested class. Nested enums and interfaces are static whether
    /// or not the modifier was written.
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
            || (self.enclosing.is_some() && (self.is_enum() || self.is_interface()))
    }

    /// Proxy over a foreign class
    pub fn is_proxy(&self) -> bool {
        self.proxy_for.is_some()
    }

    /// Nested class that holds a reference to an enclosing instance
    pub fn is_non_static_inner(&self) -> bool {
        !self.is_static() && self.enclosing.is_some()
    }

    /// Static fields, in declaration order
    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_static())
    }

    /// Instance fields, ordered by member index
    pub fn ordered_instance_fields(&self) -> Vec<&FieldDescription> {
        let mut fields: Vec<&FieldDescription> =
            self.fields.iter().filter(|f| !f.is_static()).collect();
        fields.sort_by_key(|f| f.index);
        fields
    }

    /// Enum constants, in declaration order
    pub fn enum_constants(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_enum_constant)
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a member property with exactly this name is declared
    pub fn declares_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
}

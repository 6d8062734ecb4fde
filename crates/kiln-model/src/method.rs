//! Method descriptions and override links

use crate::body::Stmt;
use crate::class::AnnotationDescription;
use crate::modifiers::Modifiers;
use crate::ty::{ClassId, MethodId, TypeId, TypeVariable};
use serde::{Deserialize, Serialize};

/// What a method symbol stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodKind {
    /// Plain function
    Function,
    /// Property getter; runtime name is `get<Property>`
    Getter(String),
    /// Property setter; runtime name is `set<Property>`
    Setter(String),
    /// The `invoke` method of a block (closure) class
    BlockInvoke,
    /// Program body entry (`evaluate`), called by the generated `main`
    ProgramEvaluate,
    /// Enum `values()` symbol registered by the type checker
    EnumValues,
    /// Enum `valueOf(String)` symbol registered by the type checker
    EnumValueOf,
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescription {
    /// Source name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    /// The parameter is captured and mutated, so the body re-boxes it into a cell
    pub value_boxed: bool,
}

impl ParamDescription {
    /// Plain parameter
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: name.into(),
            ty,
            value_boxed: false,
        }
    }
}

/// A method, property accessor or block invoke.
///
/// `super_method` links a method to the method it overrides, forming the
/// override chain walked by bridge generation. `backing` links a parameterized
/// view of an inherited generic method to its declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescription {
    /// Declaring class
    pub owner: ClassId,
    /// Declared name (property name for accessors)
    pub name: String,
    /// Symbol kind
    pub kind: MethodKind,
    /// Declared parameters
    pub params: Vec<ParamDescription>,
    /// Declared return type
    pub return_type: TypeId,
    /// Method-level type variables
    pub type_vars: Vec<TypeVariable>,
    /// Source modifiers
    pub modifiers: Modifiers,
    /// Body; `None` for abstract methods and bodiless synthetic symbols
    pub body: Option<Vec<Stmt>>,
    /// Immediately overridden method
    pub super_method: Option<MethodId>,
    /// Generic declaration behind a parameterized view
    pub backing: Option<MethodId>,
    /// Declared annotations
    pub annotations: Vec<AnnotationDescription>,
}

impl MethodDescription {
    /// Public, non-generic function with no parameters and no body
    pub fn new(owner: ClassId, name: impl Into<String>, return_type: TypeId) -> Self {
        Self {
            owner,
            name: name.into(),
            kind: MethodKind::Function,
            params: Vec::new(),
            return_type,
            type_vars: Vec::new(),
            modifiers: Modifiers::PUBLIC,
            body: None,
            super_method: None,
            backing: None,
            annotations: Vec::new(),
        }
    }

    /// Name of the method in the emitted class
    pub fn runtime_name(&self) -> String {
        match &self.kind {
            MethodKind::Getter(property) => format!("get{}", property),
            MethodKind::Setter(property) => format!("set{}", property),
            _ => self.name.clone(),
        }
    }

    /// Whether this method overrides another
    pub fn is_override(&self) -> bool {
        self.super_method.is_some()
    }

    /// Whether this method is abstract
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    /// Whether this method is static
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    /// Declared parameter types, in order
    pub fn param_types(&self) -> Vec<TypeId> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Add a parameter
    pub fn with_param(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.params.push(ParamDescription::new(name, ty));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: Vec<Stmt>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the overridden method
    pub fn overriding(mut self, super_method: MethodId) -> Self {
        self.super_method = Some(super_method);
        self.modifiers = self.modifiers | Modifiers::OVERRIDE;
        self
    }

    /// Replace the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the symbol kind
    pub fn with_kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a method-level type variable
    pub fn with_type_var(mut self, type_var: TypeVariable) -> Self {
        self.type_vars.push(type_var);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_names() {
        let owner = ClassId::new(0);
        let ty = TypeId::new(0);
        let plain = MethodDescription::new(owner, "foo", ty);
        assert_eq!(plain.runtime_name(), "foo");

        let getter = MethodDescription::new(owner, "Name", ty)
            .with_kind(MethodKind::Getter("Name".to_string()));
        assert_eq!(getter.runtime_name(), "getName");

        let setter = MethodDescription::new(owner, "Name", ty)
            .with_kind(MethodKind::Setter("Name".to_string()));
        assert_eq!(setter.runtime_name(), "setName");
    }

    #[test]
    fn test_overriding_sets_flag() {
        let method = MethodDescription::new(ClassId::new(0), "foo", TypeId::new(0))
            .overriding(MethodId::new(5));
        assert!(method.is_override());
        assert!(method.modifiers.contains(Modifiers::OVERRIDE));
        assert!(method.modifiers.is_public());
    }
}

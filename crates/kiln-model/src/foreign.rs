//! Host-runtime classes
//!
//! Foreign classes are known only through their declared signatures. Source
//! classes implementing a foreign interface do so through a proxy class (a
//! source class whose `proxy_for` names the foreign class).

use crate::modifiers::Modifiers;
use crate::ty::{ForeignClassId, TypeId};
use serde::{Deserialize, Serialize};

/// A method declared on a foreign class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignMethod {
    /// Method name
    pub name: String,
    /// Declared parameter types
    pub params: Vec<TypeId>,
    /// Declared return type
    pub return_type: TypeId,
    /// Declared modifiers
    pub modifiers: Modifiers,
}

impl ForeignMethod {
    /// Public abstract method, as declared on an interface
    pub fn abstract_method(name: impl Into<String>, params: Vec<TypeId>, return_type: TypeId) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            modifiers: Modifiers::PUBLIC | Modifiers::ABSTRACT,
        }
    }
}

/// A host-runtime class or interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignClass {
    /// Binary name with `.` package separators, e.g. `java.lang.String`
    pub name: String,
    /// Interface rather than class
    pub is_interface: bool,
    /// Abstract class
    pub is_abstract: bool,
    /// Superclass (none for the root object class and interfaces)
    pub superclass: Option<ForeignClassId>,
    /// Directly extended/implemented interfaces
    pub interfaces: Vec<ForeignClassId>,
    /// Methods declared directly on this class
    pub methods: Vec<ForeignMethod>,
    /// Has an accessible no-argument constructor
    pub has_default_constructor: bool,
}

impl ForeignClass {
    /// Concrete class with a default constructor
    pub fn class(name: impl Into<String>, superclass: Option<ForeignClassId>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            is_abstract: false,
            superclass,
            interfaces: Vec::new(),
            methods: Vec::new(),
            has_default_constructor: true,
        }
    }

    /// Interface extending the given interfaces
    pub fn interface(name: impl Into<String>, interfaces: Vec<ForeignClassId>) -> Self {
        Self {
            name: name.into(),
            is_interface: true,
            is_abstract: true,
            superclass: None,
            interfaces,
            methods: Vec::new(),
            has_default_constructor: false,
        }
    }

    /// Add a declared method
    pub fn with_method(mut self, method: ForeignMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Declared method with the given name and exact parameter types
    pub fn declared_method(&self, name: &str, params: &[TypeId]) -> Option<&ForeignMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.as_slice() == params)
    }
}

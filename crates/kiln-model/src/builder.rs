//! Convenience construction of class models
//!
//! The type checker normally fills a [`ClassModel`] directly. The builder wraps
//! the repetitive parts (naming nested classes, mirroring foreign interfaces as
//! proxies, appending fields) and validates the result in [`ModelBuilder::finish`].

use crate::class::{ClassDescription, ClassKind, FieldDescription};
use crate::error::ModelResult;
use crate::foreign::{ForeignClass, ForeignMethod};
use crate::method::{MethodDescription, ParamDescription};
use crate::model::ClassModel;
use crate::modifiers::Modifiers;
use crate::ty::{ClassId, ForeignClassId, MethodId, TypeId};

/// Incremental builder for a [`ClassModel`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: ClassModel,
}

impl ModelBuilder {
    /// Start from a model holding only the core host-runtime classes
    pub fn new() -> Self {
        Self {
            model: ClassModel::new(),
        }
    }

    /// Model under construction
    pub fn model(&self) -> &ClassModel {
        &self.model
    }

    /// Mutable model under construction
    pub fn model_mut(&mut self) -> &mut ClassModel {
        &mut self.model
    }

    /// Public top-level class
    pub fn class(&mut self, name: &str) -> ModelResult<ClassId> {
        self.model.add_class(ClassDescription::new(name, ClassKind::Class))
    }

    /// Public top-level interface
    pub fn interface(&mut self, name: &str) -> ModelResult<ClassId> {
        let mut desc = ClassDescription::new(name, ClassKind::Interface);
        desc.modifiers = Modifiers::PUBLIC | Modifiers::ABSTRACT;
        self.model.add_class(desc)
    }

    /// Public enum extending the runtime enum base class
    pub fn enum_class(&mut self, name: &str) -> ModelResult<ClassId> {
        let base = self.model.enum_base_class();
        let id = self.model.add_class(ClassDescription::new(name, ClassKind::Enum))?;
        let self_ty = self.model.class_type(id);
        let supertype = self.model.foreign_parameterized(base, vec![self_ty]);
        let desc = self.model.class_mut(id);
        desc.supertype = Some(supertype);
        desc.modifiers = Modifiers::PUBLIC | Modifiers::FINAL;
        Ok(id)
    }

    /// Append an enum constant to an enum, after the existing fields
    pub fn enum_constant(&mut self, enumeration: ClassId, name: &str) {
        let ty = self.model.class_type(enumeration);
        let index = self.model.class(enumeration).fields.len() as u32;
        let mut constant = FieldDescription::new(name, ty, index)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL);
        constant.is_enum_constant = true;
        self.model.class_mut(enumeration).fields.push(constant);
    }

    /// Non-static inner class named `Outer$simple`, registered with its outer class
    pub fn inner_class(&mut self, outer: ClassId, simple_name: &str) -> ModelResult<ClassId> {
        let name = format!("{}${}", self.model.class(outer).name, simple_name);
        let mut desc = ClassDescription::new(name, ClassKind::Class);
        desc.enclosing = Some(outer);
        if let Some(source_file) = &self.model.class(outer).source_file {
            desc.source_file = Some(source_file.clone());
        }
        let id = self.model.add_class(desc)?;
        self.model.class_mut(outer).inner_classes.push(id);
        Ok(id)
    }

    /// Foreign interface with the given super-interfaces and abstract methods
    pub fn foreign_interface(
        &mut self,
        name: &str,
        extends: Vec<ForeignClassId>,
        methods: Vec<ForeignMethod>,
    ) -> ModelResult<ForeignClassId> {
        let mut class = ForeignClass::interface(name, extends);
        class.methods = methods;
        self.model.add_foreign(class)
    }

    /// Source proxy interface mirroring a foreign class.
    ///
    /// Every foreign method becomes an abstract proxy method with the same
    /// name and signature; source overrides link to those.
    pub fn proxy(&mut self, foreign: ForeignClassId) -> ModelResult<ClassId> {
        let target = self.model.foreign(foreign).clone();
        let mut desc = ClassDescription::new(format!("{}$Proxy", target.name), ClassKind::Interface);
        desc.modifiers = Modifiers::PUBLIC | Modifiers::ABSTRACT;
        desc.proxy_for = Some(foreign);
        let id = self.model.add_class(desc)?;
        for method in &target.methods {
            let mut proxy = MethodDescription::new(id, method.name.clone(), method.return_type)
                .with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
            proxy.params = method
                .params
                .iter()
                .enumerate()
                .map(|(i, &ty)| ParamDescription::new(format!("p{}", i), ty))
                .collect();
            self.model.add_method(proxy);
        }
        Ok(id)
    }

    /// Method of a class by declared name (first match)
    pub fn find_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        self.model
            .class(class)
            .methods
            .iter()
            .copied()
            .find(|&m| self.model.method(m).name == name)
    }

    /// Register a method on its owner
    pub fn method(&mut self, method: MethodDescription) -> MethodId {
        self.model.add_method(method)
    }

    /// Append a field to a class
    pub fn field(&mut self, class: ClassId, field: FieldDescription) {
        self.model.class_mut(class).fields.push(field);
    }

    /// Set the supertype of a class
    pub fn extends(&mut self, class: ClassId, supertype: TypeId) {
        self.model.class_mut(class).supertype = Some(supertype);
    }

    /// Add an implemented interface to a class
    pub fn implements(&mut self, class: ClassId, interface: TypeId) {
        self.model.class_mut(class).interfaces.push(interface);
    }

    /// Validate and return the finished model
    pub fn finish(self) -> ModelResult<ClassModel> {
        self.model.validate()?;
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassRef, TypeResolver};

    #[test]
    fn test_inner_class_naming() {
        let mut builder = ModelBuilder::new();
        let outer = builder.class("demo.A").unwrap();
        let inner = builder.inner_class(outer, "B").unwrap();
        let model = builder.finish().unwrap();

        assert_eq!(model.class(inner).name, "demo.A$B");
        assert_eq!(model.class(inner).enclosing, Some(outer));
        assert_eq!(model.class(outer).inner_classes, vec![inner]);
        assert_eq!(model.resolve_type("demo/A$B"), Some(ClassRef::Source(inner)));
    }

    #[test]
    fn test_enum_extends_enum_base() {
        let mut builder = ModelBuilder::new();
        let color = builder.enum_class("demo.Color").unwrap();
        let model = builder.finish().unwrap();
        let supertype = model.class(color).supertype.unwrap();
        assert_eq!(
            model.class_ref_of(supertype),
            Some(ClassRef::Foreign(model.enum_base_class()))
        );
    }

    #[test]
    fn test_enum_constants_in_declaration_order() {
        let mut builder = ModelBuilder::new();
        let color = builder.enum_class("demo.Color").unwrap();
        builder.enum_constant(color, "RED");
        builder.enum_constant(color, "GREEN");
        let model = builder.finish().unwrap();

        let constants: Vec<&str> = model
            .class(color)
            .enum_constants()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(constants, vec!["RED", "GREEN"]);
        assert!(model.class(color).static_fields().all(|f| f.is_enum_constant));
    }

    #[test]
    fn test_proxy_mirrors_foreign_methods() {
        let mut builder = ModelBuilder::new();
        let object = builder.model_mut().object_type();
        let int = builder.model_mut().int_type();
        let sub = builder
            .foreign_interface(
                "demo.Sub",
                Vec::new(),
                vec![ForeignMethod::abstract_method("get", vec![int], object)],
            )
            .unwrap();
        let proxy = builder.proxy(sub).unwrap();
        let get = builder.find_method(proxy, "get").unwrap();
        let model = builder.finish().unwrap();

        assert!(model.class(proxy).is_proxy());
        assert_eq!(model.method(get).param_types(), vec![int]);
        assert!(model.method(get).is_abstract());
    }
}

//! The class model arena
//!
//! Owns every type, class, method and foreign class of one compilation. The
//! lowering backend only ever borrows it immutably, so one model can be shared
//! by concurrent lowering runs.

use crate::class::ClassDescription;
use crate::error::{ModelError, ModelResult};
use crate::foreign::ForeignClass;
use crate::method::MethodDescription;
use crate::ty::{ClassId, ForeignClassId, MethodId, PrimitiveType, Type, TypeId, TypeVariable};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// A class reachable by name: either compiled from source or foreign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassRef {
    /// Source class
    Source(ClassId),
    /// Host-runtime class
    Foreign(ForeignClassId),
}

/// Read-only name lookup injected into the backend in place of a global type loader
pub trait TypeResolver {
    /// Resolve a binary class name (`.` or `/` separated)
    fn resolve_type(&self, name: &str) -> Option<ClassRef>;
}

#[derive(Debug, Clone, Copy)]
struct WellKnown {
    object: ForeignClassId,
    char_sequence: ForeignClassId,
    string: ForeignClassId,
    enum_base: ForeignClassId,
}

/// Arena holding one compilation's typed class graph
#[derive(Debug, Clone)]
pub struct ClassModel {
    types: Vec<Type>,
    type_map: FxHashMap<Type, TypeId>,
    classes: Vec<ClassDescription>,
    methods: Vec<MethodDescription>,
    foreign: Vec<ForeignClass>,
    names: FxHashMap<String, ClassRef>,
    well_known: WellKnown,
}

impl Default for ClassModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassModel {
    /// Create a model pre-populated with the host runtime's core classes
    pub fn new() -> Self {
        let placeholder = ForeignClassId(0);
        let mut model = Self {
            types: Vec::new(),
            type_map: FxHashMap::default(),
            classes: Vec::new(),
            methods: Vec::new(),
            foreign: Vec::new(),
            names: FxHashMap::default(),
            well_known: WellKnown {
                object: placeholder,
                char_sequence: placeholder,
                string: placeholder,
                enum_base: placeholder,
            },
        };

        let object = model.push_foreign(ForeignClass::class("java.lang.Object", None));
        let char_sequence =
            model.push_foreign(ForeignClass::interface("java.lang.CharSequence", Vec::new()));
        let mut string = ForeignClass::class("java.lang.String", Some(object));
        string.interfaces.push(char_sequence);
        let string = model.push_foreign(string);
        let mut enum_base = ForeignClass::class("java.lang.Enum", Some(object));
        enum_base.is_abstract = true;
        enum_base.has_default_constructor = false;
        let enum_base = model.push_foreign(enum_base);

        model.well_known = WellKnown {
            object,
            char_sequence,
            string,
            enum_base,
        };
        model
    }

    fn push_foreign(&mut self, class: ForeignClass) -> ForeignClassId {
        let id = ForeignClassId(self.foreign.len() as u32);
        self.names.insert(class.name.clone(), ClassRef::Foreign(id));
        self.foreign.push(class);
        id
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Intern a type, returning the canonical id for structurally equal types
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.type_map.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_map.insert(ty, id);
        id
    }

    /// Look up an interned type
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Look up an interned type, checking the id
    pub fn get_type(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.index())
    }

    /// Primitive type
    pub fn primitive(&mut self, prim: PrimitiveType) -> TypeId {
        self.intern(Type::Primitive(prim))
    }

    /// `void`
    pub fn void_type(&mut self) -> TypeId {
        self.primitive(PrimitiveType::Void)
    }

    /// `int`
    pub fn int_type(&mut self) -> TypeId {
        self.primitive(PrimitiveType::Int)
    }

    /// `boolean`
    pub fn boolean_type(&mut self) -> TypeId {
        self.primitive(PrimitiveType::Boolean)
    }

    /// Root object type
    pub fn object_type(&mut self) -> TypeId {
        self.foreign_type(self.well_known.object)
    }

    /// String type
    pub fn string_type(&mut self) -> TypeId {
        self.foreign_type(self.well_known.string)
    }

    /// CharSequence interface type
    pub fn char_sequence_type(&mut self) -> TypeId {
        self.foreign_type(self.well_known.char_sequence)
    }

    /// Raw type of a source class
    pub fn class_type(&mut self, class: ClassId) -> TypeId {
        self.intern(Type::Class {
            class,
            args: Vec::new(),
        })
    }

    /// Parameterized type of a source class
    pub fn parameterized(&mut self, class: ClassId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Class { class, args })
    }

    /// Raw type of a foreign class
    pub fn foreign_type(&mut self, class: ForeignClassId) -> TypeId {
        self.intern(Type::Foreign {
            class,
            args: Vec::new(),
        })
    }

    /// Parameterized type of a foreign class
    pub fn foreign_parameterized(&mut self, class: ForeignClassId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Foreign { class, args })
    }

    /// Array of the component type
    pub fn array_of(&mut self, component: TypeId) -> TypeId {
        self.intern(Type::Array(component))
    }

    /// Type variable reference
    pub fn type_var(&mut self, var: TypeVariable) -> TypeId {
        self.intern(Type::TypeVar(var))
    }

    /// Number of interned types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // ------------------------------------------------------------------
    // Well-known foreign classes
    // ------------------------------------------------------------------

    /// Root object class
    pub fn object_class(&self) -> ForeignClassId {
        self.well_known.object
    }

    /// String class
    pub fn string_class(&self) -> ForeignClassId {
        self.well_known.string
    }

    /// CharSequence interface
    pub fn char_sequence_class(&self) -> ForeignClassId {
        self.well_known.char_sequence
    }

    /// Base class of every enum
    pub fn enum_base_class(&self) -> ForeignClassId {
        self.well_known.enum_base
    }

    // ------------------------------------------------------------------
    // Classes, methods, foreign classes
    // ------------------------------------------------------------------

    /// Register a source class
    pub fn add_class(&mut self, class: ClassDescription) -> ModelResult<ClassId> {
        if self.names.contains_key(&class.name) {
            return Err(ModelError::DuplicateClass { name: class.name });
        }
        let id = ClassId(self.classes.len() as u32);
        self.names.insert(class.name.clone(), ClassRef::Source(id));
        self.classes.push(class);
        Ok(id)
    }

    /// Source class by id
    pub fn class(&self, id: ClassId) -> &ClassDescription {
        &self.classes[id.index()]
    }

    /// Source class by id, checking the id
    pub fn get_class(&self, id: ClassId) -> Option<&ClassDescription> {
        self.classes.get(id.index())
    }

    /// Mutable source class, for model construction only
    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassDescription {
        &mut self.classes[id.index()]
    }

    /// All source classes with their ids
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDescription)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId(i as u32), c))
    }

    /// Number of source classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Register a method and append it to its owner's method list
    pub fn add_method(&mut self, method: MethodDescription) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        let owner = method.owner;
        self.methods.push(method);
        if let Some(class) = self.classes.get_mut(owner.index()) {
            class.methods.push(id);
        }
        id
    }

    /// Method by id
    pub fn method(&self, id: MethodId) -> &MethodDescription {
        &self.methods[id.index()]
    }

    /// Method by id, checking the id
    pub fn get_method(&self, id: MethodId) -> Option<&MethodDescription> {
        self.methods.get(id.index())
    }

    /// Mutable method, for model construction only
    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDescription {
        &mut self.methods[id.index()]
    }

    /// Register a foreign class
    pub fn add_foreign(&mut self, class: ForeignClass) -> ModelResult<ForeignClassId> {
        if self.names.contains_key(&class.name) {
            return Err(ModelError::DuplicateClass { name: class.name });
        }
        Ok(self.push_foreign(class))
    }

    /// Foreign class by id
    pub fn foreign(&self, id: ForeignClassId) -> &ForeignClass {
        &self.foreign[id.index()]
    }

    /// Foreign class by id, checking the id
    pub fn get_foreign(&self, id: ForeignClassId) -> Option<&ForeignClass> {
        self.foreign.get(id.index())
    }

    // ------------------------------------------------------------------
    // Hierarchy queries
    // ------------------------------------------------------------------

    /// Class named by a type; type variables resolve through their bound
    pub fn class_ref_of(&self, ty: TypeId) -> Option<ClassRef> {
        match self.ty(ty) {
            Type::Class { class, .. } => Some(ClassRef::Source(*class)),
            Type::Foreign { class, .. } => Some(ClassRef::Foreign(*class)),
            Type::TypeVar(var) => match var.bound {
                Some(bound) => self.class_ref_of(bound),
                None => Some(ClassRef::Foreign(self.well_known.object)),
            },
            Type::Primitive(_) | Type::Array(_) => None,
        }
    }

    /// Binary name of a class
    pub fn binary_name(&self, class: ClassRef) -> &str {
        match class {
            ClassRef::Source(id) => &self.class(id).name,
            ClassRef::Foreign(id) => &self.foreign(id).name,
        }
    }

    /// Whether a class is an interface
    pub fn is_interface(&self, class: ClassRef) -> bool {
        match class {
            ClassRef::Source(id) => self.class(id).is_interface(),
            ClassRef::Foreign(id) => self.foreign(id).is_interface,
        }
    }

    /// Direct supertypes (superclass first, then interfaces)
    pub fn direct_supertypes(&self, class: ClassRef) -> Vec<ClassRef> {
        let mut supers = Vec::new();
        match class {
            ClassRef::Source(id) => {
                let desc = self.class(id);
                match desc.supertype.and_then(|t| self.class_ref_of(t)) {
                    Some(sup) => supers.push(sup),
                    None if !desc.is_interface() => {
                        supers.push(ClassRef::Foreign(self.well_known.object))
                    }
                    None => {}
                }
                supers.extend(desc.interfaces.iter().filter_map(|&t| self.class_ref_of(t)));
            }
            ClassRef::Foreign(id) => {
                let desc = self.foreign(id);
                supers.extend(desc.superclass.map(ClassRef::Foreign));
                supers.extend(desc.interfaces.iter().map(|&i| ClassRef::Foreign(i)));
            }
        }
        supers
    }

    /// Whether `sub` is `sup` or inherits from it
    pub fn is_subtype(&self, sub: ClassRef, sup: ClassRef) -> bool {
        if sub == sup || sup == ClassRef::Foreign(self.well_known.object) {
            return true;
        }
        let mut visited = FxHashSet::default();
        let mut work = vec![sub];
        while let Some(current) = work.pop() {
            if !visited.insert(current) {
                continue;
            }
            for next in self.direct_supertypes(current) {
                if next == sup {
                    return true;
                }
                work.push(next);
            }
        }
        false
    }

    /// Number of enclosing classes around a class (0 for top-level)
    pub fn nesting_depth(&self, class: ClassId) -> u32 {
        let mut depth = 0;
        let mut current = self.class(class).enclosing;
        while let Some(outer) = current {
            depth += 1;
            current = self.class(outer).enclosing;
        }
        depth
    }

    /// Whether a class is a program or nested (at any depth) inside one
    pub fn is_program_or_enclosed_in_program(&self, class: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            let desc = self.class(id);
            if desc.is_program {
                return true;
            }
            current = desc.enclosing;
        }
        false
    }

    /// Follow `backing` links to the generic declaration of a method
    pub fn backing_method(&self, method: MethodId) -> MethodId {
        let mut current = method;
        let mut steps = 0;
        while let Some(backing) = self.method(current).backing {
            current = backing;
            steps += 1;
            if steps > self.methods.len() {
                break;
            }
        }
        current
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check the structural invariants lowering relies on: every id resolves,
    /// override and backing chains terminate, and class ancestry is acyclic.
    pub fn validate(&self) -> ModelResult<()> {
        for ty in &self.types {
            match ty {
                Type::Primitive(_) => {}
                Type::Array(component) => self.check_type(*component)?,
                Type::Class { class, args } => {
                    self.check_class(*class)?;
                    for &arg in args {
                        self.check_type(arg)?;
                    }
                }
                Type::Foreign { class, args } => {
                    self.check_foreign(*class)?;
                    for &arg in args {
                        self.check_type(arg)?;
                    }
                }
                Type::TypeVar(var) => {
                    if let Some(bound) = var.bound {
                        self.check_type(bound)?;
                    }
                }
            }
        }

        for class in &self.foreign {
            for &id in class.superclass.iter().chain(&class.interfaces) {
                self.check_foreign(id)?;
            }
            for method in &class.methods {
                self.check_type(method.return_type)?;
                for &param in &method.params {
                    self.check_type(param)?;
                }
            }
        }

        for method in &self.methods {
            if self.get_class(method.owner).is_none() {
                return Err(ModelError::UnknownClass {
                    id: method.owner.as_u32(),
                });
            }
            self.check_type(method.return_type)?;
            for param in &method.params {
                self.check_type(param.ty)?;
            }
            for link in [method.super_method, method.backing].into_iter().flatten() {
                if self.get_method(link).is_none() {
                    return Err(ModelError::UnknownMethod { id: link.as_u32() });
                }
            }
        }

        let links: [fn(&MethodDescription) -> Option<MethodId>; 2] =
            [|m| m.super_method, |m| m.backing];
        for (index, method) in self.methods.iter().enumerate() {
            let start = MethodId(index as u32);
            for next in links {
                let mut seen = FxHashSet::default();
                seen.insert(start);
                let mut current = next(method);
                while let Some(id) = current {
                    if !seen.insert(id) {
                        return Err(ModelError::OverrideCycle {
                            method: format!("{}.{}", self.class(method.owner).name, method.name),
                        });
                    }
                    current = next(self.method(id));
                }
            }
        }

        for (id, class) in self.classes() {
            for &method in &class.methods {
                if self.get_method(method).is_none() {
                    return Err(ModelError::UnknownMethod { id: method.as_u32() });
                }
            }
            for field in &class.fields {
                self.check_type(field.ty)?;
            }
            for &ty in class
                .supertype
                .iter()
                .chain(&class.interfaces)
                .chain(&class.enhanced_type)
            {
                self.check_type(ty)?;
            }
            for ctor in &class.constructors {
                for param in &ctor.params {
                    self.check_type(param.ty)?;
                }
            }
            for captured in &class.captured {
                self.check_type(captured.ty)?;
            }
            for &inner in &class.inner_classes {
                self.check_class(inner)?;
            }
            if let Some(method) = class.enclosing_method {
                if self.get_method(method).is_none() {
                    return Err(ModelError::UnknownMethod { id: method.as_u32() });
                }
            }
            if let Some(foreign) = class.proxy_for {
                self.check_foreign(foreign)?;
            }
            let mut seen = FxHashSet::default();
            let mut current = Some(id);
            while let Some(outer) = current {
                if !seen.insert(outer) {
                    return Err(ModelError::HierarchyCycle {
                        class: class.name.clone(),
                    });
                }
                current = self
                    .get_class(outer)
                    .ok_or(ModelError::UnknownClass { id: outer.as_u32() })?
                    .enclosing;
            }
            self.check_supertype_chain(id)?;
        }

        Ok(())
    }

    fn check_class(&self, class: ClassId) -> ModelResult<()> {
        self.get_class(class)
            .map(|_| ())
            .ok_or(ModelError::UnknownClass { id: class.as_u32() })
    }

    fn check_foreign(&self, class: ForeignClassId) -> ModelResult<()> {
        self.get_foreign(class)
            .map(|_| ())
            .ok_or(ModelError::UnknownForeignClass { id: class.as_u32() })
    }

    fn check_type(&self, ty: TypeId) -> ModelResult<()> {
        self.get_type(ty)
            .map(|_| ())
            .ok_or(ModelError::UnknownType { id: ty.as_u32() })
    }

    fn check_supertype_chain(&self, class: ClassId) -> ModelResult<()> {
        let mut seen = FxHashSet::default();
        let mut current = Some(class);
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(ModelError::HierarchyCycle {
                    class: self.class(class).name.clone(),
                });
            }
            current = match self.class(id).supertype.map(|t| self.ty(t)) {
                Some(Type::Class { class, .. }) => Some(*class),
                _ => None,
            };
        }
        Ok(())
    }
}

impl TypeResolver for ClassModel {
    fn resolve_type(&self, name: &str) -> Option<ClassRef> {
        if name.contains('/') {
            self.names.get(&name.replace('/', ".")).copied()
        } else {
            self.names.get(name).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassKind;

    #[test]
    fn test_interning_is_canonical() {
        let mut model = ClassModel::new();
        let a = model.int_type();
        let b = model.primitive(PrimitiveType::Int);
        assert_eq!(a, b);

        let arr1 = model.array_of(a);
        let arr2 = model.array_of(b);
        assert_eq!(arr1, arr2);
        assert_ne!(arr1, a);
    }

    #[test]
    fn test_core_classes_registered() {
        let model = ClassModel::new();
        assert_eq!(
            model.resolve_type("java.lang.String"),
            Some(ClassRef::Foreign(model.string_class()))
        );
        assert_eq!(
            model.resolve_type("java/lang/Object"),
            Some(ClassRef::Foreign(model.object_class()))
        );
        assert!(model.resolve_type("java.lang.Missing").is_none());
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let mut model = ClassModel::new();
        model
            .add_class(ClassDescription::new("demo.A", ClassKind::Class))
            .unwrap();
        let err = model
            .add_class(ClassDescription::new("demo.A", ClassKind::Class))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicateClass {
                name: "demo.A".to_string()
            }
        );
    }

    #[test]
    fn test_string_is_char_sequence() {
        let model = ClassModel::new();
        let string = ClassRef::Foreign(model.string_class());
        let seq = ClassRef::Foreign(model.char_sequence_class());
        assert!(model.is_subtype(string, seq));
        assert!(!model.is_subtype(seq, string));
        assert!(model.is_subtype(seq, ClassRef::Foreign(model.object_class())));
    }

    #[test]
    fn test_nesting_depth() {
        let mut model = ClassModel::new();
        let outer = model
            .add_class(ClassDescription::new("demo.A", ClassKind::Class))
            .unwrap();
        let mut inner = ClassDescription::new("demo.A$B", ClassKind::Class);
        inner.enclosing = Some(outer);
        let inner = model.add_class(inner).unwrap();
        let mut innermost = ClassDescription::new("demo.A$B$C", ClassKind::Class);
        innermost.enclosing = Some(inner);
        let innermost = model.add_class(innermost).unwrap();

        assert_eq!(model.nesting_depth(outer), 0);
        assert_eq!(model.nesting_depth(inner), 1);
        assert_eq!(model.nesting_depth(innermost), 2);
    }

    #[test]
    fn test_override_cycle_detected() {
        let mut model = ClassModel::new();
        let class = model
            .add_class(ClassDescription::new("demo.A", ClassKind::Class))
            .unwrap();
        let void = model.void_type();
        let a = model.add_method(MethodDescription::new(class, "a", void));
        let b = model.add_method(MethodDescription::new(class, "b", void).overriding(a));
        model.method_mut(a).super_method = Some(b);

        assert!(matches!(
            model.validate(),
            Err(ModelError::OverrideCycle { .. })
        ));
    }
}

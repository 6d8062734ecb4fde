//! Descriptor resolution
//!
//! Maps model types onto runtime (erased) IR types. Everything here is a pure
//! function of the read-only class model.

use crate::ir::{IrPrimitive, IrType};
use kiln_model::{
    ClassId, ClassModel, ClassRef, ForeignClassId, MethodDescription, PrimitiveType, Type, TypeId,
    TypeResolver,
};

/// Erases model types to IR types and answers assignability questions
#[derive(Clone, Copy)]
pub struct DescriptorResolver<'a> {
    model: &'a ClassModel,
}

impl<'a> DescriptorResolver<'a> {
    pub fn new(model: &'a ClassModel) -> Self {
        Self { model }
    }

    /// Erased runtime type of a model type.
    ///
    /// Type variables erase to their bound (or the root object class) and
    /// parameterized types erase to their raw class.
    pub fn ir_type(&self, ty: TypeId) -> IrType {
        match self.model.ty(ty) {
            Type::Primitive(prim) => IrType::Primitive(primitive(*prim)),
            Type::Array(component) => IrType::array(self.ir_type(*component)),
            Type::Class { class, .. } => self.class_type(*class),
            Type::Foreign { class, .. } => self.foreign_type(*class),
            Type::TypeVar(var) => match var.bound {
                Some(bound) => self.ir_type(bound),
                None => IrType::object(),
            },
        }
    }

    /// Binary descriptor of a model type
    pub fn descriptor_of(&self, ty: TypeId) -> String {
        self.ir_type(ty).descriptor()
    }

    /// Type of a source class
    pub fn class_type(&self, class: ClassId) -> IrType {
        let desc = self.model.class(class);
        object_type(&desc.name, desc.is_interface())
    }

    /// Type of a foreign class
    pub fn foreign_type(&self, class: ForeignClassId) -> IrType {
        let desc = self.model.foreign(class);
        object_type(&desc.name, desc.is_interface)
    }

    /// Type of a class reference
    pub fn class_ref_type(&self, class: ClassRef) -> IrType {
        match class {
            ClassRef::Source(id) => self.class_type(id),
            ClassRef::Foreign(id) => self.foreign_type(id),
        }
    }

    /// Erased types of a method's declared parameters
    pub fn declared_params(&self, method: &MethodDescription) -> Vec<IrType> {
        method.params.iter().map(|p| self.ir_type(p.ty)).collect()
    }

    /// Whether a value of static type `source` can be used where `target` is
    /// expected without a checked cast
    pub fn is_assignable(&self, target: &IrType, source: &IrType) -> bool {
        if target == source {
            return true;
        }
        match (target, source) {
            (IrType::Primitive(_), _) | (_, IrType::Primitive(_)) => false,
            (target, _) if target.is_root_object() => true,
            (IrType::Array(t), IrType::Array(s)) => {
                !t.is_primitive() && !s.is_primitive() && self.is_assignable(t, s)
            }
            (IrType::Object { name: target, .. }, IrType::Object { name: source, .. }) => {
                match (
                    self.model.resolve_type(source),
                    self.model.resolve_type(target),
                ) {
                    (Some(sub), Some(sup)) => self.model.is_subtype(sub, sup),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

fn object_type(binary_name: &str, interface: bool) -> IrType {
    if interface {
        IrType::interface(binary_name)
    } else {
        IrType::class(binary_name)
    }
}

fn primitive(prim: PrimitiveType) -> IrPrimitive {
    match prim {
        PrimitiveType::Void => IrPrimitive::Void,
        PrimitiveType::Boolean => IrPrimitive::Boolean,
        PrimitiveType::Byte => IrPrimitive::Byte,
        PrimitiveType::Char => IrPrimitive::Char,
        PrimitiveType::Short => IrPrimitive::Short,
        PrimitiveType::Int => IrPrimitive::Int,
        PrimitiveType::Long => IrPrimitive::Long,
        PrimitiveType::Float => IrPrimitive::Float,
        PrimitiveType::Double => IrPrimitive::Double,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_model::{ModelBuilder, TypeVariable};

    #[test]
    fn test_primitive_and_array_descriptors() {
        let mut model = ClassModel::new();
        let int = model.int_type();
        let ints = model.array_of(int);
        let nested = model.array_of(ints);
        let resolver = DescriptorResolver::new(&model);
        assert_eq!(resolver.descriptor_of(int), "I");
        assert_eq!(resolver.descriptor_of(ints), "[I");
        assert_eq!(resolver.descriptor_of(nested), "[[I");
    }

    #[test]
    fn test_erasure() {
        let mut builder = ModelBuilder::new();
        let list = builder.class("demo.Box").unwrap();
        let model = builder.model_mut();
        let string = model.string_type();
        let boxed = model.parameterized(list, vec![string]);
        let raw = model.class_type(list);
        let bounded = model.type_var(TypeVariable::bounded("T", string));
        let unbounded = model.type_var(TypeVariable::new("U"));

        let resolver = DescriptorResolver::new(model);
        assert_eq!(resolver.ir_type(boxed), resolver.ir_type(raw));
        assert_eq!(resolver.descriptor_of(boxed), "Ldemo/Box;");
        assert_eq!(resolver.descriptor_of(bounded), "Ljava/lang/String;");
        assert_eq!(resolver.descriptor_of(unbounded), "Ljava/lang/Object;");
    }

    #[test]
    fn test_interface_flag_from_model() {
        let mut builder = ModelBuilder::new();
        let iface = builder.interface("demo.Shape").unwrap();
        let resolver = DescriptorResolver::new(builder.model());
        assert!(resolver.class_type(iface).is_interface());
        let cs = builder.model().char_sequence_class();
        assert!(resolver.foreign_type(cs).is_interface());
    }

    #[test]
    fn test_assignability() {
        let model = ClassModel::new();
        let resolver = DescriptorResolver::new(&model);
        let string = IrType::string();
        let char_sequence = IrType::interface("java/lang/CharSequence");

        assert!(resolver.is_assignable(&char_sequence, &string));
        assert!(!resolver.is_assignable(&string, &char_sequence));
        assert!(resolver.is_assignable(&IrType::object(), &char_sequence));
        assert!(resolver.is_assignable(
            &IrType::array(char_sequence.clone()),
            &IrType::array(string.clone())
        ));
        assert!(!resolver.is_assignable(&IrType::int(), &IrType::object()));
        assert!(!resolver.is_assignable(&string, &IrType::class("demo/Unknown")));
    }
}

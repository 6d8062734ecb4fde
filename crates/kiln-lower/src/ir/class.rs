//! IR classes, fields and methods
//!
//! One `IrClass` is the complete output of lowering one source class, handed
//! as-is to the binary emitter.

use super::flags::{ACC_ABSTRACT, ACC_BRIDGE, ACC_STATIC, ACC_SYNTHETIC};
use super::node::{IrStmt, SymbolRef};
use super::types::{method_descriptor, IrType};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Name prefixes reserved for synthesized fields
pub const SYNTHETIC_FIELD_PREFIXES: &[&str] = &["this$", "val$", "ttype$", "$VALUES", "$symbols"];

/// An annotation placed on a class, field or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrAnnotation {
    /// Annotation type
    pub ty: IrType,
    /// Retained at runtime (otherwise class-file only)
    pub runtime_visible: bool,
}

/// A field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrField {
    pub name: String,
    pub ty: IrType,
    pub modifiers: u32,
    pub annotations: Vec<IrAnnotation>,
}

impl IrField {
    pub fn new(name: impl Into<String>, ty: IrType, modifiers: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers,
            annotations: Vec::new(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers & ACC_STATIC != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.modifiers & ACC_SYNTHETIC != 0
    }
}

/// A method, constructor (`<init>`) or static initializer (`<clinit>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrMethod {
    pub name: String,
    /// Parameters in order, excluding the receiver
    pub params: Vec<SymbolRef>,
    pub return_ty: IrType,
    pub modifiers: u32,
    /// `None` exactly for abstract methods
    pub body: Option<IrStmt>,
    pub annotations: Vec<IrAnnotation>,
}

impl IrMethod {
    pub fn new(
        name: impl Into<String>,
        params: Vec<SymbolRef>,
        return_ty: IrType,
        modifiers: u32,
        body: Option<IrStmt>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_ty,
            modifiers,
            body,
            annotations: Vec::new(),
        }
    }

    /// Parameter types in order
    pub fn param_types(&self) -> Vec<IrType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    /// Method descriptor
    pub fn descriptor(&self) -> String {
        method_descriptor(&self.param_types(), &self.return_ty)
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers & ACC_ABSTRACT != 0
    }

    pub fn is_static(&self) -> bool {
        self.modifiers & ACC_STATIC != 0
    }

    pub fn is_bridge(&self) -> bool {
        self.modifiers & ACC_BRIDGE != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

/// An entry of the inner-class attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerClassEntry {
    pub inner: IrType,
    pub outer: IrType,
    /// Simple name of the inner class (`Inner` for `Outer$Inner`)
    pub simple_name: String,
    pub modifiers: u32,
}

/// A fully lowered class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrClass {
    /// Internal name, e.g. `demo/Outer$Inner`
    pub name: String,
    pub modifiers: u32,
    pub supertype: IrType,
    pub interfaces: Vec<IrType>,
    pub source_file: Option<String>,
    pub fields: Vec<IrField>,
    pub methods: Vec<IrMethod>,
    pub inner_classes: Vec<InnerClassEntry>,
    pub annotations: Vec<IrAnnotation>,
}

impl IrClass {
    /// Create an empty class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: 0,
            supertype: IrType::object(),
            interfaces: Vec::new(),
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Type of this class
    pub fn this_type(&self) -> IrType {
        IrType::Object {
            name: self.name.clone(),
            interface: self.modifiers & super::flags::ACC_INTERFACE != 0,
        }
    }

    /// Add an interface unless already present
    pub fn add_interface(&mut self, iface: IrType) {
        if !self.interfaces.contains(&iface) {
            self.interfaces.push(iface);
        }
    }

    pub fn add_field(&mut self, field: IrField) {
        self.fields.push(field);
    }

    pub fn add_method(&mut self, method: IrMethod) {
        self.methods.push(method);
    }

    pub fn add_inner_class(&mut self, entry: InnerClassEntry) {
        self.inner_classes.push(entry);
    }

    /// Get a field by name
    pub fn get_field(&self, name: &str) -> Option<&IrField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a method by name and descriptor
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&IrMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor() == descriptor)
    }

    /// Methods with the given name, in emission order
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IrMethod> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.get_method(name, descriptor).is_some()
    }

    /// Constructors in emission order
    pub fn constructors(&self) -> impl Iterator<Item = &IrMethod> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// The static initializer, if one was emitted
    pub fn static_initializer(&self) -> Option<&IrMethod> {
        self.methods.iter().find(|m| m.name == "<clinit>")
    }

    /// Bridge methods in emission order
    pub fn bridges(&self) -> impl Iterator<Item = &IrMethod> {
        self.methods.iter().filter(|m| m.is_bridge())
    }

    /// Validate the class structure
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let mut field_names = FxHashSet::default();
        for field in &self.fields {
            if !field_names.insert(field.name.as_str()) {
                errors.push(format!("Duplicate field '{}'", field.name));
            }
            let reserved = SYNTHETIC_FIELD_PREFIXES
                .iter()
                .any(|prefix| field.name.starts_with(prefix));
            if reserved && !field.is_synthetic() {
                errors.push(format!("Synthetic field '{}' is not marked synthetic", field.name));
            }
        }

        let mut signatures = FxHashSet::default();
        for method in &self.methods {
            let descriptor = method.descriptor();
            if !signatures.insert((method.name.clone(), descriptor.clone())) {
                errors.push(format!("Duplicate method '{}{}'", method.name, descriptor));
            }
            if method.is_bridge() && method.is_abstract() {
                errors.push(format!("Bridge '{}{}' is abstract", method.name, descriptor));
            }
            match (&method.body, method.is_abstract()) {
                (None, false) => {
                    errors.push(format!("Method '{}{}' has no body", method.name, descriptor))
                }
                (Some(_), true) => errors.push(format!(
                    "Abstract method '{}{}' has a body",
                    method.name, descriptor
                )),
                (Some(body), false) if !method.return_ty.is_void() && !body.is_terminal() => {
                    errors.push(format!(
                        "Method '{}{}' does not end in a return",
                        method.name, descriptor
                    ))
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Hex SHA-256 of the canonical JSON form, stable across lowering runs
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::flags::{ACC_FINAL, ACC_PUBLIC};
    use crate::ir::node::IrExpr;

    fn concrete(name: &str, body: Option<IrStmt>) -> IrMethod {
        IrMethod::new(name, vec![], IrType::void(), ACC_PUBLIC, body)
    }

    #[test]
    fn test_class_new() {
        let class = IrClass::new("demo/Point");
        assert_eq!(class.name, "demo/Point");
        assert!(class.supertype.is_root_object());
        assert!(class.fields.is_empty());
    }

    #[test]
    fn test_interfaces_deduplicated() {
        let mut class = IrClass::new("demo/A");
        class.add_interface(IrType::interface("java/lang/Runnable"));
        class.add_interface(IrType::interface("java/lang/Runnable"));
        assert_eq!(class.interfaces.len(), 1);
    }

    #[test]
    fn test_validate_ok() {
        let mut class = IrClass::new("demo/A");
        class.add_field(IrField::new("this$0", IrType::class("demo/Outer"), ACC_FINAL | ACC_SYNTHETIC));
        class.add_method(concrete("run", Some(IrStmt::Return(None))));
        assert!(class.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_violations() {
        let mut class = IrClass::new("demo/A");
        class.add_field(IrField::new("val$x", IrType::array(IrType::int()), ACC_FINAL));
        class.add_method(concrete("run", None));
        class.add_method(concrete("go", Some(IrStmt::NoOp)));
        class.add_method(concrete("go", Some(IrStmt::NoOp)));

        let errors = class.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("val$x"));
    }

    #[test]
    fn test_validate_non_void_body_must_return() {
        let mut class = IrClass::new("demo/A");
        class.add_method(IrMethod::new("size", vec![], IrType::int(), ACC_PUBLIC, Some(IrStmt::NoOp)));
        class.add_method(IrMethod::new(
            "count",
            vec![],
            IrType::int(),
            ACC_PUBLIC,
            Some(IrStmt::Block(vec![IrStmt::Return(Some(IrExpr::int(1)))])),
        ));

        let errors = class.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("size()I"));
        assert!(errors[0].contains("does not end in a return"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let mut a = IrClass::new("demo/A");
        a.add_method(concrete("run", Some(IrStmt::Return(None))));
        let b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let mut c = a.clone();
        c.modifiers = ACC_PUBLIC;
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }
}

//! Class Model to IR Lowering
//!
//! Converts one type-checked source class into an `IrClass`. The phases run in
//! a fixed order:
//!
//! header, inner-class table, static initializer, fields, constructors,
//! methods (statics, members each followed by their bridges, synthesized
//! accessors, program entry point, annotation methods), class annotations.
//!
//! Every lowering run owns its own `Context`, enum ordinal counter and output
//! class; the class model is only borrowed.

mod body;
mod bridge;
pub mod context;
pub mod descriptor;
mod members;
mod methods;

pub use context::Context;
pub use descriptor::DescriptorResolver;
pub use members::EnumOrdinalCounter;

use crate::config::LowerOptions;
use crate::error::{LowerDiagnostic, LowerError, LowerResult};
use crate::ir::flags::{
    ACC_ABSTRACT, ACC_ENUM, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC,
    ACC_STATIC, ACC_SUPER, ACC_SYNTHETIC,
};
use crate::ir::{
    internal_name, CallKind, InnerClassEntry, IrAnnotation, IrClass, IrExpr, IrFieldRef,
    IrMethod, IrMethodRef, IrStmt, IrType,
};
use kiln_model::{
    AnnotationDescription, ClassDescription, ClassId, ClassModel, MethodKind, Modifiers,
    Retention,
};
use rustc_hash::FxHashSet;
use tracing::{debug, debug_span, trace};

/// Result of lowering one class
#[derive(Debug, Clone)]
pub struct LoweredClass {
    pub class: IrClass,
    /// Non-fatal observations made while lowering
    pub diagnostics: Vec<LowerDiagnostic>,
}

/// Lowers one source class.
///
/// A lowerer is consumed by [`ClassLowerer::compile`] or
/// [`ClassLowerer::compile_interface_methods_class`]; nothing it allocates
/// outlives the run.
pub struct ClassLowerer<'a> {
    model: &'a ClassModel,
    options: &'a LowerOptions,
    class_id: ClassId,
    class: &'a ClassDescription,
    types: DescriptorResolver<'a>,
    ctx: Context,
    enum_counter: EnumOrdinalCounter,
    /// Name and ordinal of the enum constant whose initializer is being lowered
    pending_enum_constant: Option<(String, i32)>,
    /// The receiver is passed as the explicit `$that$` parameter
    static_receiver: bool,
    diagnostics: Vec<LowerDiagnostic>,
    ir: IrClass,
}

impl<'a> ClassLowerer<'a> {
    /// Lowerer for one class of `model`. The model is validated first, so
    /// dangling ids surface as [`LowerError::Model`].
    pub fn new(model: &'a ClassModel, class_id: ClassId, options: &'a LowerOptions) -> LowerResult<Self> {
        model.validate()?;
        Self::for_validated_model(model, class_id, options)
    }

    /// Lowerer over a model the caller has already validated
    pub(crate) fn for_validated_model(
        model: &'a ClassModel,
        class_id: ClassId,
        options: &'a LowerOptions,
    ) -> LowerResult<Self> {
        let class = model
            .get_class(class_id)
            .ok_or(kiln_model::ModelError::UnknownClass {
                id: class_id.as_u32(),
            })?;
        Ok(Self {
            model,
            options,
            class_id,
            class,
            types: DescriptorResolver::new(model),
            ctx: Context::new(),
            enum_counter: EnumOrdinalCounter::new(),
            pending_enum_constant: None,
            static_receiver: false,
            diagnostics: Vec::new(),
            ir: IrClass::new(internal_name(&class.name)),
        })
    }

    /// Lower the class
    pub fn compile(mut self) -> LowerResult<LoweredClass> {
        let span = debug_span!("lower_class", class = %self.class.name);
        let _enter = span.enter();

        self.check_recorded_error()?;

        self.compile_header();
        self.compile_inner_class_table();
        self.compile_static_initializer()?;
        self.compile_fields();
        self.compile_constructors()?;
        self.compile_methods()?;
        self.ir.annotations = self.annotations(&self.class.annotations);

        debug!(
            fields = self.ir.fields.len(),
            methods = self.ir.methods.len(),
            bridges = self.ir.bridges().count(),
            "lowered class"
        );
        Ok(LoweredClass {
            class: self.ir,
            diagnostics: self.diagnostics,
        })
    }

    /// Lower the methods holder of an interface: its annotation methods and a
    /// static copy of each default method taking the receiver as `$that$`.
    pub fn compile_interface_methods_class(mut self) -> LowerResult<IrClass> {
        if !self.class.is_interface() {
            return Err(LowerError::InvalidClassKind {
                class: self.class.name.clone(),
                operation: "create an interface methods class".to_string(),
            });
        }
        let span = debug_span!("lower_interface_methods", class = %self.class.name);
        let _enter = span.enter();

        self.check_recorded_error()?;

        let name = format!(
            "{}{}",
            internal_name(&self.class.name),
            self.options.runtime.interface_methods_suffix
        );
        let mut holder = IrClass::new(name);
        holder.modifiers = ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_SYNTHETIC;
        holder.source_file = self.class.source_file.clone();
        self.ir = holder;

        let class = self.class;
        for &id in &class.methods {
            let method = self.model.method(id);
            if method.is_static() || method.is_abstract() || method.body.is_none() {
                continue;
            }
            self.static_receiver = true;
            let lowered = self.lower_method(id);
            self.static_receiver = false;
            self.ir.add_method(lowered?);
        }
        self.compile_annotation_methods()?;

        Ok(self.ir)
    }

    fn check_recorded_error(&self) -> LowerResult<()> {
        match &self.class.recorded_error {
            Some(message) => Err(LowerError::InvalidClass {
                class: self.class.name.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Header
    // ========================================================================

    fn compile_header(&mut self) {
        let class = self.class;
        self.ir.modifiers = self.class_modifiers();
        self.ir.source_file = class.source_file.clone();

        self.ir.supertype = if class.is_interface() || class.is_enhancement() {
            IrType::object()
        } else {
            class
                .supertype
                .map(|t| self.types.ir_type(t))
                .unwrap_or_else(IrType::object)
        };
        for &iface in &class.interfaces {
            let ty = self.types.ir_type(iface);
            self.ir.add_interface(ty);
        }
    }

    fn class_modifiers(&self) -> u32 {
        let class = self.class;
        let mut flags = 0;
        if class.is_interface() {
            flags |= ACC_INTERFACE | ACC_ABSTRACT;
        } else {
            if class.is_enum() {
                flags |= ACC_ENUM | ACC_FINAL;
            }
            if class.enclosing.is_none() {
                flags |= ACC_SUPER;
            }
        }
        let mods = class.modifiers;
        if self.options.single_serving_loader || !(mods.is_internal() || mods.is_private()) {
            flags |= ACC_PUBLIC;
        }
        if mods.is_final() {
            flags |= ACC_FINAL;
        }
        if mods.is_abstract() {
            flags |= ACC_ABSTRACT;
        }
        flags
    }

    // ========================================================================
    // Inner-class table
    // ========================================================================

    fn compile_inner_class_table(&mut self) {
        if self.class.enclosing.is_some() {
            if let Some(entry) = self.inner_class_entry(self.class_id) {
                self.ir.add_inner_class(entry);
            }
        }
        for &inner in &self.class.inner_classes {
            if let Some(entry) = self.inner_class_entry(inner) {
                self.ir.add_inner_class(entry);
            }
        }
    }

    fn inner_class_entry(&self, inner: ClassId) -> Option<InnerClassEntry> {
        let desc = self.model.class(inner);
        let outer = desc.enclosing?;
        let outer_name = &self.model.class(outer).name;
        let simple_name = desc
            .name
            .strip_prefix(outer_name.as_str())
            .and_then(|rest| rest.strip_prefix('$'))
            .unwrap_or(&desc.name)
            .to_string();
        Some(InnerClassEntry {
            inner: self.types.class_type(inner),
            outer: self.types.class_type(outer),
            simple_name,
            modifiers: self.inner_class_modifiers(desc),
        })
    }

    fn inner_class_modifiers(&self, desc: &ClassDescription) -> u32 {
        let mods = desc.modifiers;
        let mut flags = 0;
        if desc.is_static() || desc.is_interface() {
            flags |= ACC_STATIC;
        }
        if mods.is_private() && !self.options.single_serving_loader {
            flags |= ACC_PRIVATE;
        } else if self.options.single_serving_loader || !(mods.is_internal() || mods.is_private()) {
            flags |= ACC_PUBLIC;
        }
        if desc.is_interface() {
            flags |= ACC_INTERFACE | ACC_ABSTRACT;
        } else if mods.is_abstract() {
            flags |= ACC_ABSTRACT;
        }
        if desc.is_enum() {
            flags |= ACC_ENUM | ACC_FINAL;
        } else if mods.is_final() {
            flags |= ACC_FINAL;
        }
        flags
    }

    // ========================================================================
    // Static initializer
    // ========================================================================

    fn compile_static_initializer(&mut self) -> LowerResult<()> {
        self.ctx.push_scope(false);
        let result = self.static_initializer_body();
        self.ctx.pop_scope();
        let stmts = result?;
        if stmts.is_empty() {
            return Ok(());
        }

        let mut body = stmts;
        body.push(IrStmt::Return(None));
        trace!(owner = %self.ir.name, "static initializer");
        self.ir.add_method(IrMethod::new(
            "<clinit>",
            Vec::new(),
            IrType::void(),
            ACC_STATIC,
            Some(IrStmt::Block(body)),
        ));
        Ok(())
    }

    fn static_initializer_body(&mut self) -> LowerResult<Vec<IrStmt>> {
        let class = self.class;
        let mut stmts = Vec::new();

        if let Some(bootstrap) = &self.options.runtime.bootstrap {
            let init = IrMethodRef::new(
                IrType::class(bootstrap),
                "init",
                Vec::new(),
                IrType::boolean(),
                CallKind::Static,
            );
            stmts.push(IrStmt::Eval(IrExpr::call(None, init, Vec::new())));
        }

        if self.model.is_program_or_enclosed_in_program(self.class_id) {
            let symbols = self
                .ctx
                .make_symbol(members::SYMBOLS, self.symbol_map_type(), false);
            self.ctx.declare(&symbols)?;
            stmts.push(IrStmt::Assign {
                value: IrExpr::Null(symbols.ty.clone()),
                symbol: symbols,
            });
        }

        let constant_count = class.enum_constants().count();
        for field in class.static_fields() {
            let field_ref = IrFieldRef::of_static(self.this_type(), &field.name, self.types.ir_type(field.ty));
            if field.is_enum_constant {
                let ordinal = self.enum_counter.increment(&field.name);
                self.pending_enum_constant = Some((field.name.clone(), ordinal));
                let value = match &field.initializer {
                    Some(init) => self.lower_expr(init),
                    None => self.construct(self.class_id, &[], None, Vec::new()),
                };
                self.pending_enum_constant = None;
                stmts.push(IrStmt::SetField {
                    receiver: None,
                    field: field_ref,
                    value: value?,
                });
                if self.enum_counter.count() == constant_count {
                    stmts.push(self.values_array_initializer());
                }
            } else if let Some(init) = &field.initializer {
                let value = self.lower_expr(init)?;
                stmts.push(IrStmt::SetField {
                    receiver: None,
                    field: field_ref,
                    value,
                });
            }
        }

        if class.is_enum() && constant_count == 0 {
            stmts.push(self.values_array_initializer());
        }
        Ok(stmts)
    }

    // ========================================================================
    // Methods
    // ========================================================================

    fn compile_methods(&mut self) -> LowerResult<()> {
        let class = self.class;
        let is_regenerated = |kind: &MethodKind| {
            class.is_enum() && matches!(kind, MethodKind::EnumValues | MethodKind::EnumValueOf)
        };

        let mut emitted: FxHashSet<(String, String)> = FxHashSet::default();
        for &id in &class.methods {
            let method = self.model.method(id);
            if !is_regenerated(&method.kind) {
                let signature = self.method_signature(id);
                emitted.insert((signature.name.clone(), signature.descriptor()));
            }
        }

        for &id in &class.methods {
            let method = self.model.method(id);
            if method.is_static() && !is_regenerated(&method.kind) {
                let lowered = self.lower_method(id)?;
                self.ir.add_method(lowered);
            }
        }

        let mut seen = FxHashSet::default();
        for &id in &class.methods {
            let method = self.model.method(id);
            if method.is_static() || is_regenerated(&method.kind) || !seen.insert(id) {
                continue;
            }
            self.static_receiver = class.is_enhancement();
            let lowered = self.lower_method(id);
            self.static_receiver = false;
            self.ir.add_method(lowered?);

            if !class.is_enhancement() {
                for bridge in self.bridges_for(id, &mut emitted)? {
                    self.ir.add_method(bridge);
                }
            }
        }

        if !(class.is_interface() || class.is_enhancement() || class.is_block) {
            let getter = self.intrinsic_type_getter();
            self.ir.add_method(getter);
        }
        if class.is_enum() {
            self.compile_enum_accessors();
        }
        if self.has_outer_field() {
            let accessor = self.outer_accessor()?;
            self.ir.add_method(accessor);
        }
        if class.is_program && class.enclosing.is_none() {
            let main = self.program_main()?;
            self.ir.add_method(main);
        }
        if !class.is_interface() {
            self.compile_annotation_methods()?;
        }
        Ok(())
    }

    /// Access flags of a declared method
    fn method_modifiers(&self, method: &kiln_model::MethodDescription) -> u32 {
        let mut flags = access_flags(method.modifiers);
        if method.is_static() || self.static_receiver {
            flags |= ACC_STATIC;
        }
        if method.modifiers.is_final() {
            flags |= ACC_FINAL;
        }
        if self.class.is_interface() && !self.static_receiver {
            flags = (flags & !(ACC_PRIVATE | ACC_PROTECTED)) | ACC_PUBLIC;
            if method.body.is_none() && !method.is_static() {
                flags |= ACC_ABSTRACT;
            }
        }
        if method.is_abstract() && !self.static_receiver {
            flags |= ACC_ABSTRACT;
        }
        flags
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// Materialize annotations: one per type, source retention dropped
    fn annotations(&self, declared: &[AnnotationDescription]) -> Vec<IrAnnotation> {
        if !self.options.emit_annotations {
            return Vec::new();
        }
        let mut seen = FxHashSet::default();
        declared
            .iter()
            .filter(|a| a.retention != Retention::Source)
            .filter(|a| seen.insert(a.ty))
            .map(|a| IrAnnotation {
                ty: self.types.ir_type(a.ty),
                runtime_visible: a.retention == Retention::Runtime,
            })
            .collect()
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    fn this_type(&self) -> IrType {
        self.types.class_type(self.class_id)
    }

    fn type_handle_type(&self) -> IrType {
        IrType::interface(&self.options.runtime.type_handle)
    }

    fn symbol_map_type(&self) -> IrType {
        IrType::interface(&self.options.runtime.symbol_map)
    }

    /// Visibility bits of a synthetic member that is otherwise `fallback`
    fn synthetic_visibility(&self, fallback: u32) -> u32 {
        if self.options.single_serving_loader {
            ACC_PUBLIC
        } else {
            fallback
        }
    }
}

/// Access bits of source modifiers (internal visibility maps to package access)
fn access_flags(mods: Modifiers) -> u32 {
    if mods.is_public() {
        ACC_PUBLIC
    } else if mods.is_private() {
        ACC_PRIVATE
    } else if mods.is_protected() {
        ACC_PROTECTED
    } else {
        0
    }
}

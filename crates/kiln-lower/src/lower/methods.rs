//! Method and constructor emission
//!
//! Runtime parameter lists are assembled here once and reused by call sites,
//! bridges and the program entry point.

use super::members::{
    captured_field_name, type_param_field_name, type_param_param_name, CarrierKind,
    OUTER_ACCESSOR, RECEIVER_PARAM, SYMBOLS,
};
use super::{access_flags, ClassLowerer};
use crate::error::{LowerError, LowerResult};
use crate::ir::flags::{ACC_ABSTRACT, ACC_PRIVATE, ACC_STATIC};
use crate::ir::{
    method_descriptor, CallKind, IrExpr, IrFieldRef, IrMethod, IrMethodRef, IrStmt, IrType,
    SymbolRef,
};
use kiln_model::{
    ClassId, ClassRef, ConstructorDescription, MethodDescription, MethodId, MethodKind, Modifiers,
};
use tracing::trace;

/// What a runtime parameter carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SlotKind {
    /// Explicit receiver of a statically emitted instance method
    Receiver,
    /// Runtime type handle of the method's n-th type variable
    TypeParam(usize),
    /// External symbol map
    Symbols,
    /// The n-th declared parameter
    Declared(usize),
}

#[derive(Debug, Clone)]
pub(super) struct ParamSlot {
    pub name: String,
    pub ty: IrType,
    pub kind: SlotKind,
}

/// Runtime signature of a source method
#[derive(Debug, Clone)]
pub(super) struct MethodSignature {
    pub owner: IrType,
    pub name: String,
    pub params: Vec<ParamSlot>,
    pub return_ty: IrType,
    pub is_static: bool,
}

impl MethodSignature {
    pub fn param_types(&self) -> Vec<IrType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn descriptor(&self) -> String {
        method_descriptor(&self.param_types(), &self.return_ty)
    }

    pub fn method_ref(&self, kind: CallKind) -> IrMethodRef {
        IrMethodRef::new(
            self.owner.clone(),
            self.name.clone(),
            self.param_types(),
            self.return_ty.clone(),
            kind,
        )
    }
}

impl<'a> ClassLowerer<'a> {
    /// Runtime signature of a method: enhancement receiver, type-variable
    /// carriers, external symbols, then declared parameters
    pub(super) fn method_signature(&self, id: MethodId) -> MethodSignature {
        let model = self.model;
        let method = model.method(id);
        let owner = model.class(method.owner);
        let mut params = Vec::new();

        let receiver = if owner.is_enhancement() && !method.is_static() {
            Some(
                owner
                    .enhanced_type
                    .map(|t| self.types.ir_type(t))
                    .unwrap_or_else(IrType::object),
            )
        } else {
            None
        };
        let is_static = method.is_static() || receiver.is_some();
        if let Some(ty) = receiver {
            params.push(ParamSlot {
                name: RECEIVER_PARAM.to_string(),
                ty,
                kind: SlotKind::Receiver,
            });
        }

        for (index, var) in method.type_vars.iter().enumerate() {
            params.push(ParamSlot {
                name: type_param_param_name(&var.name),
                ty: self.type_handle_type(),
                kind: SlotKind::TypeParam(index),
            });
        }

        if self.needs_symbols_param(method) {
            params.push(ParamSlot {
                name: SYMBOLS.to_string(),
                ty: self.symbol_map_type(),
                kind: SlotKind::Symbols,
            });
        }

        let is_block = method.kind == MethodKind::BlockInvoke;
        for (index, param) in method.params.iter().enumerate() {
            let (name, ty) = if is_block {
                (format!("{}$$blockParam", param.name), IrType::object())
            } else if param.value_boxed {
                (format!("{}$$unboxedParam", param.name), self.types.ir_type(param.ty))
            } else {
                (param.name.clone(), self.types.ir_type(param.ty))
            };
            params.push(ParamSlot {
                name,
                ty,
                kind: SlotKind::Declared(index),
            });
        }

        MethodSignature {
            owner: self.types.class_type(method.owner),
            name: method.runtime_name(),
            params,
            return_ty: self.types.ir_type(method.return_type),
            is_static,
        }
    }

    /// Program functions (other than the entry function) and static functions
    /// of classes nested in a program take the external symbol map
    fn needs_symbols_param(&self, method: &MethodDescription) -> bool {
        let owner = self.model.class(method.owner);
        if owner.is_program {
            method.kind != MethodKind::ProgramEvaluate
        } else {
            method.is_static() && self.model.is_program_or_enclosed_in_program(method.owner)
        }
    }

    /// Signature a method is emitted with in the class being built
    fn emitted_signature(&self, id: MethodId) -> MethodSignature {
        let mut signature = self.method_signature(id);
        let has_receiver = signature.params.first().is_some_and(|p| p.kind == SlotKind::Receiver);
        if self.static_receiver && !has_receiver {
            signature.params.insert(
                0,
                ParamSlot {
                    name: RECEIVER_PARAM.to_string(),
                    ty: self.this_type(),
                    kind: SlotKind::Receiver,
                },
            );
            signature.is_static = true;
        }
        signature.owner = self.ir.this_type();
        signature
    }

    /// Call kind for invoking a method with the given signature
    pub(super) fn call_kind(&self, signature: &MethodSignature, method: &MethodDescription) -> CallKind {
        if signature.is_static {
            CallKind::Static
        } else if signature.owner.is_interface() {
            CallKind::Interface
        } else if method.modifiers.is_private() {
            CallKind::Special
        } else {
            CallKind::Virtual
        }
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Lower a declared method
    pub(super) fn lower_method(&mut self, id: MethodId) -> LowerResult<IrMethod> {
        let model = self.model;
        let method = model.method(id);
        let signature = self.emitted_signature(id);
        let flags = self.method_modifiers(method);
        trace!(
            owner = %self.ir.name,
            method = %signature.name,
            descriptor = %signature.descriptor(),
            "method"
        );

        self.ctx.push_scope(flags & ACC_STATIC == 0);
        let result = self.method_body(method, &signature, flags & ACC_ABSTRACT != 0);
        self.ctx.pop_scope();
        let (params, body) = result?;

        let mut lowered = IrMethod::new(signature.name, params, signature.return_ty, flags, body);
        lowered.annotations = self.annotations(&method.annotations);
        Ok(lowered)
    }

    fn method_body(
        &mut self,
        method: &MethodDescription,
        signature: &MethodSignature,
        is_abstract: bool,
    ) -> LowerResult<(Vec<SymbolRef>, Option<IrStmt>)> {
        let params: Vec<SymbolRef> = signature
            .params
            .iter()
            .map(|slot| self.ctx.make_symbol(&slot.name, slot.ty.clone(), false))
            .collect();
        if is_abstract {
            return Ok((params, None));
        }
        self.ctx.bind_parameters(&params)?;

        let Some(declared_body) = &method.body else {
            return Err(LowerError::internal(format!(
                "concrete method {}.{} has no body",
                self.class.name, method.name
            )));
        };

        let mut stmts = Vec::new();
        let is_block = method.kind == MethodKind::BlockInvoke;
        for (slot, symbol) in signature.params.iter().zip(&params) {
            let SlotKind::Declared(index) = slot.kind else {
                continue;
            };
            let declared = method
                .params
                .get(index)
                .ok_or_else(|| LowerError::internal("parameter slot out of range"))?;
            if !(is_block || declared.value_boxed) {
                continue;
            }
            let value_ty = self.types.ir_type(declared.ty);
            let value = if is_block {
                IrExpr::cast(IrExpr::identifier(symbol), value_ty.clone())
            } else {
                IrExpr::identifier(symbol)
            };
            stmts.push(self.bind_local(&declared.name, value_ty, declared.value_boxed, value)?);
        }

        stmts.extend(self.lower_stmts(declared_body)?);
        if signature.return_ty.is_void() && !IrStmt::Block(stmts.clone()).is_terminal() {
            stmts.push(IrStmt::Return(None));
        }
        Ok((params, Some(IrStmt::Block(stmts))))
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Declared constructors, or the implicit default constructor when none
    /// was declared. Interfaces and enhancements get none.
    pub(super) fn compile_constructors(&mut self) -> LowerResult<()> {
        let class = self.class;
        if class.is_interface() || class.is_enhancement() {
            return Ok(());
        }

        let implicit;
        let constructors: &[ConstructorDescription] = if class.constructors.is_empty() {
            let visibility = if class.is_enum() {
                Modifiers::PRIVATE
            } else {
                Modifiers::PUBLIC
            };
            implicit = [ConstructorDescription::implicit(visibility)];
            &implicit
        } else {
            &class.constructors
        };

        for ctor in constructors {
            let lowered = self.lower_constructor(ctor)?;
            self.ir.add_method(lowered);
        }
        Ok(())
    }

    fn lower_constructor(&mut self, ctor: &ConstructorDescription) -> LowerResult<IrMethod> {
        let flags = if self.class.is_enum() {
            ACC_PRIVATE
        } else {
            access_flags(ctor.modifiers)
        };

        self.ctx.push_scope(true);
        let result = self.constructor_body(ctor);
        self.ctx.pop_scope();
        let (params, body) = result?;

        let lowered = IrMethod::new("<init>", params, IrType::void(), flags, Some(body));
        trace!(owner = %self.ir.name, descriptor = %lowered.descriptor(), "constructor");
        Ok(lowered)
    }

    fn constructor_body(&mut self, ctor: &ConstructorDescription) -> LowerResult<(Vec<SymbolRef>, IrStmt)> {
        let carriers = self.carriers(self.class_id);
        let mut params: Vec<SymbolRef> = carriers
            .iter()
            .map(|c| self.ctx.make_symbol(&c.name, c.ty.clone(), false))
            .collect();
        let carrier_count = params.len();
        for param in &ctor.params {
            let name = if param.value_boxed {
                format!("{}$$unboxedParam", param.name)
            } else {
                param.name.clone()
            };
            let symbol = self.ctx.make_symbol(name, self.types.ir_type(param.ty), false);
            params.push(symbol);
        }
        self.ctx.bind_parameters(&params)?;

        let this = self.this_type();
        let receiver = || Some(IrExpr::This(this.clone()));
        let mut stmts = Vec::new();

        for (carrier, symbol) in carriers.iter().zip(&params) {
            let field = match &carrier.kind {
                CarrierKind::Outer => self.outer_field_ref(self.class_id)?,
                CarrierKind::Captured(name) => {
                    IrFieldRef::instance(this.clone(), captured_field_name(name), carrier.ty.clone())
                }
                CarrierKind::Symbols => IrFieldRef::instance(this.clone(), SYMBOLS, carrier.ty.clone()),
                CarrierKind::TypeParam(name) => {
                    IrFieldRef::instance(this.clone(), type_param_field_name(name), carrier.ty.clone())
                }
                CarrierKind::EnumName | CarrierKind::EnumOrdinal => continue,
            };
            stmts.push(IrStmt::SetField {
                receiver: receiver(),
                field,
                value: IrExpr::identifier(symbol),
            });
        }

        stmts.push(self.super_constructor_call(ctor)?);

        let class = self.class;
        for field in class.ordered_instance_fields() {
            if let Some(init) = &field.initializer {
                let value = self.lower_expr(init)?;
                stmts.push(IrStmt::SetField {
                    receiver: receiver(),
                    field: IrFieldRef::instance(this.clone(), &field.name, self.types.ir_type(field.ty)),
                    value,
                });
            }
        }

        for (param, symbol) in ctor.params.iter().zip(&params[carrier_count..]) {
            if param.value_boxed {
                let value_ty = self.types.ir_type(param.ty);
                stmts.push(self.bind_local(&param.name, value_ty, true, IrExpr::identifier(symbol))?);
            }
        }

        if let Some(body) = &ctor.body {
            stmts.extend(self.lower_stmts(body)?);
        }
        if !IrStmt::Block(stmts.clone()).is_terminal() {
            stmts.push(IrStmt::Return(None));
        }
        Ok((params, IrStmt::Block(stmts)))
    }

    /// `super(<carriers the supertype expects>, <explicit arguments>)`
    fn super_constructor_call(&mut self, ctor: &ConstructorDescription) -> LowerResult<IrStmt> {
        let model = self.model;
        let mut explicit = Vec::with_capacity(ctor.super_call.args.len());
        for arg in &ctor.super_call.args {
            explicit.push(self.lower_expr(arg)?);
        }

        let supertype = self.class.supertype;
        let (owner, params, args) = match supertype.and_then(|t| model.class_ref_of(t)) {
            Some(ClassRef::Source(super_id)) => {
                let super_desc = model.class(super_id);
                let type_args = supertype.map(|t| model.ty(t).type_args().to_vec()).unwrap_or_default();
                let mut params: Vec<IrType> = self.carriers(super_id).into_iter().map(|c| c.ty).collect();
                let mut args = self.super_carrier_arguments(super_id, &type_args)?;
                match ctor.super_call.ctor {
                    Some(index) => {
                        let target = super_desc.constructors.get(index).ok_or_else(|| {
                            LowerError::internal(format!(
                                "{} has no constructor #{}",
                                super_desc.name, index
                            ))
                        })?;
                        params.extend(target.params.iter().map(|p| self.types.ir_type(p.ty)));
                    }
                    None => params.extend(explicit.iter().map(IrExpr::ty)),
                }
                args.extend(explicit);
                (self.types.class_type(super_id), params, args)
            }
            Some(ClassRef::Foreign(base)) if base == model.enum_base_class() => {
                let name = self.ctx.resolve(super::members::ENUM_NAME_PARAM)?;
                let ordinal = self.ctx.resolve(super::members::ENUM_ORDINAL_PARAM)?;
                (
                    self.types.foreign_type(base),
                    vec![IrType::string(), IrType::int()],
                    vec![IrExpr::identifier(&name), IrExpr::identifier(&ordinal)],
                )
            }
            Some(ClassRef::Foreign(foreign)) => {
                let params = explicit.iter().map(IrExpr::ty).collect();
                (self.types.foreign_type(foreign), params, explicit)
            }
            None => (IrType::object(), Vec::new(), explicit),
        };

        Ok(IrStmt::Eval(IrExpr::call(
            Some(IrExpr::This(self.this_type())),
            IrMethodRef::constructor(owner, params),
            args,
        )))
    }

    /// Carrier arguments a super constructor expects, taken from this
    /// constructor's own carriers
    fn super_carrier_arguments(&mut self, super_id: ClassId, type_args: &[kiln_model::TypeId]) -> LowerResult<Vec<IrExpr>> {
        let mut handles = self.type_param_arguments(super_id, type_args)?.into_iter();
        let mut args = Vec::new();
        for carrier in self.carriers(super_id) {
            let arg = match &carrier.kind {
                CarrierKind::Outer => self.outer_for_super(super_id)?,
                CarrierKind::TypeParam(name) => handles.next().ok_or_else(|| {
                    LowerError::internal(format!("missing type argument for {}", name))
                })?,
                CarrierKind::Captured(_)
                | CarrierKind::Symbols
                | CarrierKind::EnumName
                | CarrierKind::EnumOrdinal => IrExpr::identifier(&self.ctx.resolve(&carrier.name)?),
            };
            args.push(arg);
        }
        Ok(args)
    }

    /// Enclosing instance handed to an inner superclass: our own outer
    /// reference if it already fits, otherwise reached through `access$0`
    fn outer_for_super(&mut self, super_id: ClassId) -> LowerResult<IrExpr> {
        let model = self.model;
        let target = model.class(super_id).enclosing.ok_or_else(|| {
            LowerError::internal(format!("{} has no enclosing class", model.class(super_id).name))
        })?;
        let outer = self.ctx.resolve(super::members::OUTER_PARAM)?;
        let mut current = self.class.enclosing.ok_or_else(|| {
            LowerError::internal(format!("{} has no enclosing instance", self.class.name))
        })?;
        let mut value = IrExpr::identifier(&outer);

        while !model.is_subtype(ClassRef::Source(current), ClassRef::Source(target)) {
            let next = model.class(current).enclosing.ok_or_else(|| {
                LowerError::internal(format!(
                    "no enclosing instance of {} for the super constructor of {}",
                    model.class(target).name,
                    self.class.name
                ))
            })?;
            let accessor = IrMethodRef::new(
                self.types.class_type(current),
                OUTER_ACCESSOR,
                vec![self.types.class_type(current)],
                self.types.class_type(next),
                CallKind::Static,
            );
            value = IrExpr::call(None, accessor, vec![value]);
            current = next;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LowerOptions;
    use kiln_model::{ClassModel, Expr, Literal, ModelBuilder, ParamDescription, Stmt, TypeVariable};

    fn returns_null() -> Vec<Stmt> {
        vec![Stmt::Return(Some(Expr::Literal(Literal::Null)))]
    }

    fn signature_of(model: &ClassModel, class: ClassId, method: MethodId) -> MethodSignature {
        let options = LowerOptions::default();
        let lowerer = ClassLowerer::new(model, class, &options).unwrap();
        lowerer.method_signature(method)
    }

    #[test]
    fn test_generic_method_signature() {
        let mut builder = ModelBuilder::new();
        let a = builder.class("demo.A").unwrap();
        let model = builder.model_mut();
        let t = model.type_var(TypeVariable::new("T"));
        let int = model.int_type();
        let method = builder.method(
            MethodDescription::new(a, "pick", t)
                .with_type_var(TypeVariable::new("T"))
                .with_param("items", int)
                .with_body(returns_null()),
        );
        let model = builder.finish().unwrap();

        let signature = signature_of(&model, a, method);
        let names: Vec<&str> = signature.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["typeparam$T", "items"]);
        assert_eq!(signature.descriptor(), "(Lkiln/lang/reflect/IType;I)Ljava/lang/Object;");
    }

    #[test]
    fn test_concrete_method_without_body_is_rejected() {
        let mut builder = ModelBuilder::new();
        let a = builder.class("demo.A").unwrap();
        let int = builder.model_mut().int_type();
        let size = builder.method(MethodDescription::new(a, "size", int));
        let model = builder.finish().unwrap();

        let options = LowerOptions::default();
        let mut lowerer = ClassLowerer::new(&model, a, &options).unwrap();
        let err = lowerer.lower_method(size).unwrap_err();
        assert!(matches!(err, LowerError::Internal { .. }));
        assert!(err.to_string().contains("demo.A.size has no body"));
    }

    #[test]
    fn test_block_and_boxed_parameter_names() {
        let mut builder = ModelBuilder::new();
        let block = builder.class("demo.A$block_0_").unwrap();
        builder.model_mut().class_mut(block).is_block = true;
        let int = builder.model_mut().int_type();
        let void = builder.model_mut().void_type();
        let mut invoke = MethodDescription::new(block, "invoke", void)
            .with_kind(MethodKind::BlockInvoke)
            .with_param("x", int)
            .with_body(Vec::new());
        invoke.params.push(ParamDescription {
            name: "y".to_string(),
            ty: int,
            value_boxed: true,
        });
        let invoke = builder.method(invoke);
        let model = builder.finish().unwrap();

        let signature = signature_of(&model, block, invoke);
        let names: Vec<&str> = signature.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x$$blockParam", "y$$blockParam"]);

        let mut builder = ModelBuilder::new();
        let a = builder.class("demo.B").unwrap();
        let int = builder.model_mut().int_type();
        let void = builder.model_mut().void_type();
        let mut method = MethodDescription::new(a, "run", void).with_body(Vec::new());
        method.params.push(ParamDescription {
            name: "n".to_string(),
            ty: int,
            value_boxed: true,
        });
        let method = builder.method(method);
        let model = builder.finish().unwrap();
        let signature = signature_of(&model, a, method);
        assert_eq!(signature.params[0].name, "n$$unboxedParam");
        assert_eq!(signature.params[0].ty, IrType::int());
    }

    #[test]
    fn test_program_methods_take_symbols() {
        let mut builder = ModelBuilder::new();
        let program = builder.class("demo.Script").unwrap();
        builder.model_mut().class_mut(program).is_program = true;
        let object = builder.model_mut().object_type();
        let evaluate = builder.method(
            MethodDescription::new(program, "evaluate", object)
                .with_kind(MethodKind::ProgramEvaluate)
                .with_body(returns_null()),
        );
        let helper =
            builder.method(MethodDescription::new(program, "helper", object).with_body(returns_null()));
        let model = builder.finish().unwrap();

        assert!(signature_of(&model, program, evaluate).params.is_empty());
        let helper_sig = signature_of(&model, program, helper);
        assert_eq!(helper_sig.params.len(), 1);
        assert_eq!(helper_sig.params[0].kind, SlotKind::Symbols);
    }

    #[test]
    fn test_enhancement_methods_are_static() {
        let mut builder = ModelBuilder::new();
        let string = builder.model_mut().string_type();
        let int = builder.model_mut().int_type();
        let enhancement = builder
            .model_mut()
            .add_class(kiln_model::ClassDescription::new(
                "demo.StringEnhancement",
                kiln_model::ClassKind::Enhancement,
            ))
            .unwrap();
        builder.model_mut().class_mut(enhancement).enhanced_type = Some(string);
        let length = builder.method(
            MethodDescription::new(enhancement, "doubled", int)
                .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::Int(2))))]),
        );
        let model = builder.finish().unwrap();

        let signature = signature_of(&model, enhancement, length);
        assert!(signature.is_static);
        assert_eq!(signature.params[0].name, "$that$");
        assert_eq!(signature.descriptor(), "(Ljava/lang/String;)I");
    }
}

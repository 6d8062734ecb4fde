//! Member synthesis
//!
//! Synthetic fields and methods the runtime format needs but the source never
//! wrote: the outer-instance reference, captured-variable cells, type-parameter
//! carriers, the enum values array and accessors, the outer accessor, the
//! program entry point and the annotation-initializer methods.

use super::ClassLowerer;
use crate::error::{LowerError, LowerResult};
use crate::ir::flags::{
    ACC_ENUM, ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC,
};
use crate::ir::{
    CallKind, IrConstant, IrExpr, IrField, IrFieldRef, IrMethod, IrMethodRef, IrStmt, IrType,
};
use kiln_model::{ClassDescription, ClassId, ClassModel, MethodKind, ANNOTATION_BUILDER};
use tracing::trace;

pub(super) const OUTER_PARAM: &str = "this$outer";
pub(super) const SYMBOLS: &str = "$symbols";
pub(super) const SYMBOLS_PARAM: &str = "$symbolsarg";
pub(super) const ENUM_NAME_PARAM: &str = "enum$name";
pub(super) const ENUM_ORDINAL_PARAM: &str = "enum$ordinal";
pub(super) const VALUES_FIELD: &str = "$VALUES";
pub(super) const OUTER_ACCESSOR: &str = "access$0";
pub(super) const RECEIVER_PARAM: &str = "$that$";

pub(super) fn outer_field_name(depth: u32) -> String {
    format!("this${}", depth.saturating_sub(1))
}

pub(super) fn captured_field_name(name: &str) -> String {
    format!("val${}", name)
}

pub(super) fn captured_param_name(name: &str) -> String {
    format!("val${}$arg", name)
}

pub(super) fn type_param_field_name(name: &str) -> String {
    format!("ttype${}", name)
}

pub(super) fn type_param_param_name(name: &str) -> String {
    format!("typeparam${}", name)
}

fn annotation_method_name(index: usize) -> String {
    if index == 0 {
        "$evalAnnotations".to_string()
    } else {
        format!("$evalAnnotations{}", index)
    }
}

/// Hands out (name, ordinal) pairs to enum constants in declaration order
#[derive(Debug, Clone)]
pub struct EnumOrdinalCounter {
    next_ordinal: i32,
    next_name: Option<String>,
}

impl Default for EnumOrdinalCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EnumOrdinalCounter {
    pub fn new() -> Self {
        Self {
            next_ordinal: -1,
            next_name: None,
        }
    }

    /// Advance to the next constant and return its ordinal
    pub fn increment(&mut self, name: &str) -> i32 {
        self.next_ordinal += 1;
        self.next_name = Some(name.to_string());
        self.next_ordinal
    }

    /// Ordinal of the current constant (-1 before the first)
    pub fn ordinal(&self) -> i32 {
        self.next_ordinal
    }

    /// Name of the current constant
    pub fn name(&self) -> Option<&str> {
        self.next_name.as_deref()
    }

    /// Number of constants seen so far
    pub fn count(&self) -> usize {
        (self.next_ordinal + 1) as usize
    }
}

/// What a synthetic constructor parameter carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum CarrierKind {
    Outer,
    Captured(String),
    Symbols,
    TypeParam(String),
    EnumName,
    EnumOrdinal,
}

/// A synthetic constructor parameter, shared by constructor emission and
/// every construction or super call of the class
#[derive(Debug, Clone)]
pub(super) struct Carrier {
    pub kind: CarrierKind,
    pub name: String,
    pub ty: IrType,
}

/// Whether instances of a class hold a reference to an enclosing instance
pub(super) fn has_outer_instance(model: &ClassModel, desc: &ClassDescription) -> bool {
    match desc.enclosing {
        Some(outer) if desc.is_non_static_inner() => {
            !desc.is_interface() && !desc.is_enhancement() && !model.class(outer).is_interface()
        }
        _ => false,
    }
}

/// Type variables a class carries at runtime: its own (unless it is an
/// interface) followed by those of every generic method enclosing an
/// anonymous-class chain
pub(super) fn type_param_names(model: &ClassModel, class: ClassId) -> Vec<String> {
    let desc = model.class(class);
    let mut names: Vec<String> = Vec::new();
    if desc.is_generic() && !desc.is_interface() {
        names.extend(desc.type_vars.iter().map(|v| v.name.clone()));
    }

    let mut current = desc;
    let mut steps = 0;
    while current.is_anonymous && steps <= model.class_count() {
        let Some(enclosing_method) = current.enclosing_method else {
            break;
        };
        let method = model.method(enclosing_method);
        for var in &method.type_vars {
            if !names.contains(&var.name) {
                names.push(var.name.clone());
            }
        }
        current = model.class(method.owner);
        steps += 1;
    }
    names
}

impl<'a> ClassLowerer<'a> {
    /// Synthetic constructor parameters of any class, in the fixed order:
    /// outer reference, captured cells, external symbols, type parameters,
    /// enum name and ordinal
    pub(super) fn carriers(&self, class: ClassId) -> Vec<Carrier> {
        let model = self.model;
        let desc = model.class(class);
        let mut carriers = Vec::new();
        if desc.is_interface() || desc.is_enhancement() {
            return carriers;
        }

        if let (true, Some(outer)) = (has_outer_instance(model, desc), desc.enclosing) {
            carriers.push(Carrier {
                kind: CarrierKind::Outer,
                name: OUTER_PARAM.to_string(),
                ty: self.types.class_type(outer),
            });
        }
        for captured in &desc.captured {
            carriers.push(Carrier {
                kind: CarrierKind::Captured(captured.name.clone()),
                name: captured_param_name(&captured.name),
                ty: IrType::array(self.types.ir_type(captured.ty)),
            });
        }
        if desc.requires_external_symbols {
            carriers.push(Carrier {
                kind: CarrierKind::Symbols,
                name: SYMBOLS_PARAM.to_string(),
                ty: self.symbol_map_type(),
            });
        }
        for name in type_param_names(model, class) {
            carriers.push(Carrier {
                name: type_param_param_name(&name),
                kind: CarrierKind::TypeParam(name),
                ty: self.type_handle_type(),
            });
        }
        if desc.is_enum() {
            carriers.push(Carrier {
                kind: CarrierKind::EnumName,
                name: ENUM_NAME_PARAM.to_string(),
                ty: IrType::string(),
            });
            carriers.push(Carrier {
                kind: CarrierKind::EnumOrdinal,
                name: ENUM_ORDINAL_PARAM.to_string(),
                ty: IrType::int(),
            });
        }
        carriers
    }

    pub(super) fn has_outer_field(&self) -> bool {
        has_outer_instance(self.model, self.class)
    }

    /// Field holding the enclosing instance of `class`
    pub(super) fn outer_field_ref(&self, class: ClassId) -> LowerResult<IrFieldRef> {
        let outer = self.model.class(class).enclosing.ok_or_else(|| {
            LowerError::internal(format!("{} has no enclosing class", self.model.class(class).name))
        })?;
        Ok(IrFieldRef::instance(
            self.types.class_type(class),
            outer_field_name(self.model.nesting_depth(class)),
            self.types.class_type(outer),
        ))
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Synthetic fields, then declared instance fields by member index, then
    /// declared static fields in declaration order
    pub(super) fn compile_fields(&mut self) {
        let class = self.class;

        for carrier in self.carriers(self.class_id) {
            let field = match carrier.kind {
                CarrierKind::Outer => IrField::new(
                    outer_field_name(self.model.nesting_depth(self.class_id)),
                    carrier.ty,
                    ACC_FINAL | ACC_SYNTHETIC | self.synthetic_visibility(0),
                ),
                CarrierKind::Captured(name) => IrField::new(
                    captured_field_name(&name),
                    carrier.ty,
                    ACC_FINAL | ACC_SYNTHETIC | self.synthetic_visibility(ACC_PRIVATE),
                ),
                CarrierKind::Symbols => IrField::new(
                    SYMBOLS,
                    carrier.ty,
                    ACC_FINAL | ACC_SYNTHETIC | self.synthetic_visibility(ACC_PRIVATE),
                ),
                CarrierKind::TypeParam(name) => IrField::new(
                    type_param_field_name(&name),
                    carrier.ty,
                    ACC_FINAL | ACC_SYNTHETIC | self.synthetic_visibility(0),
                ),
                CarrierKind::EnumName | CarrierKind::EnumOrdinal => continue,
            };
            trace!(owner = %self.ir.name, field = %field.name, "synthetic field");
            self.ir.add_field(field);
        }

        if class.is_enum() {
            self.ir.add_field(IrField::new(
                VALUES_FIELD,
                IrType::array(self.this_type()),
                ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC | self.synthetic_visibility(ACC_PRIVATE),
            ));
        }

        for declared in class.ordered_instance_fields() {
            let field = self.declared_field(declared);
            self.ir.add_field(field);
        }
        for declared in class.static_fields() {
            let field = self.declared_field(declared);
            self.ir.add_field(field);
        }
    }

    fn declared_field(&self, declared: &kiln_model::FieldDescription) -> IrField {
        let mut flags = super::access_flags(declared.modifiers);
        if declared.is_static() {
            flags |= ACC_STATIC;
        }
        if declared.modifiers.is_final() {
            flags |= ACC_FINAL;
        }
        if declared.is_enum_constant {
            flags |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM;
        }
        if self.class.is_interface() {
            flags = ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
        }
        let mut field = IrField::new(&declared.name, self.types.ir_type(declared.ty), flags);
        field.annotations = self.annotations(&declared.annotations);
        field
    }

    /// `$VALUES = new E[] { A, B, ... }`
    pub(super) fn values_array_initializer(&self) -> IrStmt {
        let this = self.this_type();
        let values = self
            .class
            .enum_constants()
            .map(|constant| {
                IrExpr::get_field(None, IrFieldRef::of_static(this.clone(), &constant.name, this.clone()))
            })
            .collect();
        IrStmt::SetField {
            receiver: None,
            field: IrFieldRef::of_static(this.clone(), VALUES_FIELD, IrType::array(this.clone())),
            value: IrExpr::ArrayInit {
                component: this,
                values,
            },
        }
    }

    // ========================================================================
    // Intrinsic type getter
    // ========================================================================

    /// `getIntrinsicType()`: the runtime type of the instance, parameterized
    /// by the instance's type-parameter carriers for generic classes
    pub(super) fn intrinsic_type_getter(&self) -> IrMethod {
        let this = self.this_type();
        let handle = self.type_handle_type();
        let get_type = IrMethodRef::new(
            IrType::class(&self.options.runtime.runtime_methods),
            "getType",
            vec![IrType::object()],
            handle.clone(),
            CallKind::Static,
        );
        let mut value = IrExpr::call(None, get_type, vec![IrExpr::This(this.clone())]);

        if self.class.is_generic() && !self.class.is_interface() {
            let args = self
                .class
                .type_vars
                .iter()
                .map(|var| {
                    IrExpr::get_field(
                        Some(IrExpr::This(this.clone())),
                        IrFieldRef::instance(this.clone(), type_param_field_name(&var.name), handle.clone()),
                    )
                })
                .collect();
            let parameterize = IrMethodRef::new(
                handle.clone(),
                "getParameterizedType",
                vec![IrType::array(handle.clone())],
                handle.clone(),
                CallKind::Interface,
            );
            value = IrExpr::call(
                Some(value),
                parameterize,
                vec![IrExpr::ArrayInit {
                    component: handle.clone(),
                    values: args,
                }],
            );
        }

        IrMethod::new(
            "getIntrinsicType",
            Vec::new(),
            handle,
            ACC_PUBLIC | ACC_SYNTHETIC,
            Some(IrStmt::Block(vec![IrStmt::Return(Some(value))])),
        )
    }

    // ========================================================================
    // Enum accessors
    // ========================================================================

    pub(super) fn compile_enum_accessors(&mut self) {
        let this = self.this_type();
        let array = IrType::array(this.clone());
        let count = self.class.enum_constants().count() as i32;

        // values(): a fresh copy per call
        let copy = self.ctx.make_temporary(array.clone());
        let arraycopy = IrMethodRef::new(
            IrType::class("java/lang/System"),
            "arraycopy",
            vec![IrType::object(), IrType::int(), IrType::object(), IrType::int(), IrType::int()],
            IrType::void(),
            CallKind::Static,
        );
        let values_field = IrExpr::get_field(
            None,
            IrFieldRef::of_static(this.clone(), VALUES_FIELD, array.clone()),
        );
        let body = vec![
            IrStmt::Assign {
                symbol: copy.clone(),
                value: IrExpr::NewArray {
                    component: this.clone(),
                    size: Box::new(IrExpr::int(count)),
                },
            },
            IrStmt::Eval(IrExpr::call(
                None,
                arraycopy,
                vec![
                    values_field,
                    IrExpr::int(0),
                    IrExpr::identifier(&copy),
                    IrExpr::int(0),
                    IrExpr::int(count),
                ],
            )),
            IrStmt::Return(Some(IrExpr::identifier(&copy))),
        ];
        self.add_enum_method("values", Vec::new(), array.clone(), ACC_PUBLIC | ACC_STATIC, body);

        if !self.class.declares_property("AllValues") {
            let values = IrMethodRef::new(this.clone(), "values", Vec::new(), array.clone(), CallKind::Static);
            let as_list = IrMethodRef::new(
                IrType::class("java/util/Arrays"),
                "asList",
                vec![IrType::array(IrType::object())],
                IrType::interface("java/util/List"),
                CallKind::Static,
            );
            let list = IrExpr::call(None, as_list, vec![IrExpr::call(None, values, Vec::new())]);
            self.add_enum_method(
                "getAllValues",
                Vec::new(),
                IrType::interface("java/util/List"),
                ACC_PUBLIC | ACC_STATIC,
                vec![IrStmt::Return(Some(list))],
            );
        }

        // valueOf(String): runtime lookup by class literal
        let name = self.ctx.make_symbol("arg", IrType::string(), false);
        let enum_value_of = IrMethodRef::new(
            IrType::class("java/lang/Enum"),
            "valueOf",
            vec![IrType::class_object(), IrType::string()],
            IrType::class("java/lang/Enum"),
            CallKind::Static,
        );
        let lookup = IrExpr::call(
            None,
            enum_value_of,
            vec![IrExpr::ClassLiteral(this.clone()), IrExpr::identifier(&name)],
        );
        self.add_enum_method(
            "valueOf",
            vec![name],
            this.clone(),
            ACC_PUBLIC | ACC_STATIC,
            vec![IrStmt::Return(Some(IrExpr::cast(lookup, this.clone())))],
        );

        let enum_call = |name: &str, return_ty: IrType| {
            IrExpr::call(
                Some(IrExpr::This(this.clone())),
                IrMethodRef::new(IrType::class("java/lang/Enum"), name, Vec::new(), return_ty, CallKind::Virtual),
                Vec::new(),
            )
        };
        let getters = [
            ("Value", "getValue", IrType::object(), IrExpr::This(this.clone())),
            ("Code", "getCode", IrType::string(), enum_call("name", IrType::string())),
            ("Ordinal", "getOrdinal", IrType::int(), enum_call("ordinal", IrType::int())),
            (
                "DisplayName",
                "getDisplayName",
                IrType::string(),
                enum_call("toString", IrType::string()),
            ),
            ("Name", "getName", IrType::string(), enum_call("name", IrType::string())),
        ];
        for (property, getter, return_ty, value) in getters {
            if self.class.declares_property(property) {
                continue;
            }
            self.add_enum_method(
                getter,
                Vec::new(),
                return_ty,
                ACC_PUBLIC | ACC_FINAL,
                vec![IrStmt::Return(Some(value))],
            );
        }
    }

    fn add_enum_method(
        &mut self,
        name: &str,
        params: Vec<crate::ir::SymbolRef>,
        return_ty: IrType,
        modifiers: u32,
        body: Vec<IrStmt>,
    ) {
        trace!(owner = %self.ir.name, method = name, "enum accessor");
        self.ir
            .add_method(IrMethod::new(name, params, return_ty, modifiers, Some(IrStmt::Block(body))));
    }

    // ========================================================================
    // Outer accessor and program entry point
    // ========================================================================

    /// `static access$0(self)`: the outer instance of `self`
    pub(super) fn outer_accessor(&mut self) -> LowerResult<IrMethod> {
        let field = self.outer_field_ref(self.class_id)?;
        let param = self.ctx.make_symbol("staticThis", self.this_type(), false);
        let value = IrExpr::get_field(Some(IrExpr::identifier(&param)), field.clone());
        trace!(owner = %self.ir.name, "outer accessor");
        Ok(IrMethod::new(
            OUTER_ACCESSOR,
            vec![param],
            field.ty,
            ACC_STATIC | ACC_SYNTHETIC | self.synthetic_visibility(0),
            Some(IrStmt::Block(vec![IrStmt::Return(Some(value))])),
        ))
    }

    /// `public static void main(String[] args)`: `new Program().evaluate(null, ...)`
    pub(super) fn program_main(&mut self) -> LowerResult<IrMethod> {
        let model = self.model;
        let evaluate = self
            .class
            .methods
            .iter()
            .copied()
            .find(|&id| model.method(id).kind == MethodKind::ProgramEvaluate)
            .ok_or_else(|| {
                LowerError::internal(format!("program {} has no entry method", self.class.name))
            })?;

        self.ctx.push_scope(false);
        let result = self.program_main_body(evaluate);
        self.ctx.pop_scope();
        let (args, body) = result?;

        Ok(IrMethod::new(
            "main",
            vec![args],
            IrType::void(),
            ACC_PUBLIC | ACC_STATIC,
            Some(IrStmt::Block(body)),
        ))
    }

    fn program_main_body(
        &mut self,
        evaluate: kiln_model::MethodId,
    ) -> LowerResult<(crate::ir::SymbolRef, Vec<IrStmt>)> {
        let args = self
            .ctx
            .make_symbol("args", IrType::array(IrType::string()), false);
        self.ctx.declare(&args)?;

        let program = self.construct(self.class_id, &[], None, Vec::new())?;
        let signature = self.method_signature(evaluate);
        let call_args = signature
            .params
            .iter()
            .map(|slot| default_value(&slot.ty))
            .collect();
        let call = IrExpr::call(
            Some(program),
            signature.method_ref(CallKind::Virtual),
            call_args,
        );
        Ok((args, vec![IrStmt::Eval(call), IrStmt::Return(None)]))
    }

    // ========================================================================
    // Annotation-initializer methods
    // ========================================================================

    /// `$evalAnnotations`, `$evalAnnotations1`, ...: each runs one list of
    /// annotation-initializer statements and hands the map on to the next
    pub(super) fn compile_annotation_methods(&mut self) -> LowerResult<()> {
        let count = self.class.annotation_initializers.len();
        for index in 0..count {
            self.ctx.push_scope(false);
            let result = self.annotation_method(index, count);
            self.ctx.pop_scope();
            let method = result?;
            trace!(owner = %self.ir.name, method = %method.name, "annotation method");
            self.ir.add_method(method);
        }
        Ok(())
    }

    fn annotation_method(&mut self, index: usize, count: usize) -> LowerResult<IrMethod> {
        let class = self.class;
        let map = IrType::class(&self.options.runtime.annotation_map);
        let builder = self.ctx.make_symbol(ANNOTATION_BUILDER, map.clone(), false);
        self.ctx.declare(&builder)?;

        let mut body = Vec::new();
        let params = if index == 0 {
            body.push(IrStmt::Assign {
                symbol: builder.clone(),
                value: IrExpr::New {
                    constructor: IrMethodRef::constructor(map.clone(), Vec::new()),
                    args: Vec::new(),
                },
            });
            Vec::new()
        } else {
            vec![builder.clone()]
        };

        let stmts = class
            .annotation_initializers
            .get(index)
            .ok_or_else(|| LowerError::internal("annotation initializer index out of range"))?;
        body.extend(self.lower_stmts(stmts)?);

        let result = if index + 1 < count {
            let next = IrMethodRef::new(
                self.ir.this_type(),
                annotation_method_name(index + 1),
                vec![map.clone()],
                map.clone(),
                CallKind::Static,
            );
            IrExpr::call(None, next, vec![IrExpr::identifier(&builder)])
        } else {
            IrExpr::identifier(&builder)
        };
        body.push(IrStmt::Return(Some(result)));

        Ok(IrMethod::new(
            annotation_method_name(index),
            params,
            map,
            ACC_PUBLIC | ACC_STATIC,
            Some(IrStmt::Block(body)),
        ))
    }
}

/// Zero value of a primitive type, `null` otherwise
pub(super) fn default_value(ty: &IrType) -> IrExpr {
    match ty {
        IrType::Primitive(prim) => match IrConstant::zero(*prim) {
            Some(zero) => IrExpr::Constant(zero),
            None => IrExpr::Null(ty.clone()),
        },
        _ => IrExpr::Null(ty.clone()),
    }
}

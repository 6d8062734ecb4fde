//! Method-body lowering
//!
//! Lowers the typed statement trees of the class model into IR statements.
//! Captured locals live in single-element array cells so that closures and
//! the declaring scope observe the same storage.

use super::members::{
    captured_field_name, default_value, has_outer_instance, outer_field_name, type_param_field_name,
    type_param_names, type_param_param_name, CarrierKind, RECEIVER_PARAM, SYMBOLS, SYMBOLS_PARAM,
};
use super::methods::SlotKind;
use super::ClassLowerer;
use crate::error::{LowerError, LowerResult};
use crate::ir::{CallKind, IrConstant, IrExpr, IrFieldRef, IrMethodRef, IrStmt, IrType};
use kiln_model::{ClassId, ClassRef, Expr, Literal, Stmt, Type, TypeId};

impl<'a> ClassLowerer<'a> {
    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn lower_stmts(&mut self, stmts: &[Stmt]) -> LowerResult<Vec<IrStmt>> {
        let mut lowered = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            lowered.push(self.lower_stmt(stmt)?);
        }
        Ok(lowered)
    }

    fn lower_block(&mut self, stmts: &[Stmt]) -> LowerResult<IrStmt> {
        self.ctx.push_block();
        let result = self.lower_stmts(stmts);
        self.ctx.pop_scope();
        Ok(IrStmt::Block(result?))
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> LowerResult<IrStmt> {
        match stmt {
            Stmt::Expr(expr) => Ok(IrStmt::Eval(self.lower_expr(expr)?)),
            Stmt::Let {
                name,
                ty,
                init,
                captured,
            } => {
                let value_ty = self.types.ir_type(*ty);
                let value = match init {
                    Some(init) => self.lower_expr(init)?,
                    None => default_value(&value_ty),
                };
                self.bind_local(name, value_ty, *captured, value)
            }
            Stmt::Assign { name, value } => {
                let value = self.lower_expr(value)?;
                self.store_variable(name, value)
            }
            Stmt::SetField {
                receiver,
                owner,
                name,
                value,
            } => {
                let (receiver, field) = self.field_access(receiver.as_ref(), *owner, name)?;
                let value = self.lower_expr(value)?;
                Ok(IrStmt::SetField {
                    receiver,
                    field,
                    value,
                })
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower_expr(cond)?;
                let then_branch = self.lower_block(then_branch)?;
                let else_branch = if else_branch.is_empty() {
                    None
                } else {
                    Some(Box::new(self.lower_block(else_branch)?))
                };
                Ok(IrStmt::If {
                    cond,
                    then_branch: Box::new(then_branch),
                    else_branch,
                })
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.lower_expr(value)?),
                    None => None,
                };
                Ok(IrStmt::Return(value))
            }
            Stmt::Block(stmts) => self.lower_block(stmts),
        }
    }

    /// Declare a local in the innermost scope and initialize it; a boxed
    /// local is a fresh single-element cell holding the value
    pub(super) fn bind_local(
        &mut self,
        name: &str,
        value_ty: IrType,
        boxed: bool,
        value: IrExpr,
    ) -> LowerResult<IrStmt> {
        let (symbol, value) = if boxed {
            let cell = self
                .ctx
                .make_symbol(name, IrType::array(value_ty.clone()), true);
            let value = IrExpr::ArrayInit {
                component: value_ty,
                values: vec![value],
            };
            (cell, value)
        } else {
            (self.ctx.make_symbol(name, value_ty, false), value)
        };
        self.ctx.declare(&symbol)?;
        Ok(IrStmt::Assign { symbol, value })
    }

    fn store_variable(&mut self, name: &str, value: IrExpr) -> LowerResult<IrStmt> {
        if let Some(symbol) = self.ctx.lookup(name) {
            if symbol.boxed {
                return Ok(IrStmt::ArrayStore {
                    array: IrExpr::identifier(&symbol),
                    index: IrExpr::int(0),
                    value,
                });
            }
            return Ok(IrStmt::Assign { symbol, value });
        }
        let cell = self.captured_field_cell(name)?;
        Ok(IrStmt::ArrayStore {
            array: cell,
            index: IrExpr::int(0),
            value,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(super) fn lower_expr(&mut self, expr: &Expr) -> LowerResult<IrExpr> {
        match expr {
            Expr::Literal(literal) => Ok(lower_literal(literal)),
            Expr::Local(name) => self.load_variable(name),
            Expr::This => self.this_expr(),
            Expr::Field {
                receiver,
                owner,
                name,
            } => {
                let (receiver, field) =
                    self.field_access(receiver.as_deref(), *owner, name)?;
                Ok(IrExpr::get_field(receiver, field))
            }
            Expr::Call {
                receiver,
                method,
                type_args,
                args,
            } => self.lower_call(receiver.as_deref(), *method, type_args, args),
            Expr::New {
                class,
                type_args,
                ctor,
                args,
            } => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower_expr(arg)?);
                }
                self.construct(*class, type_args, *ctor, lowered)
            }
            Expr::Index {
                root,
                index,
                element_type,
                null_safe,
                auto_insert,
            } => self.lower_index(root, index, *element_type, *null_safe, *auto_insert),
            Expr::Cast { expr, ty } => {
                let value = self.lower_expr(expr)?;
                Ok(IrExpr::cast(value, self.types.ir_type(*ty)))
            }
            Expr::IsNull(expr) => Ok(IrExpr::IsNull(Box::new(self.lower_expr(expr)?))),
        }
    }

    fn load_variable(&mut self, name: &str) -> LowerResult<IrExpr> {
        if let Some(symbol) = self.ctx.lookup(name) {
            if symbol.boxed {
                let ty = symbol.ty.component().cloned().unwrap_or_else(IrType::object);
                return Ok(IrExpr::ArrayLoad {
                    array: Box::new(IrExpr::identifier(&symbol)),
                    index: Box::new(IrExpr::int(0)),
                    ty,
                });
            }
            return Ok(IrExpr::identifier(&symbol));
        }
        let cell = self.captured_field_cell(name)?;
        let ty = cell.ty().component().cloned().unwrap_or_else(IrType::object);
        Ok(IrExpr::ArrayLoad {
            array: Box::new(cell),
            index: Box::new(IrExpr::int(0)),
            ty,
        })
    }

    /// The cell of a variable this class captured, read from its field
    fn captured_field_cell(&mut self, name: &str) -> LowerResult<IrExpr> {
        let class = self.class;
        let captured = class
            .captured
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| LowerError::UnboundSymbol {
                name: name.to_string(),
            })?;
        let this = self.this_expr()?;
        let cell_ty = IrType::array(self.types.ir_type(captured.ty));
        Ok(IrExpr::get_field(
            Some(this),
            IrFieldRef::instance(self.this_type(), captured_field_name(&captured.name), cell_ty),
        ))
    }

    /// The receiver of the code being lowered
    pub(super) fn this_expr(&self) -> LowerResult<IrExpr> {
        if self.static_receiver || self.class.is_enhancement() {
            if let Some(receiver) = self.ctx.lookup(RECEIVER_PARAM) {
                return Ok(IrExpr::identifier(&receiver));
            }
        }
        if self.ctx.is_instance() {
            Ok(IrExpr::This(self.this_type()))
        } else {
            Err(LowerError::internal(format!(
                "'this' used in a static context of {}",
                self.class.name
            )))
        }
    }

    /// An instance of `target` reachable from the current receiver, walking
    /// outward through outer-instance fields
    fn enclosing_instance(&self, target: ClassId) -> LowerResult<IrExpr> {
        let model = self.model;
        let mut value = self.this_expr()?;
        let mut current = self.class_id;
        while !model.is_subtype(ClassRef::Source(current), ClassRef::Source(target)) {
            let desc = model.class(current);
            let outer = match desc.enclosing {
                Some(outer) if has_outer_instance(model, desc) => outer,
                _ => {
                    return Err(LowerError::internal(format!(
                        "no enclosing instance of {} in {}",
                        model.class(target).name,
                        self.class.name
                    )))
                }
            };
            let field = IrFieldRef::instance(
                self.types.class_type(current),
                outer_field_name(model.nesting_depth(current)),
                self.types.class_type(outer),
            );
            value = IrExpr::get_field(Some(value), field);
            current = outer;
        }
        Ok(value)
    }

    fn field_access(
        &mut self,
        receiver: Option<&Expr>,
        owner: ClassId,
        name: &str,
    ) -> LowerResult<(Option<IrExpr>, IrFieldRef)> {
        let model = self.model;
        let owner_desc = model.class(owner);
        let field = owner_desc.field(name).ok_or_else(|| {
            LowerError::internal(format!("{} has no field '{}'", owner_desc.name, name))
        })?;
        let owner_ty = self.types.class_type(owner);
        let ty = self.types.ir_type(field.ty);
        if field.is_static() || owner_desc.is_interface() {
            return Ok((None, IrFieldRef::of_static(owner_ty, name, ty)));
        }
        let receiver = match receiver {
            Some(receiver) => self.lower_expr(receiver)?,
            None => self.enclosing_instance(owner)?,
        };
        Ok((Some(receiver), IrFieldRef::instance(owner_ty, name, ty)))
    }

    // ========================================================================
    // Calls and construction
    // ========================================================================

    fn lower_call(
        &mut self,
        receiver: Option<&Expr>,
        method_id: kiln_model::MethodId,
        type_args: &[TypeId],
        args: &[Expr],
    ) -> LowerResult<IrExpr> {
        let model = self.model;
        let method = model.method(method_id);
        let signature = self.method_signature(method_id);

        let explicit_receiver = match receiver {
            Some(receiver) => Some(self.lower_expr(receiver)?),
            None => None,
        };
        let has_receiver_slot = signature
            .params
            .first()
            .is_some_and(|p| p.kind == SlotKind::Receiver);
        let (receiver, mut receiver_arg) = if has_receiver_slot {
            let value = match explicit_receiver {
                Some(value) => value,
                None => self.this_expr()?,
            };
            (None, Some(value))
        } else if method.is_static() {
            (None, None)
        } else {
            let value = match explicit_receiver {
                Some(value) => value,
                None => self.enclosing_instance(method.owner)?,
            };
            (Some(value), None)
        };

        let mut declared: Vec<Option<IrExpr>> = Vec::with_capacity(args.len());
        for arg in args {
            declared.push(Some(self.lower_expr(arg)?));
        }

        let mut call_args = Vec::with_capacity(signature.params.len());
        for slot in &signature.params {
            let arg = match slot.kind {
                SlotKind::Receiver => receiver_arg.take(),
                SlotKind::TypeParam(index) => Some(match type_args.get(index) {
                    Some(&ty) => self.type_handle(ty)?,
                    None => {
                        let erased = method
                            .type_vars
                            .get(index)
                            .and_then(|v| v.bound)
                            .map(|b| self.types.ir_type(b))
                            .unwrap_or_else(IrType::object);
                        self.erased_type_handle(erased)
                    }
                }),
                SlotKind::Symbols => Some(self.symbols_value()),
                SlotKind::Declared(index) => declared.get_mut(index).and_then(Option::take),
            };
            let arg = arg.ok_or_else(|| {
                LowerError::internal(format!(
                    "call to {} is missing argument '{}'",
                    signature.name, slot.name
                ))
            })?;
            call_args.push(arg);
        }

        let kind = self.call_kind(&signature, method);
        Ok(IrExpr::call(receiver, signature.method_ref(kind), call_args))
    }

    /// `new C(<carriers>, <args>)`
    pub(super) fn construct(
        &mut self,
        class: ClassId,
        type_args: &[TypeId],
        ctor: Option<usize>,
        args: Vec<IrExpr>,
    ) -> LowerResult<IrExpr> {
        let model = self.model;
        let desc = model.class(class);
        let declared: Vec<IrType> = match ctor {
            Some(index) => desc
                .constructors
                .get(index)
                .ok_or_else(|| {
                    LowerError::internal(format!("{} has no constructor #{}", desc.name, index))
                })?
                .params
                .iter()
                .map(|p| self.types.ir_type(p.ty))
                .collect(),
            None => Vec::new(),
        };
        if declared.len() != args.len() {
            return Err(LowerError::internal(format!(
                "constructor of {} takes {} argument(s), got {}",
                desc.name,
                declared.len(),
                args.len()
            )));
        }

        let carriers = self.carriers(class);
        let mut handles = self.type_param_arguments(class, type_args)?.into_iter();
        let mut params = Vec::with_capacity(carriers.len() + declared.len());
        let mut values = Vec::with_capacity(carriers.len() + args.len());
        for carrier in carriers {
            let value = match &carrier.kind {
                CarrierKind::Outer => {
                    let outer = desc.enclosing.ok_or_else(|| {
                        LowerError::internal(format!("{} has no enclosing class", desc.name))
                    })?;
                    self.enclosing_instance(outer)?
                }
                CarrierKind::Captured(name) => self.captured_cell(name)?,
                CarrierKind::Symbols => self.symbols_value(),
                CarrierKind::TypeParam(name) => handles.next().ok_or_else(|| {
                    LowerError::internal(format!("missing type argument for {}", name))
                })?,
                CarrierKind::EnumName | CarrierKind::EnumOrdinal => {
                    let (name, ordinal) = self.pending_enum_constant.clone().ok_or_else(|| {
                        LowerError::internal(format!(
                            "enum {} constructed outside its constant initializers",
                            desc.name
                        ))
                    })?;
                    if carrier.kind == CarrierKind::EnumName {
                        IrExpr::string(name)
                    } else {
                        IrExpr::int(ordinal)
                    }
                }
            };
            params.push(carrier.ty);
            values.push(value);
        }
        params.extend(declared);
        values.extend(args);

        Ok(IrExpr::New {
            constructor: IrMethodRef::constructor(self.types.class_type(class), params),
            args: values,
        })
    }

    /// The cell of a captured variable as seen from the current code: a boxed
    /// local, this class's captured field, or a constructor's carrier parameter
    fn captured_cell(&mut self, name: &str) -> LowerResult<IrExpr> {
        if let Some(symbol) = self.ctx.lookup(name) {
            if symbol.boxed {
                return Ok(IrExpr::identifier(&symbol));
            }
        }
        let owns_field = self
            .class
            .captured
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name));
        if owns_field && self.ctx.is_instance() {
            return self.captured_field_cell(name);
        }
        let carrier = self.ctx.resolve(&super::members::captured_param_name(name))?;
        Ok(IrExpr::identifier(&carrier))
    }

    /// External symbol map visible to the current code, or `null`
    fn symbols_value(&self) -> IrExpr {
        if let Some(symbols) = self.ctx.lookup(SYMBOLS) {
            return IrExpr::identifier(&symbols);
        }
        if self.class.requires_external_symbols && self.ctx.is_instance() {
            if let Ok(this) = self.this_expr() {
                return IrExpr::get_field(
                    Some(this),
                    IrFieldRef::instance(self.this_type(), SYMBOLS, self.symbol_map_type()),
                );
            }
        }
        match self.ctx.lookup(SYMBOLS_PARAM) {
            Some(symbols) => IrExpr::identifier(&symbols),
            None => IrExpr::Null(self.symbol_map_type()),
        }
    }

    // ========================================================================
    // Type handles
    // ========================================================================

    /// Type handles for the type-parameter carriers of `class`: its own type
    /// variables from `type_args` (or their erasure when raw), inherited
    /// anonymous-chain variables from the current scope
    pub(super) fn type_param_arguments(&mut self, class: ClassId, type_args: &[TypeId]) -> LowerResult<Vec<IrExpr>> {
        let model = self.model;
        let desc = model.class(class);
        let own = if desc.is_generic() && !desc.is_interface() {
            desc.type_vars.len()
        } else {
            0
        };
        let mut handles = Vec::new();
        for (index, name) in type_param_names(model, class).into_iter().enumerate() {
            let handle = if index < own {
                match type_args.get(index) {
                    Some(&ty) => self.type_handle(ty)?,
                    None => {
                        let erased = desc
                            .type_vars
                            .get(index)
                            .and_then(|v| v.bound)
                            .map(|b| self.types.ir_type(b))
                            .unwrap_or_else(IrType::object);
                        self.erased_type_handle(erased)
                    }
                }
            } else {
                self.type_var_handle(&name, IrType::object())
            };
            handles.push(handle);
        }
        Ok(handles)
    }

    /// Runtime handle of a type; type variables come from carriers in scope
    fn type_handle(&mut self, ty: TypeId) -> LowerResult<IrExpr> {
        match self.model.ty(ty) {
            Type::TypeVar(var) => {
                let erased = self.types.ir_type(ty);
                Ok(self.type_var_handle(&var.name, erased))
            }
            _ => Ok(IrExpr::TypeHandle {
                of: self.types.ir_type(ty),
                handle: self.type_handle_type(),
            }),
        }
    }

    fn type_var_handle(&self, name: &str, erased: IrType) -> IrExpr {
        if let Some(param) = self.ctx.lookup(&type_param_param_name(name)) {
            return IrExpr::identifier(&param);
        }
        let carried = type_param_names(self.model, self.class_id)
            .iter()
            .any(|n| n == name);
        if carried && self.ctx.is_instance() {
            if let Ok(this) = self.this_expr() {
                return IrExpr::get_field(
                    Some(this),
                    IrFieldRef::instance(
                        self.this_type(),
                        type_param_field_name(name),
                        self.type_handle_type(),
                    ),
                );
            }
        }
        self.erased_type_handle(erased)
    }

    fn erased_type_handle(&self, of: IrType) -> IrExpr {
        IrExpr::TypeHandle {
            of,
            handle: self.type_handle_type(),
        }
    }

    // ========================================================================
    // Index access
    // ========================================================================

    fn lower_index(
        &mut self,
        root: &Expr,
        index: &Expr,
        element_type: TypeId,
        null_safe: bool,
        auto_insert: Option<TypeId>,
    ) -> LowerResult<IrExpr> {
        if let Some(target) = auto_insert {
            self.check_auto_insert_target(target)?;
        }
        let root = self.lower_expr(root)?;
        let index = self.lower_expr(index)?;
        let element = self.types.ir_type(element_type);

        if !null_safe && auto_insert.is_none() {
            return Ok(self.element_access(root, index, &element, false));
        }

        let root_tmp = self.ctx.make_temporary(root.ty());
        let stmts = vec![IrStmt::Assign {
            symbol: root_tmp.clone(),
            value: root,
        }];

        let access = match auto_insert {
            Some(target) => {
                let index_tmp = self.ctx.make_temporary(IrType::int());
                let insert = IrMethodRef::new(
                    IrType::class(&self.options.runtime.array_access),
                    "maybeAutoInsert",
                    vec![IrType::object(), IrType::int(), self.type_handle_type()],
                    IrType::void(),
                    CallKind::Static,
                );
                let handle = self.type_handle(target)?;
                let insert_call = IrExpr::call(
                    None,
                    insert,
                    vec![
                        IrExpr::identifier(&root_tmp),
                        IrExpr::identifier(&index_tmp),
                        handle,
                    ],
                );
                IrExpr::Composite {
                    stmts: vec![
                        IrStmt::Assign {
                            symbol: index_tmp.clone(),
                            value: index,
                        },
                        IrStmt::Eval(insert_call),
                    ],
                    result: Box::new(self.element_access(
                        IrExpr::identifier(&root_tmp),
                        IrExpr::identifier(&index_tmp),
                        &element,
                        null_safe,
                    )),
                }
            }
            None => self.element_access(IrExpr::identifier(&root_tmp), index, &element, null_safe),
        };

        let result = if null_safe {
            IrExpr::Conditional {
                cond: Box::new(IrExpr::IsNull(Box::new(IrExpr::identifier(&root_tmp)))),
                then_expr: Box::new(default_value(&element)),
                else_expr: Box::new(access),
                ty: element,
            }
        } else {
            access
        };
        Ok(IrExpr::Composite {
            stmts,
            result: Box::new(result),
        })
    }

    /// Array load for arrays, the runtime list helper otherwise
    fn element_access(&self, root: IrExpr, index: IrExpr, element: &IrType, null_safe: bool) -> IrExpr {
        if root.ty().is_array() {
            return IrExpr::ArrayLoad {
                array: Box::new(root),
                index: Box::new(index),
                ty: element.clone(),
            };
        }
        let get = IrMethodRef::new(
            IrType::class(&self.options.runtime.array_access),
            "getArrayElement",
            vec![IrType::object(), IrType::int(), IrType::boolean()],
            IrType::object(),
            CallKind::Static,
        );
        let value = IrExpr::call(
            None,
            get,
            vec![root, index, IrExpr::Constant(IrConstant::Bool(null_safe))],
        );
        IrExpr::cast(value, element.clone())
    }

    /// Auto-insert needs a concrete element type with a no-argument constructor
    fn check_auto_insert_target(&self, target: TypeId) -> LowerResult<()> {
        let model = self.model;
        match model.class_ref_of(target) {
            Some(ClassRef::Source(id)) => {
                let desc = model.class(id);
                if desc.is_interface() || desc.modifiers.is_abstract() {
                    return Err(LowerError::AbstractAutoInsert {
                        type_name: desc.name.clone(),
                    });
                }
                let has_default = desc.constructors.is_empty()
                    || desc.constructors.iter().any(|c| c.params.is_empty());
                if !has_default {
                    return Err(LowerError::MissingDefaultConstructor {
                        type_name: desc.name.clone(),
                    });
                }
                Ok(())
            }
            Some(ClassRef::Foreign(id)) => {
                let desc = model.foreign(id);
                if desc.is_interface || desc.is_abstract {
                    return Err(LowerError::AbstractAutoInsert {
                        type_name: desc.name.clone(),
                    });
                }
                if !desc.has_default_constructor {
                    return Err(LowerError::MissingDefaultConstructor {
                        type_name: desc.name.clone(),
                    });
                }
                Ok(())
            }
            None => Err(LowerError::MissingDefaultConstructor {
                type_name: self.types.descriptor_of(target),
            }),
        }
    }
}

fn lower_literal(literal: &Literal) -> IrExpr {
    match literal {
        Literal::Null => IrExpr::Null(IrType::object()),
        Literal::Bool(b) => IrExpr::Constant(IrConstant::Bool(*b)),
        Literal::Int(i) => IrExpr::Constant(IrConstant::Int(*i)),
        Literal::Long(l) => IrExpr::Constant(IrConstant::Long(*l)),
        Literal::Double(d) => IrExpr::Constant(IrConstant::Double(*d)),
        Literal::String(s) => IrExpr::Constant(IrConstant::String(s.clone())),
    }
}

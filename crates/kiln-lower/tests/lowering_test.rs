//! End-to-end lowering of small class models

use kiln_lower::ir::flags::{ACC_BRIDGE, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC};
use kiln_lower::ir::{IrConstant, IrExpr, IrStmt, IrType};
use kiln_lower::{
    lower_class, lower_classes, lower_interface_methods_class, DiagnosticKind, IrClass, IrMethod,
    LowerError, LowerOptions,
};
use kiln_model::{
    CapturedVariable, ClassId, ClassModel, ConstructorDescription, Expr, FieldDescription,
    ForeignMethod, Literal, MethodDescription, MethodId, MethodKind, ModelBuilder, ModelError,
    Modifiers, ParamDescription, Stmt, TypeVariable,
};

fn lower(model: &ClassModel, class: ClassId) -> IrClass {
    let lowered = lower_class(model, class, &LowerOptions::default()).unwrap();
    if let Err(errors) = lowered.class.validate() {
        panic!("invalid IR for {}: {:?}", lowered.class.name, errors);
    }
    lowered.class
}

fn body(method: &IrMethod) -> &[IrStmt] {
    match &method.body {
        Some(IrStmt::Block(stmts)) => stmts,
        other => panic!("{} has no block body: {:?}", method.name, other),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn field_names(class: &IrClass) -> Vec<&str> {
    class.fields.iter().map(|f| f.name.as_str()).collect()
}

fn param_names(method: &IrMethod) -> Vec<&str> {
    method.params.iter().map(|p| p.name.as_str()).collect()
}

// ============================================================================
// Carriers
// ============================================================================

#[test]
fn test_inner_class_carrier_order() {
    let mut builder = ModelBuilder::new();
    let a = builder.class("demo.A").unwrap();
    builder.model_mut().class_mut(a).type_vars.push(TypeVariable::new("T"));
    let b = builder.inner_class(a, "B").unwrap();
    let int = builder.model_mut().int_type();
    let string = builder.model_mut().string_type();
    {
        let desc = builder.model_mut().class_mut(b);
        desc.type_vars.push(TypeVariable::new("T"));
        desc.captured.push(CapturedVariable::new("x", int));
        desc.constructors.push(ConstructorDescription::declared(
            vec![ParamDescription::new("n", int)],
            Vec::new(),
        ));
    }
    builder.field(b, FieldDescription::new("label", string, 0));
    let model = builder.finish().unwrap();

    let class = lower(&model, b);
    assert_eq!(field_names(&class), vec!["this$0", "val$x", "ttype$T", "label"]);

    let ctor = class.constructors().next().unwrap();
    assert_eq!(param_names(ctor), vec!["this$outer", "val$x$arg", "typeparam$T", "n"]);
    assert_eq!(ctor.descriptor(), "(Ldemo/A;[ILkiln/lang/reflect/IType;I)V");

    let accessor = class.get_method("access$0", "(Ldemo/A$B;)Ldemo/A;").unwrap();
    assert!(accessor.modifiers & ACC_STATIC != 0);
    assert!(accessor.modifiers & ACC_SYNTHETIC != 0);
}

#[test]
fn test_generic_carrier_count() {
    let mut builder = ModelBuilder::new();
    let pair = builder.class("demo.Pair").unwrap();
    {
        let desc = builder.model_mut().class_mut(pair);
        desc.type_vars.push(TypeVariable::new("K"));
        desc.type_vars.push(TypeVariable::new("V"));
    }
    let model = builder.finish().unwrap();

    let class = lower(&model, pair);
    let carriers = class
        .fields
        .iter()
        .filter(|f| f.name.starts_with("ttype$"))
        .count();
    assert_eq!(carriers, 2);
    let ctor = class.constructors().next().unwrap();
    assert_eq!(param_names(ctor), vec!["typeparam$K", "typeparam$V"]);
}

#[test]
fn test_default_constructor_passes_super_carriers() {
    let mut builder = ModelBuilder::new();
    let base = builder.class("demo.Base").unwrap();
    builder.model_mut().class_mut(base).type_vars.push(TypeVariable::new("T"));
    let sub = builder.class("demo.Sub").unwrap();
    let string = builder.model_mut().string_type();
    let base_of_string = builder.model_mut().parameterized(base, vec![string]);
    builder.extends(sub, base_of_string);
    let model = builder.finish().unwrap();

    let class = lower(&model, sub);
    let ctor = class.constructors().next().unwrap();
    assert!(ctor.params.is_empty());

    let stmts = body(ctor);
    let super_calls: Vec<&IrStmt> = stmts
        .iter()
        .filter(|s| matches!(s, IrStmt::Eval(IrExpr::Call { method, .. }) if method.name == "<init>"))
        .collect();
    assert_eq!(super_calls.len(), 1);

    let IrStmt::Eval(IrExpr::Call { method, args, .. }) = super_calls[0] else {
        unreachable!();
    };
    assert_eq!(method.owner, IrType::class("demo/Base"));
    assert_eq!(method.descriptor(), "(Lkiln/lang/reflect/IType;)V");
    assert!(matches!(&args[0], IrExpr::TypeHandle { of, .. } if *of == IrType::string()));
}

#[test]
fn test_closure_shares_captured_cell() {
    let mut builder = ModelBuilder::new();
    let outer = builder.class("demo.Outer").unwrap();
    let block = builder.inner_class(outer, "block_0_").unwrap();
    let int = builder.model_mut().int_type();
    let void = builder.model_mut().void_type();
    {
        let desc = builder.model_mut().class_mut(block);
        desc.is_block = true;
        desc.captured.push(CapturedVariable::new("x", int));
    }
    builder.method(
        MethodDescription::new(block, "invoke", int)
            .with_body(vec![Stmt::Return(Some(Expr::Local("x".to_string())))]),
    );
    builder.method(MethodDescription::new(outer, "run", void).with_body(vec![
        Stmt::Let {
            name: "x".to_string(),
            ty: int,
            init: Some(Expr::Literal(Literal::Int(1))),
            captured: true,
        },
        Stmt::Expr(Expr::New {
            class: block,
            type_args: Vec::new(),
            ctor: None,
            args: Vec::new(),
        }),
    ]));
    let model = builder.finish().unwrap();

    let outer_class = lower(&model, outer);
    let run = outer_class.get_method("run", "()V").unwrap();
    let stmts = body(run);
    let IrStmt::Assign { symbol: cell, value } = &stmts[0] else {
        panic!("expected cell initialization, got {:?}", stmts[0]);
    };
    assert!(cell.boxed);
    assert_eq!(cell.ty, IrType::array(IrType::int()));
    assert!(matches!(value, IrExpr::ArrayInit { .. }));

    let IrStmt::Eval(IrExpr::New { constructor, args }) = &stmts[1] else {
        panic!("expected construction, got {:?}", stmts[1]);
    };
    assert_eq!(constructor.descriptor(), "(Ldemo/Outer;[I)V");
    assert!(matches!(&args[0], IrExpr::This(_)));
    assert!(matches!(&args[1], IrExpr::Identifier(symbol) if symbol.id == cell.id));
    assert_eq!(stmts.last(), Some(&IrStmt::Return(None)));

    let block_class = lower(&model, block);
    assert!(block_class.get_method("getIntrinsicType", "()Lkiln/lang/reflect/IType;").is_none());
    let invoke = block_class.get_method("invoke", "()I").unwrap();
    let IrStmt::Return(Some(IrExpr::ArrayLoad { array, .. })) = &body(invoke)[0] else {
        panic!("expected a cell read");
    };
    assert!(matches!(array.as_ref(), IrExpr::GetField { field, .. } if field.name == "val$x"));
}

// ============================================================================
// Enums
// ============================================================================

fn color_model(constants: &[&str]) -> (ClassModel, ClassId) {
    let mut builder = ModelBuilder::new();
    let color = builder.enum_class("demo.Color").unwrap();
    for name in constants {
        builder.enum_constant(color, name);
    }
    let string = builder.model_mut().string_type();
    let index = builder.model().class(color).fields.len() as u32;
    builder.field(
        color,
        FieldDescription::new("DEFAULT_NAME", string, index)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::STATIC)
            .with_initializer(Expr::Literal(Literal::String("red".to_string()))),
    );
    (builder.finish().unwrap(), color)
}

fn static_stores(class: &IrClass) -> Vec<(String, IrExpr)> {
    body(class.static_initializer().unwrap())
        .iter()
        .filter_map(|stmt| match stmt {
            IrStmt::SetField { field, value, .. } => Some((field.name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_enum_constants_and_values() {
    let (model, color) = color_model(&["RED", "GREEN", "BLUE"]);
    let class = lower(&model, color);

    let stores = static_stores(&class);
    let order: Vec<&str> = stores.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(order, vec!["RED", "GREEN", "BLUE", "$VALUES", "DEFAULT_NAME"]);

    for (ordinal, (name, value)) in stores.iter().take(3).enumerate() {
        let IrExpr::New { constructor, args } = value else {
            panic!("{} is not constructed", name);
        };
        assert_eq!(constructor.descriptor(), "(Ljava/lang/String;I)V");
        assert_eq!(args[0], IrExpr::Constant(IrConstant::String(name.clone())));
        assert_eq!(args[1], IrExpr::Constant(IrConstant::Int(ordinal as i32)));
    }

    let IrExpr::ArrayInit { values, .. } = &stores[3].1 else {
        panic!("$VALUES is not an array");
    };
    let listed: Vec<&str> = values
        .iter()
        .map(|v| match v {
            IrExpr::GetField { field, .. } => field.name.as_str(),
            other => panic!("unexpected element {:?}", other),
        })
        .collect();
    assert_eq!(listed, vec!["RED", "GREEN", "BLUE"]);

    assert!(class.has_method("values", "()[Ldemo/Color;"));
    let value_of = class.get_method("valueOf", "(Ljava/lang/String;)Ldemo/Color;").unwrap();
    assert!(value_of.modifiers & ACC_STATIC != 0);
    for getter in ["getCode", "getOrdinal", "getDisplayName", "getName", "getValue"] {
        assert_eq!(class.methods_named(getter).count(), 1, "{}", getter);
    }

    let ctor = class.constructors().next().unwrap();
    assert_eq!(ctor.modifiers, ACC_PRIVATE);
    assert_eq!(param_names(ctor), vec!["enum$name", "enum$ordinal"]);
}

#[test]
fn test_enum_without_constants_initializes_values_last() {
    let (model, color) = color_model(&[]);
    let class = lower(&model, color);
    let stores = static_stores(&class);
    let order: Vec<&str> = stores.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(order, vec!["DEFAULT_NAME", "$VALUES"]);
}

#[test]
fn test_enum_accessor_skipped_for_declared_property() {
    let mut builder = ModelBuilder::new();
    let color = builder.enum_class("demo.Color").unwrap();
    builder.enum_constant(color, "RED");
    builder.model_mut().class_mut(color).properties.push("Code".to_string());
    let model = builder.finish().unwrap();

    let class = lower(&model, color);
    assert_eq!(class.methods_named("getCode").count(), 0);
    assert_eq!(class.methods_named("getName").count(), 1);
}

#[test]
fn test_nested_enum_has_no_outer_instance() {
    let mut builder = ModelBuilder::new();
    let outer = builder.class("demo.A").unwrap();
    let color = builder.enum_class("demo.A$Color").unwrap();
    builder.model_mut().class_mut(color).enclosing = Some(outer);
    builder.model_mut().class_mut(outer).inner_classes.push(color);
    builder.enum_constant(color, "RED");
    let model = builder.finish().unwrap();

    let class = lower(&model, color);
    assert!(class.get_field("this$0").is_none());
    assert_eq!(class.methods_named("access$0").count(), 0);
    let ctor = class.constructors().next().unwrap();
    assert_eq!(param_names(ctor), vec!["enum$name", "enum$ordinal"]);

    let stores = static_stores(&class);
    let IrExpr::New { args, .. } = &stores[0].1 else {
        panic!("RED is not constructed");
    };
    assert_eq!(args.len(), 2);

    let outer_class = lower(&model, outer);
    let entry = outer_class
        .inner_classes
        .iter()
        .find(|e| e.simple_name == "Color")
        .unwrap();
    assert!(entry.modifiers & ACC_STATIC != 0);
}

// ============================================================================
// Bridges
// ============================================================================

#[test]
fn test_interface_covariant_bridge() {
    let mut builder = ModelBuilder::new();
    let base = builder.interface("demo.Base").unwrap();
    let sub = builder.interface("demo.Sub").unwrap();
    let imp = builder.class("demo.Impl").unwrap();
    let base_ty = builder.model_mut().class_type(base);
    let sub_ty = builder.model_mut().class_type(sub);
    builder.implements(sub, base_ty);
    builder.implements(imp, sub_ty);
    let seq = builder.model_mut().char_sequence_type();
    let string = builder.model_mut().string_type();
    let abstract_mods = Modifiers::PUBLIC | Modifiers::ABSTRACT;
    let base_text =
        builder.method(MethodDescription::new(base, "text", seq).with_modifiers(abstract_mods));
    let sub_text = builder.method(
        MethodDescription::new(sub, "text", string)
            .with_modifiers(abstract_mods)
            .overriding(base_text),
    );
    builder.method(
        MethodDescription::new(imp, "text", string)
            .overriding(sub_text)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                "hi".to_string(),
            ))))]),
    );
    let model = builder.finish().unwrap();

    let class = lower(&model, imp);
    let bridges: Vec<&IrMethod> = class.bridges().collect();
    assert_eq!(bridges.len(), 1);
    let bridge = bridges[0];
    assert_eq!(bridge.name, "text");
    assert_eq!(bridge.descriptor(), "()Ljava/lang/CharSequence;");
    assert!(bridge.modifiers & (ACC_BRIDGE | ACC_SYNTHETIC) == ACC_BRIDGE | ACC_SYNTHETIC);

    let IrStmt::Return(Some(IrExpr::Call { receiver, method, .. })) = &body(bridge)[0] else {
        panic!("bridge does not forward");
    };
    assert!(matches!(receiver.as_deref(), Some(IrExpr::This(_))));
    assert_eq!(method.descriptor(), "()Ljava/lang/String;");

    // Bridges follow the method they belong to
    let position = |m: &IrMethod| class.methods.iter().position(|x| std::ptr::eq(x, m));
    let text = class.get_method("text", "()Ljava/lang/String;").unwrap();
    assert_eq!(position(bridge), position(text).map(|i| i + 1));

    // The abstract interface method needs none
    assert_eq!(lower(&model, sub).bridges().count(), 0);
}

#[test]
fn test_multi_level_covariant_chain() {
    let mut builder = ModelBuilder::new();
    let shape = builder.class("demo.Shape").unwrap();
    let rect = builder.class("demo.Rect").unwrap();
    let square = builder.class("demo.Square").unwrap();
    let shape_ty = builder.model_mut().class_type(shape);
    let rect_ty = builder.model_mut().class_type(rect);
    let square_ty = builder.model_mut().class_type(square);
    builder.extends(rect, shape_ty);
    builder.extends(square, rect_ty);
    let object = builder.model_mut().object_type();
    let null_body = || vec![Stmt::Return(Some(Expr::Literal(Literal::Null)))];
    let shape_f = builder.method(MethodDescription::new(shape, "f", object).with_body(null_body()));
    let rect_f = builder.method(
        MethodDescription::new(rect, "f", rect_ty)
            .overriding(shape_f)
            .with_body(null_body()),
    );
    builder.method(
        MethodDescription::new(square, "f", square_ty)
            .overriding(rect_f)
            .with_body(null_body()),
    );
    let model = builder.finish().unwrap();

    let class = lower(&model, square);
    let bridges: Vec<&IrMethod> = class.bridges().collect();
    let descriptors: Vec<String> = bridges.iter().map(|b| b.descriptor()).collect();
    assert_eq!(descriptors, vec!["()Ldemo/Rect;", "()Ljava/lang/Object;"]);

    let forwards_to = |bridge: &IrMethod| match &body(bridge)[0] {
        IrStmt::Return(Some(IrExpr::Call { method, .. })) => method.descriptor(),
        other => panic!("bridge does not forward: {:?}", other),
    };
    assert_eq!(forwards_to(bridges[0]), "()Ldemo/Square;");
    assert_eq!(forwards_to(bridges[1]), "()Ldemo/Rect;");
}

#[test]
fn test_generic_method_bridge_keeps_type_handles() {
    let mut builder = ModelBuilder::new();
    let base = builder.class("demo.Base").unwrap();
    let sub = builder.class("demo.Sub").unwrap();
    let base_ty = builder.model_mut().class_type(base);
    builder.extends(sub, base_ty);
    let t = builder.model_mut().type_var(TypeVariable::new("T"));
    let object = builder.model_mut().object_type();
    let string = builder.model_mut().string_type();
    let pick = builder.method(
        MethodDescription::new(base, "pick", object)
            .with_type_var(TypeVariable::new("T"))
            .with_param("value", t)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::Null)))]),
    );
    builder.method(
        MethodDescription::new(sub, "pick", string)
            .with_type_var(TypeVariable::new("T"))
            .with_param("value", t)
            .overriding(pick)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                "picked".to_string(),
            ))))]),
    );
    let model = builder.finish().unwrap();

    let class = lower(&model, sub);
    let bridges: Vec<&IrMethod> = class.bridges().collect();
    assert_eq!(bridges.len(), 1);
    let bridge = bridges[0];
    assert_eq!(
        bridge.descriptor(),
        "(Lkiln/lang/reflect/IType;Ljava/lang/Object;)Ljava/lang/Object;"
    );
    assert_eq!(param_names(bridge), vec!["typeparam$T", "value"]);

    let IrStmt::Return(Some(IrExpr::Call { method, args, .. })) = &body(bridge)[0] else {
        panic!("bridge does not forward");
    };
    assert_eq!(
        method.descriptor(),
        "(Lkiln/lang/reflect/IType;Ljava/lang/Object;)Ljava/lang/String;"
    );
    assert!(matches!(&args[0], IrExpr::Identifier(symbol) if symbol.name == "typeparam$T"));
}

#[test]
fn test_foreign_interface_ancestor_bridge() {
    let mut builder = ModelBuilder::new();
    let seq = builder.model_mut().char_sequence_type();
    let string = builder.model_mut().string_type();
    let java_base = builder
        .foreign_interface(
            "demo.JavaBase",
            Vec::new(),
            vec![ForeignMethod::abstract_method("makeText", Vec::new(), seq)],
        )
        .unwrap();
    let java_sub = builder
        .foreign_interface(
            "demo.JavaSub",
            vec![java_base],
            vec![ForeignMethod::abstract_method("makeText", Vec::new(), string)],
        )
        .unwrap();
    let proxy = builder.proxy(java_sub).unwrap();
    let make_text = builder.find_method(proxy, "makeText").unwrap();
    let class_id = builder.class("demo.TextMaker").unwrap();
    let proxy_ty = builder.model_mut().class_type(proxy);
    builder.implements(class_id, proxy_ty);
    builder.method(
        MethodDescription::new(class_id, "makeText", string)
            .overriding(make_text)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                "text".to_string(),
            ))))]),
    );
    let model = builder.finish().unwrap();

    let lowered = lower_class(&model, class_id, &LowerOptions::default()).unwrap();
    assert!(lowered.diagnostics.is_empty());
    let bridges: Vec<String> = lowered
        .class
        .bridges()
        .map(|b| format!("{}{}", b.name, b.descriptor()))
        .collect();
    assert_eq!(bridges, vec!["makeText()Ljava/lang/CharSequence;"]);
}

#[test]
fn test_proxy_parameter_bridge_wins_over_generic_bridge() {
    let mut builder = ModelBuilder::new();
    let object = builder.model_mut().object_type();
    let string = builder.model_mut().string_type();
    let void = builder.model_mut().void_type();
    let handler = builder
        .foreign_interface(
            "demo.Handler",
            Vec::new(),
            vec![ForeignMethod::abstract_method("handle", vec![object], void)],
        )
        .unwrap();
    let proxy = builder.proxy(handler).unwrap();
    let handle = builder.find_method(proxy, "handle").unwrap();
    let class_id = builder.class("demo.StringHandler").unwrap();
    let proxy_ty = builder.model_mut().class_type(proxy);
    builder.implements(class_id, proxy_ty);
    builder.method(
        MethodDescription::new(class_id, "handle", void)
            .with_param("value", string)
            .overriding(handle)
            .with_body(Vec::new()),
    );
    let model = builder.finish().unwrap();

    let class = lower(&model, class_id);
    let bridges: Vec<&IrMethod> = class.bridges().collect();
    assert_eq!(bridges.len(), 1);
    assert_eq!(bridges[0].descriptor(), "(Ljava/lang/Object;)V");
    assert_eq!(param_names(bridges[0]), vec!["arg0"]);

    let stmts = body(bridges[0]);
    let IrStmt::Eval(IrExpr::Call { args, .. }) = &stmts[0] else {
        panic!("bridge does not forward");
    };
    assert!(matches!(&args[0], IrExpr::Cast { ty, .. } if *ty == IrType::string()));
    assert_eq!(stmts[1], IrStmt::Return(None));
}

#[test]
fn test_unresolved_foreign_method_is_a_soft_skip() {
    init_tracing();
    let mut builder = ModelBuilder::new();
    let object = builder.model_mut().object_type();
    let task = builder
        .foreign_interface(
            "demo.Task",
            Vec::new(),
            vec![ForeignMethod::abstract_method("call", Vec::new(), object)],
        )
        .unwrap();
    let proxy = builder.proxy(task).unwrap();
    let call = builder.find_method(proxy, "call").unwrap();
    let class_id = builder.class("demo.Job").unwrap();
    let proxy_ty = builder.model_mut().class_type(proxy);
    builder.implements(class_id, proxy_ty);
    builder.method(
        MethodDescription::new(class_id, "perform", object)
            .overriding(call)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::Null)))]),
    );
    let model = builder.finish().unwrap();

    let lowered = lower_class(&model, class_id, &LowerOptions::default()).unwrap();
    assert_eq!(lowered.diagnostics.len(), 1);
    assert_eq!(lowered.diagnostics[0].kind, DiagnosticKind::UnresolvedForeignMethod);
    assert_eq!(lowered.diagnostics[0].class, "demo/Job");
    assert!(lowered.class.validate().is_ok());
}

// ============================================================================
// Index access
// ============================================================================

fn auto_insert_model(configure: impl FnOnce(&mut ModelBuilder, ClassId)) -> (ClassModel, ClassId) {
    let mut builder = ModelBuilder::new();
    let widget = builder.class("demo.Widget").unwrap();
    configure(&mut builder, widget);
    let widget_ty = builder.model_mut().class_type(widget);
    let widgets = builder.model_mut().array_of(widget_ty);
    let void = builder.model_mut().void_type();
    let owner = builder.class("demo.Shelf").unwrap();
    builder.method(
        MethodDescription::new(owner, "fill", void)
            .with_param("items", widgets)
            .with_body(vec![Stmt::Expr(Expr::Index {
                root: Box::new(Expr::Local("items".to_string())),
                index: Box::new(Expr::Literal(Literal::Int(0))),
                element_type: widget_ty,
                null_safe: false,
                auto_insert: Some(widget_ty),
            })]),
    );
    (builder.finish().unwrap(), owner)
}

#[test]
fn test_auto_insert_into_array() {
    let (model, shelf) = auto_insert_model(|_, _| {});
    let class = lower(&model, shelf);
    let fill = class.get_method("fill", "([Ldemo/Widget;)V").unwrap();
    let IrStmt::Eval(IrExpr::Composite { stmts, result }) = &body(fill)[0] else {
        panic!("expected a composite access");
    };
    assert_eq!(stmts.len(), 1);
    let IrExpr::Composite { stmts: inner, result: access } = result.as_ref() else {
        panic!("expected the auto-insert step");
    };
    assert!(matches!(&inner[1], IrStmt::Eval(IrExpr::Call { method, .. }) if method.name == "maybeAutoInsert"));
    assert!(matches!(access.as_ref(), IrExpr::ArrayLoad { .. }));
}

#[test]
fn test_auto_insert_rejects_abstract_types() {
    let (model, shelf) = auto_insert_model(|builder, widget| {
        builder.model_mut().class_mut(widget).modifiers = Modifiers::PUBLIC | Modifiers::ABSTRACT;
    });
    let err = lower_class(&model, shelf, &LowerOptions::default()).unwrap_err();
    assert_eq!(
        err,
        LowerError::AbstractAutoInsert {
            type_name: "demo.Widget".to_string()
        }
    );
}

#[test]
fn test_auto_insert_requires_default_constructor() {
    let (model, shelf) = auto_insert_model(|builder, widget| {
        let int = builder.model_mut().int_type();
        builder
            .model_mut()
            .class_mut(widget)
            .constructors
            .push(ConstructorDescription::declared(
                vec![ParamDescription::new("size", int)],
                Vec::new(),
            ));
    });
    let err = lower_class(&model, shelf, &LowerOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "Type demo.Widget has no default constructor");
}

// ============================================================================
// Programs
// ============================================================================

#[test]
fn test_program_main_runs_evaluate() {
    let mut builder = ModelBuilder::new();
    let script = builder.class("demo.Script").unwrap();
    builder.model_mut().class_mut(script).is_program = true;
    let object = builder.model_mut().object_type();
    builder.method(
        MethodDescription::new(script, "evaluate", object)
            .with_kind(MethodKind::ProgramEvaluate)
            .with_body(vec![Stmt::Return(Some(Expr::Literal(Literal::Null)))]),
    );
    let model = builder.finish().unwrap();

    let class = lower(&model, script);
    let main = class.get_method("main", "([Ljava/lang/String;)V").unwrap();
    assert_eq!(main.modifiers, ACC_PUBLIC | ACC_STATIC);
    assert_eq!(param_names(main), vec!["args"]);

    let stmts = body(main);
    let IrStmt::Eval(IrExpr::Call { receiver, method, args }) = &stmts[0] else {
        panic!("main does not call evaluate");
    };
    assert_eq!(method.name, "evaluate");
    assert!(args.is_empty());
    assert!(matches!(
        receiver.as_deref(),
        Some(IrExpr::New { constructor, .. }) if constructor.owner == IrType::class("demo/Script")
    ));
    assert_eq!(stmts[1], IrStmt::Return(None));
}

// ============================================================================
// Interface holder, errors, determinism
// ============================================================================

#[test]
fn test_interface_methods_holder() {
    let mut builder = ModelBuilder::new();
    let greeter = builder.interface("demo.Greeter").unwrap();
    let string = builder.model_mut().string_type();
    builder.method(
        MethodDescription::new(greeter, "greet", string).with_body(vec![Stmt::Return(Some(
            Expr::Literal(Literal::String("hello".to_string())),
        ))]),
    );
    builder.method(
        MethodDescription::new(greeter, "name", string)
            .with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT),
    );
    builder.model_mut().class_mut(greeter).annotation_initializers.push(Vec::new());
    let model = builder.finish().unwrap();

    let holder = lower_interface_methods_class(&model, greeter, &LowerOptions::default()).unwrap();
    assert_eq!(holder.name, "demo/Greeter$InterfaceMethods");
    assert!(holder.modifiers & ACC_SYNTHETIC != 0);

    let greet = holder
        .get_method("greet", "(Ldemo/Greeter;)Ljava/lang/String;")
        .unwrap();
    assert!(greet.modifiers & ACC_STATIC != 0);
    assert_eq!(param_names(greet), vec!["$that$"]);
    assert_eq!(holder.methods_named("name").count(), 0);
    assert!(holder.has_method(
        "$evalAnnotations",
        "()Lkiln/lang/annotation/AnnotationMap;"
    ));
    assert!(holder.validate().is_ok());
}

#[test]
fn test_recorded_error_aborts_lowering() {
    let mut builder = ModelBuilder::new();
    let broken = builder.class("demo.Broken").unwrap();
    builder.model_mut().class_mut(broken).recorded_error = Some("Expected ')'".to_string());
    let model = builder.finish().unwrap();

    let err = lower_class(&model, broken, &LowerOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "demo.Broken: Expected ')'");
}

#[test]
fn test_dangling_model_ids_are_rejected() {
    let mut builder = ModelBuilder::new();
    let outer = builder.class("demo.Outer").unwrap();
    let inner = builder.inner_class(outer, "Local").unwrap();
    let model = builder.finish().unwrap();

    let mut broken = model.clone();
    broken.class_mut(inner).enclosing_method = Some(MethodId::new(42));
    let err = lower_class(&broken, inner, &LowerOptions::default()).unwrap_err();
    assert_eq!(err, LowerError::Model(ModelError::UnknownMethod { id: 42 }));

    let mut broken = model;
    broken.class_mut(outer).inner_classes.push(ClassId::new(42));
    let results = lower_classes(&broken, &[outer, inner], &LowerOptions::default());
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(
            result.unwrap_err(),
            LowerError::Model(ModelError::UnknownClass { id: 42 })
        );
    }
}

#[test]
fn test_lowering_is_idempotent() {
    let (model, color) = color_model(&["RED", "GREEN", "BLUE"]);
    let first = lower(&model, color);
    let second = lower(&model, color);
    assert_eq!(first, second);
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[test]
fn test_batch_matches_single_lowering() {
    let mut builder = ModelBuilder::new();
    let mut ids = Vec::new();
    for i in 0..12 {
        let id = builder.class(&format!("demo.Node{}", i)).unwrap();
        let int = builder.model_mut().int_type();
        builder.field(id, FieldDescription::new("value", int, 0));
        ids.push(id);
    }
    let broken = builder.class("demo.Broken").unwrap();
    builder.model_mut().class_mut(broken).recorded_error = Some("bad".to_string());
    ids.insert(5, broken);
    let model = builder.finish().unwrap();

    let options = LowerOptions::default();
    let results = lower_classes(&model, &ids, &options);
    assert_eq!(results.len(), ids.len());
    for (result, &id) in results.iter().zip(&ids) {
        match result {
            Ok(lowered) => {
                let single = lower_class(&model, id, &options).unwrap();
                assert_eq!(
                    lowered.class.fingerprint().unwrap(),
                    single.class.fingerprint().unwrap()
                );
            }
            Err(err) => {
                assert_eq!(id, broken);
                assert!(matches!(err, LowerError::InvalidClass { .. }));
            }
        }
    }
}

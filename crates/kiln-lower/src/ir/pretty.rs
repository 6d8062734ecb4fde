//! Pretty-printing for IR
//!
//! Provides human-readable output for debugging IR structures.

use super::class::{IrClass, IrMethod};
use super::flags;
use super::node::{CallKind, IrConstant, IrExpr, IrStmt};

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for IrClass {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let mods = flags::describe(self.modifiers);
        output.push_str(&format!("{} class {} extends {}", mods, self.name, self.supertype.internal_name()));
        if !self.interfaces.is_empty() {
            let ifaces: Vec<String> = self.interfaces.iter().map(|i| i.internal_name()).collect();
            output.push_str(&format!(" implements {}", ifaces.join(", ")));
        }
        output.push_str(" {\n");

        if let Some(source) = &self.source_file {
            output.push_str(&format!("  ; source {}\n", source));
        }
        for inner in &self.inner_classes {
            output.push_str(&format!(
                "  ; inner {} in {} [{}]\n",
                inner.inner.internal_name(),
                inner.outer.internal_name(),
                flags::describe(inner.modifiers)
            ));
        }
        for annotation in &self.annotations {
            output.push_str(&format!("  @{}\n", annotation.ty.internal_name()));
        }

        for field in &self.fields {
            output.push_str(&format!(
                "  field {} {}: {}\n",
                flags::describe(field.modifiers),
                field.name,
                field.ty
            ));
        }

        for method in &self.methods {
            output.push('\n');
            output.push_str(&method.pretty_print());
        }

        output.push_str("}\n");
        output
    }
}

impl PrettyPrint for IrMethod {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        output.push_str(&format!(
            "  {} {}({}) -> {} ; {}",
            flags::describe(self.modifiers),
            self.name,
            params.join(", "),
            self.return_ty,
            self.descriptor()
        ));
        match &self.body {
            None => output.push('\n'),
            Some(body) => {
                output.push_str(" {\n");
                format_stmt(body, 4, &mut output);
                output.push_str("  }\n");
            }
        }
        output
    }
}

impl PrettyPrint for IrStmt {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        format_stmt(self, 0, &mut output);
        output
    }
}

impl PrettyPrint for IrExpr {
    fn pretty_print(&self) -> String {
        format_expr(self)
    }
}

fn format_stmt(stmt: &IrStmt, indent: usize, out: &mut String) {
    let prefix = " ".repeat(indent);
    match stmt {
        IrStmt::Block(stmts) => {
            for s in stmts {
                format_stmt(s, indent, out);
            }
        }
        IrStmt::Assign { symbol, value } => {
            out.push_str(&format!("{}{} = {}\n", prefix, symbol.name, format_expr(value)));
        }
        IrStmt::SetField {
            receiver,
            field,
            value,
        } => {
            let target = match receiver {
                Some(r) => format!("{}.{}", format_expr(r), field.name),
                None => format!("{}.{}", field.owner.internal_name(), field.name),
            };
            out.push_str(&format!("{}{} = {}\n", prefix, target, format_expr(value)));
        }
        IrStmt::ArrayStore {
            array,
            index,
            value,
        } => {
            out.push_str(&format!(
                "{}{}[{}] = {}\n",
                prefix,
                format_expr(array),
                format_expr(index),
                format_expr(value)
            ));
        }
        IrStmt::Eval(expr) => {
            out.push_str(&format!("{}{}\n", prefix, format_expr(expr)));
        }
        IrStmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str(&format!("{}if {} {{\n", prefix, format_expr(cond)));
            format_stmt(then_branch, indent + 2, out);
            if let Some(else_branch) = else_branch {
                out.push_str(&format!("{}}} else {{\n", prefix));
                format_stmt(else_branch, indent + 2, out);
            }
            out.push_str(&format!("{}}}\n", prefix));
        }
        IrStmt::Return(None) => out.push_str(&format!("{}return\n", prefix)),
        IrStmt::Return(Some(expr)) => {
            out.push_str(&format!("{}return {}\n", prefix, format_expr(expr)));
        }
        IrStmt::NoOp => out.push_str(&format!("{}nop\n", prefix)),
    }
}

fn format_args(args: &[IrExpr]) -> String {
    args.iter().map(format_expr).collect::<Vec<_>>().join(", ")
}

fn format_expr(expr: &IrExpr) -> String {
    match expr {
        IrExpr::Null(_) => "null".to_string(),
        IrExpr::Constant(c) => match c {
            IrConstant::Bool(b) => b.to_string(),
            IrConstant::Int(i) => i.to_string(),
            IrConstant::Long(l) => format!("{}L", l),
            IrConstant::Float(f) => format!("{}F", f),
            IrConstant::Double(d) => format!("{}D", d),
            IrConstant::String(s) => format!("{:?}", s),
        },
        IrExpr::Identifier(sym) => sym.name.clone(),
        IrExpr::This(_) => "this".to_string(),
        IrExpr::GetField { receiver, field } => match receiver {
            Some(r) => format!("{}.{}", format_expr(r), field.name),
            None => format!("{}.{}", field.owner.internal_name(), field.name),
        },
        IrExpr::Call {
            receiver,
            method,
            args,
        } => {
            let target = match (receiver, method.kind) {
                (Some(r), CallKind::Special) => format!("special {}", format_expr(r)),
                (Some(r), _) => format_expr(r),
                (None, _) => method.owner.internal_name(),
            };
            format!(
                "{}.{}{}({})",
                target,
                method.name,
                method.descriptor(),
                format_args(args)
            )
        }
        IrExpr::New { constructor, args } => format!(
            "new {}{}({})",
            constructor.owner.internal_name(),
            constructor.descriptor(),
            format_args(args)
        ),
        IrExpr::NewArray { component, size } => {
            format!("new {}[{}]", component, format_expr(size))
        }
        IrExpr::ArrayInit { component, values } => {
            format!("new {}[] {{{}}}", component, format_args(values))
        }
        IrExpr::ArrayLoad { array, index, .. } => {
            format!("{}[{}]", format_expr(array), format_expr(index))
        }
        IrExpr::Cast { expr, ty } => format!("({}) {}", ty, format_expr(expr)),
        IrExpr::ClassLiteral(ty) => format!("{}.class", ty.internal_name()),
        IrExpr::TypeHandle { of, .. } => format!("typeof {}", of),
        IrExpr::IsNull(inner) => format!("{} == null", format_expr(inner)),
        IrExpr::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => format!(
            "({} ? {} : {})",
            format_expr(cond),
            format_expr(then_expr),
            format_expr(else_expr)
        ),
        IrExpr::Composite { stmts, result } => {
            let mut parts: Vec<String> = stmts
                .iter()
                .map(|s| s.pretty_print().trim().to_string())
                .collect();
            parts.push(format_expr(result));
            format!("{{ {} }}", parts.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::class::IrField;
    use crate::ir::flags::{ACC_PUBLIC, ACC_SUPER};
    use crate::ir::node::IrMethodRef;
    use crate::ir::types::IrType;

    #[test]
    fn test_pretty_print_class() {
        let mut class = IrClass::new("demo/A");
        class.modifiers = ACC_PUBLIC | ACC_SUPER;
        class.add_field(IrField::new("x", IrType::int(), ACC_PUBLIC));
        let call = IrExpr::call(
            Some(IrExpr::This(IrType::class("demo/A"))),
            IrMethodRef::new(IrType::class("demo/A"), "go", vec![], IrType::void(), CallKind::Virtual),
            vec![],
        );
        class.add_method(IrMethod::new(
            "run",
            vec![],
            IrType::void(),
            ACC_PUBLIC,
            Some(IrStmt::Block(vec![IrStmt::Eval(call), IrStmt::Return(None)])),
        ));

        let text = class.pretty_print();
        assert!(text.starts_with("public class demo/A extends java/lang/Object {"));
        assert!(text.contains("field public x: I"));
        assert!(text.contains("public run() -> V ; ()V {"));
        assert!(text.contains("    this.go()V()"));
        assert!(text.contains("    return"));
    }

    #[test]
    fn test_pretty_print_conditional() {
        let expr = IrExpr::Conditional {
            cond: Box::new(IrExpr::IsNull(Box::new(IrExpr::Null(IrType::object())))),
            then_expr: Box::new(IrExpr::int(0)),
            else_expr: Box::new(IrExpr::int(1)),
            ty: IrType::int(),
        };
        assert_eq!(expr.pretty_print(), "(null == null ? 0 : 1)");
    }
}

//! IR statements and expressions
//!
//! A small tree language that maps almost one-to-one onto class-file
//! instructions. Symbols are shared by reference (`Arc`) between the scope
//! that created them and every node that reads or writes them.

use super::types::{method_descriptor, IrPrimitive, IrType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a symbol within one lowering run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A storage location: parameter, local or temporary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrSymbol {
    /// Unique within the lowering run
    pub id: SymbolId,
    /// Name as emitted (parameter names include synthetic suffixes)
    pub name: String,
    /// Storage type; a boxed symbol holds a single-element array cell
    pub ty: IrType,
    /// Holds a shared cell rather than the value itself
    pub boxed: bool,
}

/// Shared handle to a symbol
pub type SymbolRef = Arc<IrSymbol>;

/// Constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrConstant {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl IrConstant {
    /// Static type of the constant
    pub fn ty(&self) -> IrType {
        match self {
            IrConstant::Bool(_) => IrType::boolean(),
            IrConstant::Int(_) => IrType::int(),
            IrConstant::Long(_) => IrType::Primitive(IrPrimitive::Long),
            IrConstant::Float(_) => IrType::Primitive(IrPrimitive::Float),
            IrConstant::Double(_) => IrType::Primitive(IrPrimitive::Double),
            IrConstant::String(_) => IrType::string(),
        }
    }

    /// Zero value of a primitive type, used when a null-safe access short-circuits
    pub fn zero(prim: IrPrimitive) -> Option<Self> {
        match prim {
            IrPrimitive::Void => None,
            IrPrimitive::Boolean => Some(IrConstant::Bool(false)),
            IrPrimitive::Byte | IrPrimitive::Char | IrPrimitive::Short | IrPrimitive::Int => {
                Some(IrConstant::Int(0))
            }
            IrPrimitive::Long => Some(IrConstant::Long(0)),
            IrPrimitive::Float => Some(IrConstant::Float(0.0)),
            IrPrimitive::Double => Some(IrConstant::Double(0.0)),
        }
    }
}

/// How a call is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// `invokestatic`
    Static,
    /// `invokevirtual`
    Virtual,
    /// `invokeinterface`
    Interface,
    /// `invokespecial` (constructors, super calls)
    Special,
}

/// A resolved method reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrMethodRef {
    pub owner: IrType,
    pub name: String,
    pub params: Vec<IrType>,
    pub return_ty: IrType,
    pub kind: CallKind,
}

impl IrMethodRef {
    pub fn new(
        owner: IrType,
        name: impl Into<String>,
        params: Vec<IrType>,
        return_ty: IrType,
        kind: CallKind,
    ) -> Self {
        Self {
            owner,
            name: name.into(),
            params,
            return_ty,
            kind,
        }
    }

    /// Constructor of `owner` with the given parameter types
    pub fn constructor(owner: IrType, params: Vec<IrType>) -> Self {
        Self::new(owner, "<init>", params, IrType::void(), CallKind::Special)
    }

    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.return_ty)
    }
}

/// A resolved field reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrFieldRef {
    pub owner: IrType,
    pub name: String,
    pub ty: IrType,
    pub is_static: bool,
}

impl IrFieldRef {
    pub fn instance(owner: IrType, name: impl Into<String>, ty: IrType) -> Self {
        Self {
            owner,
            name: name.into(),
            ty,
            is_static: false,
        }
    }

    pub fn of_static(owner: IrType, name: impl Into<String>, ty: IrType) -> Self {
        Self {
            owner,
            name: name.into(),
            ty,
            is_static: true,
        }
    }
}

/// IR expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrExpr {
    /// `null` of the given static type
    Null(IrType),
    Constant(IrConstant),
    /// Read of a symbol (for boxed symbols: the cell itself)
    Identifier(SymbolRef),
    /// The receiver of an instance method, typed as the enclosing class
    This(IrType),
    GetField {
        receiver: Option<Box<IrExpr>>,
        field: IrFieldRef,
    },
    Call {
        receiver: Option<Box<IrExpr>>,
        method: IrMethodRef,
        args: Vec<IrExpr>,
    },
    /// Allocate and construct
    New {
        constructor: IrMethodRef,
        args: Vec<IrExpr>,
    },
    NewArray {
        component: IrType,
        size: Box<IrExpr>,
    },
    /// Array with the given elements
    ArrayInit {
        component: IrType,
        values: Vec<IrExpr>,
    },
    ArrayLoad {
        array: Box<IrExpr>,
        index: Box<IrExpr>,
        ty: IrType,
    },
    /// Checked cast
    Cast {
        expr: Box<IrExpr>,
        ty: IrType,
    },
    /// Class literal (`X.class`)
    ClassLiteral(IrType),
    /// Runtime type handle for a type, as passed to type-parameter carriers
    TypeHandle {
        of: IrType,
        handle: IrType,
    },
    IsNull(Box<IrExpr>),
    /// `cond ? then_expr : else_expr`
    Conditional {
        cond: Box<IrExpr>,
        then_expr: Box<IrExpr>,
        else_expr: Box<IrExpr>,
        ty: IrType,
    },
    /// Statements evaluated for effect, then a result expression
    Composite {
        stmts: Vec<IrStmt>,
        result: Box<IrExpr>,
    },
}

impl IrExpr {
    /// Static type of the expression
    pub fn ty(&self) -> IrType {
        match self {
            IrExpr::Null(ty) => ty.clone(),
            IrExpr::Constant(c) => c.ty(),
            IrExpr::Identifier(sym) => sym.ty.clone(),
            IrExpr::This(ty) => ty.clone(),
            IrExpr::GetField { field, .. } => field.ty.clone(),
            IrExpr::Call { method, .. } => method.return_ty.clone(),
            IrExpr::New { constructor, .. } => constructor.owner.clone(),
            IrExpr::NewArray { component, .. } | IrExpr::ArrayInit { component, .. } => {
                IrType::array(component.clone())
            }
            IrExpr::ArrayLoad { ty, .. } => ty.clone(),
            IrExpr::Cast { ty, .. } => ty.clone(),
            IrExpr::ClassLiteral(_) => IrType::class_object(),
            IrExpr::TypeHandle { handle, .. } => handle.clone(),
            IrExpr::IsNull(_) => IrType::boolean(),
            IrExpr::Conditional { ty, .. } => ty.clone(),
            IrExpr::Composite { result, .. } => result.ty(),
        }
    }

    pub fn identifier(symbol: &SymbolRef) -> Self {
        IrExpr::Identifier(Arc::clone(symbol))
    }

    pub fn int(value: i32) -> Self {
        IrExpr::Constant(IrConstant::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        IrExpr::Constant(IrConstant::String(value.into()))
    }

    pub fn cast(expr: IrExpr, ty: IrType) -> Self {
        IrExpr::Cast {
            expr: Box::new(expr),
            ty,
        }
    }

    pub fn get_field(receiver: Option<IrExpr>, field: IrFieldRef) -> Self {
        IrExpr::GetField {
            receiver: receiver.map(Box::new),
            field,
        }
    }

    pub fn call(receiver: Option<IrExpr>, method: IrMethodRef, args: Vec<IrExpr>) -> Self {
        IrExpr::Call {
            receiver: receiver.map(Box::new),
            method,
            args,
        }
    }
}

/// IR statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrStmt {
    Block(Vec<IrStmt>),
    /// Store into a symbol (declares it on first store)
    Assign {
        symbol: SymbolRef,
        value: IrExpr,
    },
    SetField {
        receiver: Option<IrExpr>,
        field: IrFieldRef,
        value: IrExpr,
    },
    ArrayStore {
        array: IrExpr,
        index: IrExpr,
        value: IrExpr,
    },
    /// Expression evaluated for its effect; any result is discarded
    Eval(IrExpr),
    If {
        cond: IrExpr,
        then_branch: Box<IrStmt>,
        else_branch: Option<Box<IrStmt>>,
    },
    Return(Option<IrExpr>),
    /// Empty body of a non-abstract method with no statements
    NoOp,
}

impl IrStmt {
    /// Whether control never falls through this statement
    pub fn is_terminal(&self) -> bool {
        match self {
            IrStmt::Return(_) => true,
            IrStmt::Block(stmts) => stmts.last().is_some_and(IrStmt::is_terminal),
            IrStmt::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => then_branch.is_terminal() && else_branch.is_terminal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_types() {
        let sym = Arc::new(IrSymbol {
            id: SymbolId(0),
            name: "x".to_string(),
            ty: IrType::array(IrType::int()),
            boxed: true,
        });
        let load = IrExpr::ArrayLoad {
            array: Box::new(IrExpr::identifier(&sym)),
            index: Box::new(IrExpr::int(0)),
            ty: IrType::int(),
        };
        assert_eq!(load.ty(), IrType::int());
        assert_eq!(IrExpr::identifier(&sym).ty().descriptor(), "[I");
        assert_eq!(IrExpr::string("a").ty(), IrType::string());
        assert_eq!(
            IrExpr::ClassLiteral(IrType::string()).ty(),
            IrType::class_object()
        );
    }

    #[test]
    fn test_method_ref_descriptor() {
        let ctor = IrMethodRef::constructor(IrType::class("demo/A"), vec![IrType::int()]);
        assert_eq!(ctor.descriptor(), "(I)V");
        assert_eq!(ctor.kind, CallKind::Special);
    }

    #[test]
    fn test_terminal_statements() {
        assert!(IrStmt::Return(None).is_terminal());
        assert!(IrStmt::Block(vec![IrStmt::NoOp, IrStmt::Return(None)]).is_terminal());
        assert!(!IrStmt::Block(vec![]).is_terminal());
        let half = IrStmt::If {
            cond: IrExpr::Constant(IrConstant::Bool(true)),
            then_branch: Box::new(IrStmt::Return(None)),
            else_branch: None,
        };
        assert!(!half.is_terminal());
    }

    #[test]
    fn test_zero_constants() {
        assert_eq!(IrConstant::zero(IrPrimitive::Boolean), Some(IrConstant::Bool(false)));
        assert_eq!(IrConstant::zero(IrPrimitive::Char), Some(IrConstant::Int(0)));
        assert_eq!(IrConstant::zero(IrPrimitive::Void), None);
    }
}

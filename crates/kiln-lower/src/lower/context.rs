//! Symbol and scope context
//!
//! Maps source names to IR symbols while one class is being lowered. Scopes
//! are pushed per method body and per block; names compare case-insensitively.

use crate::error::{LowerError, LowerResult};
use crate::ir::{IrSymbol, IrType, SymbolId, SymbolRef};
use rustc_hash::FxHashMap;
use std::sync::Arc;

struct Scope {
    symbols: FxHashMap<String, SymbolRef>,
    is_instance: bool,
}

/// Scoped symbol table owned by one lowering run
pub struct Context {
    scopes: Vec<Scope>,
    next_symbol: u32,
    next_temp: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            next_symbol: 0,
            next_temp: 0,
        }
    }

    /// Open a scope; `is_instance` says whether the code has an implicit receiver
    pub fn push_scope(&mut self, is_instance: bool) {
        self.scopes.push(Scope {
            symbols: FxHashMap::default(),
            is_instance,
        });
    }

    /// Open a nested block scope inheriting the receiver flag
    pub fn push_block(&mut self) {
        let is_instance = self.is_instance();
        self.push_scope(is_instance);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the innermost scope has an implicit receiver
    pub fn is_instance(&self) -> bool {
        self.scopes.last().is_some_and(|s| s.is_instance)
    }

    /// Create a new symbol without binding it
    pub fn make_symbol(&mut self, name: impl Into<String>, ty: IrType, boxed: bool) -> SymbolRef {
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        Arc::new(IrSymbol {
            id,
            name: name.into(),
            ty,
            boxed,
        })
    }

    /// Bind method parameters in declaration order into the innermost scope
    pub fn bind_parameters(&mut self, params: &[SymbolRef]) -> LowerResult<()> {
        for param in params {
            self.declare(param)?;
        }
        Ok(())
    }

    /// Bind a symbol in the innermost scope
    pub fn declare(&mut self, symbol: &SymbolRef) -> LowerResult<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| LowerError::internal(format!("no open scope for '{}'", symbol.name)))?;
        let key = normalize(&symbol.name);
        if scope.symbols.contains_key(&key) {
            return Err(LowerError::DuplicateSymbol {
                name: symbol.name.clone(),
            });
        }
        scope.symbols.insert(key, Arc::clone(symbol));
        Ok(())
    }

    /// Fresh, uniquely named local; each call yields a new identity
    pub fn make_temporary(&mut self, ty: IrType) -> SymbolRef {
        let name = format!("$temp{}", self.next_temp);
        self.next_temp += 1;
        self.make_symbol(name, ty, false)
    }

    /// Look a name up through the enclosing scopes, innermost first
    pub fn lookup(&self, name: &str) -> Option<SymbolRef> {
        let key = normalize(name);
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(&key))
            .map(Arc::clone)
    }

    /// Resolve a name that the type checker guaranteed to be bound
    pub fn resolve(&self, name: &str) -> LowerResult<SymbolRef> {
        self.lookup(name).ok_or_else(|| LowerError::UnboundSymbol {
            name: name.to_string(),
        })
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_resolve() {
        let mut ctx = Context::new();
        ctx.push_scope(true);
        let x = ctx.make_symbol("x", IrType::int(), false);
        let y = ctx.make_symbol("Y", IrType::string(), false);
        ctx.bind_parameters(&[x.clone(), y.clone()]).unwrap();

        assert!(ctx.is_instance());
        assert_eq!(ctx.resolve("x").unwrap().id, x.id);
        assert_eq!(ctx.resolve("y").unwrap().id, y.id);
    }

    #[test]
    fn test_duplicate_parameters() {
        let mut ctx = Context::new();
        ctx.push_scope(false);
        let a = ctx.make_symbol("value", IrType::int(), false);
        let b = ctx.make_symbol("VALUE", IrType::int(), false);
        let err = ctx.bind_parameters(&[a, b]).unwrap_err();
        assert_eq!(
            err,
            LowerError::DuplicateSymbol {
                name: "VALUE".to_string()
            }
        );
    }

    #[test]
    fn test_unbound_after_pop() {
        let mut ctx = Context::new();
        ctx.push_scope(false);
        ctx.push_block();
        let local = ctx.make_symbol("tmp", IrType::int(), false);
        ctx.declare(&local).unwrap();
        assert!(ctx.lookup("tmp").is_some());
        ctx.pop_scope();

        let err = ctx.resolve("tmp").unwrap_err();
        assert!(matches!(err, LowerError::UnboundSymbol { .. }));
    }

    #[test]
    fn test_shadowing_in_nested_scope() {
        let mut ctx = Context::new();
        ctx.push_scope(false);
        let outer = ctx.make_symbol("x", IrType::int(), false);
        ctx.declare(&outer).unwrap();
        ctx.push_block();
        let inner = ctx.make_symbol("x", IrType::string(), false);
        ctx.declare(&inner).unwrap();
        assert_eq!(ctx.resolve("x").unwrap().id, inner.id);
        ctx.pop_scope();
        assert_eq!(ctx.resolve("x").unwrap().id, outer.id);
    }

    #[test]
    fn test_temporaries_are_unique() {
        let mut ctx = Context::new();
        let a = ctx.make_temporary(IrType::object());
        let b = ctx.make_temporary(IrType::object());
        assert_ne!(a.id, b.id);
        assert_ne!(a.name, b.name);
    }
}

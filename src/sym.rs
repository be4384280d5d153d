//! Symbol tables and the scope stack shared by both executors.
//!
//! A scope is an ordered list of entries with linear lookup; scopes are
//! stacked and searched innermost-first. Lookup is dynamic over the live
//! activation chain — there is no static link — which is what lets a
//! procedure reach its caller's variables (and recursion work at all).

use crate::error::RuntimeError;

/// What a name is bound to inside one scope.
///
/// `P` is the payload of a procedure binding: an instruction index for
/// the VM, a borrowed AST node for the tree-walking interpreter.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding<P> {
    Const(i64),
    /// `None` until the first store.
    Var(Option<i64>),
    Proc(P),
}

impl<P> Binding<P> {
    fn kind_name(&self) -> &'static str {
        match self {
            Binding::Const(_) => "constant",
            Binding::Var(_) => "variable",
            Binding::Proc(_) => "procedure",
        }
    }
}

/// One lexical scope.
#[derive(Clone, Debug)]
pub struct SymbolTable<P> {
    entries: Vec<(String, Binding<P>)>,
}

impl<P> SymbolTable<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a name. Re-declaration within the same scope is an error.
    pub fn insert(&mut self, ident: &str, binding: Binding<P>) -> Result<(), RuntimeError> {
        if self.entries.iter().any(|(name, _)| name == ident) {
            return Err(RuntimeError::DuplicateIdentifier(ident.to_string()));
        }
        self.entries.push((ident.to_string(), binding));
        Ok(())
    }

    pub fn get(&self, ident: &str) -> Option<&Binding<P>> {
        self.entries
            .iter()
            .find(|(name, _)| name == ident)
            .map(|(_, binding)| binding)
    }

    pub fn get_mut(&mut self, ident: &str) -> Option<&mut Binding<P>> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == ident)
            .map(|(_, binding)| binding)
    }
}

impl<P> Default for SymbolTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// The live stack of scopes.
#[derive(Clone, Debug)]
pub struct Scopes<P> {
    stack: Vec<SymbolTable<P>>,
}

impl<P> Scopes<P> {
    /// A fresh stack holding only the global scope.
    pub fn new() -> Self {
        Self {
            stack: vec![SymbolTable::new()],
        }
    }

    pub fn push(&mut self) {
        self.stack.push(SymbolTable::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "popping the global scope");
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost scope, where declarations land.
    pub fn current_mut(&mut self) -> &mut SymbolTable<P> {
        self.stack.last_mut().expect("scope stack is never empty")
    }

    /// Innermost-first search across all live scopes.
    pub fn resolve(&self, ident: &str) -> Option<&Binding<P>> {
        self.stack.iter().rev().find_map(|table| table.get(ident))
    }

    fn resolve_mut(&mut self, ident: &str) -> Option<&mut Binding<P>> {
        self.stack
            .iter_mut()
            .rev()
            .find_map(|table| table.get_mut(ident))
    }

    /// The value of `ident` for an expression read.
    pub fn load(&self, ident: &str) -> Result<i64, RuntimeError> {
        match self.resolve(ident) {
            None => Err(RuntimeError::UndefinedIdentifier(ident.to_string())),
            Some(Binding::Const(value)) => Ok(*value),
            Some(Binding::Var(Some(value))) => Ok(*value),
            Some(Binding::Var(None)) => Err(RuntimeError::UninitializedRead(ident.to_string())),
            Some(binding @ Binding::Proc(_)) => Err(RuntimeError::KindMismatch {
                ident: ident.to_string(),
                expected: "constant or variable",
                found: binding.kind_name(),
            }),
        }
    }

    /// Assign to `ident`. Only variables can be stored to.
    pub fn store(&mut self, ident: &str, value: i64) -> Result<(), RuntimeError> {
        match self.resolve_mut(ident) {
            None => Err(RuntimeError::UndefinedIdentifier(ident.to_string())),
            Some(Binding::Var(slot)) => {
                *slot = Some(value);
                Ok(())
            }
            Some(binding) => Err(RuntimeError::KindMismatch {
                ident: ident.to_string(),
                expected: "variable",
                found: binding.kind_name(),
            }),
        }
    }

    /// The payload of a procedure binding, for a call.
    pub fn call_target(&self, ident: &str) -> Result<&P, RuntimeError> {
        match self.resolve(ident) {
            None => Err(RuntimeError::UndefinedIdentifier(ident.to_string())),
            Some(Binding::Proc(payload)) => Ok(payload),
            Some(binding) => Err(RuntimeError::KindMismatch {
                ident: ident.to_string(),
                expected: "procedure",
                found: binding.kind_name(),
            }),
        }
    }
}

impl<P> Default for Scopes<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut table: SymbolTable<usize> = SymbolTable::new();
        table.insert("a", Binding::Var(None)).unwrap();
        let err = table.insert("a", Binding::Const(1)).unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateIdentifier(name) if name == "a"));
    }

    #[test]
    fn test_nested_scope_shadows_until_exit() {
        let mut scopes: Scopes<usize> = Scopes::new();
        scopes.current_mut().insert("x", Binding::Const(1)).unwrap();
        scopes.push();
        scopes
            .current_mut()
            .insert("x", Binding::Var(Some(2)))
            .unwrap();
        assert_eq!(scopes.load("x").unwrap(), 2);
        scopes.pop();
        assert_eq!(scopes.load("x").unwrap(), 1);
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut scopes: Scopes<usize> = Scopes::new();
        scopes
            .current_mut()
            .insert("n", Binding::Var(Some(5)))
            .unwrap();
        scopes.push();
        scopes.push();
        assert_eq!(scopes.load("n").unwrap(), 5);
        scopes.store("n", 4).unwrap();
        scopes.pop();
        scopes.pop();
        assert_eq!(scopes.load("n").unwrap(), 4);
    }

    #[test]
    fn test_load_errors() {
        let mut scopes: Scopes<usize> = Scopes::new();
        assert!(matches!(
            scopes.load("ghost"),
            Err(RuntimeError::UndefinedIdentifier(_))
        ));
        scopes.current_mut().insert("v", Binding::Var(None)).unwrap();
        assert!(matches!(
            scopes.load("v"),
            Err(RuntimeError::UninitializedRead(_))
        ));
        scopes.current_mut().insert("p", Binding::Proc(0)).unwrap();
        assert!(matches!(
            scopes.load("p"),
            Err(RuntimeError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_store_requires_variable() {
        let mut scopes: Scopes<usize> = Scopes::new();
        scopes.current_mut().insert("k", Binding::Const(3)).unwrap();
        let err = scopes.store("k", 4).unwrap_err();
        assert!(
            matches!(err, RuntimeError::KindMismatch { ref found, .. } if *found == "constant")
        );
    }

    #[test]
    fn test_call_requires_procedure() {
        let mut scopes: Scopes<usize> = Scopes::new();
        scopes
            .current_mut()
            .insert("v", Binding::Var(Some(1)))
            .unwrap();
        assert!(matches!(
            scopes.call_target("v"),
            Err(RuntimeError::KindMismatch { .. })
        ));
        scopes.current_mut().insert("p", Binding::Proc(7)).unwrap();
        assert_eq!(*scopes.call_target("p").unwrap(), 7);
    }
}

//! Lexical scope stack and function registry.
//!
//! Every binding, parameter and scratch temporary lowers to one WASM
//! local of type `i32` holding a boxed-value pointer; this module only
//! ever hands out local indices, never bytes.

use std::collections::HashMap;

use crate::error::{CompileError, Pos};

/// Lexical scope stack for one function body (or the implicit top-level
/// function). `next_local` is shared across every nested scope and
/// scratch allocation so every slot handed out, however it was requested,
/// gets a distinct WASM local index.
#[derive(Debug)]
pub struct Scope {
    scopes: Vec<HashMap<String, u32>>,
    next_local: u32,
    param_count: u32,
}

impl Scope {
    /// `param_count` locals (indices `0..param_count`) are already taken
    /// by the function's parameters; the first declared/scratch slot is
    /// `param_count`.
    #[must_use]
    pub fn new(param_count: u32) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            next_local: param_count,
            param_count,
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the outermost scope");
    }

    fn alloc(&mut self) -> u32 {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    /// `name := value`: always creates a fresh slot in the innermost
    /// scope, shadowing any existing binding of the same name there or in
    /// an enclosing scope. Re-declaring the same name twice in the same
    /// scope just moves the map entry to the newer slot; the older slot
    /// is harmlessly orphaned. Re-declaration is an overwrite: last wins.
    pub fn declare_local(&mut self, name: &str) -> u32 {
        let slot = self.alloc();
        self.scopes
            .last_mut()
            .expect("at least one scope")
            .insert(name.to_string(), slot);
        slot
    }

    /// `name = value`: updates the nearest existing binding. If `name`
    /// isn't bound anywhere on the stack, creates it in the innermost
    /// scope.
    pub fn assign(&mut self, name: &str) -> u32 {
        if let Some(slot) = self.lookup(name) {
            return slot;
        }
        self.declare_local(name)
    }

    /// A new, unnamed local used only as a lowering scratch register (for
    /// example, short-circuit `and`/`or` evaluation).
    pub fn alloc_scratch(&mut self) -> u32 {
        self.alloc()
    }

    /// Binds a parameter name to its already-reserved index (`0..param_count`)
    /// in the outermost scope. Parameters don't go through `declare_local`:
    /// their slots exist before any scope-stack bookkeeping starts.
    pub fn bind_param(&mut self, name: &str, index: u32) {
        self.scopes[0].insert(name.to_string(), index);
    }

    /// Reads walk from the innermost scope outward.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Total locals declared beyond the parameters, i.e. the count to put
    /// in the function body's locals declaration.
    #[must_use]
    pub fn declared_local_count(&self) -> u32 {
        self.next_local - self.param_count
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    pub index: u32,
    pub param_count: usize,
}

/// Maps user function names to their call index and arity. Populated in
/// a pre-pass over top-level `FunctionDecl` statements before any
/// statement is lowered, so a function may call one declared later in
/// the source (see DESIGN.md).
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionInfo>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        index: u32,
        param_count: usize,
        pos: Pos,
    ) -> Result<(), CompileError> {
        if self.functions.contains_key(name) {
            return Err(CompileError::DuplicateFunction {
                name: name.to_string(),
                pos,
            });
        }
        self.functions
            .insert(name.to_string(), FunctionInfo { index, param_count });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<FunctionInfo> {
        self.functions.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_walk_outward_through_scopes() {
        let mut scope = Scope::new(0);
        let outer = scope.declare_local("x");
        scope.push();
        assert_eq!(scope.lookup("x"), Some(outer));
        scope.pop();
    }

    #[test]
    fn local_assign_always_allocates_a_new_slot() {
        let mut scope = Scope::new(0);
        let first = scope.declare_local("x");
        let second = scope.declare_local("x");
        assert_ne!(first, second);
        assert_eq!(scope.lookup("x"), Some(second));
    }

    #[test]
    fn plain_assign_reuses_existing_binding_across_scopes() {
        let mut scope = Scope::new(0);
        let outer = scope.declare_local("i");
        scope.push();
        let reused = scope.assign("i");
        assert_eq!(outer, reused);
        scope.pop();
    }

    #[test]
    fn plain_assign_creates_binding_when_absent() {
        let mut scope = Scope::new(0);
        let slot = scope.assign("fresh");
        assert_eq!(scope.lookup("fresh"), Some(slot));
    }

    #[test]
    fn params_reserve_the_first_indices() {
        let mut scope = Scope::new(2);
        let slot = scope.declare_local("x");
        assert_eq!(slot, 2);
        assert_eq!(scope.declared_local_count(), 1);
    }

    #[test]
    fn function_table_rejects_duplicate_names() {
        let mut table = FunctionTable::new();
        table.register("f", 0, 1, Pos::default()).unwrap();
        assert!(table.register("f", 1, 2, Pos::default()).is_err());
    }
}

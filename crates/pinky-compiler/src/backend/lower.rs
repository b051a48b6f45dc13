//! AST lowering: expression and statement lowering rules, and the
//! control-flow lowering patterns for `if`/`elif`/`else`, `while` and
//! numeric `for`.
//!
//! Every expression lowers to code that leaves exactly one `i32` boxed
//! pointer on the operand stack; every statement lowers to code with no
//! net stack effect. Branch targets are WASM's own structured control
//! flow (`block`/`loop`/`if`/`else`/`br`/`br_if`), which nests, so there
//! is no separate fixup table to maintain.

use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::backend::encoder::{op, valtype, Emitter};
use crate::backend::runtime::idx;
use crate::backend::scope::{FunctionTable, Scope};
use crate::backend::strings::StringTable;
use crate::error::{CompileError, Pos};

/// A runaway `while`/`for` loop traps rather than hanging the host
/// forever, via an `unreachable` once the counter exceeds this bound
/// (see DESIGN.md). Callers may override it via
/// `CompileOptions::max_iterations`; this is only the default.
pub const DEFAULT_MAX_ITERATIONS: i64 = 10_000;

/// Maps the type-predicate names exposed as ordinary user-callable
/// functions (`is_string(x)`, `is_bool(x)`, ...) to their runtime-helper
/// function index. These aren't in [`FunctionTable`]: they're always
/// available, not declared by the source program.
fn builtin_predicate_index(name: &str) -> Option<u32> {
    match name {
        "is_nil" => Some(idx::IS_NIL),
        "is_bool" => Some(idx::IS_BOOL),
        "is_number" => Some(idx::IS_NUMBER),
        "is_string" => Some(idx::IS_STRING),
        _ => None,
    }
}

pub struct Lowerer<'a> {
    pub scope: Scope,
    functions: &'a FunctionTable,
    strings: &'a mut StringTable,
    emitter: Emitter,
    max_iterations: i64,
}

impl<'a> Lowerer<'a> {
    #[must_use]
    pub fn new(
        param_count: u32,
        functions: &'a FunctionTable,
        strings: &'a mut StringTable,
        max_iterations: i64,
    ) -> Self {
        Self {
            scope: Scope::new(param_count),
            functions,
            strings,
            emitter: Emitter::new(),
            max_iterations,
        }
    }

    pub fn lower_block(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in statements {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Every function (including the synthetic `main`) is declared with
    /// result type `[i32]` so fall-through control flow — reaching the end
    /// of the body without an explicit `ret` — must still leave a boxed
    /// value. Appending `call box_nil; return;` before `end` guarantees
    /// that regardless of whether the body returned explicitly; applied
    /// uniformly here rather than only for user-declared functions (see
    /// DESIGN.md). This is safe even when the body already returned:
    /// WASM's stack is polymorphic after an unconditional `return`, so
    /// the trailing `call`/`return` here type-checks regardless of
    /// whether it is reachable.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.emitter.call(idx::BOX_NIL);
        self.emitter.op(op::RETURN);
        self.emitter.end();
        self.emitter.finish()
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Print(expr, pos) => self.lower_print(expr, idx::PRINT, *pos),
            Stmt::Println(expr, pos) => self.lower_print(expr, idx::PRINTLN, *pos),
            Stmt::Assign { name, value, .. } => {
                self.lower_expr(value)?;
                let slot = self.scope.assign(name);
                self.emitter.local_set(slot);
                Ok(())
            }
            Stmt::LocalAssign { name, value, .. } => {
                self.lower_expr(value)?;
                let slot = self.scope.declare_local(name);
                self.emitter.local_set(slot);
                Ok(())
            }
            Stmt::Expression(expr) => {
                self.lower_expr(expr)?;
                self.emitter.op(op::DROP);
                Ok(())
            }
            Stmt::If {
                branches,
                else_body,
                ..
            } => self.lower_if(branches, else_body.as_deref()),
            Stmt::While {
                condition, body, ..
            } => self.lower_while(condition, body),
            Stmt::For {
                var,
                start,
                stop,
                step,
                body,
                ..
            } => self.lower_for(var, start, stop, step.as_ref(), body),
            Stmt::FunctionDecl { pos, .. } => Err(CompileError::UnsupportedOperator {
                op: "nested function declaration".to_string(),
                pos: *pos,
            }),
            Stmt::Return(expr, _) => {
                self.lower_expr(expr)?;
                self.emitter.op(op::RETURN);
                Ok(())
            }
        }
    }

    fn lower_print(&mut self, expr: &Expr, import_idx: u32, _pos: Pos) -> Result<(), CompileError> {
        self.lower_expr(expr)?;
        let value_slot = self.scope.alloc_scratch();
        let dest_slot = self.scope.alloc_scratch();
        let len_slot = self.scope.alloc_scratch();
        self.emitter.local_set(value_slot);
        self.emitter
            .global_get(crate::backend::runtime::HEAP_PTR_GLOBAL)
            .local_set(dest_slot);
        self.emitter
            .local_get(value_slot)
            .local_get(dest_slot)
            .call(idx::STRINGIFY_INTO)
            .local_set(len_slot);
        self.emitter
            .global_get(crate::backend::runtime::HEAP_PTR_GLOBAL)
            .local_get(len_slot)
            .op(op::I32_ADD)
            .global_set(crate::backend::runtime::HEAP_PTR_GLOBAL);
        self.emitter
            .local_get(dest_slot)
            .local_get(len_slot)
            .call(import_idx);
        Ok(())
    }

    fn lower_if(
        &mut self,
        branches: &[(Expr, Vec<Stmt>)],
        else_body: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        let Some(((cond, body), rest)) = branches.split_first() else {
            // No more `elif` conditions: we're in the trailing `else`
            // position (or there was no `else` at all, nothing to do).
            if let Some(stmts) = else_body {
                self.scope.push();
                self.lower_block(stmts)?;
                self.scope.pop();
            }
            return Ok(());
        };

        self.lower_expr(cond)?;
        self.emitter.call(idx::IS_TRUTHY);
        self.emitter.if_();
        self.scope.push();
        self.lower_block(body)?;
        self.scope.pop();

        if !rest.is_empty() || else_body.is_some() {
            self.emitter.else_();
            self.lower_if(rest, else_body)?;
        }
        self.emitter.end();
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        self.scope.push();
        let iter_count = self.scope.alloc_scratch();
        self.emitter.i32_const(0).local_set(iter_count);

        self.emitter.block();
        self.emitter.loop_();
        self.emit_iteration_guard(iter_count);

        self.lower_expr(condition)?;
        self.emitter.call(idx::IS_TRUTHY);
        self.emitter.i32_const(0).op(op::I32_EQ);
        self.emitter.br_if(1);

        self.lower_block(body)?;

        self.emitter.br(0);
        self.emitter.end(); // loop
        self.emitter.end(); // block
        self.scope.pop();
        Ok(())
    }

    /// Every scope slot, including loop bookkeeping, is an `i32`: the
    /// running counter and bound are kept as *boxed* numbers and unboxed
    /// on each use rather than as raw `f64` locals, so the whole
    /// function's locals section stays a single uniform `i32` run.
    fn lower_for(
        &mut self,
        var: &str,
        start: &Expr,
        stop: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        self.scope.push();
        let cur_ptr = self.scope.alloc_scratch();
        let stop_ptr = self.scope.alloc_scratch();
        let step_ptr = self.scope.alloc_scratch();
        let cond = self.scope.alloc_scratch();
        let iter_count = self.scope.alloc_scratch();

        self.lower_expr(start)?;
        self.emitter.local_set(cur_ptr);
        self.lower_expr(stop)?;
        self.emitter.local_set(stop_ptr);
        match step {
            Some(step_expr) => {
                self.lower_expr(step_expr)?;
                self.emitter.local_set(step_ptr);
            }
            None => {
                self.emitter.f64_const(1.0).call(idx::BOX_NUMBER).local_set(step_ptr);
            }
        }
        self.emitter.i32_const(0).local_set(iter_count);

        let var_slot = self.scope.declare_local(var);

        self.emitter.block();
        self.emitter.loop_();
        self.emit_iteration_guard(iter_count);

        // `is_descending = step < 0` (strict): a step of exactly zero falls
        // into the ascending `<=` test, per spec.
        self.emitter
            .local_get(step_ptr)
            .call(idx::UNBOX_NUMBER)
            .f64_const(0.0)
            .op(op::F64_LT);
        self.emitter.if_();
        self.emitter
            .local_get(cur_ptr)
            .call(idx::UNBOX_NUMBER)
            .local_get(stop_ptr)
            .call(idx::UNBOX_NUMBER)
            .op(op::F64_GE)
            .local_set(cond);
        self.emitter.else_();
        self.emitter
            .local_get(cur_ptr)
            .call(idx::UNBOX_NUMBER)
            .local_get(stop_ptr)
            .call(idx::UNBOX_NUMBER)
            .op(op::F64_LE)
            .local_set(cond);
        self.emitter.end();

        self.emitter.local_get(cond).i32_const(0).op(op::I32_EQ);
        self.emitter.br_if(1);

        self.emitter.local_get(cur_ptr).local_set(var_slot);
        self.lower_block(body)?;

        self.emitter
            .local_get(cur_ptr)
            .call(idx::UNBOX_NUMBER)
            .local_get(step_ptr)
            .call(idx::UNBOX_NUMBER)
            .op(op::F64_ADD)
            .call(idx::BOX_NUMBER)
            .local_set(cur_ptr);
        self.emitter.br(0);
        self.emitter.end(); // loop
        self.emitter.end(); // block
        self.scope.pop();
        Ok(())
    }

    fn emit_iteration_guard(&mut self, iter_count: u32) {
        self.emitter
            .local_get(iter_count)
            .i32_const(1)
            .op(op::I32_ADD)
            .local_set(iter_count);
        self.emitter
            .local_get(iter_count)
            .i32_const(self.max_iterations as i32)
            .op(op::I32_GT_S);
        self.emitter.if_();
        self.emitter.op(op::UNREACHABLE);
        self.emitter.end();
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n, _) => {
                self.emitter.f64_const(*n).call(idx::BOX_NUMBER);
                Ok(())
            }
            Expr::Bool(b, _) => {
                self.emitter.i32_const(i32::from(*b)).call(idx::BOX_BOOL);
                Ok(())
            }
            Expr::Str(s, _) => {
                let interned = self.strings.intern(s);
                self.emitter
                    .i32_const(interned.offset as i32)
                    .i32_const(interned.len as i32)
                    .call(idx::BOX_STRING);
                Ok(())
            }
            Expr::Nil(_) => {
                self.emitter.call(idx::BOX_NIL);
                Ok(())
            }
            Expr::Identifier(name, pos) => {
                let slot = self
                    .scope
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndeclaredVariable {
                        name: name.clone(),
                        pos: *pos,
                    })?;
                self.emitter.local_get(slot);
                Ok(())
            }
            Expr::Grouping(inner) => self.lower_expr(inner),
            Expr::Unary { op: uop, operand, .. } => self.lower_unary(*uop, operand),
            Expr::Binary {
                op: bop,
                left,
                right,
                ..
            } => self.lower_binary(*bop, left, right),
            Expr::Call { callee, args, pos } => self.lower_call(callee, args, *pos),
        }
    }

    fn lower_unary(&mut self, uop: UnaryOp, operand: &Expr) -> Result<(), CompileError> {
        match uop {
            UnaryOp::Plus => {
                self.lower_expr(operand)?;
                self.emitter.call(idx::TO_NUMBER).call(idx::BOX_NUMBER);
            }
            UnaryOp::Negate => {
                self.lower_expr(operand)?;
                self.emitter
                    .call(idx::UNBOX_NUMBER)
                    .op(op::F64_NEG)
                    .call(idx::BOX_NUMBER);
            }
            UnaryOp::Not => {
                self.lower_expr(operand)?;
                self.emitter
                    .call(idx::UNBOX_NUMBER)
                    .f64_const(0.0)
                    .op(op::F64_EQ)
                    .call(idx::BOX_BOOL);
            }
        }
        Ok(())
    }

    fn lower_binary(&mut self, bop: BinaryOp, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        match bop {
            BinaryOp::Add => {
                self.lower_expr(left)?;
                let l = self.scope.alloc_scratch();
                self.emitter.local_set(l);
                self.lower_expr(right)?;
                let r = self.scope.alloc_scratch();
                self.emitter.local_set(r);

                // Three-way dispatch per spec: either operand a string
                // concatenates; else either operand a boolean coerces both
                // via `to_number` (a boxed bool is a 2-byte box, so
                // `unbox_number`'s f64 load would run past it); else both
                // operands unbox directly as numbers.
                self.emitter.local_get(l).call(idx::IS_STRING);
                self.emitter.local_get(r).call(idx::IS_STRING);
                self.emitter.op(op::I32_OR);
                self.emitter.if_result(valtype::I32);
                self.emitter.local_get(l).local_get(r).call(idx::CONCAT);
                self.emitter.else_();
                self.emitter.local_get(l).call(idx::IS_BOOL);
                self.emitter.local_get(r).call(idx::IS_BOOL);
                self.emitter.op(op::I32_OR);
                self.emitter.if_result(valtype::I32);
                self.emitter
                    .local_get(l)
                    .call(idx::TO_NUMBER)
                    .local_get(r)
                    .call(idx::TO_NUMBER)
                    .op(op::F64_ADD)
                    .call(idx::BOX_NUMBER);
                self.emitter.else_();
                self.emitter
                    .local_get(l)
                    .call(idx::UNBOX_NUMBER)
                    .local_get(r)
                    .call(idx::UNBOX_NUMBER)
                    .op(op::F64_ADD)
                    .call(idx::BOX_NUMBER);
                self.emitter.end();
                self.emitter.end();
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.lower_expr(left)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.lower_expr(right)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.emitter.op(match bop {
                    BinaryOp::Sub => op::F64_SUB,
                    BinaryOp::Mul => op::F64_MUL,
                    BinaryOp::Div => op::F64_DIV,
                    _ => unreachable!(),
                });
                self.emitter.call(idx::BOX_NUMBER);
            }
            BinaryOp::Mod => {
                self.lower_expr(left)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.lower_expr(right)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.emitter.call(idx::MOD);
                self.emitter.call(idx::BOX_NUMBER);
            }
            BinaryOp::Pow => {
                self.lower_expr(left)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.lower_expr(right)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.emitter.call(idx::MATH_POW);
                self.emitter.call(idx::BOX_NUMBER);
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                self.lower_expr(left)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.lower_expr(right)?;
                self.emitter.call(idx::UNBOX_NUMBER);
                self.emitter.op(match bop {
                    BinaryOp::Lt => op::F64_LT,
                    BinaryOp::Le => op::F64_LE,
                    BinaryOp::Gt => op::F64_GT,
                    BinaryOp::Ge => op::F64_GE,
                    BinaryOp::Eq => op::F64_EQ,
                    BinaryOp::Ne => op::F64_NE,
                    _ => unreachable!(),
                });
                self.emitter.call(idx::BOX_BOOL);
            }
            BinaryOp::And => {
                self.lower_expr(left)?;
                let l = self.scope.alloc_scratch();
                self.emitter.local_set(l);
                self.emitter.local_get(l).call(idx::IS_TRUTHY);
                self.emitter.if_result(valtype::I32);
                self.lower_expr(right)?;
                self.emitter.else_();
                self.emitter.local_get(l);
                self.emitter.end();
            }
            BinaryOp::Or => {
                self.lower_expr(left)?;
                let l = self.scope.alloc_scratch();
                self.emitter.local_set(l);
                self.emitter.local_get(l).call(idx::IS_TRUTHY);
                self.emitter.if_result(valtype::I32);
                self.emitter.local_get(l);
                self.emitter.else_();
                self.lower_expr(right)?;
                self.emitter.end();
            }
        }
        Ok(())
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr], pos: Pos) -> Result<(), CompileError> {
        // User-defined functions take precedence over the built-in type
        // predicates below, so a program that declares its own `is_string`
        // gets its own function rather than shadowing the runtime helper.
        if let Some(info) = self.functions.get(callee) {
            if info.param_count != args.len() {
                return Err(CompileError::ArityMismatch {
                    name: callee.to_string(),
                    expected: info.param_count,
                    found: args.len(),
                    pos,
                });
            }
            for arg in args {
                self.lower_expr(arg)?;
            }
            self.emitter.call(info.index);
            return Ok(());
        }

        if let Some(helper_idx) = builtin_predicate_index(callee) {
            if args.len() != 1 {
                return Err(CompileError::ArityMismatch {
                    name: callee.to_string(),
                    expected: 1,
                    found: args.len(),
                    pos,
                });
            }
            self.lower_expr(&args[0])?;
            // The helper itself returns a raw i32 0/1; box it exactly once
            // into a boolean (see DESIGN.md's resolution of the
            // "is_string boxed twice" open question).
            self.emitter.call(helper_idx).call(idx::BOX_BOOL);
            return Ok(());
        }

        Err(CompileError::UndefinedFunction {
            name: callee.to_string(),
            pos,
        })
    }
}

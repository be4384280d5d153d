//! Tree-walking executor over the AST.
//!
//! The alternative to lowering + VM: same scope discipline, same
//! arithmetic, comparison and I/O behavior, so both execution modes are
//! observably equivalent. A procedure binding carries the AST node
//! itself; `call` runs its block in a freshly pushed scope.

use std::io::{BufRead, Write};

use crate::ast::*;
use crate::error::RuntimeError;
use crate::sym::{Binding, Scopes};
use crate::vm::read_int;

pub struct Interp<'ast, R, W> {
    scopes: Scopes<&'ast Procedure>,
    input: R,
    output: W,
    trace: bool,
}

impl<'ast, R: BufRead, W: Write> Interp<'ast, R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            scopes: Scopes::new(),
            input,
            output,
            trace: false,
        }
    }

    /// Echo each statement to stderr before executing it.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn run(&mut self, program: &'ast Program) -> Result<(), RuntimeError> {
        self.block(&program.block)
    }

    fn block(&mut self, block: &'ast Block) -> Result<(), RuntimeError> {
        self.scopes.push();
        let result = self.block_body(block);
        self.scopes.pop();
        result
    }

    fn block_body(&mut self, block: &'ast Block) -> Result<(), RuntimeError> {
        for c in &block.consts {
            self.scopes
                .current_mut()
                .insert(&c.ident, Binding::Const(c.value))?;
        }
        for v in &block.vars {
            self.scopes.current_mut().insert(&v.ident, Binding::Var(None))?;
        }
        for p in &block.procs {
            self.scopes.current_mut().insert(&p.ident, Binding::Proc(p))?;
        }
        self.statement(&block.stmt)
    }

    fn statement(&mut self, stmt: &'ast Statement) -> Result<(), RuntimeError> {
        if self.trace {
            eprintln!("[interp] {}", describe(stmt));
        }
        match stmt {
            Statement::Assignment { ident, expr } => {
                let value = self.expression(expr)?;
                self.scopes.store(ident, value)
            }
            Statement::Call { ident } => {
                let proc = *self.scopes.call_target(ident)?;
                self.block(&proc.block)
            }
            Statement::If { cond, stmt } => {
                if self.condition(cond)? {
                    self.statement(stmt)?;
                }
                Ok(())
            }
            Statement::While { cond, stmt } => {
                while self.condition(cond)? {
                    self.statement(stmt)?;
                }
                Ok(())
            }
            Statement::Begin { body } => {
                for s in body {
                    self.statement(s)?;
                }
                Ok(())
            }
            Statement::Read { ident } => {
                let value = read_int(&mut self.input)?;
                self.scopes.store(ident, value)
            }
            Statement::Write { expr } => {
                let value = self.expression(expr)?;
                writeln!(self.output, "{}", value)?;
                Ok(())
            }
        }
    }

    fn condition(&mut self, cond: &'ast Condition) -> Result<bool, RuntimeError> {
        match cond {
            Condition::Odd(expr) => Ok(self.expression(expr)?.rem_euclid(2) != 0),
            Condition::Comparison { op, lhs, rhs } => {
                let lhs = self.expression(lhs)?;
                let rhs = self.expression(rhs)?;
                Ok(match op {
                    CmpOp::Eq => lhs == rhs,
                    CmpOp::Ne => lhs != rhs,
                    CmpOp::Lt => lhs < rhs,
                    CmpOp::Le => lhs <= rhs,
                    CmpOp::Gt => lhs > rhs,
                    CmpOp::Ge => lhs >= rhs,
                })
            }
        }
    }

    fn expression(&mut self, expr: &'ast Expression) -> Result<i64, RuntimeError> {
        let mut result = self.term(&expr.terms[0])?;
        if expr.prefix == Some(Sign::Minus) {
            result = -result;
        }
        for (op, term) in expr.ops.iter().zip(&expr.terms[1..]) {
            let value = self.term(term)?;
            result = match op {
                AddOp::Add => result + value,
                AddOp::Sub => result - value,
            };
        }
        Ok(result)
    }

    fn term(&mut self, term: &'ast Term) -> Result<i64, RuntimeError> {
        let mut result = self.factor(&term.factors[0])?;
        for (op, factor) in term.ops.iter().zip(&term.factors[1..]) {
            let value = self.factor(factor)?;
            result = match op {
                MulOp::Mul => result * value,
                MulOp::Div => {
                    if value == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    result / value
                }
            };
        }
        Ok(result)
    }

    fn factor(&mut self, factor: &'ast Factor) -> Result<i64, RuntimeError> {
        match factor {
            Factor::Number(n) => Ok(*n),
            Factor::Ident(name) => self.scopes.load(name),
            Factor::Paren(expr) => self.expression(expr),
        }
    }
}

/// One-line statement summary for the trace channel.
fn describe(stmt: &Statement) -> String {
    match stmt {
        Statement::Assignment { ident, .. } => format!("assign {}", ident),
        Statement::Call { ident } => format!("call {}", ident),
        Statement::If { .. } => "if".to_string(),
        Statement::While { .. } => "while".to_string(),
        Statement::Begin { body } => format!("begin ({} statements)", body.len()),
        Statement::Read { ident } => format!("read {}", ident),
        Statement::Write { .. } => "write".to_string(),
    }
}

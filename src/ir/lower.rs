//! Lowering from the AST to the flat IR list.
//!
//! Each node emits into the buffer in source order. `if` and `while`
//! emit a `jpf` with a placeholder target that is patched once the end
//! of the guarded code is known. Procedure bodies are emitted inline
//! between `proc` and `ret`; the VM skips over them at declaration time.

use crate::ast::*;

use super::Ir;

/// Builds the instruction list for one program.
pub struct Builder {
    buf: Vec<Ir>,
}

impl Builder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Lower a whole program, consuming the builder.
    pub fn lower(mut self, program: &Program) -> Vec<Ir> {
        self.block(&program.block);
        self.buf.push(Ir::Halt);
        self.buf
    }

    fn block(&mut self, block: &Block) {
        for c in &block.consts {
            self.buf.push(Ir::Lit(c.value));
            self.buf.push(Ir::Const(c.ident.clone()));
        }
        for v in &block.vars {
            self.buf.push(Ir::Var(v.ident.clone()));
        }
        for p in &block.procs {
            self.buf.push(Ir::Proc(p.ident.clone()));
            self.block(&p.block);
            self.buf.push(Ir::Ret);
        }
        self.statement(&block.stmt);
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Assignment { ident, expr } => {
                self.expression(expr);
                self.buf.push(Ir::Store(ident.clone()));
            }
            Statement::Call { ident } => {
                self.buf.push(Ir::Call(ident.clone()));
            }
            Statement::Read { ident } => {
                self.buf.push(Ir::Input);
                self.buf.push(Ir::Store(ident.clone()));
            }
            Statement::Write { expr } => {
                self.expression(expr);
                self.buf.push(Ir::Output);
            }
            Statement::If { cond, stmt } => {
                self.condition(cond);
                let exit = self.emit_jpf_placeholder();
                self.statement(stmt);
                self.patch_jpf(exit);
            }
            Statement::While { cond, stmt } => {
                let head = self.buf.len();
                self.condition(cond);
                let exit = self.emit_jpf_placeholder();
                self.statement(stmt);
                self.buf.push(Ir::Jmp(head));
                self.patch_jpf(exit);
            }
            Statement::Begin { body } => {
                for s in body {
                    self.statement(s);
                }
            }
        }
    }

    fn condition(&mut self, cond: &Condition) {
        match cond {
            Condition::Odd(expr) => {
                self.expression(expr);
                self.buf.push(Ir::Odd);
            }
            Condition::Comparison { op, lhs, rhs } => {
                self.expression(lhs);
                self.expression(rhs);
                self.buf.push(match op {
                    CmpOp::Eq => Ir::Eq,
                    CmpOp::Ne => Ir::Ne,
                    CmpOp::Lt => Ir::Lt,
                    CmpOp::Le => Ir::Le,
                    CmpOp::Gt => Ir::Gt,
                    CmpOp::Ge => Ir::Ge,
                });
            }
        }
    }

    fn expression(&mut self, expr: &Expression) {
        self.term(&expr.terms[0]);
        if expr.prefix == Some(Sign::Minus) {
            self.buf.push(Ir::Neg);
        }
        for (op, term) in expr.ops.iter().zip(&expr.terms[1..]) {
            self.term(term);
            self.buf.push(match op {
                AddOp::Add => Ir::Add,
                AddOp::Sub => Ir::Sub,
            });
        }
    }

    fn term(&mut self, term: &Term) {
        self.factor(&term.factors[0]);
        for (op, factor) in term.ops.iter().zip(&term.factors[1..]) {
            self.factor(factor);
            self.buf.push(match op {
                MulOp::Mul => Ir::Mul,
                MulOp::Div => Ir::Div,
            });
        }
    }

    fn factor(&mut self, factor: &Factor) {
        match factor {
            Factor::Number(n) => self.buf.push(Ir::Lit(*n)),
            Factor::Ident(name) => self.buf.push(Ir::Load(name.clone())),
            Factor::Paren(expr) => self.expression(expr),
        }
    }

    /// Emit a `jpf` whose target is not yet known; returns its index.
    fn emit_jpf_placeholder(&mut self) -> usize {
        let at = self.buf.len();
        self.buf.push(Ir::Jpf(usize::MAX));
        at
    }

    /// Point a placeholder `jpf` at the next instruction to be emitted.
    fn patch_jpf(&mut self, at: usize) {
        debug_assert_eq!(self.buf[at], Ir::Jpf(usize::MAX));
        self.buf[at] = Ir::Jpf(self.buf.len());
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn lower(source: &str) -> Vec<Ir> {
        let (tokens, diags) = Lexer::new(source).tokenize();
        assert!(diags.is_empty(), "lex errors: {:?}", diags);
        let program = Parser::new(tokens).parse_program().unwrap();
        Builder::new().lower(&program)
    }

    #[test]
    fn test_negative_prefix_assignment() {
        let ir = lower("var a; a := - 1 + 2.");
        assert_eq!(
            ir,
            vec![
                Ir::Var("a".to_string()),
                Ir::Lit(1),
                Ir::Neg,
                Ir::Lit(2),
                Ir::Add,
                Ir::Store("a".to_string()),
                Ir::Halt,
            ]
        );
    }

    #[test]
    fn test_const_emits_lit_then_const() {
        let ir = lower("const k = 3; ! k.");
        assert_eq!(ir[0], Ir::Lit(3));
        assert_eq!(ir[1], Ir::Const("k".to_string()));
    }

    #[test]
    fn test_read_write_lowering() {
        let ir = lower("var a; begin ? a; ! a end.");
        assert_eq!(
            ir,
            vec![
                Ir::Var("a".to_string()),
                Ir::Input,
                Ir::Store("a".to_string()),
                Ir::Load("a".to_string()),
                Ir::Output,
                Ir::Halt,
            ]
        );
    }

    #[test]
    fn test_if_backpatches_past_then_branch() {
        let ir = lower("var x; if odd x then x := 1.");
        // 0 var, 1 load, 2 odd, 3 jpf, 4 lit, 5 store, 6 halt
        assert_eq!(ir[3], Ir::Jpf(6));
        assert_eq!(ir[6], Ir::Halt);
    }

    #[test]
    fn test_while_jumps_back_to_loop_head() {
        let ir = lower("var i; while i < 5 do i := i + 1.");
        // 0 var, 1 load i, 2 lit 5, 3 lt, 4 jpf 10, 5 load i, 6 lit 1,
        // 7 add, 8 store i, 9 jmp 1, 10 halt
        assert_eq!(ir[4], Ir::Jpf(10));
        assert_eq!(ir[9], Ir::Jmp(1));
    }

    #[test]
    fn test_procedure_body_is_inline_between_proc_and_ret() {
        let ir = lower("procedure p; x := 1; call p.");
        assert_eq!(ir[0], Ir::Proc("p".to_string()));
        assert_eq!(ir[3], Ir::Ret);
        assert_eq!(ir[4], Ir::Call("p".to_string()));
    }

    #[test]
    fn test_division_and_grouping() {
        let ir = lower("var x; x := (1 + 2) / 3.");
        assert_eq!(
            ir,
            vec![
                Ir::Var("x".to_string()),
                Ir::Lit(1),
                Ir::Lit(2),
                Ir::Add,
                Ir::Lit(3),
                Ir::Div,
                Ir::Store("x".to_string()),
                Ir::Halt,
            ]
        );
    }

    #[test]
    fn test_every_jump_targets_a_valid_index() {
        let ir = lower(
            "var i, s;\n\
             begin i := 0; s := 0;\n\
             while i < 5 do begin i := i + 1; if odd i then s := s + i end\n\
             end.",
        );
        for op in &ir {
            if let Ir::Jmp(target) | Ir::Jpf(target) = op {
                assert!(*target < ir.len(), "jump to {} out of {}", target, ir.len());
            }
        }
    }

    #[test]
    fn test_proc_ret_pairs_balance() {
        let ir = lower(
            "procedure outer;\n\
             procedure inner; x := 1;\n\
             call inner;\n\
             call outer.",
        );
        // every proc must be closed by exactly one ret, in nesting order
        let mut depth = 0usize;
        for op in &ir {
            match op {
                Ir::Proc(_) => depth += 1,
                Ir::Ret => {
                    assert!(depth > 0, "ret without a proc");
                    depth -= 1;
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_lowering_is_deterministic() {
        let source = "var i, s; begin i := 0; while i < 9 do i := i + 1 end.";
        assert_eq!(lower(source), lower(source));
    }
}

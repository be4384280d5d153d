//! The stack virtual machine that executes lowered IR.
//!
//! Machine state is an instruction pointer, a value stack of integers
//! (booleans are 0/1) and a stack of scopes. A procedure activation is
//! one scope plus one return address parked on the value stack.

use std::io::{BufRead, Write};

use crate::error::RuntimeError;
use crate::ir::Ir;
use crate::sym::{Binding, Scopes};

/// One execution of an IR program over a pair of I/O channels.
///
/// The channels are generic so tests can drive the machine with
/// in-memory buffers; the drivers pass locked stdin/stdout.
pub struct Vm<'ir, R, W> {
    ir: &'ir [Ir],
    pc: usize,
    stack: Vec<i64>,
    scopes: Scopes<usize>,
    input: R,
    output: W,
    trace: bool,
}

impl<'ir, R: BufRead, W: Write> Vm<'ir, R, W> {
    pub fn new(ir: &'ir [Ir], input: R, output: W) -> Self {
        Self {
            ir,
            pc: 0,
            stack: Vec::new(),
            scopes: Scopes::new(),
            input,
            output,
            trace: false,
        }
    }

    /// Echo each instruction to stderr before executing it.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Fetch-execute until `halt`.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let op = self.fetch()?;
            if self.trace {
                eprintln!("[{:4}] {}", self.pc, op);
            }
            self.pc += 1;
            match op {
                Ir::Add => self.binary(|lhs, rhs| Ok(lhs + rhs))?,
                Ir::Sub => self.binary(|lhs, rhs| Ok(lhs - rhs))?,
                Ir::Mul => self.binary(|lhs, rhs| Ok(lhs * rhs))?,
                Ir::Div => self.binary(|lhs, rhs| {
                    if rhs == 0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(lhs / rhs)
                    }
                })?,
                Ir::Neg => {
                    let value = self.pop()?;
                    self.stack.push(-value);
                }

                Ir::Eq => self.binary(|lhs, rhs| Ok((lhs == rhs) as i64))?,
                Ir::Ne => self.binary(|lhs, rhs| Ok((lhs != rhs) as i64))?,
                Ir::Lt => self.binary(|lhs, rhs| Ok((lhs < rhs) as i64))?,
                Ir::Le => self.binary(|lhs, rhs| Ok((lhs <= rhs) as i64))?,
                Ir::Gt => self.binary(|lhs, rhs| Ok((lhs > rhs) as i64))?,
                Ir::Ge => self.binary(|lhs, rhs| Ok((lhs >= rhs) as i64))?,
                Ir::Odd => {
                    let value = self.pop()?;
                    self.stack.push(value.rem_euclid(2));
                }

                Ir::Load(name) => {
                    let value = self.scopes.load(name)?;
                    self.stack.push(value);
                }
                Ir::Store(name) => {
                    let value = self.pop()?;
                    self.scopes.store(name, value)?;
                }
                Ir::Lit(value) => self.stack.push(*value),

                Ir::Call(name) => {
                    let target = *self.scopes.call_target(name)?;
                    self.stack.push(self.pc as i64);
                    self.scopes.push();
                    self.pc = target;
                }
                Ir::Ret => {
                    self.scopes.pop();
                    let addr = self.pop()?;
                    self.pc = addr as usize;
                }
                Ir::Jmp(target) => self.pc = *target,
                Ir::Jpf(target) => {
                    let value = self.pop()?;
                    if value == 0 {
                        self.pc = *target;
                    }
                }

                Ir::Var(name) => {
                    self.scopes.current_mut().insert(name, Binding::Var(None))?;
                }
                Ir::Const(name) => {
                    let value = self.pop()?;
                    self.scopes
                        .current_mut()
                        .insert(name, Binding::Const(value))?;
                }
                Ir::Proc(name) => {
                    // pc already points at the first body instruction
                    self.scopes
                        .current_mut()
                        .insert(name, Binding::Proc(self.pc))?;
                    self.skip_body()?;
                }

                Ir::Input => {
                    let value = read_int(&mut self.input)?;
                    self.stack.push(value);
                }
                Ir::Output => {
                    let value = self.pop()?;
                    writeln!(self.output, "{}", value)?;
                }
                Ir::Halt => break,
            }
        }
        Ok(())
    }

    fn fetch(&self) -> Result<&'ir Ir, RuntimeError> {
        self.ir.get(self.pc).ok_or(RuntimeError::MissingHalt)
    }

    fn pop(&mut self) -> Result<i64, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop right operand, then left; push the result.
    fn binary(
        &mut self,
        op: impl FnOnce(i64, i64) -> Result<i64, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.stack.push(op(lhs, rhs)?);
        Ok(())
    }

    /// Advance the pc past the body of the procedure just declared.
    ///
    /// Bodies are emitted inline, so the matching `ret` is found with a
    /// depth counter: intervening `proc`s increment it, `ret`s decrement
    /// it, and the scan stops just after the `ret` that brings it to
    /// zero. O(body length), no skip jumps needed in the IR.
    fn skip_body(&mut self) -> Result<(), RuntimeError> {
        let mut depth = 1usize;
        while depth > 0 {
            let op = self.fetch()?;
            self.pc += 1;
            match op {
                Ir::Proc(_) => depth += 1,
                Ir::Ret => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Read one whitespace-delimited integer from the input channel.
pub(crate) fn read_int<R: BufRead>(input: &mut R) -> Result<i64, RuntimeError> {
    let mut word = String::new();
    loop {
        let mut used = 0;
        let mut complete = false;
        let mut exhausted = false;
        {
            let chunk = input.fill_buf()?;
            if chunk.is_empty() {
                exhausted = true;
            }
            for &byte in chunk {
                used += 1;
                if byte.is_ascii_whitespace() {
                    if word.is_empty() {
                        continue;
                    }
                    complete = true;
                    break;
                }
                word.push(byte as char);
            }
        }
        input.consume(used);
        if exhausted {
            if word.is_empty() {
                return Err(RuntimeError::InputExhausted);
            }
            break;
        }
        if complete {
            break;
        }
    }
    word.parse::<i64>()
        .map_err(|_| RuntimeError::InvalidInput(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::lower::Builder;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn compile(source: &str) -> Vec<Ir> {
        let (tokens, diags) = Lexer::new(source).tokenize();
        assert!(diags.is_empty(), "lex errors: {:?}", diags);
        let program = Parser::new(tokens).parse_program().unwrap();
        Builder::new().lower(&program)
    }

    fn run_with_input(source: &str, input: &str) -> Result<String, RuntimeError> {
        let ir = compile(source);
        let mut output = Vec::new();
        Vm::new(&ir, input.as_bytes(), &mut output).run()?;
        Ok(String::from_utf8(output).unwrap())
    }

    fn run(source: &str) -> Result<String, RuntimeError> {
        run_with_input(source, "")
    }

    #[test]
    fn test_write_literal() {
        assert_eq!(run("! 42.").unwrap(), "42\n");
    }

    #[test]
    fn test_negative_prefix_assignment() {
        assert_eq!(run("var a; begin a := - 1 + 2; ! a end.").unwrap(), "1\n");
    }

    #[test]
    fn test_sum_of_squares() {
        let source = "var i, s;\n\
                      begin\n\
                        i := 0; s := 0;\n\
                        while i < 5 do\n\
                        begin i := i + 1; s := s + i * i end;\n\
                        ! i; ! s\n\
                      end.";
        assert_eq!(run(source).unwrap(), "5\n55\n");
    }

    #[test]
    fn test_odd_condition() {
        assert_eq!(
            run("var x; begin x := 7; if odd x then ! x end.").unwrap(),
            "7\n"
        );
    }

    #[test]
    fn test_odd_of_even_value_skips() {
        assert_eq!(
            run("var x; begin x := 8; if odd x then ! x end.").unwrap(),
            ""
        );
    }

    #[test]
    fn test_recursion_through_dynamic_lookup() {
        let source = "var n, r;\n\
                      procedure fact;\n\
                        begin\n\
                          if n > 1 then\n\
                          begin r := r * n; n := n - 1; call fact end\n\
                        end;\n\
                      begin n := 5; r := 1; call fact; ! r end.";
        assert_eq!(run(source).unwrap(), "120\n");
    }

    #[test]
    fn test_division_by_zero() {
        let err = run("var a; begin a := 1 / 0 end.").unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_division_truncates_toward_zero() {
        assert_eq!(run("! 7 / 2.").unwrap(), "3\n");
        assert_eq!(run("! (- 7) / 2.").unwrap(), "-3\n");
    }

    #[test]
    fn test_assignment_to_constant() {
        let err = run("const k = 3; begin k := 4 end.").unwrap_err();
        assert!(
            matches!(err, RuntimeError::KindMismatch { ref found, .. } if *found == "constant")
        );
    }

    #[test]
    fn test_undefined_identifier() {
        let err = run("begin ghost := 1 end.").unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedIdentifier(name) if name == "ghost"));
    }

    #[test]
    fn test_uninitialized_read() {
        let err = run("var a, b; begin b := a end.").unwrap_err();
        assert!(matches!(err, RuntimeError::UninitializedRead(name) if name == "a"));
    }

    #[test]
    fn test_call_of_variable_is_kind_mismatch() {
        let err = run("var v; begin v := 1; call v end.").unwrap_err();
        assert!(matches!(err, RuntimeError::KindMismatch { .. }));
    }

    #[test]
    fn test_load_of_procedure_is_kind_mismatch() {
        let err = run("var x; procedure p; x := 1; begin x := p end.").unwrap_err();
        assert!(
            matches!(err, RuntimeError::KindMismatch { ref found, .. } if *found == "procedure")
        );
    }

    #[test]
    fn test_duplicate_declaration() {
        let err = run("var a, a; a := 1.").unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateIdentifier(name) if name == "a"));
    }

    #[test]
    fn test_shadowing_in_procedure_scope() {
        // the inner x is a fresh binding; the outer one is untouched
        let source = "var x;\n\
                      procedure p;\n\
                      var x;\n\
                      x := 9;\n\
                      begin x := 1; call p; ! x end.";
        assert_eq!(run(source).unwrap(), "1\n");
    }

    #[test]
    fn test_input_reads_whitespace_delimited_integers() {
        let source = "var a, b; begin ? a; ? b; ! a + b end.";
        assert_eq!(run_with_input(source, " 3\n  4 ").unwrap(), "7\n");
    }

    #[test]
    fn test_input_accepts_negative_integers() {
        assert_eq!(
            run_with_input("var a; begin ? a; ! a end.", "-12").unwrap(),
            "-12\n"
        );
    }

    #[test]
    fn test_input_exhausted() {
        let err = run_with_input("var a; ? a.", "").unwrap_err();
        assert!(matches!(err, RuntimeError::InputExhausted));
    }

    #[test]
    fn test_input_rejects_non_integer() {
        let err = run_with_input("var a; ? a.", "seven").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidInput(word) if word == "seven"));
    }

    #[test]
    fn test_nested_procedure_skip() {
        // declaring `outer` must skip the nested `inner` body as well
        let source = "var x;\n\
                      procedure outer;\n\
                      procedure inner;\n\
                      x := x + 1;\n\
                      begin call inner; call inner end;\n\
                      begin x := 0; call outer; ! x end.";
        assert_eq!(run(source).unwrap(), "2\n");
    }

    #[test]
    fn test_value_stack_balanced_after_calls() {
        let source = "var x; procedure p; x := x * 2; begin x := 1; call p; call p; ! x end.";
        let ir = compile(source);
        let mut output = Vec::new();
        let mut vm = Vm::new(&ir, "".as_bytes(), &mut output);
        vm.run().unwrap();
        // every return address was consumed and every operand used
        assert!(vm.stack.is_empty());
        assert_eq!(vm.scopes.depth(), 1);
    }

    #[test]
    fn test_missing_halt_is_reported() {
        let ir = vec![Ir::Lit(1)];
        let mut output = Vec::new();
        let err = Vm::new(&ir, "".as_bytes(), &mut output).run().unwrap_err();
        assert!(matches!(err, RuntimeError::MissingHalt));
    }
}

//! PL/0 front end and execution pipeline.
//!
//! The pipeline is strictly linear: source text → [`lexer`] → token
//! stream → [`parser`] → AST → [`ir::lower`] → flat IR → [`vm`]. The
//! [`interp`] module walks the AST directly instead and produces the
//! same observable behavior.

pub mod ast;
pub mod cli;
pub mod diagnostic;
pub mod error;
pub mod interp;
pub mod ir;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod sym;
pub mod vm;

use diagnostic::Diagnostic;
use lexer::Lexer;
use parser::Parser;

/// Lex and parse a source string into an AST.
pub fn parse_source(source: &str) -> Result<ast::Program, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens).parse_program().map_err(|diag| vec![diag])
}

/// Parse and lower to IR in one step.
pub fn compile(source: &str) -> Result<Vec<ir::Ir>, Vec<Diagnostic>> {
    let program = parse_source(source)?;
    Ok(ir::lower::Builder::new().lower(&program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_reports_lex_errors() {
        let errs = parse_source("x := @.").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("invalid character"));
    }

    #[test]
    fn test_parse_source_reports_syntax_errors() {
        let errs = parse_source("x := 1").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("expected '.'"));
    }

    #[test]
    fn test_compile_smoke() {
        let ir = compile("! 1.").unwrap();
        assert_eq!(ir.len(), 3);
        assert_eq!(ir.last(), Some(&ir::Ir::Halt));
    }
}

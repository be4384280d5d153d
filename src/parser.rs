use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

type ParseResult<T> = Result<T, Diagnostic>;

/// Recursive-descent parser over a scanned token vector.
///
/// The first deviation from the grammar aborts with a diagnostic naming
/// the expected token; no recovery is attempted.
pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.node == Lexeme::Eof));
        Self { tokens, pos: 0 }
    }

    /// program = block "."
    ///
    /// Anything after the closing '.' is an error.
    pub(crate) fn parse_program(mut self) -> ParseResult<Program> {
        let block = self.parse_block()?;
        self.expect(&Lexeme::Dot)?;
        if !self.at(&Lexeme::Eof) {
            return Err(self
                .error_at_current(&format!(
                    "expected end of input after '.', found {}",
                    self.peek().description()
                ))
                .with_help("a PL/0 program ends at the first '.'".to_string()));
        }
        Ok(Program { block })
    }

    /// block = [const-decls] [var-decls] {procedure} statement
    fn parse_block(&mut self) -> ParseResult<Block> {
        let mut consts = Vec::new();
        let mut vars = Vec::new();
        let mut procs = Vec::new();

        if self.eat(&Lexeme::Const) {
            consts = self.parse_const_list()?;
        }
        if self.eat(&Lexeme::Var) {
            vars = self.parse_var_list()?;
        }
        while self.eat(&Lexeme::Procedure) {
            procs.push(self.parse_procedure()?);
        }
        let stmt = self.parse_statement()?;

        Ok(Block {
            consts,
            vars,
            procs,
            stmt,
        })
    }

    /// constList = ident "=" number { "," ident "=" number } ";"
    fn parse_const_list(&mut self) -> ParseResult<Vec<Const>> {
        let mut consts = Vec::new();
        loop {
            let ident = self.expect_ident()?;
            self.expect(&Lexeme::Eq)?;
            let value = self.expect_number()?;
            consts.push(Const { ident, value });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::Semicolon)?;
        Ok(consts)
    }

    /// varList = ident { "," ident } ";"
    fn parse_var_list(&mut self) -> ParseResult<Vec<Var>> {
        let mut vars = Vec::new();
        loop {
            let ident = self.expect_ident()?;
            vars.push(Var { ident });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::Semicolon)?;
        Ok(vars)
    }

    /// procedure = "procedure" ident ";" block ";"   ("procedure" already eaten)
    fn parse_procedure(&mut self) -> ParseResult<Procedure> {
        let ident = self.expect_ident()?;
        self.expect(&Lexeme::Semicolon)?;
        let block = self.parse_block()?;
        self.expect(&Lexeme::Semicolon)?;
        Ok(Procedure { ident, block })
    }

    /// Statement form is decided by the leading token; the fallthrough is
    /// an assignment, so an empty statement is never accepted.
    fn parse_statement(&mut self) -> ParseResult<Statement> {
        if self.eat(&Lexeme::Begin) {
            self.parse_begin()
        } else if self.eat(&Lexeme::If) {
            self.parse_if()
        } else if self.eat(&Lexeme::While) {
            self.parse_while()
        } else if self.eat(&Lexeme::Call) {
            let ident = self.expect_ident()?;
            Ok(Statement::Call { ident })
        } else if self.eat(&Lexeme::Question) {
            let ident = self.expect_ident()?;
            Ok(Statement::Read { ident })
        } else if self.eat(&Lexeme::Bang) {
            let expr = self.parse_expression()?;
            Ok(Statement::Write { expr })
        } else {
            self.parse_assignment()
        }
    }

    /// begin = "begin" statement { ";" statement } "end"
    ///
    /// The first statement is mandatory and a ';' directly before "end"
    /// is rejected (the ';' demands another statement).
    fn parse_begin(&mut self) -> ParseResult<Statement> {
        let mut body = vec![self.parse_statement()?];
        while self.eat(&Lexeme::Semicolon) {
            body.push(self.parse_statement()?);
        }
        self.expect(&Lexeme::End)?;
        Ok(Statement::Begin { body })
    }

    /// if = "if" condition "then" statement
    fn parse_if(&mut self) -> ParseResult<Statement> {
        let cond = self.parse_condition()?;
        self.expect(&Lexeme::Then)?;
        let stmt = Box::new(self.parse_statement()?);
        Ok(Statement::If { cond, stmt })
    }

    /// while = "while" condition "do" statement
    fn parse_while(&mut self) -> ParseResult<Statement> {
        let cond = self.parse_condition()?;
        self.expect(&Lexeme::Do)?;
        let stmt = Box::new(self.parse_statement()?);
        Ok(Statement::While { cond, stmt })
    }

    /// assignment = ident ":=" expression
    fn parse_assignment(&mut self) -> ParseResult<Statement> {
        let ident = self.expect_ident()?;
        self.expect(&Lexeme::Assign)?;
        let expr = self.parse_expression()?;
        Ok(Statement::Assignment { ident, expr })
    }

    /// condition = "odd" expression | expression relop expression
    fn parse_condition(&mut self) -> ParseResult<Condition> {
        if self.eat(&Lexeme::Odd) {
            let expr = self.parse_expression()?;
            return Ok(Condition::Odd(expr));
        }
        let lhs = self.parse_expression()?;
        let op = self.parse_cmp_op()?;
        let rhs = self.parse_expression()?;
        Ok(Condition::Comparison { op, lhs, rhs })
    }

    /// relop = "=" | "#" | "<" | "<=" | ">" | ">="
    fn parse_cmp_op(&mut self) -> ParseResult<CmpOp> {
        let op = match self.peek() {
            Lexeme::Eq => CmpOp::Eq,
            Lexeme::Hash => CmpOp::Ne,
            Lexeme::Lt => CmpOp::Lt,
            Lexeme::Le => CmpOp::Le,
            Lexeme::Gt => CmpOp::Gt,
            Lexeme::Ge => CmpOp::Ge,
            other => {
                return Err(self.error_at_current(&format!(
                    "expected a comparison operator, found {}",
                    other.description()
                )))
            }
        };
        self.advance();
        Ok(op)
    }

    /// expression = [ "+" | "-" ] term { ("+"|"-") term }
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let prefix = if self.eat(&Lexeme::Plus) {
            Some(Sign::Plus)
        } else if self.eat(&Lexeme::Minus) {
            Some(Sign::Minus)
        } else {
            None
        };

        let mut terms = vec![self.parse_term()?];
        let mut ops = Vec::new();
        loop {
            if self.eat(&Lexeme::Plus) {
                ops.push(AddOp::Add);
            } else if self.eat(&Lexeme::Minus) {
                ops.push(AddOp::Sub);
            } else {
                break;
            }
            terms.push(self.parse_term()?);
        }

        debug_assert_eq!(terms.len(), ops.len() + 1);
        Ok(Expression { prefix, terms, ops })
    }

    /// term = factor { ("*"|"/") factor }
    fn parse_term(&mut self) -> ParseResult<Term> {
        let mut factors = vec![self.parse_factor()?];
        let mut ops = Vec::new();
        loop {
            if self.eat(&Lexeme::Star) {
                ops.push(MulOp::Mul);
            } else if self.eat(&Lexeme::Slash) {
                ops.push(MulOp::Div);
            } else {
                break;
            }
            factors.push(self.parse_factor()?);
        }

        debug_assert_eq!(factors.len(), ops.len() + 1);
        Ok(Term { factors, ops })
    }

    /// factor = ident | number | "(" expression ")"
    fn parse_factor(&mut self) -> ParseResult<Factor> {
        if self.eat(&Lexeme::LParen) {
            let expr = self.parse_expression()?;
            self.expect(&Lexeme::RParen)?;
            return Ok(Factor::Paren(Box::new(expr)));
        }
        match self.peek().clone() {
            Lexeme::Ident(name) => {
                self.advance();
                Ok(Factor::Ident(name))
            }
            Lexeme::Number(n) => {
                self.advance();
                Ok(Factor::Number(n))
            }
            other => Err(self.error_at_current(&format!(
                "expected a name, a number, or '(', found {}",
                other.description()
            ))),
        }
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    /// Move past the current token. The cursor clamps on the final `Eof`,
    /// so reading past the end keeps yielding `Eof`.
    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    /// Discriminant match: `at(&Lexeme::Ident(..))` accepts any identifier.
    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> ParseResult<Span> {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            )))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            )))
        }
    }

    fn expect_number(&mut self) -> ParseResult<i64> {
        if let Lexeme::Number(n) = self.peek() {
            let n = *n;
            self.advance();
            Ok(n)
        } else {
            Err(self.error_at_current(&format!(
                "expected number, found {}",
                self.peek().description()
            )))
        }
    }

    fn error_at_current(&self, msg: &str) -> Diagnostic {
        Diagnostic::error(msg.to_string(), self.current_span())
    }
}

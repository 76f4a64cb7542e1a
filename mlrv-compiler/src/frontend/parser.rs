//! Recursive-descent parser for the expression language.
//!
//! Grammar, loosest binding first (all binary operators left-associative):
//!
//! ```text
//! exp       ::= if_exp
//! if_exp    ::= 'if' exp 'then' exp 'else' exp | or_exp
//! or_exp    ::= and_exp ('or' and_exp)*
//! and_exp   ::= eq_exp ('and' eq_exp)*
//! eq_exp    ::= cmp_exp ('=' cmp_exp)*
//! cmp_exp   ::= add_exp (('<=' | '<') add_exp)*
//! add_exp   ::= mul_exp (('+' | '-') mul_exp)*
//! mul_exp   ::= unary_exp (('*' | '/') unary_exp)*
//! unary_exp ::= 'not' unary_exp | '~' unary_exp | primary
//! primary   ::= num | var | 'true' | 'false' | '(' exp ')'
//!             | 'let' var '<-' exp 'in' exp 'end'
//! ```

use super::lexer::{position_to_line_col, Spanned, Token};
use crate::ast::Exp;
use crate::CompileError;

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    /// Parse the token stream as a single expression; trailing tokens are an
    /// error.
    pub fn parse(mut self) -> Result<Exp, CompileError> {
        let exp = self.exp()?;
        match self.peek() {
            None => Ok(exp),
            Some(tok) => Err(self.error(format!("expected end of input, found '{tok}'"))),
        }
    }

    // ── Token plumbing ──────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), CompileError> {
        match self.peek() {
            Some(tok) if *tok == want => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(self.error(format!("expected '{want}', found '{tok}'"))),
            None => Err(self.error(format!("expected '{want}', found end of input"))),
        }
    }

    fn error(&self, message: String) -> CompileError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len());
        let (line, column) = position_to_line_col(self.source, offset);
        CompileError::Parse {
            line,
            column,
            message,
        }
    }

    // ── Grammar productions ─────────────────────────────────────────────

    fn exp(&mut self) -> Result<Exp, CompileError> {
        self.if_exp()
    }

    fn if_exp(&mut self) -> Result<Exp, CompileError> {
        if self.peek() == Some(&Token::If) {
            self.pos += 1;
            let cond = self.exp()?;
            self.expect(Token::Then)?;
            let e0 = self.exp()?;
            self.expect(Token::Else)?;
            let e1 = self.exp()?;
            return Ok(Exp::if_then_else(cond, e0, e1));
        }
        self.or_exp()
    }

    fn or_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.and_exp()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_exp()?;
            left = Exp::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.eq_exp()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.eq_exp()?;
            left = Exp::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn eq_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.cmp_exp()?;
        while self.peek() == Some(&Token::Eql) {
            self.pos += 1;
            let right = self.cmp_exp()?;
            left = Exp::Eql(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn cmp_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.add_exp()?;
        loop {
            match self.peek() {
                Some(Token::Leq) => {
                    self.pos += 1;
                    let right = self.add_exp()?;
                    left = Exp::Leq(Box::new(left), Box::new(right));
                }
                Some(Token::Lth) => {
                    self.pos += 1;
                    let right = self.add_exp()?;
                    left = Exp::Lth(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn add_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.mul_exp()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let right = self.mul_exp()?;
                    left = Exp::Add(Box::new(left), Box::new(right));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let right = self.mul_exp()?;
                    left = Exp::Sub(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn mul_exp(&mut self) -> Result<Exp, CompileError> {
        let mut left = self.unary_exp()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let right = self.unary_exp()?;
                    left = Exp::Mul(Box::new(left), Box::new(right));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.unary_exp()?;
                    left = Exp::Div(Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn unary_exp(&mut self) -> Result<Exp, CompileError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                let exp = self.unary_exp()?;
                Ok(Exp::Not(Box::new(exp)))
            }
            Some(Token::Tilde) => {
                self.pos += 1;
                let exp = self.unary_exp()?;
                Ok(Exp::Neg(Box::new(exp)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Exp, CompileError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Exp::Num(n)),
            Some(Token::True) => Ok(Exp::Bln(true)),
            Some(Token::False) => Ok(Exp::Bln(false)),
            Some(Token::Ident(name)) => Ok(Exp::Var(name)),
            Some(Token::LParen) => {
                let exp = self.exp()?;
                self.expect(Token::RParen)?;
                Ok(exp)
            }
            Some(Token::Let) => {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    Some(tok) => {
                        return Err(self.error(format!(
                            "let block must bind a variable, found '{tok}'"
                        )))
                    }
                    None => {
                        return Err(
                            self.error("let block must bind a variable".to_string())
                        )
                    }
                };
                self.expect(Token::Assign)?;
                let def = self.exp()?;
                self.expect(Token::In)?;
                let body = self.exp()?;
                self.expect(Token::End)?;
                Ok(Exp::let_in(name, def, body))
            }
            Some(tok) => Err(self.error(format!("unexpected token '{tok}'"))),
            None => Err(self.error("unexpected end of input".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::lex;

    fn parse(source: &str) -> Exp {
        let tokens = lex(source).unwrap();
        Parser::new(source, tokens).parse().unwrap()
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        assert_eq!(
            parse("2 + 3 * 4"),
            Exp::Add(
                Box::new(Exp::Num(2)),
                Box::new(Exp::Mul(Box::new(Exp::Num(3)), Box::new(Exp::Num(4)))),
            )
        );
    }

    #[test]
    fn sub_is_left_associative() {
        assert_eq!(
            parse("10 - 3 - 2"),
            Exp::Sub(
                Box::new(Exp::Sub(Box::new(Exp::Num(10)), Box::new(Exp::Num(3)))),
                Box::new(Exp::Num(2)),
            )
        );
    }

    #[test]
    fn neg_binds_tighter_than_mul() {
        assert_eq!(
            parse("3 * ~4"),
            Exp::Mul(
                Box::new(Exp::Num(3)),
                Box::new(Exp::Neg(Box::new(Exp::Num(4)))),
            )
        );
    }

    #[test]
    fn cmp_binds_tighter_than_eq() {
        // 1 < 2 = 3 < 4  parses as  (1 < 2) = (3 < 4)
        assert_eq!(
            parse("1 < 2 = 3 < 4"),
            Exp::Eql(
                Box::new(Exp::Lth(Box::new(Exp::Num(1)), Box::new(Exp::Num(2)))),
                Box::new(Exp::Lth(Box::new(Exp::Num(3)), Box::new(Exp::Num(4)))),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse("true or false and true"),
            Exp::Or(
                Box::new(Exp::Bln(true)),
                Box::new(Exp::And(Box::new(Exp::Bln(false)), Box::new(Exp::Bln(true)))),
            )
        );
    }

    #[test]
    fn let_block() {
        assert_eq!(
            parse("let v <- 42 in v + 1 end"),
            Exp::let_in(
                "v",
                Exp::Num(42),
                Exp::Add(Box::new(Exp::var("v")), Box::new(Exp::Num(1))),
            )
        );
    }

    #[test]
    fn if_then_else_spans_loosely() {
        assert_eq!(
            parse("if 1 < 2 then 3 + 4 else 5"),
            Exp::if_then_else(
                Exp::Lth(Box::new(Exp::Num(1)), Box::new(Exp::Num(2))),
                Exp::Add(Box::new(Exp::Num(3)), Box::new(Exp::Num(4))),
                Exp::Num(5),
            )
        );
    }

    #[test]
    fn reports_missing_end() {
        let source = "let v <- 1 in v";
        let tokens = lex(source).unwrap();
        let err = Parser::new(source, tokens).parse().unwrap_err();
        assert!(err.to_string().contains("expected 'end'"), "got: {err}");
    }

    #[test]
    fn reports_trailing_tokens() {
        let source = "1 + 2 3";
        let tokens = lex(source).unwrap();
        let err = Parser::new(source, tokens).parse().unwrap_err();
        assert!(err.to_string().contains("end of input"), "got: {err}");
    }
}

use logos::Logos;
use std::fmt;
use thiserror::Error;

#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n]+")] // Whitespace
#[logos(skip r"--[^\n]*")] // SML-style line comments starting with '--'
pub enum Token {
    // --- Keywords ---
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("end")]
    End,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,

    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    #[token("true")]
    True,
    #[token("false")]
    False,

    // --- Identifiers and Numbers ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Number(i64),

    // --- Operators ---
    #[token("<-")]
    Assign,
    #[token("<=")]
    Leq,
    #[token("<")]
    Lth,
    #[token("=")]
    Eql,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("~")]
    Tilde,

    // --- Punctuation ---
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Let => write!(f, "let"),
            Token::In => write!(f, "in"),
            Token::End => write!(f, "end"),
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Assign => write!(f, "<-"),
            Token::Leq => write!(f, "<="),
            Token::Lth => write!(f, "<"),
            Token::Eql => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Tilde => write!(f, "~"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

/// A lexical error with enough context to point at the offending input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected character '{slice}' at byte {position} (line {line}, column {column})")]
pub struct LexicalError {
    pub slice: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

/// Convert a byte offset into a 1-based (line, column) pair.
pub fn position_to_line_col(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= position {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// A token paired with its byte span in the source.
pub type Spanned = (Token, std::ops::Range<usize>);

/// Tokenize the whole source up front.
///
/// The parser works over the full token list, so there is no value in lazy
/// lexing here.
pub fn lex(source: &str) -> Result<Vec<Spanned>, LexicalError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(tok) => tokens.push((tok, span)),
            Err(()) => {
                let (line, column) = position_to_line_col(source, span.start);
                return Err(LexicalError {
                    slice: source[span.clone()].to_string(),
                    position: span.start,
                    line,
                    column,
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_arithmetic() {
        assert_eq!(
            kinds("1 + 3"),
            vec![Token::Number(1), Token::Plus, Token::Number(3)]
        );
    }

    #[test]
    fn lex_skips_comments() {
        assert_eq!(
            kinds("1 * 2 -- trailing comment\n"),
            vec![Token::Number(1), Token::Star, Token::Number(2)]
        );
    }

    #[test]
    fn lex_let_block() {
        assert_eq!(
            kinds("let v <- 2 in v end"),
            vec![
                Token::Let,
                Token::Ident("v".to_string()),
                Token::Assign,
                Token::Number(2),
                Token::In,
                Token::Ident("v".to_string()),
                Token::End,
            ]
        );
    }

    #[test]
    fn lex_assign_before_leq() {
        // '<-' must win over '<' followed by '-'.
        assert_eq!(kinds("<- <= <"), vec![Token::Assign, Token::Leq, Token::Lth]);
    }

    #[test]
    fn lex_rejects_unknown_char() {
        let err = lex("1 + $x").unwrap_err();
        assert_eq!(err.slice, "$");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
    }
}

//! Lexer for rate expressions and assignment right-hand sides.
//!
//! Uses Logos. Accepts plain infix (`k_1*A + 2B`) and the LaTeX subset rule files are written
//! in: `\frac`, `\cdot`, `\times`, `\pi`, Greek commands with `_{...}` subscripts, and spacing
//! commands, which are dropped.

use std::fmt;

use logos::Logos;

use crate::error::{MumotError, Result};
use crate::expr::Func;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub(crate) enum Token<'src> {
    // === Layout ===
    #[regex(r"\\[,;:! ]", logos::skip)]
    #[token("\\left", logos::skip)]
    #[token("\\right", logos::skip)]
    Spacing,

    // === Literals ===
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Num(f64),

    #[token("pi")]
    #[token("\\pi")]
    Pi,

    // === Names ===
    /// Plain name with an optional subscript: `k`, `k_1`, `k_{on}`.
    #[regex(r"\p{L}[\p{L}\p{N}]*(_([\p{L}\p{N}]+|\{[^{}]*\}))?", |lex| lex.slice())]
    Ident(&'src str),

    /// LaTeX command with an optional subscript: `\alpha`, `\beta_{2}`, `\sqrt`.
    #[regex(r"\\[A-Za-z]+(_([\p{L}\p{N}]+|\{[^{}]*\}))?", |lex| lex.slice())]
    Command(&'src str),

    #[token("\\frac")]
    #[token("\\dfrac")]
    #[token("\\tfrac")]
    Frac,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    #[token("\\cdot")]
    #[token("\\times")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    #[token("**")]
    Caret,

    // === Delimiters ===
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
}

impl Token<'_> {
    /// The elementary function this name calls when followed by a group.
    pub(crate) fn function(&self) -> Option<Func> {
        match self {
            Self::Ident(name) => Func::from_name(name),
            Self::Command(name) => Func::from_name(name.trim_start_matches('\\')),
            _ => None,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spacing => f.write_str("spacing"),
            Self::Num(value) => write!(f, "number {value}"),
            Self::Pi => f.write_str("'pi'"),
            Self::Ident(name) | Self::Command(name) => write!(f, "symbol '{name}'"),
            Self::Frac => f.write_str("'\\frac'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Caret => f.write_str("'^'"),
            Self::ParenOpen => f.write_str("'('"),
            Self::ParenClose => f.write_str("')'"),
            Self::BracketOpen => f.write_str("'['"),
            Self::BracketClose => f.write_str("']'"),
            Self::BraceOpen => f.write_str("'{'"),
            Self::BraceClose => f.write_str("'}'"),
        }
    }
}

/// Tokenize `source`, failing on the first slice no token matches.
pub(crate) fn lex(source: &str) -> Result<Vec<Token<'_>>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(Token::Spacing) => {}
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(MumotError::syntax(format!(
                    "unexpected '{}' in expression '{source}'",
                    lexer.slice()
                )));
            }
        }
    }
    Ok(tokens)
}

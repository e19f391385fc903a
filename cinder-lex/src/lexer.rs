#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use cinder_ast::{span_between, BigUint, Span};
use logos::Logos;
use miette::Diagnostic;
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(cinder::lex))]
#[allow(unused_assignments)]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r\n]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("/*", block_comment)]
    UnterminatedComment,

    #[token("let")]
    KwLet,
    #[token("var")]
    KwVar,
    #[token("fun")]
    KwFun,
    #[token("return")]
    KwReturn,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("create")]
    KwCreate,
    #[token("destroy")]
    KwDestroy,
    #[token("resource")]
    KwResource,
    #[token("struct")]
    KwStruct,
    #[token("contract")]
    KwContract,
    #[token("interface")]
    KwInterface,
    #[token("event")]
    KwEvent,
    #[token("init")]
    KwInit,
    #[token("pub")]
    KwPub,
    #[token("priv")]
    KwPriv,
    #[token("access")]
    KwAccess,
    #[token("nil")]
    KwNil,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("as")]
    KwAs,
    #[token("as?")]
    KwAsOptional,
    #[token("as!")]
    KwAsForce,

    #[token("<-")]
    LeftArrow,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("@")]
    At,
    #[token("??")]
    QuestionQuestion,
    #[token("?")]
    Question,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"0b[01_]+", |lex| parse_int_prefixed(lex.slice(), 2, 2))]
    #[regex(r"0o[0-7_]+", |lex| parse_int_prefixed(lex.slice(), 8, 2))]
    #[regex(r"0x[0-9a-fA-F_]+", |lex| parse_int_prefixed(lex.slice(), 16, 2))]
    #[regex(r"[0-9][0-9_]*", |lex| parse_int_decimal(lex.slice()))]
    Int(Option<BigUint>),

    // Supported escapes: \0, \n, \t, \r, \", \', \\, and \u{HEX} (1-8 hex digits)
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    String(Option<String>),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn parse_int_decimal(s: &str) -> Option<BigUint> {
    let digits = strip_underscores(s)?;
    BigUint::parse_bytes(digits.as_bytes(), 10)
}

fn parse_int_prefixed(s: &str, radix: u32, prefix_len: usize) -> Option<BigUint> {
    let rest = s.get(prefix_len..)?;
    let digits = strip_underscores(rest)?;
    BigUint::parse_bytes(digits.as_bytes(), radix)
}

/// Skips a `/* ... */` comment, nested ones included. An unterminated comment
/// swallows the rest of the input and is emitted as a token so it can be reported.
fn block_comment(lex: &mut logos::Lexer<RawToken>) -> logos::FilterResult<(), ()> {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i + 1 < rest.len() {
        match (rest[i], rest[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    lex.bump(i);
                    return logos::FilterResult::Skip;
                }
            }
            _ => i += 1,
        }
    }
    lex.bump(rest.len());
    logos::FilterResult::Emit(())
}

fn strip_underscores(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with('_') || s.ends_with('_') {
        return None;
    }
    Some(s.replace('_', ""))
}

fn parse_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let esc = chars.next()?;

        match esc {
            '0' => out.push('\0'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            'u' => {
                if chars.next() != Some('{') {
                    return None;
                }
                let mut hex = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        break;
                    }
                    hex.push(ch);
                    chars.next();
                    if hex.len() > 8 {
                        return None;
                    }
                }
                if chars.next() != Some('}') || hex.is_empty() {
                    return None;
                }
                let cp = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(cp)?);
            }
            _ => return None,
        }
    }

    Some(out)
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut lex = RawToken::lexer(self.src);

        while let Some(raw) = lex.next() {
            let range = lex.span();
            let span = span_between(range.start, range.end);

            let kind = match raw {
                Ok(RawToken::KwLet) => TokenKind::KwLet,
                Ok(RawToken::KwVar) => TokenKind::KwVar,
                Ok(RawToken::KwFun) => TokenKind::KwFun,
                Ok(RawToken::KwReturn) => TokenKind::KwReturn,
                Ok(RawToken::KwIf) => TokenKind::KwIf,
                Ok(RawToken::KwElse) => TokenKind::KwElse,
                Ok(RawToken::KwWhile) => TokenKind::KwWhile,
                Ok(RawToken::KwCreate) => TokenKind::KwCreate,
                Ok(RawToken::KwDestroy) => TokenKind::KwDestroy,
                Ok(RawToken::KwResource) => TokenKind::KwResource,
                Ok(RawToken::KwStruct) => TokenKind::KwStruct,
                Ok(RawToken::KwContract) => TokenKind::KwContract,
                Ok(RawToken::KwInterface) => TokenKind::KwInterface,
                Ok(RawToken::KwEvent) => TokenKind::KwEvent,
                Ok(RawToken::KwInit) => TokenKind::KwInit,
                Ok(RawToken::KwPub) => TokenKind::KwPub,
                Ok(RawToken::KwPriv) => TokenKind::KwPriv,
                Ok(RawToken::KwAccess) => TokenKind::KwAccess,
                Ok(RawToken::KwNil) => TokenKind::KwNil,
                Ok(RawToken::KwTrue) => TokenKind::KwTrue,
                Ok(RawToken::KwFalse) => TokenKind::KwFalse,
                Ok(RawToken::KwAs) => TokenKind::KwAs,
                Ok(RawToken::KwAsOptional) => TokenKind::KwAsOptional,
                Ok(RawToken::KwAsForce) => TokenKind::KwAsForce,

                Ok(RawToken::LeftArrow) => TokenKind::LeftArrow,

                Ok(RawToken::EqEq) => TokenKind::EqEq,
                Ok(RawToken::Neq) => TokenKind::Neq,
                Ok(RawToken::Le) => TokenKind::Le,
                Ok(RawToken::Ge) => TokenKind::Ge,
                Ok(RawToken::Lt) => TokenKind::Lt,
                Ok(RawToken::Gt) => TokenKind::Gt,

                Ok(RawToken::AndAnd) => TokenKind::AndAnd,
                Ok(RawToken::OrOr) => TokenKind::OrOr,
                Ok(RawToken::Bang) => TokenKind::Bang,
                Ok(RawToken::Amp) => TokenKind::Amp,
                Ok(RawToken::At) => TokenKind::At,
                Ok(RawToken::QuestionQuestion) => TokenKind::QuestionQuestion,
                Ok(RawToken::Question) => TokenKind::Question,

                Ok(RawToken::Plus) => TokenKind::Plus,
                Ok(RawToken::Minus) => TokenKind::Minus,
                Ok(RawToken::Star) => TokenKind::Star,
                Ok(RawToken::Slash) => TokenKind::Slash,
                Ok(RawToken::Percent) => TokenKind::Percent,

                Ok(RawToken::Dot) => TokenKind::Dot,
                Ok(RawToken::Colon) => TokenKind::Colon,
                Ok(RawToken::Semicolon) => TokenKind::Semicolon,
                Ok(RawToken::Eq) => TokenKind::Eq,
                Ok(RawToken::Comma) => TokenKind::Comma,

                Ok(RawToken::LParen) => TokenKind::LParen,
                Ok(RawToken::RParen) => TokenKind::RParen,
                Ok(RawToken::LBrace) => TokenKind::LBrace,
                Ok(RawToken::RBrace) => TokenKind::RBrace,
                Ok(RawToken::LBracket) => TokenKind::LBracket,
                Ok(RawToken::RBracket) => TokenKind::RBracket,

                Ok(RawToken::UnterminatedComment) => {
                    return Err(LexError {
                        message: "unterminated block comment".to_string(),
                        span,
                    });
                }

                Ok(RawToken::Ident(s)) => TokenKind::Ident(s),
                Ok(RawToken::Int(Some(n))) => TokenKind::Int(n),
                Ok(RawToken::Int(None)) => {
                    return Err(LexError {
                        message: "invalid integer literal".to_string(),
                        span,
                    });
                }
                Ok(RawToken::String(Some(s))) => TokenKind::String(s),
                Ok(RawToken::String(None)) => {
                    return Err(LexError {
                        message: "invalid string literal".to_string(),
                        span,
                    });
                }

                Err(_) => {
                    return Err(LexError {
                        message: format!("unexpected character `{}`", lex.slice()),
                        span,
                    });
                }
            };

            tokens.push(Token { kind, span });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: span_between(self.src.len(), self.src.len()),
        });

        Ok(tokens)
    }
}

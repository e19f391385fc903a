#![forbid(unsafe_code)]

use cinder_ast::{BigUint, Span};

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwLet,
    KwVar,
    KwFun,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwCreate,
    KwDestroy,
    KwResource,
    KwStruct,
    KwContract,
    KwInterface,
    KwEvent,
    KwInit,
    KwPub,
    KwPriv,
    KwAccess,
    KwNil,
    KwTrue,
    KwFalse,
    KwAs,
    KwAsOptional,
    KwAsForce,

    // Operators / punctuation
    LeftArrow,
    Colon,
    Semicolon,
    Eq,
    EqEq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    AndAnd,
    OrOr,
    Bang,
    Amp,
    At,
    Question,
    QuestionQuestion,
    Dot,
    Comma,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,

    // Literals / identifiers
    Ident(String),
    Int(BigUint),
    String(String),
}

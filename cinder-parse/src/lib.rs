#![forbid(unsafe_code)]

mod error;
mod parser;

use cinder_lex::Lexer;
use miette::IntoDiagnostic;

pub use error::ParseError;
pub use parser::Parser;

/// Nesting limits applied while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseConfig {
    pub max_type_depth: usize,
    pub max_expression_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_type_depth: 32,
            max_expression_depth: 64,
        }
    }
}

pub fn parse_source(src: &str) -> miette::Result<cinder_ast::Program> {
    parse_source_with_config(src, &ParseConfig::default())
}

pub fn parse_source_with_config(
    src: &str,
    config: &ParseConfig,
) -> miette::Result<cinder_ast::Program> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new_with_config(&tokens, config);
    parser.parse_program().into_diagnostic()
}

/// Parse a source file while attempting to recover from errors.
///
/// Returns a best-effort AST and a list of encountered `ParseError`s.
pub fn parse_source_with_recovery(
    src: &str,
    config: &ParseConfig,
) -> miette::Result<(cinder_ast::Program, Vec<ParseError>)> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new_with_config(&tokens, config);
    Ok(parser.parse_program_with_recovery())
}

pub fn parse_expr(src: &str) -> miette::Result<cinder_ast::Expr> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_expr_eof().into_diagnostic()
}

/// Parse a standalone type annotation such as `@R{I1, I2}`.
pub fn parse_type(src: &str) -> miette::Result<cinder_ast::TypeAnnotation> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_type_annotation_eof().into_diagnostic()
}

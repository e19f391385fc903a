#![forbid(unsafe_code)]

use std::mem;

use cinder_ast::{
    span_between, Argument, AssignStmt, BinOp, Block, CastKind, CompositeDecl, CompositeKind, Decl,
    DestroyStmt, EventDecl, Expr, ExprKind, FieldDecl, FunctionDecl, Ident, IfStmt, IfTest,
    InitializerDecl, InterfaceDecl, Members, NodeId, Param, Program, ReturnStmt, Span, Stmt,
    Transfer, TypeAnnotation, TypeExpr, TypeExprKind, UnaryOp, VariableDecl, VariableKind,
    WhileStmt,
};
use cinder_lex::{Token, TokenKind};

use crate::error::ParseError;
use crate::ParseConfig;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    config: ParseConfig,
    next_id: u32,
    expr_depth: usize,
    type_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::new_with_config(tokens, &ParseConfig::default())
    }

    pub fn new_with_config(tokens: &'a [Token], config: &ParseConfig) -> Self {
        Self {
            tokens,
            idx: 0,
            config: config.clone(),
            next_id: 0,
            expr_depth: 0,
            type_depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Semicolon) {
                self.next();
                continue;
            }
            decls.push(self.parse_decl()?);
        }
        Ok(Program { decls })
    }

    /// Parse a program while attempting to recover from errors.
    ///
    /// On a declaration parse error, tokens are skipped until the next token
    /// that can start a top-level declaration.
    pub fn parse_program_with_recovery(&mut self) -> (Program, Vec<ParseError>) {
        let mut decls = Vec::new();
        let mut errors = Vec::new();

        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Semicolon) {
                self.next();
                continue;
            }
            let start = self.idx;
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    errors.push(err);
                    self.recover_to_decl_boundary(start);
                }
            }
        }

        (Program { decls }, errors)
    }

    fn recover_to_decl_boundary(&mut self, start: usize) {
        self.expr_depth = 0;
        self.type_depth = 0;
        // Always make progress.
        if self.idx == start {
            self.next();
        }
        while !self.at(TokenKind::Eof) && !self.at_decl_start() {
            self.next();
        }
    }

    fn at_expr_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Int(_)
                    | TokenKind::String(_)
                    | TokenKind::Ident(_)
                    | TokenKind::KwTrue
                    | TokenKind::KwFalse
                    | TokenKind::KwNil
                    | TokenKind::KwCreate
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
            )
        )
    }

    fn at_decl_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::KwLet
                    | TokenKind::KwVar
                    | TokenKind::KwFun
                    | TokenKind::KwResource
                    | TokenKind::KwStruct
                    | TokenKind::KwContract
                    | TokenKind::KwEvent
                    | TokenKind::KwPub
                    | TokenKind::KwPriv
                    | TokenKind::KwAccess
            )
        )
    }

    fn parse_decl(&mut self) -> Result<Decl, ParseError> {
        self.skip_access_modifier()?;
        match self.peek_kind() {
            Some(TokenKind::KwResource | TokenKind::KwStruct | TokenKind::KwContract) => {
                self.parse_composite_or_interface()
            }
            Some(TokenKind::KwEvent) => Ok(Decl::Event(self.parse_event_decl()?)),
            Some(TokenKind::KwFun) => Ok(Decl::Function(self.parse_function_decl(true)?)),
            Some(TokenKind::KwLet | TokenKind::KwVar) => {
                Ok(Decl::Variable(self.parse_variable_decl()?))
            }
            _ => Err(self.error_here("expected declaration")),
        }
    }

    // `pub`, `priv` and `access(...)` are accepted and dropped.
    fn skip_access_modifier(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwPub | TokenKind::KwPriv) => {
                self.next();
            }
            Some(TokenKind::KwAccess) => {
                self.next();
                self.expect(TokenKind::LParen)?;
                while !self.at(TokenKind::RParen) {
                    if self.at(TokenKind::Eof) {
                        return Err(self.error_here("unexpected end of input in access modifier"));
                    }
                    self.next();
                }
                self.expect(TokenKind::RParen)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_composite_or_interface(&mut self) -> Result<Decl, ParseError> {
        let start = self.expect_any()?;
        let kind = match start.kind {
            TokenKind::KwResource => CompositeKind::Resource,
            TokenKind::KwStruct => CompositeKind::Structure,
            TokenKind::KwContract => CompositeKind::Contract,
            _ => {
                return Err(ParseError {
                    message: "expected `resource`, `struct` or `contract`".to_string(),
                    span: start.span,
                })
            }
        };

        if self.at(TokenKind::KwInterface) {
            self.next();
            let name = self.expect_ident()?;
            let (members, end) = self.parse_members()?;
            return Ok(Decl::Interface(InterfaceDecl {
                span: join(start.span, end),
                kind,
                name,
                members,
            }));
        }

        let name = self.expect_ident()?;
        let mut conformances = Vec::new();
        if self.at(TokenKind::Colon) {
            self.next();
            loop {
                conformances.push(self.expect_ident()?);
                if self.at(TokenKind::Comma) {
                    self.next();
                    continue;
                }
                break;
            }
        }
        let (members, end) = self.parse_members()?;
        Ok(Decl::Composite(CompositeDecl {
            span: join(start.span, end),
            kind,
            name,
            conformances,
            members,
        }))
    }

    fn parse_members(&mut self) -> Result<(Members, Span), ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut members = Members::default();
        loop {
            if self.at(TokenKind::RBrace) {
                break;
            }
            if self.at(TokenKind::Semicolon) {
                self.next();
                continue;
            }
            self.skip_access_modifier()?;
            match self.peek_kind() {
                Some(TokenKind::KwLet | TokenKind::KwVar) => {
                    members.fields.push(self.parse_field_decl()?);
                }
                Some(TokenKind::KwFun) => {
                    members.functions.push(self.parse_function_decl(false)?);
                }
                Some(TokenKind::KwInit) => {
                    members.initializers.push(self.parse_initializer()?);
                }
                Some(TokenKind::Eof) => return Err(self.error_here("unexpected end of input")),
                _ => return Err(self.error_here("expected member declaration")),
            }
        }
        let rb = self.expect(TokenKind::RBrace)?;
        Ok((members, rb.span))
    }

    fn parse_field_decl(&mut self) -> Result<FieldDecl, ParseError> {
        let start = self.expect_any()?;
        let kind = variable_kind(&start.kind);
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_annotation()?;
        Ok(FieldDecl {
            span: join(start.span, ty.span),
            kind,
            name,
            ty,
        })
    }

    fn parse_initializer(&mut self) -> Result<InitializerDecl, ParseError> {
        let start = self.expect(TokenKind::KwInit)?;
        let (params, params_end) = self.parse_params()?;
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        let end = body.as_ref().map(|b| b.span).unwrap_or(params_end);
        Ok(InitializerDecl {
            id: self.fresh_id(),
            span: join(start.span, end),
            params,
            body,
        })
    }

    fn parse_event_decl(&mut self) -> Result<EventDecl, ParseError> {
        let start = self.expect(TokenKind::KwEvent)?;
        let name = self.expect_ident()?;
        let (params, end) = self.parse_params()?;
        Ok(EventDecl {
            span: join(start.span, end),
            name,
            params,
        })
    }

    fn parse_function_decl(&mut self, require_body: bool) -> Result<FunctionDecl, ParseError> {
        let start = self.expect(TokenKind::KwFun)?;
        let name = self.expect_ident()?;
        let (params, params_end) = self.parse_params()?;
        let mut end = params_end;

        let return_type = if self.at(TokenKind::Colon) {
            self.next();
            let ty = self.parse_type_annotation()?;
            end = ty.span;
            Some(ty)
        } else {
            None
        };

        let body = if self.at(TokenKind::LBrace) {
            let block = self.parse_block()?;
            end = block.span;
            Some(block)
        } else if require_body {
            return Err(self.error_here("expected function body"));
        } else {
            None
        };

        Ok(FunctionDecl {
            id: self.fresh_id(),
            span: join(start.span, end),
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_params(&mut self) -> Result<(Vec<Param>, Span), ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let first = self.expect_ident()?;
            let (label, name) = if matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
                (Some(first), self.expect_ident()?)
            } else {
                (None, first)
            };
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type_annotation()?;
            let start = label.as_ref().map(|l| l.span).unwrap_or(name.span);
            params.push(Param {
                span: join(start, ty.span),
                label,
                name,
                ty,
            });
            if self.at(TokenKind::Comma) {
                self.next();
                continue;
            }
            break;
        }
        let rp = self.expect(TokenKind::RParen)?;
        Ok((params, rp.span))
    }

    fn parse_variable_decl(&mut self) -> Result<VariableDecl, ParseError> {
        let start = self.expect_any()?;
        if !matches!(start.kind, TokenKind::KwLet | TokenKind::KwVar) {
            return Err(ParseError {
                message: "expected `let` or `var`".to_string(),
                span: start.span,
            });
        }
        let kind = variable_kind(&start.kind);
        let name = self.expect_ident()?;
        let ty = if self.at(TokenKind::Colon) {
            self.next();
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let transfer = self.parse_transfer()?;
        let value = self.parse_expr()?;
        Ok(VariableDecl {
            span: join(start.span, value.span),
            kind,
            name,
            ty,
            transfer,
            value,
        })
    }

    fn parse_transfer(&mut self) -> Result<Transfer, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Eq) => {
                self.next();
                Ok(Transfer::Copy)
            }
            Some(TokenKind::LeftArrow) => {
                self.next();
                Ok(Transfer::Move)
            }
            _ => Err(self.error_here("expected transfer operator (`=` or `<-`)")),
        }
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let lb = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            if self.at(TokenKind::RBrace) {
                break;
            }
            if self.at(TokenKind::Semicolon) {
                self.next();
                continue;
            }
            if self.at(TokenKind::Eof) {
                return Err(self.error_here("unexpected end of input; expected `}`"));
            }
            stmts.push(self.parse_stmt()?);
        }
        let rb = self.expect(TokenKind::RBrace)?;
        Ok(Block {
            span: join(lb.span, rb.span),
            stmts,
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::KwLet | TokenKind::KwVar) => {
                Ok(Stmt::Variable(self.parse_variable_decl()?))
            }
            Some(TokenKind::KwReturn) => Ok(Stmt::Return(self.parse_return_stmt()?)),
            Some(TokenKind::KwDestroy) => {
                let start = self.expect(TokenKind::KwDestroy)?;
                let expr = self.parse_expr()?;
                Ok(Stmt::Destroy(DestroyStmt {
                    span: join(start.span, expr.span),
                    expr,
                }))
            }
            Some(TokenKind::KwIf) => Ok(Stmt::If(self.parse_if_stmt()?)),
            Some(TokenKind::KwWhile) => Ok(Stmt::While(self.parse_while_stmt()?)),
            _ => {
                let target = self.parse_expr()?;
                if self.at(TokenKind::Eq) || self.at(TokenKind::LeftArrow) {
                    let transfer = self.parse_transfer()?;
                    let value = self.parse_expr()?;
                    return Ok(Stmt::Assign(AssignStmt {
                        span: join(target.span, value.span),
                        target,
                        transfer,
                        value,
                    }));
                }
                Ok(Stmt::Expr(target))
            }
        }
    }

    fn parse_return_stmt(&mut self) -> Result<ReturnStmt, ParseError> {
        let start = self.expect(TokenKind::KwReturn)?;
        let ends_here = matches!(
            self.peek_kind(),
            Some(
                TokenKind::RBrace
                    | TokenKind::Semicolon
                    | TokenKind::Eof
                    | TokenKind::KwLet
                    | TokenKind::KwVar
                    | TokenKind::KwReturn
                    | TokenKind::KwIf
                    | TokenKind::KwWhile
                    | TokenKind::KwDestroy
            )
        );
        if ends_here {
            return Ok(ReturnStmt {
                span: start.span,
                value: None,
            });
        }
        let value = self.parse_expr()?;
        Ok(ReturnStmt {
            span: join(start.span, value.span),
            value: Some(value),
        })
    }

    fn parse_if_stmt(&mut self) -> Result<IfStmt, ParseError> {
        let start = self.expect(TokenKind::KwIf)?;
        let test = if self.at(TokenKind::KwLet) || self.at(TokenKind::KwVar) {
            IfTest::Binding(self.parse_variable_decl()?)
        } else {
            IfTest::Expr(self.parse_expr()?)
        };
        let then_block = self.parse_block()?;
        let mut end = then_block.span;

        let else_block = if self.at(TokenKind::KwElse) {
            self.next();
            let block = if self.at(TokenKind::KwIf) {
                let nested = self.parse_if_stmt()?;
                Block {
                    span: nested.span,
                    stmts: vec![Stmt::If(nested)],
                }
            } else {
                self.parse_block()?
            };
            end = block.span;
            Some(block)
        } else {
            None
        };

        Ok(IfStmt {
            span: join(start.span, end),
            test,
            then_block,
            else_block,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<WhileStmt, ParseError> {
        let start = self.expect(TokenKind::KwWhile)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(WhileStmt {
            span: join(start.span, body.span),
            cond,
            body,
        })
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.expr_depth += 1;
        if self.expr_depth > self.config.max_expression_depth {
            return Err(self.error_here(&format!(
                "program too complex, reached max expression depth limit {}",
                self.config.max_expression_depth
            )));
        }
        let expr = self.parse_or_expr();
        self.expr_depth -= 1;
        expr
    }

    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        if !self.at(TokenKind::Eof) {
            return Err(self.error_here("expected end of input"));
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at(TokenKind::OrOr) {
            self.next();
            let right = self.parse_and_expr()?;
            left = self.binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cmp_expr()?;
        while self.at(TokenKind::AndAnd) {
            self.next();
            let right = self.parse_cmp_expr()?;
            left = self.binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_nil_coalescing_expr()?;
        let Some(op) = self.peek_kind().and_then(comparison_op) else {
            return Ok(left);
        };
        self.next();
        let right = self.parse_nil_coalescing_expr()?;
        let expr = self.binary(left, op, right);

        // `a < b < c` needs explicit parentheses.
        if self.peek_kind().and_then(comparison_op).is_some() {
            let span = self.peek_span().unwrap_or(expr.span);
            return Err(ParseError {
                message: "chained comparisons are not supported; use parentheses or boolean operators".to_string(),
                span,
            });
        }

        Ok(expr)
    }

    fn parse_nil_coalescing_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        if !self.at(TokenKind::QuestionQuestion) {
            return Ok(left);
        }
        self.next();
        // Right-associative.
        let right = self.parse_nil_coalescing_expr()?;
        Ok(self.binary(left, BinOp::NilCoalesce, right))
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_mul_expr()?;
            left = self.binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cast_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            self.next();
            let right = self.parse_cast_expr()?;
            left = self.binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_cast_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary_expr()?;
        loop {
            let kind = match self.peek_kind() {
                Some(TokenKind::KwAs) => CastKind::Static,
                Some(TokenKind::KwAsOptional) => CastKind::Dynamic,
                Some(TokenKind::KwAsForce) => CastKind::ForceDynamic,
                _ => break,
            };
            self.next();
            let ty = self.parse_type_annotation()?;
            let span = join(expr.span, ty.span);
            expr = self.mk_expr(
                span,
                ExprKind::Cast {
                    expr: Box::new(expr),
                    kind,
                    ty,
                },
            );
        }
        Ok(expr)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Bang) => Some(UnaryOp::Not),
            Some(TokenKind::LeftArrow) => Some(UnaryOp::Move),
            Some(TokenKind::Amp) => return self.parse_reference_expr(),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix_expr();
        };
        let Some(t) = self.next() else {
            return Err(self.error_here("unexpected end of input"));
        };
        let expr = self.parse_unary_expr()?;
        let span = join(t.span, expr.span);
        Ok(self.mk_expr(
            span,
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
        ))
    }

    // `&e as auth &T`
    fn parse_reference_expr(&mut self) -> Result<Expr, ParseError> {
        let amp = self.expect(TokenKind::Amp)?;
        let expr = self.parse_postfix_expr()?;
        self.expect(TokenKind::KwAs)?;
        let ty = self.parse_type_annotation()?;
        let span = join(amp.span, ty.span);
        Ok(self.mk_expr(
            span,
            ExprKind::Reference {
                expr: Box::new(expr),
                ty,
            },
        ))
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.next();
                    let member = self.expect_ident()?;
                    let span = join(expr.span, member.span);
                    expr = self.mk_expr(
                        span,
                        ExprKind::Member {
                            base: Box::new(expr),
                            member,
                        },
                    );
                }
                Some(TokenKind::LParen) => {
                    self.next();
                    let args = self.parse_args()?;
                    let rp = self.expect(TokenKind::RParen)?;
                    let span = join(expr.span, rp.span);
                    expr = self.mk_expr(
                        span,
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                    );
                }
                Some(TokenKind::LBracket) => {
                    self.next();
                    let index = self.parse_expr()?;
                    let rb = self.expect(TokenKind::RBracket)?;
                    let span = join(expr.span, rb.span);
                    expr = self.mk_expr(
                        span,
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                Some(TokenKind::Bang) => {
                    let Some(bang) = self.next() else { break };
                    let span = join(expr.span, bang.span);
                    expr = self.mk_expr(span, ExprKind::ForceUnwrap(Box::new(expr)));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            let label = if matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
                && matches!(self.peek_kind_n(1), Some(TokenKind::Colon))
            {
                let label = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                Some(label)
            } else {
                None
            };
            let value = self.parse_expr()?;
            let start = label.as_ref().map(|l| l.span).unwrap_or(value.span);
            args.push(Argument {
                span: join(start, value.span),
                label,
                value,
            });
            if self.at(TokenKind::Comma) {
                self.next();
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        if !self.at_expr_start() {
            return Err(self.error_here("expected expression"));
        }
        let tok = self.expect_any()?;
        let kind = match tok.kind {
            TokenKind::Int(n) => ExprKind::IntLit(n),
            TokenKind::String(s) => ExprKind::StringLit(s),
            TokenKind::KwTrue => ExprKind::BoolLit(true),
            TokenKind::KwFalse => ExprKind::BoolLit(false),
            TokenKind::KwNil => ExprKind::Nil,
            TokenKind::Ident(name) => ExprKind::Ident(Ident {
                span: tok.span,
                node: name,
            }),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let rp = self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    span: join(tok.span, rp.span),
                    ..inner
                });
            }
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    elements.push(self.parse_expr()?);
                    if self.at(TokenKind::Comma) {
                        self.next();
                        continue;
                    }
                    break;
                }
                let rb = self.expect(TokenKind::RBracket)?;
                return Ok(self.mk_expr(join(tok.span, rb.span), ExprKind::Array(elements)));
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if self.at(TokenKind::Comma) {
                        self.next();
                        continue;
                    }
                    break;
                }
                let rb = self.expect(TokenKind::RBrace)?;
                return Ok(self.mk_expr(join(tok.span, rb.span), ExprKind::Dictionary(entries)));
            }
            TokenKind::KwCreate => {
                let call = self.parse_postfix_expr()?;
                let span = join(tok.span, call.span);
                return Ok(self.mk_expr(span, ExprKind::Create(Box::new(call))));
            }
            _ => {
                return Err(ParseError {
                    message: "expected expression".to_string(),
                    span: tok.span,
                })
            }
        };
        Ok(self.mk_expr(tok.span, kind))
    }

    pub fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        let start = self.peek_span().unwrap_or_else(|| span_between(0, 0));
        let is_resource = if self.at(TokenKind::At) {
            self.next();
            true
        } else {
            false
        };
        let ty = self.parse_type()?;
        Ok(TypeAnnotation {
            span: join(start, ty.span),
            is_resource,
            ty,
        })
    }

    pub fn parse_type_annotation_eof(&mut self) -> Result<TypeAnnotation, ParseError> {
        let ty = self.parse_type_annotation()?;
        if !self.at(TokenKind::Eof) {
            return Err(self.error_here("expected end of input"));
        }
        Ok(ty)
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        self.type_depth += 1;
        if self.type_depth > self.config.max_type_depth {
            return Err(self.error_here(&format!(
                "program too complex, reached max type depth limit {}",
                self.config.max_type_depth
            )));
        }
        let ty = self.parse_optional_type();
        self.type_depth -= 1;
        ty
    }

    fn parse_optional_type(&mut self) -> Result<TypeExpr, ParseError> {
        let mut ty = self.parse_type_primary()?;
        loop {
            let nesting = match self.peek_kind() {
                Some(TokenKind::Question) => 1,
                Some(TokenKind::QuestionQuestion) => 2,
                _ => break,
            };
            let Some(q) = self.next() else { break };
            for _ in 0..nesting {
                ty = TypeExpr {
                    span: join(ty.span, q.span),
                    kind: TypeExprKind::Optional(Box::new(ty)),
                };
            }
        }
        Ok(ty)
    }

    fn parse_type_primary(&mut self) -> Result<TypeExpr, ParseError> {
        match self.peek_kind() {
            // Nested resource markers, e.g. `[@R]`.
            Some(TokenKind::At) => {
                self.next();
                self.parse_type_primary()
            }
            Some(TokenKind::Amp) => self.parse_reference_type(None),
            Some(TokenKind::Ident(name))
                if name == "auth" && matches!(self.peek_kind_n(1), Some(TokenKind::Amp)) =>
            {
                let auth = self.expect_ident()?;
                self.parse_reference_type(Some(auth.span))
            }
            Some(TokenKind::Ident(name)) if name == "Capability" => {
                let ident = self.expect_ident()?;
                if !self.at(TokenKind::Lt) {
                    return Ok(TypeExpr {
                        span: ident.span,
                        kind: TypeExprKind::Capability(None),
                    });
                }
                self.next();
                let borrow = self.parse_type()?;
                let gt = self.expect(TokenKind::Gt)?;
                Ok(TypeExpr {
                    span: join(ident.span, gt.span),
                    kind: TypeExprKind::Capability(Some(Box::new(borrow))),
                })
            }
            Some(TokenKind::Ident(_)) => {
                let ident = self.expect_ident()?;
                let nominal = TypeExpr {
                    span: ident.span,
                    kind: TypeExprKind::Nominal(ident),
                };
                if !self.at_restriction_list() {
                    return Ok(nominal);
                }
                let (restrictions, end) = self.parse_restriction_list()?;
                Ok(TypeExpr {
                    span: join(nominal.span, end),
                    kind: TypeExprKind::Restricted {
                        base: Some(Box::new(nominal)),
                        restrictions,
                    },
                })
            }
            Some(TokenKind::LBrace) => {
                if self.at_restriction_list() {
                    let start = self.peek_span().unwrap_or_else(|| span_between(0, 0));
                    let (restrictions, end) = self.parse_restriction_list()?;
                    return Ok(TypeExpr {
                        span: join(start, end),
                        kind: TypeExprKind::Restricted {
                            base: None,
                            restrictions,
                        },
                    });
                }
                let lb = self.expect(TokenKind::LBrace)?;
                let key = self.parse_type()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_type()?;
                let rb = self.expect(TokenKind::RBrace)?;
                Ok(TypeExpr {
                    span: join(lb.span, rb.span),
                    kind: TypeExprKind::Dictionary {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                })
            }
            Some(TokenKind::LBracket) => {
                let lb = self.expect(TokenKind::LBracket)?;
                let element = Box::new(self.parse_type()?);
                if self.at(TokenKind::Semicolon) {
                    self.next();
                    let size_tok = self.expect_any()?;
                    let size = match size_tok.kind {
                        TokenKind::Int(n) => u64::try_from(&n).map_err(|_| ParseError {
                            message: "array size is too large".to_string(),
                            span: size_tok.span,
                        })?,
                        _ => {
                            return Err(ParseError {
                                message: "expected constant array size".to_string(),
                                span: size_tok.span,
                            })
                        }
                    };
                    let rb = self.expect(TokenKind::RBracket)?;
                    return Ok(TypeExpr {
                        span: join(lb.span, rb.span),
                        kind: TypeExprKind::ConstantSized { element, size },
                    });
                }
                let rb = self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr {
                    span: join(lb.span, rb.span),
                    kind: TypeExprKind::VariableSized(element),
                })
            }
            Some(TokenKind::LParen) => {
                let lp = self.expect(TokenKind::LParen)?;
                if !self.at(TokenKind::LParen) {
                    // Parenthesized type.
                    let inner = self.parse_type()?;
                    let rp = self.expect(TokenKind::RParen)?;
                    return Ok(TypeExpr {
                        span: join(lp.span, rp.span),
                        kind: inner.kind,
                    });
                }
                self.next();
                let mut params = Vec::new();
                while !self.at(TokenKind::RParen) {
                    if self.at(TokenKind::At) {
                        self.next();
                    }
                    params.push(self.parse_type()?);
                    if self.at(TokenKind::Comma) {
                        self.next();
                        continue;
                    }
                    break;
                }
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Colon)?;
                if self.at(TokenKind::At) {
                    self.next();
                }
                let return_type = Box::new(self.parse_type()?);
                let rp = self.expect(TokenKind::RParen)?;
                Ok(TypeExpr {
                    span: join(lp.span, rp.span),
                    kind: TypeExprKind::Function {
                        params,
                        return_type,
                    },
                })
            }
            _ => Err(self.error_here("expected type")),
        }
    }

    fn parse_reference_type(&mut self, auth: Option<Span>) -> Result<TypeExpr, ParseError> {
        let amp = self.expect(TokenKind::Amp)?;
        let referenced = self.parse_type_primary()?;
        let start = auth.unwrap_or(amp.span);
        Ok(TypeExpr {
            span: join(start, referenced.span),
            kind: TypeExprKind::Reference {
                authorized: auth.is_some(),
                referenced: Box::new(referenced),
            },
        })
    }

    /// A brace after a type is a restriction set only if it holds a plain
    /// identifier list, so `as? @R { return <-r }` still parses as a block.
    fn at_restriction_list(&self) -> bool {
        if !self.at(TokenKind::LBrace) {
            return false;
        }
        let mut n = 1;
        if matches!(self.peek_kind_n(n), Some(TokenKind::RBrace)) {
            return true;
        }
        loop {
            if !matches!(self.peek_kind_n(n), Some(TokenKind::Ident(_))) {
                return false;
            }
            n += 1;
            match self.peek_kind_n(n) {
                Some(TokenKind::RBrace) => return true,
                Some(TokenKind::Comma) => n += 1,
                _ => return false,
            }
        }
    }

    fn parse_restriction_list(&mut self) -> Result<(Vec<Ident>, Span), ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut restrictions = Vec::new();
        while !self.at(TokenKind::RBrace) {
            restrictions.push(self.expect_ident()?);
            if self.at(TokenKind::Comma) {
                self.next();
                continue;
            }
            break;
        }
        let rb = self.expect(TokenKind::RBrace)?;
        Ok((restrictions, rb.span))
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn mk_expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        let id = self.fresh_id();
        Expr { id, span, kind }
    }

    fn binary(&mut self, left: Expr, op: BinOp, right: Expr) -> Expr {
        let span = join(left.span, right.span);
        self.mk_expr(
            span,
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        )
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            span: self.peek_span().unwrap_or_else(|| span_between(0, 0)),
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.expect_any()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok(Ident {
                span: tok.span,
                node: name,
            }),
            _ => Err(ParseError {
                message: "expected identifier".to_string(),
                span: tok.span,
            }),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParseError> {
        let tok = self.expect_any()?;
        if mem::discriminant(&tok.kind) == mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError {
                message: format!("expected {expected:?}"),
                span: tok.span,
            })
        }
    }

    fn expect_any(&mut self) -> Result<Token, ParseError> {
        self.next().ok_or_else(|| ParseError {
            message: "unexpected end of input".to_string(),
            span: span_between(0, 0),
        })
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind()
            .is_some_and(|k| mem::discriminant(k) == mem::discriminant(&kind))
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.idx)?.clone();
        // Never step past the trailing Eof.
        if !matches!(tok.kind, TokenKind::Eof) {
            self.idx += 1;
        }
        Some(tok)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.idx).map(|t| &t.kind)
    }

    fn peek_kind_n(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.idx + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.idx).map(|t| t.span)
    }
}

fn variable_kind(kind: &TokenKind) -> VariableKind {
    if matches!(kind, TokenKind::KwVar) {
        VariableKind::Variable
    } else {
        VariableKind::Constant
    }
}

fn comparison_op(kind: &TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::EqEq => Some(BinOp::Eq),
        TokenKind::Neq => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::Le => Some(BinOp::Le),
        TokenKind::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn join(a: Span, b: Span) -> Span {
    let a0: usize = a.offset();
    let b0: usize = b.offset();
    let b1 = b0 + b.len();
    if b0 >= a0 {
        span_between(a0, b1.max(a0 + a.len()))
    } else {
        let a1 = a0 + a.len();
        span_between(b0, a1)
    }
}

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cinder_ast::{
    Argument, AssignStmt, BigUint, BinOp, Block, CastKind, CompositeDecl, CompositeKind, Decl,
    Expr, ExprKind, FunctionDecl, Ident, IfStmt, IfTest, InitializerDecl, InterfaceDecl, Members,
    NodeId, Param, Program, ReturnStmt, Span, Stmt, UnaryOp, VariableDecl,
};
use tracing::debug;

use crate::builtins;
use crate::cast::check_cast;
use crate::config::CheckerConfig;
use crate::elaboration::{CastRecord, Elaboration};
use crate::error::{CheckerError, ErrorKind, SemanticError};
use crate::location::TypeId;
use crate::subtype::is_subtype;
use crate::types::{
    CompositeType, FunctionType, InterfaceSet, InterfaceType, Parameter, PrimitiveType, Type,
};

/// Checks one program against its declarations.
///
/// Declarations are collected in passes before any body is checked:
/// interfaces, then composites and events, then members and signatures.
/// Global variables and function bodies are then checked in source order.
pub struct Checker {
    config: CheckerConfig,
    /// Declared composites and interfaces by name.
    types: HashMap<String, Type>,
    members: HashMap<TypeId, HashMap<String, Type>>,
    /// Globals that construct a composite when called.
    constructors: HashMap<String, Arc<CompositeType>>,
    /// Converted signatures of functions and initializers.
    signatures: HashMap<NodeId, Arc<FunctionType>>,
    /// Value scopes; the first one holds the globals.
    scopes: Vec<HashMap<String, Type>>,
    return_types: Vec<Type>,
    in_create: bool,
    elaboration: Elaboration,
    errors: Vec<SemanticError>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        let mut globals = HashMap::new();
        for constructor in builtins::runtime_type_constructors() {
            globals.insert(constructor.name.to_string(), constructor.ty());
        }

        Self {
            config,
            types: HashMap::new(),
            members: HashMap::new(),
            constructors: HashMap::new(),
            signatures: HashMap::new(),
            scopes: vec![globals],
            return_types: Vec::new(),
            in_create: false,
            elaboration: Elaboration::new(),
            errors: Vec::new(),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Type of a global value (variable, function, constructor or contract).
    pub fn global_value(&self, name: &str) -> Option<&Type> {
        self.scopes.first().and_then(|globals| globals.get(name))
    }

    /// A declared composite or interface type.
    pub fn global_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn elaboration(&self) -> &Elaboration {
        &self.elaboration
    }

    /// Diagnostics reported so far and not yet returned by `check_program`.
    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(SemanticError::kind).collect()
    }

    pub fn check_program(&mut self, program: &Program) -> Result<(), CheckerError> {
        debug!(
            decls = program.decls.len(),
            location = %self.config.location,
            "checking program"
        );

        self.declare_interfaces(program);
        self.declare_composites(program);
        self.declare_members(program);

        for decl in &program.decls {
            match decl {
                Decl::Variable(var) => self.check_variable_decl(var),
                Decl::Function(function) => self.check_function(function, None),
                Decl::Composite(composite) => self.check_composite_bodies(composite),
                Decl::Interface(interface) => self.check_interface_bodies(interface),
                Decl::Event(_) => {}
            }
        }

        if self.errors.is_empty() {
            debug!("program checked");
            Ok(())
        } else {
            let errors = std::mem::take(&mut self.errors);
            debug!(errors = errors.len(), "program rejected");
            Err(CheckerError { errors })
        }
    }

    pub(crate) fn report(&mut self, error: SemanticError) {
        self.errors.push(error);
    }

    pub(crate) fn declared_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }

    // ----- declaration passes -----

    fn declare_interfaces(&mut self, program: &Program) {
        for decl in &program.decls {
            let Decl::Interface(interface) = decl else {
                continue;
            };
            debug!(name = %interface.name.node, kind = interface.kind.keyword(), "declare interface");
            let ty = Type::Interface(Arc::new(InterfaceType::new(
                self.config.location.clone(),
                interface.name.node.clone(),
                interface.kind,
            )));
            self.declare_type(&interface.name, ty);
        }
    }

    fn declare_composites(&mut self, program: &Program) {
        for decl in &program.decls {
            let (name, kind, conformances) = match decl {
                Decl::Composite(composite) => (
                    &composite.name,
                    composite.kind,
                    composite.conformances.as_slice(),
                ),
                Decl::Event(event) => (&event.name, CompositeKind::Event, &[][..]),
                _ => continue,
            };
            debug!(name = %name.node, kind = kind.keyword(), "declare composite");

            let mut set = InterfaceSet::new();
            for conformance in conformances {
                match self.types.get(&conformance.node) {
                    Some(Type::Interface(interface)) => {
                        set.insert(interface.clone());
                    }
                    _ => self.report(SemanticError::UnknownType {
                        name: conformance.node.clone(),
                        span: conformance.span,
                    }),
                }
            }

            let ty = Type::Composite(Arc::new(CompositeType::new(
                self.config.location.clone(),
                name.node.clone(),
                kind,
                set,
            )));
            self.declare_type(name, ty);
        }
    }

    fn declare_type(&mut self, name: &Ident, ty: Type) {
        if self.types.contains_key(&name.node) || builtins::base_type(&name.node).is_some() {
            self.report(SemanticError::DuplicateDeclaration {
                name: name.node.clone(),
                span: name.span,
            });
            return;
        }
        self.types.insert(name.node.clone(), ty);
    }

    fn declare_members(&mut self, program: &Program) {
        // Redeclared types were already reported; only the first one gets members.
        let mut seen = HashSet::new();
        for decl in &program.decls {
            let type_name = match decl {
                Decl::Interface(interface) => Some(&interface.name.node),
                Decl::Composite(composite) => Some(&composite.name.node),
                Decl::Event(event) => Some(&event.name.node),
                Decl::Function(_) | Decl::Variable(_) => None,
            };
            if type_name.is_some_and(|name| !seen.insert(name.as_str())) {
                continue;
            }

            match decl {
                Decl::Interface(interface) => {
                    if let Some(Type::Interface(ty)) = self.types.get(&interface.name.node) {
                        let id = ty.id().to_string();
                        self.declare_member_table(id, &interface.members);
                    }
                }
                Decl::Composite(composite) => self.declare_composite_members(composite),
                Decl::Event(event) => {
                    let Some(Type::Composite(ty)) = self.types.get(&event.name.node).cloned() else {
                        continue;
                    };
                    let signature =
                        self.convert_signature(&event.params, Type::Composite(ty.clone()));
                    self.declare_constructor(&event.name, ty, signature);
                }
                Decl::Function(function) => {
                    let signature = self.convert_function_signature(function);
                    self.declare_global(&function.name, Type::Function(signature));
                }
                Decl::Variable(_) => {}
            }
        }
    }

    fn declare_composite_members(&mut self, composite: &CompositeDecl) {
        let Some(Type::Composite(ty)) = self.types.get(&composite.name.node).cloned() else {
            return;
        };
        self.declare_member_table(ty.id().to_string(), &composite.members);

        if composite.kind == CompositeKind::Contract {
            self.declare_global(&composite.name, Type::Composite(ty));
            return;
        }

        let signature = match composite.members.initializers.first() {
            Some(init) => self.convert_initializer_signature(init, &ty),
            None => Arc::new(FunctionType::new(Vec::new(), Type::Composite(ty.clone()))),
        };
        for extra in composite.members.initializers.iter().skip(1) {
            self.report(SemanticError::DuplicateDeclaration {
                name: "init".to_string(),
                span: extra.span,
            });
        }
        self.declare_constructor(&composite.name, ty, signature);
    }

    fn declare_member_table(&mut self, id: TypeId, members: &Members) {
        let mut table = HashMap::new();
        for field in &members.fields {
            let ty = self.convert_annotation(&field.ty);
            if table.insert(field.name.node.clone(), ty).is_some() {
                self.report(SemanticError::DuplicateDeclaration {
                    name: field.name.node.clone(),
                    span: field.name.span,
                });
            }
        }
        for function in &members.functions {
            let signature = self.convert_function_signature(function);
            if table
                .insert(function.name.node.clone(), Type::Function(signature))
                .is_some()
            {
                self.report(SemanticError::DuplicateDeclaration {
                    name: function.name.node.clone(),
                    span: function.name.span,
                });
            }
        }
        self.members.insert(id, table);
    }

    fn declare_constructor(
        &mut self,
        name: &Ident,
        composite: Arc<CompositeType>,
        signature: Arc<FunctionType>,
    ) {
        self.constructors.insert(name.node.clone(), composite);
        self.declare_global(name, Type::Function(signature));
    }

    fn declare_global(&mut self, name: &Ident, ty: Type) {
        if let Some(globals) = self.scopes.first_mut() {
            if globals.contains_key(&name.node) {
                self.errors.push(SemanticError::DuplicateDeclaration {
                    name: name.node.clone(),
                    span: name.span,
                });
                return;
            }
            globals.insert(name.node.clone(), ty);
        }
    }

    fn convert_function_signature(&mut self, function: &FunctionDecl) -> Arc<FunctionType> {
        let return_type = match &function.return_type {
            Some(annotation) => self.convert_annotation(annotation),
            None => Type::VOID,
        };
        let signature = self.convert_signature(&function.params, return_type);
        self.signatures.insert(function.id, signature.clone());
        signature
    }

    fn convert_initializer_signature(
        &mut self,
        init: &InitializerDecl,
        composite: &Arc<CompositeType>,
    ) -> Arc<FunctionType> {
        let signature = self.convert_signature(&init.params, Type::VOID);
        self.signatures.insert(init.id, signature.clone());
        Arc::new(FunctionType::new(
            signature.parameters.clone(),
            Type::Composite(composite.clone()),
        ))
    }

    /// Parameter annotations are converted once; bodies reuse them through `signatures`.
    fn convert_signature(&mut self, params: &[Param], return_type: Type) -> Arc<FunctionType> {
        let parameters = params
            .iter()
            .map(|param| Parameter {
                label: param.argument_label().map(str::to_string),
                identifier: param.name.node.clone(),
                ty: self.convert_annotation(&param.ty),
            })
            .collect();
        Arc::new(FunctionType::new(parameters, return_type))
    }

    // ----- bodies -----

    fn check_composite_bodies(&mut self, composite: &CompositeDecl) {
        let Some(self_ty) = self.types.get(&composite.name.node).cloned() else {
            return;
        };
        debug!(name = %composite.name.node, "check composite bodies");
        for init in &composite.members.initializers {
            if let Some(body) = &init.body {
                self.check_body(&init.params, init.id, body, Some(&self_ty), Type::VOID);
            }
        }
        for function in &composite.members.functions {
            self.check_function(function, Some(&self_ty));
        }
    }

    fn check_interface_bodies(&mut self, interface: &InterfaceDecl) {
        let Some(self_ty) = self.types.get(&interface.name.node).cloned() else {
            return;
        };
        for function in &interface.members.functions {
            self.check_function(function, Some(&self_ty));
        }
    }

    fn check_function(&mut self, function: &FunctionDecl, self_ty: Option<&Type>) {
        let Some(body) = &function.body else {
            return;
        };
        debug!(name = %function.name.node, "check function");
        let return_type = self
            .signatures
            .get(&function.id)
            .map(|s| s.return_type.clone())
            .unwrap_or(Type::Invalid);
        self.check_body(&function.params, function.id, body, self_ty, return_type);
    }

    fn check_body(
        &mut self,
        params: &[Param],
        id: NodeId,
        body: &Block,
        self_ty: Option<&Type>,
        return_type: Type,
    ) {
        let parameter_types: Vec<Type> = match self.signatures.get(&id) {
            Some(signature) => signature.parameters.iter().map(|p| p.ty.clone()).collect(),
            None => vec![Type::Invalid; params.len()],
        };

        self.push_scope();
        if let Some(self_ty) = self_ty {
            self.bind_local("self", self_ty.clone());
        }
        for (param, ty) in params.iter().zip(parameter_types) {
            self.declare_local(&param.name, ty);
        }
        self.return_types.push(return_type);
        self.check_stmts(&body.stmts);
        self.return_types.pop();
        self.pop_scope();
    }

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        self.check_stmts(&block.stmts);
        self.pop_scope();
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Variable(var) => self.check_variable_decl(var),
            Stmt::Assign(assign) => self.check_assign(assign),
            Stmt::Return(ret) => self.check_return(ret),
            Stmt::Destroy(destroy) => {
                self.check_expr(&destroy.expr, None);
            }
            Stmt::If(if_stmt) => self.check_if(if_stmt),
            Stmt::While(while_stmt) => {
                let cond = self.check_expr(&while_stmt.cond, Some(&Type::BOOL));
                self.expect_subtype(&cond, &Type::BOOL, while_stmt.cond.span);
                self.check_block(&while_stmt.body);
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr, None);
            }
        }
    }

    fn check_variable_decl(&mut self, var: &VariableDecl) {
        let annotation = var.ty.as_ref().map(|ty| self.convert_annotation(ty));
        let value = self.check_expr(&var.value, annotation.as_ref());
        let ty = match annotation {
            Some(annotation) => {
                self.expect_subtype(&value, &annotation, var.value.span);
                annotation
            }
            None => value,
        };
        self.declare_local(&var.name, ty);
    }

    fn check_assign(&mut self, assign: &AssignStmt) {
        let target = self.check_expr(&assign.target, None);
        let value = self.check_expr(&assign.value, Some(&target));
        self.expect_subtype(&value, &target, assign.value.span);
    }

    fn check_return(&mut self, ret: &ReturnStmt) {
        let expected = self.return_types.last().cloned().unwrap_or(Type::VOID);
        match &ret.value {
            Some(value) => {
                let actual = self.check_expr(value, Some(&expected));
                self.expect_subtype(&actual, &expected, value.span);
            }
            None => self.expect_subtype(&Type::VOID, &expected, ret.span),
        }
    }

    fn check_if(&mut self, if_stmt: &IfStmt) {
        match &if_stmt.test {
            IfTest::Expr(test) => {
                let ty = self.check_expr(test, Some(&Type::BOOL));
                self.expect_subtype(&ty, &Type::BOOL, test.span);
                self.check_block(&if_stmt.then_block);
            }
            IfTest::Binding(binding) => {
                let annotation = binding.ty.as_ref().map(|ty| self.convert_annotation(ty));
                let expected = annotation.clone().map(Type::optional);
                let value = self.check_expr(&binding.value, expected.as_ref());

                let bound = match &value {
                    Type::Optional(inner) => {
                        let inner = inner.as_ref().clone();
                        match annotation {
                            Some(annotation) => {
                                self.expect_subtype(&inner, &annotation, binding.value.span);
                                annotation
                            }
                            None => inner,
                        }
                    }
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.report(SemanticError::TypeMismatch {
                            expected: Type::optional(other.clone()),
                            actual: other.clone(),
                            span: binding.value.span,
                        });
                        other.clone()
                    }
                };

                self.push_scope();
                self.declare_local(&binding.name, bound);
                self.check_stmts(&if_stmt.then_block.stmts);
                self.pop_scope();
            }
        }

        if let Some(else_block) = &if_stmt.else_block {
            self.check_block(else_block);
        }
    }

    // ----- expressions -----

    /// Check `expr`, record its type and return it. `expected` only guides
    /// literals; compatibility is checked by the caller.
    pub(crate) fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        let ty = self.infer_expr(expr, expected);
        self.elaboration.record_expression_type(expr.id, ty.clone());
        ty
    }

    fn infer_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::IntLit(value) => self.check_integer_literal(value, false, expr.span, expected),
            ExprKind::StringLit(value) => {
                let wants_character = matches!(
                    expected.map(unwrap_optional),
                    Some(Type::Primitive(PrimitiveType::Character))
                );
                if wants_character && value.chars().count() == 1 {
                    Type::Primitive(PrimitiveType::Character)
                } else {
                    Type::STRING
                }
            }
            ExprKind::BoolLit(_) => Type::BOOL,
            ExprKind::Nil => Type::optional(Type::Never),
            ExprKind::Ident(name) => self.check_identifier(name),
            ExprKind::Array(elements) => self.check_array_literal(elements, expected),
            ExprKind::Dictionary(entries) => self.check_dictionary_literal(entries, expected),
            ExprKind::Unary { op, expr: operand } => {
                self.check_unary(*op, operand, expr.span, expected)
            }
            ExprKind::Binary { left, op, right } => self.check_binary(left, *op, right, expected),
            ExprKind::Member { base, member } => {
                let base_ty = self.check_expr(base, None);
                self.member_type(&base_ty, member)
            }
            ExprKind::Index { base, index } => self.check_index(base, index),
            ExprKind::Call { callee, args } => self.check_call(callee, args, expr.span),
            ExprKind::ForceUnwrap(inner) => {
                let expected = expected.cloned().map(Type::optional);
                match self.check_expr(inner, expected.as_ref()) {
                    Type::Optional(ty) => *ty,
                    Type::Invalid => Type::Invalid,
                    ty => {
                        self.report(SemanticError::TypeMismatch {
                            expected: Type::optional(ty.clone()),
                            actual: ty.clone(),
                            span: inner.span,
                        });
                        ty
                    }
                }
            }
            ExprKind::Cast { expr: inner, kind, ty } => {
                let target = self.convert_annotation(ty);
                self.check_cast_expr(expr, inner, *kind, target)
            }
            ExprKind::Reference { expr: inner, ty } => {
                let ty = self.convert_annotation(ty);
                self.check_reference(expr, inner, ty)
            }
            ExprKind::Create(call) => self.check_create(call),
        }
    }

    fn check_integer_literal(
        &mut self,
        magnitude: &BigUint,
        negative: bool,
        span: Span,
        expected: Option<&Type>,
    ) -> Type {
        let primitive = match expected.map(unwrap_optional) {
            Some(Type::Primitive(p))
                if p.is_integer()
                    || matches!(p, PrimitiveType::Number | PrimitiveType::SignedNumber) =>
            {
                *p
            }
            _ => PrimitiveType::Int,
        };

        if !primitive.admits_integer_literal(magnitude, negative) {
            let (min, max) = primitive
                .integer_bounds()
                .unwrap_or_else(|| ("0".to_string(), "unbounded".to_string()));
            self.report(SemanticError::InvalidIntegerLiteralRange {
                ty: Type::Primitive(primitive),
                min,
                max,
                span,
            });
        }
        Type::Primitive(primitive)
    }

    fn check_identifier(&mut self, name: &Ident) -> Type {
        match self.lookup(&name.node) {
            Some(ty) => ty,
            None => {
                self.report(SemanticError::NotDeclared {
                    name: name.node.clone(),
                    span: name.span,
                });
                Type::Invalid
            }
        }
    }

    fn check_array_literal(&mut self, elements: &[Expr], expected: Option<&Type>) -> Type {
        match expected.map(unwrap_optional) {
            Some(Type::VariableSizedArray(element)) => {
                self.check_elements(elements, element);
                Type::VariableSizedArray(element.clone())
            }
            Some(Type::ConstantSizedArray { element, .. }) => {
                self.check_elements(elements, element);
                Type::ConstantSizedArray {
                    element: element.clone(),
                    size: elements.len() as u64,
                }
            }
            _ => {
                let types: Vec<Type> = elements.iter().map(|e| self.check_expr(e, None)).collect();
                Type::VariableSizedArray(Box::new(join_types(&types)))
            }
        }
    }

    fn check_elements(&mut self, elements: &[Expr], expected: &Type) {
        for element in elements {
            let ty = self.check_expr(element, Some(expected));
            self.expect_subtype(&ty, expected, element.span);
        }
    }

    fn check_dictionary_literal(&mut self, entries: &[(Expr, Expr)], expected: Option<&Type>) -> Type {
        if let Some(Type::Dictionary { key, value }) = expected.map(unwrap_optional) {
            for (k, v) in entries {
                let key_ty = self.check_expr(k, Some(key.as_ref()));
                self.expect_subtype(&key_ty, key, k.span);
                let value_ty = self.check_expr(v, Some(value.as_ref()));
                self.expect_subtype(&value_ty, value, v.span);
            }
            return Type::Dictionary {
                key: key.clone(),
                value: value.clone(),
            };
        }

        let mut keys = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            keys.push(self.check_expr(k, None));
            values.push(self.check_expr(v, None));
        }
        Type::Dictionary {
            key: Box::new(join_types(&keys)),
            value: Box::new(join_types(&values)),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span, expected: Option<&Type>) -> Type {
        match op {
            UnaryOp::Neg => {
                if let ExprKind::IntLit(value) = &operand.kind {
                    let ty = self.check_integer_literal(value, true, span, expected);
                    self.elaboration.record_expression_type(operand.id, ty.clone());
                    return ty;
                }
                let ty = self.check_expr(operand, expected);
                let signed = Type::Primitive(PrimitiveType::SignedNumber);
                self.expect_subtype(&ty, &signed, operand.span);
                ty
            }
            UnaryOp::Not => {
                let ty = self.check_expr(operand, Some(&Type::BOOL));
                self.expect_subtype(&ty, &Type::BOOL, operand.span);
                Type::BOOL
            }
            UnaryOp::Move => self.check_expr(operand, expected),
        }
    }

    fn check_binary(&mut self, left: &Expr, op: BinOp, right: &Expr, expected: Option<&Type>) -> Type {
        let number = Type::Primitive(PrimitiveType::Number);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let hint = expected.filter(|t| matches!(t, Type::Primitive(p) if p.is_number()));
                let left_ty = self.check_expr(left, hint);
                let right_ty = self.check_expr(right, Some(&left_ty));
                self.expect_subtype(&left_ty, &number, left.span);
                self.expect_subtype(&right_ty, &left_ty, right.span);
                left_ty
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let left_ty = self.check_expr(left, None);
                let right_ty = self.check_expr(right, Some(&left_ty));
                self.expect_subtype(&left_ty, &number, left.span);
                self.expect_subtype(&right_ty, &left_ty, right.span);
                Type::BOOL
            }
            BinOp::Eq | BinOp::Ne => {
                let left_ty = self.check_expr(left, None);
                self.check_expr(right, Some(&left_ty));
                Type::BOOL
            }
            BinOp::And | BinOp::Or => {
                let left_ty = self.check_expr(left, Some(&Type::BOOL));
                let right_ty = self.check_expr(right, Some(&Type::BOOL));
                self.expect_subtype(&left_ty, &Type::BOOL, left.span);
                self.expect_subtype(&right_ty, &Type::BOOL, right.span);
                Type::BOOL
            }
            BinOp::NilCoalesce => {
                let hint = expected.cloned().map(Type::optional);
                let left_ty = self.check_expr(left, hint.as_ref());
                let inner = match &left_ty {
                    Type::Optional(inner) => inner.as_ref().clone(),
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.report(SemanticError::TypeMismatch {
                            expected: Type::optional(other.clone()),
                            actual: other.clone(),
                            span: left.span,
                        });
                        other.clone()
                    }
                };
                let right_ty = self.check_expr(right, Some(&inner));
                if inner == Type::Never {
                    return right_ty;
                }
                self.expect_subtype(&right_ty, &inner, right.span);
                inner
            }
        }
    }

    fn member_type(&mut self, base: &Type, member: &Ident) -> Type {
        let found = match base {
            Type::Invalid => return Type::Invalid,
            Type::Reference { referenced, .. } => return self.member_type(referenced, member),
            Type::Composite(composite) => self.lookup_member(composite.id(), &member.node),
            Type::Interface(interface) => self.lookup_member(interface.id(), &member.node),
            Type::Restricted(restricted) => {
                let from_restriction = restricted
                    .restrictions
                    .iter()
                    .find_map(|i| self.lookup_member(i.id(), &member.node));
                if from_restriction.is_none() {
                    let on_base = match restricted.base.as_ref() {
                        Type::Composite(c) => self.lookup_member(c.id(), &member.node).is_some(),
                        _ => false,
                    };
                    if on_base {
                        self.report(SemanticError::InvalidRestrictedTypeMemberAccess {
                            name: member.node.clone(),
                            ty: base.clone(),
                            span: member.span,
                        });
                        return Type::Invalid;
                    }
                }
                from_restriction
            }
            _ => None,
        };

        found.unwrap_or_else(|| {
            self.report(SemanticError::NotDeclaredMember {
                name: member.node.clone(),
                ty: base.clone(),
                span: member.span,
            });
            Type::Invalid
        })
    }

    fn lookup_member(&self, id: &str, name: &str) -> Option<Type> {
        self.members.get(id).and_then(|table| table.get(name)).cloned()
    }

    fn check_index(&mut self, base: &Expr, index: &Expr) -> Type {
        let base_ty = self.check_expr(base, None);
        match &base_ty {
            Type::VariableSizedArray(element) | Type::ConstantSizedArray { element, .. } => {
                let index_ty = self.check_expr(index, Some(&Type::INT));
                let integer = Type::Primitive(PrimitiveType::Integer);
                self.expect_subtype(&index_ty, &integer, index.span);
                element.as_ref().clone()
            }
            Type::Dictionary { key, value } => {
                let index_ty = self.check_expr(index, Some(key.as_ref()));
                self.expect_subtype(&index_ty, key, index.span);
                Type::optional(value.as_ref().clone())
            }
            Type::Invalid => {
                self.check_expr(index, None);
                Type::Invalid
            }
            other => {
                self.check_expr(index, None);
                self.report(SemanticError::NotIndexable {
                    ty: other.clone(),
                    span: base.span,
                });
                Type::Invalid
            }
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Argument], span: Span) -> Type {
        let in_create = std::mem::replace(&mut self.in_create, false);
        let callee_ty = self.check_expr(callee, None);

        let function = match &callee_ty {
            Type::Function(function) => function.clone(),
            Type::Invalid => {
                self.check_arguments_unguided(args);
                return Type::Invalid;
            }
            other => {
                self.report(SemanticError::NotCallable {
                    ty: other.clone(),
                    span: callee.span,
                });
                self.check_arguments_unguided(args);
                return Type::Invalid;
            }
        };

        if function.parameters.len() != args.len() {
            self.report(SemanticError::ArgumentCount {
                expected: function.parameters.len(),
                actual: args.len(),
                span,
            });
        }

        for (index, arg) in args.iter().enumerate() {
            let Some(param) = function.parameters.get(index) else {
                self.check_expr(&arg.value, None);
                continue;
            };

            let actual_label = arg.label.as_ref().map(|l| l.node.as_str());
            if param.label.as_deref() != actual_label {
                self.report(SemanticError::IncorrectArgumentLabel {
                    expected: param.label.clone().unwrap_or_default(),
                    actual: actual_label.unwrap_or_default().to_string(),
                    span: arg.span,
                });
            }

            let ty = self.check_expr(&arg.value, Some(&param.ty));
            self.expect_subtype(&ty, &param.ty, arg.value.span);
        }

        if let Some(composite) = self.resource_constructor(callee) {
            if !in_create {
                self.report(SemanticError::MissingCreate {
                    ty: Type::Composite(composite),
                    span,
                });
            }
        }

        function.return_type.clone()
    }

    fn check_arguments_unguided(&mut self, args: &[Argument]) {
        for arg in args {
            self.check_expr(&arg.value, None);
        }
    }

    fn check_create(&mut self, call: &Expr) -> Type {
        let constructs_resource = match &call.kind {
            ExprKind::Call { callee, .. } => self.resource_constructor(callee).is_some(),
            _ => false,
        };
        if !constructs_resource {
            self.report(SemanticError::InvalidConstruction { span: call.span });
        }

        self.in_create = constructs_resource;
        let ty = self.check_expr(call, None);
        self.in_create = false;
        ty
    }

    /// The resource composite constructed by calling `callee`, if any.
    fn resource_constructor(&self, callee: &Expr) -> Option<Arc<CompositeType>> {
        let ExprKind::Ident(name) = &callee.kind else {
            return None;
        };
        if self.is_shadowed(&name.node) {
            return None;
        }
        self.constructors
            .get(&name.node)
            .filter(|composite| composite.is_resource())
            .cloned()
    }

    fn check_cast_expr(&mut self, cast: &Expr, inner: &Expr, kind: CastKind, target: Type) -> Type {
        let source = match kind {
            CastKind::Static => self.check_expr(inner, Some(&target)),
            CastKind::Dynamic | CastKind::ForceDynamic => self.check_expr(inner, None),
        };

        self.elaboration.record_cast(
            cast.id,
            CastRecord {
                source: source.clone(),
                target: target.clone(),
                kind,
            },
        );

        let result = check_cast(&source, &target, kind);
        if !result.allowed && !source.contains_invalid() && !target.contains_invalid() {
            self.report(SemanticError::TypeMismatch {
                expected: target,
                actual: source,
                span: inner.span,
            });
        }
        result.ty
    }

    fn check_reference(&mut self, reference: &Expr, inner: &Expr, ty: Type) -> Type {
        let Type::Reference { referenced, .. } = &ty else {
            self.check_expr(inner, None);
            if !ty.is_invalid() {
                self.report(SemanticError::NonReferenceTypeReference {
                    ty: ty.clone(),
                    span: reference.span,
                });
            }
            return Type::Invalid;
        };

        let actual = self.check_expr(inner, Some(referenced.as_ref()));
        self.expect_subtype(&actual, referenced, inner.span);
        self.elaboration.record_reference(reference.id, ty.clone());
        ty
    }

    // ----- helpers -----

    /// Report a mismatch unless `actual <: expected`. Invalid types never mismatch.
    fn expect_subtype(&mut self, actual: &Type, expected: &Type, span: Span) {
        if actual.contains_invalid() || expected.contains_invalid() {
            return;
        }
        if !is_subtype(actual, expected) {
            self.report(SemanticError::TypeMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
                span,
            });
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        let _ = self.scopes.pop();
    }

    fn declare_local(&mut self, name: &Ident, ty: Type) {
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&name.node));
        if duplicate {
            self.report(SemanticError::DuplicateDeclaration {
                name: name.node.clone(),
                span: name.span,
            });
            return;
        }
        self.bind_local(&name.node, ty);
    }

    fn bind_local(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    /// Whether `name` resolves to something other than the global binding.
    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .skip(1)
            .any(|scope| scope.contains_key(name))
    }
}

fn unwrap_optional(ty: &Type) -> &Type {
    match ty {
        Type::Optional(inner) => unwrap_optional(inner),
        other => other,
    }
}

/// Smallest listed type every element fits into, falling back to the top
/// type of the elements' kind.
fn join_types(types: &[Type]) -> Type {
    if types.is_empty() {
        return Type::Never;
    }
    if let Some(ty) = types
        .iter()
        .find(|candidate| types.iter().all(|t| is_subtype(t, candidate)))
    {
        return ty.clone();
    }
    if types.iter().any(Type::is_resource_kind) {
        Type::AnyResource
    } else {
        Type::AnyStruct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_prefers_a_listed_supertype() {
        let int8 = Type::Primitive(PrimitiveType::Int8);
        let integer = Type::Primitive(PrimitiveType::Integer);
        assert_eq!(join_types(&[int8.clone(), integer.clone()]), integer);
        assert_eq!(join_types(&[int8, Type::STRING]), Type::AnyStruct);
        assert_eq!(join_types(&[]), Type::Never);
    }

    #[test]
    fn nested_optionals_unwrap_fully() {
        let ty = Type::optional(Type::optional(Type::INT));
        assert_eq!(unwrap_optional(&ty), &Type::INT);
    }
}

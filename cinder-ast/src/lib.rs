#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;
pub use num_bigint::BigUint;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

/// Identity of an expression or function-like declaration, unique within one
/// parsed [`Program`].
///
/// The checker keys its elaboration (expression types, cast records) and its
/// converted signatures by this id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Composite(CompositeDecl),
    Interface(InterfaceDecl),
    Event(EventDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Composite(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::Event(d) => d.span,
            Decl::Function(d) => d.span,
            Decl::Variable(d) => d.span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Structure,
    Resource,
    Contract,
    Event,
    Enum,
}

impl CompositeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CompositeKind::Structure => "struct",
            CompositeKind::Resource => "resource",
            CompositeKind::Contract => "contract",
            CompositeKind::Event => "event",
            CompositeKind::Enum => "enum",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeDecl {
    pub span: Span,
    pub kind: CompositeKind,
    pub name: Ident,
    pub conformances: Vec<Ident>,
    pub members: Members,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDecl {
    pub span: Span,
    pub kind: CompositeKind,
    pub name: Ident,
    pub members: Members,
}

/// `event Name(params)`
#[derive(Clone, Debug, PartialEq)]
pub struct EventDecl {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Members {
    pub fields: Vec<FieldDecl>,
    pub functions: Vec<FunctionDecl>,
    pub initializers: Vec<InitializerDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub span: Span,
    pub kind: VariableKind,
    pub name: Ident,
    pub ty: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InitializerDecl {
    pub id: NodeId,
    pub span: Span,
    pub params: Vec<Param>,
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    /// Interface members may omit the body.
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub span: Span,
    /// Explicit argument label; `_` means the argument is passed without a label,
    /// and no label means the label is the parameter name.
    pub label: Option<Ident>,
    pub name: Ident,
    pub ty: TypeAnnotation,
}

impl Param {
    pub fn argument_label(&self) -> Option<&str> {
        match &self.label {
            Some(label) if label.node == "_" => None,
            Some(label) => Some(label.node.as_str()),
            None => Some(self.name.node.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Constant,
    Variable,
}

/// `=` or `<-`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    Copy,
    Move,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDecl {
    pub span: Span,
    pub kind: VariableKind,
    pub name: Ident,
    pub ty: Option<TypeAnnotation>,
    pub transfer: Transfer,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Variable(VariableDecl),
    Assign(AssignStmt),
    Return(ReturnStmt),
    Destroy(DestroyStmt),
    If(IfStmt),
    While(WhileStmt),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub transfer: Transfer,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DestroyStmt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub test: IfTest,
    pub then_block: Block,
    /// `else if` is represented as an else block holding a single `if`.
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IfTest {
    Expr(Expr),
    /// `if let x <- e`
    Binding(VariableDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Magnitude only; negation is a unary operator.
    IntLit(BigUint),
    StringLit(String),
    BoolLit(bool),
    Nil,
    Ident(Ident),
    Array(Vec<Expr>),
    Dictionary(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        member: Ident,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    ForceUnwrap(Box<Expr>),
    /// `e as T`, `e as? T`, `e as! T`
    Cast {
        expr: Box<Expr>,
        kind: CastKind,
        ty: TypeAnnotation,
    },
    /// `&e as auth &T`
    Reference {
        expr: Box<Expr>,
        ty: TypeAnnotation,
    },
    /// `create R(...)`; the inner expression is the constructor call.
    Create(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub span: Span,
    pub label: Option<Ident>,
    pub value: Expr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Move,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
    NilCoalesce,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::NilCoalesce => "??",
        }
    }
}

/// The three cast operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// `as`
    Static,
    /// `as?`
    Dynamic,
    /// `as!`
    ForceDynamic,
}

impl CastKind {
    pub fn operator(self) -> &'static str {
        match self {
            CastKind::Static => "as",
            CastKind::Dynamic => "as?",
            CastKind::ForceDynamic => "as!",
        }
    }
}

/// A syntactic type annotation, e.g. `@R{I1, I2}`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    pub span: Span,
    /// Leading `@` marker. Accepted but not enforced.
    pub is_resource: bool,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExprKind {
    Nominal(Ident),
    /// `T{I1, I2}`; `base` is `None` for the `{I1, I2}` form.
    Restricted {
        base: Option<Box<TypeExpr>>,
        restrictions: Vec<Ident>,
    },
    Optional(Box<TypeExpr>),
    VariableSized(Box<TypeExpr>),
    ConstantSized {
        element: Box<TypeExpr>,
        size: u64,
    },
    Dictionary {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Reference {
        authorized: bool,
        referenced: Box<TypeExpr>,
    },
    Function {
        params: Vec<TypeExpr>,
        return_type: Box<TypeExpr>,
    },
    Capability(Option<Box<TypeExpr>>),
}

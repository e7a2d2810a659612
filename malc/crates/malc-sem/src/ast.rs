//! The typed AST handed over by the type checker.
//!
//! Every expression carries a `NodeId`; the checker's side tables
//! ([`crate::TypeInfo`]) are keyed by it. The middle end never mutates the
//! AST.

use malc_util::{define_idx, Span, Symbol};

use crate::types::{EnumDef, StructDef, TraitDef, Type, TypeParamDecl};

define_idx!(
    /// Identity of an AST node, assigned by the front end.
    NodeId
);

/// A type-checked source file.
#[derive(Debug, Clone)]
pub struct File {
    pub items: Vec<Item>,
}

/// Top-level item.
#[derive(Debug, Clone)]
pub enum Item {
    Function(FnDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Impl(ImplBlock),
}

/// Function declaration.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: Symbol,
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<Param>,
    /// `None` denotes no return value.
    pub ret: Option<Type>,
    pub body: Block,
    pub span: Span,
}

/// Function parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub def: StructDef,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub def: EnumDef,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub def: TraitDef,
    pub span: Span,
}

/// `impl T { fn m(self, …) { … } … }`
#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub self_ty: Symbol,
    pub type_params: Vec<TypeParamDecl>,
    pub methods: Vec<FnDecl>,
    pub span: Span,
}

/// A braced statement sequence with an optional tail expression.
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

/// Statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: Symbol,
        ty: Option<Type>,
        value: Expr,
        span: Span,
    },
    /// `x = e`, `a.f = e`, `a[i] = e`.
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If(IfStmt),
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For {
        var: Symbol,
        iterable: Expr,
        body: Block,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    /// `go f()` or `go { … }`.
    Go {
        task: GoTask,
        span: Span,
    },
    /// `ch <- v`.
    Send {
        channel: Expr,
        value: Expr,
        span: Span,
    },
    Select {
        cases: Vec<SelectCase>,
        span: Span,
    },
}

/// `if / else if / else` chain.
#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Block,
    pub else_body: Option<ElseArm>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ElseArm {
    If(Box<IfStmt>),
    Block(Block),
}

/// What a `go` statement spawns.
#[derive(Debug, Clone)]
pub enum GoTask {
    Call(Expr),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct SelectCase {
    pub kind: SelectCaseKind,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum SelectCaseKind {
    Send { channel: Expr, value: Expr },
    Recv { binding: Option<Symbol>, channel: Expr },
    Default,
}

/// Expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind, span: Span) -> Self {
        Self { id, kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Lit),
    Ident(Symbol),
    /// `Type::item` — enum variant constructor or static method reference.
    Path { ty: Symbol, item: Symbol },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Field {
        target: Box<Expr>,
        field: Symbol,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    StructLit {
        name: Symbol,
        fields: Vec<(Symbol, Expr)>,
    },
    ArrayLit {
        elems: Vec<Expr>,
    },
    TupleLit {
        elems: Vec<Expr>,
    },
    /// `if` at expression position; arm blocks carry tail values.
    If(Box<IfStmt>),
    Match {
        subject: Box<Expr>,
        arms: Vec<Arm>,
    },
    /// `<-ch`.
    Recv {
        channel: Box<Expr>,
    },
    Cast {
        value: Box<Expr>,
        ty: Type,
    },
    Lambda {
        params: Vec<Param>,
        ret: Option<Type>,
        body: Block,
    },
}

/// Literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Symbol),
    Nil,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Match arm.
#[derive(Debug, Clone)]
pub struct Arm {
    pub pat: Pattern,
    pub body: Block,
    pub span: Span,
}

/// Pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard {
        span: Span,
    },
    Binding {
        name: Symbol,
        span: Span,
    },
    Literal {
        value: Lit,
        ty: Type,
        span: Span,
    },
    Tuple {
        elems: Vec<Pattern>,
        span: Span,
    },
    Struct {
        name: Symbol,
        fields: Vec<(Symbol, Pattern)>,
        span: Span,
    },
    /// `Some(x)` or `Option::Some(x)`; the enum name, when absent, is
    /// resolved from the subject's type.
    Enum {
        enum_name: Option<Symbol>,
        variant: Symbol,
        args: Vec<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Binding { span, .. }
            | Pattern::Literal { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::Struct { span, .. }
            | Pattern::Enum { span, .. } => *span,
        }
    }
}

/// Hands out fresh `NodeId`s; the front end owns one per file.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

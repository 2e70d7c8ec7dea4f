//! AST node types for datascript.
//!
//! Every expression carries its static [`Type`], resolved eagerly by the
//! parser. Resolved operators, casts and members are stored as references into
//! the static tables in [`super::builtins`] so code generation never re-resolves.

use serde::Serialize;

use super::builtins::{Cast, Member, Operation, UnaryOperation};
use super::types::{ResourceLocation, Type, Value};

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A complete source file.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub body: Vec<Stmt>,
}

/// A name bound in a lexical scope.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// `@load`, `@tick`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `let name: type = value`
    Let {
        name: String,
        name_span: Span,
        value: Expr,
    },
    /// `var name = value`
    Var {
        name: String,
        name_span: Span,
        value: Option<Expr>,
        operation: Option<&'static Operation>,
    },
    /// `target += value`
    Assign {
        target: Expr,
        op: BinOp,
        value: Expr,
        operation: Option<&'static Operation>,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function {
        name: String,
        name_span: Span,
        annotations: Vec<Annotation>,
        body: Vec<Stmt>,
    },
    Enum {
        name: String,
        name_span: Span,
        variants: Vec<String>,
    },
    /// `as @e { ... }` / `at @s { ... }`
    Context {
        kind: ContextKind,
        selector: Expr,
        body: Box<Stmt>,
    },
    Command(Command),
    Return,
    /// Placeholder for a statement that failed to parse.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    As,
    At,
}

impl ContextKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ContextKind::As => "as",
            ContextKind::At => "at",
        }
    }
}

/// Built-in command statements.
#[derive(Debug, Clone)]
pub enum Command {
    Say(Expr),
    Tellraw {
        target: Expr,
        parts: Vec<Expr>,
    },
    Give {
        target: Expr,
        item: Expr,
        count: Option<Expr>,
    },
    Tag {
        target: Expr,
        add: bool,
        name: String,
    },
    Kill(Option<Expr>),
    Summon {
        entity: Expr,
        data: Option<Expr>,
    },
    /// `cmd "time set day"`, emitted verbatim.
    Raw(Expr),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Best-effort node for an expression that failed to resolve.
    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, Type::error(), span)
    }

    pub fn is_error(&self) -> bool {
        self.ty.is_error()
    }
}

#[derive(Debug, Clone)]
pub enum CallTarget {
    /// `helper()`, resolved against functions of the current namespace.
    Local(String),
    /// `other:path()`
    External(ResourceLocation),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        operation: Option<&'static Operation>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        operation: Option<&'static UnaryOperation>,
    },
    /// Implicit conversion inserted by the parser.
    Cast {
        expr: Box<Expr>,
        cast: &'static Cast,
    },
    /// `a..b`, `..b`, `a..`
    Range {
        min: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Compound(Vec<(String, Expr)>),
    /// `@s.kills`, `name.length`, `kills.reset()`
    Member {
        object: Box<Expr>,
        name: String,
        member: &'static Member,
        args: Vec<Expr>,
    },
    /// `@s/Inventory[0]/id`
    DataPath {
        object: Box<Expr>,
        path: String,
    },
    /// `Mode.Survival`
    EnumVariant {
        enum_name: String,
        variant: String,
    },
    Call(CallTarget),
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    In,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::In => "in",
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
            BinOp::ModAssign => "%=",
        }
    }

    /// The arithmetic operator behind a compound assignment.
    pub fn arithmetic(self) -> Option<BinOp> {
        match self {
            BinOp::AddAssign => Some(BinOp::Add),
            BinOp::SubAssign => Some(BinOp::Sub),
            BinOp::MulAssign => Some(BinOp::Mul),
            BinOp::DivAssign => Some(BinOp::Div),
            BinOp::ModAssign => Some(BinOp::Mod),
            _ => None,
        }
    }

    /// Same comparison with the operands swapped.
    pub fn flipped(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Gt => BinOp::Lt,
            BinOp::Le => BinOp::Ge,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

//! Syntax tree produced by [`crate::parser`].
//!
//! The tree mirrors the surface grammar closely, including constructs the
//! shader language rejects (channels, closures, maps, `go`, `switch`...),
//! so the analyzer can report them with a precise message instead of a
//! generic syntax error.

use std::fmt;

/// A 1-based source position. Columns count bytes.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

/// A parsed source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct File {
    pub package: Option<Ident>,
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn pos(&self) -> Pos {
        match self {
            Self::Gen(d) => d.pos,
            Self::Func(d) => d.pos,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GenKind {
    Import,
    Const,
    Type,
    Var,
}

/// `var`, `const`, `type` or `import`, possibly parenthesized.
#[derive(Clone, Debug, PartialEq)]
pub struct GenDecl {
    pub kind: GenKind,
    pub pos: Pos,
    pub specs: Vec<Spec>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Spec {
    Import(Pos),
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueSpec {
    pub pos: Pos,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpec {
    pub pos: Pos,
    pub name: Ident,
    pub ty: Expr,
}

/// A parameter or result group such as `a, b vec2`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub pos: Pos,
    pub name: Ident,
    pub has_receiver: bool,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<BlockStmt>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockStmt {
    pub pos: Pos,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Deref,
    Addr,
    Recv,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Neg => "-",
            Self::Not => "!",
            Self::BitNot => "^",
            Self::Deref => "*",
            Self::Addr => "&",
            Self::Recv => "<-",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::LOr => 1,
            Self::LAnd => 2,
            Self::Eql | Self::Neq | Self::Lss | Self::Leq | Self::Gtr | Self::Geq => 3,
            Self::Add | Self::Sub | Self::Or | Self::Xor => 4,
            Self::Mul | Self::Quo | Self::Rem | Self::Shl | Self::Shr | Self::And | Self::AndNot => 5,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Quo => "/",
            Self::Rem => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::AndNot => "&^",
            Self::LAnd => "&&",
            Self::LOr => "||",
            Self::Eql => "==",
            Self::Neq => "!=",
            Self::Lss => "<",
            Self::Leq => "<=",
            Self::Gtr => ">",
            Self::Geq => ">=",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Ident(String),
    Int(String),
    Float(String),
    Imag(String),
    Char(String),
    String(String),
    Composite {
        ty: Box<Expr>,
        elts: Vec<Expr>,
    },
    Paren(Box<Expr>),
    Selector {
        base: Box<Expr>,
        sel: Ident,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        base: Box<Expr>,
    },
    TypeAssert {
        base: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// `[N]T`, or `[...]T` when `len` is `None`.
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },
    SliceType(Box<Expr>),
    StructType(Vec<Field>),
    FuncType,
    FuncLit,
    MapType,
    ChanType,
    InterfaceType,
}

impl Expr {
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Self { pos, kind }
    }

    /// The identifier name, looking through parentheses.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Paren(inner) => inner.ident(),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Ident(s)
            | ExprKind::Int(s)
            | ExprKind::Float(s)
            | ExprKind::Imag(s)
            | ExprKind::Char(s)
            | ExprKind::String(s) => f.write_str(s),
            ExprKind::Composite { ty, .. } => write!(f, "{ty}{{…}}"),
            ExprKind::Paren(e) => write!(f, "({e})"),
            ExprKind::Selector { base, sel } => write!(f, "{base}.{}", sel.name),
            ExprKind::Index { base, index } => write!(f, "{base}[{index}]"),
            ExprKind::Slice { base } => write!(f, "{base}[:]"),
            ExprKind::TypeAssert { base } => write!(f, "{base}.(…)"),
            ExprKind::Call { func, args, .. } => {
                write!(f, "{func}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            ExprKind::Unary { op, operand } => write!(f, "{op}{operand}"),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            ExprKind::KeyValue { key, value } => write!(f, "{key}: {value}"),
            ExprKind::ArrayType { len: Some(n), elem } => write!(f, "[{n}]{elem}"),
            ExprKind::ArrayType { len: None, elem } => write!(f, "[...]{elem}"),
            ExprKind::SliceType(elem) => write!(f, "[]{elem}"),
            ExprKind::StructType(_) => f.write_str("struct{…}"),
            ExprKind::FuncType => f.write_str("func(…)"),
            ExprKind::FuncLit => f.write_str("func literal"),
            ExprKind::MapType => f.write_str("map[…]…"),
            ExprKind::ChanType => f.write_str("chan …"),
            ExprKind::InterfaceType => f.write_str("interface{…}"),
        }
    }
}

/// Assignment tokens: `=`, `:=` and the compound forms.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssignOp {
    Assign,
    Define,
    Compound(BinaryOp),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Empty,
    Decl(GenDecl),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    IncDec {
        target: Expr,
        inc: bool,
    },
    Expr(Expr),
    Block(BlockStmt),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: BlockStmt,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: BlockStmt,
    },
    Range(BlockStmt),
    Return(Vec<Expr>),
    Branch {
        kind: BranchKind,
        label: Option<Ident>,
    },
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
    },
    Go(Expr),
    Defer(Expr),
    Send,
    Switch,
    Select,
}

//! Statements and blocks.

use crate::constant::Constant;
use crate::expr::{Expr, Op};
use crate::types::Type;

/// A lexical block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// Types of the variables declared directly in this block. A `None`
    /// entry marks a for-loop counter, which the loop header declares.
    pub local_vars: Vec<Type>,
    /// Absolute index of the first entry of `local_vars` within the
    /// enclosing function.
    pub local_var_index_offset: usize,
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Absolute indices of the variables declared in this block.
    pub fn local_indices(&self) -> std::ops::Range<usize> {
        self.local_var_index_offset..self.local_var_index_offset + self.local_vars.len()
    }
}

/// A counted loop with constant bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct ForLoop {
    pub var_type: Type,
    pub var_index: usize,
    pub init: Constant,
    pub end: Constant,
    pub op: Op,
    pub delta: Constant,
    pub body: Block,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    ExprStmt(Expr),
    BlockStmt(Block),
    Assign { lhs: Expr, rhs: Expr },
    /// Zero-initialises the variable at the given absolute index.
    Init(usize),
    If {
        cond: Expr,
        then: Block,
        otherwise: Option<Block>,
    },
    For(ForLoop),
    Continue,
    Break,
    Return(Option<Expr>),
    Discard,
}

impl Stmt {
    /// Expressions directly owned by this statement.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Self::ExprStmt(e) => vec![e],
            Self::Assign { lhs, rhs } => vec![lhs, rhs],
            Self::If { cond, .. } => vec![cond],
            Self::Return(Some(e)) => vec![e],
            _ => vec![],
        }
    }

    /// Blocks directly owned by this statement.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Self::BlockStmt(b) => vec![b],
            Self::If {
                then, otherwise, ..
            } => {
                let mut v = vec![then];
                v.extend(otherwise.iter());
                v
            }
            Self::For(f) => vec![&f.body],
            _ => vec![],
        }
    }
}

/// Visits every expression (and sub-expression) of a block tree.
pub fn walk_exprs(block: &Block, f: &mut dyn FnMut(&Expr)) {
    for stmt in &block.stmts {
        for e in stmt.exprs() {
            e.walk(f);
        }
        for b in stmt.blocks() {
            walk_exprs(b, f);
        }
    }
}

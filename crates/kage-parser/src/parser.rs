//! Recursive-descent parser producing [`crate::ast::File`].
//!
//! Follows the usual brace-language grammar with automatic semicolons.
//! Composite literals whose type is a bare name are not recognised inside
//! `if`/`for` headers, so `for i < n {` parses as a loop.

use crate::SourceError;
use crate::ast::*;
use crate::lexer::{Spanned, Token, tokenize};

/// Parsing stops after this many syntax errors.
const MAX_ERRORS: usize = 10;

/// Marker for an error that has already been recorded.
struct Bail;

type PResult<T> = Result<T, Bail>;

/// Parses a whole source file.
pub fn parse(source: &str) -> Result<File, Vec<SourceError>> {
    let tokens = tokenize(source).map_err(|pos| {
        vec![SourceError::new(pos, "invalid character")]
    })?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        expr_lev: 0,
        errors: Vec::new(),
    };
    let file = parser.parse_file();
    match file {
        Ok(file) if parser.errors.is_empty() => Ok(file),
        _ => Err(parser.errors),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    /// Below zero inside control clauses, above zero inside brackets.
    expr_lev: i32,
    errors: Vec<SourceError>,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(s) => format!("identifier {s}"),
        Token::Int(s) | Token::Float(s) | Token::Imag(s) | Token::Char(s) | Token::String(s) => {
            format!("literal {s}")
        }
        Token::AutoSemicolon => "newline".to_string(),
        Token::Eof => "EOF".to_string(),
        t => format!("'{t}'"),
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Add => BinaryOp::Add,
        Token::Sub => BinaryOp::Sub,
        Token::Mul => BinaryOp::Mul,
        Token::Quo => BinaryOp::Quo,
        Token::Rem => BinaryOp::Rem,
        Token::And => BinaryOp::And,
        Token::Or => BinaryOp::Or,
        Token::Xor => BinaryOp::Xor,
        Token::Shl => BinaryOp::Shl,
        Token::Shr => BinaryOp::Shr,
        Token::AndNot => BinaryOp::AndNot,
        Token::LAnd => BinaryOp::LAnd,
        Token::LOr => BinaryOp::LOr,
        Token::Eql => BinaryOp::Eql,
        Token::Neq => BinaryOp::Neq,
        Token::Lss => BinaryOp::Lss,
        Token::Leq => BinaryOp::Leq,
        Token::Gtr => BinaryOp::Gtr,
        Token::Geq => BinaryOp::Geq,
        _ => return None,
    })
}

fn assign_op(token: &Token) -> Option<AssignOp> {
    Some(match token {
        Token::Assign => AssignOp::Assign,
        Token::Define => AssignOp::Define,
        Token::AddAssign => AssignOp::Compound(BinaryOp::Add),
        Token::SubAssign => AssignOp::Compound(BinaryOp::Sub),
        Token::MulAssign => AssignOp::Compound(BinaryOp::Mul),
        Token::QuoAssign => AssignOp::Compound(BinaryOp::Quo),
        Token::RemAssign => AssignOp::Compound(BinaryOp::Rem),
        Token::AndAssign => AssignOp::Compound(BinaryOp::And),
        Token::OrAssign => AssignOp::Compound(BinaryOp::Or),
        Token::XorAssign => AssignOp::Compound(BinaryOp::Xor),
        Token::ShlAssign => AssignOp::Compound(BinaryOp::Shl),
        Token::ShrAssign => AssignOp::Compound(BinaryOp::Shr),
        Token::AndNotAssign => AssignOp::Compound(BinaryOp::AndNot),
        _ => return None,
    })
}

fn is_literal_type(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Selector { base, .. } => matches!(base.kind, ExprKind::Ident(_)),
        ExprKind::ArrayType { .. }
        | ExprKind::SliceType(_)
        | ExprKind::StructType(_)
        | ExprKind::MapType => true,
        _ => false,
    }
}

fn is_type_name(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Ident(_) | ExprKind::Selector { .. })
}

impl Parser {
    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)].token
    }

    fn pos(&self) -> Pos {
        self.tokens[self.cursor.min(self.tokens.len() - 1)].pos
    }

    fn bump(&mut self) -> Spanned {
        let t = self.tokens[self.cursor.min(self.tokens.len() - 1)].clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        t
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn at_semi(&self) -> bool {
        self.peek().is_semicolon()
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) -> Bail {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(SourceError::new(pos, message));
        }
        Bail
    }

    fn unexpected(&mut self, expected: &str) -> Bail {
        let found = describe(self.peek());
        let pos = self.pos();
        self.error(pos, format!("expected {expected}, found {found}"))
    }

    fn expect(&mut self, token: Token) -> PResult<Pos> {
        if self.at(&token) {
            Ok(self.bump().pos)
        } else {
            Err(self.unexpected(&format!("'{token}'")))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            let pos = self.bump().pos;
            Ok(Ident { name, pos })
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// A semicolon may be omitted before a closing `)` or `}`.
    fn expect_semi(&mut self) -> PResult<()> {
        match self.peek() {
            Token::Semicolon | Token::AutoSemicolon => {
                self.bump();
                Ok(())
            }
            Token::RParen | Token::RBrace | Token::Eof => Ok(()),
            _ => Err(self.unexpected("';'")),
        }
    }

    fn too_many_errors(&self) -> bool {
        self.errors.len() >= MAX_ERRORS
    }

    /// Skips to the end of the current statement.
    fn sync_stmt(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Semicolon | Token::AutoSemicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                Token::RBrace if depth == 0 => return,
                Token::LBrace | Token::LParen | Token::LBrack => depth += 1,
                Token::RBrace | Token::RParen | Token::RBrack => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump();
        }
    }

    /// Skips to the next top-level declaration keyword.
    fn sync_decl(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Func | Token::Var | Token::Const | Token::Type | Token::Import
                    if depth == 0 =>
                {
                    return;
                }
                Token::LBrace | Token::LParen | Token::LBrack => depth += 1,
                Token::RBrace | Token::RParen | Token::RBrack => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump();
        }
    }

    /// Skips a balanced `{ ... }` group.
    fn skip_braces(&mut self) -> PResult<()> {
        self.expect(Token::LBrace)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump().token {
                Token::LBrace => depth += 1,
                Token::RBrace => depth -= 1,
                Token::Eof => return Err(self.unexpected("'}'")),
                _ => {}
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn parse_file(&mut self) -> PResult<File> {
        while self.at_semi() {
            self.bump();
        }
        self.expect(Token::Package)?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut decls = Vec::new();
        while !self.at(&Token::Eof) && !self.too_many_errors() {
            let decl = match self.peek() {
                Token::Func => self.parse_func_decl().map(Decl::Func),
                Token::Var | Token::Const | Token::Type | Token::Import => self
                    .parse_gen_decl()
                    .and_then(|d| self.expect_semi().map(|()| Decl::Gen(d))),
                Token::Semicolon | Token::AutoSemicolon => {
                    self.bump();
                    continue;
                }
                _ => {
                    let pos = self.pos();
                    Err(self.error(pos, "non-declaration statement outside function body"))
                }
            };
            match decl {
                Ok(d) => decls.push(d),
                Err(Bail) => {
                    if self.cursor < self.tokens.len() - 1 {
                        self.bump();
                    }
                    self.sync_decl();
                }
            }
        }
        Ok(File {
            package: Some(package),
            decls,
        })
    }

    fn parse_gen_decl(&mut self) -> PResult<GenDecl> {
        let Spanned { token, pos } = self.bump();
        let kind = match token {
            Token::Import => GenKind::Import,
            Token::Const => GenKind::Const,
            Token::Type => GenKind::Type,
            _ => GenKind::Var,
        };
        let mut specs = Vec::new();
        if self.eat(&Token::LParen) {
            while !self.at(&Token::RParen) && !self.at(&Token::Eof) {
                specs.push(self.parse_spec(kind)?);
                self.expect_semi()?;
            }
            self.expect(Token::RParen)?;
        } else {
            specs.push(self.parse_spec(kind)?);
        }
        Ok(GenDecl { kind, pos, specs })
    }

    fn parse_spec(&mut self, kind: GenKind) -> PResult<Spec> {
        let pos = self.pos();
        match kind {
            GenKind::Import => {
                if matches!(self.peek(), Token::Ident(_) | Token::Period) {
                    self.bump();
                }
                if !matches!(self.peek(), Token::String(_)) {
                    return Err(self.unexpected("import path"));
                }
                self.bump();
                Ok(Spec::Import(pos))
            }
            GenKind::Type => {
                let name = self.expect_ident()?;
                self.eat(&Token::Assign);
                let ty = self.parse_type()?;
                Ok(Spec::Type(TypeSpec { pos, name, ty }))
            }
            GenKind::Const | GenKind::Var => {
                let mut names = vec![self.expect_ident()?];
                while self.eat(&Token::Comma) {
                    names.push(self.expect_ident()?);
                }
                let ty = if !self.at(&Token::Assign) && !self.at_semi() && !self.at(&Token::RParen)
                {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let values = if self.eat(&Token::Assign) {
                    self.parse_expr_list()?
                } else {
                    Vec::new()
                };
                if kind == GenKind::Const && values.is_empty() {
                    return Err(self.error(pos, "missing init expr for const declaration"));
                }
                Ok(Spec::Value(ValueSpec {
                    pos,
                    names,
                    ty,
                    values,
                }))
            }
        }
    }

    fn parse_func_decl(&mut self) -> PResult<FuncDecl> {
        let pos = self.expect(Token::Func)?;
        let has_receiver = if self.at(&Token::LParen) {
            self.parse_parameters()?;
            true
        } else {
            false
        };
        let name = self.expect_ident()?;
        if self.at(&Token::LBrack) {
            let p = self.pos();
            return Err(self.error(p, "generic functions are not supported"));
        }
        let (params, results) = self.parse_signature()?;
        let body = if self.at(&Token::LBrace) {
            let prev = std::mem::replace(&mut self.expr_lev, 0);
            let body = self.parse_block();
            self.expr_lev = prev;
            Some(body?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(FuncDecl {
            pos,
            name,
            has_receiver,
            params,
            results,
            body,
        })
    }

    fn parse_signature(&mut self) -> PResult<(Vec<Field>, Vec<Field>)> {
        let params = self.parse_parameters()?;
        let results = if self.at(&Token::LParen) {
            self.parse_parameters()?
        } else if self.at_type_start() {
            vec![Field {
                names: Vec::new(),
                ty: self.parse_type()?,
            }]
        } else {
            Vec::new()
        };
        Ok((params, results))
    }

    fn at_type_start(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::LBrack
                | Token::Struct
                | Token::Mul
                | Token::Func
                | Token::Map
                | Token::Chan
                | Token::Arrow
                | Token::Interface
                | Token::LParen
        )
    }

    /// Parses `(a, b T, c U)` or `(T, U)` applying the grouping rules.
    fn parse_parameters(&mut self) -> PResult<Vec<Field>> {
        self.expect(Token::LParen)?;
        let mut items: Vec<(Option<Ident>, Option<Expr>)> = Vec::new();
        while !self.at(&Token::RParen) && !self.at(&Token::Eof) {
            if self.at(&Token::Ellipsis) {
                let p = self.pos();
                return Err(self.error(p, "variadic parameters are not supported"));
            }
            if let Token::Ident(_) = self.peek() {
                let ident = self.expect_ident()?;
                match self.peek() {
                    Token::Comma | Token::RParen => items.push((Some(ident), None)),
                    Token::Period => {
                        self.bump();
                        let sel = self.expect_ident()?;
                        let base = Expr::new(ident.pos, ExprKind::Ident(ident.name));
                        let ty = Expr::new(
                            base.pos,
                            ExprKind::Selector {
                                base: Box::new(base),
                                sel,
                            },
                        );
                        items.push((None, Some(ty)));
                    }
                    Token::Ellipsis => {
                        let p = self.pos();
                        return Err(self.error(p, "variadic parameters are not supported"));
                    }
                    _ => {
                        let ty = self.parse_type()?;
                        items.push((Some(ident), Some(ty)));
                    }
                }
            } else {
                let ty = self.parse_type()?;
                items.push((None, Some(ty)));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        let named = items.iter().any(|(n, t)| n.is_some() && t.is_some());
        if !named {
            return Ok(items
                .into_iter()
                .filter_map(|(name, ty)| match (name, ty) {
                    (_, Some(ty)) => Some(ty),
                    (Some(id), None) => Some(Expr::new(id.pos, ExprKind::Ident(id.name))),
                    (None, None) => None,
                })
                .map(|ty| Field {
                    names: Vec::new(),
                    ty,
                })
                .collect());
        }

        let mut fields = Vec::new();
        let mut pending = Vec::new();
        for (name, ty) in items {
            match (name, ty) {
                (Some(id), None) => pending.push(id),
                (Some(id), Some(ty)) => {
                    pending.push(id);
                    fields.push(Field {
                        names: std::mem::take(&mut pending),
                        ty,
                    });
                }
                (None, Some(ty)) => {
                    return Err(self.error(ty.pos, "mixed named and unnamed parameters"));
                }
                (None, None) => {}
            }
        }
        if let Some(id) = pending.first() {
            return Err(self.error(id.pos, "mixed named and unnamed parameters"));
        }
        Ok(fields)
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    fn parse_type(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.bump();
                let ident = Expr::new(pos, ExprKind::Ident(name));
                if self.eat(&Token::Period) {
                    let sel = self.expect_ident()?;
                    return Ok(Expr::new(
                        pos,
                        ExprKind::Selector {
                            base: Box::new(ident),
                            sel,
                        },
                    ));
                }
                Ok(ident)
            }
            Token::LBrack => self.parse_array_type(),
            Token::Struct => self.parse_struct_type(),
            Token::Mul => {
                self.bump();
                let operand = self.parse_type()?;
                Ok(Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: UnaryOp::Deref,
                        operand: Box::new(operand),
                    },
                ))
            }
            Token::Func => {
                self.bump();
                self.parse_signature()?;
                Ok(Expr::new(pos, ExprKind::FuncType))
            }
            Token::Map => {
                self.bump();
                self.expect(Token::LBrack)?;
                self.parse_type()?;
                self.expect(Token::RBrack)?;
                self.parse_type()?;
                Ok(Expr::new(pos, ExprKind::MapType))
            }
            Token::Chan | Token::Arrow => {
                self.bump();
                self.eat(&Token::Chan);
                self.eat(&Token::Arrow);
                self.parse_type()?;
                Ok(Expr::new(pos, ExprKind::ChanType))
            }
            Token::Interface => {
                self.bump();
                self.skip_braces()?;
                Ok(Expr::new(pos, ExprKind::InterfaceType))
            }
            Token::LParen => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect(Token::RParen)?;
                Ok(Expr::new(pos, ExprKind::Paren(Box::new(inner))))
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn parse_array_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::LBrack)?;
        if self.eat(&Token::RBrack) {
            let elem = self.parse_type()?;
            return Ok(Expr::new(pos, ExprKind::SliceType(Box::new(elem))));
        }
        let len = if self.eat(&Token::Ellipsis) {
            None
        } else {
            self.expr_lev += 1;
            let len = self.parse_expr();
            self.expr_lev -= 1;
            Some(Box::new(len?))
        };
        self.expect(Token::RBrack)?;
        let elem = self.parse_type()?;
        Ok(Expr::new(
            pos,
            ExprKind::ArrayType {
                len,
                elem: Box::new(elem),
            },
        ))
    }

    fn parse_struct_type(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Struct)?;
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(&Token::RBrace) && !self.at(&Token::Eof) {
            let mut names = vec![self.expect_ident()?];
            while self.eat(&Token::Comma) {
                names.push(self.expect_ident()?);
            }
            let ty = self.parse_type()?;
            fields.push(Field { names, ty });
            self.expect_semi()?;
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::new(pos, ExprKind::StructType(fields)))
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = binary_op(self.peek()) {
            if op.precedence() < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr::new(
                lhs.pos,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let op = match self.peek() {
            Token::Add => UnaryOp::Plus,
            Token::Sub => UnaryOp::Neg,
            Token::Not => UnaryOp::Not,
            Token::Xor => UnaryOp::BitNot,
            Token::Mul => UnaryOp::Deref,
            Token::And => UnaryOp::Addr,
            Token::Arrow => UnaryOp::Recv,
            _ => return self.parse_primary(),
        };
        self.bump();
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            pos,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        ))
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let kind = match self.peek().clone() {
            Token::Ident(s) => ExprKind::Ident(s),
            Token::Int(s) => ExprKind::Int(s),
            Token::Float(s) => ExprKind::Float(s),
            Token::Imag(s) => ExprKind::Imag(s),
            Token::Char(s) => ExprKind::Char(s),
            Token::String(s) => ExprKind::String(s),
            Token::LParen => {
                self.bump();
                self.expr_lev += 1;
                let inner = self.parse_expr();
                self.expr_lev -= 1;
                let inner = inner?;
                self.expect(Token::RParen)?;
                return Ok(Expr::new(pos, ExprKind::Paren(Box::new(inner))));
            }
            Token::Func => {
                self.bump();
                self.parse_signature()?;
                if self.at(&Token::LBrace) {
                    let prev = std::mem::replace(&mut self.expr_lev, 0);
                    let body = self.parse_block();
                    self.expr_lev = prev;
                    body?;
                    return Ok(Expr::new(pos, ExprKind::FuncLit));
                }
                return Ok(Expr::new(pos, ExprKind::FuncType));
            }
            Token::LBrack
            | Token::Struct
            | Token::Map
            | Token::Chan
            | Token::Interface => return self.parse_type(),
            _ => return Err(self.unexpected("operand")),
        };
        self.bump();
        Ok(Expr::new(pos, kind))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let mut x = self.parse_operand()?;
        loop {
            match self.peek() {
                Token::Period => {
                    self.bump();
                    match self.peek() {
                        Token::Ident(_) => {
                            let sel = self.expect_ident()?;
                            x = Expr::new(
                                x.pos,
                                ExprKind::Selector {
                                    base: Box::new(x),
                                    sel,
                                },
                            );
                        }
                        Token::LParen => {
                            self.bump();
                            if !self.eat(&Token::Type) {
                                self.parse_type()?;
                            }
                            self.expect(Token::RParen)?;
                            x = Expr::new(x.pos, ExprKind::TypeAssert { base: Box::new(x) });
                        }
                        _ => return Err(self.unexpected("selector or type assertion")),
                    }
                }
                Token::LBrack => {
                    self.bump();
                    self.expr_lev += 1;
                    let result = self.parse_index_suffix(x);
                    self.expr_lev -= 1;
                    x = result?;
                }
                Token::LParen => {
                    self.bump();
                    self.expr_lev += 1;
                    let result = self.parse_call_args();
                    self.expr_lev -= 1;
                    let (args, ellipsis) = result?;
                    x = Expr::new(
                        x.pos,
                        ExprKind::Call {
                            func: Box::new(x),
                            args,
                            ellipsis,
                        },
                    );
                }
                Token::LBrace => {
                    if is_literal_type(&x) && (self.expr_lev >= 0 || !is_type_name(&x)) {
                        x = self.parse_composite(x)?;
                    } else {
                        return Ok(x);
                    }
                }
                _ => return Ok(x),
            }
        }
    }

    fn parse_index_suffix(&mut self, base: Expr) -> PResult<Expr> {
        let slice = |base: Expr| {
            Expr::new(
                base.pos,
                ExprKind::Slice {
                    base: Box::new(base),
                },
            )
        };
        if self.at(&Token::Colon) {
            while !self.at(&Token::RBrack) && !self.at(&Token::Eof) {
                self.bump();
            }
            self.expect(Token::RBrack)?;
            return Ok(slice(base));
        }
        let index = self.parse_expr()?;
        if self.at(&Token::Colon) {
            while !self.at(&Token::RBrack) && !self.at(&Token::Eof) {
                self.bump();
            }
            self.expect(Token::RBrack)?;
            return Ok(slice(base));
        }
        self.expect(Token::RBrack)?;
        Ok(Expr::new(
            base.pos,
            ExprKind::Index {
                base: Box::new(base),
                index: Box::new(index),
            },
        ))
    }

    fn parse_call_args(&mut self) -> PResult<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut ellipsis = false;
        while !self.at(&Token::RParen) && !self.at(&Token::Eof) {
            if self.at(&Token::AutoSemicolon) {
                let p = self.pos();
                return Err(self.error(p, "unexpected newline in argument list; possibly missing comma or )"));
            }
            args.push(self.parse_expr()?);
            if self.eat(&Token::Ellipsis) {
                ellipsis = true;
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if self.at(&Token::AutoSemicolon) {
            let p = self.pos();
            return Err(self.error(p, "unexpected newline in argument list; possibly missing comma or )"));
        }
        self.expect(Token::RParen)?;
        Ok((args, ellipsis))
    }

    fn parse_composite(&mut self, ty: Expr) -> PResult<Expr> {
        self.expect(Token::LBrace)?;
        self.expr_lev += 1;
        let result = self.parse_composite_elements();
        self.expr_lev -= 1;
        let elts = result?;
        Ok(Expr::new(
            ty.pos,
            ExprKind::Composite {
                ty: Box::new(ty),
                elts,
            },
        ))
    }

    fn parse_composite_elements(&mut self) -> PResult<Vec<Expr>> {
        let mut elts = Vec::new();
        while !self.at(&Token::RBrace) && !self.at(&Token::Eof) {
            if self.at(&Token::AutoSemicolon) {
                let p = self.pos();
                return Err(self.error(p, "unexpected newline in composite literal; possibly missing comma or }"));
            }
            if self.at(&Token::LBrace) {
                let p = self.pos();
                return Err(self.error(p, "composite literal with elided type is not supported"));
            }
            let elt = self.parse_expr()?;
            let elt = if self.eat(&Token::Colon) {
                let value = self.parse_expr()?;
                Expr::new(
                    elt.pos,
                    ExprKind::KeyValue {
                        key: Box::new(elt),
                        value: Box::new(value),
                    },
                )
            } else {
                elt
            };
            elts.push(elt);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if self.at(&Token::AutoSemicolon) {
            let p = self.pos();
            return Err(self.error(p, "unexpected newline in composite literal; possibly missing comma or }"));
        }
        self.expect(Token::RBrace)?;
        Ok(elts)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_block(&mut self) -> PResult<BlockStmt> {
        let pos = self.expect(Token::LBrace)?;
        let stmts = self.parse_stmt_list();
        self.expect(Token::RBrace)?;
        Ok(BlockStmt { pos, stmts })
    }

    fn parse_stmt_list(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at(&Token::RBrace) && !self.at(&Token::Eof) && !self.too_many_errors() {
            match self.parse_stmt() {
                Ok(Stmt {
                    kind: StmtKind::Empty,
                    ..
                }) => {}
                Ok(stmt) => stmts.push(stmt),
                Err(Bail) => self.sync_stmt(),
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        let kind = match self.peek() {
            Token::Var | Token::Const | Token::Type => {
                let decl = self.parse_gen_decl()?;
                self.expect_semi()?;
                StmtKind::Decl(decl)
            }
            Token::Import => {
                return Err(self.error(pos, "import is not allowed inside a function body"));
            }
            Token::LBrace => {
                let block = self.parse_block()?;
                self.expect_semi()?;
                StmtKind::Block(block)
            }
            Token::If => {
                let stmt = self.parse_if()?;
                self.expect_semi()?;
                return Ok(stmt);
            }
            Token::For => {
                let stmt = self.parse_for()?;
                self.expect_semi()?;
                return Ok(stmt);
            }
            Token::Switch | Token::Select => {
                let kind = if self.at(&Token::Switch) {
                    StmtKind::Switch
                } else {
                    StmtKind::Select
                };
                self.bump();
                while !self.at(&Token::LBrace) && !self.at(&Token::Eof) {
                    self.bump();
                }
                self.skip_braces()?;
                self.expect_semi()?;
                kind
            }
            Token::Return => {
                self.bump();
                let results = if self.at_semi() || self.at(&Token::RBrace) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect_semi()?;
                StmtKind::Return(results)
            }
            Token::Break | Token::Continue | Token::Goto | Token::Fallthrough => {
                let kind = match self.bump().token {
                    Token::Break => BranchKind::Break,
                    Token::Continue => BranchKind::Continue,
                    Token::Goto => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if matches!(self.peek(), Token::Ident(_)) {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                self.expect_semi()?;
                StmtKind::Branch { kind, label }
            }
            Token::Go | Token::Defer => {
                let is_go = self.at(&Token::Go);
                self.bump();
                let call = self.parse_expr()?;
                self.expect_semi()?;
                if is_go {
                    StmtKind::Go(call)
                } else {
                    StmtKind::Defer(call)
                }
            }
            Token::Semicolon | Token::AutoSemicolon => {
                self.bump();
                StmtKind::Empty
            }
            _ => {
                let stmt = self.parse_simple_stmt(true)?;
                if !matches!(stmt.kind, StmtKind::Labeled { .. }) {
                    self.expect_semi()?;
                }
                return Ok(stmt);
            }
        };
        Ok(Stmt { pos, kind })
    }

    fn parse_simple_stmt(&mut self, label_ok: bool) -> PResult<Stmt> {
        let pos = self.pos();
        let lhs = self.parse_expr_list()?;
        if let Some(op) = assign_op(self.peek()) {
            self.bump();
            if self.at(&Token::Range) && matches!(op, AssignOp::Assign | AssignOp::Define) {
                self.bump();
                self.parse_expr()?;
                let body = self.parse_block()?;
                return Ok(Stmt {
                    pos,
                    kind: StmtKind::Range(body),
                });
            }
            let rhs = self.parse_expr_list()?;
            return Ok(Stmt {
                pos,
                kind: StmtKind::Assign { lhs, op, rhs },
            });
        }
        match self.peek() {
            Token::Colon if label_ok && lhs.len() == 1 && matches!(lhs[0].kind, ExprKind::Ident(_)) => {
                self.bump();
                let label = match &lhs[0].kind {
                    ExprKind::Ident(name) => Ident {
                        name: name.clone(),
                        pos: lhs[0].pos,
                    },
                    _ => return Err(self.unexpected("label")),
                };
                let stmt = if self.at(&Token::RBrace) {
                    Stmt {
                        pos: self.pos(),
                        kind: StmtKind::Empty,
                    }
                } else {
                    self.parse_stmt()?
                };
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Labeled {
                        label,
                        stmt: Box::new(stmt),
                    },
                })
            }
            Token::Arrow => {
                self.bump();
                self.parse_expr()?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Send,
                })
            }
            Token::Inc | Token::Dec => {
                let inc = self.at(&Token::Inc);
                self.bump();
                let target = self.single(lhs)?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::IncDec { target, inc },
                })
            }
            _ => {
                let expr = self.single(lhs)?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    fn single(&mut self, mut list: Vec<Expr>) -> PResult<Expr> {
        if list.len() != 1 {
            let pos = list.get(1).map_or_else(|| self.pos(), |e| e.pos);
            return Err(self.error(pos, format!("expected 1 expression, found {}", list.len())));
        }
        Ok(list.remove(0))
    }

    fn header_cond(&mut self, stmt: Stmt, what: &str) -> PResult<Expr> {
        match stmt.kind {
            StmtKind::Expr(e) => Ok(e),
            _ => Err(self.error(stmt.pos, format!("cannot use a statement as {what} condition"))),
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::If)?;
        let prev = std::mem::replace(&mut self.expr_lev, -1);
        let header = self.parse_if_header();
        self.expr_lev = prev;
        let (init, cond) = header?;
        let body = self.parse_block()?;
        let els = if self.eat(&Token::Else) {
            match self.peek() {
                Token::If => Some(Box::new(self.parse_if()?)),
                Token::LBrace => {
                    let block_pos = self.pos();
                    let block = self.parse_block()?;
                    Some(Box::new(Stmt {
                        pos: block_pos,
                        kind: StmtKind::Block(block),
                    }))
                }
                _ => return Err(self.unexpected("if statement or block")),
            }
        } else {
            None
        };
        Ok(Stmt {
            pos,
            kind: StmtKind::If {
                init,
                cond,
                body,
                els,
            },
        })
    }

    fn parse_if_header(&mut self) -> PResult<(Option<Box<Stmt>>, Expr)> {
        if self.at(&Token::LBrace) {
            let p = self.pos();
            return Err(self.error(p, "missing condition in if statement"));
        }
        let first = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_simple_stmt(false)?)
        };
        if self.eat(&Token::Semicolon) {
            if self.at(&Token::LBrace) {
                let p = self.pos();
                return Err(self.error(p, "missing condition in if statement"));
            }
            let cond = self.parse_expr()?;
            return Ok((first.map(Box::new), cond));
        }
        match first {
            Some(stmt) => Ok((None, self.header_cond(stmt, "if")?)),
            None => Err(self.unexpected("condition")),
        }
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::For)?;
        let prev = std::mem::replace(&mut self.expr_lev, -1);
        let header = self.parse_for_header();
        self.expr_lev = prev;
        let header = header?;
        let body = self.parse_block()?;
        let kind = match header {
            ForHeader::Range => StmtKind::Range(body),
            ForHeader::Clauses { init, cond, post } => StmtKind::For {
                init,
                cond,
                post,
                body,
            },
        };
        Ok(Stmt { pos, kind })
    }

    fn parse_for_header(&mut self) -> PResult<ForHeader> {
        if self.at(&Token::LBrace) {
            return Ok(ForHeader::Clauses {
                init: None,
                cond: None,
                post: None,
            });
        }
        if self.eat(&Token::Range) {
            self.parse_expr()?;
            return Ok(ForHeader::Range);
        }
        let first = if self.at(&Token::Semicolon) {
            None
        } else {
            let pos = self.pos();
            let lhs = self.parse_expr_list()?;
            if let Some(op) = assign_op(self.peek()) {
                self.bump();
                if self.eat(&Token::Range) {
                    self.parse_expr()?;
                    return Ok(ForHeader::Range);
                }
                let rhs = self.parse_expr_list()?;
                Some(Stmt {
                    pos,
                    kind: StmtKind::Assign { lhs, op, rhs },
                })
            } else if matches!(self.peek(), Token::Inc | Token::Dec) {
                let inc = self.at(&Token::Inc);
                self.bump();
                let target = self.single(lhs)?;
                Some(Stmt {
                    pos,
                    kind: StmtKind::IncDec { target, inc },
                })
            } else {
                let expr = self.single(lhs)?;
                Some(Stmt {
                    pos,
                    kind: StmtKind::Expr(expr),
                })
            }
        };

        if self.eat(&Token::Semicolon) {
            let cond = if self.at(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(Token::Semicolon)?;
            let post = if self.at(&Token::LBrace) {
                None
            } else {
                Some(Box::new(self.parse_simple_stmt(false)?))
            };
            return Ok(ForHeader::Clauses {
                init: first.map(Box::new),
                cond,
                post,
            });
        }

        let cond = match first {
            Some(stmt) => Some(self.header_cond(stmt, "for")?),
            None => None,
        };
        Ok(ForHeader::Clauses {
            init: None,
            cond,
            post: None,
        })
    }
}

enum ForHeader {
    Range,
    Clauses {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
    },
}

//! Tokenization of Kage source using logos.
//!
//! Newlines are significant: [`tokenize`] turns them into automatic
//! semicolons after the same tokens a Go-style grammar terminates lines
//! on (identifiers, literals, `break`/`continue`/`return`, `++`/`--` and
//! closing brackets).

use std::fmt;

use logos::Logos;

use crate::ast::Pos;

/// A Kage token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("\n")]
    Newline,
    #[token("/*", block_comment)]
    BlockComment(bool),

    // Keywords
    #[token("break")]
    Break,
    #[token("case")]
    Case,
    #[token("chan")]
    Chan,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("defer")]
    Defer,
    #[token("else")]
    Else,
    #[token("fallthrough")]
    Fallthrough,
    #[token("for")]
    For,
    #[token("func")]
    Func,
    #[token("go")]
    Go,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("package")]
    Package,
    #[token("range")]
    Range,
    #[token("return")]
    Return,
    #[token("select")]
    Select,
    #[token("struct")]
    Struct,
    #[token("switch")]
    Switch,
    #[token("type")]
    Type,
    #[token("var")]
    Var,

    // Literals
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9][0-9_]*|0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+", |lex| lex.slice().to_string())]
    Int(String),
    #[regex(
        r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?|\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?|[0-9][0-9_]*[eE][+-]?[0-9_]+",
        |lex| lex.slice().to_string()
    )]
    Float(String),
    #[regex(
        r"([0-9][0-9_]*|[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9_]+)?|\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?|[0-9][0-9_]*[eE][+-]?[0-9_]+)i",
        |lex| lex.slice().to_string()
    )]
    Imag(String),
    #[regex(r"'([^'\\\n]|\\[^\n])+'", |lex| lex.slice().to_string())]
    Char(String),
    #[regex(r#""([^"\\\n]|\\[^\n])*""#, |lex| lex.slice().to_string())]
    #[regex(r"`[^`]*`", |lex| lex.slice().to_string())]
    String(String),

    // Operators
    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Quo,
    #[token("%")]
    Rem,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AndNot,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    QuoAssign,
    #[token("%=")]
    RemAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&^=")]
    AndNotAssign,
    #[token("&&")]
    LAnd,
    #[token("||")]
    LOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("==")]
    Eql,
    #[token("<")]
    Lss,
    #[token(">")]
    Gtr,
    #[token("=")]
    Assign,
    #[token("!")]
    Not,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Leq,
    #[token(">=")]
    Geq,
    #[token(":=")]
    Define,
    #[token("...")]
    Ellipsis,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    /// Inserted at line ends; never produced by logos directly.
    AutoSemicolon,
    Eof,
}

impl Token {
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Imag(_)
                | Token::Char(_)
                | Token::String(_)
                | Token::Break
                | Token::Continue
                | Token::Fallthrough
                | Token::Return
                | Token::Inc
                | Token::Dec
                | Token::RParen
                | Token::RBrack
                | Token::RBrace
        )
    }

    /// `true` for both explicit and inserted semicolons.
    pub fn is_semicolon(&self) -> bool {
        matches!(self, Token::Semicolon | Token::AutoSemicolon)
    }
}

/// Consumes a `/* ... */` comment up to the first `*/`. The payload records
/// whether the comment spans a newline; an unterminated comment is an error.
fn block_comment(lex: &mut logos::Lexer<'_, Token>) -> Option<bool> {
    let end = lex.remainder().find("*/")?;
    let multiline = lex.remainder()[..end].contains('\n');
    lex.bump(end + 2);
    Some(multiline)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Ident(s)
            | Token::Int(s)
            | Token::Float(s)
            | Token::Imag(s)
            | Token::Char(s)
            | Token::String(s) => return f.write_str(s),
            Token::Newline | Token::AutoSemicolon => "newline",
            Token::BlockComment(_) => "comment",
            Token::Break => "break",
            Token::Case => "case",
            Token::Chan => "chan",
            Token::Const => "const",
            Token::Continue => "continue",
            Token::Default => "default",
            Token::Defer => "defer",
            Token::Else => "else",
            Token::Fallthrough => "fallthrough",
            Token::For => "for",
            Token::Func => "func",
            Token::Go => "go",
            Token::Goto => "goto",
            Token::If => "if",
            Token::Import => "import",
            Token::Interface => "interface",
            Token::Map => "map",
            Token::Package => "package",
            Token::Range => "range",
            Token::Return => "return",
            Token::Select => "select",
            Token::Struct => "struct",
            Token::Switch => "switch",
            Token::Type => "type",
            Token::Var => "var",
            Token::Add => "+",
            Token::Sub => "-",
            Token::Mul => "*",
            Token::Quo => "/",
            Token::Rem => "%",
            Token::And => "&",
            Token::Or => "|",
            Token::Xor => "^",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::AndNot => "&^",
            Token::AddAssign => "+=",
            Token::SubAssign => "-=",
            Token::MulAssign => "*=",
            Token::QuoAssign => "/=",
            Token::RemAssign => "%=",
            Token::AndAssign => "&=",
            Token::OrAssign => "|=",
            Token::XorAssign => "^=",
            Token::ShlAssign => "<<=",
            Token::ShrAssign => ">>=",
            Token::AndNotAssign => "&^=",
            Token::LAnd => "&&",
            Token::LOr => "||",
            Token::Arrow => "<-",
            Token::Inc => "++",
            Token::Dec => "--",
            Token::Eql => "==",
            Token::Lss => "<",
            Token::Gtr => ">",
            Token::Assign => "=",
            Token::Not => "!",
            Token::Neq => "!=",
            Token::Leq => "<=",
            Token::Geq => ">=",
            Token::Define => ":=",
            Token::Ellipsis => "...",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrack => "[",
            Token::RBrack => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Period => ".",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Eof => "EOF",
        };
        f.write_str(s)
    }
}

/// A token with its source position.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

/// Maps byte offsets to 1-based line/column positions.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    pub(crate) fn pos(&self, offset: usize) -> Pos {
        let line = self.starts.partition_point(|&s| s <= offset);
        let start = self.starts[line.saturating_sub(1)];
        Pos {
            line: line as u32,
            col: (offset - start + 1) as u32,
        }
    }
}

/// Tokenizes `source`, inserting automatic semicolons.
///
/// Returns the token stream terminated by [`Token::Eof`], or the position
/// of the first character logos could not match.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, Pos> {
    let index = LineIndex::new(source);
    let mut out: Vec<Spanned> = Vec::new();
    let mut lexer = Token::lexer(source);

    let needs_semicolon =
        |out: &Vec<Spanned>| out.last().is_some_and(|t| t.token.ends_statement());

    while let Some(result) = lexer.next() {
        let pos = index.pos(lexer.span().start);
        let token = result.map_err(|()| pos)?;
        match token {
            Token::Newline | Token::BlockComment(true) => {
                if needs_semicolon(&out) {
                    out.push(Spanned {
                        token: Token::AutoSemicolon,
                        pos,
                    });
                }
            }
            Token::BlockComment(false) => {}
            token => out.push(Spanned { token, pos }),
        }
    }

    let end = index.pos(source.len());
    if needs_semicolon(&out) {
        out.push(Spanned {
            token: Token::AutoSemicolon,
            pos: end,
        });
    }
    out.push(Spanned {
        token: Token::Eof,
        pos: end,
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("func Fragment"),
            vec![
                Token::Func,
                Token::Ident("Fragment".into()),
                Token::AutoSemicolon,
                Token::Eof
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 1.5 .5 2. 1e3 0x1F 2i")[..7],
            [
                Token::Int("1".into()),
                Token::Float("1.5".into()),
                Token::Float(".5".into()),
                Token::Float("2.".into()),
                Token::Float("1e3".into()),
                Token::Int("0x1F".into()),
                Token::Imag("2i".into()),
            ]
        );
    }

    #[test]
    fn semicolon_insertion() {
        let toks = kinds("a := 1\nreturn\n}\nx +\ny");
        assert_eq!(
            toks,
            vec![
                Token::Ident("a".into()),
                Token::Define,
                Token::Int("1".into()),
                Token::AutoSemicolon,
                Token::Return,
                Token::AutoSemicolon,
                Token::RBrace,
                Token::AutoSemicolon,
                Token::Ident("x".into()),
                Token::Add,
                Token::Ident("y".into()),
                Token::AutoSemicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("a // trailing\n/* block */ b /* multi\nline */ c");
        assert_eq!(
            toks,
            vec![
                Token::Ident("a".into()),
                Token::AutoSemicolon,
                Token::Ident("b".into()),
                Token::AutoSemicolon,
                Token::Ident("c".into()),
                Token::AutoSemicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn block_comment_ends_at_first_close() {
        let toks = kinds("a /** doc **/ b /* x */ */");
        assert_eq!(toks[..3], [Token::Ident("a".into()), Token::Ident("b".into()), Token::Mul]);
        assert_eq!(tokenize("a /* open"), Err(Pos { line: 1, col: 3 }));
    }

    #[test]
    fn operators_prefer_longest_match() {
        assert_eq!(
            kinds("<<= &^ := ... <-")[..5],
            [
                Token::ShlAssign,
                Token::AndNot,
                Token::Define,
                Token::Ellipsis,
                Token::Arrow
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let toks = tokenize("package main\n\n  var x").unwrap();
        assert_eq!(toks[0].pos, Pos { line: 1, col: 1 });
        assert_eq!(toks[1].pos, Pos { line: 1, col: 9 });
        let var = toks.iter().find(|t| t.token == Token::Var).unwrap();
        assert_eq!(var.pos, Pos { line: 3, col: 3 });
    }

    #[test]
    fn illegal_character() {
        assert_eq!(tokenize("a @ b"), Err(Pos { line: 1, col: 3 }));
    }
}

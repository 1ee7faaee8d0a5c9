use std::fmt;

use crate::ast::Pos;

/// A diagnostic attached to a source position.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{pos}: {message}")]
pub struct SourceError {
    pub pos: Pos,
    pub message: String,
}

impl SourceError {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// Newline-separated list of diagnostics.
struct Joined<'a>(&'a [SourceError]);

impl fmt::Display for Joined<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while compiling a shader.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A malformed `//kage:` directive.
    #[error("{0}")]
    Directive(String),

    /// The source is not syntactically valid.
    #[error("{}", Joined(.0))]
    Syntax(Vec<SourceError>),

    /// The source parsed but failed type checking.
    #[error("{}", Joined(.0))]
    Semantic(Vec<SourceError>),
}

impl CompileError {
    /// The positioned diagnostics, empty for directive errors.
    pub fn errors(&self) -> &[SourceError] {
        match self {
            Self::Directive(_) => &[],
            Self::Syntax(errs) | Self::Semantic(errs) => errs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_lines() {
        let err = CompileError::Semantic(vec![
            SourceError::new(Pos { line: 1, col: 2 }, "first"),
            SourceError::new(Pos { line: 3, col: 4 }, "second"),
        ]);
        assert_eq!(err.to_string(), "1:2: first\n3:4: second");
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn directive_display() {
        let err = CompileError::Directive("shader: bad".into());
        assert_eq!(err.to_string(), "shader: bad");
        assert!(err.errors().is_empty());
    }
}

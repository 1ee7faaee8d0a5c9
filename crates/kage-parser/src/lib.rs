//! Kage shader front end.
//!
//! Parses Kage source text, a Go-like shading language, and lowers it to a
//! type-checked [`kage_ir::Program`]. The `//kage:unit` directive is read
//! from the file head before parsing.

pub mod ast;
mod directive;
mod error;
pub mod lexer;
mod lower;
mod parser;

pub use ast::Pos;
pub use directive::parse_directives;
pub use error::{CompileError, SourceError};
pub use parser::parse;

/// Compilation settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileOptions {
    /// Name of the vertex entry point function.
    pub vertex_entry: String,
    /// Name of the fragment entry point function.
    pub fragment_entry: String,
    /// Number of source textures, exposed as `__t0` … `__t{n-1}`.
    pub texture_count: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            vertex_entry: "Vertex".into(),
            fragment_entry: "Fragment".into(),
            texture_count: 0,
        }
    }
}

/// Compile Kage source into a shader program.
///
/// All diagnostics of the failing stage are returned together.
pub fn compile(source: &str, options: &CompileOptions) -> Result<kage_ir::Program, CompileError> {
    let unit = parse_directives(source)?;
    let file = parse(source).map_err(CompileError::Syntax)?;
    log::debug!("parsed {} top-level declaration(s)", file.decls.len());
    let program = lower::lower_file(&file, options, unit).map_err(CompileError::Semantic)?;
    log::debug!(
        "compiled program: {} uniform(s), {} texture(s), unit {}",
        program.uniforms.len(),
        program.texture_count,
        program.unit
    );
    Ok(program)
}

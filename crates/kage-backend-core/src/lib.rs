#![warn(missing_docs)]
//! Backend trait and plugin architecture for Kage.
//!
//! Defines the [`Backend`] trait that all shader emitters implement,
//! along with supporting types ([`BackendOptions`], [`BackendOutput`],
//! [`BackendError`]) and a [`BackendRegistry`] for CLI dispatch. The
//! [`writer`] module holds the statement and expression lowering shared by
//! the C-like targets.

use std::fmt::{self, Debug};

use kage_ir::Program;

pub mod writer;

/// GLSL dialect emitted by the GLSL backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlslVersion {
    /// Desktop GLSL (`#version 150`).
    #[default]
    Default,
    /// GLSL ES 3.00 (`#version 300 es`).
    Es300,
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Es300 => "es300",
        })
    }
}

/// A backend that translates a Kage program to target-specific output.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "GLSL").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Translate a checked program to backend-specific output.
    fn compile(
        &self,
        program: &Program,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Options passed to a backend during compilation.
///
/// Backends ignore options that do not concern their target.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// GLSL dialect; only read by the GLSL backend.
    pub glsl_version: GlslVersion,
}

impl fmt::Display for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendOptions {{ glsl_version: {} }}", self.glsl_version)
    }
}

/// The output produced by a backend.
#[derive(Clone, Debug)]
pub struct BackendOutput {
    /// One or more output files.
    pub files: Vec<OutputFile>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl BackendOutput {
    /// Looks up a file's source text by name.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.content.as_str())
    }
}

impl fmt::Display for BackendOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} diagnostic(s)",
            self.files.len(),
            self.diagnostics.len()
        )
    }
}

/// A single output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    /// Suggested filename (e.g. "shader.frag", "program.ir").
    pub name: String,
    /// Generated source text.
    pub content: String,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A non-fatal note from a backend, such as the HLSL uniform layout.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors that can occur during backend compilation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The program uses an IR feature not supported by this backend.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The program violates an IR invariant.
    #[error(transparent)]
    Ir(#[from] kage_ir::IrError),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// Registry of available backends, used for CLI `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(IrDumpBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        log::debug!("registered backend {} ({:?})", backend.name(), backend.targets());
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that dumps the IR as text using [`kage_ir::dump_program`].
#[derive(Debug)]
pub struct IrDumpBackend;

impl Backend for IrDumpBackend {
    fn name(&self) -> &str {
        "IR Dump"
    }

    fn targets(&self) -> &[&str] {
        &["ir-dump", "ir"]
    }

    fn compile(
        &self,
        program: &Program,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let text = kage_ir::dump_program(program);
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "program.ir".into(),
                content: text,
            }],
            diagnostics: vec![],
        })
    }
}

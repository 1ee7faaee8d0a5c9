//! Error types for the Kage IR.

/// Errors that can occur when constructing or inspecting IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// An array type was built without exactly one element type.
    #[error("array type must have exactly one element type, found {0}")]
    BadArrayElement(usize),

    /// A local variable index does not resolve inside the given function.
    #[error("local variable index {index} out of range (function has {count} variables)")]
    BadLocalIndex { index: usize, count: usize },

    /// A uniform value slice does not match the program layout.
    #[error("uniform data has {found} dwords, expected {expected}")]
    UniformSizeMismatch { expected: usize, found: usize },
}

//! Kage intermediate representation.
//!
//! A typed tree IR for shader programs: uniforms, attributes, varyings,
//! helper functions and the vertex/fragment entry blocks. Local variables
//! are numbered per function so that every backend can name them `l{n}`.

mod constant;
mod display;
mod error;
mod expr;
mod program;
mod stmt;
mod types;

pub use constant::{ConstKind, ConstType, Constant};
pub use display::dump_program;
pub use error::IrError;
pub use expr::{BuiltinFunc, Expr, Op};
pub use program::{Func, Program, Unit, uniform_offsets_in_dwords};
pub use stmt::{Block, ForLoop, Stmt, walk_exprs};
pub use types::{BasicType, Type, float_vector, int_vector};

/// Returns `true` if `s` is a valid swizzle selector: one to four
/// components drawn from a single set among `xyzw`, `rgba` and `stpq`.
pub fn is_valid_swizzling(s: &str) -> bool {
    const SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];
    if s.is_empty() || s.len() > 4 {
        return false;
    }
    SETS.iter()
        .any(|set| s.chars().all(|c| set.contains(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzles() {
        assert!(is_valid_swizzling("x"));
        assert!(is_valid_swizzling("xyzw"));
        assert!(is_valid_swizzling("bgra"));
        assert!(is_valid_swizzling("stpq"));
        assert!(!is_valid_swizzling("xg"));
        assert!(!is_valid_swizzling("xyzwx"));
        assert!(!is_valid_swizzling(""));
        assert!(!is_valid_swizzling("foo"));
    }
}

//! Type resolution and the operator typing rules.

use kage_ir::{BasicType, ConstKind, Constant, Op, Type};

use super::{LResult, Lowerer};
use crate::ast::{self, ExprKind};

/// Names of the predeclared types.
pub(super) fn builtin_type(name: &str) -> Option<Type> {
    let main = match name {
        "bool" => BasicType::Bool,
        "int" => BasicType::Int,
        "float" => BasicType::Float,
        "vec2" => BasicType::Vec2,
        "vec3" => BasicType::Vec3,
        "vec4" => BasicType::Vec4,
        "ivec2" => BasicType::IVec2,
        "ivec3" => BasicType::IVec3,
        "ivec4" => BasicType::IVec4,
        "mat2" => BasicType::Mat2,
        "mat3" => BasicType::Mat3,
        "mat4" => BasicType::Mat4,
        _ => return None,
    };
    Some(Type::basic(main))
}

/// The type an untyped constant takes when nothing else decides.
pub(super) fn default_type(value: &Constant) -> Type {
    match value.kind() {
        ConstKind::Bool => Type::BOOL,
        ConstKind::Int => Type::INT,
        ConstKind::Float => Type::FLOAT,
    }
}

/// The scalar type an untyped constant adopts next to an operand of type `t`.
pub(super) fn scalar_of(t: &Type) -> Option<Type> {
    if t.is_float_based() {
        Some(Type::FLOAT)
    } else if t.is_integral() {
        Some(Type::INT)
    } else if t.main == BasicType::Bool {
        Some(Type::BOOL)
    } else {
        None
    }
}

fn is_numeric(t: &Type) -> bool {
    t.is_float_based() || t.is_integral()
}

/// `true` for float vectors and matrices, the types a float scalar broadcasts to.
fn is_float_aggregate(t: &Type) -> bool {
    t.is_float_vector() || t.is_matrix()
}

/// Result type of a binary operator over two concrete operand types.
pub(super) fn binary_op_type(op: Op, lhs: &Type, rhs: &Type) -> Option<Type> {
    let int = lhs.main == BasicType::Int;
    let float = lhs.main == BasicType::Float;
    let r_int = rhs.main == BasicType::Int;
    let r_float = rhs.main == BasicType::Float;

    match op {
        Op::AndAnd | Op::OrOr => {
            (lhs.main == BasicType::Bool && rhs.main == BasicType::Bool).then_some(Type::BOOL)
        }
        Op::LessThanOp | Op::LessThanEqualOp | Op::GreaterThanOp | Op::GreaterThanEqualOp => {
            (lhs == rhs && (int || float)).then_some(Type::BOOL)
        }
        Op::EqualOp | Op::NotEqualOp => {
            (lhs == rhs && (int || float || lhs.main == BasicType::Bool)).then_some(Type::BOOL)
        }
        Op::VectorEqualOp | Op::VectorNotEqualOp => {
            (lhs == rhs && lhs.is_vector()).then_some(Type::BOOL)
        }
        Op::LeftShift | Op::RightShift => {
            if int && r_int {
                Some(Type::INT)
            } else if lhs.is_int_vector() && (r_int || lhs == rhs) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        Op::And | Op::Or | Op::Xor | Op::ModOp => {
            if lhs == rhs && lhs.is_integral() {
                Some(lhs.clone())
            } else if lhs.is_int_vector() && r_int {
                Some(lhs.clone())
            } else if int && rhs.is_int_vector() {
                Some(rhs.clone())
            } else {
                None
            }
        }
        Op::Add | Op::Sub | Op::ComponentWiseMul | Op::Div => {
            if lhs == rhs && is_numeric(lhs) {
                if op == Op::Div && lhs.is_matrix() {
                    return None;
                }
                Some(lhs.clone())
            } else if float && is_float_aggregate(rhs) {
                Some(rhs.clone())
            } else if is_float_aggregate(lhs) && r_float {
                Some(lhs.clone())
            } else if int && rhs.is_int_vector() {
                Some(rhs.clone())
            } else if lhs.is_int_vector() && r_int {
                Some(lhs.clone())
            } else {
                None
            }
        }
        Op::MatrixMul => {
            let n = lhs.vector_element_count();
            if lhs.is_matrix() && lhs == rhs {
                Some(lhs.clone())
            } else if lhs.is_float_vector() && rhs.is_matrix() && rhs.vector_element_count() == n {
                Some(lhs.clone())
            } else if lhs.is_matrix() && rhs.is_float_vector() && rhs.vector_element_count() == n {
                Some(rhs.clone())
            } else if float && rhs.is_matrix() {
                Some(rhs.clone())
            } else if lhs.is_matrix() && r_float {
                Some(lhs.clone())
            } else {
                None
            }
        }
        Op::NotOp => None,
    }
}

/// Whether a value of type `src` may be stored into `target`.
///
/// `value` is the constant when the source is an untyped constant.
pub(super) fn can_assign(target: &Type, src: &Type, value: Option<&Constant>) -> bool {
    if src.is_none() {
        if let Some(c) = value {
            return match target.main {
                BasicType::Bool => c.kind() == ConstKind::Bool,
                BasicType::Int => c.kind() != ConstKind::Bool && c.is_integral(),
                BasicType::Float => c.kind() != ConstKind::Bool,
                _ => false,
            };
        }
    }
    target == src
}

/// Component index of a swizzle letter.
pub(super) fn swizzle_index(c: char) -> usize {
    match c {
        'x' | 'r' | 's' => 0,
        'y' | 'g' | 't' => 1,
        'z' | 'b' | 'p' => 2,
        _ => 3,
    }
}

/// Result type of swizzling a value of type `base` with `sel`.
pub(super) fn swizzle_type(base: &Type, sel: &str) -> Option<Type> {
    if !kage_ir::is_valid_swizzling(sel) || !base.is_vector() {
        return None;
    }
    let n = base.vector_element_count();
    if sel.chars().any(|c| swizzle_index(c) >= n) {
        return None;
    }
    match (sel.len(), base.is_float_vector()) {
        (1, true) => Some(Type::FLOAT),
        (1, false) => Some(Type::INT),
        (len, true) => kage_ir::float_vector(len),
        (len, false) => kage_ir::int_vector(len),
    }
}

impl Lowerer<'_> {
    /// Resolves a type expression.
    pub(super) fn resolve_type(&mut self, expr: &ast::Expr) -> LResult<Type> {
        let (t, inferred) = self.resolve_type_inner(expr, false)?;
        debug_assert!(!inferred);
        Ok(t)
    }

    /// Resolves a composite literal type; `[...]T` yields a zero length
    /// and `true`.
    pub(super) fn resolve_literal_type(&mut self, expr: &ast::Expr) -> LResult<(Type, bool)> {
        self.resolve_type_inner(expr, true)
    }

    fn resolve_type_inner(&mut self, expr: &ast::Expr, allow_infer: bool) -> LResult<(Type, bool)> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Ident(name) => {
                if let Some(t) = self.lookup_type(name) {
                    return Ok((t, false));
                }
                if name == "sampler2d" || name == "texture2d" {
                    return Err(self.error(pos, "texture-typed variables are not supported"));
                }
                Err(self.error(pos, format!("unexpected type: {name}")))
            }
            ExprKind::Paren(inner) => self.resolve_type_inner(inner, allow_infer),
            ExprKind::ArrayType { len, elem } => {
                let elem_ty = self.resolve_type(elem)?;
                if elem_ty.main == BasicType::Array {
                    return Err(self.error(pos, "array of array is not implemented"));
                }
                let Some(len) = len else {
                    if allow_infer {
                        return Ok((Type::array(elem_ty, 0), true));
                    }
                    return Err(self.error(pos, "invalid use of [...] array (outside a composite literal)"));
                };
                let length = self.array_length(len)?;
                Ok((Type::array(elem_ty, length), false))
            }
            ExprKind::StructType(_) => Err(self.error(pos, "struct is not implemented")),
            ExprKind::SliceType(_) => Err(self.error(pos, "slice types are not supported")),
            ExprKind::MapType => Err(self.error(pos, "map types are not supported")),
            ExprKind::ChanType => Err(self.error(pos, "channel types are not supported")),
            ExprKind::InterfaceType => Err(self.error(pos, "interface types are not supported")),
            ExprKind::FuncType => Err(self.error(pos, "function types are not supported")),
            ExprKind::Unary {
                op: ast::UnaryOp::Deref,
                ..
            } => Err(self.error(pos, "pointer types are not supported")),
            _ => Err(self.error(pos, format!("unexpected type: {expr}"))),
        }
    }

    fn array_length(&mut self, len: &ast::Expr) -> LResult<usize> {
        let mut stmts = Vec::new();
        let value = self.lower_value(len, &mut stmts)?;
        let length = value
            .expr
            .constant()
            .filter(|c| c.kind() != ConstKind::Bool)
            .and_then(Constant::to_i64)
            .filter(|&n| n >= 0)
            .and_then(|n| usize::try_from(n).ok());
        match length {
            Some(n) if stmts.is_empty() && (value.ty.is_none() || value.ty == Type::INT) => Ok(n),
            _ => Err(self.error(
                len.pos,
                format!("array length must be a non-negative integer constant: {len}"),
            )),
        }
    }

    fn lookup_type(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(t) = scope.find_type(name) {
                return Some(t.clone());
            }
        }
        if let Some(t) = self.global.find_type(name) {
            return Some(t.clone());
        }
        builtin_type(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(main: BasicType) -> Type {
        Type::basic(main)
    }

    #[test]
    fn arithmetic_broadcasts() {
        let v3 = t(BasicType::Vec3);
        assert_eq!(binary_op_type(Op::Add, &v3, &v3), Some(v3.clone()));
        assert_eq!(binary_op_type(Op::ComponentWiseMul, &Type::FLOAT, &v3), Some(v3.clone()));
        assert_eq!(binary_op_type(Op::Div, &v3, &Type::FLOAT), Some(v3.clone()));
        assert_eq!(binary_op_type(Op::Add, &Type::INT, &v3), None);
        let iv2 = t(BasicType::IVec2);
        assert_eq!(binary_op_type(Op::Sub, &Type::INT, &iv2), Some(iv2.clone()));
        assert_eq!(binary_op_type(Op::Add, &Type::INT, &Type::FLOAT), None);
    }

    #[test]
    fn matrix_division_is_illegal() {
        let m = t(BasicType::Mat3);
        assert_eq!(binary_op_type(Op::Div, &m, &m), None);
        assert_eq!(binary_op_type(Op::Add, &m, &m), Some(m));
    }

    #[test]
    fn matrix_multiplication() {
        let m2 = t(BasicType::Mat2);
        let v2 = t(BasicType::Vec2);
        let v3 = t(BasicType::Vec3);
        assert_eq!(binary_op_type(Op::MatrixMul, &v2, &m2), Some(v2.clone()));
        assert_eq!(binary_op_type(Op::MatrixMul, &m2, &v2), Some(v2));
        assert_eq!(binary_op_type(Op::MatrixMul, &m2, &m2), Some(m2.clone()));
        assert_eq!(binary_op_type(Op::MatrixMul, &v3, &m2), None);
        assert_eq!(binary_op_type(Op::MatrixMul, &Type::FLOAT, &m2), Some(m2));
    }

    #[test]
    fn comparisons_and_logic() {
        let v2 = t(BasicType::Vec2);
        assert_eq!(binary_op_type(Op::LessThanOp, &Type::FLOAT, &Type::FLOAT), Some(Type::BOOL));
        assert_eq!(binary_op_type(Op::LessThanOp, &v2, &v2), None);
        assert_eq!(binary_op_type(Op::VectorEqualOp, &v2, &v2), Some(Type::BOOL));
        assert_eq!(binary_op_type(Op::EqualOp, &t(BasicType::Mat2), &t(BasicType::Mat2)), None);
        assert_eq!(binary_op_type(Op::AndAnd, &Type::BOOL, &Type::BOOL), Some(Type::BOOL));
        assert_eq!(binary_op_type(Op::OrOr, &Type::BOOL, &Type::INT), None);
    }

    #[test]
    fn integer_operators() {
        let iv3 = t(BasicType::IVec3);
        assert_eq!(binary_op_type(Op::ModOp, &iv3, &Type::INT), Some(iv3.clone()));
        assert_eq!(binary_op_type(Op::And, &Type::FLOAT, &Type::FLOAT), None);
        assert_eq!(binary_op_type(Op::LeftShift, &Type::INT, &Type::INT), Some(Type::INT));
        assert_eq!(binary_op_type(Op::LeftShift, &iv3, &iv3), Some(iv3.clone()));
        assert_eq!(binary_op_type(Op::RightShift, &Type::INT, &iv3), None);
    }

    #[test]
    fn assignability_of_untyped_constants() {
        assert!(can_assign(&Type::FLOAT, &Type::NONE, Some(&Constant::int(1))));
        assert!(can_assign(&Type::INT, &Type::NONE, Some(&Constant::ratio(4, 2))));
        assert!(!can_assign(&Type::INT, &Type::NONE, Some(&Constant::ratio(3, 2))));
        assert!(!can_assign(&Type::BOOL, &Type::NONE, Some(&Constant::int(0))));
        assert!(!can_assign(&t(BasicType::Vec2), &Type::NONE, Some(&Constant::int(1))));
        assert!(!can_assign(&Type::FLOAT, &Type::INT, None));
    }

    #[test]
    fn swizzles_respect_vector_size() {
        let v2 = t(BasicType::Vec2);
        let v4 = t(BasicType::Vec4);
        assert_eq!(swizzle_type(&v4, "xyz"), Some(t(BasicType::Vec3)));
        assert_eq!(swizzle_type(&v2, "xyw"), None);
        assert_eq!(swizzle_type(&t(BasicType::IVec3), "b"), Some(Type::INT));
        assert_eq!(swizzle_type(&Type::FLOAT, "x"), None);
    }
}

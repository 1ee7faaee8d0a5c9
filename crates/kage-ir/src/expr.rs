//! Expression nodes.

use std::fmt;

use crate::constant::{ConstType, Constant};

/// Operators. Most map one-to-one to source tokens; multiplication and
/// (in)equality are split by operand shape during analysis.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Op {
    Add,
    Sub,
    NotOp,
    ComponentWiseMul,
    MatrixMul,
    Div,
    ModOp,
    LeftShift,
    RightShift,
    LessThanOp,
    LessThanEqualOp,
    GreaterThanOp,
    GreaterThanEqualOp,
    EqualOp,
    NotEqualOp,
    VectorEqualOp,
    VectorNotEqualOp,
    And,
    Xor,
    Or,
    AndAnd,
    OrOr,
}

impl Op {
    /// Source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::NotOp => "!",
            Self::ComponentWiseMul | Self::MatrixMul => "*",
            Self::Div => "/",
            Self::ModOp => "%",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::LessThanOp => "<",
            Self::LessThanEqualOp => "<=",
            Self::GreaterThanOp => ">",
            Self::GreaterThanEqualOp => ">=",
            Self::EqualOp | Self::VectorEqualOp => "==",
            Self::NotEqualOp | Self::VectorNotEqualOp => "!=",
            Self::And => "&",
            Self::Xor => "^",
            Self::Or => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
        }
    }

    /// `<`, `<=`, `>`, `>=`, `==` or `!=` on scalars.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::LessThanOp
                | Self::LessThanEqualOp
                | Self::GreaterThanOp
                | Self::GreaterThanEqualOp
                | Self::EqualOp
                | Self::NotEqualOp
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builtin functions of the shader language.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BuiltinFunc {
    Len,
    Cap,
    BoolF,
    IntF,
    FloatF,
    Vec2F,
    Vec3F,
    Vec4F,
    IVec2F,
    IVec3F,
    IVec4F,
    Mat2F,
    Mat3F,
    Mat4F,
    Radians,
    Degrees,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Pow,
    Exp,
    Log,
    Exp2,
    Log2,
    Sqrt,
    Inversesqrt,
    Abs,
    Sign,
    Floor,
    Ceil,
    Fract,
    Mod,
    Min,
    Max,
    Clamp,
    Mix,
    Step,
    Smoothstep,
    Length,
    Distance,
    Dot,
    Cross,
    Normalize,
    Faceforward,
    Reflect,
    Refract,
    Transpose,
    Dfdx,
    Dfdy,
    Fwidth,
    DiscardF,
    TexelAt,
    FrontFacing,
}

const BUILTINS: &[(BuiltinFunc, &str)] = &[
    (BuiltinFunc::Len, "len"),
    (BuiltinFunc::Cap, "cap"),
    (BuiltinFunc::BoolF, "bool"),
    (BuiltinFunc::IntF, "int"),
    (BuiltinFunc::FloatF, "float"),
    (BuiltinFunc::Vec2F, "vec2"),
    (BuiltinFunc::Vec3F, "vec3"),
    (BuiltinFunc::Vec4F, "vec4"),
    (BuiltinFunc::IVec2F, "ivec2"),
    (BuiltinFunc::IVec3F, "ivec3"),
    (BuiltinFunc::IVec4F, "ivec4"),
    (BuiltinFunc::Mat2F, "mat2"),
    (BuiltinFunc::Mat3F, "mat3"),
    (BuiltinFunc::Mat4F, "mat4"),
    (BuiltinFunc::Radians, "radians"),
    (BuiltinFunc::Degrees, "degrees"),
    (BuiltinFunc::Sin, "sin"),
    (BuiltinFunc::Cos, "cos"),
    (BuiltinFunc::Tan, "tan"),
    (BuiltinFunc::Asin, "asin"),
    (BuiltinFunc::Acos, "acos"),
    (BuiltinFunc::Atan, "atan"),
    (BuiltinFunc::Atan2, "atan2"),
    (BuiltinFunc::Pow, "pow"),
    (BuiltinFunc::Exp, "exp"),
    (BuiltinFunc::Log, "log"),
    (BuiltinFunc::Exp2, "exp2"),
    (BuiltinFunc::Log2, "log2"),
    (BuiltinFunc::Sqrt, "sqrt"),
    (BuiltinFunc::Inversesqrt, "inversesqrt"),
    (BuiltinFunc::Abs, "abs"),
    (BuiltinFunc::Sign, "sign"),
    (BuiltinFunc::Floor, "floor"),
    (BuiltinFunc::Ceil, "ceil"),
    (BuiltinFunc::Fract, "fract"),
    (BuiltinFunc::Mod, "mod"),
    (BuiltinFunc::Min, "min"),
    (BuiltinFunc::Max, "max"),
    (BuiltinFunc::Clamp, "clamp"),
    (BuiltinFunc::Mix, "mix"),
    (BuiltinFunc::Step, "step"),
    (BuiltinFunc::Smoothstep, "smoothstep"),
    (BuiltinFunc::Length, "length"),
    (BuiltinFunc::Distance, "distance"),
    (BuiltinFunc::Dot, "dot"),
    (BuiltinFunc::Cross, "cross"),
    (BuiltinFunc::Normalize, "normalize"),
    (BuiltinFunc::Faceforward, "faceforward"),
    (BuiltinFunc::Reflect, "reflect"),
    (BuiltinFunc::Refract, "refract"),
    (BuiltinFunc::Transpose, "transpose"),
    (BuiltinFunc::Dfdx, "dfdx"),
    (BuiltinFunc::Dfdy, "dfdy"),
    (BuiltinFunc::Fwidth, "fwidth"),
    (BuiltinFunc::DiscardF, "discard"),
    (BuiltinFunc::TexelAt, "__texelAt"),
    (BuiltinFunc::FrontFacing, "frontfacing"),
];

impl BuiltinFunc {
    /// Looks up a builtin by its source name.
    ///
    /// `radians` and `degrees` exist in the IR but are not exposed to
    /// source.
    pub fn parse(name: &str) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(f, n)| *n == name && !matches!(f, Self::Radians | Self::Degrees))
            .map(|(f, _)| *f)
    }

    /// Source name of the builtin.
    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(f, _)| *f == self)
            .map_or("", |(_, n)| n)
    }

    /// Type constructors, including scalar conversions.
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Self::BoolF
                | Self::IntF
                | Self::FloatF
                | Self::Vec2F
                | Self::Vec3F
                | Self::Vec4F
                | Self::IVec2F
                | Self::IVec3F
                | Self::IVec4F
                | Self::Mat2F
                | Self::Mat3F
                | Self::Mat4F
        )
    }
}

impl fmt::Display for BuiltinFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// The blank identifier `_` on the left of an assignment.
    Blank,
    /// A folded constant with its type hint.
    Number { value: Constant, ty: ConstType },
    UniformVariable(usize),
    TextureVariable(usize),
    LocalVariable(usize),
    StructMember(usize),
    BuiltinFuncExpr(BuiltinFunc),
    /// Swizzle component letters, the right side of a field selector.
    SwizzlingExpr(String),
    /// A user function, by [`crate::Func::index`].
    FunctionExpr(usize),
    Unary { op: Op, operand: Box<Expr> },
    Binary {
        op: Op,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Selection {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    FieldSelector { base: Box<Expr>, field: Box<Expr> },
    Index { base: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    /// An untyped number.
    pub fn number(value: Constant) -> Self {
        Self::Number {
            value,
            ty: ConstType::None,
        }
    }

    /// A number whose hint follows its kind.
    pub fn typed_number(value: Constant) -> Self {
        let ty = match value.kind() {
            crate::ConstKind::Bool => ConstType::Bool,
            crate::ConstKind::Int => ConstType::Int,
            crate::ConstKind::Float => ConstType::Float,
        };
        Self::Number { value, ty }
    }

    pub fn constant(&self) -> Option<&Constant> {
        match self {
            Self::Number { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn binary(op: Op, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Unary { operand, .. } => vec![&**operand],
            Self::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            Self::Selection {
                cond,
                then,
                otherwise,
            } => vec![&**cond, &**then, &**otherwise],
            Self::Call { callee, args } => {
                let mut v = vec![&**callee];
                v.extend(args.iter());
                v
            }
            Self::FieldSelector { base, field } => vec![&**base, &**field],
            Self::Index { base, index } => vec![&**base, &**index],
            _ => vec![],
        }
    }

    /// Visits this expression and all sub-expressions, pre-order.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_round_trip() {
        for (f, name) in BUILTINS {
            assert_eq!(f.name(), *name);
            if !matches!(f, BuiltinFunc::Radians | BuiltinFunc::Degrees) {
                assert_eq!(BuiltinFunc::parse(name), Some(*f));
            }
        }
        assert_eq!(BuiltinFunc::parse("radians"), None);
        assert_eq!(BuiltinFunc::parse("texture"), None);
    }

    #[test]
    fn walk_visits_every_node() {
        let e = Expr::binary(
            Op::Add,
            Expr::LocalVariable(0),
            Expr::call(
                Expr::BuiltinFuncExpr(BuiltinFunc::Sin),
                vec![Expr::number(Constant::int(1))],
            ),
        );
        let mut count = 0;
        e.walk(&mut |_| count += 1);
        assert_eq!(count, 5);
    }

    #[test]
    fn op_spelling() {
        assert_eq!(Op::MatrixMul.to_string(), "*");
        assert_eq!(Op::VectorNotEqualOp.as_str(), "!=");
        assert!(Op::LessThanOp.is_comparison());
        assert!(!Op::AndAnd.is_comparison());
    }
}

//! Arbitrary-precision compile-time constants.
//!
//! Number literals are exact: integers are big integers and floats are
//! big rationals, so folding never loses precision until a value is
//! emitted into target source.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::Op;

/// Shift amounts above this are refused while folding.
const MAX_SHIFT: usize = 1024;

/// The kind of a [`Constant`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ConstKind {
    Bool,
    Int,
    Float,
}

impl fmt::Display for ConstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
        })
    }
}

/// The type hint attached to a number expression.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum ConstType {
    /// Untyped constant.
    #[default]
    None,
    Bool,
    Int,
    Float,
}

/// An exact constant value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Bool(bool),
    Int(BigInt),
    Float(BigRational),
}

impl Constant {
    pub fn int(v: i64) -> Self {
        Self::Int(BigInt::from(v))
    }

    /// A float constant from a ratio of two integers.
    pub fn ratio(numer: i64, denom: i64) -> Self {
        Self::Float(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    pub fn float_from_int(v: i64) -> Self {
        Self::Float(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn kind(&self) -> ConstKind {
        match self {
            Self::Bool(_) => ConstKind::Bool,
            Self::Int(_) => ConstKind::Int,
            Self::Float(_) => ConstKind::Float,
        }
    }

    /// Parses an integer literal (decimal, `0x`, `0o`, legacy octal, `0b`).
    pub fn parse_int(lit: &str) -> Option<Self> {
        let s: String = lit.chars().filter(|&c| c != '_').collect();
        let lower = s.to_ascii_lowercase();
        let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
            (rest, 16)
        } else if let Some(rest) = lower.strip_prefix("0o") {
            (rest, 8)
        } else if let Some(rest) = lower.strip_prefix("0b") {
            (rest, 2)
        } else if lower.len() > 1 && lower.starts_with('0') {
            (&lower[1..], 8)
        } else {
            (lower.as_str(), 10)
        };
        if digits.is_empty() {
            return None;
        }
        BigInt::parse_bytes(digits.as_bytes(), radix).map(Self::Int)
    }

    /// Parses a decimal float literal such as `1.5`, `.5`, `2.` or `1e-3`.
    pub fn parse_float(lit: &str) -> Option<Self> {
        let s: String = lit.chars().filter(|&c| c != '_').collect();
        let lower = s.to_ascii_lowercase();
        let (mantissa, exp) = match lower.split_once('e') {
            Some((m, e)) => (m, e.parse::<i64>().ok()?),
            None => (lower.as_str(), 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let digits = format!("{int_part}{frac_part}");
        let numer = BigInt::parse_bytes(digits.as_bytes(), 10)?;
        let scale = exp - i64::try_from(frac_part.len()).ok()?;
        let pow = BigInt::from(10).pow(u32::try_from(scale.unsigned_abs()).ok()?);
        let value = if scale >= 0 {
            BigRational::from_integer(numer * pow)
        } else {
            BigRational::new(numer, pow)
        };
        Some(Self::Float(value))
    }

    /// Converts to a float constant. Bools are not convertible.
    pub fn to_float(&self) -> Option<Self> {
        match self {
            Self::Bool(_) => None,
            Self::Int(i) => Some(Self::Float(BigRational::from_integer(i.clone()))),
            Self::Float(_) => Some(self.clone()),
        }
    }

    /// Converts to an int constant if the value is exactly integral.
    pub fn to_int(&self) -> Option<Self> {
        match self {
            Self::Bool(_) => None,
            Self::Int(_) => Some(self.clone()),
            Self::Float(r) if r.is_integer() => Some(Self::Int(r.to_integer())),
            Self::Float(_) => None,
        }
    }

    /// Truncates a number toward zero, the way an `int(x)` conversion of a
    /// non-constant value would.
    pub fn truncate(&self) -> Option<Self> {
        match self {
            Self::Bool(_) => None,
            Self::Int(_) => Some(self.clone()),
            Self::Float(r) => Some(Self::Int(r.to_integer())),
        }
    }

    pub fn is_integral(&self) -> bool {
        self.to_int().is_some()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self.to_int()? {
            Self::Int(i) => i.to_i64(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(_) => None,
            Self::Int(i) => i.to_f64(),
            Self::Float(r) => r.to_f64(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(_) => false,
            Self::Int(i) => i.is_zero(),
            Self::Float(r) => r.is_zero(),
        }
    }

    /// The sign of a number: -1, 0 or 1.
    pub fn signum(&self) -> i32 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(i) => sign_of(i.is_zero(), i.is_negative()),
            Self::Float(r) => sign_of(r.is_zero(), r.is_negative()),
        }
    }

    fn as_ratio(&self) -> Option<BigRational> {
        match self {
            Self::Bool(_) => None,
            Self::Int(i) => Some(BigRational::from_integer(i.clone())),
            Self::Float(r) => Some(r.clone()),
        }
    }

    /// Folds an arithmetic or bitwise binary operator.
    ///
    /// Operands of different numeric kinds are compared as floats. When
    /// both operands are ints, `Div` is truncating integer division.
    /// Returns `None` for illegal combinations and division by zero.
    pub fn binary(op: Op, lhs: &Self, rhs: &Self) -> Option<Self> {
        if let (Self::Int(a), Self::Int(b)) = (lhs, rhs) {
            return match op {
                Op::Add => Some(Self::Int(a + b)),
                Op::Sub => Some(Self::Int(a - b)),
                Op::ComponentWiseMul | Op::MatrixMul => Some(Self::Int(a * b)),
                Op::Div if b.is_zero() => None,
                Op::Div => Some(Self::Int(a / b)),
                Op::ModOp if b.is_zero() => None,
                Op::ModOp => Some(Self::Int(a % b)),
                Op::And => Some(Self::Int(a & b)),
                Op::Or => Some(Self::Int(a | b)),
                Op::Xor => Some(Self::Int(a ^ b)),
                Op::LeftShift | Op::RightShift => Self::shift(op, lhs, rhs),
                _ => None,
            };
        }
        if let (Self::Bool(a), Self::Bool(b)) = (lhs, rhs) {
            return match op {
                Op::AndAnd => Some(Self::Bool(*a && *b)),
                Op::OrOr => Some(Self::Bool(*a || *b)),
                _ => None,
            };
        }
        let (a, b) = (lhs.as_ratio()?, rhs.as_ratio()?);
        match op {
            Op::Add => Some(Self::Float(a + b)),
            Op::Sub => Some(Self::Float(a - b)),
            Op::ComponentWiseMul | Op::MatrixMul => Some(Self::Float(a * b)),
            Op::Div if b.is_zero() => None,
            Op::Div => Some(Self::Float(a / b)),
            _ => None,
        }
    }

    /// Folds `<<` or `>>`. The left operand must be integral and the
    /// shift count a non-negative integer.
    pub fn shift(op: Op, lhs: &Self, rhs: &Self) -> Option<Self> {
        let Self::Int(value) = lhs.to_int()? else {
            return None;
        };
        let count = rhs.to_i64()?;
        let count = usize::try_from(count).ok().filter(|&c| c <= MAX_SHIFT)?;
        match op {
            Op::LeftShift => Some(Self::Int(value << count)),
            Op::RightShift => Some(Self::Int(value >> count)),
            _ => None,
        }
    }

    /// Folds a comparison operator into a bool.
    pub fn compare(op: Op, lhs: &Self, rhs: &Self) -> Option<bool> {
        if let (Self::Bool(a), Self::Bool(b)) = (lhs, rhs) {
            return match op {
                Op::EqualOp => Some(a == b),
                Op::NotEqualOp => Some(a != b),
                _ => None,
            };
        }
        let ord = lhs.as_ratio()?.cmp(&rhs.as_ratio()?);
        match op {
            Op::EqualOp => Some(ord == Ordering::Equal),
            Op::NotEqualOp => Some(ord != Ordering::Equal),
            Op::LessThanOp => Some(ord == Ordering::Less),
            Op::LessThanEqualOp => Some(ord != Ordering::Greater),
            Op::GreaterThanOp => Some(ord == Ordering::Greater),
            Op::GreaterThanEqualOp => Some(ord != Ordering::Less),
            _ => None,
        }
    }

    /// Folds a unary operator (`+`, `-`, `!`).
    pub fn unary(op: Op, value: &Self) -> Option<Self> {
        match (op, value) {
            (Op::Add, Self::Int(_) | Self::Float(_)) => Some(value.clone()),
            (Op::Sub, Self::Int(i)) => Some(Self::Int(-i)),
            (Op::Sub, Self::Float(r)) => Some(Self::Float(-r)),
            (Op::NotOp, Self::Bool(b)) => Some(Self::Bool(!b)),
            _ => None,
        }
    }

    /// Renders the value as a literal accepted by GLSL, HLSL and MSL.
    ///
    /// Integral floats keep a `.0` suffix so the target parses them as
    /// floats; other floats use scientific notation.
    pub fn literal(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(r) if r.is_integer() => format!("{}.0", r.to_integer()),
            Self::Float(r) => format!("{:.10e}", r.to_f64().unwrap_or(0.0)),
        }
    }
}

fn sign_of(zero: bool, negative: bool) -> i32 {
    if zero {
        0
    } else if negative {
        -1
    } else {
        1
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(r) if r.denom().is_one() => write!(f, "{}", r.numer()),
            Self::Float(r) => write!(f, "{}", r.to_f64().unwrap_or(f64::NAN)),
        }
    }
}

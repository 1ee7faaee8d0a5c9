//! Type system for the Kage IR.

use std::fmt;

use crate::IrError;

/// The tag of a [`Type`].
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum BasicType {
    /// Absence of a type: no return value, an untyped constant, or a
    /// synthetic for-loop counter slot.
    #[default]
    None,
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
    Texture,
    Array,
    Struct,
}

/// A shader type.
///
/// `sub` holds the element type of an array or the member types of a
/// struct; no other tag carries sub types. `length` is only meaningful for
/// arrays.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Type {
    pub main: BasicType,
    pub sub: Vec<Type>,
    pub length: usize,
}

impl Type {
    pub const NONE: Self = Self::basic(BasicType::None);
    pub const BOOL: Self = Self::basic(BasicType::Bool);
    pub const INT: Self = Self::basic(BasicType::Int);
    pub const FLOAT: Self = Self::basic(BasicType::Float);

    /// A non-aggregate type.
    pub const fn basic(main: BasicType) -> Self {
        Self {
            main,
            sub: Vec::new(),
            length: 0,
        }
    }

    /// A fixed-length array of `elem`.
    pub fn array(elem: Type, length: usize) -> Self {
        Self {
            main: BasicType::Array,
            sub: vec![elem],
            length,
        }
    }

    /// Validates the tag/sub invariants.
    pub fn validate(&self) -> Result<(), IrError> {
        match self.main {
            BasicType::Array if self.sub.len() != 1 => Err(IrError::BadArrayElement(self.sub.len())),
            BasicType::Array | BasicType::Struct => {
                self.sub.iter().try_for_each(Type::validate)
            }
            _ if !self.sub.is_empty() => Err(IrError::BadArrayElement(self.sub.len())),
            _ => Ok(()),
        }
    }

    /// The element type of an array.
    pub fn elem(&self) -> Option<&Type> {
        match self.main {
            BasicType::Array => self.sub.first(),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.main == BasicType::None
    }

    pub fn is_float_vector(&self) -> bool {
        matches!(self.main, BasicType::Vec2 | BasicType::Vec3 | BasicType::Vec4)
    }

    pub fn is_int_vector(&self) -> bool {
        matches!(
            self.main,
            BasicType::IVec2 | BasicType::IVec3 | BasicType::IVec4
        )
    }

    pub fn is_vector(&self) -> bool {
        self.is_float_vector() || self.is_int_vector()
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.main, BasicType::Mat2 | BasicType::Mat3 | BasicType::Mat4)
    }

    /// `true` for `int` and integer vectors.
    pub fn is_integral(&self) -> bool {
        self.main == BasicType::Int || self.is_int_vector()
    }

    /// `true` for `float`, float vectors and matrices.
    pub fn is_float_based(&self) -> bool {
        self.main == BasicType::Float || self.is_float_vector() || self.is_matrix()
    }

    /// Number of components of a vector, or the dimension of a matrix.
    pub fn vector_element_count(&self) -> usize {
        match self.main {
            BasicType::Vec2 | BasicType::IVec2 | BasicType::Mat2 => 2,
            BasicType::Vec3 | BasicType::IVec3 | BasicType::Mat3 => 3,
            BasicType::Vec4 | BasicType::IVec4 | BasicType::Mat4 => 4,
            _ => 0,
        }
    }

    /// The unpacked size in 4-byte words.
    pub fn dword_count(&self) -> usize {
        match self.main {
            BasicType::Bool | BasicType::Int | BasicType::Float => 1,
            BasicType::Vec2 | BasicType::IVec2 => 2,
            BasicType::Vec3 | BasicType::IVec3 => 3,
            BasicType::Vec4 | BasicType::IVec4 | BasicType::Mat2 => 4,
            BasicType::Mat3 => 9,
            BasicType::Mat4 => 16,
            BasicType::Array => self.elem().map_or(0, Type::dword_count) * self.length,
            BasicType::Struct => self.sub.iter().map(Type::dword_count).sum(),
            BasicType::None | BasicType::Texture => 0,
        }
    }
}

/// The float vector type with `n` components.
pub fn float_vector(n: usize) -> Option<Type> {
    match n {
        2 => Some(Type::basic(BasicType::Vec2)),
        3 => Some(Type::basic(BasicType::Vec3)),
        4 => Some(Type::basic(BasicType::Vec4)),
        _ => None,
    }
}

/// The integer vector type with `n` components.
pub fn int_vector(n: usize) -> Option<Type> {
    match n {
        2 => Some(Type::basic(BasicType::IVec2)),
        3 => Some(Type::basic(BasicType::IVec3)),
        4 => Some(Type::basic(BasicType::IVec4)),
        _ => None,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.main {
            BasicType::None => f.write_str("none"),
            BasicType::Bool => f.write_str("bool"),
            BasicType::Int => f.write_str("int"),
            BasicType::Float => f.write_str("float"),
            BasicType::Vec2 => f.write_str("vec2"),
            BasicType::Vec3 => f.write_str("vec3"),
            BasicType::Vec4 => f.write_str("vec4"),
            BasicType::IVec2 => f.write_str("ivec2"),
            BasicType::IVec3 => f.write_str("ivec3"),
            BasicType::IVec4 => f.write_str("ivec4"),
            BasicType::Mat2 => f.write_str("mat2"),
            BasicType::Mat3 => f.write_str("mat3"),
            BasicType::Mat4 => f.write_str("mat4"),
            BasicType::Texture => f.write_str("texture2d"),
            BasicType::Array => match self.elem() {
                Some(elem) => write!(f, "[{}]{elem}", self.length),
                None => write!(f, "[{}]?", self.length),
            },
            BasicType::Struct => {
                f.write_str("struct{")?;
                for (i, t) in self.sub.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "M{i} {t}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Type::array(Type::FLOAT, 3);
        let b = Type::array(Type::FLOAT, 3);
        let c = Type::array(Type::FLOAT, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(Type::INT, Type::FLOAT);
    }

    #[test]
    fn classification() {
        let v3 = Type::basic(BasicType::Vec3);
        let iv2 = Type::basic(BasicType::IVec2);
        let m4 = Type::basic(BasicType::Mat4);
        assert!(v3.is_float_vector() && !v3.is_int_vector());
        assert!(iv2.is_int_vector() && iv2.is_integral());
        assert!(m4.is_matrix() && m4.is_float_based());
        assert_eq!(v3.vector_element_count(), 3);
        assert_eq!(m4.vector_element_count(), 4);
        assert_eq!(Type::FLOAT.vector_element_count(), 0);
    }

    #[test]
    fn dword_counts() {
        assert_eq!(Type::FLOAT.dword_count(), 1);
        assert_eq!(Type::basic(BasicType::Vec3).dword_count(), 3);
        assert_eq!(Type::basic(BasicType::Mat2).dword_count(), 4);
        assert_eq!(Type::basic(BasicType::Mat3).dword_count(), 9);
        assert_eq!(Type::basic(BasicType::Mat4).dword_count(), 16);
        let arr = Type::array(Type::basic(BasicType::Vec2), 5);
        assert_eq!(arr.dword_count(), 10);
    }

    #[test]
    fn display_names() {
        assert_eq!(Type::basic(BasicType::IVec4).to_string(), "ivec4");
        assert_eq!(
            Type::array(Type::basic(BasicType::Vec2), 4).to_string(),
            "[4]vec2"
        );
        assert_eq!(Type::basic(BasicType::Texture).to_string(), "texture2d");
    }

    #[test]
    fn validate_rejects_bad_sub() {
        let bad = Type {
            main: BasicType::Array,
            sub: vec![],
            length: 2,
        };
        assert!(bad.validate().is_err());
        let bad = Type {
            main: BasicType::Float,
            sub: vec![Type::INT],
            length: 0,
        };
        assert!(bad.validate().is_err());
        assert!(Type::array(Type::INT, 0).validate().is_ok());
    }

    #[test]
    fn vector_constructors() {
        assert_eq!(float_vector(2), Some(Type::basic(BasicType::Vec2)));
        assert_eq!(int_vector(4), Some(Type::basic(BasicType::IVec4)));
        assert_eq!(float_vector(5), None);
    }
}

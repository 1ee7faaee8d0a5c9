//! The program record and whole-program queries.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

use crate::IrError;
use crate::expr::Expr;
use crate::stmt::{Block, Stmt, walk_exprs};
use crate::types::{BasicType, Type};

/// Texture coordinate unit of a program.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum Unit {
    /// Normalised coordinates in `0..1`.
    #[default]
    Texels,
    /// Integer pixel coordinates.
    Pixels,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Texels => "texels",
            Self::Pixels => "pixels",
        })
    }
}

/// A user function.
///
/// Parameters occupy local indices `0..in_params.len() + out_params.len()`
/// of the function body, in-params first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Func {
    /// Stable id referenced by [`Expr::FunctionExpr`].
    pub index: usize,
    pub in_params: Vec<Type>,
    pub out_params: Vec<Type>,
    /// `Type::NONE` when the function returns nothing.
    pub return_type: Type,
    pub block: Block,
}

impl Func {
    pub fn param_count(&self) -> usize {
        self.in_params.len() + self.out_params.len()
    }
}

/// A compiled shader program.
///
/// The vertex entry's pseudo-parameters are the attributes
/// (`0..attributes.len()`), then the position, then the varyings. The
/// fragment entry's pseudo-parameters are the position (index 0) and the
/// varyings (`1..=varyings.len()`); it returns the color with
/// [`Stmt::Return`].
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub uniform_names: Vec<String>,
    pub uniforms: Vec<Type>,
    pub texture_count: usize,
    pub attributes: Vec<Type>,
    pub varyings: Vec<Type>,
    pub funcs: Vec<Func>,
    pub vertex_func: Option<Block>,
    pub fragment_func: Option<Block>,
    pub unit: Unit,

    uniform_offsets: OnceLock<Vec<usize>>,
    uniform_factors: OnceLock<Vec<u32>>,
}

const REGISTER_DWORDS: usize = 4;

fn align_to_register(head: usize) -> usize {
    head.div_ceil(REGISTER_DWORDS) * REGISTER_DWORDS
}

/// Packed size and element stride (in dwords) of a uniform element type.
fn packed_size(t: &Type) -> usize {
    match t.main {
        BasicType::Bool | BasicType::Int | BasicType::Float => 1,
        BasicType::Vec2 | BasicType::IVec2 => 2,
        BasicType::Vec3 | BasicType::IVec3 => 3,
        BasicType::Vec4 | BasicType::IVec4 => 4,
        BasicType::Mat2 => 6,
        BasicType::Mat3 => 11,
        BasicType::Mat4 => 16,
        BasicType::Array => match t.elem() {
            Some(elem) if t.length > 0 => {
                let size = packed_size(elem);
                align_to_register(size) * (t.length - 1) + size
            }
            _ => 0,
        },
        BasicType::Struct => t.sub.iter().map(|s| align_to_register(packed_size(s))).sum(),
        BasicType::None | BasicType::Texture => 0,
    }
}

/// Computes the constant-buffer offset of each uniform in 4-byte words.
///
/// A value never straddles a 16-byte register: 2-component vectors move
/// to the next register when fewer than two words remain, 3- and
/// 4-component vectors, matrices and arrays always start a register, and
/// array elements are padded to register size except the last.
pub fn uniform_offsets_in_dwords(uniforms: &[Type]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(uniforms.len());
    let mut head = 0;
    for t in uniforms {
        let remaining = REGISTER_DWORDS - head % REGISTER_DWORDS;
        let aligned = match t.main {
            BasicType::Bool | BasicType::Int | BasicType::Float => false,
            BasicType::Vec2 | BasicType::IVec2 => remaining < 2,
            _ => true,
        };
        if aligned {
            head = align_to_register(head);
        }
        offsets.push(head);
        head += packed_size(t);
    }
    offsets
}

impl Program {
    /// An empty program with the given texture coordinate unit.
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    /// Uniform offsets in dwords, computed once per program.
    pub fn uniform_offsets_in_dwords(&self) -> &[usize] {
        self.uniform_offsets
            .get_or_init(|| uniform_offsets_in_dwords(&self.uniforms))
    }

    /// Looks up a function by its stable index.
    pub fn func(&self, index: usize) -> Option<&Func> {
        self.funcs.iter().find(|f| f.index == index)
    }

    /// Functions transitively called from `block`, sorted by index.
    pub fn reachable_funcs_from_block(&self, block: &Block) -> Vec<&Func> {
        let by_index: HashMap<usize, &Func> = self.funcs.iter().map(|f| (f.index, f)).collect();
        let mut visited = BTreeSet::new();
        let mut pending = vec![block];
        while let Some(b) = pending.pop() {
            let mut found = Vec::new();
            walk_exprs(b, &mut |e| {
                if let Expr::FunctionExpr(idx) = e {
                    found.push(*idx);
                }
            });
            for idx in found {
                if visited.insert(idx) {
                    if let Some(f) = by_index.get(&idx).copied() {
                        pending.push(&f.block);
                    }
                }
            }
        }
        visited
            .into_iter()
            .filter_map(|idx| by_index.get(&idx).copied())
            .collect()
    }

    /// Uniform indices referenced from either entry point, directly or
    /// through called functions.
    pub fn reachable_uniforms(&self) -> BTreeSet<usize> {
        let mut uniforms = BTreeSet::new();
        let entries = self.vertex_func.iter().chain(self.fragment_func.iter());
        for entry in entries {
            let mut blocks = vec![entry];
            blocks.extend(self.reachable_funcs_from_block(entry).iter().map(|f| &f.block));
            for b in blocks {
                walk_exprs(b, &mut |e| {
                    if let Expr::UniformVariable(idx) = e {
                        uniforms.insert(*idx);
                    }
                });
            }
        }
        uniforms
    }

    /// Zeroes the unpacked dword values of uniforms no entry point reads.
    ///
    /// The per-dword factor table is computed on first use and cached.
    pub fn filter_uniform_variables(&self, values: &mut [u32]) -> Result<(), IrError> {
        let expected: usize = self.uniforms.iter().map(Type::dword_count).sum();
        if values.len() != expected {
            return Err(IrError::UniformSizeMismatch {
                expected,
                found: values.len(),
            });
        }
        let factors = self.uniform_factors.get_or_init(|| {
            let reachable = self.reachable_uniforms();
            self.uniforms
                .iter()
                .enumerate()
                .flat_map(|(i, t)| {
                    let factor = u32::from(reachable.contains(&i));
                    std::iter::repeat_n(factor, t.dword_count())
                })
                .collect()
        });
        for (v, f) in values.iter_mut().zip(factors) {
            *v *= f;
        }
        Ok(())
    }

    /// Resolves the type of the local at absolute `index` inside the
    /// function whose body is `top`.
    ///
    /// `params` are the function's parameter types (in-params then
    /// out-params, or the entry point's pseudo-parameters).
    pub fn local_variable_type(params: &[Type], top: &Block, index: usize) -> Result<Type, IrError> {
        if let Some(t) = params.get(index) {
            return Ok(t.clone());
        }
        find_local(top, index).ok_or(IrError::BadLocalIndex {
            index,
            count: params.len() + count_locals(top),
        })
    }

    /// Pseudo-parameter types of the vertex entry point.
    pub fn vertex_params(&self) -> Vec<Type> {
        let mut params = self.attributes.clone();
        params.push(Type::basic(BasicType::Vec4));
        params.extend(self.varyings.iter().cloned());
        params
    }

    /// Pseudo-parameter types of the fragment entry point.
    pub fn fragment_params(&self) -> Vec<Type> {
        let mut params = vec![Type::basic(BasicType::Vec4)];
        params.extend(self.varyings.iter().cloned());
        params
    }
}

fn find_local(block: &Block, index: usize) -> Option<Type> {
    if block.local_indices().contains(&index) {
        return block
            .local_vars
            .get(index - block.local_var_index_offset)
            .cloned();
    }
    for stmt in &block.stmts {
        if let Stmt::For(f) = stmt {
            if f.var_index == index {
                return Some(f.var_type.clone());
            }
        }
        for b in stmt.blocks() {
            if let Some(t) = find_local(b, index) {
                return Some(t);
            }
        }
    }
    None
}

fn count_locals(block: &Block) -> usize {
    block.local_vars.len()
        + block
            .stmts
            .iter()
            .flat_map(Stmt::blocks)
            .map(count_locals)
            .sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;
    use crate::expr::Op;
    use crate::stmt::ForLoop;

    fn ty(main: BasicType) -> Type {
        Type::basic(main)
    }

    #[test]
    fn offsets_float_vec3_float_vec4() {
        let uniforms = [
            Type::FLOAT,
            ty(BasicType::Vec3),
            Type::FLOAT,
            ty(BasicType::Vec4),
        ];
        assert_eq!(uniform_offsets_in_dwords(&uniforms), vec![0, 4, 7, 8]);
    }

    #[test]
    fn offsets_vec2_packing() {
        let uniforms = [Type::FLOAT, Type::FLOAT, Type::FLOAT, ty(BasicType::Vec2)];
        // Only one word is left in the first register.
        assert_eq!(uniform_offsets_in_dwords(&uniforms), vec![0, 1, 2, 4]);
        let uniforms = [Type::FLOAT, ty(BasicType::Vec2), Type::FLOAT];
        assert_eq!(uniform_offsets_in_dwords(&uniforms), vec![0, 1, 3]);
    }

    #[test]
    fn offsets_matrices_and_arrays() {
        let uniforms = [
            Type::FLOAT,
            ty(BasicType::Mat2),
            Type::FLOAT,
            Type::array(Type::FLOAT, 3),
            Type::FLOAT,
            ty(BasicType::Mat4),
        ];
        // mat2 at 4 spans 6 words; the float fits at 10; the array starts
        // at 12 and ends mid-register at 21; mat4 realigns to 24.
        assert_eq!(
            uniform_offsets_in_dwords(&uniforms),
            vec![0, 4, 10, 12, 21, 24]
        );
    }

    #[test]
    fn offsets_never_straddle_registers() {
        let uniforms = [
            ty(BasicType::Vec2),
            Type::FLOAT,
            ty(BasicType::Vec2),
            ty(BasicType::Vec3),
            ty(BasicType::IVec2),
            Type::INT,
            Type::INT,
            ty(BasicType::Vec2),
        ];
        let offsets = uniform_offsets_in_dwords(&uniforms);
        assert_eq!(offsets[0], 0);
        for (o, t) in offsets.iter().zip(&uniforms) {
            let size = packed_size(t);
            assert!(o % 4 + size <= 4, "{t} at {o} straddles a register");
        }
        for w in offsets.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn offsets_are_cached() {
        let program = Program {
            uniforms: vec![Type::FLOAT, ty(BasicType::Vec4)],
            ..Default::default()
        };
        let a = program.uniform_offsets_in_dwords().as_ptr();
        let b = program.uniform_offsets_in_dwords().as_ptr();
        assert_eq!(a, b);
        assert_eq!(program.uniform_offsets_in_dwords(), &[0, 4]);
    }

    fn call(idx: usize) -> Stmt {
        Stmt::ExprStmt(Expr::call(Expr::FunctionExpr(idx), vec![]))
    }

    fn func(index: usize, stmts: Vec<Stmt>) -> Func {
        Func {
            index,
            block: Block {
                stmts,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn reachability_follows_calls() {
        let program = Program {
            funcs: vec![
                func(0, vec![call(2)]),
                func(1, vec![]),
                func(2, vec![call(0)]),
            ],
            ..Default::default()
        };
        let entry = Block {
            stmts: vec![call(2)],
            ..Default::default()
        };
        let reached: Vec<usize> = program
            .reachable_funcs_from_block(&entry)
            .iter()
            .map(|f| f.index)
            .collect();
        assert_eq!(reached, vec![0, 2]);
    }

    #[test]
    fn filter_zeroes_unused_uniforms() {
        let read_u1 = Stmt::Return(Some(Expr::UniformVariable(1)));
        let program = Program {
            uniforms: vec![ty(BasicType::Vec2), Type::FLOAT, Type::FLOAT],
            fragment_func: Some(Block {
                stmts: vec![read_u1],
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut values = vec![1, 2, 3, 4];
        program.filter_uniform_variables(&mut values).unwrap();
        assert_eq!(values, vec![0, 0, 3, 0]);
        assert!(program.filter_uniform_variables(&mut [1]).is_err());
    }

    #[test]
    fn local_types_resolve_through_nested_blocks() {
        let body = Block {
            local_vars: vec![Type::FLOAT],
            local_var_index_offset: 3,
            stmts: vec![],
        };
        let for_block = Block {
            local_vars: vec![Type::NONE],
            local_var_index_offset: 2,
            stmts: vec![Stmt::For(ForLoop {
                var_type: Type::INT,
                var_index: 2,
                init: Constant::int(0),
                end: Constant::int(4),
                op: Op::LessThanOp,
                delta: Constant::int(1),
                body,
            })],
        };
        let top = Block {
            local_vars: vec![ty(BasicType::Vec2)],
            local_var_index_offset: 1,
            stmts: vec![Stmt::BlockStmt(for_block)],
        };
        let params = [ty(BasicType::Vec4)];
        assert_eq!(
            Program::local_variable_type(&params, &top, 0).unwrap(),
            ty(BasicType::Vec4)
        );
        assert_eq!(
            Program::local_variable_type(&params, &top, 1).unwrap(),
            ty(BasicType::Vec2)
        );
        assert_eq!(Program::local_variable_type(&params, &top, 2).unwrap(), Type::NONE);
        assert_eq!(Program::local_variable_type(&params, &top, 3).unwrap(), Type::FLOAT);
        assert!(Program::local_variable_type(&params, &top, 9).is_err());
    }
}

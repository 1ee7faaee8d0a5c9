//! HLSL backend for Kage.
//!
//! Emits one source holding both entry points (`VSMain` and `PSMain`).
//! Uniforms are packed into a single constant buffer with explicit
//! `packoffset`s matching [`Program::uniform_offsets_in_dwords`]; the
//! offsets are returned alongside the source so callers can lay out the
//! buffer they upload.

use kage_backend_core::writer::{Body, BlockWriter, BodyKind, Dialect, Slot, join_lines};
use kage_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, Diagnostic, OutputFile,
};
use kage_ir::{BasicType, BuiltinFunc, Func, Op, Program, Type};

/// Name of the varyings struct instance in both entry points.
const VARYINGS: &str = "varyings";

/// Helpers every shader may call: float `mod` and matrices from a scalar.
const PRELUDE: &str = "float mod(float x, float y) {
	return x - y * floor(x/y);
}

float2 mod(float2 x, float2 y) {
	return x - y * floor(x/y);
}

float3 mod(float3 x, float3 y) {
	return x - y * floor(x/y);
}

float4 mod(float4 x, float4 y) {
	return x - y * floor(x/y);
}

float2x2 float2x2FromScalar(float x) {
	return float2x2(x, 0, 0, x);
}

float3x3 float3x3FromScalar(float x) {
	return float3x3(x, 0, 0, 0, x, 0, 0, 0, x);
}

float4x4 float4x4FromScalar(float x) {
	return float4x4(x, 0, 0, 0, 0, x, 0, 0, 0, 0, x, 0, 0, 0, 0, x);
}";

/// Dwords in one constant-buffer register.
const REGISTER_DWORDS: usize = 4;

/// Translates `program` to HLSL, returning the source and the uniform
/// offsets in dwords.
pub fn emit(program: &Program) -> Result<(String, Vec<usize>), BackendError> {
    let offsets = program.uniform_offsets_in_dwords().to_vec();
    let source = Hlsl.shader(program, &offsets)?;
    log::debug!("HLSL: {} bytes, uniform offsets {offsets:?}", source.len());
    Ok((source, offsets))
}

/// HLSL backend producing `shader.hlsl`.
#[derive(Debug)]
pub struct HlslBackend;

impl Backend for HlslBackend {
    fn name(&self) -> &str {
        "HLSL"
    }

    fn targets(&self) -> &[&str] {
        &["hlsl", "directx"]
    }

    fn compile(
        &self,
        program: &Program,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let (source, offsets) = emit(program)?;
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "shader.hlsl".into(),
                content: source,
            }],
            diagnostics: vec![Diagnostic {
                message: format!("uniform offsets in dwords: {offsets:?}"),
            }],
        })
    }
}

/// `packoffset` register and component for a dword offset, e.g. `c1.w`.
fn pack_offset(offset: usize) -> String {
    let register = offset / REGISTER_DWORDS;
    match offset % REGISTER_DWORDS {
        1 => format!("c{register}.y"),
        2 => format!("c{register}.z"),
        3 => format!("c{register}.w"),
        _ => format!("c{register}"),
    }
}

struct Hlsl;

impl Hlsl {
    fn shader(&self, program: &Program, offsets: &[usize]) -> Result<String, BackendError> {
        let mut lines: Vec<String> = vec![PRELUDE.into(), String::new()];

        lines.push("struct Varyings {".into());
        lines.push("\tfloat4 Position : SV_POSITION;".into());
        for (i, t) in program.varyings.iter().enumerate() {
            lines.push(format!("\t{} : TEXCOORD{i};", self.var_decl(t, &format!("M{i}"))?));
        }
        lines.push("};".into());

        if !program.uniforms.is_empty() {
            lines.push(String::new());
            lines.push("cbuffer Uniforms : register(b0) {".into());
            for (i, t) in program.uniforms.iter().enumerate() {
                let offset = offsets
                    .get(i)
                    .copied()
                    .ok_or_else(|| BackendError::Other(format!("no offset for uniform {i}")))?;
                lines.push(format!(
                    "\t{} : packoffset({});",
                    self.var_decl(t, &self.uniform_name(i))?,
                    pack_offset(offset)
                ));
            }
            lines.push("}".into());
        }

        if program.texture_count > 0 {
            lines.push(String::new());
            for i in 0..program.texture_count {
                lines.push(format!("Texture2D T{i} : register(t{i});"));
            }
            lines.push("SamplerState samp : register(s0);".into());
        }

        self.functions(&program.funcs, &mut lines)?;

        if let Some(block) = program.vertex_func.as_ref().filter(|b| !b.stmts.is_empty()) {
            let mut args = Vec::with_capacity(program.attributes.len());
            for (i, t) in program.attributes.iter().enumerate() {
                args.push(format!("{} : TEXCOORD{i}", self.var_decl(t, &format!("A{i}"))?));
            }
            let body = Body::vertex(program, block);
            lines.push(String::new());
            lines.push(format!("Varyings VSMain({}) {{", args.join(", ")));
            lines.push(format!("\tVaryings {VARYINGS};"));
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            let last = format!("\treturn {VARYINGS};");
            if lines.last() != Some(&last) {
                lines.push(last);
            }
            lines.push("}".into());
        }

        if let Some(block) = program.fragment_func.as_ref().filter(|b| !b.stmts.is_empty()) {
            let body = Body::fragment(program, block);
            lines.push(String::new());
            lines.push(format!(
                "float4 PSMain(Varyings {VARYINGS}, bool frontFacing : SV_IsFrontFace) : SV_TARGET {{"
            ));
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            lines.push("}".into());
        }

        Ok(join_lines(&lines))
    }

    fn functions(&self, funcs: &[Func], lines: &mut Vec<String>) -> Result<(), BackendError> {
        if funcs.is_empty() {
            return Ok(());
        }
        lines.push(String::new());
        for f in funcs {
            lines.push(format!("{};", self.signature(f)?));
        }
        for f in funcs {
            let body = Body::func(f);
            lines.push(String::new());
            lines.push(format!("{} {{", self.signature(f)?));
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            lines.push("}".into());
        }
        Ok(())
    }

    fn signature(&self, f: &Func) -> Result<String, BackendError> {
        let mut args = Vec::with_capacity(f.param_count());
        for (i, t) in f.in_params.iter().enumerate() {
            args.push(format!("in {}", self.var_decl(t, &format!("l{i}"))?));
        }
        let offset = f.in_params.len();
        for (i, t) in f.out_params.iter().enumerate() {
            args.push(format!("out {}", self.var_decl(t, &format!("l{}", offset + i))?));
        }
        let args = if args.is_empty() {
            "void".to_string()
        } else {
            args.join(", ")
        };
        let (prefix, suffix) = self.type_parts(&f.return_type)?;
        Ok(format!("{prefix}{suffix} F{}({args})", f.index))
    }
}

fn basic_type_name(t: &Type) -> Result<&'static str, BackendError> {
    Ok(match t.main {
        BasicType::None => "void",
        BasicType::Bool => "bool",
        BasicType::Int => "int",
        BasicType::Float => "float",
        BasicType::Vec2 => "float2",
        BasicType::Vec3 => "float3",
        BasicType::Vec4 => "float4",
        BasicType::IVec2 => "int2",
        BasicType::IVec3 => "int3",
        BasicType::IVec4 => "int4",
        BasicType::Mat2 => "float2x2",
        BasicType::Mat3 => "float3x3",
        BasicType::Mat4 => "float4x4",
        BasicType::Texture => return Err(BackendError::Unsupported("texture values".into())),
        BasicType::Struct => return Err(BackendError::Unsupported("struct types".into())),
        BasicType::Array => return Err(BackendError::Other(format!("unexpected array type: {t}"))),
    })
}

impl Dialect for Hlsl {
    fn type_parts(&self, t: &Type) -> Result<(String, String), BackendError> {
        match t.elem() {
            Some(elem) => {
                let (prefix, suffix) = self.type_parts(elem)?;
                Ok((prefix, format!("[{}]{suffix}", t.length)))
            }
            None => Ok((basic_type_name(t)?.to_string(), String::new())),
        }
    }

    fn zero_value(&self, t: &Type) -> Result<String, BackendError> {
        match t.main {
            BasicType::Bool => Ok("false".into()),
            BasicType::Int | BasicType::IVec2 | BasicType::IVec3 | BasicType::IVec4 => {
                Ok("0".into())
            }
            BasicType::Array => {
                let elem = t
                    .elem()
                    .ok_or_else(|| BackendError::Other(format!("array without element type: {t}")))?;
                let zero = self.zero_value(elem)?;
                Ok(format!("{{{}}}", vec![zero; t.length].join(", ")))
            }
            // Scalars broadcast to every component of vectors and matrices.
            _ => {
                basic_type_name(t)?;
                Ok("0.0".into())
            }
        }
    }

    fn slot_name(&self, slot: Slot) -> String {
        match slot {
            Slot::Attribute(i) => format!("A{i}"),
            Slot::Position => format!("{VARYINGS}.Position"),
            Slot::Varying(i) => format!("{VARYINGS}.M{i}"),
            Slot::Local(i) => format!("l{i}"),
        }
    }

    fn builtin_name(&self, f: BuiltinFunc) -> &'static str {
        match f {
            BuiltinFunc::Vec2F => "float2",
            BuiltinFunc::Vec3F => "float3",
            BuiltinFunc::Vec4F => "float4",
            BuiltinFunc::IVec2F => "int2",
            BuiltinFunc::IVec3F => "int3",
            BuiltinFunc::IVec4F => "int4",
            BuiltinFunc::Mat2F => "float2x2",
            BuiltinFunc::Mat3F => "float3x3",
            BuiltinFunc::Mat4F => "float4x4",
            BuiltinFunc::Inversesqrt => "rsqrt",
            BuiltinFunc::Fract => "frac",
            BuiltinFunc::Mix => "lerp",
            BuiltinFunc::Dfdx => "ddx",
            BuiltinFunc::Dfdy => "ddy",
            BuiltinFunc::FrontFacing => "frontFacing",
            f => f.name(),
        }
    }

    fn binary(&self, op: Op, lhs: &str, rhs: &str) -> String {
        match op {
            Op::VectorEqualOp => format!("all(({lhs}) == ({rhs}))"),
            Op::VectorNotEqualOp => format!("!all(({lhs}) == ({rhs}))"),
            // Matrices are row-major here, so the operands swap.
            Op::MatrixMul => format!("mul({rhs}, {lhs})"),
            _ => format!("({lhs}) {op} ({rhs})"),
        }
    }

    fn builtin_call(&self, f: BuiltinFunc, args: &[String]) -> Option<String> {
        match (f, args) {
            // `float4(1)` does not compile; a cast splats the scalar.
            (
                BuiltinFunc::Vec2F
                | BuiltinFunc::Vec3F
                | BuiltinFunc::Vec4F
                | BuiltinFunc::IVec2F
                | BuiltinFunc::IVec3F
                | BuiltinFunc::IVec4F,
                [x],
            ) => Some(format!("({})({x})", self.builtin_name(f))),
            (BuiltinFunc::Mat2F | BuiltinFunc::Mat3F | BuiltinFunc::Mat4F, [x]) => {
                Some(format!("{}FromScalar({x})", self.builtin_name(f)))
            }
            (BuiltinFunc::TexelAt, [tex, pos]) => Some(format!("{tex}.Sample(samp, {pos})")),
            (BuiltinFunc::FrontFacing, _) => Some("frontFacing".into()),
            _ => None,
        }
    }

    fn return_stmt(&self, kind: BodyKind, value: Option<String>) -> String {
        match (kind, value) {
            (BodyKind::Vertex, _) => format!("return {VARYINGS};"),
            (_, Some(v)) => format!("return {v};"),
            (_, None) => "return;".into(),
        }
    }

    fn discard(&self) -> Vec<String> {
        vec![
            "discard;".into(),
            "return float4(0.0, 0.0, 0.0, 0.0);".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_parser::{CompileOptions, compile};

    fn hlsl(source: &str, textures: usize) -> (String, Vec<usize>) {
        let options = CompileOptions {
            texture_count: textures,
            ..Default::default()
        };
        let program = compile(source, &options).expect("shader should compile");
        emit(&program).expect("HLSL emission should succeed")
    }

    #[test]
    fn backend_metadata() {
        let backend = HlslBackend;
        assert_eq!(backend.name(), "HLSL");
        assert!(backend.targets().contains(&"hlsl"));
    }

    #[test]
    fn pack_offsets() {
        assert_eq!(pack_offset(0), "c0");
        assert_eq!(pack_offset(5), "c1.y");
        assert_eq!(pack_offset(10), "c2.z");
        assert_eq!(pack_offset(7), "c1.w");
    }

    #[test]
    fn uniforms_are_packed() {
        let source = "package main

var A float
var B vec3
var C float
var D vec4

func Fragment(pos vec4) vec4 {
	return D * A + vec4(B, C)
}
";
        let (hlsl, offsets) = hlsl(source, 0);
        assert_eq!(offsets, vec![0, 4, 7, 8]);
        assert!(hlsl.contains("cbuffer Uniforms : register(b0) {"), "{hlsl}");
        assert!(hlsl.contains("\tfloat U0 : packoffset(c0);"), "{hlsl}");
        assert!(hlsl.contains("\tfloat3 U1 : packoffset(c1);"), "{hlsl}");
        assert!(hlsl.contains("\tfloat U2 : packoffset(c1.w);"), "{hlsl}");
        assert!(hlsl.contains("\tfloat4 U3 : packoffset(c2);"), "{hlsl}");
    }

    #[test]
    fn matrix_vector_multiplication_swaps_operands() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	v := vec2(1) * mat2(1)
	return vec4(v, 0, 1)
}
";
        let (hlsl, _) = hlsl(source, 0);
        assert!(
            hlsl.contains("mul(float2x2FromScalar(1.0), (float2)(1.0))"),
            "{hlsl}"
        );
        assert!(hlsl.contains("float2x2 float2x2FromScalar(float x)"));
    }

    #[test]
    fn entry_points() {
        let source = "package main

func Vertex(pos vec2, uv vec2) (vec4, vec2) {
	return vec4(pos, 0, 1), uv
}

func Fragment(pos vec4, uv vec2) vec4 {
	return vec4(uv, 0, 1)
}
";
        let (hlsl, offsets) = hlsl(source, 0);
        assert!(offsets.is_empty());
        assert!(!hlsl.contains("cbuffer"));
        assert!(
            hlsl.contains("struct Varyings {\n\tfloat4 Position : SV_POSITION;\n\tfloat2 M0 : TEXCOORD0;\n};"),
            "{hlsl}"
        );
        assert!(
            hlsl.contains("Varyings VSMain(float2 A0 : TEXCOORD0, float2 A1 : TEXCOORD1) {\n\tVaryings varyings;"),
            "{hlsl}"
        );
        assert!(hlsl.contains("\treturn varyings;\n}"), "{hlsl}");
        assert!(!hlsl.contains("return varyings;\n\treturn varyings;"));
        assert!(
            hlsl.contains("float4 PSMain(Varyings varyings, bool frontFacing : SV_IsFrontFace) : SV_TARGET {"),
            "{hlsl}"
        );
        assert!(hlsl.contains("\treturn float4(varyings.M0, 0.0, 1.0);"), "{hlsl}");
    }

    #[test]
    fn textures_sample_in_both_units() {
        let texels = "package main

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv)
}
";
        let pixels = format!("//kage:unit pixels\n\n{texels}");
        let (a, _) = hlsl(texels, 1);
        let (b, _) = hlsl(&pixels, 1);
        assert!(a.contains("Texture2D T0 : register(t0);"));
        assert!(a.contains("SamplerState samp : register(s0);"));
        assert!(a.contains("\treturn T0.Sample(samp, varyings.M0);"), "{a}");
        assert_eq!(a, b);
    }

    #[test]
    fn builtins_and_vector_equality() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	a := fract(pos.x) + dfdx(pos.y) + inversesqrt(pos.z)
	c := mix(pos, vec4(1), pos.w)
	if pos.xy == vec2(0) {
		return c
	}
	if frontfacing() {
		return vec4(a)
	}
	return pos
}
";
        let (hlsl, _) = hlsl(source, 0);
        assert!(hlsl.contains("frac((varyings.Position).x)"), "{hlsl}");
        assert!(hlsl.contains("ddx((varyings.Position).y)"), "{hlsl}");
        assert!(hlsl.contains("rsqrt((varyings.Position).z)"), "{hlsl}");
        assert!(hlsl.contains("lerp(varyings.Position, (float4)(1.0), (varyings.Position).w)"), "{hlsl}");
        assert!(
            hlsl.contains("if (all(((varyings.Position).xy) == ((float2)(0.0)))) {"),
            "{hlsl}"
        );
        assert!(hlsl.contains("if (frontFacing) {"), "{hlsl}");
    }

    #[test]
    fn discard_returns_zero_color() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	if pos.x < 0.5 {
		discard()
	}
	return pos
}
";
        let (hlsl, _) = hlsl(source, 0);
        assert!(
            hlsl.contains("\t\tdiscard;\n\t\treturn float4(0.0, 0.0, 0.0, 0.0);"),
            "{hlsl}"
        );
    }

    #[test]
    fn helper_functions_and_out_params() {
        let source = "package main

func Split(v vec2) (x float, y float) {
	x = v.x
	y = v.y
	return
}

func Fragment(pos vec4) vec4 {
	a, b := Split(pos.xy)
	return vec4(a, b, min(a, b, 1), 1)
}
";
        let (hlsl, _) = hlsl(source, 0);
        assert!(hlsl.contains("void F0(in float2 l0, out float l1, out float l2);"), "{hlsl}");
        assert!(hlsl.contains("\tl1 = 0.0;"), "{hlsl}");
        assert!(hlsl.contains("min(min("), "{hlsl}");
    }
}

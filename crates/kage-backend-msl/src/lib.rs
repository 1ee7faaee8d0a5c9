//! MSL backend for Kage.
//!
//! Metal has no mutable globals, so uniforms, textures and the
//! front-facing flag are threaded through every helper function as leading
//! parameters. Attributes are read from a device buffer indexed by
//! `[[vertex_id]]`.

use kage_backend_core::writer::{Body, BlockWriter, BodyKind, Dialect, Slot, join_lines};
use kage_backend_core::{Backend, BackendError, BackendOptions, BackendOutput, OutputFile};
use kage_ir::{BasicType, BuiltinFunc, Func, Op, Program, Type, Unit};

/// Name of the varyings struct instance in both entry points.
const VARYINGS: &str = "varyings";

/// Source preamble for `unit`.
pub fn prelude(unit: Unit) -> String {
    let mut s = String::from(
        "#include <metal_stdlib>

using namespace metal;

template<typename T, typename U>
T mod(T x, U y) {
	return x - y * floor(x/y);
}",
    );
    if unit == Unit::Texels {
        s.push_str("\n\nconstexpr sampler texture_sampler{filter::nearest};");
    }
    s
}

/// Translates `program` to a single Metal source with `Vertex` and
/// `Fragment` entry points.
pub fn emit(program: &Program) -> Result<String, BackendError> {
    let msl = Msl {
        unit: program.unit,
        has_uniforms: !program.uniforms.is_empty(),
        texture_count: program.texture_count,
    };
    let source = msl.shader(program)?;
    log::debug!("MSL: {} bytes, {} function(s)", source.len(), program.funcs.len());
    Ok(source)
}

/// MSL backend producing `shader.metal`.
#[derive(Debug)]
pub struct MslBackend;

impl Backend for MslBackend {
    fn name(&self) -> &str {
        "MSL"
    }

    fn targets(&self) -> &[&str] {
        &["msl", "metal"]
    }

    fn compile(
        &self,
        program: &Program,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "shader.metal".into(),
                content: emit(program)?,
            }],
            diagnostics: vec![],
        })
    }
}

struct Msl {
    unit: Unit,
    has_uniforms: bool,
    texture_count: usize,
}

impl Msl {
    fn shader(&self, program: &Program) -> Result<String, BackendError> {
        let mut lines: Vec<String> = vec![prelude(self.unit)];

        if self.has_uniforms {
            lines.push(String::new());
            lines.push("struct Uniforms {".into());
            for (i, t) in program.uniforms.iter().enumerate() {
                lines.push(format!("\t{};", self.var_decl(t, &format!("U{i}"))?));
            }
            lines.push("};".into());
        }

        if !program.attributes.is_empty() {
            lines.push(String::new());
            lines.push("struct Attributes {".into());
            for (i, t) in program.attributes.iter().enumerate() {
                lines.push(format!("\t{};", self.var_decl(t, &format!("M{i}"))?));
            }
            lines.push("};".into());
        }

        lines.push(String::new());
        lines.push("struct Varyings {".into());
        lines.push("\tfloat4 Position [[position]];".into());
        for (i, t) in program.varyings.iter().enumerate() {
            lines.push(format!("\t{};", self.var_decl(t, &format!("M{i}"))?));
        }
        lines.push("};".into());

        if !program.funcs.is_empty() {
            lines.push(String::new());
            for f in &program.funcs {
                lines.push(format!("{};", self.signature(f)?));
            }
            for f in &program.funcs {
                let body = Body::func(f);
                lines.push(String::new());
                lines.push(format!("{} {{", self.signature(f)?));
                lines.extend(BlockWriter::new(self, &body).top(0)?);
                lines.push("}".into());
            }
        }

        if let Some(block) = program.vertex_func.as_ref().filter(|b| !b.stmts.is_empty()) {
            let mut params = vec![
                "uint vid [[vertex_id]]".to_string(),
                "const device Attributes* attributes [[buffer(0)]]".into(),
            ];
            if self.has_uniforms {
                params.push("constant Uniforms& uniforms [[buffer(1)]]".into());
            }
            params.extend(self.texture_params());

            let body = Body::vertex(program, block);
            lines.push(String::new());
            lines.push("vertex Varyings Vertex(".into());
            lines.push(format!("\t{}) {{", params.join(",\n\t")));
            lines.push(format!("\tVaryings {VARYINGS} = {{}};"));
            if !program.funcs.is_empty() {
                lines.push("\tbool front_facing = false;".into());
            }
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            let last = format!("\treturn {VARYINGS};");
            if lines.last() != Some(&last) {
                lines.push(last);
            }
            lines.push("}".into());
        }

        if let Some(block) = program.fragment_func.as_ref().filter(|b| !b.stmts.is_empty()) {
            let mut params = vec![format!("Varyings {VARYINGS} [[stage_in]]")];
            if self.has_uniforms {
                params.push("constant Uniforms& uniforms [[buffer(0)]]".into());
            }
            params.extend(self.texture_params());
            params.push("bool front_facing [[front_facing]]".into());

            let body = Body::fragment(program, block);
            lines.push(String::new());
            lines.push("fragment float4 Fragment(".into());
            lines.push(format!("\t{}) {{", params.join(",\n\t")));
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            lines.push("}".into());
        }

        Ok(join_lines(&lines))
    }

    fn texture_params(&self) -> impl Iterator<Item = String> {
        (0..self.texture_count).map(|i| format!("texture2d<float> T{i} [[texture({i})]]"))
    }

    fn signature(&self, f: &Func) -> Result<String, BackendError> {
        let mut args = Vec::with_capacity(f.param_count() + self.texture_count + 2);
        if self.has_uniforms {
            args.push("constant Uniforms& uniforms".to_string());
        }
        args.extend((0..self.texture_count).map(|i| format!("texture2d<float> T{i}")));
        args.push("bool front_facing".into());
        for (i, t) in f.in_params.iter().enumerate() {
            args.push(self.var_decl(t, &format!("l{i}"))?);
        }
        let offset = f.in_params.len();
        for (i, t) in f.out_params.iter().enumerate() {
            let (prefix, _) = self.type_parts(t)?;
            args.push(format!("thread {prefix}& l{}", offset + i));
        }
        let (prefix, _) = self.type_parts(&f.return_type)?;
        Ok(format!("{prefix} F{}({})", f.index, args.join(", ")))
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

impl Dialect for Msl {
    /// Arrays are `array<T, N>` values, so nothing trails the name.
    fn type_parts(&self, t: &Type) -> Result<(String, String), BackendError> {
        match t.elem() {
            Some(elem) => {
                let (inner, _) = self.type_parts(elem)?;
                Ok((format!("array<{inner}, {}>", t.length), String::new()))
            }
            None => Ok((basic_type_name(t)?.to_string(), String::new())),
        }
    }

    fn zero_value(&self, t: &Type) -> Result<String, BackendError> {
        Ok(match t.main {
            BasicType::Bool => "false".into(),
            BasicType::Int => "0".into(),
            BasicType::Array => "{}".into(),
            _ => format!("{}(0)", basic_type_name(t)?),
        })
    }

    fn slot_name(&self, slot: Slot) -> String {
        match slot {
            Slot::Attribute(i) => format!("attributes[vid].M{i}"),
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
            BuiltinFunc::FrontFacing => "front_facing",
            f => f.name(),
        }
    }

    fn uniform_name(&self, index: usize) -> String {
        format!("uniforms.U{index}")
    }

    fn binary(&self, op: Op, lhs: &str, rhs: &str) -> String {
        match op {
            Op::VectorEqualOp => format!("all(({lhs}) == ({rhs}))"),
            Op::VectorNotEqualOp => format!("!all(({lhs}) == ({rhs}))"),
            _ => format!("({lhs}) {op} ({rhs})"),
        }
    }

    fn builtin_call(&self, f: BuiltinFunc, args: &[String]) -> Option<String> {
        match (f, args) {
            (BuiltinFunc::TexelAt, [tex, pos]) => Some(match self.unit {
                Unit::Texels => format!("{tex}.sample(texture_sampler, {pos})"),
                Unit::Pixels => format!("{tex}.read(static_cast<uint2>({pos}))"),
            }),
            (BuiltinFunc::FrontFacing, _) => Some("(front_facing)".into()),
            _ => None,
        }
    }

    fn implicit_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.texture_count + 2);
        if self.has_uniforms {
            args.push("uniforms".to_string());
        }
        args.extend((0..self.texture_count).map(|i| format!("T{i}")));
        args.push("front_facing".into());
        args
    }

    fn return_stmt(&self, kind: BodyKind, value: Option<String>) -> String {
        match (kind, value) {
            (BodyKind::Vertex, _) => format!("return {VARYINGS};"),
            (_, Some(v)) => format!("return {v};"),
            (_, None) => "return;".into(),
        }
    }

    fn discard(&self) -> Vec<String> {
        vec!["discard_fragment();".into(), "return float4(0.0);".into()]
    }

    // Vertex outputs live in the zero-initialised varyings struct.
    fn skips_init(&self, body: &Body<'_>, index: usize) -> bool {
        body.kind == BodyKind::Vertex && !matches!(body.slot(index), Slot::Local(_))
    }

    fn splits_array_assign(&self) -> bool {
        false
    }

    fn init_lines(&self, name: &str, t: &Type, decl: bool) -> Result<Vec<String>, BackendError> {
        if t.main == BasicType::None {
            return Ok(Vec::new());
        }
        let zero = self.zero_value(t)?;
        let target = if decl {
            self.var_decl(t, name)?
        } else {
            name.to_string()
        };
        Ok(vec![format!("{target} = {zero};")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_parser::{CompileOptions, compile};

    fn msl(source: &str, textures: usize) -> String {
        let options = CompileOptions {
            texture_count: textures,
            ..Default::default()
        };
        let program = compile(source, &options).expect("shader should compile");
        emit(&program).expect("MSL emission should succeed")
    }

    #[test]
    fn backend_metadata() {
        let backend = MslBackend;
        assert_eq!(backend.name(), "MSL");
        assert!(backend.targets().contains(&"metal"));
    }

    #[test]
    fn entry_points() {
        let source = "package main

var Time float

func Vertex(pos vec2, uv vec2) (vec4, vec2) {
	return vec4(pos, 0, 1), uv
}

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv) * Time
}
";
        let msl = msl(source, 1);
        assert!(msl.starts_with("#include <metal_stdlib>\n"));
        assert!(msl.contains("constexpr sampler texture_sampler{filter::nearest};"));
        assert!(msl.contains("struct Uniforms {\n\tfloat U0;\n};"), "{msl}");
        assert!(msl.contains("struct Attributes {\n\tfloat2 M0;\n\tfloat2 M1;\n};"), "{msl}");
        assert!(
            msl.contains("struct Varyings {\n\tfloat4 Position [[position]];\n\tfloat2 M0;\n};"),
            "{msl}"
        );
        assert!(
            msl.contains(
                "vertex Varyings Vertex(
	uint vid [[vertex_id]],
	const device Attributes* attributes [[buffer(0)]],
	constant Uniforms& uniforms [[buffer(1)]],
	texture2d<float> T0 [[texture(0)]]) {
	Varyings varyings = {};"
            ),
            "{msl}"
        );
        assert!(msl.contains("attributes[vid].M0"), "{msl}");
        assert!(msl.contains("\treturn varyings;\n}"), "{msl}");
        assert!(!msl.contains("bool front_facing = false;"));
        assert!(
            msl.contains(
                "fragment float4 Fragment(
	Varyings varyings [[stage_in]],
	constant Uniforms& uniforms [[buffer(0)]],
	texture2d<float> T0 [[texture(0)]],
	bool front_facing [[front_facing]]) {"
            ),
            "{msl}"
        );
        assert!(
            msl.contains("\treturn (T0.sample(texture_sampler, varyings.M0)) * (uniforms.U0);"),
            "{msl}"
        );
    }

    #[test]
    fn pixels_read_texels_directly() {
        let source = "//kage:unit pixels

package main

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv)
}
";
        let msl = msl(source, 1);
        assert!(!msl.contains("texture_sampler"));
        assert!(msl.contains("T0.read(static_cast<uint2>(varyings.M0))"), "{msl}");
        assert!(msl.contains("struct Varyings {\n\tfloat4 Position [[position]];\n\tfloat2 M0;\n};"));
        assert!(!msl.contains("struct Attributes"));
    }

    #[test]
    fn helpers_take_implicit_arguments() {
        let source = "package main

var Scale float

func Shade(c vec4) vec4 {
	return c * Scale
}

func Vertex(pos vec4) vec4 {
	return Shade(pos)
}

func Fragment(pos vec4) vec4 {
	return Shade(pos)
}
";
        let msl = msl(source, 0);
        assert!(
            msl.contains("float4 F0(constant Uniforms& uniforms, bool front_facing, float4 l0);"),
            "{msl}"
        );
        assert!(msl.contains("\treturn (l0) * (uniforms.U0);"), "{msl}");
        assert!(msl.contains("\tbool front_facing = false;"), "{msl}");
        assert!(msl.contains("F0(uniforms, front_facing, attributes[vid].M0)"), "{msl}");
        assert!(msl.contains("F0(uniforms, front_facing, varyings.Position)"), "{msl}");
        assert!(msl.contains("struct Varyings {\n\tfloat4 Position [[position]];\n};"));
    }

    #[test]
    fn arrays_assign_whole_values() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	var a [2]float
	b := a
	return vec4(b[0], b[1], 0, 1)
}
";
        let msl = msl(source, 0);
        assert!(msl.contains("\tarray<float, 2> l0 = {};"), "{msl}");
        assert!(msl.contains("\tl1 = l0;"), "{msl}");
        assert!(!msl.contains("l1[0] ="));
    }

    #[test]
    fn fragment_builtins() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	if pos.xy != vec2(0) {
		discard()
	}
	m := max(pos.x, pos.y, pos.z)
	if frontfacing() {
		return vec4(m)
	}
	return vec4(inversesqrt(m))
}
";
        let msl = msl(source, 0);
        assert!(
            msl.contains("if (!all(((varyings.Position).xy) == (float2(0.0)))) {"),
            "{msl}"
        );
        assert!(msl.contains("\t\tdiscard_fragment();\n\t\treturn float4(0.0);"), "{msl}");
        assert!(
            msl.contains("max(max((varyings.Position).x, (varyings.Position).y), (varyings.Position).z)"),
            "{msl}"
        );
        assert!(msl.contains("if ((front_facing)) {"), "{msl}");
        assert!(msl.contains("rsqrt(l0)"), "{msl}");
    }
}

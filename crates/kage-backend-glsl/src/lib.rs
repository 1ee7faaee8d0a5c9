//! GLSL backend for Kage.
//!
//! Emits a vertex shader and a fragment shader. Uniforms, textures,
//! attributes and varyings live at module scope; each stage carries only
//! the helper functions reachable from its entry point. The fragment body
//! is emitted as an ordinary function returning the color, called once from
//! `main`, so early returns inside it need no special handling.

use kage_backend_core::writer::{Body, BlockWriter, Dialect, Slot, join_lines};
use kage_backend_core::{Backend, BackendError, BackendOptions, BackendOutput, GlslVersion, OutputFile};
use kage_ir::{BasicType, Block, BuiltinFunc, Func, Op, Program, Type, Unit};

/// Integer modulo for desktop GLSL, where `%` is not available.
const MOD_INT: &str = "int modInt(int x, int y) {
	return x - y*(x/y);
}

ivec2 modInt(ivec2 x, int y) {
	return x - y*(x/y);
}

ivec3 modInt(ivec3 x, int y) {
	return x - y*(x/y);
}

ivec4 modInt(ivec4 x, int y) {
	return x - y*(x/y);
}

ivec2 modInt(ivec2 x, ivec2 y) {
	return x - y*(x/y);
}

ivec3 modInt(ivec3 x, ivec3 y) {
	return x - y*(x/y);
}

ivec4 modInt(ivec4 x, ivec4 y) {
	return x - y*(x/y);
}";

const PRECISION: &str = "#if defined(GL_ES)
precision highp float;
precision highp int;
#else
#define lowp
#define mediump
#define highp
#endif";

/// Vertex shader preamble for `version`.
pub fn vertex_prelude(version: GlslVersion) -> String {
    match version {
        GlslVersion::Default => format!("#version 150\n\n{MOD_INT}"),
        GlslVersion::Es300 => "#version 300 es".into(),
    }
}

/// Fragment shader preamble for `version`.
pub fn fragment_prelude(version: GlslVersion) -> String {
    match version {
        GlslVersion::Default => format!("#version 150\n\n{PRECISION}\n\n{MOD_INT}"),
        GlslVersion::Es300 => format!("#version 300 es\n\n{PRECISION}\n\nout vec4 fragColor;"),
    }
}

/// Translates `program` to a `(vertex, fragment)` pair of GLSL sources.
pub fn emit(program: &Program, version: GlslVersion) -> Result<(String, String), BackendError> {
    let glsl = Glsl {
        version,
        unit: program.unit,
    };
    let vertex = glsl.vertex_shader(program)?;
    let fragment = glsl.fragment_shader(program)?;
    log::debug!(
        "GLSL ({version}): {} vertex bytes, {} fragment bytes",
        vertex.len(),
        fragment.len()
    );
    Ok((vertex, fragment))
}

/// GLSL backend producing `shader.vert` and `shader.frag`.
#[derive(Debug)]
pub struct GlslBackend;

impl Backend for GlslBackend {
    fn name(&self) -> &str {
        "GLSL"
    }

    fn targets(&self) -> &[&str] {
        &["glsl", "opengl"]
    }

    fn compile(
        &self,
        program: &Program,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let (vertex, fragment) = emit(program, opts.glsl_version)?;
        Ok(BackendOutput {
            files: vec![
                OutputFile {
                    name: "shader.vert".into(),
                    content: vertex,
                },
                OutputFile {
                    name: "shader.frag".into(),
                    content: fragment,
                },
            ],
            diagnostics: vec![],
        })
    }
}

struct Glsl {
    version: GlslVersion,
    unit: Unit,
}

impl Glsl {
    fn vertex_shader(&self, program: &Program) -> Result<String, BackendError> {
        let mut lines: Vec<String> = vec![vertex_prelude(self.version), String::new()];
        self.uniforms(program, &mut lines)?;
        for (i, t) in program.attributes.iter().enumerate() {
            lines.push(format!("in {};", self.var_decl(t, &format!("A{i}"))?));
        }
        for (i, t) in program.varyings.iter().enumerate() {
            lines.push(format!("out {};", self.var_decl(t, &format!("V{i}"))?));
        }

        let funcs: Vec<&Func> = match &program.vertex_func {
            Some(block) => program.reachable_funcs_from_block(block),
            None => program.funcs.iter().collect(),
        };
        self.functions(&funcs, &mut lines)?;

        if let Some(block) = program.vertex_func.as_ref().filter(|b| !b.stmts.is_empty()) {
            let body = Body::vertex(program, block);
            lines.push(String::new());
            lines.push("void main(void) {".into());
            lines.extend(BlockWriter::new(self, &body).top(0)?);
            lines.push("}".into());
        }
        Ok(join_lines(&lines))
    }

    fn fragment_shader(&self, program: &Program) -> Result<String, BackendError> {
        let mut lines: Vec<String> = vec![fragment_prelude(self.version), String::new()];
        self.uniforms(program, &mut lines)?;
        for (i, t) in program.varyings.iter().enumerate() {
            lines.push(format!("in {};", self.var_decl(t, &format!("V{i}"))?));
        }

        let Some(block) = program.fragment_func.as_ref().filter(|b| !b.stmts.is_empty()) else {
            let funcs: Vec<&Func> = program.funcs.iter().collect();
            self.functions(&funcs, &mut lines)?;
            return Ok(join_lines(&lines));
        };

        let entry = fragment_wrapper(program, block);
        let mut funcs = program.reachable_funcs_from_block(block);
        funcs.push(&entry);
        self.functions(&funcs, &mut lines)?;

        let mut args = vec!["gl_FragCoord".to_string()];
        args.extend((0..program.varyings.len()).map(|i| format!("V{i}")));
        let color = match self.version {
            GlslVersion::Default => "gl_FragColor",
            GlslVersion::Es300 => "fragColor",
        };
        lines.push(String::new());
        lines.push("void main(void) {".into());
        lines.push(format!("\t{color} = F{}({});", entry.index, args.join(", ")));
        lines.push("}".into());
        Ok(join_lines(&lines))
    }

    fn uniforms(&self, program: &Program, lines: &mut Vec<String>) -> Result<(), BackendError> {
        for (i, t) in program.uniforms.iter().enumerate() {
            lines.push(format!("uniform {};", self.var_decl(t, &self.uniform_name(i))?));
        }
        for i in 0..program.texture_count {
            lines.push(format!("uniform sampler2D T{i};"));
        }
        Ok(())
    }

    fn functions(&self, funcs: &[&Func], lines: &mut Vec<String>) -> Result<(), BackendError> {
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

/// The fragment body as a function taking the position and the varyings.
fn fragment_wrapper(program: &Program, block: &Block) -> Func {
    let index = program.funcs.iter().map(|f| f.index + 1).max().unwrap_or(0);
    Func {
        index,
        in_params: program.fragment_params(),
        out_params: vec![],
        return_type: Type::basic(BasicType::Vec4),
        block: block.clone(),
    }
}

fn basic_type_name(t: &Type) -> Result<&'static str, BackendError> {
    Ok(match t.main {
        BasicType::None => "void",
        BasicType::Bool => "bool",
        BasicType::Int => "int",
        BasicType::Float => "float",
        BasicType::Vec2 => "vec2",
        BasicType::Vec3 => "vec3",
        BasicType::Vec4 => "vec4",
        BasicType::IVec2 => "ivec2",
        BasicType::IVec3 => "ivec3",
        BasicType::IVec4 => "ivec4",
        BasicType::Mat2 => "mat2",
        BasicType::Mat3 => "mat3",
        BasicType::Mat4 => "mat4",
        BasicType::Texture => return Err(BackendError::Unsupported("texture values".into())),
        BasicType::Struct => return Err(BackendError::Unsupported("struct types".into())),
        BasicType::Array => return Err(BackendError::Other(format!("unexpected array type: {t}"))),
    })
}

impl Dialect for Glsl {
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
            BasicType::Int => Ok("0".into()),
            BasicType::Array => {
                let elem = t
                    .elem()
                    .ok_or_else(|| BackendError::Other(format!("array without element type: {t}")))?;
                let zero = self.zero_value(elem)?;
                let (prefix, suffix) = self.type_parts(t)?;
                Ok(format!("{prefix}{suffix}({})", vec![zero; t.length].join(", ")))
            }
            _ => Ok(format!("{}(0)", basic_type_name(t)?)),
        }
    }

    fn slot_name(&self, slot: Slot) -> String {
        match slot {
            Slot::Attribute(i) => format!("A{i}"),
            Slot::Position => "gl_Position".into(),
            Slot::Varying(i) => format!("V{i}"),
            Slot::Local(i) => format!("l{i}"),
        }
    }

    fn builtin_name(&self, f: BuiltinFunc) -> &'static str {
        match f {
            BuiltinFunc::Atan2 => "atan",
            BuiltinFunc::Dfdx => "dFdx",
            BuiltinFunc::Dfdy => "dFdy",
            BuiltinFunc::TexelAt => match self.unit {
                Unit::Texels => "texture",
                Unit::Pixels => "texelFetch",
            },
            BuiltinFunc::FrontFacing => "gl_FrontFacing",
            f => f.name(),
        }
    }

    fn binary(&self, op: Op, lhs: &str, rhs: &str) -> String {
        if op == Op::ModOp && self.version == GlslVersion::Default {
            return format!("modInt(({lhs}), ({rhs}))");
        }
        format!("({lhs}) {op} ({rhs})")
    }

    fn builtin_call(&self, f: BuiltinFunc, args: &[String]) -> Option<String> {
        match (f, args) {
            (BuiltinFunc::TexelAt, [tex, pos]) => Some(match self.unit {
                Unit::Texels => format!("texture({tex}, {pos})"),
                Unit::Pixels => format!("texelFetch({tex}, ivec2({pos}), 0)"),
            }),
            (BuiltinFunc::FrontFacing, _) => Some("gl_FrontFacing".into()),
            _ => None,
        }
    }

    fn discard(&self) -> Vec<String> {
        vec!["discard;".into(), "return vec4(0.0);".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_parser::{CompileOptions, compile};

    fn glsl(source: &str, textures: usize, version: GlslVersion) -> (String, String) {
        let options = CompileOptions {
            texture_count: textures,
            ..Default::default()
        };
        let program = compile(source, &options).expect("shader should compile");
        emit(&program, version).expect("GLSL emission should succeed")
    }

    #[test]
    fn backend_metadata() {
        let backend = GlslBackend;
        assert_eq!(backend.name(), "GLSL");
        assert!(backend.targets().contains(&"glsl"));
    }

    #[test]
    fn minimal_vertex() {
        let (vs, fs) = glsl(
            "package main\n\nfunc Vertex(pos vec4) vec4 {\n\treturn pos\n}\n",
            0,
            GlslVersion::Default,
        );
        assert!(vs.starts_with("#version 150\n"));
        assert!(vs.contains("in vec4 A0;"));
        assert!(vs.contains("void main(void) {"));
        assert!(vs.contains("\tgl_Position = A0;"));
        assert!(vs.contains("\treturn;"));
        assert!(!fs.contains("void main"));
        assert!(fs.ends_with('\n') && !fs.ends_with("\n\n"));
    }

    #[test]
    fn fragment_is_wrapped() {
        let source = "package main

var Time float

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv) * sin(Time)
}
";
        let (vs, fs) = glsl(source, 1, GlslVersion::Default);
        assert!(fs.contains("uniform float U0;"));
        assert!(fs.contains("uniform sampler2D T0;"));
        assert!(fs.contains("in vec2 V0;"));
        assert!(fs.contains("vec4 F0(in vec4 l0, in vec2 l1);"));
        assert!(fs.contains("\treturn (texture(T0, l1)) * (sin(U0));"));
        assert!(fs.contains("\tgl_FragColor = F0(gl_FragCoord, V0);"));
        assert!(vs.contains("out vec2 V0;"));
    }

    #[test]
    fn pixels_use_texel_fetch() {
        let source = "//kage:unit pixels

package main

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv)
}
";
        let (_, fs) = glsl(source, 1, GlslVersion::Default);
        assert!(fs.contains("texelFetch(T0, ivec2(l1), 0)"));
    }

    #[test]
    fn es300_prelude() {
        let (vs, fs) = glsl(
            "package main\n\nfunc Fragment(pos vec4) vec4 {\n\treturn pos\n}\n",
            0,
            GlslVersion::Es300,
        );
        assert!(vs.starts_with("#version 300 es"));
        assert!(fs.starts_with("#version 300 es"));
        assert!(fs.contains("out vec4 fragColor;"));
        assert!(fs.contains("\tfragColor = F0(gl_FragCoord);"));
        assert!(!fs.contains("modInt"));
    }

    #[test]
    fn builtin_renames() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	a := 7
	b := a % 3
	x := atan2(pos.x, pos.y) + dfdx(pos.x)
	return vec4(x, float(b), 0, 1)
}
";
        let (_, fs) = glsl(source, 0, GlslVersion::Default);
        assert!(fs.contains("modInt((l1), (3))"), "{fs}");
        assert!(fs.contains("atan((l0).x, (l0).y)"), "{fs}");
        assert!(fs.contains("dFdx((l0).x)"), "{fs}");
        assert!(fs.contains("\tint l1 = 0;"));

        let (_, fs) = glsl(source, 0, GlslVersion::Es300);
        assert!(fs.contains("(l1) % (3)"), "{fs}");
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
        let (_, fs) = glsl(source, 0, GlslVersion::Default);
        assert!(fs.contains("\t\tdiscard;\n\t\treturn vec4(0.0);"), "{fs}");
    }

    #[test]
    fn stages_carry_only_reachable_functions() {
        let source = "package main

func Shift(p vec4) vec4 {
	return p + vec4(1)
}

func Tint(c vec4) vec4 {
	return c * 0.5
}

func Vertex(pos vec4) vec4 {
	return Shift(pos)
}

func Fragment(pos vec4) vec4 {
	return Tint(pos)
}
";
        let (vs, fs) = glsl(source, 0, GlslVersion::Default);
        assert!(vs.contains("vec4 F0(in vec4 l0)"));
        assert!(!vs.contains("F1("));
        assert!(fs.contains("vec4 F1(in vec4 l0)"));
        assert!(!fs.contains("F0("));
        assert!(fs.contains("gl_FragColor = F2(gl_FragCoord);"));
    }

    #[test]
    fn for_loop_and_arrays() {
        let source = "package main

func Fragment(pos vec4) vec4 {
	var a [3]float
	for i := 0; i < 3; i++ {
		a[i] = float(i)
	}
	b := a
	return vec4(b[0], b[1], b[2], 1)
}
";
        let (_, fs) = glsl(source, 0, GlslVersion::Default);
        assert!(fs.contains("\tfloat l1[3];"), "{fs}");
        assert!(fs.contains("\tl1[2] = float(0);"), "{fs}");
        assert!(fs.contains("\t{\n\t\tfor (int l2 = 0; l2 < 3; l2++) {"), "{fs}");
        assert!(fs.contains("\t\t\t(l1)[l2] = float(l2);"), "{fs}");
        assert!(fs.contains("\tfloat l2[3];"), "{fs}");
        assert!(fs.contains("\tl2[1] = l1[1];"), "{fs}");
    }
}

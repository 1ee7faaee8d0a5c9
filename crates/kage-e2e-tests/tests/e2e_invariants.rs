//! Properties that hold for every program, checked over small families of
//! inputs.

mod common;

use common::{compile, compile_err, emit, registry};
use kage_ir::{BasicType, BuiltinFunc, ConstType, Constant, Expr, Stmt, Type};

const SHADER: &str = "package main

var Time float
var Offsets [3]vec2

func Wave(x float) (y float, dy float) {
	y = sin(x * Time)
	dy = cos(x * Time)
	return
}

func Vertex(pos vec2, uv vec2) (vec4, vec2) {
	return vec4(pos+Offsets[1], 0, 1), uv
}

func Fragment(pos vec4, uv vec2) vec4 {
	y, dy := Wave(uv.x)
	c := vec4(y, dy, 0, 1)
	for i := 0; i < 3; i++ {
		c += vec4(float(i))
	}
	if c.x > 1 {
		discard()
	}
	return c
}
";

#[test]
fn outputs_are_deterministic() {
    let registry = registry();
    for target in ["glsl", "hlsl", "msl", "ir"] {
        let backend = registry.find(target).unwrap();
        let first = emit(&compile(SHADER, 0), backend);
        let second = emit(&compile(SHADER, 0), backend);
        assert_eq!(first.files.len(), second.files.len());
        for (a, b) in first.files.iter().zip(&second.files) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.content, b.content, "{target}");
        }
    }
}

/// Packed size in dwords of the uniform types used below.
fn dwords(t: &Type) -> usize {
    match t.main {
        BasicType::Float => 1,
        BasicType::Vec2 => 2,
        BasicType::Vec3 => 3,
        BasicType::Vec4 => 4,
        BasicType::Mat2 => 6,
        BasicType::Mat3 => 11,
        BasicType::Mat4 => 16,
        _ => unreachable!(),
    }
}

#[test]
fn uniform_layout_never_straddles_registers() {
    use BasicType::*;
    let families: [&[BasicType]; 6] = [
        &[Float, Vec3, Float, Vec4],
        &[Vec2, Vec3, Vec2, Vec2, Float],
        &[Float, Float, Float, Vec2, Mat2, Float],
        &[Vec3, Vec3, Float, Mat3, Vec2],
        &[Float, Mat4, Float, Vec2, Vec2, Vec2],
        &[Vec2, Float, Vec2, Float, Float, Vec4],
    ];
    for family in families {
        let types: Vec<Type> = family.iter().map(|&b| Type::basic(b)).collect();
        let offsets = kage_ir::uniform_offsets_in_dwords(&types);
        assert_eq!(offsets.len(), types.len());
        assert_eq!(offsets[0], 0);
        for (i, t) in types.iter().enumerate() {
            let (start, size) = (offsets[i], dwords(t));
            if let Some(&next) = offsets.get(i + 1) {
                assert!(start + size <= next, "{family:?} overlaps at {i}");
            }
            if size <= 4 {
                assert_eq!(start / 4, (start + size - 1) / 4, "{family:?} straddles at {i}");
            } else {
                assert_eq!(start % 4, 0, "{family:?} unaligned matrix at {i}");
            }
        }
    }
}

#[test]
fn for_loop_totality() {
    // (condition, step, accepted) for a counter running from 0 to 10.
    let cases = [
        ("<", "i++", true),
        ("<", "i--", false),
        ("<=", "i++", true),
        ("<=", "i--", false),
        (">", "i++", false),
        (">", "i--", true),
        (">=", "i++", false),
        (">=", "i--", true),
        ("==", "i++", true),
        ("==", "i--", true),
        ("!=", "i++", true),
        ("!=", "i--", false),
    ];
    for (op, step, accepted) in cases {
        let source = format!(
            "package main

func Fragment(pos vec4) vec4 {{
	sum := 0.0
	for i := 0; i {op} 10; {step} {{
		sum += float(i)
	}}
	return vec4(sum)
}}
"
        );
        if accepted {
            compile(&source, 0);
        } else {
            let err = compile_err(&source);
            assert!(err.contains("for-statement's loop never ends"), "{op} {step}: {err}");
        }
    }
}

#[test]
fn integer_constants_fold_exactly() {
    let cases = [
        ("40 + 2", 42),
        ("100 - 58", 42),
        ("7 * 6", 42),
        ("85 / 2", 42),
        ("85 % 43", 42),
        ("21 << 1", 42),
        ("(1 << 100) >> 98", 4),
        ("(1 << 80) / (1 << 78)", 4),
    ];
    for (expr, value) in cases {
        let source = format!(
            "package main

const X = {expr}

func Fragment(pos vec4) vec4 {{
	return vec4(X)
}}
"
        );
        let program = compile(&source, 0);
        let fragment = program.fragment_func.expect("fragment entry");
        assert_eq!(
            fragment.stmts,
            vec![Stmt::Return(Some(Expr::call(
                Expr::BuiltinFuncExpr(BuiltinFunc::Vec4F),
                vec![Expr::Number {
                    value: Constant::float_from_int(value),
                    ty: ConstType::Float,
                }],
            )))],
            "{expr}"
        );
    }
}

#[test]
fn helper_out_params_survive_every_backend() {
    let program = compile(SHADER, 0);
    let registry = registry();
    for target in ["glsl", "hlsl", "msl"] {
        let output = emit(&program, registry.find(target).unwrap());
        let all: String = output
            .files
            .iter()
            .map(|f| f.content.as_str())
            .collect();
        assert!(all.contains("F0("), "{target}: {all}");
    }
}

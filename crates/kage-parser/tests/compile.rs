//! Integration tests for the Kage front end.

use kage_ir::{BasicType, BuiltinFunc, ConstType, Constant, Expr, Stmt, Type, Unit};
use kage_parser::{CompileError, CompileOptions, compile};

fn compile_ok(source: &str) -> kage_ir::Program {
    match compile(source, &CompileOptions::default()) {
        Ok(program) => program,
        Err(err) => panic!("compile failed:\n{err}"),
    }
}

fn compile_err(source: &str) -> String {
    match compile(source, &CompileOptions::default()) {
        Ok(_) => panic!("expected a compile error"),
        Err(err) => err.to_string(),
    }
}

fn t(main: BasicType) -> Type {
    Type::basic(main)
}

#[test]
fn minimal_vertex_shader() {
    let program = compile_ok("package main\n\nfunc Vertex(pos vec4) vec4 {\n\treturn pos\n}\n");
    assert_eq!(program.attributes, vec![t(BasicType::Vec4)]);
    assert!(program.varyings.is_empty());
    let vertex = program.vertex_func.expect("vertex entry");
    assert_eq!(
        vertex.stmts,
        vec![
            Stmt::Assign {
                lhs: Expr::LocalVariable(1),
                rhs: Expr::LocalVariable(0),
            },
            Stmt::Return(None),
        ]
    );
    assert!(program.fragment_func.is_none());
}

#[test]
fn uniforms_attributes_and_varyings() {
    let source = "package main

var Time float
var __imageDstTextureSize vec2

func Vertex(pos vec2, uv vec2) (vec4, vec2) {
	return vec4(pos, 0, 1), uv
}

func Fragment(pos vec4, uv vec2) vec4 {
	return vec4(uv, sin(Time), 1)
}
";
    let program = compile_ok(source);
    assert_eq!(program.uniform_names, ["__imageDstTextureSize", "Time"]);
    assert_eq!(program.uniforms, vec![t(BasicType::Vec2), Type::FLOAT]);
    assert_eq!(program.attributes, vec![t(BasicType::Vec2), t(BasicType::Vec2)]);
    assert_eq!(program.varyings, vec![t(BasicType::Vec2)]);

    let fragment = program.fragment_func.expect("fragment entry");
    assert!(matches!(fragment.stmts.last(), Some(Stmt::Return(Some(_)))));

    // Both results are stored through temporaries, then returned.
    let vertex = program.vertex_func.expect("vertex entry");
    assert_eq!(vertex.local_var_index_offset, 4);
    assert_eq!(vertex.local_vars, vec![t(BasicType::Vec4), t(BasicType::Vec2)]);
    assert_eq!(vertex.stmts.last(), Some(&Stmt::Return(None)));
}

#[test]
fn swizzles() {
    compile_ok(
        "package main

func Fragment(pos vec4) vec4 {
	var a vec4
	var b vec3 = a.xyz
	return vec4(b, a.w)
}
",
    );

    let err = compile_err(
        "package main

func Fragment(pos vec4) vec4 {
	var a vec2
	var b vec3 = a.xyw
	return vec4(b, 1)
}
",
    );
    assert!(err.contains("unexpected swizzling: xyw"), "{err}");
}

#[test]
fn constants_fold_to_a_single_number() {
    let program = compile_ok(
        "package main

const X = 1 << 3 + 2

func Fragment(pos vec4) vec4 {
	return vec4(X)
}
",
    );
    let fragment = program.fragment_func.expect("fragment entry");
    assert_eq!(
        fragment.stmts,
        vec![Stmt::Return(Some(Expr::call(
            Expr::BuiltinFuncExpr(BuiltinFunc::Vec4F),
            vec![Expr::Number {
                value: Constant::float_from_int(10),
                ty: ConstType::Float,
            }],
        )))]
    );
}

#[test]
fn for_loops() {
    for post in ["i++", "i = i + 1", "i += 1"] {
        let source = format!(
            "package main

func Fragment(pos vec4) vec4 {{
	sum := 0.0
	for i := 0; i < 10; {post} {{
		sum += float(i)
	}}
	return vec4(sum)
}}
"
        );
        let program = compile_ok(&source);
        let fragment = program.fragment_func.expect("fragment entry");
        let Some(Stmt::BlockStmt(block)) = fragment.stmts.get(1) else {
            panic!("expected the loop block, got {:?}", fragment.stmts);
        };
        assert_eq!(block.local_vars, vec![Type::NONE]);
        let [Stmt::For(for_loop)] = block.stmts.as_slice() else {
            panic!("expected a for statement");
        };
        assert_eq!(for_loop.var_type, Type::INT);
        assert_eq!(for_loop.init, Constant::int(0));
        assert_eq!(for_loop.end, Constant::int(10));
        assert_eq!(for_loop.delta, Constant::int(1));
    }
}

#[test]
fn for_loop_requires_define() {
    let err = compile_err(
        "package main

func Fragment(pos vec4) vec4 {
	i := 0
	for i = 0; i < 10; i++ {
	}
	return vec4(float(i))
}
",
    );
    assert!(err.contains("for-statement must follow this format"), "{err}");
}

#[test]
fn for_loop_must_end() {
    let err = compile_err(
        "package main

func Fragment(pos vec4) vec4 {
	for i := 0; i < 10; i-- {
	}
	return pos
}
",
    );
    assert!(err.contains("for-statement's loop never ends"), "{err}");
}

#[test]
fn for_loop_counter_is_read_only() {
    let err = compile_err(
        "package main

func Fragment(pos vec4) vec4 {
	for i := 0; i < 10; i++ {
		i = 3
	}
	return pos
}
",
    );
    assert!(err.contains("for-loop counter i cannot be modified"), "{err}");
}

#[test]
fn out_params_become_temporaries() {
    let program = compile_ok(
        "package main

func Foo(x float) (a float, b float) {
	a = x
	b = x * 2
	return
}

func Fragment(pos vec4) vec4 {
	p, q := Foo(pos.x)
	return vec4(p, q, 0, 1)
}
",
    );
    assert_eq!(program.funcs.len(), 1);
    let foo = &program.funcs[0];
    assert_eq!(foo.out_params, vec![Type::FLOAT, Type::FLOAT]);
    assert!(foo.return_type.is_none());
    assert_eq!(foo.block.stmts[..2], [Stmt::Init(1), Stmt::Init(2)]);

    let fragment = program.fragment_func.expect("fragment entry");
    let Some(Stmt::ExprStmt(Expr::Call { callee, args })) = fragment.stmts.first() else {
        panic!("expected the call statement first");
    };
    assert_eq!(**callee, Expr::FunctionExpr(0));
    assert_eq!(args.len(), 3);
    assert_eq!(args[1], Expr::LocalVariable(1));
    assert_eq!(args[2], Expr::LocalVariable(2));
}

#[test]
fn unit_directive() {
    let program = compile_ok("//kage:unit pixels\n\npackage main\n");
    assert_eq!(program.unit, Unit::Pixels);
    let program = compile_ok("package main\n");
    assert_eq!(program.unit, Unit::Texels);

    let err = compile("//kage:unit meters\npackage main\n", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Directive(_)));
}

#[test]
fn textures() {
    let source = "package main

func Fragment(pos vec4, uv vec2) vec4 {
	return __texelAt(__t0, uv)
}
";
    let options = CompileOptions {
        texture_count: 1,
        ..Default::default()
    };
    let program = compile(source, &options).expect("compiles with one texture");
    assert_eq!(program.texture_count, 1);
    // Without a vertex entry the varyings come from the fragment signature.
    assert_eq!(program.varyings, vec![t(BasicType::Vec2)]);

    let err = compile_err(source);
    assert!(err.contains("unexpected identifier: __t0"), "{err}");
}

#[test]
fn matrix_vector_multiplication() {
    let program = compile_ok(
        "package main

func Fragment(pos vec4) vec4 {
	v := vec2(1) * mat2(1)
	return vec4(v, 0, 1)
}
",
    );
    let fragment = program.fragment_func.expect("fragment entry");
    let Some(Stmt::Assign { rhs, .. }) = fragment.stmts.first() else {
        panic!("expected an assignment");
    };
    assert!(matches!(rhs, Expr::Binary { op: kage_ir::Op::MatrixMul, .. }));
    assert_eq!(fragment.local_vars, vec![t(BasicType::Vec2)]);
}

#[test]
fn shift_of_untyped_constant_takes_context_type() {
    compile_ok(
        "package main

func Fragment(pos vec4) vec4 {
	s := 2
	x := 1 << s
	return vec4(float(x))
}
",
    );
    let err = compile_err(
        "package main

func Fragment(pos vec4) vec4 {
	s := 2
	var f float = 1 << s
	return vec4(f)
}
",
    );
    assert!(err.contains("left operand for left shift should be int"), "{err}");
}

#[test]
fn semantic_errors() {
    let cases = [
        (
            "var Color vec4\n\nfunc Fragment(pos vec4) vec4 {\n\tColor = vec4(1)\n\treturn Color\n}\n",
            "a uniform variable cannot be assigned",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tx := 1.0\n\treturn pos\n}\n",
            "local variable x is not used",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\ta := 1\n\tb := 1.0\n\tc := a + b\n\treturn vec4(c)\n}\n",
            "types don't match: int + float",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tx := 1.0\n\tvar x float\n\treturn vec4(x)\n}\n",
            "x redeclared in this block",
        ),
        (
            "func Fragment(pos vec4) vec2 {\n\treturn pos.xy\n}\n",
            "fragment entry point must have one returning vec4 value for a color",
        ),
        (
            "func Vertex(pos vec2) vec2 {\n\treturn pos\n}\n",
            "vertex entry point must have at least one returning vec4 value for a position",
        ),
        ("var Foo float = 1\n", "a uniform variable cannot have initial values"),
        ("var foo float\n", "global variables must be exposed: foo"),
        ("import \"math\"\n", "import is forbidden"),
        (
            "func Vertex(pos vec4) vec4 {\n\tdiscard()\n\treturn pos\n}\n",
            "discard is available only in Fragment",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tsin(1.0)\n\treturn pos\n}\n",
            "sin(1.0) is not used",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tx := 1.0\n\tx := 2.0\n\treturn vec4(x)\n}\n",
            "no new variables on left side of :=",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tpos = vec4(0)\n\treturn pos\n}\n",
            "entry point argument pos cannot be assigned",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tvar i int = 1.5\n\treturn vec4(float(i))\n}\n",
            "constant 1.5 truncated to integer",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tx := 1.0\n\tif x {\n\t}\n\treturn vec4(x)\n}\n",
            "if-condition must be bool but: float",
        ),
        (
            "func Foo(x float) float {\n\treturn x\n}\n\nfunc Fragment(pos vec4) vec4 {\n\treturn vec4(Foo())\n}\n",
            "not enough arguments in call to Foo",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tx := 1.0\n\treturn vec4(x, y)\n}\n",
            "unexpected identifier: y",
        ),
        (
            "func Foo() float {\n\tx := 1.0\n\tx = 2.0\n}\n",
            "function Foo must have a return statement but not",
        ),
    ];
    for (body, want) in cases {
        let err = compile_err(&format!("package main\n\n{body}"));
        assert!(err.contains(want), "expected {want:?} in:\n{err}");
    }
}

#[test]
fn block_comments() {
    let sources = [
        "package main\n\n/* doc */\nfunc Vertex(pos vec4) vec4 {\n\treturn pos\n}\n",
        "package main\n\nfunc Vertex(pos vec4) vec4 {\n\treturn /* x */ pos\n}\n",
        "package main\n\n/**\n * doc\n **/\nfunc Vertex(pos vec4) vec4 {\n\treturn pos /* tail */\n}\n",
    ];
    for source in sources {
        let program = compile_ok(source);
        assert_eq!(program.attributes, vec![t(BasicType::Vec4)]);
    }

    // The first `*/` closes the comment.
    let err = compile_err("package main\n\n/* a **/ func Vertex */\n");
    assert!(err.starts_with("3:"), "{err}");
}

#[test]
fn integer_constants_must_fit_in_int() {
    let cases = [
        (
            "func Fragment(pos vec4) vec4 {\n\tk := 1 << 70\n\treturn vec4(float(k))\n}\n",
            "constant 1180591620717411303424 overflows int",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tvar k int = 2147483648\n\treturn vec4(float(k))\n}\n",
            "constant 2147483648 overflows int",
        ),
        (
            "func Fragment(pos vec4) vec4 {\n\tk := 1\n\tk = 1e10\n\treturn vec4(float(k))\n}\n",
            "constant 10000000000 overflows int",
        ),
        (
            "const K int = 1 << 20\n\nfunc Fragment(pos vec4) vec4 {\n\tk := K * K\n\treturn vec4(float(k))\n}\n",
            "constant 1099511627776 overflows int",
        ),
        (
            "const K int = 1 << 40\n\nfunc Fragment(pos vec4) vec4 {\n\treturn pos\n}\n",
            "constant 1099511627776 overflows int",
        ),
    ];
    for (body, want) in cases {
        let err = compile_err(&format!("package main\n\n{body}"));
        assert!(err.contains(want), "expected {want:?} in:\n{err}");
    }

    compile_ok(
        "package main\n\nfunc Fragment(pos vec4) vec4 {\n\tk := -2147483648 + (1 << 100) / (1 << 100)\n\treturn vec4(float(k))\n}\n",
    );
}

#[test]
fn errors_carry_positions() {
    let err = compile(
        "package main\n\nfunc Fragment(pos vec4) vec4 {\n\tx := 1.0\n\treturn pos\n}\n",
        &CompileOptions::default(),
    )
    .unwrap_err();
    let errors = err.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].pos.line, 4);
}

#[test]
fn syntax_errors_are_reported_as_such() {
    let err = compile("package main\n\nfunc {\n", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
}

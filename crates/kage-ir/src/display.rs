//! Display implementations and text dump for debugging.

use std::fmt::{self, Write};

use crate::Program;
use crate::expr::Expr;
use crate::stmt::{Block, Stmt};
use crate::types::Type;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => f.write_str("_"),
            Self::Number { value, .. } => write!(f, "{value}"),
            Self::UniformVariable(i) => write!(f, "U{i}"),
            Self::TextureVariable(i) => write!(f, "T{i}"),
            Self::LocalVariable(i) => write!(f, "l{i}"),
            Self::StructMember(i) => write!(f, "M{i}"),
            Self::BuiltinFuncExpr(b) => write!(f, "{b}"),
            Self::SwizzlingExpr(s) => f.write_str(s),
            Self::FunctionExpr(i) => write!(f, "F{i}"),
            Self::Unary { op, operand } => write!(f, "{op}({operand})"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Selection {
                cond,
                then,
                otherwise,
            } => write!(f, "({cond} ? {then} : {otherwise})"),
            Self::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Self::FieldSelector { base, field } => write!(f, "{base}.{field}"),
            Self::Index { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

fn dump_block(out: &mut String, block: &Block, level: usize) -> fmt::Result {
    let idt = "  ".repeat(level);
    for (i, t) in block.local_vars.iter().enumerate() {
        let idx = block.local_var_index_offset + i;
        if !t.is_none() {
            writeln!(out, "{idt}var l{idx} {t}")?;
        }
    }
    for stmt in &block.stmts {
        match stmt {
            Stmt::ExprStmt(e) => writeln!(out, "{idt}{e}")?,
            Stmt::BlockStmt(b) => {
                writeln!(out, "{idt}{{")?;
                dump_block(out, b, level + 1)?;
                writeln!(out, "{idt}}}")?;
            }
            Stmt::Assign { lhs, rhs } => writeln!(out, "{idt}{lhs} = {rhs}")?,
            Stmt::Init(i) => writeln!(out, "{idt}init l{i}")?,
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                writeln!(out, "{idt}if {cond} {{")?;
                dump_block(out, then, level + 1)?;
                if let Some(b) = otherwise {
                    writeln!(out, "{idt}}} else {{")?;
                    dump_block(out, b, level + 1)?;
                }
                writeln!(out, "{idt}}}")?;
            }
            Stmt::For(l) => {
                let v = l.var_index;
                writeln!(
                    out,
                    "{idt}for l{v} {} := {}; l{v} {} {}; l{v} += {} {{",
                    l.var_type, l.init, l.op, l.end, l.delta
                )?;
                dump_block(out, &l.body, level + 1)?;
                writeln!(out, "{idt}}}")?;
            }
            Stmt::Continue => writeln!(out, "{idt}continue")?,
            Stmt::Break => writeln!(out, "{idt}break")?,
            Stmt::Return(Some(e)) => writeln!(out, "{idt}return {e}")?,
            Stmt::Return(None) => writeln!(out, "{idt}return")?,
            Stmt::Discard => writeln!(out, "{idt}discard")?,
        }
    }
    Ok(())
}

fn params(out: &mut String, ins: &[Type], outs: &[Type]) -> fmt::Result {
    let mut idx = 0;
    for t in ins {
        if idx > 0 {
            out.push_str(", ");
        }
        write!(out, "l{idx} {t}")?;
        idx += 1;
    }
    for t in outs {
        if idx > 0 {
            out.push_str(", ");
        }
        write!(out, "out l{idx} {t}")?;
        idx += 1;
    }
    Ok(())
}

fn write_program(out: &mut String, program: &Program) -> fmt::Result {
    writeln!(
        out,
        "; unit: {}, textures: {}",
        program.unit, program.texture_count
    )?;

    if !program.uniforms.is_empty() {
        writeln!(out, "\nUniforms:")?;
        let offsets = program.uniform_offsets_in_dwords();
        for (i, t) in program.uniforms.iter().enumerate() {
            let name = program.uniform_names.get(i).map_or("", String::as_str);
            writeln!(out, "  U{i} {name}: {t} @dword {}", offsets[i])?;
        }
    }
    if !program.attributes.is_empty() {
        writeln!(out, "\nAttributes:")?;
        for (i, t) in program.attributes.iter().enumerate() {
            writeln!(out, "  A{i}: {t}")?;
        }
    }
    if !program.varyings.is_empty() {
        writeln!(out, "\nVaryings:")?;
        for (i, t) in program.varyings.iter().enumerate() {
            writeln!(out, "  V{i}: {t}")?;
        }
    }
    if !program.funcs.is_empty() {
        writeln!(out, "\nFunctions:")?;
        for func in &program.funcs {
            write!(out, "  F{}(", func.index)?;
            params(out, &func.in_params, &func.out_params)?;
            out.push(')');
            if !func.return_type.is_none() {
                write!(out, " {}", func.return_type)?;
            }
            writeln!(out, " {{")?;
            dump_block(out, &func.block, 2)?;
            writeln!(out, "  }}")?;
        }
    }
    if let Some(block) = &program.vertex_func {
        write!(out, "\nVertex(")?;
        let n = program.attributes.len();
        params(out, &program.attributes, &program.vertex_params()[n..])?;
        writeln!(out, ") {{")?;
        dump_block(out, block, 1)?;
        writeln!(out, "}}")?;
    }
    if let Some(block) = &program.fragment_func {
        write!(out, "\nFragment(")?;
        params(out, &program.fragment_params(), &[])?;
        writeln!(out, ") vec4 {{")?;
        dump_block(out, block, 1)?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Renders a program as human-readable text.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_program(&mut out, program);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Unit;
    use crate::constant::Constant;
    use crate::expr::{BuiltinFunc, Op};
    use crate::types::BasicType;

    #[test]
    fn expr_display() {
        let e = Expr::binary(
            Op::ComponentWiseMul,
            Expr::FieldSelector {
                base: Box::new(Expr::LocalVariable(0)),
                field: Box::new(Expr::SwizzlingExpr("xy".into())),
            },
            Expr::call(
                Expr::BuiltinFuncExpr(BuiltinFunc::Vec2F),
                vec![Expr::number(Constant::ratio(1, 2))],
            ),
        );
        assert_eq!(e.to_string(), "(l0.xy * vec2(0.5))");
    }

    #[test]
    fn dump_lists_sections() {
        let mut program = Program::new(Unit::Texels);
        program.uniform_names = vec!["Time".into()];
        program.uniforms = vec![Type::FLOAT];
        program.attributes = vec![Type::basic(BasicType::Vec2)];
        program.vertex_func = Some(Block {
            local_var_index_offset: 2,
            stmts: vec![
                Stmt::Assign {
                    lhs: Expr::LocalVariable(1),
                    rhs: Expr::LocalVariable(0),
                },
                Stmt::Return(None),
            ],
            ..Default::default()
        });
        let dump = dump_program(&program);
        assert!(dump.contains("Uniforms:"));
        assert!(dump.contains("U0 Time: float @dword 0"));
        assert!(dump.contains("A0: vec2"));
        assert!(dump.contains("l1 = l0"));
        assert!(!dump.contains("Fragment("));
    }
}

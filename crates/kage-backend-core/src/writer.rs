//! Statement and expression lowering shared by the C-like targets.
//!
//! GLSL, HLSL and MSL agree on most of their surface syntax: blocks,
//! assignments, `for` headers, calls and operators. A [`Dialect`] supplies
//! the places where they differ (type spelling, names of entry-point
//! parameters, builtin names, a handful of special calls) and
//! [`BlockWriter`] does the rest.

use kage_ir::{BasicType, Block, BuiltinFunc, Constant, Expr, Func, Op, Program, Stmt, Type};

use crate::BackendError;

/// The kind of body a block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// The vertex entry point.
    Vertex,
    /// The fragment entry point.
    Fragment,
    /// A helper function.
    Func,
}

/// What a local variable index refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// A vertex attribute, numbered from zero.
    Attribute(usize),
    /// The clip-space position (vertex output, fragment input).
    Position,
    /// A varying, numbered from zero.
    Varying(usize),
    /// A plain local, numbered from zero after the pseudo-parameters of an
    /// entry point, or by absolute index inside a helper function.
    Local(usize),
}

/// A function body together with the parameter types its local indices
/// start with.
#[derive(Debug)]
pub struct Body<'a> {
    /// Which kind of function this is.
    pub kind: BodyKind,
    attributes: usize,
    varyings: usize,
    params: Vec<Type>,
    top: &'a Block,
}

impl<'a> Body<'a> {
    /// The vertex entry point of `program`.
    pub fn vertex(program: &Program, top: &'a Block) -> Self {
        Self {
            kind: BodyKind::Vertex,
            attributes: program.attributes.len(),
            varyings: program.varyings.len(),
            params: program.vertex_params(),
            top,
        }
    }

    /// The fragment entry point of `program`.
    pub fn fragment(program: &Program, top: &'a Block) -> Self {
        Self {
            kind: BodyKind::Fragment,
            attributes: 0,
            varyings: program.varyings.len(),
            params: program.fragment_params(),
            top,
        }
    }

    /// A helper function.
    pub fn func(func: &'a Func) -> Self {
        Self {
            kind: BodyKind::Func,
            attributes: 0,
            varyings: 0,
            params: func
                .in_params
                .iter()
                .chain(&func.out_params)
                .cloned()
                .collect(),
            top: &func.block,
        }
    }

    /// The outermost block.
    pub fn top(&self) -> &'a Block {
        self.top
    }

    /// Classifies a local variable index.
    pub fn slot(&self, index: usize) -> Slot {
        match self.kind {
            BodyKind::Func => Slot::Local(index),
            BodyKind::Vertex => {
                let (na, nv) = (self.attributes, self.varyings);
                if index < na {
                    Slot::Attribute(index)
                } else if index == na {
                    Slot::Position
                } else if index <= na + nv {
                    Slot::Varying(index - na - 1)
                } else {
                    Slot::Local(index - (na + nv + 1))
                }
            }
            BodyKind::Fragment => {
                if index == 0 {
                    Slot::Position
                } else if index <= self.varyings {
                    Slot::Varying(index - 1)
                } else {
                    Slot::Local(index - (self.varyings + 1))
                }
            }
        }
    }

    /// The type of the local at absolute `index`.
    pub fn local_type(&self, index: usize) -> Result<Type, BackendError> {
        Ok(Program::local_variable_type(&self.params, self.top, index)?)
    }
}

/// Target-specific spelling used by [`BlockWriter`].
pub trait Dialect {
    /// Spelling of `t` split around a declared name, e.g. `("float", "[4]")`.
    fn type_parts(&self, t: &Type) -> Result<(String, String), BackendError>;

    /// An expression holding the zero value of `t`.
    fn zero_value(&self, t: &Type) -> Result<String, BackendError>;

    /// Name of a local variable slot.
    fn slot_name(&self, slot: Slot) -> String;

    /// Name of the target function for a builtin.
    fn builtin_name(&self, f: BuiltinFunc) -> &'static str;

    /// Name of the uniform at `index`.
    fn uniform_name(&self, index: usize) -> String {
        format!("U{index}")
    }

    /// A declaration of `name` with type `t`.
    fn var_decl(&self, t: &Type, name: &str) -> Result<String, BackendError> {
        let (prefix, suffix) = self.type_parts(t)?;
        Ok(format!("{prefix} {name}{suffix}"))
    }

    /// Renders a binary operation.
    fn binary(&self, op: Op, lhs: &str, rhs: &str) -> String {
        format!("({lhs}) {op} ({rhs})")
    }

    /// Renders a builtin call specially; `None` falls back to `name(args)`.
    fn builtin_call(&self, _f: BuiltinFunc, _args: &[String]) -> Option<String> {
        None
    }

    /// Arguments passed ahead of the declared ones to every user function.
    fn implicit_args(&self) -> Vec<String> {
        Vec::new()
    }

    /// Renders a return statement.
    fn return_stmt(&self, _kind: BodyKind, value: Option<String>) -> String {
        match value {
            Some(v) => format!("return {v};"),
            None => "return;".into(),
        }
    }

    /// Lines that discard the current fragment.
    fn discard(&self) -> Vec<String>;

    /// Whether `Init` of the local at `index` is dropped.
    fn skips_init(&self, _body: &Body<'_>, _index: usize) -> bool {
        false
    }

    /// Whether whole-array assignment must be spelled per element.
    fn splits_array_assign(&self) -> bool {
        true
    }

    /// Lines that zero-initialise (and, with `decl`, declare) a local.
    fn init_lines(&self, name: &str, t: &Type, decl: bool) -> Result<Vec<String>, BackendError> {
        match t.main {
            // For-loop counters are declared by the loop header.
            BasicType::None => Ok(Vec::new()),
            BasicType::Array => {
                let elem = t
                    .elem()
                    .ok_or_else(|| BackendError::Other(format!("array without element type: {t}")))?;
                let zero = self.zero_value(elem)?;
                let mut lines = Vec::with_capacity(t.length + 1);
                if decl {
                    lines.push(format!("{};", self.var_decl(t, name)?));
                }
                lines.extend((0..t.length).map(|i| format!("{name}[{i}] = {zero};")));
                Ok(lines)
            }
            _ => {
                let zero = self.zero_value(t)?;
                let target = if decl {
                    self.var_decl(t, name)?
                } else {
                    name.to_string()
                };
                Ok(vec![format!("{target} = {zero};")])
            }
        }
    }
}

/// Lowers the blocks of one function body.
pub struct BlockWriter<'a, D: Dialect + ?Sized> {
    dialect: &'a D,
    body: &'a Body<'a>,
}

impl<'a, D: Dialect + ?Sized> BlockWriter<'a, D> {
    /// Creates a writer for `body`.
    pub fn new(dialect: &'a D, body: &'a Body<'a>) -> Self {
        Self { dialect, body }
    }

    /// Lines of the body's top block at indentation `level + 1`.
    pub fn top(&self, level: usize) -> Result<Vec<String>, BackendError> {
        self.block(self.body.top(), level, &[])
    }

    /// Name of the local at absolute `index`.
    pub fn local_name(&self, index: usize) -> String {
        self.dialect.slot_name(self.body.slot(index))
    }

    /// Resolves a local's type innermost block first; sibling blocks may
    /// reuse the same indices.
    fn local_type(&self, chain: &[&Block], index: usize) -> Result<Type, BackendError> {
        for b in chain.iter().rev() {
            if b.local_indices().contains(&index) {
                if let Some(t) = b.local_vars.get(index - b.local_var_index_offset) {
                    return Ok(t.clone());
                }
            }
        }
        self.body.local_type(index)
    }

    fn block(&self, block: &Block, level: usize, outer: &[&Block]) -> Result<Vec<String>, BackendError> {
        let idt = "\t".repeat(level + 1);
        let mut lines = Vec::new();
        let mut chain: Vec<&Block> = outer.to_vec();
        chain.push(block);

        for (i, t) in block.local_vars.iter().enumerate() {
            let name = self.local_name(block.local_var_index_offset + i);
            for line in self.dialect.init_lines(&name, t, true)? {
                lines.push(format!("{idt}{line}"));
            }
        }

        for stmt in &block.stmts {
            self.stmt(stmt, level, &idt, &chain, &mut lines)?;
        }
        Ok(lines)
    }

    fn stmt(
        &self,
        stmt: &Stmt,
        level: usize,
        idt: &str,
        chain: &[&Block],
        lines: &mut Vec<String>,
    ) -> Result<(), BackendError> {
        match stmt {
            Stmt::ExprStmt(e) => lines.push(format!("{idt}{};", self.expr(e)?)),
            Stmt::BlockStmt(b) => {
                lines.push(format!("{idt}{{"));
                lines.extend(self.block(b, level + 1, chain)?);
                lines.push(format!("{idt}}}"));
            }
            Stmt::Assign { lhs, rhs } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                if let Expr::LocalVariable(i) = lhs {
                    if self.dialect.splits_array_assign() {
                        let t = self.local_type(chain, *i)?;
                        if t.main == BasicType::Array {
                            lines.extend((0..t.length).map(|k| format!("{idt}{l}[{k}] = {r}[{k}];")));
                            return Ok(());
                        }
                    }
                }
                lines.push(format!("{idt}{l} = {r};"));
            }
            Stmt::Init(i) => {
                if !self.dialect.skips_init(self.body, *i) {
                    let t = self.local_type(chain, *i)?;
                    let name = self.local_name(*i);
                    for line in self.dialect.init_lines(&name, &t, false)? {
                        lines.push(format!("{idt}{line}"));
                    }
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                lines.push(format!("{idt}if ({}) {{", self.expr(cond)?));
                lines.extend(self.block(then, level + 1, chain)?);
                if let Some(b) = otherwise {
                    lines.push(format!("{idt}}} else {{"));
                    lines.extend(self.block(b, level + 1, chain)?);
                }
                lines.push(format!("{idt}}}"));
            }
            Stmt::For(l) => {
                if !l.op.is_comparison() {
                    return Err(BackendError::Other(format!("unexpected for-loop operator: {}", l.op)));
                }
                let v = self.local_name(l.var_index);
                let delta = step(&v, &l.delta)?;
                let decl = self.dialect.var_decl(&l.var_type, &v)?;
                lines.push(format!(
                    "{idt}for ({decl} = {}; {v} {} {}; {delta}) {{",
                    l.init.literal(),
                    l.op,
                    l.end.literal()
                ));
                lines.extend(self.block(&l.body, level + 1, chain)?);
                lines.push(format!("{idt}}}"));
            }
            Stmt::Continue => lines.push(format!("{idt}continue;")),
            Stmt::Break => lines.push(format!("{idt}break;")),
            Stmt::Return(value) => {
                let value = value.as_ref().map(|e| self.expr(e)).transpose()?;
                lines.push(format!("{idt}{}", self.dialect.return_stmt(self.body.kind, value)));
            }
            Stmt::Discard => {
                for line in self.dialect.discard() {
                    lines.push(format!("{idt}{line}"));
                }
            }
        }
        Ok(())
    }

    /// Renders an expression.
    pub fn expr(&self, e: &Expr) -> Result<String, BackendError> {
        Ok(match e {
            Expr::Blank => return Err(BackendError::Other("blank identifier used as a value".into())),
            Expr::Number { value, .. } => value.literal(),
            Expr::UniformVariable(i) => self.dialect.uniform_name(*i),
            Expr::TextureVariable(i) => format!("T{i}"),
            Expr::LocalVariable(i) => self.local_name(*i),
            Expr::StructMember(i) => format!("M{i}"),
            Expr::BuiltinFuncExpr(f) => self.dialect.builtin_name(*f).to_string(),
            Expr::SwizzlingExpr(s) => {
                if !kage_ir::is_valid_swizzling(s) {
                    return Err(BackendError::Other(format!("unexpected swizzling: {s}")));
                }
                s.clone()
            }
            Expr::FunctionExpr(i) => format!("F{i}"),
            Expr::Unary { op, operand } => match op {
                Op::Add | Op::Sub | Op::NotOp => format!("{op}({})", self.expr(operand)?),
                _ => return Err(BackendError::Other(format!("unexpected unary operator: {op}"))),
            },
            Expr::Binary { op, lhs, rhs } => {
                self.dialect.binary(*op, &self.expr(lhs)?, &self.expr(rhs)?)
            }
            Expr::Selection {
                cond,
                then,
                otherwise,
            } => format!(
                "({}) ? ({}) : ({})",
                self.expr(cond)?,
                self.expr(then)?,
                self.expr(otherwise)?
            ),
            Expr::Call { callee, args } => self.call(callee, args)?,
            Expr::FieldSelector { base, field } => {
                format!("({}).{}", self.expr(base)?, self.expr(field)?)
            }
            Expr::Index { base, index } => format!("({})[{}]", self.expr(base)?, self.expr(index)?),
        })
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<String, BackendError> {
        let rendered = args
            .iter()
            .map(|a| self.expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        match callee {
            Expr::BuiltinFuncExpr(f) => {
                if let Some(s) = self.dialect.builtin_call(*f, &rendered) {
                    return Ok(s);
                }
                let name = self.dialect.builtin_name(*f);
                if matches!(f, BuiltinFunc::Min | BuiltinFunc::Max) && rendered.len() > 2 {
                    return Ok(nest_calls(name, &rendered));
                }
                Ok(format!("{name}({})", rendered.join(", ")))
            }
            Expr::FunctionExpr(i) => {
                let mut all = self.dialect.implicit_args();
                all.extend(rendered);
                Ok(format!("F{i}({})", all.join(", ")))
            }
            other => Err(BackendError::Other(format!("unexpected callee: {other}"))),
        }
    }
}

/// Folds `f(a, b, c)` into `f(f(a, b), c)`.
pub fn nest_calls(name: &str, args: &[String]) -> String {
    let mut iter = args.iter();
    let Some(first) = iter.next() else {
        return format!("{name}()");
    };
    iter.fold(first.clone(), |acc, a| format!("{name}({acc}, {a})"))
}

/// The increment clause of a `for` header.
fn step(v: &str, delta: &Constant) -> Result<String, BackendError> {
    match delta.signum() {
        0 => Err(BackendError::Other(format!("unexpected for-loop delta: {delta}"))),
        s if delta.to_f64() == Some(f64::from(s)) => Ok(if s > 0 {
            format!("{v}++")
        } else {
            format!("{v}--")
        }),
        s if s > 0 => Ok(format!("{v} += {}", delta.literal())),
        _ => {
            let magnitude = Constant::unary(Op::Sub, delta)
                .ok_or_else(|| BackendError::Other(format!("unexpected for-loop delta: {delta}")))?;
            Ok(format!("{v} -= {}", magnitude.literal()))
        }
    }
}

/// Joins emitted lines, collapsing runs of blank lines and ending with a
/// single newline.
pub fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    let mut blank = true;
    for line in lines {
        if line.is_empty() {
            if !blank {
                out.push('\n');
            }
            blank = true;
            continue;
        }
        out.push_str(line);
        out.push('\n');
        blank = false;
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_ir::ForLoop;

    #[derive(Debug)]
    struct Plain;

    impl Dialect for Plain {
        fn type_parts(&self, t: &Type) -> Result<(String, String), BackendError> {
            match t.elem() {
                Some(elem) => Ok((elem.to_string(), format!("[{}]", t.length))),
                None => Ok((t.to_string(), String::new())),
            }
        }

        fn zero_value(&self, t: &Type) -> Result<String, BackendError> {
            Ok(format!("{t}(0)"))
        }

        fn slot_name(&self, slot: Slot) -> String {
            match slot {
                Slot::Attribute(i) => format!("A{i}"),
                Slot::Position => "pos".into(),
                Slot::Varying(i) => format!("V{i}"),
                Slot::Local(i) => format!("l{i}"),
            }
        }

        fn builtin_name(&self, f: BuiltinFunc) -> &'static str {
            f.name()
        }

        fn discard(&self) -> Vec<String> {
            vec!["discard;".into()]
        }
    }

    fn program() -> Program {
        let mut program = Program::default();
        program.attributes = vec![Type::basic(BasicType::Vec2)];
        program.varyings = vec![Type::basic(BasicType::Vec2), Type::FLOAT];
        program
    }

    #[test]
    fn vertex_slots() {
        let block = Block::default();
        let program = program();
        let body = Body::vertex(&program, &block);
        assert_eq!(body.slot(0), Slot::Attribute(0));
        assert_eq!(body.slot(1), Slot::Position);
        assert_eq!(body.slot(2), Slot::Varying(0));
        assert_eq!(body.slot(3), Slot::Varying(1));
        assert_eq!(body.slot(4), Slot::Local(0));
    }

    #[test]
    fn fragment_slots() {
        let block = Block::default();
        let program = program();
        let body = Body::fragment(&program, &block);
        assert_eq!(body.slot(0), Slot::Position);
        assert_eq!(body.slot(2), Slot::Varying(1));
        assert_eq!(body.slot(3), Slot::Local(0));
    }

    #[test]
    fn nested_min_max() {
        let args = ["a".to_string(), "b".into(), "c".into()];
        assert_eq!(nest_calls("min", &args), "min(min(a, b), c)");
    }

    #[test]
    fn for_steps() {
        assert_eq!(step("i", &Constant::int(1)).unwrap(), "i++");
        assert_eq!(step("i", &Constant::int(-1)).unwrap(), "i--");
        assert_eq!(step("i", &Constant::int(2)).unwrap(), "i += 2");
        assert_eq!(step("i", &Constant::int(-3)).unwrap(), "i -= 3");
        assert_eq!(step("f", &Constant::float_from_int(1)).unwrap(), "f++");
        assert!(step("i", &Constant::int(0)).is_err());
    }

    #[test]
    fn join_collapses_blank_lines() {
        let lines: Vec<String> = ["", "a", "", "", "b", ""].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_lines(&lines), "a\n\nb\n");
    }

    #[test]
    fn writes_function_body() {
        let func = Func {
            index: 0,
            in_params: vec![Type::FLOAT],
            out_params: vec![],
            return_type: Type::FLOAT,
            block: Block {
                local_vars: vec![Type::array(Type::FLOAT, 2)],
                local_var_index_offset: 1,
                stmts: vec![
                    Stmt::BlockStmt(Block {
                        local_vars: vec![Type::NONE],
                        local_var_index_offset: 2,
                        stmts: vec![Stmt::For(ForLoop {
                            var_type: Type::INT,
                            var_index: 2,
                            init: Constant::int(0),
                            end: Constant::int(2),
                            op: Op::LessThanOp,
                            delta: Constant::int(1),
                            body: Block {
                                local_var_index_offset: 3,
                                stmts: vec![Stmt::Assign {
                                    lhs: Expr::index(Expr::LocalVariable(1), Expr::LocalVariable(2)),
                                    rhs: Expr::LocalVariable(0),
                                }],
                                ..Default::default()
                            },
                        })],
                    }),
                    Stmt::Return(Some(Expr::call(
                        Expr::BuiltinFuncExpr(BuiltinFunc::Max),
                        vec![
                            Expr::index(Expr::LocalVariable(1), Expr::typed_number(Constant::int(0))),
                            Expr::index(Expr::LocalVariable(1), Expr::typed_number(Constant::int(1))),
                            Expr::LocalVariable(0),
                        ],
                    ))),
                ],
            },
        };
        let body = Body::func(&func);
        let lines = BlockWriter::new(&Plain, &body).top(0).unwrap();
        assert_eq!(
            lines,
            vec![
                "\tfloat l1[2];",
                "\tl1[0] = float(0);",
                "\tl1[1] = float(0);",
                "\t{",
                "\t\tfor (int l2 = 0; l2 < 2; l2++) {",
                "\t\t\t(l1)[l2] = l0;",
                "\t\t}",
                "\t}",
                "\treturn max(max((l1)[0], (l1)[1]), l0);",
            ]
        );
    }
}

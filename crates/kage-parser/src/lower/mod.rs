//! Lowering pass: [`crate::ast::File`] → [`kage_ir::Program`].
//!
//! Type checks the source against the shader type system, folds constants
//! and numbers every local so that each function body is a self-contained
//! IR block tree.

mod builtin;
mod expr;
mod scope;
mod stmt;
mod types;

use kage_ir::{BasicType, Block, Expr, Func, Program, Stmt, Type, Unit};

use crate::ast::{self, Decl, File, FuncDecl, GenDecl, GenKind, Pos, Spec};
use crate::{CompileOptions, SourceError};
use scope::{NamedConst, Scope, Variable};

/// An error has been recorded; unwind to the nearest recovery point.
pub(crate) struct Reported;

pub(crate) type LResult<T> = Result<T, Reported>;

/// A lowered single value.
#[derive(Clone, Debug)]
pub(crate) struct Value {
    pub expr: Expr,
    /// `NONE` for untyped constants and pending shifts.
    pub ty: Type,
    /// `c << x` with an untyped constant `c` and a non-constant `x`: the
    /// type comes from the context the value is used in.
    pub pending_shift: bool,
}

impl Value {
    pub fn new(expr: Expr, ty: Type) -> Self {
        Self {
            expr,
            ty,
            pending_shift: false,
        }
    }

    /// The constant if this is an untyped constant.
    pub fn untyped_const(&self) -> Option<&kage_ir::Constant> {
        if self.ty.is_none() {
            self.expr.constant()
        } else {
            None
        }
    }
}

#[derive(Clone, Debug)]
struct Param {
    name: String,
    ty: Type,
    pos: Pos,
}

#[derive(Clone, Debug)]
struct Signature {
    name: String,
    pos: Pos,
    in_params: Vec<Param>,
    out_params: Vec<Param>,
    return_type: Type,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FuncKind {
    Vertex,
    Fragment,
    Helper,
}

/// Per-function lowering state.
struct FuncState {
    kind: FuncKind,
    in_count: usize,
    outs: Vec<Type>,
    named_outs: bool,
    return_type: Type,
    loop_depth: usize,
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

pub(crate) struct Lowerer<'a> {
    options: &'a CompileOptions,
    errors: Vec<SourceError>,
    program: Program,
    /// Global constants and type aliases.
    global: Scope,
    /// Helper functions, by IR index.
    funcs: Vec<Signature>,
    vertex: Option<Signature>,
    fragment: Option<Signature>,
    /// Function scopes, outermost first. Empty at global level.
    scopes: Vec<Scope>,
    func: Option<FuncState>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn lower_file(
    file: &File,
    options: &CompileOptions,
    unit: Unit,
) -> Result<Program, Vec<SourceError>> {
    let mut lowerer = Lowerer {
        options,
        errors: Vec::new(),
        program: Program::new(unit),
        global: Scope::default(),
        funcs: Vec::new(),
        vertex: None,
        fragment: None,
        scopes: Vec::new(),
        func: None,
    };
    lowerer.lower(file);
    if lowerer.errors.is_empty() {
        Ok(lowerer.program)
    } else {
        Err(lowerer.errors)
    }
}

fn has_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|s| {
        matches!(s, Stmt::Return(_)) || s.blocks().iter().any(|b| has_return(&b.stmts))
    })
}

fn is_exported(name: &str) -> bool {
    name.starts_with("__") || name.chars().next().is_some_and(char::is_uppercase)
}

impl Lowerer<'_> {
    fn error(&mut self, pos: Pos, message: impl Into<String>) -> Reported {
        self.errors.push(SourceError::new(pos, message));
        Reported
    }

    fn lower(&mut self, file: &File) {
        // 1. Uniforms, constants and types.
        for decl in &file.decls {
            if let Decl::Gen(gen_decl) = decl {
                if self.lower_global(gen_decl).is_err() {
                    return;
                }
            }
        }
        self.sort_uniforms();

        // 2. Register every signature so that any function can call any other.
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                if self.register_func(f).is_err() {
                    return;
                }
            }
        }

        // 3. Entry point contracts, attributes and varyings.
        if self.check_entry_points().is_err() {
            return;
        }

        // 4. Bodies.
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                let _ = self.lower_func_body(f);
            }
        }
        if !self.errors.is_empty() {
            return;
        }

        self.program.texture_count = self.options.texture_count;
        log::debug!(
            "lowered {} uniform(s), {} attribute(s), {} varying(s), {} function(s)",
            self.program.uniforms.len(),
            self.program.attributes.len(),
            self.program.varyings.len(),
            self.program.funcs.len()
        );
    }

    // -----------------------------------------------------------------------
    // Globals
    // -----------------------------------------------------------------------

    fn global_declares(&self, name: &str) -> bool {
        self.global.declares(name) || self.program.uniform_names.iter().any(|n| n == name)
    }

    fn lower_global(&mut self, decl: &GenDecl) -> LResult<()> {
        match decl.kind {
            GenKind::Import => Err(self.error(decl.pos, "import is forbidden")),
            GenKind::Var => {
                for spec in &decl.specs {
                    let Spec::Value(vs) = spec else { continue };
                    if !vs.values.is_empty() {
                        return Err(self.error(vs.pos, "a uniform variable cannot have initial values"));
                    }
                    let Some(ty_expr) = &vs.ty else {
                        return Err(self.error(vs.pos, "missing type for a uniform variable"));
                    };
                    let ty = self.resolve_type(ty_expr)?;
                    for name in &vs.names {
                        if !is_exported(&name.name) {
                            return Err(self.error(
                                name.pos,
                                format!("global variables must be exposed: {}", name.name),
                            ));
                        }
                        if self.global_declares(&name.name) {
                            return Err(self.error(
                                name.pos,
                                format!("{} redeclared in this block", name.name),
                            ));
                        }
                        self.program.uniform_names.push(name.name.clone());
                        self.program.uniforms.push(ty.clone());
                    }
                }
                Ok(())
            }
            GenKind::Const => {
                for spec in &decl.specs {
                    if let Spec::Value(vs) = spec {
                        let consts = self.lower_const_spec(vs)?;
                        for c in consts {
                            if self.global_declares(&c.name) {
                                return Err(self.error(vs.pos, format!("{} redeclared in this block", c.name)));
                            }
                            self.global.consts.push(c);
                        }
                    }
                }
                Ok(())
            }
            GenKind::Type => {
                for spec in &decl.specs {
                    if let Spec::Type(ts) = spec {
                        let ty = self.resolve_type(&ts.ty)?;
                        if self.global_declares(&ts.name.name) {
                            return Err(self.error(
                                ts.name.pos,
                                format!("{} redeclared in this block", ts.name.name),
                            ));
                        }
                        self.global.types.push((ts.name.name.clone(), ty));
                    }
                }
                Ok(())
            }
        }
    }

    /// Internal `__` uniforms come first, each group keeping source order.
    fn sort_uniforms(&mut self) {
        let names = std::mem::take(&mut self.program.uniform_names);
        let types = std::mem::take(&mut self.program.uniforms);
        let (internal, user): (Vec<_>, Vec<_>) = names
            .into_iter()
            .zip(types)
            .partition(|(n, _)| n.starts_with("__"));
        for (name, ty) in internal.into_iter().chain(user) {
            self.program.uniform_names.push(name);
            self.program.uniforms.push(ty);
        }
    }

    // -----------------------------------------------------------------------
    // Signatures
    // -----------------------------------------------------------------------

    fn func_names(&self) -> impl Iterator<Item = &str> {
        self.funcs
            .iter()
            .chain(self.vertex.iter())
            .chain(self.fragment.iter())
            .map(|s| s.name.as_str())
    }

    fn register_func(&mut self, decl: &FuncDecl) -> LResult<()> {
        let name = decl.name.name.as_str();
        if decl.has_receiver {
            return Err(self.error(decl.pos, "methods are not implemented"));
        }
        if name == "init" {
            return Err(self.error(decl.pos, "init function is not implemented"));
        }
        if decl.body.is_none() {
            return Err(self.error(decl.pos, "function must have a body"));
        }
        if self.func_names().any(|n| n == name) {
            return Err(self.error(decl.pos, format!("redeclared function: {name}")));
        }
        if self.global_declares(name) {
            return Err(self.error(decl.pos, format!("{name} redeclared in this block")));
        }

        let sig = self.parse_signature(decl)?;
        if name == self.options.vertex_entry {
            self.vertex = Some(sig);
        } else if name == self.options.fragment_entry {
            self.fragment = Some(sig);
        } else {
            self.funcs.push(sig);
        }
        Ok(())
    }

    fn parse_signature(&mut self, decl: &FuncDecl) -> LResult<Signature> {
        let mut in_params = Vec::new();
        for field in &decl.params {
            let ty = self.resolve_type(&field.ty)?;
            if field.names.is_empty() {
                in_params.push(Param {
                    name: "_".into(),
                    ty,
                    pos: field.ty.pos,
                });
                continue;
            }
            for n in &field.names {
                in_params.push(Param {
                    name: n.name.clone(),
                    ty: ty.clone(),
                    pos: n.pos,
                });
            }
        }

        let mut out_params = Vec::new();
        for field in &decl.results {
            let ty = self.resolve_type(&field.ty)?;
            if field.names.is_empty() {
                out_params.push(Param {
                    name: String::new(),
                    ty,
                    pos: field.ty.pos,
                });
                continue;
            }
            for n in &field.names {
                out_params.push(Param {
                    name: n.name.clone(),
                    ty: ty.clone(),
                    pos: n.pos,
                });
            }
        }

        // A single unnamed result is a return value, except for arrays and
        // the vertex entry, whose results are always written to outputs.
        let mut return_type = Type::NONE;
        if out_params.len() == 1
            && out_params[0].name.is_empty()
            && out_params[0].ty.main != BasicType::Array
            && decl.name.name != self.options.vertex_entry
        {
            if let Some(p) = out_params.pop() {
                return_type = p.ty;
            }
        }

        Ok(Signature {
            name: decl.name.name.clone(),
            pos: decl.pos,
            in_params,
            out_params,
            return_type,
        })
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    fn check_entry_points(&mut self) -> LResult<()> {
        let vec4 = Type::basic(BasicType::Vec4);
        let before = self.errors.len();

        if let Some(vertex) = self.vertex.clone() {
            if vertex.out_params.first().is_none_or(|p| p.ty != vec4) {
                self.error(
                    vertex.pos,
                    "vertex entry point must have at least one returning vec4 value for a position",
                );
            }
            for p in vertex.out_params.iter().skip(1) {
                if p.ty.main != BasicType::Float && !p.ty.is_float_vector() {
                    self.error(
                        p.pos,
                        format!("varying variables must be float or vector types but {}", p.ty),
                    );
                }
            }
        }

        if let Some(fragment) = self.fragment.clone() {
            if !fragment.out_params.is_empty() || fragment.return_type != vec4 {
                self.error(
                    fragment.pos,
                    "fragment entry point must have one returning vec4 value for a color",
                );
            }
            match &self.vertex {
                Some(vertex) => {
                    let vertex_outs = vertex.out_params.clone();
                    if fragment.in_params.len() > vertex_outs.len().max(1) {
                        let p = &fragment.in_params[vertex_outs.len().max(1)];
                        self.error(
                            p.pos,
                            format!("fragment argument {} has no corresponding vertex output", p.name),
                        );
                    }
                    for (out, arg) in vertex_outs.iter().zip(&fragment.in_params) {
                        if out.ty != arg.ty {
                            self.error(
                                arg.pos,
                                format!("fragment argument {} must be {} but was {}", arg.name, out.ty, arg.ty),
                            );
                        }
                    }
                }
                None => {
                    if let Some(arg) = fragment.in_params.first() {
                        if arg.ty != vec4 {
                            self.error(
                                arg.pos,
                                format!("fragment argument {} must be {vec4} but was {}", arg.name, arg.ty),
                            );
                        }
                    }
                    for p in fragment.in_params.iter().skip(1) {
                        if p.ty.main != BasicType::Float && !p.ty.is_float_vector() {
                            self.error(
                                p.pos,
                                format!("varying variables must be float or vector types but {}", p.ty),
                            );
                        }
                    }
                }
            }
        }

        if self.errors.len() > before {
            return Err(Reported);
        }

        if let Some(vertex) = &self.vertex {
            self.program.attributes = vertex.in_params.iter().map(|p| p.ty.clone()).collect();
            self.program.varyings = vertex.out_params.iter().skip(1).map(|p| p.ty.clone()).collect();
        } else if let Some(fragment) = &self.fragment {
            self.program.varyings = fragment.in_params.iter().skip(1).map(|p| p.ty.clone()).collect();
        }

        // The fragment entry always receives the position and every varying.
        if let Some(fragment) = &mut self.fragment {
            if fragment.in_params.is_empty() {
                fragment.in_params.push(Param {
                    name: "_".into(),
                    ty: vec4,
                    pos: fragment.pos,
                });
            }
            let have = fragment.in_params.len() - 1;
            for ty in self.program.varyings.iter().skip(have) {
                fragment.in_params.push(Param {
                    name: "_".into(),
                    ty: ty.clone(),
                    pos: fragment.pos,
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Function bodies
    // -----------------------------------------------------------------------

    fn lower_func_body(&mut self, decl: &FuncDecl) -> LResult<()> {
        let name = decl.name.name.as_str();
        let (sig, kind, index) = if self.vertex.as_ref().is_some_and(|s| s.name == name) {
            (self.vertex.clone(), FuncKind::Vertex, 0)
        } else if self.fragment.as_ref().is_some_and(|s| s.name == name) {
            (self.fragment.clone(), FuncKind::Fragment, 0)
        } else {
            let index = self.funcs.iter().position(|s| s.name == name).unwrap_or(0);
            (self.funcs.get(index).cloned(), FuncKind::Helper, index)
        };
        let (Some(sig), Some(body)) = (sig, &decl.body) else {
            return Err(Reported);
        };

        let read_only = kind != FuncKind::Helper;
        let mut top = Scope::new(0);
        for p in &sig.in_params {
            top.vars.push(Variable::param(&p.name, p.ty.clone(), p.pos, read_only));
        }
        for p in &sig.out_params {
            top.vars.push(Variable::param(&p.name, p.ty.clone(), p.pos, false));
        }
        top.param_count = top.vars.len();

        let named_outs = sig.out_params.first().is_some_and(|p| !p.name.is_empty());
        self.func = Some(FuncState {
            kind,
            in_count: sig.in_params.len(),
            outs: sig.out_params.iter().map(|p| p.ty.clone()).collect(),
            named_outs,
            return_type: sig.return_type.clone(),
            loop_depth: 0,
        });
        self.scopes = vec![top];

        let mut stmts = Vec::new();
        if named_outs {
            stmts.extend((0..sig.out_params.len()).map(|i| Stmt::Init(sig.in_params.len() + i)));
        }
        let result = self.lower_stmts(&body.stmts, &mut stmts);
        let top = self.scopes.pop().unwrap_or_default();
        self.scopes.clear();
        self.func = None;
        result?;
        self.check_unused(&top)?;

        let block = Block {
            local_vars: top.local_types(),
            local_var_index_offset: top.param_count,
            stmts,
        };

        if (!sig.out_params.is_empty() || !sig.return_type.is_none()) && !has_return(&block.stmts) {
            return Err(self.error(
                decl.pos,
                format!("function {name} must have a return statement but not"),
            ));
        }

        match kind {
            FuncKind::Vertex => self.program.vertex_func = Some(block),
            FuncKind::Fragment => self.program.fragment_func = Some(block),
            FuncKind::Helper => {
                let func = Func {
                    index,
                    in_params: sig.in_params.iter().map(|p| p.ty.clone()).collect(),
                    out_params: sig.out_params.iter().map(|p| p.ty.clone()).collect(),
                    return_type: sig.return_type.clone(),
                    block,
                };
                self.program.funcs.push(func);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    fn push_scope(&mut self) {
        let base = self.scopes.last().map_or(0, Scope::end);
        self.scopes.push(Scope::new(base));
    }

    fn pop_scope(&mut self) -> Scope {
        self.scopes.pop().unwrap_or_default()
    }

    fn current_scope(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Declares a local in the innermost scope and returns its absolute index.
    fn declare(&mut self, var: Variable) -> usize {
        let scope = self.current_scope();
        let index = scope.end();
        scope.vars.push(var);
        index
    }

    fn temporary(&mut self, ty: Type) -> usize {
        self.declare(Variable::temporary(ty))
    }

    fn check_unused(&mut self, scope: &Scope) -> LResult<()> {
        let unused: Vec<(Pos, String)> = scope.unused().map(|v| (v.pos, v.name.clone())).collect();
        if unused.is_empty() {
            return Ok(());
        }
        for (pos, name) in unused {
            self.error(pos, format!("local variable {name} is not used"));
        }
        Err(Reported)
    }

    /// Finds a local by name, innermost scope first, and marks it used.
    fn find_local(&mut self, name: &str) -> Option<(usize, &Variable)> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(i) = scope.find_var(name) {
                let index = scope.base + i;
                let var = &mut scope.vars[i];
                var.used = true;
                return Some((index, var));
            }
            if scope.find_const(name).is_some() {
                return None;
            }
        }
        None
    }

    fn find_const(&self, name: &str) -> Option<&NamedConst> {
        for scope in self.scopes.iter().rev() {
            if scope.find_var(name).is_some() {
                return None;
            }
            if let Some(c) = scope.find_const(name) {
                return Some(c);
            }
        }
        self.global.find_const(name)
    }

    fn func_state(&self) -> Option<&FuncState> {
        self.func.as_ref()
    }

    fn in_fragment(&self) -> bool {
        self.func_state().is_some_and(|f| f.kind == FuncKind::Fragment)
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

impl Lowerer<'_> {
    /// Evaluates a `const` spec into named constants.
    fn lower_const_spec(&mut self, vs: &ast::ValueSpec) -> LResult<Vec<NamedConst>> {
        if vs.names.len() != vs.values.len() {
            return Err(self.error(
                vs.pos,
                format!(
                    "assignment mismatch: {} variables but {} values",
                    vs.names.len(),
                    vs.values.len()
                ),
            ));
        }
        let declared = match &vs.ty {
            Some(t) => Some(self.resolve_type(t)?),
            None => None,
        };

        let mut consts = Vec::new();
        for (name, value) in vs.names.iter().zip(&vs.values) {
            let mut stmts = Vec::new();
            let v = self.lower_value(value, &mut stmts)?;
            let Some(c) = v.expr.constant().cloned() else {
                return Err(self.error(value.pos, format!("{value} is not constant")));
            };
            if !stmts.is_empty() {
                return Err(self.error(value.pos, format!("{value} is not constant")));
            }
            let (ty, c) = match &declared {
                Some(t) => {
                    if !types::can_assign(t, &v.ty, Some(&c)) {
                        return Err(self.error(
                            vs.pos,
                            format!("cannot use {c} as {t} value in constant declaration"),
                        ));
                    }
                    if t.main == BasicType::Int && c.is_integral() && !expr::fits_int(&c) {
                        return Err(self.error(value.pos, format!("constant {c} overflows int")));
                    }
                    let converted = match t.main {
                        BasicType::Int => c.to_int(),
                        BasicType::Float => c.to_float(),
                        _ => Some(c),
                    };
                    let Some(converted) = converted else {
                        return Err(self.error(vs.pos, format!("cannot use {value} as {t} value in constant declaration")));
                    };
                    (t.clone(), converted)
                }
                None => (v.ty.clone(), c),
            };
            if name.name == "_" {
                continue;
            }
            consts.push(NamedConst {
                name: name.name.clone(),
                ty,
                value: c,
            });
        }
        Ok(consts)
    }
}

//! Statement lowering.

use kage_ir::{BasicType, Block, Constant, Expr, ForLoop, Op, Stmt, Type};

use super::expr::{convert_const, strip_parens};
use super::scope::Variable;
use super::types::default_type;
use super::{LResult, Lowerer, Reported, Value};
use crate::ast::{
    self, AssignOp, BinaryOp, BranchKind, ExprKind, GenDecl, GenKind, Pos, Spec, StmtKind,
};

const FOR_FORMAT: &str = "for-statement must follow this format: for (varname) := (constant); (varname) (op) (constant); (varname) (op) (constant) { ... }";

/// Whether `for v := init; v op end; v += delta` terminates.
fn loop_terminates(op: Op, init: &Constant, end: &Constant, delta: &Constant) -> bool {
    let step = delta.signum();
    match op {
        Op::LessThanOp | Op::LessThanEqualOp => step > 0,
        Op::GreaterThanOp | Op::GreaterThanEqualOp => step < 0,
        // Runs at most once: the first step leaves the only matching value.
        Op::EqualOp => step != 0,
        Op::NotEqualOp => {
            // The counter must land exactly on `end`.
            let Some(distance) = Constant::binary(Op::Sub, end, init) else {
                return false;
            };
            let Some(steps) = Constant::binary(Op::Div, &distance.to_float().unwrap_or(distance), delta)
            else {
                return false;
            };
            steps.is_integral() && steps.signum() > 0
        }
        _ => false,
    }
}

impl Lowerer<'_> {
    pub(super) fn lower_stmts(&mut self, stmts: &[ast::Stmt], out: &mut Vec<Stmt>) -> LResult<()> {
        for s in stmts {
            self.lower_stmt(s, out)?;
        }
        Ok(())
    }

    /// Lowers `stmts` in a fresh scope.
    fn lower_scoped(&mut self, stmts: &[&ast::Stmt]) -> LResult<Block> {
        self.push_scope();
        let mut out = Vec::new();
        let result = stmts.iter().try_for_each(|s| self.lower_stmt(s, &mut out));
        let scope = self.pop_scope();
        result?;
        self.check_unused(&scope)?;
        Ok(Block {
            local_vars: scope.local_types(),
            local_var_index_offset: scope.base,
            stmts: out,
        })
    }

    fn lower_block(&mut self, block: &ast::BlockStmt) -> LResult<Block> {
        let stmts: Vec<&ast::Stmt> = block.stmts.iter().collect();
        self.lower_scoped(&stmts)
    }

    fn lower_stmt(&mut self, s: &ast::Stmt, out: &mut Vec<Stmt>) -> LResult<()> {
        let pos = s.pos;
        match &s.kind {
            StmtKind::Empty => Ok(()),
            StmtKind::Decl(decl) => self.lower_local_decl(decl, out),
            StmtKind::Assign { lhs, op, rhs } => match op {
                AssignOp::Define => self.lower_define(pos, lhs, rhs, out),
                AssignOp::Assign => self.lower_assign(pos, lhs, rhs, out),
                AssignOp::Compound(bop) => self.lower_compound(pos, *bop, lhs, rhs, out),
            },
            StmtKind::IncDec { target, inc } => self.lower_inc_dec(pos, target, *inc, out),
            StmtKind::Expr(e) => self.lower_expr_stmt(e, out),
            StmtKind::Block(b) => {
                let block = self.lower_block(b)?;
                out.push(Stmt::BlockStmt(block));
                Ok(())
            }
            StmtKind::If {
                init,
                cond,
                body,
                els,
            } => self.lower_if(s, init.as_deref(), cond, body, els.as_deref(), out),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => self.lower_for(pos, init.as_deref(), cond.as_ref(), post.as_deref(), body, out),
            StmtKind::Range(_) => Err(self.error(pos, "range statements are not supported")),
            StmtKind::Return(values) => self.lower_return(pos, values, out),
            StmtKind::Branch { kind, label } => {
                if label.is_some() {
                    return Err(self.error(pos, "labels are not supported"));
                }
                let in_loop = self.func_state().is_some_and(|f| f.loop_depth > 0);
                match kind {
                    BranchKind::Break if in_loop => out.push(Stmt::Break),
                    BranchKind::Continue if in_loop => out.push(Stmt::Continue),
                    BranchKind::Break => return Err(self.error(pos, "break is not in a loop")),
                    BranchKind::Continue => return Err(self.error(pos, "continue is not in a loop")),
                    BranchKind::Goto => return Err(self.error(pos, "goto is not supported")),
                    BranchKind::Fallthrough => {
                        return Err(self.error(pos, "fallthrough is not supported"));
                    }
                }
                Ok(())
            }
            StmtKind::Labeled { .. } => Err(self.error(pos, "labels are not supported")),
            StmtKind::Go(_) => Err(self.error(pos, "go statements are not supported")),
            StmtKind::Defer(_) => Err(self.error(pos, "defer statements are not supported")),
            StmtKind::Send => Err(self.error(pos, "channel sends are not supported")),
            StmtKind::Switch => Err(self.error(pos, "switch statements are not implemented")),
            StmtKind::Select => Err(self.error(pos, "select statements are not supported")),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn redeclared(&mut self, pos: Pos, name: &str) -> LResult<()> {
        if name != "_" && self.current_scope().declares(name) {
            return Err(self.error(pos, format!("{name} redeclared in this block")));
        }
        Ok(())
    }

    fn lower_local_decl(&mut self, decl: &GenDecl, out: &mut Vec<Stmt>) -> LResult<()> {
        match decl.kind {
            GenKind::Import => Err(self.error(decl.pos, "import is forbidden")),
            GenKind::Const => {
                for spec in &decl.specs {
                    let Spec::Value(vs) = spec else { continue };
                    let consts = self.lower_const_spec(vs)?;
                    for c in consts {
                        self.redeclared(vs.pos, &c.name)?;
                        self.current_scope().consts.push(c);
                    }
                }
                Ok(())
            }
            GenKind::Type => {
                for spec in &decl.specs {
                    let Spec::Type(ts) = spec else { continue };
                    let ty = self.resolve_type(&ts.ty)?;
                    self.redeclared(ts.name.pos, &ts.name.name)?;
                    self.current_scope().types.push((ts.name.name.clone(), ty));
                }
                Ok(())
            }
            GenKind::Var => {
                for spec in &decl.specs {
                    if let Spec::Value(vs) = spec {
                        self.lower_var_spec(vs, out)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn lower_var_spec(&mut self, vs: &ast::ValueSpec, out: &mut Vec<Stmt>) -> LResult<()> {
        let declared = match &vs.ty {
            Some(t) => Some(self.resolve_type(t)?),
            None => None,
        };
        if declared.as_ref().is_some_and(|t| t.main == BasicType::Texture) {
            return Err(self.error(vs.pos, "texture-typed variables are not supported"));
        }

        // Initializers see the enclosing names, not the ones being declared.
        let values = if vs.values.is_empty() {
            None
        } else {
            Some(self.lower_rhs(vs.pos, vs.names.len(), &vs.values, out)?)
        };

        let mut pending = Vec::new();
        for (i, name) in vs.names.iter().enumerate() {
            self.redeclared(name.pos, &name.name)?;
            let (ty, init) = match (&declared, &values) {
                (Some(t), Some(values)) => {
                    let (pos, v) = values[i].clone();
                    let e = self.settle(pos, v, t, "variable declaration")?;
                    (t.clone(), Some(e))
                }
                (Some(t), None) => (t.clone(), None),
                (None, Some(values)) => {
                    let (pos, v) = values[i].clone();
                    let v = self.default_typed(pos, v)?;
                    (v.ty, Some(v.expr))
                }
                (None, None) => return Err(self.error(vs.pos, "missing type or init expr")),
            };
            pending.push((name, ty, init));
        }

        let multi = pending.len() > 1;
        let mut assigns = Vec::new();
        for (name, ty, init) in pending {
            if name.name == "_" {
                continue;
            }
            let init = match init {
                Some(e) if multi && e.constant().is_none() => {
                    let tmp = self.temporary(ty.clone());
                    out.push(Stmt::Assign {
                        lhs: Expr::LocalVariable(tmp),
                        rhs: e,
                    });
                    Some(Expr::LocalVariable(tmp))
                }
                other => other,
            };
            let index = self.declare(Variable::local(&name.name, ty, name.pos));
            assigns.push(match init {
                Some(rhs) => Stmt::Assign {
                    lhs: Expr::LocalVariable(index),
                    rhs,
                },
                None => Stmt::Init(index),
            });
        }
        out.extend(assigns);
        Ok(())
    }

    /// Lowers the right-hand side of an `n`-valued assignment: either `n`
    /// single values or one call with `n` results.
    fn lower_rhs(
        &mut self,
        pos: Pos,
        n: usize,
        rhs: &[ast::Expr],
        out: &mut Vec<Stmt>,
    ) -> LResult<Vec<(Pos, Value)>> {
        if rhs.len() == n {
            let mut values = Vec::with_capacity(n);
            for e in rhs {
                values.push((e.pos, self.lower_value(e, out)?));
            }
            return Ok(values);
        }
        if let [e] = rhs {
            let values = self.lower_expr(e, out)?;
            if values.len() == n {
                return Ok(values.into_iter().map(|v| (e.pos, v)).collect());
            }
            return Err(self.error(
                pos,
                format!("assignment mismatch: {n} variables but {e} returns {} values", values.len()),
            ));
        }
        Err(self.error(
            pos,
            format!("assignment mismatch: {n} variables but {} values", rhs.len()),
        ))
    }

    // -----------------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------------

    fn lower_define(&mut self, pos: Pos, lhs: &[ast::Expr], rhs: &[ast::Expr], out: &mut Vec<Stmt>) -> LResult<()> {
        let mut names = Vec::with_capacity(lhs.len());
        for e in lhs {
            match &e.kind {
                ExprKind::Ident(name) => names.push((e.pos, name.as_str())),
                _ => return Err(self.error(e.pos, format!("non-name {e} on left side of :="))),
            }
        }
        let values = self.lower_rhs(pos, names.len(), rhs, out)?;

        let fresh = names
            .iter()
            .any(|(_, n)| *n != "_" && self.scopes.last().is_none_or(|s| s.find_var(n).is_none()));
        if !fresh {
            return Err(self.error(pos, "no new variables on left side of :="));
        }

        // Resolve every value before any name is bound.
        let multi = names.len() > 1;
        let mut targets = Vec::new();
        for ((name_pos, name), (value_pos, v)) in names.into_iter().zip(values) {
            if name == "_" {
                continue;
            }
            let existing = self.scopes.last().and_then(|s| s.find_var(name).map(|i| s.base + i));
            match existing {
                Some(index) => {
                    let ty = self.assignable_local(name_pos, name, index)?;
                    let e = self.settle(value_pos, v, &ty, "assignment")?;
                    targets.push((None, Expr::LocalVariable(index), ty, e));
                }
                None => {
                    self.redeclared(name_pos, name)?;
                    let v = self.default_typed(value_pos, v)?;
                    targets.push((Some((name_pos, name)), Expr::Blank, v.ty, v.expr));
                }
            }
        }

        let mut assigns = Vec::new();
        for (new, lhs, ty, rhs) in targets {
            let rhs = if multi && rhs.constant().is_none() {
                let tmp = self.temporary(ty.clone());
                out.push(Stmt::Assign {
                    lhs: Expr::LocalVariable(tmp),
                    rhs,
                });
                Expr::LocalVariable(tmp)
            } else {
                rhs
            };
            let lhs = match new {
                Some((name_pos, name)) => {
                    Expr::LocalVariable(self.declare(Variable::local(name, ty, name_pos)))
                }
                None => lhs,
            };
            assigns.push(Stmt::Assign { lhs, rhs });
        }
        out.extend(assigns);
        Ok(())
    }

    /// Type of the current-scope local `index` reused by `:=`.
    fn assignable_local(&mut self, pos: Pos, name: &str, index: usize) -> LResult<Type> {
        let scope = self.current_scope();
        let var = &mut scope.vars[index - scope.base];
        var.used = true;
        let (ty, read_only) = (var.ty.clone(), var.read_only);
        if read_only {
            return Err(self.error(pos, format!("entry point argument {name} cannot be assigned")));
        }
        Ok(ty)
    }

    fn lower_assign(&mut self, pos: Pos, lhs: &[ast::Expr], rhs: &[ast::Expr], out: &mut Vec<Stmt>) -> LResult<()> {
        let values = self.lower_rhs(pos, lhs.len(), rhs, out)?;

        let mut assigns = Vec::new();
        for (l, (value_pos, v)) in lhs.iter().zip(values) {
            if l.ident() == Some("_") {
                // Still type the value so that `_ = 1 << s` is checked.
                self.default_typed(value_pos, v)?;
                continue;
            }
            let target = self.lower_lvalue(l, out)?;
            let e = self.settle(value_pos, v, &target.ty, "assignment")?;
            assigns.push((target, e));
        }

        if assigns.len() > 1 {
            // Evaluate every right-hand side before storing any.
            let mut stores = Vec::with_capacity(assigns.len());
            for (target, e) in assigns {
                if e.constant().is_some() {
                    stores.push(Stmt::Assign { lhs: target.expr, rhs: e });
                    continue;
                }
                let tmp = self.temporary(target.ty.clone());
                out.push(Stmt::Assign {
                    lhs: Expr::LocalVariable(tmp),
                    rhs: e,
                });
                stores.push(Stmt::Assign {
                    lhs: target.expr,
                    rhs: Expr::LocalVariable(tmp),
                });
            }
            out.extend(stores);
        } else {
            for (target, e) in assigns {
                out.push(Stmt::Assign { lhs: target.expr, rhs: e });
            }
        }
        Ok(())
    }

    fn lower_compound(
        &mut self,
        pos: Pos,
        op: BinaryOp,
        lhs: &[ast::Expr],
        rhs: &[ast::Expr],
        out: &mut Vec<Stmt>,
    ) -> LResult<()> {
        let ([l], [r]) = (lhs, rhs) else {
            return Err(self.error(pos, format!("assignment operation {op}= requires single-valued expressions")));
        };
        let value = self.lower_value(r, out)?;
        let target = self.lower_lvalue(l, out)?;
        let result = self.binary(pos, op, target.clone(), value)?;
        let rhs = self.settle(pos, result, &target.ty, "assignment")?;
        out.push(Stmt::Assign {
            lhs: target.expr,
            rhs,
        });
        Ok(())
    }

    fn lower_inc_dec(&mut self, pos: Pos, target: &ast::Expr, inc: bool, out: &mut Vec<Stmt>) -> LResult<()> {
        let t = self.lower_lvalue(target, out)?;
        if !t.ty.is_float_based() && !t.ty.is_integral() {
            let op = if inc { "++" } else { "--" };
            return Err(self.error(pos, format!("invalid operation: {target}{op} (non-numeric type {})", t.ty)));
        }
        let op = if inc { BinaryOp::Add } else { BinaryOp::Sub };
        let one = Value::new(Expr::number(Constant::int(1)), Type::NONE);
        let result = self.binary(pos, op, t.clone(), one)?;
        out.push(Stmt::Assign {
            lhs: t.expr,
            rhs: result.expr,
        });
        Ok(())
    }

    /// Lowers an assignable expression, rejecting read-only storage.
    fn lower_lvalue(&mut self, e: &ast::Expr, out: &mut Vec<Stmt>) -> LResult<Value> {
        match &e.kind {
            ExprKind::Paren(inner) => self.lower_lvalue(inner, out),
            ExprKind::Ident(name) => {
                if let Some((index, var)) = self.find_local(name) {
                    let (ty, read_only, counter) = (var.ty.clone(), var.read_only, var.for_counter);
                    if read_only {
                        return Err(self.error(e.pos, format!("entry point argument {name} cannot be assigned")));
                    }
                    if counter {
                        return Err(self.error(
                            e.pos,
                            format!("for-loop counter {name} cannot be modified in the loop body"),
                        ));
                    }
                    return Ok(Value::new(Expr::LocalVariable(index), ty));
                }
                if self.find_const(name).is_some() {
                    return Err(self.error(e.pos, format!("cannot assign to {name} (constant)")));
                }
                if self.program.uniform_names.iter().any(|n| n == name) {
                    return Err(self.error(e.pos, "a uniform variable cannot be assigned"));
                }
                self.lower_value(e, out)?;
                Err(self.error(e.pos, format!("cannot assign to {e}")))
            }
            ExprKind::Index { base, index } => {
                let base = self.lower_lvalue(base, out)?;
                self.index(e.pos, base, index, out)
            }
            ExprKind::Selector { base, sel } => {
                let base = self.lower_lvalue(base, out)?;
                self.swizzle(e.pos, base, sel, true)
            }
            _ => Err(self.error(e.pos, format!("cannot assign to {e}"))),
        }
    }

    // -----------------------------------------------------------------------
    // Expression statements
    // -----------------------------------------------------------------------

    fn lower_expr_stmt(&mut self, e: &ast::Expr, out: &mut Vec<Stmt>) -> LResult<()> {
        let inner = strip_parens(e);
        let ExprKind::Call { func, .. } = &inner.kind else {
            return Err(self.error(e.pos, format!("{e} is not used")));
        };
        if let Some(name) = func.ident() {
            let user = self.funcs.iter().any(|f| f.name == name);
            if !user {
                if let Some(f) = self.builtin_named(name) {
                    if f != kage_ir::BuiltinFunc::DiscardF {
                        return Err(self.error(e.pos, format!("{e} is not used")));
                    }
                }
            }
        }

        let values = self.lower_expr(inner, out)?;
        if let [v] = values.as_slice() {
            if matches!(v.expr, Expr::Call { .. }) {
                out.push(Stmt::ExprStmt(v.expr.clone()));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    fn lower_if(
        &mut self,
        s: &ast::Stmt,
        init: Option<&ast::Stmt>,
        cond: &ast::Expr,
        body: &ast::BlockStmt,
        els: Option<&ast::Stmt>,
        out: &mut Vec<Stmt>,
    ) -> LResult<()> {
        if let Some(init) = init {
            // `if init; cond {}` is `{ init; if cond {} }`.
            let rest = ast::Stmt {
                pos: s.pos,
                kind: StmtKind::If {
                    init: None,
                    cond: cond.clone(),
                    body: body.clone(),
                    els: els.map(|e| Box::new(e.clone())),
                },
            };
            let block = self.lower_scoped(&[init, &rest])?;
            out.push(Stmt::BlockStmt(block));
            return Ok(());
        }

        let c = self.lower_value(cond, out)?;
        if c.ty != Type::BOOL {
            return Err(self.error(cond.pos, format!("if-condition must be bool but: {}", c.ty)));
        }
        let then = self.lower_block(body)?;
        let otherwise = match els {
            None => None,
            Some(ast::Stmt {
                kind: StmtKind::Block(b),
                ..
            }) => Some(self.lower_block(b)?),
            Some(other) => Some(self.lower_scoped(&[other])?),
        };
        out.push(Stmt::If {
            cond: c.expr,
            then,
            otherwise,
        });
        Ok(())
    }

    fn lower_return(&mut self, pos: Pos, values: &[ast::Expr], out: &mut Vec<Stmt>) -> LResult<()> {
        let Some(state) = self.func_state() else {
            return Err(Reported);
        };
        let return_type = state.return_type.clone();
        let outs = state.outs.clone();
        let in_count = state.in_count;
        let named_outs = state.named_outs;

        if !return_type.is_none() {
            let [value] = values else {
                let msg = if values.is_empty() { "not enough return values" } else { "too many return values" };
                return Err(self.error(pos, msg));
            };
            let v = self.lower_value(value, out)?;
            let e = self.settle(value.pos, v, &return_type, "return statement")?;
            out.push(Stmt::Return(Some(e)));
            return Ok(());
        }

        if values.is_empty() {
            if !outs.is_empty() && !named_outs {
                return Err(self.error(pos, "not enough return values"));
            }
            out.push(Stmt::Return(None));
            return Ok(());
        }
        if outs.is_empty() {
            return Err(self.error(pos, "too many return values"));
        }

        let lowered = if values.len() == outs.len() {
            let mut lowered = Vec::with_capacity(values.len());
            for v in values {
                lowered.push((v.pos, self.lower_value(v, out)?));
            }
            lowered
        } else if let [single] = values {
            let vs = self.lower_expr(single, out)?;
            if vs.len() != outs.len() {
                let msg = if vs.len() < outs.len() { "not enough return values" } else { "too many return values" };
                return Err(self.error(pos, msg));
            }
            vs.into_iter().map(|v| (single.pos, v)).collect()
        } else if values.len() < outs.len() {
            return Err(self.error(pos, "not enough return values"));
        } else {
            return Err(self.error(pos, "too many return values"));
        };

        let mut exprs = Vec::with_capacity(outs.len());
        for ((value_pos, v), ty) in lowered.into_iter().zip(&outs) {
            exprs.push(self.settle(value_pos, v, ty, "return statement")?);
        }

        if exprs.len() > 1 {
            let mut stores = Vec::with_capacity(exprs.len());
            for (i, (e, ty)) in exprs.into_iter().zip(&outs).enumerate() {
                let rhs = if e.constant().is_some() {
                    e
                } else {
                    let tmp = self.temporary(ty.clone());
                    out.push(Stmt::Assign {
                        lhs: Expr::LocalVariable(tmp),
                        rhs: e,
                    });
                    Expr::LocalVariable(tmp)
                };
                stores.push(Stmt::Assign {
                    lhs: Expr::LocalVariable(in_count + i),
                    rhs,
                });
            }
            out.extend(stores);
        } else {
            for (i, e) in exprs.into_iter().enumerate() {
                out.push(Stmt::Assign {
                    lhs: Expr::LocalVariable(in_count + i),
                    rhs: e,
                });
            }
        }
        out.push(Stmt::Return(None));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // For loops
    // -----------------------------------------------------------------------

    /// A constant operand of the loop header, converted to the counter type.
    fn loop_constant(&mut self, e: &ast::Expr, ty: Option<&Type>) -> LResult<(Constant, Type)> {
        let mut stmts = Vec::new();
        let v = self.lower_value(e, &mut stmts)?;
        let Some(c) = v.expr.constant().cloned().filter(|_| stmts.is_empty()) else {
            return Err(self.error(e.pos, FOR_FORMAT));
        };
        let ty = match ty {
            Some(t) => t.clone(),
            None if v.ty.is_none() => default_type(&c),
            None => v.ty.clone(),
        };
        if !v.ty.is_none() && v.ty != ty {
            return Err(self.error(e.pos, FOR_FORMAT));
        }
        if ty != Type::INT && ty != Type::FLOAT {
            return Err(self.error(e.pos, FOR_FORMAT));
        }
        match convert_const(&c, &ty) {
            Some(c) => Ok((c, ty)),
            None => Err(self.error(e.pos, FOR_FORMAT)),
        }
    }

    fn lower_for(
        &mut self,
        pos: Pos,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        post: Option<&ast::Stmt>,
        body: &ast::BlockStmt,
        out: &mut Vec<Stmt>,
    ) -> LResult<()> {
        // for v := C1
        let Some(ast::Stmt {
            kind:
                StmtKind::Assign {
                    lhs,
                    op: AssignOp::Define,
                    rhs,
                },
            ..
        }) = init
        else {
            return Err(self.error(pos, FOR_FORMAT));
        };
        let ([var], [init_expr]) = (lhs.as_slice(), rhs.as_slice()) else {
            return Err(self.error(pos, FOR_FORMAT));
        };
        let Some(name) = var.ident().filter(|n| *n != "_") else {
            return Err(self.error(pos, FOR_FORMAT));
        };
        let (init, var_type) = self.loop_constant(init_expr, None)?;

        // v op C2
        let Some(cond) = cond.map(strip_parens) else {
            return Err(self.error(pos, FOR_FORMAT));
        };
        let ExprKind::Binary {
            op: cmp,
            lhs: cl,
            rhs: cr,
        } = &cond.kind
        else {
            return Err(self.error(cond.pos, FOR_FORMAT));
        };
        let op = match cmp {
            BinaryOp::Lss => Op::LessThanOp,
            BinaryOp::Leq => Op::LessThanEqualOp,
            BinaryOp::Gtr => Op::GreaterThanOp,
            BinaryOp::Geq => Op::GreaterThanEqualOp,
            BinaryOp::Eql => Op::EqualOp,
            BinaryOp::Neq => Op::NotEqualOp,
            _ => return Err(self.error(cond.pos, FOR_FORMAT)),
        };
        if cl.ident() != Some(name) {
            return Err(self.error(cond.pos, FOR_FORMAT));
        }
        let (end, _) = self.loop_constant(cr, Some(&var_type))?;

        // v++, v--, v += C3, v -= C3, v = v + C3, v = v - C3
        let Some(post) = post else {
            return Err(self.error(pos, FOR_FORMAT));
        };
        let (negate, step) = match &post.kind {
            StmtKind::IncDec { target, inc } if target.ident() == Some(name) => {
                (!*inc, Constant::int(1))
            }
            StmtKind::Assign {
                lhs,
                op: AssignOp::Compound(bop @ (BinaryOp::Add | BinaryOp::Sub)),
                rhs,
            } if lhs.len() == 1 && rhs.len() == 1 && lhs[0].ident() == Some(name) => {
                let (c, _) = self.loop_constant(&rhs[0], Some(&var_type))?;
                (*bop == BinaryOp::Sub, c)
            }
            StmtKind::Assign {
                lhs,
                op: AssignOp::Assign,
                rhs,
            } if lhs.len() == 1 && rhs.len() == 1 && lhs[0].ident() == Some(name) => {
                let ExprKind::Binary {
                    op: bop @ (BinaryOp::Add | BinaryOp::Sub),
                    lhs: l,
                    rhs: r,
                } = &strip_parens(&rhs[0]).kind
                else {
                    return Err(self.error(post.pos, FOR_FORMAT));
                };
                if l.ident() != Some(name) {
                    return Err(self.error(post.pos, FOR_FORMAT));
                }
                let (c, _) = self.loop_constant(r, Some(&var_type))?;
                (*bop == BinaryOp::Sub, c)
            }
            _ => return Err(self.error(post.pos, FOR_FORMAT)),
        };
        let step = convert_const(&step, &var_type).unwrap_or(step);
        let delta = if negate {
            Constant::unary(Op::Sub, &step).unwrap_or(step)
        } else {
            step
        };

        if !loop_terminates(op, &init, &end, &delta) {
            return Err(self.error(pos, "for-statement's loop never ends"));
        }

        // The counter lives in a pseudo block of its own.
        self.push_scope();
        let mut counter = Variable::local(name, var_type.clone(), var.pos);
        counter.for_counter = true;
        counter.used = true;
        let var_index = self.declare(counter);
        if let Some(f) = self.func.as_mut() {
            f.loop_depth += 1;
        }
        let body = self.lower_block(body);
        if let Some(f) = self.func.as_mut() {
            f.loop_depth -= 1;
        }
        let scope = self.pop_scope();
        let body = body?;

        let for_loop = ForLoop {
            var_type,
            var_index,
            init,
            end,
            op,
            delta,
            body,
        };
        out.push(Stmt::BlockStmt(Block {
            local_vars: scope.local_types(),
            local_var_index_offset: scope.base,
            stmts: vec![Stmt::For(for_loop)],
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Constant {
        Constant::int(v)
    }

    #[test]
    fn ordered_comparisons_need_matching_direction() {
        assert!(loop_terminates(Op::LessThanOp, &int(0), &int(10), &int(1)));
        assert!(!loop_terminates(Op::LessThanOp, &int(0), &int(10), &int(-1)));
        assert!(!loop_terminates(Op::LessThanEqualOp, &int(0), &int(10), &int(0)));
        assert!(loop_terminates(Op::GreaterThanOp, &int(10), &int(0), &int(-2)));
        assert!(!loop_terminates(Op::GreaterThanEqualOp, &int(10), &int(0), &int(1)));
    }

    #[test]
    fn not_equal_must_hit_the_end_exactly() {
        assert!(loop_terminates(Op::NotEqualOp, &int(0), &int(10), &int(2)));
        assert!(!loop_terminates(Op::NotEqualOp, &int(0), &int(9), &int(2)));
        assert!(!loop_terminates(Op::NotEqualOp, &int(0), &int(10), &int(-1)));
        let f = |n, d| Constant::ratio(n, d);
        assert!(loop_terminates(Op::NotEqualOp, &f(0, 1), &f(1, 1), &f(1, 4)));
    }

    #[test]
    fn equal_runs_at_most_once() {
        assert!(loop_terminates(Op::EqualOp, &int(0), &int(0), &int(1)));
        assert!(!loop_terminates(Op::EqualOp, &int(0), &int(0), &int(0)));
    }
}

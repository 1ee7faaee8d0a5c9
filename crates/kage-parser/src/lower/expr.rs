//! Expression lowering, constant folding and implicit conversions.

use kage_ir::{BasicType, BuiltinFunc, ConstKind, ConstType, Constant, Expr, Op, Stmt, Type};

use super::types::{binary_op_type, default_type, scalar_of, swizzle_index, swizzle_type};
use super::{LResult, Lowerer, Reported, Value};
use crate::ast::{self, BinaryOp, ExprKind, Ident, Pos, UnaryOp};

/// A number expression whose hint follows `ty`.
pub(super) fn typed_const(value: Constant, ty: &Type) -> Expr {
    let hint = match ty.main {
        BasicType::Bool => ConstType::Bool,
        BasicType::Int => ConstType::Int,
        BasicType::Float => ConstType::Float,
        _ => ConstType::None,
    };
    Expr::Number { value, ty: hint }
}

/// Whether `value` is an integer inside the 32-bit `int` range.
pub(super) fn fits_int(value: &Constant) -> bool {
    value
        .to_i64()
        .is_some_and(|v| i32::try_from(v).is_ok())
}

/// Converts a constant to the scalar type `ty`, if representable exactly.
pub(super) fn convert_const(value: &Constant, ty: &Type) -> Option<Constant> {
    let is_bool = value.kind() == ConstKind::Bool;
    match ty.main {
        BasicType::Bool if is_bool => Some(value.clone()),
        BasicType::Int if !is_bool && fits_int(value) => value.to_int(),
        BasicType::Float if !is_bool => value.to_float(),
        _ => None,
    }
}

fn ir_op(op: BinaryOp, lhs: &Type, rhs: &Type) -> Op {
    let vector = lhs.is_vector() || rhs.is_vector();
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul if lhs.is_matrix() || rhs.is_matrix() => Op::MatrixMul,
        BinaryOp::Mul => Op::ComponentWiseMul,
        BinaryOp::Quo => Op::Div,
        BinaryOp::Rem => Op::ModOp,
        BinaryOp::And | BinaryOp::AndNot => Op::And,
        BinaryOp::Or => Op::Or,
        BinaryOp::Xor => Op::Xor,
        BinaryOp::Shl => Op::LeftShift,
        BinaryOp::Shr => Op::RightShift,
        BinaryOp::LAnd => Op::AndAnd,
        BinaryOp::LOr => Op::OrOr,
        BinaryOp::Eql if vector => Op::VectorEqualOp,
        BinaryOp::Eql => Op::EqualOp,
        BinaryOp::Neq if vector => Op::VectorNotEqualOp,
        BinaryOp::Neq => Op::NotEqualOp,
        BinaryOp::Lss => Op::LessThanOp,
        BinaryOp::Leq => Op::LessThanEqualOp,
        BinaryOp::Gtr => Op::GreaterThanOp,
        BinaryOp::Geq => Op::GreaterThanEqualOp,
    }
}

pub(super) fn strip_parens(e: &ast::Expr) -> &ast::Expr {
    match &e.kind {
        ExprKind::Paren(inner) => strip_parens(inner),
        _ => e,
    }
}

impl Lowerer<'_> {
    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Lowers an expression that must produce exactly one value.
    pub(super) fn lower_value(&mut self, e: &ast::Expr, stmts: &mut Vec<Stmt>) -> LResult<Value> {
        let values = self.lower_expr(e, stmts)?;
        match <[Value; 1]>::try_from(values) {
            Ok([v]) => Ok(v),
            Err(values) if values.is_empty() => {
                Err(self.error(e.pos, format!("{e} (no value) used as value")))
            }
            Err(_) => Err(self.error(e.pos, format!("multiple-value {e} in single-value context"))),
        }
    }

    /// Lowers an expression into zero or more values. Only calls produce
    /// other than one value. Statements that must run first are appended
    /// to `stmts`.
    pub(super) fn lower_expr(&mut self, e: &ast::Expr, stmts: &mut Vec<Stmt>) -> LResult<Vec<Value>> {
        let pos = e.pos;
        let value = match &e.kind {
            ExprKind::Ident(name) => self.lower_ident(pos, name)?,
            ExprKind::Int(lit) => match Constant::parse_int(lit) {
                Some(c) => Value::new(Expr::number(c), Type::NONE),
                None => return Err(self.error(pos, format!("invalid integer literal: {lit}"))),
            },
            ExprKind::Float(lit) => match Constant::parse_float(lit) {
                Some(c) => Value::new(Expr::number(c), Type::NONE),
                None => return Err(self.error(pos, format!("invalid float literal: {lit}"))),
            },
            ExprKind::Imag(_) => return Err(self.error(pos, "complex numbers are not supported")),
            ExprKind::Char(_) => return Err(self.error(pos, "rune literals are not supported")),
            ExprKind::String(_) => return Err(self.error(pos, "string literals are not supported")),
            ExprKind::Paren(inner) => return self.lower_expr(inner, stmts),
            ExprKind::Composite { ty, elts } => self.lower_composite(pos, ty, elts, stmts)?,
            ExprKind::Selector { base, sel } => {
                let base = self.lower_value(base, stmts)?;
                self.swizzle(pos, base, sel, false)?
            }
            ExprKind::Index { base, index } => {
                let base = self.lower_value(base, stmts)?;
                self.index(pos, base, index, stmts)?
            }
            ExprKind::Slice { .. } => return Err(self.error(pos, "slice expressions are not supported")),
            ExprKind::TypeAssert { .. } => {
                return Err(self.error(pos, "type assertions are not supported"));
            }
            ExprKind::Call { func, args, ellipsis } => {
                if *ellipsis {
                    return Err(self.error(pos, "variadic arguments are not supported"));
                }
                return self.lower_call(e, func, args, stmts);
            }
            ExprKind::Unary { op, operand } => self.lower_unary(pos, *op, operand, stmts)?,
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.lower_value(lhs, stmts)?;
                let r = self.lower_value(rhs, stmts)?;
                self.binary(pos, *op, l, r)?
            }
            ExprKind::KeyValue { .. } => {
                return Err(self.error(pos, format!("unexpected key-value expression: {e}")));
            }
            ExprKind::FuncLit => return Err(self.error(pos, "function literals are not supported")),
            ExprKind::ArrayType { .. }
            | ExprKind::SliceType(_)
            | ExprKind::StructType(_)
            | ExprKind::FuncType
            | ExprKind::MapType
            | ExprKind::ChanType
            | ExprKind::InterfaceType => {
                return Err(self.error(pos, format!("{e} is not an expression")));
            }
        };
        Ok(vec![value])
    }

    // -----------------------------------------------------------------------
    // Identifiers
    // -----------------------------------------------------------------------

    fn lower_ident(&mut self, pos: Pos, name: &str) -> LResult<Value> {
        if name == "_" {
            return Err(self.error(pos, "cannot use _ as value"));
        }
        if let Some((index, var)) = self.find_local(name) {
            return Ok(Value::new(Expr::LocalVariable(index), var.ty.clone()));
        }
        if let Some(c) = self.find_const(name) {
            let expr = if c.ty.is_none() {
                Expr::number(c.value.clone())
            } else {
                typed_const(c.value.clone(), &c.ty)
            };
            return Ok(Value::new(expr, c.ty.clone()));
        }
        if self.func_names().any(|n| n == name) {
            return Err(self.error(pos, format!("function {name} must be called")));
        }
        if let Some(i) = self.program.uniform_names.iter().position(|n| n == name) {
            let ty = self.program.uniforms[i].clone();
            return Ok(Value::new(Expr::UniformVariable(i), ty));
        }
        if BuiltinFunc::parse(name).is_some() {
            return Err(self.error(pos, format!("built-in function {name} must be called")));
        }
        if let Some(i) = self.texture_index(name) {
            return Ok(Value::new(Expr::TextureVariable(i), Type::basic(BasicType::Texture)));
        }
        match name {
            "true" | "false" => {
                let c = Constant::Bool(name == "true");
                Ok(Value::new(Expr::typed_number(c), Type::BOOL))
            }
            _ => Err(self.error(pos, format!("unexpected identifier: {name}"))),
        }
    }

    /// `__tN` for `N` below the configured texture count.
    fn texture_index(&self, name: &str) -> Option<usize> {
        let digits = name.strip_prefix("__t")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse().ok().filter(|&i| i < self.options.texture_count)
    }

    // -----------------------------------------------------------------------
    // Selectors and indexing
    // -----------------------------------------------------------------------

    pub(super) fn swizzle(&mut self, pos: Pos, base: Value, sel: &Ident, assign: bool) -> LResult<Value> {
        let Some(ty) = swizzle_type(&base.ty, &sel.name) else {
            return Err(self.error(pos, format!("unexpected swizzling: {}", sel.name)));
        };
        if assign {
            let mut seen = [false; 4];
            for c in sel.name.chars() {
                let i = swizzle_index(c);
                if seen[i] {
                    return Err(self.error(
                        pos,
                        format!("cannot assign to swizzle {} with repeated components", sel.name),
                    ));
                }
                seen[i] = true;
            }
        }
        let expr = Expr::FieldSelector {
            base: Box::new(base.expr),
            field: Box::new(Expr::SwizzlingExpr(sel.name.clone())),
        };
        Ok(Value::new(expr, ty))
    }

    pub(super) fn index(
        &mut self,
        pos: Pos,
        base: Value,
        index: &ast::Expr,
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Value> {
        let (elem, length) = match base.ty.main {
            BasicType::Array => (base.ty.elem().cloned().unwrap_or_default(), base.ty.length),
            _ if base.ty.is_float_vector() => (Type::FLOAT, base.ty.vector_element_count()),
            _ if base.ty.is_int_vector() => (Type::INT, base.ty.vector_element_count()),
            _ if base.ty.is_matrix() => {
                let n = base.ty.vector_element_count();
                (kage_ir::float_vector(n).unwrap_or_default(), n)
            }
            _ => {
                return Err(self.error(
                    pos,
                    format!("index operator cannot be applied to the type {}", base.ty),
                ));
            }
        };

        let i = self.lower_value(index, stmts)?;
        let i = self.settle(index.pos, i, &Type::INT, "index")?;
        if let Some(c) = i.constant() {
            let n = c.to_i64().unwrap_or(-1);
            if n < 0 || usize::try_from(n).is_ok_and(|n| n >= length) {
                return Err(self.error(index.pos, format!("index out of range: {c}")));
            }
        }
        Ok(Value::new(Expr::index(base.expr, i), elem))
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    fn lower_unary(
        &mut self,
        pos: Pos,
        op: UnaryOp,
        operand: &ast::Expr,
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Value> {
        let ir = match op {
            UnaryOp::Plus => Op::Add,
            UnaryOp::Neg => Op::Sub,
            UnaryOp::Not => Op::NotOp,
            UnaryOp::BitNot => return Err(self.error(pos, "operator ^ is not implemented")),
            UnaryOp::Deref | UnaryOp::Addr => return Err(self.error(pos, "pointers are not supported")),
            UnaryOp::Recv => return Err(self.error(pos, "channels are not supported")),
        };
        let v = self.lower_value(operand, stmts)?;
        let v = if v.pending_shift {
            self.settle_pending(pos, v, &Type::INT)?
        } else {
            v
        };

        if let Some(c) = v.expr.constant() {
            let Some(folded) = Constant::unary(ir, c) else {
                return Err(self.error(pos, format!("invalid operation: operator {op} not defined on {c}")));
            };
            let expr = if v.ty.is_none() {
                Expr::number(folded)
            } else {
                typed_const(folded, &v.ty)
            };
            return Ok(Value::new(expr, v.ty));
        }

        let ok = match ir {
            Op::NotOp => v.ty == Type::BOOL,
            _ => v.ty.is_float_based() || v.ty.is_integral(),
        };
        if !ok {
            return Err(self.error(pos, format!("invalid operation: operator {op} not defined on {}", v.ty)));
        }
        let expr = Expr::Unary {
            op: ir,
            operand: Box::new(v.expr),
        };
        Ok(Value::new(expr, v.ty))
    }

    /// Types and folds `l op r`.
    pub(super) fn binary(&mut self, pos: Pos, op: BinaryOp, l: Value, r: Value) -> LResult<Value> {
        if op == BinaryOp::AndNot {
            return Err(self.error(pos, "operator &^ is not implemented"));
        }
        if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            return self.shift(pos, op, l, r);
        }

        let (l, r) = self.settle_pending_pair(pos, l, r)?;
        let ir = ir_op(op, &l.ty, &r.ty);

        if let (Some(a), Some(b)) = (l.expr.constant(), r.expr.constant()) {
            let (a, b) = (a.clone(), b.clone());
            return self.fold_binary(pos, op, ir, (a, l.ty), (b, r.ty));
        }

        let l = self.adopt_scalar(pos, l, &r.ty)?;
        let r = self.adopt_scalar(pos, r, &l.ty)?;
        let Some(ty) = binary_op_type(ir, &l.ty, &r.ty) else {
            return Err(self.error(pos, format!("types don't match: {} {op} {}", l.ty, r.ty)));
        };
        Ok(Value::new(Expr::binary(ir, l.expr, r.expr), ty))
    }

    /// Converts `v` to the scalar type matching `other` if `v` is an
    /// untyped constant.
    fn adopt_scalar(&mut self, pos: Pos, v: Value, other: &Type) -> LResult<Value> {
        let Some(c) = v.untyped_const().cloned() else {
            return Ok(v);
        };
        let Some(target) = scalar_of(other) else {
            return Err(self.error(pos, format!("cannot use {c} as {other} value")));
        };
        match convert_const(&c, &target) {
            Some(converted) => Ok(Value::new(typed_const(converted, &target), target)),
            None => Err(self.const_mismatch(pos, &c, &target, "expression")),
        }
    }

    fn fold_binary(
        &mut self,
        pos: Pos,
        op: BinaryOp,
        ir: Op,
        (a, at): (Constant, Type),
        (b, bt): (Constant, Type),
    ) -> LResult<Value> {
        if !at.is_none() && !bt.is_none() && at != bt {
            return Err(self.error(pos, format!("types don't match: {at} {op} {bt}")));
        }
        let ty = if at.is_none() { bt } else { at };
        let (a, b) = if ty.is_none() {
            (a, b)
        } else {
            let converted = (convert_const(&a, &ty), convert_const(&b, &ty));
            match converted {
                (Some(a), Some(b)) => (a, b),
                (None, _) => return Err(self.const_mismatch(pos, &a, &ty, "expression")),
                (_, None) => return Err(self.const_mismatch(pos, &b, &ty, "expression")),
            }
        };

        if ir.is_comparison() {
            return match Constant::compare(ir, &a, &b) {
                Some(result) => Ok(Value::new(Expr::typed_number(Constant::Bool(result)), Type::BOOL)),
                None => Err(self.error(pos, format!("invalid operation: operator {op} not defined on {a}"))),
            };
        }
        if matches!(ir, Op::Div | Op::ModOp) && b.is_zero() {
            return Err(self.error(pos, "invalid operation: division by zero"));
        }
        if matches!(ir, Op::ModOp | Op::And | Op::Or | Op::Xor) {
            let ints = (a.to_int(), b.to_int());
            let (Some(ia), Some(ib)) = ints else {
                return Err(self.error(pos, format!("invalid operation: operator {op} not defined on {a}")));
            };
            if a.kind() == ConstKind::Float || b.kind() == ConstKind::Float {
                return Err(self.error(pos, format!("invalid operation: operator {op} not defined on {a}")));
            }
            return self.finish_fold(pos, op, ir, &ia, &ib, ty);
        }
        self.finish_fold(pos, op, ir, &a, &b, ty)
    }

    fn finish_fold(
        &mut self,
        pos: Pos,
        op: BinaryOp,
        ir: Op,
        a: &Constant,
        b: &Constant,
        ty: Type,
    ) -> LResult<Value> {
        let Some(c) = Constant::binary(ir, a, b) else {
            return Err(self.error(pos, format!("invalid operation: operator {op} not defined on {a}")));
        };
        if c.kind() == ConstKind::Bool {
            return Ok(Value::new(Expr::typed_number(c), Type::BOOL));
        }
        if ty.main == BasicType::Int && !fits_int(&c) {
            return Err(self.error(pos, format!("constant {c} overflows int")));
        }
        let expr = if ty.is_none() {
            Expr::number(c)
        } else {
            typed_const(c, &ty)
        };
        Ok(Value::new(expr, ty))
    }

    fn shift(&mut self, pos: Pos, op: BinaryOp, l: Value, r: Value) -> LResult<Value> {
        let ir = ir_op(op, &l.ty, &r.ty);

        // The count is always an int.
        let r = if r.pending_shift {
            self.settle_pending(pos, r, &Type::INT)?
        } else {
            r
        };
        let r = match r.untyped_const().cloned() {
            Some(c) => match c.to_int() {
                Some(n) if c.kind() != ConstKind::Bool => Value::new(typed_const(n, &Type::INT), Type::INT),
                _ => return Err(self.error(pos, format!("invalid shift count {c}"))),
            },
            None => r,
        };
        if let Some(c) = r.expr.constant() {
            if c.signum() < 0 {
                return Err(self.error(pos, format!("invalid negative shift count: {c}")));
            }
        }
        if !r.ty.is_integral() {
            return Err(self.error(pos, format!("shift count type {} must be integer", r.ty)));
        }

        if let (Some(a), Some(b)) = (l.expr.constant(), r.expr.constant()) {
            if l.ty.main == BasicType::Float || a.kind() == ConstKind::Bool || !a.is_integral() {
                return Err(self.error(pos, format!("invalid operation: shifted operand {a} must be integer")));
            }
            let Some(c) = Constant::shift(ir, a, b) else {
                return Err(self.error(pos, format!("invalid shift count {b}")));
            };
            if l.ty.main == BasicType::Int && !fits_int(&c) {
                return Err(self.error(pos, format!("constant {c} overflows int")));
            }
            let expr = if l.ty.is_none() {
                Expr::number(c)
            } else {
                typed_const(c, &l.ty)
            };
            return Ok(Value::new(expr, l.ty));
        }

        if let Some(c) = l.untyped_const() {
            // `1 << n`: the shifted constant takes its type from the context.
            let Some(n) = c.to_int().filter(|_| c.kind() != ConstKind::Bool) else {
                return Err(self.error(pos, format!("invalid operation: shifted operand {c} must be integer")));
            };
            return Ok(Value {
                expr: Expr::binary(ir, Expr::number(n), r.expr),
                ty: Type::NONE,
                pending_shift: true,
            });
        }

        let l = if l.pending_shift {
            self.settle_pending(pos, l, &Type::INT)?
        } else {
            l
        };
        let Some(ty) = binary_op_type(ir, &l.ty, &r.ty) else {
            return Err(self.error(pos, format!("types don't match: {} {op} {}", l.ty, r.ty)));
        };
        Ok(Value::new(Expr::binary(ir, l.expr, r.expr), ty))
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    /// Gives a pending shift its type. Only an int context is legal.
    pub(super) fn settle_pending(&mut self, pos: Pos, v: Value, target: &Type) -> LResult<Value> {
        if !v.pending_shift {
            return Ok(v);
        }
        let Expr::Binary { op, lhs, rhs } = v.expr else {
            return Ok(Value::new(v.expr, Type::INT));
        };
        if target.main != BasicType::Int {
            let dir = if op == Op::LeftShift { "left" } else { "right" };
            return Err(self.error(pos, format!("left operand for {dir} shift should be int")));
        }
        let lhs = match *lhs {
            Expr::Number { value, .. } => Expr::Number {
                value,
                ty: ConstType::Int,
            },
            other => other,
        };
        let expr = Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs,
        };
        Ok(Value::new(expr, Type::INT))
    }

    fn settle_pending_pair(&mut self, pos: Pos, l: Value, r: Value) -> LResult<(Value, Value)> {
        let target_of = |other: &Value| {
            if other.pending_shift || other.ty.is_none() {
                Type::INT
            } else {
                scalar_of(&other.ty).unwrap_or_else(|| other.ty.clone())
            }
        };
        let l = if l.pending_shift {
            let t = target_of(&r);
            self.settle_pending(pos, l, &t)?
        } else {
            l
        };
        let r = if r.pending_shift {
            let t = target_of(&l);
            self.settle_pending(pos, r, &t)?
        } else {
            r
        };
        Ok((l, r))
    }

    /// Converts `v` for storage into `target`; `context` names the place
    /// for diagnostics ("assignment", "argument", ...).
    pub(super) fn settle(&mut self, pos: Pos, v: Value, target: &Type, context: &str) -> LResult<Expr> {
        let v = self.settle_pending(pos, v, target)?;
        if let Some(c) = v.untyped_const() {
            return match convert_const(c, target) {
                Some(converted) => Ok(typed_const(converted, target)),
                None => Err(self.const_mismatch(pos, &c.clone(), target, context)),
            };
        }
        if v.ty != *target {
            return Err(self.error(
                pos,
                format!("cannot use type {} as type {target} in {context}", v.ty),
            ));
        }
        Ok(v.expr)
    }

    pub(super) fn const_mismatch(&mut self, pos: Pos, c: &Constant, target: &Type, context: &str) -> Reported {
        if target.main == BasicType::Int && c.kind() != ConstKind::Bool && c.is_integral() {
            return self.error(pos, format!("constant {c} overflows int"));
        }
        if target.main == BasicType::Int && c.kind() == ConstKind::Float {
            return self.error(pos, format!("constant {c} truncated to integer"));
        }
        self.error(
            pos,
            format!("cannot use {c} (untyped {} constant) as {target} value in {context}", c.kind()),
        )
    }

    /// Gives an untyped value its default type, for `:=` and `var x = ...`.
    pub(super) fn default_typed(&mut self, pos: Pos, v: Value) -> LResult<Value> {
        let v = self.settle_pending(pos, v, &Type::INT)?;
        if let Some(c) = v.untyped_const() {
            let ty = default_type(c);
            let expr = match convert_const(c, &ty) {
                Some(converted) => typed_const(converted, &ty),
                None => return Err(self.const_mismatch(pos, &c.clone(), &ty, "assignment")),
            };
            return Ok(Value::new(expr, ty));
        }
        if v.ty.main == BasicType::Texture {
            return Err(self.error(pos, "texture-typed variables are not supported"));
        }
        Ok(v)
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// The builtin `name` denotes at this point, unless shadowed.
    pub(super) fn builtin_named(&self, name: &str) -> Option<BuiltinFunc> {
        let shadowed = self.scopes.iter().any(|s| s.declares(name))
            || self.global.declares(name)
            || self.func_names().any(|n| n == name)
            || self.program.uniform_names.iter().any(|n| n == name);
        if shadowed {
            None
        } else {
            BuiltinFunc::parse(name)
        }
    }

    fn lower_call(
        &mut self,
        e: &ast::Expr,
        func: &ast::Expr,
        args: &[ast::Expr],
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Vec<Value>> {
        let Some(name) = func.ident() else {
            return Err(self.error(func.pos, format!("invalid function call: {e}")));
        };

        if let Some(index) = self.funcs.iter().position(|f| f.name == name) {
            let locally_shadowed = self.scopes.iter().any(|s| s.declares(name));
            if !locally_shadowed {
                return self.lower_user_call(e.pos, index, args, stmts);
            }
        }
        if self.vertex.as_ref().is_some_and(|s| s.name == name)
            || self.fragment.as_ref().is_some_and(|s| s.name == name)
        {
            return Err(self.error(func.pos, format!("entry point {name} cannot be called")));
        }
        if let Some(f) = self.builtin_named(name) {
            return self.lower_builtin_call(e.pos, f, args, stmts);
        }
        // Resolve the name for its diagnostic.
        self.lower_ident(func.pos, name)?;
        Err(self.error(func.pos, format!("invalid operation: cannot call non-function {name}")))
    }

    fn lower_user_call(
        &mut self,
        pos: Pos,
        index: usize,
        args: &[ast::Expr],
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Vec<Value>> {
        let sig = self.funcs[index].clone();
        if args.len() > sig.in_params.len() {
            return Err(self.error(pos, format!("too many arguments in call to {}", sig.name)));
        }
        if args.len() < sig.in_params.len() {
            return Err(self.error(pos, format!("not enough arguments in call to {}", sig.name)));
        }

        let mut exprs = Vec::with_capacity(args.len() + sig.out_params.len());
        for (arg, param) in args.iter().zip(&sig.in_params) {
            let v = self.lower_value(arg, stmts)?;
            exprs.push(self.settle(arg.pos, v, &param.ty, "argument")?);
        }
        let callee = Expr::FunctionExpr(index);

        if !sig.return_type.is_none() {
            if !sig.out_params.is_empty() {
                return Err(self.error(
                    pos,
                    format!("a function returning value cannot have out-params so far: {}", sig.name),
                ));
            }
            return Ok(vec![Value::new(Expr::call(callee, exprs), sig.return_type)]);
        }

        // Out-params land in fresh locals; the call runs as a statement.
        let mut results = Vec::with_capacity(sig.out_params.len());
        for p in &sig.out_params {
            let local = self.temporary(p.ty.clone());
            exprs.push(Expr::LocalVariable(local));
            results.push(Value::new(Expr::LocalVariable(local), p.ty.clone()));
        }
        stmts.push(Stmt::ExprStmt(Expr::call(callee, exprs)));
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Composite literals
    // -----------------------------------------------------------------------

    fn lower_composite(
        &mut self,
        pos: Pos,
        ty: &ast::Expr,
        elts: &[ast::Expr],
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Value> {
        let (mut t, inferred) = self.resolve_literal_type(ty)?;
        if t.main != BasicType::Array {
            return Err(self.error(pos, format!("invalid composite literal type {t}")));
        }
        if let Some(kv) = elts.iter().find(|e| matches!(e.kind, ExprKind::KeyValue { .. })) {
            return Err(self.error(kv.pos, "keyed elements are not supported in composite literals"));
        }
        let elem = t.elem().cloned().unwrap_or_default();
        if inferred {
            t = Type::array(elem.clone(), elts.len());
        }
        if elts.len() > t.length {
            return Err(self.error(pos, format!("too many values in {t} literal")));
        }

        let mut values = Vec::with_capacity(elts.len());
        for elt in elts {
            let v = self.lower_value(elt, stmts)?;
            values.push(self.settle(elt.pos, v, &elem, "array literal")?);
        }
        let local = self.temporary(t.clone());
        for (i, value) in values.into_iter().enumerate() {
            let i = i64::try_from(i).unwrap_or(i64::MAX);
            stmts.push(Stmt::Assign {
                lhs: Expr::index(Expr::LocalVariable(local), typed_const(Constant::int(i), &Type::INT)),
                rhs: value,
            });
        }
        Ok(Value::new(Expr::LocalVariable(local), t))
    }
}

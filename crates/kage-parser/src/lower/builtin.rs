//! Builtin function calls: conversions, constructors and shader math.

use kage_ir::{BasicType, BuiltinFunc, ConstKind, Constant, Expr, Stmt, Type};

use super::expr::{convert_const, typed_const};
use super::{FuncKind, LResult, Lowerer, Value};
use crate::ast::{self, Pos};

fn is_float_like(t: &Type) -> bool {
    t.main == BasicType::Float || t.is_float_vector()
}

fn is_int_like(t: &Type) -> bool {
    t.main == BasicType::Int || t.is_int_vector()
}

/// Element count of a constructor argument, if it fits a float
/// (`int_ctor == false`) or int vector constructor.
fn component_count(t: &Type, int_ctor: bool) -> Option<usize> {
    let scalar = if int_ctor { BasicType::Int } else { BasicType::Float };
    if t.main == scalar {
        Some(1)
    } else if (int_ctor && t.is_int_vector()) || (!int_ctor && t.is_float_vector()) {
        Some(t.vector_element_count())
    } else {
        None
    }
}

fn vector_ctor(f: BuiltinFunc) -> Option<(usize, bool)> {
    match f {
        BuiltinFunc::Vec2F => Some((2, false)),
        BuiltinFunc::Vec3F => Some((3, false)),
        BuiltinFunc::Vec4F => Some((4, false)),
        BuiltinFunc::IVec2F => Some((2, true)),
        BuiltinFunc::IVec3F => Some((3, true)),
        BuiltinFunc::IVec4F => Some((4, true)),
        _ => None,
    }
}

fn matrix_ctor(f: BuiltinFunc) -> Option<usize> {
    match f {
        BuiltinFunc::Mat2F => Some(2),
        BuiltinFunc::Mat3F => Some(3),
        BuiltinFunc::Mat4F => Some(4),
        _ => None,
    }
}

/// Scalar kind untyped constant arguments adopt: the element kind of the
/// typed arguments, else float if any constant is a float, else int.
fn resolve_const_kind(args: &[Value]) -> Option<Type> {
    let mut kind = None;
    for a in args {
        let t = if is_int_like(&a.ty) {
            Type::INT
        } else if is_float_like(&a.ty) {
            Type::FLOAT
        } else {
            continue;
        };
        match &kind {
            None => kind = Some(t),
            Some(k) if *k != t => return None,
            Some(_) => {}
        }
    }
    if kind.is_some() {
        return kind;
    }
    let any_float = args
        .iter()
        .filter_map(|a| a.untyped_const())
        .any(|c| c.kind() == ConstKind::Float);
    Some(if any_float { Type::FLOAT } else { Type::INT })
}

impl Lowerer<'_> {
    pub(super) fn lower_builtin_call(
        &mut self,
        pos: Pos,
        f: BuiltinFunc,
        args: &[ast::Expr],
        stmts: &mut Vec<Stmt>,
    ) -> LResult<Vec<Value>> {
        match f {
            BuiltinFunc::DiscardF => {
                self.expect_arity(pos, f, args.len(), 0)?;
                if self.func_state().is_none_or(|s| s.kind != FuncKind::Fragment) {
                    let entry = self.options.fragment_entry.clone();
                    return Err(self.error(pos, format!("discard is available only in {entry}")));
                }
                stmts.push(Stmt::Discard);
                return Ok(vec![]);
            }
            BuiltinFunc::FrontFacing => {
                self.expect_arity(pos, f, args.len(), 0)?;
                if !self.in_fragment() {
                    let entry = self.options.fragment_entry.clone();
                    return Err(self.error(pos, format!("{f} is available only in {entry}")));
                }
                let call = Expr::call(Expr::BuiltinFuncExpr(f), vec![]);
                return Ok(vec![Value::new(call, Type::BOOL)]);
            }
            _ => {}
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let v = self.lower_value(arg, stmts)?;
            values.push(self.settle_pending(arg.pos, v, &Type::INT)?);
        }
        let value = self.builtin_value(pos, f, values)?;
        Ok(vec![value])
    }

    fn expect_arity(&mut self, pos: Pos, f: BuiltinFunc, got: usize, want: usize) -> LResult<()> {
        if got == want {
            return Ok(());
        }
        Err(self.error(pos, format!("number of {f}'s arguments must be {want} but {got}")))
    }

    fn builtin_value(&mut self, pos: Pos, f: BuiltinFunc, mut args: Vec<Value>) -> LResult<Value> {
        let call = |args: Vec<Value>, ty: Type| {
            let exprs = args.into_iter().map(|a| a.expr).collect();
            Value::new(Expr::call(Expr::BuiltinFuncExpr(f), exprs), ty)
        };

        if let Some((n, int_ctor)) = vector_ctor(f) {
            self.vector_constructor(pos, f, n, int_ctor, &args)?;
            let (scalar, ty) = if int_ctor {
                (Type::INT, kage_ir::int_vector(n))
            } else {
                (Type::FLOAT, kage_ir::float_vector(n))
            };
            let args = self.convert_ctor_consts(pos, args, &scalar)?;
            return Ok(call(args, ty.unwrap_or_default()));
        }
        if let Some(n) = matrix_ctor(f) {
            let args = self.convert_ctor_consts(pos, args, &Type::FLOAT)?;
            self.matrix_constructor(pos, f, n, &args)?;
            let ty = match n {
                2 => Type::basic(BasicType::Mat2),
                3 => Type::basic(BasicType::Mat3),
                _ => Type::basic(BasicType::Mat4),
            };
            return Ok(call(args, ty));
        }

        match f {
            BuiltinFunc::Len | BuiltinFunc::Cap => {
                self.expect_arity(pos, f, args.len(), 1)?;
                if args[0].ty.main != BasicType::Array {
                    return Err(self.error(pos, format!("invalid argument: {} for built-in {f}", args[0].ty)));
                }
                let n = i64::try_from(args[0].ty.length).unwrap_or(i64::MAX);
                Ok(Value::new(typed_const(Constant::int(n), &Type::INT), Type::INT))
            }
            BuiltinFunc::BoolF | BuiltinFunc::IntF | BuiltinFunc::FloatF => {
                self.expect_arity(pos, f, args.len(), 1)?;
                self.conversion(pos, f, args.remove(0))
            }
            BuiltinFunc::TexelAt => {
                self.expect_arity(pos, f, args.len(), 2)?;
                if args[0].ty.main != BasicType::Texture {
                    return Err(self.error(
                        pos,
                        format!("cannot use {} as texture value in argument to {f}", args[0].ty),
                    ));
                }
                if args[1].ty.main != BasicType::Vec2 {
                    return Err(self.error(
                        pos,
                        format!("cannot use {} as vec2 value in argument to {f}", args[1].ty),
                    ));
                }
                Ok(call(args, Type::basic(BasicType::Vec4)))
            }
            BuiltinFunc::Min | BuiltinFunc::Max | BuiltinFunc::Clamp => {
                if f == BuiltinFunc::Clamp {
                    self.expect_arity(pos, f, args.len(), 3)?;
                } else if args.len() < 2 {
                    return Err(self.error(pos, format!("not enough arguments in call to {f}")));
                }
                let scalar = resolve_const_kind(&args);
                let Some(scalar) = scalar else {
                    let types: Vec<String> = args.iter().map(|a| a.ty.to_string()).collect();
                    return Err(self.error(pos, format!("{f}'s arguments don't match: {}", types.join(", "))));
                };
                let args = self.convert_ctor_consts(pos, args, &scalar)?;
                let first = args[0].ty.clone();
                if !is_float_like(&first) && !is_int_like(&first) {
                    return Err(self.error(
                        pos,
                        format!("cannot use {first} as float, vecN, int, or ivecN value in argument to {f}"),
                    ));
                }
                let elem = if first.is_int_vector() || first == Type::INT { Type::INT } else { Type::FLOAT };
                for a in &args[1..] {
                    if a.ty != first && a.ty != elem {
                        return Err(self.error(
                            pos,
                            format!("the arguments for {f} must equal to the first argument {first} or {elem} but {}", a.ty),
                        ));
                    }
                }
                Ok(call(args, first))
            }
            _ => self.math(pos, f, args),
        }
    }

    fn conversion(&mut self, pos: Pos, f: BuiltinFunc, arg: Value) -> LResult<Value> {
        let target = match f {
            BuiltinFunc::BoolF => Type::BOOL,
            BuiltinFunc::IntF => Type::INT,
            _ => Type::FLOAT,
        };
        if let Some(c) = arg.expr.constant() {
            // Constant conversions are exact: `int(1.5)` is rejected.
            return match convert_const(c, &target) {
                Some(converted) => Ok(Value::new(typed_const(converted, &target), target)),
                None => Err(self.error(pos, format!("cannot convert {c} to type {target}"))),
            };
        }
        let ok = match target.main {
            BasicType::Bool => arg.ty == Type::BOOL,
            _ => arg.ty == Type::INT || arg.ty == Type::FLOAT,
        };
        if !ok {
            return Err(self.error(pos, format!("cannot convert {} to type {target}", arg.ty)));
        }
        if arg.ty == target {
            return Ok(arg);
        }
        let call = Expr::call(Expr::BuiltinFuncExpr(f), vec![arg.expr]);
        Ok(Value::new(call, target))
    }

    /// Converts untyped constant arguments to `scalar`.
    fn convert_ctor_consts(&mut self, pos: Pos, args: Vec<Value>, scalar: &Type) -> LResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for a in args {
            let Some(c) = a.untyped_const().cloned() else {
                out.push(a);
                continue;
            };
            match convert_const(&c, scalar) {
                Some(converted) => out.push(Value::new(typed_const(converted, scalar), scalar.clone())),
                None => return Err(self.error(pos, format!("cannot convert {c} to type {scalar}"))),
            }
        }
        Ok(out)
    }

    fn vector_constructor(
        &mut self,
        pos: Pos,
        f: BuiltinFunc,
        n: usize,
        int_ctor: bool,
        args: &[Value],
    ) -> LResult<()> {
        if args.is_empty() {
            return Err(self.error(pos, format!("not enough arguments in call to {f}")));
        }
        let scalar = if int_ctor { "int" } else { "float" };

        if let [arg] = args {
            // A single scalar broadcasts; a same-sized vector converts.
            if arg.untyped_const().is_some_and(|c| c.kind() != ConstKind::Bool) {
                return Ok(());
            }
            let same_size = arg.ty.is_vector() && arg.ty.vector_element_count() == n;
            if component_count(&arg.ty, int_ctor) == Some(1) || same_size {
                return Ok(());
            }
            return Err(self.error(
                pos,
                format!("invalid arguments for {f}: {} cannot be used as {scalar} or vec{n}", arg.ty),
            ));
        }

        let mut total = 0;
        for a in args {
            if a.untyped_const().is_some_and(|c| c.kind() != ConstKind::Bool) {
                total += 1;
                continue;
            }
            let Some(count) = component_count(&a.ty, int_ctor) else {
                return Err(self.error(
                    pos,
                    format!("cannot use {} as {scalar} or vector value in argument to {f}", a.ty),
                ));
            };
            total += count;
        }
        if total > n {
            return Err(self.error(pos, format!("too many arguments in call to {f}")));
        }
        if total < n {
            return Err(self.error(pos, format!("not enough arguments in call to {f}")));
        }
        Ok(())
    }

    fn matrix_constructor(&mut self, pos: Pos, f: BuiltinFunc, n: usize, args: &[Value]) -> LResult<()> {
        let column = kage_ir::float_vector(n).unwrap_or_default();
        match args {
            [] => Err(self.error(pos, format!("not enough arguments in call to {f}"))),
            [arg] if arg.ty == Type::FLOAT || (arg.ty.is_matrix() && arg.ty.vector_element_count() == n) => Ok(()),
            [arg] => Err(self.error(
                pos,
                format!("cannot use {} as float or mat{n} value in argument to {f}", arg.ty),
            )),
            _ if args.len() == n => match args.iter().find(|a| a.ty != column) {
                None => Ok(()),
                Some(a) => Err(self.error(
                    pos,
                    format!("cannot use {} as {column} value in argument to {f}", a.ty),
                )),
            },
            _ if args.len() == n * n => match args.iter().find(|a| a.ty != Type::FLOAT) {
                None => Ok(()),
                Some(a) => Err(self.error(
                    pos,
                    format!("cannot use {} as float value in argument to {f}", a.ty),
                )),
            },
            _ if args.len() > n * n => Err(self.error(pos, format!("too many arguments in call to {f}"))),
            _ => Err(self.error(
                pos,
                format!("number of {f}'s arguments must be 1, {n} or {} but {}", n * n, args.len()),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Math
    // -----------------------------------------------------------------------

    fn math(&mut self, pos: Pos, f: BuiltinFunc, args: Vec<Value>) -> LResult<Value> {
        use BuiltinFunc as B;

        let arity = match f {
            B::Atan2 | B::Pow | B::Mod | B::Step | B::Distance | B::Dot | B::Cross | B::Reflect => 2,
            B::Mix | B::Smoothstep | B::Faceforward | B::Refract => 3,
            _ => 1,
        };
        self.expect_arity(pos, f, args.len(), arity)?;

        // Untyped constants follow the first typed argument's scalar type
        // and default to float.
        let scalar = match args.iter().find(|a| !a.ty.is_none()).map(|a| &a.ty) {
            Some(t) if is_int_like(t) => Type::INT,
            _ => Type::FLOAT,
        };
        let args = self.convert_ctor_consts(pos, args, &scalar)?;
        let ty: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();

        let result = match f {
            B::Abs | B::Sign => {
                if !is_float_like(&ty[0]) && !is_int_like(&ty[0]) {
                    return Err(self.error(
                        pos,
                        format!("cannot use {} as float, vecN, int, or ivecN value in argument to {f}", ty[0]),
                    ));
                }
                ty[0].clone()
            }
            B::Transpose => {
                if !ty[0].is_matrix() {
                    return Err(self.error(pos, format!("cannot use {} as matrix value in argument to {f}", ty[0])));
                }
                ty[0].clone()
            }
            _ => {
                if let Some(bad) = ty.iter().find(|t| !is_float_like(t)) {
                    return Err(self.error(
                        pos,
                        format!("cannot use {bad} as float, vec2, vec3, or vec4 value in argument to {f}"),
                    ));
                }
                match math_result(f, &ty) {
                    Some(t) => t,
                    None => {
                        let types: Vec<String> = ty.iter().map(Type::to_string).collect();
                        return Err(self.error(
                            pos,
                            format!("{f}'s arguments don't match: {}", types.join(", ")),
                        ));
                    }
                }
            }
        };

        let exprs = args.into_iter().map(|a| a.expr).collect();
        Ok(Value::new(Expr::call(Expr::BuiltinFuncExpr(f), exprs), result))
    }
}

/// Result type of a float math builtin over float-like arguments.
fn math_result(f: BuiltinFunc, ty: &[Type]) -> Option<Type> {
    use BuiltinFunc as B;

    match f {
        B::Length => Some(Type::FLOAT),
        B::Atan2 | B::Pow | B::Reflect => (ty[0] == ty[1]).then(|| ty[0].clone()),
        B::Mod => (ty[0] == ty[1] || ty[1] == Type::FLOAT).then(|| ty[0].clone()),
        B::Step => (ty[0] == ty[1] || ty[0] == Type::FLOAT).then(|| ty[1].clone()),
        B::Distance | B::Dot => (ty[0] == ty[1]).then_some(Type::FLOAT),
        B::Cross => {
            let vec3 = Type::basic(BasicType::Vec3);
            (ty[0] == vec3 && ty[1] == vec3).then_some(vec3)
        }
        B::Mix => (ty[0] == ty[1] && (ty[2] == ty[0] || ty[2] == Type::FLOAT)).then(|| ty[0].clone()),
        B::Smoothstep => {
            let edge_ok = |t: &Type| *t == ty[2] || *t == Type::FLOAT;
            (edge_ok(&ty[0]) && edge_ok(&ty[1]) && ty[0] == ty[1]).then(|| ty[2].clone())
        }
        B::Faceforward => (ty[0] == ty[1] && ty[0] == ty[2]).then(|| ty[0].clone()),
        B::Refract => (ty[0] == ty[1] && ty[2] == Type::FLOAT).then(|| ty[0].clone()),
        _ => Some(ty[0].clone()),
    }
}

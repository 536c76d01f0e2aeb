//! Expression evaluation over a condition context.

use super::context::EvalContext;
use super::parser::{parse, ArithOp, CmpOp, Expr};
use super::{ExprError, Value};

/// Evaluate a source expression to a value.
///
/// Failures follow the author-ergonomics policy: parse errors, type
/// errors, and division by zero all yield `Value::Null` (falsey) with a
/// warn-once, never a hard error.
pub fn eval_value(src: &str, ctx: &EvalContext<'_>) -> Value {
    let ast = match parse(src) {
        Ok(ast) => ast,
        Err(err) => {
            ctx.warn_once(src, || format!("expression rejected: {err} in '{src}'"));
            return Value::Null;
        }
    };
    match eval(&ast, ctx) {
        Ok(v) => v,
        Err(err) => {
            ctx.warn_once(src, || format!("expression failed: {err} in '{src}'"));
            Value::Null
        }
    }
}

/// Evaluate a source expression as a boolean condition.
pub fn eval_condition(src: &str, ctx: &EvalContext<'_>) -> bool {
    eval_value(src, ctx).truthy()
}

fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx)?);
            }
            Ok(Value::List(out))
        }
        Expr::Path(segments) => Ok(ctx.resolve_path(segments)),
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, ctx)?.truthy())),
        Expr::Neg(inner) => {
            let v = eval(inner, ctx)?;
            match v.as_num() {
                Some(n) => Ok(Value::Num(-n)),
                None => Err(ExprError::type_error(format!(
                    "cannot negate {}",
                    v.type_name()
                ))),
            }
        }
        Expr::And(lhs, rhs) => {
            if !eval(lhs, ctx)?.truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(rhs, ctx)?.truthy()))
        }
        Expr::Or(lhs, rhs) => {
            if eval(lhs, ctx)?.truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(rhs, ctx)?.truthy()))
        }
        Expr::Cmp { op, lhs, rhs } => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            compare(*op, &l, &r)
        }
        Expr::Arith { op, lhs, rhs } => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            arith(*op, &l, &r)
        }
        Expr::Call { name, args } => call(name, args, ctx),
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    let result = match op {
        CmpOp::Eq => l.loose_eq(r),
        CmpOp::Ne => !l.loose_eq(r),
        CmpOp::In => match r {
            Value::List(items) => items.iter().any(|item| item.loose_eq(l)),
            Value::Str(haystack) => match l {
                Value::Str(needle) => haystack.contains(needle.as_str()),
                _ => {
                    return Err(ExprError::type_error(format!(
                        "'in' over a string needs a string needle, got {}",
                        l.type_name()
                    )))
                }
            },
            _ => {
                return Err(ExprError::type_error(format!(
                    "'in' needs a list or string on the right, got {}",
                    r.type_name()
                )))
            }
        },
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (l, r) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => {
                    let (a, b) = match (l.as_num(), r.as_num()) {
                        (Some(a), Some(b)) => (a, b),
                        _ => {
                            // Ordering against null is an authoring slip,
                            // not a crash: the comparison is simply false.
                            if matches!(l, Value::Null) || matches!(r, Value::Null) {
                                return Ok(Value::Bool(false));
                            }
                            return Err(ExprError::type_error(format!(
                                "cannot order {} against {}",
                                l.type_name(),
                                r.type_name()
                            )));
                        }
                    };
                    a.partial_cmp(&b)
                        .ok_or_else(|| ExprError::type_error("NaN in comparison".to_string()))?
                }
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }
        }
    };
    Ok(Value::Bool(result))
}

fn arith(op: ArithOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    if op == ArithOp::Add
        && let (Value::Str(a), Value::Str(b)) = (l, r)
    {
        return Ok(Value::Str(format!("{a}{b}")));
    }
    let (a, b) = match (l.as_num(), r.as_num()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ExprError::type_error(format!(
                "arithmetic needs numbers, got {} and {}",
                l.type_name(),
                r.type_name()
            )))
        }
    };
    let out = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a / b
        }
    };
    Ok(Value::Num(out))
}

fn call(name: &str, args: &[Expr], ctx: &EvalContext<'_>) -> Result<Value, ExprError> {
    let arity = |n: usize| -> Result<(), ExprError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExprError::type_error(format!(
                "{name}() expects {n} argument(s), got {}",
                args.len()
            )))
        }
    };

    match name {
        "has" => {
            arity(1)?;
            let item = string_arg(name, &eval(&args[0], ctx)?)?;
            Ok(Value::Bool(ctx.player_has(&item)))
        }
        "npc_present" => {
            arity(1)?;
            let id = string_arg(name, &eval(&args[0], ctx)?)?;
            Ok(Value::Bool(ctx.npc_present(&id)))
        }
        "rand" => {
            arity(1)?;
            let p = num_arg(name, &eval(&args[0], ctx)?)?;
            Ok(Value::Bool(ctx.rng.chance(p)))
        }
        "min" => {
            arity(2)?;
            let a = num_arg(name, &eval(&args[0], ctx)?)?;
            let b = num_arg(name, &eval(&args[1], ctx)?)?;
            Ok(Value::Num(a.min(b)))
        }
        "max" => {
            arity(2)?;
            let a = num_arg(name, &eval(&args[0], ctx)?)?;
            let b = num_arg(name, &eval(&args[1], ctx)?)?;
            Ok(Value::Num(a.max(b)))
        }
        "abs" => {
            arity(1)?;
            let a = num_arg(name, &eval(&args[0], ctx)?)?;
            Ok(Value::Num(a.abs()))
        }
        "clamp" => {
            arity(3)?;
            let x = num_arg(name, &eval(&args[0], ctx)?)?;
            let lo = num_arg(name, &eval(&args[1], ctx)?)?;
            let hi = num_arg(name, &eval(&args[2], ctx)?)?;
            Ok(Value::Num(x.clamp(lo, hi)))
        }
        "get" => {
            arity(2)?;
            let value = match &args[0] {
                // `get(meters.emma.trust, 0)`: the path is inspected, not
                // evaluated, so the default can distinguish "missing".
                Expr::Path(segments) => lookup_quiet(ctx, segments),
                other => {
                    let v = eval(other, ctx)?;
                    match v {
                        Value::Str(path) => {
                            let segments: Vec<String> =
                                path.split('.').map(str::to_string).collect();
                            lookup_quiet(ctx, &segments)
                        }
                        _ => {
                            return Err(ExprError::type_error(
                                "get() expects a path or path string".to_string(),
                            ))
                        }
                    }
                }
            };
            if matches!(value, Value::Null) {
                eval(&args[1], ctx)
            } else {
                Ok(value)
            }
        }
        "knows_outfit" => {
            arity(2)?;
            let owner = string_arg(name, &eval(&args[0], ctx)?)?;
            let outfit = string_arg(name, &eval(&args[1], ctx)?)?;
            Ok(Value::Bool(ctx.knows_outfit(&owner, &outfit)))
        }
        "can_wear_outfit" => {
            arity(2)?;
            let owner = string_arg(name, &eval(&args[0], ctx)?)?;
            let outfit = string_arg(name, &eval(&args[1], ctx)?)?;
            Ok(Value::Bool(ctx.can_wear_outfit(&owner, &outfit)))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn lookup_quiet(ctx: &EvalContext<'_>, segments: &[String]) -> Value {
    // Same resolution as Expr::Path but without the unknown-path warning;
    // get() exists precisely for maybe-missing paths.
    ctx.resolve_quiet(segments)
}

fn string_arg(func: &str, v: &Value) -> Result<String, ExprError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(ExprError::type_error(format!(
            "{func}() expects a string, got {}",
            v.type_name()
        ))),
    }
}

fn num_arg(func: &str, v: &Value) -> Result<f64, ExprError> {
    v.as_num().ok_or_else(|| {
        ExprError::type_error(format!("{func}() expects a number, got {}", v.type_name()))
    })
}

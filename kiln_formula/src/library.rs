// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The fixed function library available to formulas.

use std::f64::consts;

use crate::ast::BinaryOp;
use crate::error::EvalError;
use crate::ops;
use crate::value::Value;

/// Plain library functions callable by bare name.
pub(crate) const FUNCTIONS: &[&str] = &[
    "round", "min", "max", "int", "float", "str", "bool", "abs", "len", "sum", "any", "all",
    "map",
];

/// Functions that read other settings.
pub(crate) const DOMAIN_FUNCTIONS: &[&str] = &["extruderValue", "extruderValues", "resolveOrValue"];

pub(crate) fn is_library_name(name: &str) -> bool {
    name == "math" || FUNCTIONS.contains(&name) || DOMAIN_FUNCTIONS.contains(&name)
}

pub(crate) fn math_constant(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Float(consts::PI)),
        "e" => Some(Value::Float(consts::E)),
        "tau" => Some(Value::Float(consts::TAU)),
        "inf" => Some(Value::Float(f64::INFINITY)),
        _ => None,
    }
}

fn exactly(function: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() == n {
        Ok(())
    } else {
        let plural = if n == 1 { "" } else { "s" };
        Err(EvalError::bad_argument(
            function,
            format!("takes exactly {n} argument{plural} ({} given)", args.len()),
        ))
    }
}

fn number(function: &str, value: &Value) -> Result<f64, EvalError> {
    value.as_f64().ok_or_else(|| {
        EvalError::bad_argument(
            function,
            format!("expects a number, got {}", value.type_name()),
        )
    })
}

fn float_to_int(function: &str, f: f64) -> Result<i64, EvalError> {
    // 2^63; `i64::MAX as f64` rounds up to this, which is already out of range.
    const LIMIT: f64 = 9.223_372_036_854_776e18;
    if !f.is_finite() || f >= LIMIT || f < -LIMIT {
        return Err(EvalError::bad_argument(
            function,
            format!("cannot convert {f} to an integer"),
        ));
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "finite and range checked above"
    )]
    let i = f.trunc() as i64;
    Ok(i)
}

/// Arguments of `min`/`max`/`sum`-style functions: either varargs or a single
/// iterable.
fn spread(args: &[Value]) -> Result<Vec<Value>, EvalError> {
    match args {
        [single] => ops::iterate(single),
        many => Ok(many.to_vec()),
    }
}

pub(crate) fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "round" => round(args),
        "min" => extreme(name, args, std::cmp::Ordering::Less),
        "max" => extreme(name, args, std::cmp::Ordering::Greater),
        "int" => match args {
            [] => Ok(Value::Int(0)),
            [v] => to_int(v).map(Value::Int),
            _ => exactly(name, args, 1).map(|()| Value::None),
        },
        "float" => match args {
            [] => Ok(Value::Float(0.0)),
            [v] => to_float(v).map(Value::Float),
            _ => exactly(name, args, 1).map(|()| Value::None),
        },
        "str" => match args {
            [] => Ok(Value::Str(String::new())),
            [v] => Ok(Value::Str(v.to_string())),
            _ => exactly(name, args, 1).map(|()| Value::None),
        },
        "bool" => match args {
            [] => Ok(Value::Bool(false)),
            [v] => Ok(Value::Bool(v.is_truthy())),
            _ => exactly(name, args, 1).map(|()| Value::None),
        },
        "abs" => {
            exactly(name, args, 1)?;
            match &args[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                other => number(name, other).map(|f| Value::Float(f.abs())),
            }
        }
        "len" => {
            exactly(name, args, 1)?;
            let len = match &args[0] {
                Value::List(items) => items.len(),
                Value::Str(s) => s.chars().count(),
                Value::Map(map) => map.len(),
                other => {
                    return Err(EvalError::bad_argument(
                        name,
                        format!("object of type {} has no len", other.type_name()),
                    ));
                }
            };
            i64::try_from(len).map(Value::Int).map_err(|_| EvalError::Overflow)
        }
        "sum" => {
            let (items, start) = match args {
                [items] => (items, Value::Int(0)),
                [items, start] => (items, start.clone()),
                _ => {
                    return Err(EvalError::bad_argument(name, "takes 1 or 2 arguments"));
                }
            };
            ops::iterate(items)?
                .iter()
                .try_fold(start, |acc, v| ops::binary(BinaryOp::Add, &acc, v))
        }
        "any" => {
            exactly(name, args, 1)?;
            Ok(Value::Bool(ops::iterate(&args[0])?.iter().any(Value::is_truthy)))
        }
        "all" => {
            exactly(name, args, 1)?;
            Ok(Value::Bool(ops::iterate(&args[0])?.iter().all(Value::is_truthy)))
        }
        _ => Err(EvalError::UnknownFunction(name.to_owned())),
    }
}

fn round(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Int(i)] | [Value::Int(i), Value::None] => Ok(Value::Int(*i)),
        [x] | [x, Value::None] => float_to_int("round", number("round", x)?.round_ties_even())
            .map(Value::Int),
        [Value::Int(i), digits] if digits.as_i64().is_some_and(|d| d >= 0) => {
            Ok(Value::Int(*i))
        }
        [x, digits] => {
            let digits = digits.as_i64().ok_or_else(|| {
                EvalError::bad_argument("round", "ndigits must be an integer")
            })?;
            let digits = i32::try_from(digits)
                .map_err(|_| EvalError::bad_argument("round", "ndigits out of range"))?;
            let x = number("round", x)?;
            let scale = 10_f64.powi(digits);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
        _ => Err(EvalError::bad_argument("round", "takes 1 or 2 arguments")),
    }
}

fn extreme(name: &str, args: &[Value], keep: std::cmp::Ordering) -> Result<Value, EvalError> {
    let items = spread(args)?;
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(EvalError::bad_argument(name, "arg is an empty sequence"));
    };
    for item in iter {
        let ordering = item
            .compare(&best)
            .ok_or_else(|| EvalError::UnsupportedOperands {
                op: "<",
                left: item.type_name(),
                right: best.type_name(),
            })?;
        if ordering == keep {
            best = item;
        }
    }
    Ok(best)
}

fn to_int(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) => float_to_int("int", *f),
        Value::Str(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(i);
            }
            match s.parse::<f64>() {
                Ok(f) => float_to_int("int", f),
                Err(_) => Err(EvalError::bad_argument(
                    "int",
                    format!("invalid literal {s:?}"),
                )),
            }
        }
        other => Err(EvalError::bad_argument(
            "int",
            format!("cannot convert {}", other.type_name()),
        )),
    }
}

fn to_float(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::bad_argument("float", format!("invalid literal {s:?}"))),
        other => number("float", other),
    }
}

pub(crate) fn call_math(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let unary = |f: fn(f64) -> f64| -> Result<Value, EvalError> {
        exactly(name, args, 1)?;
        Ok(Value::Float(f(number(name, &args[0])?)))
    };
    match name {
        "floor" | "ceil" | "trunc" => {
            exactly(name, args, 1)?;
            let x = number(name, &args[0])?;
            let rounded = match name {
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x.trunc(),
            };
            float_to_int(name, rounded).map(Value::Int)
        }
        "sqrt" => {
            exactly(name, args, 1)?;
            let x = number(name, &args[0])?;
            if x < 0.0 {
                return Err(EvalError::MathDomain("sqrt"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        "asin" | "acos" => {
            exactly(name, args, 1)?;
            let x = number(name, &args[0])?;
            if !(-1.0..=1.0).contains(&x) {
                return Err(EvalError::MathDomain(if name == "asin" { "asin" } else { "acos" }));
            }
            Ok(Value::Float(if name == "asin" { x.asin() } else { x.acos() }))
        }
        "log" => {
            let (x, base) = match args {
                [x] => (number(name, x)?, None),
                [x, base] => (number(name, x)?, Some(number(name, base)?)),
                _ => return Err(EvalError::bad_argument("log", "takes 1 or 2 arguments")),
            };
            if x <= 0.0 || base.is_some_and(|b| b <= 0.0 || b == 1.0) {
                return Err(EvalError::MathDomain("log"));
            }
            Ok(Value::Float(base.map_or(x.ln(), |b| x.ln() / b.ln())))
        }
        "atan2" => {
            exactly(name, args, 2)?;
            let y = number(name, &args[0])?;
            let x = number(name, &args[1])?;
            Ok(Value::Float(y.atan2(x)))
        }
        "fabs" => unary(f64::abs),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "atan" => unary(f64::atan),
        "exp" => unary(f64::exp),
        "radians" => unary(f64::to_radians),
        "degrees" => unary(f64::to_degrees),
        _ => Err(EvalError::UnknownFunction(format!("math.{name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Value {
        Value::List(items.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn round_is_half_to_even() {
        assert_eq!(call("round", &[Value::Float(2.5)]), Ok(Value::Int(2)));
        assert_eq!(call("round", &[Value::Float(3.5)]), Ok(Value::Int(4)));
        assert_eq!(call("round", &[Value::Float(-0.5)]), Ok(Value::Int(0)));
        assert_eq!(
            call("round", &[Value::Float(0.125), Value::Int(2)]),
            Ok(Value::Float(0.12))
        );
        assert_eq!(call("round", &[Value::Int(7), Value::Int(1)]), Ok(Value::Int(7)));
    }

    #[test]
    fn min_max_accept_varargs_or_one_list() {
        assert_eq!(
            call("max", &[Value::Int(1), Value::Float(2.5), Value::Int(2)]),
            Ok(Value::Float(2.5))
        );
        assert_eq!(call("min", &[ints(&[4, 2, 9])]), Ok(Value::Int(2)));
        assert!(call("min", &[Value::List(vec![])]).is_err());
    }

    #[test]
    fn int_truncates_toward_zero() {
        assert_eq!(call("int", &[Value::Float(-2.7)]), Ok(Value::Int(-2)));
        assert_eq!(call("int", &[Value::from("12")]), Ok(Value::Int(12)));
        assert_eq!(call("int", &[Value::from(" 3.9 ")]), Ok(Value::Int(3)));
        assert!(call("int", &[Value::Float(f64::NAN)]).is_err());
    }

    #[test]
    fn aggregates() {
        assert_eq!(call("sum", &[ints(&[1, 2, 3])]), Ok(Value::Int(6)));
        assert_eq!(call("len", &[ints(&[1, 2, 3])]), Ok(Value::Int(3)));
        assert_eq!(call("any", &[ints(&[0, 0, 1])]), Ok(Value::Bool(true)));
        assert_eq!(call("all", &[ints(&[0, 1])]), Ok(Value::Bool(false)));
        assert_eq!(call("all", &[ints(&[])]), Ok(Value::Bool(true)));
    }

    #[test]
    fn math_namespace() {
        assert_eq!(call_math("floor", &[Value::Float(-1.5)]), Ok(Value::Int(-2)));
        assert_eq!(call_math("ceil", &[Value::Float(1.2)]), Ok(Value::Int(2)));
        assert_eq!(call_math("sqrt", &[Value::Int(16)]), Ok(Value::Float(4.0)));
        assert_eq!(
            call_math("sqrt", &[Value::Int(-1)]),
            Err(EvalError::MathDomain("sqrt"))
        );
        assert_eq!(
            call_math("radians", &[Value::Int(180)]),
            Ok(Value::Float(consts::PI))
        );
        assert_eq!(
            call_math("log", &[Value::Int(8), Value::Int(2)]),
            Ok(Value::Float(3.0))
        );
        assert!(matches!(
            call_math("hypot", &[]),
            Err(EvalError::UnknownFunction(name)) if name == "math.hypot"
        ));
    }
}

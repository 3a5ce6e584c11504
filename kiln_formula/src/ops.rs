// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operator semantics.
//!
//! Arithmetic follows the usual scripting conventions: `/` always yields a
//! float, `//` and `%` floor toward negative infinity, booleans act as `0`/`1`,
//! and `+`/`*` also concatenate and repeat strings and lists.

use crate::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::error::EvalError;
use crate::value::Value;

#[derive(Copy, Clone, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Vec<T> {
    let count = usize::try_from(count).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    out
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b).cloned().collect()));
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::Str(s.repeat(usize::try_from(*n).unwrap_or(0))));
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            return Ok(Value::List(repeat(items, *n)));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (num(left), num(right)) else {
        return Err(EvalError::UnsupportedOperands {
            op: op.symbol(),
            left: left.type_name(),
            right: right.type_name(),
        });
    };
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => int_binary(op, a, b),
        _ => float_binary(op, to_f64(a), to_f64(b)),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return float_binary(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_div(b).map(|q| {
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_rem(b).map(|r| {
                if r != 0 && ((r < 0) != (b < 0)) {
                    r + b
                } else {
                    r
                }
            })
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => a.checked_pow(exp),
            Err(_) if b < 0 => return float_binary(op, a as f64, b as f64),
            Err(_) => None,
        },
    };
    result.map(Value::Int).ok_or(EvalError::Overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let p = a.powf(b);
            if p.is_nan() && !a.is_nan() && !b.is_nan() {
                return Err(EvalError::MathDomain("pow"));
            }
            p
        }
    };
    Ok(Value::Float(result))
}

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    let bad = || EvalError::BadOperand {
        op: match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not",
        },
        operand: operand.type_name(),
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match num(operand).ok_or_else(bad)? {
            Num::Int(i) => i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            Num::Float(f) => Ok(Value::Float(-f)),
        },
        UnaryOp::Pos => match num(operand).ok_or_else(bad)? {
            Num::Int(i) => Ok(Value::Int(i)),
            Num::Float(f) => Ok(Value::Float(f)),
        },
    }
}

pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering;

    let ordering = |left: &Value, right: &Value| {
        left.compare(right)
            .ok_or_else(|| EvalError::UnsupportedOperands {
                op: op.symbol(),
                left: left.type_name(),
                right: right.type_name(),
            })
    };
    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::NotEq => !left.loose_eq(right),
        CompareOp::Lt => ordering(left, right)? == Ordering::Less,
        CompareOp::Le => ordering(left, right)? != Ordering::Greater,
        CompareOp::Gt => ordering(left, right)? == Ordering::Greater,
        CompareOp::Ge => ordering(left, right)? != Ordering::Less,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
    })
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match (container, item) {
        (Value::List(items), _) => Ok(items.iter().any(|v| v.loose_eq(item))),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Str(_) | Value::Map(_), _) => Err(EvalError::UnsupportedOperands {
            op: "in",
            left: item.type_name(),
            right: container.type_name(),
        }),
        _ => Err(EvalError::NotIterable(container.type_name())),
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let len_i = i64::try_from(len).map_err(|_| EvalError::IndexOutOfRange(index))?;
    let adjusted = if index < 0 { index + len_i } else { index };
    usize::try_from(adjusted)
        .ok()
        .filter(|&i| i < len)
        .ok_or(EvalError::IndexOutOfRange(index))
}

pub(crate) fn index(base: &Value, key: &Value) -> Result<Value, EvalError> {
    match base {
        Value::List(items) => {
            let i = key.as_i64().ok_or(EvalError::UnsupportedOperands {
                op: "[]",
                left: base.type_name(),
                right: key.type_name(),
            })?;
            Ok(items[normalize_index(i, items.len())?].clone())
        }
        Value::Str(s) => {
            let i = key.as_i64().ok_or(EvalError::UnsupportedOperands {
                op: "[]",
                left: base.type_name(),
                right: key.type_name(),
            })?;
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[normalize_index(i, chars.len())?].to_string()))
        }
        Value::Map(map) => {
            let k = key.to_string();
            map.get(&k).cloned().ok_or(EvalError::KeyNotFound(k))
        }
        other => Err(EvalError::NotSubscriptable(other.type_name())),
    }
}

/// Items of an iterable value: list items, string characters, or map keys.
pub(crate) fn iterate(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(map) => Ok(map.keys().cloned().map(Value::Str).collect()),
        other => Err(EvalError::NotIterable(other.type_name())),
    }
}

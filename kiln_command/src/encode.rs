// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canonical text forms of setting values on the command line.

use core::fmt::Write as _;

use kiln_formula::Value;
use tracing::warn;

/// Encodes `value` the way the slicing engine parses it.
///
/// Bools are `true`/`false`, numbers are plain literals (integral floats
/// drop their fraction), text is written raw and lists or maps are compact
/// JSON whose numbers follow the same rule. `None` encodes as the empty
/// string.
///
/// ```
/// use kiln_command::encode;
/// use kiln_formula::Value;
///
/// assert_eq!(encode(&Value::Bool(true)), "true");
/// assert_eq!(encode(&Value::Float(200.0)), "200");
/// assert_eq!(encode(&Value::Float(0.15)), "0.15");
/// assert_eq!(encode(&Value::from("grid")), "grid");
/// assert_eq!(
///     encode(&Value::from(vec![Value::Int(1), Value::Float(2.0)])),
///     "[1,2]"
/// );
/// ```
#[must_use]
pub fn encode(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => s.clone(),
        Value::List(_) | Value::Map(_) => {
            let mut out = String::new();
            structured(&mut out, value);
            out
        }
    }
}

fn structured(out: &mut String, value: &Value) {
    match value {
        Value::None => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(x) if x.is_finite() => {
            let _ = write!(out, "{x}");
        }
        Value::Float(x) => {
            warn!(value = %x, "non-finite number encoded as null");
            out.push_str("null");
        }
        Value::Str(s) => string(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                structured(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                string(out, key);
                out.push(':');
                structured(out, item);
            }
            out.push('}');
        }
    }
}

fn string(out: &mut String, s: &str) {
    let _ = write!(out, "{}", serde_json::Value::String(s.to_owned()));
}

/// Encodes a 3x3 matrix as nested JSON arrays, row by row.
pub(crate) fn matrix(rows: &[[f64; 3]; 3]) -> String {
    let mut out = String::from("[");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "[{},{},{}]", row[0], row[1], row[2]);
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars() {
        assert_eq!(encode(&Value::Bool(false)), "false");
        assert_eq!(encode(&Value::Int(-3)), "-3");
        assert_eq!(encode(&Value::Float(0.1)), "0.1");
        assert_eq!(encode(&Value::None), "");
    }

    #[test]
    fn structured_values_are_compact() {
        let polygon = Value::from(vec![
            Value::from(vec![Value::Float(-1.5), Value::Float(2.0)]),
            Value::from(vec![Value::Int(3), Value::Int(4)]),
        ]);
        assert_eq!(encode(&polygon), "[[-1.5,2],[3,4]]");
    }

    #[test]
    fn nested_text_is_quoted() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("name".to_owned(), Value::from("say \"hi\""));
        map.insert("sizes".to_owned(), Value::from(vec![Value::Float(0.4), Value::None]));
        assert_eq!(
            encode(&Value::Map(map)),
            r#"{"name":"say \"hi\"","sizes":[0.4,null]}"#
        );
    }

    #[test]
    fn matrices() {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(matrix(&identity), "[[1,0,0],[0,1,0],[0,0,1]]");
        let rotated = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(matrix(&rotated), "[[0,-1,0],[1,0,0],[0,0,1]]");
    }
}

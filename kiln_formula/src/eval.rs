// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree-walking interpreter over [`Expr`].

use std::collections::BTreeMap;

use tracing::warn;

use crate::ast::{Comprehension, Expr, Lambda};
use crate::error::EvalError;
use crate::library;
use crate::ops;
use crate::scope::Scope;
use crate::value::Value;

pub(crate) fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    Interpreter {
        scope,
        locals: Vec::new(),
    }
    .eval(expr)
}

/// Something that can sit in call position or be passed to `map`.
enum Callee<'e> {
    Lambda(&'e Lambda),
    Library(&'e str),
    Math(&'e str),
}

struct Interpreter<'s> {
    scope: &'s dyn Scope,
    /// Lambda parameters and comprehension variables, innermost last.
    locals: Vec<(String, Value)>,
}

impl Interpreter<'_> {
    fn local(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => {
                if let Some(v) = self.local(name) {
                    return Ok(v.clone());
                }
                self.scope
                    .lookup(name)
                    .ok_or_else(|| EvalError::UndefinedName(name.clone()))
            }
            Expr::Attribute(base, attr) => match &**base {
                Expr::Name(m) if m == "math" && self.local(m).is_none() => {
                    library::math_constant(attr)
                        .ok_or_else(|| EvalError::UnknownAttribute(format!("math.{attr}")))
                }
                _ => Err(EvalError::UnknownAttribute(attr.clone())),
            },
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                ops::unary(*op, &v)
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Compare(first, links) => {
                let mut left = self.eval(first)?;
                for (op, operand) in links {
                    let right = self.eval(operand)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() { self.eval(right) } else { Ok(l) }
            }
            Expr::Or(left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() { Ok(l) } else { self.eval(right) }
            }
            Expr::Conditional {
                then,
                cond,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call(callee, args) => self.call(callee, args),
            Expr::Index(base, key) => {
                let b = self.eval(base)?;
                let k = self.eval(key)?;
                ops::index(&b, &k)
            }
            Expr::List(items) | Expr::Tuple(items) => self.eval_all(items).map(Value::List),
            Expr::Dict(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let k = self.eval(key)?.to_string();
                    let v = self.eval(value)?;
                    map.insert(k, v);
                }
                Ok(Value::Map(map))
            }
            Expr::Comprehension(c) => self.comprehension(c).map(Value::List),
            Expr::Lambda(_) => Err(EvalError::bad_argument(
                "lambda",
                "can only be called or passed to map()",
            )),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn comprehension(&mut self, c: &Comprehension) -> Result<Vec<Value>, EvalError> {
        let items = ops::iterate(&self.eval(&c.iter)?)?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            self.locals.push((c.var.clone(), item));
            let step = self.comprehension_step(c);
            self.locals.pop();
            if let Some(v) = step? {
                out.push(v);
            }
        }
        Ok(out)
    }

    fn comprehension_step(&mut self, c: &Comprehension) -> Result<Option<Value>, EvalError> {
        if let Some(cond) = &c.cond
            && !self.eval(cond)?.is_truthy()
        {
            return Ok(None);
        }
        self.eval(&c.element).map(Some)
    }

    fn callee<'e>(&self, expr: &'e Expr) -> Result<Callee<'e>, EvalError> {
        match expr {
            Expr::Lambda(lambda) => Ok(Callee::Lambda(lambda)),
            Expr::Name(name) if self.local(name).is_none() => Ok(Callee::Library(name)),
            Expr::Attribute(base, attr)
                if matches!(&**base, Expr::Name(m) if m == "math" && self.local(m).is_none()) =>
            {
                Ok(Callee::Math(attr))
            }
            _ => Err(EvalError::NotCallable),
        }
    }

    fn invoke(&mut self, callee: &Callee<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
        match callee {
            Callee::Lambda(lambda) => self.apply(lambda, args),
            Callee::Library(name) => library::call(name, &args),
            Callee::Math(name) => library::call_math(name, &args),
        }
    }

    fn apply(&mut self, lambda: &Lambda, args: Vec<Value>) -> Result<Value, EvalError> {
        if args.len() != lambda.params.len() {
            return Err(EvalError::bad_argument(
                "lambda",
                format!(
                    "takes {} arguments ({} given)",
                    lambda.params.len(),
                    args.len()
                ),
            ));
        }
        let mark = self.locals.len();
        self.locals
            .extend(lambda.params.iter().cloned().zip(args));
        let result = self.eval(&lambda.body);
        self.locals.truncate(mark);
        result
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        if let Expr::Name(name) = callee
            && self.local(name).is_none()
        {
            match name.as_str() {
                "map" => return self.map(args),
                "extruderValue" | "extruderValues" | "resolveOrValue" => {
                    return self.domain(name, args);
                }
                _ => {}
            }
        }
        let callee = self.callee(callee)?;
        let values = self.eval_all(args)?;
        self.invoke(&callee, values)
    }

    fn map(&mut self, args: &[Expr]) -> Result<Value, EvalError> {
        let [function, iterable] = args else {
            return Err(EvalError::bad_argument("map", "takes exactly 2 arguments"));
        };
        let callee = self.callee(function)?;
        let items = ops::iterate(&self.eval(iterable)?)?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.invoke(&callee, vec![item])?);
        }
        Ok(Value::List(out))
    }

    fn setting_name(&mut self, function: &str, arg: &Expr) -> Result<String, EvalError> {
        match self.eval(arg)? {
            Value::Str(name) => Ok(name),
            other => Err(EvalError::bad_argument(
                function,
                format!("expects a setting name, got {}", other.type_name()),
            )),
        }
    }

    /// `extruderValue`, `extruderValues` and `resolveOrValue`.
    ///
    /// A setting the scope does not know reads as `0` with a warning, so one
    /// stale reference does not poison the whole formula.
    fn domain(&mut self, function: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let found = match (function, args) {
            ("extruderValue", [channel, name]) => {
                let channel = self.eval(channel)?;
                let channel = channel.as_i64().ok_or_else(|| {
                    EvalError::bad_argument(
                        function,
                        format!("expects a channel number, got {}", channel.type_name()),
                    )
                })?;
                let name = self.setting_name(function, name)?;
                (self.scope.channel_value(channel, &name), name)
            }
            ("extruderValues", [name]) => {
                let name = self.setting_name(function, name)?;
                (
                    self.scope.channel_values(&name).map(Value::List),
                    name,
                )
            }
            ("resolveOrValue", [name]) => {
                let name = self.setting_name(function, name)?;
                (self.scope.resolved_value(&name), name)
            }
            _ => {
                return Err(EvalError::bad_argument(
                    function,
                    format!("got {} arguments", args.len()),
                ));
            }
        };
        match found {
            (Some(value), _) => Ok(value),
            (None, name) => {
                warn!(setting = %name, function, "reading undefined setting as 0");
                Ok(Value::Int(0))
            }
        }
    }
}

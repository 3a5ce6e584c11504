// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Formulas as stored on setting definitions.

use crate::ast::{Comprehension, Expr};
use crate::error::{EvalError, ParseError};
use crate::eval;
use crate::library;
use crate::parser;
use crate::scope::Scope;
use crate::value::Value;

/// A formula slot on a setting definition.
///
/// Schema documents put either an expression string or a plain literal into
/// formula slots; both are valid, and a literal evaluates to itself.
///
/// Source text is parsed once, up front. A formula that fails to parse is
/// kept (so it can be reported with its source) and fails every evaluation.
///
/// ```
/// use kiln_formula::{Formula, MapScope, Value};
///
/// let formula = Formula::parse("base * 2 if base > 5 else 0");
/// assert_eq!(formula.references(), ["base"]);
///
/// let scope = MapScope::new().with("base", 10);
/// assert_eq!(formula.evaluate(&scope), Ok(Value::Int(20)));
///
/// let literal = Formula::Literal(Value::Float(0.4));
/// assert_eq!(literal.evaluate(&scope), Ok(Value::Float(0.4)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    /// A value that needs no evaluation.
    Literal(Value),
    /// Parsed source text.
    Expression(Expression),
}

/// Source text of a formula together with its parse result.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    compiled: Result<Expr, ParseError>,
}

impl Expression {
    /// The formula as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parse error, if the source did not parse.
    #[must_use]
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.compiled.as_ref().err()
    }
}

impl Formula {
    /// Parses `source`, keeping parse failures inside the formula.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self::Expression(Expression {
            source: source.to_owned(),
            compiled: parser::parse(source),
        })
    }

    /// Parses `source`, returning the parse error instead of keeping it.
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        let compiled = parser::parse(source)?;
        Ok(Self::Expression(Expression {
            source: source.to_owned(),
            compiled: Ok(compiled),
        }))
    }

    /// Builds a formula from a schema document field: strings are
    /// expressions, anything else is a literal.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::String(source) => Self::parse(&source),
            other => Self::Literal(Value::from(other)),
        }
    }

    /// The source text, for expressions.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Expression(e) => Some(e.source()),
        }
    }

    /// Returns `true` for literal formulas.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Evaluates the formula against `scope`.
    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Expression(e) => match &e.compiled {
                Ok(expr) => eval::evaluate(expr, scope),
                Err(err) => Err(EvalError::Parse(err.clone())),
            },
        }
    }

    /// Names of the settings this formula reads, in first-use order.
    ///
    /// Collected from the expression tree: bare names other than locals and
    /// library names, plus the literal setting-name arguments of
    /// `extruderValue`, `extruderValues` and `resolveOrValue`. A name that
    /// merely contains another name (`speed_print` vs `speed`) never counts
    /// as a reference to it.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        if let Self::Expression(Expression {
            compiled: Ok(expr), ..
        }) = self
        {
            let mut locals = Vec::new();
            collect(expr, &mut locals, &mut refs);
        }
        refs
    }
}

fn push_unique(refs: &mut Vec<String>, name: &str) {
    if !refs.iter().any(|r| r == name) {
        refs.push(name.to_owned());
    }
}

fn collect(expr: &Expr, locals: &mut Vec<String>, refs: &mut Vec<String>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Name(name) => {
            if !locals.contains(name) && !library::is_library_name(name) {
                push_unique(refs, name);
            }
        }
        Expr::Attribute(base, _) => collect(base, locals, refs),
        Expr::Unary(_, operand) => collect(operand, locals, refs),
        Expr::Binary(_, left, right) | Expr::And(left, right) | Expr::Or(left, right) => {
            collect(left, locals, refs);
            collect(right, locals, refs);
        }
        Expr::Compare(first, links) => {
            collect(first, locals, refs);
            for (_, operand) in links {
                collect(operand, locals, refs);
            }
        }
        Expr::Conditional {
            then,
            cond,
            otherwise,
        } => {
            collect(cond, locals, refs);
            collect(then, locals, refs);
            collect(otherwise, locals, refs);
        }
        Expr::Call(callee, args) => {
            if let Expr::Name(function) = &**callee
                && library::DOMAIN_FUNCTIONS.contains(&function.as_str())
                && let Some(Expr::Literal(Value::Str(name))) = args.last()
            {
                push_unique(refs, name);
            }
            collect(callee, locals, refs);
            for arg in args {
                collect(arg, locals, refs);
            }
        }
        Expr::Index(base, key) => {
            collect(base, locals, refs);
            collect(key, locals, refs);
        }
        Expr::List(items) | Expr::Tuple(items) => {
            for item in items {
                collect(item, locals, refs);
            }
        }
        Expr::Dict(entries) => {
            for (key, value) in entries {
                collect(key, locals, refs);
                collect(value, locals, refs);
            }
        }
        Expr::Comprehension(c) => {
            let Comprehension {
                element,
                var,
                iter,
                cond,
            } = &**c;
            // The iterable is evaluated outside the comprehension's binding.
            collect(iter, locals, refs);
            locals.push(var.clone());
            if let Some(cond) = cond {
                collect(cond, locals, refs);
            }
            collect(element, locals, refs);
            locals.pop();
        }
        Expr::Lambda(lambda) => {
            let mark = locals.len();
            locals.extend(lambda.params.iter().cloned());
            collect(&lambda.body, locals, refs);
            locals.truncate(mark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn references_skip_locals_and_library_names() {
        let formula = Formula::parse(
            "max(map(lambda x: x * layer_height, [1, 2])) + sum([n for n in wall_counts]) \
             + math.floor(speed_print)",
        );
        assert_eq!(
            formula.references(),
            ["layer_height", "wall_counts", "speed_print"]
        );
    }

    #[test]
    fn references_include_domain_function_arguments() {
        let formula = Formula::parse(
            "extruderValue(support_extruder_nr, 'support_line_width') \
             if support_enable else resolveOrValue('line_width')",
        );
        assert_eq!(
            formula.references(),
            [
                "support_enable",
                "support_line_width",
                "support_extruder_nr",
                "line_width"
            ]
        );
    }

    #[test]
    fn references_match_whole_names_only() {
        let formula = Formula::parse("speed_print / 2");
        assert_eq!(formula.references(), ["speed_print"]);
    }

    #[test]
    fn literals_have_no_references() {
        assert!(Formula::from_json(serde_json::json!(3)).references().is_empty());
        assert!(Formula::from_json(serde_json::json!(3)).is_literal());
    }

    #[test]
    fn parse_failures_surface_on_evaluation() {
        let formula = Formula::parse("1 +");
        let Formula::Expression(expr) = &formula else {
            panic!("expected an expression");
        };
        assert!(expr.parse_error().is_some());
        assert!(matches!(
            formula.evaluate(&crate::MapScope::new()),
            Err(EvalError::Parse(_))
        ));
        assert!(Formula::compile("1 +").is_err());
    }
}

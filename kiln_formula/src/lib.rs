// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln Formula: the small expression language used by setting definitions.
//!
//! Setting definitions compute values, enabled states and bounds from other
//! settings with formulas such as
//!
//! ```text
//! line_width * 2 if wall_line_count > 1 else line_width
//! infill_pattern not in ('concentric', 'cross')
//! max(extruderValues('material_print_temperature'))
//! ```
//!
//! Formulas are parsed once into a closed expression tree and evaluated by a
//! tree-walking interpreter; nothing is ever handed to a general purpose
//! `eval`.
//!
//! ## Language
//!
//! - Literals: integers, floats, strings (adjacent strings concatenate),
//!   `True`/`False`/`None` and lowercase `true`/`false`, lists, tuples and
//!   dicts.
//! - Operators: `+ - * / // % **`, comparisons (chainable) including `in`
//!   and `not in`, `and`/`or`/`not`, and `A if COND else B`.
//! - List comprehensions and generator arguments:
//!   `[x * 2 for x in xs if x > 0]`, `any(x > 0 for x in xs)`.
//! - `lambda` expressions, callable directly or through `map`.
//! - Library: `round` (half to even), `min`, `max`, `int`, `float`, `str`,
//!   `bool`, `abs`, `len`, `sum`, `any`, `all`, `map`, and the `math`
//!   namespace (`pi`, `e`, `floor`, `ceil`, `sqrt`, trigonometry,
//!   `radians`, `degrees`, `log`).
//! - Setting lookups: bare names, `extruderValue(channel, 'name')`,
//!   `extruderValues('name')` and `resolveOrValue('name')`, all answered by a
//!   [`Scope`].
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln_formula::{Formula, MapScope, Value};
//!
//! let scope = MapScope::new()
//!     .with("infill_sparse_density", 20)
//!     .with("infill_line_width", 0.4);
//!
//! let distance = Formula::parse(
//!     "0 if infill_sparse_density == 0 \
//!      else infill_line_width * 100 / infill_sparse_density",
//! );
//! assert_eq!(distance.evaluate(&scope), Ok(Value::Float(2.0)));
//! assert_eq!(
//!     distance.references(),
//!     ["infill_sparse_density", "infill_line_width"]
//! );
//! ```
//!
//! ## Errors
//!
//! [`Formula::evaluate`] returns an [`EvalError`] for any runtime failure
//! (undefined names, type errors, division by zero, parse failures). The
//! settings engine turns these into a logged warning and a value of `0`.

mod ast;
mod error;
mod eval;
mod formula;
mod lexer;
mod library;
mod ops;
mod parser;
mod scope;
mod value;

pub use error::{EvalError, ParseError};
pub use formula::{Expression, Formula};
pub use scope::{MapScope, Scope};
pub use value::Value;

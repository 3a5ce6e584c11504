// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parse and evaluation errors.

use thiserror::Error;

/// A formula could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the source.
        offset: usize,
    },
    /// A string literal without its closing quote.
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },
    /// A numeric literal that does not fit or does not parse.
    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber {
        /// The literal text.
        text: String,
        /// Byte offset into the source.
        offset: usize,
    },
    /// A token that does not fit the grammar at this point.
    #[error("expected {expected}, found {found} at offset {offset}")]
    Unexpected {
        /// What the parser was looking for.
        expected: &'static str,
        /// Description of what it found.
        found: String,
        /// Byte offset into the source.
        offset: usize,
    },
    /// Nesting exceeded the parser's depth limit.
    #[error("expression nested too deeply")]
    TooDeep,
}

/// A formula failed while being evaluated.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    /// The formula itself does not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A bare name that is neither a local nor known to the scope.
    #[error("name `{0}` is not defined")]
    UndefinedName(String),
    /// A call to a function outside the library.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// An attribute other than the `math` namespace members.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// A binary operator applied to operands it does not support.
    #[error("unsupported operand types for {op}: {left} and {right}")]
    UnsupportedOperands {
        /// Operator symbol.
        op: &'static str,
        /// Type of the left operand.
        left: &'static str,
        /// Type of the right operand.
        right: &'static str,
    },
    /// A unary operator applied to an operand it does not support.
    #[error("bad operand type for unary {op}: {operand}")]
    BadOperand {
        /// Operator symbol.
        op: &'static str,
        /// Type of the operand.
        operand: &'static str,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic overflowed.
    #[error("integer overflow")]
    Overflow,
    /// List or string index outside the valid range.
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    /// Map lookup of a missing key.
    #[error("key {0:?} not found")]
    KeyNotFound(String),
    /// A subscript on a value that has no items.
    #[error("{0} is not subscriptable")]
    NotSubscriptable(&'static str),
    /// Iteration over a value that has no items.
    #[error("{0} is not iterable")]
    NotIterable(&'static str),
    /// A call whose callee is not a function.
    #[error("expression is not callable")]
    NotCallable,
    /// A library function received arguments it cannot handle.
    #[error("{function}() {message}")]
    BadArgument {
        /// Function name.
        function: String,
        /// What was wrong.
        message: String,
    },
    /// A math function was called outside its domain.
    #[error("math domain error in {0}()")]
    MathDomain(&'static str),
}

impl EvalError {
    pub(crate) fn bad_argument(function: &str, message: impl Into<String>) -> Self {
        Self::BadArgument {
            function: function.to_owned(),
            message: message.into(),
        }
    }
}

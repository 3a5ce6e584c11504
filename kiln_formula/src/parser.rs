// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive descent parser.
//!
//! Precedence, loosest first:
//!
//! | Level | Forms |
//! |-------|-------|
//! | lambda | `lambda a, b: body` |
//! | conditional | `then if cond else otherwise` |
//! | `or` | short-circuit, yields an operand |
//! | `and` | short-circuit, yields an operand |
//! | `not` | prefix |
//! | comparison | `== != < <= > >= in` `not in`, chainable |
//! | additive | `+ -` |
//! | multiplicative | `* / // %` |
//! | unary | `- +` |
//! | power | `**`, right associative |
//! | postfix | call, index, attribute |
//! | atom | literals, names, `(...)`, `[...]`, `{...}` |

use crate::ast::{BinaryOp, CompareOp, Comprehension, Expr, Lambda, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Punct, Spanned, Token, tokenize};
use crate::value::Value;

const MAX_DEPTH: usize = 96;

const KEYWORDS: &[&str] = &["and", "or", "not", "if", "else", "in", "is", "for", "lambda"];

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::End, |(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map_or(&Token::End, |(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |(_, o)| *o)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: Punct) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Name(n) if n == keyword)
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        let hit = self.at_punct(punct);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let hit = self.at_keyword(keyword);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::Unexpected {
            expected,
            found: self.peek().describe(),
            offset: self.offset(),
        }
    }

    fn expect_punct(&mut self, punct: Punct, expected: &'static str) -> Result<(), ParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: &str, expected: &'static str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if matches!(self.peek(), Token::End) {
            Ok(())
        } else {
            Err(self.unexpected("end of formula"))
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Token::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                let name = n.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(ParseError::TooDeep)
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = if self.eat_keyword("lambda") {
            self.lambda()
        } else {
            self.conditional()
        };
        self.leave();
        result
    }

    fn lambda(&mut self) -> Result<Expr, ParseError> {
        let mut params = Vec::new();
        if !self.at_punct(Punct::Colon) {
            loop {
                params.push(self.identifier()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::Colon, "`:` after lambda parameters")?;
        let body = self.expr()?;
        Ok(Expr::Lambda(Box::new(Lambda { params, body })))
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let then = self.or()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let cond = self.or()?;
        self.expect_keyword("else", "`else`")?;
        let otherwise = self.expr()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            cond: Box::new(cond),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            self.enter()?;
            let operand = self.not();
            self.leave();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand?)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let (op, width) = match self.peek() {
            Token::Punct(Punct::EqEq) => (CompareOp::Eq, 1),
            Token::Punct(Punct::NotEq) => (CompareOp::NotEq, 1),
            Token::Punct(Punct::Lt) => (CompareOp::Lt, 1),
            Token::Punct(Punct::Le) => (CompareOp::Le, 1),
            Token::Punct(Punct::Gt) => (CompareOp::Gt, 1),
            Token::Punct(Punct::Ge) => (CompareOp::Ge, 1),
            Token::Name(n) if n == "in" => (CompareOp::In, 1),
            Token::Name(n) if n == "not" => match self.peek_at(1) {
                Token::Name(next) if next == "in" => (CompareOp::NotIn, 2),
                _ => return None,
            },
            // `is` / `is not` only ever compare against `None` in practice,
            // where identity and equality agree.
            Token::Name(n) if n == "is" => match self.peek_at(1) {
                Token::Name(next) if next == "not" => (CompareOp::NotEq, 2),
                _ => (CompareOp::Eq, 1),
            },
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.additive()?;
        let mut links = Vec::new();
        while let Some(op) = self.compare_op() {
            links.push((op, self.additive()?));
        }
        if links.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), links))
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_punct(Punct::Plus) {
                BinaryOp::Add
            } else if self.eat_punct(Punct::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_punct(Punct::Star) {
                BinaryOp::Mul
            } else if self.eat_punct(Punct::Slash) {
                BinaryOp::Div
            } else if self.eat_punct(Punct::SlashSlash) {
                BinaryOp::FloorDiv
            } else if self.eat_punct(Punct::Percent) {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = if self.eat_punct(Punct::Minus) {
            UnaryOp::Neg
        } else if self.eat_punct(Punct::Plus) {
            UnaryOp::Pos
        } else {
            return self.power();
        };
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand?)))
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if !self.eat_punct(Punct::StarStar) {
            return Ok(base);
        }
        self.enter()?;
        let exponent = self.unary();
        self.leave();
        Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent?)))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_punct(Punct::LParen) {
                let args = self.call_args()?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_punct(Punct::LBracket) {
                let index = self.expr()?;
                self.expect_punct(Punct::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat_punct(Punct::Dot) {
                let attr = self.identifier()?;
                expr = Expr::Attribute(Box::new(expr), attr);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after the opening `(`, consuming the closing `)`.
    ///
    /// A sole generator argument, `any(x > 0 for x in xs)`, becomes one
    /// comprehension argument.
    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat_punct(Punct::RParen) {
            return Ok(args);
        }
        let first = self.expr()?;
        if self.at_keyword("for") {
            let generator = self.comprehension(first)?;
            self.expect_punct(Punct::RParen, "`)` after generator")?;
            return Ok(vec![generator]);
        }
        args.push(first);
        while self.eat_punct(Punct::Comma) {
            if self.at_punct(Punct::RParen) {
                break;
            }
            args.push(self.expr()?);
        }
        self.expect_punct(Punct::RParen, "`,` or `)`")?;
        Ok(args)
    }

    /// Parses `for var in iter [if cond]` after an already parsed element.
    fn comprehension(&mut self, element: Expr) -> Result<Expr, ParseError> {
        self.expect_keyword("for", "`for`")?;
        let var = self.identifier()?;
        self.expect_keyword("in", "`in`")?;
        let iter = self.or()?;
        let cond = if self.eat_keyword("if") {
            Some(self.or()?)
        } else {
            None
        };
        Ok(Expr::Comprehension(Box::new(Comprehension {
            element,
            var,
            iter,
            cond,
        })))
    }

    /// Comma separated items up to `close`, with an optional trailing comma.
    fn items(&mut self, first: Expr, close: Punct) -> Result<(Vec<Expr>, bool), ParseError> {
        let mut items = vec![first];
        let mut trailing_comma = false;
        while self.eat_punct(Punct::Comma) {
            trailing_comma = true;
            if self.at_punct(close) {
                break;
            }
            items.push(self.expr()?);
            trailing_comma = false;
        }
        if !self.eat_punct(close) {
            return Err(self.unexpected(close.symbol()));
        }
        Ok((items, trailing_comma))
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.atom_inner();
        self.leave();
        result
    }

    fn atom_inner(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        match self.bump() {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Str(mut s) => {
                // Adjacent literals concatenate: 'a' 'b' == 'ab'.
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }
            Token::Name(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "None" => Ok(Expr::Literal(Value::None)),
                n if KEYWORDS.contains(&n) => Err(ParseError::Unexpected {
                    expected: "an expression",
                    found: format!("`{n}`"),
                    offset,
                }),
                _ => Ok(Expr::Name(name)),
            },
            Token::Punct(Punct::LParen) => {
                if self.eat_punct(Punct::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expr()?;
                if self.at_keyword("for") {
                    let generator = self.comprehension(first)?;
                    self.expect_punct(Punct::RParen, "`)` after generator")?;
                    return Ok(generator);
                }
                let (mut items, trailing_comma) = self.items(first, Punct::RParen)?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Expr::Tuple(items))
                }
            }
            Token::Punct(Punct::LBracket) => {
                if self.eat_punct(Punct::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.expr()?;
                if self.at_keyword("for") {
                    let comprehension = self.comprehension(first)?;
                    self.expect_punct(Punct::RBracket, "`]` after comprehension")?;
                    return Ok(comprehension);
                }
                let (items, _) = self.items(first, Punct::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Punct(Punct::LBrace) => self.dict(),
            other => Err(ParseError::Unexpected {
                expected: "an expression",
                found: other.describe(),
                offset,
            }),
        }
    }

    fn dict(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        while !self.eat_punct(Punct::RBrace) {
            let key = self.expr()?;
            self.expect_punct(Punct::Colon, "`:` in dict literal")?;
            let value = self.expr()?;
            entries.push((key, value));
            if !self.eat_punct(Punct::Comma) {
                self.expect_punct(Punct::RBrace, "`,` or `}`")?;
                break;
            }
        }
        Ok(Expr::Dict(entries))
    }
}

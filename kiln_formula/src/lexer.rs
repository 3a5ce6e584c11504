// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tokenizer for formula source text.

use crate::error::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Punct(Punct),
    End,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Punct {
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
}

impl Punct {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::StarStar => "**",
            Self::Slash => "/",
            Self::SlashSlash => "//",
            Self::Percent => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Dot => ".",
        }
    }
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Int(i) => format!("number {i}"),
            Self::Float(f) => format!("number {f}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Name(n) => format!("`{n}`"),
            Self::Punct(p) => format!("`{}`", p.symbol()),
            Self::End => "end of formula".to_owned(),
        }
    }
}

/// A token with the byte offset where it starts.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit))
        {
            let (token, end) = number(source, start)?;
            tokens.push((token, start));
            pos = end;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push((Token::Name(source[start..pos].to_owned()), start));
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (text, end) = string(source, start)?;
            tokens.push((Token::Str(text), start));
            pos = end;
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (punct, len) = match (c, next) {
            (b'*', Some(b'*')) => (Punct::StarStar, 2),
            (b'/', Some(b'/')) => (Punct::SlashSlash, 2),
            (b'<', Some(b'=')) => (Punct::Le, 2),
            (b'>', Some(b'=')) => (Punct::Ge, 2),
            (b'=', Some(b'=')) => (Punct::EqEq, 2),
            (b'!', Some(b'=')) => (Punct::NotEq, 2),
            (b'+', _) => (Punct::Plus, 1),
            (b'-', _) => (Punct::Minus, 1),
            (b'*', _) => (Punct::Star, 1),
            (b'/', _) => (Punct::Slash, 1),
            (b'%', _) => (Punct::Percent, 1),
            (b'<', _) => (Punct::Lt, 1),
            (b'>', _) => (Punct::Gt, 1),
            (b'(', _) => (Punct::LParen, 1),
            (b')', _) => (Punct::RParen, 1),
            (b'[', _) => (Punct::LBracket, 1),
            (b']', _) => (Punct::RBracket, 1),
            (b'{', _) => (Punct::LBrace, 1),
            (b'}', _) => (Punct::RBrace, 1),
            (b',', _) => (Punct::Comma, 1),
            (b':', _) => (Punct::Colon, 1),
            (b'.', _) => (Punct::Dot, 1),
            _ => {
                let ch = source[start..].chars().next().unwrap_or('\0');
                return Err(ParseError::UnexpectedChar { ch, offset: start });
            }
        };
        tokens.push((Token::Punct(punct), start));
        pos += len;
    }

    tokens.push((Token::End, source.len()));
    Ok(tokens)
}

fn number(source: &str, start: usize) -> Result<(Token, usize), ParseError> {
    let bytes = source.as_bytes();
    let mut pos = start;
    let mut is_float = false;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        is_float = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            is_float = true;
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text = &source[start..pos];
    let invalid = || ParseError::InvalidNumber {
        text: text.to_owned(),
        offset: start,
    };
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| invalid())?)
    } else {
        Token::Int(text.parse().map_err(|_| invalid())?)
    };
    Ok((token, pos))
}

fn string(source: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = source[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ParseError::UnterminatedString { offset: start });
    };
    let mut out = String::new();

    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            return Ok((out, start + i + ch.len_utf8()));
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' | '\'' | '"' => out.push(escaped),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Err(ParseError::UnterminatedString { offset: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn numbers_and_operators() {
        assert_eq!(
            kinds("2 ** .5 // 1e3"),
            vec![
                Token::Int(2),
                Token::Punct(Punct::StarStar),
                Token::Float(0.5),
                Token::Punct(Punct::SlashSlash),
                Token::Float(1000.0),
                Token::End,
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "two""#),
            vec![
                Token::Str("it's".into()),
                Token::Str("two".into()),
                Token::End
            ]
        );
    }

    #[test]
    fn names_include_underscores_and_digits() {
        assert_eq!(
            kinds("layer_height_0 != x2"),
            vec![
                Token::Name("layer_height_0".into()),
                Token::Punct(Punct::NotEq),
                Token::Name("x2".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn reports_offsets() {
        assert_eq!(
            tokenize("a $ b"),
            Err(ParseError::UnexpectedChar { ch: '$', offset: 2 })
        );
        assert_eq!(
            tokenize("x + 'open"),
            Err(ParseError::UnterminatedString { offset: 4 })
        );
    }
}

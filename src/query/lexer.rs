// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Tokenizer shared by the query language and assertion expressions

use serde_json::{Number, Value};

use super::value::number;
use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `.name` (field access shorthand)
    Field(String),
    /// Bare word: keywords and function names
    Ident(String),
    Str(String),
    /// Integer literals stay exact; others are parsed as f64
    Num(Number),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Pipe,
    Comma,
    Colon,
    Semicolon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `//`
    Alternative,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=~` (expressions only)
    Matches,
    /// `&&` (expressions only)
    AndAnd,
    /// `||` (expressions only)
    OrOr,
    /// `!` (expressions only)
    Bang,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Field(name) => format!("'.{}'", name),
            Token::Ident(name) => format!("'{}'", name),
            Token::Str(s) => format!("string {:?}", s),
            Token::Num(n) => format!("number {}", n),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Pipe => "|",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Question => "?",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Alternative => "//",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Matches => "=~",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Field(_) | Token::Ident(_) | Token::Str(_) | Token::Num(_) | Token::Eof => "",
        }
    }
}

/// A token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split `source` into tokens, always ending with [`Token::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        // Comments run to end of line
        if c == '#' {
            while let Some((_, c)) = chars.next() {
                if c == '\n' {
                    break;
                }
            }
            continue;
        }

        let token = match c {
            '.' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '.')) => {
                        chars.next();
                        Token::DotDot
                    }
                    Some(&(_, c)) if is_ident_start(c) => {
                        let mut name = String::new();
                        while let Some(&(_, c)) = chars.peek() {
                            if is_ident_char(c) {
                                name.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        Token::Field(name)
                    }
                    _ => Token::Dot,
                }
            }
            '"' => {
                chars.next();
                Token::Str(lex_string(&mut chars, offset)?)
            }
            c if c.is_ascii_digit() => Token::Num(lex_number(&mut chars, source, offset)?),
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, c)| c);
                let (token, two_chars) = match (c, next) {
                    ('/', Some('/')) => (Token::Alternative, true),
                    ('=', Some('=')) => (Token::Eq, true),
                    ('=', Some('~')) => (Token::Matches, true),
                    ('!', Some('=')) => (Token::Ne, true),
                    ('<', Some('=')) => (Token::Le, true),
                    ('>', Some('=')) => (Token::Ge, true),
                    ('&', Some('&')) => (Token::AndAnd, true),
                    ('|', Some('|')) => (Token::OrOr, true),
                    ('!', _) => (Token::Bang, false),
                    ('<', _) => (Token::Lt, false),
                    ('>', _) => (Token::Gt, false),
                    ('[', _) => (Token::LBracket, false),
                    (']', _) => (Token::RBracket, false),
                    ('{', _) => (Token::LBrace, false),
                    ('}', _) => (Token::RBrace, false),
                    ('(', _) => (Token::LParen, false),
                    (')', _) => (Token::RParen, false),
                    ('|', _) => (Token::Pipe, false),
                    (',', _) => (Token::Comma, false),
                    (':', _) => (Token::Colon, false),
                    (';', _) => (Token::Semicolon, false),
                    ('?', _) => (Token::Question, false),
                    ('+', _) => (Token::Plus, false),
                    ('-', _) => (Token::Minus, false),
                    ('*', _) => (Token::Star, false),
                    ('/', _) => (Token::Slash, false),
                    ('%', _) => (Token::Percent, false),
                    _ => {
                        return Err(SyntaxError::new(
                            offset,
                            format!("unexpected character '{}'", c),
                        ));
                    }
                };
                if two_chars {
                    chars.next();
                }
                token
            }
        };
        tokens.push(Spanned { token, offset });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    start: usize,
) -> Result<String, SyntaxError> {
    let mut out = String::new();
    loop {
        let Some((offset, c)) = chars.next() else {
            return Err(SyntaxError::new(start, "unterminated string literal"));
        };
        match c {
            '"' => return Ok(out),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    return Err(SyntaxError::new(start, "unterminated string literal"));
                };
                match escaped {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| chars.next().map(|(_, c)| c)).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                SyntaxError::new(offset, format!("invalid unicode escape '\\u{}'", hex))
                            })?;
                        out.push(code);
                    }
                    other => {
                        return Err(SyntaxError::new(
                            offset,
                            format!("invalid escape '\\{}'", other),
                        ));
                    }
                }
            }
            c => out.push(c),
        }
    }
}

fn lex_number(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    source: &str,
    start: usize,
) -> Result<Number, SyntaxError> {
    let mut end = start;
    let mut seen_exponent = false;
    while let Some(&(offset, c)) = chars.peek() {
        let accept = c.is_ascii_digit()
            || (c == '.' && !seen_exponent)
            || ((c == 'e' || c == 'E') && !seen_exponent)
            || ((c == '+' || c == '-') && matches!(source[..offset].chars().last(), Some('e' | 'E')));
        if !accept {
            break;
        }
        if c == 'e' || c == 'E' {
            seen_exponent = true;
        }
        end = offset + c.len_utf8();
        chars.next();
    }
    let text = &source[start..end];
    if let Ok(n) = text.parse::<u64>() {
        return Ok(Number::from(n));
    }
    match text.parse::<f64>().map(number) {
        Ok(Value::Number(n)) => Ok(n),
        _ => Err(SyntaxError::new(start, format!("invalid number '{}'", text))),
    }
}

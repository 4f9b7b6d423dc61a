// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Recursive-descent parser producing the [`Filter`] tree.
//!
//! Precedence, lowest first: `|`, `,`, `//`, `or`, `and`, comparisons,
//! `+ -`, `* / %`, unary minus, postfix (`.a`, `[..]`, `?`).

use serde_json::Value;

use super::builtins::Builtin;
use super::lexer::{Spanned, Token, tokenize};
use super::value::negate;
use crate::error::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Regex match, only produced by assertion expressions
    Matches,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    Name(String),
    Computed(Filter),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Identity,
    RecurseAll,
    Field(Box<Filter>, String),
    Index(Box<Filter>, Box<Filter>),
    Slice(Box<Filter>, Option<Box<Filter>>, Option<Box<Filter>>),
    Iterate(Box<Filter>),
    Literal(Value),
    Array(Option<Box<Filter>>),
    Object(Vec<(ObjectKey, Option<Filter>)>),
    Neg(Box<Filter>),
    Pipe(Box<Filter>, Box<Filter>),
    Comma(Box<Filter>, Box<Filter>),
    Binary(BinOp, Box<Filter>, Box<Filter>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Alternative(Box<Filter>, Box<Filter>),
    If(Box<Filter>, Box<Filter>, Box<Filter>),
    Try(Box<Filter>, Option<Box<Filter>>),
    Call(Builtin, Vec<Filter>),
}

/// Deepest nesting of parentheses, brackets, objects and prefix keywords
const MAX_NESTING: usize = 128;

/// Parse a complete query
pub fn parse(source: &str) -> Result<Filter, SyntaxError> {
    let mut parser = Parser::new(source)?;
    if parser.peek() == &Token::Eof {
        return Ok(Filter::Identity);
    }
    let filter = parser.parse_pipe()?;
    parser.expect_end()?;
    Ok(filter)
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    /// Bare word that stands for `.` (used by assertion expressions)
    identity_alias: Option<&'static str>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, SyntaxError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            depth: 0,
            identity_alias: None,
        })
    }

    pub fn with_identity_alias(mut self, alias: &'static str) -> Self {
        self.identity_alias = Some(alias);
        self
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    pub fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Run a nested parse, failing once nesting gets too deep
    pub fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(
                self.offset(),
                format!("nesting deeper than {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    pub fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    pub fn unexpected(&self) -> SyntaxError {
        SyntaxError::new(
            self.offset(),
            format!("unexpected {}", self.peek().describe()),
        )
    }

    pub fn expect(&mut self, token: Token) -> Result<(), SyntaxError> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::new(
                self.offset(),
                format!("expected {}, found {}", token.describe(), self.peek().describe()),
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(SyntaxError::new(
                self.offset(),
                format!("expected '{}', found {}", keyword, self.peek().describe()),
            ))
        }
    }

    pub fn expect_end(&self) -> Result<(), SyntaxError> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    pub fn parse_pipe(&mut self) -> Result<Filter, SyntaxError> {
        let mut stages = vec![self.parse_comma()?];
        while *self.peek() == Token::Pipe {
            self.advance();
            stages.push(self.parse_comma()?);
        }
        // Pipes associate to the right
        let mut filter = stages.pop().unwrap_or(Filter::Identity);
        while let Some(stage) = stages.pop() {
            filter = Filter::Pipe(Box::new(stage), Box::new(filter));
        }
        Ok(filter)
    }

    fn parse_comma(&mut self) -> Result<Filter, SyntaxError> {
        let mut lhs = self.parse_alternative()?;
        while *self.peek() == Token::Comma {
            self.advance();
            let rhs = self.parse_alternative()?;
            lhs = Filter::Comma(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_alternative(&mut self) -> Result<Filter, SyntaxError> {
        let lhs = self.parse_or()?;
        if *self.peek() == Token::Alternative {
            self.advance();
            let rhs = self.parse_alternative()?;
            return Ok(Filter::Alternative(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Filter, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while self.at_keyword("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Filter::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Filter, SyntaxError> {
        let mut lhs = self.parse_comparison()?;
        while self.at_keyword("and") {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Filter::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Comparison operator at the cursor, if any
    pub fn comparison_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Eq => Some(BinOp::Eq),
            Token::Ne => Some(BinOp::Ne),
            Token::Lt => Some(BinOp::Lt),
            Token::Le => Some(BinOp::Le),
            Token::Gt => Some(BinOp::Gt),
            Token::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Filter, SyntaxError> {
        let lhs = self.parse_additive()?;
        if let Some(op) = self.comparison_op() {
            self.advance();
            let rhs = self.parse_additive()?;
            if self.comparison_op().is_some() {
                return Err(SyntaxError::new(
                    self.offset(),
                    "comparison operators are not associative",
                ));
            }
            return Ok(Filter::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    pub fn parse_additive(&mut self) -> Result<Filter, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Filter::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Filter, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Filter::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Filter, SyntaxError> {
        if *self.peek() == Token::Minus {
            self.advance();
            let operand = self.parse_postfix()?;
            // Fold negative literals so `-1` stays a constant
            if let Filter::Literal(Value::Number(n)) = &operand {
                return Ok(Filter::Literal(negate(n)));
            }
            return Ok(Filter::Neg(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Filter, SyntaxError> {
        let mut term = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Token::Field(name) => {
                    self.advance();
                    term = Filter::Field(Box::new(term), name);
                }
                Token::Dot => match self.peek_at(1).clone() {
                    Token::Str(name) => {
                        self.advance();
                        self.advance();
                        term = Filter::Field(Box::new(term), name);
                    }
                    Token::LBracket => {
                        self.advance();
                        self.advance();
                        term = self.parse_bracket_suffix(term)?;
                    }
                    _ => return Err(self.unexpected()),
                },
                Token::LBracket => {
                    self.advance();
                    term = self.parse_bracket_suffix(term)?;
                }
                Token::Question => {
                    self.advance();
                    term = Filter::Try(Box::new(term), None);
                }
                _ => return Ok(term),
            }
        }
    }

    /// Parse what follows `[`: `]`, `expr]`, `expr:expr]`, `:expr]`, `expr:]`
    fn parse_bracket_suffix(&mut self, term: Filter) -> Result<Filter, SyntaxError> {
        let term = Box::new(term);
        if *self.peek() == Token::RBracket {
            self.advance();
            return Ok(Filter::Iterate(term));
        }
        if *self.peek() == Token::Colon {
            self.advance();
            let to = self.parse_pipe()?;
            self.expect(Token::RBracket)?;
            return Ok(Filter::Slice(term, None, Some(Box::new(to))));
        }
        let index = self.parse_pipe()?;
        if *self.peek() == Token::Colon {
            self.advance();
            let to = if *self.peek() == Token::RBracket {
                None
            } else {
                Some(Box::new(self.parse_pipe()?))
            };
            self.expect(Token::RBracket)?;
            return Ok(Filter::Slice(term, Some(Box::new(index)), to));
        }
        self.expect(Token::RBracket)?;
        Ok(Filter::Index(term, Box::new(index)))
    }

    fn parse_primary(&mut self) -> Result<Filter, SyntaxError> {
        self.nested(Self::primary)
    }

    fn primary(&mut self) -> Result<Filter, SyntaxError> {
        let offset = self.offset();
        match self.peek().clone() {
            Token::Dot => {
                self.advance();
                match self.peek().clone() {
                    Token::Str(name) => {
                        self.advance();
                        Ok(Filter::Field(Box::new(Filter::Identity), name))
                    }
                    Token::LBracket => {
                        self.advance();
                        self.parse_bracket_suffix(Filter::Identity)
                    }
                    _ => Ok(Filter::Identity),
                }
            }
            Token::DotDot => {
                self.advance();
                Ok(Filter::RecurseAll)
            }
            Token::Field(name) => {
                self.advance();
                Ok(Filter::Field(Box::new(Filter::Identity), name))
            }
            Token::Num(n) => {
                self.advance();
                Ok(Filter::Literal(Value::Number(n)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Filter::Literal(Value::String(s)))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_pipe()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                if *self.peek() == Token::RBracket {
                    self.advance();
                    return Ok(Filter::Array(None));
                }
                let inner = self.parse_pipe()?;
                self.expect(Token::RBracket)?;
                Ok(Filter::Array(Some(Box::new(inner))))
            }
            Token::LBrace => {
                self.advance();
                self.parse_object()
            }
            Token::Ident(name) => self.parse_word(&name, offset),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_word(&mut self, name: &str, offset: usize) -> Result<Filter, SyntaxError> {
        if self.identity_alias == Some(name) {
            self.advance();
            return Ok(Filter::Identity);
        }
        match name {
            "true" => {
                self.advance();
                Ok(Filter::Literal(Value::Bool(true)))
            }
            "false" => {
                self.advance();
                Ok(Filter::Literal(Value::Bool(false)))
            }
            "null" => {
                self.advance();
                Ok(Filter::Literal(Value::Null))
            }
            "if" => {
                self.advance();
                self.parse_if()
            }
            "try" => {
                self.advance();
                let body = self.parse_postfix()?;
                let handler = if self.at_keyword("catch") {
                    self.advance();
                    Some(Box::new(self.parse_postfix()?))
                } else {
                    None
                };
                Ok(Filter::Try(Box::new(body), handler))
            }
            "and" | "or" | "then" | "elif" | "else" | "end" | "catch" => Err(self.unexpected()),
            _ => {
                self.advance();
                let mut args = Vec::new();
                if *self.peek() == Token::LParen {
                    self.advance();
                    loop {
                        args.push(self.parse_pipe()?);
                        if *self.peek() == Token::Semicolon {
                            self.advance();
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
                let builtin = Builtin::lookup(name, args.len()).ok_or_else(|| {
                    SyntaxError::new(
                        offset,
                        format!("{}/{} is not defined", name, args.len()),
                    )
                })?;
                Ok(Filter::Call(builtin, args))
            }
        }
    }

    /// After `if`: `cond then a (elif cond then b)* (else c)? end`
    fn parse_if(&mut self) -> Result<Filter, SyntaxError> {
        let condition = self.parse_pipe()?;
        self.expect_keyword("then")?;
        let then_branch = self.parse_pipe()?;
        let else_branch = if self.at_keyword("elif") {
            self.advance();
            return Ok(Filter::If(
                Box::new(condition),
                Box::new(then_branch),
                Box::new(self.parse_if()?),
            ));
        } else if self.at_keyword("else") {
            self.advance();
            self.parse_pipe()?
        } else {
            Filter::Identity
        };
        self.expect_keyword("end")?;
        Ok(Filter::If(
            Box::new(condition),
            Box::new(then_branch),
            Box::new(else_branch),
        ))
    }

    /// After `{`: comma-separated `key: value` pairs; a bare key means `key: .key`
    fn parse_object(&mut self) -> Result<Filter, SyntaxError> {
        let mut entries = Vec::new();
        if *self.peek() == Token::RBrace {
            self.advance();
            return Ok(Filter::Object(entries));
        }
        loop {
            let key = match self.advance() {
                Token::Ident(name) => ObjectKey::Name(name),
                Token::Str(name) => ObjectKey::Name(name),
                Token::LParen => {
                    let key = self.parse_pipe()?;
                    self.expect(Token::RParen)?;
                    ObjectKey::Computed(key)
                }
                other => {
                    return Err(SyntaxError::new(
                        self.offset(),
                        format!("invalid object key {}", other.describe()),
                    ));
                }
            };
            let value = if *self.peek() == Token::Colon {
                self.advance();
                Some(self.parse_object_value()?)
            } else {
                if matches!(key, ObjectKey::Computed(_)) {
                    return Err(SyntaxError::new(
                        self.offset(),
                        "computed object keys need a value",
                    ));
                }
                None
            };
            entries.push((key, value));

            match self.advance() {
                Token::Comma => continue,
                Token::RBrace => return Ok(Filter::Object(entries)),
                other => {
                    return Err(SyntaxError::new(
                        self.offset(),
                        format!("expected ',' or '}}' in object, found {}", other.describe()),
                    ));
                }
            }
        }
    }

    /// Object values bind tighter than `,` so `{a: 1, b: 2}` splits on the comma
    fn parse_object_value(&mut self) -> Result<Filter, SyntaxError> {
        let lhs = self.parse_alternative()?;
        if *self.peek() == Token::Pipe {
            self.advance();
            let rhs = self.parse_object_value()?;
            return Ok(Filter::Pipe(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }
}

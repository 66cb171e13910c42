//! # Condition and Filter Expressions
//!
//! A small RQL subset used for mapper conditions, target filters and source
//! acknowledgement filters:
//!
//! ```text
//! eq(k,v) ne(k,v) gt(k,v) ge(k,v) lt(k,v) le(k,v)
//! in(k,v1,v2,...) like(k,"pat*") exists(k)
//! and(e1,e2,...) or(e1,e2,...) not(e)
//! ```
//!
//! `k` is a placeholder key (`header:x`, `thing:id`) or a JSON path into the
//! signal (`attributes/location`).

use crate::domain::placeholders::ValueResolver;
use crate::error::{ExpressionError, PlaceholderError};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Compare {
        op: CompareOp,
        key: String,
        value: Value,
    },
    In {
        key: String,
        values: Vec<Value>,
    },
    Like {
        key: String,
        pattern: String,
    },
    Exists(String),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let mut parser = Parser::new(input);
        let expression = parser.expression()?;
        parser.skip_whitespace();
        if parser.pos < parser.chars.len() {
            let rest: String = parser.chars[parser.pos..].iter().collect();
            return Err(ExpressionError::TrailingInput(rest));
        }
        Ok(expression)
    }

    /// Evaluate against `resolver`. Missing values never match, except
    /// for `ne` which then holds.
    pub fn evaluate(&self, resolver: &dyn ValueResolver) -> Result<bool, PlaceholderError> {
        Ok(match self {
            Expression::Compare { op, key, value } => match resolver.resolve_value(key)? {
                Some(actual) => compare(*op, &actual, value),
                None => *op == CompareOp::Ne,
            },
            Expression::In { key, values } => resolver
                .resolve_value(key)?
                .map(|actual| values.iter().any(|v| loose_eq(&actual, v)))
                .unwrap_or(false),
            Expression::Like { key, pattern } => resolver
                .resolve_value(key)?
                .and_then(|actual| as_text(&actual))
                .map(|text| glob_match(pattern, &text))
                .unwrap_or(false),
            Expression::Exists(key) => resolver.resolve_value(key)?.is_some(),
            Expression::And(parts) => {
                for part in parts {
                    if !part.evaluate(resolver)? {
                        return Ok(false);
                    }
                }
                true
            }
            Expression::Or(parts) => {
                for part in parts {
                    if part.evaluate(resolver)? {
                        return Ok(true);
                    }
                }
                false
            }
            Expression::Not(inner) => !inner.evaluate(resolver)?,
        })
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// EVALUATION HELPERS
// =============================================================================

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    if matches!(actual, Value::Number(_)) || matches!(expected, Value::Number(_)) {
        return as_number(actual)?.partial_cmp(&as_number(expected)?);
    }
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Equality that lets header strings compare against typed literals.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(_), Value::Number(_)) | (Value::Number(_), Value::String(_)) => {
            ordering(actual, expected) == Some(Ordering::Equal)
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.eq_ignore_ascii_case(&b.to_string())
        }
        _ => false,
    }
}

fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => loose_eq(actual, expected),
        CompareOp::Ne => !loose_eq(actual, expected),
        CompareOp::Gt => ordering(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => ordering(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// `*` matches any sequence, `?` exactly one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

// =============================================================================
// PARSER
// =============================================================================

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, wanted: char) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ExpressionError::UnexpectedChar {
                found,
                position: self.pos,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    /// Bare token up to `,` or `)`.
    fn token(&mut self) -> Result<String, ExpressionError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.chars.len() && !matches!(self.chars[self.pos], ',' | ')' | '(') {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        let token = token.trim().to_string();
        if token.is_empty() {
            return match self.chars.get(self.pos) {
                Some(&found) => Err(ExpressionError::UnexpectedChar {
                    found,
                    position: self.pos,
                }),
                None => Err(ExpressionError::UnexpectedEnd),
            };
        }
        Ok(token)
    }

    fn quoted(&mut self) -> Result<String, ExpressionError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            let c = *self
                .chars
                .get(self.pos)
                .ok_or(ExpressionError::UnexpectedEnd)?;
            self.pos += 1;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = *self
                        .chars
                        .get(self.pos)
                        .ok_or(ExpressionError::UnexpectedEnd)?;
                    self.pos += 1;
                    out.push(escaped);
                }
                other => out.push(other),
            }
        }
    }

    fn value(&mut self) -> Result<Value, ExpressionError> {
        if self.peek() == Some('"') {
            return self.quoted().map(Value::String);
        }
        let token = self.token()?;
        Ok(match token.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => serde_json::from_str::<serde_json::Number>(&token)
                .map(Value::Number)
                .unwrap_or(Value::String(token)),
        })
    }

    fn expression(&mut self) -> Result<Expression, ExpressionError> {
        let operator = self.token()?;
        self.expect('(')?;
        let expression = match operator.as_str() {
            "and" | "or" => {
                let mut parts = vec![self.expression()?];
                while self.peek() == Some(',') {
                    self.pos += 1;
                    parts.push(self.expression()?);
                }
                if operator == "and" {
                    Expression::And(parts)
                } else {
                    Expression::Or(parts)
                }
            }
            "not" => Expression::Not(Box::new(self.expression()?)),
            "exists" => Expression::Exists(self.token()?),
            "eq" | "ne" | "gt" | "ge" | "lt" | "le" => {
                let key = self.token()?;
                self.expect(',')?;
                let value = self.value()?;
                let op = match operator.as_str() {
                    "eq" => CompareOp::Eq,
                    "ne" => CompareOp::Ne,
                    "gt" => CompareOp::Gt,
                    "ge" => CompareOp::Ge,
                    "lt" => CompareOp::Lt,
                    _ => CompareOp::Le,
                };
                Expression::Compare { op, key, value }
            }
            "in" => {
                let key = self.token()?;
                let mut values = Vec::new();
                while self.peek() == Some(',') {
                    self.pos += 1;
                    values.push(self.value()?);
                }
                if values.is_empty() {
                    return Err(ExpressionError::Arity {
                        operator,
                        expected: "at least 2",
                    });
                }
                Expression::In { key, values }
            }
            "like" => {
                let key = self.token()?;
                self.expect(',')?;
                let pattern = match self.value()? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Expression::Like { key, pattern }
            }
            _ => return Err(ExpressionError::UnknownOperator(operator)),
        };
        self.expect(')')?;
        Ok(expression)
    }
}

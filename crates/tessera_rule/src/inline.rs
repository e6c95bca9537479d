//! Inline expressions.
//!
//! Two uses share one syntax of literal text mixed with `${...}` (or
//! `$->{...}`) segments:
//!
//! - **Expansion** of layout expressions such as `ds_${0..1}.t_order_${0..1}`
//!   or `ds_${['a','b']}.t_${[1, 3]}`: every segment is a range or a list,
//!   and the result is the cartesian product of all segments, leftmost
//!   varying slowest. Top-level commas separate alternatives.
//! - **Evaluation** of algorithm expressions such as `t_order_${order_id % 2}`:
//!   every segment is integer arithmetic (`+ - * / %`, parentheses) over
//!   variables bound from sharding values.

use tessera_common::datum::Datum;
use tessera_common::error::{ConfigError, TesseraError, TesseraResult};

fn invalid(expression: &str, reason: impl Into<String>) -> TesseraError {
    ConfigError::InvalidInlineExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
    .into()
}

// ── Segmentation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum RawPart {
    Text(String),
    Segment(String),
}

/// Split on top-level commas (commas outside `${...}`).
fn split_alternatives(expression: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in expression.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    out.push(current);
    out.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn segment(expression: &str) -> TesseraResult<Vec<RawPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let bytes = expression.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let open = if expression[i..].starts_with("${") {
            Some(2)
        } else if expression[i..].starts_with("$->{") {
            Some(4)
        } else {
            None
        };
        match open {
            Some(len) => {
                let body_start = i + len;
                let close = expression[body_start..]
                    .find('}')
                    .ok_or_else(|| invalid(expression, "unterminated '${'"))?;
                if !text.is_empty() {
                    parts.push(RawPart::Text(std::mem::take(&mut text)));
                }
                parts.push(RawPart::Segment(
                    expression[body_start..body_start + close].trim().to_string(),
                ));
                i = body_start + close + 1;
            }
            None => {
                let ch = expression[i..]
                    .chars()
                    .next()
                    .ok_or_else(|| invalid(expression, "invalid utf-8 boundary"))?;
                text.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    if !text.is_empty() {
        parts.push(RawPart::Text(text));
    }
    Ok(parts)
}

// ── Expansion ────────────────────────────────────────────────────────────────

fn expand_segment(expression: &str, body: &str) -> TesseraResult<Vec<String>> {
    if let Some((lo, hi)) = body.split_once("..") {
        let lo: i64 = lo
            .trim()
            .parse()
            .map_err(|_| invalid(expression, format!("range start '{}' is not an integer", lo.trim())))?;
        let hi: i64 = hi
            .trim()
            .parse()
            .map_err(|_| invalid(expression, format!("range end '{}' is not an integer", hi.trim())))?;
        if lo > hi {
            return Err(invalid(expression, format!("empty range {lo}..{hi}")));
        }
        return Ok((lo..=hi).map(|v| v.to_string()).collect());
    }
    if let Some(inner) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        let items: Vec<String> = inner
            .split(',')
            .map(|s| unquote(s.trim()).to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            return Err(invalid(expression, "empty list"));
        }
        return Ok(items);
    }
    let single = unquote(body);
    if single.is_empty() || single.contains(char::is_whitespace) {
        return Err(invalid(
            expression,
            format!("segment '{body}' is neither a range nor a list"),
        ));
    }
    Ok(vec![single.to_string()])
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}

/// Expand a layout expression into every concrete string it denotes,
/// in declaration order.
pub fn expand(expression: &str) -> TesseraResult<Vec<String>> {
    let mut out = Vec::new();
    for alternative in split_alternatives(expression) {
        let mut acc = vec![String::new()];
        for part in segment(&alternative)? {
            let choices = match part {
                RawPart::Text(t) => vec![t],
                RawPart::Segment(body) => expand_segment(expression, &body)?,
            };
            let mut next = Vec::with_capacity(acc.len() * choices.len());
            for prefix in &acc {
                for choice in &choices {
                    next.push(format!("{prefix}{choice}"));
                }
            }
            acc = next;
        }
        out.extend(acc);
    }
    if out.is_empty() {
        return Err(invalid(expression, "expression is empty"));
    }
    Ok(out)
}

// ── Evaluation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Int(i64),
    Var(String),
    Binary(Box<Expr>, char, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(body: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            toks.push(Tok::Int(
                text.parse().map_err(|_| format!("integer '{text}' out of range"))?,
            ));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            toks.push(Tok::Ident(chars[start..i].iter().collect()));
        } else if "+-*/%".contains(c) {
            toks.push(Tok::Op(c));
            i += 1;
        } else if c == '(' {
            toks.push(Tok::LParen);
            i += 1;
        } else if c == ')' {
            toks.push(Tok::RParen);
            i += 1;
        } else {
            return Err(format!("unexpected character '{c}'"));
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    // additive := term (('+' | '-') term)*
    fn additive(&mut self) -> Result<Expr, String> {
        let mut left = self.term()?;
        while let Some(Tok::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // term := atom (('*' | '/' | '%') atom)*
    fn term(&mut self) -> Result<Expr, String> {
        let mut left = self.atom()?;
        while let Some(Tok::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.atom()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Int(v)) => Ok(Expr::Int(v)),
            Some(Tok::Ident(name)) => Ok(Expr::Var(name)),
            Some(Tok::LParen) => {
                let inner = self.additive()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err("missing ')'".into()),
                }
            }
            Some(Tok::Op('-')) => {
                let inner = self.atom()?;
                Ok(Expr::Binary(Box::new(Expr::Int(0)), '-', Box::new(inner)))
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn parse_expr(body: &str) -> Result<Expr, String> {
    let mut parser = Parser {
        toks: tokenize(body)?,
        pos: 0,
    };
    let expr = parser.additive()?;
    if parser.pos != parser.toks.len() {
        return Err(format!("trailing input in '{body}'"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Int(i64),
    Text(String),
}

fn eval(expr: &Expr, lookup: &dyn Fn(&str) -> Option<Datum>) -> Result<EvalValue, String> {
    match expr {
        Expr::Int(v) => Ok(EvalValue::Int(*v)),
        Expr::Var(name) => {
            let datum = lookup(name).ok_or_else(|| format!("no value bound for '{name}'"))?;
            match datum.as_i64() {
                Some(v) => Ok(EvalValue::Int(v)),
                None if datum.is_null() => Err(format!("'{name}' is NULL")),
                None => Ok(EvalValue::Text(datum.to_string())),
            }
        }
        Expr::Binary(l, op, r) => {
            let (EvalValue::Int(a), EvalValue::Int(b)) = (eval(l, lookup)?, eval(r, lookup)?)
            else {
                return Err(format!("operator '{op}' needs integer operands"));
            };
            let v = match op {
                '+' => a.checked_add(b),
                '-' => a.checked_sub(b),
                '*' => a.checked_mul(b),
                '/' => a.checked_div(b),
                '%' => a.checked_rem(b),
                _ => None,
            };
            v.map(EvalValue::Int)
                .ok_or_else(|| format!("arithmetic error evaluating {a} {op} {b}"))
        }
    }
}

fn collect_vars(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Var(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Binary(l, _, r) => {
            collect_vars(l, out);
            collect_vars(r, out);
        }
        Expr::Int(_) => {}
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Expr(Expr),
}

/// A parsed algorithm expression, ready to evaluate per sharding value.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineExpression {
    source: String,
    parts: Vec<Part>,
}

impl InlineExpression {
    pub fn parse(expression: &str) -> TesseraResult<Self> {
        let expression = expression.trim();
        let mut parts = Vec::new();
        for raw in segment(expression)? {
            match raw {
                RawPart::Text(t) => parts.push(Part::Text(t)),
                RawPart::Segment(body) => {
                    parts.push(Part::Expr(parse_expr(&body).map_err(|r| invalid(expression, r))?))
                }
            }
        }
        if !parts.iter().any(|p| matches!(p, Part::Expr(_))) {
            return Err(invalid(expression, "no ${...} segment to evaluate"));
        }
        Ok(Self {
            source: expression.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables referenced by the expression, in first-use order.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        for p in &self.parts {
            if let Part::Expr(e) = p {
                collect_vars(e, &mut out);
            }
        }
        out
    }

    /// Evaluate with variables bound by `lookup`. The error is a reason
    /// string; callers attach the algorithm and value context.
    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<Datum>) -> Result<String, String> {
        let mut out = String::new();
        for p in &self.parts {
            match p {
                Part::Text(t) => out.push_str(t),
                Part::Expr(e) => match eval(e, lookup)? {
                    EvalValue::Int(v) => out.push_str(&v.to_string()),
                    EvalValue::Text(s) => out.push_str(&s),
                },
            }
        }
        Ok(out)
    }
}

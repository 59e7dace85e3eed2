//! `math.evaluate`: a small arithmetic evaluator.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    = term (("+" | "-") term)*
//! term    = power (("*" | "/" | "%") power)*
//! power   = unary ("^" power)?        right-associative
//! unary   = ("+" | "-") unary | primary
//! primary = "(" expr ")" | number
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::types::ToolResult;

pub const MATH_EVALUATE: &str = "math.evaluate";

/// Deepest nesting of parentheses, signs and exponents the parser accepts.
const MAX_DEPTH: usize = 64;

static EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9\s+\-*/%^().]+$").expect("math expression pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
struct MathOutput<'a> {
    expression: &'a str,
    result: f64,
}

/// Run the tool against raw request args. Failures become error results.
pub fn execute(args: &Map<String, Value>) -> ToolResult {
    let expression = match args.get("expression") {
        None => return ToolResult::failed(MATH_EVALUATE, "expression is required"),
        Some(Value::String(expression)) => expression.trim(),
        Some(_) => return ToolResult::failed(MATH_EVALUATE, "expression must be a string"),
    };
    match evaluate(expression) {
        Ok(result) => {
            let output = MathOutput { expression, result };
            match serde_json::to_value(&output) {
                Ok(value) => ToolResult::ok(MATH_EVALUATE, value),
                Err(err) => ToolResult::failed(MATH_EVALUATE, format!("encode result: {err}")),
            }
        }
        Err(message) => ToolResult::failed(MATH_EVALUATE, message),
    }
}

/// Validate and evaluate `expression`.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    validate(expression)?;
    let mut parser = Parser {
        input: expression.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_spaces();
    if parser.has_next() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

fn validate(expression: &str) -> Result<(), String> {
    if expression.is_empty() {
        return Err("expression is empty".to_string());
    }
    if !EXPRESSION_RE.is_match(expression) {
        return Err("expression contains invalid characters".to_string());
    }
    let mut depth = 0i32;
    for ch in expression.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err("expression has unbalanced parentheses".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("expression has unbalanced parentheses".to_string());
    }
    Ok(())
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    /// Run `parse` one nesting level deeper.
    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nesting too deep".to_string());
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut left = self.term()?;
        loop {
            self.skip_spaces();
            if self.eat(b'+') {
                left += self.term()?;
            } else if self.eat(b'-') {
                left -= self.term()?;
            } else {
                return Ok(left);
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut left = self.power()?;
        loop {
            self.skip_spaces();
            if self.eat(b'*') {
                left *= self.power()?;
            } else if self.eat(b'/') {
                let right = self.power()?;
                if right == 0.0 {
                    return Err("division by zero".to_string());
                }
                left /= right;
            } else if self.eat(b'%') {
                let right = self.power()?;
                if right == 0.0 {
                    return Err("modulo by zero".to_string());
                }
                left %= right;
            } else {
                return Ok(left);
            }
        }
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        self.skip_spaces();
        if self.eat(b'^') {
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        self.skip_spaces();
        if self.eat(b'+') {
            return self.nested(Self::unary);
        }
        if self.eat(b'-') {
            return Ok(-self.nested(Self::unary)?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<f64, String> {
        self.skip_spaces();
        if self.eat(b'(') {
            let value = self.nested(Self::expr)?;
            self.skip_spaces();
            if !self.eat(b')') {
                return Err(format!("missing closing parenthesis at position {}", self.pos));
            }
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> Result<f64, String> {
        self.skip_spaces();
        let start = self.pos;
        let mut has_digit = false;
        let mut has_dot = false;
        while let Some(&ch) = self.input.get(self.pos) {
            match ch {
                b'0'..=b'9' => has_digit = true,
                b'.' if has_dot => {
                    return Err(format!("invalid number format at position {}", self.pos));
                }
                b'.' => has_dot = true,
                _ => break,
            }
            self.pos += 1;
        }
        if !has_digit {
            return Err(format!("expected number at position {start}"));
        }
        let raw = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|err| format!("invalid number bytes: {err}"))?;
        raw.parse::<f64>()
            .map_err(|err| format!("invalid number {raw:?}: {err}"))
    }

    fn skip_spaces(&mut self) {
        while self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn has_next(&self) -> bool {
        self.pos < self.input.len()
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.input.get(self.pos) == Some(&expected) {
            self.pos += 1;
            return true;
        }
        false
    }
}

//! Expression expansion and evaluation for `execute_expression`.
//!
//! An expression is first *built*: every `{name}` token is replaced with the
//! live value of the named variable. The expanded text is then *evaluated*
//! as plain arithmetic.
//!
//! ```text
//! "{counter} * 2 + max({a}, {b})"  ──build──▶  "(4) * 2 + max((1), (7))"  ──evaluate──▶  15
//! ```

use crate::error::{FlowvarError, Result};
use crate::store::VariableStore;
use crate::types::{format_number, Value};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// ExpressionEvaluator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// Substitute variable references in `raw` with their live values.
    async fn build_expression(&self, raw: &str) -> Result<String>;

    /// Evaluate an expanded expression to a finite number.
    async fn evaluate(&self, expression: &str) -> Result<f64>;
}

/// Default evaluator: `{name}` references resolved against a store, then
/// arithmetic over `+ - * / % ^`, parentheses, `pi`, `e` and a few functions.
pub struct ArithmeticEvaluator {
    store: Arc<dyn VariableStore>,
}

impl ArithmeticEvaluator {
    pub fn new(store: Arc<dyn VariableStore>) -> Self {
        Self { store }
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("valid regex"))
}

#[async_trait]
impl ExpressionEvaluator for ArithmeticEvaluator {
    async fn build_expression(&self, raw: &str) -> Result<String> {
        let re = reference_re();
        let mut out = String::with_capacity(raw.len());
        let mut last = 0;
        for caps in re.captures_iter(raw) {
            let whole = caps.get(0).expect("group 0 always present");
            let name = caps[1].trim();
            let var = self
                .store
                .get_variable(name)
                .await
                .ok_or_else(|| FlowvarError::Expression(format!("unknown variable '{name}'")))?;
            let number = match &var.value {
                Value::Number(n) => *n,
                Value::Boolean(b) => f64::from(u8::from(*b)),
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
                    FlowvarError::Expression(format!("variable '{name}' is not numeric"))
                })?,
                Value::Trigger(_) => {
                    return Err(FlowvarError::Expression(format!(
                        "variable '{name}' is a trigger"
                    )))
                }
            };
            out.push_str(&raw[last..whole.start()]);
            out.push('(');
            out.push_str(&format_number(number));
            out.push(')');
            last = whole.end();
        }
        out.push_str(&raw[last..]);

        if out.contains('{') || out.contains('}') {
            return Err(FlowvarError::Expression(format!(
                "unbalanced braces in '{raw}'"
            )));
        }
        Ok(out)
    }

    async fn evaluate(&self, expression: &str) -> Result<f64> {
        evaluate(expression)
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent: 1e3, 2.5E-4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| FlowvarError::Expression(format!("bad number '{text}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            other => {
                return Err(FlowvarError::Expression(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Recursive-descent evaluator.
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := unary (('*' | '/' | '%') unary)*
/// unary   := ('+' | '-') unary | power
/// power   := primary ('^' unary)?          right-associative
/// primary := number | ident | ident '(' args ')' | '(' expr ')'
/// ```
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Nesting limit for unary signs, parentheses and call arguments.
const MAX_DEPTH: usize = 256;

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(FlowvarError::Expression(
                "expression nested too deeply".into(),
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: &Token) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == want => Ok(()),
            Some(t) => Err(FlowvarError::Expression(format!(
                "expected {want:?}, found {t:?}"
            ))),
            None => Err(FlowvarError::Expression(format!(
                "expected {want:?}, found end of input"
            ))),
        }
    }

    fn expr(&mut self) -> Result<f64> {
        let mut acc = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64> {
        let mut acc = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                '/' => acc / rhs,
                _ => acc % rhs,
            };
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.nested(Self::unary)?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.nested(Self::expr)?;
                self.expect(&Token::RParen)?;
                Ok(v)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let args = self.nested(Self::args)?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(FlowvarError::Expression(format!("unexpected {t:?}"))),
            None => Err(FlowvarError::Expression("unexpected end of input".into())),
        }
    }

    fn args(&mut self) -> Result<Vec<f64>> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => {
                    return Err(FlowvarError::Expression(
                        "expected ',' or ')' in argument list".into(),
                    ))
                }
            }
        }
    }
}

fn constant(name: &str) -> Result<f64> {
    match name {
        "pi" | "PI" => Ok(std::f64::consts::PI),
        "e" | "E" => Ok(std::f64::consts::E),
        _ => Err(FlowvarError::Expression(format!("unknown symbol '{name}'"))),
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64> {
    let arity = |n: usize| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(FlowvarError::Expression(format!(
                "{name}() takes {n} argument(s), got {}",
                args.len()
            )))
        }
    };
    match name {
        "abs" => arity(1).map(|_| args[0].abs()),
        "ceil" => arity(1).map(|_| args[0].ceil()),
        "floor" => arity(1).map(|_| args[0].floor()),
        "round" => arity(1).map(|_| args[0].round()),
        "sqrt" => arity(1).map(|_| args[0].sqrt()),
        "pow" => arity(2).map(|_| args[0].powf(args[1])),
        "min" | "max" if args.is_empty() => Err(FlowvarError::Expression(format!(
            "{name}() needs at least one argument"
        ))),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        _ => Err(FlowvarError::Expression(format!("unknown function '{name}'"))),
    }
}

/// Evaluate an already-expanded arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(FlowvarError::Expression("empty expression".into()));
    }
    let mut parser = Parser::new(tokens);
    let value = parser.expr()?;
    if let Some(t) = parser.peek() {
        return Err(FlowvarError::Expression(format!("trailing input at {t:?}")));
    }
    if !value.is_finite() {
        return Err(FlowvarError::Expression(format!(
            "'{expression}' did not evaluate to a finite number"
        )));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Variable;

    fn eval(s: &str) -> f64 {
        evaluate(s).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval("-2 ^ 2"), -4.0);
        assert_eq!(eval("7 % 4"), 3.0);
    }

    #[test]
    fn literals_and_constants() {
        assert_eq!(eval("1.5e2"), 150.0);
        assert_eq!(eval(".5 + 0.25"), 0.75);
        assert!((eval("pi") - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn functions() {
        assert_eq!(eval("max(1, 7, 3)"), 7.0);
        assert_eq!(eval("min(4, -2)"), -2.0);
        assert_eq!(eval("round(2.5) + floor(1.9) + ceil(0.1)"), 5.0);
        assert_eq!(eval("sqrt(16) + abs(-1)"), 5.0);
        assert_eq!(eval("pow(2, 10)"), 1024.0);
    }

    #[test]
    fn malformed_expressions_fail() {
        for bad in ["", "1 +", "(1 + 2", "1 2", "foo", "sqrt(1, 2)", "max()", "3 # 4", "1..2"] {
            assert!(evaluate(bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let signs = "-".repeat(20_000) + "1";
        let parens = "(".repeat(200_000);
        let calls = "abs(".repeat(20_000) + "1";
        let powers = "2^".repeat(20_000) + "1";
        for deep in [&signs, &parens, &calls, &powers] {
            let err = evaluate(deep).unwrap_err();
            assert!(err.to_string().contains("nested too deeply"), "{err}");
        }
    }

    #[test]
    fn moderate_nesting_still_evaluates() {
        let expr = "(".repeat(100) + "1 + 1" + &")".repeat(100);
        assert_eq!(eval(&expr), 2.0);
        assert_eq!(eval("--1"), 1.0);
    }

    #[test]
    fn non_finite_results_fail() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
    }

    fn evaluator() -> ArithmeticEvaluator {
        let store = MemoryStore::from_variables([
            Variable::new("counter", Value::Number(4.0)),
            Variable::new("armed", Value::Boolean(true)),
            Variable::new("text_num", Value::String(" 2.5 ".into())),
            Variable::new("label", Value::String("kitchen".into())),
            Variable::new("doorbell", Value::Trigger(String::new())),
        ]);
        ArithmeticEvaluator::new(Arc::new(store))
    }

    #[tokio::test]
    async fn build_substitutes_live_values() {
        let ev = evaluator();
        let built = ev
            .build_expression("{counter} * 2 + { armed } + {text_num}")
            .await
            .unwrap();
        assert_eq!(built, "(4) * 2 + (1) + (2.5)");
        assert_eq!(ev.evaluate(&built).await.unwrap(), 11.5);
    }

    #[tokio::test]
    async fn negative_values_substitute_safely() {
        let store = MemoryStore::from_variables([Variable::new("t", Value::Number(-3.0))]);
        let ev = ArithmeticEvaluator::new(Arc::new(store));
        let built = ev.build_expression("2^{t}").await.unwrap();
        assert_eq!(ev.evaluate(&built).await.unwrap(), 0.125);
    }

    #[tokio::test]
    async fn build_rejects_bad_references() {
        let ev = evaluator();
        assert!(ev.build_expression("{missing} + 1").await.is_err());
        assert!(ev.build_expression("{label} + 1").await.is_err());
        assert!(ev.build_expression("{doorbell}").await.is_err());
        assert!(ev.build_expression("{counter + 1").await.is_err());
    }

    #[tokio::test]
    async fn build_without_references_is_identity() {
        let ev = evaluator();
        assert_eq!(ev.build_expression("1 + 1").await.unwrap(), "1 + 1");
    }
}

//! Per-action coercion rules.
//!
//! Each rule takes the variable as fetched from the store plus the raw action
//! payload and either produces the complete new [`Value`] or rejects. Rules
//! never touch the store, so a rejection can never leave a partial update.

use crate::types::{Value, Variable, VariableType};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Why a rule refused the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The variable's declared type is not the one the action operates on.
    WrongType {
        expected: VariableType,
        actual: VariableType,
    },
    /// The payload is missing or cannot be read as the needed type.
    InvalidValue(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::WrongType { expected, actual } => {
                write!(f, "expected a {expected} variable, found {actual}")
            }
            Rejection::InvalidValue(msg) => f.write_str(msg),
        }
    }
}

pub type Coerced = std::result::Result<Value, Rejection>;

fn require(var: &Variable, expected: VariableType) -> std::result::Result<(), Rejection> {
    if var.kind() == expected {
        Ok(())
    } else {
        Err(Rejection::WrongType {
            expected,
            actual: var.kind(),
        })
    }
}

/// A JSON number, or text holding a complete numeric literal.
fn number_arg(raw: Option<&serde_json::Value>) -> std::result::Result<f64, Rejection> {
    let n = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => {
            return Err(Rejection::InvalidValue(format!("'{other}' is not a number")))
        }
        None => return Err(Rejection::InvalidValue("missing value".into())),
    };
    n.filter(|n| n.is_finite())
        .ok_or_else(|| Rejection::InvalidValue("value is not a finite number".into()))
}

// ---------------------------------------------------------------------------
// Type-specific rules
// ---------------------------------------------------------------------------

pub fn set_string(var: &Variable, raw: Option<&serde_json::Value>) -> Coerced {
    require(var, VariableType::String)?;
    match raw {
        Some(serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
        Some(other) => Err(Rejection::InvalidValue(format!("'{other}' is not text"))),
        None => Err(Rejection::InvalidValue("missing value".into())),
    }
}

pub fn set_number(var: &Variable, raw: Option<&serde_json::Value>) -> Coerced {
    require(var, VariableType::Number)?;
    number_arg(raw).map(Value::Number)
}

pub fn increment(var: &Variable, raw: Option<&serde_json::Value>) -> Coerced {
    require(var, VariableType::Number)?;
    let current = var.value.as_number().unwrap_or_default();
    let delta = number_arg(raw)?;
    finite(current + delta)
}

pub fn decrement(var: &Variable, raw: Option<&serde_json::Value>) -> Coerced {
    require(var, VariableType::Number)?;
    let current = var.value.as_number().unwrap_or_default();
    let delta = number_arg(raw)?;
    finite(current - delta)
}

fn finite(n: f64) -> Coerced {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(Rejection::InvalidValue("result overflows".into()))
    }
}

/// Accepts an already-evaluated expression result for a number variable.
pub fn expression_result(var: &Variable, result: f64) -> Coerced {
    require(var, VariableType::Number)?;
    finite(result)
}

/// `"true"` in any letter case is true; every other text is false.
pub fn set_boolean(var: &Variable, raw: Option<&str>) -> Coerced {
    require(var, VariableType::Boolean)?;
    let text = raw.ok_or_else(|| Rejection::InvalidValue("missing boolean_value".into()))?;
    Ok(Value::Boolean(text.eq_ignore_ascii_case("true")))
}

pub fn flip_boolean(var: &Variable) -> Coerced {
    require(var, VariableType::Boolean)?;
    let current = var.value.as_bool().unwrap_or_default();
    Ok(Value::Boolean(!current))
}

pub fn trigger(var: &Variable, now: DateTime<Utc>) -> Coerced {
    require(var, VariableType::Trigger)?;
    Ok(Value::Trigger(iso_timestamp(now)))
}

/// `2026-10-16T08:30:00.123Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Generic set
// ---------------------------------------------------------------------------

/// `set_a_variable`: the variable's existing type decides how `raw` is read.
pub fn set_any(var: &Variable, raw: Option<&serde_json::Value>) -> Coerced {
    let raw = raw.ok_or_else(|| Rejection::InvalidValue("missing value".into()))?;
    match var.kind() {
        VariableType::Boolean => match raw.as_str() {
            Some("true") => Ok(Value::Boolean(true)),
            Some("false") => Ok(Value::Boolean(false)),
            _ => Err(Rejection::InvalidValue(format!(
                "'{raw}' is neither \"true\" nor \"false\""
            ))),
        },
        VariableType::Number => {
            let parsed = match raw {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => parse_float_prefix(s),
                _ => None,
            };
            parsed
                .map(Value::Number)
                .ok_or_else(|| Rejection::InvalidValue(format!("'{raw}' is not a number")))
        }
        VariableType::String => match raw {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(Rejection::InvalidValue(format!("'{other}' is not text"))),
        },
        VariableType::Trigger => Err(Rejection::InvalidValue(
            "trigger variables cannot be set to a value".into(),
        )),
    }
}

fn float_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("valid regex")
    })
}

/// Lenient float parsing: the longest numeric prefix after leading
/// whitespace (`" 42abc"` is 42). `None` when there is no numeric prefix
/// or the literal overflows.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let m = float_prefix_re().find(trimmed)?;
    m.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(v: f64) -> Variable {
        Variable::new("n", Value::Number(v))
    }

    fn boolean(v: bool) -> Variable {
        Variable::new("b", Value::Boolean(v))
    }

    fn text(v: &str) -> Variable {
        Variable::new("s", Value::String(v.into()))
    }

    fn trig() -> Variable {
        Variable::new("t", Value::Trigger("2020-01-01T00:00:00.000Z".into()))
    }

    #[test]
    fn set_string_copies_input() {
        assert_eq!(
            set_string(&text("old"), Some(&json!("new"))),
            Ok(Value::String("new".into()))
        );
        assert!(set_string(&text("old"), Some(&json!(3))).is_err());
        assert!(set_string(&text("old"), None).is_err());
    }

    #[test]
    fn typed_rules_reject_other_types() {
        let err = set_string(&num(1.0), Some(&json!("x"))).unwrap_err();
        assert_eq!(
            err,
            Rejection::WrongType {
                expected: VariableType::String,
                actual: VariableType::Number
            }
        );
        assert!(set_number(&text("x"), Some(&json!(1))).is_err());
        assert!(flip_boolean(&num(0.0)).is_err());
        assert!(trigger(&boolean(true), Utc::now()).is_err());
    }

    #[test]
    fn set_number_accepts_numbers_and_numeric_text() {
        assert_eq!(set_number(&num(0.0), Some(&json!(4.25))), Ok(Value::Number(4.25)));
        assert_eq!(set_number(&num(0.0), Some(&json!("12"))), Ok(Value::Number(12.0)));
        assert!(set_number(&num(0.0), Some(&json!("12abc"))).is_err());
        assert!(set_number(&num(0.0), Some(&json!(true))).is_err());
    }

    #[test]
    fn increment_and_decrement() {
        assert_eq!(increment(&num(2.0), Some(&json!(3))), Ok(Value::Number(5.0)));
        assert_eq!(decrement(&num(2.0), Some(&json!(3))), Ok(Value::Number(-1.0)));
        assert_eq!(increment(&num(0.1), Some(&json!(0.2))), Ok(Value::Number(0.1 + 0.2)));
        assert!(increment(&num(1.0), None).is_err());
        assert!(increment(&num(f64::MAX), Some(&json!(f64::MAX))).is_err());
    }

    #[test]
    fn set_boolean_is_case_insensitive() {
        for t in ["true", "TRUE", "True", "tRuE"] {
            assert_eq!(set_boolean(&boolean(false), Some(t)), Ok(Value::Boolean(true)));
        }
        for f in ["nope", "false", "", "yes", "1"] {
            assert_eq!(set_boolean(&boolean(true), Some(f)), Ok(Value::Boolean(false)));
        }
        assert!(set_boolean(&boolean(true), None).is_err());
    }

    #[test]
    fn flip_is_an_involution() {
        let start = boolean(true);
        let once = flip_boolean(&start).unwrap();
        let twice = flip_boolean(&Variable::new("b", once.clone())).unwrap();
        assert_eq!(once, Value::Boolean(false));
        assert_eq!(twice, start.value);
    }

    #[test]
    fn trigger_uses_given_time() {
        let at = DateTime::parse_from_rfc3339("2026-10-16T08:30:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            trigger(&trig(), at),
            Ok(Value::Trigger("2026-10-16T08:30:00.123Z".into()))
        );
    }

    #[test]
    fn expression_result_requires_number_variable() {
        assert_eq!(expression_result(&num(0.0), 9.0), Ok(Value::Number(9.0)));
        assert!(expression_result(&boolean(true), 1.0).is_err());
    }

    #[test]
    fn set_any_number() {
        assert_eq!(set_any(&num(0.0), Some(&json!("3.5"))), Ok(Value::Number(3.5)));
        assert_eq!(set_any(&num(0.0), Some(&json!(" 42abc"))), Ok(Value::Number(42.0)));
        assert_eq!(set_any(&num(0.0), Some(&json!(7))), Ok(Value::Number(7.0)));
        assert!(set_any(&num(0.0), Some(&json!("abc"))).is_err());
        assert!(set_any(&num(0.0), Some(&json!(""))).is_err());
    }

    #[test]
    fn set_any_boolean_is_strict() {
        assert_eq!(set_any(&boolean(false), Some(&json!("true"))), Ok(Value::Boolean(true)));
        assert_eq!(set_any(&boolean(true), Some(&json!("false"))), Ok(Value::Boolean(false)));
        assert!(set_any(&boolean(false), Some(&json!("yes"))).is_err());
        assert!(set_any(&boolean(false), Some(&json!("TRUE"))).is_err());
        assert!(set_any(&boolean(false), Some(&json!(true))).is_err());
    }

    #[test]
    fn set_any_string_and_trigger() {
        assert_eq!(
            set_any(&text("a"), Some(&json!("anything at all"))),
            Ok(Value::String("anything at all".into()))
        );
        assert!(set_any(&text("a"), Some(&json!(5))).is_err());
        assert!(set_any(&trig(), Some(&json!("2020"))).is_err());
        assert!(set_any(&text("a"), None).is_err());
    }

    #[test]
    fn float_prefix_parsing() {
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("-.5"), Some(-0.5));
        assert_eq!(parse_float_prefix("  +2."), Some(2.0));
        assert_eq!(parse_float_prefix("Infinity"), None);
        assert_eq!(parse_float_prefix("1e999"), None);
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("e5"), None);
        assert_eq!(parse_float_prefix("."), None);
    }
}

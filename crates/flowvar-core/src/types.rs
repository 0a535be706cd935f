use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// VariableType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Trigger,
}

impl VariableType {
    pub fn all() -> &'static [VariableType] {
        &[
            VariableType::String,
            VariableType::Number,
            VariableType::Boolean,
            VariableType::Trigger,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
            VariableType::Trigger => "trigger",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VariableType {
    type Err = crate::error::FlowvarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(VariableType::String),
            "number" => Ok(VariableType::Number),
            "boolean" => Ok(VariableType::Boolean),
            "trigger" => Ok(VariableType::Trigger),
            _ => Err(crate::error::FlowvarError::InvalidVariableType(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Typed payload of a variable. The variant is the variable's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    /// ISO-8601 timestamp of the last time the trigger fired.
    Trigger(String),
}

impl Value {
    pub fn kind(&self) -> VariableType {
        match self {
            Value::String(_) => VariableType::String,
            Value::Number(_) => VariableType::Number,
            Value::Boolean(_) => VariableType::Boolean,
            Value::Trigger(_) => VariableType::Trigger,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Trigger(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Render integral numbers without a trailing `.0` (`3` rather than `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// A named, typed variable. Serialized flat as `{name, type, value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(flatten)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            last_changed: None,
        }
    }

    pub fn kind(&self) -> VariableType {
        self.value.kind()
    }
}

// ---------------------------------------------------------------------------
// Action arguments
// ---------------------------------------------------------------------------

/// Reference to a variable as chosen in the flow editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableRef {
    #[serde(default)]
    pub name: Option<String>,
}

impl VariableRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Arguments of one action invocation, as delivered by the host.
///
/// Which payload field is read depends on the action kind: `value` for the
/// set/increment/decrement actions, `boolean_value` for `set_boolean_variable`,
/// `expression` for `execute_expression`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionArgs {
    #[serde(default)]
    pub variable: Option<VariableRef>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub boolean_value: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
}

impl ActionArgs {
    pub fn for_variable(name: impl Into<String>) -> Self {
        Self {
            variable: Some(VariableRef::named(name)),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_boolean_value(mut self, text: impl Into<String>) -> Self {
        self.boolean_value = Some(text.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// The referenced variable name, if present and non-empty.
    pub fn variable_name(&self) -> Option<&str> {
        self.variable
            .as_ref()
            .and_then(|v| v.name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_type_parse_and_display() {
        for kind in VariableType::all() {
            let parsed: VariableType = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert!("integer".parse::<VariableType>().is_err());
    }

    #[test]
    fn variable_yaml_is_flat() {
        let var = Variable::new("counter", Value::Number(3.0));
        let yaml = serde_yaml::to_string(&var).unwrap();
        assert!(yaml.contains("name: counter"));
        assert!(yaml.contains("type: number"));
        assert!(yaml.contains("value: 3"));
        assert!(!yaml.contains("last_changed"));
    }

    #[test]
    fn variable_yaml_integer_reads_as_number() {
        let yaml = "name: counter\ntype: number\nvalue: 7\n";
        let var: Variable = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(var.value, Value::Number(7.0));
        assert_eq!(var.kind(), VariableType::Number);
    }

    #[test]
    fn variable_json_boolean() {
        let json = r#"{"name":"lights_on","type":"boolean","value":true}"#;
        let var: Variable = serde_json::from_str(json).unwrap();
        assert_eq!(var.value, Value::Boolean(true));
    }

    #[test]
    fn number_display_drops_trailing_zero() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
        assert_eq!(Value::Number(-2.0).to_string(), "-2");
    }

    #[test]
    fn action_args_variable_name_rejects_empty() {
        assert_eq!(ActionArgs::default().variable_name(), None);
        assert_eq!(ActionArgs::for_variable("").variable_name(), None);
        let args: ActionArgs = serde_json::from_str(r#"{"variable":{}}"#).unwrap();
        assert_eq!(args.variable_name(), None);
        assert_eq!(ActionArgs::for_variable("x").variable_name(), Some("x"));
    }

    #[test]
    fn action_args_from_host_json() {
        let json = r#"{"variable":{"name":"mode"},"boolean_value":"TRUE"}"#;
        let args: ActionArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.variable_name(), Some("mode"));
        assert_eq!(args.boolean_value.as_deref(), Some("TRUE"));
        assert!(args.value.is_none());
    }
}

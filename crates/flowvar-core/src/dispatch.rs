//! Action dispatcher.
//!
//! One handler per [`ActionKind`]. Every handler follows the same protocol:
//!
//! ```text
//! args.variable.name ──▶ store.get_variable ──▶ coerce rule ──▶ store.update_variable
//!        │ absent             │ not found          │ rejected
//!        ▼                    ▼                    ▼
//!      NoOp                 NoOp                 NoOp
//! ```
//!
//! A no-op is not an error: flows keep running when one step's precondition
//! does not hold. Only a failing store update is returned as `Err`.

use crate::autocomplete::filter_variables;
use crate::coerce::{self, Coerced, Rejection};
use crate::error::{FlowvarError, Result};
use crate::expr::{ArithmeticEvaluator, ExpressionEvaluator};
use crate::store::VariableStore;
use crate::types::{ActionArgs, Variable, VariableType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetStringVariable,
    SetNumberVariable,
    IncrementNumberVariable,
    DecrementNumberVariable,
    ExecuteExpression,
    SetBooleanVariable,
    FlipBooleanVariable,
    TriggerVariable,
    SetAVariable,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::SetStringVariable,
            ActionKind::SetNumberVariable,
            ActionKind::IncrementNumberVariable,
            ActionKind::DecrementNumberVariable,
            ActionKind::ExecuteExpression,
            ActionKind::SetBooleanVariable,
            ActionKind::FlipBooleanVariable,
            ActionKind::TriggerVariable,
            ActionKind::SetAVariable,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::SetStringVariable => "set_string_variable",
            ActionKind::SetNumberVariable => "set_number_variable",
            ActionKind::IncrementNumberVariable => "increment_number_variable",
            ActionKind::DecrementNumberVariable => "decrement_number_variable",
            ActionKind::ExecuteExpression => "execute_expression",
            ActionKind::SetBooleanVariable => "set_boolean_variable",
            ActionKind::FlipBooleanVariable => "flip_boolean_variable",
            ActionKind::TriggerVariable => "trigger_variable",
            ActionKind::SetAVariable => "set_a_variable",
        }
    }

    /// Type a variable must have to be offered for this action.
    /// `None` for the generic `set_a_variable`.
    pub fn required_type(self) -> Option<VariableType> {
        match self {
            ActionKind::SetStringVariable => Some(VariableType::String),
            ActionKind::SetNumberVariable
            | ActionKind::IncrementNumberVariable
            | ActionKind::DecrementNumberVariable
            | ActionKind::ExecuteExpression => Some(VariableType::Number),
            ActionKind::SetBooleanVariable | ActionKind::FlipBooleanVariable => {
                Some(VariableType::Boolean)
            }
            ActionKind::TriggerVariable => Some(VariableType::Trigger),
            ActionKind::SetAVariable => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = FlowvarError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ActionKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| FlowvarError::UnknownAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why an invocation left the store untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoOpReason {
    /// No variable name in the arguments.
    MissingReference,
    VariableNotFound {
        name: String,
    },
    TypeMismatch {
        expected: VariableType,
        actual: VariableType,
    },
    InvalidValue {
        message: String,
    },
    /// Expression failed to build or evaluate.
    Evaluation {
        message: String,
    },
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoOpReason::MissingReference => f.write_str("no variable selected"),
            NoOpReason::VariableNotFound { name } => write!(f, "variable '{name}' not found"),
            NoOpReason::TypeMismatch { expected, actual } => {
                write!(f, "expected a {expected} variable, found {actual}")
            }
            NoOpReason::InvalidValue { message } => write!(f, "invalid value: {message}"),
            NoOpReason::Evaluation { message } => write!(f, "expression failed: {message}"),
        }
    }
}

impl From<Rejection> for NoOpReason {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::WrongType { expected, actual } => {
                NoOpReason::TypeMismatch { expected, actual }
            }
            Rejection::InvalidValue(message) => NoOpReason::InvalidValue { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The store acknowledged the write; `variable` is its new state.
    Updated { variable: Variable },
    NoOp { reason: NoOpReason },
}

impl Outcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Outcome::Updated { .. })
    }

    pub fn variable(&self) -> Option<&Variable> {
        match self {
            Outcome::Updated { variable } => Some(variable),
            Outcome::NoOp { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    store: Arc<dyn VariableStore>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    /// Held across lookup → coerce → update so two invocations on the same
    /// name never compute from the same snapshot.
    locks: LockMap,
    log_noops: bool,
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one name's lock; the map entry is dropped once nobody else holds
/// or waits on it.
struct NameGuard<'a> {
    locks: &'a LockMap,
    name: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.name)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.name);
        }
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn VariableStore>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            store,
            evaluator,
            locks: Mutex::new(HashMap::new()),
            log_noops: false,
        }
    }

    /// Dispatcher whose expressions resolve `{name}` against `store` itself.
    pub fn for_store(store: Arc<dyn VariableStore>) -> Self {
        let evaluator = Arc::new(ArithmeticEvaluator::new(store.clone()));
        Self::new(store, evaluator)
    }

    /// Report no-ops at `info` instead of `debug`.
    pub fn with_noop_logging(mut self, enabled: bool) -> Self {
        self.log_noops = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn VariableStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    pub async fn run(&self, kind: ActionKind, args: &ActionArgs) -> Result<Outcome> {
        match kind {
            ActionKind::SetStringVariable => self.set_string_variable(args).await,
            ActionKind::SetNumberVariable => self.set_number_variable(args).await,
            ActionKind::IncrementNumberVariable => self.increment_number_variable(args).await,
            ActionKind::DecrementNumberVariable => self.decrement_number_variable(args).await,
            ActionKind::ExecuteExpression => self.execute_expression(args).await,
            ActionKind::SetBooleanVariable => self.set_boolean_variable(args).await,
            ActionKind::FlipBooleanVariable => self.flip_boolean_variable(args).await,
            ActionKind::TriggerVariable => self.trigger_variable(args).await,
            ActionKind::SetAVariable => self.set_a_variable(args).await,
        }
    }

    /// Variables selectable for `kind` whose name contains `query`.
    pub async fn autocomplete(&self, kind: ActionKind, query: &str) -> Vec<Variable> {
        let variables = self.store.get_variables().await;
        filter_variables(&variables, query, kind.required_type())
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    pub async fn set_string_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::SetStringVariable, args, |var| {
            coerce::set_string(var, args.value.as_ref())
        })
        .await
    }

    pub async fn set_number_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::SetNumberVariable, args, |var| {
            coerce::set_number(var, args.value.as_ref())
        })
        .await
    }

    pub async fn increment_number_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::IncrementNumberVariable, args, |var| {
            coerce::increment(var, args.value.as_ref())
        })
        .await
    }

    pub async fn decrement_number_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::DecrementNumberVariable, args, |var| {
            coerce::decrement(var, args.value.as_ref())
        })
        .await
    }

    pub async fn set_boolean_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::SetBooleanVariable, args, |var| {
            coerce::set_boolean(var, args.boolean_value.as_deref())
        })
        .await
    }

    pub async fn flip_boolean_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::FlipBooleanVariable, args, coerce::flip_boolean)
            .await
    }

    pub async fn trigger_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::TriggerVariable, args, |var| {
            coerce::trigger(var, Utc::now())
        })
        .await
    }

    pub async fn set_a_variable(&self, args: &ActionArgs) -> Result<Outcome> {
        self.apply(ActionKind::SetAVariable, args, |var| {
            coerce::set_any(var, args.value.as_ref())
        })
        .await
    }

    /// Build and evaluate `args.expression`, store the result.
    ///
    /// Any build or evaluation failure is a no-op with an `Evaluation` reason.
    pub async fn execute_expression(&self, args: &ActionArgs) -> Result<Outcome> {
        let kind = ActionKind::ExecuteExpression;
        let Some(name) = args.variable_name() else {
            return Ok(self.no_op(kind, None, NoOpReason::MissingReference));
        };
        let Some(expression) = args.expression.as_deref().filter(|e| !e.trim().is_empty())
        else {
            return Ok(self.no_op(
                kind,
                Some(name),
                NoOpReason::InvalidValue {
                    message: "missing expression".into(),
                },
            ));
        };

        let _guard = self.lock_name(name).await;

        let Some(var) = self.store.get_variable(name).await else {
            return Ok(self.not_found(kind, name));
        };
        if var.kind() != VariableType::Number {
            return Ok(self.no_op(
                kind,
                Some(name),
                NoOpReason::TypeMismatch {
                    expected: VariableType::Number,
                    actual: var.kind(),
                },
            ));
        }

        let result = match self.evaluate(expression).await {
            Ok(n) => n,
            Err(e) => {
                return Ok(self.no_op(
                    kind,
                    Some(name),
                    NoOpReason::Evaluation {
                        message: e.to_string(),
                    },
                ))
            }
        };
        self.finish(kind, &var, coerce::expression_result(&var, result))
            .await
    }

    // -----------------------------------------------------------------------
    // Shared protocol
    // -----------------------------------------------------------------------

    async fn apply<F>(&self, kind: ActionKind, args: &ActionArgs, rule: F) -> Result<Outcome>
    where
        F: FnOnce(&Variable) -> Coerced,
    {
        let Some(name) = args.variable_name() else {
            return Ok(self.no_op(kind, None, NoOpReason::MissingReference));
        };

        let _guard = self.lock_name(name).await;

        let Some(var) = self.store.get_variable(name).await else {
            return Ok(self.not_found(kind, name));
        };
        let coerced = rule(&var);
        self.finish(kind, &var, coerced).await
    }

    async fn finish(&self, kind: ActionKind, var: &Variable, coerced: Coerced) -> Result<Outcome> {
        let value = match coerced {
            Ok(v) => v,
            Err(rejection) => return Ok(self.no_op(kind, Some(&var.name), rejection.into())),
        };
        let updated = self
            .store
            .update_variable(&var.name, value, var.kind())
            .await?;
        tracing::debug!(
            action = %kind,
            name = %updated.name,
            value = %updated.value,
            "variable updated"
        );
        Ok(Outcome::Updated { variable: updated })
    }

    async fn evaluate(&self, expression: &str) -> Result<f64> {
        let built = self.evaluator.build_expression(expression).await?;
        self.evaluator.evaluate(&built).await
    }

    async fn lock_name(&self, name: &str) -> NameGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(name.to_string()).or_default().clone()
        };
        NameGuard {
            locks: &self.locks,
            name: name.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn not_found(&self, kind: ActionKind, name: &str) -> Outcome {
        self.no_op(
            kind,
            Some(name),
            NoOpReason::VariableNotFound {
                name: name.to_string(),
            },
        )
    }

    fn no_op(&self, kind: ActionKind, name: Option<&str>, reason: NoOpReason) -> Outcome {
        let name = name.unwrap_or("");
        if self.log_noops {
            tracing::info!(action = %kind, name, %reason, "action skipped");
        } else {
            tracing::debug!(action = %kind, name, %reason, "action skipped");
        }
        Outcome::NoOp { reason }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

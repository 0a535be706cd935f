use crate::types::VariableType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowvarError {
    #[error("not initialized: run 'flowvar init'")]
    NotInitialized,

    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: VariableType,
        actual: VariableType,
    },

    #[error("invalid variable type: {0}")]
    InvalidVariableType(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("expression error: {0}")]
    Expression(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowvarError>;

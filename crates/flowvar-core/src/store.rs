//! Variable store contract and the in-memory store.
//!
//! The dispatcher only ever talks to [`VariableStore`]. [`MemoryStore`] is the
//! implementation used by the CLI host (backed by a YAML snapshot) and by the
//! tests; a host platform may provide its own.

use crate::error::{FlowvarError, Result};
use crate::types::{Value, Variable, VariableType};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// VariableStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VariableStore: Send + Sync {
    /// Look up a variable by exact name.
    async fn get_variable(&self, name: &str) -> Option<Variable>;

    /// All variables, in insertion order.
    async fn get_variables(&self) -> Vec<Variable>;

    /// Replace the value of an existing variable.
    ///
    /// `kind` must match both the variable's declared type and `value`.
    async fn update_variable(&self, name: &str, value: Value, kind: VariableType)
        -> Result<Variable>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// On-disk form of a store snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    variables: Vec<Variable>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    variables: RwLock<Vec<Variable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `variables`. Later duplicates of a name are dropped.
    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut unique: Vec<Variable> = Vec::new();
        for var in variables {
            if unique.iter().any(|v| v.name == var.name) {
                tracing::warn!(name = %var.name, "duplicate variable ignored");
                continue;
            }
            unique.push(var);
        }
        Self {
            variables: RwLock::new(unique),
        }
    }

    pub async fn snapshot(&self) -> Vec<Variable> {
        self.variables.read().await.clone()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load a YAML snapshot. A missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = if data.trim().is_empty() {
            Snapshot::default()
        } else {
            serde_yaml::from_str(&data)?
        };
        tracing::debug!(
            path = %path.display(),
            count = snapshot.variables.len(),
            "loaded variable snapshot"
        );
        Ok(Self::from_variables(snapshot.variables))
    }

    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            variables: self.snapshot().await,
        };
        let data = serde_yaml::to_string(&snapshot)?;
        crate::io::atomic_write(path, data.as_bytes())
    }
}

#[async_trait]
impl VariableStore for MemoryStore {
    async fn get_variable(&self, name: &str) -> Option<Variable> {
        self.variables
            .read()
            .await
            .iter()
            .find(|v| v.name == name)
            .cloned()
    }

    async fn get_variables(&self) -> Vec<Variable> {
        self.snapshot().await
    }

    async fn update_variable(
        &self,
        name: &str,
        value: Value,
        kind: VariableType,
    ) -> Result<Variable> {
        let mut vars = self.variables.write().await;
        let var = vars
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| FlowvarError::VariableNotFound(name.to_string()))?;

        if var.kind() != kind {
            return Err(FlowvarError::TypeMismatch {
                name: name.to_string(),
                expected: var.kind(),
                actual: kind,
            });
        }
        if value.kind() != kind {
            return Err(FlowvarError::TypeMismatch {
                name: name.to_string(),
                expected: kind,
                actual: value.kind(),
            });
        }

        var.value = value;
        var.last_changed = Some(Utc::now());
        Ok(var.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use crate::error::{FlowvarError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Variable snapshot, relative to the project root unless absolute.
    #[serde(default = "default_store_file")]
    pub file: PathBuf,
}

fn default_store_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_VARIABLES_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file: default_store_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Log skipped actions at `info` rather than `debug`.
    #[serde(default)]
    pub log_noops: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(FlowvarError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load the config, or defaults named after the root directory when
    /// the project has not been initialized.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(FlowvarError::NotInitialized) => {
                tracing::debug!(root = %root.display(), "no config.yaml, using defaults");
                Ok(Self::new(project_name(root)))
            }
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn variables_path(&self, root: &Path) -> PathBuf {
        paths::variables_path(root, &self.store.file)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("unsupported config version {}", self.version),
            });
        }

        if self.project.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "project name is empty".to_string(),
            });
        }

        if self.store.file.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "store.file is empty".to_string(),
            });
        } else if !matches!(
            self.store.file.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "store.file '{}' does not end in .yaml; it is still read as YAML",
                    self.store.file.display()
                ),
            });
        }

        warnings
    }
}

/// Project name derived from the root directory.
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("house");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project, "house");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.store.file, PathBuf::from(".flowvar/variables.yaml"));
        assert!(!parsed.dispatch.log_noops);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("project: house\n").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.store.file, PathBuf::from(paths::DEFAULT_VARIABLES_FILE));
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(FlowvarError::NotInitialized)
        ));
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.project, project_name(dir.path()));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("house");
        cfg.dispatch.log_noops = true;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert!(loaded.dispatch.log_noops);
        assert_eq!(
            loaded.variables_path(dir.path()),
            dir.path().join(".flowvar/variables.yaml")
        );
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::new("house").validate().is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let mut cfg = Config::new(" ");
        cfg.version = 3;
        cfg.store.file = PathBuf::from("vars.json");
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }
}

pub mod actions;
pub mod config;
pub mod init;
pub mod list;
pub mod run;
pub mod search;

use anyhow::Context;
use flowvar_core::{config::Config, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config plus the variable snapshot it points at.
pub(crate) struct Workspace {
    pub config: Config,
    pub variables_path: PathBuf,
    pub store: Arc<MemoryStore>,
}

impl Workspace {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load_or_default(root).context("failed to load config")?;
        let variables_path = config.variables_path(root);
        let store = MemoryStore::load_snapshot(&variables_path)
            .with_context(|| format!("failed to read {}", variables_path.display()))?;
        Ok(Self {
            config,
            variables_path,
            store: Arc::new(store),
        })
    }
}

use anyhow::Context;
use flowvar_core::{
    config::{self, Config},
    io, paths,
};
use std::path::Path;

const EMPTY_VARIABLES: &str = "variables: []\n";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing flowvar in: {}", root.display());

    let dir = paths::flowvar_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let cfg = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config.yaml")?
    } else {
        let cfg = Config::new(config::project_name(root));
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let variables_path = cfg.variables_path(root);
    let created = io::write_if_missing(&variables_path, EMPTY_VARIABLES.as_bytes())
        .with_context(|| format!("failed to write {}", variables_path.display()))?;
    let shown = variables_path
        .strip_prefix(root)
        .unwrap_or(&variables_path)
        .display();
    if created {
        println!("  created: {shown}");
    } else {
        println!("  exists:  {shown}");
    }

    Ok(())
}

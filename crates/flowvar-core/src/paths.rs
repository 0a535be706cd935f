use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FLOWVAR_DIR: &str = ".flowvar";
pub const CONFIG_FILE: &str = ".flowvar/config.yaml";
pub const DEFAULT_VARIABLES_FILE: &str = ".flowvar/variables.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn flowvar_dir(root: &Path) -> PathBuf {
    root.join(FLOWVAR_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve the variable snapshot file. Relative paths are taken from `root`.
pub fn variables_path(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_variables_file_is_joined_to_root() {
        let root = Path::new("/home/flows");
        assert_eq!(
            variables_path(root, Path::new(DEFAULT_VARIABLES_FILE)),
            PathBuf::from("/home/flows/.flowvar/variables.yaml")
        );
    }

    #[test]
    fn absolute_variables_file_is_kept() {
        let root = Path::new("/home/flows");
        assert_eq!(
            variables_path(root, Path::new("/var/lib/vars.yaml")),
            PathBuf::from("/var/lib/vars.yaml")
        );
    }

    #[test]
    fn config_lives_under_flowvar_dir() {
        let root = Path::new("/p");
        assert!(config_path(root).starts_with(flowvar_dir(root)));
    }
}

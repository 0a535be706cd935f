use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `FLOWVAR_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.flowvar/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_flowvar_dir(&cwd).unwrap_or(cwd)
}

fn find_flowvar_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(flowvar_core::paths::FLOWVAR_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_flowvar_dir_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".flowvar")).unwrap();
        let subdir = dir.path().join("flows/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        assert_eq!(find_flowvar_dir(&subdir).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_flowvar_dir_yields_none() {
        let dir = TempDir::new().unwrap();
        let subdir = dir.path().join("a/b");
        std::fs::create_dir_all(&subdir).unwrap();
        // Ancestors above the tempdir are outside our control; only check
        // that nothing inside it matched.
        if let Some(found) = find_flowvar_dir(&subdir) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}

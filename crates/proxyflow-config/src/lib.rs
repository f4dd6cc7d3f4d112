//! Stack file discovery for proxyflow

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a stack file directly
pub const STACK_PATH_ENV: &str = "PROXYFLOW_STACK_PATH";

const CANDIDATES: [&str; 4] = [
    "stack.local.kdl",
    ".stack.local.kdl",
    "stack.kdl",
    ".stack.kdl",
];

/// Find the stack file for the current directory
///
/// Search order:
/// 1. `PROXYFLOW_STACK_PATH`
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `./.proxyflow/`, same order
/// 4. `~/.config/proxyflow/stack.kdl`
pub fn find_stack_file() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    find_stack_file_from(&current_dir)
}

/// Same as [`find_stack_file`], starting from `dir`
pub fn find_stack_file_from(dir: &Path) -> Result<PathBuf> {
    if let Ok(stack_path) = std::env::var(STACK_PATH_ENV)
        && !stack_path.is_empty()
    {
        let path = PathBuf::from(stack_path);
        if !path.is_file() {
            return Err(ConfigError::StackPathMissing(path));
        }
        debug!(path = %path.display(), "Stack file from {}", STACK_PATH_ENV);
        return Ok(path);
    }

    if let Some(path) = first_candidate(dir) {
        return Ok(path);
    }

    let project_dir = dir.join(".proxyflow");
    if project_dir.is_dir()
        && let Some(path) = first_candidate(&project_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("proxyflow").join("stack.kdl");
        if global.is_file() {
            debug!(path = %global.display(), "Using global stack file");
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

fn first_candidate(dir: &Path) -> Option<PathBuf> {
    let found = CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file());
    if let Some(path) = &found {
        debug!(path = %path.display(), "Found stack file");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_stack_file_in_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();

        temp_env::with_var_unset(STACK_PATH_ENV, || {
            let found = find_stack_file_from(temp_dir.path()).unwrap();
            assert!(found.ends_with("stack.kdl"));
        });
    }

    #[test]
    #[serial]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join(".stack.local.kdl"), "// local").unwrap();

        temp_env::with_var_unset(STACK_PATH_ENV, || {
            let found = find_stack_file_from(temp_dir.path()).unwrap();
            assert!(found.ends_with(".stack.local.kdl"));
        });
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".proxyflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("stack.kdl"), "// project").unwrap();

        temp_env::with_var_unset(STACK_PATH_ENV, || {
            let found = find_stack_file_from(temp_dir.path()).unwrap();
            assert!(found.ends_with(".proxyflow/stack.kdl"));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_overrides_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// dir").unwrap();
        let custom = temp_dir.path().join("custom.kdl");
        fs::write(&custom, "// custom").unwrap();

        temp_env::with_var(STACK_PATH_ENV, Some(custom.as_os_str()), || {
            assert_eq!(find_stack_file_from(temp_dir.path()).unwrap(), custom);
        });
    }

    #[test]
    #[serial]
    fn test_env_var_to_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.kdl");

        temp_env::with_var(STACK_PATH_ENV, Some(missing.as_os_str()), || {
            assert!(matches!(
                find_stack_file_from(temp_dir.path()),
                Err(ConfigError::StackPathMissing(_))
            ));
        });
    }

    #[test]
    #[serial]
    fn test_find_from_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(".stack.kdl"), "// hidden").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(STACK_PATH_ENV, find_stack_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".stack.kdl"));
    }
}

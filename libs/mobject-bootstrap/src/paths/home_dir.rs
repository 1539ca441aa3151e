use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Errors for resolving the provider home directory
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("{0} environment variable is not set")]
    EnvMissing(&'static str),
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(target_os = "windows")]
const USER_HOME_VARS: &[&str] = &["USERPROFILE", "HOME"];
#[cfg(not(target_os = "windows"))]
const USER_HOME_VARS: &[&str] = &["HOME"];

#[cfg(target_os = "windows")]
const DEFAULT_BASE_VAR: &str = "APPDATA";
#[cfg(not(target_os = "windows"))]
const DEFAULT_BASE_VAR: &str = "HOME";

fn user_home() -> Result<PathBuf, HomeDirError> {
    USER_HOME_VARS
        .iter()
        .find_map(|var| env::var(var).ok())
        .map(PathBuf::from)
        .ok_or(HomeDirError::EnvMissing(USER_HOME_VARS[0]))
}

/// Expand a leading `~` into the user's home directory.
fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    if raw == "~" {
        return user_home();
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => Ok(user_home()?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}

/// Resolve the directory the provider keeps its logs and backend state in.
///
/// A configured value may start with `~` and must be absolute after expansion.
/// Without a configured value, `<base>/<default_subdir>` is used where `<base>`
/// is `$HOME` (or `%APPDATA%` on Windows). With `create`, the directory is
/// created when missing.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home {
        Some(raw) => {
            let expanded = expand_tilde(&raw)?;
            if !expanded.is_absolute() {
                return Err(HomeDirError::AbsoluteRequired(
                    expanded.to_string_lossy().into(),
                ));
            }
            expanded
        }
        None => {
            let base = env::var(DEFAULT_BASE_VAR)
                .map_err(|_| HomeDirError::EnvMissing(DEFAULT_BASE_VAR))?;
            Path::new(&base).join(default_subdir)
        }
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

#[cfg(test)]
#[cfg(not(target_os = "windows"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_kept() {
        let tmp = tempdir().unwrap();
        let abs_path = tmp.path().join("provider_home");

        let result = resolve_home_dir(
            Some(abs_path.to_string_lossy().to_string()),
            ".mobject",
            false,
        )
        .unwrap();

        assert_eq!(result, abs_path);
        assert!(!result.exists());
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = resolve_home_dir(Some("relative/path".into()), ".mobject", false).unwrap_err();
        match err {
            HomeDirError::AbsoluteRequired(p) => assert_eq!(p, "relative/path"),
            other => panic!("expected AbsoluteRequired, got {other:?}"),
        }
    }

    #[test]
    fn create_flag_creates_directory() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("a").join("b");

        let result =
            resolve_home_dir(Some(target.to_string_lossy().to_string()), ".mobject", true)
                .unwrap();
        assert!(result.is_dir());
        assert_eq!(result, target);
    }

    #[test]
    fn tilde_expands_against_user_home() {
        let home = user_home().unwrap();
        let result = resolve_home_dir(Some("~/mobject-data".into()), ".mobject", false).unwrap();
        assert_eq!(result, home.join("mobject-data"));
        assert!(!result.to_string_lossy().starts_with('~'));
    }
}

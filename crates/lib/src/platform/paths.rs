use std::path::{Path, PathBuf};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").unwrap_or_default();
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").unwrap_or_default();
  PathBuf::from(home)
}

/// Expand a user-supplied path.
///
/// Handles `~` and `~/...` (home directory) and resolves relative paths
/// against `base_dir`. The path is not required to exist.
pub fn expand_path(path_str: &str, base_dir: &Path) -> PathBuf {
  if let Some(rest) = path_str.strip_prefix("~/") {
    home_dir().join(rest)
  } else if path_str == "~" {
    home_dir()
  } else if Path::new(path_str).is_absolute() {
    PathBuf::from(path_str)
  } else {
    base_dir.join(path_str)
  }
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn tilde_expands_to_home() {
    temp_env::with_var("HOME", Some("/home/user"), || {
      assert_eq!(expand_path("~/src/libfoo", Path::new("/unused")), PathBuf::from("/home/user/src/libfoo"));
      assert_eq!(expand_path("~", Path::new("/unused")), PathBuf::from("/home/user"));
    });
  }

  #[test]
  fn relative_paths_join_base_dir() {
    assert_eq!(expand_path("./src", Path::new("/recipes/foo")), PathBuf::from("/recipes/foo/./src"));
    assert_eq!(expand_path("/abs/dir", Path::new("/recipes/foo")), PathBuf::from("/abs/dir"));
  }
}

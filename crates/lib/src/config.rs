//! Environment-driven run configuration.
//!
//! Everything the pipeline reads from the process environment is gathered
//! once by [`RunConfig::from_env`] and passed down explicitly.

use std::path::Path;

use thiserror::Error;

/// Variables whose presence marks a CI environment.
pub const CI_VARS: &[&str] = &["CI", "TRAVIS", "GITHUB_ACTIONS", "BUILDKITE", "GITLAB_CI"];

/// Release repository slug (`owner/name`), with its legacy fallback.
pub const REPOSITORY_VARS: &[&str] = &["AUTOBUILD_REPOSITORY", "TRAVIS_REPO_SLUG"];

/// Release tag, with its legacy fallback.
pub const TAG_VARS: &[&str] = &["AUTOBUILD_TAG", "TRAVIS_TAG"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("reconstructing a manifest needs both a repository and a tag; {0} is not set")]
  MissingReconstructionConfig(String),
}

/// A published release to download from or reconstruct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
  /// `owner/name`
  pub repository: String,
  pub tag: String,
}

impl ReleaseTarget {
  /// Base URL release assets are downloaded from.
  pub fn download_base(&self) -> String {
    format!("https://github.com/{}/releases/download/{}", self.repository, self.tag)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
  /// Running under a CI service.
  pub ci: bool,
  pub repository: Option<String>,
  pub tag: Option<String>,
}

impl RunConfig {
  pub fn from_env() -> Self {
    Self {
      ci: CI_VARS.iter().any(|var| is_truthy(std::env::var(var).ok().as_deref())),
      repository: first_set(REPOSITORY_VARS),
      tag: first_set(TAG_VARS),
    }
  }

  /// The release pair, or [`ConfigError::MissingReconstructionConfig`] naming
  /// the first variable that is missing.
  pub fn release_target(&self) -> Result<ReleaseTarget, ConfigError> {
    let repository = self
      .repository
      .clone()
      .ok_or_else(|| ConfigError::MissingReconstructionConfig(REPOSITORY_VARS[0].to_string()))?;
    let tag = self
      .tag
      .clone()
      .ok_or_else(|| ConfigError::MissingReconstructionConfig(TAG_VARS[0].to_string()))?;
    Ok(ReleaseTarget { repository, tag })
  }

  /// Base URL written into the manifest script.
  ///
  /// With a release pair this is the release download URL; otherwise the
  /// local products directory as a `file://` URL.
  pub fn bin_prefix(&self, products_dir: &Path) -> String {
    match self.release_target() {
      Ok(target) => target.download_base(),
      Err(_) => format!("file://{}", products_dir.display()),
    }
  }
}

fn first_set(vars: &[&str]) -> Option<String> {
  vars
    .iter()
    .filter_map(|var| std::env::var(var).ok())
    .map(|v| v.trim().to_string())
    .find(|v| !v.is_empty())
}

fn is_truthy(value: Option<&str>) -> bool {
  match value.map(str::trim) {
    None | Some("") => false,
    Some(v) => !v.eq_ignore_ascii_case("false") && v != "0",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const CLEAR: [(&str, Option<&str>); 9] = [
    ("CI", None),
    ("TRAVIS", None),
    ("GITHUB_ACTIONS", None),
    ("BUILDKITE", None),
    ("GITLAB_CI", None),
    ("AUTOBUILD_REPOSITORY", None),
    ("TRAVIS_REPO_SLUG", None),
    ("AUTOBUILD_TAG", None),
    ("TRAVIS_TAG", None),
  ];

  fn with_env<F: FnOnce()>(set: &[(&'static str, Option<&'static str>)], f: F) {
    let mut vars: Vec<(&str, Option<&str>)> = CLEAR
      .iter()
      .filter(|(name, _)| !set.iter().any(|(other, _)| other == name))
      .copied()
      .collect();
    vars.extend_from_slice(set);
    temp_env::with_vars(vars, f);
  }

  #[test]
  #[serial]
  fn clean_environment() {
    with_env(&[], || {
      let config = RunConfig::from_env();
      assert_eq!(config, RunConfig::default());
    });
  }

  #[test]
  #[serial]
  fn ci_detection() {
    with_env(&[("GITHUB_ACTIONS", Some("true"))], || {
      assert!(RunConfig::from_env().ci);
    });
    with_env(&[("CI", Some("false"))], || {
      assert!(!RunConfig::from_env().ci);
    });
  }

  #[test]
  #[serial]
  fn release_pair_falls_back_to_travis_names() {
    with_env(
      &[("TRAVIS_REPO_SLUG", Some("org/Zlib_jll")), ("TRAVIS_TAG", Some("v1.2.11"))],
      || {
        let target = RunConfig::from_env().release_target().unwrap();
        assert_eq!(target.repository, "org/Zlib_jll");
        assert_eq!(
          target.download_base(),
          "https://github.com/org/Zlib_jll/releases/download/v1.2.11"
        );
      },
    );
  }

  #[test]
  #[serial]
  fn preferred_names_win_over_fallbacks() {
    with_env(
      &[
        ("AUTOBUILD_REPOSITORY", Some("org/new")),
        ("TRAVIS_REPO_SLUG", Some("org/old")),
      ],
      || {
        assert_eq!(RunConfig::from_env().repository.as_deref(), Some("org/new"));
      },
    );
  }

  #[test]
  #[serial]
  fn half_a_pair_is_missing_config() {
    with_env(&[("AUTOBUILD_REPOSITORY", Some("org/Zlib_jll"))], || {
      let err = RunConfig::from_env().release_target().unwrap_err();
      assert_eq!(err, ConfigError::MissingReconstructionConfig("AUTOBUILD_TAG".to_string()));
    });
  }

  #[test]
  fn bin_prefix_without_release_is_local() {
    let config = RunConfig::default();
    assert_eq!(config.bin_prefix(Path::new("/run/products")), "file:///run/products");
  }
}

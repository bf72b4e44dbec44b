//! GitHub releases over the REST API.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ReleaseAsset, ReleaseClient, ReleaseError};
use crate::consts::APP_NAME;

const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Release {
  #[serde(default)]
  assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
  name: String,
  browser_download_url: String,
}

/// [`ReleaseClient`] for github.com (or a compatible API at another base URL).
#[derive(Debug, Clone)]
pub struct GithubReleases {
  client: Client,
  api_base: String,
}

impl GithubReleases {
  pub fn new() -> Result<Self, ReleaseError> {
    Self::with_api_base(DEFAULT_API_BASE)
  }

  pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, ReleaseError> {
    let client = Client::builder()
      .user_agent(format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| ReleaseError::Client(e.to_string()))?;
    Ok(Self {
      client,
      api_base: api_base.into().trim_end_matches('/').to_string(),
    })
  }
}

#[async_trait]
impl ReleaseClient for GithubReleases {
  async fn list_assets(&self, repository: &str, tag: &str) -> Result<Vec<ReleaseAsset>, ReleaseError> {
    let url = format!("{}/repos/{}/releases/tags/{}", self.api_base, repository, tag);
    let api_err = |message: String| ReleaseError::Api {
      url: url.clone(),
      message,
    };

    info!(url = %url, "listing release assets");
    let response = self
      .client
      .get(&url)
      .header("Accept", "application/vnd.github+json")
      .send()
      .await
      .map_err(|e| api_err(e.to_string()))?;

    if !response.status().is_success() {
      return Err(api_err(format!("HTTP {}", response.status())));
    }

    let release: Release = response.json().await.map_err(|e| api_err(e.to_string()))?;
    debug!(count = release.assets.len(), "release assets listed");

    Ok(
      release
        .assets
        .into_iter()
        .map(|a| ReleaseAsset {
          name: a.name,
          url: a.browser_download_url,
        })
        .collect(),
    )
  }

  async fn download(&self, url: &str, dest: &Path) -> Result<(), ReleaseError> {
    let failure = |message: String| ReleaseError::DownloadFailure {
      url: url.to_string(),
      message,
    };
    let io_err = |source| ReleaseError::Io {
      path: dest.to_path_buf(),
      source,
    };

    debug!(url = %url, dest = %dest.display(), "downloading asset");
    let mut response = self.client.get(url).send().await.map_err(|e| failure(e.to_string()))?;
    if !response.status().is_success() {
      return Err(failure(format!("HTTP {}", response.status())));
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    while let Some(chunk) = response.chunk().await.map_err(|e| failure(e.to_string()))? {
      file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    Ok(())
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::QueryOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

/// Cache windows for one resource, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  pub stale_secs: u64,
  pub evict_secs: u64,
  pub retries: u32,
}

/// A policy as written in the config file. Omitted fields keep the
/// resource's default.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyOverride {
  stale_secs: Option<u64>,
  evict_secs: Option<u64>,
  retries: Option<u32>,
}

impl PolicyOverride {
  fn apply(self, base: CachePolicy) -> CachePolicy {
    CachePolicy {
      stale_secs: self.stale_secs.unwrap_or(base.stale_secs),
      evict_secs: self.evict_secs.unwrap_or(base.evict_secs),
      retries: self.retries.unwrap_or(base.retries),
    }
  }
}

impl CachePolicy {
  const fn new(stale_secs: u64, evict_secs: u64) -> Self {
    Self {
      stale_secs,
      evict_secs,
      retries: 1,
    }
  }

  pub fn options(&self) -> QueryOptions {
    QueryOptions::new(
      Duration::from_secs(self.stale_secs),
      Duration::from_secs(self.evict_secs),
    )
    .with_retry_limit(self.retries)
  }
}

/// Per-resource cache policies. Profile data changes far less often than
/// listing data, so it is kept longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCacheConfig")]
pub struct CacheConfig {
  pub user_listings: CachePolicy,
  pub user_drafts: CachePolicy,
  pub user_profile: CachePolicy,
  /// Public listing pages (active, featured, search)
  pub listings: CachePolicy,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      user_listings: CachePolicy::new(5 * 60, 10 * 60),
      user_drafts: CachePolicy::new(5 * 60, 10 * 60),
      user_profile: CachePolicy::new(30 * 60, 60 * 60),
      listings: CachePolicy::new(60, 5 * 60),
    }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCacheConfig {
  user_listings: PolicyOverride,
  user_drafts: PolicyOverride,
  user_profile: PolicyOverride,
  listings: PolicyOverride,
}

impl From<RawCacheConfig> for CacheConfig {
  fn from(raw: RawCacheConfig) -> Self {
    let defaults = CacheConfig::default();
    Self {
      user_listings: raw.user_listings.apply(defaults.user_listings),
      user_drafts: raw.user_drafts.apply(defaults.user_drafts),
      user_profile: raw.user_profile.apply(defaults.user_profile),
      listings: raw.listings.apply(defaults.listings),
    }
  }
}

impl CacheConfig {
  fn validate(&self) -> Result<()> {
    let policies = [
      ("user_listings", &self.user_listings),
      ("user_drafts", &self.user_drafts),
      ("user_profile", &self.user_profile),
      ("listings", &self.listings),
    ];
    for (name, policy) in policies {
      if policy.evict_secs < policy.stale_secs {
        return Err(eyre!(
          "cache.{}: evict_secs ({}) must not be shorter than stale_secs ({})",
          name,
          policy.evict_secs,
          policy.stale_secs
        ));
      }
    }

    if self.user_profile.stale_secs < self.user_listings.stale_secs {
      return Err(eyre!(
        "cache.user_profile.stale_secs ({}) must be at least cache.user_listings.stale_secs ({})",
        self.user_profile.stale_secs,
        self.user_listings.stale_secs
      ));
    }

    Ok(())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./staydeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/staydeck/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/staydeck/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("staydeck.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("staydeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    self.base_url()?;
    self.cache.validate()
  }

  /// API base URL, normalized to end with `/` so relative paths join under it.
  pub fn base_url(&self) -> Result<Url> {
    let mut raw = self.api.base_url.trim().to_string();
    if !raw.ends_with('/') {
      raw.push('/');
    }

    let url =
      Url::parse(&raw).map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    match url.scheme() {
      "http" | "https" => Ok(url),
      other => Err(eyre!("Unsupported api.base_url scheme '{}'", other)),
    }
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  /// Header title, falling back to the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    self
      .base_url()
      .ok()
      .and_then(|url| url.host_str().map(String::from))
      .unwrap_or_else(|| self.api.base_url.clone())
  }

  /// Get the API access token from environment variables.
  ///
  /// Checks STAYDECK_ACCESS_TOKEN.
  pub fn get_access_token() -> Result<String> {
    std::env::var("STAYDECK_ACCESS_TOKEN").map_err(|_| {
      eyre!("API access token not found. Set the STAYDECK_ACCESS_TOKEN environment variable.")
    })
  }

  /// Get the optional refresh token used to renew an expired access token.
  pub fn get_refresh_token() -> Option<String> {
    std::env::var("STAYDECK_REFRESH_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::api::resource::{CachePolicy, Resource, ResourceEndpoint};
use crate::api::RetryPolicy;

/// Environment variable that overrides `api.base_url`
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  /// View to open on startup: new, requests, report or settings
  pub default_feature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout_secs: u64,
  pub submit: SubmitEndpoint,
  pub resources: ResourcesConfig,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout_secs: 30,
      submit: SubmitEndpoint::default(),
      resources: ResourcesConfig::default(),
    }
  }
}

/// Where new meal requests are sent. The backend contract is not fixed, so
/// both verb and path are configurable.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubmitEndpoint {
  pub method: SubmitMethod,
  pub path: String,
}

impl Default for SubmitEndpoint {
  fn default() -> Self {
    Self {
      method: SubmitMethod::Post,
      path: Resource::Meals.default_path(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmitMethod {
  #[default]
  Post,
  Put,
}

/// Per-resource overrides. Unset fields fall back to the resource defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
  pub departments: ResourceOverride,
  pub employees: ResourceOverride,
  pub meals: ResourceOverride,
  pub users: ResourceOverride,
  pub roles: ResourceOverride,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceOverride {
  pub path: Option<String>,
  pub cache: Option<CachePolicy>,
}

impl ResourcesConfig {
  fn get(&self, resource: Resource) -> &ResourceOverride {
    match resource {
      Resource::Departments => &self.departments,
      Resource::Employees => &self.employees,
      Resource::Meals => &self.meals,
      Resource::Users => &self.users,
      Resource::Roles => &self.roles,
    }
  }

  /// Resolve the effective path and cache policy for a resource.
  pub fn endpoint(&self, resource: Resource) -> ResourceEndpoint {
    let overrides = self.get(resource);
    ResourceEndpoint {
      path: overrides
        .path
        .clone()
        .unwrap_or_else(|| resource.default_path()),
      cache: overrides
        .cache
        .unwrap_or_else(|| resource.default_cache_policy()),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub initial_delay_ms: u64,
  pub max_delay_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay_ms: 200,
      max_delay_ms: 5_000,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts.max(1),
      initial_delay: Duration::from_millis(self.initial_delay_ms),
      max_delay: Duration::from_millis(self.max_delay_ms),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a cached resource is refetched on read
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { stale_secs: 30 }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mealdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mealdesk/config.yaml
  ///
  /// With no file at all the built-in defaults are used.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    let config = config.with_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("mealdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mealdesk").join("config.yaml");
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
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file is a valid "all defaults" config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Apply environment overrides using `lookup` to read variables.
  pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(base_url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
      self.api.base_url = base_url.trim().to_string();
    }
    self
  }

  pub fn validate(&self) -> Result<()> {
    let url = Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "api.base_url must be http or https, got '{}'",
        url.scheme()
      ));
    }
    if self.retry.max_attempts == 0 {
      return Err(eyre!("retry.max_attempts must be at least 1"));
    }
    Ok(())
  }

  /// Header title: explicit title or the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    Url::parse(&self.api.base_url)
      .ok()
      .and_then(|u| {
        let host = u.host_str()?.to_string();
        Some(match u.port() {
          Some(port) => format!("{}:{}", host, port),
          None => host,
        })
      })
      .unwrap_or_else(|| self.api.base_url.clone())
  }

  /// Directory for rolling log files.
  pub fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("mealdesk").join("logs"))
  }
}

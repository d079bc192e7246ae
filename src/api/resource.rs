//! Logical backend resources and their per-resource HTTP caching policy.

use serde::Deserialize;
use std::fmt;

/// A backend-owned collection fetched over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
  Departments,
  Employees,
  Meals,
  Users,
  Roles,
}

impl Resource {
  pub const ALL: [Resource; 5] = [
    Resource::Departments,
    Resource::Employees,
    Resource::Meals,
    Resource::Users,
    Resource::Roles,
  ];

  /// Logical endpoint name, also the default path segment
  pub fn name(self) -> &'static str {
    match self {
      Resource::Departments => "departments",
      Resource::Employees => "employees",
      Resource::Meals => "meals",
      Resource::Users => "users",
      Resource::Roles => "roles",
    }
  }

  pub fn default_path(self) -> String {
    format!("/{}", self.name())
  }

  /// Departments are always fetched fresh; everything else may be served
  /// from an intermediate HTTP cache.
  pub fn default_cache_policy(self) -> CachePolicy {
    match self {
      Resource::Departments => CachePolicy::NoStore,
      _ => CachePolicy::Default,
    }
  }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Effective location and caching policy of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEndpoint {
  pub path: String,
  pub cache: CachePolicy,
}

/// How intermediate HTTP caches may treat a resource request.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
  /// Let the transport and any proxies cache as they see fit
  #[default]
  Default,
  /// Send `Cache-Control: no-store` so every call hits the origin
  NoStore,
}

impl CachePolicy {
  /// Header value to send, if any
  pub fn cache_control(self) -> Option<&'static str> {
    match self {
      CachePolicy::Default => None,
      CachePolicy::NoStore => Some("no-store"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_paths() {
    assert_eq!(Resource::Departments.default_path(), "/departments");
    assert_eq!(Resource::Meals.default_path(), "/meals");
  }

  #[test]
  fn test_only_departments_bypass_cache_by_default() {
    for resource in Resource::ALL {
      let expected = if resource == Resource::Departments {
        CachePolicy::NoStore
      } else {
        CachePolicy::Default
      };
      assert_eq!(resource.default_cache_policy(), expected, "{resource}");
    }
  }

  #[test]
  fn test_cache_policy_from_yaml() {
    let policy: CachePolicy = serde_yaml::from_str("no-store").unwrap();
    assert_eq!(policy, CachePolicy::NoStore);
    assert_eq!(policy.cache_control(), Some("no-store"));
    assert_eq!(CachePolicy::Default.cache_control(), None);
  }
}

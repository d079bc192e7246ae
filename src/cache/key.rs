//! Cache keys.

use crate::api::Resource;

/// Identity of a cached query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// A whole backend collection
  Resource(Resource),
}

impl QueryKey {
  pub fn resource(&self) -> Resource {
    match self {
      Self::Resource(resource) => *resource,
    }
  }

  /// Human-readable description for logs
  pub fn description(&self) -> String {
    match self {
      Self::Resource(resource) => format!("all {}", resource),
    }
  }
}

impl From<Resource> for QueryKey {
  fn from(resource: Resource) -> Self {
    Self::Resource(resource)
  }
}

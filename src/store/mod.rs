//! Scoped request stores.
//!
//! A store holds the private, mutable state of one feature view: a draft, a
//! list selection, a report filter. It is created when its view is mounted and
//! disposed when the view is popped. Anything two views need to share goes
//! through the [`QueryCache`], never through a store.

mod feed;
mod new_request;
mod report_selection;
mod request_list;
mod settings;

pub use new_request::{
  submit_request, DraftError, DraftPatch, MealRequestDraft, NewRequestStore, SubmitStatus,
};
pub use report_selection::{DateFilter, ReportPatch, ReportStore};
pub use request_list::{RequestListPatch, RequestListStore};
pub use settings::{SettingsPatch, SettingsStore};

use feed::ResourceFeed;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ResourceClient;
use crate::cache::QueryCache;

/// Lifetime of a mounted view.
///
/// Every fetch a store starts is bound to the scope's token; disposing the
/// scope (or dropping it) cancels them all.
#[derive(Debug)]
pub struct Scope {
  feature: Feature,
  token: CancellationToken,
}

impl Scope {
  pub fn new(feature: Feature) -> Self {
    debug!(feature = %feature, "scope mounted");
    Self {
      feature,
      token: CancellationToken::new(),
    }
  }

  pub fn feature(&self) -> Feature {
    self.feature
  }

  /// Token for queries started inside this scope.
  pub fn token(&self) -> CancellationToken {
    self.token.child_token()
  }

  pub fn dispose(&self) {
    if !self.token.is_cancelled() {
      debug!(feature = %self.feature, "scope disposed");
      self.token.cancel();
    }
  }

  pub fn is_disposed(&self) -> bool {
    self.token.is_cancelled()
  }
}

impl Drop for Scope {
  fn drop(&mut self) {
    self.dispose();
  }
}

/// State that can be updated with partial changes.
pub trait StoreState: Default {
  type Patch;

  /// Apply a partial change; fields present in the patch overwrite.
  fn merge(&mut self, patch: Self::Patch);
}

/// Private state container bound to a [`Scope`].
#[derive(Debug)]
pub struct Store<S: StoreState> {
  state: S,
  scope: Scope,
}

impl<S: StoreState> Store<S> {
  pub fn new(feature: Feature) -> Self {
    Self {
      state: S::default(),
      scope: Scope::new(feature),
    }
  }

  pub fn get_state(&self) -> &S {
    &self.state
  }

  /// Merge a partial change. Last write wins; disposed stores ignore updates.
  pub fn update(&mut self, patch: S::Patch) {
    if self.scope.is_disposed() {
      return;
    }
    self.state.merge(patch);
  }

  pub fn scope(&self) -> &Scope {
    &self.scope
  }

  pub fn dispose(&self) {
    self.scope.dispose();
  }

  pub fn is_disposed(&self) -> bool {
    self.scope.is_disposed()
  }
}

/// Move a list selection by `delta`, wrapping at both ends.
pub(crate) fn step_selection(current: Option<usize>, len: usize, delta: isize) -> Option<usize> {
  if len == 0 {
    return None;
  }
  let Some(current) = current else {
    return Some(if delta < 0 { len - 1 } else { 0 });
  };
  let next = (current as isize + delta).rem_euclid(len as isize);
  Some(next as usize)
}

/// Keep a selection inside a list that may have shrunk.
pub(crate) fn clamp_selection(current: Option<usize>, len: usize) -> Option<usize> {
  match current {
    _ if len == 0 => None,
    Some(i) if i >= len => Some(len - 1),
    other => other,
  }
}

/// Collaborators every store is constructed with.
#[derive(Clone)]
pub struct StoreDeps {
  pub cache: QueryCache,
}

impl StoreDeps {
  pub fn new(cache: QueryCache) -> Self {
    Self { cache }
  }

  pub fn client(&self) -> Arc<dyn ResourceClient> {
    Arc::clone(self.cache.client())
  }
}

/// The feature views a store can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
  NewRequest,
  Requests,
  Report,
  Settings,
}

impl Feature {
  pub const ALL: [Feature; 4] = [
    Feature::NewRequest,
    Feature::Requests,
    Feature::Report,
    Feature::Settings,
  ];

  /// Command name used to open the feature
  pub fn name(self) -> &'static str {
    match self {
      Feature::NewRequest => "new",
      Feature::Requests => "requests",
      Feature::Report => "report",
      Feature::Settings => "settings",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Feature::NewRequest => "New Request",
      Feature::Requests => "Requests",
      Feature::Report => "Report",
      Feature::Settings => "Users",
    }
  }
}

impl fmt::Display for Feature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Feature {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim().to_lowercase();
    Feature::ALL
      .into_iter()
      .find(|f| f.name() == s)
      .ok_or_else(|| format!("unknown feature '{}'", s))
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::time::Duration;

  /// Keep calling `check` (typically a store poll) until it holds.
  pub(crate) async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
      if check() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
  }

  #[derive(Debug, Default)]
  struct Counter {
    value: i32,
    label: String,
  }

  #[derive(Default)]
  struct CounterPatch {
    value: Option<i32>,
    label: Option<String>,
  }

  impl StoreState for Counter {
    type Patch = CounterPatch;

    fn merge(&mut self, patch: CounterPatch) {
      if let Some(value) = patch.value {
        self.value = value;
      }
      if let Some(label) = patch.label {
        self.label = label;
      }
    }
  }

  #[test]
  fn test_update_merges_partial_changes() {
    let mut store: Store<Counter> = Store::new(Feature::Requests);
    store.update(CounterPatch {
      value: Some(1),
      label: Some("first".into()),
    });
    store.update(CounterPatch {
      value: Some(2),
      ..Default::default()
    });

    assert_eq!(store.get_state().value, 2);
    assert_eq!(store.get_state().label, "first");
  }

  #[test]
  fn test_disposed_store_ignores_updates() {
    let mut store: Store<Counter> = Store::new(Feature::Requests);
    store.dispose();
    store.update(CounterPatch {
      value: Some(5),
      ..Default::default()
    });

    assert!(store.is_disposed());
    assert_eq!(store.get_state().value, 0);
  }

  #[test]
  fn test_dropping_scope_cancels_its_tokens() {
    let scope = Scope::new(Feature::Report);
    let token = scope.token();
    assert!(!token.is_cancelled());

    drop(scope);
    assert!(token.is_cancelled());
  }

  #[test]
  fn test_scopes_are_isolated() {
    let first = Scope::new(Feature::Report);
    let second = Scope::new(Feature::Report);
    first.dispose();

    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert!(!second.token().is_cancelled());
  }

  #[test]
  fn test_step_selection_wraps() {
    assert_eq!(step_selection(None, 0, 1), None);
    assert_eq!(step_selection(None, 3, 1), Some(0));
    assert_eq!(step_selection(None, 3, -1), Some(2));
    assert_eq!(step_selection(Some(2), 3, 1), Some(0));
    assert_eq!(step_selection(Some(0), 3, -1), Some(2));
  }

  #[test]
  fn test_clamp_selection() {
    assert_eq!(clamp_selection(Some(5), 2), Some(1));
    assert_eq!(clamp_selection(Some(1), 0), None);
    assert_eq!(clamp_selection(None, 4), None);
    assert_eq!(clamp_selection(Some(0), 4), Some(0));
  }

  #[test]
  fn test_feature_from_str() {
    assert_eq!("report".parse::<Feature>(), Ok(Feature::Report));
    assert_eq!(" New ".parse::<Feature>(), Ok(Feature::NewRequest));
    assert!("nope".parse::<Feature>().is_err());
  }
}

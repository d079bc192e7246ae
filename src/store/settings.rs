//! Users and their roles.

use super::{clamp_selection, step_selection, Feature, Store, StoreDeps, StoreState};
use crate::api::types::{Role, User};
use crate::api::{ApiError, Resource};
use crate::query::Query;

#[derive(Debug, Default)]
pub struct SettingsState {
  pub users: Vec<User>,
  /// Every role the backend knows about
  pub roles: Vec<Role>,
  /// Index into [`SettingsState::visible_users`]
  pub selected: Option<usize>,
  pub show_inactive: bool,
}

impl SettingsState {
  pub fn visible_users(&self) -> Vec<&User> {
    self
      .users
      .iter()
      .filter(|u| self.show_inactive || u.active)
      .collect()
  }

  pub fn selected_user(&self) -> Option<&User> {
    self
      .selected
      .and_then(|i| self.visible_users().get(i).copied())
  }

  /// The role catalog with a flag for each role `user` holds.
  ///
  /// Roles on the user that the catalog does not list are appended so they
  /// are never hidden.
  pub fn roles_of<'a>(&'a self, user: &'a User) -> Vec<(&'a Role, bool)> {
    let mut rows: Vec<(&Role, bool)> = self
      .roles
      .iter()
      .map(|role| (role, user.roles.iter().any(|r| r.id == role.id)))
      .collect();
    for role in &user.roles {
      if !self.roles.iter().any(|r| r.id == role.id) {
        rows.push((role, true));
      }
    }
    rows
  }
}

#[derive(Debug, Default)]
pub struct SettingsPatch {
  pub users: Option<Vec<User>>,
  pub roles: Option<Vec<Role>>,
  pub selected: Option<usize>,
  pub show_inactive: Option<bool>,
}

impl StoreState for SettingsState {
  type Patch = SettingsPatch;

  fn merge(&mut self, patch: SettingsPatch) {
    if let Some(mut users) = patch.users {
      users.sort_by(|a, b| a.username.cmp(&b.username));
      self.users = users;
    }
    if let Some(roles) = patch.roles {
      self.roles = roles;
    }
    if let Some(show_inactive) = patch.show_inactive {
      self.show_inactive = show_inactive;
    }
    if let Some(selected) = patch.selected {
      self.selected = Some(selected);
    }
    self.selected = clamp_selection(self.selected, self.visible_users().len());
  }
}

/// Store behind the users view
pub struct SettingsStore {
  store: Store<SettingsState>,
  deps: StoreDeps,
  users: Query<Vec<User>>,
  roles: Query<Vec<Role>>,
}

impl SettingsStore {
  pub fn new(deps: StoreDeps) -> Self {
    let store = Store::new(Feature::Settings);

    let cache = deps.cache.clone();
    let users = Query::new(move || {
      let cache = cache.clone();
      async move { cache.read_as(Resource::Users.into()).await }
    })
    .with_cancel(store.scope().token());

    let cache = deps.cache.clone();
    let roles = Query::new(move || {
      let cache = cache.clone();
      async move { cache.read_as(Resource::Roles.into()).await }
    })
    .with_cancel(store.scope().token());

    Self {
      store,
      deps,
      users,
      roles,
    }
  }

  pub fn load(&mut self) {
    self.users.fetch();
    self.roles.fetch();
  }

  pub fn refresh(&mut self) {
    self.deps.cache.invalidate(Resource::Users.into());
    self.deps.cache.invalidate(Resource::Roles.into());
    self.users.refetch();
    self.roles.refetch();
  }

  /// Apply finished fetches. Returns `true` if anything changed.
  pub fn poll(&mut self) -> bool {
    if self.store.is_disposed() {
      return false;
    }

    let mut patch = SettingsPatch::default();
    let users_changed = self.users.poll();
    if users_changed {
      patch.users = self.users.data().cloned();
    }
    let roles_changed = self.roles.poll();
    if roles_changed {
      patch.roles = self.roles.data().cloned();
    }

    if users_changed || roles_changed {
      self.store.update(patch);
      return true;
    }
    false
  }

  pub fn get_state(&self) -> &SettingsState {
    self.store.get_state()
  }

  pub fn update(&mut self, patch: SettingsPatch) {
    self.store.update(patch);
  }

  pub fn selected_user(&self) -> Option<&User> {
    self.get_state().selected_user()
  }

  pub fn is_loading(&self) -> bool {
    self.users.is_loading() || self.roles.is_loading()
  }

  /// First failure among the two fetches
  pub fn error(&self) -> Option<&ApiError> {
    self.users.error().or_else(|| self.roles.error())
  }

  pub fn toggle_inactive(&mut self) {
    let show = !self.get_state().show_inactive;
    self.update(SettingsPatch {
      show_inactive: Some(show),
      ..SettingsPatch::default()
    });
  }

  pub fn select_next(&mut self) {
    self.step(1);
  }

  pub fn select_prev(&mut self) {
    self.step(-1);
  }

  fn step(&mut self, delta: isize) {
    let state = self.get_state();
    if let Some(selected) = step_selection(state.selected, state.visible_users().len(), delta) {
      self.update(SettingsPatch {
        selected: Some(selected),
        ..SettingsPatch::default()
      });
    }
  }

  pub fn dispose(&self) {
    self.store.dispose();
  }
}

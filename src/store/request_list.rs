//! Submitted meal requests with a selection and a text filter.

use super::{
  clamp_selection, step_selection, Feature, ResourceFeed, Store, StoreDeps, StoreState,
};
use crate::api::types::Meal;
use crate::api::{ApiError, Resource};

#[derive(Debug, Default)]
pub struct RequestListState {
  /// Newest first
  pub meals: Vec<Meal>,
  /// Index into the filtered list
  pub selected: Option<usize>,
  pub filter: String,
}

#[derive(Debug, Default)]
pub struct RequestListPatch {
  pub meals: Option<Vec<Meal>>,
  pub selected: Option<usize>,
  pub filter: Option<String>,
}

impl RequestListState {
  /// Meals matching the filter on employee, department, type or date.
  pub fn visible(&self) -> Vec<&Meal> {
    let needle = self.filter.trim().to_lowercase();
    self
      .meals
      .iter()
      .filter(|m| {
        needle.is_empty()
          || [&m.employee, &m.department, &m.meal_type, &m.date]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
      })
      .collect()
  }

  pub fn selected_meal(&self) -> Option<&Meal> {
    self.selected.and_then(|i| self.visible().get(i).copied())
  }
}

impl StoreState for RequestListState {
  type Patch = RequestListPatch;

  fn merge(&mut self, patch: RequestListPatch) {
    if let Some(mut meals) = patch.meals {
      meals.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
      self.meals = meals;
    }
    if let Some(filter) = patch.filter {
      self.filter = filter;
    }
    if let Some(selected) = patch.selected {
      self.selected = Some(selected);
    }
    self.selected = clamp_selection(self.selected, self.visible().len());
  }
}

/// Store behind the request list view
pub struct RequestListStore {
  store: Store<RequestListState>,
  meals: ResourceFeed<Meal>,
}

impl RequestListStore {
  pub fn new(deps: StoreDeps) -> Self {
    let store = Store::new(Feature::Requests);
    let meals = ResourceFeed::new(&deps.cache, Resource::Meals.into(), store.scope().token());
    Self { store, meals }
  }

  pub fn load(&mut self) {
    self.meals.load();
  }

  /// Drop the shared cached list and fetch it again.
  pub fn refresh(&mut self) {
    self.meals.refresh();
  }

  /// Apply a finished fetch. Returns `true` if anything changed.
  ///
  /// The list also reloads on its own once the shared meals entry is
  /// invalidated, for instance by a submit in another view.
  pub fn poll(&mut self) -> bool {
    if self.store.is_disposed() || !self.meals.poll() {
      return false;
    }
    if let Some(meals) = self.meals.records() {
      let meals = meals.to_vec();
      self.store.update(RequestListPatch {
        meals: Some(meals),
        ..RequestListPatch::default()
      });
    }
    true
  }

  pub fn get_state(&self) -> &RequestListState {
    self.store.get_state()
  }

  pub fn update(&mut self, patch: RequestListPatch) {
    self.store.update(patch);
  }

  pub fn is_loading(&self) -> bool {
    self.meals.is_loading()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.meals.error()
  }

  pub fn select_next(&mut self) {
    self.step(1);
  }

  pub fn select_prev(&mut self) {
    self.step(-1);
  }

  fn step(&mut self, delta: isize) {
    let state = self.get_state();
    if let Some(selected) = step_selection(state.selected, state.visible().len(), delta) {
      self.update(RequestListPatch {
        selected: Some(selected),
        ..RequestListPatch::default()
      });
    }
  }

  pub fn set_filter(&mut self, filter: &str) {
    self.update(RequestListPatch {
      filter: Some(filter.to_string()),
      ..RequestListPatch::default()
    });
  }

  pub fn dispose(&self) {
    self.store.dispose();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeClient;
  use crate::api::types::{MealType, NewMealRequest};
  use crate::api::ResourceClient;
  use crate::cache::QueryCache;
  use crate::store::submit_request;
  use crate::store::tests::eventually;
  use chrono::NaiveDate;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  fn meals() -> serde_json::Value {
    json!([
      { "id": 1, "employee": "ana", "department": "Finance", "type": "lunch", "date": "2024-05-01" },
      { "id": 2, "employee": "bo", "department": "IT", "type": "dinner", "date": "2024-05-03" },
      { "id": 3, "employee": "cy", "department": "IT", "type": "lunch", "date": "2024-05-03" }
    ])
  }

  fn setup(client: FakeClient) -> (Arc<FakeClient>, RequestListStore) {
    let client = Arc::new(client);
    let cache = QueryCache::new(Arc::clone(&client) as Arc<dyn ResourceClient>);
    (client, RequestListStore::new(StoreDeps::new(cache)))
  }

  async fn loaded(store: &mut RequestListStore) {
    store.load();
    eventually(|| store.poll()).await;
  }

  #[tokio::test]
  async fn test_load_sorts_newest_first() {
    let (_, mut store) = setup(FakeClient::new().with(Resource::Meals, meals()));
    loaded(&mut store).await;

    let ids: Vec<u64> = store.get_state().meals.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert!(store.error().is_none());
  }

  #[tokio::test]
  async fn test_filter_and_selection() {
    let (_, mut store) = setup(FakeClient::new().with(Resource::Meals, meals()));
    loaded(&mut store).await;

    store.select_next();
    store.select_next();
    assert_eq!(store.get_state().selected_meal().map(|m| m.id), Some(2));

    // Narrowing the filter keeps the selection in range
    store.set_filter("finance");
    let state = store.get_state();
    assert_eq!(state.visible().len(), 1);
    assert_eq!(state.selected, Some(0));
    assert_eq!(state.selected_meal().map(|m| m.employee.as_str()), Some("ana"));

    store.set_filter("nobody");
    assert_eq!(store.get_state().selected, None);
  }

  #[tokio::test]
  async fn test_selection_wraps() {
    let (_, mut store) = setup(FakeClient::new().with(Resource::Meals, meals()));
    loaded(&mut store).await;

    store.select_prev();
    assert_eq!(store.get_state().selected, Some(2));
    store.select_next();
    assert_eq!(store.get_state().selected, Some(0));
  }

  #[tokio::test]
  async fn test_refresh_bypasses_cache() {
    let (client, mut store) = setup(FakeClient::new().with(Resource::Meals, meals()));
    loaded(&mut store).await;

    store.refresh();
    eventually(|| store.poll()).await;
    assert_eq!(client.fetch_count(Resource::Meals), 2);
  }

  #[tokio::test]
  async fn test_submit_elsewhere_reloads_list() {
    let client = Arc::new(FakeClient::new().with(Resource::Meals, meals()));
    let cache = QueryCache::new(Arc::clone(&client) as Arc<dyn ResourceClient>);
    let mut store = RequestListStore::new(StoreDeps::new(cache.clone()));
    loaded(&mut store).await;

    let request = NewMealRequest {
      employee: "dee".into(),
      department: "Ops".into(),
      department_id: None,
      meal_type: MealType::Dinner,
      date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
      note: None,
    };
    submit_request(&cache, &request).await.unwrap();

    eventually(|| store.poll()).await;
    let state = store.get_state();
    assert_eq!(state.meals.len(), 4);
    assert_eq!(state.meals[0].employee, "dee");
    assert_eq!(client.fetch_count(Resource::Meals), 2);
  }

  #[tokio::test]
  async fn test_submit_before_first_poll_still_reloads() {
    let client = Arc::new(FakeClient::new().with(Resource::Meals, meals()));
    let cache = QueryCache::new(Arc::clone(&client) as Arc<dyn ResourceClient>);
    let mut store = RequestListStore::new(StoreDeps::new(cache.clone()));
    store.load();

    // The first fetch resolves, then a submit lands before the view ticks
    tokio::time::sleep(Duration::from_millis(20)).await;
    let request = NewMealRequest {
      employee: "dee".into(),
      department: "Ops".into(),
      department_id: None,
      meal_type: MealType::Lunch,
      date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
      note: None,
    };
    submit_request(&cache, &request).await.unwrap();

    eventually(|| {
      store.poll();
      store.get_state().meals.len() == 4
    })
    .await;
    assert_eq!(client.fetch_count(Resource::Meals), 2);
  }

  #[tokio::test]
  async fn test_fetch_error_surfaces_unchanged() {
    let (client, mut store) = setup(FakeClient::new());
    client.fail(
      Resource::Meals,
      ApiError::Response {
        status: 403,
        body: "forbidden".into(),
      },
    );
    loaded(&mut store).await;

    assert_eq!(store.error().and_then(ApiError::status), Some(403));
    assert!(store.get_state().meals.is_empty());
  }

  #[tokio::test]
  async fn test_unmount_before_resolve_discards_result() {
    let (client, mut store) = setup(FakeClient::gated().with(Resource::Meals, meals()));
    store.load();
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.dispose();
    client.release(1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!store.poll());
    assert!(store.get_state().meals.is_empty());
  }
}

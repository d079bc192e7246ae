//! Draft of a new meal request and its submission.

use chrono::{Local, NaiveDate};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{Feature, Store, StoreDeps, StoreState};
use crate::api::types::{Department, Employee, MealType, NewMealRequest};
use crate::api::{ApiError, Resource};
use crate::cache::QueryCache;
use crate::query::{Query, QueryState};

/// Client-held, not yet submitted meal request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MealRequestDraft {
  pub employee: Option<Employee>,
  pub department: Option<Department>,
  pub meal_type: Option<MealType>,
  pub date: Option<NaiveDate>,
  pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
  #[error("choose who the meal is for")]
  MissingEmployee,
  #[error("choose a department")]
  MissingDepartment,
  #[error("choose lunch or dinner")]
  MissingMealType,
  #[error("choose a date")]
  MissingDate,
}

impl MealRequestDraft {
  /// Check the draft is complete and build the creation body.
  pub fn validate(&self) -> Result<NewMealRequest, DraftError> {
    let employee = self.employee.as_ref().ok_or(DraftError::MissingEmployee)?;
    let department = self
      .department
      .as_ref()
      .ok_or(DraftError::MissingDepartment)?;
    let meal_type = self.meal_type.ok_or(DraftError::MissingMealType)?;
    let date = self.date.ok_or(DraftError::MissingDate)?;

    let note = self.note.trim();
    Ok(NewMealRequest {
      employee: employee.username.clone(),
      department: department.name.clone(),
      department_id: Some(department.id),
      meal_type,
      date,
      note: (!note.is_empty()).then(|| note.to_string()),
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmitStatus {
  #[default]
  Idle,
  Submitting,
  Submitted { id: Option<u64> },
  Failed(String),
}

#[derive(Debug, Default)]
pub struct NewRequestState {
  pub draft: MealRequestDraft,
  pub status: SubmitStatus,
}

/// Partial change to the draft. `reset` clears the draft before the other
/// fields are applied.
#[derive(Debug, Default)]
pub struct DraftPatch {
  pub employee: Option<Employee>,
  pub department: Option<Department>,
  pub meal_type: Option<MealType>,
  pub date: Option<NaiveDate>,
  pub note: Option<String>,
  pub status: Option<SubmitStatus>,
  pub reset: bool,
}

impl DraftPatch {
  fn touches_draft(&self) -> bool {
    self.employee.is_some()
      || self.department.is_some()
      || self.meal_type.is_some()
      || self.date.is_some()
      || self.note.is_some()
  }
}

impl StoreState for NewRequestState {
  type Patch = DraftPatch;

  fn merge(&mut self, patch: DraftPatch) {
    // The draft is locked until the pending submit settles; only the
    // outcome patch gets through
    if self.status == SubmitStatus::Submitting && patch.status.is_none() {
      debug!("draft edit ignored while submitting");
      return;
    }
    // Editing after a submit clears the old outcome
    if patch.touches_draft() {
      self.status = SubmitStatus::Idle;
    }
    if patch.reset {
      self.draft = MealRequestDraft {
        date: self.draft.date,
        ..MealRequestDraft::default()
      };
    }

    let draft = &mut self.draft;
    if let Some(employee) = patch.employee {
      draft.employee = Some(employee);
    }
    if let Some(department) = patch.department {
      draft.department = Some(department);
    }
    if let Some(meal_type) = patch.meal_type {
      draft.meal_type = Some(meal_type);
    }
    if let Some(date) = patch.date {
      draft.date = Some(date);
    }
    if let Some(note) = patch.note {
      draft.note = note;
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
  }
}

/// Send a meal request and invalidate the cached meals list so the next read
/// includes it.
pub async fn submit_request(cache: &QueryCache, request: &NewMealRequest) -> Result<Value, ApiError> {
  let created = cache.client().create_meal_request(request).await?;
  cache.invalidate(Resource::Meals.into());

  info!(
    employee = %request.employee,
    department = %request.department,
    meal_type = %request.meal_type,
    date = %request.date,
    "meal request submitted"
  );
  Ok(created)
}

/// Store behind the new-request form
pub struct NewRequestStore {
  store: Store<NewRequestState>,
  deps: StoreDeps,
  employees: Query<Vec<Employee>>,
  departments: Query<Vec<Department>>,
  submission: Option<Query<Value>>,
}

impl NewRequestStore {
  pub fn new(deps: StoreDeps) -> Self {
    let mut store = Store::new(Feature::NewRequest);
    store.update(DraftPatch {
      date: Some(Local::now().date_naive()),
      ..DraftPatch::default()
    });

    let cache = deps.cache.clone();
    let employees = Query::new(move || {
      let cache = cache.clone();
      async move { cache.read_as(Resource::Employees.into()).await }
    })
    .with_cancel(store.scope().token());

    let cache = deps.cache.clone();
    let departments = Query::new(move || {
      let cache = cache.clone();
      async move { cache.read_as(Resource::Departments.into()).await }
    })
    .with_cancel(store.scope().token());

    Self {
      store,
      deps,
      employees,
      departments,
      submission: None,
    }
  }

  /// Fetch the employees and departments the form offers.
  pub fn load_options(&mut self) {
    self.employees.fetch();
    self.departments.fetch();
  }

  pub fn reload_options(&mut self) {
    self.employees.refetch();
    self.departments.refetch();
  }

  pub fn employees(&self) -> &[Employee] {
    self.employees.data().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn departments(&self) -> &[Department] {
    self.departments.data().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn options_loading(&self) -> bool {
    self.employees.is_loading() || self.departments.is_loading()
  }

  pub fn options_error(&self) -> Option<&ApiError> {
    self.employees.error().or_else(|| self.departments.error())
  }

  pub fn get_state(&self) -> &NewRequestState {
    self.store.get_state()
  }

  pub fn update(&mut self, patch: DraftPatch) {
    self.store.update(patch);
  }

  /// Validate the draft and send it.
  ///
  /// The write itself runs to completion even if the form is closed
  /// meanwhile; only applying its outcome is tied to this store.
  pub fn submit(&mut self) -> Result<(), DraftError> {
    if self.get_state().status == SubmitStatus::Submitting || self.store.is_disposed() {
      return Ok(());
    }

    let request = self.get_state().draft.validate()?;
    let cache = self.deps.cache.clone();
    let mut query = Query::new(move || {
      let cache = cache.clone();
      let request = request.clone();
      let write = tokio::spawn(async move { submit_request(&cache, &request).await });
      async move {
        match write.await {
          Ok(result) => result,
          Err(_) => Err(ApiError::Cancelled),
        }
      }
    })
    .with_cancel(self.store.scope().token());

    query.fetch();
    self.submission = Some(query);
    self.store.update(DraftPatch {
      status: Some(SubmitStatus::Submitting),
      ..DraftPatch::default()
    });
    Ok(())
  }

  /// Apply finished fetches. Returns `true` if anything changed.
  pub fn poll(&mut self) -> bool {
    if self.store.is_disposed() {
      return false;
    }

    let mut changed = self.employees.poll();
    changed |= self.departments.poll();

    let Some(submission) = self.submission.as_mut() else {
      return changed;
    };
    if !submission.poll() {
      return changed;
    }

    let patch = match submission.state() {
      QueryState::Success(created) => DraftPatch {
        status: Some(SubmitStatus::Submitted {
          id: created.get("id").and_then(Value::as_u64),
        }),
        reset: true,
        ..DraftPatch::default()
      },
      QueryState::Error(e) => DraftPatch {
        status: Some(SubmitStatus::Failed(e.to_string())),
        ..DraftPatch::default()
      },
      QueryState::Cancelled => DraftPatch {
        status: Some(SubmitStatus::Failed(ApiError::Cancelled.to_string())),
        ..DraftPatch::default()
      },
      QueryState::Idle | QueryState::Loading => return true,
    };

    self.submission = None;
    self.store.update(patch);
    true
  }

  pub fn dispose(&self) {
    self.store.dispose();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeClient;
  use crate::api::types::Meal;
  use crate::api::ResourceClient;
  use crate::store::tests::eventually;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  fn setup(client: FakeClient) -> (Arc<FakeClient>, StoreDeps) {
    let client = Arc::new(client);
    let cache = QueryCache::new(Arc::clone(&client) as Arc<dyn ResourceClient>);
    (client, StoreDeps::new(cache))
  }

  fn employee() -> Employee {
    Employee {
      id: 1,
      full_name: "Ana Lima".into(),
      username: "ana".into(),
      title: "Engineer".into(),
    }
  }

  fn finance() -> Department {
    Department {
      id: 3,
      name: "Finance".into(),
    }
  }

  fn complete_patch() -> DraftPatch {
    DraftPatch {
      employee: Some(employee()),
      department: Some(finance()),
      meal_type: Some(MealType::Dinner),
      date: NaiveDate::from_ymd_opt(2024, 5, 2),
      ..DraftPatch::default()
    }
  }

  #[test]
  fn test_validate_reports_first_missing_field() {
    let mut draft = MealRequestDraft::default();
    assert_eq!(draft.validate(), Err(DraftError::MissingEmployee));

    draft.employee = Some(employee());
    assert_eq!(draft.validate(), Err(DraftError::MissingDepartment));

    draft.department = Some(finance());
    assert_eq!(draft.validate(), Err(DraftError::MissingMealType));

    draft.meal_type = Some(MealType::Lunch);
    assert_eq!(draft.validate(), Err(DraftError::MissingDate));

    draft.date = NaiveDate::from_ymd_opt(2024, 5, 2);
    draft.note = "  no onions ".into();
    let request = draft.validate().unwrap();
    assert_eq!(request.employee, "ana");
    assert_eq!(request.department_id, Some(3));
    assert_eq!(request.note.as_deref(), Some("no onions"));
  }

  #[test]
  fn test_editing_clears_previous_outcome() {
    let mut state = NewRequestState::default();
    state.merge(DraftPatch {
      status: Some(SubmitStatus::Failed("boom".into())),
      ..DraftPatch::default()
    });
    state.merge(DraftPatch {
      note: Some("vegetarian".into()),
      ..DraftPatch::default()
    });

    assert_eq!(state.status, SubmitStatus::Idle);
    assert_eq!(state.draft.note, "vegetarian");
  }

  #[test]
  fn test_draft_locked_while_submitting() {
    let mut state = NewRequestState::default();
    state.merge(complete_patch());
    state.merge(DraftPatch {
      status: Some(SubmitStatus::Submitting),
      ..DraftPatch::default()
    });

    state.merge(DraftPatch {
      note: Some("extra rice".into()),
      meal_type: Some(MealType::Lunch),
      ..DraftPatch::default()
    });
    assert_eq!(state.status, SubmitStatus::Submitting);
    assert_eq!(state.draft.meal_type, Some(MealType::Dinner));
    assert!(state.draft.note.is_empty());
  }

  #[tokio::test]
  async fn test_edits_wait_for_submit_to_settle() {
    let (client, deps) = setup(FakeClient::new());
    let mut store = NewRequestStore::new(deps);
    store.update(complete_patch());
    store.submit().unwrap();

    // Edits made while the request is in flight do not reach the draft
    store.update(DraftPatch {
      note: Some("extra rice".into()),
      ..DraftPatch::default()
    });
    assert!(store.get_state().draft.note.is_empty());

    eventually(|| {
      store.poll();
      matches!(store.get_state().status, SubmitStatus::Submitted { .. })
    })
    .await;
    assert_eq!(client.created().len(), 1);
    assert!(client.created()[0].get("note").is_none());

    // Once settled the form takes edits again
    store.update(DraftPatch {
      note: Some("extra rice".into()),
      ..DraftPatch::default()
    });
    assert_eq!(store.get_state().draft.note, "extra rice");
    assert_eq!(store.get_state().status, SubmitStatus::Idle);
  }

  #[tokio::test]
  async fn test_new_store_defaults_date_to_today() {
    let (_, deps) = setup(FakeClient::new());
    let store = NewRequestStore::new(deps);
    assert_eq!(store.get_state().draft.date, Some(Local::now().date_naive()));
  }

  #[tokio::test]
  async fn test_submit_then_read_includes_new_record() {
    let (client, deps) = setup(FakeClient::new().with(
      Resource::Meals,
      json!([{ "id": 1, "employee": "bo", "department": "IT", "type": "lunch", "date": "2024-05-02" }]),
    ));
    let cache = deps.cache.clone();

    // Warm the cache so a stale list would be served if nothing invalidated it
    let before: Vec<Meal> = cache.read_as(Resource::Meals.into()).await.unwrap();
    assert_eq!(before.len(), 1);

    let mut store = NewRequestStore::new(deps);
    store.update(complete_patch());
    store.submit().unwrap();
    assert_eq!(store.get_state().status, SubmitStatus::Submitting);

    eventually(|| {
      store.poll();
      matches!(store.get_state().status, SubmitStatus::Submitted { .. })
    })
    .await;

    let after: Vec<Meal> = cache.read_as(Resource::Meals.into()).await.unwrap();
    assert_eq!(after.len(), 2);
    assert!(after
      .iter()
      .any(|m| m.employee == "ana" && m.meal_type == "dinner" && m.department == "Finance"));
    assert_eq!(client.fetch_count(Resource::Meals), 2);

    // Draft is cleared for the next request, date kept
    let draft = &store.get_state().draft;
    assert!(draft.employee.is_none());
    assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 5, 2));
  }

  #[tokio::test]
  async fn test_submit_status_carries_created_id() {
    let (_, deps) = setup(FakeClient::new());
    let mut store = NewRequestStore::new(deps);
    store.update(complete_patch());
    store.submit().unwrap();

    eventually(|| {
      store.poll();
      store.get_state().status != SubmitStatus::Submitting
    })
    .await;

    assert_eq!(
      store.get_state().status,
      SubmitStatus::Submitted { id: Some(1000) }
    );
  }

  #[tokio::test]
  async fn test_failed_submit_keeps_draft() {
    let (client, deps) = setup(FakeClient::new());
    client.fail_submit(ApiError::Response {
      status: 422,
      body: "duplicate".into(),
    });

    let mut store = NewRequestStore::new(deps);
    store.update(complete_patch());
    store.submit().unwrap();

    eventually(|| {
      store.poll();
      matches!(store.get_state().status, SubmitStatus::Failed(_))
    })
    .await;

    assert_eq!(store.get_state().draft.employee, Some(employee()));
    assert!(client.created().is_empty());
  }

  #[tokio::test]
  async fn test_incomplete_draft_is_not_sent() {
    let (client, deps) = setup(FakeClient::new());
    let mut store = NewRequestStore::new(deps);

    assert_eq!(store.submit(), Err(DraftError::MissingEmployee));
    assert_eq!(store.get_state().status, SubmitStatus::Idle);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(client.created().is_empty());
  }

  #[tokio::test]
  async fn test_options_load_through_cache() {
    let (_, deps) = setup(
      FakeClient::new()
        .with(Resource::Employees, json!([{ "id": 1, "fullName": "Ana Lima", "username": "ana" }]))
        .with(Resource::Departments, json!([{ "id": 3, "name": "Finance" }])),
    );
    let mut store = NewRequestStore::new(deps);
    store.load_options();

    eventually(|| {
      store.poll();
      !store.options_loading()
    })
    .await;

    assert_eq!(store.employees()[0].username, "ana");
    assert_eq!(store.departments(), &[finance()]);
    assert!(store.options_error().is_none());
  }

  #[tokio::test]
  async fn test_unmount_before_options_resolve() {
    let (client, deps) = setup(
      FakeClient::gated()
        .with(Resource::Employees, json!([{ "id": 1, "fullName": "Ana Lima", "username": "ana" }]))
        .with(Resource::Departments, json!([{ "id": 3, "name": "Finance" }])),
    );
    let mut store = NewRequestStore::new(deps);
    store.load_options();
    tokio::time::sleep(Duration::from_millis(10)).await;

    store.dispose();
    client.release(2);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!store.poll());
    assert!(store.employees().is_empty());
    assert!(store.departments().is_empty());
  }

  #[tokio::test]
  async fn test_unmount_during_submit_still_writes() {
    let (client, deps) = setup(FakeClient::new());
    let mut store = NewRequestStore::new(deps);
    store.update(complete_patch());
    store.submit().unwrap();
    store.dispose();

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(client.created().len(), 1);
    assert!(!store.poll());
    assert_eq!(store.get_state().status, SubmitStatus::Submitting);
  }
}

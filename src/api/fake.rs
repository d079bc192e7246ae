//! In-memory resource client for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::{ApiError, Resource, ResourceClient};
use crate::api::types::NewMealRequest;

/// Serves canned JSON per resource and records every call.
///
/// A gated client parks each fetch until [`FakeClient::release`] hands out a
/// permit, which lets tests hold a fetch in flight.
#[derive(Default)]
pub struct FakeClient {
  data: Mutex<HashMap<Resource, Vec<Value>>>,
  errors: Mutex<HashMap<Resource, ApiError>>,
  fetches: Mutex<HashMap<Resource, u32>>,
  created: Mutex<Vec<Value>>,
  submit_error: Mutex<Option<ApiError>>,
  gate: Option<Arc<Semaphore>>,
  next_id: AtomicU64,
}

impl FakeClient {
  pub fn new() -> Self {
    Self {
      next_id: AtomicU64::new(1000),
      ..Self::default()
    }
  }

  pub fn gated() -> Self {
    Self {
      gate: Some(Arc::new(Semaphore::new(0))),
      ..Self::new()
    }
  }

  pub fn with(self, resource: Resource, records: Value) -> Self {
    let records = match records {
      Value::Array(items) => items,
      other => vec![other],
    };
    self.data.lock().unwrap().insert(resource, records);
    self
  }

  pub fn fail(&self, resource: Resource, error: ApiError) {
    self.errors.lock().unwrap().insert(resource, error);
  }

  pub fn fail_submit(&self, error: ApiError) {
    *self.submit_error.lock().unwrap() = Some(error);
  }

  /// Let `n` parked fetches complete.
  pub fn release(&self, n: usize) {
    if let Some(gate) = &self.gate {
      gate.add_permits(n);
    }
  }

  pub fn fetch_count(&self, resource: Resource) -> u32 {
    self
      .fetches
      .lock()
      .unwrap()
      .get(&resource)
      .copied()
      .unwrap_or(0)
  }

  pub fn created(&self) -> Vec<Value> {
    self.created.lock().unwrap().clone()
  }
}

#[async_trait]
impl ResourceClient for FakeClient {
  async fn fetch(&self, resource: Resource) -> Result<Value, ApiError> {
    *self.fetches.lock().unwrap().entry(resource).or_insert(0) += 1;

    if let Some(gate) = &self.gate {
      gate
        .acquire()
        .await
        .map_err(|_| ApiError::Cancelled)?
        .forget();
    }

    if let Some(err) = self.errors.lock().unwrap().get(&resource) {
      return Err(err.clone());
    }

    let records = self
      .data
      .lock()
      .unwrap()
      .get(&resource)
      .cloned()
      .unwrap_or_default();
    Ok(Value::Array(records))
  }

  async fn create_meal_request(&self, request: &NewMealRequest) -> Result<Value, ApiError> {
    if let Some(err) = self.submit_error.lock().unwrap().clone() {
      return Err(err);
    }

    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let mut record = serde_json::to_value(request).map_err(|e| ApiError::Parse(e.to_string()))?;
    record["id"] = json!(id);

    self
      .data
      .lock()
      .unwrap()
      .entry(Resource::Meals)
      .or_default()
      .push(record.clone());
    self.created.lock().unwrap().push(record.clone());
    Ok(record)
  }
}

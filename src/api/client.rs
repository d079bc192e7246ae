use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CACHE_CONTROL;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ApiError;
use super::resource::Resource;
use super::types::NewMealRequest;
use crate::config::{ApiConfig, ResourcesConfig, SubmitEndpoint, SubmitMethod};

/// Typed access to the backend resources.
///
/// This is the seam the query cache and stores are built on; tests swap in
/// in-memory implementations.
#[async_trait]
pub trait ResourceClient: Send + Sync {
  /// Fetch a whole resource collection as the raw JSON body.
  async fn fetch(&self, resource: Resource) -> Result<Value, ApiError>;

  /// Create a new meal request, returning whatever the backend echoes back.
  async fn create_meal_request(&self, request: &NewMealRequest) -> Result<Value, ApiError>;
}

/// Decode a fetched collection into typed records.
pub fn decode_records<T: DeserializeOwned>(value: &Value) -> Result<Vec<T>, ApiError> {
  Vec::<T>::deserialize(value).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub initial_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay: Duration::from_millis(200),
      max_delay: Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// Single attempt, never retries
  pub fn none() -> Self {
    Self {
      max_attempts: 1,
      ..Self::default()
    }
  }

  /// Run `op` until it succeeds, fails with a non-retryable error, or the
  /// attempt budget is spent. The delay doubles after each failure.
  pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ApiError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let mut delay = self.initial_delay;
    let mut attempt = 1;

    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_retryable() && attempt < self.max_attempts => {
          warn!(
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "{} failed, retrying: {}",
            what,
            e
          );
          tokio::time::sleep(delay).await;
          delay = (delay * 2).min(self.max_delay);
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

/// Turn a status code and body into the parsed JSON or a typed error.
///
/// 2xx bodies are passed through unchanged; an empty 2xx body is `null`.
pub fn decode_response(status: u16, body: &str) -> Result<Value, ApiError> {
  if !(200..300).contains(&status) {
    return Err(ApiError::Response {
      status,
      body: body.to_string(),
    });
  }

  if body.trim().is_empty() {
    return Ok(Value::Null);
  }

  serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Resource client backed by `reqwest`
#[derive(Clone)]
pub struct HttpResourceClient {
  client: reqwest::Client,
  base_url: String,
  resources: ResourcesConfig,
  submit: SubmitEndpoint,
  retry: RetryPolicy,
}

impl HttpResourceClient {
  pub fn new(config: &ApiConfig, retry: RetryPolicy) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: config.base_url.clone(),
      resources: config.resources.clone(),
      submit: config.submit.clone(),
      retry,
    })
  }

  fn url_for(&self, path: &str) -> String {
    format!(
      "{}/{}",
      self.base_url.trim_end_matches('/'),
      path.trim_start_matches('/')
    )
  }

  async fn fetch_once(&self, resource: Resource) -> Result<Value, ApiError> {
    let endpoint = self.resources.endpoint(resource);
    let url = self.url_for(&endpoint.path);
    debug!(%resource, %url, cache = ?endpoint.cache, "GET");

    let mut request = self.client.get(&url);
    if let Some(value) = endpoint.cache.cache_control() {
      request = request.header(CACHE_CONTROL, value);
    }

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;
    Self::read_response(response).await
  }

  async fn read_response(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;
    decode_response(status, &body)
  }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
  async fn fetch(&self, resource: Resource) -> Result<Value, ApiError> {
    let what = format!("fetch {}", resource);
    self.retry.run(&what, move || self.fetch_once(resource)).await
  }

  // Creation is not idempotent, so it gets exactly one attempt.
  async fn create_meal_request(&self, request: &NewMealRequest) -> Result<Value, ApiError> {
    let url = self.url_for(&self.submit.path);
    debug!(%url, method = ?self.submit.method, "submitting meal request");

    let builder = match self.submit.method {
      SubmitMethod::Post => self.client.post(&url),
      SubmitMethod::Put => self.client.put(&url),
    };

    let response = builder
      .json(request)
      .send()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;
    Self::read_response(response).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Department;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
      max_attempts,
      initial_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(2),
    }
  }

  #[test]
  fn test_success_body_passes_through() {
    let body = r#"[{"id":1,"name":"Finance"},{"id":2,"name":"IT","extra":[1,2]}]"#;
    let value = decode_response(200, body).unwrap();
    assert_eq!(value, serde_json::from_str::<Value>(body).unwrap());

    let value = decode_response(201, "[]").unwrap();
    assert_eq!(value, json!([]));
  }

  #[test]
  fn test_non_success_keeps_status() {
    for status in [301, 400, 404, 500, 503] {
      let err = decode_response(status, "nope").unwrap_err();
      assert_eq!(err.status(), Some(status));
    }
  }

  #[test]
  fn test_invalid_json_is_parse_error() {
    let err = decode_response(200, "<html>oops</html>").unwrap_err();
    assert!(matches!(err, ApiError::Parse(_)));
  }

  #[test]
  fn test_empty_success_body_is_null() {
    assert_eq!(decode_response(204, "").unwrap(), Value::Null);
  }

  #[test]
  fn test_decode_records() {
    let value = json!([{ "id": 1, "name": "Finance" }]);
    let departments: Vec<Department> = decode_records(&value).unwrap();
    assert_eq!(departments[0].name, "Finance");

    let err = decode_records::<Department>(&json!({ "id": 1 })).unwrap_err();
    assert!(matches!(err, ApiError::Parse(_)));
  }

  #[test]
  fn test_url_joining() {
    let config = ApiConfig {
      base_url: "http://localhost:8000/".into(),
      ..ApiConfig::default()
    };
    let client = HttpResourceClient::new(&config, RetryPolicy::none()).unwrap();
    assert_eq!(client.url_for("/meals"), "http://localhost:8000/meals");
    assert_eq!(client.url_for("users"), "http://localhost:8000/users");
  }

  #[tokio::test]
  async fn test_retry_recovers_from_server_errors() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result = fast_retry(3)
      .run("test", move || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
          Err(ApiError::Response {
            status: 502,
            body: String::new(),
          })
        } else {
          Ok(n)
        }
      })
      .await;

    assert_eq!(result, Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_retry_is_bounded() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), _> = fast_retry(4)
      .run("test", move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::Network("connection refused".into()))
      })
      .await;

    assert!(matches!(result, Err(ApiError::Network(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn test_client_errors_are_not_retried() {
    for error in [
      ApiError::Response {
        status: 404,
        body: String::new(),
      },
      ApiError::Parse("bad".into()),
    ] {
      let calls = AtomicU32::new(0);
      let result: Result<(), _> = fast_retry(5)
        .run("test", || {
          calls.fetch_add(1, Ordering::SeqCst);
          let error = error.clone();
          async move { Err(error) }
        })
        .await;

      assert_eq!(result, Err(error));
      assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
  }

  #[tokio::test]
  async fn test_unreachable_backend_is_network_error() {
    // Port 9 on localhost is discard; nothing listens there in test environments
    let config = ApiConfig {
      base_url: "http://127.0.0.1:9".into(),
      timeout_secs: 2,
      ..ApiConfig::default()
    };
    let client = HttpResourceClient::new(&config, RetryPolicy::none()).unwrap();
    let err = client.fetch(Resource::Departments).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "{err:?}");
  }
}

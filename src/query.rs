//! Async query handle for the UI loop.
//!
//! A `Query<T>` is the explicit suspension point between the synchronous UI
//! and asynchronous fetches: the view starts a fetch, keeps rendering, and
//! polls the handle on each tick until data or an error arrives.
//!
//! Every query is bound to a [`CancellationToken`]. Cancelling it (directly or
//! through the owning scope) aborts the spawned fetch, and a result that still
//! arrives is discarded instead of being applied.
//!
//! # Example
//!
//! ```ignore
//! let cache = cache.clone();
//! let mut query = Query::new(move || {
//!     let cache = cache.clone();
//!     async move { cache.read_as::<Meal>(Resource::Meals.into()).await }
//! })
//! .with_cancel(scope.token());
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
  /// The owning scope went away, or the fetch was cancelled explicitly
  Cancelled,
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error/cancelled states
/// - Async result handling via channels
/// - Cancellation tied to an owning scope
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  /// Scope token; cancelling it cancels every fetch this query starts
  cancel: CancellationToken,
  /// Child token of the fetch currently running
  in_flight: Option<CancellationToken>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60),
      cancel: CancellationToken::new(),
      in_flight: None,
    }
  }

  /// Bind this query to a scope's cancellation token.
  pub fn with_cancel(mut self, token: CancellationToken) -> Self {
    self.cancel = token;
    self
  }

  /// Set the stale time for this query.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.state, QueryState::Cancelled)
  }

  /// Check if the data is stale (older than stale_time).
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, cancelling any pending fetch first.
  pub fn refetch(&mut self) {
    self.abort_in_flight();
    self.start_fetch();
  }

  /// Cancel the pending fetch, if any. Its result will never be applied.
  pub fn cancel(&mut self) {
    self.abort_in_flight();
    if self.state.is_loading() {
      self.state = QueryState::Cancelled;
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    if self.cancel.is_cancelled() {
      if self.receiver.is_some() || self.state.is_loading() {
        self.cancel();
        return true;
      }
      return false;
    }

    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
        self.finish();
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.finish();
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Task ended without sending: it was cancelled
        self.state = QueryState::Cancelled;
        self.finish();
        true
      }
    }
  }

  fn finish(&mut self) {
    self.receiver = None;
    self.in_flight = None;
  }

  fn abort_in_flight(&mut self) {
    if let Some(token) = self.in_flight.take() {
      token.cancel();
    }
    self.receiver = None;
  }

  fn start_fetch(&mut self) {
    if self.cancel.is_cancelled() {
      self.state = QueryState::Cancelled;
      return;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let token = self.cancel.child_token();
    self.receiver = Some(rx);
    self.in_flight = Some(token.clone());
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      tokio::select! {
        _ = token.cancelled() => {}
        result = future => {
          // The scope may have gone away while the fetch was finishing
          if !token.is_cancelled() {
            let _ = tx.send(result);
          }
        }
      }
    });
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(token) = self.in_flight.take() {
      token.cancel();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.state().is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error_is_typed() {
    let mut query: Query<i32> =
      Query::new(|| async { Err(ApiError::Network("connection reset".into())) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(
      query.error(),
      Some(&ApiError::Network("connection reset".into()))
    );
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(|| async { Ok(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(42)
      }
    });

    query.fetch();
    query.fetch();
    assert!(query.is_loading());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // The first fetch was aborted before it could count
    assert_eq!(query.data(), Some(&0));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_scope_cancellation_discards_late_result() {
    let scope = CancellationToken::new();
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok("late")
    })
    .with_cancel(scope.clone());

    query.fetch();
    scope.cancel();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(query.poll());
    assert!(query.is_cancelled());
    assert_eq!(query.data(), None);

    // A cancelled scope cannot start new fetches
    query.fetch();
    assert!(query.is_cancelled());
  }

  #[tokio::test]
  async fn test_explicit_cancel() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok(1)
    });

    query.fetch();
    query.cancel();
    assert!(query.is_cancelled());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!query.poll());
    assert_eq!(query.data(), None);
  }
}

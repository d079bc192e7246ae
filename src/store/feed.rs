//! A store's view of one shared resource that follows cache invalidations.

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ApiError;
use crate::cache::{QueryCache, QueryKey, Snapshot};
use crate::query::Query;

/// Query over one cache key that refetches once the key's epoch moves past
/// the epoch of the records it holds.
///
/// The held epoch is the one the records were fetched under, so an
/// invalidation that happens while a fetch is in flight, or before the
/// result is polled, still triggers a reload.
pub(crate) struct ResourceFeed<T> {
  cache: QueryCache,
  key: QueryKey,
  query: Query<Snapshot<T>>,
  /// Epoch of the records last handed out by `poll`
  seen_epoch: Option<u64>,
}

impl<T> ResourceFeed<T>
where
  T: DeserializeOwned + Send + Sync + 'static,
{
  pub fn new(cache: &QueryCache, key: QueryKey, token: CancellationToken) -> Self {
    let reader = cache.clone();
    let query = Query::new(move || {
      let cache = reader.clone();
      async move { cache.read_snapshot(key).await }
    })
    .with_cancel(token);

    Self {
      cache: cache.clone(),
      key,
      query,
      seen_epoch: None,
    }
  }

  pub fn load(&mut self) {
    self.query.fetch();
  }

  /// Drop the shared entry and fetch it again.
  pub fn refresh(&mut self) {
    self.cache.invalidate(self.key);
    self.query.refetch();
  }

  /// Returns `true` if the query changed state. New records, if any, are
  /// then available from [`records`](Self::records).
  pub fn poll(&mut self) -> bool {
    self.revalidate();
    if !self.query.poll() {
      return false;
    }
    if let Some(snapshot) = self.query.data() {
      self.seen_epoch = Some(snapshot.epoch);
    }
    true
  }

  fn revalidate(&mut self) {
    let Some(seen) = self.seen_epoch else {
      return;
    };
    let current = self.cache.epoch(self.key);
    if !self.query.is_loading() && current != seen {
      debug!(query = %self.key.description(), seen, current, "reloading behind cache");
      self.seen_epoch = None;
      self.query.refetch();
    }
  }

  pub fn records(&self) -> Option<&[T]> {
    self.query.data().map(|snapshot| snapshot.records.as_slice())
  }

  pub fn is_loading(&self) -> bool {
    self.query.is_loading()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.query.error()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeClient;
  use crate::api::types::Department;
  use crate::api::{Resource, ResourceClient};
  use crate::store::tests::eventually;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  const DEPARTMENTS: QueryKey = QueryKey::Resource(Resource::Departments);

  fn feed_over(client: &Arc<FakeClient>) -> (QueryCache, ResourceFeed<Department>) {
    let cache = QueryCache::new(Arc::clone(client) as Arc<dyn ResourceClient>);
    let feed = ResourceFeed::new(&cache, DEPARTMENTS, CancellationToken::new());
    (cache, feed)
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_reloads() {
    let client = Arc::new(
      FakeClient::gated().with(Resource::Departments, json!([{ "id": 1, "name": "Finance" }])),
    );
    let (cache, mut feed) = feed_over(&client);
    feed.load();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Invalidated while the first fetch is still parked
    cache.invalidate(DEPARTMENTS);
    client.release(1);
    eventually(|| feed.poll()).await;
    assert_eq!(feed.records().map(<[_]>::len), Some(1));

    client.release(1);
    eventually(|| {
      feed.poll();
      client.fetch_count(Resource::Departments) == 2 && !feed.is_loading()
    })
    .await;
    assert!(feed.error().is_none());
  }

  #[tokio::test]
  async fn test_invalidate_before_poll_reloads() {
    let client = Arc::new(
      FakeClient::new().with(Resource::Departments, json!([{ "id": 1, "name": "Finance" }])),
    );
    let (cache, mut feed) = feed_over(&client);
    feed.load();

    // The fetch finishes, then the entry is invalidated before the next tick
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.invalidate(DEPARTMENTS);

    eventually(|| {
      feed.poll();
      client.fetch_count(Resource::Departments) == 2 && !feed.is_loading()
    })
    .await;
    assert_eq!(feed.records().map(<[_]>::len), Some(1));
  }

  #[tokio::test]
  async fn test_settled_feed_stays_quiet() {
    let client = Arc::new(
      FakeClient::new().with(Resource::Departments, json!([{ "id": 1, "name": "Finance" }])),
    );
    let (_cache, mut feed) = feed_over(&client);
    feed.load();
    eventually(|| feed.poll()).await;

    for _ in 0..5 {
      assert!(!feed.poll());
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(client.fetch_count(Resource::Departments), 1);
  }
}

//! Cache layer that orchestrates caching logic with network fetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::key::QueryKey;
use crate::api::{decode_records, ApiError, ResourceClient};

type FetchResult = Result<Arc<Value>, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

enum Entry {
  Ready { value: Arc<Value>, fetched_at: Instant },
  InFlight(SharedFetch),
}

#[derive(Default)]
struct Slot {
  /// Advanced on every new fetch and every invalidation. A fetch may only
  /// settle into the slot if the epoch has not moved since it started.
  epoch: u64,
  entry: Option<Entry>,
}

/// Decoded records of one key and the epoch they were read under
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
  pub epoch: u64,
  pub records: Vec<T>,
}

/// Shared, read-mostly cache in front of a [`ResourceClient`].
///
/// Clones share the same underlying map, so one instance is handed to every
/// store. Writes happen only when a fetch settles or a key is invalidated.
pub struct QueryCache {
  client: Arc<dyn ResourceClient>,
  slots: Arc<Mutex<HashMap<QueryKey, Slot>>>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl QueryCache {
  pub fn new(client: Arc<dyn ResourceClient>) -> Self {
    Self {
      client,
      slots: Arc::new(Mutex::new(HashMap::new())),
      stale_time: Duration::from_secs(30),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// The client this cache reads through; writes go straight to it.
  pub fn client(&self) -> &Arc<dyn ResourceClient> {
    &self.client
  }

  fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
    // The map holds no invariant a panicking reader could break halfway
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Read a resource.
  ///
  /// 1. Fresh cached value: returned immediately
  /// 2. Fetch already in flight: wait on that same fetch
  /// 3. Otherwise: start a fetch and wait on it
  ///
  /// Every reader waiting on one fetch gets the same value or the same error.
  pub async fn read(&self, key: QueryKey) -> FetchResult {
    self.read_versioned(key).await.map(|(_, value)| value)
  }

  /// [`read`](Self::read), also returning the epoch the value belongs to.
  ///
  /// That is the epoch the fetch started under, not the epoch at return
  /// time, so an invalidation that lands while the fetch is in flight still
  /// shows up as a mismatch against [`epoch`](Self::epoch).
  pub async fn read_versioned(&self, key: QueryKey) -> Result<(u64, Arc<Value>), ApiError> {
    let (fetch, epoch) = {
      let mut slots = self.slots();
      let slot = slots.entry(key).or_default();

      let joined = match &slot.entry {
        Some(Entry::Ready { value, fetched_at }) if fetched_at.elapsed() < self.stale_time => {
          debug!(query = %key.description(), "cache hit");
          return Ok((slot.epoch, Arc::clone(value)));
        }
        Some(Entry::InFlight(fetch)) => {
          debug!(query = %key.description(), "joining in-flight fetch");
          Some(fetch.clone())
        }
        _ => None,
      };

      let fetch = match joined {
        Some(fetch) => fetch,
        None => {
          debug!(query = %key.description(), "cache miss, fetching");
          let fetch = self.start_fetch(key);
          slot.epoch += 1;
          slot.entry = Some(Entry::InFlight(fetch.clone()));
          fetch
        }
      };

      (fetch, slot.epoch)
    };

    let result = fetch.await;
    self.settle(key, epoch, &result);
    result.map(|value| (epoch, value))
  }

  /// Typed view of [`read`](Self::read).
  pub async fn read_as<T: DeserializeOwned>(&self, key: QueryKey) -> Result<Vec<T>, ApiError> {
    let value = self.read(key).await?;
    decode_records(&value)
  }

  /// Typed view of [`read_versioned`](Self::read_versioned).
  pub async fn read_snapshot<T: DeserializeOwned>(
    &self,
    key: QueryKey,
  ) -> Result<Snapshot<T>, ApiError> {
    let (epoch, value) = self.read_versioned(key).await?;
    Ok(Snapshot {
      epoch,
      records: decode_records(&value)?,
    })
  }

  /// Non-suspending look at a fresh cached value.
  pub fn peek(&self, key: QueryKey) -> Option<Arc<Value>> {
    match self.slots().get(&key)?.entry.as_ref()? {
      Entry::Ready { value, fetched_at } if fetched_at.elapsed() < self.stale_time => {
        Some(Arc::clone(value))
      }
      _ => None,
    }
  }

  /// Generation of `key`'s entry. It changes whenever a fetch starts or the
  /// key is invalidated, so a holder of older data can tell it is behind.
  pub fn epoch(&self, key: QueryKey) -> u64 {
    self.slots().get(&key).map(|slot| slot.epoch).unwrap_or(0)
  }

  /// Drop the cached value for `key` so the next read refetches.
  ///
  /// A fetch already in flight still resolves for the readers waiting on it,
  /// but its result is not stored.
  pub fn invalidate(&self, key: QueryKey) {
    let mut slots = self.slots();
    let slot = slots.entry(key).or_default();
    slot.epoch += 1;
    slot.entry = None;
    debug!(query = %key.description(), epoch = slot.epoch, "invalidated");
  }

  fn start_fetch(&self, key: QueryKey) -> SharedFetch {
    let client = Arc::clone(&self.client);
    let resource = key.resource();
    async move { client.fetch(resource).await.map(Arc::new) }
      .boxed()
      .shared()
  }

  fn settle(&self, key: QueryKey, epoch: u64, result: &FetchResult) {
    let mut slots = self.slots();
    let Some(slot) = slots.get_mut(&key) else {
      return;
    };

    // Already settled by another reader, or superseded
    if slot.epoch != epoch || !matches!(slot.entry, Some(Entry::InFlight(_))) {
      return;
    }

    slot.entry = match result {
      Ok(value) => Some(Entry::Ready {
        value: Arc::clone(value),
        fetched_at: Instant::now(),
      }),
      Err(e) => {
        warn!(query = %key.description(), error = %e, "fetch failed");
        None
      }
    };
  }
}

impl Clone for QueryCache {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
      slots: Arc::clone(&self.slots),
      stale_time: self.stale_time,
    }
  }
}

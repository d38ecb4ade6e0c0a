//! Query client that owns the cache entries and the in-flight fetches.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::FetchError;
use super::key::QueryKey;
use super::options::QueryOptions;

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, FetchError>>>;

struct Entry {
  value: AnyValue,
  fetched_at: Instant,
  evict_after: std::time::Duration,
}

impl Entry {
  fn age(&self, now: Instant) -> std::time::Duration {
    now.saturating_duration_since(self.fetched_at)
  }
}

struct InFlight {
  id: u64,
  fetch: SharedFetch,
}

#[derive(Default)]
struct State {
  entries: HashMap<String, Entry>,
  in_flight: HashMap<String, InFlight>,
  next_fetch_id: u64,
}

impl State {
  fn evict_expired(&mut self, now: Instant) {
    let before = self.entries.len();
    self.entries.retain(|_, entry| entry.age(now) < entry.evict_after);
    let evicted = before - self.entries.len();
    if evicted > 0 {
      debug!(evicted, "evicted expired cache entries");
    }
  }

  /// Drop the in-flight slot if it still belongs to fetch `id`.
  fn finish_fetch(&mut self, key: &str, id: u64) -> bool {
    let owns_slot = self.in_flight.get(key).is_some_and(|f| f.id == id);
    if owns_slot {
      self.in_flight.remove(key);
    }
    owns_slot
  }
}

/// Keyed, time-based cache for remote resources.
///
/// Cloning is cheap and every clone sees the same entries, so one client is
/// created at startup and handed to whatever needs it. Concurrent lookups of
/// the same key share a single fetch.
#[derive(Clone, Default)]
pub struct QueryClient {
  state: Arc<Mutex<State>>,
}

impl QueryClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the cached value for `key`, fetching it when missing or stale.
  pub async fn fetch_query<K, T, F, Fut>(
    &self,
    key: &K,
    options: &QueryOptions,
    fetcher: F,
  ) -> Result<T, FetchError>
  where
    K: QueryKey + ?Sized,
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = color_eyre::Result<T>> + Send + 'static,
  {
    self
      .fetch_query_select(key, options, fetcher, |raw| raw)
      .await
  }

  /// Like [`fetch_query`](Self::fetch_query), projecting the raw payload
  /// through `select` before it is stored.
  pub async fn fetch_query_select<K, Raw, T, F, Fut, S>(
    &self,
    key: &K,
    options: &QueryOptions,
    fetcher: F,
    select: S,
  ) -> Result<T, FetchError>
  where
    K: QueryKey + ?Sized,
    Raw: Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = color_eyre::Result<Raw>> + Send + 'static,
    S: FnOnce(Raw) -> T + Send + 'static,
  {
    let key = key.cache_key();

    let fetch = {
      let mut state = self.lock();
      let now = Instant::now();
      state.evict_expired(now);

      if let Some(entry) = state.entries.get(&key) {
        if entry.age(now) < options.stale_after {
          match entry.value.downcast_ref::<T>() {
            Some(value) => {
              debug!(key = %key, "query cache hit");
              return Ok(value.clone());
            }
            None => warn!(key = %key, "cached value has an unexpected type, refetching"),
          }
        }
      }

      match state.in_flight.get(&key) {
        Some(in_flight) => {
          debug!(key = %key, "joining in-flight fetch");
          in_flight.fetch.clone()
        }
        None => {
          let id = state.next_fetch_id;
          state.next_fetch_id += 1;
          let fetch = self.spawn_fetch(key.clone(), id, *options, fetcher, select);
          state.in_flight.insert(
            key.clone(),
            InFlight {
              id,
              fetch: fetch.clone(),
            },
          );
          fetch
        }
      }
    };

    let value = fetch.await?;
    value
      .downcast_ref::<T>()
      .cloned()
      .ok_or(FetchError::TypeMismatch { key })
  }

  /// Drop the entry for `key` so the next lookup fetches again.
  ///
  /// A fetch already in flight for the key is detached: it still completes,
  /// but its result is no longer stored.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) {
    let key = key.cache_key();
    let mut state = self.lock();
    let had_entry = state.entries.remove(&key).is_some();
    let had_fetch = state.in_flight.remove(&key).is_some();
    debug!(key = %key, had_entry, had_fetch, "invalidated query");
  }

  /// Invalidate every key starting with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &str) {
    let mut state = self.lock();
    state.entries.retain(|key, _| !key.starts_with(prefix));
    state.in_flight.retain(|key, _| !key.starts_with(prefix));
    debug!(prefix, "invalidated queries by prefix");
  }

  /// Number of live (not yet evicted) entries.
  #[cfg(test)]
  pub fn len(&self) -> usize {
    let mut state = self.lock();
    state.evict_expired(Instant::now());
    state.entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Run the fetch on its own task so it completes even when every caller
  /// has gone away.
  fn spawn_fetch<Raw, T, F, Fut, S>(
    &self,
    key: String,
    id: u64,
    options: QueryOptions,
    fetcher: F,
    select: S,
  ) -> SharedFetch
  where
    Raw: Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = color_eyre::Result<Raw>> + Send + 'static,
    S: FnOnce(Raw) -> T + Send + 'static,
  {
    let shared_state = Arc::clone(&self.state);
    let task_key = key.clone();

    let handle = tokio::spawn(async move {
      let key = task_key;
      debug!(key = %key, "fetching query");
      let result = fetch_with_retry(&key, &options, &fetcher)
        .await
        .map(|raw| Arc::new(select(raw)) as AnyValue);

      let mut state = shared_state
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      let owns_slot = state.finish_fetch(&key, id);
      if let (true, Ok(value)) = (owns_slot, &result) {
        state.entries.insert(
          key,
          Entry {
            value: Arc::clone(value),
            fetched_at: Instant::now(),
            evict_after: options.evict_after,
          },
        );
      }
      result
    });

    async move {
      match handle.await {
        Ok(result) => result,
        Err(e) => Err(FetchError::Aborted {
          key,
          message: e.to_string(),
        }),
      }
    }
    .boxed()
    .shared()
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

async fn fetch_with_retry<Raw, F, Fut>(
  key: &str,
  options: &QueryOptions,
  fetcher: &F,
) -> Result<Raw, FetchError>
where
  F: Fn() -> Fut,
  Fut: Future<Output = color_eyre::Result<Raw>>,
{
  let mut attempt = 0u32;
  loop {
    match fetcher().await {
      Ok(raw) => return Ok(raw),
      Err(e) if attempt < options.retry_limit => {
        let delay = options.backoff(attempt);
        attempt += 1;
        warn!(key, attempt, ?delay, error = %e, "fetch failed, retrying");
        tokio::time::sleep(delay).await;
      }
      Err(e) => {
        warn!(key, attempts = attempt + 1, error = %e, "fetch failed");
        return Err(FetchError::Failed {
          key: key.to_string(),
          attempts: attempt + 1,
          message: format!("{:#}", e),
        });
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  const MINUTE: Duration = Duration::from_secs(60);

  fn listing_options() -> QueryOptions {
    QueryOptions::new(5 * MINUTE, 10 * MINUTE).with_retry_delay(Duration::from_millis(10))
  }

  /// Fetcher that counts invocations and yields the invocation number.
  fn counting_fetcher(
    calls: Arc<AtomicU32>,
    latency: Duration,
  ) -> impl Fn() -> BoxFuture<'static, color_eyre::Result<u32>> + Send + Sync + 'static {
    move || {
      let calls = Arc::clone(&calls);
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(latency).await;
        Ok(n)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_first_lookup_fetches_and_stores() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));

    let value = client
      .fetch_query(
        "userListings",
        &listing_options(),
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();

    assert_eq!(value, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.len(), 1);
  }

  #[tokio::test]
  async fn test_concurrent_lookups_are_coalesced() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options();

    let (a, b) = tokio::join!(
      client.fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::from_millis(50)),
      ),
      client.fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::from_millis(50)),
      ),
    );

    assert_eq!(a.unwrap(), 1);
    assert_eq!(b.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_coalesced_callers_share_the_error() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options().with_retry_limit(0);

    let failing = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          Err::<u32, _>(eyre!("connection reset"))
        }
      }
    };

    let (a, b) = tokio::join!(
      client.fetch_query("userDrafts", &options, failing.clone()),
      client.fetch_query("userDrafts", &options, failing),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let err = a.unwrap_err();
    assert_eq!(err, b.unwrap_err());
    assert!(matches!(err, FetchError::Failed { attempts: 1, .. }));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_entry_is_served_from_cache() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options();

    client
      .fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();

    tokio::time::advance(4 * MINUTE).await;
    let value = client
      .fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();

    assert_eq!(value, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_entry_is_refetched() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options();

    client
      .fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();

    tokio::time::advance(6 * MINUTE).await;
    let value = client
      .fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_entry_is_evicted_after_evict_window() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(
        "profile",
        &listing_options(),
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();
    assert_eq!(client.len(), 1);

    tokio::time::advance(9 * MINUTE).await;
    assert_eq!(client.len(), 1);

    tokio::time::advance(MINUTE).await;
    assert!(client.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_value_is_not_a_fallback() {
    let client = QueryClient::new();
    let options = listing_options();

    client
      .fetch_query("userListings", &options, || async { Ok(7u32) })
      .await
      .unwrap();

    tokio::time::advance(6 * MINUTE).await;
    let result = client
      .fetch_query("userListings", &options, || async {
        Err::<u32, _>(eyre!("service unavailable"))
      })
      .await;

    let err = result.unwrap_err();
    assert_eq!(err.key(), "userListings");
    assert!(err.to_string().contains("service unavailable"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_is_retried_once() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));

    let flaky = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(eyre!("timeout"))
          } else {
            Ok("listings".to_string())
          }
        }
      }
    };

    let value = client
      .fetch_query("userListings", &listing_options(), flaky)
      .await
      .unwrap();

    assert_eq!(value, "listings");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_budget_is_exhausted() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options().with_retry_limit(2);

    let failing = {
      let calls = calls.clone();
      move || {
        let calls = Arc::clone(&calls);
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err::<u32, _>(eyre!("bad gateway"))
        }
      }
    };

    let err = client
      .fetch_query("userListings", &options, failing)
      .await
      .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(err, FetchError::Failed { attempts: 3, .. }));
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_select_projects_before_storing() {
    let client = QueryClient::new();
    let options = listing_options();

    let count = client
      .fetch_query_select(
        "userListings",
        &options,
        || async { Ok(vec!["a", "b", "c"]) },
        |raw: Vec<&'static str>| raw.len(),
      )
      .await
      .unwrap();
    assert_eq!(count, 3);

    let cached: usize = client
      .fetch_query("userListings", &options, || async {
        Err::<usize, _>(eyre!("should not be called"))
      })
      .await
      .unwrap();
    assert_eq!(cached, 3);
  }

  #[tokio::test]
  async fn test_abandoned_fetch_still_populates_cache() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options();

    let abandoned = tokio::time::timeout(
      Duration::from_millis(5),
      client.fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::from_millis(50)),
      ),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let value = client
      .fetch_query(
        "userListings",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();
    assert_eq!(value, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = listing_options();

    client
      .fetch_query(
        "listings:drafts",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();
    client.invalidate("listings:drafts");

    let value = client
      .fetch_query(
        "listings:drafts",
        &options,
        counting_fetcher(calls.clone(), Duration::ZERO),
      )
      .await
      .unwrap();
    assert_eq!(value, 2);
  }

  #[tokio::test]
  async fn test_invalidate_prefix_keeps_other_keys() {
    let client = QueryClient::new();
    let options = listing_options();

    client
      .fetch_query("listings:mine", &options, || async { Ok(1u32) })
      .await
      .unwrap();
    client
      .fetch_query("listings:drafts", &options, || async { Ok(2u32) })
      .await
      .unwrap();
    client
      .fetch_query("profile:me", &options, || async { Ok(3u32) })
      .await
      .unwrap();

    client.invalidate_prefix("listings:");
    assert_eq!(client.len(), 1);
  }

  #[tokio::test]
  async fn test_detached_fetch_does_not_store() {
    let client = QueryClient::new();
    let options = listing_options();

    let slow = client.fetch_query("listings:mine", &options, || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok(1u32)
    });
    let invalidate = async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      client.invalidate("listings:mine");
    };
    let (value, ()) = tokio::join!(slow, invalidate);

    assert_eq!(value.unwrap(), 1);
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_type_mismatch_refetches() {
    let client = QueryClient::new();
    let options = listing_options();

    client
      .fetch_query("mixed", &options, || async { Ok(1u32) })
      .await
      .unwrap();
    let value = client
      .fetch_query("mixed", &options, || async { Ok("text".to_string()) })
      .await
      .unwrap();
    assert_eq!(value, "text");
  }
}

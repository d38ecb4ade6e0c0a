//! Poll-on-tick bridge between async cache lookups and the UI.
//!
//! A view owns a `Query<T>` built from a closure that calls the cached API
//! client. `fetch()` spawns the lookup; the event loop calls `poll()` on every
//! tick and re-renders when it returns `true`.
//!
//! ```ignore
//! let api = api.clone();
//! let mut query = Query::new(move || {
//!   let api = api.clone();
//!   async move { api.profile().await.map_err(|e| e.to_string()) }
//! });
//! query.fetch();
//! ```

use chrono::{DateTime, Local};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;

/// What a view has to show for one lookup
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Never fetched
  Idle,
  /// First fetch running, nothing to show yet
  Loading,
  Success(T),
  /// Message of the last failed fetch
  Error(String),
}

impl<T> QueryState<T> {
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  pending: Option<oneshot::Receiver<Result<T, String>>>,
  loaded_at: Option<DateTime<Local>>,
}

impl<T: Send + 'static> Query<T> {
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      pending: None,
      loaded_at: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Wall-clock time of the last successful load.
  pub fn loaded_at(&self) -> Option<DateTime<Local>> {
    self.loaded_at
  }

  /// Start a lookup unless one is already running.
  pub fn fetch(&mut self) {
    if self.pending.is_some() {
      return;
    }
    self.start();
  }

  /// Start a new lookup, abandoning the one in progress.
  ///
  /// The abandoned lookup still finishes in the background and fills the
  /// cache; only its answer to this query is discarded.
  pub fn refetch(&mut self) {
    self.pending = None;
    self.start();
  }

  /// Pick up the result of a pending lookup.
  ///
  /// Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.pending.as_mut() else {
      return false;
    };

    let outcome = match receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => Err("Query was cancelled".to_string()),
    };

    self.pending = None;
    match outcome {
      Ok(data) => {
        self.state = QueryState::Success(data);
        self.loaded_at = Some(Local::now());
      }
      Err(error) => self.state = QueryState::Error(error),
    }
    true
  }

  fn start(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.pending = Some(rx);
    // Keep showing the previous data while reloading.
    if !matches!(self.state, QueryState::Success(_)) {
      self.state = QueryState::Loading;
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }

  /// True while a lookup is running, including background reloads.
  pub fn is_fetching(&self) -> bool {
    self.pending.is_some()
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetching", &self.pending.is_some())
      .field("loaded_at", &self.loaded_at)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settle<T: Send + 'static>(query: &mut Query<T>) -> bool {
    for _ in 0..50 {
      if query.poll() {
        return true;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
  }

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });
    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(matches!(query.state(), QueryState::Loading));

    assert!(settle(&mut query).await);
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
    assert!(query.loaded_at().is_some());
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("unable to load".to_string()) });

    query.fetch();
    assert!(settle(&mut query).await);
    assert!(matches!(query.state(), QueryState::Error(e) if e == "unable to load"));
  }

  #[tokio::test]
  async fn test_fetch_while_pending_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, String>(())
      }
    });

    query.fetch();
    query.fetch();
    assert!(settle(&mut query).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_keeps_previous_data_visible() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    assert!(settle(&mut query).await);
    assert_eq!(query.data(), Some(&0));

    query.refetch();
    assert!(query.is_fetching());
    assert_eq!(query.data(), Some(&0));

    assert!(settle(&mut query).await);
    assert_eq!(query.data(), Some(&1));
  }
}

//! Debounced "latest query wins" search.
//!
//! Each submission waits out the debounce window before running. A newer
//! submission aborts the pending or in-flight one, so a slow response to
//! an old query can never overwrite the result of a newer one.
//!
//! `SearchRegistry` keeps one `LatestSearch` per client key, so queries
//! only supersede earlier queries from the same client.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Client keys tracked by a default `SearchRegistry`.
pub const MAX_CLIENTS: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search superseded by a newer query")]
    Superseded,
    #[error("Search state lock poisoned")]
    LockPoisoned,
}

pub struct LatestSearch {
    debounce: Duration,
    generation: AtomicU64,
    inflight: Mutex<Option<JoinHandle<()>>>,
}

impl Default for LatestSearch {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl LatestSearch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            generation: AtomicU64::new(0),
            inflight: Mutex::new(None),
        }
    }

    /// Number of searches submitted so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Debounce, then run `search`. Resolves to `Superseded` if another
    /// search is submitted before this one delivers.
    pub async fn run<T, F, Fut>(&self, search: F) -> Result<T, SearchError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let debounce = self.debounce;

        let generation = {
            let mut inflight = self.inflight.lock().map_err(|_| SearchError::LockPoisoned)?;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(previous) = inflight.take() {
                previous.abort();
            }
            *inflight = Some(tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                let result = search().await;
                let _ = tx.send(result);
            }));
            generation
        };

        // Sender dropped means the task was aborted.
        let result = rx.await.map_err(|_| SearchError::Superseded)?;
        if self.generation() != generation {
            tracing::debug!(generation, "Discarding stale search result");
            return Err(SearchError::Superseded);
        }
        Ok(result)
    }
}

/// Per-client `LatestSearch` instances. Past `capacity` keys, the least
/// recently used one is dropped; its in-flight searches still finish.
pub struct SearchRegistry {
    debounce: Duration,
    capacity: usize,
    clients: Mutex<HashMap<String, (Arc<LatestSearch>, Instant)>>,
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, MAX_CLIENTS)
    }
}

impl SearchRegistry {
    pub fn new(debounce: Duration, capacity: usize) -> Self {
        Self {
            debounce,
            capacity: capacity.max(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Number of client keys currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    /// The searcher for `client`. Callers without a key get a fresh one:
    /// debounced, never superseded.
    pub fn for_client(&self, client: Option<&str>) -> Result<Arc<LatestSearch>, SearchError> {
        let Some(client) = client.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(Arc::new(LatestSearch::new(self.debounce)));
        };

        let mut clients = self.clients.lock().map_err(|_| SearchError::LockPoisoned)?;
        let now = Instant::now();
        if let Some((search, last_used)) = clients.get_mut(client) {
            *last_used = now;
            return Ok(search.clone());
        }

        if clients.len() >= self.capacity {
            let oldest = clients
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                clients.remove(&key);
                tracing::debug!(client = %key, "Evicted idle search client");
            }
        }

        let search = Arc::new(LatestSearch::new(self.debounce));
        clients.insert(client.to_string(), (search.clone(), now));
        Ok(search)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn single_search_runs_after_debounce() {
        let search = LatestSearch::new(WINDOW);
        let started = Instant::now();
        let result = search.run(|| async { 42 }).await;
        assert_eq!(result, Ok(42));
        assert!(started.elapsed() >= WINDOW);
        assert_eq!(search.generation(), 1);
    }

    #[tokio::test]
    async fn newer_submission_supersedes_pending_one() {
        let search = Arc::new(LatestSearch::new(WINDOW));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let search = search.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                search
                    .run(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "an"
                    })
                    .await
            })
        };
        // Well inside the first one's debounce window.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let calls_second = calls.clone();
        let second = search
            .run(move || async move {
                calls_second.fetch_add(1, Ordering::SeqCst);
                "ana"
            })
            .await;

        assert_eq!(first.await.unwrap(), Err(SearchError::Superseded));
        assert_eq!(second, Ok("ana"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_old_result_never_wins() {
        let search = Arc::new(LatestSearch::new(Duration::from_millis(5)));

        let slow = {
            let search = search.clone();
            tokio::spawn(async move {
                search
                    .run(|| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        "old"
                    })
                    .await
            })
        };
        // Let the slow search get past its debounce and start running.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fast = search.run(|| async { "new" }).await;
        assert_eq!(fast, Ok("new"));
        assert_eq!(slow.await.unwrap(), Err(SearchError::Superseded));
    }

    #[test]
    fn default_window_is_half_a_second() {
        assert_eq!(LatestSearch::default().debounce, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn different_clients_do_not_supersede_each_other() {
        let registry = Arc::new(SearchRegistry::new(WINDOW, 8));

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let search = registry.for_client(Some("tab-a")).unwrap();
                search.run(|| async { "ana" }).await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = registry.for_client(Some("tab-b")).unwrap().run(|| async { "luis" }).await;
        assert_eq!(second, Ok("luis"));
        assert_eq!(first.await.unwrap(), Ok("ana"));
    }

    #[test]
    fn same_client_shares_one_searcher() {
        let registry = SearchRegistry::new(WINDOW, 8);
        let a = registry.for_client(Some("tab-a")).unwrap();
        let again = registry.for_client(Some(" tab-a ")).unwrap();
        assert!(Arc::ptr_eq(&a, &again));

        let anonymous = registry.for_client(None).unwrap();
        assert!(!Arc::ptr_eq(&anonymous, &registry.for_client(Some("")).unwrap()));
        assert_eq!(registry.tracked_clients(), 1);
    }

    #[test]
    fn least_recently_used_client_is_evicted() {
        let registry = SearchRegistry::new(WINDOW, 2);
        let a = registry.for_client(Some("a")).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        registry.for_client(Some("b")).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        // Touch "a" so "b" becomes the oldest.
        registry.for_client(Some("a")).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        registry.for_client(Some("c")).unwrap();

        assert_eq!(registry.tracked_clients(), 2);
        assert!(Arc::ptr_eq(&a, &registry.for_client(Some("a")).unwrap()));
    }
}

// services/payments-dash/src/fetcher.rs
//
// Keyed query cache for payment result sets
//
// Requests run on worker threads and report back over a channel. Completions
// are committed on the UI thread in `poll`, where the originating key is
// checked against the current one so an older response never replaces the
// view for a newer filter combination.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use svckit::{Payment, PaymentRow, Result, StatusFilter};
use tracing::{debug, info, warn};

use crate::location::{SEARCH_PARAM, STATUS_PARAM};

/// Identity of one logical fetch: the exact filter pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub status: StatusFilter,
    pub search: String,
}

impl QueryKey {
    pub fn new(status: StatusFilter, search: impl Into<String>) -> Self {
        Self {
            status,
            search: search.into(),
        }
    }

    /// Query parameters for the endpoint. `all` and empty search are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.status != StatusFilter::All {
            pairs.push((STATUS_PARAM, self.status.as_str().to_string()));
        }
        if !self.search.is_empty() {
            pairs.push((SEARCH_PARAM, self.search.clone()));
        }
        pairs
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "payments[status={}, search={:?}]", self.status, self.search)
    }
}

/// Source of payment result sets.
pub trait PaymentsBackend: Send + Sync {
    fn fetch(&self, key: &QueryKey) -> Result<Vec<Payment>>;
}

/// Outcome of one request, sent from the worker thread.
#[derive(Debug)]
pub struct Completion {
    pub key: QueryKey,
    pub result: Result<Vec<Payment>>,
}

/// What happened when a completion was committed.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// Result set for the current key is now displayed
    Committed { key: QueryKey, rows: usize },
    /// Response for a key that is no longer current; cached, not displayed
    Stale { key: QueryKey },
    /// Request for the current key failed; last-known-good rows stay visible
    Failed { key: QueryKey, error: String },
}

/// How long an unused result set stays cached by default.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Arc<[PaymentRow]>,
    fetched_at: Instant,
    /// Last moment the entry was stored or stopped being the current key
    last_used: Instant,
}

pub struct QueryClient {
    backend: Arc<dyn PaymentsBackend>,
    stale_time: Duration,
    cache_time: Duration,
    current: Option<QueryKey>,
    cache: HashMap<QueryKey, CacheEntry>,
    in_flight: HashSet<QueryKey>,
    displayed: Arc<[PaymentRow]>,
    displayed_key: Option<QueryKey>,
    last_error: Option<String>,
    requests_issued: u64,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl QueryClient {
    pub fn new(backend: Arc<dyn PaymentsBackend>, stale_time: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            backend,
            stale_time,
            cache_time: DEFAULT_CACHE_TIME,
            current: None,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
            displayed: Arc::from(Vec::new()),
            displayed_key: None,
            last_error: None,
            requests_issued: 0,
            tx,
            rx,
        }
    }

    /// Unused result sets older than `cache_time` are dropped.
    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    /// Make `key` current. Returns true if a request was dispatched.
    ///
    /// A cached result set for the key is displayed immediately. A request is
    /// only issued if none is in flight for the key and the cached entry (if
    /// any) is older than the stale time.
    pub fn set_key(&mut self, key: QueryKey, now: Instant) -> bool {
        if self.current.as_ref() == Some(&key) {
            return false;
        }
        debug!("Query key -> {}", key);
        if let Some(previous) = self.current.replace(key.clone()) {
            if let Some(entry) = self.cache.get_mut(&previous) {
                entry.last_used = now;
            }
        }
        self.last_error = None;
        self.evict_unused(now);

        if let Some(entry) = self.cache.get(&key) {
            self.displayed = Arc::clone(&entry.rows);
            self.displayed_key = Some(key.clone());
            if now.saturating_duration_since(entry.fetched_at) < self.stale_time {
                return false;
            }
        }

        if self.in_flight.contains(&key) {
            return false;
        }
        self.dispatch(key)
    }

    /// Re-request the current key, keeping its rows on screen meanwhile.
    pub fn refetch(&mut self) -> bool {
        match self.current.clone() {
            Some(key) if !self.in_flight.contains(&key) => self.dispatch(key),
            _ => false,
        }
    }

    /// Commit every completion that has arrived so far.
    pub fn poll(&mut self, now: Instant) -> Vec<FetchEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            events.push(self.deliver(completion, now));
        }
        self.evict_unused(now);
        events
    }

    /// Block up to `timeout` for the next completion and commit it.
    pub fn wait(&mut self, timeout: Duration) -> Option<FetchEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => Some(self.deliver(completion, Instant::now())),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Apply one completion to the cache and, if its key is current, to the view.
    pub fn deliver(&mut self, completion: Completion, now: Instant) -> FetchEvent {
        let Completion { key, result } = completion;
        self.in_flight.remove(&key);
        let is_current = self.current.as_ref() == Some(&key);

        match result {
            Ok(payments) => {
                let rows: Arc<[PaymentRow]> = PaymentRow::number(payments).into();
                let count = rows.len();
                self.cache.insert(
                    key.clone(),
                    CacheEntry {
                        rows: Arc::clone(&rows),
                        fetched_at: now,
                        last_used: now,
                    },
                );

                if is_current {
                    info!("Fetched {} payments for {}", count, key);
                    self.displayed = rows;
                    self.displayed_key = Some(key.clone());
                    self.last_error = None;
                    FetchEvent::Committed { key, rows: count }
                } else {
                    debug!("Discarding response for superseded {}", key);
                    FetchEvent::Stale { key }
                }
            }
            Err(e) => {
                if is_current {
                    warn!("Fetch failed for {}: {}", key, e);
                    let error = e.to_string();
                    self.last_error = Some(error.clone());
                    FetchEvent::Failed { key, error }
                } else {
                    debug!("Ignoring failure for superseded {}: {}", key, e);
                    FetchEvent::Stale { key }
                }
            }
        }
    }

    pub fn current_key(&self) -> Option<&QueryKey> {
        self.current.as_ref()
    }

    /// Rows on screen: the current key's result set, or the previous one as placeholder.
    pub fn rows(&self) -> &[PaymentRow] {
        &self.displayed
    }

    pub fn rows_arc(&self) -> Arc<[PaymentRow]> {
        Arc::clone(&self.displayed)
    }

    /// True while a request for the current key is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.current
            .as_ref()
            .map(|key| self.in_flight.contains(key))
            .unwrap_or(false)
    }

    /// True only while fetching with nothing at all to show.
    pub fn is_loading(&self) -> bool {
        self.is_fetching() && self.displayed_key.is_none()
    }

    /// True when the rows on screen belong to a previous key.
    pub fn is_placeholder(&self) -> bool {
        self.displayed_key.is_some() && self.displayed_key != self.current
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Number of result sets currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn evict_unused(&mut self, now: Instant) {
        let current = self.current.as_ref();
        let cache_time = self.cache_time;
        let before = self.cache.len();
        self.cache.retain(|key, entry| {
            Some(key) == current || now.saturating_duration_since(entry.last_used) < cache_time
        });
        let evicted = before - self.cache.len();
        if evicted > 0 {
            debug!("Evicted {} unused result sets", evicted);
        }
    }

    fn dispatch(&mut self, key: QueryKey) -> bool {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let job_key = key.clone();

        let spawned = thread::Builder::new()
            .name("payments-fetch".to_string())
            .spawn(move || {
                let result = backend.fetch(&job_key);
                // Receiver gone means the dashboard is shutting down.
                let _ = tx.send(Completion { key: job_key, result });
            });

        match spawned {
            Ok(_) => {
                debug!("Dispatched fetch for {}", key);
                self.in_flight.insert(key);
                self.requests_issued += 1;
                true
            }
            Err(e) => {
                warn!("Could not start fetch worker for {}: {}", key, e);
                self.last_error = Some(format!("Could not start fetch: {}", e));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use svckit::{DashError, PaymentStatus};

    const WAIT: Duration = Duration::from_secs(5);

    fn payment(id: &str, status: PaymentStatus, email: &str) -> Payment {
        Payment {
            id: id.to_string(),
            amount: 10.0,
            status,
            email: email.to_string(),
            date: "2024-01-01".to_string(),
        }
    }

    fn dataset() -> Vec<Payment> {
        vec![
            payment("1", PaymentStatus::Success, "ali@x.com"),
            payment("2", PaymentStatus::Failed, "bob@x.com"),
            payment("3", PaymentStatus::Failed, "alice@y.com"),
            payment("4", PaymentStatus::Pending, "carol@x.com"),
        ]
    }

    /// Filters a fixed dataset; keys registered with `hold` block until released.
    struct GatedBackend {
        data: Vec<Payment>,
        calls: Mutex<Vec<QueryKey>>,
        gates: Mutex<HashMap<QueryKey, Receiver<()>>>,
        fail: Mutex<HashSet<QueryKey>>,
    }

    impl GatedBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                data: dataset(),
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(HashMap::new()),
                fail: Mutex::new(HashSet::new()),
            })
        }

        fn hold(&self, key: &QueryKey) -> Sender<()> {
            let (tx, rx) = mpsc::channel();
            self.gates.lock().unwrap().insert(key.clone(), rx);
            tx
        }

        fn calls(&self) -> Vec<QueryKey> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PaymentsBackend for GatedBackend {
        fn fetch(&self, key: &QueryKey) -> Result<Vec<Payment>> {
            self.calls.lock().unwrap().push(key.clone());
            let gate = self.gates.lock().unwrap().remove(key);
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            if self.fail.lock().unwrap().contains(key) {
                return Err(DashError::Http(503));
            }
            Ok(self
                .data
                .iter()
                .filter(|p| key.status.matches(p.status))
                .filter(|p| p.email.contains(&key.search))
                .cloned()
                .collect())
        }
    }

    fn client(backend: &Arc<GatedBackend>) -> QueryClient {
        let backend: Arc<dyn PaymentsBackend> = backend.clone();
        QueryClient::new(backend, Duration::ZERO)
    }

    #[test]
    fn test_query_pairs_omit_defaults() {
        assert!(QueryKey::new(StatusFilter::All, "").query_pairs().is_empty());
        assert_eq!(
            QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "ali").query_pairs(),
            vec![("status", "failed".to_string()), ("search", "ali".to_string())]
        );
    }

    #[test]
    fn test_first_fetch_is_loading_then_commits_numbered_rows() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);
        let key = QueryKey::new(StatusFilter::All, "");

        assert!(client.set_key(key.clone(), Instant::now()));
        assert!(client.is_fetching());
        assert!(client.is_loading());

        let event = client.wait(WAIT).unwrap();
        assert_eq!(event, FetchEvent::Committed { key, rows: 4 });
        assert!(!client.is_fetching());
        assert!(!client.is_loading());

        let ordinals: Vec<usize> = client.rows().iter().map(|r| r.no).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_previous_rows_stay_visible_while_fetching_new_key() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        client.set_key(QueryKey::new(StatusFilter::All, ""), Instant::now());
        client.wait(WAIT).unwrap();

        let failed = QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "");
        let release = backend.hold(&failed);
        assert!(client.set_key(failed.clone(), Instant::now()));

        assert!(client.is_fetching());
        assert!(!client.is_loading());
        assert!(client.is_placeholder());
        assert_eq!(client.rows().len(), 4);

        release.send(()).unwrap();
        client.wait(WAIT).unwrap();
        assert_eq!(client.rows().len(), 2);
        assert!(!client.is_placeholder());
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        let all = QueryKey::new(StatusFilter::All, "");
        let failed = QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "");
        let release_all = backend.hold(&all);

        client.set_key(all.clone(), Instant::now());
        client.set_key(failed.clone(), Instant::now());

        let event = client.wait(WAIT).unwrap();
        assert_eq!(event, FetchEvent::Committed { key: failed.clone(), rows: 2 });

        release_all.send(()).unwrap();
        let event = client.wait(WAIT).unwrap();
        assert_eq!(event, FetchEvent::Stale { key: all });

        assert!(client
            .rows()
            .iter()
            .all(|r| r.payment.status == PaymentStatus::Failed));
        assert_eq!(client.current_key(), Some(&failed));
    }

    #[test]
    fn test_in_flight_key_is_not_requested_twice() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        let all = QueryKey::new(StatusFilter::All, "");
        let failed = QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "");
        let release_all = backend.hold(&all);

        assert!(client.set_key(all.clone(), Instant::now()));
        let release_failed = backend.hold(&failed);
        assert!(client.set_key(failed, Instant::now()));
        assert!(!client.set_key(all.clone(), Instant::now()));
        assert_eq!(client.requests_issued(), 2);

        release_all.send(()).unwrap();
        let event = client.wait(WAIT).unwrap();
        assert_eq!(event, FetchEvent::Committed { key: all, rows: 4 });
        release_failed.send(()).unwrap();
        client.wait(WAIT).unwrap();
    }

    #[test]
    fn test_fresh_cache_entry_is_reused() {
        let backend = GatedBackend::new();
        let backend_dyn: Arc<dyn PaymentsBackend> = backend.clone();
        let mut client = QueryClient::new(backend_dyn, Duration::from_secs(60));

        let all = QueryKey::new(StatusFilter::All, "");
        let failed = QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "");

        client.set_key(all.clone(), Instant::now());
        client.wait(WAIT).unwrap();
        client.set_key(failed, Instant::now());
        client.wait(WAIT).unwrap();

        assert!(!client.set_key(all, Instant::now()));
        assert_eq!(client.rows().len(), 4);
        assert!(!client.is_fetching());
        assert_eq!(backend.calls().len(), 2);
    }

    #[test]
    fn test_failure_keeps_last_known_good_rows() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        client.set_key(QueryKey::new(StatusFilter::All, ""), Instant::now());
        client.wait(WAIT).unwrap();

        let broken = QueryKey::new(StatusFilter::All, "zzz");
        backend.fail.lock().unwrap().insert(broken.clone());
        client.set_key(broken.clone(), Instant::now());

        match client.wait(WAIT).unwrap() {
            FetchEvent::Failed { key, error } => {
                assert_eq!(key, broken);
                assert!(error.contains("503"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!client.is_fetching());
        assert!(!client.is_loading());
        assert_eq!(client.rows().len(), 4);
        assert!(client.last_error().is_some());
    }

    #[test]
    fn test_failed_first_fetch_ends_loading_with_empty_rows() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        let broken = QueryKey::new(StatusFilter::All, "");
        backend.fail.lock().unwrap().insert(broken.clone());
        assert!(client.set_key(broken, Instant::now()));
        assert!(client.is_loading());

        assert!(matches!(client.wait(WAIT), Some(FetchEvent::Failed { .. })));
        assert!(!client.is_fetching());
        assert!(!client.is_loading());
        assert!(client.rows().is_empty());
        assert!(client.last_error().is_some());
    }

    #[test]
    fn test_key_change_clears_previous_error() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);

        client.set_key(QueryKey::new(StatusFilter::All, "nobody"), Instant::now());
        client.wait(WAIT).unwrap();
        assert!(client.rows().is_empty());

        let broken = QueryKey::new(StatusFilter::All, "zzz");
        backend.fail.lock().unwrap().insert(broken.clone());
        client.set_key(broken, Instant::now());
        client.wait(WAIT).unwrap();
        assert!(client.last_error().is_some());

        let next = QueryKey::new(StatusFilter::Only(PaymentStatus::Failed), "");
        let release = backend.hold(&next);
        assert!(client.set_key(next, Instant::now()));
        assert!(client.is_fetching());
        assert_eq!(client.last_error(), None);

        release.send(()).unwrap();
        client.wait(WAIT).unwrap();
    }

    #[test]
    fn test_unused_entries_are_evicted_after_cache_time() {
        let backend = GatedBackend::new();
        let backend_dyn: Arc<dyn PaymentsBackend> = backend.clone();
        let mut client = QueryClient::new(backend_dyn, Duration::ZERO)
            .with_cache_time(Duration::from_secs(60));

        let t0 = Instant::now();
        for search in ["a", "b", "c"] {
            client.set_key(QueryKey::new(StatusFilter::All, search), t0);
            client.wait(WAIT).unwrap();
        }
        assert_eq!(client.cached_len(), 3);

        // "a" and "b" were left at t0; "c" is still current
        client.poll(t0 + Duration::from_secs(30));
        assert_eq!(client.cached_len(), 3);
        client.poll(t0 + Duration::from_secs(61));
        assert_eq!(client.cached_len(), 1);

        let later = t0 + Duration::from_secs(200);
        let release = backend.hold(&QueryKey::new(StatusFilter::All, "d"));
        client.set_key(QueryKey::new(StatusFilter::All, "d"), later);
        // "c" was only released just now
        assert_eq!(client.cached_len(), 1);
        client.poll(later + Duration::from_secs(61));
        assert_eq!(client.cached_len(), 0);

        release.send(()).unwrap();
        client.wait(WAIT).unwrap();
        assert_eq!(client.cached_len(), 1);
        assert_eq!(client.current_key(), Some(&QueryKey::new(StatusFilter::All, "d")));
    }

    #[test]
    fn test_many_distinct_searches_do_not_grow_cache() {
        let backend = GatedBackend::new();
        let backend_dyn: Arc<dyn PaymentsBackend> = backend.clone();
        let mut client = QueryClient::new(backend_dyn, Duration::ZERO)
            .with_cache_time(Duration::from_secs(1));

        let t0 = Instant::now();
        for i in 0..50u64 {
            let now = t0 + Duration::from_secs(i * 2);
            client.set_key(QueryKey::new(StatusFilter::All, format!("q{}", i)), now);
            client.wait(WAIT).unwrap();
            client.poll(now);
        }
        assert!(client.cached_len() <= 2);
    }

    #[test]
    fn test_refetch_skips_when_in_flight() {
        let backend = GatedBackend::new();
        let mut client = client(&backend);
        let all = QueryKey::new(StatusFilter::All, "");
        let release = backend.hold(&all);

        assert!(!client.refetch());
        client.set_key(all, Instant::now());
        assert!(!client.refetch());
        release.send(()).unwrap();
        client.wait(WAIT).unwrap();
        assert!(client.refetch());
        client.wait(WAIT).unwrap();
        assert_eq!(backend.calls().len(), 2);
    }
}

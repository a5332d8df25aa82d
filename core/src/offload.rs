//! Offload path: memoized keystroke transitions on a worker thread.
//!
//! The interactive path computes every keystroke locally and renders right
//! away. The same keystrokes are also shipped to a worker thread that owns a
//! mirror `TypingSession` plus an `OffloadCache` of planned transitions. Its
//! responses are authoritative for timing and score fields only.
//!
//! Ordering rules:
//! - jobs of one session are sent, planned and answered strictly in arrival order
//! - under backpressure jobs are buffered client-side and sent later as one batch
//! - loading a new phrase drops buffered jobs and every response still tagged
//!   with the superseded session id
//! - a load that meets a full queue is held client-side and always goes out
//!   before the jobs of its session
//!
//! The cache lives on the worker thread and is only touched through messages.

use ahash::RandomState;
use flume::{Receiver, Sender, TrySendError};
use lru::LruCache;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::session::{AcceptResult, SessionBookkeeping, Transition, TypingSession};
use crate::syllable::{fold_key, SyllableUnit};
use crate::Config;

/// Memoization key: the only inputs `TypingSession::plan` depends on for a phrase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub cursor: usize,
    pub typed: String,
    pub ch: char,
}

impl CacheKey {
    pub fn for_session(session: &TypingSession, ch: char) -> Self {
        Self {
            cursor: session.cursor(),
            typed: session.current_typed().to_string(),
            ch: fold_key(ch),
        }
    }
}

/// Size-bounded map of planned transitions for the current phrase.
///
/// Entries are kept in recency order; once the ceiling is exceeded the oldest
/// fifth is evicted in one go.
pub struct OffloadCache {
    entries: LruCache<CacheKey, Transition, RandomState>,
    ceiling: usize,
    hits: usize,
    misses: usize,
}

impl OffloadCache {
    pub fn new(ceiling: usize) -> Self {
        Self {
            entries: LruCache::unbounded_with_hasher(RandomState::new()),
            ceiling: ceiling.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Transition> {
        match self.entries.get(key) {
            Some(t) => {
                self.hits += 1;
                Some(t.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, transition: Transition) {
        self.entries.put(key, transition);
        if self.entries.len() > self.ceiling {
            let evict = self.entries.len().div_ceil(5);
            for _ in 0..evict {
                if self.entries.pop_lru().is_none() {
                    break;
                }
            }
            trace!(evicted = evict, remaining = self.entries.len(), "offload cache trimmed");
        }
    }

    /// Plan `ch` for `session`, reusing a memoized transition when present.
    ///
    /// A finished session is planned directly: its cursor and typed text no
    /// longer identify the state of the last unit.
    pub fn plan(&mut self, session: &TypingSession, ch: char) -> Transition {
        if session.is_completed() {
            return session.plan(ch);
        }
        let key = CacheKey::for_session(session, ch);
        if let Some(t) = self.get(&key) {
            return t;
        }
        let t = session.plan(ch);
        self.insert(key, t.clone());
        t
    }

    /// Drop every entry. Called whenever a new phrase loads.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ceiling
    }

    /// (hits, misses) since the last invalidation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    /// Hit rate as a percentage, or `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f32> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f32 / total as f32 * 100.0)
        }
    }
}

/// One unit of offloaded work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Key {
        correlation_id: u64,
        ch: char,
        timestamp_ms: u64,
    },
    Tick {
        correlation_id: u64,
        now_ms: u64,
    },
}

impl Job {
    pub fn correlation_id(&self) -> u64 {
        match self {
            Job::Key { correlation_id, .. } | Job::Tick { correlation_id, .. } => *correlation_id,
        }
    }
}

#[derive(Debug)]
enum Request {
    Load {
        session_id: u64,
        units: Vec<SyllableUnit>,
        time_limit_ms: Option<u64>,
    },
    Jobs {
        session_id: u64,
        jobs: Vec<Job>,
    },
    Shutdown,
}

/// Worker answer to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffloadResponse {
    pub session_id: u64,
    pub correlation_id: u64,
    /// `None` for deadline ticks.
    pub result: Option<AcceptResult>,
    pub bookkeeping: SessionBookkeeping,
}

fn run_worker(requests: Receiver<Request>, responses: Sender<OffloadResponse>, ceiling: usize) {
    let mut cache = OffloadCache::new(ceiling);
    let mut current: Option<(u64, TypingSession)> = None;

    while let Ok(request) = requests.recv() {
        match request {
            Request::Load {
                session_id,
                units,
                time_limit_ms,
            } => {
                cache.invalidate();
                debug!(session_id, units = units.len(), "offload session loaded");
                current = Some((session_id, TypingSession::with_time_limit(units, time_limit_ms)));
            }
            Request::Jobs { session_id, jobs } => {
                let Some((id, session)) = current.as_mut() else {
                    continue;
                };
                if *id != session_id {
                    trace!(session_id, current = *id, "stale offload batch dropped");
                    continue;
                }
                for job in jobs {
                    let result = match job {
                        Job::Key { ch, timestamp_ms, .. } => {
                            let transition = cache.plan(session, ch);
                            Some(session.apply(&transition, timestamp_ms))
                        }
                        Job::Tick { now_ms, .. } => {
                            session.update(now_ms);
                            None
                        }
                    };
                    let response = OffloadResponse {
                        session_id,
                        correlation_id: job.correlation_id(),
                        result,
                        bookkeeping: session.bookkeeping(),
                    };
                    if responses.send(response).is_err() {
                        return;
                    }
                }
            }
            Request::Shutdown => break,
        }
    }
    debug!(hits = cache.stats().0, misses = cache.stats().1, "offload worker stopped");
}

/// Interactive-side handle to the offload worker.
pub struct OffloadClient {
    requests: Sender<Request>,
    responses: Receiver<OffloadResponse>,
    session_id: u64,
    /// First correlation id handed out for the current session.
    session_start: u64,
    next_correlation: u64,
    last_seen: u64,
    pending_load: Option<Request>,
    pending: Vec<Job>,
    worker: Option<JoinHandle<()>>,
}

impl OffloadClient {
    /// Start the worker thread using the cache ceiling and queue size from `config`.
    pub fn spawn(config: &Config) -> Result<Self> {
        let (req_tx, req_rx) = flume::bounded(config.offload_queue_capacity.max(1));
        let (resp_tx, resp_rx) = flume::unbounded();
        let ceiling = config.max_cache_size;
        let worker = std::thread::Builder::new()
            .name("typing-offload".to_string())
            .spawn(move || run_worker(req_rx, resp_tx, ceiling))
            .map_err(|e| Error::OffloadSpawn(e.to_string()))?;
        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
            session_id: 0,
            session_start: 1,
            next_correlation: 1,
            last_seen: 0,
            pending_load: None,
            pending: Vec::new(),
            worker: Some(worker),
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Correlation id of the most recent job, or 0 if none was queued.
    pub fn last_submitted(&self) -> u64 {
        self.next_correlation - 1
    }

    /// Jobs buffered because the request queue was full.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True while a phrase load is waiting for room in the request queue.
    pub fn has_pending_load(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Switch to a new phrase. Everything tagged with the old session is discarded.
    ///
    /// Never blocks: when the queue is full the load is held and sent by the
    /// next `flush`, ahead of any job of the new session.
    pub fn load(
        &mut self,
        session_id: u64,
        units: Vec<SyllableUnit>,
        time_limit_ms: Option<u64>,
    ) -> Result<()> {
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "pending offload jobs cancelled");
            self.pending.clear();
        }
        let stale = self.responses.drain().count();
        if stale > 0 {
            debug!(stale, "stale offload responses discarded");
        }
        self.session_id = session_id;
        self.session_start = self.next_correlation;
        let request = Request::Load {
            session_id,
            units,
            time_limit_ms,
        };
        match self.requests.try_send(request) {
            Ok(()) => {
                self.pending_load = None;
                Ok(())
            }
            Err(TrySendError::Full(request)) => {
                trace!(session_id, "offload queue full, load held");
                self.pending_load = Some(request);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::OffloadDisconnected),
        }
    }

    /// Queue a keystroke. Never blocks; returns its correlation id.
    pub fn submit(&mut self, ch: char, timestamp_ms: u64) -> u64 {
        let correlation_id = self.next_id();
        self.pending.push(Job::Key {
            correlation_id,
            ch,
            timestamp_ms,
        });
        self.flush();
        correlation_id
    }

    /// Queue a deadline check. Never blocks; returns its correlation id.
    pub fn tick(&mut self, now_ms: u64) -> u64 {
        let correlation_id = self.next_id();
        self.pending.push(Job::Tick {
            correlation_id,
            now_ms,
        });
        self.flush();
        correlation_id
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_correlation;
        self.next_correlation += 1;
        id
    }

    /// Try to hand buffered jobs to the worker as one ordered batch.
    pub fn flush(&mut self) -> bool {
        if let Some(load) = self.pending_load.take() {
            match self.requests.try_send(load) {
                Ok(()) => {}
                Err(TrySendError::Full(load)) => {
                    self.pending_load = Some(load);
                    return false;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("offload worker disconnected, load dropped");
                    return false;
                }
            }
        }
        if self.pending.is_empty() {
            return true;
        }
        let jobs = std::mem::take(&mut self.pending);
        match self.requests.try_send(Request::Jobs {
            session_id: self.session_id,
            jobs,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                if let Request::Jobs { jobs, .. } = request {
                    trace!(buffered = jobs.len(), "offload queue full, batching");
                    self.pending = jobs;
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("offload worker disconnected, jobs dropped");
                false
            }
        }
    }

    /// Responses for the current session, in order. Stale ones are dropped.
    pub fn poll(&mut self) -> Vec<OffloadResponse> {
        self.flush();
        let incoming: Vec<OffloadResponse> = self.responses.try_iter().collect();
        incoming
            .into_iter()
            .filter(|r| self.accept_response(r))
            .collect()
    }

    /// Block until the response for `correlation_id` arrives or `timeout` passes.
    ///
    /// Ids from before the current session will never be answered, so they
    /// return at once.
    pub fn wait_for(&mut self, correlation_id: u64, timeout: Duration) -> Vec<OffloadResponse> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        if correlation_id < self.session_start {
            return out;
        }
        while self.last_seen < correlation_id {
            self.flush();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self
                .responses
                .recv_timeout(remaining.min(Duration::from_millis(20)))
            {
                Ok(r) => {
                    if self.accept_response(&r) {
                        out.push(r);
                    }
                }
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            }
        }
        out
    }

    fn accept_response(&mut self, response: &OffloadResponse) -> bool {
        if response.session_id != self.session_id {
            warn!(
                session_id = response.session_id,
                current = self.session_id,
                "late offload response for superseded session discarded"
            );
            return false;
        }
        if response.correlation_id <= self.last_seen {
            return false;
        }
        self.last_seen = response.correlation_id;
        true
    }
}

impl Drop for OffloadClient {
    fn drop(&mut self) {
        // With a full queue the worker is left to exit on disconnect instead.
        let queued = self.requests.try_send(Request::Shutdown).is_ok();
        if let Some(worker) = self.worker.take() {
            if queued {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<SyllableUnit> {
        vec![
            SyllableUnit::new("す", vec!["su".into()]),
            SyllableUnit::new("し", vec!["si".into(), "shi".into(), "ci".into()]),
        ]
    }

    #[test]
    fn cache_hits_on_repeated_key() {
        let session = TypingSession::new(units());
        let mut cache = OffloadCache::new(10);
        let a = cache.plan(&session, 'x');
        let b = cache.plan(&session, 'X');
        assert_eq!(a, b);
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn finished_session_bypasses_cache() {
        let mut session = TypingSession::new(vec![
            SyllableUnit::new("ほ", vec!["ho".into()]),
            SyllableUnit::new("ん", vec!["n".into(), "nn".into(), "xn".into()]),
        ]);
        let mut cache = OffloadCache::new(10);
        for (i, c) in "hon".chars().enumerate() {
            let t = cache.plan(&session, c);
            session.apply(&t, i as u64 * 100);
        }
        assert!(session.is_completed());
        let entries = cache.len();

        let t = cache.plan(&session, 'n');
        assert!(t.is_accepted());
        session.apply(&t, 500);
        // after "nn" the same key is no longer an extension
        assert!(!cache.plan(&session, 'n').is_accepted());
        assert_eq!(cache.len(), entries);
    }

    #[test]
    fn cache_evicts_oldest_fifth() {
        let session = TypingSession::new(units());
        let mut cache = OffloadCache::new(10);
        for c in 'a'..='k' {
            cache.plan(&session, c);
        }
        // 11 entries > 10: ceil(11 / 5) = 3 evicted
        assert_eq!(cache.len(), 8);
        let key = CacheKey::for_session(&session, 'a');
        assert!(cache.get(&key).is_none());
        let key = CacheKey::for_session(&session, 'k');
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn invalidate_clears_everything() {
        let session = TypingSession::new(units());
        let mut cache = OffloadCache::new(10);
        cache.plan(&session, 's');
        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.hit_rate(), None);
    }

    #[test]
    fn worker_mirrors_local_bookkeeping() {
        let mut client = OffloadClient::spawn(&Config::default()).unwrap();
        client.load(1, units(), None).unwrap();
        let mut local = TypingSession::new(units());
        let mut last = 0;
        for (i, c) in "suxshi".chars().enumerate() {
            local.accept(c, i as u64 * 100);
            last = client.submit(c, i as u64 * 100);
        }
        let responses = client.wait_for(last, Duration::from_secs(5));
        let final_response = responses.last().unwrap();
        assert_eq!(final_response.correlation_id, last);
        assert_eq!(final_response.bookkeeping, local.bookkeeping());
        let ids: Vec<u64> = responses.iter().map(|r| r.correlation_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    /// A client wired to channels the test drives by hand, with no worker.
    fn detached(capacity: usize) -> (OffloadClient, Receiver<Request>, Sender<OffloadResponse>) {
        let (req_tx, req_rx) = flume::bounded(capacity);
        let (resp_tx, resp_rx) = flume::unbounded();
        let client = OffloadClient {
            requests: req_tx,
            responses: resp_rx,
            session_id: 0,
            session_start: 1,
            next_correlation: 1,
            last_seen: 0,
            pending_load: None,
            pending: Vec::new(),
            worker: None,
        };
        (client, req_rx, resp_tx)
    }

    #[test]
    fn load_on_full_queue_does_not_block() {
        let (mut client, requests, _responses) = detached(1);
        client.load(1, units(), None).unwrap();
        // queue is now full with the first load
        client.submit('s', 0);
        assert_eq!(client.pending_len(), 1);

        client.load(2, units(), None).unwrap();
        assert!(client.has_pending_load());
        assert_eq!(client.pending_len(), 0);
        let key = client.submit('s', 10);

        assert!(matches!(requests.recv().unwrap(), Request::Load { session_id: 1, .. }));
        assert!(!client.flush());
        assert!(matches!(requests.recv().unwrap(), Request::Load { session_id: 2, .. }));
        assert!(!client.has_pending_load());
        assert!(client.flush());
        match requests.recv().unwrap() {
            Request::Jobs { session_id, jobs } => {
                assert_eq!(session_id, 2);
                assert_eq!(jobs.len(), 1);
                assert_eq!(jobs[0].correlation_id(), key);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn drop_with_full_queue_returns() {
        let mut client = OffloadClient::spawn(&Config {
            offload_queue_capacity: 1,
            ..Config::default()
        })
        .unwrap();
        client.load(1, units(), None).unwrap();
        for (i, c) in "susisusi".chars().enumerate() {
            client.submit(c, i as u64);
        }
        client.load(2, units(), None).unwrap();
        drop(client);
    }

    #[test]
    fn wait_for_previous_session_returns_at_once() {
        let (mut client, _requests, _responses) = detached(8);
        client.load(1, units(), None).unwrap();
        client.submit('s', 0);
        client.load(2, units(), None).unwrap();
        let started = Instant::now();
        let responses = client.wait_for(client.last_submitted(), Duration::from_secs(5));
        assert!(responses.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn loading_discards_superseded_session() {
        let mut client = OffloadClient::spawn(&Config::default()).unwrap();
        client.load(1, units(), None).unwrap();
        client.submit('s', 0);
        client.load(2, units(), None).unwrap();
        let id = client.submit('s', 10);
        let responses = client.wait_for(id, Duration::from_secs(5));
        assert!(responses.iter().all(|r| r.session_id == 2));
        assert_eq!(responses.last().unwrap().bookkeeping.key_count, 1);
    }
}

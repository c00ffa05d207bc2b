//! A claimable job queue and a sliding-window counter.
//!
//! The original deployment used Postgres's `SELECT ... FOR UPDATE SKIP
//! LOCKED` to let several worker processes pull queued runs without
//! double-claiming one, and a small Lua script against Redis sorted sets to
//! maintain the circuit breaker's rolling failure window atomically. Neither
//! a real database nor Redis is in scope here (see the crate's non-goals),
//! so both primitives are reproduced as in-process, lock-guarded data
//! structures with the same externally observable behavior: claiming is
//! exclusive and non-blocking, and window counts only ever reflect events
//! within the trailing `window`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

/// A single queued item together with the key it's claimed exclusively
/// against (e.g. an organization id, so two campaigns in the same org never
/// run a batch concurrently beyond the configured limit).
#[derive(Debug, Clone)]
struct Entry<T> {
    id: Uuid,
    key: String,
    payload: T,
    claimed: bool,
}

/// A job a worker is holding after a successful claim. Dropping this without
/// calling [`JobQueue::ack`] or [`JobQueue::release`] leaves the job claimed
/// forever within this process's lifetime — callers are expected to always
/// resolve a claim, matching how a crashed worker's row lock would instead be
/// released by the database on connection loss (not modeled here, since
/// there is no connection to lose).
#[derive(Debug, Clone)]
pub struct Claim<T> {
    pub id: Uuid,
    pub key: String,
    pub payload: T,
}

/// FIFO-per-key job queue with exclusive claiming.
///
/// `max_concurrent_per_key` bounds how many claims may be outstanding for a
/// given key at once (modeling a per-organization concurrency cap); `None`
/// means unbounded.
pub struct JobQueue<T> {
    inner: Mutex<JobQueueInner<T>>,
}

struct JobQueueInner<T> {
    entries: VecDeque<Entry<T>>,
    outstanding_by_key: HashMap<String, usize>,
    max_concurrent_per_key: Option<usize>,
}

impl<T: Clone> JobQueue<T> {
    pub fn new(max_concurrent_per_key: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(JobQueueInner {
                entries: VecDeque::new(),
                outstanding_by_key: HashMap::new(),
                max_concurrent_per_key,
            }),
        }
    }

    /// Enqueue `payload` under `key`, returning the id it was assigned.
    pub async fn enqueue(&self, key: impl Into<String>, payload: T) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.entries.push_back(Entry {
            id,
            key: key.into(),
            payload,
            claimed: false,
        });
        id
    }

    /// Claim up to `limit` unclaimed entries whose key has spare concurrency,
    /// in FIFO order. This never blocks: a key at its concurrency cap, or a
    /// queue with no unclaimed entries, simply yields fewer than `limit`
    /// claims (or none).
    pub async fn claim_for_processing(&self, limit: usize) -> Vec<Claim<T>> {
        let mut inner = self.inner.lock().await;
        let mut claimed = Vec::new();
        let JobQueueInner {
            entries,
            outstanding_by_key,
            max_concurrent_per_key,
        } = &mut *inner;
        for entry in entries.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if entry.claimed {
                continue;
            }
            let outstanding = outstanding_by_key.get(&entry.key).copied().unwrap_or(0);
            if let Some(cap) = max_concurrent_per_key {
                if outstanding >= *cap {
                    continue;
                }
            }
            entry.claimed = true;
            *outstanding_by_key.entry(entry.key.clone()).or_insert(0) += 1;
            claimed.push(Claim {
                id: entry.id,
                key: entry.key.clone(),
                payload: entry.payload.clone(),
            });
        }
        claimed
    }

    /// Acknowledge completion of a claim, removing it from the queue and
    /// freeing its key's concurrency slot.
    pub async fn ack(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        if let Some(pos) = inner.entries.iter().position(|e| e.id == id) {
            let entry = inner.entries.remove(pos).unwrap();
            if let Some(count) = inner.outstanding_by_key.get_mut(&entry.key) {
                *count = count.saturating_sub(1);
            }
        }
    }

    /// Release a claim back to unclaimed, for retry, without removing it
    /// from the queue.
    pub async fn release(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        if let Some(count) = inner
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.key.clone())
        {
            if let Some(c) = inner.outstanding_by_key.get_mut(&count) {
                *c = c.saturating_sub(1);
            }
        }
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
            entry.claimed = false;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

/// A fixed-width sliding window of timestamped events, used by the circuit
/// breaker to decide whether a per-organization failure rate has crossed its
/// threshold. Equivalent to a Redis sorted set scored by timestamp with a
/// `ZREMRANGEBYSCORE` eviction before every `ZCARD`.
pub struct SlidingWindowCounter {
    window: Duration,
    events: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Record an event at the current instant and return the count of events
    /// (including this one) still within the window.
    pub async fn record(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        events.push_back(now);
        self.evict_locked(&mut events, now);
        events.len()
    }

    /// Count events within the window without recording a new one.
    pub async fn count(&self) -> usize {
        let now = Instant::now();
        let mut events = self.events.lock().await;
        self.evict_locked(&mut events, now);
        events.len()
    }

    pub async fn reset(&self) {
        self.events.lock().await.clear();
    }

    fn evict_locked(&self, events: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = events.front() {
            if now.duration_since(front) > self.window {
                events.pop_front();
            } else {
                break;
            }
        }
    }
}

//! In-memory crawl frontier
//!
//! Priority queue of pending fetch requests. Detail pages are served before
//! listing pages so the queue stays shallow while pagination fans out;
//! within a priority, requests come out in the order they went in.
//!
//! Newly discovered requests are deduplicated by normalised URL. Retries skip
//! that check, since they re-issue a request that was already admitted.
//! A retry with a backoff waits outside the queue until it is due, so it
//! holds no fetch slot while waiting.

use crate::crawler::{FetchRequest, RequestKind};
use crate::url::dedup_key;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// A request queued for fetching with priority information
#[derive(Debug, Clone)]
struct QueuedRequest {
    request: FetchRequest,

    /// Priority value (lower is higher priority)
    priority: u32,

    /// Insertion counter, for FIFO order within a priority
    sequence: u64,
}

// Lower priority values and older entries are popped first from BinaryHeap
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedRequest {}

fn priority_of(request: &FetchRequest) -> u32 {
    match request.kind {
        RequestKind::Detail => 0,
        RequestKind::Listing { .. } => 10,
    }
}

/// Pending fetch requests of one crawl run
#[derive(Debug, Default)]
pub struct Frontier {
    queue: BinaryHeap<QueuedRequest>,
    seen: HashSet<String>,
    /// Retries waiting out their backoff, with the instant they become due
    delayed: Vec<(Instant, FetchRequest)>,
    next_sequence: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a newly discovered request
    ///
    /// # Returns
    ///
    /// * `true` - The request was queued
    /// * `false` - A request for the same normalised URL was queued before
    pub fn push(&mut self, request: FetchRequest) -> bool {
        if !self.seen.insert(dedup_key(&request.url)) {
            tracing::trace!("Skipping already queued URL {}", request.url);
            return false;
        }

        self.enqueue(request);
        true
    }

    /// Re-enqueues a failed request without the URL check
    ///
    /// The request becomes poppable once `delay` has elapsed.
    pub fn push_retry(&mut self, request: FetchRequest, delay: Duration) {
        if delay.is_zero() {
            self.enqueue(request);
        } else {
            self.delayed.push((Instant::now() + delay, request));
        }
    }

    /// Removes and returns the next request to fetch
    ///
    /// Retries still inside their backoff are not returned.
    pub fn pop(&mut self) -> Option<FetchRequest> {
        self.promote_due(Instant::now());
        self.queue.pop().map(|queued| queued.request)
    }

    /// When the earliest waiting retry becomes due
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.delayed.iter().map(|(due, _)| *due).min()
    }

    /// Number of retries waiting out their backoff
    pub fn waiting_count(&self) -> usize {
        self.delayed.len()
    }

    /// Number of pending requests, waiting retries included
    pub fn len(&self) -> usize {
        self.queue.len() + self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.delayed.is_empty()
    }

    /// Number of distinct URLs ever admitted
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    fn promote_due(&mut self, now: Instant) {
        if self.delayed.is_empty() {
            return;
        }

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.delayed = waiting;

        for (_, request) in due {
            self.enqueue(request);
        }
    }

    fn enqueue(&mut self, request: FetchRequest) {
        let priority = priority_of(&request);
        self.next_sequence += 1;

        self.queue.push(QueuedRequest {
            request,
            priority,
            sequence: self.next_sequence,
        });
    }
}

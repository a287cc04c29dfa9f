//! Per-run set of claimed identifiers
//!
//! A `VisitedSet` is created for one crawl run and shared by handle with every
//! in-flight expansion task. It is the only place that decides whether an
//! identifier has already been seen.

use crate::identifier::Identifier;
use std::collections::HashSet;
use std::sync::Mutex;

/// Outcome of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns this identifier and may enqueue it
    Claimed,
    /// Another discovery path claimed it first
    AlreadyClaimed,
    /// The per-run claim budget is spent; discovery is halted
    CapacityReached,
}

/// Append-only set of identifiers claimed during one crawl run
#[derive(Debug, Default)]
pub struct VisitedSet {
    claimed: Mutex<HashSet<Identifier>>,
    capacity: Option<usize>,
}

impl VisitedSet {
    /// Creates an unbounded set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set that refuses new claims once `capacity` identifiers are held
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            claimed: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// Tests and marks `id` in one step
    ///
    /// Exactly one caller ever observes `true` for a given identifier.
    pub fn try_claim(&self, id: &Identifier) -> bool {
        self.claim(id) == Claim::Claimed
    }

    /// Tests and marks `id` in one step, reporting why a claim was refused
    pub fn claim(&self, id: &Identifier) -> Claim {
        let mut claimed = self.lock();

        if claimed.contains(id) {
            return Claim::AlreadyClaimed;
        }

        if let Some(capacity) = self.capacity {
            if claimed.len() >= capacity {
                return Claim::CapacityReached;
            }
        }

        claimed.insert(id.clone());
        Claim::Claimed
    }

    /// Records an identifier whose page has already been fetched
    ///
    /// Ignores the capacity limit: the fetch already happened, so the set must
    /// know about it to stop siblings from fetching it again. Returns `true`
    /// when the identifier was not known before.
    pub fn mark_fetched(&self, id: &Identifier) -> bool {
        self.lock().insert(id.clone())
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the claim budget has been spent
    pub fn is_saturated(&self) -> bool {
        self.capacity
            .map(|capacity| self.len() >= capacity)
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Identifier>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn id(value: &str) -> Identifier {
        Identifier::parse(value).unwrap()
    }

    #[test]
    fn test_first_claim_wins() {
        let visited = VisitedSet::new();
        assert!(visited.try_claim(&id("AAAAAAAAAA")));
        assert!(!visited.try_claim(&id("AAAAAAAAAA")));
        assert!(!visited.try_claim(&id("AAAAAAAAAA")));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_distinct_identifiers_claim_independently() {
        let visited = VisitedSet::new();
        assert!(visited.try_claim(&id("AAAAAAAAAA")));
        assert!(visited.try_claim(&id("BBBBBBBBBB")));
        assert_eq!(visited.len(), 2);
        assert!(visited.contains(&id("BBBBBBBBBB")));
    }

    #[test]
    fn test_capacity_halts_new_claims() {
        let visited = VisitedSet::with_capacity_limit(Some(2));
        assert_eq!(visited.claim(&id("AAAAAAAAAA")), Claim::Claimed);
        assert_eq!(visited.claim(&id("BBBBBBBBBB")), Claim::Claimed);
        assert_eq!(visited.claim(&id("CCCCCCCCCC")), Claim::CapacityReached);
        assert_eq!(visited.claim(&id("AAAAAAAAAA")), Claim::AlreadyClaimed);
        assert!(visited.is_saturated());
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_mark_fetched_is_idempotent_and_ignores_capacity() {
        let visited = VisitedSet::with_capacity_limit(Some(1));
        assert!(visited.try_claim(&id("AAAAAAAAAA")));
        assert!(!visited.mark_fetched(&id("AAAAAAAAAA")));
        assert!(visited.mark_fetched(&id("BBBBBBBBBB")));
        assert!(!visited.try_claim(&id("BBBBBBBBBB")));
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let visited = Arc::new(VisitedSet::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let visited = Arc::clone(&visited);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if visited.try_claim(&id("AAAAAAAAAA")) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(visited.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_claims_across_tasks() {
        let visited = Arc::new(VisitedSet::new());
        let candidates = ["AAAAAAAAAA", "BBBBBBBBBB", "CCCCCCCCCC"];

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let visited = Arc::clone(&visited);
            tasks.spawn(async move {
                let mut won = 0;
                for candidate in candidates {
                    tokio::task::yield_now().await;
                    if visited.try_claim(&id(candidate)) {
                        won += 1;
                    }
                }
                won
            });
        }

        let mut total = 0;
        while let Some(won) = tasks.join_next().await {
            total += won.unwrap();
        }

        assert_eq!(total, candidates.len());
    }
}

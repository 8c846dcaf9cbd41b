//! Shared enrichment budget.
//!
//! One [`EnrichmentBudget`] is created per run and handed to every worker
//! behind an `Arc`. It is the only state the workers share, and the only
//! place they can contend.

use std::sync::atomic::{AtomicUsize, Ordering};

/// How many more images may be sent for description in this run.
#[derive(Debug)]
pub struct EnrichmentBudget {
    initial: usize,
    remaining: AtomicUsize,
}

impl EnrichmentBudget {
    pub fn new(initial: usize) -> Self {
        Self {
            initial,
            remaining: AtomicUsize::new(initial),
        }
    }

    /// Take one unit of budget.
    ///
    /// Returns `false` and leaves the budget untouched when nothing remains.
    /// The decrement is a single compare-and-swap loop, so of N callers racing
    /// for the last unit exactly one wins.
    pub fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Current remaining budget. Advisory only: a positive value does not
    /// guarantee the next `try_consume` succeeds.
    pub fn peek(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    /// Units consumed so far.
    pub fn spent(&self) -> usize {
        self.initial - self.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn consumes_until_empty() {
        let budget = EnrichmentBudget::new(2);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.peek(), 0);
        assert_eq!(budget.spent(), 2);
    }

    #[test]
    fn zero_budget_never_consumes() {
        let budget = EnrichmentBudget::new(0);
        assert!(!budget.try_consume());
        assert_eq!(budget.peek(), 0);
    }

    #[test]
    fn peek_does_not_mutate() {
        let budget = EnrichmentBudget::new(3);
        assert_eq!(budget.peek(), 3);
        assert_eq!(budget.peek(), 3);
        assert_eq!(budget.initial(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_consumers_take_exactly_the_budget() {
        let budget = Arc::new(EnrichmentBudget::new(100));

        let handles: Vec<_> = (0..10_000)
            .map(|_| {
                let budget = Arc::clone(&budget);
                tokio::spawn(async move { budget.try_consume() })
            })
            .collect();

        let mut granted = 0;
        let mut refused = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            } else {
                refused += 1;
            }
        }

        assert_eq!(granted, 100);
        assert_eq!(refused, 9_900);
        assert_eq!(budget.peek(), 0);
    }

    #[test]
    fn last_unit_goes_to_exactly_one_thread() {
        for _ in 0..50 {
            let budget = EnrichmentBudget::new(1);
            let winners: usize = std::thread::scope(|s| {
                let handles: Vec<_> = (0..16).map(|_| s.spawn(|| budget.try_consume())).collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap() as usize)
                    .sum()
            });
            assert_eq!(winners, 1);
        }
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Cumulative byte tally for one direction of traffic.
#[derive(Debug, Default)]
pub struct ByteCounter(AtomicU64);

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// The pair of counters shared by every worker and read by the monitor.
///
/// Bytes recorded through [`add_sent`](Self::add_sent) and
/// [`add_received`](Self::add_received) are checked against the threshold; the
/// first time `sent + received` exceeds it, one waiter of
/// [`threshold_crossed`](Self::threshold_crossed) is woken.
#[derive(Debug)]
pub struct TrafficCounters {
    pub sent: ByteCounter,
    pub received: ByteCounter,
    threshold: u64,
    tripped: AtomicBool,
    crossed: Notify,
}

impl Default for TrafficCounters {
    fn default() -> Self {
        Self::with_threshold(u64::MAX)
    }
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            sent: ByteCounter::new(),
            received: ByteCounter::new(),
            threshold,
            tripped: AtomicBool::new(false),
            crossed: Notify::new(),
        }
    }

    /// Loads `(sent, received)`.
    pub fn load(&self) -> (u64, u64) {
        (self.sent.load(), self.received.load())
    }

    pub fn add_sent(&self, n: u64) {
        self.sent.add(n);
        self.check_threshold();
    }

    pub fn add_received(&self, n: u64) {
        self.received.add(n);
        self.check_threshold();
    }

    /// Resolves once the threshold has been crossed. The wake-up is stored if
    /// nobody is waiting yet.
    pub async fn threshold_crossed(&self) {
        self.crossed.notified().await;
    }

    fn check_threshold(&self) {
        if self.tripped.load(Ordering::Relaxed) {
            return;
        }
        let (sent, received) = self.load();
        if sent.saturating_add(received) > self.threshold
            && !self.tripped.swap(true, Ordering::AcqRel)
        {
            self.crossed.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn concurrent_adds_are_not_lost() {
        let counter = Arc::new(ByteCounter::new());
        let handles: Vec<_> = (1..=16u64)
            .map(|n| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.add(n);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: u64 = (1..=16u64).map(|n| n * 10_000).sum();
        assert_eq!(counter.load(), expected);
    }

    #[test]
    fn directions_are_independent() {
        let counters = TrafficCounters::new();
        counters.add_sent(3);
        counters.add_received(1024);
        counters.add_received(1);
        assert_eq!(counters.load(), (3, 1025));
    }

    #[tokio::test]
    async fn crossing_the_threshold_wakes_a_later_waiter() {
        let counters = TrafficCounters::with_threshold(100);
        counters.add_sent(40);
        counters.add_received(60);
        assert!(!counters.tripped.load(Ordering::SeqCst));

        counters.add_received(1);
        counters.add_received(500);

        tokio::time::timeout(Duration::from_secs(1), counters.threshold_crossed())
            .await
            .expect("threshold wake-up should be stored");
    }

    #[tokio::test]
    async fn threshold_wakes_only_once() {
        let counters = TrafficCounters::with_threshold(10);
        counters.add_received(11);
        counters.add_received(11);
        counters.threshold_crossed().await;

        let second =
            tokio::time::timeout(Duration::from_millis(50), counters.threshold_crossed()).await;
        assert!(second.is_err());
    }
}

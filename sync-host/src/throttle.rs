//! Per-key trailing-edge throttle.
//!
//! The first [`Throttle::arm`] for a quiet key starts a timer; further calls
//! inside the window are absorbed. When the window ends the timer reports a
//! [`ThrottleFired`] on the channel handed to [`Throttle::new`]. The window is
//! fixed: later arms do not push the deadline back, and nothing fires at the
//! leading edge.
//!
//! The timer only *reports*; the owner of the receiving end (the host actor)
//! does the actual work after checking [`Throttle::take_fire`]. Every armed
//! timer carries a generation number, so a fire that raced with
//! [`Throttle::cancel`] is recognised as stale and discarded.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A timer that reached the end of its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleFired<K> {
    /// Key the timer was armed for.
    pub key: K,
    /// Generation of the timer.
    pub generation: u64,
}

/// Trailing-edge throttle keyed by `K`.
#[derive(Debug)]
pub struct Throttle<K> {
    delay: Duration,
    next_generation: u64,
    armed: HashMap<K, (u64, JoinHandle<()>)>,
    fired: mpsc::UnboundedSender<ThrottleFired<K>>,
}

impl<K> Throttle<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    /// Create a throttle that reports fires on `fired`.
    pub fn new(delay: Duration, fired: mpsc::UnboundedSender<ThrottleFired<K>>) -> Self {
        Self {
            delay,
            next_generation: 0,
            armed: HashMap::new(),
            fired,
        }
    }

    /// Start a window for `key` unless one is already running.
    ///
    /// Returns `true` if a new timer was started. Must be called from within a
    /// tokio runtime.
    pub fn arm(&mut self, key: &K) -> bool {
        if self.armed.contains_key(key) {
            return false;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let delay = self.delay;
        let fired = self.fired.clone();
        let fired_key = key.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the owner shut down; nothing left to do.
            let _ = fired.send(ThrottleFired {
                key: fired_key,
                generation,
            });
        });

        self.armed.insert(key.clone(), (generation, handle));
        true
    }

    /// Accept a fire if it belongs to the currently armed timer.
    ///
    /// On success the key is disarmed so the next [`arm`](Self::arm) starts a
    /// fresh window. Stale fires return `false` and change nothing.
    pub fn take_fire(&mut self, fired: &ThrottleFired<K>) -> bool {
        match self.armed.get(&fired.key) {
            Some((generation, _)) if *generation == fired.generation => {
                self.armed.remove(&fired.key);
                true
            }
            _ => false,
        }
    }

    /// Abort the window for `key`. Returns `true` if one was running.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.armed.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every running window.
    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }

    /// Whether a window is running for `key`.
    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    /// Number of running windows.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl<K> Drop for Throttle<K> {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    fn throttle() -> (
        Throttle<&'static str>,
        mpsc::UnboundedReceiver<ThrottleFired<&'static str>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Throttle::new(WINDOW, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_trailing_edge() {
        let (mut throttle, mut rx) = throttle();

        assert!(throttle.arm(&"a"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!throttle.arm(&"a"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!throttle.arm(&"a"));

        assert!(rx.try_recv().is_err(), "no leading-edge fire");

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.key, "a");
        assert!(throttle.take_fire(&fired));
        assert!(!throttle.is_armed(&"a"));

        tokio::time::sleep(WINDOW * 2).await;
        assert!(rx.try_recv().is_err(), "at most one fire per window");
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_not_extended_by_later_arms() {
        let (mut throttle, mut rx) = throttle();
        let start = tokio::time::Instant::now();

        throttle.arm(&"a");
        tokio::time::sleep(Duration::from_millis(400)).await;
        throttle.arm(&"a");

        rx.recv().await.unwrap();
        assert!(start.elapsed() < WINDOW + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_window_never_fires() {
        let (mut throttle, mut rx) = throttle();

        throttle.arm(&"a");
        assert!(throttle.cancel(&"a"));
        assert!(!throttle.cancel(&"a"));

        tokio::time::sleep(WINDOW * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_rejected() {
        let (mut throttle, _rx) = throttle();

        throttle.arm(&"a");
        let stale = ThrottleFired {
            key: "a",
            generation: 1,
        };
        throttle.cancel(&"a");
        throttle.arm(&"a");

        assert!(!throttle.take_fire(&stale));
        assert!(throttle.is_armed(&"a"));
        assert!(throttle.take_fire(&ThrottleFired {
            key: "a",
            generation: 2
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let (mut throttle, mut rx) = throttle();

        throttle.arm(&"a");
        tokio::time::sleep(Duration::from_millis(200)).await;
        throttle.arm(&"b");
        assert_eq!(throttle.armed_count(), 2);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.key, "a");
        assert_eq!(second.key, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_every_timer() {
        let (mut throttle, mut rx) = throttle();

        throttle.arm(&"a");
        throttle.arm(&"b");
        throttle.cancel_all();
        assert_eq!(throttle.armed_count(), 0);

        tokio::time::sleep(WINDOW * 2).await;
        assert!(rx.try_recv().is_err());
    }
}

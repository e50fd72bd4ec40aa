//! # Deduplicating, rate-limited work queue.
//!
//! One [`WorkQueue`] is shared by every watch handler and every worker of a
//! controller. It tracks each key in one of these places:
//!
//! ```text
//!            add(k)                 get()                  done(k)
//!   ───────────────► queued ─────────────► in_flight ──────────────► (gone)
//!                      ▲                      │ add(k) while in flight
//!                      │                      ▼
//!                      └─────── done(k) ── dirty
//!
//!   add_after(k, d) / add_rate_limited(k) ──► delayed ──(ready)──► add(k)
//! ```
//!
//! ## Rules
//! - A key is never both queued and in flight.
//! - `add` of a queued key is a no-op; `add` of an in-flight key marks it
//!   dirty, once, however many times it is called.
//! - `done` of a dirty key re-queues it, so the latest state is processed
//!   after, never concurrently with, the current attempt.
//! - `get` hands out queued keys in FIFO order and suspends the caller
//!   while nothing is queued.
//! - `add`, `add_after` and `add_rate_limited` never block.
//! - After `shut_down`, `get` returns `None` and adds are ignored; in-flight
//!   keys may still call `done`.
//!
//! Delayed keys are promoted by a single background loop
//! ([`WorkQueue::run_delay_loop`]) that sleeps until the earliest ready time.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::key::ReconcileKey;
use crate::queue::delay::DelayHeap;
use crate::queue::rate_limit::RateLimiter;

#[derive(Default)]
struct State {
    order: VecDeque<ReconcileKey>,
    queued: HashSet<ReconcileKey>,
    in_flight: HashSet<ReconcileKey>,
    dirty: HashSet<ReconcileKey>,
    delayed: DelayHeap,
    shutting_down: bool,
}

impl State {
    /// Inserts `key`; returns true if it became queued (a worker should wake).
    ///
    /// A queued key is ready now, so any later delayed add of it is dropped.
    fn insert(&mut self, key: ReconcileKey) -> bool {
        if self.in_flight.contains(&key) {
            self.dirty.insert(key);
            return false;
        }
        if !self.queued.insert(key.clone()) {
            return false;
        }
        self.delayed.cancel(&key);
        self.order.push_back(key);
        true
    }
}

/// Work queue of reconcile keys shared by one controller's handlers and workers.
pub struct WorkQueue {
    name: Arc<str>,
    state: Mutex<State>,
    ready: Notify,
    delay_wake: Notify,
    limiter: Arc<dyn RateLimiter>,
}

impl WorkQueue {
    /// Creates a queue. `name` is used in logs.
    pub fn new(name: impl Into<Arc<str>>, limiter: Arc<dyn RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(State::default()),
            ready: Notify::new(),
            delay_wake: Notify::new(),
            limiter,
        })
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `key` as needing processing.
    pub fn add(&self, key: ReconcileKey) {
        let woke = {
            let mut st = self.lock();
            !st.shutting_down && st.insert(key)
        };
        if woke {
            self.ready.notify_one();
        }
    }

    /// Adds `key` once `delay` has elapsed. A zero delay adds immediately.
    /// No-op while `key` is already queued.
    pub fn add_after(&self, key: ReconcileKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let scheduled = {
            let mut st = self.lock();
            !st.shutting_down
                && !st.queued.contains(&key)
                && st.delayed.schedule(key, Instant::now() + delay)
        };
        if scheduled {
            self.delay_wake.notify_one();
        }
    }

    /// Adds `key` after the delay chosen by the rate limiter, and returns that delay.
    pub fn add_rate_limited(&self, key: ReconcileKey) -> Duration {
        let delay = self.limiter.when(&key);
        self.add_after(key, delay);
        delay
    }

    /// Clears the rate limiter's failure history for `key`.
    pub fn forget(&self, key: &ReconcileKey) {
        self.limiter.forget(key);
    }

    /// Rate-limited requeues of `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &ReconcileKey) -> u32 {
        self.limiter.num_requeues(key)
    }

    /// Waits for the next queued key and marks it in flight.
    ///
    /// Returns `None` once the queue is shut down; the caller should exit.
    pub async fn get(&self) -> Option<ReconcileKey> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (key, more) = {
                let mut st = self.lock();
                if st.shutting_down {
                    return None;
                }
                let key = st.order.pop_front();
                if let Some(key) = &key {
                    st.queued.remove(key);
                    st.in_flight.insert(key.clone());
                }
                (key, !st.order.is_empty())
            };
            if let Some(key) = key {
                if more {
                    self.ready.notify_one();
                }
                return Some(key);
            }
            notified.await;
        }
    }

    /// Marks `key` as processed. Re-queues it if it was added while in flight.
    pub fn done(&self, key: &ReconcileKey) {
        let woke = {
            let mut st = self.lock();
            st.in_flight.remove(key);
            if st.dirty.remove(key) && !st.shutting_down {
                st.insert(key.clone())
            } else {
                false
            }
        };
        if woke {
            self.ready.notify_one();
        }
    }

    /// Number of queued keys (excluding in-flight and delayed ones).
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys waiting for their delay to elapse.
    pub fn delayed_len(&self) -> usize {
        self.lock().delayed.len()
    }

    /// Keys currently being processed, sorted.
    pub fn in_flight(&self) -> Vec<ReconcileKey> {
        let mut keys: Vec<_> = self.lock().in_flight.iter().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Stops handing out work. Idempotent; wakes every blocked `get`.
    pub fn shut_down(&self) {
        {
            let mut st = self.lock();
            st.shutting_down = true;
            st.order.clear();
            st.queued.clear();
            st.dirty.clear();
            st.delayed.clear();
        }
        self.ready.notify_waiters();
        self.delay_wake.notify_waiters();
    }

    /// True once [`shut_down`](Self::shut_down) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Promotes delayed keys into the queue as their ready time passes.
    /// Returns when the queue shuts down.
    pub async fn run_delay_loop(self: Arc<Self>) {
        loop {
            let notified = self.delay_wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (promoted, next) = {
                let mut st = self.lock();
                if st.shutting_down {
                    return;
                }
                let mut promoted = 0usize;
                for key in st.delayed.pop_ready(Instant::now()) {
                    if st.insert(key) {
                        promoted += 1;
                    }
                }
                (promoted, st.delayed.next_ready())
            };
            for _ in 0..promoted {
                self.ready.notify_one();
            }

            match next {
                Some(at) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(at) => {}
                        _ = &mut notified => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::queue::rate_limit::ItemBackoffLimiter;

    fn queue() -> Arc<WorkQueue> {
        let backoff = BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        WorkQueue::new("test", Arc::new(ItemBackoffLimiter::new(backoff)))
    }

    fn key(name: &str) -> ReconcileKey {
        ReconcileKey::new("default", name)
    }

    #[tokio::test]
    async fn duplicates_collapse_and_order_is_fifo() {
        let q = queue();
        q.add(key("a"));
        q.add(key("b"));
        q.add(key("a"));
        assert_eq!(q.len(), 2);

        assert_eq!(q.get().await, Some(key("a")));
        assert_eq!(q.get().await, Some(key("b")));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn add_while_in_flight_redelivers_once_after_done() {
        let q = queue();
        q.add(key("a"));
        let a = q.get().await.expect("a");

        q.add(key("a"));
        q.add(key("a"));
        q.add(key("a"));
        assert!(q.is_empty(), "in-flight key must not be queued");
        assert_eq!(q.in_flight(), vec![key("a")]);

        q.done(&a);
        assert_eq!(q.len(), 1);
        let again = q.get().await.expect("redelivered");
        assert_eq!(again, key("a"));
        q.done(&again);
        assert!(q.is_empty());
        assert!(q.in_flight().is_empty());
    }

    #[tokio::test]
    async fn done_without_re_add_drops_the_key() {
        let q = queue();
        q.add(key("a"));
        let a = q.get().await.expect("a");
        q.done(&a);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn get_blocks_until_add() {
        let q = queue();
        let waiter = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.get().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        q.add(key("late"));
        assert_eq!(waiter.await.expect("join"), Some(key("late")));
    }

    #[tokio::test]
    async fn shut_down_wakes_all_getters_and_ignores_adds() {
        let q = queue();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                tokio::spawn(async move { q.get().await })
            })
            .collect();
        tokio::task::yield_now().await;

        q.shut_down();
        q.shut_down();
        for w in waiters {
            assert_eq!(w.await.expect("join"), None);
        }

        q.add(key("a"));
        assert!(q.is_empty());
        assert_eq!(q.get().await, None);
        assert!(q.is_shutting_down());
    }

    #[tokio::test]
    async fn in_flight_key_may_finish_after_shutdown() {
        let q = queue();
        q.add(key("a"));
        let a = q.get().await.expect("a");
        q.shut_down();
        q.add(key("a"));
        q.done(&a);
        assert!(q.in_flight().is_empty());
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn add_after_promotes_when_ready() {
        let q = queue();
        let ticker = tokio::spawn(Arc::clone(&q).run_delay_loop());

        q.add_after(key("a"), Duration::from_millis(50));
        q.add_after(key("a"), Duration::from_millis(500));
        assert_eq!(q.delayed_len(), 1);
        assert!(q.is_empty());

        let started = Instant::now();
        assert_eq!(q.get().await, Some(key("a")));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_millis(500));

        q.shut_down();
        ticker.await.expect("ticker exits");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_delays_grow_until_forget() {
        let q = queue();
        let k = key("flaky");
        let delays: Vec<_> = (0..4).map(|_| q.add_rate_limited(k.clone())).collect();
        assert_eq!(
            delays,
            [10, 20, 40, 80].map(Duration::from_millis).to_vec()
        );
        assert_eq!(q.num_requeues(&k), 4);

        q.forget(&k);
        assert_eq!(q.num_requeues(&k), 0);
        assert_eq!(q.add_rate_limited(k), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_requeue_supersedes_pending_retry() {
        let q = queue();
        q.add(key("a"));
        let a = q.get().await.expect("a");

        q.add(key("a"));
        assert_eq!(q.add_rate_limited(a.clone()), Duration::from_millis(10));
        assert_eq!(q.delayed_len(), 1);

        q.done(&a);
        assert_eq!(q.len(), 1);
        assert_eq!(q.delayed_len(), 0);

        q.add_after(key("a"), Duration::from_millis(10));
        assert_eq!(q.delayed_len(), 0, "queued key is not delayed again");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_never_share_a_key() {
        let q = queue();
        let busy = Arc::new(Mutex::new(HashSet::new()));
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let mut workers = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            let busy = Arc::clone(&busy);
            let seen = Arc::clone(&seen);
            workers.push(tokio::spawn(async move {
                while let Some(k) = q.get().await {
                    assert!(busy.lock().expect("lock").insert(k.clone()), "{k} processed twice");
                    tokio::task::yield_now().await;
                    busy.lock().expect("lock").remove(&k);
                    seen.lock().expect("lock").insert(k.clone());
                    q.done(&k);
                }
            }));
        }

        for round in 0..200 {
            q.add(key(&format!("k{}", round % 5)));
            if round % 10 == 0 {
                tokio::task::yield_now().await;
            }
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while !(q.is_empty() && q.in_flight().is_empty()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue drains");

        q.shut_down();
        for w in workers {
            w.await.expect("worker did not panic");
        }
        let expected: HashSet<_> = (0..5).map(|i| key(&format!("k{i}"))).collect();
        assert_eq!(*seen.lock().expect("lock"), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_of_distinct_keys_are_all_delivered_once() {
        let q = queue();
        let adders: Vec<_> = (0..8)
            .map(|t| {
                let q = Arc::clone(&q);
                tokio::spawn(async move {
                    for i in 0..25 {
                        q.add(key(&format!("t{t}-{i}")));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for a in adders {
            a.await.expect("adder");
        }
        assert_eq!(q.len(), 200);

        let mut got = Vec::new();
        while !q.is_empty() {
            let k = q.get().await.expect("key");
            q.done(&k);
            got.push(k);
        }
        assert_eq!(got.len(), 200);
        let unique: HashSet<_> = got.into_iter().collect();
        assert_eq!(unique.len(), 200);
        assert!(unique.contains(&key("t0-0")) && unique.contains(&key("t7-24")));
    }
}

/*!
 * Wait Queue
 *
 * Keyed blocking for kernel conditions. Every control-block condition
 * ("data available", "child exited", ...) is a key; waiters sleep on the key
 * and wakers advance it.
 *
 * Wakeups are epoch-based so they cannot be lost across the kernel lock:
 * a waiter reads the key's epoch with `prepare` while it still holds the
 * lock that guards the condition's state, releases that lock, and then
 * sleeps in `wait` until the epoch moves past the ticket. Signals and
 * broadcasts advance the epoch under the same lock, so any wake issued
 * after `prepare` is observed even if it lands before `wait` starts.
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-key waiter state.
struct WaitSlot {
    epoch: Mutex<u64>,
    cond: Condvar,
    waiters: AtomicUsize,
}

impl WaitSlot {
    fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }
}

/// A registered wait: the epoch observed at `prepare` time.
#[derive(Debug, Clone, Copy)]
pub struct Ticket(u64);

/// Generic wait queue for any key type.
pub struct WaitQueue<K>
where
    K: Eq + std::hash::Hash + Copy + Send + Sync + 'static,
{
    slots: DashMap<K, Arc<WaitSlot>, RandomState>,
}

impl<K> WaitQueue<K>
where
    K: Eq + std::hash::Hash + Copy + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
        }
    }

    fn slot(&self, key: K) -> Arc<WaitSlot> {
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(WaitSlot::new()))
            .clone()
    }

    /// Register as a waiter on `key` and capture the current epoch.
    ///
    /// Must be called while still holding the lock that guards the condition
    /// being waited for; the returned ticket must be consumed by [`wait`].
    ///
    /// [`wait`]: WaitQueue::wait
    pub fn prepare(&self, key: K) -> Ticket {
        let slot = self.slot(key);
        slot.waiters.fetch_add(1, Ordering::SeqCst);
        let epoch = *slot.epoch.lock();
        Ticket(epoch)
    }

    /// Sleep until the key's epoch advances past the ticket, or until the
    /// timeout elapses. Returns `true` if woken, `false` on timeout.
    pub fn wait(&self, key: K, ticket: Ticket, timeout: Option<Duration>) -> bool {
        let slot = self.slot(key);
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut epoch = slot.epoch.lock();
        let mut woken = true;
        while *epoch == ticket.0 {
            match deadline {
                Some(deadline) => {
                    if slot.cond.wait_until(&mut epoch, deadline).timed_out() {
                        woken = *epoch != ticket.0;
                        break;
                    }
                }
                None => slot.cond.wait(&mut epoch),
            }
        }
        drop(epoch);

        slot.waiters.fetch_sub(1, Ordering::SeqCst);
        self.slots
            .remove_if(&key, |_, s| s.waiters.load(Ordering::SeqCst) == 0);
        woken
    }

    /// Wake one waiter on `key`.
    pub fn signal(&self, key: K) {
        if let Some(slot) = self.slots.get(&key) {
            *slot.epoch.lock() += 1;
            slot.cond.notify_one();
        }
    }

    /// Wake every waiter on `key`.
    pub fn broadcast(&self, key: K) {
        if let Some(slot) = self.slots.get(&key) {
            *slot.epoch.lock() += 1;
            slot.cond.notify_all();
        }
    }

    /// Approximate count of waiters on `key` (diagnostics only).
    pub fn waiter_count(&self, key: K) -> usize {
        self.slots
            .get(&key)
            .map(|s| s.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl<K> Default for WaitQueue<K>
where
    K: Eq + std::hash::Hash + Copy + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_woken_by_signal() {
        let queue = Arc::new(WaitQueue::<u64>::new());
        let queue_clone = queue.clone();

        let handle = thread::spawn(move || {
            let ticket = queue_clone.prepare(42);
            queue_clone.wait(42, ticket, Some(Duration::from_secs(1)))
        });

        thread::sleep(Duration::from_millis(50));
        queue.signal(42);

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_timeout() {
        let queue = WaitQueue::<u64>::new();
        let ticket = queue.prepare(99);
        let start = Instant::now();
        let woken = queue.wait(99, ticket, Some(Duration::from_millis(50)));

        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_signal_before_wait_is_not_lost() {
        let queue = WaitQueue::<u64>::new();

        // The signal lands between prepare and wait; the epoch bump makes
        // the wait return immediately instead of sleeping.
        let ticket = queue.prepare(7);
        queue.signal(7);
        let woken = queue.wait(7, ticket, Some(Duration::from_secs(5)));
        assert!(woken);
    }

    #[test]
    fn test_broadcast_wakes_all() {
        let queue = Arc::new(WaitQueue::<u64>::new());

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let queue_clone = queue.clone();
                thread::spawn(move || {
                    let ticket = queue_clone.prepare(200);
                    queue_clone.wait(200, ticket, Some(Duration::from_secs(1)))
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        queue.broadcast(200);

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_slot_cleanup_after_last_waiter() {
        let queue = WaitQueue::<u64>::new();
        let ticket = queue.prepare(5);
        queue.signal(5);
        queue.wait(5, ticket, None);
        assert_eq!(queue.waiter_count(5), 0);
    }
}

//! Cooperative FIFO wake primitive, shared by blocking `fetch_next_job` and
//! blocking `acquire_distributed_lock` — both are "register a wait-token,
//! block, get woken by the writer", modeled as wait-tokens held in
//! per-queue / per-lock FIFO lists, signalled by firing a single-shot
//! condition variable.
//!
//! Lives outside `MemoryState` deliberately: the writer thread must never
//! block waiting on its own inbox, so the actual sleep/wake happens on the
//! caller's thread against a plain `parking_lot` condvar, and the writer
//! only ever *signals* it after applying a write that could satisfy a
//! waiter (an `Enqueue`, or a lock release).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// A single-shot wake token: one [`FifoWaitRegistry::register`] call hands
/// one of these to a blocked caller; `wake_one` fires at most one.
struct Token {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl Token {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            signalled: Mutex::new(false),
            condvar: Condvar::new(),
        })
    }

    fn fire(&self) {
        *self.signalled.lock() = true;
        self.condvar.notify_one();
    }

    /// Block until fired or `deadline` passes. Returns whether it was fired.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut signalled = self.signalled.lock();
        while !*signalled {
            match deadline {
                None => self.condvar.wait(&mut signalled),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let timed_out = self.condvar.wait_for(&mut signalled, deadline - now).timed_out();
                    if timed_out && !*signalled {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// FIFO wait lists keyed by name — one instance backs the dispatcher's
/// per-queue fetch waiters, a second independent instance backs its
/// per-resource lock waiters.
#[derive(Default)]
pub(crate) struct FifoWaitRegistry {
    lists: Mutex<HashMap<String, VecDeque<Arc<Token>>>>,
}

/// A registration returned by [`FifoWaitRegistry::register`]; callers block
/// on `wait_until`, which removes the registration from the FIFO whether it
/// fired or timed out.
#[derive(Clone)]
pub(crate) struct Registration {
    key: String,
    token: Arc<Token>,
}

impl Registration {
    /// Fire this registration's token directly, bypassing the FIFO — used
    /// to wake a blocked waiter synchronously on cancellation.
    pub(crate) fn fire(&self) {
        self.token.fire();
    }
}

impl FifoWaitRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, key: &str) -> Registration {
        let token = Token::new();
        self.lists
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(token.clone());
        Registration { key: key.to_string(), token }
    }

    /// Block the calling thread until this registration is fired or
    /// `deadline` passes. Removes itself from the wait list either way.
    pub(crate) fn wait_until(&self, registration: &Registration, deadline: Option<Instant>) -> bool {
        let fired = registration.token.wait_until(deadline);
        self.cancel(registration);
        fired
    }

    /// Drop a registration that was never fired (lost race / re-check before
    /// blocking, or cancellation).
    pub(crate) fn cancel(&self, registration: &Registration) {
        if let Some(list) = self.lists.lock().get_mut(&registration.key) {
            list.retain(|t| !Arc::ptr_eq(t, &registration.token));
        }
    }

    /// Wake the longest-waiting registration on `key`, if any.
    pub(crate) fn wake_one(&self, key: &str) {
        let token = {
            let mut lists = self.lists.lock();
            lists.get_mut(key).and_then(VecDeque::pop_front)
        };
        if let Some(token) = token {
            token.fire();
        }
    }

    /// Register one wait token across every one of `keys` at once, so a
    /// write to *any* of them wakes the caller — fetching across several
    /// queues needs exactly this, rather than N independent single-queue
    /// registrations.
    pub(crate) fn register_fan_out(&self, keys: &[String]) -> FanOutRegistration {
        let token = Token::new();
        let mut lists = self.lists.lock();
        for key in keys {
            lists.entry(key.clone()).or_default().push_back(token.clone());
        }
        FanOutRegistration { keys: keys.to_vec(), token }
    }

    pub(crate) fn wait_fan_out(&self, registration: &FanOutRegistration, deadline: Option<Instant>) -> bool {
        let fired = registration.token.wait_until(deadline);
        self.cancel_fan_out(registration);
        fired
    }

    pub(crate) fn cancel_fan_out(&self, registration: &FanOutRegistration) {
        let mut lists = self.lists.lock();
        for key in &registration.keys {
            if let Some(list) = lists.get_mut(key) {
                list.retain(|t| !Arc::ptr_eq(t, &registration.token));
            }
        }
    }
}

/// A [`FifoWaitRegistry::register_fan_out`] registration spanning several
/// keys at once.
#[derive(Clone)]
pub(crate) struct FanOutRegistration {
    keys: Vec<String>,
    token: Arc<Token>,
}

impl FanOutRegistration {
    /// See [`Registration::fire`].
    pub(crate) fn fire(&self) {
        self.token.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wakes_longest_waiting_registration_first() {
        let waiter = Arc::new(FifoWaitRegistry::new());
        let r1 = waiter.register("q");
        let r2 = waiter.register("q");

        let w1 = waiter.clone();
        let h1 = thread::spawn(move || w1.wait_until(&r1, Some(Instant::now() + Duration::from_millis(500))));
        let w2 = waiter.clone();
        let h2 = thread::spawn(move || w2.wait_until(&r2, Some(Instant::now() + Duration::from_millis(100))));

        thread::sleep(Duration::from_millis(20));
        waiter.wake_one("q");

        assert!(h1.join().unwrap(), "the first registration should be the one woken");
        assert!(!h2.join().unwrap(), "the second registration times out unwoken");
    }

    #[test]
    fn times_out_when_never_woken() {
        let waiter = FifoWaitRegistry::new();
        let r = waiter.register("q");
        let fired = waiter.wait_until(&r, Some(Instant::now() + Duration::from_millis(10)));
        assert!(!fired);
    }

    #[test]
    fn fan_out_registration_wakes_on_any_member_queue() {
        let waiter = Arc::new(FifoWaitRegistry::new());
        let keys = vec!["critical".to_string(), "default".to_string()];
        let registration = waiter.register_fan_out(&keys);

        let w = waiter.clone();
        let handle = thread::spawn(move || w.wait_fan_out(&registration, Some(Instant::now() + Duration::from_millis(500))));

        thread::sleep(Duration::from_millis(20));
        waiter.wake_one("default");

        assert!(handle.join().unwrap());
    }
}

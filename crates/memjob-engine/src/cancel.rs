//! A cooperative cancellation signal for blocking operations.
//!
//! Every blocking operation — `FetchNextJob`, `AcquireDistributedLock` —
//! accepts one of these instead of owning its own cancellation mechanism.
//! Firing it wakes whatever [`crate::wait::Registration`] or
//! [`crate::wait::FanOutRegistration`] the blocked caller most recently
//! registered, via a hook installed for the duration of that one wait.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Hook = Box<dyn Fn() + Send + Sync>;

struct Inner {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<(u64, Hook)>>,
    next_hook_id: AtomicU64,
}

/// A cloneable, shareable cancellation flag. Cloning shares the same
/// underlying signal; firing it through any clone cancels all of them.
#[derive(Clone)]
pub struct CancellationToken(Arc<Inner>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            cancelled: AtomicBool::new(false),
            hooks: Mutex::new(Vec::new()),
            next_hook_id: AtomicU64::new(0),
        }))
    }

    /// Signal cancellation. Idempotent; fires every hook registered via
    /// [`CancellationToken::on_cancel`] that has not yet been dropped.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        let hooks = std::mem::take(&mut *self.0.hooks.lock().expect("cancellation hooks poisoned"));
        for (_, hook) in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Run `hook` the moment this token is cancelled (immediately, inline,
    /// if it already has been). Returns a guard that unregisters the hook
    /// when dropped — callers install one hook per blocking wait and drop
    /// the guard as soon as that wait completes, so a long-lived token
    /// reused across many waits never accumulates stale hooks.
    pub fn on_cancel(&self, hook: impl Fn() + Send + Sync + 'static) -> HookGuard {
        let id = self.0.next_hook_id.fetch_add(1, Ordering::Relaxed);
        if self.is_cancelled() {
            hook();
        } else {
            self.0.hooks.lock().expect("cancellation hooks poisoned").push((id, Box::new(hook)));
        }
        HookGuard { inner: self.0.clone(), id }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters its hook from the owning [`CancellationToken`] on drop.
pub struct HookGuard {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.inner
            .hooks
            .lock()
            .expect("cancellation hooks poisoned")
            .retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn hook_fires_on_cancel() {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _guard = token.on_cancel(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        token.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_fires_immediately_if_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _guard = token.on_cancel(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_guard_does_not_fire_on_later_cancel() {
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        drop(token.on_cancel(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        token.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_the_same_signal() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

//! The owning handle returned by `acquire_distributed_lock`.
//!
//! Ownership bookkeeping (who holds what, reentrancy counts) lives entirely
//! in [`crate::state::MemoryState`], keyed by [`ConnectionId`] — this type
//! is just the RAII half: dropping it (or calling
//! [`DistributedLockGuard::release`] explicitly) submits one `ReleaseLock`.
//! Releasing twice, or releasing after the owning `Connection` already ran
//! `ReleaseAllLocks` on close, is harmless: the writer finds no matching
//! owned entry and returns an `Internal` error that this type discards,
//! since by then there is nothing left to release.

use std::sync::Arc;

use crate::command::WriteCommand;
use crate::dispatcher::{Dispatcher, Inbound};
use crate::ids::ConnectionId;

/// An owned distributed lock on `resource`. Held for as long as this value
/// is alive; dropping it releases one level of reentrancy.
pub struct DistributedLockGuard {
    connection: ConnectionId,
    resource: String,
    dispatcher: Arc<Dispatcher>,
    released: bool,
}

impl DistributedLockGuard {
    pub(crate) fn new(connection: ConnectionId, resource: String, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            connection,
            resource,
            dispatcher,
            released: false,
        }
    }

    /// The resource name this guard holds a lock on.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Release this lock now instead of waiting for the guard to drop.
    /// Equivalent to `drop(guard)`, spelled out for callers who want the
    /// release to be visible at the call site.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.dispatcher.submit(Inbound::Write(WriteCommand::ReleaseLock {
            connection: self.connection,
            resource: self.resource.clone(),
        }));
    }
}

impl Drop for DistributedLockGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for DistributedLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLockGuard")
            .field("resource", &self.resource)
            .field("released", &self.released)
            .finish()
    }
}

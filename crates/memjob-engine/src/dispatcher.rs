//! The single-writer executor.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use memjob_core::EngineError;

use crate::clock::MonotonicClock;
use crate::command::{CommandResult, ReadCommand, WriteCommand};
use crate::state::{MemoryState, WriteEffects};
use crate::wait::FifoWaitRegistry;

pub(crate) enum Inbound {
    Read(ReadCommand),
    Write(WriteCommand),
}

struct InboxMessage {
    inbound: Inbound,
    reply: crossbeam_channel::Sender<Result<CommandResult, EngineError>>,
}

/// Owns the `MemoryState` via a dedicated writer thread; every read and
/// write travels through `submit`/`submit_with_timeout` so results stay
/// linearizable.
pub(crate) struct Dispatcher {
    inbox: crossbeam_channel::Sender<InboxMessage>,
    pub(crate) queue_waiters: Arc<FifoWaitRegistry>,
    pub(crate) lock_waiters: Arc<FifoWaitRegistry>,
    default_timeout: Duration,
    writer: Option<thread::JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn new(state: MemoryState, clock: Arc<MonotonicClock>, inbox_capacity: usize, default_timeout: Duration) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(inbox_capacity);
        let queue_waiters = Arc::new(FifoWaitRegistry::new());
        let lock_waiters = Arc::new(FifoWaitRegistry::new());

        let writer = {
            let queue_waiters = queue_waiters.clone();
            let lock_waiters = lock_waiters.clone();
            thread::Builder::new()
                .name("memjob-writer".into())
                .spawn(move || run_writer(rx, state, clock, queue_waiters, lock_waiters))
                .expect("failed to spawn the memjob writer thread")
        };

        Self {
            inbox: tx,
            queue_waiters,
            lock_waiters,
            default_timeout,
            writer: Some(writer),
        }
    }

    pub(crate) fn submit(&self, inbound: Inbound) -> Result<CommandResult, EngineError> {
        self.submit_with_timeout(inbound, self.default_timeout)
    }

    pub(crate) fn submit_with_timeout(&self, inbound: Inbound, timeout: Duration) -> Result<CommandResult, EngineError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.inbox
            .send_timeout(InboxMessage { inbound, reply: reply_tx }, timeout)
            .map_err(|_| EngineError::DispatchTimeout)?;
        reply_rx.recv_timeout(timeout).map_err(|_| EngineError::DispatchTimeout)?
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Drop our sender now (not whenever the struct's fields happen to
        // tear down) so the writer's `recv` observes disconnection and the
        // join below doesn't wait forever.
        let (unused, _) = crossbeam_channel::bounded(0);
        drop(std::mem::replace(&mut self.inbox, unused));
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer(
    inbox: crossbeam_channel::Receiver<InboxMessage>,
    mut state: MemoryState,
    clock: Arc<MonotonicClock>,
    queue_waiters: Arc<FifoWaitRegistry>,
    lock_waiters: Arc<FifoWaitRegistry>,
) {
    tracing::debug!("memjob writer thread started");
    // An idle engine still needs to age out TTLs; cap how long a single
    // recv can block so eviction keeps making progress with no traffic.
    const IDLE_TICK: Duration = Duration::from_millis(100);
    loop {
        match inbox.recv_timeout(IDLE_TICK) {
            Ok(msg) => {
                let now = clock.now();
                let mut effects = WriteEffects::default();
                let result = match msg.inbound {
                    Inbound::Read(cmd) => state.apply_read(&cmd, now, clock.to_utc(now)),
                    Inbound::Write(cmd) => state.apply_write(cmd, now, &mut effects),
                };
                let _ = msg.reply.send(result);
                state.evict_expired(now);
                for queue in effects.woken_queues {
                    queue_waiters.wake_one(&queue);
                }
                for resource in effects.released_locks {
                    lock_waiters.wake_one(&resource);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                state.evict_expired(clock.now());
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("memjob writer thread stopped");
}

//! The priority-ordered job queue shared by every stream of a manager.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};

use crate::command::IoCommand;
use crate::error::{FileError, FileResult};
use crate::logging::targets;
use crate::priority::FilePriority;

/// Heap entry ordering commands by `(priority, sequence)`, smallest first.
struct Queued(IoCommand);

impl Queued {
    fn key(&self) -> (FilePriority, u64) {
        (self.0.priority, self.0.sequence)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other.key().cmp(&self.key())
    }
}

/// Commands awaiting the worker.
///
/// Every inserted command is stamped with a sequence number, so equal
/// priorities are served in arrival order and the commands of one batch stay
/// contiguous relative to other batches of the same priority.
#[derive(Default)]
pub(crate) struct JobQueue {
    heap: BinaryHeap<Queued>,
    next_sequence: u64,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a batch, preserving its internal order. Returns the number of
    /// commands inserted.
    pub(crate) fn insert(&mut self, batch: impl IntoIterator<Item = IoCommand>) -> usize {
        let mut count = 0;
        for mut command in batch {
            command.sequence = self.next_sequence;
            self.next_sequence += 1;
            self.heap.push(Queued(command));
            count += 1;
        }
        count
    }

    /// Remove the command that must run next.
    pub(crate) fn pop(&mut self) -> Option<IoCommand> {
        self.heap.pop().map(|queued| queued.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

struct QueueState {
    jobs: JobQueue,
    shutdown: bool,
}

/// The job queue plus the condition variable the worker parks on.
///
/// Streams hold a `Weak` reference to this; the manager owns the only strong
/// reference besides the worker's. The lock is never held across native I/O.
pub(crate) struct SharedJobQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

static_assertions::assert_impl_all!(SharedJobQueue: Send, Sync);

impl SharedJobQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: JobQueue::new(),
                shutdown: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Move every command out of `batch` into the queue in one locked step and
    /// wake the worker.
    ///
    /// On [`FileError::ShutDown`] the batch is left untouched.
    pub(crate) fn submit(&self, batch: &mut Vec<IoCommand>) -> FileResult<()> {
        let inserted = {
            let mut state = self.state.lock();
            if state.shutdown {
                return Err(FileError::ShutDown);
            }
            state.jobs.insert(batch.drain(..))
        };
        tracing::trace!(target: targets::QUEUE, commands = inserted, "batch queued");
        self.wake.notify_one();
        Ok(())
    }

    /// Block until a command is available and return it.
    ///
    /// Returns `None` once shutdown has been requested and the queue is empty.
    pub(crate) fn next(&self) -> Option<IoCommand> {
        let mut state = self.state.lock();
        loop {
            if let Some(command) = state.jobs.pop() {
                return Some(command);
            }
            if state.shutdown {
                return None;
            }
            self.wake.wait(&mut state);
        }
    }

    /// Stop accepting submissions and wake the worker so it can drain and exit.
    pub(crate) fn request_shutdown(&self) {
        let mut state = self.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            tracing::debug!(
                target: targets::QUEUE,
                remaining = state.jobs.len(),
                "shutdown requested"
            );
        }
        self.wake.notify_all();
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Commands queued but not yet taken by the worker.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

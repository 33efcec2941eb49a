//! One-shot, resettable completion signal for a submitted batch.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::command::BatchOutcome;

#[derive(Debug)]
struct State {
    ready: bool,
    outcome: BatchOutcome,
}

/// Signals the stream that its last submitted batch has finished.
///
/// A notification starts ready, so waiting on a stream that never submitted
/// returns at once. The stream resets it before enqueueing a batch and the
/// worker raises it after the batch's last command, handing over the batch
/// outcome. Raising and waiting are both serialized on the inner lock, so a
/// wakeup that fires between a waiter's check and its sleep is not lost.
#[derive(Debug)]
pub struct Notification {
    state: Mutex<State>,
    condvar: Condvar,
}

static_assertions::assert_impl_all!(Notification: Send, Sync);

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

impl Notification {
    /// A ready notification carrying an empty successful outcome.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                ready: true,
                outcome: BatchOutcome::default(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Mark the notification as pending and discard any previous outcome.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.ready = false;
        state.outcome = BatchOutcome::default();
    }

    /// Publish `outcome` and wake every waiter.
    pub fn notify(&self, outcome: BatchOutcome) {
        let mut state = self.state.lock();
        state.ready = true;
        state.outcome = outcome;
        self.condvar.notify_all();
    }

    /// Whether the notification is currently raised.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// The published outcome if the notification is raised, without blocking.
    pub fn try_outcome(&self) -> Option<BatchOutcome> {
        let state = self.state.lock();
        state.ready.then(|| state.outcome.clone())
    }

    /// Block until raised, then return the published outcome.
    pub fn wait(&self) -> BatchOutcome {
        let mut state = self.state.lock();
        while !state.ready {
            self.condvar.wait(&mut state);
        }
        state.outcome.clone()
    }

    /// Block for at most `timeout`. Returns `None` if the notification was not
    /// raised in time.
    pub fn wait_for(&self, timeout: Duration) -> Option<BatchOutcome> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !state.ready {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                // Too far in the future to represent.
                None => self.condvar.wait(&mut state),
            }
        }
        state.ready.then(|| state.outcome.clone())
    }
}

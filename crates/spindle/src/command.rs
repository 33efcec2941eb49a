//! Queued I/O commands and their outcomes.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use spindle_native::{NativeFile, SeekOrigin};

use crate::buffer::IoBuffer;
use crate::error::{FileError, FileResult};
use crate::notification::Notification;
use crate::priority::FilePriority;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoKind {
    Read,
    Write,
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Which native primitive a worker-side failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoPhase {
    Seek,
    Read,
    Write,
}

impl From<IoKind> for IoPhase {
    fn from(kind: IoKind) -> Self {
        match kind {
            IoKind::Read => Self::Read,
            IoKind::Write => Self::Write,
        }
    }
}

impl fmt::Display for IoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seek => f.write_str("seek"),
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// A native seek performed before a command's transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    pub offset: i64,
    pub origin: SeekOrigin,
}

/// Why a command did not complete in full.
#[derive(Debug, Clone)]
pub enum CommandFailure {
    /// A read ran out of file.
    Eof,
    /// A native primitive failed.
    Io { phase: IoPhase, error: Arc<io::Error> },
}

/// Accumulated result of one submitted batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Bytes moved across every command of the batch.
    pub transferred: u64,
    /// First failure in the batch, if any.
    pub failure: Option<CommandFailure>,
}

impl BatchOutcome {
    /// Fold one command's transfer count and failure into the batch. The first
    /// failure wins.
    pub(crate) fn record(&mut self, transferred: usize, failure: Option<CommandFailure>) {
        self.transferred += transferred as u64;
        if self.failure.is_none() {
            self.failure = failure;
        }
    }

    /// Whether every command transferred its full size.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Convert into the value `wait` reports.
    pub fn into_result(self) -> FileResult<u64> {
        match self.failure {
            None => Ok(self.transferred),
            Some(CommandFailure::Eof) => Err(FileError::Eof {
                transferred: self.transferred,
            }),
            Some(CommandFailure::Io { phase, error }) => Err(FileError::Io {
                phase,
                source: error,
            }),
        }
    }
}

/// Per-batch result slot shared by every command of the batch.
#[derive(Debug, Default)]
pub(crate) struct ResultSlot {
    outcome: Mutex<BatchOutcome>,
}

impl ResultSlot {
    pub(crate) fn record(&self, transferred: usize, failure: Option<CommandFailure>) {
        self.outcome.lock().record(transferred, failure);
    }

    pub(crate) fn take(&self) -> BatchOutcome {
        std::mem::take(&mut *self.outcome.lock())
    }
}

/// One atomic native operation, owned by the queue once submitted.
pub(crate) struct IoCommand {
    pub(crate) handle: Arc<NativeFile>,
    pub(crate) kind: IoKind,
    pub(crate) seek: Option<SeekTarget>,
    pub(crate) buffer: IoBuffer,
    pub(crate) size: usize,
    pub(crate) priority: FilePriority,
    /// Arrival stamp assigned by the queue.
    pub(crate) sequence: u64,
    pub(crate) slot: Arc<ResultSlot>,
    /// Set on the last command of a batch only.
    pub(crate) completion: Option<Arc<Notification>>,
}

impl fmt::Debug for IoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoCommand")
            .field("path", &self.handle.path())
            .field("kind", &self.kind)
            .field("seek", &self.seek)
            .field("size", &self.size)
            .field("priority", &self.priority.value())
            .field("sequence", &self.sequence)
            .field("notifies", &self.completion.is_some())
            .finish()
    }
}

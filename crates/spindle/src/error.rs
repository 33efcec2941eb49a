//! Error types for spindle.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use spindle_native::NativeError;

use crate::command::{IoKind, IoPhase};

/// A specialized Result type for spindle operations.
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Errors reported by the file manager and its streams.
///
/// Parameter and access-mode errors are returned synchronously and never reach
/// the worker. `Eof` and `Io` come from the worker and are reported by
/// `wait`.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// Bad arguments: empty path, no access bit, zero or oversized transfer.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// The native open failed.
    #[error("failed to open '{path}': {source}")]
    InvalidHandle {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The stream was not opened with the access bit this request needs.
    #[error("stream was not opened for {0}")]
    InvalidAccess(IoKind),

    /// A read reached end of file before filling the request.
    #[error("end of file after {transferred} bytes")]
    Eof { transferred: u64 },

    /// `wait` gave up before the batch completed. The batch keeps running.
    #[error("timed out waiting for I/O completion")]
    Timeout,

    /// A native read, write or seek failed on the worker.
    #[error("{phase} failed: {source}")]
    Io {
        phase: IoPhase,
        #[source]
        source: Arc<io::Error>,
    },

    /// The previous batch of this stream is still in flight.
    #[error("a submission is already pending on this stream")]
    Busy,

    /// The file manager has been shut down.
    #[error("file manager has shut down")]
    ShutDown,

    /// The I/O worker thread could not be started.
    #[error("failed to spawn I/O worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// A synchronous native primitive (close, length) failed.
    #[error(transparent)]
    Native(NativeError),
}

impl FileError {
    /// Returns true for [`FileError::Eof`].
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Returns true for [`FileError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Bytes moved before the failure, where the error records it.
    pub fn transferred(&self) -> Option<u64> {
        match self {
            Self::Eof { transferred } => Some(*transferred),
            _ => None,
        }
    }
}

impl From<NativeError> for FileError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::InvalidParams(reason) => Self::InvalidParams(reason),
            NativeError::Open { path, source } => Self::InvalidHandle { path, source },
            other => Self::Native(other),
        }
    }
}

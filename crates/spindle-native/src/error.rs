//! Error types for native file primitives.

use std::io;
use std::path::PathBuf;

/// Result type alias for native file operations.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Errors reported by the native file layer.
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    /// The caller passed something the primitive cannot act on.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// The operating system refused to open the file.
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read, write, seek or flush failed.
    #[error("native I/O error: {0}")]
    Io(#[from] io::Error),
}

impl NativeError {
    /// Create an open error.
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Raw OS error code, when the failure came from the operating system.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. } | Self::Io(source) => source.raw_os_error(),
            Self::InvalidParams(_) => None,
        }
    }

    /// Convert into an `io::Error`, keeping the original when there is one.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Open { source, .. } | Self::Io(source) => source,
            Self::InvalidParams(reason) => io::Error::new(io::ErrorKind::InvalidInput, reason),
        }
    }
}

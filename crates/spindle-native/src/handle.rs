//! Blocking native file handles.

use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{NativeError, NativeResult};
use crate::options::{EMULATE_DELETE_ON_CLOSE, FileOptions, SeekOrigin, StdDevice};
use crate::targets;

/// Outcome of a full-length read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Every requested byte was transferred.
    Complete(usize),
    /// End of file was reached after transferring this many bytes.
    Eof(usize),
}

impl Transfer {
    /// Number of bytes transferred.
    pub fn bytes(self) -> usize {
        match self {
            Self::Complete(n) | Self::Eof(n) => n,
        }
    }

    /// Whether end of file cut the transfer short.
    pub fn is_eof(self) -> bool {
        matches!(self, Self::Eof(_))
    }
}

enum Backend {
    File(fs::File),
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl Backend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => file.read(buf),
            Self::Stdin(stdin) => stdin.read(buf),
            Self::Stdout(_) | Self::Stderr(_) => Err(unsupported("read from an output device")),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(file) => file.write(buf),
            Self::Stdout(stdout) => stdout.write(buf),
            Self::Stderr(stderr) => stderr.write(buf),
            Self::Stdin(_) => Err(unsupported("write to an input device")),
        }
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(file) => file.seek(pos),
            _ => Err(unsupported("seek on a standard device")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(file) => file.flush(),
            Self::Stdout(stdout) => stdout.flush(),
            Self::Stderr(stderr) => stderr.flush(),
            Self::Stdin(_) => Ok(()),
        }
    }

    fn length(&self) -> io::Result<u64> {
        match self {
            Self::File(file) => file.metadata().map(|m| m.len()),
            _ => Err(unsupported("length of a standard device")),
        }
    }
}

fn unsupported(what: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, what)
}

/// An open native file descriptor plus the options it was opened with.
///
/// All primitives are synchronous and block the calling thread. The handle is
/// internally locked so it can be shared between the owner and queued work;
/// [`NativeFile::close`] releases the descriptor exactly once.
pub struct NativeFile {
    backend: Mutex<Option<Backend>>,
    options: FileOptions,
    path: PathBuf,
}

static_assertions::assert_impl_all!(NativeFile: Send, Sync);

impl NativeFile {
    /// Open `path` with the given options.
    ///
    /// # Errors
    ///
    /// `InvalidParams` when the path is empty or no access bit is set, `Open`
    /// when the operating system refuses the request.
    pub fn open(path: impl AsRef<Path>, options: FileOptions) -> NativeResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(NativeError::InvalidParams("empty path"));
        }
        if !options.has_access() {
            return Err(NativeError::InvalidParams("no access bit set"));
        }

        let file = options
            .to_open_options()
            .open(path)
            .map_err(|e| NativeError::open(path, e))?;

        tracing::debug!(
            target: targets::NATIVE,
            path = %path.display(),
            options = options.bits(),
            "opened native file"
        );

        Ok(Self {
            backend: Mutex::new(Some(Backend::File(file))),
            options,
            path: path.to_path_buf(),
        })
    }

    /// Wrap a standard device. The handle carries `FLAG_NO_CLOSE`.
    pub fn std_device(device: StdDevice) -> Self {
        let (backend, access, name) = match device {
            StdDevice::Input => (Backend::Stdin(io::stdin()), FileOptions::ACCESS_READ, "<stdin>"),
            StdDevice::Output => (Backend::Stdout(io::stdout()), FileOptions::ACCESS_WRITE, "<stdout>"),
            StdDevice::Error => (Backend::Stderr(io::stderr()), FileOptions::ACCESS_WRITE, "<stderr>"),
        };
        Self {
            backend: Mutex::new(Some(backend)),
            options: access | FileOptions::FLAG_NO_CLOSE,
            path: PathBuf::from(name),
        }
    }

    /// Options the handle was opened with.
    pub fn options(&self) -> FileOptions {
        self.options
    }

    /// Path the handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`close`](Self::close) has already run.
    pub fn is_closed(&self) -> bool {
        self.backend.lock().is_none()
    }

    /// Read until `buf` is full or end of file is reached.
    ///
    /// Short reads are retried; interrupted reads are retried.
    pub fn read_full(&self, buf: &mut [u8]) -> NativeResult<Transfer> {
        let mut guard = self.backend.lock();
        let backend = guard
            .as_mut()
            .ok_or(NativeError::InvalidParams("handle is closed"))?;

        let mut filled = 0;
        while filled < buf.len() {
            match backend.read(&mut buf[filled..]) {
                Ok(0) => return Ok(Transfer::Eof(filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Transfer::Complete(filled))
    }

    /// Write all of `buf`, retrying short writes.
    pub fn write_full(&self, buf: &[u8]) -> NativeResult<usize> {
        let mut guard = self.backend.lock();
        let backend = guard
            .as_mut()
            .ok_or(NativeError::InvalidParams("handle is closed"))?;

        let mut written = 0;
        while written < buf.len() {
            match backend.write(&buf[written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    /// Move the file pointer. Returns the new absolute position.
    pub fn seek(&self, offset: i64, origin: SeekOrigin) -> NativeResult<u64> {
        let pos = origin.seek_from(offset)?;
        let mut guard = self.backend.lock();
        let backend = guard
            .as_mut()
            .ok_or(NativeError::InvalidParams("handle is closed"))?;
        Ok(backend.seek(pos)?)
    }

    /// Flush buffered data to the device.
    pub fn flush(&self) -> NativeResult<()> {
        let mut guard = self.backend.lock();
        let backend = guard
            .as_mut()
            .ok_or(NativeError::InvalidParams("handle is closed"))?;
        Ok(backend.flush()?)
    }

    /// Current length of the file in bytes.
    pub fn length(&self) -> NativeResult<u64> {
        let guard = self.backend.lock();
        let backend = guard
            .as_ref()
            .ok_or(NativeError::InvalidParams("handle is closed"))?;
        Ok(backend.length()?)
    }

    /// Release the descriptor.
    ///
    /// Writable handles are flushed first. Handles carrying `FLAG_NO_CLOSE` are
    /// detached without closing the descriptor. A second call reports
    /// `InvalidParams`.
    pub fn close(&self) -> NativeResult<()> {
        let mut backend = self
            .backend
            .lock()
            .take()
            .ok_or(NativeError::InvalidParams("handle is already closed"))?;

        if self.options.can_write() {
            if let Err(e) = backend.flush() {
                tracing::warn!(target: targets::NATIVE, path = %self.path.display(), error = %e, "flush before close failed");
            }
        }

        if self.options.contains(FileOptions::FLAG_NO_CLOSE) {
            // The descriptor is owned elsewhere.
            if let Backend::File(file) = backend {
                std::mem::forget(file);
            }
            return Ok(());
        }
        drop(backend);

        if EMULATE_DELETE_ON_CLOSE && self.options.contains(FileOptions::FLAG_DELETE_ON_CLOSE) {
            fs::remove_file(&self.path)?;
        }

        tracing::debug!(target: targets::NATIVE, path = %self.path.display(), "closed native file");
        Ok(())
    }
}

impl std::fmt::Debug for NativeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFile")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}

//! The file manager: opens streams and owns the queue and the worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use spindle_native::{FileOptions, NativeFile, StdDevice};

use crate::config::{FileManagerBuilder, FileManagerConfig};
use crate::error::{FileError, FileResult};
use crate::logging::targets;
use crate::priority::FilePriority;
use crate::queue::SharedJobQueue;
use crate::stream::{FileStream, LocalFileStream};
use crate::worker::IoWorker;

/// Opens file streams and runs the I/O worker they submit to.
///
/// A manager is an ordinary value: create one, open streams from it, and shut
/// it down (explicitly or by dropping it) when done. Shutting down lets the
/// worker finish everything already queued, so no waiting stream is left
/// hanging. Streams only hold a weak reference to the manager's queue and
/// report [`FileError::ShutDown`] on submit once it is gone.
///
/// # Example
///
/// ```no_run
/// use spindle::{FileManager, FileOptions, FilePriority, IoBuffer};
///
/// let manager = FileManager::new()?;
/// let mut stream = manager.open("save.dat", FileOptions::ACCESS_RW, FilePriority::NORMAL)?;
///
/// let payload = IoBuffer::from(&b"hello"[..]);
/// stream.write(&payload, 5)?;
/// stream.submit()?;
/// assert_eq!(stream.wait(None)?, 5);
///
/// stream.close()?;
/// manager.shutdown();
/// # Ok::<(), spindle::FileError>(())
/// ```
pub struct FileManager {
    base_path: RwLock<PathBuf>,
    queue: Arc<SharedJobQueue>,
    worker: IoWorker,
}

static_assertions::assert_impl_all!(FileManager: Send, Sync);

impl FileManager {
    /// Create a manager with default configuration and start its worker.
    pub fn new() -> FileResult<Self> {
        Self::with_config(FileManagerConfig::default())
    }

    /// Create a manager with custom configuration and start its worker.
    pub fn with_config(config: FileManagerConfig) -> FileResult<Self> {
        let queue = Arc::new(SharedJobQueue::new());
        let worker = IoWorker::spawn(Arc::clone(&queue), &config.thread_name, config.stack_size)?;
        let base_path = config.resolved_base_path();

        tracing::debug!(
            target: targets::MANAGER,
            base_path = %base_path.display(),
            thread = %config.thread_name,
            "file manager started"
        );

        Ok(Self {
            base_path: RwLock::new(base_path),
            queue,
            worker,
        })
    }

    pub fn builder() -> FileManagerBuilder {
        FileManagerBuilder::new()
    }

    /// Open `path` and return a stream whose commands run at `priority`.
    ///
    /// Relative paths are resolved against the base path. Write access opens an
    /// existing file or creates a new one; read-only access requires the file
    /// to exist. Nothing is truncated.
    ///
    /// # Errors
    ///
    /// `InvalidParams` for an empty path or options without an access bit,
    /// `InvalidHandle` when the native open fails, `ShutDown` after
    /// [`shutdown`](Self::shutdown).
    pub fn open(
        &self,
        path: impl AsRef<Path>,
        options: FileOptions,
        priority: FilePriority,
    ) -> FileResult<Box<dyn FileStream>> {
        Ok(Box::new(self.open_local(path, options, priority)?))
    }

    /// Like [`open`](Self::open), returning the concrete stream type.
    pub fn open_local(
        &self,
        path: impl AsRef<Path>,
        options: FileOptions,
        priority: FilePriority,
    ) -> FileResult<LocalFileStream> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(FileError::InvalidParams("empty path"));
        }
        if self.queue.is_shut_down() {
            return Err(FileError::ShutDown);
        }

        let resolved = self.resolve(path);
        let handle = NativeFile::open(&resolved, options)?;

        tracing::debug!(
            target: targets::MANAGER,
            path = %resolved.display(),
            options = options.bits(),
            %priority,
            "stream opened"
        );

        Ok(LocalFileStream::new(handle, priority, Arc::downgrade(&self.queue)))
    }

    /// Open `file_name` inside `dir`, itself relative to the base path unless
    /// absolute.
    pub fn open_in(
        &self,
        dir: impl AsRef<Path>,
        file_name: impl AsRef<Path>,
        options: FileOptions,
        priority: FilePriority,
    ) -> FileResult<Box<dyn FileStream>> {
        let file_name = file_name.as_ref();
        if file_name.as_os_str().is_empty() {
            return Err(FileError::InvalidParams("empty file name"));
        }
        self.open(dir.as_ref().join(file_name), options, priority)
    }

    /// Wrap a standard device in a stream. The device is never closed.
    pub fn open_std(
        &self,
        device: StdDevice,
        priority: FilePriority,
    ) -> FileResult<Box<dyn FileStream>> {
        if self.queue.is_shut_down() {
            return Err(FileError::ShutDown);
        }
        let handle = NativeFile::std_device(device);
        Ok(Box::new(LocalFileStream::new(
            handle,
            priority,
            Arc::downgrade(&self.queue),
        )))
    }

    /// Absolute paths are returned as-is; relative paths are joined to the
    /// base path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.read().join(path)
        }
    }

    /// Change the base path. Streams already open are unaffected.
    pub fn set_base_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(target: targets::MANAGER, base_path = %path.display(), "base path changed");
        *self.base_path.write() = path;
    }

    pub fn base_path(&self) -> PathBuf {
        self.base_path.read().clone()
    }

    /// Commands submitted but not yet picked up by the worker.
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Whether the manager accepts work and its worker is alive.
    pub fn is_running(&self) -> bool {
        !self.queue.is_shut_down() && self.worker.is_running()
    }

    /// Stop accepting submissions, let the worker drain the queue, and join it.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        self.queue.request_shutdown();
        let remaining = self.queue.len();
        if self.worker.join() {
            tracing::debug!(target: targets::MANAGER, drained = remaining, "file manager stopped");
        }
    }
}

impl Drop for FileManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("base_path", &*self.base_path.read())
            .field("pending_commands", &self.pending_commands())
            .field("running", &self.is_running())
            .finish()
    }
}

//! File streams: buffer operations locally, submit them as one batch, wait.
//!
//! A stream moves through a small state machine:
//!
//! ```text
//! Idle --read/write/seek--> Buffering --submit--> Pending --worker--> Idle
//! ```
//!
//! `read`, `write` and `seek` never touch the file. They append to a local
//! command list that only the owning stream sees. `submit` hands the whole list
//! to the manager's queue in one step, and `wait` blocks until the worker has
//! run the last command of that batch.

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use spindle_native::{FileOptions, NativeFile, SeekOrigin};

use crate::buffer::IoBuffer;
use crate::command::{BatchOutcome, IoCommand, IoKind, ResultSlot, SeekTarget};
use crate::error::{FileError, FileResult};
use crate::logging::{PerfSpan, span_names, targets};
use crate::notification::Notification;
use crate::priority::FilePriority;
use crate::queue::SharedJobQueue;

/// Asynchronous, batched access to one open file.
///
/// Streams are obtained from [`FileManager::open`](crate::FileManager::open).
/// Each stream is driven by one thread at a time; different streams may be
/// driven from different threads concurrently.
pub trait FileStream: Send {
    /// Queue a read of `size` bytes into the front of `dst`.
    ///
    /// # Errors
    ///
    /// `InvalidAccess` without read access; `InvalidParams` when `size` is
    /// zero or larger than `dst`. Nothing is queued on error.
    fn read(&mut self, dst: &IoBuffer, size: usize) -> FileResult<()>;

    /// Queue a write of the first `size` bytes of `src`.
    ///
    /// # Errors
    ///
    /// `InvalidAccess` without write access; `InvalidParams` when `size` is
    /// zero or larger than `src`. Nothing is queued on error.
    fn write(&mut self, src: &IoBuffer, size: usize) -> FileResult<()>;

    /// Move the logical cursor. Takes effect on the next queued transfer.
    fn seek(&mut self, offset: i64, origin: SeekOrigin);

    /// Hand the buffered operations to the worker as one batch.
    ///
    /// Does nothing when nothing is buffered.
    ///
    /// # Errors
    ///
    /// `Busy` while the previous batch is still pending, `ShutDown` once the
    /// manager has stopped. The buffered operations are kept on error.
    fn submit(&mut self) -> FileResult<()>;

    /// Block until the last submitted batch completes and return the number of
    /// bytes it transferred. `None` waits forever.
    ///
    /// # Errors
    ///
    /// `Timeout` if the deadline passes first (the batch keeps running),
    /// `Eof` if a read ran out of file, `Io` if a native call failed.
    fn wait(&self, timeout: Option<Duration>) -> FileResult<u64>;

    /// Wait for outstanding work and release the native handle.
    fn close(self: Box<Self>) -> FileResult<()>;

    /// Current length of the file.
    fn length(&self) -> FileResult<u64>;

    /// Path the stream was opened with.
    fn name(&self) -> &Path;

    /// Priority of every command this stream submits.
    fn priority(&self) -> FilePriority;

    /// Options the stream was opened with.
    fn options(&self) -> FileOptions;

    /// Whether operations are buffered but not yet submitted.
    fn has_buffered(&self) -> bool;
}

/// A stream backed by a local file.
pub struct LocalFileStream {
    handle: Arc<NativeFile>,
    queue: Weak<SharedJobQueue>,
    notification: Arc<Notification>,
    priority: FilePriority,
    /// Position the next transfer starts from, as far as the stream knows.
    cursor: SeekTarget,
    seek_pending: bool,
    /// Set when a failed batch left the native pointer short of `cursor`.
    cursor_stale: bool,
    /// Cursor at the first command of the local buffer.
    batch_start: SeekTarget,
    awaiting_outcome: bool,
    local: Vec<IoCommand>,
    batch_slot: Arc<ResultSlot>,
    closed: bool,
}

static_assertions::assert_impl_all!(LocalFileStream: Send);

impl LocalFileStream {
    pub(crate) fn new(
        handle: NativeFile,
        priority: FilePriority,
        queue: Weak<SharedJobQueue>,
    ) -> Self {
        Self {
            handle: Arc::new(handle),
            queue,
            notification: Arc::new(Notification::new()),
            priority,
            cursor: SeekTarget {
                offset: 0,
                origin: SeekOrigin::Begin,
            },
            seek_pending: false,
            cursor_stale: false,
            batch_start: SeekTarget {
                offset: 0,
                origin: SeekOrigin::Begin,
            },
            awaiting_outcome: false,
            local: Vec::new(),
            batch_slot: Arc::default(),
            closed: false,
        }
    }

    /// Wait for outstanding work and release the native handle.
    ///
    /// Operations that were buffered but never submitted are discarded.
    pub fn close(mut self) -> FileResult<()> {
        self.shut()
    }

    fn append(&mut self, kind: IoKind, buffer: &IoBuffer, size: usize) -> FileResult<()> {
        let allowed = match kind {
            IoKind::Read => self.handle.options().can_read(),
            IoKind::Write => self.handle.options().can_write(),
        };
        if !allowed {
            return Err(FileError::InvalidAccess(kind));
        }
        if size == 0 {
            return Err(FileError::InvalidParams("zero-length transfer"));
        }
        if size > buffer.len() {
            return Err(FileError::InvalidParams("transfer larger than buffer"));
        }

        self.reconcile();
        if self.local.is_empty() {
            self.batch_start = self.cursor;
        }

        let seek = (self.seek_pending || self.cursor_stale).then_some(self.cursor);
        self.seek_pending = false;
        self.cursor_stale = false;

        self.local.push(IoCommand {
            handle: Arc::clone(&self.handle),
            kind,
            seek,
            buffer: buffer.clone(),
            size,
            priority: self.priority,
            sequence: 0,
            slot: Arc::clone(&self.batch_slot),
            completion: None,
        });

        // A relative position stays relative: the native pointer will have
        // advanced past this transfer, which is offset zero from "current".
        let advanced = i64::try_from(size).unwrap_or(i64::MAX);
        self.cursor = match self.cursor.origin {
            SeekOrigin::Begin => SeekTarget {
                offset: self.cursor.offset.saturating_add(advanced),
                origin: SeekOrigin::Begin,
            },
            SeekOrigin::Current | SeekOrigin::End => SeekTarget {
                offset: 0,
                origin: SeekOrigin::Current,
            },
        };
        Ok(())
    }

    /// Check a finished batch. The tracked cursor advances by the requested
    /// sizes, so after a short read or failed seek the native pointer lags it
    /// and the next transfer must carry an explicit seek to the cursor.
    fn reconcile(&mut self) {
        if !self.awaiting_outcome {
            return;
        }
        let Some(outcome) = self.notification.try_outcome() else {
            return;
        };
        self.awaiting_outcome = false;
        if outcome.is_ok() {
            return;
        }

        tracing::trace!(
            target: targets::STREAM,
            path = %self.handle.path().display(),
            "batch failed, re-seeking before next transfer"
        );
        match self.local.first_mut() {
            Some(first) => {
                if first.seek.is_none() {
                    first.seek = Some(self.batch_start);
                }
            }
            None => self.cursor_stale = true,
        }
    }

    fn shut(&mut self) -> FileResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.local.is_empty() {
            tracing::debug!(
                target: targets::STREAM,
                path = %self.handle.path().display(),
                discarded = self.local.len(),
                "closing with unsubmitted operations"
            );
            self.local.clear();
        }

        if let Err(e) = self.notification.wait().into_result() {
            tracing::debug!(
                target: targets::STREAM,
                path = %self.handle.path().display(),
                error = %e,
                "last batch failed before close"
            );
        }

        self.handle.close()?;
        tracing::debug!(target: targets::STREAM, path = %self.handle.path().display(), "stream closed");
        Ok(())
    }
}

impl FileStream for LocalFileStream {
    fn read(&mut self, dst: &IoBuffer, size: usize) -> FileResult<()> {
        self.append(IoKind::Read, dst, size)
    }

    fn write(&mut self, src: &IoBuffer, size: usize) -> FileResult<()> {
        self.append(IoKind::Write, src, size)
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) {
        let target = match origin {
            SeekOrigin::Current => SeekTarget {
                offset: self.cursor.offset.saturating_add(offset),
                origin: self.cursor.origin,
            },
            SeekOrigin::Begin | SeekOrigin::End => SeekTarget { offset, origin },
        };
        if target != self.cursor {
            self.cursor = target;
            self.seek_pending = true;
        }
    }

    fn submit(&mut self) -> FileResult<()> {
        if self.local.is_empty() {
            return Ok(());
        }
        if !self.notification.is_ready() {
            return Err(FileError::Busy);
        }
        self.reconcile();
        let queue = self.queue.upgrade().ok_or(FileError::ShutDown)?;

        let _perf = PerfSpan::new(span_names::SUBMIT);
        let commands = self.local.len();

        self.notification.reset();
        if let Some(last) = self.local.last_mut() {
            last.completion = Some(Arc::clone(&self.notification));
        }

        if let Err(e) = queue.submit(&mut self.local) {
            if let Some(last) = self.local.last_mut() {
                last.completion = None;
            }
            // Nothing was queued, so nothing will raise it.
            self.notification.notify(BatchOutcome::default());
            return Err(e);
        }

        self.batch_slot = Arc::default();
        self.awaiting_outcome = true;
        tracing::debug!(
            target: targets::STREAM,
            path = %self.handle.path().display(),
            commands,
            priority = self.priority.value(),
            "batch submitted"
        );
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> FileResult<u64> {
        let outcome = match timeout {
            None => self.notification.wait(),
            Some(timeout) => self
                .notification
                .wait_for(timeout)
                .ok_or(FileError::Timeout)?,
        };
        outcome.into_result()
    }

    fn close(self: Box<Self>) -> FileResult<()> {
        let mut stream = self;
        stream.shut()
    }

    fn length(&self) -> FileResult<u64> {
        Ok(self.handle.length()?)
    }

    fn name(&self) -> &Path {
        self.handle.path()
    }

    fn priority(&self) -> FilePriority {
        self.priority
    }

    fn options(&self) -> FileOptions {
        self.handle.options()
    }

    fn has_buffered(&self) -> bool {
        !self.local.is_empty()
    }
}

impl Drop for LocalFileStream {
    fn drop(&mut self) {
        if let Err(e) = self.shut() {
            tracing::warn!(
                target: targets::STREAM,
                path = %self.handle.path().display(),
                error = %e,
                "failed to close stream on drop"
            );
        }
    }
}

impl std::fmt::Debug for LocalFileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStream")
            .field("path", &self.handle.path())
            .field("priority", &self.priority)
            .field("cursor", &self.cursor)
            .field("seek_pending", &self.seek_pending)
            .field("buffered", &self.local.len())
            .field("pending", &!self.notification.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::command::CommandFailure;

    /// A stream with no live queue, for exercising the local buffer.
    fn detached(dir: &TempDir, options: FileOptions) -> LocalFileStream {
        let handle = NativeFile::open(dir.path().join("s.bin"), options).unwrap();
        LocalFileStream::new(handle, FilePriority::NORMAL, Weak::new())
    }

    fn seeks(stream: &LocalFileStream) -> Vec<Option<SeekTarget>> {
        stream.local.iter().map(|c| c.seek).collect()
    }

    #[test]
    fn test_access_checks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("s.bin"), b"data").unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_READ);
        let buf = IoBuffer::zeroed(4);

        assert!(matches!(
            stream.write(&buf, 4),
            Err(FileError::InvalidAccess(IoKind::Write))
        ));
        assert!(!stream.has_buffered());
        stream.read(&buf, 4).unwrap();
        assert!(stream.has_buffered());
    }

    #[test]
    fn test_size_checks() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(4);

        assert!(matches!(stream.read(&buf, 0), Err(FileError::InvalidParams(_))));
        assert!(matches!(stream.write(&buf, 5), Err(FileError::InvalidParams(_))));
        assert!(!stream.has_buffered());
    }

    #[test]
    fn test_seek_attached_once() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        stream.write(&buf, 4).unwrap();
        stream.seek(100, SeekOrigin::Begin);
        stream.write(&buf, 8).unwrap();
        stream.write(&buf, 8).unwrap();

        assert_eq!(
            seeks(&stream),
            vec![
                None,
                Some(SeekTarget {
                    offset: 100,
                    origin: SeekOrigin::Begin
                }),
                None,
            ]
        );
    }

    #[test]
    fn test_seek_to_tracked_position_is_free() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        stream.seek(0, SeekOrigin::Begin);
        stream.write(&buf, 16).unwrap();
        stream.seek(16, SeekOrigin::Begin);
        stream.seek(0, SeekOrigin::Current);
        stream.read(&buf, 16).unwrap();

        assert_eq!(seeks(&stream), vec![None, None]);
    }

    #[test]
    fn test_relative_seeks_compose() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        stream.write(&buf, 16).unwrap();
        stream.seek(-6, SeekOrigin::Current);
        stream.seek(2, SeekOrigin::Current);
        stream.read(&buf, 4).unwrap();

        assert_eq!(
            seeks(&stream)[1],
            Some(SeekTarget {
                offset: 12,
                origin: SeekOrigin::Begin
            })
        );
    }

    #[test]
    fn test_end_relative_cursor() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        stream.seek(0, SeekOrigin::End);
        stream.write(&buf, 4).unwrap();
        stream.write(&buf, 4).unwrap();
        stream.seek(0, SeekOrigin::End);
        stream.write(&buf, 4).unwrap();

        let end = Some(SeekTarget {
            offset: 0,
            origin: SeekOrigin::End,
        });
        assert_eq!(seeks(&stream), vec![end, None, end]);
    }

    fn short_read_outcome() -> BatchOutcome {
        BatchOutcome {
            transferred: 6,
            failure: Some(CommandFailure::Eof),
        }
    }

    #[test]
    fn test_failed_batch_forces_seek() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        // Where a submitted ten-byte read leaves the tracked cursor.
        stream.cursor = SeekTarget {
            offset: 10,
            origin: SeekOrigin::Begin,
        };
        stream.awaiting_outcome = true;
        stream.notification.notify(short_read_outcome());

        // Same position as tracked, but the native pointer can't be trusted.
        stream.seek(10, SeekOrigin::Begin);
        stream.write(&buf, 2).unwrap();
        stream.write(&buf, 2).unwrap();

        let at_ten = Some(SeekTarget {
            offset: 10,
            origin: SeekOrigin::Begin,
        });
        assert_eq!(seeks(&stream), vec![at_ten, None]);
        assert!(!stream.awaiting_outcome);
    }

    #[test]
    fn test_failure_seen_at_submit_patches_first_command() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        // Where a submitted ten-byte read leaves the tracked cursor.
        stream.cursor = SeekTarget {
            offset: 10,
            origin: SeekOrigin::Begin,
        };
        stream.awaiting_outcome = true;
        stream.notification.reset();

        // Queued while the previous batch is still running.
        stream.write(&buf, 2).unwrap();
        assert_eq!(seeks(&stream), vec![None]);

        stream.notification.notify(short_read_outcome());
        assert!(matches!(stream.submit(), Err(FileError::ShutDown)));
        assert_eq!(
            seeks(&stream),
            vec![Some(SeekTarget {
                offset: 10,
                origin: SeekOrigin::Begin
            })]
        );
    }

    #[test]
    fn test_successful_batch_keeps_cursor() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(16);

        stream.awaiting_outcome = true;
        stream.notification.notify(BatchOutcome {
            transferred: 16,
            failure: None,
        });
        stream.write(&buf, 4).unwrap();

        assert_eq!(seeks(&stream), vec![None]);
    }

    #[test]
    fn test_append_while_buffer_locked() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);
        let buf = IoBuffer::zeroed(8);

        let guard = buf.lock();
        stream.write(&buf, 8).unwrap();
        assert!(matches!(stream.read(&buf, 9), Err(FileError::InvalidParams(_))));
        drop(guard);

        assert_eq!(stream.local.len(), 1);
    }

    #[test]
    fn test_submit_without_manager() {
        let dir = TempDir::new().unwrap();
        let mut stream = detached(&dir, FileOptions::ACCESS_RW);

        // Nothing buffered: a no-op even without a queue.
        stream.submit().unwrap();

        stream.write(&IoBuffer::zeroed(2), 2).unwrap();
        assert!(matches!(stream.submit(), Err(FileError::ShutDown)));
        assert!(stream.has_buffered());
        assert!(stream.notification.is_ready());
    }

    #[test]
    fn test_wait_before_submit_returns_immediately() {
        let dir = TempDir::new().unwrap();
        let stream = detached(&dir, FileOptions::ACCESS_RW);
        assert_eq!(stream.wait(Some(Duration::ZERO)).unwrap(), 0);
        assert_eq!(stream.wait(None).unwrap(), 0);
    }

    #[test]
    fn test_close_releases_handle() {
        let dir = TempDir::new().unwrap();
        let stream = detached(&dir, FileOptions::ACCESS_RW);
        let handle = Arc::clone(&stream.handle);

        stream.close().unwrap();
        assert!(handle.is_closed());
    }
}

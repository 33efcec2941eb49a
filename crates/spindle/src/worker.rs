//! The dedicated I/O worker thread.
//!
//! One worker per manager drains the shared job queue in priority order and
//! performs the native seek, read or write of each command. The queue lock is
//! released before a command runs, so streams can keep submitting while the
//! worker is blocked in a native call.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use spindle_native::{NativeError, Transfer};

use crate::command::{CommandFailure, IoCommand, IoKind, IoPhase};
use crate::error::{FileError, FileResult};
use crate::logging::{PerfSpan, span_names, targets};
use crate::queue::SharedJobQueue;

/// Handle to the running worker thread.
pub(crate) struct IoWorker {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IoWorker {
    /// Start the worker thread on `queue`.
    pub(crate) fn spawn(
        queue: Arc<SharedJobQueue>,
        name: &str,
        stack_size: Option<usize>,
    ) -> FileResult<Self> {
        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || worker_loop(&queue))
            .map_err(FileError::WorkerSpawn)?;

        Ok(Self {
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Whether the thread has been started and has not yet exited.
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the thread to exit.
    ///
    /// Returns `false` if it was already joined or panicked.
    pub(crate) fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }
}

/// Run commands until shutdown is requested and the queue is empty.
fn worker_loop(queue: &SharedJobQueue) {
    let _span = tracing::debug_span!(target: targets::WORKER, span_names::WORKER).entered();
    tracing::debug!(target: targets::WORKER, "I/O worker started");

    let mut executed: u64 = 0;
    while let Some(command) = queue.next() {
        execute(command);
        executed += 1;
    }

    tracing::debug!(target: targets::WORKER, executed, "I/O worker stopped");
}

/// Perform one command, fold its result into its batch and, if it closes the
/// batch, hand the batch outcome to the waiting stream.
pub(crate) fn execute(command: IoCommand) {
    let _perf = PerfSpan::new(span_names::COMMAND);
    let (transferred, failure) = perform(&command);

    tracing::trace!(
        target: targets::WORKER,
        path = %command.handle.path().display(),
        kind = %command.kind,
        size = command.size,
        transferred,
        priority = command.priority.value(),
        sequence = command.sequence,
        "command executed"
    );

    if let Some(CommandFailure::Io { phase, error }) = &failure {
        tracing::warn!(
            target: targets::WORKER,
            path = %command.handle.path().display(),
            %phase,
            %error,
            "native I/O failed"
        );
    }

    command.slot.record(transferred, failure);

    if let Some(notification) = &command.completion {
        let outcome = command.slot.take();
        tracing::debug!(
            target: targets::WORKER,
            path = %command.handle.path().display(),
            transferred = outcome.transferred,
            ok = outcome.is_ok(),
            "batch complete"
        );
        notification.notify(outcome);
    }
}

/// The native part of a command. The buffer lock is held only for the
/// transfer itself.
fn perform(command: &IoCommand) -> (usize, Option<CommandFailure>) {
    if let Some(target) = command.seek {
        if let Err(e) = command.handle.seek(target.offset, target.origin) {
            return (0, Some(native_failure(IoPhase::Seek, e)));
        }
    }

    let phase = IoPhase::from(command.kind);
    match command.kind {
        IoKind::Read => {
            let mut data = command.buffer.lock();
            if command.size > data.len() {
                return (0, Some(shrunk_buffer(phase)));
            }
            match command.handle.read_full(&mut data[..command.size]) {
                Ok(Transfer::Complete(n)) => (n, None),
                Ok(Transfer::Eof(n)) => (n, Some(CommandFailure::Eof)),
                Err(e) => (0, Some(native_failure(phase, e))),
            }
        }
        IoKind::Write => {
            let data = command.buffer.lock();
            if command.size > data.len() {
                return (0, Some(shrunk_buffer(phase)));
            }
            match command.handle.write_full(&data[..command.size]) {
                Ok(n) => (n, None),
                Err(e) => (0, Some(native_failure(phase, e))),
            }
        }
    }
}

fn native_failure(phase: IoPhase, error: NativeError) -> CommandFailure {
    CommandFailure::Io {
        phase,
        error: Arc::new(error.into_io()),
    }
}

// The caller truncated the buffer after queueing the command.
fn shrunk_buffer(phase: IoPhase) -> CommandFailure {
    CommandFailure::Io {
        phase,
        error: Arc::new(io::Error::new(
            io::ErrorKind::InvalidInput,
            "buffer is smaller than the queued transfer",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use spindle_native::{FileOptions, NativeFile, SeekOrigin};
    use tempfile::TempDir;

    use super::*;
    use crate::buffer::IoBuffer;
    use crate::command::{ResultSlot, SeekTarget};
    use crate::notification::Notification;
    use crate::priority::FilePriority;

    fn scratch(name: &str) -> (TempDir, Arc<NativeFile>) {
        let dir = TempDir::new().unwrap();
        let file = NativeFile::open(dir.path().join(name), FileOptions::ACCESS_RW).unwrap();
        (dir, Arc::new(file))
    }

    fn command(
        handle: &Arc<NativeFile>,
        kind: IoKind,
        seek: Option<SeekTarget>,
        buffer: &IoBuffer,
        size: usize,
        slot: &Arc<ResultSlot>,
    ) -> IoCommand {
        IoCommand {
            handle: Arc::clone(handle),
            kind,
            seek,
            buffer: buffer.clone(),
            size,
            priority: FilePriority::NORMAL,
            sequence: 0,
            slot: Arc::clone(slot),
            completion: None,
        }
    }

    fn rewind() -> Option<SeekTarget> {
        Some(SeekTarget {
            offset: 0,
            origin: SeekOrigin::Begin,
        })
    }

    #[test]
    fn test_write_then_read_back() {
        let (_dir, file) = scratch("rw.bin");
        let slot = Arc::new(ResultSlot::default());
        let note = Arc::new(Notification::new());
        note.reset();

        let src = IoBuffer::from(&b"spindle"[..]);
        let dst = IoBuffer::zeroed(7);

        execute(command(&file, IoKind::Write, None, &src, 7, &slot));
        let mut read = command(&file, IoKind::Read, rewind(), &dst, 7, &slot);
        read.completion = Some(Arc::clone(&note));
        execute(read);

        let outcome = note.wait_for(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome.into_result().unwrap(), 14);
        assert_eq!(dst.to_vec(), b"spindle");
    }

    #[test]
    fn test_read_past_end_reports_eof() {
        let (_dir, file) = scratch("short.bin");
        file.write_full(b"abc").unwrap();

        let slot = Arc::new(ResultSlot::default());
        let note = Arc::new(Notification::new());
        note.reset();

        let dst = IoBuffer::zeroed(8);
        let mut read = command(&file, IoKind::Read, rewind(), &dst, 8, &slot);
        read.completion = Some(Arc::clone(&note));
        execute(read);

        match note.wait().into_result() {
            Err(FileError::Eof { transferred }) => assert_eq!(transferred, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(&dst.to_vec()[..3], b"abc");
    }

    #[test]
    fn test_failed_seek_skips_transfer() {
        let (_dir, file) = scratch("seek.bin");
        let slot = Arc::new(ResultSlot::default());
        let note = Arc::new(Notification::new());
        note.reset();

        let src = IoBuffer::from(&b"xyz"[..]);
        let bad = Some(SeekTarget {
            offset: -5,
            origin: SeekOrigin::Begin,
        });
        let mut write = command(&file, IoKind::Write, bad, &src, 3, &slot);
        write.completion = Some(Arc::clone(&note));
        execute(write);

        match note.wait().into_result() {
            Err(FileError::Io { phase, .. }) => assert_eq!(phase, IoPhase::Seek),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(file.length().unwrap(), 0);
    }

    #[test]
    fn test_shrunk_buffer_is_an_error() {
        let (_dir, file) = scratch("shrunk.bin");
        let slot = Arc::new(ResultSlot::default());
        let src = IoBuffer::zeroed(4);
        let write = command(&file, IoKind::Write, None, &src, 4, &slot);
        src.lock().truncate(2);

        execute(write);
        assert!(matches!(
            slot.take().failure,
            Some(CommandFailure::Io {
                phase: IoPhase::Write,
                ..
            })
        ));
    }

    /// Collects the `operation` field of every span opened.
    #[derive(Clone, Default)]
    struct Operations(Arc<Mutex<Vec<String>>>);

    impl tracing::field::Visit for Operations {
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            if field.name() == "operation" {
                self.0.lock().push(value.to_string());
            }
        }

        fn record_debug(&mut self, _: &tracing::field::Field, _: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Operations {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _: &tracing::span::Id,
            _: tracing_subscriber::layer::Context<'_, S>,
        ) {
            attrs.record(&mut self.clone());
        }
    }

    #[test]
    fn test_execute_opens_command_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let (_dir, file) = scratch("span.bin");
        let slot = Arc::new(ResultSlot::default());
        let src = IoBuffer::from(&b"ab"[..]);

        let operations = Operations::default();
        let subscriber = tracing_subscriber::registry().with(operations.clone());
        tracing::subscriber::with_default(subscriber, || {
            execute(command(&file, IoKind::Write, None, &src, 2, &slot));
        });

        assert!(
            operations
                .0
                .lock()
                .iter()
                .any(|op| op == span_names::COMMAND)
        );
    }

    #[test]
    fn test_worker_drains_queue_on_shutdown() {
        let (_dir, file) = scratch("drain.bin");
        let queue = Arc::new(SharedJobQueue::new());
        let slot = Arc::new(ResultSlot::default());
        let note = Arc::new(Notification::new());
        note.reset();

        let src = IoBuffer::from(&b"0123"[..]);
        let guard = src.lock();

        let mut batch = vec![
            command(&file, IoKind::Write, None, &src, 4, &slot),
            command(&file, IoKind::Write, None, &src, 4, &slot),
        ];
        batch[1].completion = Some(Arc::clone(&note));
        queue.submit(&mut batch).unwrap();

        let worker = IoWorker::spawn(Arc::clone(&queue), "spindle-test", None).unwrap();
        assert!(worker.is_running());
        queue.request_shutdown();
        drop(guard);

        assert!(worker.join());
        assert!(!worker.is_running());
        assert_eq!(note.wait().into_result().unwrap(), 8);
        assert_eq!(file.length().unwrap(), 8);
        assert!(!worker.join());
    }
}

//! Priority-ordered asynchronous file I/O.
//!
//! spindle lets application code queue file reads, writes and seeks without
//! blocking, then hand them to a dedicated worker thread as one batch:
//!
//! 1. [`FileManager::open`] opens a file and returns a [`FileStream`].
//! 2. [`FileStream::read`], [`FileStream::write`] and [`FileStream::seek`]
//!    only record what to do.
//! 3. [`FileStream::submit`] moves the recorded batch into the manager's
//!    shared queue.
//! 4. The worker executes queued commands in [`FilePriority`] order (lower
//!    values first, arrival order among equals) and signals the stream when
//!    the last command of its batch has run.
//! 5. [`FileStream::wait`] blocks until then and reports the bytes moved or
//!    the first failure.
//!
//! Data moves through [`IoBuffer`]s, shared byte buffers that the caller keeps
//! a handle to and inspects after `wait` returns.
//!
//! ```no_run
//! use spindle::{FileManager, FileOptions, FilePriority, FileStream, IoBuffer, SeekOrigin};
//!
//! let manager = FileManager::builder().base_path("/tmp").build()?;
//! let mut stream = manager.open("blob.bin", FileOptions::ACCESS_RW, FilePriority::HIGH)?;
//!
//! let out = IoBuffer::from(vec![7u8; 4096]);
//! let back = IoBuffer::zeroed(4096);
//! stream.write(&out, 4096)?;
//! stream.seek(0, SeekOrigin::Begin);
//! stream.read(&back, 4096)?;
//! stream.submit()?;
//!
//! assert_eq!(stream.wait(None)?, 8192);
//! assert_eq!(back.to_vec(), out.to_vec());
//! stream.close()?;
//! # Ok::<(), spindle::FileError>(())
//! ```
//!
//! The blocking primitives underneath live in the `spindle-native` crate; its
//! option and seek types are re-exported here.

mod buffer;
mod command;
mod config;
mod error;
pub mod logging;
mod manager;
mod notification;
mod priority;
mod queue;
mod stream;
mod worker;

pub use buffer::{IoBuffer, IoBufferGuard};
pub use command::{BatchOutcome, CommandFailure, IoKind, IoPhase, SeekTarget};
pub use config::{DEFAULT_THREAD_NAME, FileManagerBuilder, FileManagerConfig};
pub use error::{FileError, FileResult};
pub use manager::FileManager;
pub use notification::Notification;
pub use priority::FilePriority;
pub use stream::{FileStream, LocalFileStream};

pub use spindle_native::{FileOptions, NativeError, SeekOrigin, StdDevice};

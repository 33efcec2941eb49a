//! Shared byte buffers that carry data to and from the I/O worker.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

#[derive(Default)]
struct Shared {
    data: Mutex<Vec<u8>>,
    /// Length as of the last released guard. Readable while the data is locked.
    len: AtomicUsize,
}

/// A reference-counted, lock-guarded byte buffer.
///
/// Reads fill a prefix of the buffer; writes take their bytes from a prefix.
/// Clones share the same storage, so the caller keeps one clone and the queued
/// command holds another until the worker is done with it. Holding the lock
/// across a pending batch stalls the worker when it reaches a command using
/// this buffer.
///
/// [`len`](Self::len) does not take the lock, so queueing another transfer on
/// a buffer the worker is busy with returns at once. A resize made through
/// [`lock`](Self::lock) becomes visible to `len` when the guard is dropped.
#[derive(Clone, Default)]
pub struct IoBuffer {
    inner: Arc<Shared>,
}

static_assertions::assert_impl_all!(IoBuffer: Send, Sync);

impl IoBuffer {
    /// A buffer of `len` zero bytes, typically a read destination.
    pub fn zeroed(len: usize) -> Self {
        Self::from(vec![0u8; len])
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Acquire)
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the contents.
    pub fn lock(&self) -> IoBufferGuard<'_> {
        IoBufferGuard {
            data: self.inner.data.lock(),
            len: &self.inner.len,
        }
    }

    /// Copy the contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.data.lock().clone()
    }

    /// Whether two handles share storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Vec<u8>> for IoBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Shared {
                len: AtomicUsize::new(bytes.len()),
                data: Mutex::new(bytes),
            }),
        }
    }
}

impl From<&[u8]> for IoBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl fmt::Debug for IoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuffer").field("len", &self.len()).finish()
    }
}

/// Exclusive access to an [`IoBuffer`]'s bytes.
pub struct IoBufferGuard<'a> {
    data: MutexGuard<'a, Vec<u8>>,
    len: &'a AtomicUsize,
}

impl Deref for IoBufferGuard<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.data
    }
}

impl DerefMut for IoBufferGuard<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl Drop for IoBufferGuard<'_> {
    fn drop(&mut self) {
        self.len.store(self.data.len(), Ordering::Release);
    }
}

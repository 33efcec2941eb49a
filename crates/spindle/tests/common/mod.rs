//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use spindle::{FileManager, FileOptions, FilePriority, FileStream, IoBuffer};
use tempfile::TempDir;

pub fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn manager(dir: &TempDir) -> FileManager {
    setup();
    FileManager::builder()
        .base_path(dir.path())
        .thread_name("spindle-it")
        .build()
        .unwrap()
}

/// Block until the worker has taken every queued command.
pub fn wait_for_idle(manager: &FileManager) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.pending_commands() > 0 {
        assert!(Instant::now() < deadline, "worker never drained the queue");
        thread::sleep(Duration::from_millis(1));
    }
}

/// A highest-priority stream with a one-byte write through the returned gate
/// buffer already buffered. Lock the gate, submit, then [`wait_for_idle`]: the
/// worker stays parked on the gate until the lock is released.
pub fn gated_stream(manager: &FileManager) -> (Box<dyn FileStream>, IoBuffer) {
    let gate = IoBuffer::zeroed(1);
    let mut blocker = manager
        .open("gate.bin", FileOptions::ACCESS_RW, FilePriority::HIGHEST)
        .unwrap();
    blocker.write(&gate, 1).unwrap();
    (blocker, gate)
}

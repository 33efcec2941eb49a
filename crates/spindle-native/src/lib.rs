//! Synchronous native file primitives.
//!
//! This crate is the blocking layer underneath `spindle`: it opens files from
//! a [`FileOptions`] bitmask, reads and writes full buffers (retrying short
//! transfers), seeks, flushes and closes. Nothing here is asynchronous; the
//! `spindle` worker thread is the only intended caller of the transfer
//! primitives.
//!
//! ```no_run
//! use spindle_native::{FileOptions, NativeFile, SeekOrigin};
//!
//! let file = NativeFile::open("data.bin", FileOptions::ACCESS_RW)?;
//! file.write_full(b"payload")?;
//! file.seek(0, SeekOrigin::Begin)?;
//! let mut buf = [0u8; 7];
//! file.read_full(&mut buf)?;
//! file.close()?;
//! # Ok::<(), spindle_native::NativeError>(())
//! ```

mod error;
mod handle;
mod options;

pub use error::{NativeError, NativeResult};
pub use handle::{NativeFile, Transfer};
pub use options::{FileOptions, SeekOrigin, StdDevice};

/// Target names for log filtering.
pub mod targets {
    /// Native open and close events.
    pub const NATIVE: &str = "spindle_native";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_matches_crate_name() {
        assert_eq!(targets::NATIVE, env!("CARGO_CRATE_NAME"));
    }
}

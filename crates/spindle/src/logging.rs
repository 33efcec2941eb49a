//! Logging and tracing hooks.
//!
//! spindle instruments itself with the `tracing` crate. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("spindle::worker=trace")
//!     .init();
//! ```
//!
//! The worker logs every command at `trace`, batch completion at `debug` and
//! native failures at `warn`. Streams and the manager log lifecycle events at
//! `debug`.

/// Span names used for tracing.
pub mod span_names {
    /// One batch submission on a stream.
    pub const SUBMIT: &str = "spindle::submit";
    /// One command executed by the worker.
    pub const COMMAND: &str = "spindle::command";
    /// Lifetime of the worker thread.
    pub const WORKER: &str = "spindle::worker";
}

/// Target names for log filtering.
pub mod targets {
    /// Manager lifecycle and open calls.
    pub const MANAGER: &str = "spindle::manager";
    /// Stream operations.
    pub const STREAM: &str = "spindle::stream";
    /// Queue insertions and shutdown.
    pub const QUEUE: &str = "spindle::queue";
    /// The I/O worker thread.
    pub const WORKER: &str = "spindle::worker";
    /// Timing spans.
    pub const PERF: &str = "spindle::perf";
}

/// Guard for a timing span; the span is active until the guard is dropped.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new span named `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::debug_span!(target: targets::PERF, "perf", operation);
        Self {
            span: span.entered(),
        }
    }
}

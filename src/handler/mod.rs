//! Callbacks invoked while a child process runs.
//!
//! The session calls a [`ProcessHandler`] whenever stdin wants more data,
//! stdout or stderr produced a framed unit, or a heartbeat interval passed
//! without activity. Every callback answers with a [`Verdict`]; any
//! terminating verdict stops the child.
//!
//! # Example
//!
//! ```ignore
//! use libcunilog::{ProcessHandler, Verdict};
//!
//! struct Grep;
//!
//! impl ProcessHandler for Grep {
//!     fn on_stdout(&mut self, line: &[u8]) -> Verdict {
//!         if line.starts_with(b"FATAL") {
//!             return Verdict::TerminateWithFailure;
//!         }
//!         Verdict::Continue
//!     }
//! }
//! ```

mod callbacks;
mod capture;

pub use callbacks::{ProcessHandler, StdinRequest, Verdict};
pub use capture::{CaptureHandler, LogLevel, LoggingHandler};

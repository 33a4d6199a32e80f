//! Running a child process with its stdio wired to callbacks.
//!
//! # Architecture
//!
//! ```text
//!  handler                     ProcessSession                  child
//! ┌──────────┐   on_stdin    ┌────────────────┐   stdin pipe  ┌───────┐
//! │          │──────────────▶│ WriteChannel   │──────────────▶│       │
//! │          │   on_stdout   │ ReadChannel    │◀──stdout──────│       │
//! │          │◀──(framed)────│ ReadChannel    │◀──stderr──────│       │
//! │          │   on_stderr   │                │               │       │
//! │          │◀──────────────│  heartbeat     │               │       │
//! └──────────┘               └────────────────┘               └───────┘
//! ```
//!
//! Each pipe is a channel with its own growable buffer and an explicit
//! `Idle -> Pending -> Idle | EndOfStream` state. A channel's buffer is
//! never resized while a transfer is pending, so the bytes a read lands in
//! are always the bytes handed to the callback.
//!
//! After the child exits, stdout and stderr are drained until they report
//! end of stream or the configured drain timeout passes. Output written by
//! grandchildren that inherited the pipes is not waited for beyond that.

mod channel;
pub mod framing;
mod launcher;
mod outcome;
mod session;
mod terminate;

use std::fmt;

pub use framing::{find_line_ending, LineEnding};
pub use launcher::{run_and_capture, run_process, ProcessLauncher};
pub use outcome::{CapturedOutput, IoStats, ProcessOutcome, Termination, EXIT_FAILURE};

/// One of the three standard streams of a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The child's standard input.
    Stdin,
    /// The child's standard output.
    Stdout,
    /// The child's standard error.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdin => write!(f, "stdin"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

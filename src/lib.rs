//! # libcunilog
//!
//! Async child-process runner with framed stdio callbacks.
//!
//! This library runs an external program and wires its standard streams to a
//! [`ProcessHandler`], supporting:
//! - Per-stream selection of stdin, stdout and stderr
//! - Output framing: raw chunks, one line at a time, or everything at once
//! - Heartbeat callbacks while the child is quiet
//! - Callback-driven termination with a graceful-then-forced shutdown
//!
//! ## Quick Start
//!
//! ```no_run
//! use libcunilog::{run_and_capture, RunConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RunConfig::builder()
//!         .executable("/bin/echo")
//!         .arg("hello")
//!         .build()?;
//!
//!     let output = run_and_capture(&config, None).await?;
//!     print!("{}", output.stdout_lossy());
//!     Ok(())
//! }
//! ```
//!
//! ## Line callbacks
//!
//! ```no_run
//! use libcunilog::{Framing, ProcessHandler, ProcessLauncher, RunConfig, Verdict};
//!
//! struct Printer;
//!
//! impl ProcessHandler for Printer {
//!     fn on_stdout(&mut self, line: &[u8]) -> Verdict {
//!         println!("> {}", String::from_utf8_lossy(line));
//!         Verdict::Continue
//!     }
//! }
//!
//! # async fn example() -> libcunilog::Result<()> {
//! let config = RunConfig::builder()
//!     .executable("/usr/bin/make")
//!     .framing(Framing::OneLine)
//!     .build()?;
//! ProcessLauncher::new(config).run(&mut Printer).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Stopping early
//!
//! Every callback returns a [`Verdict`]. Returning [`Verdict::Terminate`] or
//! [`Verdict::TerminateWithFailure`] stops the session: the child is asked to
//! exit, killed after [`RunConfig::exit_timeout`], and no further callbacks
//! are made.

pub mod buffer;
pub mod config;
mod error;
pub mod handler;
pub mod process;

pub use error::{Error, Result};

pub use buffer::{ByteBuffer, CapacityError};

// Re-export commonly used config types at crate root
pub use config::{Framing, RunConfig, RunConfigBuilder, RunFlags};

// Re-export handler types at crate root
pub use handler::{CaptureHandler, LogLevel, LoggingHandler, ProcessHandler, StdinRequest, Verdict};

// Re-export commonly used process types at crate root
pub use process::{
    run_and_capture, run_process, CapturedOutput, IoStats, ProcessLauncher, ProcessOutcome,
    StreamKind, Termination,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_send<T: Send>() {}

    /// All major public types must be Send + Sync for use across async tasks.
    #[test]
    fn public_types_are_send_sync() {
        // Configuration types
        assert_send_sync::<RunConfig>();
        assert_send_sync::<RunConfigBuilder>();
        assert_send_sync::<Framing>();
        assert_send_sync::<RunFlags>();

        // Buffers
        assert_send_sync::<ByteBuffer>();

        // Handlers
        assert_send_sync::<CaptureHandler>();
        assert_send_sync::<LoggingHandler>();
        assert_send_sync::<Verdict>();

        // Process types
        assert_send_sync::<ProcessLauncher>();
        assert_send_sync::<ProcessOutcome>();
        assert_send_sync::<CapturedOutput>();
        assert_send_sync::<Termination>();

        // Error type
        assert_send_sync::<Error>();
    }

    /// Running a launcher borrows the handler across awaits, so the future
    /// must be Send for use with spawned tasks.
    #[test]
    fn run_future_is_send() {
        fn check(launcher: &ProcessLauncher, handler: &mut CaptureHandler) {
            assert_send_future(launcher.run(handler));
        }
        fn assert_send_future<F: std::future::Future + Send>(_: F) {}
        let _ = check;
        assert_send::<StdinRequest<'static>>();
    }
}

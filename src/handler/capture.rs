//! Ready-made handlers: capturing output and logging it.

use super::callbacks::{ProcessHandler, StdinRequest, Verdict};

/// Handler that records everything the child prints.
///
/// Each framed unit is kept separately, so with [`Framing::OneLine`] the
/// units are the lines. An optional stdin payload is sent once, after which
/// stdin is closed.
///
/// [`Framing::OneLine`]: crate::config::Framing::OneLine
#[derive(Debug, Clone, Default)]
pub struct CaptureHandler {
    stdin: Option<Vec<u8>>,
    stdout: Vec<Vec<u8>>,
    stderr: Vec<Vec<u8>>,
    heartbeats: usize,
}

impl CaptureHandler {
    /// Create a capture handler with no stdin payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capture handler that sends `input` to the child's stdin.
    pub fn with_stdin(input: impl Into<Vec<u8>>) -> Self {
        Self {
            stdin: Some(input.into()),
            ..Self::default()
        }
    }

    /// Units delivered from stdout, in arrival order.
    pub fn stdout_units(&self) -> &[Vec<u8>] {
        &self.stdout
    }

    /// Units delivered from stderr, in arrival order.
    pub fn stderr_units(&self) -> &[Vec<u8>] {
        &self.stderr
    }

    /// All stdout units concatenated.
    pub fn stdout_bytes(&self) -> Vec<u8> {
        self.stdout.concat()
    }

    /// All stderr units concatenated.
    pub fn stderr_bytes(&self) -> Vec<u8> {
        self.stderr.concat()
    }

    /// Number of heartbeats received.
    pub fn heartbeats(&self) -> usize {
        self.heartbeats
    }

    /// Split into the recorded (stdout, stderr) units.
    pub fn into_units(self) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        (self.stdout, self.stderr)
    }
}

impl ProcessHandler for CaptureHandler {
    fn on_stdin(&mut self, input: &mut StdinRequest<'_>) -> Verdict {
        if let Some(payload) = self.stdin.take() {
            if let Err(e) = input.write(&payload) {
                tracing::warn!(error = %e, "could not stage stdin payload");
                return Verdict::TerminateWithFailure;
            }
        }
        input.close();
        Verdict::Continue
    }

    fn on_stdout(&mut self, data: &[u8]) -> Verdict {
        self.stdout.push(data.to_vec());
        Verdict::Continue
    }

    fn on_stderr(&mut self, data: &[u8]) -> Verdict {
        self.stderr.push(data.to_vec());
        Verdict::Continue
    }

    fn on_heartbeat(&mut self) -> Verdict {
        self.heartbeats += 1;
        Verdict::Continue
    }
}

/// Simple handler that logs child output using tracing.
///
/// # Example
///
/// ```ignore
/// use libcunilog::{run_process, LoggingHandler, LogLevel};
///
/// let mut handler = LoggingHandler::with_level(LogLevel::Info);
/// let outcome = run_process(&config, &mut handler).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler {
    level: LogLevel,
}

/// Log level for LoggingHandler.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Log at trace level.
    Trace,
    /// Log at debug level (default).
    #[default]
    Debug,
    /// Log at info level.
    Info,
}

impl LoggingHandler {
    /// Create a new logging handler with debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging handler with a specific level.
    pub fn with_level(level: LogLevel) -> Self {
        Self { level }
    }

    fn log(&self, stream: &str, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        // Truncate content for logging
        let shown = if text.chars().count() > 200 {
            let head: String = text.chars().take(200).collect();
            format!("{}... ({} bytes total)", head, data.len())
        } else {
            text.into_owned()
        };

        match self.level {
            LogLevel::Trace => tracing::trace!(stream, content = %shown, "child output"),
            LogLevel::Debug => tracing::debug!(stream, content = %shown, "child output"),
            LogLevel::Info => tracing::info!(stream, content = %shown, "child output"),
        }
    }
}

impl ProcessHandler for LoggingHandler {
    fn on_stdout(&mut self, data: &[u8]) -> Verdict {
        self.log("stdout", data);
        Verdict::Continue
    }

    fn on_stderr(&mut self, data: &[u8]) -> Verdict {
        self.log("stderr", data);
        Verdict::Continue
    }

    fn on_heartbeat(&mut self) -> Verdict {
        tracing::trace!("child heartbeat");
        Verdict::Continue
    }
}

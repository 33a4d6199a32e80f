//! What a finished run reports back.

use std::process::ExitStatus;

/// Exit code reported when the child never produced one.
pub const EXIT_FAILURE: i32 = 1;

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All streams drained and the child exited on its own.
    Exited,
    /// A callback returned [`Verdict::Terminate`](crate::Verdict::Terminate).
    Terminated {
        /// The child ignored the polite request and had to be killed.
        forced: bool,
    },
    /// A callback returned
    /// [`Verdict::TerminateWithFailure`](crate::Verdict::TerminateWithFailure).
    TerminatedWithFailure {
        /// The child ignored the polite request and had to be killed.
        forced: bool,
    },
}

impl Termination {
    /// True if the child was stopped on request.
    pub fn was_terminated(&self) -> bool {
        !matches!(self, Termination::Exited)
    }

    /// True if the child had to be killed after the grace period.
    pub fn was_forced(&self) -> bool {
        matches!(
            self,
            Termination::Terminated { forced: true } | Termination::TerminatedWithFailure { forced: true }
        )
    }
}

/// Counters collected while the session ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Completed non-empty reads from stdout.
    pub stdout_reads: u64,
    /// Bytes read from stdout.
    pub stdout_bytes: u64,
    /// Completed non-empty reads from stderr.
    pub stderr_reads: u64,
    /// Bytes read from stderr.
    pub stderr_bytes: u64,
    /// Completed writes to stdin.
    pub stdin_writes: u64,
    /// Bytes written to stdin.
    pub stdin_bytes: u64,
    /// Heartbeat callbacks fired.
    pub heartbeats: u64,
}

/// Result of running a child process to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// The child's exit code, or [`EXIT_FAILURE`] if it reported none.
    pub exit_code: i32,
    /// Raw exit status, if the child was reaped.
    pub status: Option<ExitStatus>,
    /// How the session ended.
    pub termination: Termination,
    /// I/O counters.
    pub stats: IoStats,
}

impl ProcessOutcome {
    pub(crate) fn new(status: Option<ExitStatus>, termination: Termination, stats: IoStats) -> Self {
        Self {
            exit_code: status.and_then(|s| s.code()).unwrap_or(EXIT_FAILURE),
            status,
            termination,
            stats,
        }
    }

    /// False only if a callback asked to stop with failure.
    ///
    /// This says nothing about the exit code; check
    /// [`exit_code`](Self::exit_code) for that.
    pub fn success(&self) -> bool {
        !matches!(self.termination, Termination::TerminatedWithFailure { .. })
    }

    /// True if the run succeeded and the child exited with code 0.
    pub fn exited_cleanly(&self) -> bool {
        self.success() && self.status.is_some_and(|s| s.success())
    }
}

/// Output gathered by [`run_and_capture`](crate::run_and_capture).
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Everything the child wrote to stdout.
    pub stdout: Vec<u8>,
    /// Everything the child wrote to stderr.
    pub stderr: Vec<u8>,
    /// How the run ended.
    pub outcome: ProcessOutcome,
}

impl CapturedOutput {
    /// Stdout decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded as UTF-8, replacing invalid sequences.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

//! Handler trait, verdicts and the stdin request.

use crate::buffer::ByteBuffer;
use crate::process::StreamKind;
use crate::{Error, Result};

/// What a callback wants the session to do next.
///
/// Variants are ordered by severity, so the most severe of several answers
/// wins when they are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verdict {
    /// Keep running.
    #[default]
    Continue,
    /// Keep running; the delivered data was not of interest.
    Ignore,
    /// Stop the child process; the run still counts as successful.
    Terminate,
    /// Stop the child process and report the run as failed.
    TerminateWithFailure,
}

impl Verdict {
    /// The more severe of `self` and `other`.
    pub fn escalate(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    /// True for [`Terminate`](Self::Terminate) and
    /// [`TerminateWithFailure`](Self::TerminateWithFailure).
    pub fn is_terminate(self) -> bool {
        self >= Verdict::Terminate
    }

    /// True for [`TerminateWithFailure`](Self::TerminateWithFailure).
    pub fn is_failure(self) -> bool {
        self == Verdict::TerminateWithFailure
    }
}

/// Handler for the I/O of one child process.
///
/// Only callbacks whose stream (or heartbeat) flag is set in the run
/// configuration are invoked. Methods have defaults so implementations
/// can pick what they need.
///
/// # Implementation Notes
///
/// - Callbacks run on the task driving the session; blocking in one stalls
///   all three pipes.
/// - Data slices are only valid for the duration of the call.
pub trait ProcessHandler: Send {
    /// Called when the child's stdin has nothing staged.
    ///
    /// Write bytes into `input` to send them. Leaving it empty sends nothing
    /// this round; the callback is asked again on the next loop iteration.
    /// Call [`StdinRequest::close`] once there is no more input.
    ///
    /// The default closes stdin right away.
    fn on_stdin(&mut self, input: &mut StdinRequest<'_>) -> Verdict {
        input.close();
        Verdict::Continue
    }

    /// Called with each framed unit read from stdout.
    fn on_stdout(&mut self, data: &[u8]) -> Verdict {
        let _ = data;
        Verdict::Continue
    }

    /// Called with each framed unit read from stderr.
    fn on_stderr(&mut self, data: &[u8]) -> Verdict {
        let _ = data;
        Verdict::Continue
    }

    /// Called after a heartbeat interval passed without any activity.
    fn on_heartbeat(&mut self) -> Verdict {
        Verdict::Continue
    }
}

impl<H: ProcessHandler + ?Sized> ProcessHandler for &mut H {
    fn on_stdin(&mut self, input: &mut StdinRequest<'_>) -> Verdict {
        (**self).on_stdin(input)
    }

    fn on_stdout(&mut self, data: &[u8]) -> Verdict {
        (**self).on_stdout(data)
    }

    fn on_stderr(&mut self, data: &[u8]) -> Verdict {
        (**self).on_stderr(data)
    }

    fn on_heartbeat(&mut self) -> Verdict {
        (**self).on_heartbeat()
    }
}

/// Staging area handed to [`ProcessHandler::on_stdin`].
pub struct StdinRequest<'a> {
    buffer: &'a mut ByteBuffer,
    close: bool,
}

impl<'a> StdinRequest<'a> {
    pub(crate) fn new(buffer: &'a mut ByteBuffer) -> Self {
        Self {
            buffer,
            close: false,
        }
    }

    /// Stage bytes for the child's stdin.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buffer
            .extend_from_slice(data)
            .map_err(|e| Error::BufferExhausted {
                stream: StreamKind::Stdin,
                requested: e.requested,
            })
    }

    /// Close the child's stdin after the staged bytes are sent.
    pub fn close(&mut self) {
        self.close = true;
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.close
    }

    /// Number of bytes staged so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

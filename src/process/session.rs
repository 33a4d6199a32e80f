//! The event loop that multiplexes the pipes of one running child.
//!
//! A single task drives everything: each iteration refills stdin from the
//! input callback, then waits on whichever of these happens first (checked
//! in this order):
//!
//! 1. a pipe completes a transfer (all three are polled every time),
//! 2. the child exits,
//! 3. the post-exit drain deadline passes,
//! 4. a heartbeat interval passes without any of the above.
//!
//! Completed reads go through the configured [`Framing`] into the handler.
//! Any terminating verdict ends the loop and stops the child.

use std::future::poll_fn;
use std::process::ExitStatus;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::time::{sleep, sleep_until, Instant};

use super::channel::{ReadChannel, Transfer, WriteChannel};
use super::outcome::{IoStats, Termination};
use super::terminate::terminate_child;
use super::StreamKind;
use crate::config::{Framing, RunConfig};
use crate::handler::{ProcessHandler, StdinRequest, Verdict};
use crate::{Error, Result};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Running,
    Terminating,
    Done,
}

/// Channels that completed something during one poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Progress {
    pub(crate) stdout: Option<Transfer>,
    pub(crate) stderr: Option<Transfer>,
    pub(crate) stdin: Option<Transfer>,
}

impl Progress {
    fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none() && self.stdin.is_none()
    }
}

/// What a finished session hands back to the launcher.
#[derive(Debug)]
pub(crate) struct SessionReport {
    pub(crate) termination: Termination,
    pub(crate) status: Option<ExitStatus>,
    pub(crate) stats: IoStats,
}

/// Poll every open channel once and collect what completed.
///
/// Returns `Pending` only if no channel made progress; wakers are registered
/// for each channel that has a transfer in flight.
pub(crate) fn poll_channels<O, E, I>(
    stdout: &mut ReadChannel<O>,
    stderr: &mut ReadChannel<E>,
    stdin: &mut WriteChannel<I>,
    cx: &mut Context<'_>,
) -> Poll<Result<Progress>>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    I: AsyncWrite + Unpin,
{
    let mut progress = Progress::default();

    if !stdout.is_end_of_stream() {
        match stdout.poll_transfer(cx) {
            Poll::Ready(Ok(t)) => progress.stdout = Some(t),
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => {}
        }
    }
    if !stderr.is_end_of_stream() {
        match stderr.poll_transfer(cx) {
            Poll::Ready(Ok(t)) => progress.stderr = Some(t),
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => {}
        }
    }
    if !stdin.is_end_of_stream() {
        match stdin.poll_transfer(cx) {
            Poll::Ready(Ok(t)) => progress.stdin = Some(t),
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => {}
        }
    }

    if progress.is_empty() {
        Poll::Pending
    } else {
        Poll::Ready(Ok(progress))
    }
}

/// Hand whatever the channel buffered to `deliver`, framed.
fn flush<R, F>(channel: &mut ReadChannel<R>, framing: Framing, deliver: F) -> Verdict
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]) -> Verdict,
{
    let end_of_stream = channel.is_end_of_stream();
    framing.frame(channel.buffer_mut(), end_of_stream, deliver)
}

/// One child process and its three pipes, driven to completion.
pub(crate) struct ProcessSession<'a, H: ?Sized> {
    child: &'a mut Child,
    handler: &'a mut H,
    stdin: WriteChannel<ChildStdin>,
    stdout: ReadChannel<ChildStdout>,
    stderr: ReadChannel<ChildStderr>,
    framing: Framing,
    heartbeat: Option<Duration>,
    exit_timeout: Duration,
    drain_timeout: Duration,
    state: SessionState,
    exit_status: Option<ExitStatus>,
    drain_deadline: Option<Instant>,
    stats: IoStats,
}

impl<'a, H: ProcessHandler + ?Sized> ProcessSession<'a, H> {
    /// Take over the pipes of `child`. Pipes that were not created start at
    /// end of stream.
    pub(crate) fn new(config: &RunConfig, child: &'a mut Child, handler: &'a mut H) -> Self {
        let chunk = config.chunk_size();
        let max = config.max_buffer_size();

        Self {
            stdin: WriteChannel::new(child.stdin.take(), max),
            stdout: ReadChannel::new(StreamKind::Stdout, child.stdout.take(), chunk, max),
            stderr: ReadChannel::new(StreamKind::Stderr, child.stderr.take(), chunk, max),
            child,
            handler,
            framing: config.framing(),
            heartbeat: config.heartbeat_interval(),
            exit_timeout: config.exit_timeout(),
            drain_timeout: config.drain_timeout(),
            state: SessionState::Running,
            exit_status: None,
            drain_deadline: None,
            stats: IoStats::default(),
        }
    }

    /// Run until every channel reached end of stream or a callback asked to
    /// stop. Pipes and buffers are released on every path out.
    pub(crate) async fn run(mut self) -> Result<SessionReport> {
        let verdict = match self.event_loop().await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "session aborted");
                self.set_state(SessionState::Terminating);
                if let Err(stop_err) = self.stop_child().await {
                    tracing::warn!(error = %stop_err, "could not stop child");
                }
                self.cleanup();
                return Err(e);
            }
        };

        let termination = if verdict.is_terminate() {
            self.set_state(SessionState::Terminating);
            tracing::debug!(
                stdout = ?self.stdout.state(),
                stderr = ?self.stderr.state(),
                stdin = ?self.stdin.state(),
                "abandoning channels"
            );
            let stopped = self.stop_child().await;
            self.cleanup();
            let forced = stopped?;
            if verdict.is_failure() {
                Termination::TerminatedWithFailure { forced }
            } else {
                Termination::Terminated { forced }
            }
        } else {
            self.cleanup();
            Termination::Exited
        };

        Ok(SessionReport {
            termination,
            status: self.exit_status,
            stats: self.stats,
        })
    }

    async fn event_loop(&mut self) -> Result<Verdict> {
        let mut verdict = Verdict::Continue;

        while !self.all_end_of_stream() {
            verdict = verdict.escalate(self.pull_stdin());
            if verdict.is_terminate() {
                break;
            }

            let child_running = self.exit_status.is_none();
            let heartbeat = self.heartbeat.filter(|_| child_running);
            let drain_deadline = self.drain_deadline;

            tokio::select! {
                biased;

                progress = poll_fn(|cx| poll_channels(&mut self.stdout, &mut self.stderr, &mut self.stdin, cx)) => {
                    verdict = verdict.escalate(self.deliver(progress?));
                }
                status = self.child.wait(), if child_running => {
                    self.on_child_exit(status?);
                }
                _ = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                    verdict = verdict.escalate(self.finish_drain());
                }
                _ = sleep(heartbeat.unwrap_or_default()), if heartbeat.is_some() => {
                    self.stats.heartbeats += 1;
                    tracing::trace!("heartbeat");
                    verdict = verdict.escalate(self.handler.on_heartbeat());
                }
            }

            if verdict.is_terminate() {
                tracing::debug!(?verdict, "callback requested termination");
                break;
            }
        }

        Ok(verdict)
    }

    fn all_end_of_stream(&self) -> bool {
        self.stdin.is_end_of_stream()
            && self.stdout.is_end_of_stream()
            && self.stderr.is_end_of_stream()
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?state, "session state");
        self.state = state;
    }

    /// Ask the input callback for more data if nothing is staged.
    fn pull_stdin(&mut self) -> Verdict {
        if !self.stdin.wants_input() {
            return Verdict::Continue;
        }

        let mut request = StdinRequest::new(self.stdin.buffer_mut());
        let verdict = self.handler.on_stdin(&mut request);
        let close = request.is_closed();

        let staged = self.stdin.pending_len();
        if staged > 0 {
            tracing::trace!(bytes = staged, "stdin staged");
        }
        if close {
            tracing::trace!("stdin close requested");
            self.stdin.request_close();
        }
        verdict
    }

    fn deliver(&mut self, progress: Progress) -> Verdict {
        let mut verdict = Verdict::Continue;

        if let Some(transfer) = progress.stdout {
            if let Transfer::Data(n) = transfer {
                self.stats.stdout_reads += 1;
                self.stats.stdout_bytes += n as u64;
                tracing::trace!(bytes = self.stdout.transferred(), "stdout read");
            }
            let handler = &mut *self.handler;
            verdict = verdict.escalate(flush(&mut self.stdout, self.framing, |data| {
                handler.on_stdout(data)
            }));
            if verdict.is_terminate() {
                return verdict;
            }
        }

        if let Some(transfer) = progress.stderr {
            if let Transfer::Data(n) = transfer {
                self.stats.stderr_reads += 1;
                self.stats.stderr_bytes += n as u64;
                tracing::trace!(bytes = self.stderr.transferred(), "stderr read");
            }
            let handler = &mut *self.handler;
            verdict = verdict.escalate(flush(&mut self.stderr, self.framing, |data| {
                handler.on_stderr(data)
            }));
        }

        match progress.stdin {
            Some(Transfer::Data(n)) => {
                self.stats.stdin_writes += 1;
                self.stats.stdin_bytes += n as u64;
                tracing::trace!(bytes = self.stdin.transferred(), "stdin written");
            }
            Some(Transfer::EndOfStream) => tracing::trace!("stdin closed"),
            None => {}
        }

        verdict
    }

    fn on_child_exit(&mut self, status: ExitStatus) {
        tracing::debug!(%status, "child exited");
        self.exit_status = Some(status);
        if self.stdin.needs_wait() {
            tracing::debug!(unsent = self.stdin.pending_len(), "child exited before reading stdin");
        }
        self.stdin.mark_end_of_stream();

        if !(self.stdout.is_end_of_stream() && self.stderr.is_end_of_stream()) {
            self.drain_deadline = Some(Instant::now() + self.drain_timeout);
        }
    }

    /// The child is gone and its output pipes are still open: stop reading
    /// and flush what was buffered.
    fn finish_drain(&mut self) -> Verdict {
        tracing::debug!(
            stdout_pending = self.stdout.needs_wait(),
            stderr_pending = self.stderr.needs_wait(),
            "drain deadline passed, closing output pipes"
        );
        self.drain_deadline = None;

        let mut verdict = Verdict::Continue;
        if !self.stdout.is_end_of_stream() {
            self.stdout.mark_end_of_stream();
            let handler = &mut *self.handler;
            verdict = verdict.escalate(flush(&mut self.stdout, self.framing, |data| {
                handler.on_stdout(data)
            }));
        }
        if !self.stderr.is_end_of_stream() && !verdict.is_terminate() {
            self.stderr.mark_end_of_stream();
            let handler = &mut *self.handler;
            verdict = verdict.escalate(flush(&mut self.stderr, self.framing, |data| {
                handler.on_stderr(data)
            }));
        }
        verdict
    }

    /// Controlled termination. Returns whether the child had to be killed.
    async fn stop_child(&mut self) -> Result<bool> {
        if self.exit_status.is_some() {
            return Ok(false);
        }
        let (status, forced) = terminate_child(self.child, self.exit_timeout)
            .await
            .map_err(Error::Io)?;
        tracing::debug!(%status, forced, "child stopped");
        self.exit_status = Some(status);
        Ok(forced)
    }

    fn cleanup(&mut self) {
        self.stdin.close();
        self.stdout.close();
        self.stderr.close();
        self.drain_deadline = None;
        self.set_state(SessionState::Done);
    }
}

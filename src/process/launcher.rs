//! Spawning children and running them through a session.

use std::process::Stdio;

use tokio::process::{Child, Command};

use super::outcome::{CapturedOutput, ProcessOutcome};
use super::session::ProcessSession;
use crate::config::{Framing, RunConfig, RunFlags};
use crate::handler::{CaptureHandler, ProcessHandler};
use crate::{Error, Result};

/// Runs child processes described by a [`RunConfig`].
///
/// A launcher holds no per-run state, so one instance can run the same
/// command any number of times, sequentially or concurrently.
///
/// # Example
///
/// ```no_run
/// use libcunilog::{CaptureHandler, Framing, ProcessLauncher, RunConfig};
///
/// # async fn example() -> libcunilog::Result<()> {
/// let config = RunConfig::builder()
///     .executable("/bin/ls")
///     .arg("-l")
///     .framing(Framing::OneLine)
///     .build()?;
///
/// let mut lines = CaptureHandler::new();
/// let outcome = ProcessLauncher::new(config).run(&mut lines).await?;
/// println!("{} lines, exit code {}", lines.stdout_units().len(), outcome.exit_code);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: RunConfig,
}

impl ProcessLauncher {
    /// Create a launcher for `config`.
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// The configuration this launcher runs.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Spawn the child and drive it until it is done.
    ///
    /// Returns once every pipe has reached end of stream and the child has
    /// been reaped, or after a callback asked to stop and the child was
    /// terminated. Spawn failures, pipe errors and buffer exhaustion are
    /// returned as errors; in the latter two cases the child is terminated
    /// first.
    pub async fn run<H>(&self, handler: &mut H) -> Result<ProcessOutcome>
    where
        H: ProcessHandler + ?Sized,
    {
        let mut child = self.spawn()?;
        tracing::debug!(
            pid = child.id(),
            executable = %self.config.executable().display(),
            "child spawned"
        );

        let report = ProcessSession::new(&self.config, &mut child, handler)
            .run()
            .await?;

        let status = match report.status {
            Some(status) => status,
            None => child.wait().await.map_err(Error::io)?,
        };

        let outcome = ProcessOutcome::new(Some(status), report.termination, report.stats);
        tracing::debug!(
            exit_code = outcome.exit_code,
            termination = ?outcome.termination,
            "child finished"
        );
        Ok(outcome)
    }

    fn spawn(&self) -> Result<Child> {
        build_command(&self.config).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ExecutableNotFound {
                    path: self.config.executable().display().to_string(),
                }
            } else {
                Error::ProcessSpawn(e)
            }
        })
    }
}

/// Run `config` once, delivering output to `handler`.
///
/// Shorthand for `ProcessLauncher::new(config.clone()).run(handler)`.
pub async fn run_process<H>(config: &RunConfig, handler: &mut H) -> Result<ProcessOutcome>
where
    H: ProcessHandler + ?Sized,
{
    ProcessLauncher::new(config.clone()).run(handler).await
}

/// Run `config` once and collect all output in memory.
///
/// Framing is forced to [`Framing::AsIs`] so the captured bytes are exactly
/// what the child wrote. Both output streams are captured. If `stdin` is
/// given it is written to the child and the pipe closed afterwards.
pub async fn run_and_capture(config: &RunConfig, stdin: Option<&[u8]>) -> Result<CapturedOutput> {
    let mut config = config.clone();
    config.framing = Framing::AsIs;
    config.flags |= RunFlags::output_streams();

    let mut handler = match stdin {
        Some(input) => {
            config.flags.insert(RunFlags::STDIN);
            CaptureHandler::with_stdin(input)
        }
        None => {
            config.flags.remove(RunFlags::STDIN);
            CaptureHandler::new()
        }
    };

    let outcome = ProcessLauncher::new(config).run(&mut handler).await?;
    Ok(CapturedOutput {
        stdout: handler.stdout_bytes(),
        stderr: handler.stderr_bytes(),
        outcome,
    })
}

/// Build a tokio Command from the config.
fn build_command(config: &RunConfig) -> Command {
    let mut cmd = Command::new(config.executable());
    cmd.args(child_args(config));

    #[cfg(unix)]
    {
        if config.flags().contains(RunFlags::ARG0_IN_COMMAND_LINE) {
            if let Some(arg0) = config.args().first() {
                cmd.arg0(arg0);
            }
        }
    }

    if let Some(dir) = config.working_directory() {
        cmd.current_dir(dir);
    }

    if !config.inherit_env {
        cmd.env_clear();
    }
    cmd.envs(&config.env_vars);

    let flags = config.flags();
    cmd.stdin(stdio_for(flags.contains(RunFlags::STDIN)));
    cmd.stdout(stdio_for(flags.contains(RunFlags::STDOUT)));
    cmd.stderr(stdio_for(flags.contains(RunFlags::STDERR)));
    cmd.kill_on_drop(true);

    cmd
}

/// Arguments after argv\[0\].
fn child_args(config: &RunConfig) -> &[String] {
    let args = config.args();
    if config.flags().contains(RunFlags::ARG0_IN_COMMAND_LINE) {
        args.get(1..).unwrap_or_default()
    } else {
        args
    }
}

fn stdio_for(piped: bool) -> Stdio {
    if piped {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

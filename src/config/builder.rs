//! Run configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use libcunilog::config::{Framing, RunConfig, RunFlags};
//!
//! let config = RunConfig::builder()
//!     .executable("/bin/sh")
//!     .command_line(r#"-c "ls -l""#)
//!     .framing(Framing::OneLine)
//!     .flags(RunFlags::output_streams())
//!     .heartbeat(Duration::from_secs(1))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::cmdline::split_command_line;
use super::options::{Framing, RunFlags};
use crate::{Error, Result};

/// Default size of a single pipe read.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE: usize = 16;

/// Default grace period between asking the child to stop and killing it.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time output pipes are still drained after the child has exited.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Configuration for one child-process run.
///
/// Use [`RunConfig::builder()`] to create a new configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub(crate) executable: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) working_directory: Option<PathBuf>,
    pub(crate) env_vars: HashMap<String, String>,
    pub(crate) inherit_env: bool,

    pub(crate) framing: Framing,
    pub(crate) flags: RunFlags,
    pub(crate) heartbeat_interval: Option<Duration>,
    pub(crate) exit_timeout: Duration,
    pub(crate) drain_timeout: Duration,

    pub(crate) chunk_size: usize,
    pub(crate) max_buffer_size: Option<usize>,
}

impl RunConfig {
    /// Create a new builder for RunConfig.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// The executable to run.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments, including argv[0] when [`RunFlags::ARG0_IN_COMMAND_LINE`] is set.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory if set.
    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    /// The framing applied to stdout and stderr.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// The option bits.
    pub fn flags(&self) -> RunFlags {
        self.flags
    }

    /// Heartbeat interval, if heartbeats are enabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
            .filter(|_| self.flags.contains(RunFlags::HEARTBEAT))
    }

    /// Grace period of a controlled termination.
    pub fn exit_timeout(&self) -> Duration {
        self.exit_timeout
    }

    /// Time output pipes are drained after the child exits.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Size of a single pipe read.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Upper bound for channel buffers, if any.
    pub fn max_buffer_size(&self) -> Option<usize> {
        self.max_buffer_size
    }
}

/// Builder for [`RunConfig`].
///
/// This builder validates the configuration when [`build()`](RunConfigBuilder::build) is called.
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    executable: Option<PathBuf>,
    command_line: Option<String>,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    inherit_env: bool,

    framing: Framing,
    flags: RunFlags,
    heartbeat_interval: Option<Duration>,
    exit_timeout: Duration,
    drain_timeout: Duration,

    chunk_size: usize,
    max_buffer_size: Option<usize>,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self {
            executable: None,
            command_line: None,
            args: Vec::new(),
            working_directory: None,
            env_vars: HashMap::new(),
            inherit_env: true,
            framing: Framing::default(),
            flags: RunFlags::output_streams(),
            heartbeat_interval: None,
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_buffer_size: None,
        }
    }
}

impl RunConfigBuilder {
    // -------------------------------------------------------------------------
    // Command
    // -------------------------------------------------------------------------

    /// Path of the executable to run (required).
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Full argument string, split with shell quoting rules at build time.
    ///
    /// Arguments added with [`arg`](Self::arg) come after these.
    pub fn command_line(mut self, line: impl Into<String>) -> Self {
        self.command_line = Some(line.into());
        self
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Working directory for the child process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    /// Add/override environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Don't inherit parent environment (default: inherit).
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    // -------------------------------------------------------------------------
    // Session behavior
    // -------------------------------------------------------------------------

    /// Framing for stdout and stderr (default: [`Framing::AsIs`]).
    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Replace the option bits (default: stdout and stderr).
    pub fn flags(mut self, flags: RunFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Enable heartbeats with the given idle interval.
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self.flags.insert(RunFlags::HEARTBEAT);
        self
    }

    /// Grace period between asking the child to stop and killing it.
    pub fn exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// How long output is still read after the child has exited.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    // -------------------------------------------------------------------------
    // Buffers
    // -------------------------------------------------------------------------

    /// Size of a single pipe read (default: 4096).
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Refuse to grow any channel buffer past `size` bytes.
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = Some(size);
        self
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build the configuration.
    ///
    /// This validates:
    /// - An executable is set
    /// - The command line is well formed
    /// - Heartbeat flag and interval agree
    /// - Buffer sizes are sensible
    ///
    /// Note: executable existence is checked at spawn time.
    pub fn build(self) -> Result<RunConfig> {
        let executable = match self.executable {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err(Error::MissingExecutable),
        };

        let mut args = match self.command_line {
            Some(ref line) => split_command_line(line)?,
            None => Vec::new(),
        };
        args.extend(self.args);

        if self.flags.contains(RunFlags::ARG0_IN_COMMAND_LINE) && args.is_empty() {
            return Err(Error::InvalidConfig(
                "ARG0_IN_COMMAND_LINE requires a non-empty command line".into(),
            ));
        }

        if self.flags.contains(RunFlags::HEARTBEAT) {
            match self.heartbeat_interval {
                None => {
                    return Err(Error::InvalidConfig(
                        "HEARTBEAT flag set without a heartbeat interval".into(),
                    ))
                }
                Some(interval) if interval.is_zero() => {
                    return Err(Error::InvalidConfig(
                        "heartbeat interval must be positive".into(),
                    ))
                }
                Some(_) => {}
            }
        }

        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "chunk_size must be at least {MIN_CHUNK_SIZE}"
            )));
        }

        if let Some(max) = self.max_buffer_size {
            if max < self.chunk_size {
                return Err(Error::InvalidConfig(
                    "max_buffer_size must not be smaller than chunk_size".into(),
                ));
            }
        }

        if let Some(ref dir) = self.working_directory {
            if !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(RunConfig {
            executable,
            args,
            working_directory: self.working_directory,
            env_vars: self.env_vars,
            inherit_env: self.inherit_env,
            framing: self.framing,
            flags: self.flags,
            heartbeat_interval: self.heartbeat_interval,
            exit_timeout: self.exit_timeout,
            drain_timeout: self.drain_timeout,
            chunk_size: self.chunk_size,
            max_buffer_size: self.max_buffer_size,
        })
    }
}

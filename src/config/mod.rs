//! Configuration for running a child process.
//!
//! This module provides:
//!
//! - [`RunConfig`] and [`RunConfigBuilder`] for describing a run
//! - [`Framing`] for choosing how output reaches the callbacks
//! - [`RunFlags`] for selecting active streams and heartbeats
//! - [`split_command_line`] for turning a flat command line into arguments
//!
//! # Example
//!
//! ```ignore
//! use libcunilog::config::{Framing, RunConfig, RunFlags};
//!
//! let config = RunConfig::builder()
//!     .executable("/usr/bin/git")
//!     .command_line("log --oneline -n 5")
//!     .framing(Framing::OneLine)
//!     .flags(RunFlags::STDOUT)
//!     .build()?;
//! ```

pub mod builder;
pub mod cmdline;
pub mod options;

pub use builder::{
    RunConfig, RunConfigBuilder, DEFAULT_CHUNK_SIZE, DEFAULT_DRAIN_TIMEOUT, DEFAULT_EXIT_TIMEOUT,
    MIN_CHUNK_SIZE,
};
pub use cmdline::split_command_line;
pub use options::{Framing, RunFlags};

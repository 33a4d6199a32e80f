//! Test utilities for libcunilog integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use libcunilog::{ProcessHandler, RunConfig, RunConfigBuilder, StdinRequest, Verdict};

/// Install a tracing subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder for `/bin/sh -c <script>`.
pub fn sh(script: &str) -> RunConfigBuilder {
    RunConfig::builder()
        .executable("/bin/sh")
        .arg("-c")
        .arg(script)
}

/// A handler that records every callback and can be scripted to stop.
#[derive(Debug, Default)]
pub struct Recorder {
    pub stdout: Vec<Vec<u8>>,
    pub stderr: Vec<Vec<u8>>,
    pub heartbeats: usize,
    pub stdin_calls: usize,

    input: VecDeque<Vec<u8>>,
    keep_stdin_open: bool,
    stdin_verdict: Verdict,
    stderr_verdict: Verdict,
    heartbeat_verdict: Verdict,
    stop_after_stdout: Option<(usize, Verdict)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed these chunks to stdin, one per request, then close it.
    pub fn with_input<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        self.input = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Never close stdin; once the input runs out, requests stay empty.
    pub fn keep_stdin_open(mut self) -> Self {
        self.keep_stdin_open = true;
        self
    }

    /// Verdict returned from every stdin request.
    pub fn stdin_verdict(mut self, verdict: Verdict) -> Self {
        self.stdin_verdict = verdict;
        self
    }

    /// Verdict returned for every stderr unit.
    pub fn stderr_verdict(mut self, verdict: Verdict) -> Self {
        self.stderr_verdict = verdict;
        self
    }

    /// Verdict returned from every heartbeat.
    pub fn heartbeat_verdict(mut self, verdict: Verdict) -> Self {
        self.heartbeat_verdict = verdict;
        self
    }

    /// Return `verdict` once `count` stdout units were seen.
    pub fn stop_after_stdout(mut self, count: usize, verdict: Verdict) -> Self {
        self.stop_after_stdout = Some((count, verdict));
        self
    }

    pub fn stdout_strings(&self) -> Vec<String> {
        strings(&self.stdout)
    }

    pub fn stderr_strings(&self) -> Vec<String> {
        strings(&self.stderr)
    }

    pub fn stdout_concat(&self) -> String {
        self.stdout_strings().concat()
    }
}

fn strings(units: &[Vec<u8>]) -> Vec<String> {
    units
        .iter()
        .map(|u| String::from_utf8_lossy(u).into_owned())
        .collect()
}

impl ProcessHandler for Recorder {
    fn on_stdin(&mut self, input: &mut StdinRequest<'_>) -> Verdict {
        self.stdin_calls += 1;
        if let Some(chunk) = self.input.pop_front() {
            if input.write(&chunk).is_err() {
                return Verdict::TerminateWithFailure;
            }
        }
        if self.input.is_empty() && !self.keep_stdin_open {
            input.close();
        }
        self.stdin_verdict
    }

    fn on_stdout(&mut self, data: &[u8]) -> Verdict {
        self.stdout.push(data.to_vec());
        match self.stop_after_stdout {
            Some((count, verdict)) if self.stdout.len() >= count => verdict,
            _ => Verdict::Continue,
        }
    }

    fn on_stderr(&mut self, data: &[u8]) -> Verdict {
        self.stderr.push(data.to_vec());
        self.stderr_verdict
    }

    fn on_heartbeat(&mut self) -> Verdict {
        self.heartbeats += 1;
        self.heartbeat_verdict
    }
}

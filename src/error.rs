use crate::process::StreamKind;

/// Errors that can occur when running a child process.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the child process
/// - IO errors: unexpected failures on the child's pipes
/// - Resource errors: a channel buffer could not grow
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// No executable path was given.
    #[error("no executable configured")]
    MissingExecutable,

    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// The executable could not be found.
    #[error("executable not found: {path}")]
    ExecutableNotFound { path: String },

    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// IO error communicating with the child process.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Resource errors
    // -------------------------------------------------------------------------
    /// A channel buffer could not grow to the requested size.
    #[error("{stream} buffer exhausted: could not grow to {requested} bytes")]
    BufferExhausted { stream: StreamKind, requested: usize },
}

/// A specialized Result type for libcunilog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Check if this error means a resource (memory, pipes, processes) ran out.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::BufferExhausted { .. } | Error::ProcessSpawn(_))
    }

    /// Check if this error is retryable.
    ///
    /// Buffer exhaustion is not: the same child output hits the same limit.
    ///
    /// The launcher never retries by itself; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ProcessSpawn(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

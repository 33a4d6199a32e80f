//! Splitting a flat command-line string into arguments.

use crate::{Error, Result};

/// Split a command line into its arguments using POSIX shell word rules.
///
/// Whitespace separates arguments. Single quotes keep everything literally,
/// double quotes group words and honour backslash escapes, and a backslash
/// outside quotes escapes the next character. No expansion of any kind is
/// performed. Windows paths therefore need single quotes (`'C:\dir'`).
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    shell_words::split(line)
        .map_err(|e| Error::InvalidConfig(format!("cannot parse command line `{line}`: {e}")))
}

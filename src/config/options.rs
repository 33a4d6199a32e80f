//! Type-safe options for running a child process.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// How bytes read from stdout/stderr are sliced before reaching a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Deliver every completed read verbatim.
    #[default]
    AsIs,
    /// Deliver one callback per line, without the line ending.
    OneLine,
    /// Deliver the whole stream once, at end of stream.
    All,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::AsIs => write!(f, "as_is"),
            Framing::OneLine => write!(f, "one_line"),
            Framing::All => write!(f, "all"),
        }
    }
}

/// Option bits for a run.
///
/// The stream bits select which callbacks of the handler are active. Streams
/// without their bit set are connected to the null device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RunFlags(u32);

impl RunFlags {
    /// Feed the child's stdin from the input callback.
    pub const STDIN: RunFlags = RunFlags(1 << 0);
    /// Deliver the child's stdout to the stdout callback.
    pub const STDOUT: RunFlags = RunFlags(1 << 1);
    /// Deliver the child's stderr to the stderr callback.
    pub const STDERR: RunFlags = RunFlags(1 << 2);
    /// Invoke the heartbeat callback after each idle interval.
    pub const HEARTBEAT: RunFlags = RunFlags(1 << 3);
    /// The command line's first token is argv[0]; the executable name is not
    /// inserted in front of it.
    pub const ARG0_IN_COMMAND_LINE: RunFlags = RunFlags(1 << 4);

    /// No flags.
    pub const fn empty() -> Self {
        RunFlags(0)
    }

    /// stdin, stdout and stderr.
    pub const fn all_streams() -> Self {
        RunFlags(Self::STDIN.0 | Self::STDOUT.0 | Self::STDERR.0)
    }

    /// stdout and stderr.
    pub const fn output_streams() -> Self {
        RunFlags(Self::STDOUT.0 | Self::STDERR.0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: RunFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: RunFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: RunFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for RunFlags {
    type Output = RunFlags;

    fn bitor(self, rhs: RunFlags) -> RunFlags {
        RunFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for RunFlags {
    fn bitor_assign(&mut self, rhs: RunFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_display() {
        assert_eq!(Framing::AsIs.to_string(), "as_is");
        assert_eq!(Framing::OneLine.to_string(), "one_line");
        assert_eq!(Framing::All.to_string(), "all");
    }

    #[test]
    fn framing_default_is_as_is() {
        assert_eq!(Framing::default(), Framing::AsIs);
    }

    #[test]
    fn framing_serde_names() {
        let json = serde_json::to_string(&Framing::OneLine).unwrap();
        assert_eq!(json, "\"one_line\"");
        let parsed: Framing = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(parsed, Framing::All);
    }

    #[test]
    fn flags_combine() {
        let mut flags = RunFlags::STDOUT | RunFlags::STDERR;
        assert_eq!(flags, RunFlags::output_streams());
        assert!(flags.contains(RunFlags::STDOUT));
        assert!(!flags.contains(RunFlags::STDIN));

        flags |= RunFlags::HEARTBEAT;
        assert!(flags.contains(RunFlags::HEARTBEAT | RunFlags::STDERR));

        flags.remove(RunFlags::STDERR);
        assert!(!flags.contains(RunFlags::STDERR));
        assert!(RunFlags::empty().contains(RunFlags::empty()));
    }

    #[test]
    fn flags_serialize_as_bits() {
        let flags = RunFlags::all_streams();
        assert_eq!(serde_json::to_string(&flags).unwrap(), "7");
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Framing>();
        assert_send_sync::<RunFlags>();
    }
}

//! Slicing raw pipe data into the units handed to callbacks.

use crate::buffer::ByteBuffer;
use crate::config::Framing;
use crate::handler::Verdict;

/// A line ending recognized by [`Framing::OneLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// A lone `\r`.
    Cr,
}

impl LineEnding {
    /// Length of the ending in bytes.
    pub fn len(self) -> usize {
        match self {
            LineEnding::CrLf => 2,
            LineEnding::Lf | LineEnding::Cr => 1,
        }
    }
}

/// Find the first line ending in `data` at or after `from`.
///
/// A `\r` that is the last byte is only reported when `at_end` is set, since
/// the `\n` of a `\r\n` may still be on its way.
pub fn find_line_ending(data: &[u8], from: usize, at_end: bool) -> Option<(usize, LineEnding)> {
    let offset = data
        .get(from..)?
        .iter()
        .position(|&b| b == b'\n' || b == b'\r')?;
    let pos = from + offset;

    if data[pos] == b'\n' {
        return Some((pos, LineEnding::Lf));
    }
    match data.get(pos + 1) {
        Some(b'\n') => Some((pos, LineEnding::CrLf)),
        Some(_) => Some((pos, LineEnding::Cr)),
        None if at_end => Some((pos, LineEnding::Cr)),
        None => None,
    }
}

impl Framing {
    /// Deliver whatever units `buffer` holds under this framing.
    ///
    /// Delivered bytes are removed from the buffer; an unfinished line stays
    /// at its start. Delivery stops at the first terminating verdict, and the
    /// most severe verdict seen is returned.
    pub(crate) fn frame<F>(self, buffer: &mut ByteBuffer, end_of_stream: bool, mut deliver: F) -> Verdict
    where
        F: FnMut(&[u8]) -> Verdict,
    {
        match self {
            Framing::AsIs => {
                let verdict = if buffer.is_empty() {
                    Verdict::Continue
                } else {
                    deliver(buffer.as_slice())
                };
                buffer.clear();
                verdict
            }
            Framing::OneLine => {
                let mut verdict = Verdict::Continue;
                let data = buffer.as_slice();
                let mut start = 0;

                while let Some((pos, ending)) = find_line_ending(data, start, end_of_stream) {
                    verdict = verdict.escalate(deliver(&data[start..pos]));
                    start = pos + ending.len();
                    if verdict.is_terminate() {
                        break;
                    }
                }
                if end_of_stream && start < data.len() && !verdict.is_terminate() {
                    verdict = verdict.escalate(deliver(&data[start..]));
                    start = data.len();
                }

                buffer.consume(start);
                verdict
            }
            Framing::All => {
                if !end_of_stream || buffer.is_empty() {
                    return Verdict::Continue;
                }
                let verdict = deliver(buffer.as_slice());
                buffer.clear();
                verdict
            }
        }
    }
}

//! One direction of communication with the child: a pipe plus the state of
//! the transfer in flight on it.
//!
//! A channel is a small state machine. `Idle` channels prepare their buffer
//! and issue a transfer; if the pipe is not ready the channel becomes
//! `Pending` (`needs_wait`) and later polls only check for completion.
//! A channel never has more than one transfer outstanding.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::StreamKind;
use crate::buffer::{ByteBuffer, CapacityError};
use crate::{Error, Result};

/// Grow a read buffer once its free space shrinks to this many bytes.
pub(crate) const GROWTH_SLACK: usize = 2;

/// Transfer state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelState {
    /// Nothing in flight.
    Idle,
    /// A transfer was issued and waits for the pipe.
    Pending,
    /// No more data will move on this channel.
    EndOfStream,
}

/// Result of a completed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    /// This many bytes were moved.
    Data(usize),
    /// The pipe reported end of stream.
    EndOfStream,
}

fn exhausted(stream: StreamKind, err: CapacityError) -> Error {
    Error::BufferExhausted {
        stream,
        requested: err.requested,
    }
}

/// Receiving side of stdout or stderr.
#[derive(Debug)]
pub(crate) struct ReadChannel<R> {
    kind: StreamKind,
    pipe: Option<R>,
    buffer: ByteBuffer,
    chunk_size: usize,
    max_buffer: Option<usize>,
    state: ChannelState,
    transferred: usize,
}

impl<R: AsyncRead + Unpin> ReadChannel<R> {
    /// A channel without a pipe starts at end of stream.
    pub(crate) fn new(
        kind: StreamKind,
        pipe: Option<R>,
        chunk_size: usize,
        max_buffer: Option<usize>,
    ) -> Self {
        let state = if pipe.is_some() {
            ChannelState::Idle
        } else {
            ChannelState::EndOfStream
        };
        let buffer = match max_buffer {
            Some(limit) => ByteBuffer::with_limit(limit),
            None => ByteBuffer::new(),
        };
        Self {
            kind,
            pipe,
            buffer,
            chunk_size,
            max_buffer,
            state,
            transferred: 0,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    pub(crate) fn needs_wait(&self) -> bool {
        self.state == ChannelState::Pending
    }

    pub(crate) fn is_end_of_stream(&self) -> bool {
        self.state == ChannelState::EndOfStream
    }

    /// Bytes moved by the last completed read.
    pub(crate) fn transferred(&self) -> usize {
        self.transferred
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut ByteBuffer {
        &mut self.buffer
    }

    /// Stop reading. Buffered bytes stay for a final flush.
    pub(crate) fn mark_end_of_stream(&mut self) {
        self.state = ChannelState::EndOfStream;
        self.pipe = None;
    }

    /// Release the pipe and the buffer.
    pub(crate) fn close(&mut self) {
        self.mark_end_of_stream();
        self.buffer.release();
    }

    /// Make room for the next read so the channel always makes progress.
    fn prepare(&mut self) -> Result<()> {
        if !self.buffer.is_usable() {
            return self
                .buffer
                .ensure_capacity(self.chunk_size)
                .map_err(|e| exhausted(self.kind, e));
        }
        if self.buffer.spare_capacity() > GROWTH_SLACK {
            return Ok(());
        }

        let capacity = self.buffer.capacity();
        let mut target = (capacity * 2).max(capacity + self.chunk_size);
        if let Some(limit) = self.max_buffer {
            if capacity < limit {
                target = target.min(limit);
            }
        }
        tracing::trace!(stream = %self.kind, from = capacity, to = target, "growing buffer");
        self.buffer
            .ensure_capacity(target)
            .map_err(|e| exhausted(self.kind, e))
    }

    /// Issue a read, or check on the one in flight.
    pub(crate) fn poll_transfer(&mut self, cx: &mut Context<'_>) -> Poll<Result<Transfer>> {
        match self.state {
            ChannelState::EndOfStream => return Poll::Ready(Ok(Transfer::EndOfStream)),
            ChannelState::Idle => {
                if let Err(e) = self.prepare() {
                    self.mark_end_of_stream();
                    return Poll::Ready(Err(e));
                }
            }
            ChannelState::Pending => {}
        }

        let Some(pipe) = self.pipe.as_mut() else {
            self.mark_end_of_stream();
            return Poll::Ready(Ok(Transfer::EndOfStream));
        };

        let mut read_buf = ReadBuf::new(self.buffer.spare_mut());
        match Pin::new(pipe).poll_read(cx, &mut read_buf) {
            Poll::Pending => {
                self.state = ChannelState::Pending;
                Poll::Pending
            }
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    self.mark_end_of_stream();
                    return Poll::Ready(Ok(Transfer::EndOfStream));
                }
                self.buffer.commit(n);
                self.transferred = n;
                self.state = ChannelState::Idle;
                Poll::Ready(Ok(Transfer::Data(n)))
            }
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.mark_end_of_stream();
                Poll::Ready(Ok(Transfer::EndOfStream))
            }
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {
                self.state = ChannelState::Idle;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Poll::Ready(Err(e)) => {
                self.mark_end_of_stream();
                Poll::Ready(Err(Error::Io(e)))
            }
        }
    }
}

/// Sending side of stdin.
#[derive(Debug)]
pub(crate) struct WriteChannel<W> {
    pipe: Option<W>,
    buffer: ByteBuffer,
    cursor: usize,
    close_requested: bool,
    state: ChannelState,
    transferred: usize,
}

impl<W: AsyncWrite + Unpin> WriteChannel<W> {
    /// A channel without a pipe starts at end of stream.
    pub(crate) fn new(pipe: Option<W>, max_buffer: Option<usize>) -> Self {
        let state = if pipe.is_some() {
            ChannelState::Idle
        } else {
            ChannelState::EndOfStream
        };
        let buffer = match max_buffer {
            Some(limit) => ByteBuffer::with_limit(limit),
            None => ByteBuffer::new(),
        };
        Self {
            pipe,
            buffer,
            cursor: 0,
            close_requested: false,
            state,
            transferred: 0,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    pub(crate) fn needs_wait(&self) -> bool {
        self.state == ChannelState::Pending
    }

    pub(crate) fn is_end_of_stream(&self) -> bool {
        self.state == ChannelState::EndOfStream
    }

    /// Bytes moved by the last completed write.
    pub(crate) fn transferred(&self) -> usize {
        self.transferred
    }

    /// True when the input callback may stage more data: the send buffer is
    /// empty and stdin was neither closed nor asked to close.
    pub(crate) fn wants_input(&self) -> bool {
        !self.is_end_of_stream() && !self.close_requested && self.buffer.is_empty()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut ByteBuffer {
        &mut self.buffer
    }

    /// Bytes staged but not yet written.
    pub(crate) fn pending_len(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Close the pipe once everything staged is written.
    pub(crate) fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Stop writing and drop the pipe, discarding unsent bytes.
    pub(crate) fn mark_end_of_stream(&mut self) {
        self.state = ChannelState::EndOfStream;
        self.pipe = None;
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Release the pipe and the buffer.
    pub(crate) fn close(&mut self) {
        self.mark_end_of_stream();
        self.buffer.release();
    }

    /// Issue a write of the staged bytes, or check on the one in flight.
    ///
    /// An idle channel with nothing staged stays pending without registering
    /// for wakeups; new input is only staged between loop iterations.
    pub(crate) fn poll_transfer(&mut self, cx: &mut Context<'_>) -> Poll<Result<Transfer>> {
        if self.state == ChannelState::EndOfStream {
            return Poll::Ready(Ok(Transfer::EndOfStream));
        }
        let Some(pipe) = self.pipe.as_mut() else {
            self.mark_end_of_stream();
            return Poll::Ready(Ok(Transfer::EndOfStream));
        };

        if self.cursor < self.buffer.len() {
            let pending = &self.buffer.as_slice()[self.cursor..];
            return match Pin::new(pipe).poll_write(cx, pending) {
                Poll::Pending => {
                    self.state = ChannelState::Pending;
                    Poll::Pending
                }
                Poll::Ready(Ok(0)) => {
                    self.mark_end_of_stream();
                    Poll::Ready(Ok(Transfer::EndOfStream))
                }
                Poll::Ready(Ok(n)) => {
                    self.cursor += n;
                    if self.cursor == self.buffer.len() {
                        self.buffer.clear();
                        self.cursor = 0;
                    }
                    self.transferred = n;
                    self.state = ChannelState::Idle;
                    Poll::Ready(Ok(Transfer::Data(n)))
                }
                Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    self.mark_end_of_stream();
                    Poll::Ready(Ok(Transfer::EndOfStream))
                }
                Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {
                    self.state = ChannelState::Idle;
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Poll::Ready(Err(e)) => {
                    self.mark_end_of_stream();
                    Poll::Ready(Err(Error::Io(e)))
                }
            };
        }

        if !self.close_requested {
            self.state = ChannelState::Idle;
            return Poll::Pending;
        }

        match Pin::new(pipe).poll_shutdown(cx) {
            Poll::Pending => {
                self.state = ChannelState::Pending;
                Poll::Pending
            }
            Poll::Ready(Ok(())) => {
                self.mark_end_of_stream();
                Poll::Ready(Ok(Transfer::EndOfStream))
            }
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                self.mark_end_of_stream();
                Poll::Ready(Ok(Transfer::EndOfStream))
            }
            Poll::Ready(Err(e)) => {
                self.mark_end_of_stream();
                Poll::Ready(Err(Error::Io(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::poll_fn;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn reader(pipe: DuplexStream, chunk: usize, max: Option<usize>) -> ReadChannel<DuplexStream> {
        ReadChannel::new(StreamKind::Stdout, Some(pipe), chunk, max)
    }

    /// Poll once, without waiting.
    async fn poll_once<T>(mut f: impl FnMut(&mut Context<'_>) -> Poll<T>) -> Poll<T> {
        poll_fn(|cx| Poll::Ready(f(cx))).await
    }

    #[tokio::test]
    async fn read_without_pipe_is_end_of_stream() {
        let mut channel: ReadChannel<DuplexStream> =
            ReadChannel::new(StreamKind::Stderr, None, 16, None);
        assert!(channel.is_end_of_stream());
        let result = poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(result, Transfer::EndOfStream);
    }

    #[tokio::test]
    async fn pending_read_completes_when_data_arrives() {
        let (mut child_side, our_side) = tokio::io::duplex(64);
        let mut channel = reader(our_side, 16, None);

        let first = poll_once(|cx| channel.poll_transfer(cx)).await;
        assert!(first.is_pending());
        assert!(channel.needs_wait());

        child_side.write_all(b"abc").await.unwrap();
        let result = poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(result, Transfer::Data(3));
        assert!(!channel.needs_wait());
        assert_eq!(channel.transferred(), 3);
        assert_eq!(channel.buffer_mut().as_slice(), b"abc");
    }

    #[tokio::test]
    async fn pending_read_does_not_touch_buffer() {
        let (_child_side, our_side) = tokio::io::duplex(64);
        let mut channel = reader(our_side, 16, None);

        assert!(poll_once(|cx| channel.poll_transfer(cx)).await.is_pending());
        let capacity = channel.buffer_mut().capacity();
        assert!(poll_once(|cx| channel.poll_transfer(cx)).await.is_pending());
        assert_eq!(channel.buffer_mut().capacity(), capacity);
        assert_eq!(channel.state(), ChannelState::Pending);
    }

    #[tokio::test]
    async fn closed_writer_gives_end_of_stream() {
        let (child_side, our_side) = tokio::io::duplex(64);
        let mut channel = reader(our_side, 16, None);
        drop(child_side);

        let result = poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(result, Transfer::EndOfStream);
        assert!(channel.is_end_of_stream());
    }

    #[tokio::test]
    async fn buffer_grows_when_nearly_full() {
        let (mut child_side, our_side) = tokio::io::duplex(256);
        let mut channel = reader(our_side, 16, None);

        child_side.write_all(&[b'x'; 40]).await.unwrap();
        poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(channel.buffer_mut().len(), 16);

        poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(channel.buffer_mut().capacity(), 32);
        assert_eq!(channel.buffer_mut().len(), 32);
    }

    #[tokio::test]
    async fn growth_past_limit_fails() {
        let (mut child_side, our_side) = tokio::io::duplex(256);
        let mut channel = reader(our_side, 16, Some(16));

        child_side.write_all(&[b'x'; 40]).await.unwrap();
        poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        let err = poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::BufferExhausted {
                stream: StreamKind::Stdout,
                ..
            }
        ));
        assert!(channel.is_end_of_stream());
    }

    #[tokio::test]
    async fn growth_is_clamped_to_limit() {
        let (mut child_side, our_side) = tokio::io::duplex(256);
        let mut channel = reader(our_side, 16, Some(24));

        child_side.write_all(&[b'x'; 24]).await.unwrap();
        poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(channel.buffer_mut().capacity(), 24);
        assert_eq!(channel.buffer_mut().len(), 24);
    }

    #[tokio::test]
    async fn writer_sends_staged_bytes_then_goes_idle() {
        let (our_side, mut child_side) = tokio::io::duplex(64);
        let mut channel = WriteChannel::new(Some(our_side), None);
        assert!(channel.wants_input());

        channel.buffer_mut().extend_from_slice(b"dir\nexit\n").unwrap();
        assert!(!channel.wants_input());
        assert_eq!(channel.pending_len(), 9);

        let result = poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap();
        assert_eq!(result, Transfer::Data(9));
        assert!(channel.wants_input());
        assert_eq!(channel.transferred(), 9);

        // Nothing staged: no second write is issued.
        assert!(poll_once(|cx| channel.poll_transfer(cx)).await.is_pending());
        assert_eq!(channel.state(), ChannelState::Idle);

        let mut received = [0u8; 9];
        child_side.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"dir\nexit\n");
    }

    #[tokio::test]
    async fn writer_blocks_on_full_pipe() {
        let (our_side, mut child_side) = tokio::io::duplex(4);
        let mut channel = WriteChannel::new(Some(our_side), None);
        channel.buffer_mut().extend_from_slice(b"abcdefgh").unwrap();

        assert_eq!(
            poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap(),
            Transfer::Data(4)
        );
        assert!(poll_once(|cx| channel.poll_transfer(cx)).await.is_pending());
        assert!(channel.needs_wait());
        assert!(!channel.wants_input());

        let mut received = [0u8; 4];
        child_side.read_exact(&mut received).await.unwrap();
        assert_eq!(
            poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap(),
            Transfer::Data(4)
        );
        assert!(channel.wants_input());
    }

    #[tokio::test]
    async fn close_request_shuts_pipe_after_flush() {
        let (our_side, mut child_side) = tokio::io::duplex(64);
        let mut channel = WriteChannel::new(Some(our_side), None);
        channel.buffer_mut().extend_from_slice(b"bye").unwrap();
        channel.request_close();
        assert!(!channel.wants_input());

        assert_eq!(
            poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap(),
            Transfer::Data(3)
        );
        assert_eq!(
            poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap(),
            Transfer::EndOfStream
        );

        let mut received = Vec::new();
        child_side.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");
    }

    #[tokio::test]
    async fn write_to_closed_reader_is_end_of_stream() {
        let (our_side, child_side) = tokio::io::duplex(64);
        drop(child_side);
        let mut channel = WriteChannel::new(Some(our_side), None);
        channel.buffer_mut().extend_from_slice(b"lost").unwrap();

        assert_eq!(
            poll_fn(|cx| channel.poll_transfer(cx)).await.unwrap(),
            Transfer::EndOfStream
        );
        assert!(channel.is_end_of_stream());
        assert_eq!(channel.pending_len(), 0);
    }
}

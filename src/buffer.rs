//! Growable byte buffer used as the staging area of a pipe channel.
//!
//! A [`ByteBuffer`] owns contiguous storage whose capacity only ever grows.
//! Clearing or consuming data keeps the storage so the next transfer can
//! reuse it. Growth failure does not panic: the buffer releases its storage
//! and becomes unusable, and the caller decides how to abort.

/// Growth of a [`ByteBuffer`] failed.
///
/// Either the allocator refused the request or it exceeded the buffer's
/// configured size limit.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("could not grow buffer to {requested} bytes")]
pub struct CapacityError {
    /// The capacity that was asked for.
    pub requested: usize,
}

/// A reusable buffer with monotonically growing capacity.
///
/// The whole capacity is initialized memory, so the unused tail can be handed
/// to a reader as a plain `&mut [u8]`.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    storage: Vec<u8>,
    len: usize,
    limit: Option<usize>,
}

impl ByteBuffer {
    /// Create an empty buffer. It is unusable until grown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that refuses to grow past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Guarantee a capacity of at least `min_bytes`.
    ///
    /// Does nothing if the capacity already suffices. On failure the storage
    /// is released and the buffer becomes unusable.
    pub fn ensure_capacity(&mut self, min_bytes: usize) -> Result<(), CapacityError> {
        if min_bytes <= self.storage.len() {
            return Ok(());
        }

        let over_limit = self.limit.is_some_and(|limit| min_bytes > limit);
        if over_limit
            || self
                .storage
                .try_reserve_exact(min_bytes - self.storage.len())
                .is_err()
        {
            self.release();
            return Err(CapacityError {
                requested: min_bytes,
            });
        }

        self.storage.resize(min_bytes, 0);
        Ok(())
    }

    /// True if the buffer has storage to work with.
    pub fn is_usable(&self) -> bool {
        !self.storage.is_empty()
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of bytes in use.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no bytes are in use.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of capacity past the used region.
    pub fn spare_capacity(&self) -> usize {
        self.storage.len() - self.len
    }

    /// The used region.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// The unused tail, to be filled and then [`commit`](Self::commit)ted.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.len..]
    }

    /// Mark `n` bytes of the unused tail as used.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.spare_capacity(), "commit past buffer capacity");
        self.len += n;
    }

    /// Drop the first `n` used bytes and move the rest to the start.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len, "consume past used length");
        self.storage.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Append `data`, growing as needed.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), CapacityError> {
        let needed = self.len.checked_add(data.len()).ok_or(CapacityError {
            requested: usize::MAX,
        })?;
        self.ensure_capacity(needed)?;
        self.storage[self.len..needed].copy_from_slice(data);
        self.len = needed;
        Ok(())
    }

    /// Forget the used bytes, keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Free the storage. The buffer becomes unusable.
    pub fn release(&mut self) {
        self.storage = Vec::new();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_unusable() {
        let buf = ByteBuffer::new();
        assert!(!buf.is_usable());
        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn ensure_capacity_grows() {
        let mut buf = ByteBuffer::new();
        buf.ensure_capacity(128).unwrap();
        assert!(buf.is_usable());
        assert_eq!(buf.capacity(), 128);
        assert_eq!(buf.spare_mut().len(), 128);
    }

    #[test]
    fn ensure_capacity_never_shrinks_or_reallocates() {
        let mut buf = ByteBuffer::new();
        buf.ensure_capacity(256).unwrap();
        let base = buf.as_slice().as_ptr();

        buf.ensure_capacity(256).unwrap();
        assert_eq!(buf.capacity(), 256);
        assert_eq!(buf.as_slice().as_ptr(), base);

        buf.ensure_capacity(10).unwrap();
        assert_eq!(buf.capacity(), 256);
        assert_eq!(buf.as_slice().as_ptr(), base);
    }

    #[test]
    fn growth_past_limit_makes_buffer_unusable() {
        let mut buf = ByteBuffer::with_limit(64);
        buf.extend_from_slice(b"hello").unwrap();

        let err = buf.ensure_capacity(65).unwrap_err();
        assert_eq!(err.requested, 65);
        assert!(!buf.is_usable());
        assert!(buf.is_empty());
    }

    #[test]
    fn commit_and_consume_keep_data_contiguous() {
        let mut buf = ByteBuffer::new();
        buf.ensure_capacity(16).unwrap();
        buf.spare_mut()[..7].copy_from_slice(b"ab\ncdef");
        buf.commit(7);
        assert_eq!(buf.as_slice(), b"ab\ncdef");

        buf.consume(3);
        assert_eq!(buf.as_slice(), b"cdef");
        assert_eq!(buf.spare_capacity(), 12);
    }

    #[test]
    fn extend_grows_and_appends() {
        let mut buf = ByteBuffer::new();
        buf.extend_from_slice(b"dir\n").unwrap();
        buf.extend_from_slice(b"exit\n").unwrap();
        assert_eq!(buf.as_slice(), b"dir\nexit\n");
        assert!(buf.capacity() >= 9);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = ByteBuffer::new();
        buf.extend_from_slice(&[7u8; 100]).unwrap();
        let cap = buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), cap);
        assert!(buf.is_usable());
    }

    #[test]
    #[should_panic(expected = "commit past buffer capacity")]
    fn commit_past_capacity_panics() {
        let mut buf = ByteBuffer::new();
        buf.ensure_capacity(4).unwrap();
        buf.commit(5);
    }
}

//! Byte sources the decoder reads from.
//!
//! Two backends share one decode routine:
//!
//! - [`SliceSource`] wraps bytes that are entirely addressable (a memory
//!   map or a buffer). Its remaining length is known, so callers can verify
//!   a whole transaction before decoding it.
//! - [`StreamSource`] wraps a forward-only reader (for example a gzip
//!   decoder). Its remaining length is unknown.

use crate::error::CodecResult;
use std::io::{ErrorKind, Read};

/// Default read buffer for [`StreamSource`].
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Forward-only access to journal bytes.
pub trait ByteSource {
    /// Returns up to `n` bytes without consuming them.
    ///
    /// A slice shorter than `n` means the input ends before `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reader fails.
    fn peek(&mut self, n: usize) -> CodecResult<&[u8]>;

    /// Consumes `n` bytes. `n` must not exceed what the last `peek` returned.
    fn advance(&mut self, n: usize);

    /// Bytes left before the end of input, when known without reading.
    fn remaining(&self) -> Option<usize>;

    /// Bytes consumed since the start of the input.
    fn position(&self) -> u64;

    /// Returns whether the input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reader fails.
    fn at_end(&mut self) -> CodecResult<bool> {
        Ok(self.peek(1)?.is_empty())
    }
}

/// A source over fully addressable bytes.
///
/// An optional limit narrows the readable window, so that decoding inside a
/// transaction cannot run past the transaction's declared end.
#[derive(Debug)]
pub struct SliceSource<B> {
    data: B,
    pos: usize,
    limit: usize,
}

impl<B: AsRef<[u8]>> SliceSource<B> {
    /// Creates a source positioned at the first byte.
    pub fn new(data: B) -> Self {
        let limit = data.as_ref().len();
        Self { data, pos: 0, limit }
    }

    /// Total length of the underlying bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.as_ref().len()
    }

    /// Returns whether the underlying bytes are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All underlying bytes, ignoring position and limit.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Moves to an absolute offset and clears the limit.
    pub fn seek(&mut self, pos: usize) {
        self.limit = self.len();
        self.pos = pos.min(self.limit);
    }

    /// Restricts reads to bytes before `limit`, or lifts the restriction.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        let len = self.len();
        self.limit = limit.map_or(len, |limit| limit.clamp(self.pos, len));
    }

    /// Returns the wrapped bytes.
    pub fn get_ref(&self) -> &B {
        &self.data
    }
}

impl<B: AsRef<[u8]>> ByteSource for SliceSource<B> {
    fn peek(&mut self, n: usize) -> CodecResult<&[u8]> {
        let end = self.pos.saturating_add(n).min(self.limit);
        Ok(&self.data.as_ref()[self.pos..end])
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.limit);
        self.pos = (self.pos + n).min(self.limit);
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.limit - self.pos)
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }
}

/// A buffered source over a forward-only reader.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    consumed: u64,
    eof: bool,
}

impl<R: Read> StreamSource<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(READ_BUFFER_SIZE, inner)
    }

    /// Wraps a reader with an initial buffer size.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(1)],
            start: 0,
            end: 0,
            consumed: 0,
            eof: false,
        }
    }

    /// Returns the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Returns the wrapped reader mutably. Reading from it directly skips
    /// bytes already buffered here.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    fn fill(&mut self, n: usize) -> CodecResult<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        // Grow for entries larger than the buffer.
        if n > self.buf.len() {
            self.buf.resize(n.next_power_of_two(), 0);
        }

        while self.end < n && !self.eof {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => self.eof = true,
                Ok(read) => self.end += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn peek(&mut self, n: usize) -> CodecResult<&[u8]> {
        if self.end - self.start < n && !self.eof {
            self.fill(n)?;
        }
        let end = self.start + n.min(self.end - self.start);
        Ok(&self.buf[self.start..end])
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(self.start + n <= self.end);
        let n = n.min(self.end - self.start);
        self.start += n;
        self.consumed += n as u64;
    }

    fn remaining(&self) -> Option<usize> {
        None
    }

    fn position(&self) -> u64 {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that returns at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(out.len()).min(self.data.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn slice_peek_and_advance() {
        let mut source = SliceSource::new(vec![1u8, 2, 3, 4, 5]);
        assert_eq!(source.peek(2).unwrap(), &[1, 2]);
        source.advance(2);
        assert_eq!(source.position(), 2);
        assert_eq!(source.remaining(), Some(3));
        assert_eq!(source.peek(10).unwrap(), &[3, 4, 5]);
    }

    #[test]
    fn slice_limit_hides_bytes() {
        let mut source = SliceSource::new(vec![1u8, 2, 3, 4, 5]);
        source.advance(1);
        source.set_limit(Some(3));
        assert_eq!(source.peek(10).unwrap(), &[2, 3]);
        assert_eq!(source.remaining(), Some(2));
        source.set_limit(None);
        assert_eq!(source.remaining(), Some(4));
    }

    #[test]
    fn slice_seek_clamps() {
        let mut source = SliceSource::new(vec![0u8; 4]);
        source.seek(10);
        assert_eq!(source.position(), 4);
        assert!(source.at_end().unwrap());
    }

    #[test]
    fn stream_refills_across_small_reads() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = StreamSource::with_capacity(
            8,
            Trickle {
                data: &data,
                chunk: 3,
            },
        );

        assert_eq!(source.peek(20).unwrap(), &data[..20]);
        source.advance(20);
        assert_eq!(source.position(), 20);
        assert_eq!(source.peek(4).unwrap(), &data[20..24]);
        assert_eq!(source.remaining(), None);
    }

    #[test]
    fn stream_reports_short_peek_at_end() {
        let data = [9u8, 8, 7];
        let mut source = StreamSource::new(&data[..]);
        assert_eq!(source.peek(8).unwrap(), &[9, 8, 7]);
        source.advance(3);
        assert!(source.at_end().unwrap());
    }
}

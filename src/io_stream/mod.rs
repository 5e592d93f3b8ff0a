//! Sequential byte sources with an inspectable internal buffer.
//!
//! The framing layer needs more than `std::io::Read`: to decode a block in
//! place it must see whether the whole block is already sitting in the
//! source's buffer, and then step over it without copying.  [`ByteSource`]
//! exposes exactly that:
//!
//! - [`fill`](ByteSource::fill) makes at least one unread byte resident
//!   (refilling discards everything before the read position),
//! - [`buffer`](ByteSource::buffer) / [`position`](ByteSource::position)
//!   expose the current working buffer and the read cursor inside it,
//! - [`advance`](ByteSource::advance) moves the cursor over resident bytes
//!   without touching them.
//!
//! Bytes before the cursor stay valid until the next `fill` that has to
//! refill, which is what makes a borrowed payload window sound.

use std::io::{self, Read};

use crate::config::DEFAULT_BUFFER_SIZE;

pub trait ByteSource {
    /// Ensure at least one unread byte is resident.  Returns `false` at end
    /// of data.  Does nothing while unread bytes remain.
    fn fill(&mut self) -> io::Result<bool>;

    /// The whole working buffer, including already-consumed bytes.
    fn buffer(&self) -> &[u8];

    /// Read cursor within [`buffer`](Self::buffer).
    fn position(&self) -> usize;

    /// Step over `n` resident bytes.  `n` must not exceed [`available`](Self::available).
    fn advance(&mut self, n: usize);

    /// Absolute number of bytes consumed since the source was created.
    fn offset(&self) -> u64;

    /// Unread bytes currently resident.
    #[inline]
    fn available(&self) -> usize {
        self.buffer().len() - self.position()
    }

    fn eof(&mut self) -> io::Result<bool> {
        Ok(!self.fill()?)
    }

    /// Copy up to `dst.len()` bytes, refilling as needed.  Returns fewer than
    /// `dst.len()` only when the data ends; callers decide whether that is
    /// fatal.
    fn read_strict(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut done = 0;
        while done < dst.len() {
            if !self.fill()? {
                break;
            }
            let pos = self.position();
            let n = self.available().min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&self.buffer()[pos..pos + n]);
            self.advance(n);
            done += n;
        }
        Ok(done)
    }
}

// ── Buffered reader source ───────────────────────────────────────────────────

/// A [`ByteSource`] over any `Read`, with a fixed-capacity buffer.
///
/// A capacity of 1 delivers the input a byte at a time, which forces every
/// block through the owned-copy path.
pub struct BufferedSource<R: Read> {
    inner:    R,
    buf:      Vec<u8>,
    pos:      usize,
    end:      usize,
    consumed: u64,
}

impl<R: Read> BufferedSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf:      vec![0u8; capacity.max(1)],
            pos:      0,
            end:      0,
            consumed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for BufferedSource<R> {
    fn fill(&mut self) -> io::Result<bool> {
        if self.pos < self.end {
            return Ok(true);
        }
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => {
                    self.pos = 0;
                    self.end = 0;
                    return Ok(false);
                }
                Ok(n) => {
                    self.pos = 0;
                    self.end = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    #[inline]
    fn buffer(&self) -> &[u8] {
        &self.buf[..self.end]
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.end - self.pos, "advance past resident data");
        self.pos += n;
        self.consumed += n as u64;
    }

    #[inline]
    fn offset(&self) -> u64 {
        self.consumed
    }
}

// ── In-memory source ─────────────────────────────────────────────────────────

/// A [`ByteSource`] over a fully resident slice (a file read into memory or
/// a memory map).  Every well-formed block takes the zero-copy path.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    #[inline]
    fn fill(&mut self) -> io::Result<bool> {
        Ok(self.pos < self.data.len())
    }

    #[inline]
    fn buffer(&self) -> &[u8] {
        self.data
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.data.len() - self.pos, "advance past end of slice");
        self.pos += n;
    }

    #[inline]
    fn offset(&self) -> u64 {
        self.pos as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_strict_spans_refills() {
        let data: Vec<u8> = (0u8..=99).collect();
        let mut src = BufferedSource::with_capacity(Cursor::new(data.clone()), 7);
        let mut out = vec![0u8; 50];
        assert_eq!(src.read_strict(&mut out).unwrap(), 50);
        assert_eq!(out, &data[..50]);
        assert_eq!(src.offset(), 50);
    }

    #[test]
    fn read_strict_reports_short_read() {
        let mut src = BufferedSource::with_capacity(Cursor::new(vec![1u8, 2, 3]), 2);
        let mut out = [0u8; 8];
        assert_eq!(src.read_strict(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert!(src.eof().unwrap());
    }

    #[test]
    fn advance_keeps_consumed_bytes_resident() {
        let mut src = BufferedSource::with_capacity(Cursor::new(b"abcdefgh".to_vec()), 16);
        assert!(src.fill().unwrap());
        src.advance(3);
        assert_eq!(src.position(), 3);
        assert_eq!(src.available(), 5);
        assert_eq!(&src.buffer()[..3], b"abc");
    }

    #[test]
    fn slice_source_is_fully_resident() {
        let data = b"0123456789";
        let mut src = SliceSource::new(data);
        assert_eq!(src.available(), 10);
        let mut four = [0u8; 4];
        src.read_strict(&mut four).unwrap();
        assert_eq!(&four, b"0123");
        assert_eq!(src.available(), 6);
        assert_eq!(src.offset(), 4);
        src.advance(6);
        assert!(src.eof().unwrap());
    }

    #[test]
    fn empty_input_is_eof() {
        let mut src = BufferedSource::new(Cursor::new(Vec::<u8>::new()));
        assert!(src.eof().unwrap());
        assert!(SliceSource::new(&[]).eof().unwrap());
    }
}

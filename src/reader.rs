//! Byte sources for the decode drivers.
//!
//! Drivers pull bytes through [`ByteReader`]. Two sources are provided:
//! [`SliceReader`] over an in-memory buffer and [`IoReader`] over any
//! `std::io::Read`. Slices returned by [`ByteReader::read_exact`] are views
//! that stay valid until the next call on the reader.

use crate::{Error, Result};
use std::io::{self, BufRead, BufReader, Read};

pub trait ByteReader {
    /// Number of bytes consumed so far.
    fn position(&self) -> usize;

    fn read_u8(&mut self) -> Result<u8>;

    /// Next byte without consuming it; `None` at end of input.
    fn peek_u8(&mut self) -> Result<Option<u8>>;

    /// Consumes exactly `n` bytes.
    fn read_exact(&mut self, n: usize) -> Result<&[u8]>;

    /// Reads a fixed-size big-endian chunk.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]>
    where
        Self: Sized,
    {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }
}

/// Reads from a borrowed byte slice.
///
/// With zero copy enabled (the default) views alias the input directly;
/// otherwise every view is copied into an internal scratch buffer first.
#[derive(Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    zero_copy: bool,
    scratch: Vec<u8>,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceReader {
            data,
            pos: 0,
            zero_copy: true,
            scratch: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_zero_copy(mut self, zero_copy: bool) -> Self {
        self.zero_copy = zero_copy;
        self
    }

    /// The bytes not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl ByteReader for SliceReader<'_> {
    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(Error::eof(self.pos, "1 more byte")),
        }
    }

    #[inline]
    fn peek_u8(&mut self) -> Result<Option<u8>> {
        Ok(self.data.get(self.pos).copied())
    }

    fn read_exact(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::eof(self.pos, &format!("{n} more bytes")))?;
        let view = &self.data[self.pos..end];
        self.pos = end;
        if self.zero_copy {
            Ok(view)
        } else {
            self.scratch.clear();
            self.scratch.extend_from_slice(view);
            Ok(&self.scratch)
        }
    }
}

/// Reads from any `std::io::Read` through an internal buffer.
///
/// Lengths taken from the input are never trusted for allocation: payloads
/// are pulled in chunks, so a forged length prefix fails with an end-of-input
/// error once the stream runs dry.
pub struct IoReader<R: Read> {
    inner: BufReader<R>,
    pos: usize,
    scratch: Vec<u8>,
}

impl<R: Read> IoReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(8 * 1024, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        IoReader {
            inner: BufReader::with_capacity(capacity.max(64), inner),
            pos: 0,
            scratch: Vec::new(),
        }
    }

    /// Returns the underlying reader. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> ByteReader for IoReader<R> {
    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        match self.peek_u8()? {
            Some(b) => {
                self.inner.consume(1);
                self.pos += 1;
                Ok(b)
            }
            None => Err(Error::eof(self.pos, "1 more byte")),
        }
    }

    fn peek_u8(&mut self) -> Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_exact(&mut self, n: usize) -> Result<&[u8]> {
        self.scratch.clear();
        let read = (&mut self.inner)
            .take(n as u64)
            .read_to_end(&mut self.scratch)?;
        self.pos += read;
        if read < n {
            return Err(Error::eof(self.pos, &format!("{} more bytes", n - read)));
        }
        Ok(&self.scratch)
    }
}

impl<R: Read> std::fmt::Debug for IoReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoReader").field("pos", &self.pos).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_reader_tracks_position() {
        let mut r = SliceReader::new(&[1, 2, 3, 4]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.peek_u8().unwrap(), Some(2));
        assert_eq!(r.read_exact(2).unwrap(), &[2, 3]);
        assert_eq!(r.position(), 3);
        assert_eq!(r.remaining(), &[4]);
    }

    #[test]
    fn test_slice_reader_eof() {
        let mut r = SliceReader::new(&[1, 2]);
        let err = r.read_exact(3).unwrap_err();
        assert_eq!(err.position(), Some(0));

        let mut r = SliceReader::new(&[1, 2]);
        assert!(r.read_exact(usize::MAX).is_err());
    }

    #[test]
    fn test_slice_reader_copying_mode() {
        let mut r = SliceReader::new(b"hello").with_zero_copy(false);
        assert_eq!(r.read_exact(5).unwrap(), b"hello");
    }

    #[test]
    fn test_io_reader_does_not_trust_lengths() {
        let mut r = IoReader::new(&b"abc"[..]);
        assert_eq!(r.read_array::<2>().unwrap(), *b"ab");
        let err = r.read_exact(1 << 40).unwrap_err();
        assert!(err.to_string().contains("end of input"));
        assert_eq!(r.peek_u8().unwrap(), None);
    }
}

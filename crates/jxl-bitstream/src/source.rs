use std::io::Read;

use crate::{Bitstream, Error};

/// Owns a growable buffer fed from an arbitrary byte source, and hands out [`Bitstream`] views
/// over it.
///
/// A single read of JPEG XL bits may need more bytes than are currently available (e.g. the
/// caller is streaming the file in over the network). [`Bitstream`] itself borrows a fixed
/// slice and has no way to ask for more input, so `Source` sits above it: every parse attempt
/// gets a fresh [`Bitstream`] over the bytes buffered so far, and if parsing fails with
/// [`Error::unexpected_eof`][Error::unexpected_eof], the caller calls [`Source::fill`] to pull in
/// more bytes and retries the parse from the same starting offset. Because already-buffered
/// bytes are never discarded mid-attempt, the retry observes exactly the same bits.
#[derive(Debug, Default)]
pub struct Source {
    buf: Vec<u8>,
    consumed: usize,
}

impl Source {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads more bytes from `reader` into the buffer. Returns the number of bytes read; `0`
    /// means the underlying reader is exhausted.
    pub fn fill(&mut self, reader: &mut impl Read, want: usize) -> std::io::Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + want, 0);
        let mut total = 0usize;
        loop {
            match reader.read(&mut self.buf[start + total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start + total);
                    return Err(e);
                }
            }
            if total == want {
                break;
            }
        }
        self.buf.truncate(start + total);
        Ok(total)
    }

    /// Buffered, not-yet-consumed bytes.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.consumed..]
    }

    /// Total number of bytes buffered so far, consumed or not.
    pub fn len(&self) -> usize {
        self.buf.len() - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a `Bitstream` over the currently-buffered bytes. Parsing may fail with
    /// [`Error::unexpected_eof`] if it runs past the end; in that case call [`Source::fill`] and
    /// retry with a freshly created `Bitstream` from this same method.
    pub fn bitstream(&self) -> Bitstream<'_> {
        Bitstream::new(self.buffered())
    }

    /// Marks `bits` bits (rounded up to a byte boundary) as consumed, once a parse attempt
    /// succeeds. `bitstream` must have been created by [`Source::bitstream`] on this `Source`.
    pub fn commit(&mut self, bitstream: &Bitstream<'_>) -> crate::Result<()> {
        let bits = bitstream.num_read_bits();
        if bits % 8 != 0 {
            return Err(Error::NotAligned);
        }
        self.consumed += bits / 8;
        Ok(())
    }
}

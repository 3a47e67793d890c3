//! Non-consuming inspection of leading stream bytes
//!
//! `SniffReader` lets format predicates look ahead at a stream while keeping
//! every peeked byte available to whichever decoder eventually reads it.

use std::io::{self, Read, Seek, SeekFrom};

/// Look-ahead access to a byte stream.
///
/// Sniff predicates only ever get a `&mut dyn Peek`, so they cannot advance
/// the logical read position.
pub trait Peek {
    /// Returns up to `n` upcoming bytes without consuming them.
    ///
    /// Fewer than `n` bytes are returned only when the stream ends first.
    fn peek(&mut self, n: usize) -> io::Result<&[u8]>;
}

const FILL_CHUNK: usize = 512;

/// Reader wrapper that buffers peeked bytes until they are read
#[derive(Debug)]
pub struct SniffReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R> SniffReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Bytes peeked but not yet read
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read> Peek for SniffReader<R> {
    fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let mut chunk = [0u8; FILL_CHUNK];
        while self.buf.len() - self.pos < n {
            let want = (n - (self.buf.len() - self.pos)).min(FILL_CHUNK);
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(k) => self.buf.extend_from_slice(&chunk[..k]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let end = (self.pos + n).min(self.buf.len());
        Ok(&self.buf[self.pos..end])
    }
}

impl<R: Read> Read for SniffReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let k = out.len().min(self.buf.len() - self.pos);
            out[..k].copy_from_slice(&self.buf[self.pos..self.pos + k]);
            self.pos += k;
            if self.pos == self.buf.len() {
                self.buf.clear();
                self.pos = 0;
            }
            return Ok(k);
        }
        self.inner.read(out)
    }
}

impl<R: Seek> Seek for SniffReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        // the inner stream is ahead of the logical position by the pending bytes
        let pending = (self.buf.len() - self.pos) as i64;
        let target = match pos {
            SeekFrom::Current(off) => SeekFrom::Current(off - pending),
            other => other,
        };
        let at = self.inner.seek(target)?;
        self.buf.clear();
        self.pos = 0;
        Ok(at)
    }
}

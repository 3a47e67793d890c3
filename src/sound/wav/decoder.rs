//! Streaming WAV decoder
//!
//! Reads the `data` chunk one buffer window at a time and hands out samples
//! as normalized amplitudes. Windows are aligned on whole frames, so seeking
//! is a matter of picking a window and an offset inside it.

use std::io::{self, Read, Seek};

use super::format::Format;
use super::riff::{self, ChunkId, ChunkTree, DATA_ID, FMT_ID};
use super::DEFAULT_BUFFER_FRAMES;
use crate::sound::error::{CodecError, CodecResult};
use crate::sound::formats::{SampleKind, SampleRate};
use crate::sound::session::{SeekableSource, Source};

/// Read position inside the decode buffer.
///
/// `fresh` is set when the buffer holds the window the offset refers to;
/// otherwise the window must be fetched before the next sample is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCursor {
    pub offset: usize,
    pub fresh: bool,
}

impl BufferCursor {
    pub fn stale(offset: usize) -> Self {
        Self {
            offset,
            fresh: false,
        }
    }

    pub fn fresh(offset: usize) -> Self {
        Self {
            offset,
            fresh: true,
        }
    }
}

/// Decoder for a RIFF/WAVE stream
pub struct WavDecoder<R> {
    format: Format,
    tree: ChunkTree,
    data: ChunkId,
    reader: Option<R>,
    buf: Vec<u8>,
    /// valid bytes of the current window
    filled: usize,
    cursor: BufferCursor,
    /// windows preceding the current one
    windows: u64,
    frames: u64,
}

impl<R: Read> WavDecoder<R> {
    /// Open a stream that cannot seek; chunks before `data` are read and
    /// discarded.
    pub fn open(r: R) -> CodecResult<Self> {
        Self::open_with(r, DEFAULT_BUFFER_FRAMES)
    }

    /// Like `open`, with a buffer of `buffer_frames` frames
    pub fn open_with(r: R, buffer_frames: usize) -> CodecResult<Self> {
        Self::open_skipping(r, 0, buffer_frames, |r, n| riff::discard(r, n))
    }

    fn open_skipping<F>(mut r: R, base: u64, buffer_frames: usize, mut skip: F) -> CodecResult<Self>
    where
        F: FnMut(&mut R, u64) -> io::Result<()>,
    {
        let mut tree = ChunkTree::read_container_at(&mut r, base)?;
        let fmt = tree.find_chunk(&mut r, ChunkTree::ROOT, FMT_ID, &mut skip)?;
        let format = Format::parse(&tree.read_payload(&mut r, fmt)?)?;
        let data = tree.find_chunk(&mut r, ChunkTree::ROOT, DATA_ID, &mut skip)?;

        let length = tree.get(data).length() as u64;
        let bpf = format.bytes_per_frame() as u64;
        if length % bpf != 0 {
            return Err(CodecError::InconsistentFormat(format!(
                "data length {} is not a whole number of {}-byte frames",
                length, bpf
            )));
        }
        let frames = length / bpf;
        log::debug!(
            "wav: {} channels, {}, {} frames of {}",
            format.channels(),
            format.sample_rate(),
            frames,
            format.codec()
        );

        Ok(Self {
            format,
            tree,
            data,
            reader: Some(r),
            buf: vec![0u8; buffer_frames.max(1) * bpf as usize],
            filled: 0,
            cursor: BufferCursor::default(),
            windows: 0,
            frames,
        })
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Chunks discovered while locating the sample data
    pub fn chunks(&self) -> &ChunkTree {
        &self.tree
    }

    pub fn cursor(&self) -> BufferCursor {
        self.cursor
    }

    /// Frames held by one buffer window
    pub fn frames_per_buffer(&self) -> usize {
        self.buf.len() / self.format.bytes_per_frame()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Current frame position, never past `frames()`.
    ///
    /// A window that ends the data chunk is usually short, so the bytes
    /// counted for completed windows are capped at the chunk length.
    pub fn position(&self) -> u64 {
        let data_len = self.tree.get(self.data).length() as u64;
        let bytes = self.windows * self.buf.len() as u64 + self.cursor.offset as u64;
        bytes.min(data_len) / self.format.bytes_per_frame() as u64
    }

    /// Decode into the channel-major buffer `dst`.
    ///
    /// See `Source::receive`. When the stream ends part way through, the
    /// frames produced are compacted into `dst[..frames * channels]`.
    pub fn receive(&mut self, dst: &mut [f64]) -> CodecResult<usize> {
        let channels = self.format.channels();
        if dst.len() % channels != 0 {
            return Err(CodecError::ChannelAlignment {
                len: dst.len(),
                channels,
            });
        }
        if self.reader.is_none() {
            return Err(CodecError::Closed);
        }
        let n = dst.len() / channels;
        if n == 0 {
            return Ok(0);
        }

        let (mut c, mut f) = (0, 0);
        for _ in 0..dst.len() {
            match self.sample() {
                Ok(v) => dst[c * n + f] = v,
                Err(e) if e.is_end_of_stream() => {
                    if f == 0 {
                        return Err(CodecError::EndOfStream);
                    }
                    compact(dst, channels, n, f);
                    return Ok(f);
                }
                Err(e) => return Err(e),
            }
            c += 1;
            if c == channels {
                c = 0;
                f += 1;
            }
        }
        Ok(f)
    }

    fn sample(&mut self) -> CodecResult<f64> {
        if !self.cursor.fresh {
            self.fetch()?;
        }
        let codec = self.format.codec();
        let at = self.cursor.offset;
        let next = at + codec.bytes();
        let v = codec.decode(&self.buf[at..next]);
        if next >= self.filled {
            self.cursor = BufferCursor::stale(0);
            self.windows += 1;
        } else {
            self.cursor = BufferCursor::fresh(next);
        }
        Ok(v)
    }

    /// Load the current window from the stream
    fn fetch(&mut self) -> CodecResult<()> {
        let data_len = self.tree.get(self.data).length() as u64;
        let window_start = self.windows * self.buf.len() as u64;
        let want = (self.buf.len() as u64).min(data_len.saturating_sub(window_start)) as usize;
        if want <= self.cursor.offset {
            return Err(CodecError::EndOfStream);
        }

        let reader = self.reader.as_mut().ok_or(CodecError::Closed)?;
        // Ok(0) from a reader is end of stream; a truncated trailing sample is dropped
        let got = riff::read_full(reader, &mut self.buf[..want])?;
        let filled = got - got % self.format.codec().bytes();
        log::trace!(
            "wav: window {} fetched {}/{} bytes",
            self.windows,
            got,
            want
        );
        if filled <= self.cursor.offset {
            return Err(CodecError::EndOfStream);
        }
        self.filled = filled;
        self.cursor.fresh = true;
        Ok(())
    }

    /// Release the stream; further reads fail with `Closed`
    pub fn close(&mut self) -> CodecResult<()> {
        self.reader = None;
        Ok(())
    }

    /// Recover the stream, if not closed
    pub fn into_inner(self) -> Option<R> {
        self.reader
    }
}

impl<R: Read + Seek> WavDecoder<R> {
    /// Open a seekable stream; chunks before `data` are skipped by seeking
    pub fn open_seekable(r: R) -> CodecResult<Self> {
        Self::open_seekable_with(r, DEFAULT_BUFFER_FRAMES)
    }

    /// Like `open_seekable`, with a buffer of `buffer_frames` frames.
    ///
    /// The container may start anywhere; its header is read from the current
    /// stream position.
    pub fn open_seekable_with(mut r: R, buffer_frames: usize) -> CodecResult<Self> {
        let base = r.stream_position()?;
        Self::open_skipping(r, base, buffer_frames, |r, n| riff::seek_past(r, n))
    }

    /// Position the decoder at frame `frame`.
    ///
    /// `frame == frames()` positions at the end of the stream.
    pub fn seek(&mut self, frame: u64) -> CodecResult<()> {
        if frame > self.frames {
            return Err(CodecError::SeekOutOfRange {
                frame,
                frames: self.frames,
            });
        }
        let bpf = self.format.bytes_per_frame() as u64;
        let fpb = self.buf.len() as u64 / bpf;
        let window = frame / fpb;
        let offset = ((frame % fpb) * bpf) as usize;

        if window == self.windows && self.cursor.fresh {
            // the stream already sits just past the loaded window
            if offset < self.filled {
                self.cursor = BufferCursor::fresh(offset);
            } else {
                self.cursor = BufferCursor::stale(0);
                self.windows += 1;
            }
            return Ok(());
        }

        let reader = self.reader.as_mut().ok_or(CodecError::Closed)?;
        self.tree
            .get(self.data)
            .seek(reader, window * self.buf.len() as u64)?;
        self.windows = window;
        self.cursor = BufferCursor::stale(offset);
        Ok(())
    }
}

/// Move the per-channel runs of `f` frames, laid out with stride `n`, into a
/// dense prefix with stride `f`.
fn compact(dst: &mut [f64], channels: usize, n: usize, f: usize) {
    for c in 1..channels {
        dst.copy_within(c * n..c * n + f, c * f);
    }
}

impl<R: Read + Send> Source for WavDecoder<R> {
    fn channels(&self) -> usize {
        self.format.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.format.sample_rate()
    }

    fn sample_kind(&self) -> SampleKind {
        SampleKind::Codec(self.format.codec())
    }

    fn receive(&mut self, dst: &mut [f64]) -> CodecResult<usize> {
        WavDecoder::receive(self, dst)
    }

    fn close(&mut self) -> CodecResult<()> {
        WavDecoder::close(self)
    }
}

impl<R: Read + Seek + Send> SeekableSource for WavDecoder<R> {
    fn position(&self) -> u64 {
        WavDecoder::position(self)
    }

    fn frames(&self) -> u64 {
        WavDecoder::frames(self)
    }

    fn seek(&mut self, frame: u64) -> CodecResult<()> {
        WavDecoder::seek(self, frame)
    }
}

//! Decode and encode session traits
//!
//! Every codec exposes its sessions through these traits so callers can treat
//! sound I/O generically. Sample buffers are channel-major: for a buffer of
//! `n` frames, sample `f` of channel `c` lives at index `c * n + f`.

use std::io::{Read, Seek, Write};
use std::time::Duration;

use super::error::CodecResult;
use super::formats::{SampleKind, SampleRate};

/// A readable, seekable byte stream
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A writable, seekable byte stream
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

/// A readable, writable, seekable byte stream
pub trait ReadWriteSeek: Read + Write + Seek {}
impl<T: Read + Write + Seek> ReadWriteSeek for T {}

/// A decode session
pub trait Source: Send {
    /// Number of channels
    fn channels(&self) -> usize;

    /// Sampling frequency
    fn sample_rate(&self) -> SampleRate;

    /// Encoding of the underlying samples
    fn sample_kind(&self) -> SampleKind;

    /// Fill `dst` with up to `dst.len() / channels()` frames.
    ///
    /// Returns the number of frames produced. When fewer frames than requested
    /// are available, the produced frames occupy the dense prefix
    /// `dst[..frames * channels()]`. Returns `CodecError::EndOfStream` once no
    /// frame can be produced.
    fn receive(&mut self, dst: &mut [f64]) -> CodecResult<usize>;

    /// Release the underlying stream
    fn close(&mut self) -> CodecResult<()>;
}

/// A decode session supporting random positioning
pub trait SeekableSource: Source {
    /// Current frame position
    fn position(&self) -> u64;

    /// Total number of frames
    fn frames(&self) -> u64;

    /// Move to frame `frame`; `frame == frames()` positions at the end
    fn seek(&mut self, frame: u64) -> CodecResult<()>;

    /// Current time position
    fn when(&self) -> Duration {
        self.sample_rate().duration_of(self.position())
    }

    /// Total duration
    fn duration(&self) -> Duration {
        self.sample_rate().duration_of(self.frames())
    }

    /// Move to the frame at time `d`
    fn seek_duration(&mut self, d: Duration) -> CodecResult<()> {
        let frame = self.sample_rate().frames_in(d);
        self.seek(frame)
    }
}

/// An encode session
pub trait Sink: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> SampleRate;

    fn sample_kind(&self) -> SampleKind;

    /// Encode all frames of the channel-major buffer `src`
    fn send(&mut self, src: &[f64]) -> CodecResult<()>;

    /// Flush pending samples and finalize the container
    fn close(&mut self) -> CodecResult<()>;
}

/// A session that can both read and write at arbitrary positions
pub trait RandomAccess: SeekableSource + Sink {}

/// Copy every frame of `src` into `dst`, returning the number of frames copied.
///
/// `dst` is not closed.
pub fn copy<K, S>(dst: &mut K, src: &mut S, frames_per_batch: usize) -> CodecResult<u64>
where
    K: Sink + ?Sized,
    S: Source + ?Sized,
{
    let channels = src.channels();
    let mut buf = vec![0.0f64; frames_per_batch.max(1) * channels];
    let mut total = 0u64;
    loop {
        let n = match src.receive(&mut buf) {
            Ok(n) => n,
            Err(e) if e.is_end_of_stream() => return Ok(total),
            Err(e) => return Err(e),
        };
        dst.send(&buf[..n * channels])?;
        total += n as u64;
    }
}

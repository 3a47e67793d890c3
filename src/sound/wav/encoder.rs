//! Streaming WAV encoder

use std::io::{Seek, SeekFrom, Write};

use super::format::Format;
use super::riff::{
    self, CHUNK_HEADER_SIZE, CONTAINER_HEADER_SIZE, DATA_ID, FORM_TYPE_SIZE,
};
use super::DEFAULT_BUFFER_FRAMES;
use crate::sound::error::{CodecError, CodecResult};
use crate::sound::formats::{SampleKind, SampleRate};
use crate::sound::session::Sink;

/// Lifecycle of an encoder
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    /// finalizing failed; the header may be unpatched
    Failed(String),
}

/// Writes channel-major sample buffers as an interleaved RIFF/WAVE stream.
///
/// Headers go out with zero lengths on construction and are patched by
/// `close`. An encoder dropped without `close` is finalized on drop, with
/// failures only logged.
pub struct WavEncoder<W: Write + Seek> {
    format: Format,
    writer: Option<W>,
    /// stream position of the container header
    base: u64,
    buf: Vec<u8>,
    pos: usize,
    samples: u64,
    state: State,
}

impl<W: Write + Seek> WavEncoder<W> {
    pub fn new(format: Format, w: W) -> CodecResult<Self> {
        Self::with_buffer_frames(format, w, DEFAULT_BUFFER_FRAMES)
    }

    pub fn with_buffer_frames(format: Format, mut w: W, buffer_frames: usize) -> CodecResult<Self> {
        let base = w.stream_position()?;
        riff::write_container_header(&mut w, 0)?;
        format.write(&mut w)?;
        riff::write_chunk_header(&mut w, DATA_ID, 0)?;
        log::debug!("wav: encoding {} at offset {}", format, base);

        Ok(Self {
            buf: vec![0u8; buffer_frames.max(1) * format.bytes_per_frame()],
            format,
            writer: Some(w),
            base,
            pos: 0,
            samples: 0,
            state: State::Open,
        })
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Frames accepted so far
    pub fn frames(&self) -> u64 {
        self.samples / self.format.channels() as u64
    }

    /// Encode the channel-major buffer `src`.
    ///
    /// A buffer that is not a whole number of frames is rejected before any
    /// sample is encoded.
    pub fn send(&mut self, src: &[f64]) -> CodecResult<()> {
        let channels = self.format.channels();
        if src.len() % channels != 0 {
            return Err(CodecError::ChannelAlignment {
                len: src.len(),
                channels,
            });
        }
        match &self.state {
            State::Open => {}
            State::Closed => return Err(CodecError::Closed),
            State::Failed(e) => return Err(CodecError::CloseFailed(e.clone())),
        }

        let codec = self.format.codec();
        let width = codec.bytes();
        let n = src.len() / channels;
        for f in 0..n {
            for c in 0..channels {
                codec.encode(src[c * n + f], &mut self.buf[self.pos..self.pos + width]);
                self.pos += width;
                self.samples += 1;
                if self.pos == self.buf.len() {
                    self.flush_buffer()?;
                }
            }
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> CodecResult<()> {
        let w = self.writer.as_mut().ok_or(CodecError::Closed)?;
        w.write_all(&self.buf[..self.pos])?;
        self.pos = 0;
        Ok(())
    }

    /// Flush pending samples and patch the header lengths.
    ///
    /// Closing twice is a no-op. Finalizing is attempted once; if it fails,
    /// every later `close` reports `CloseFailed`.
    pub fn close(&mut self) -> CodecResult<()> {
        match &self.state {
            State::Open => {}
            State::Closed => return Ok(()),
            State::Failed(e) => return Err(CodecError::CloseFailed(e.clone())),
        }
        match self.finalize() {
            Ok(()) => {
                self.state = State::Closed;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Close and hand back the stream, positioned at its end
    pub fn finish(mut self) -> CodecResult<W> {
        self.close()?;
        self.writer.take().ok_or(CodecError::Closed)
    }

    fn finalize(&mut self) -> CodecResult<()> {
        if self.pos != 0 {
            self.flush_buffer()?;
        }
        let data_bytes = self.samples * self.format.codec().bytes() as u64;
        let pad = data_bytes & 1;
        let fmt_size = self.format.chunk_size();
        let riff_len = FORM_TYPE_SIZE + fmt_size + CHUNK_HEADER_SIZE + data_bytes + pad;
        let riff_len = u32::try_from(riff_len).map_err(|_| CodecError::ContainerOverflow(data_bytes))?;
        // riff_len bounds data_bytes
        let data_len = data_bytes as u32;

        let w = self.writer.as_mut().ok_or(CodecError::Closed)?;
        if pad == 1 {
            w.write_all(&[0])?;
        }
        w.seek(SeekFrom::Start(self.base + 4))?;
        w.write_all(&riff_len.to_le_bytes())?;
        w.seek(SeekFrom::Start(self.base + CONTAINER_HEADER_SIZE + fmt_size + 4))?;
        w.write_all(&data_len.to_le_bytes())?;
        w.seek(SeekFrom::Start(self.base + 8 + riff_len as u64))?;
        w.flush()?;
        log::debug!(
            "wav: closed after {} frames ({} data bytes)",
            self.frames(),
            data_bytes
        );
        Ok(())
    }
}

impl<W: Write + Seek> Drop for WavEncoder<W> {
    fn drop(&mut self) {
        if self.writer.is_none() {
            return;
        }
        if self.state == State::Open {
            if let Err(e) = self.close() {
                log::warn!("wav: failed to finalize encoder on drop: {}", e);
            }
        } else if let State::Failed(e) = &self.state {
            log::warn!("wav: dropping encoder left unfinalized: {}", e);
        }
    }
}

impl<W: Write + Seek + Send> Sink for WavEncoder<W> {
    fn channels(&self) -> usize {
        self.format.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.format.sample_rate()
    }

    fn sample_kind(&self) -> SampleKind {
        SampleKind::Codec(self.format.codec())
    }

    fn send(&mut self, src: &[f64]) -> CodecResult<()> {
        WavEncoder::send(self, src)
    }

    fn close(&mut self) -> CodecResult<()> {
        WavEncoder::close(self)
    }
}

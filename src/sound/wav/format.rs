//! The `fmt ` chunk
//!
//! Declares channel count, sample rate and sample encoding of the `data`
//! chunk. Only integer PCM and 32-bit IEEE float are understood.

use std::fmt;
use std::io::Write;

use super::riff::{self, CHUNK_HEADER_SIZE, FMT_ID};
use crate::sound::error::{CodecError, CodecResult};
use crate::sound::formats::{Form, SampleCodec, SampleRate};

/// Format tag for integer PCM
pub const WAVE_FORMAT_PCM: u16 = 1;
/// Format tag for IEEE float
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Bytes of structural fields common to every format tag
pub const FMT_STRUCTURAL_SIZE: u32 = 16;
/// Extension-size field written after the structural fields for float data
const FMT_EXTENSION_SIZE: u32 = 2;

/// Parsed `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    channels: u16,
    sample_rate: SampleRate,
    codec: SampleCodec,
}

impl Format {
    /// Create a format.
    ///
    /// Rejects a zero channel count, and shapes whose block align or byte
    /// rate do not fit the 16 and 32 bit header fields.
    pub fn new(channels: u16, sample_rate: SampleRate, codec: SampleCodec) -> CodecResult<Self> {
        if channels == 0 {
            return Err(CodecError::InconsistentFormat(
                "zero channels".to_string(),
            ));
        }
        let block_align = channels as u64 * codec.bytes() as u64;
        if block_align > u16::MAX as u64 {
            return Err(CodecError::InconsistentFormat(format!(
                "block align of {} bytes for {} channels of {}",
                block_align, channels, codec
            )));
        }
        let byte_rate = block_align * sample_rate.hz() as u64;
        if byte_rate > u32::MAX as u64 {
            return Err(CodecError::InconsistentFormat(format!(
                "byte rate of {} at {}",
                byte_rate, sample_rate
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            codec,
        })
    }

    /// Create a format matching the shape of a stream
    pub fn from_form(form: Form, codec: SampleCodec) -> CodecResult<Self> {
        let channels = u16::try_from(form.channels).map_err(|_| {
            CodecError::InconsistentFormat(format!("{} channels", form.channels))
        })?;
        Self::new(channels, form.sample_rate, codec)
    }

    /// 16-bit mono at 44.1kHz
    pub fn mono_cd() -> Self {
        Self {
            channels: 1,
            sample_rate: SampleRate::CD,
            codec: SampleCodec::S16LE,
        }
    }

    /// 16-bit stereo at 44.1kHz
    pub fn stereo_cd() -> Self {
        Self {
            channels: 2,
            sample_rate: SampleRate::CD,
            codec: SampleCodec::S16LE,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn codec(&self) -> SampleCodec {
        self.codec
    }

    pub fn form(&self) -> Form {
        Form::new(self.channels(), self.sample_rate)
    }

    /// Bytes per frame (block align)
    pub fn bytes_per_frame(&self) -> usize {
        self.codec.bytes() * self.channels()
    }

    /// Block align as written to the header; bounded by `new` and `parse`
    fn block_align(&self) -> u16 {
        self.channels * self.codec.bytes() as u16
    }

    /// Bytes per second
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.hz() * self.block_align() as u32
    }

    fn tag(&self) -> u16 {
        if self.codec.is_float() {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        }
    }

    /// Declared payload length of the chunk this format writes
    pub fn payload_size(&self) -> u32 {
        if self.codec.is_float() {
            FMT_STRUCTURAL_SIZE + FMT_EXTENSION_SIZE
        } else {
            FMT_STRUCTURAL_SIZE
        }
    }

    /// Total size of the chunk this format writes, header included
    pub fn chunk_size(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.payload_size() as u64
    }

    /// Parse the payload of a `fmt ` chunk.
    ///
    /// Bytes past the structural fields are ignored.
    pub fn parse(payload: &[u8]) -> CodecResult<Self> {
        if payload.len() < FMT_STRUCTURAL_SIZE as usize {
            return Err(CodecError::InconsistentFormat(format!(
                "format chunk too small: {}",
                payload.len()
            )));
        }
        let u16_at = |i: usize| u16::from_le_bytes([payload[i], payload[i + 1]]);
        let u32_at = |i: usize| {
            u32::from_le_bytes([payload[i], payload[i + 1], payload[i + 2], payload[i + 3]])
        };

        let tag = u16_at(0);
        let channels = u16_at(2);
        let rate = u32_at(4);
        let byte_rate = u32_at(8);
        let block_align = u16_at(12);
        let bits = u16_at(14);

        if tag != WAVE_FORMAT_PCM && tag != WAVE_FORMAT_IEEE_FLOAT {
            return Err(CodecError::UnsupportedTag(tag));
        }
        if channels == 0 {
            return Err(CodecError::InconsistentFormat(
                "zero channels".to_string(),
            ));
        }
        let sample_rate = SampleRate::new(rate)
            .ok_or_else(|| CodecError::InconsistentFormat("zero sample rate".to_string()))?;
        if byte_rate as u64 != rate as u64 * block_align as u64 {
            return Err(CodecError::InconsistentFormat(format!(
                "bytes per sec is {} not {}",
                byte_rate,
                rate as u64 * block_align as u64
            )));
        }
        if block_align as u32 * 8 != bits as u32 * channels as u32 {
            return Err(CodecError::InconsistentFormat(format!(
                "block align {} != {}",
                block_align,
                bits as u32 * channels as u32 / 8
            )));
        }

        let codec = match (tag, bits) {
            (WAVE_FORMAT_PCM, 8) => SampleCodec::U8,
            (WAVE_FORMAT_PCM, 16) => SampleCodec::S16LE,
            (WAVE_FORMAT_PCM, 24) => SampleCodec::S24LE,
            (WAVE_FORMAT_PCM, 32) => SampleCodec::S32LE,
            (WAVE_FORMAT_IEEE_FLOAT, 32) => SampleCodec::F32LE,
            (_, bits) => return Err(CodecError::UnsupportedBitDepth(bits)),
        };

        if payload.len() > FMT_STRUCTURAL_SIZE as usize {
            log::trace!(
                "ignoring {} trailing format bytes",
                payload.len() - FMT_STRUCTURAL_SIZE as usize
            );
        }

        Ok(Self {
            channels,
            sample_rate,
            codec,
        })
    }

    /// Write the complete `fmt ` chunk, header included
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> CodecResult<()> {
        let mut buf = Vec::with_capacity(self.chunk_size() as usize);
        riff::write_chunk_header(&mut buf, FMT_ID, self.payload_size())?;
        buf.extend_from_slice(&self.tag().to_le_bytes());
        buf.extend_from_slice(&self.channels.to_le_bytes());
        buf.extend_from_slice(&self.sample_rate.hz().to_le_bytes());
        buf.extend_from_slice(&self.byte_rate().to_le_bytes());
        buf.extend_from_slice(&self.block_align().to_le_bytes());
        buf.extend_from_slice(&self.codec.bits().to_le_bytes());
        if self.codec.is_float() {
            buf.extend_from_slice(&0u16.to_le_bytes());
        }
        w.write_all(&buf)?;
        Ok(())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples: {}", self.codec)?;
        writeln!(f, "Channels: {}", self.channels)?;
        writeln!(f, "SampleRate: {}", self.sample_rate)
    }
}
